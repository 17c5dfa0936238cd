// SPDX-License-Identifier: MIT OR Apache-2.0

//! Graph functions for flattening nested portfolio hierarchies.
use std::collections::HashMap;

use petgraph::algo::is_cyclic_directed;
use petgraph::graphmap::DiGraphMap;
use petgraph::visit::Dfs;

/// A node of a portfolio hierarchy.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum PortfolioNode {
    Portfolio(String),
    Project(String),
}

/// Directed graph of portfolios and the projects and sub-portfolios they contain.
///
/// Nodes are interned so the underlying `DiGraphMap` can be addressed by copyable indices.
#[derive(Clone, Debug, Default)]
pub struct PortfolioGraph {
    nodes: Vec<PortfolioNode>,
    indices: HashMap<PortfolioNode, usize>,
    graph: DiGraphMap<usize, ()>,
}

impl PortfolioGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a node if it doesn't exist yet and return its index.
    pub fn add_node(&mut self, node: PortfolioNode) -> usize {
        if let Some(index) = self.indices.get(&node) {
            return *index;
        }
        let index = self.nodes.len();
        self.nodes.push(node.clone());
        self.indices.insert(node, index);
        self.graph.add_node(index);
        index
    }

    /// Record that `member` is directly contained in `portfolio`.
    pub fn add_member(&mut self, portfolio: &str, member: PortfolioNode) {
        let from = self.add_node(PortfolioNode::Portfolio(portfolio.to_string()));
        let to = self.add_node(member);
        self.graph.add_edge(from, to, ());
    }

    /// Return `true` if any portfolio contains itself, directly or transitively.
    pub fn is_cyclic(&self) -> bool {
        is_cyclic_directed(&self.graph)
    }

    /// Projects reachable from the given portfolio, each exactly once.
    pub fn leaf_projects(&self, root: &str) -> Vec<String> {
        let Some(root) = self
            .indices
            .get(&PortfolioNode::Portfolio(root.to_string()))
        else {
            return Vec::new();
        };

        let mut projects = Vec::new();
        let mut dfs = Dfs::new(&self.graph, *root);
        while let Some(index) = dfs.next(&self.graph) {
            if let PortfolioNode::Project(uuid) = &self.nodes[index] {
                projects.push(uuid.clone());
            }
        }
        projects
    }
}

#[cfg(test)]
mod tests {
    use super::{PortfolioGraph, PortfolioNode};

    fn project(uuid: &str) -> PortfolioNode {
        PortfolioNode::Project(uuid.to_string())
    }

    fn portfolio(uuid: &str) -> PortfolioNode {
        PortfolioNode::Portfolio(uuid.to_string())
    }

    #[test]
    fn flat_portfolio() {
        let mut graph = PortfolioGraph::new();
        graph.add_member("pf", project("p1"));
        graph.add_member("pf", project("p2"));

        let mut leaves = graph.leaf_projects("pf");
        leaves.sort();
        assert_eq!(leaves, vec!["p1", "p2"]);
        assert!(!graph.is_cyclic());
    }

    #[test]
    fn diamond_yields_each_project_once() {
        //        pf
        //       /  \
        //     sa    sb
        //       \  /
        //        sc
        //        |
        //        p1
        let mut graph = PortfolioGraph::new();
        graph.add_member("pf", portfolio("sa"));
        graph.add_member("pf", portfolio("sb"));
        graph.add_member("sa", portfolio("sc"));
        graph.add_member("sb", portfolio("sc"));
        graph.add_member("sc", project("p1"));
        graph.add_member("sa", project("p2"));

        let mut leaves = graph.leaf_projects("pf");
        leaves.sort();
        assert_eq!(leaves, vec!["p1", "p2"]);
        assert!(!graph.is_cyclic());
    }

    #[test]
    fn detect_cycles() {
        let mut graph = PortfolioGraph::new();
        graph.add_member("pf", portfolio("sa"));
        graph.add_member("sa", portfolio("sb"));
        graph.add_member("sb", project("p1"));
        assert!(!graph.is_cyclic());

        graph.add_member("sb", portfolio("pf"));
        assert!(graph.is_cyclic());
    }

    #[test]
    fn unknown_root_has_no_leaves() {
        let mut graph = PortfolioGraph::new();
        graph.add_member("pf", project("p1"));
        assert!(graph.leaf_projects("other").is_empty());
    }

    #[test]
    fn nodes_are_interned() {
        let mut graph = PortfolioGraph::new();
        let a = graph.add_node(project("p1"));
        let b = graph.add_node(project("p1"));
        let c = graph.add_node(portfolio("p1"));
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
