// SPDX-License-Identifier: MIT OR Apache-2.0

//! Resolution of composite resources into the projects whose permissions must be aggregated.
//!
//! A check on a branch is a check on its project, a check on the content of an application is a
//! check on every one of its projects and a check on the content of a portfolio is a check on
//! every project reachable through the portfolio and its nested sub-portfolios.
//!
//! All resolutions are memoized for the lifetime of the resolver, which lives as long as the
//! session owning it. A request therefore sees one consistent membership for every resource,
//! even when memberships change in storage while it is processed.
use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt::Debug;

use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{trace, warn};

use crate::graph::{PortfolioGraph, PortfolioNode};
use crate::resource::Component;
use crate::traits::ResourceDirectory;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ResolveError {
    #[error("resource {0} not found")]
    UnknownResource(String),

    #[error("portfolio {0} contains itself")]
    PortfolioCycle(String),

    #[error("portfolio {0} is nested deeper than {1} levels")]
    DepthExceeded(String, usize),

    #[error("resource directory failed: {0}")]
    Directory(String),
}

/// How the checks over the members of a resolution are combined.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Aggregation {
    /// A single member which must satisfy the check.
    Any,

    /// Every member must satisfy the check.
    All,
}

/// The primitive resources a composite resource resolves to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Resolution {
    /// UUIDs of the entities to check, without duplicates.
    pub members: Vec<String>,
    pub aggregation: Aggregation,
}

impl Resolution {
    fn single(uuid: impl Into<String>) -> Self {
        Self {
            members: vec![uuid.into()],
            aggregation: Aggregation::Any,
        }
    }

    fn all(members: Vec<String>) -> Self {
        Self {
            members,
            aggregation: Aggregation::All,
        }
    }

    /// Combine the outcome of the check of every member.
    pub fn aggregate(&self, mut check: impl FnMut(&str) -> bool) -> bool {
        match self.aggregation {
            Aggregation::Any => self.members.iter().any(|uuid| check(uuid)),
            Aggregation::All => self.members.iter().all(|uuid| check(uuid)),
        }
    }
}

/// Reference to a resource which might aggregate others.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CompositeResource<'a> {
    /// Any component, addressed by UUID. Resolves to the entity owning it.
    Component(&'a str),
    Application(&'a str),
    Portfolio(&'a str),
}

/// Resolves resources against a [`ResourceDirectory`], memoizing every answer.
pub struct ScopeResolver<D> {
    directory: D,
    max_portfolio_depth: usize,
    components: RwLock<HashMap<String, Result<Component, ResolveError>>>,
    applications: RwLock<HashMap<String, Result<Resolution, ResolveError>>>,
    portfolios: RwLock<HashMap<String, Result<Resolution, ResolveError>>>,
}

impl<D> ScopeResolver<D>
where
    D: ResourceDirectory,
{
    pub fn new(directory: D, max_portfolio_depth: usize) -> Self {
        Self {
            directory,
            max_portfolio_depth,
            components: RwLock::default(),
            applications: RwLock::default(),
            portfolios: RwLock::default(),
        }
    }

    /// Resolve any composite resource.
    pub async fn resolve(
        &self,
        resource: CompositeResource<'_>,
    ) -> Result<Resolution, ResolveError> {
        match resource {
            CompositeResource::Component(uuid) => {
                let component = self.component(uuid).await?;
                Ok(Self::resolve_component(&component))
            }
            CompositeResource::Application(uuid) => self.resolve_application(uuid).await,
            CompositeResource::Portfolio(uuid) => self.resolve_portfolio(uuid).await,
        }
    }

    /// A loaded component resolves to the entity owning it.
    pub fn resolve_component(component: &Component) -> Resolution {
        Resolution::single(component.owner_uuid())
    }

    /// Load a component through the directory.
    pub async fn component(&self, uuid: &str) -> Result<Component, ResolveError> {
        if let Some(component) = self.components.read().await.get(uuid) {
            return component.clone();
        }

        trace!(uuid, "loading component");
        let component = match self.directory.component(uuid).await {
            Ok(Some(component)) => Ok(component),
            Ok(None) => Err(ResolveError::UnknownResource(uuid.to_string())),
            Err(err) => {
                warn!(uuid, "failed loading component: {err}");
                Err(ResolveError::Directory(err.to_string()))
            }
        };

        self.components
            .write()
            .await
            .entry(uuid.to_string())
            .or_insert(component)
            .clone()
    }

    /// Projects of an application, in the order they were added to it.
    pub async fn resolve_application(&self, uuid: &str) -> Result<Resolution, ResolveError> {
        if let Some(resolution) = self.applications.read().await.get(uuid) {
            trace!(uuid, "application members already resolved");
            return resolution.clone();
        }

        trace!(uuid, "resolving application members");
        let resolution = match self.directory.application_members(uuid).await {
            Ok(Some(members)) => {
                let mut seen = HashSet::new();
                let members = members
                    .into_iter()
                    .filter(|member| seen.insert(member.clone()))
                    .collect();
                Ok(Resolution::all(members))
            }
            Ok(None) => Err(ResolveError::UnknownResource(uuid.to_string())),
            Err(err) => {
                warn!(uuid, "failed loading application members: {err}");
                Err(ResolveError::Directory(err.to_string()))
            }
        };

        self.applications
            .write()
            .await
            .entry(uuid.to_string())
            .or_insert(resolution)
            .clone()
    }

    /// Projects reachable from a portfolio through any number of nested sub-portfolios.
    ///
    /// Fails closed: a portfolio containing itself or nested deeper than the configured limit
    /// resolves to an error, never to a partial set of projects.
    pub async fn resolve_portfolio(&self, uuid: &str) -> Result<Resolution, ResolveError> {
        if let Some(resolution) = self.portfolios.read().await.get(uuid) {
            trace!(uuid, "portfolio members already resolved");
            return resolution.clone();
        }

        trace!(uuid, "resolving portfolio members");
        let resolution = self.flatten_portfolio(uuid).await;
        if let Err(ResolveError::PortfolioCycle(_) | ResolveError::DepthExceeded(..)) = &resolution
        {
            warn!(uuid, "portfolio hierarchy can't be resolved, treating it as empty");
        }

        self.portfolios
            .write()
            .await
            .entry(uuid.to_string())
            .or_insert(resolution)
            .clone()
    }

    async fn flatten_portfolio(&self, root: &str) -> Result<Resolution, ResolveError> {
        let mut graph = PortfolioGraph::new();
        graph.add_node(PortfolioNode::Portfolio(root.to_string()));

        let mut expanded = HashSet::new();
        let mut queue = VecDeque::from([(root.to_string(), 0)]);
        while let Some((uuid, depth)) = queue.pop_front() {
            if !expanded.insert(uuid.clone()) {
                continue;
            }

            if depth > self.max_portfolio_depth {
                return Err(ResolveError::DepthExceeded(
                    root.to_string(),
                    self.max_portfolio_depth,
                ));
            }

            let members = match self.directory.portfolio_members(&uuid).await {
                Ok(Some(members)) => members,
                Ok(None) => return Err(ResolveError::UnknownResource(uuid)),
                Err(err) => {
                    warn!(uuid, "failed loading portfolio members: {err}");
                    return Err(ResolveError::Directory(err.to_string()));
                }
            };

            for project in members.projects {
                graph.add_member(&uuid, PortfolioNode::Project(project));
            }
            for sub_portfolio in members.sub_portfolios {
                graph.add_member(&uuid, PortfolioNode::Portfolio(sub_portfolio.clone()));
                queue.push_back((sub_portfolio, depth + 1));
            }
        }

        if graph.is_cyclic() {
            return Err(ResolveError::PortfolioCycle(root.to_string()));
        }

        Ok(Resolution::all(graph.leaf_projects(root)))
    }
}

impl<D> Debug for ScopeResolver<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScopeResolver")
            .field("max_portfolio_depth", &self.max_portfolio_depth)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use crate::memory::MemoryStore;
    use crate::resource::Component;
    use crate::test_utils::CountingStore;

    use super::{Aggregation, CompositeResource, ResolveError, ScopeResolver};

    fn nested_portfolios() -> MemoryStore {
        // pf ─┬─ p1
        //     ├─ sa ─┬─ p2
        //     │      └─ sc ── p3
        //     └─ sb ─── sc
        let mut store = MemoryStore::new();
        store.add_portfolio_project("pf", "p1");
        store.add_sub_portfolio("pf", "sa");
        store.add_sub_portfolio("pf", "sb");
        store.add_portfolio_project("sa", "p2");
        store.add_sub_portfolio("sa", "sc");
        store.add_sub_portfolio("sb", "sc");
        store.add_portfolio_project("sc", "p3");
        store
    }

    #[tokio::test]
    async fn components_resolve_to_their_owner() {
        let mut store = MemoryStore::new();
        store.insert_component(Component::project("p1", "one"));
        store.insert_component(Component::branch("b1", "p1", "main"));
        store.insert_component(Component::sub_portfolio("sp", "sub", "pf"));
        let resolver = ScopeResolver::new(store, 25);

        let resolution = resolver
            .resolve(CompositeResource::Component("b1"))
            .await
            .unwrap();
        assert_eq!(resolution.members, vec!["p1"]);
        assert_eq!(resolution.aggregation, Aggregation::Any);

        let resolution = resolver
            .resolve(CompositeResource::Component("sp"))
            .await
            .unwrap();
        assert_eq!(resolution.members, vec!["pf"]);

        let resolution = resolver
            .resolve(CompositeResource::Component("p1"))
            .await
            .unwrap();
        assert_eq!(resolution.members, vec!["p1"]);

        assert_matches!(
            resolver.resolve(CompositeResource::Component("b2")).await,
            Err(ResolveError::UnknownResource(uuid)) if uuid == "b2"
        );

        let branch = Component::branch("b3", "p1", "feature");
        assert_eq!(
            ScopeResolver::<MemoryStore>::resolve_component(&branch).members,
            vec!["p1"]
        );
    }

    #[tokio::test]
    async fn application_members_keep_order_without_duplicates() {
        let mut store = MemoryStore::new();
        store.insert_application("app", ["p2", "p1", "p2", "p3"]);
        let resolver = ScopeResolver::new(store, 25);

        let resolution = resolver.resolve_application("app").await.unwrap();
        assert_eq!(resolution.members, vec!["p2", "p1", "p3"]);
        assert_eq!(resolution.aggregation, Aggregation::All);

        assert_matches!(
            resolver.resolve_application("unknown").await,
            Err(ResolveError::UnknownResource(uuid)) if uuid == "unknown"
        );
    }

    #[tokio::test]
    async fn nested_portfolio_is_flattened() {
        let resolver = ScopeResolver::new(nested_portfolios(), 25);

        let mut members = resolver.resolve_portfolio("pf").await.unwrap().members;
        members.sort();
        // p3 is reachable through both sa and sb but only listed once.
        assert_eq!(members, vec!["p1", "p2", "p3"]);

        let members = resolver.resolve_portfolio("sc").await.unwrap().members;
        assert_eq!(members, vec!["p3"]);
    }

    #[tokio::test]
    async fn portfolio_cycle_fails_closed() {
        let mut store = nested_portfolios();
        store.add_sub_portfolio("sc", "pf");
        let resolver = ScopeResolver::new(store, 25);

        assert_matches!(
            resolver.resolve_portfolio("pf").await,
            Err(ResolveError::PortfolioCycle(uuid)) if uuid == "pf"
        );
        // Sub-portfolio `sa` is also part of the cycle.
        assert_matches!(
            resolver.resolve_portfolio("sa").await,
            Err(ResolveError::PortfolioCycle(_))
        );
    }

    #[tokio::test]
    async fn too_deep_portfolio_fails_closed() {
        let resolver = ScopeResolver::new(nested_portfolios(), 1);
        assert_matches!(
            resolver.resolve_portfolio("pf").await,
            Err(ResolveError::DepthExceeded(uuid, 1)) if uuid == "pf"
        );
        assert!(resolver.resolve_portfolio("sa").await.is_ok());
    }

    #[tokio::test]
    async fn dangling_sub_portfolio_fails_closed() {
        let mut store = MemoryStore::new();
        store.add_portfolio_project("pf", "p1");
        store.add_sub_portfolio("pf", "gone");
        let resolver = ScopeResolver::new(store, 25);

        assert_matches!(
            resolver.resolve_portfolio("pf").await,
            Err(ResolveError::UnknownResource(uuid)) if uuid == "gone"
        );
    }

    #[tokio::test]
    async fn resolutions_are_memoized() {
        let mut store = MemoryStore::new();
        store.insert_application("app", ["p1", "p2"]);
        store.insert_component(Component::project("p1", "one"));
        let store = CountingStore::new(store);
        let resolver = ScopeResolver::new(store.clone(), 25);

        for _ in 0..3 {
            resolver.resolve_application("app").await.unwrap();
            resolver.component("p1").await.unwrap();
            let _ = resolver.component("missing").await;
        }

        assert_eq!(store.directory_lookups(), 3);
    }
}
