// SPDX-License-Identifier: MIT OR Apache-2.0

//! Resources permissions are checked against.
//!
//! Permissions are granted on _entities_: top-level projects, portfolios and applications. Other
//! components are owned by an entity and inherit its permissions. A branch is owned by its
//! project and a sub-portfolio by the root portfolio it is nested in.
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Kind of a component, with the owner for components which are not entities themselves.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ComponentKind {
    Project,
    Application,
    Portfolio,
    SubPortfolio { root: String },
    Branch { project: String, name: String },
}

/// A loaded component.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Component {
    pub uuid: String,
    pub key: String,
    pub kind: ComponentKind,
}

impl Component {
    pub fn project(uuid: impl Into<String>, key: impl Into<String>) -> Self {
        Self::new(uuid, key, ComponentKind::Project)
    }

    pub fn application(uuid: impl Into<String>, key: impl Into<String>) -> Self {
        Self::new(uuid, key, ComponentKind::Application)
    }

    pub fn portfolio(uuid: impl Into<String>, key: impl Into<String>) -> Self {
        Self::new(uuid, key, ComponentKind::Portfolio)
    }

    pub fn sub_portfolio(
        uuid: impl Into<String>,
        key: impl Into<String>,
        root: impl Into<String>,
    ) -> Self {
        Self::new(uuid, key, ComponentKind::SubPortfolio { root: root.into() })
    }

    pub fn branch(
        uuid: impl Into<String>,
        project: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        let name = name.into();
        Self::new(
            uuid,
            name.clone(),
            ComponentKind::Branch {
                project: project.into(),
                name,
            },
        )
    }

    fn new(uuid: impl Into<String>, key: impl Into<String>, kind: ComponentKind) -> Self {
        Self {
            uuid: uuid.into(),
            key: key.into(),
            kind,
        }
    }

    /// UUID of the entity whose permissions apply to this component.
    pub fn owner_uuid(&self) -> &str {
        match &self.kind {
            ComponentKind::Branch { project, .. } => project,
            ComponentKind::SubPortfolio { root } => root,
            ComponentKind::Project | ComponentKind::Application | ComponentKind::Portfolio => {
                &self.uuid
            }
        }
    }

    /// Return `true` if permissions can be granted on this component directly.
    pub fn is_entity(&self) -> bool {
        matches!(
            self.kind,
            ComponentKind::Project | ComponentKind::Application | ComponentKind::Portfolio
        )
    }

    pub fn is_branch(&self) -> bool {
        matches!(self.kind, ComponentKind::Branch { .. })
    }
}

/// Anything addressing a component by its UUID: a loaded component, a reference or a plain UUID.
///
/// Values which are not loaded components get resolved through the resource directory before
/// any permission is checked on them.
pub trait Entity {
    fn entity_uuid(&self) -> &str;

    /// The component itself, when it is already loaded.
    fn loaded_component(&self) -> Option<&Component> {
        None
    }
}

impl Entity for Component {
    fn entity_uuid(&self) -> &str {
        &self.uuid
    }

    fn loaded_component(&self) -> Option<&Component> {
        Some(self)
    }
}

impl Entity for EntityRef {
    fn entity_uuid(&self) -> &str {
        &self.uuid
    }
}

impl Entity for str {
    fn entity_uuid(&self) -> &str {
        self
    }
}

impl Entity for String {
    fn entity_uuid(&self) -> &str {
        self
    }
}

impl<T: Entity + ?Sized> Entity for &T {
    fn entity_uuid(&self) -> &str {
        (**self).entity_uuid()
    }

    fn loaded_component(&self) -> Option<&Component> {
        (**self).loaded_component()
    }
}

/// Lightweight reference to an entity.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct EntityRef {
    pub uuid: String,
    pub key: String,
}

impl EntityRef {
    pub fn new(uuid: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            uuid: uuid.into(),
            key: key.into(),
        }
    }
}

/// Direct members of a portfolio.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PortfolioMembers {
    /// Projects selected directly by the portfolio.
    pub projects: Vec<String>,

    /// Sub-portfolios nested directly in the portfolio.
    pub sub_portfolios: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::{Component, Entity, EntityRef};

    #[test]
    fn owners() {
        assert_eq!(Component::project("p1", "proj").owner_uuid(), "p1");
        assert_eq!(Component::branch("b1", "p1", "feature/x").owner_uuid(), "p1");
        assert_eq!(Component::sub_portfolio("sp1", "sub", "pf1").owner_uuid(), "pf1");
        assert_eq!(Component::application("a1", "app").entity_uuid(), "a1");
    }

    #[test]
    fn only_components_are_loaded() {
        let branch = Component::branch("b1", "p1", "main");
        assert_eq!(branch.entity_uuid(), "b1");
        assert_eq!((&branch).loaded_component(), Some(&branch));
        assert_eq!("b1".loaded_component(), None);
        assert_eq!(EntityRef::new("b1", "main").loaded_component(), None);
    }

    #[test]
    fn only_top_level_components_are_entities() {
        assert!(Component::portfolio("pf1", "pf").is_entity());
        assert!(!Component::branch("b1", "p1", "main").is_entity());
        assert!(Component::branch("b1", "p1", "main").is_branch());
        assert!(!Component::sub_portfolio("sp1", "sub", "pf1").is_entity());
    }
}
