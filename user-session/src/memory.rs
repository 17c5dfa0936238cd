// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory grant source and resource directory.
//!
//! Backs declaratively configured sessions: grants and resource relations are declared up-front
//! and then served to a [`Session`](crate::Session) like any persistent storage would.
use std::collections::{HashMap, HashSet};
use std::convert::Infallible;

use tracing::warn;

use crate::resource::{Component, ComponentKind, PortfolioMembers};
use crate::traits::{PermissionGrantSource, ResourceDirectory};
use crate::{Actor, GlobalPermission, Grant, Permission, PermissionScope, ProjectPermission};

/// Holder of a grant.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Principal {
    /// Every actor, anonymous or not.
    Anyone,

    /// An authenticated user, by login.
    User(String),

    /// Members of a group, by group UUID.
    Group(String),
}

impl Principal {
    /// Principal receiving the grants declared for the given actor. Grants declared for anonymous
    /// actors are held by `Anyone`.
    pub fn of(actor: &Actor) -> Self {
        match actor {
            Actor::Anonymous => Principal::Anyone,
            Actor::Authenticated(identity) => Principal::User(identity.login().to_string()),
        }
    }

    /// All principals whose grants apply to the actor.
    fn applying_to(actor: &Actor) -> Vec<Self> {
        let mut principals = vec![Principal::Anyone];
        if let Actor::Authenticated(identity) = actor {
            principals.push(Principal::User(identity.login().to_string()));
            principals.extend(
                identity
                    .groups()
                    .iter()
                    .map(|group| Principal::Group(group.uuid.clone())),
            );
        }
        principals
    }
}

#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    global_grants: HashMap<Principal, HashSet<GlobalPermission>>,
    component_grants: HashMap<Principal, HashMap<String, HashSet<ProjectPermission>>>,
    components: HashMap<String, Component>,
    applications: HashMap<String, Vec<String>>,
    portfolios: HashMap<String, PortfolioMembers>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn grant_global(&mut self, actor: &Actor, permission: GlobalPermission) {
        self.insert_grant(Principal::of(actor), Grant::global(permission));
    }

    pub fn grant_global_to(&mut self, principal: Principal, permission: GlobalPermission) {
        self.insert_grant(principal, Grant::global(permission));
    }

    /// Grant a permission on an entity. Granting the same permission twice has no effect.
    pub fn grant_project(&mut self, actor: &Actor, uuid: &str, permission: ProjectPermission) {
        self.insert_grant(Principal::of(actor), Grant::component(permission, uuid));
    }

    pub fn grant_project_to(
        &mut self,
        principal: Principal,
        uuid: &str,
        permission: ProjectPermission,
    ) {
        self.insert_grant(principal, Grant::component(permission, uuid));
    }

    /// Record a grant held by the principal.
    ///
    /// Entity and branch grants are stored as component grants. Grants mixing a global
    /// permission with a resource scope, or missing their resource, are ignored.
    pub fn insert_grant(&mut self, principal: Principal, grant: Grant) {
        match (grant.scope.storage_scope(), grant.permission, grant.resource) {
            (PermissionScope::Global, Permission::Global(permission), _) => {
                self.global_grants
                    .entry(principal)
                    .or_default()
                    .insert(permission);
            }
            (PermissionScope::Component, Permission::Project(permission), Some(uuid)) => {
                self.component_grants
                    .entry(principal)
                    .or_default()
                    .entry(uuid)
                    .or_default()
                    .insert(permission);
            }
            (scope, permission, _) => {
                warn!(?scope, %permission, "ignoring malformed grant");
            }
        }
    }

    /// Register a component. Registering a portfolio or an application also makes it known as a
    /// composite resource without members.
    pub fn insert_component(&mut self, component: Component) {
        match &component.kind {
            ComponentKind::Application => {
                self.applications.entry(component.uuid.clone()).or_default();
            }
            ComponentKind::Portfolio | ComponentKind::SubPortfolio { .. } => {
                self.portfolios.entry(component.uuid.clone()).or_default();
            }
            ComponentKind::Project | ComponentKind::Branch { .. } => (),
        }
        self.components.insert(component.uuid.clone(), component);
    }

    /// Add projects to an application, keeping the ones it already has.
    pub fn insert_application<I, S>(&mut self, uuid: &str, projects: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.applications
            .entry(uuid.to_string())
            .or_default()
            .extend(projects.into_iter().map(Into::into));
    }

    pub fn add_portfolio_project(&mut self, portfolio: &str, project: &str) {
        self.portfolios
            .entry(portfolio.to_string())
            .or_default()
            .projects
            .push(project.to_string());
    }

    /// Nest a portfolio into another one. The nested portfolio is not registered by this.
    pub fn add_sub_portfolio(&mut self, portfolio: &str, sub_portfolio: &str) {
        self.portfolios
            .entry(portfolio.to_string())
            .or_default()
            .sub_portfolios
            .push(sub_portfolio.to_string());
    }

    fn component_permissions(&self, actor: &Actor, uuid: &str) -> HashSet<Permission> {
        Principal::applying_to(actor)
            .iter()
            .filter_map(|principal| self.component_grants.get(principal))
            .filter_map(|grants| grants.get(uuid))
            .flatten()
            .map(|permission| Permission::Project(*permission))
            .collect()
    }

    fn global_permissions(&self, actor: &Actor) -> HashSet<Permission> {
        Principal::applying_to(actor)
            .iter()
            .filter_map(|principal| self.global_grants.get(principal))
            .flatten()
            .map(|permission| Permission::Global(*permission))
            .collect()
    }
}

impl PermissionGrantSource for MemoryStore {
    type Error = Infallible;

    async fn grants_for(
        &self,
        actor: &Actor,
        scope: PermissionScope,
        resource: Option<&str>,
    ) -> Result<HashSet<Permission>, Infallible> {
        let permissions = match (scope.storage_scope(), resource) {
            (PermissionScope::Global, _) => self.global_permissions(actor),
            (_, Some(uuid)) => self.component_permissions(actor, uuid),
            (_, None) => HashSet::new(),
        };
        Ok(permissions)
    }

    async fn grants_for_many(
        &self,
        actor: &Actor,
        _scope: PermissionScope,
        resources: &[String],
    ) -> Result<HashMap<String, HashSet<Permission>>, Infallible> {
        Ok(resources
            .iter()
            .map(|uuid| (uuid.clone(), self.component_permissions(actor, uuid)))
            .filter(|(_, permissions)| !permissions.is_empty())
            .collect())
    }
}

impl ResourceDirectory for MemoryStore {
    type Error = Infallible;

    async fn component(&self, uuid: &str) -> Result<Option<Component>, Infallible> {
        Ok(self.components.get(uuid).cloned())
    }

    async fn application_members(&self, uuid: &str) -> Result<Option<Vec<String>>, Infallible> {
        Ok(self.applications.get(uuid).cloned())
    }

    async fn portfolio_members(&self, uuid: &str) -> Result<Option<PortfolioMembers>, Infallible> {
        Ok(self.portfolios.get(uuid).cloned())
    }
}
