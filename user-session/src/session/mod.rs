// SPDX-License-Identifier: MIT OR Apache-2.0

//! The request-scoped user session.
//!
//! Every operation comes in two forms. `has_*` answers with a boolean and never fails: resources
//! which can't be resolved and failing lookups count as "not permitted". `check_*` returns the
//! session itself to allow chaining further checks, or an [`AuthorizationError`] which the
//! transport layer translates into a 401 or 403 answer.
use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt::{Debug, Display};

use thiserror::Error;
use tokio::sync::{OnceCell, RwLock};
use tracing::{Instrument, Span, debug, debug_span, trace, warn};

use crate::resolver::{CompositeResource, Resolution, ScopeResolver};
use crate::resource::{Component, Entity};
use crate::traits::{PermissionGrantSource, ResourceDirectory};
use crate::{
    Actor, ExternalIdentity, GlobalPermission, GroupRef, IdentityProvider, Permission,
    PermissionScope, ProjectPermission, SessionConfig,
};

mod filter;

static NO_GROUPS: BTreeSet<GroupRef> = BTreeSet::new();

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum AuthorizationError {
    /// The check requires an authenticated user but the session is anonymous.
    #[error("authentication is required")]
    NotLoggedIn,

    #[error("insufficient privileges")]
    InsufficientPrivileges,

    /// The user may not access this particular resource.
    #[error("you don't have access to this resource")]
    ResourceForbidden,
}

/// Binds an actor to its permissions for the duration of one request.
///
/// Sessions are configured entirely at construction time and are read-only afterwards. Grants
/// and memberships are looked up lazily and memoized, a session issues at most one lookup per
/// distinct resource and answers repeated checks identically.
pub struct Session<G, D> {
    actor: Actor,
    grants: G,
    resolver: ScopeResolver<D>,
    config: SessionConfig,

    /// Declared system-administrator status. Derived from the global grants when not declared.
    system_administrator: Option<bool>,
    browser_session: bool,

    global_grants: OnceCell<HashSet<GlobalPermission>>,
    entity_grants: RwLock<HashMap<String, HashSet<ProjectPermission>>>,
    span: Span,
}

impl<G, D> Session<G, D>
where
    G: PermissionGrantSource,
    D: ResourceDirectory,
{
    pub fn new(actor: Actor, grants: G, directory: D, config: SessionConfig) -> Self {
        let span = debug_span!("session", actor = %actor);
        Self {
            actor,
            grants,
            resolver: ScopeResolver::new(directory, config.max_portfolio_depth),
            config,
            system_administrator: None,
            browser_session: false,
            global_grants: OnceCell::new(),
            entity_grants: RwLock::default(),
            span,
        }
    }

    /// Declare the system-administrator status instead of deriving it from the global grants.
    /// Ignored for anonymous sessions, which are never administrators.
    pub fn with_system_administrator(mut self, system_administrator: bool) -> Self {
        self.system_administrator = Some(system_administrator);
        self
    }

    /// Mark the session as originating from an interactive browser login, as opposed to a token
    /// used by an API client.
    pub fn with_browser_session(mut self, browser_session: bool) -> Self {
        self.browser_session = browser_session;
        self
    }

    pub fn actor(&self) -> &Actor {
        &self.actor
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn login(&self) -> Option<&str> {
        self.actor.login()
    }

    pub fn uuid(&self) -> Option<&str> {
        self.actor.identity().and_then(|identity| identity.uuid())
    }

    pub fn name(&self) -> Option<&str> {
        self.actor.identity().and_then(|identity| identity.name())
    }

    /// Groups the user is member of, empty for anonymous sessions.
    pub fn groups(&self) -> &BTreeSet<GroupRef> {
        match self.actor.identity() {
            Some(identity) => identity.groups(),
            None => &NO_GROUPS,
        }
    }

    pub fn identity_provider(&self) -> Option<IdentityProvider> {
        self.actor.identity().map(|identity| identity.identity_provider())
    }

    pub fn external_identity(&self) -> Option<&ExternalIdentity> {
        self.actor
            .identity()
            .and_then(|identity| identity.external_identity())
    }

    pub fn last_connection_date(&self) -> Option<u64> {
        self.actor
            .identity()
            .and_then(|identity| identity.last_connection_date())
    }

    pub fn is_logged_in(&self) -> bool {
        self.actor.is_logged_in()
    }

    pub fn check_logged_in(&self) -> Result<&Self, AuthorizationError> {
        if self.is_logged_in() {
            Ok(self)
        } else {
            Err(AuthorizationError::NotLoggedIn)
        }
    }

    /// Return `true` if the session belongs to a user whose account hasn't been deactivated.
    pub fn is_active(&self) -> bool {
        self.actor
            .identity()
            .is_some_and(|identity| identity.is_active())
    }

    pub fn is_authenticated_browser_session(&self) -> bool {
        self.is_logged_in() && self.browser_session
    }

    pub fn should_reset_password(&self) -> bool {
        self.actor
            .identity()
            .is_some_and(|identity| identity.should_reset_password())
    }

    pub async fn is_system_administrator(&self) -> bool {
        if !self.is_logged_in() {
            return false;
        }
        match self.system_administrator {
            Some(system_administrator) => system_administrator,
            None => self
                .global_grants()
                .await
                .contains(&self.config.administrator_permission),
        }
    }

    pub async fn check_is_system_administrator(&self) -> Result<&Self, AuthorizationError> {
        let granted = self.is_system_administrator().await;
        self.check(granted, "system administrator")
    }

    pub async fn has_permission(&self, permission: GlobalPermission) -> bool {
        self.is_system_administrator().await || self.global_grants().await.contains(&permission)
    }

    pub async fn check_permission(
        &self,
        permission: GlobalPermission,
    ) -> Result<&Self, AuthorizationError> {
        let granted = self.has_permission(permission).await;
        self.check(granted, permission)
    }

    /// Check a permission on a component. Branches are checked against their project and
    /// sub-portfolios against their root portfolio.
    pub async fn has_component_permission(
        &self,
        permission: ProjectPermission,
        component: &Component,
    ) -> bool {
        let resolution = ScopeResolver::<D>::resolve_component(component);
        self.has_resolved_permission(permission, &resolution).await
    }

    pub async fn check_component_permission(
        &self,
        permission: ProjectPermission,
        component: &Component,
    ) -> Result<&Self, AuthorizationError> {
        let granted = self.has_component_permission(permission, component).await;
        self.check(granted, permission)
    }

    /// Check a permission on an entity, addressed by anything entity-shaped including its plain
    /// UUID.
    ///
    /// Values which aren't loaded components are looked up first, an unknown UUID is never
    /// permitted. Gives the same answer as [`Session::has_component_permission`] for the same
    /// component.
    pub async fn has_entity_permission<E>(&self, permission: ProjectPermission, entity: &E) -> bool
    where
        E: Entity + ?Sized,
    {
        match entity.loaded_component() {
            Some(component) => self.has_component_permission(permission, component).await,
            None => {
                self.has_component_uuid_permission(permission, entity.entity_uuid())
                    .await
            }
        }
    }

    pub async fn check_entity_permission<E>(
        &self,
        permission: ProjectPermission,
        entity: &E,
    ) -> Result<&Self, AuthorizationError>
    where
        E: Entity + ?Sized,
    {
        let granted = self.has_entity_permission(permission, entity).await;
        self.check(granted, permission)
    }

    /// Like [`Session::check_entity_permission`] but authenticated users lacking the permission
    /// are told the resource is forbidden to them.
    pub async fn check_entity_permission_or_forbidden<E>(
        &self,
        permission: ProjectPermission,
        entity: &E,
    ) -> Result<&Self, AuthorizationError>
    where
        E: Entity + ?Sized,
    {
        if self.has_entity_permission(permission, entity).await {
            return Ok(self);
        }
        if !self.is_logged_in() {
            return Err(AuthorizationError::NotLoggedIn);
        }
        debug!(parent: &self.span, %permission, entity = entity.entity_uuid(), "resource forbidden");
        Err(AuthorizationError::ResourceForbidden)
    }

    /// Check a permission on a component which is only known by its UUID. Unknown components are
    /// never permitted.
    pub async fn has_component_uuid_permission(
        &self,
        permission: ProjectPermission,
        uuid: &str,
    ) -> bool {
        self.has_composite_permission(permission, CompositeResource::Component(uuid))
            .await
    }

    pub async fn check_component_uuid_permission(
        &self,
        permission: ProjectPermission,
        uuid: &str,
    ) -> Result<&Self, AuthorizationError> {
        let granted = self.has_component_uuid_permission(permission, uuid).await;
        self.check(granted, permission)
    }

    /// Return `true` if every project of the application satisfies the permission.
    ///
    /// An application without projects satisfies every permission, an unknown application none.
    pub async fn has_child_projects_permission<E>(
        &self,
        permission: ProjectPermission,
        application: &E,
    ) -> bool
    where
        E: Entity + ?Sized,
    {
        let resource = CompositeResource::Application(application.entity_uuid());
        self.has_composite_permission(permission, resource).await
    }

    pub async fn check_child_projects_permission<E>(
        &self,
        permission: ProjectPermission,
        application: &E,
    ) -> Result<&Self, AuthorizationError>
    where
        E: Entity + ?Sized,
    {
        let granted = self
            .has_child_projects_permission(permission, application)
            .await;
        self.check(granted, permission)
    }

    /// Return `true` if every project reachable from the portfolio, through any of its nested
    /// sub-portfolios, satisfies the permission.
    ///
    /// Portfolios which contain themselves satisfy no permission.
    pub async fn has_portfolio_child_projects_permission<E>(
        &self,
        permission: ProjectPermission,
        portfolio: &E,
    ) -> bool
    where
        E: Entity + ?Sized,
    {
        let resource = CompositeResource::Portfolio(portfolio.entity_uuid());
        self.has_composite_permission(permission, resource).await
    }

    async fn has_composite_permission(
        &self,
        permission: ProjectPermission,
        resource: CompositeResource<'_>,
    ) -> bool {
        match self
            .resolver
            .resolve(resource)
            .instrument(self.span.clone())
            .await
        {
            Ok(resolution) => self.has_resolved_permission(permission, &resolution).await,
            Err(err) => {
                trace!(parent: &self.span, ?resource, "resource not resolved: {err}");
                false
            }
        }
    }

    /// Every check on a resource ends here, whatever way the resource was addressed.
    async fn has_resolved_permission(
        &self,
        permission: ProjectPermission,
        resolution: &Resolution,
    ) -> bool {
        let granted = self
            .entities_with_permission(permission, &resolution.members)
            .await;
        resolution.aggregate(|uuid| granted.contains(uuid))
    }

    fn check(
        &self,
        granted: bool,
        requirement: impl Display,
    ) -> Result<&Self, AuthorizationError> {
        if granted {
            return Ok(self);
        }
        debug!(parent: &self.span, %requirement, "permission check failed");
        if self.is_logged_in() {
            Err(AuthorizationError::InsufficientPrivileges)
        } else {
            Err(AuthorizationError::NotLoggedIn)
        }
    }

    async fn global_grants(&self) -> &HashSet<GlobalPermission> {
        self.global_grants
            .get_or_init(|| async {
                trace!("loading global grants");
                match self
                    .grants
                    .grants_for(&self.actor, PermissionScope::Global, None)
                    .await
                {
                    Ok(permissions) => permissions
                        .into_iter()
                        .filter_map(|permission| match permission {
                            Permission::Global(permission) => Some(permission),
                            Permission::Project(_) => None,
                        })
                        .collect(),
                    Err(err) => {
                        warn!("failed loading global grants: {err}");
                        HashSet::new()
                    }
                }
            }
            .instrument(self.span.clone()))
            .await
    }

    async fn entity_grants(&self, uuid: &str) -> HashSet<ProjectPermission> {
        if let Some(permissions) = self.entity_grants.read().await.get(uuid) {
            trace!(parent: &self.span, uuid, "entity grants already loaded");
            return permissions.clone();
        }

        let permissions = match self
            .grants
            .grants_for(&self.actor, PermissionScope::Component, Some(uuid))
            .instrument(self.span.clone())
            .await
        {
            Ok(permissions) => project_permissions(permissions),
            Err(err) => {
                warn!(parent: &self.span, uuid, "failed loading entity grants: {err}");
                HashSet::new()
            }
        };
        trace!(parent: &self.span, uuid, ?permissions, "entity grants loaded");

        self.entity_grants
            .write()
            .await
            .entry(uuid.to_string())
            .or_insert(permissions)
            .clone()
    }
}

fn project_permissions(permissions: HashSet<Permission>) -> HashSet<ProjectPermission> {
    permissions
        .into_iter()
        .filter_map(|permission| match permission {
            Permission::Project(permission) => Some(permission),
            Permission::Global(_) => None,
        })
        .collect()
}

impl<G, D> Debug for Session<G, D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("actor", &self.actor)
            .field("config", &self.config)
            .field("system_administrator", &self.system_administrator)
            .field("browser_session", &self.browser_session)
            .finish_non_exhaustive()
    }
}
