// SPDX-License-Identifier: MIT OR Apache-2.0

//! Declarative construction of sessions for tests.
use std::sync::Arc;

use thiserror::Error;

use crate::memory::{MemoryStore, Principal};
use crate::resource::{Component, ComponentKind};
use crate::{
    Actor, ExternalIdentity, GlobalPermission, Grant, GroupRef, Identity, ProjectPermission,
    Session, SessionConfig,
};

/// Login used by [`SessionFixture::log_in_default`].
pub const DEFAULT_LOGIN: &str = "default_login";

/// Session backed by a [`MemoryStore`] for both grants and resources.
pub type MemorySession = Session<MemoryStore, MemoryStore>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigurationError {
    /// The fixture serves a prebuilt session which can't be configured anymore.
    #[error("can't configure a session which was provided prebuilt")]
    ProvidedSession,

    /// Identity-level settings need a logged-in user.
    #[error("can't configure the identity of an anonymous session")]
    NotLoggedIn,
}

#[derive(Debug)]
enum State {
    Anonymous,
    LoggedIn {
        identity: Identity,
        system_administrator: Option<bool>,
    },
    Provided(Arc<MemorySession>),
}

/// Builds sessions from explicit declarations instead of a persistent storage.
///
/// Fixtures start anonymous. Declarations are additive: declaring the same permission twice on a
/// resource has no further effect. Permissions are declared for the current actor, logging in or
/// going anonymous starts over without any. Registered resources are kept.
///
/// ```
/// # use user_session::ProjectPermission;
/// # use user_session::resource::Component;
/// # use user_session::test_utils::SessionFixture;
/// let project = Component::project("proj-1", "my-project");
/// let mut fixture = SessionFixture::new();
/// fixture
///     .log_in("alice")
///     .add_project_permission(ProjectPermission::Admin, [&project])
///     .unwrap();
/// let session = fixture.session();
/// assert_eq!(session.login(), Some("alice"));
/// ```
#[derive(Debug)]
pub struct SessionFixture {
    state: State,
    store: MemoryStore,
    grants: Vec<Grant>,
    browser_session: bool,
    config: SessionConfig,
}

impl Default for SessionFixture {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionFixture {
    pub fn new() -> Self {
        Self {
            state: State::Anonymous,
            store: MemoryStore::new(),
            grants: Vec::new(),
            browser_session: false,
            config: SessionConfig::default(),
        }
    }

    /// Fixture for the anonymous actor.
    pub fn standalone() -> Self {
        Self::new()
    }

    pub fn with_config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    pub fn log_in(&mut self, login: &str) -> &mut Self {
        self.log_in_with(Identity::new(login).with_uuid(format!("{login}-uuid")))
    }

    pub fn log_in_default(&mut self) -> &mut Self {
        self.log_in(DEFAULT_LOGIN)
    }

    pub fn log_in_with(&mut self, identity: Identity) -> &mut Self {
        self.reset(State::LoggedIn {
            identity,
            system_administrator: None,
        })
    }

    pub fn anonymous(&mut self) -> &mut Self {
        self.reset(State::Anonymous)
    }

    /// Serve a prebuilt session. Any further declaration fails.
    pub fn set(&mut self, session: MemorySession) -> &mut Self {
        self.reset(State::Provided(Arc::new(session)))
    }

    pub fn set_system_administrator(&mut self) -> Result<&mut Self, ConfigurationError> {
        self.set_administrator_flag(true)
    }

    pub fn set_non_system_administrator(&mut self) -> Result<&mut Self, ConfigurationError> {
        self.set_administrator_flag(false)
    }

    pub fn set_external_identity(
        &mut self,
        external_identity: ExternalIdentity,
    ) -> Result<&mut Self, ConfigurationError> {
        self.update_identity(|identity| identity.with_external_identity(Some(external_identity)))
    }

    pub fn set_internal_identity(&mut self) -> Result<&mut Self, ConfigurationError> {
        self.update_identity(|identity| identity.with_external_identity(None))
    }

    /// Add the user to the groups, keeping its current ones.
    pub fn set_groups(
        &mut self,
        groups: impl IntoIterator<Item = GroupRef>,
    ) -> Result<&mut Self, ConfigurationError> {
        self.update_identity(|identity| identity.with_groups(groups))
    }

    pub fn set_name(&mut self, name: &str) -> Result<&mut Self, ConfigurationError> {
        self.update_identity(|identity| identity.with_name(Some(name.to_string())))
    }

    pub fn flag_session_as_gui(&mut self) -> Result<&mut Self, ConfigurationError> {
        self.ensure_declarative()?;
        self.browser_session = true;
        Ok(self)
    }

    pub fn register_components<'a>(
        &mut self,
        components: impl IntoIterator<Item = &'a Component>,
    ) -> Result<&mut Self, ConfigurationError> {
        self.ensure_declarative()?;
        for component in components {
            self.store.insert_component(component.clone());
        }
        Ok(self)
    }

    pub fn register_projects<'a>(
        &mut self,
        projects: impl IntoIterator<Item = &'a Component>,
    ) -> Result<&mut Self, ConfigurationError> {
        self.register_components(projects)
    }

    pub fn register_portfolios<'a>(
        &mut self,
        portfolios: impl IntoIterator<Item = &'a Component>,
    ) -> Result<&mut Self, ConfigurationError> {
        self.register_components(portfolios)
    }

    pub fn register_branches<'a>(
        &mut self,
        branches: impl IntoIterator<Item = &'a Component>,
    ) -> Result<&mut Self, ConfigurationError> {
        self.register_components(branches)
    }

    /// Register the application and add the projects to it.
    pub fn register_application<'a>(
        &mut self,
        application: &Component,
        projects: impl IntoIterator<Item = &'a Component>,
    ) -> Result<&mut Self, ConfigurationError> {
        self.ensure_declarative()?;
        self.store.insert_component(application.clone());
        let mut members = Vec::new();
        for project in projects {
            self.store.insert_component(project.clone());
            members.push(project.uuid.clone());
        }
        self.store.insert_application(&application.uuid, members);
        Ok(self)
    }

    /// Register the portfolio and select the projects in it.
    pub fn register_portfolio_projects<'a>(
        &mut self,
        portfolio: &Component,
        projects: impl IntoIterator<Item = &'a Component>,
    ) -> Result<&mut Self, ConfigurationError> {
        self.ensure_declarative()?;
        self.store.insert_component(portfolio.clone());
        for project in projects {
            self.store.insert_component(project.clone());
            self.store.add_portfolio_project(&portfolio.uuid, &project.uuid);
        }
        Ok(self)
    }

    /// Nest a portfolio into another one, registering both.
    pub fn register_sub_portfolio(
        &mut self,
        portfolio: &Component,
        sub_portfolio: &Component,
    ) -> Result<&mut Self, ConfigurationError> {
        self.ensure_declarative()?;
        self.store.insert_component(portfolio.clone());
        self.store.insert_component(sub_portfolio.clone());
        self.store.add_sub_portfolio(&portfolio.uuid, &sub_portfolio.uuid);
        Ok(self)
    }

    /// Register a branch of the project under the given UUID, named after the key of `branch`.
    pub fn add_project_branch_mapping(
        &mut self,
        project: &str,
        branch: &Component,
    ) -> Result<&mut Self, ConfigurationError> {
        self.ensure_declarative()?;
        let name = match &branch.kind {
            ComponentKind::Branch { name, .. } => name.clone(),
            _ => branch.key.clone(),
        };
        self.store
            .insert_component(Component::branch(branch.uuid.clone(), project, name));
        Ok(self)
    }

    /// Grant a permission on the projects to the current actor. Grants on branches and
    /// sub-portfolios go to the entity owning them.
    pub fn add_project_permission<'a>(
        &mut self,
        permission: ProjectPermission,
        projects: impl IntoIterator<Item = &'a Component>,
    ) -> Result<&mut Self, ConfigurationError> {
        self.ensure_declarative()?;
        for project in projects {
            self.store.insert_component(project.clone());
            self.grants
                .push(Grant::component(permission, project.owner_uuid()));
        }
        Ok(self)
    }

    pub fn add_portfolio_permission<'a>(
        &mut self,
        permission: ProjectPermission,
        portfolios: impl IntoIterator<Item = &'a Component>,
    ) -> Result<&mut Self, ConfigurationError> {
        self.add_project_permission(permission, portfolios)
    }

    /// Grant a global permission to the current actor.
    pub fn add_permission(
        &mut self,
        permission: GlobalPermission,
    ) -> Result<&mut Self, ConfigurationError> {
        self.ensure_declarative()?;
        self.grants.push(Grant::global(permission));
        Ok(self)
    }

    /// Store holding the registered resources, without any of the declared permissions.
    pub fn store(&self) -> &MemoryStore {
        &self.store
    }

    /// Build a new session from the declarations, or hand out the prebuilt one.
    pub fn session(&self) -> Arc<MemorySession> {
        let (actor, system_administrator) = match &self.state {
            State::Provided(session) => return session.clone(),
            State::Anonymous => (Actor::Anonymous, None),
            State::LoggedIn {
                identity,
                system_administrator,
            } => (Actor::Authenticated(identity.clone()), *system_administrator),
        };

        let mut store = self.store.clone();
        for grant in &self.grants {
            store.insert_grant(Principal::of(&actor), grant.clone());
        }

        let mut session = Session::new(actor, store.clone(), store, self.config.clone())
            .with_browser_session(self.browser_session);
        if let Some(system_administrator) = system_administrator {
            session = session.with_system_administrator(system_administrator);
        }
        Arc::new(session)
    }

    fn reset(&mut self, state: State) -> &mut Self {
        self.state = state;
        self.grants.clear();
        self.browser_session = false;
        self
    }

    fn ensure_declarative(&self) -> Result<(), ConfigurationError> {
        match self.state {
            State::Provided(_) => Err(ConfigurationError::ProvidedSession),
            State::Anonymous | State::LoggedIn { .. } => Ok(()),
        }
    }

    fn set_administrator_flag(&mut self, flag: bool) -> Result<&mut Self, ConfigurationError> {
        match &mut self.state {
            State::Provided(_) => return Err(ConfigurationError::ProvidedSession),
            State::Anonymous => return Err(ConfigurationError::NotLoggedIn),
            State::LoggedIn {
                system_administrator,
                ..
            } => *system_administrator = Some(flag),
        }
        Ok(self)
    }

    fn update_identity(
        &mut self,
        update: impl FnOnce(Identity) -> Identity,
    ) -> Result<&mut Self, ConfigurationError> {
        let identity = match &mut self.state {
            State::Provided(_) => return Err(ConfigurationError::ProvidedSession),
            State::Anonymous => return Err(ConfigurationError::NotLoggedIn),
            State::LoggedIn { identity, .. } => identity,
        };
        *identity = update(identity.clone());
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use crate::memory::MemoryStore;
    use crate::resource::Component;
    use crate::traits::ResourceDirectory;
    use crate::{
        Actor, ExternalIdentity, GlobalPermission, GroupRef, Identity, IdentityProvider,
        ProjectPermission, Session, SessionConfig,
    };

    use super::{ConfigurationError, DEFAULT_LOGIN, SessionFixture};

    #[test]
    fn identity_settings_need_a_logged_in_user() {
        let mut fixture = SessionFixture::new();
        assert_matches!(
            fixture.set_system_administrator(),
            Err(ConfigurationError::NotLoggedIn)
        );
        assert_matches!(fixture.set_name("Alice"), Err(ConfigurationError::NotLoggedIn));
        assert_matches!(
            fixture.set_groups([GroupRef::new("g1", "devs")]),
            Err(ConfigurationError::NotLoggedIn)
        );

        // Resources and permissions can be declared for anonymous actors.
        let project = Component::project("p1", "one");
        assert!(
            fixture
                .add_project_permission(ProjectPermission::User, [&project])
                .is_ok()
        );
    }

    #[test]
    fn provided_session_rejects_declarations() {
        let session = Session::new(
            Actor::Authenticated(Identity::new("bob")),
            MemoryStore::new(),
            MemoryStore::new(),
            SessionConfig::default(),
        );
        let mut fixture = SessionFixture::new();
        fixture.set(session);

        let project = Component::project("p1", "one");
        assert_matches!(fixture.set_name("Bob"), Err(ConfigurationError::ProvidedSession));
        assert_matches!(
            fixture.set_system_administrator(),
            Err(ConfigurationError::ProvidedSession)
        );
        assert_matches!(
            fixture.register_projects([&project]),
            Err(ConfigurationError::ProvidedSession)
        );
        assert_matches!(
            fixture.add_permission(GlobalPermission::Scan),
            Err(ConfigurationError::ProvidedSession)
        );
        assert_eq!(fixture.session().login(), Some("bob"));

        // Logging in again returns to declarative configuration.
        fixture.log_in_default();
        assert!(fixture.set_name("Default").is_ok());
        assert_eq!(fixture.session().login(), Some(DEFAULT_LOGIN));
    }

    #[test]
    fn identity_settings_are_reflected_by_the_session() {
        let github = ExternalIdentity::new(IdentityProvider::Github, "1234", "alice-gh");
        let mut fixture = SessionFixture::new();
        fixture
            .log_in("alice")
            .set_name("Alice")
            .and_then(|fixture| fixture.set_groups([GroupRef::new("g1", "devs")]))
            .and_then(|fixture| fixture.set_groups([GroupRef::new("g2", "ops")]))
            .and_then(|fixture| fixture.set_external_identity(github.clone()))
            .and_then(|fixture| fixture.flag_session_as_gui())
            .unwrap();

        let session = fixture.session();
        assert_eq!(session.login(), Some("alice"));
        assert_eq!(session.uuid(), Some("alice-uuid"));
        assert_eq!(session.name(), Some("Alice"));
        assert_eq!(session.groups().len(), 2);
        assert_eq!(session.external_identity(), Some(&github));
        assert_eq!(session.identity_provider(), Some(IdentityProvider::Github));
        assert!(session.is_authenticated_browser_session());

        fixture.set_internal_identity().unwrap();
        let session = fixture.session();
        assert_eq!(session.external_identity(), None);
        assert_eq!(session.identity_provider(), Some(IdentityProvider::Internal));
    }

    #[tokio::test]
    async fn logging_in_starts_over_without_permissions() {
        let project = Component::project("p1", "one");
        let mut fixture = SessionFixture::new();
        fixture
            .log_in("alice")
            .add_project_permission(ProjectPermission::Admin, [&project])
            .and_then(|fixture| fixture.add_permission(GlobalPermission::Scan))
            .unwrap();
        let session = fixture.session();
        assert!(session.has_permission(GlobalPermission::Scan).await);
        assert!(
            session
                .has_component_permission(ProjectPermission::Admin, &project)
                .await
        );

        fixture.log_in("bob");
        let session = fixture.session();
        assert!(!session.has_permission(GlobalPermission::Scan).await);
        assert!(
            !session
                .has_component_permission(ProjectPermission::Admin, &project)
                .await
        );
        // The project is still registered.
        assert!(
            !session
                .has_component_uuid_permission(ProjectPermission::Admin, "p1")
                .await
        );
        assert!(fixture.store().component("p1").await.unwrap().is_some());
    }
}
