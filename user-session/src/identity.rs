// SPDX-License-Identifier: MIT OR Apache-2.0

use std::collections::BTreeSet;
use std::fmt::Display;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Reference to a group an authenticated user is a member of.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct GroupRef {
    pub uuid: String,
    pub name: String,
}

impl GroupRef {
    pub fn new(uuid: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            uuid: uuid.into(),
            name: name.into(),
        }
    }
}

/// Identity provider which authenticated a user.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum IdentityProvider {
    /// Local account, authenticated with a password or token issued by this system.
    Internal,
    Github,
    Gitlab,
    Bitbucket,
    Ldap,
    Saml,
    /// Any other provider, identified by its key.
    Other(String),
}

impl IdentityProvider {
    /// Stable key of the provider.
    pub fn key(&self) -> &str {
        match self {
            IdentityProvider::Internal => "internal",
            IdentityProvider::Github => "github",
            IdentityProvider::Gitlab => "gitlab",
            IdentityProvider::Bitbucket => "bitbucket",
            IdentityProvider::Ldap => "ldap",
            IdentityProvider::Saml => "saml",
            IdentityProvider::Other(key) => key,
        }
    }

    /// Map a provider key back to a provider, unknown keys become `Other`.
    pub fn from_key(key: &str) -> Self {
        match key {
            "internal" => IdentityProvider::Internal,
            "github" => IdentityProvider::Github,
            "gitlab" => IdentityProvider::Gitlab,
            "bitbucket" => IdentityProvider::Bitbucket,
            "ldap" => IdentityProvider::Ldap,
            "saml" => IdentityProvider::Saml,
            other => IdentityProvider::Other(other.to_string()),
        }
    }
}

impl Display for IdentityProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.key())
    }
}

/// Identity of a user at a federated identity provider.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ExternalIdentity {
    pub provider: IdentityProvider,

    /// Identifier of the user at the provider.
    pub id: String,

    /// Login of the user at the provider.
    pub login: String,
}

impl ExternalIdentity {
    pub fn new(provider: IdentityProvider, id: impl Into<String>, login: impl Into<String>) -> Self {
        Self {
            provider,
            id: id.into(),
            login: login.into(),
        }
    }
}

/// Immutable description of an authenticated user.
///
/// An identity says nothing about what the user is allowed to do, permissions are resolved by the
/// session.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Identity {
    login: String,
    uuid: Option<String>,
    name: Option<String>,
    groups: BTreeSet<GroupRef>,
    external_identity: Option<ExternalIdentity>,
    last_connection_date: Option<u64>,
    active: bool,
    reset_password: bool,
}

impl Identity {
    /// Active, internal identity with the given login.
    pub fn new(login: impl Into<String>) -> Self {
        Self {
            login: login.into(),
            uuid: None,
            name: None,
            groups: BTreeSet::new(),
            external_identity: None,
            last_connection_date: None,
            active: true,
            reset_password: false,
        }
    }

    pub fn with_uuid(mut self, uuid: impl Into<String>) -> Self {
        self.uuid = Some(uuid.into());
        self
    }

    pub fn with_name(mut self, name: Option<String>) -> Self {
        self.name = name;
        self
    }

    /// Add groups to the ones the user is already member of.
    pub fn with_groups(mut self, groups: impl IntoIterator<Item = GroupRef>) -> Self {
        self.groups.extend(groups);
        self
    }

    /// Mark the user as authenticated by a federated identity provider. `None` turns the identity
    /// back into an internal account.
    pub fn with_external_identity(mut self, external_identity: Option<ExternalIdentity>) -> Self {
        self.external_identity = external_identity;
        self
    }

    /// Time of the last connection of the user's IDE plugin, in milliseconds since the Unix epoch.
    pub fn with_last_connection_date(mut self, timestamp: u64) -> Self {
        self.last_connection_date = Some(timestamp);
        self
    }

    pub fn with_active(mut self, active: bool) -> Self {
        self.active = active;
        self
    }

    pub fn with_reset_password(mut self, reset_password: bool) -> Self {
        self.reset_password = reset_password;
        self
    }

    pub fn login(&self) -> &str {
        &self.login
    }

    pub fn uuid(&self) -> Option<&str> {
        self.uuid.as_deref()
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn groups(&self) -> &BTreeSet<GroupRef> {
        &self.groups
    }

    pub fn external_identity(&self) -> Option<&ExternalIdentity> {
        self.external_identity.as_ref()
    }

    /// Provider which authenticated the user, `Internal` for local accounts.
    pub fn identity_provider(&self) -> IdentityProvider {
        match &self.external_identity {
            Some(external) => external.provider.clone(),
            None => IdentityProvider::Internal,
        }
    }

    pub fn last_connection_date(&self) -> Option<u64> {
        self.last_connection_date
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn should_reset_password(&self) -> bool {
        self.reset_password
    }
}

/// The party making a request.
///
/// Anonymous actors have no login, no groups and no external identity.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Actor {
    Anonymous,
    Authenticated(Identity),
}

impl Actor {
    pub fn identity(&self) -> Option<&Identity> {
        match self {
            Actor::Anonymous => None,
            Actor::Authenticated(identity) => Some(identity),
        }
    }

    pub fn is_logged_in(&self) -> bool {
        matches!(self, Actor::Authenticated(_))
    }

    pub fn login(&self) -> Option<&str> {
        self.identity().map(Identity::login)
    }
}

impl Display for Actor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Actor::Anonymous => write!(f, "anonymous"),
            Actor::Authenticated(identity) => write!(f, "{}", identity.login),
        }
    }
}
