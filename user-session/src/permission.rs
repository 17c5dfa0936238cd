// SPDX-License-Identifier: MIT OR Apache-2.0

use std::fmt::Display;
use std::str::FromStr;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PermissionError {
    #[error("unknown global permission '{0}'")]
    UnknownGlobalPermission(String),

    #[error("unknown project permission '{0}'")]
    UnknownProjectPermission(String),
}

/// System-wide capabilities, not bound to any resource.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum GlobalPermission {
    /// Administer the system. Holders are system administrators.
    #[cfg_attr(feature = "serde", serde(rename = "admin"))]
    Administer,

    #[cfg_attr(feature = "serde", serde(rename = "gateadmin"))]
    AdministerQualityGates,

    #[cfg_attr(feature = "serde", serde(rename = "profileadmin"))]
    AdministerQualityProfiles,

    /// Create projects.
    #[cfg_attr(feature = "serde", serde(rename = "provisioning"))]
    ProvisionProjects,

    /// Submit analysis reports for any project.
    #[cfg_attr(feature = "serde", serde(rename = "scan"))]
    Scan,

    #[cfg_attr(feature = "serde", serde(rename = "applicationcreator"))]
    ApplicationCreator,

    #[cfg_attr(feature = "serde", serde(rename = "portfoliocreator"))]
    PortfolioCreator,
}

impl GlobalPermission {
    pub const ALL: [GlobalPermission; 7] = [
        GlobalPermission::Administer,
        GlobalPermission::AdministerQualityGates,
        GlobalPermission::AdministerQualityProfiles,
        GlobalPermission::ProvisionProjects,
        GlobalPermission::Scan,
        GlobalPermission::ApplicationCreator,
        GlobalPermission::PortfolioCreator,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            GlobalPermission::Administer => "admin",
            GlobalPermission::AdministerQualityGates => "gateadmin",
            GlobalPermission::AdministerQualityProfiles => "profileadmin",
            GlobalPermission::ProvisionProjects => "provisioning",
            GlobalPermission::Scan => "scan",
            GlobalPermission::ApplicationCreator => "applicationcreator",
            GlobalPermission::PortfolioCreator => "portfoliocreator",
        }
    }
}

impl Display for GlobalPermission {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.key())
    }
}

impl FromStr for GlobalPermission {
    type Err = PermissionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        GlobalPermission::ALL
            .into_iter()
            .find(|permission| permission.key() == s)
            .ok_or_else(|| PermissionError::UnknownGlobalPermission(s.to_string()))
    }
}

/// Capabilities on a project, portfolio or application.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum ProjectPermission {
    /// Browse the resource.
    User,

    /// Administer the resource.
    Admin,

    /// See the source code.
    #[cfg_attr(feature = "serde", serde(rename = "codeviewer"))]
    CodeViewer,

    #[cfg_attr(feature = "serde", serde(rename = "issueadmin"))]
    IssueAdmin,

    #[cfg_attr(feature = "serde", serde(rename = "securityhotspotadmin"))]
    SecurityHotspotAdmin,

    /// Submit analysis reports.
    Scan,
}

impl ProjectPermission {
    pub const ALL: [ProjectPermission; 6] = [
        ProjectPermission::User,
        ProjectPermission::Admin,
        ProjectPermission::CodeViewer,
        ProjectPermission::IssueAdmin,
        ProjectPermission::SecurityHotspotAdmin,
        ProjectPermission::Scan,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            ProjectPermission::User => "user",
            ProjectPermission::Admin => "admin",
            ProjectPermission::CodeViewer => "codeviewer",
            ProjectPermission::IssueAdmin => "issueadmin",
            ProjectPermission::SecurityHotspotAdmin => "securityhotspotadmin",
            ProjectPermission::Scan => "scan",
        }
    }
}

impl Display for ProjectPermission {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.key())
    }
}

impl FromStr for ProjectPermission {
    type Err = PermissionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ProjectPermission::ALL
            .into_iter()
            .find(|permission| permission.key() == s)
            .ok_or_else(|| PermissionError::UnknownProjectPermission(s.to_string()))
    }
}

/// Any permission which can be granted to an actor.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Permission {
    Global(GlobalPermission),
    Project(ProjectPermission),
}

impl From<GlobalPermission> for Permission {
    fn from(value: GlobalPermission) -> Self {
        Permission::Global(value)
    }
}

impl From<ProjectPermission> for Permission {
    fn from(value: ProjectPermission) -> Self {
        Permission::Project(value)
    }
}

impl Display for Permission {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Permission::Global(permission) => write!(f, "global:{permission}"),
            Permission::Project(permission) => write!(f, "project:{permission}"),
        }
    }
}

/// Where a permission applies.
///
/// Grants are only ever stored for `Global` and `Component` scopes. `Entity` addresses the same
/// grants as `Component` through the UUID of a top-level project, portfolio or application and
/// `Branch` is redirected to the component grants of the owning project.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum PermissionScope {
    Global,
    Component,
    Entity,
    Branch,
}

impl PermissionScope {
    /// Scope under which grants for this scope are stored.
    pub fn storage_scope(&self) -> PermissionScope {
        match self {
            PermissionScope::Global => PermissionScope::Global,
            PermissionScope::Component | PermissionScope::Entity | PermissionScope::Branch => {
                PermissionScope::Component
            }
        }
    }
}

/// A permission held by an actor, on a resource unless the scope is `Global`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Grant {
    pub scope: PermissionScope,
    pub permission: Permission,
    pub resource: Option<String>,
}

impl Grant {
    pub fn global(permission: GlobalPermission) -> Self {
        Self {
            scope: PermissionScope::Global,
            permission: permission.into(),
            resource: None,
        }
    }

    pub fn component(permission: ProjectPermission, resource: impl Into<String>) -> Self {
        Self {
            scope: PermissionScope::Component,
            permission: permission.into(),
            resource: Some(resource.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{GlobalPermission, Permission, PermissionError, PermissionScope, ProjectPermission};

    #[test]
    fn keys_parse_back() {
        for permission in GlobalPermission::ALL {
            assert_eq!(permission.key().parse::<GlobalPermission>(), Ok(permission));
        }
        for permission in ProjectPermission::ALL {
            assert_eq!(permission.key().parse::<ProjectPermission>(), Ok(permission));
        }
        assert_eq!(
            "root".parse::<GlobalPermission>(),
            Err(PermissionError::UnknownGlobalPermission("root".into()))
        );
        assert_eq!(
            "owner".parse::<ProjectPermission>(),
            Err(PermissionError::UnknownProjectPermission("owner".into()))
        );
    }

    #[test]
    fn admin_key_is_shared_between_scopes() {
        // Same key, different vocabularies.
        assert_eq!(GlobalPermission::Administer.key(), ProjectPermission::Admin.key());
        assert_ne!(
            Permission::from(GlobalPermission::Administer),
            Permission::from(ProjectPermission::Admin)
        );
        assert_eq!(
            Permission::from(ProjectPermission::Admin).to_string(),
            "project:admin"
        );
    }

    #[test]
    fn scopes_normalize_to_storage_scope() {
        assert_eq!(PermissionScope::Global.storage_scope(), PermissionScope::Global);
        assert_eq!(PermissionScope::Branch.storage_scope(), PermissionScope::Component);
        assert_eq!(PermissionScope::Entity.storage_scope(), PermissionScope::Component);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn serde_uses_permission_keys() {
        let json = serde_json::to_string(&ProjectPermission::SecurityHotspotAdmin).unwrap();
        assert_eq!(json, "\"securityhotspotadmin\"");
        let json = serde_json::to_string(&GlobalPermission::ProvisionProjects).unwrap();
        assert_eq!(json, "\"provisioning\"");
        let permission: ProjectPermission = serde_json::from_str("\"codeviewer\"").unwrap();
        assert_eq!(permission, ProjectPermission::CodeViewer);
    }
}
