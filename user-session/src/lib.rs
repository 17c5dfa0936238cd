// SPDX-License-Identifier: MIT OR Apache-2.0

//! Request-scoped user sessions answering "can this actor do X to Y".
//!
//! A [`Session`] binds an [`Actor`] (anonymous or authenticated) to a point-in-time view of its
//! permissions for the duration of one request. Permissions are scoped: some are global
//! ("administer the system", "scan"), others apply to a project, portfolio or application
//! ("browse", "administer this project"). Branches and sub-portfolios do not carry permissions of
//! their own, checks on them are redirected to the entity which owns them.
//!
//! Some checks aggregate over several resources. An application is only fully visible when _all_
//! of its member projects are, a portfolio when _all_ projects reachable through its (possibly
//! nested) sub-portfolios are. The [`resolver`] module expands such composite resources into the
//! projects to check.
//!
//! Grants and resource memberships are read through the [`traits::PermissionGrantSource`] and
//! [`traits::ResourceDirectory`] interfaces. Every lookup is memoized for the lifetime of the
//! session, so a request issues at most one lookup per distinct resource and sees a stable answer
//! even if the underlying storage changes concurrently.
//!
//! ```
//! # use user_session::{Actor, Identity, ProjectPermission, Session, SessionConfig};
//! # use user_session::memory::MemoryStore;
//! # use user_session::resource::Component;
//! # tokio_test_block_on(async {
//! let mut store = MemoryStore::new();
//! let alice = Identity::new("alice");
//! let project = Component::project("proj-1", "my-project");
//! store.grant_project(&Actor::Authenticated(alice.clone()), "proj-1", ProjectPermission::Admin);
//!
//! let session = Session::new(
//!     Actor::Authenticated(alice),
//!     store.clone(),
//!     store,
//!     SessionConfig::default(),
//! );
//!
//! assert!(session.has_component_permission(ProjectPermission::Admin, &project).await);
//! assert!(session.check_component_permission(ProjectPermission::Scan, &project).await.is_err());
//! # });
//! # fn tokio_test_block_on<F: std::future::Future>(f: F) -> F::Output {
//! #     tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(f)
//! # }
//! ```
pub mod config;
pub mod graph;
mod identity;
pub mod memory;
mod permission;
pub mod resolver;
pub mod resource;
pub mod session;
#[cfg(any(test, feature = "test_utils"))]
pub mod test_utils;
pub mod traits;

pub use config::SessionConfig;
pub use identity::{Actor, ExternalIdentity, GroupRef, Identity, IdentityProvider};
pub use permission::{
    GlobalPermission, Grant, Permission, PermissionError, PermissionScope, ProjectPermission,
};
pub use session::{AuthorizationError, Session};
