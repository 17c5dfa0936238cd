// SPDX-License-Identifier: MIT OR Apache-2.0

//! Interfaces to the collaborators a session reads grants and resource relations from.
mod directory;
mod grant_source;

pub use directory::ResourceDirectory;
pub use grant_source::PermissionGrantSource;
