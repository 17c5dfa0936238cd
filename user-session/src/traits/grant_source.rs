// SPDX-License-Identifier: MIT OR Apache-2.0

use std::collections::{HashMap, HashSet};
use std::error::Error;
use std::sync::Arc;

use crate::{Actor, Permission, PermissionScope};

/// Read access to the permissions granted to actors, directly or through their groups.
///
/// This is the only call a session makes into persistent grant storage. Implementations must be
/// safe to call repeatedly; sessions cache the results per (scope, resource) for their lifetime.
///
/// Sessions only ask for the `Global` scope (without a resource) and the `Component` scope (with
/// the UUID of an entity). Other scopes are normalized before the lookup.
pub trait PermissionGrantSource {
    type Error: Error;

    /// Permissions granted to the actor in the given scope, on the given resource.
    fn grants_for(
        &self,
        actor: &Actor,
        scope: PermissionScope,
        resource: Option<&str>,
    ) -> impl Future<Output = Result<HashSet<Permission>, Self::Error>>;

    /// Permissions granted to the actor on each of the given resources.
    ///
    /// The returned map may omit resources without any grant. Implementations backed by a database
    /// should override this with a single query, the default issues one lookup per resource.
    fn grants_for_many(
        &self,
        actor: &Actor,
        scope: PermissionScope,
        resources: &[String],
    ) -> impl Future<Output = Result<HashMap<String, HashSet<Permission>>, Self::Error>> {
        async move {
            let mut grants = HashMap::with_capacity(resources.len());
            for resource in resources {
                let permissions = self.grants_for(actor, scope, Some(resource)).await?;
                grants.insert(resource.clone(), permissions);
            }
            Ok(grants)
        }
    }
}

impl<T> PermissionGrantSource for Arc<T>
where
    T: PermissionGrantSource,
{
    type Error = T::Error;

    fn grants_for(
        &self,
        actor: &Actor,
        scope: PermissionScope,
        resource: Option<&str>,
    ) -> impl Future<Output = Result<HashSet<Permission>, T::Error>> {
        self.as_ref().grants_for(actor, scope, resource)
    }

    fn grants_for_many(
        &self,
        actor: &Actor,
        scope: PermissionScope,
        resources: &[String],
    ) -> impl Future<Output = Result<HashMap<String, HashSet<Permission>>, T::Error>> {
        self.as_ref().grants_for_many(actor, scope, resources)
    }
}
