// SPDX-License-Identifier: MIT OR Apache-2.0

//! Filtering of collections down to the elements a session may access.
//!
//! Listing endpoints redact what the user can't see instead of rejecting the whole request. The
//! filters resolve every element to its owning entity and load the grants of all entities not
//! seen yet by this session at once, before testing the elements one by one.
use std::collections::{HashMap, HashSet};

use tracing::{Instrument, trace, warn};

use crate::resource::{Component, Entity};
use crate::session::{Session, project_permissions};
use crate::traits::{PermissionGrantSource, ResourceDirectory};
use crate::{PermissionScope, ProjectPermission};

impl<G, D> Session<G, D>
where
    G: PermissionGrantSource,
    D: ResourceDirectory,
{
    /// Keep the components on which the permission is granted, in their original order.
    ///
    /// Equivalent to calling [`Session::has_component_permission`] on every component.
    pub async fn keep_authorized_components<I>(
        &self,
        permission: ProjectPermission,
        components: I,
    ) -> Vec<Component>
    where
        I: IntoIterator<Item = Component>,
    {
        self.keep_authorized_entities(permission, components).await
    }

    /// Keep the entities on which the permission is granted, in their original order.
    ///
    /// Duplicates are kept as long as they are authorized, entities which can't be resolved are
    /// dropped. Equivalent to calling [`Session::has_entity_permission`] on every entity.
    pub async fn keep_authorized_entities<T, I>(
        &self,
        permission: ProjectPermission,
        entities: I,
    ) -> Vec<T>
    where
        T: Entity,
        I: IntoIterator<Item = T>,
    {
        let mut resolved = Vec::new();
        for entity in entities {
            let owner = match entity.loaded_component() {
                Some(component) => Some(component.owner_uuid().to_string()),
                None => self.owner_of(entity.entity_uuid()).await,
            };
            resolved.push((entity, owner));
        }

        let owners: Vec<String> = resolved
            .iter()
            .filter_map(|(_, owner)| owner.clone())
            .collect();
        let authorized = self.entities_with_permission(permission, &owners).await;
        resolved
            .into_iter()
            .filter(|(_, owner)| {
                owner
                    .as_ref()
                    .is_some_and(|owner| authorized.contains(owner))
            })
            .map(|(entity, _)| entity)
            .collect()
    }

    /// UUID of the entity owning the component, if the component exists.
    async fn owner_of(&self, uuid: &str) -> Option<String> {
        match self.resolver.component(uuid).instrument(self.span.clone()).await {
            Ok(component) => Some(component.owner_uuid().to_string()),
            Err(err) => {
                trace!(parent: &self.span, uuid, "component not resolved: {err}");
                None
            }
        }
    }

    /// UUIDs among the given ones of the entities on which the permission is granted.
    pub(crate) async fn entities_with_permission(
        &self,
        permission: ProjectPermission,
        uuids: &[String],
    ) -> HashSet<String> {
        if self.is_system_administrator().await {
            return uuids.iter().cloned().collect();
        }

        if self.config.batch_lookups {
            self.prefetch_entity_grants(uuids).await;
        }

        let mut authorized = HashSet::new();
        for uuid in uuids {
            if authorized.contains(uuid) {
                continue;
            }
            if self.entity_grants(uuid).await.contains(&permission) {
                authorized.insert(uuid.clone());
            }
        }
        authorized
    }

    /// Load the grants of all entities which haven't been looked up by this session yet, with a
    /// single batched lookup.
    async fn prefetch_entity_grants(&self, uuids: &[String]) {
        let missing: Vec<String> = {
            let cached = self.entity_grants.read().await;
            let mut seen = HashSet::new();
            uuids
                .iter()
                .filter(|uuid| !cached.contains_key(uuid.as_str()) && seen.insert(uuid.as_str()))
                .cloned()
                .collect()
        };
        if missing.len() < 2 {
            return;
        }

        trace!(parent: &self.span, count = missing.len(), "loading entity grants in batch");
        let mut loaded = match self
            .grants
            .grants_for_many(&self.actor, PermissionScope::Component, &missing)
            .instrument(self.span.clone())
            .await
        {
            Ok(loaded) => loaded,
            Err(err) => {
                warn!(parent: &self.span, "failed loading entity grants in batch: {err}");
                HashMap::new()
            }
        };

        let mut cache = self.entity_grants.write().await;
        for uuid in missing {
            let permissions = loaded.remove(&uuid).unwrap_or_default();
            cache
                .entry(uuid)
                .or_insert_with(|| project_permissions(permissions));
        }
    }
}
