// SPDX-License-Identifier: MIT OR Apache-2.0

use std::collections::{HashMap, HashSet};
use std::convert::Infallible;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::memory::MemoryStore;
use crate::resource::{Component, PortfolioMembers};
use crate::traits::{PermissionGrantSource, ResourceDirectory};
use crate::{Actor, Permission, PermissionScope};

#[derive(Debug, Default)]
struct Counters {
    grant_lookups: AtomicUsize,
    batch_lookups: AtomicUsize,
    directory_lookups: AtomicUsize,
}

/// Memory store counting the lookups it serves.
#[derive(Clone, Debug)]
pub struct CountingStore {
    store: MemoryStore,
    counters: Arc<Counters>,
}

impl CountingStore {
    pub fn new(store: MemoryStore) -> Self {
        Self {
            store,
            counters: Arc::default(),
        }
    }

    /// Number of single-resource grant lookups.
    pub fn grant_lookups(&self) -> usize {
        self.counters.grant_lookups.load(Ordering::SeqCst)
    }

    /// Number of batched grant lookups.
    pub fn batch_lookups(&self) -> usize {
        self.counters.batch_lookups.load(Ordering::SeqCst)
    }

    pub fn directory_lookups(&self) -> usize {
        self.counters.directory_lookups.load(Ordering::SeqCst)
    }
}

impl PermissionGrantSource for CountingStore {
    type Error = Infallible;

    async fn grants_for(
        &self,
        actor: &Actor,
        scope: PermissionScope,
        resource: Option<&str>,
    ) -> Result<HashSet<Permission>, Infallible> {
        self.counters.grant_lookups.fetch_add(1, Ordering::SeqCst);
        self.store.grants_for(actor, scope, resource).await
    }

    async fn grants_for_many(
        &self,
        actor: &Actor,
        scope: PermissionScope,
        resources: &[String],
    ) -> Result<HashMap<String, HashSet<Permission>>, Infallible> {
        self.counters.batch_lookups.fetch_add(1, Ordering::SeqCst);
        self.store.grants_for_many(actor, scope, resources).await
    }
}

impl ResourceDirectory for CountingStore {
    type Error = Infallible;

    async fn component(&self, uuid: &str) -> Result<Option<Component>, Infallible> {
        self.counters.directory_lookups.fetch_add(1, Ordering::SeqCst);
        self.store.component(uuid).await
    }

    async fn application_members(&self, uuid: &str) -> Result<Option<Vec<String>>, Infallible> {
        self.counters.directory_lookups.fetch_add(1, Ordering::SeqCst);
        self.store.application_members(uuid).await
    }

    async fn portfolio_members(&self, uuid: &str) -> Result<Option<PortfolioMembers>, Infallible> {
        self.counters.directory_lookups.fetch_add(1, Ordering::SeqCst);
        self.store.portfolio_members(uuid).await
    }
}
