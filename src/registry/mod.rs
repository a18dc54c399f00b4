//! AF registry and the subscription / PFD transaction lifecycles.
//!
//! The registry owns every AF entity. Each entity sits behind its own async
//! `RwLock`; mutations keep the write guard across their southbound calls and
//! commit local state only once every call has returned, so a request that is
//! cancelled midway leaves nothing behind. Two `DashMap` secondary indexes
//! cover the registry-wide lookups: correlation ID to subscription, and
//! external application ID to the PFD transaction owning it.

mod af;
mod report;
mod subscription;
mod transaction;


pub use af::AfEntity;
pub use report::PfdReports;
pub use subscription::{CorrelatedSubscription, Subscription};
pub use transaction::{PfdOutcome, PfdTransaction};

use crate::config::CoreConfig;
use crate::error::{Capacity, NefError, Resource};
use crate::southbound::{SbResponse, Southbound};
use dashmap::DashMap;
use std::collections::HashMap;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::sync::{OwnedRwLockReadGuard, OwnedRwLockWriteGuard};
use tracing::{debug, info};

/// Shared handle to one AF entity
pub type AfHandle = Arc<tokio::sync::RwLock<AfEntity>>;

/// Owner of an external application ID in the PFD index
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct AppOwner {
    pub af_id: String,
    /// `None` while the creating request is still in flight
    pub transaction_id: Option<u64>,
}

/// Registry of all AF entities and their registry-wide indexes
pub struct AfRegistry {
    afs: RwLock<HashMap<String, AfHandle>>,
    /// correlation ID -> (AF ID, subscription ID)
    correlations: DashMap<String, (String, u64)>,
    /// external application ID -> owning transaction
    app_ids: DashMap<String, AppOwner>,
    next_correlation_id: AtomicU64,
    southbound: Southbound,
    config: CoreConfig,
}

impl AfRegistry {
    pub fn new(config: CoreConfig, southbound: Southbound) -> Self {
        // Correlation IDs live in their own range above the subscription IDs
        let next_correlation_id = AtomicU64::new(config.subscription_id_start + 20);
        Self {
            afs: RwLock::new(HashMap::new()),
            correlations: DashMap::new(),
            app_ids: DashMap::new(),
            next_correlation_id,
            southbound,
            config,
        }
    }

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    /// Return the entity for `af_id`, creating it if the AF cap allows
    pub fn resolve_or_create(&self, af_id: &str) -> Result<AfHandle, NefError> {
        let mut afs = self.afs_write();
        match afs.get(af_id) {
            Some(handle) => Ok(handle.clone()),
            None => self.insert_af(&mut afs, af_id),
        }
    }

    fn insert_af(
        &self,
        afs: &mut HashMap<String, AfHandle>,
        af_id: &str,
    ) -> Result<AfHandle, NefError> {
        if afs.len() >= self.config.max_af_support {
            tracing::warn!(
                af_id = %af_id,
                max = self.config.max_af_support,
                "AF capacity reached"
            );
            return Err(NefError::CapacityExceeded(Capacity::AfCount));
        }

        let handle = Arc::new(tokio::sync::RwLock::new(AfEntity::new(af_id, &self.config)));
        afs.insert(af_id.to_string(), handle.clone());
        info!(af_id = %af_id, af_count = afs.len(), "AF created");
        Ok(handle)
    }

    pub fn get(&self, af_id: &str) -> Result<AfHandle, NefError> {
        self.afs_read()
            .get(af_id)
            .cloned()
            .ok_or(NefError::NotFound(Resource::Af))
    }

    /// Remove the AF if it owns no subscription and no transaction.
    ///
    /// Returns true when the AF was removed.
    pub async fn delete_if_empty(&self, af_id: &str) -> bool {
        let Ok(handle) = self.get(af_id) else {
            return false;
        };
        let mut entity = handle.write_owned().await;
        self.retire_if_empty(&mut entity)
    }

    pub fn af_count(&self) -> usize {
        self.afs_read().len()
    }

    pub fn contains(&self, af_id: &str) -> bool {
        self.afs_read().contains_key(af_id)
    }

    fn afs_read(&self) -> RwLockReadGuard<'_, HashMap<String, AfHandle>> {
        self.afs.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn afs_write(&self) -> RwLockWriteGuard<'_, HashMap<String, AfHandle>> {
        self.afs.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Detach an empty entity and drop it from the map.
    ///
    /// A non-detached entity is always the one stored under its ID.
    fn retire_if_empty(&self, entity: &mut AfEntity) -> bool {
        if entity.detached || !entity.is_empty() {
            return false;
        }
        entity.detached = true;
        let mut afs = self.afs_write();
        afs.remove(&entity.af_id);
        info!(af_id = %entity.af_id, af_count = afs.len(), "AF removed");
        true
    }

    /// Lock an AF for writing, creating it when absent.
    ///
    /// A new AF is write-locked before the map lock is released, so no
    /// request can observe it unlocked and its creator never waits on it.
    async fn write_or_create(&self, af_id: &str) -> Result<AfWriteGuard<'_>, NefError> {
        loop {
            let handle = {
                let mut afs = self.afs_write();
                match afs.get(af_id) {
                    Some(handle) => handle.clone(),
                    None => {
                        let handle = self.insert_af(&mut afs, af_id)?;
                        if let Ok(entity) = handle.clone().try_write_owned() {
                            return Ok(AfWriteGuard {
                                registry: self,
                                entity,
                            });
                        }
                        handle
                    }
                }
            };
            let entity = handle.write_owned().await;
            // Lost a race with the removal of an empty AF
            if !entity.detached {
                return Ok(AfWriteGuard {
                    registry: self,
                    entity,
                });
            }
        }
    }

    async fn write_existing(&self, af_id: &str) -> Result<AfWriteGuard<'_>, NefError> {
        let entity = self.get(af_id)?.write_owned().await;
        if entity.detached {
            return Err(NefError::NotFound(Resource::Af));
        }
        Ok(AfWriteGuard {
            registry: self,
            entity,
        })
    }

    async fn read_existing(&self, af_id: &str) -> Result<OwnedRwLockReadGuard<AfEntity>, NefError> {
        let entity = self.get(af_id)?.read_owned().await;
        if entity.detached {
            return Err(NefError::NotFound(Resource::Af));
        }
        Ok(entity)
    }

    fn next_correlation_id(&self) -> String {
        self.next_correlation_id
            .fetch_add(1, Ordering::Relaxed)
            .to_string()
    }

    fn log_summary(&self, entity: &AfEntity) {
        debug!(
            af_count = self.af_count(),
            af_id = %entity.af_id,
            subscriptions = entity.subscription_count(),
            transactions = entity.transaction_count(),
            indexed_correlations = self.correlations.len(),
            indexed_apps = self.app_ids.len(),
            "NEF state"
        );
    }
}

/// Write access to one AF; retires the AF on release if it ended up empty.
///
/// Covers failed creations and requests dropped while awaiting the southbound.
struct AfWriteGuard<'a> {
    registry: &'a AfRegistry,
    entity: OwnedRwLockWriteGuard<AfEntity>,
}

impl Deref for AfWriteGuard<'_> {
    type Target = AfEntity;

    fn deref(&self) -> &AfEntity {
        &self.entity
    }
}

impl DerefMut for AfWriteGuard<'_> {
    fn deref_mut(&mut self) -> &mut AfEntity {
        &mut self.entity
    }
}

impl Drop for AfWriteGuard<'_> {
    fn drop(&mut self) {
        self.registry.retire_if_empty(&mut self.entity);
        self.registry.log_summary(&self.entity);
    }
}

/// Turn a non-2xx southbound answer into a `Southbound` error
fn require_success<T>(resp: SbResponse<T>, operation: &str) -> Result<SbResponse<T>, NefError> {
    if resp.is_success() {
        return Ok(resp);
    }
    tracing::warn!(operation, status = resp.status, "Southbound request rejected");
    Err(NefError::Southbound {
        status: Some(resp.status),
        message: format!("{} answered {}", operation, resp.status),
        problem: resp.problem,
    })
}
