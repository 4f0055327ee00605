//! Contract with the multi-device sync collaborator.
//!
//! The sync protocol itself lives outside the engine; this module defines
//! the inbound delivery shape and the outbound push trigger the engine uses.

use std::sync::Arc;

use crate::theme::types::ThemeRecordPayload;

/// Where a delivery batch originated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliverySource {
    /// Records retrieved from the remote sync service.
    RemoteSync,
    /// Records loaded or restored from the local database.
    LocalDatabase,
}

/// One observed batch of theme record changes from a completed sync pass.
#[derive(Debug, Clone)]
pub struct ThemeDelivery {
    /// Every theme record known after the pass.
    pub all: Vec<ThemeRecordPayload>,
    /// Records created or updated by the pass.
    pub valid: Vec<ThemeRecordPayload>,
    /// Ids of records tombstoned by the pass.
    pub deleted: Vec<String>,
    pub source: DeliverySource,
}

/// Callback receiving each theme delivery.
pub type SyncObserver = Arc<dyn Fn(ThemeDelivery) + Send + Sync>;

/// Handle for a registered sync observer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SyncSubscription(pub u64);

/// The engine's view of the sync collaborator: one observer registration
/// for the "theme" entity type, and a fire-and-forget push trigger called
/// after records are marked dirty.
pub trait SyncFeed: Send + Sync {
    fn register_theme_observer(&self, observer: SyncObserver) -> SyncSubscription;
    fn unregister_theme_observer(&self, subscription: SyncSubscription);
    fn request_sync(&self);
}
