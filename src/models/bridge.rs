//! Entity bridge contract.
//!
//! Any value object participating in persistence exposes two pieces of
//! bridge state: the opaque [`StorageHandle`] the engine assigned when the
//! object was first saved, and the timestamp of its last materialization
//! from storage.

use chrono::{DateTime, Utc};
use std::fmt;

/// Opaque identifier of a persisted record.
///
/// Assigned by [`DataService`](crate::DataService) on successful insert and
/// read-only to application code afterward. An object with no handle has
/// never been saved and cannot be updated or deleted.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StorageHandle {
    entity: String,
    row_id: i64,
}

impl StorageHandle {
    pub(crate) fn new(entity: impl Into<String>, row_id: i64) -> Self {
        Self {
            entity: entity.into(),
            row_id,
        }
    }

    /// Returns the entity kind this handle belongs to.
    #[must_use]
    pub fn entity(&self) -> &str {
        &self.entity
    }

    pub(crate) const fn row_id(&self) -> i64 {
        self.row_id
    }
}

impl fmt::Display for StorageHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.entity, self.row_id)
    }
}

/// What a value object must expose to participate in persistence.
///
/// The data service owns both fields: it assigns the storage handle on
/// successful insert and re-stamps the retrieval timestamp whenever the
/// object is materialized by a fetch. Implementations default
/// `retrieved_at` to construction time.
pub trait EntityBridge {
    /// The handle assigned at first save, absent before then.
    fn storage_handle(&self) -> Option<&StorageHandle>;

    /// Records the handle assigned by the storage engine.
    fn set_storage_handle(&mut self, handle: StorageHandle);

    /// When this object was last materialized from storage.
    fn retrieved_at(&self) -> DateTime<Utc>;

    /// Records a materialization timestamp.
    fn set_retrieved_at(&mut self, at: DateTime<Utc>);
}
