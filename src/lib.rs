//! # dodostore
//!
//! A generic asynchronous persistence layer over `SQLite`.
//!
//! dodostore decouples application code from the embedded storage engine:
//! concrete services describe their entities with a schema descriptor and
//! supply value↔record transforms, and [`DataService`] provides typed CRUD
//! with serialized write ordering and completion callbacks delivered on the
//! application's main queue.
//!
//! ## Architecture
//!
//! - [`PersistenceContext`]: owns the single storage connection and the
//!   working set of staged, uncommitted changes (one context per store).
//! - [`DataService`]: fetch/insert/update/delete, all executed in submission
//!   order on a private serial worker; one save per batch, all-or-nothing.
//! - [`EntityBridge`]: what a value object must expose to participate in
//!   persistence (a storage handle and a retrieval timestamp).
//! - [`DataError`]: the single error shape every failure callback receives.
//!
//! ## Example
//!
//! ```rust,ignore
//! use dodostore::{DataService, MainQueue, PersistenceContext, StoreConfig};
//! use dodostore::services::UserInfoService;
//!
//! let config = StoreConfig::default();
//! let context = PersistenceContext::open(UserInfoService::model(), &config)?;
//! let main = MainQueue::new();
//! let service = UserInfoService::new(DataService::new(context, main.handle())?);
//!
//! service.get_user_info(
//!     |users| println!("loaded {} users", users.len()),
//!     |error| eprintln!("{error}"),
//! );
//! main.run_one(std::time::Duration::from_secs(5));
//! ```

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(missing_docs)]
#![forbid(unsafe_code)]
#![allow(clippy::multiple_crate_versions)]

use thiserror::Error as ThisError;

// Module declarations
pub mod config;
pub mod dispatch;
pub mod models;
pub mod observability;
pub mod services;
pub mod storage;

// Re-exports for convenience
pub use config::StoreConfig;
pub use dispatch::{MainQueue, MainQueueHandle};
pub use models::{EntityBridge, StorageHandle, UserInfo};
pub use services::{DataService, UserInfoService};
pub use storage::{
    Attribute, AttributeKind, CompoundOperator, EntityDescriptor, FetchRequest, Model,
    PersistenceContext, Predicate, Record, SortDescriptor, SortDirection, Value,
};

/// Error domain tag identifying failures raised by the persistence layer.
pub const DATA_SERVICE_ERROR_DOMAIN: &str = "DataServiceErrorDomain";

/// The single error shape produced by the persistence layer.
///
/// Every failure callback receives exactly this shape: the fixed
/// [`DATA_SERVICE_ERROR_DOMAIN`] tag, a numeric code (currently always zero),
/// a human-readable message naming the failed operation and entity kind
/// where available, and the wrapped underlying cause when one exists.
///
/// Nothing in this crate panics or throws past the [`DataService`] boundary;
/// all storage-layer failures are translated into this shape.
#[derive(Debug, ThisError)]
#[error("{message}")]
pub struct DataError {
    /// Domain tag, always [`DATA_SERVICE_ERROR_DOMAIN`].
    domain: &'static str,
    /// Numeric code, currently always zero.
    code: i32,
    /// Human-readable description of the failure.
    message: String,
    /// The underlying storage-layer cause, when one exists.
    #[source]
    cause: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
}

impl DataError {
    fn new(
        message: String,
        cause: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
    ) -> Self {
        Self {
            domain: DATA_SERVICE_ERROR_DOMAIN,
            code: 0,
            message,
            cause,
        }
    }

    /// Returns the error domain tag.
    #[must_use]
    pub const fn domain(&self) -> &'static str {
        self.domain
    }

    /// Returns the numeric error code.
    #[must_use]
    pub const fn code(&self) -> i32 {
        self.code
    }

    /// Returns the human-readable message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Wraps a storage-layer fetch failure.
    pub(crate) fn fetch(
        entity: &str,
        cause: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::new(
            format!("an error occurred while fetching '{entity}'"),
            Some(Box::new(cause)),
        )
    }

    /// Wraps a storage-layer save failure, with entity context where available.
    pub(crate) fn save(
        entity: Option<&str>,
        cause: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        let message = entity.map_or_else(
            || "an error occurred while saving the context".to_string(),
            |entity| format!("an error occurred while saving '{entity}'"),
        );
        Self::new(message, Some(Box::new(cause)))
    }

    /// Wraps a failure to open the backing store.
    pub(crate) fn open(model: &str, cause: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::new(
            format!("cannot open persistent store for model '{model}'"),
            Some(Box::new(cause)),
        )
    }

    /// Reports an unrecoverable schema migration failure.
    pub(crate) fn migration(entity: &str, detail: impl Into<String>) -> Self {
        Self::new(
            format!("cannot migrate entity '{entity}': {}", detail.into()),
            None,
        )
    }

    /// Reports an update/delete attempted on an object with no storage handle.
    pub(crate) fn missing_handle(action: &str, object: &str) -> Self {
        Self::new(
            format!("cannot {action} object with no storage handle: {object}"),
            None,
        )
    }

    /// Reports a local failure with no underlying storage cause.
    pub(crate) fn operation(message: impl Into<String>) -> Self {
        Self::new(message.into(), None)
    }

    /// Creates an error for a caller-side transform failure.
    ///
    /// Populate and mutate closures return this when a value object cannot
    /// be written into its storage record; the whole batch is then aborted
    /// without a save.
    #[must_use]
    pub fn transform(message: impl Into<String>) -> Self {
        Self::new(message.into(), None)
    }

    /// Wraps a value-object decoding failure.
    pub(crate) fn decode(
        what: &str,
        cause: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::new(
            format!("cannot decode {what} from payload"),
            Some(Box::new(cause)),
        )
    }
}

/// Result type alias for persistence-layer operations.
pub type Result<T> = std::result::Result<T, DataError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_error_display() {
        let err = DataError::fetch("user_info", rusqlite::Error::InvalidQuery);
        assert_eq!(
            err.to_string(),
            "an error occurred while fetching 'user_info'"
        );

        let err = DataError::save(None, rusqlite::Error::InvalidQuery);
        assert_eq!(err.to_string(), "an error occurred while saving the context");

        let err = DataError::save(Some("user_info"), rusqlite::Error::InvalidQuery);
        assert_eq!(err.to_string(), "an error occurred while saving 'user_info'");

        let err = DataError::missing_handle("save", "UserInfo { .. }");
        assert_eq!(
            err.to_string(),
            "cannot save object with no storage handle: UserInfo { .. }"
        );
    }

    #[test]
    fn test_error_shape() {
        let err = DataError::fetch("user_info", rusqlite::Error::InvalidQuery);
        assert_eq!(err.domain(), DATA_SERVICE_ERROR_DOMAIN);
        assert_eq!(err.code(), 0);
        assert!(err.source().is_some());

        let err = DataError::missing_handle("delete", "UserInfo { .. }");
        assert!(err.source().is_none());
    }
}
