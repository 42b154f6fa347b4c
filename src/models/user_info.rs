//! User info value object.

use super::{EntityBridge, StorageHandle};
use crate::{DataError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Model object for user info.
///
/// Built either from a network payload ([`UserInfo::from_json`]) or from a
/// stored record by [`UserInfoService`](crate::services::UserInfoService).
/// Bridge state (storage handle, retrieval timestamp) is managed by the data
/// service and never travels through JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UserInfo {
    /// The handle of the stored record this object was saved to or loaded
    /// from.
    #[serde(skip)]
    storage_handle: Option<StorageHandle>,

    /// When this object was last materialized from storage.
    #[serde(skip)]
    retrieved_at: DateTime<Utc>,

    /// Login name.
    pub username: String,

    /// Password.
    pub password: String,

    /// Given name.
    pub first_name: String,

    /// Family name.
    pub last_name: String,

    /// Contact email address.
    pub email_address: String,

    /// Height in meters.
    pub height: f64,

    /// Date of birth, when provided.
    pub date_of_birth: Option<DateTime<Utc>>,

    /// Whether the user consented to sharing their data.
    pub consent_to_share_data: bool,
}

impl UserInfo {
    /// Creates a user info with the given credentials and empty profile
    /// fields.
    #[must_use]
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            ..Self::default()
        }
    }

    /// Builds a user info from a JSON payload.
    ///
    /// Absent fields fall back to their defaults, matching what the REST
    /// collaborator delivers for sparse profiles.
    ///
    /// # Errors
    ///
    /// Returns an error if a present field has the wrong type.
    pub fn from_json(json: serde_json::Value) -> Result<Self> {
        serde_json::from_value(json).map_err(|e| DataError::decode("user info", e))
    }

    /// Serializes the profile fields to a JSON payload.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<serde_json::Value> {
        serde_json::to_value(self).map_err(|e| DataError::decode("user info", e))
    }
}

impl Default for UserInfo {
    fn default() -> Self {
        Self {
            storage_handle: None,
            retrieved_at: Utc::now(),
            username: String::new(),
            password: String::new(),
            first_name: String::new(),
            last_name: String::new(),
            email_address: String::new(),
            height: 0.0,
            date_of_birth: None,
            consent_to_share_data: false,
        }
    }
}

impl EntityBridge for UserInfo {
    fn storage_handle(&self) -> Option<&StorageHandle> {
        self.storage_handle.as_ref()
    }

    fn set_storage_handle(&mut self, handle: StorageHandle) {
        self.storage_handle = Some(handle);
    }

    fn retrieved_at(&self) -> DateTime<Utc> {
        self.retrieved_at
    }

    fn set_retrieved_at(&mut self, at: DateTime<Utc>) {
        self.retrieved_at = at;
    }
}
