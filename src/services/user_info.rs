//! Service for storing user info.

use super::DataService;
use crate::models::UserInfo;
use crate::storage::{
    AttributeKind, EntityDescriptor, FetchRequest, Model, Predicate, Record, SortDescriptor,
};
use crate::{DataError, Result};

/// Concrete persistence service for [`UserInfo`] objects.
///
/// Supplies the entity descriptor and the value↔record transforms;
/// everything else — ordering, batching, error translation, callback
/// delivery — comes from the wrapped [`DataService`].
pub struct UserInfoService {
    data: DataService,
}

impl UserInfoService {
    /// Entity kind name for stored user info.
    pub const ENTITY: &'static str = "user_info";

    /// Creates the service on top of a data service.
    #[must_use]
    pub const fn new(data: DataService) -> Self {
        Self { data }
    }

    /// The schema this service's entities live in.
    ///
    /// Applications composing several services into one store should build
    /// their own [`Model`] from each service's entity descriptor instead.
    #[must_use]
    pub fn model() -> Model {
        Model::new("dodo").with_entity(Self::entity_descriptor())
    }

    /// Describes the stored shape of a user info record.
    #[must_use]
    pub fn entity_descriptor() -> EntityDescriptor {
        EntityDescriptor::new(Self::ENTITY)
            .with_attribute("username", AttributeKind::Text)
            .with_attribute("password", AttributeKind::Text)
            .with_optional_attribute("first_name", AttributeKind::Text)
            .with_optional_attribute("last_name", AttributeKind::Text)
            .with_optional_attribute("email_address", AttributeKind::Text)
            .with_attribute("height", AttributeKind::Real)
            .with_optional_attribute("date_of_birth", AttributeKind::Timestamp)
            .with_attribute("consent_to_share_data", AttributeKind::Boolean)
    }

    /// Writes a value object's fields into a storage record.
    fn populate(user: &UserInfo, record: &mut Record) -> Result<()> {
        record.set_text("username", user.username.clone());
        record.set_text("password", user.password.clone());
        record.set_text("first_name", user.first_name.clone());
        record.set_text("last_name", user.last_name.clone());
        record.set_text("email_address", user.email_address.clone());
        record.set_real("height", user.height);
        match user.date_of_birth {
            Some(at) => record.set_timestamp("date_of_birth", at),
            None => record.set("date_of_birth", crate::storage::Value::Null),
        }
        record.set_boolean("consent_to_share_data", user.consent_to_share_data);
        Ok(())
    }

    /// Builds a value object from a storage record.
    fn materialize(record: &Record) -> UserInfo {
        let mut user = UserInfo::new(
            record.text("username").unwrap_or_default(),
            record.text("password").unwrap_or_default(),
        );
        user.first_name = record.text("first_name").unwrap_or_default().to_string();
        user.last_name = record.text("last_name").unwrap_or_default().to_string();
        user.email_address = record.text("email_address").unwrap_or_default().to_string();
        user.height = record.real("height").unwrap_or_default();
        user.date_of_birth = record.timestamp("date_of_birth");
        user.consent_to_share_data = record.boolean("consent_to_share_data").unwrap_or_default();
        user
    }

    /// Fetches all stored user info objects.
    pub fn get_user_info<S, F>(&self, success: S, failure: F)
    where
        S: FnOnce(Vec<UserInfo>) + Send + 'static,
        F: FnOnce(DataError) + Send + 'static,
    {
        self.data.execute_fetch(
            FetchRequest::new(Self::ENTITY),
            Self::materialize,
            success,
            failure,
        );
    }

    /// Fetches user info objects whose username contains the fragment,
    /// ordered by username.
    pub fn find_by_username<S, F>(&self, fragment: impl Into<String>, success: S, failure: F)
    where
        S: FnOnce(Vec<UserInfo>) + Send + 'static,
        F: FnOnce(DataError) + Send + 'static,
    {
        let request = FetchRequest::new(Self::ENTITY)
            .with_predicate(Predicate::text_contains("username", fragment))
            .sorted_by(SortDescriptor::ascending("username"));
        self.data
            .execute_fetch(request, Self::materialize, success, failure);
    }

    /// Inserts a single user info object.
    pub fn insert_user_info<S, F>(&self, user: UserInfo, success: S, failure: F)
    where
        S: FnOnce(Vec<UserInfo>) + Send + 'static,
        F: FnOnce(DataError) + Send + 'static,
    {
        self.insert_user_infos(vec![user], success, failure);
    }

    /// Inserts a batch of user info objects.
    ///
    /// On success the returned objects carry their assigned storage
    /// handles, in input order.
    pub fn insert_user_infos<S, F>(&self, users: Vec<UserInfo>, success: S, failure: F)
    where
        S: FnOnce(Vec<UserInfo>) + Send + 'static,
        F: FnOnce(DataError) + Send + 'static,
    {
        self.data
            .insert_objects(Self::ENTITY, users, Self::populate, success, failure);
    }

    /// Updates a batch of previously saved user info objects.
    pub fn update_user_infos<S, F>(&self, users: Vec<UserInfo>, success: S, failure: F)
    where
        S: FnOnce() + Send + 'static,
        F: FnOnce(DataError) + Send + 'static,
    {
        self.data
            .update_objects(users, Self::populate, success, failure);
    }

    /// Removes a batch of previously saved user info objects.
    pub fn remove_user_infos<S, F>(&self, users: Vec<UserInfo>, success: S, failure: F)
    where
        S: FnOnce() + Send + 'static,
        F: FnOnce(DataError) + Send + 'static,
    {
        self.data.remove_instances(users, success, failure);
    }

    /// Removes every stored user info object.
    pub fn remove_all<S, F>(&self, success: S, failure: F)
    where
        S: FnOnce() + Send + 'static,
        F: FnOnce(DataError) + Send + 'static,
    {
        self.data.remove_all_instances(Self::ENTITY, success, failure);
    }
}
