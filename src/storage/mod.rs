//! Storage layer.
//!
//! This module provides the pieces under [`DataService`](crate::DataService):
//! - **Schema**: [`Model`] / [`EntityDescriptor`] describe entity kinds and
//!   their typed attributes.
//! - **Context**: [`PersistenceContext`] owns the single storage session and
//!   the working set of staged changes.
//! - **Records**: [`Record`] / [`Value`] are what caller-supplied transforms
//!   read from and write to.
//! - **Queries**: [`FetchRequest`] with predicates and sort descriptors.

pub mod context;
pub(crate) mod metrics;
pub mod query;
pub mod record;
pub mod schema;

pub use context::PersistenceContext;
pub use query::{CompoundOperator, FetchRequest, Predicate, SortDescriptor, SortDirection};
pub use record::{Record, Value};
pub use schema::{Attribute, AttributeKind, EntityDescriptor, Model};
