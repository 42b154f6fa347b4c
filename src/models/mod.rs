//! Value objects and the entity bridge contract.

mod bridge;
mod user_info;

pub use bridge::{EntityBridge, StorageHandle};
pub use user_info::UserInfo;
