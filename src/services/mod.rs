//! Persistence services.
//!
//! [`DataService`] is the generic base; concrete services wrap it with an
//! entity descriptor and transforms, one service per entity kind.

mod data;
mod user_info;

pub use data::DataService;
pub use user_info::UserInfoService;
