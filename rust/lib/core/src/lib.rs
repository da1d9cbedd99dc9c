pub mod auth;
pub mod config;
pub mod error;
pub mod form;
pub mod module;
pub mod types;

pub use auth::{Claims, ROOT_SUBJECT};
pub use config::ServiceConfig;
pub use error::ServiceError;
pub use form::FormErrors;
pub use module::Module;
pub use types::{ListParams, ListResult, MAX_LIMIT, merge_patch, new_id, now};
