//! Session state: who is logged in, and when that changes.

pub mod domain;
pub mod repo_http;
pub mod service;

pub use domain::{Session, User, UserResolver};
pub use repo_http::HttpUserResolver;
pub use service::SessionState;
