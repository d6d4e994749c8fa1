pub mod api;
pub mod cli;
pub mod client;
pub mod config;
pub mod error;
pub mod session;

#[cfg(test)]
mod testing;

pub use client::{ApiClient, ApiRequest, NoopObserver, SessionObserver};
pub use config::Config;
pub use error::ApiError;
pub use session::{Role, RoleResolver, Session, TokenStore, UserDescriptor};
