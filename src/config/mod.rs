mod credentials;
mod loader;
mod types;

pub use credentials::{build_auth_header, SecureString};
pub use loader::ConfigError;
pub use types::{Config, PagingConfig, RetryConfig, ServerConfig};
