pub mod auth_client;
pub mod refresh;

pub use auth_client::{AuthClient, RefreshedSession, SessionSnapshot};
pub use refresh::{credential_key, RefreshCoordinator, RefreshError, RefreshRegistry};
