//! Backend credentials.

pub mod credentials;
pub mod error;
pub mod traits;

pub use credentials::StaticCredentials;
pub use error::AuthError;
pub use traits::CredentialProvider;
