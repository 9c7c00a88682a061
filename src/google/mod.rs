pub mod auth;
pub mod drive;
pub mod model;

pub use auth::{AuthError, CredentialManager, CredentialStore, FileCredentialStore};
pub use drive::{DriveClient, DriveService};
pub use model::{Credential, RemoteFile};
