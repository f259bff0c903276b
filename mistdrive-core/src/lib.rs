mod auth;
mod client;

pub use auth::{AuthClient, AuthError, SessionToken};
pub use client::{About, DriveClient, DriveError, RemoteFile};
