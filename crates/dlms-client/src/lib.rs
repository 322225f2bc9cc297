//! # dlms-client
//!
//! Client library for the DLMS admin console: a typed HTTP client, admin
//! session storage with route guards, and the license workflows that sit
//! between the form views and the server.

pub mod api;
pub mod error;
pub mod guard;
pub mod list;
pub mod session;
pub mod view;
pub mod workflows;

#[cfg(test)]
mod test_support;

pub use api::LicensingClient;
pub use error::ClientError;
pub use session::SessionStore;
pub use workflows::{Console, Outcome};
