//! # dlms-shared
//!
//! Types and rules shared by the DLMS server and client: the license record,
//! its derived status, the form validation schema, search and dashboard
//! aggregation, signed admin session tokens, and the JSON wire bodies.

pub mod constants;
pub mod error;
pub mod protocol;
pub mod search;
pub mod session;
pub mod stats;
pub mod status;
pub mod types;
pub mod upload;
pub mod validation;
