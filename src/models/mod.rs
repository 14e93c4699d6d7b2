//! Data models shared by the CivicBridge backend and client.
//!
//! Wire format is camelCase JSON so both sides of the REST surface agree on field names.

mod report;
mod user;

pub use report::*;
pub use user::*;
