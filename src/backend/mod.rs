//! Clients for the REST controllers that sit beside the datastore.
//!
//! SYSTEM CONTEXT
//! ==============
//! The user controller writes user rows with elevated rights during
//! registration, when the new user has no session yet. The team and
//! department controllers back the name lookups on the sign-up form.

pub mod directory;
pub mod users;

pub use directory::{Department, DirectoryClient, Team};
pub use users::UserApiClient;
