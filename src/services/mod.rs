//! Session services: identity synchronization, auth events, registration.
//!
//! ARCHITECTURE
//! ============
//! Services own the session lifecycle so the router and the binary only
//! read shared state. Remote collaborators sit behind the traits in
//! [`provider`].

pub mod events;
pub mod provider;
pub mod registration;
pub mod session;
pub mod types;

#[cfg(test)]
pub mod test_helpers;
