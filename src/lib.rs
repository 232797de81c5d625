//! Session synchronization and route guarding for the taskboard client.
//!
//! SYSTEM CONTEXT
//! ==============
//! The identity provider (Supabase GoTrue) issues sessions; the `user` table
//! maps each provider user to an application `userid` and role. The
//! [`services::session::SessionSynchronizer`] keeps [`state::SessionStore`]
//! in step with both, and [`router::NavigationGuard`] gates navigation on
//! the stored session.

pub mod backend;
pub mod config;
pub mod http;
pub mod router;
pub mod services;
pub mod state;
pub mod storage;
pub mod supabase;
