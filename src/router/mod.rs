//! Client-side routing: the route table and the auth navigation guard.

pub mod guard;
pub mod routes;

pub use guard::{Decision, Navigation, NavigationGuard, decide};
pub use routes::{Route, RouteName, Target};
