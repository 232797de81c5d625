//! Application route table and target resolution.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RouteName {
    Login,
    Landing,
    Register,
    VerifyEmail,
    AccountSettings,
}

impl RouteName {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Login => "Login",
            Self::Landing => "Landing",
            Self::Register => "Register",
            Self::VerifyEmail => "VerifyEmail",
            Self::AccountSettings => "AccountSettings",
        }
    }
}

impl fmt::Display for RouteName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Route {
    pub name: RouteName,
    pub path: &'static str,
    pub requires_auth: bool,
}

pub const ROUTES: &[Route] = &[
    Route { name: RouteName::Login, path: "/", requires_auth: false },
    Route { name: RouteName::Landing, path: "/landing", requires_auth: true },
    Route { name: RouteName::Register, path: "/register", requires_auth: false },
    Route { name: RouteName::VerifyEmail, path: "/verify-email", requires_auth: false },
    Route { name: RouteName::AccountSettings, path: "/account", requires_auth: true },
];

/// Unauthenticated users land here.
pub const LOGIN: RouteName = RouteName::Login;
/// Authenticated users visiting the login page land here.
pub const LANDING: RouteName = RouteName::Landing;

#[must_use]
pub fn route(name: RouteName) -> &'static Route {
    // Every variant has exactly one entry.
    ROUTES.iter().find(|r| r.name == name).unwrap_or(&ROUTES[0])
}

/// Strip query and fragment and normalize the trailing slash.
fn normalize(full_path: &str) -> &str {
    let end = full_path.find(['?', '#']).unwrap_or(full_path.len());
    let path = full_path[..end].trim_end_matches('/');
    if path.is_empty() { "/" } else { path }
}

#[must_use]
pub fn find_by_path(full_path: &str) -> Option<&'static Route> {
    let path = normalize(full_path);
    ROUTES.iter().find(|r| r.path == path)
}

/// A navigation destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    /// As requested, including query and fragment.
    pub full_path: String,
    /// Normalized path used for matching.
    pub path: String,
    /// `None` for paths outside the route table.
    pub route: Option<&'static Route>,
}

impl Target {
    #[must_use]
    pub fn resolve(full_path: &str) -> Self {
        let full_path = if full_path.starts_with('/') { full_path.to_owned() } else { format!("/{full_path}") };
        let path = normalize(&full_path).to_owned();
        let route = find_by_path(&path);
        Self { full_path, path, route }
    }

    #[must_use]
    pub fn named(name: RouteName) -> Self {
        Self::resolve(route(name).path)
    }

    #[must_use]
    pub fn requires_auth(&self) -> bool {
        self.route.is_some_and(|r| r.requires_auth)
    }

    #[must_use]
    pub fn is(&self, name: RouteName) -> bool {
        self.route.is_some_and(|r| r.name == name)
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.full_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_route_name_resolves() {
        for r in ROUTES {
            assert_eq!(route(r.name), r);
            assert_eq!(Target::named(r.name).route, Some(r));
        }
    }

    #[test]
    fn only_landing_and_account_require_auth() {
        let guarded: Vec<_> = ROUTES.iter().filter(|r| r.requires_auth).map(|r| r.name).collect();
        assert_eq!(guarded, vec![RouteName::Landing, RouteName::AccountSettings]);
    }

    #[test]
    fn resolve_ignores_query_fragment_and_trailing_slash() {
        let t = Target::resolve("/account/?tab=profile#security");
        assert!(t.is(RouteName::AccountSettings));
        assert_eq!(t.path, "/account");
        assert_eq!(t.full_path, "/account/?tab=profile#security");
    }

    #[test]
    fn resolve_root_variants_hit_login() {
        assert!(Target::resolve("/").is(RouteName::Login));
        assert!(Target::resolve("/?next=/landing").is(RouteName::Login));
        assert!(Target::resolve("").is(RouteName::Login));
    }

    #[test]
    fn resolve_adds_leading_slash() {
        let t = Target::resolve("landing");
        assert_eq!(t.full_path, "/landing");
        assert!(t.requires_auth());
    }

    #[test]
    fn unknown_path_is_unmatched_and_public() {
        let t = Target::resolve("/does/not/exist");
        assert!(t.route.is_none());
        assert!(!t.requires_auth());
        assert!(find_by_path("/landing/extra").is_none());
    }
}
