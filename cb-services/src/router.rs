//! Route table and navigation guards.
//!
//! The authenticated area hangs off `/` (home) with `account`, `settings`
//! and `chat/:chatId?` as children; the parent's guard runs for every
//! child. The sign-up, sign-in and confirmation pages are only reachable
//! while signed out.

use std::collections::HashMap;

use tracing::debug;

use crate::session::SessionHandle;

/// Named routes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RouteName {
    Home,
    Account,
    Settings,
    Chat,
    SignUp,
    SignIn,
    Confirmation,
}

impl RouteName {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Home => "home",
            Self::Account => "account",
            Self::Settings => "settings",
            Self::Chat => "chat",
            Self::SignUp => "sign-up",
            Self::SignIn => "sign-in",
            Self::Confirmation => "confirmation",
        }
    }

    /// Path to navigate to this route without parameters.
    pub fn path(&self) -> &'static str {
        match self {
            Self::Home => "/",
            Self::Account => "/account",
            Self::Settings => "/settings",
            Self::Chat => "/chat",
            Self::SignUp => "/sign-up",
            Self::SignIn => "/sign-in",
            Self::Confirmation => "/confirmation",
        }
    }
}

impl std::fmt::Display for RouteName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Guard attached to a route record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Guard {
    RequireAuth,
    RequireNoAuth,
}

/// Result of running a guard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardOutcome {
    Proceed,
    Redirect(RouteName),
}

/// Allow signed-in users; send everyone else to sign-in.
pub fn require_auth(session: &SessionHandle) -> GuardOutcome {
    if session.is_logged_in() {
        GuardOutcome::Proceed
    } else {
        GuardOutcome::Redirect(RouteName::SignIn)
    }
}

/// Allow signed-out users; send everyone else home.
pub fn require_no_auth(session: &SessionHandle) -> GuardOutcome {
    if session.is_logged_in() {
        GuardOutcome::Redirect(RouteName::Home)
    } else {
        GuardOutcome::Proceed
    }
}

impl Guard {
    pub fn check(&self, session: &SessionHandle) -> GuardOutcome {
        match self {
            Guard::RequireAuth => require_auth(session),
            Guard::RequireNoAuth => require_no_auth(session),
        }
    }
}

/// Static route metadata, merged from parent to child. Guards do not read it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RouteMeta {
    pub requires_auth: bool,
}

/// One record of the route table.
#[derive(Debug, Clone)]
pub struct RouteRecord {
    /// Absolute for top-level records, relative for children.
    pub path: &'static str,
    pub name: RouteName,
    pub guard: Option<Guard>,
    pub meta: RouteMeta,
    pub children: Vec<RouteRecord>,
}

impl RouteRecord {
    fn leaf(path: &'static str, name: RouteName, guard: Option<Guard>) -> Self {
        Self {
            path,
            name,
            guard,
            meta: RouteMeta::default(),
            children: Vec::new(),
        }
    }
}

/// The application's route table.
pub fn routes() -> Vec<RouteRecord> {
    vec![
        RouteRecord {
            path: "/",
            name: RouteName::Home,
            guard: Some(Guard::RequireAuth),
            meta: RouteMeta { requires_auth: true },
            children: vec![
                RouteRecord::leaf("account", RouteName::Account, None),
                RouteRecord::leaf("settings", RouteName::Settings, None),
                RouteRecord::leaf("chat/:chatId?", RouteName::Chat, None),
            ],
        },
        RouteRecord::leaf("/sign-up", RouteName::SignUp, Some(Guard::RequireNoAuth)),
        RouteRecord::leaf("/sign-in", RouteName::SignIn, Some(Guard::RequireNoAuth)),
        RouteRecord::leaf("/confirmation", RouteName::Confirmation, Some(Guard::RequireNoAuth)),
    ]
}

/// A path matched against the table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedRoute {
    pub name: RouteName,
    pub params: HashMap<String, String>,
    /// Guards of the matched record and its parents, outermost first.
    pub guards: Vec<Guard>,
    pub meta: RouteMeta,
}

impl ResolvedRoute {
    /// The `chatId` parameter of the chat route.
    pub fn chat_id(&self) -> Option<&str> {
        self.params.get("chatId").map(String::as_str)
    }
}

/// Outcome of a navigation attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Navigation {
    Proceed(ResolvedRoute),
    Redirect { to: RouteName },
    NotFound,
}

impl Navigation {
    /// Path the navigation ends on, if any.
    pub fn target_path(&self) -> Option<&'static str> {
        match self {
            Navigation::Proceed(route) => Some(route.name.path()),
            Navigation::Redirect { to } => Some(to.path()),
            Navigation::NotFound => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Router {
    routes: Vec<RouteRecord>,
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

impl Router {
    pub fn new() -> Self {
        Self { routes: routes() }
    }

    pub fn records(&self) -> &[RouteRecord] {
        &self.routes
    }

    /// Match a path. The query string and fragment are ignored.
    pub fn resolve(&self, path: &str) -> Option<ResolvedRoute> {
        let path = path.split(['?', '#']).next().unwrap_or("");
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

        for record in &self.routes {
            let base = split_pattern(record.path);
            for child in &record.children {
                let mut pattern = base.clone();
                pattern.extend(split_pattern(child.path));
                if let Some(params) = match_segments(&pattern, &segments) {
                    let mut guards: Vec<Guard> = record.guard.into_iter().collect();
                    guards.extend(child.guard);
                    return Some(ResolvedRoute {
                        name: child.name,
                        params,
                        guards,
                        meta: RouteMeta {
                            requires_auth: record.meta.requires_auth || child.meta.requires_auth,
                        },
                    });
                }
            }
            if let Some(params) = match_segments(&base, &segments) {
                return Some(ResolvedRoute {
                    name: record.name,
                    params,
                    guards: record.guard.into_iter().collect(),
                    meta: record.meta,
                });
            }
        }
        None
    }

    /// Resolve `path` and run its guards against `session`.
    pub fn navigate(&self, path: &str, session: &SessionHandle) -> Navigation {
        let Some(route) = self.resolve(path) else {
            debug!("no route for {path}");
            return Navigation::NotFound;
        };

        for guard in &route.guards {
            if let GuardOutcome::Redirect(to) = guard.check(session) {
                debug!("navigation to {path} redirected to {to}");
                return Navigation::Redirect { to };
            }
        }
        Navigation::Proceed(route)
    }
}

fn split_pattern(pattern: &str) -> Vec<&str> {
    pattern.split('/').filter(|s| !s.is_empty()).collect()
}

/// Match path segments against a pattern with `:name` and `:name?` parameters.
fn match_segments(pattern: &[&str], segments: &[&str]) -> Option<HashMap<String, String>> {
    let mut params = HashMap::new();
    let mut index = 0;

    for part in pattern {
        match part.strip_prefix(':') {
            Some(param) => {
                let (name, optional) = match param.strip_suffix('?') {
                    Some(name) => (name, true),
                    None => (param, false),
                };
                match segments.get(index) {
                    Some(value) => {
                        params.insert(name.to_string(), (*value).to_string());
                        index += 1;
                    }
                    None if optional => {}
                    None => return None,
                }
            }
            None => {
                if segments.get(index) != Some(part) {
                    return None;
                }
                index += 1;
            }
        }
    }

    (index == segments.len()).then_some(params)
}
