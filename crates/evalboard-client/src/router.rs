//! Navigation table and pre-navigation guard.

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

pub const LOGIN_PATH: &str = "/auth/login";
pub const HOME_PATH: &str = "/";
pub const NOT_FOUND_PATH: &str = "/404";
pub const TITLE_SUFFIX: &str = "TweetEval NLP Platform";

const MAX_REDIRECTS: usize = 4;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RouteMeta {
    pub requires_auth: bool,
    pub requires_guest: bool,
    pub title: Option<&'static str>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Route {
    pub name: &'static str,
    /// Segments starting with `:` capture a parameter.
    pub path: &'static str,
    pub meta: RouteMeta,
}

impl Route {
    const fn authed(name: &'static str, path: &'static str, title: &'static str) -> Self {
        Self {
            name,
            path,
            meta: RouteMeta {
                requires_auth: true,
                requires_guest: false,
                title: Some(title),
            },
        }
    }

    const fn guest(name: &'static str, path: &'static str, title: &'static str) -> Self {
        Self {
            name,
            path,
            meta: RouteMeta {
                requires_auth: false,
                requires_guest: true,
                title: Some(title),
            },
        }
    }

    fn matches(&self, path: &str) -> Option<Vec<(String, String)>> {
        let patternSegments: Vec<&str> = split_segments(self.path);
        let pathSegments: Vec<&str> = split_segments(path);
        if patternSegments.len() != pathSegments.len() {
            return None;
        }
        let mut params = Vec::new();
        for (pattern, actual) in patternSegments.iter().zip(pathSegments.iter()) {
            if let Some(name) = pattern.strip_prefix(':') {
                params.push((name.to_string(), actual.to_string()));
            } else if pattern != actual {
                return None;
            }
        }
        Some(params)
    }
}

fn split_segments(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}

/// A path plus query string.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Location {
    pub path: String,
    pub query: Vec<(String, String)>,
}

impl Location {
    pub fn parse(fullPath: &str) -> Self {
        let (path, query) = match fullPath.split_once('?') {
            Some((p, q)) => (p, q),
            None => (fullPath, ""),
        };
        let query = url::form_urlencoded::parse(query.as_bytes())
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        let path = if path.is_empty() { HOME_PATH } else { path };
        Self {
            path: path.to_string(),
            query,
        }
    }

    pub fn full_path(&self) -> String {
        if self.query.is_empty() {
            return self.path.clone();
        }
        let query = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(self.query.iter())
            .finish();
        format!("{}?{query}", self.path)
    }

    pub fn query_value(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RouteMatch {
    pub route: Route,
    pub location: Location,
    pub params: Vec<(String, String)>,
}

impl RouteMatch {
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn page_title(&self) -> Option<String> {
        self.route
            .meta
            .title
            .map(|title| format!("{title} - {TITLE_SUFFIX}"))
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NavigationDecision {
    Proceed(RouteMatch),
    Redirect(Location),
}

#[derive(Clone, Debug)]
pub struct RouteTable {
    routes: Vec<Route>,
}

impl Default for RouteTable {
    fn default() -> Self {
        Self::new(vec![
            Route::authed("Dashboard", "/", "Dashboard"),
            Route::guest("Login", LOGIN_PATH, "Login"),
            Route::guest("Register", "/auth/register", "Register"),
            Route::authed("Datasets", "/datasets", "Datasets"),
            Route::authed("DatasetUpload", "/datasets/upload", "Upload Dataset"),
            Route::authed("DatasetDetail", "/datasets/:id", "Dataset Details"),
            Route::authed("Search", "/search", "Search"),
            Route::authed("Analytics", "/analytics", "Analytics"),
            Route::authed("Profile", "/profile", "Profile"),
            Route::authed("Tasks", "/tasks", "Tasks"),
            Route {
                name: "NotFound",
                path: NOT_FOUND_PATH,
                meta: RouteMeta {
                    title: Some("Page Not Found"),
                    ..Default::default()
                },
            },
        ])
    }
}

impl RouteTable {
    pub fn new(routes: Vec<Route>) -> Self {
        Self { routes }
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    /// First route matching the path, in table order. Static routes listed
    /// before parameterised siblings win.
    pub fn resolve(&self, location: &Location) -> Option<RouteMatch> {
        self.routes.iter().find_map(|route| {
            route.matches(&location.path).map(|params| RouteMatch {
                route: route.clone(),
                location: location.clone(),
                params,
            })
        })
    }

    pub fn guard(&self, to: &Location, isAuthenticated: bool) -> NavigationDecision {
        let Some(matched) = self.resolve(to) else {
            return NavigationDecision::Redirect(Location::parse(NOT_FOUND_PATH));
        };

        if matched.route.meta.requires_auth && !isAuthenticated {
            return NavigationDecision::Redirect(Location {
                path: LOGIN_PATH.to_string(),
                query: vec![("redirect".to_string(), to.full_path())],
            });
        }
        if matched.route.meta.requires_guest && isAuthenticated {
            return NavigationDecision::Redirect(Location::parse(HOME_PATH));
        }
        NavigationDecision::Proceed(matched)
    }
}

/// Holds the current location and applies the guard on every navigation.
#[derive(Clone)]
pub struct Navigator {
    table: Arc<RouteTable>,
    current: Arc<RwLock<Location>>,
}

impl Navigator {
    pub fn new(table: RouteTable) -> Self {
        Self {
            table: Arc::new(table),
            current: Arc::new(RwLock::new(Location::parse(HOME_PATH))),
        }
    }

    pub fn table(&self) -> &RouteTable {
        &self.table
    }

    pub fn current(&self) -> Location {
        self.current.read().clone()
    }

    /// Follows guard redirects until a route is accepted.
    pub fn navigate(&self, to: &str, isAuthenticated: bool) -> Option<RouteMatch> {
        let mut target = Location::parse(to);
        for _ in 0..MAX_REDIRECTS {
            match self.table.guard(&target, isAuthenticated) {
                NavigationDecision::Proceed(matched) => {
                    *self.current.write() = matched.location.clone();
                    return Some(matched);
                }
                NavigationDecision::Redirect(next) => {
                    debug!("guard redirected {} to {}", target.full_path(), next.full_path());
                    target = next;
                }
            }
        }
        None
    }

    /// Sends the user to the login entry point unless already there.
    pub fn redirect_to_login(&self) {
        let mut current = self.current.write();
        if current.path != LOGIN_PATH {
            *current = Location::parse(LOGIN_PATH);
        }
    }

    /// Where a successful login should land: the preserved `redirect`, or home.
    pub fn post_login_target(&self) -> String {
        self.current
            .read()
            .query_value("redirect")
            .unwrap_or(HOME_PATH)
            .to_string()
    }
}

impl Default for Navigator {
    fn default() -> Self {
        Self::new(RouteTable::default())
    }
}
