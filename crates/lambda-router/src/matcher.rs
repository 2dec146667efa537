//! Path template matching.
//!
//! Templates are literal paths whose segments may be `{name}` tokens. Matching
//! tries an exact literal hit across the whole table first, then a
//! segment-by-segment walk in registration order. Registration order is the
//! only tie-break.

use std::collections::BTreeMap;

use http::Method;

/// A registered `(method, template)` pair and its payload.
#[derive(Debug, Clone)]
pub struct Route<T> {
    pub method: Method,
    pub path: String,
    pub target: T,
}

/// Outcome of matching a request against a [`RouteTable`].
#[derive(Debug)]
pub enum RouteMatch<'a, T> {
    /// A route matched; `params` holds the captured `{token}` values.
    Matched {
        route: &'a Route<T>,
        params: BTreeMap<String, String>,
    },
    /// The path matched routes registered under other methods.
    MethodNotAllowed { allowed: Vec<Method> },
    /// Nothing matched.
    NotFound,
}

/// Append-only, ordered route table.
#[derive(Debug, Clone)]
pub struct RouteTable<T> {
    routes: Vec<Route<T>>,
}

impl<T> Default for RouteTable<T> {
    fn default() -> Self {
        Self { routes: Vec::new() }
    }
}

impl<T> RouteTable<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, method: Method, path: impl Into<String>, target: T) {
        self.routes.push(Route {
            method,
            path: path.into(),
            target,
        });
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Route<T>> {
        self.routes.iter()
    }

    /// Find the route for `(method, path)`.
    pub fn find(&self, method: &Method, path: &str) -> RouteMatch<'_, T> {
        if let Some(route) = self
            .routes
            .iter()
            .find(|route| route.method == *method && route.path == path)
        {
            return RouteMatch::Matched {
                route,
                params: BTreeMap::new(),
            };
        }

        for route in self.routes.iter().filter(|route| route.method == *method) {
            if let Some(params) = match_path_parts(path, &route.path) {
                return RouteMatch::Matched { route, params };
            }
        }

        let mut allowed: Vec<Method> = Vec::new();
        for route in &self.routes {
            let path_matches = route.path == path || match_path_parts(path, &route.path).is_some();
            if path_matches && !allowed.contains(&route.method) {
                allowed.push(route.method.clone());
            }
        }

        if allowed.is_empty() {
            RouteMatch::NotFound
        } else {
            RouteMatch::MethodNotAllowed { allowed }
        }
    }
}

/// The parameter name of a `{name}` segment.
fn token_name(segment: &str) -> Option<&str> {
    let name = segment.strip_prefix('{')?.strip_suffix('}')?;
    let valid = !name.is_empty() && name.chars().all(|c| c.is_alphanumeric() || c == '_');
    valid.then_some(name)
}

/// Match a request path against one template, capturing token values.
///
/// Segment counts must agree. Index 0 is the empty string before the leading
/// slash and is skipped.
pub fn match_path_parts(path: &str, template: &str) -> Option<BTreeMap<String, String>> {
    let path_parts: Vec<&str> = path.split('/').collect();
    let template_parts: Vec<&str> = template.split('/').collect();

    if path_parts.len() != template_parts.len() {
        return None;
    }

    let mut tokens = BTreeMap::new();
    for (path_part, template_part) in path_parts.iter().zip(&template_parts).skip(1) {
        if let Some(name) = token_name(template_part) {
            tokens.insert(name.to_string(), path_part.to_string());
            continue;
        }

        if template_part != path_part {
            return None;
        }
    }

    Some(tokens)
}
