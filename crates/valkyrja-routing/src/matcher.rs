//! Route matching.
//!
//! Lookup order:
//! 1. static index, exact path and method
//! 2. dynamic routes for the method, in registration order; the first regex
//!    that matches wins, even when a later route would match too
//!
//! Paths are not normalized: `/foo` and `/foo/` are different paths.

use std::sync::Arc;

use crate::collection::RouteCollection;
use crate::request::{Method, PathParams};
use crate::route::Route;

/// A matched route with extracted parameters.
#[derive(Debug, Clone)]
pub struct RouteMatch<'a> {
    /// The matched route.
    pub route: &'a Arc<Route>,
    /// Extracted path parameters.
    pub parameters: PathParams,
}

/// Result of attempting to locate a route by path and method.
#[derive(Debug, Clone)]
pub enum RouteLookup<'a> {
    /// A route matched by path and method.
    Match(RouteMatch<'a>),
    /// Path matched, but method is not allowed.
    MethodNotAllowed { allowed: AllowedMethods },
    /// No route matched the path.
    NotFound,
}

/// Allowed methods for a matched path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllowedMethods {
    methods: Vec<Method>,
}

impl AllowedMethods {
    /// Create a sorted, de-duplicated allow list.
    #[must_use]
    pub fn new(mut methods: Vec<Method>) -> Self {
        methods.sort();
        methods.dedup();
        Self { methods }
    }

    /// Access the normalized methods.
    #[must_use]
    pub fn methods(&self) -> &[Method] {
        &self.methods
    }

    /// Check whether a method is allowed.
    #[must_use]
    pub fn contains(&self, method: Method) -> bool {
        self.methods.contains(&method)
    }

    /// Format as an HTTP Allow header value.
    #[must_use]
    pub fn header_value(&self) -> String {
        self.methods
            .iter()
            .map(Method::as_str)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Resolves requests against a frozen route collection.
#[derive(Debug, Clone, Default)]
pub struct Matcher {
    routes: Arc<RouteCollection>,
}

impl Matcher {
    /// Creates a matcher over a collection.
    #[must_use]
    pub fn new(routes: Arc<RouteCollection>) -> Self {
        Self { routes }
    }

    /// Returns the collection being matched against.
    #[must_use]
    pub fn routes(&self) -> &RouteCollection {
        &self.routes
    }

    /// Finds the route for a method and path.
    ///
    /// # Example
    ///
    /// ```
    /// use std::sync::Arc;
    /// use valkyrja_routing::{Matcher, Method, Route, RouteCollection};
    ///
    /// let mut routes = RouteCollection::default();
    /// routes.add(Route::new("user.show", "/users/{id:num}", "users.show").unwrap()).unwrap();
    /// let matcher = Matcher::new(Arc::new(routes));
    ///
    /// let found = matcher.match_route(Method::Get, "/users/7").unwrap();
    /// assert_eq!(found.route.name(), "user.show");
    /// assert_eq!(found.parameters.get("id"), Some("7"));
    /// assert!(matcher.match_route(Method::Get, "/users/seven").is_none());
    /// ```
    #[must_use]
    pub fn match_route(&self, method: Method, path: &str) -> Option<RouteMatch<'_>> {
        if let Some(route) = self.routes.static_route(path, method) {
            return Some(RouteMatch {
                route,
                parameters: PathParams::new(),
            });
        }

        self.routes
            .dynamic_routes(method)
            .iter()
            .find_map(|route| {
                route
                    .captures(path)
                    .map(|parameters| RouteMatch { route, parameters })
            })
    }

    /// Like [`Matcher::match_route`], but tells "wrong method" from "no route".
    #[must_use]
    pub fn lookup(&self, method: Method, path: &str) -> RouteLookup<'_> {
        if let Some(found) = self.match_route(method, path) {
            return RouteLookup::Match(found);
        }

        let mut allowed: Vec<Method> = self.routes.static_methods(path).collect();
        for other in Method::ALL {
            if other != method
                && !allowed.contains(&other)
                && self
                    .routes
                    .dynamic_routes(other)
                    .iter()
                    .any(|route| route.is_match(path))
            {
                allowed.push(other);
            }
        }

        if allowed.is_empty() {
            RouteLookup::NotFound
        } else {
            RouteLookup::MethodNotAllowed {
                allowed: AllowedMethods::new(allowed),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matcher(routes: &[(&str, &str, &[Method])]) -> Matcher {
        let mut collection = RouteCollection::default();
        for (name, path, methods) in routes {
            let route = Route::new(*name, path, "h")
                .unwrap()
                .with_methods(methods.iter().copied());
            collection.add(route).unwrap();
        }
        Matcher::new(Arc::new(collection))
    }

    fn matched_name(matcher: &Matcher, method: Method, path: &str) -> Option<String> {
        matcher
            .match_route(method, path)
            .map(|m| m.route.name().to_string())
    }

    #[test]
    fn test_static_exactness() {
        let m = matcher(&[("about", "/about", &[Method::Get])]);
        let found = m.match_route(Method::Get, "/about").unwrap();
        assert_eq!(found.route.name(), "about");
        assert!(found.parameters.is_empty());
        assert!(m.match_route(Method::Get, "/about/").is_none());
    }

    #[test]
    fn test_trailing_slash_needs_its_own_route() {
        let m = matcher(&[
            ("about", "/about", &[Method::Get]),
            ("about.slash", "/about/", &[Method::Get]),
        ]);
        assert_eq!(matched_name(&m, Method::Get, "/about/").as_deref(), Some("about.slash"));
    }

    #[test]
    fn test_dynamic_extraction() {
        let m = matcher(&[("home", "/home/{id:num}", &[Method::Get])]);
        let found = m.match_route(Method::Get, "/home/42").unwrap();
        let expected: PathParams = [("id", "42")].into_iter().collect();
        assert_eq!(found.parameters, expected);
        assert!(m.match_route(Method::Get, "/home/abc").is_none());
    }

    #[test]
    fn test_first_registered_wins() {
        let m = matcher(&[
            ("a", "/{first}", &[Method::Get]),
            ("b", "/{second:alpha}", &[Method::Get]),
        ]);
        for _ in 0..10 {
            let found = m.match_route(Method::Get, "/x").unwrap();
            assert_eq!(found.route.name(), "a");
            assert_eq!(found.parameters.get("first"), Some("x"));
        }
    }

    #[test]
    fn test_static_checked_before_dynamic() {
        let m = matcher(&[
            ("catch", "/{page}", &[Method::Get]),
            ("about", "/about", &[Method::Get]),
        ]);
        assert_eq!(matched_name(&m, Method::Get, "/about").as_deref(), Some("about"));
        assert_eq!(matched_name(&m, Method::Get, "/other").as_deref(), Some("catch"));
    }

    #[test]
    fn test_anchoring() {
        let m = matcher(&[("a", "/a/{id:num}", &[Method::Get])]);
        assert!(m.match_route(Method::Get, "/a/12").is_some());
        assert!(m.match_route(Method::Get, "/a/12/extra").is_none());
        assert!(m.match_route(Method::Get, "/x/a/12").is_none());
    }

    #[test]
    fn test_method_mismatch() {
        let m = matcher(&[
            ("home", "/", &[Method::Get]),
            ("user", "/users/{id:num}", &[Method::Get, Method::Delete]),
        ]);
        assert!(m.match_route(Method::Post, "/").is_none());

        match m.lookup(Method::Post, "/") {
            RouteLookup::MethodNotAllowed { allowed } => {
                assert_eq!(allowed.methods(), [Method::Get]);
            }
            other => panic!("expected 405, got {other:?}"),
        }

        match m.lookup(Method::Put, "/users/3") {
            RouteLookup::MethodNotAllowed { allowed } => {
                assert_eq!(allowed.header_value(), "GET, DELETE");
                assert!(allowed.contains(Method::Delete));
            }
            other => panic!("expected 405, got {other:?}"),
        }

        assert!(matches!(m.lookup(Method::Get, "/nowhere"), RouteLookup::NotFound));
        assert!(matches!(m.lookup(Method::Put, "/users/x"), RouteLookup::NotFound));
    }

    #[test]
    fn test_lookup_match() {
        let m = matcher(&[("home", "/", &[Method::Get])]);
        assert!(matches!(m.lookup(Method::Get, "/"), RouteLookup::Match(_)));
    }

    #[test]
    fn test_allowed_methods_normalized() {
        let allowed = AllowedMethods::new(vec![Method::Post, Method::Get, Method::Post]);
        assert_eq!(allowed.methods(), [Method::Get, Method::Post]);
        assert_eq!(allowed.header_value(), "GET, POST");
    }

    #[test]
    fn test_empty_matcher() {
        let m = Matcher::default();
        assert!(matches!(m.lookup(Method::Get, "/"), RouteLookup::NotFound));
    }
}
