//! Route storage and indices.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use tracing::warn;

use crate::error::{Result, RouterError};
use crate::request::Method;
use crate::route::Route;

/// The registered routes.
///
/// Every route is indexed by name and, for each of its methods, either in
/// the static index (exact path) or in the dynamic index (registration
/// order, tried by regex).
#[derive(Debug, Clone)]
pub struct RouteCollection {
    strict: bool,
    routes: Vec<Arc<Route>>,
    by_name: HashMap<String, Arc<Route>>,
    static_routes: HashMap<String, HashMap<Method, Arc<Route>>>,
    dynamic_routes: HashMap<Method, Vec<Arc<Route>>>,
}

impl Default for RouteCollection {
    fn default() -> Self {
        Self::new(true)
    }
}

impl RouteCollection {
    /// Creates an empty collection.
    ///
    /// In strict mode a duplicate route name is an error; otherwise the later
    /// registration replaces the earlier one.
    #[must_use]
    pub fn new(strict: bool) -> Self {
        Self {
            strict,
            routes: Vec::new(),
            by_name: HashMap::new(),
            static_routes: HashMap::new(),
            dynamic_routes: HashMap::new(),
        }
    }

    /// Returns whether duplicate names are rejected.
    #[must_use]
    pub fn is_strict(&self) -> bool {
        self.strict
    }

    /// Registers a route.
    pub fn add(&mut self, route: impl Into<Arc<Route>>) -> Result<Arc<Route>> {
        let route = route.into();

        if route.methods().is_empty() {
            return Err(RouterError::InvalidRoutePath {
                path: route.path().to_string(),
                reason: format!("route `{}` declares no request methods", route.name()),
            });
        }

        if self.strict && self.by_name.contains_key(route.name()) {
            return Err(RouterError::DuplicateRouteName(route.name().to_string()));
        }

        if route.is_static() {
            if let Some(by_method) = self.static_routes.get(route.path()) {
                for method in route.methods() {
                    match by_method.get(method) {
                        Some(existing) if existing.name() != route.name() => {
                            return Err(RouterError::DuplicateRoutePath {
                                method: method.to_string(),
                                path: route.path().to_string(),
                                existing: existing.name().to_string(),
                            });
                        }
                        _ => {}
                    }
                }
            }
        }

        if let Some(previous) = self.remove(route.name()) {
            warn!(
                name = route.name(),
                previous = previous.path(),
                path = route.path(),
                "route replaced"
            );
        }

        for method in route.methods() {
            if route.is_static() {
                self.static_routes
                    .entry(route.path().to_string())
                    .or_default()
                    .insert(*method, Arc::clone(&route));
            } else {
                self.dynamic_routes
                    .entry(*method)
                    .or_default()
                    .push(Arc::clone(&route));
            }
        }
        self.by_name
            .insert(route.name().to_string(), Arc::clone(&route));
        self.routes.push(Arc::clone(&route));

        Ok(route)
    }

    /// Removes a route from every index.
    pub fn remove(&mut self, name: &str) -> Option<Arc<Route>> {
        let route = self.by_name.remove(name)?;

        self.routes.retain(|r| !Arc::ptr_eq(r, &route));

        if route.is_static() {
            if let Some(by_method) = self.static_routes.get_mut(route.path()) {
                by_method.retain(|_, r| !Arc::ptr_eq(r, &route));
                if by_method.is_empty() {
                    self.static_routes.remove(route.path());
                }
            }
        } else {
            for method in route.methods() {
                if let Some(list) = self.dynamic_routes.get_mut(method) {
                    list.retain(|r| !Arc::ptr_eq(r, &route));
                    if list.is_empty() {
                        self.dynamic_routes.remove(method);
                    }
                }
            }
        }

        Some(route)
    }

    /// Gets a route by name.
    pub fn get(&self, name: &str) -> Result<&Arc<Route>> {
        self.by_name
            .get(name)
            .ok_or_else(|| RouterError::RouteNotFound(name.to_string()))
    }

    /// Returns whether a route with this name exists.
    #[must_use]
    pub fn has(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    /// Returns every route keyed by name, sorted by name.
    #[must_use]
    pub fn all_flattened(&self) -> BTreeMap<&str, &Arc<Route>> {
        self.by_name
            .iter()
            .map(|(name, route)| (name.as_str(), route))
            .collect()
    }

    /// Iterates routes in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<Route>> {
        self.routes.iter()
    }

    /// Returns the number of routes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    /// Returns whether no routes are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Returns the number of static routes.
    #[must_use]
    pub fn static_count(&self) -> usize {
        self.routes.iter().filter(|r| r.is_static()).count()
    }

    /// Returns the number of dynamic routes.
    #[must_use]
    pub fn dynamic_count(&self) -> usize {
        self.len() - self.static_count()
    }

    /// Looks up a static route by exact path and method.
    #[must_use]
    pub fn static_route(&self, path: &str, method: Method) -> Option<&Arc<Route>> {
        self.static_routes.get(path)?.get(&method)
    }

    /// Returns the methods with a static route at exactly this path.
    pub fn static_methods(&self, path: &str) -> impl Iterator<Item = Method> + '_ {
        self.static_routes
            .get(path)
            .into_iter()
            .flat_map(|by_method| by_method.keys().copied())
    }

    /// Returns the dynamic routes for a method in registration order.
    #[must_use]
    pub fn dynamic_routes(&self, method: Method) -> &[Arc<Route>] {
        self.dynamic_routes
            .get(&method)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn route(name: &str, path: &str) -> Route {
        Route::new(name, path, "h").unwrap()
    }

    #[test]
    fn test_add_and_get() {
        let mut routes = RouteCollection::default();
        routes.add(route("home", "/")).unwrap();
        routes.add(route("user", "/users/{id:num}")).unwrap();

        assert!(routes.has("home"));
        assert_eq!(routes.get("user").unwrap().path(), "/users/{id:num}");
        assert_eq!(routes.len(), 2);
        assert_eq!(routes.static_count(), 1);
        assert_eq!(routes.dynamic_count(), 1);
        assert!(routes.static_route("/", Method::Get).is_some());
        assert_eq!(routes.dynamic_routes(Method::Get).len(), 1);
        assert!(routes.dynamic_routes(Method::Post).is_empty());
    }

    #[test]
    fn test_get_missing() {
        let routes = RouteCollection::default();
        assert!(matches!(
            routes.get("nope"),
            Err(RouterError::RouteNotFound(name)) if name == "nope"
        ));
    }

    #[test]
    fn test_strict_duplicate_name() {
        let mut routes = RouteCollection::new(true);
        routes.add(route("home", "/")).unwrap();
        let err = routes.add(route("home", "/other")).unwrap_err();
        assert!(matches!(err, RouterError::DuplicateRouteName(name) if name == "home"));
        assert_eq!(routes.get("home").unwrap().path(), "/");
    }

    #[test]
    fn test_lenient_duplicate_name_replaces() {
        let mut routes = RouteCollection::new(false);
        routes.add(route("page", "/old")).unwrap();
        routes.add(route("page", "/new/{slug}")).unwrap();

        assert_eq!(routes.len(), 1);
        assert_eq!(routes.get("page").unwrap().path(), "/new/{slug}");
        assert!(routes.static_route("/old", Method::Get).is_none());
        assert_eq!(routes.static_methods("/old").count(), 0);
        assert_eq!(routes.dynamic_routes(Method::Get).len(), 1);
    }

    #[test]
    fn test_duplicate_static_path() {
        let mut routes = RouteCollection::new(false);
        routes.add(route("a", "/same")).unwrap();
        let err = routes.add(route("b", "/same")).unwrap_err();
        assert!(matches!(
            err,
            RouterError::DuplicateRoutePath { ref existing, .. } if existing == "a"
        ));

        // a different method on the same path is fine
        routes
            .add(route("c", "/same").with_methods([Method::Post]))
            .unwrap();
        let mut methods: Vec<_> = routes.static_methods("/same").collect();
        methods.sort();
        assert_eq!(methods, [Method::Get, Method::Post]);
    }

    #[test]
    fn test_multi_method_indexing() {
        let mut routes = RouteCollection::default();
        routes
            .add(route("item", "/items/{id}").with_methods([Method::Get, Method::Put]))
            .unwrap();
        assert_eq!(routes.dynamic_routes(Method::Get).len(), 1);
        assert_eq!(routes.dynamic_routes(Method::Put).len(), 1);
        assert!(routes.dynamic_routes(Method::Delete).is_empty());
    }

    #[test]
    fn test_dynamic_registration_order() {
        let mut routes = RouteCollection::default();
        routes.add(route("first", "/{a}")).unwrap();
        routes.add(route("second", "/{b}")).unwrap();
        let names: Vec<_> = routes
            .dynamic_routes(Method::Get)
            .iter()
            .map(|r| r.name())
            .collect();
        assert_eq!(names, ["first", "second"]);
    }

    #[test]
    fn test_remove_clears_indices() {
        let mut routes = RouteCollection::default();
        routes
            .add(route("s", "/s").with_methods([Method::Get, Method::Post]))
            .unwrap();
        routes.add(route("d", "/d/{id}")).unwrap();

        assert!(routes.remove("s").is_some());
        assert!(routes.remove("d").is_some());
        assert!(routes.remove("d").is_none());
        assert!(routes.is_empty());
        assert!(routes.static_route("/s", Method::Post).is_none());
        assert!(routes.dynamic_routes(Method::Get).is_empty());
    }

    #[test]
    fn test_all_flattened_sorted() {
        let mut routes = RouteCollection::default();
        routes.add(route("zeta", "/z")).unwrap();
        routes.add(route("alpha", "/a")).unwrap();
        let names: Vec<_> = routes.all_flattened().into_keys().collect();
        assert_eq!(names, ["alpha", "zeta"]);
        let order: Vec<_> = routes.iter().map(|r| r.name()).collect();
        assert_eq!(order, ["zeta", "alpha"]);
    }

    #[test]
    fn test_no_methods_rejected() {
        let mut routes = RouteCollection::default();
        let err = routes
            .add(route("none", "/none").with_methods([]))
            .unwrap_err();
        assert!(matches!(err, RouterError::InvalidRoutePath { .. }));
    }
}
