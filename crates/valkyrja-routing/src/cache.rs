//! Route definition files and the compiled route cache.
//!
//! Both are a JSON array of [`RouteDescriptor`]. A hand-written definition
//! leaves out `regex` and `parameters`, and the path is compiled on load. A
//! cache entry carries both, so loading it only builds the regex and never
//! parses the path template again.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::collection::RouteCollection;
use crate::error::{Result, RouterError};
use crate::path::{CompiledPath, Parameter, PathCompiler};
use crate::request::Method;
use crate::route::{HandlerRef, Route};

/// One serialized route.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteDescriptor {
    /// Unique route name.
    pub name: String,
    /// Path template.
    pub path: String,
    /// Allowed methods.
    #[serde(default = "default_methods")]
    pub methods: Vec<Method>,
    /// Named handler identifier.
    pub handler: String,
    /// Middleware identifiers.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub middleware: Vec<String>,
    /// Whether the route requires HTTPS.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub secure: bool,
    /// Compiled regex, cache entries only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub regex: Option<String>,
    /// Compiled parameters, cache entries only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Vec<Parameter>>,
}

fn default_methods() -> Vec<Method> {
    vec![Method::Get]
}

impl RouteDescriptor {
    /// Describes a route in cache form.
    ///
    /// Fails with [`RouterError::NotCacheable`] for closure handlers.
    pub fn from_route(route: &Route) -> Result<Self> {
        let HandlerRef::Named(handler) = route.handler() else {
            return Err(RouterError::NotCacheable(route.name().to_string()));
        };

        Ok(Self {
            name: route.name().to_string(),
            path: route.path().to_string(),
            methods: route.methods().to_vec(),
            handler: handler.clone(),
            middleware: route.middleware().to_vec(),
            secure: route.is_secure(),
            regex: route.regex().map(str::to_string),
            parameters: Some(route.parameters().to_vec()),
        })
    }

    /// Returns whether this entry was produced by compiling a route.
    #[must_use]
    pub fn is_compiled(&self) -> bool {
        self.parameters.is_some()
    }

    /// Builds the route.
    ///
    /// Compiled entries are trusted apart from a consistency check between
    /// regex and parameters; definitions are compiled with `compiler`.
    pub fn into_route(self, compiler: &PathCompiler<'_>) -> Result<Route> {
        let route = match self.parameters {
            Some(parameters) => {
                if self.regex.is_none() && !parameters.is_empty() {
                    return Err(RouterError::Cache(format!(
                        "route `{}` lists parameters but has no regex",
                        self.name
                    )));
                }
                let compiled = CompiledPath {
                    path: self.path,
                    regex: self.regex,
                    parameters,
                };
                Route::from_compiled(self.name.clone(), compiled, self.handler).map_err(|e| {
                    RouterError::Cache(format!("route `{}`: {e}", self.name))
                })?
            }
            None => Route::compile_with(compiler, self.name, &self.path, self.handler)?,
        };

        Ok(route
            .with_methods(self.methods)
            .with_middleware(self.middleware)
            .with_secure(self.secure))
    }
}

/// A list of route descriptors in registration order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RouteCache {
    routes: Vec<RouteDescriptor>,
}

impl RouteCache {
    /// Wraps descriptors.
    #[must_use]
    pub fn new(routes: Vec<RouteDescriptor>) -> Self {
        Self { routes }
    }

    /// Snapshots a collection.
    pub fn from_collection(collection: &RouteCollection) -> Result<Self> {
        let routes = collection
            .iter()
            .map(|route| RouteDescriptor::from_route(route))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { routes })
    }

    /// Parses a cache or definition file's contents.
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Reads a cache or definition file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    /// Serializes to pretty JSON.
    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Writes the cache file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        fs::write(path, self.to_json_string()?)?;
        Ok(())
    }

    /// Returns the descriptors.
    #[must_use]
    pub fn routes(&self) -> &[RouteDescriptor] {
        &self.routes
    }

    /// Returns the number of descriptors.
    #[must_use]
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    /// Returns whether there are no descriptors.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Builds a collection using the builtin pattern types.
    pub fn into_collection(self, strict: bool) -> Result<RouteCollection> {
        self.compile_with(&PathCompiler::default(), strict)
    }

    /// Builds a collection, compiling definitions with `compiler`.
    pub fn compile_with(self, compiler: &PathCompiler<'_>, strict: bool) -> Result<RouteCollection> {
        let mut collection = RouteCollection::new(strict);
        for descriptor in self.routes {
            collection.add(descriptor.into_route(compiler)?)?;
        }
        Ok(collection)
    }
}

impl IntoIterator for RouteCache {
    type Item = RouteDescriptor;
    type IntoIter = std::vec::IntoIter<RouteDescriptor>;

    fn into_iter(self) -> Self::IntoIter {
        self.routes.into_iter()
    }
}
