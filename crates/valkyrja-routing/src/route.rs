//! Route definitions.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use regex::Regex;

use crate::error::{BoxError, Result, RouterError};
use crate::path::{self, CompiledPath, Parameter, PathCompiler};
use crate::pipeline::BoxFuture;
use crate::request::{Method, PathParams, Request};
use crate::response::Response;

/// What a route handler produces.
pub type HandlerResult = std::result::Result<Response, BoxError>;

/// A boxed async handler function.
pub type Handler = Arc<dyn Fn(Request) -> BoxFuture<'static, HandlerResult> + Send + Sync>;

/// Conversion of handler return values into a [`HandlerResult`].
pub trait IntoHandlerResult {
    /// Performs the conversion.
    fn into_handler_result(self) -> HandlerResult;
}

impl IntoHandlerResult for Response {
    fn into_handler_result(self) -> HandlerResult {
        Ok(self)
    }
}

impl<E: Into<BoxError>> IntoHandlerResult for std::result::Result<Response, E> {
    fn into_handler_result(self) -> HandlerResult {
        self.map_err(Into::into)
    }
}

/// Boxes an async function into a [`Handler`].
///
/// The function may return a [`Response`] or a `Result<Response, E>`.
pub fn handler<F, Fut>(f: F) -> Handler
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future + Send + 'static,
    Fut::Output: IntoHandlerResult,
{
    Arc::new(move |req: Request| -> BoxFuture<'static, HandlerResult> {
        let fut = f(req);
        Box::pin(async move { fut.await.into_handler_result() })
    })
}

/// Reference to the code that serves a route.
#[derive(Clone)]
pub enum HandlerRef {
    /// Resolved through the router's handler registry when dispatched.
    Named(String),
    /// Invoked directly.
    Callable(Handler),
}

impl HandlerRef {
    /// Returns the identifier of a named handler.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        match self {
            Self::Named(name) => Some(name),
            Self::Callable(_) => None,
        }
    }
}

impl fmt::Debug for HandlerRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Named(name) => f.debug_tuple("Named").field(name).finish(),
            Self::Callable(_) => f.write_str("Callable(..)"),
        }
    }
}

impl From<&str> for HandlerRef {
    fn from(name: &str) -> Self {
        Self::Named(name.to_string())
    }
}

impl From<String> for HandlerRef {
    fn from(name: String) -> Self {
        Self::Named(name)
    }
}

impl From<Handler> for HandlerRef {
    fn from(handler: Handler) -> Self {
        Self::Callable(handler)
    }
}

/// A single route definition.
///
/// Routes are values: the `with_*` methods consume the route and return a
/// new one, and nothing mutates a route once it is registered.
#[derive(Debug, Clone)]
pub struct Route {
    name: String,
    path: String,
    methods: Vec<Method>,
    handler: HandlerRef,
    regex: Option<Regex>,
    parameters: Vec<Parameter>,
    middleware: Vec<String>,
    secure: bool,
}

impl Route {
    /// Creates a GET route, compiling the path with the builtin pattern types.
    pub fn new(
        name: impl Into<String>,
        path: &str,
        handler: impl Into<HandlerRef>,
    ) -> Result<Self> {
        Self::compile_with(&PathCompiler::default(), name, path, handler)
    }

    /// Creates a GET route, compiling the path with the given compiler.
    pub fn compile_with(
        compiler: &PathCompiler<'_>,
        name: impl Into<String>,
        path: &str,
        handler: impl Into<HandlerRef>,
    ) -> Result<Self> {
        Self::from_compiled(name, compiler.compile(path)?, handler)
    }

    /// Creates a GET route from an already compiled path.
    pub fn from_compiled(
        name: impl Into<String>,
        compiled: CompiledPath,
        handler: impl Into<HandlerRef>,
    ) -> Result<Self> {
        let name = name.into();
        if name.is_empty() {
            return Err(RouterError::InvalidRoutePath {
                path: compiled.path,
                reason: "route name is empty".to_string(),
            });
        }

        let regex = compiled
            .regex
            .as_deref()
            .map(Regex::new)
            .transpose()
            .map_err(|e| RouterError::InvalidRoutePath {
                path: compiled.path.clone(),
                reason: e.to_string(),
            })?;

        if let Some(regex) = &regex {
            if regex.captures_len() != compiled.parameters.len() + 1 {
                return Err(RouterError::InvalidRoutePath {
                    path: compiled.path,
                    reason: "capture groups do not line up with parameters".to_string(),
                });
            }
        }

        Ok(Self {
            name,
            path: compiled.path,
            methods: vec![Method::Get],
            handler: handler.into(),
            regex,
            parameters: compiled.parameters,
            middleware: Vec::new(),
            secure: false,
        })
    }

    /// Replaces the allowed methods.
    #[must_use]
    pub fn with_methods(mut self, methods: impl IntoIterator<Item = Method>) -> Self {
        self.methods = methods.into_iter().collect();
        self.methods.sort();
        self.methods.dedup();
        self
    }

    /// Adds an allowed method.
    #[must_use]
    pub fn with_method(self, method: Method) -> Self {
        let methods = self.methods.iter().copied().chain([method]).collect::<Vec<_>>();
        self.with_methods(methods)
    }

    /// Appends middleware identifiers applied around this route's dispatch.
    #[must_use]
    pub fn with_middleware<I, S>(mut self, middleware: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.middleware.extend(middleware.into_iter().map(Into::into));
        self
    }

    /// Sets whether the route requires HTTPS.
    #[must_use]
    pub fn with_secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    /// Returns the unique route name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the path template.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Returns the allowed methods, sorted.
    #[must_use]
    pub fn methods(&self) -> &[Method] {
        &self.methods
    }

    /// Returns whether the route accepts the method.
    #[must_use]
    pub fn allows(&self, method: Method) -> bool {
        self.methods.contains(&method)
    }

    /// Returns the handler reference.
    #[must_use]
    pub fn handler(&self) -> &HandlerRef {
        &self.handler
    }

    /// Returns the compiled regex source, `None` for static routes.
    #[must_use]
    pub fn regex(&self) -> Option<&str> {
        self.regex.as_ref().map(Regex::as_str)
    }

    /// Returns the parameter metadata in capture group order.
    #[must_use]
    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    /// Returns the middleware identifiers.
    #[must_use]
    pub fn middleware(&self) -> &[String] {
        &self.middleware
    }

    /// Returns whether the route requires HTTPS.
    #[must_use]
    pub fn is_secure(&self) -> bool {
        self.secure
    }

    /// Returns whether the route is matched by exact string equality.
    #[must_use]
    pub fn is_static(&self) -> bool {
        self.regex.is_none()
    }

    /// Returns whether the path matches this route, ignoring the method.
    #[must_use]
    pub fn is_match(&self, path: &str) -> bool {
        match &self.regex {
            Some(regex) => regex.is_match(path),
            None => self.path == path,
        }
    }

    /// Matches a path and extracts parameter values by capture position.
    ///
    /// Parameters of optional groups that did not participate are omitted.
    #[must_use]
    pub fn captures(&self, path: &str) -> Option<PathParams> {
        let Some(regex) = &self.regex else {
            return (self.path == path).then(PathParams::new);
        };

        let caps = regex.captures(path)?;
        let mut params = PathParams::new();
        for (i, parameter) in self.parameters.iter().enumerate() {
            if let Some(value) = caps.get(i + 1) {
                params.insert(parameter.name.clone(), value.as_str());
            }
        }
        Some(params)
    }

    /// Generates a URL path from parameters.
    pub fn url(&self, params: &PathParams) -> Result<String> {
        let segments = path::tokenize(&self.path)?;
        path::render(&segments, params).map_err(|parameter| RouterError::MissingParameter {
            route: self.name.clone(),
            parameter,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn named(name: &str, path: &str) -> Route {
        Route::new(name, path, "Controller@action").unwrap()
    }

    #[test]
    fn test_defaults() {
        let route = named("home", "/");
        assert_eq!(route.name(), "home");
        assert_eq!(route.methods(), [Method::Get]);
        assert!(route.is_static());
        assert!(route.regex().is_none());
        assert!(!route.is_secure());
        assert!(route.middleware().is_empty());
        assert_eq!(route.handler().name(), Some("Controller@action"));
    }

    #[test]
    fn test_dynamic_route() {
        let route = named("user.show", "/users/{id:num}");
        assert_eq!(route.regex(), Some("^/users/([0-9]+)$"));
        assert_eq!(route.parameters()[0].name, "id");
        assert!(!route.is_static());
    }

    #[test]
    fn test_with_methods_sorts_and_dedups() {
        let route = named("r", "/r").with_methods([Method::Post, Method::Get, Method::Post]);
        assert_eq!(route.methods(), [Method::Get, Method::Post]);
        let route = route.with_method(Method::Delete);
        assert!(route.allows(Method::Delete));
        assert!(!route.allows(Method::Put));
    }

    #[test]
    fn test_with_middleware_returns_new_value() {
        let original = named("r", "/r");
        let secured = original
            .clone()
            .with_middleware(["auth", "throttle"])
            .with_secure(true);
        assert!(original.middleware().is_empty());
        assert!(!original.is_secure());
        assert_eq!(secured.middleware(), ["auth", "throttle"]);
        assert!(secured.is_secure());
    }

    #[test]
    fn test_captures() {
        let route = named("post", "/posts/{post}/comments/{comment:num}");
        let params = route.captures("/posts/hello/comments/7").unwrap();
        assert_eq!(params.get("post"), Some("hello"));
        assert_eq!(params.get("comment"), Some("7"));
        assert!(route.captures("/posts/hello/comments/x").is_none());
    }

    #[test]
    fn test_captures_optional_param_absent() {
        let route = named("blog", "/blog[/{page:num}]");
        let params = route.captures("/blog").unwrap();
        assert!(params.is_empty());
        let params = route.captures("/blog/3").unwrap();
        assert_eq!(params.get("page"), Some("3"));
    }

    #[test]
    fn test_static_captures() {
        let route = named("about", "/about");
        assert_eq!(route.captures("/about"), Some(PathParams::new()));
        assert!(route.captures("/about/").is_none());
    }

    #[test]
    fn test_url() {
        let route = named("user", "/users/{id:num}[/{tab}]");
        let params: PathParams = [("id", "42")].into_iter().collect();
        assert_eq!(route.url(&params).unwrap(), "/users/42");

        let err = route.url(&PathParams::new()).unwrap_err();
        assert!(matches!(
            err,
            RouterError::MissingParameter { ref route, ref parameter }
                if route == "user" && parameter == "id"
        ));
    }

    #[test]
    fn test_empty_name_rejected() {
        assert!(matches!(
            Route::new("", "/", "h"),
            Err(RouterError::InvalidRoutePath { .. })
        ));
    }

    #[tokio::test]
    async fn test_handler_conversions() {
        let infallible = handler(|_req| async { Response::text("ok") });
        assert_eq!(infallible(Request::get("/")).await.unwrap().status, 200);

        let fallible = handler(|_req| async {
            Err::<Response, _>(std::io::Error::other("boom"))
        });
        let err = fallible(Request::get("/")).await.unwrap_err();
        assert_eq!(err.to_string(), "boom");
    }
}
