//! Router construction and request dispatch.

use std::any::Any;
use std::collections::HashMap;
use std::error::Error;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tracing::{debug, error, info};

use crate::cache::{RouteCache, RouteDescriptor};
use crate::collection::RouteCollection;
use crate::config::RouterConfig;
use crate::error::{BoxError, Result, RouterError};
use crate::matcher::{Matcher, RouteLookup};
use crate::path::PathCompiler;
use crate::pattern::PatternRegistry;
use crate::pipeline::{
    proceed, BoxFuture, Caught, Chain, Endpoint, Exchange, Matched, Middleware, MiddlewareResult,
    Pipeline, RequestReceived, RouteDispatched, RouteMatched, RouteNotMatched, SendingResponse,
    Stage, Terminated, ThrowableCaught, Unmatched,
};
use crate::request::{Method, PathParams, Request};
use crate::response::Response;
use crate::route::{self, Handler, HandlerRef, IntoHandlerResult, Route};

/// A route registered through the builder, compiled at `build()`.
#[derive(Debug, Clone)]
struct Definition {
    name: String,
    path: String,
    methods: Vec<Method>,
    handler: HandlerRef,
    middleware: Vec<String>,
    secure: bool,
}

impl Definition {
    fn new(
        name: impl Into<String>,
        methods: impl IntoIterator<Item = Method>,
        path: &str,
        handler: impl Into<HandlerRef>,
    ) -> Self {
        Self {
            name: name.into(),
            path: path.to_string(),
            methods: methods.into_iter().collect(),
            handler: handler.into(),
            middleware: Vec::new(),
            secure: false,
        }
    }

    fn into_route(self, compiler: &PathCompiler<'_>) -> Result<Route> {
        Ok(Route::compile_with(compiler, self.name, &self.path, self.handler)?
            .with_methods(self.methods)
            .with_middleware(self.middleware)
            .with_secure(self.secure))
    }
}

#[derive(Debug)]
enum Pending {
    Definition(Definition),
    Descriptor(RouteDescriptor),
    Route(Route),
}

impl Pending {
    fn into_route(self, compiler: &PathCompiler<'_>) -> Result<Route> {
        match self {
            Self::Definition(definition) => definition.into_route(compiler),
            Self::Descriptor(descriptor) => descriptor.into_route(compiler),
            Self::Route(route) => Ok(route),
        }
    }
}

fn join_path(prefix: &str, path: &str) -> String {
    let prefix = prefix.trim_end_matches('/');
    if path == "/" && !prefix.is_empty() {
        prefix.to_string()
    } else {
        format!("{prefix}{path}")
    }
}

/// Routes sharing a path prefix, name prefix, and middleware.
///
/// ```ignore
/// let admin = RouteGroup::new("/admin")
///     .named("admin.")
///     .middleware(["auth"])
///     .get("dashboard", "/", "AdminController@index")
///     .delete("user.delete", "/users/{id:num}", "AdminController@deleteUser");
///
/// let router = Router::builder().group(admin).build()?;
/// assert!(router.routes().has("admin.dashboard"));
/// ```
#[derive(Debug, Clone)]
pub struct RouteGroup {
    prefix: String,
    name_prefix: String,
    middleware: Vec<String>,
    secure: bool,
    routes: Vec<Definition>,
}

impl RouteGroup {
    /// Creates a new route group with the given path prefix.
    #[must_use]
    pub fn new(prefix: &str) -> Self {
        Self {
            prefix: prefix.to_string(),
            name_prefix: String::new(),
            middleware: Vec::new(),
            secure: false,
            routes: Vec::new(),
        }
    }

    /// Prepends `prefix` to every route name in the group.
    #[must_use]
    pub fn named(mut self, prefix: impl Into<String>) -> Self {
        self.name_prefix = prefix.into();
        self
    }

    /// Adds middleware identifiers run before each route's own.
    #[must_use]
    pub fn middleware<I, S>(mut self, middleware: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.middleware.extend(middleware.into_iter().map(Into::into));
        self
    }

    /// Marks every route in the group as HTTPS only.
    #[must_use]
    pub fn secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    /// Adds a route for the given methods.
    #[must_use]
    pub fn route(
        mut self,
        name: impl Into<String>,
        methods: impl IntoIterator<Item = Method>,
        path: &str,
        handler: impl Into<HandlerRef>,
    ) -> Self {
        self.routes.push(Definition::new(name, methods, path, handler));
        self
    }

    /// Adds a GET route.
    #[must_use]
    pub fn get(self, name: impl Into<String>, path: &str, handler: impl Into<HandlerRef>) -> Self {
        self.route(name, [Method::Get], path, handler)
    }

    /// Adds a POST route.
    #[must_use]
    pub fn post(self, name: impl Into<String>, path: &str, handler: impl Into<HandlerRef>) -> Self {
        self.route(name, [Method::Post], path, handler)
    }

    /// Adds a PUT route.
    #[must_use]
    pub fn put(self, name: impl Into<String>, path: &str, handler: impl Into<HandlerRef>) -> Self {
        self.route(name, [Method::Put], path, handler)
    }

    /// Adds a PATCH route.
    #[must_use]
    pub fn patch(self, name: impl Into<String>, path: &str, handler: impl Into<HandlerRef>) -> Self {
        self.route(name, [Method::Patch], path, handler)
    }

    /// Adds a DELETE route.
    #[must_use]
    pub fn delete(self, name: impl Into<String>, path: &str, handler: impl Into<HandlerRef>) -> Self {
        self.route(name, [Method::Delete], path, handler)
    }

    fn into_definitions(self) -> impl Iterator<Item = Definition> {
        let Self {
            prefix,
            name_prefix,
            middleware,
            secure,
            routes,
        } = self;

        routes.into_iter().map(move |mut definition| {
            definition.name = format!("{name_prefix}{}", definition.name);
            definition.path = join_path(&prefix, &definition.path);
            definition.middleware = middleware
                .iter()
                .cloned()
                .chain(definition.middleware)
                .collect();
            definition.secure |= secure;
            definition
        })
    }
}

/// Collects routes, handlers, and middleware for a [`Router`].
///
/// Paths are compiled by [`RouterBuilder::build`], once the pattern registry
/// is final, so `config` and `patterns` may be called in any order.
pub struct RouterBuilder {
    config: RouterConfig,
    registry: Option<PatternRegistry>,
    pending: Vec<Pending>,
    handlers: HashMap<String, Handler>,
    pipeline: Pipeline,
    route_middleware: HashMap<String, Arc<dyn Middleware<RouteDispatched>>>,
}

impl Default for RouterBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RouterBuilder {
    /// Creates an empty builder with the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: RouterConfig::default(),
            registry: None,
            pending: Vec::new(),
            handlers: HashMap::new(),
            pipeline: Pipeline::new(),
            route_middleware: HashMap::new(),
        }
    }

    /// Replaces the configuration.
    #[must_use]
    pub fn config(mut self, config: RouterConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the base pattern registry; configured patterns are added on top.
    #[must_use]
    pub fn patterns(mut self, registry: PatternRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Adds a route for the given methods.
    #[must_use]
    pub fn route(
        mut self,
        name: impl Into<String>,
        methods: impl IntoIterator<Item = Method>,
        path: &str,
        handler: impl Into<HandlerRef>,
    ) -> Self {
        self.pending
            .push(Pending::Definition(Definition::new(name, methods, path, handler)));
        self
    }

    /// Adds a GET route.
    #[must_use]
    pub fn get(self, name: impl Into<String>, path: &str, handler: impl Into<HandlerRef>) -> Self {
        self.route(name, [Method::Get], path, handler)
    }

    /// Adds a POST route.
    #[must_use]
    pub fn post(self, name: impl Into<String>, path: &str, handler: impl Into<HandlerRef>) -> Self {
        self.route(name, [Method::Post], path, handler)
    }

    /// Adds a PUT route.
    #[must_use]
    pub fn put(self, name: impl Into<String>, path: &str, handler: impl Into<HandlerRef>) -> Self {
        self.route(name, [Method::Put], path, handler)
    }

    /// Adds a PATCH route.
    #[must_use]
    pub fn patch(self, name: impl Into<String>, path: &str, handler: impl Into<HandlerRef>) -> Self {
        self.route(name, [Method::Patch], path, handler)
    }

    /// Adds a DELETE route.
    #[must_use]
    pub fn delete(self, name: impl Into<String>, path: &str, handler: impl Into<HandlerRef>) -> Self {
        self.route(name, [Method::Delete], path, handler)
    }

    /// Adds an already compiled route.
    #[must_use]
    pub fn add(mut self, route: Route) -> Self {
        self.pending.push(Pending::Route(route));
        self
    }

    /// Adds routes from a definition or cache file.
    #[must_use]
    pub fn descriptors(mut self, descriptors: impl IntoIterator<Item = RouteDescriptor>) -> Self {
        self.pending
            .extend(descriptors.into_iter().map(Pending::Descriptor));
        self
    }

    /// Adds a route group.
    #[must_use]
    pub fn group(mut self, group: RouteGroup) -> Self {
        self.pending
            .extend(group.into_definitions().map(Pending::Definition));
        self
    }

    /// Registers a handler that routes reference by name.
    #[must_use]
    pub fn handler<F, Fut>(mut self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(Request) -> Fut + Send + Sync + 'static,
        Fut: Future + Send + 'static,
        Fut::Output: IntoHandlerResult,
    {
        self.handlers.insert(name.into(), route::handler(f));
        self
    }

    /// Appends middleware to a stage.
    ///
    /// Middleware for [`RouteDispatched`] registered here wraps every route.
    #[must_use]
    pub fn middleware<S: Stage>(mut self, middleware: impl Middleware<S> + 'static) -> Self {
        self.pipeline.push::<S>(middleware);
        self
    }

    /// Registers middleware that routes opt into by identifier.
    #[must_use]
    pub fn route_middleware(
        mut self,
        id: impl Into<String>,
        middleware: impl Middleware<RouteDispatched> + 'static,
    ) -> Self {
        self.route_middleware.insert(id.into(), Arc::new(middleware));
        self
    }

    /// Compiles the routes and freezes the router.
    ///
    /// With `use_cache` set and a cache file present, routes come from the
    /// cache and the routes given to this builder are ignored.
    pub fn build(self) -> Result<Router> {
        let registry = self
            .registry
            .unwrap_or_else(PatternRegistry::builtin)
            .with_patterns(&self.config.patterns)?;
        let compiler = PathCompiler::new(&registry);

        let routes = if let Some(cache) = self.config.active_cache() {
            info!(path = %cache.display(), "loading routes from cache");
            RouteCache::load(cache)?.compile_with(&compiler, self.config.strict)?
        } else {
            let mut routes = RouteCollection::new(self.config.strict);
            for pending in self.pending {
                routes.add(pending.into_route(&compiler)?)?;
            }
            routes
        };

        let mut route_chains = HashMap::new();
        for route in routes.iter().filter(|r| !r.middleware().is_empty()) {
            let mut chain = self.pipeline.chain::<RouteDispatched>().clone();
            for id in route.middleware() {
                let middleware = self.route_middleware.get(id).ok_or_else(|| {
                    RouterError::UnknownMiddleware {
                        route: route.name().to_string(),
                        middleware: id.clone(),
                    }
                })?;
                chain.push(Arc::clone(middleware));
            }
            route_chains.insert(route.name().to_string(), chain);
        }

        info!(
            routes = routes.len(),
            static_routes = routes.static_count(),
            dynamic_routes = routes.dynamic_count(),
            "router built"
        );

        Ok(Router {
            matcher: Matcher::new(Arc::new(routes)),
            pipeline: self.pipeline,
            handlers: self.handlers,
            route_chains,
            debug: self.config.debug,
        })
    }
}

/// The route-dispatched endpoint: calls the route's handler.
struct Dispatcher<'h> {
    handlers: &'h HashMap<String, Handler>,
}

impl Dispatcher<'_> {
    fn resolve(&self, route: &Route) -> Result<Handler> {
        match route.handler() {
            HandlerRef::Callable(handler) => Ok(Arc::clone(handler)),
            HandlerRef::Named(name) => self
                .handlers
                .get(name)
                .cloned()
                .ok_or_else(|| RouterError::UnknownHandler(name.clone())),
        }
    }
}

impl Endpoint<RouteDispatched> for Dispatcher<'_> {
    fn call<'a>(&'a self, matched: Matched) -> BoxFuture<'a, std::result::Result<Response, BoxError>> {
        Box::pin(async move {
            let handler = self.resolve(&matched.route)?;
            let request = matched.request;
            let response = AssertUnwindSafe(async move { handler(request).await })
                .catch_unwind()
                .await
                .map_err(|panic| RouterError::HandlerPanicked(panic_message(&*panic)))??;
            Ok::<_, BoxError>(response)
        })
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

fn unmatched_response(unmatched: Unmatched) -> std::result::Result<Response, BoxError> {
    Ok(unmatched.response)
}

fn caught_response(caught: Caught) -> Response {
    caught.response
}

fn exchange_response(exchange: Exchange) -> Response {
    exchange.response
}

fn finished(_exchange: Exchange) {}

/// An immutable router: matched routes plus the middleware pipeline.
///
/// Safe to share between tasks; wrap it in an [`Arc`] and call
/// [`Router::handle`] concurrently.
pub struct Router {
    matcher: Matcher,
    pipeline: Pipeline,
    handlers: HashMap<String, Handler>,
    route_chains: HashMap<String, Chain<RouteDispatched>>,
    debug: bool,
}

impl fmt::Debug for Router {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut handlers: Vec<_> = self.handlers.keys().collect();
        handlers.sort();
        f.debug_struct("Router")
            .field("routes", &self.matcher.routes().len())
            .field("handlers", &handlers)
            .field("pipeline", &self.pipeline)
            .field("debug", &self.debug)
            .finish()
    }
}

type Outcome = std::result::Result<Response, BoxError>;

impl Router {
    /// Starts building a router.
    #[must_use]
    pub fn builder() -> RouterBuilder {
        RouterBuilder::new()
    }

    /// Returns the matcher.
    #[must_use]
    pub fn matcher(&self) -> &Matcher {
        &self.matcher
    }

    /// Returns the registered routes.
    #[must_use]
    pub fn routes(&self) -> &RouteCollection {
        self.matcher.routes()
    }

    /// Generates the URL of a named route.
    pub fn url(&self, name: &str, params: &PathParams) -> Result<String> {
        self.routes().get(name)?.url(params)
    }

    /// Runs the whole lifecycle and returns the response.
    pub async fn handle(&self, request: Request) -> Response {
        let exchange = self.respond(request).await;
        if self.pipeline.chain::<Terminated>().is_empty() {
            return exchange.response;
        }
        let response = exchange.response.clone();
        self.terminate(exchange).await;
        response
    }

    /// Runs every stage up to and including sending-response.
    ///
    /// Call [`Router::terminate`] with the result once the response is sent.
    pub async fn respond(&self, request: Request) -> Exchange {
        let original = request.clone();
        let (request, outcome) = AssertUnwindSafe(self.process(request))
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| {
                let error = RouterError::MiddlewarePanicked(panic_message(&*panic));
                (original, Err(error.into()))
            });
        let response = match outcome {
            Ok(response) => response,
            Err(error) => self.catch(request.clone(), error).await,
        };
        self.send(request, response).await
    }

    /// Runs the terminated stage.
    pub async fn terminate(&self, exchange: Exchange) {
        self.pipeline
            .chain::<Terminated>()
            .run(exchange, &finished)
            .await;
    }

    async fn process(&self, request: Request) -> (Request, Outcome) {
        let received = self.pipeline.chain::<RequestReceived>();
        let request = if received.is_empty() {
            request
        } else {
            let original = request.clone();
            match received.run(request, &proceed::<Request>).await {
                Ok(MiddlewareResult::Continue(request)) => request,
                Ok(MiddlewareResult::Response(response)) => {
                    debug!(stage = RequestReceived::NAME, path = %original.path, "short-circuited");
                    return (original, Ok(response));
                }
                Err(error) => return (original, Err(error)),
            }
        };

        let (route, parameters) = match self.matcher.lookup(request.method, &request.path) {
            RouteLookup::Match(found) => (Arc::clone(found.route), found.parameters),
            RouteLookup::MethodNotAllowed { allowed } => {
                let response = Response::method_not_allowed(allowed.header_value());
                return self.not_matched(request, response).await;
            }
            RouteLookup::NotFound => {
                return self.not_matched(request, Response::not_found()).await;
            }
        };

        debug!(route = route.name(), method = %request.method, path = %request.path, "route matched");
        let mut request = request;
        request.params = parameters;
        self.matched(Matched { request, route }).await
    }

    async fn not_matched(&self, request: Request, response: Response) -> (Request, Outcome) {
        debug!(method = %request.method, path = %request.path, status = response.status, "no route matched");
        let chain = self.pipeline.chain::<RouteNotMatched>();
        if chain.is_empty() {
            return (request, Ok(response));
        }
        let original = request.clone();
        let outcome = chain
            .run(Unmatched { request, response }, &unmatched_response)
            .await;
        (original, outcome)
    }

    async fn matched(&self, matched: Matched) -> (Request, Outcome) {
        let chain = self.pipeline.chain::<RouteMatched>();
        let matched = if chain.is_empty() {
            matched
        } else {
            let original = matched.request.clone();
            match chain.run(matched, &proceed::<Matched>).await {
                Ok(MiddlewareResult::Continue(matched)) => matched,
                Ok(MiddlewareResult::Response(response)) => {
                    debug!(stage = RouteMatched::NAME, path = %original.path, "short-circuited");
                    return (original, Ok(response));
                }
                Err(error) => return (original, Err(error)),
            }
        };

        let chain = self
            .route_chains
            .get(matched.route.name())
            .unwrap_or_else(|| self.pipeline.chain::<RouteDispatched>());
        let request = matched.request.clone();
        let dispatcher = Dispatcher {
            handlers: &self.handlers,
        };
        let outcome = chain.run(matched, &dispatcher).await;
        (request, outcome)
    }

    async fn catch(&self, request: Request, error: BoxError) -> Response {
        let error: Arc<dyn Error + Send + Sync> = Arc::from(error);
        error!(method = %request.method, path = %request.path, error = %error, "request failed");

        let mut response = Response::internal_server_error();
        if self.debug {
            response = response.body(error.to_string());
        }

        self.pipeline
            .chain::<ThrowableCaught>()
            .run(
                Caught {
                    request,
                    error,
                    response,
                },
                &caught_response,
            )
            .await
    }

    async fn send(&self, request: Request, response: Response) -> Exchange {
        let chain = self.pipeline.chain::<SendingResponse>();
        if chain.is_empty() {
            return Exchange { request, response };
        }
        let response = chain
            .run(
                Exchange {
                    request: request.clone(),
                    response,
                },
                &exchange_response,
            )
            .await;
        Exchange { request, response }
    }
}
