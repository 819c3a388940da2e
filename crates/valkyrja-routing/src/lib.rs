//! # valkyrja-routing
//!
//! HTTP routing core: path templates compiled to anchored regexes, a route
//! collection with static and dynamic indices, a first-match matcher, and a
//! staged middleware pipeline around dispatch.
//!
//! This crate provides:
//! - Path templates with typed, catch-all, and optional parameters
//! - Named routes with reverse URL generation
//! - `404`/`405` detection with an `Allow` header
//! - Middleware for seven lifecycle stages, plus per-route middleware
//! - A JSON route cache that skips path parsing on load
//!
//! ## Quick Start
//!
//! ```ignore
//! use valkyrja_routing::{handler, Request, Response, Router};
//!
//! async fn show_user(req: Request) -> Response {
//!     let id = req.params.get("id").unwrap_or("unknown");
//!     Response::json(&serde_json::json!({ "id": id }))
//! }
//!
//! let router = Router::builder()
//!     .get("home", "/", handler(|_req| async { Response::text("Hello, World!") }))
//!     .get("user.show", "/users/{id:num}", "users.show")
//!     .handler("users.show", show_user)
//!     .build()?;
//!
//! let response = router.handle(Request::get("/users/123")).await;
//! ```
//!
//! ## Path Parameters
//!
//! ```ignore
//! router.get("post", "/posts/{slug}", handler)            // one segment
//! router.get("user", "/users/{id:num}", handler)          // typed
//! router.get("file", "/files/{*path}", handler)           // rest of the path
//! router.get("blog", "/blog[/{page:num}]", handler)       // optional group
//! ```
//!
//! Types come from a [`PatternRegistry`]; see [`pattern`] for the builtins.
//!
//! ## Middleware
//!
//! ```ignore
//! use valkyrja_routing::middleware::{NoCacheHeaders, TrailingSlashRedirect};
//! use valkyrja_routing::pipeline::{RequestReceived, SendingResponse};
//!
//! let router = Router::builder()
//!     .middleware::<RequestReceived>(TrailingSlashRedirect)
//!     .middleware::<SendingResponse>(NoCacheHeaders)
//!     .build()?;
//! ```

pub mod cache;
pub mod collection;
pub mod config;
pub mod error;
pub mod matcher;
pub mod middleware;
pub mod path;
pub mod pattern;
pub mod pipeline;
pub mod request;
pub mod response;
pub mod route;
pub mod router;

pub use cache::{RouteCache, RouteDescriptor};
pub use collection::RouteCollection;
pub use config::RouterConfig;
pub use error::{BoxError, Result, RouterError};
pub use matcher::{AllowedMethods, Matcher, RouteLookup, RouteMatch};
pub use path::{CompiledPath, Parameter, PathCompiler};
pub use pattern::PatternRegistry;
pub use pipeline::{
    BoxFuture, Caught, Chain, Endpoint, Exchange, Matched, Middleware, MiddlewareResult, Next,
    Pipeline, Stage, Unmatched,
};
pub use request::{Method, PathParams, Request};
pub use response::Response;
pub use route::{handler, Handler, HandlerRef, HandlerResult, IntoHandlerResult, Route};
pub use router::{RouteGroup, Router, RouterBuilder};
