//! Staged middleware pipeline.
//!
//! Every point of the request lifecycle is a [`Stage`] with its own input and
//! output types. A stage owns a [`Chain`] of [`Middleware`]; each middleware
//! receives the input and a [`Next`] continuation over the rest of the chain,
//! and either calls `next.run(input)` or returns its own output.
//!
//! ```text
//! request-received ─┬─ route-matched ── route-dispatched ─┐
//!                   └─ route-not-matched ─────────────────┤
//!      (any error) ──── throwable-caught ─────────────────┤
//!                                                         ▼
//!                                  sending-response ── terminated
//! ```
//!
//! # Example
//!
//! ```ignore
//! struct PoweredBy;
//!
//! impl Middleware<SendingResponse> for PoweredBy {
//!     fn handle<'a>(
//!         &'a self,
//!         exchange: Exchange,
//!         next: Next<'a, SendingResponse>,
//!     ) -> BoxFuture<'a, Response> {
//!         Box::pin(async move { next.run(exchange).await.header("X-Powered-By", "valkyrja") })
//!     }
//! }
//! ```

use std::error::Error;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::error::BoxError;
use crate::request::Request;
use crate::response::Response;
use crate::route::Route;

/// A boxed future for async middleware operations.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Result of a middleware that may short-circuit.
#[derive(Debug)]
pub enum MiddlewareResult<T = Request> {
    /// Continue with this value.
    Continue(T),
    /// Stop processing and send this response.
    Response(Response),
}

/// A request paired with the route it matched.
#[derive(Debug, Clone)]
pub struct Matched {
    /// The request, with `params` filled from the path.
    pub request: Request,
    /// The matched route.
    pub route: Arc<Route>,
}

/// A request no route matched, with the response prepared for it.
#[derive(Debug, Clone)]
pub struct Unmatched {
    /// The request.
    pub request: Request,
    /// `404`, or `405` with an `Allow` header.
    pub response: Response,
}

/// An error raised by an earlier stage.
#[derive(Debug, Clone)]
pub struct Caught {
    /// The request being handled when the error was raised.
    pub request: Request,
    /// The error exactly as raised.
    pub error: Arc<dyn Error + Send + Sync>,
    /// The default error response.
    pub response: Response,
}

/// A request and the response produced for it.
#[derive(Debug, Clone)]
pub struct Exchange {
    /// The request.
    pub request: Request,
    /// The response.
    pub response: Response,
}

/// A named point of the request lifecycle.
pub trait Stage: Sized + Send + Sync + 'static {
    /// What each middleware receives.
    type Input: Send + 'static;
    /// What each middleware returns.
    type Output: Send + 'static;
    /// Stage name used in logs.
    const NAME: &'static str;

    /// Returns this stage's chain in a pipeline.
    fn chain(pipeline: &Pipeline) -> &Chain<Self>;

    /// Returns this stage's chain in a pipeline, mutably.
    fn chain_mut(pipeline: &mut Pipeline) -> &mut Chain<Self>;
}

macro_rules! stage {
    ($(#[$doc:meta])* $stage:ident, $name:literal, $field:ident, $input:ty => $output:ty) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy)]
        pub struct $stage;

        impl Stage for $stage {
            type Input = $input;
            type Output = $output;
            const NAME: &'static str = $name;

            fn chain(pipeline: &Pipeline) -> &Chain<Self> {
                &pipeline.$field
            }

            fn chain_mut(pipeline: &mut Pipeline) -> &mut Chain<Self> {
                &mut pipeline.$field
            }
        }
    };
}

stage!(
    /// Runs first, before any route lookup. May rewrite the request or respond.
    RequestReceived, "request-received", request_received,
    Request => Result<MiddlewareResult<Request>, BoxError>
);
stage!(
    /// Runs when a route matched. May rewrite the match or respond.
    RouteMatched, "route-matched", route_matched,
    Matched => Result<MiddlewareResult<Matched>, BoxError>
);
stage!(
    /// Runs when no route matched.
    RouteNotMatched, "route-not-matched", route_not_matched,
    Unmatched => Result<Response, BoxError>
);
stage!(
    /// Wraps the route handler. Per-route middleware runs here too.
    RouteDispatched, "route-dispatched", route_dispatched,
    Matched => Result<Response, BoxError>
);
stage!(
    /// Turns an error from any earlier stage into a response.
    ThrowableCaught, "throwable-caught", throwable_caught,
    Caught => Response
);
stage!(
    /// Runs for every response before it is sent.
    SendingResponse, "sending-response", sending_response,
    Exchange => Response
);
stage!(
    /// Runs after the response was sent. Output is discarded.
    Terminated, "terminated", terminated,
    Exchange => ()
);

/// Middleware for one stage.
pub trait Middleware<S: Stage>: Send + Sync {
    /// Handles the input, calling `next.run` to continue down the chain.
    fn handle<'a>(&'a self, input: S::Input, next: Next<'a, S>) -> BoxFuture<'a, S::Output>;
}

/// What runs once every middleware in a chain has called `next`.
pub trait Endpoint<S: Stage>: Send + Sync {
    /// Produces the stage output.
    fn call<'a>(&'a self, input: S::Input) -> BoxFuture<'a, S::Output>;
}

impl<S, F> Endpoint<S> for F
where
    S: Stage,
    F: Fn(S::Input) -> S::Output + Send + Sync,
{
    fn call<'a>(&'a self, input: S::Input) -> BoxFuture<'a, S::Output> {
        Box::pin(std::future::ready(self(input)))
    }
}

/// The rest of a chain, as seen by one middleware.
///
/// Each middleware gets its own `Next` over a shorter slice; nothing is
/// shared or mutated, so one chain can serve concurrent requests.
pub struct Next<'a, S: Stage> {
    remaining: &'a [Arc<dyn Middleware<S>>],
    endpoint: &'a dyn Endpoint<S>,
}

impl<'a, S: Stage> Next<'a, S> {
    /// Creates a continuation over `middleware` ending in `endpoint`.
    pub fn new(middleware: &'a [Arc<dyn Middleware<S>>], endpoint: &'a dyn Endpoint<S>) -> Self {
        Self {
            remaining: middleware,
            endpoint,
        }
    }

    /// Number of middleware still ahead.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.remaining.len()
    }

    /// Passes the input to the next middleware, or to the endpoint.
    pub fn run(self, input: S::Input) -> BoxFuture<'a, S::Output> {
        match self.remaining.split_first() {
            Some((first, rest)) => first.handle(
                input,
                Next {
                    remaining: rest,
                    endpoint: self.endpoint,
                },
            ),
            None => self.endpoint.call(input),
        }
    }
}

/// Ordered middleware for one stage.
pub struct Chain<S: Stage> {
    middleware: Vec<Arc<dyn Middleware<S>>>,
}

impl<S: Stage> Chain<S> {
    /// Creates an empty chain.
    #[must_use]
    pub fn new() -> Self {
        Self {
            middleware: Vec::new(),
        }
    }

    /// Appends middleware.
    pub fn push(&mut self, middleware: Arc<dyn Middleware<S>>) {
        self.middleware.push(middleware);
    }

    /// Returns the middleware in order.
    #[must_use]
    pub fn as_slice(&self) -> &[Arc<dyn Middleware<S>>] {
        &self.middleware
    }

    /// Returns the number of middleware.
    #[must_use]
    pub fn len(&self) -> usize {
        self.middleware.len()
    }

    /// Returns whether the chain is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.middleware.is_empty()
    }

    /// Runs the chain, finishing with `endpoint`.
    pub fn run<'a>(&'a self, input: S::Input, endpoint: &'a dyn Endpoint<S>) -> BoxFuture<'a, S::Output> {
        Next::new(&self.middleware, endpoint).run(input)
    }
}

impl<S: Stage> Default for Chain<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: Stage> Clone for Chain<S> {
    fn clone(&self) -> Self {
        Self {
            middleware: self.middleware.clone(),
        }
    }
}

impl<S: Stage> fmt::Debug for Chain<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Chain")
            .field("stage", &S::NAME)
            .field("len", &self.middleware.len())
            .finish()
    }
}

/// One chain per stage.
#[derive(Debug, Default, Clone)]
pub struct Pipeline {
    request_received: Chain<RequestReceived>,
    route_matched: Chain<RouteMatched>,
    route_not_matched: Chain<RouteNotMatched>,
    route_dispatched: Chain<RouteDispatched>,
    throwable_caught: Chain<ThrowableCaught>,
    sending_response: Chain<SendingResponse>,
    terminated: Chain<Terminated>,
}

impl Pipeline {
    /// Creates a pipeline with empty chains.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends middleware to the chain of stage `S`.
    pub fn push<S: Stage>(&mut self, middleware: impl Middleware<S> + 'static) {
        S::chain_mut(self).push(Arc::new(middleware));
    }

    /// Returns the chain of stage `S`.
    #[must_use]
    pub fn chain<S: Stage>(&self) -> &Chain<S> {
        S::chain(self)
    }
}

/// Endpoint of the short-circuiting stages: keep going.
pub(crate) fn proceed<T>(input: T) -> Result<MiddlewareResult<T>, BoxError> {
    Ok(MiddlewareResult::Continue(input))
}
