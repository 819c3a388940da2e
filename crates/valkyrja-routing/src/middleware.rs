//! Built-in middleware.

use tracing::{debug, info};

use crate::error::BoxError;
use crate::pipeline::{
    BoxFuture, Exchange, Matched, Middleware, MiddlewareResult, Next, RequestReceived,
    RouteMatched, SendingResponse, Terminated,
};
use crate::request::Request;
use crate::response::Response;

/// Redirects `/path/` to `/path` before routing.
///
/// Routes treat `/foo` and `/foo/` as different paths; register this in the
/// request-received stage to fold the trailing slash into a `301` instead.
#[derive(Debug, Clone, Copy, Default)]
pub struct TrailingSlashRedirect;

impl TrailingSlashRedirect {
    fn location(request: &Request) -> Option<String> {
        if request.path.len() <= 1 || !request.path.ends_with('/') {
            return None;
        }

        let trimmed = request.path.trim_end_matches('/');
        let target = if trimmed.is_empty() { "/" } else { trimmed };
        Some(match &request.query_string {
            Some(query) if !query.is_empty() => format!("{target}?{query}"),
            _ => target.to_string(),
        })
    }
}

impl Middleware<RequestReceived> for TrailingSlashRedirect {
    fn handle<'a>(
        &'a self,
        request: Request,
        next: Next<'a, RequestReceived>,
    ) -> BoxFuture<'a, Result<MiddlewareResult, BoxError>> {
        Box::pin(async move {
            if let Some(location) = Self::location(&request) {
                debug!(path = %request.path, %location, "redirecting trailing slash");
                return Ok(MiddlewareResult::Response(Response::redirect_permanent(
                    location,
                )));
            }
            next.run(request).await
        })
    }
}

/// Sends secure routes reached over plain HTTP to their `https://` URL.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequireSecure;

impl Middleware<RouteMatched> for RequireSecure {
    fn handle<'a>(
        &'a self,
        matched: Matched,
        next: Next<'a, RouteMatched>,
    ) -> BoxFuture<'a, Result<MiddlewareResult<Matched>, BoxError>> {
        Box::pin(async move {
            if !matched.route.is_secure() || matched.request.secure {
                return next.run(matched).await;
            }

            let response = match matched.request.get_header("Host") {
                Some(host) => Response::redirect_permanent(format!(
                    "https://{host}{}",
                    matched.request.path_and_query()
                )),
                None => Response::error(400),
            };
            debug!(route = matched.route.name(), "secure route requested over http");
            Ok(MiddlewareResult::Response(response))
        })
    }
}

/// Marks every response as uncacheable.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCacheHeaders;

impl Middleware<SendingResponse> for NoCacheHeaders {
    fn handle<'a>(
        &'a self,
        exchange: Exchange,
        next: Next<'a, SendingResponse>,
    ) -> BoxFuture<'a, Response> {
        Box::pin(async move {
            next.run(exchange)
                .await
                .header("Cache-Control", "no-cache, no-store, must-revalidate, max-age=0")
                .header("Pragma", "no-cache")
                .header("Expires", "0")
        })
    }
}

/// Logs each finished request.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestLogging;

impl Middleware<Terminated> for RequestLogging {
    fn handle<'a>(&'a self, exchange: Exchange, next: Next<'a, Terminated>) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            info!(
                method = %exchange.request.method,
                path = %exchange.request.path,
                status = exchange.response.status,
                "request completed"
            );
            next.run(exchange).await;
        })
    }
}
