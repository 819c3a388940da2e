#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use valkyrja_routing::pipeline::RouteDispatched;
use valkyrja_routing::{
    handler, BoxFuture, Matched, Matcher, Middleware, Next, Request, Response, Route,
    RouteCollection, RouterBuilder,
};

/// Shared record of which middleware ran, in order.
pub type Log = Arc<Mutex<Vec<String>>>;

pub fn log() -> Log {
    Arc::new(Mutex::new(Vec::new()))
}

pub fn entries(log: &Log) -> Vec<String> {
    log.lock().unwrap().clone()
}

pub fn route(name: &str, path: &str) -> Route {
    Route::new(name, path, name)
        .unwrap_or_else(|e| panic!("Failed to compile: {path}\nError: {e:?}"))
}

pub fn matcher(routes: impl IntoIterator<Item = Route>) -> Matcher {
    let mut collection = RouteCollection::default();
    for route in routes {
        collection.add(route).unwrap();
    }
    Matcher::new(Arc::new(collection))
}

/// `GET /` named `home` and `GET /users/{id:num}` named `user.show`.
pub fn scenario() -> RouterBuilder {
    valkyrja_routing::Router::builder()
        .get("home", "/", handler(|_req| async { Response::text("home") }))
        .get("user.show", "/users/{id:num}", "users.show")
        .handler("users.show", |req: Request| async move {
            Response::text(format!("user {}", req.params.get("id").unwrap_or("?")))
        })
}

/// Route-dispatched middleware that records its label.
pub struct Spy {
    pub label: &'static str,
    pub log: Log,
}

impl Middleware<RouteDispatched> for Spy {
    fn handle<'a>(
        &'a self,
        matched: Matched,
        next: Next<'a, RouteDispatched>,
    ) -> BoxFuture<'a, Result<Response, valkyrja_routing::BoxError>> {
        Box::pin(async move {
            self.log.lock().unwrap().push(self.label.to_string());
            next.run(matched).await
        })
    }
}
