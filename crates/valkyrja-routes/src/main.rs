//! valkyrja-routes CLI
//!
//! Command-line tool for inspecting, matching and caching route definitions.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use tracing::{debug, info, Level};
use tracing_subscriber::FmtSubscriber;

use valkyrja_routing::pipeline::RouteDispatched;
use valkyrja_routing::{
    BoxError, BoxFuture, Matched, Method, Middleware, Next, Response, RouteCache, RouteCollection,
    RouteLookup, Router, RouterConfig,
};

/// Inspect Valkyrja routes without starting a server.
#[derive(Parser)]
#[command(name = "valkyrja-routes")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Route definition or route cache file (JSON).
    #[arg(short, long, env = "VALKYRJA_ROUTES", default_value = "routes.json")]
    routes: PathBuf,

    /// Router configuration file (JSON).
    #[arg(short, long, env = "VALKYRJA_ROUTER_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose output.
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List every route, sorted by name.
    List,

    /// Show which route a request would reach.
    Match {
        /// Request method, e.g. GET.
        method: Method,

        /// Request path, e.g. /users/7.
        path: String,
    },

    /// Compile the definitions into a route cache file.
    Cache {
        /// Output file (defaults to `cache_path` from the config).
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn load_config(path: Option<&Path>) -> anyhow::Result<RouterConfig> {
    match path {
        Some(path) => RouterConfig::from_file(path)
            .with_context(|| format!("failed to read config {}", path.display())),
        None => Ok(RouterConfig::default()),
    }
}

/// Stands in for route middleware, which only exists in the application.
struct Inspect;

impl Middleware<RouteDispatched> for Inspect {
    fn handle<'a>(
        &'a self,
        matched: Matched,
        next: Next<'a, RouteDispatched>,
    ) -> BoxFuture<'a, Result<Response, BoxError>> {
        next.run(matched)
    }
}

fn load_router(routes: &Path, config: RouterConfig) -> anyhow::Result<Router> {
    let definitions = RouteCache::load(routes)
        .with_context(|| format!("failed to read routes {}", routes.display()))?;
    debug!(count = definitions.len(), "route definitions loaded");

    let middleware: BTreeSet<String> = definitions
        .routes()
        .iter()
        .flat_map(|route| route.middleware.iter().cloned())
        .collect();

    let builder = middleware
        .into_iter()
        .fold(Router::builder().config(config), |builder, id| {
            builder.route_middleware(id, Inspect)
        });

    let router = builder
        .descriptors(definitions)
        .build()
        .context("invalid route definitions")?;
    Ok(router)
}

fn route_table(routes: &RouteCollection) -> String {
    let mut lines = vec![
        format!("{:<24} {:<16} {:<32} {}", "NAME", "METHODS", "PATH", "HANDLER"),
        "-".repeat(96),
    ];

    for (name, route) in routes.all_flattened() {
        let methods = route
            .methods()
            .iter()
            .map(Method::as_str)
            .collect::<Vec<_>>()
            .join("|");
        let handler = route.handler().name().unwrap_or("<closure>");
        let mut line = format!("{name:<24} {methods:<16} {:<32} {handler}", route.path());
        if !route.middleware().is_empty() {
            line.push_str(&format!(" [{}]", route.middleware().join(", ")));
        }
        if route.is_secure() {
            line.push_str(" (https)");
        }
        lines.push(line);
    }

    lines.push(String::new());
    lines.join("\n")
}

fn describe_match(router: &Router, method: Method, path: &str) -> String {
    match router.matcher().lookup(method, path) {
        RouteLookup::Match(found) => {
            let mut out = format!("{} -> {}\n", found.route.name(), found.route.path());
            for (name, value) in found.parameters.iter() {
                out.push_str(&format!("  {name} = {value}\n"));
            }
            out
        }
        RouteLookup::MethodNotAllowed { allowed } => {
            format!("405 Method Not Allowed (allow: {})\n", allowed.header_value())
        }
        RouteLookup::NotFound => "404 Not Found\n".to_string(),
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let log_level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .without_time()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::List => {
            let router = load_router(&cli.routes, config)?;
            print!("{}", route_table(router.routes()));
        }

        Commands::Match { method, path } => {
            let router = load_router(&cli.routes, config)?;
            print!("{}", describe_match(&router, method, &path));
        }

        Commands::Cache { output } => {
            let Some(output) = output.or_else(|| config.cache_path.clone()) else {
                bail!("no output file given and no cache_path configured");
            };

            // always compile the definitions, never an existing cache
            let config = RouterConfig {
                use_cache: false,
                ..config
            };
            let router = load_router(&cli.routes, config)?;
            let cache = RouteCache::from_collection(router.routes())?;
            cache
                .save(&output)
                .with_context(|| format!("failed to write {}", output.display()))?;
            info!("Cached {} routes to {}", cache.len(), output.display());
        }
    }

    Ok(())
}
