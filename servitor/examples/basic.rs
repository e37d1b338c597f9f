//! Basic example of the Servitor container.
//!
//! Run with `RUST_LOG=servitor_container=trace` to watch resolution.

use std::sync::Arc;

use servitor::prelude::*;
use tracing_subscriber::EnvFilter;

// === Define your traits and types ===

trait Logger: Send + Sync {
    fn log(&self, msg: &str);
}

#[derive(Injectable)]
struct ConsoleLogger;

impl Logger for ConsoleLogger {
    fn log(&self, msg: &str) {
        println!("[LOG] {msg}");
    }
}

#[derive(Clone)]
struct Config {
    database_url: String,
    debug: bool,
}

struct Database {
    url: String,
    logger: Arc<dyn Logger>,
}

impl Database {
    fn query(&self, sql: &str) -> String {
        self.logger.log(&format!("Executing: {sql}"));
        format!("Results from {}", self.url)
    }
}

#[derive(Injectable)]
struct UserRepository {
    #[inject(id = "db", no_autowire)]
    db: Arc<Database>,
}

impl UserRepository {
    fn find_user(&self, id: u64) -> String {
        self.db.query(&format!("SELECT * FROM users WHERE id = {id}"))
    }
}

#[derive(Injectable)]
struct UserService {
    repo: Arc<UserRepository>,
    logger: Arc<dyn Logger>,
    #[inject(default = "20")]
    page_size: usize,
}

impl UserService {
    fn get_user(&self, id: u64) -> String {
        self.logger.log(&format!("Getting user {id} (page size {})", self.page_size));
        self.repo.find_user(id)
    }
}

/// Decorator applied to the logger through `extend`.
struct PrefixedLogger {
    prefix: &'static str,
    inner: Arc<dyn Logger>,
}

impl Logger for PrefixedLogger {
    fn log(&self, msg: &str) {
        self.inner.log(&format!("{} {msg}", self.prefix));
    }
}

struct InfrastructureProvider;

impl Provider for InfrastructureProvider {
    fn register(&self, registrar: &dyn Registrar) -> Result<()> {
        registrar.singleton(
            "db",
            Concrete::factory(|r| {
                let config: Arc<Config> = r.get("config")?;
                let logger: Arc<dyn Logger> = r.get_cloned(ServiceId::of::<dyn Logger>())?;
                Ok(Database { url: config.database_url.clone(), logger })
            }),
        );
        registrar.alias("database".into(), "db".into());
        Ok(())
    }

    fn provides(&self) -> Vec<ServiceId> {
        vec!["db".into(), "database".into()]
    }

    fn is_deferred(&self) -> bool {
        true
    }

    fn name(&self) -> &str {
        "infrastructure"
    }
}

fn main() -> Result<()> {
    // Initialize tracing (logging)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("servitor_container=debug")),
        )
        .init();

    // Build the container
    let container = Container::builder()
        // Config: a pre-built value
        .instance(
            "config",
            Config {
                database_url: "postgres://localhost/myapp".to_string(),
                debug: true,
            },
        )
        // Database: registered on first use
        .provider(InfrastructureProvider)
        // UserService: built by introspection, a new one per resolve
        .factory("users", TypeRef::of::<UserService>())
        .build()?;

    // Logger: interface bound to its implementation
    container.bind::<dyn Logger, ConsoleLogger>(true, |logger| logger as Arc<dyn Logger>);

    // Logger handles are stored as `Arc<dyn Logger>` values
    container.extend(
        ServiceId::of::<dyn Logger>(),
        |logger: Arc<Arc<dyn Logger>>, _: &dyn Resolver| {
            Ok(Arc::new(PrefixedLogger { prefix: "[app]", inner: (*logger).clone() }) as Arc<dyn Logger>)
        },
    )?;

    container.validate()?;

    let config: Arc<Config> = container.get("config")?;
    println!("Debug mode: {}", config.debug);

    let service: Arc<UserService> = container.get("users")?;
    println!("{}", service.get_user(42));

    let db: Arc<Database> = container.get("database")?;
    println!("Database at {}", db.url);

    let repo: Arc<UserRepository> = container.make(Overrides::new())?;
    println!("{}", repo.find_user(7));

    println!("Registered services: {:?}", container.service_ids());
    Ok(())
}
