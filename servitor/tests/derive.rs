use std::sync::Arc;

use servitor::prelude::*;

trait Logger: Send + Sync {
    fn prefix(&self) -> &str;
}

struct ConsoleLogger;

impl Logger for ConsoleLogger {
    fn prefix(&self) -> &str {
        "console"
    }
}

#[derive(Injectable)]
struct Clock;

#[derive(Injectable)]
struct Mailer {
    clock: Arc<Clock>,
    logger: Arc<dyn Logger>,
    #[inject(default = "25")]
    port: u16,
    #[inject(default)]
    host: String,
    retries: Option<u8>,
}

struct Database {
    url: String,
}

#[derive(Injectable)]
struct UserRepository {
    #[inject(id = "db", no_autowire)]
    db: Arc<Database>,
}

#[derive(Injectable)]
struct Audit {
    #[inject(id = "audit.sink")]
    sink: Option<Arc<dyn Logger>>,
    #[inject(no_autowire)]
    database: Option<Arc<Database>>,
}

fn with_logger() -> Container {
    let container = Container::new();
    container.singleton(
        ServiceId::of::<dyn Logger>(),
        Concrete::factory(|_| Ok(Arc::new(ConsoleLogger) as Arc<dyn Logger>)),
    );
    container
}

#[test]
fn unit_struct_has_no_parameters() {
    assert!(<Clock as Injectable>::parameters().is_empty());

    let container = Container::new();
    assert!(container.make::<Clock>(Overrides::new()).is_ok());
}

#[test]
fn parameters_follow_field_order_and_kinds() {
    let parameters = <Mailer as Injectable>::parameters();
    let names: Vec<_> = parameters.iter().map(Parameter::name).collect();
    assert_eq!(names, ["clock", "logger", "port", "host", "retries"]);

    assert!(matches!(
        parameters[0].kind(),
        ParameterKind::Service { constructor: Some(_), .. }
    ));
    assert!(matches!(
        parameters[1].kind(),
        ParameterKind::Service { constructor: None, .. }
    ));
    assert_eq!(parameters[1].declared_type(), ServiceId::of::<dyn Logger>().as_str());
    assert!(matches!(parameters[2].kind(), ParameterKind::Value { .. }));

    assert!(parameters[2].has_default());
    assert!(parameters[3].has_default());
    assert!(parameters[4].is_optional());
    assert!(!parameters[0].is_optional());
}

#[test]
fn derived_type_is_autowired() {
    let container = with_logger();
    let mailer: Arc<Mailer> = container.make(Overrides::new()).unwrap();

    assert_eq!(mailer.logger.prefix(), "console");
    assert_eq!(mailer.port, 25);
    assert_eq!(mailer.host, "");
    assert_eq!(mailer.retries, None);
    let _ = &mailer.clock;
}

#[test]
fn overrides_win_over_defaults() {
    let container = with_logger();
    let mailer: Arc<Mailer> = container
        .make(
            Overrides::new()
                .with("port", 2525u16)
                .with("host", "smtp.local".to_string())
                .with("retries", 3u8),
        )
        .unwrap();

    assert_eq!(mailer.port, 2525);
    assert_eq!(mailer.host, "smtp.local");
    assert_eq!(mailer.retries, Some(3));
}

#[test]
fn missing_interface_is_unresolvable() {
    let container = Container::new();
    let err = container.make::<Mailer>(Overrides::new()).err().unwrap();

    match err {
        ContainerError::UnresolvableParameter(err) => assert_eq!(err.parameter, "logger"),
        other => panic!("Expected UnresolvableParameter, got: {other:?}"),
    }
}

#[test]
fn custom_id_looks_up_registered_service() {
    let container = Container::new();
    container.singleton(
        "db",
        Concrete::factory(|_| Ok(Database { url: "sqlite::memory:".to_string() })),
    );
    container.singleton("users", TypeRef::of::<UserRepository>());

    let users: Arc<UserRepository> = container.get("users").unwrap();
    let db: Arc<Database> = container.get("db").unwrap();

    assert!(Arc::ptr_eq(&users.db, &db));
    assert_eq!(users.db.url, "sqlite::memory:");
}

#[test]
fn no_autowire_service_must_be_registered() {
    let container = Container::new();
    container.singleton("users", TypeRef::of::<UserRepository>());

    assert!(matches!(
        container.get::<UserRepository>("users"),
        Err(ContainerError::UnresolvableParameter(_))
    ));
}

#[test]
fn optional_fields_resolve_to_none() {
    let container = Container::new();
    let audit: Arc<Audit> = container.make(Overrides::new()).unwrap();

    assert!(audit.sink.is_none());
    assert!(audit.database.is_none());
}

#[test]
fn optional_fields_pick_up_registrations() {
    let container = Container::new();
    container.singleton(
        "audit.sink",
        Concrete::factory(|_| Ok(Arc::new(ConsoleLogger) as Arc<dyn Logger>)),
    );
    container.instance(ServiceId::of::<Database>(), Database { url: "pg".to_string() });

    let audit: Arc<Audit> = container.make(Overrides::new()).unwrap();

    assert_eq!(audit.sink.as_ref().map(|sink| sink.prefix()), Some("console"));
    assert_eq!(audit.database.as_ref().map(|db| db.url.as_str()), Some("pg"));
}

#[test]
fn bind_resolves_interface_parameters() {
    #[derive(Injectable)]
    struct PlainLogger;

    impl Logger for PlainLogger {
        fn prefix(&self) -> &str {
            "plain"
        }
    }

    let container = Container::new();
    container.bind::<dyn Logger, PlainLogger>(true, |logger| logger as Arc<dyn Logger>);

    let mailer: Arc<Mailer> = container.make(Overrides::new()).unwrap();
    assert_eq!(mailer.logger.prefix(), "plain");
}
