//! Integration tests for the migrator against SQLite.

use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use std::sync::Arc;
use strata_core::{
    CancelFlag, Connection, ConnectionResolver, Direction, MemoryPublisher, Migration,
    MigrationError, MigrationEvent, MigrationRegistry, Migrator, MigratorConfig, ResetOptions,
    Result, RollbackOptions, RunOptions, Schema, SqlMigration, SqliteConnection,
};

const A: &str = "2024_01_01_000000_alpha";
const B: &str = "2024_01_02_000000_beta";
const C: &str = "2024_01_03_000000_gamma";

type Log = Arc<Mutex<Vec<String>>>;

/// Records every call into a shared log.
struct Recorded {
    name: &'static str,
    log: Log,
    fail_up: bool,
    run: bool,
    cancel: Option<CancelFlag>,
}

impl Recorded {
    fn new(name: &'static str, log: &Log) -> Self {
        Self {
            name,
            log: log.clone(),
            fail_up: false,
            run: true,
            cancel: None,
        }
    }

    fn failing(mut self) -> Self {
        self.fail_up = true;
        self
    }

    fn disabled(mut self) -> Self {
        self.run = false;
        self
    }

    fn cancels(mut self, flag: &CancelFlag) -> Self {
        self.cancel = Some(flag.clone());
        self
    }
}

impl Migration for Recorded {
    fn up(&self, _schema: &Schema<'_>) -> Result<()> {
        self.log.lock().push(format!("up:{}", self.name));
        if let Some(flag) = &self.cancel {
            flag.cancel();
        }
        if self.fail_up {
            return Err(MigrationError::message("boom"));
        }
        Ok(())
    }

    fn down(&self, _schema: &Schema<'_>) -> Result<()> {
        self.log.lock().push(format!("down:{}", self.name));
        Ok(())
    }

    fn should_run(&self) -> bool {
        self.run
    }
}

struct CreateUsers;

impl Migration for CreateUsers {
    fn up(&self, schema: &Schema<'_>) -> Result<()> {
        schema.create_table("users", |table| {
            table.id();
            table.string("name", 100);
            table.string("email", 255);
            table.timestamps();
            table.unique(&["email"]);
        })?;
        Ok(())
    }

    fn down(&self, schema: &Schema<'_>) -> Result<()> {
        schema.drop_table("users")?;
        Ok(())
    }
}

struct CreatePosts;

impl Migration for CreatePosts {
    fn up(&self, schema: &Schema<'_>) -> Result<()> {
        schema.create_table("posts", |table| {
            table.id();
            table.big_integer("user_id");
            table.string("title", 200);
            table.text("body").nullable();
            table
                .foreign("user_id")
                .references("id")
                .on("users")
                .cascade_on_delete();
            table.index(&["user_id"]);
        })?;
        Ok(())
    }

    fn down(&self, schema: &Schema<'_>) -> Result<()> {
        schema.drop_table_if_exists("posts")?;
        Ok(())
    }
}

/// Creates a table, then fails inside its transaction.
struct HalfFinished;

impl Migration for HalfFinished {
    fn up(&self, schema: &Schema<'_>) -> Result<()> {
        schema.create_table("scratch", |table| {
            table.increments("id");
        })?;
        Err(MigrationError::message("constraint check failed"))
    }

    fn down(&self, schema: &Schema<'_>) -> Result<()> {
        schema.drop_table_if_exists("scratch")?;
        Ok(())
    }

    fn uses_transaction(&self) -> bool {
        true
    }
}

struct TestContext {
    conn: Arc<SqliteConnection>,
    publisher: Arc<MemoryPublisher>,
    log: Log,
}

impl TestContext {
    fn new() -> Self {
        let _ = tracing_subscriber::fmt()
            .with_test_writer()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .try_init();

        Self {
            conn: Arc::new(SqliteConnection::open_in_memory().unwrap()),
            publisher: Arc::new(MemoryPublisher::new()),
            log: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn resolver(&self) -> ConnectionResolver {
        ConnectionResolver::new("default", self.conn.clone() as Arc<dyn Connection>)
    }

    fn migrator(&self, registry: MigrationRegistry) -> Migrator {
        Migrator::new(self.resolver(), registry, MigratorConfig::default())
            .unwrap()
            .with_publisher(self.publisher.clone())
    }

    fn recorded(&self, names: &[&'static str]) -> MigrationRegistry {
        let mut registry = MigrationRegistry::new();
        for name in names {
            registry.register(*name, Recorded::new(*name, &self.log)).unwrap();
        }
        registry
    }

    fn schema(&self) -> Schema<'_> {
        Schema::new(self.conn.as_ref())
    }

    fn take_log(&self) -> Vec<String> {
        std::mem::take(&mut *self.log.lock())
    }
}

fn blog_registry() -> MigrationRegistry {
    let mut registry = MigrationRegistry::new();
    registry
        .register("2024_02_01_120000_create_posts_table", CreatePosts)
        .unwrap();
    registry
        .register("2024_02_01_100000_create_users_table", CreateUsers)
        .unwrap();
    registry
}

#[test]
fn test_run_executes_exactly_the_pending_set_in_name_order() {
    let ctx = TestContext::new();
    ctx.migrator(ctx.recorded(&[A])).run(&RunOptions::new()).unwrap();
    ctx.take_log();

    let migrator = ctx.migrator(ctx.recorded(&[C, A, B]));
    assert_eq!(migrator.pending().unwrap(), vec![B, C]);

    let report = migrator.run(&RunOptions::new()).unwrap();
    assert_eq!(report.names(), vec![B, C]);
    assert_eq!(ctx.take_log(), vec![format!("up:{B}"), format!("up:{C}")]);
    assert_eq!(migrator.repository().get_applied().unwrap(), vec![A, B, C]);

    let batches = migrator.repository().get_migration_batches().unwrap();
    assert_eq!(batches[A], 1);
    assert_eq!(batches[B], 2);
    assert_eq!(batches[C], 2);
}

#[test]
fn test_default_rollback_reverts_the_last_batch() {
    let ctx = TestContext::new();
    ctx.migrator(ctx.recorded(&[A, B])).run(&RunOptions::new()).unwrap();
    let migrator = ctx.migrator(ctx.recorded(&[A, B, C]));
    migrator.run(&RunOptions::new()).unwrap();
    ctx.take_log();

    let report = migrator.rollback(&RollbackOptions::new()).unwrap();

    assert_eq!(report.direction, Direction::Down);
    assert_eq!(report.names(), vec![C]);
    assert_eq!(ctx.take_log(), vec![format!("down:{C}")]);
    assert_eq!(migrator.repository().get_applied().unwrap(), vec![A, B]);
}

#[test]
fn test_rollback_by_steps_ignores_batch_boundaries() {
    let ctx = TestContext::new();
    ctx.migrator(ctx.recorded(&[A, B])).run(&RunOptions::new()).unwrap();
    let migrator = ctx.migrator(ctx.recorded(&[A, B, C]));
    migrator.run(&RunOptions::new()).unwrap();
    ctx.take_log();

    let report = migrator
        .rollback(&RollbackOptions::new().with_steps(2))
        .unwrap();

    assert_eq!(report.names(), vec![C, B]);
    assert_eq!(migrator.repository().get_applied().unwrap(), vec![A]);
}

#[test]
fn test_rollback_of_a_specific_batch() {
    let ctx = TestContext::new();
    ctx.migrator(ctx.recorded(&[A, B])).run(&RunOptions::new()).unwrap();
    let migrator = ctx.migrator(ctx.recorded(&[A, B, C]));
    migrator.run(&RunOptions::new()).unwrap();
    ctx.take_log();

    let report = migrator
        .rollback(&RollbackOptions::new().with_batch(1))
        .unwrap();

    assert_eq!(report.names(), vec![B, A]);
    assert_eq!(ctx.take_log(), vec![format!("down:{B}"), format!("down:{A}")]);
    assert_eq!(migrator.repository().get_applied().unwrap(), vec![C]);
}

#[test]
fn test_reset_reverts_in_reverse_apply_order() {
    let ctx = TestContext::new();
    ctx.migrator(ctx.recorded(&[B])).run(&RunOptions::new()).unwrap();
    let migrator = ctx.migrator(ctx.recorded(&[A, B, C]));
    migrator.run(&RunOptions::new()).unwrap();
    ctx.take_log();

    // Apply order: B (batch 1), then A and C (batch 2).
    let report = migrator.reset(&ResetOptions::new()).unwrap();

    assert_eq!(report.names(), vec![C, A, B]);
    assert!(migrator.repository().get_applied().unwrap().is_empty());
    assert_eq!(migrator.repository().next_batch_number().unwrap(), 1);
}

#[test]
fn test_step_mode_gives_each_migration_its_own_batch() {
    let ctx = TestContext::new();
    let migrator = ctx.migrator(ctx.recorded(&[A, B, C]));

    let report = migrator.run(&RunOptions::new().with_step(true)).unwrap();

    let batches: Vec<u32> = report.records.iter().map(|r| r.batch).collect();
    assert_eq!(batches, vec![1, 2, 3]);
    assert_eq!(migrator.repository().last_batch_number().unwrap(), 3);

    migrator.rollback(&RollbackOptions::new()).unwrap();
    assert_eq!(migrator.repository().get_applied().unwrap(), vec![A, B]);
}

#[test]
fn test_pretend_run_has_no_side_effects() {
    let ctx = TestContext::new();
    let migrator = ctx.migrator(blog_registry());

    let report = migrator.run(&RunOptions::new().with_pretend(true)).unwrap();

    assert_eq!(report.pretended.len(), 2);
    assert_eq!(report.pretended[0].name, "2024_02_01_100000_create_users_table");
    assert!(report.pretended[0].queries[0]
        .sql
        .starts_with("create table \"users\""));
    assert!(report.pretended[1]
        .queries
        .iter()
        .any(|q| q.sql.contains("foreign key (\"user_id\") references \"users\"")));

    assert!(!ctx.schema().has_table("users").unwrap());
    assert!(!ctx.schema().has_table("posts").unwrap());
    assert!(!migrator.repository().store_exists().unwrap());
}

#[test]
fn test_pretend_rollback_leaves_schema_and_ledger() {
    let ctx = TestContext::new();
    let migrator = ctx.migrator(blog_registry());
    migrator.run(&RunOptions::new()).unwrap();

    let report = migrator
        .rollback(&RollbackOptions::new().with_pretend(true))
        .unwrap();

    assert_eq!(
        report.pretended[0].queries[0].sql,
        "drop table if exists \"posts\""
    );
    assert_eq!(report.pretended[1].queries[0].sql, "drop table \"users\"");
    assert!(ctx.schema().has_table("users").unwrap());
    assert!(ctx.schema().has_table("posts").unwrap());
    assert_eq!(migrator.repository().get_applied().unwrap().len(), 2);
}

#[test]
fn test_users_and_posts_schema_round_trip() {
    let ctx = TestContext::new();
    let migrator = ctx.migrator(blog_registry());

    migrator.run(&RunOptions::new()).unwrap();
    let schema = ctx.schema();
    assert!(schema.has_table("users").unwrap());
    assert!(schema.has_table("posts").unwrap());
    assert!(schema.has_column("posts", "user_id").unwrap());
    assert_eq!(
        schema.column_listing("users").unwrap(),
        vec!["id", "name", "email", "created_at", "updated_at"]
    );

    migrator.rollback(&RollbackOptions::new()).unwrap();
    assert!(!schema.has_table("users").unwrap());
    assert!(!schema.has_table("posts").unwrap());
    assert!(migrator.repository().get_applied().unwrap().is_empty());
}

#[test]
fn test_events_bracket_per_migration_pairs() {
    let ctx = TestContext::new();
    let migrator = ctx.migrator(ctx.recorded(&[A, B]));

    migrator.run(&RunOptions::new()).unwrap();

    assert_eq!(
        ctx.publisher.events(),
        vec![
            MigrationEvent::MigrationsStarted {
                direction: Direction::Up
            },
            MigrationEvent::MigrationStarted {
                name: A.to_string(),
                method: Direction::Up
            },
            MigrationEvent::MigrationEnded {
                name: A.to_string(),
                method: Direction::Up
            },
            MigrationEvent::MigrationStarted {
                name: B.to_string(),
                method: Direction::Up
            },
            MigrationEvent::MigrationEnded {
                name: B.to_string(),
                method: Direction::Up
            },
            MigrationEvent::MigrationsEnded {
                direction: Direction::Up
            },
        ]
    );

    ctx.publisher.clear();
    migrator.reset(&ResetOptions::new()).unwrap();
    migrator.reset(&ResetOptions::new()).unwrap();
    assert_eq!(
        ctx.publisher.names(),
        vec![
            "migration.started",
            "migration.migration_started",
            "migration.migration_ended",
            "migration.migration_started",
            "migration.migration_ended",
            "migration.ended",
            "migration.no_pending",
        ]
    );
}

#[test]
fn test_failure_stops_the_run_and_names_the_migration() {
    let ctx = TestContext::new();
    let mut registry = MigrationRegistry::new();
    registry.register(A, Recorded::new(A, &ctx.log)).unwrap();
    registry
        .register(B, Recorded::new(B, &ctx.log).failing())
        .unwrap();
    registry.register(C, Recorded::new(C, &ctx.log)).unwrap();
    let migrator = ctx.migrator(registry);

    let err = migrator.run(&RunOptions::new()).unwrap_err();

    assert!(err.to_string().contains(B), "{err}");
    assert_eq!(err.failed_migration(), Some(B));
    assert_eq!(err.completed(), [A.to_string()]);
    assert!(matches!(
        err,
        MigrationError::ExecutionFailed {
            direction: Direction::Up,
            ..
        }
    ));
    assert_eq!(ctx.take_log(), vec![format!("up:{A}"), format!("up:{B}")]);
    assert_eq!(migrator.repository().get_applied().unwrap(), vec![A]);
    assert!(!ctx.publisher.names().contains(&"migration.ended"));
}

#[test]
fn test_transactional_failure_rolls_back_its_own_changes() {
    let ctx = TestContext::new();
    let mut registry = MigrationRegistry::new();
    registry
        .register("2024_02_01_100000_create_users_table", CreateUsers)
        .unwrap();
    registry
        .register("2024_02_02_000000_half_finished", HalfFinished)
        .unwrap();
    let migrator = ctx.migrator(registry);

    let err = migrator.run(&RunOptions::new()).unwrap_err();

    assert_eq!(err.failed_migration(), Some("2024_02_02_000000_half_finished"));
    assert!(err.to_string().contains("constraint check failed"));
    assert!(ctx.schema().has_table("users").unwrap());
    assert!(!ctx.schema().has_table("scratch").unwrap());
    assert_eq!(
        migrator.repository().get_applied().unwrap(),
        vec!["2024_02_01_100000_create_users_table"]
    );
}

/// Creates a table, then claims its own ledger row so the ledger write fails.
struct ClaimsLedgerRow;

const WIDGETS: &str = "2024_02_03_000000_create_widgets";

impl Migration for ClaimsLedgerRow {
    fn up(&self, schema: &Schema<'_>) -> Result<()> {
        schema.create_table("widgets", |table| {
            table.increments("id");
        })?;
        schema.statement(&format!(
            "insert into migrations (migration, batch) values ('{WIDGETS}', 9)"
        ))?;
        Ok(())
    }

    fn down(&self, schema: &Schema<'_>) -> Result<()> {
        schema.drop_table_if_exists("widgets")?;
        Ok(())
    }

    fn uses_transaction(&self) -> bool {
        true
    }
}

#[test]
fn test_failed_ledger_write_rolls_back_the_migration() {
    let ctx = TestContext::new();
    let mut registry = MigrationRegistry::new();
    registry.register(WIDGETS, ClaimsLedgerRow).unwrap();
    let migrator = ctx.migrator(registry);

    let err = migrator.run(&RunOptions::new()).unwrap_err();

    let MigrationError::ExecutionFailed { name, source, .. } = err else {
        panic!("expected ExecutionFailed");
    };
    assert_eq!(name, WIDGETS);
    assert!(matches!(*source, MigrationError::DuplicateRecord { .. }));
    assert!(!ctx.schema().has_table("widgets").unwrap());
    assert!(migrator.repository().get_applied().unwrap().is_empty());
}

#[test]
fn test_cancellation_stops_between_migrations() {
    let ctx = TestContext::new();
    let flag = CancelFlag::new();
    let mut registry = MigrationRegistry::new();
    registry
        .register(A, Recorded::new(A, &ctx.log).cancels(&flag))
        .unwrap();
    registry.register(B, Recorded::new(B, &ctx.log)).unwrap();
    let migrator = ctx.migrator(registry);

    let err = migrator
        .run(&RunOptions::new().with_cancel(flag.clone()))
        .unwrap_err();

    assert!(matches!(
        &err,
        MigrationError::Cancelled {
            direction: Direction::Up,
            completed,
        } if completed == &vec![A.to_string()]
    ));
    assert_eq!(ctx.take_log(), vec![format!("up:{A}")]);
    assert_eq!(migrator.repository().get_applied().unwrap(), vec![A]);
    assert_eq!(migrator.pending().unwrap(), vec![B]);
    assert_eq!(ctx.publisher.names().last(), Some(&"migration.ended"));
}

#[test]
fn test_skipped_migrations_stay_pending() {
    let ctx = TestContext::new();
    let mut registry = MigrationRegistry::new();
    registry.register(A, Recorded::new(A, &ctx.log)).unwrap();
    registry
        .register(B, Recorded::new(B, &ctx.log).disabled())
        .unwrap();
    let migrator = ctx.migrator(registry);

    let report = migrator.run(&RunOptions::new()).unwrap();

    assert_eq!(report.names(), vec![A]);
    assert_eq!(report.skipped, vec![B.to_string()]);
    assert_eq!(ctx.take_log(), vec![format!("up:{A}")]);
    assert!(ctx.publisher.events().contains(&MigrationEvent::MigrationSkipped {
        name: B.to_string()
    }));
    assert_eq!(migrator.pending().unwrap(), vec![B]);
}

#[test]
fn test_unregistered_rollback_target_is_reported() {
    let ctx = TestContext::new();
    let migrator = ctx.migrator(ctx.recorded(&[A]));
    migrator.run(&RunOptions::new()).unwrap();
    migrator.repository().log(B, 1).unwrap();
    ctx.take_log();

    let err = migrator.rollback(&RollbackOptions::new()).unwrap_err();

    assert!(matches!(
        err,
        MigrationError::MigrationNotRegistered { ref name } if name == B
    ));
    assert!(ctx.take_log().is_empty());
    assert_eq!(migrator.repository().get_applied().unwrap(), vec![A, B]);
}

#[test]
fn test_status_merges_registry_and_ledger() {
    let ctx = TestContext::new();
    let migrator = ctx.migrator(ctx.recorded(&[A, B]));
    migrator
        .run(&RunOptions::new().with_step(true))
        .unwrap();
    migrator.repository().log(C, 7).unwrap();

    let registry = ctx.recorded(&[A, B, "2024_01_04_000000_delta"]);
    let migrator = ctx.migrator(registry);
    let status = migrator.status().unwrap();

    let rows: Vec<(&str, Option<u32>, bool, bool)> = status
        .iter()
        .map(|s| (s.name.as_str(), s.batch, s.applied, s.registered))
        .collect();
    assert_eq!(
        rows,
        vec![
            (A, Some(1), true, true),
            (B, Some(2), true, true),
            (C, Some(7), true, false),
            ("2024_01_04_000000_delta", None, false, true),
        ]
    );
}

#[test]
fn test_refresh_reapplies_everything_in_one_batch() {
    let ctx = TestContext::new();
    let migrator = ctx.migrator(blog_registry());
    migrator.run(&RunOptions::new().with_step(true)).unwrap();

    let (reset, run) = migrator.refresh(&RunOptions::new()).unwrap();

    assert_eq!(
        reset.names(),
        vec![
            "2024_02_01_120000_create_posts_table",
            "2024_02_01_100000_create_users_table"
        ]
    );
    assert_eq!(run.records.iter().map(|r| r.batch).collect::<Vec<_>>(), vec![1, 1]);
    assert!(ctx.schema().has_table("posts").unwrap());
}

#[test]
fn test_protected_migrator_refuses_destructive_calls() {
    let ctx = TestContext::new();
    let migrator = Migrator::new(
        ctx.resolver(),
        ctx.recorded(&[A]),
        MigratorConfig::new().protected(),
    )
    .unwrap();
    migrator.run(&RunOptions::new().with_force(true)).unwrap();

    assert!(matches!(
        migrator.reset(&ResetOptions::new()),
        Err(MigrationError::ConfirmationRequired { operation: "reset" })
    ));
    assert!(matches!(
        migrator.rollback(&RollbackOptions::new()),
        Err(MigrationError::ConfirmationRequired {
            operation: "rollback"
        })
    ));
    assert_eq!(migrator.repository().get_applied().unwrap(), vec![A]);

    migrator
        .rollback(&RollbackOptions::new().with_force(true))
        .unwrap();
    assert!(migrator.repository().get_applied().unwrap().is_empty());
}

#[test]
fn test_migrations_resolve_named_connections() {
    let ctx = TestContext::new();
    let reporting = Arc::new(SqliteConnection::open_in_memory().unwrap());
    let resolver = ctx
        .resolver()
        .with_connection("reporting", reporting.clone() as Arc<dyn Connection>);

    let mut registry = MigrationRegistry::new();
    registry
        .register(
            A,
            SqlMigration::new(["create table daily_totals (day text)"], ["drop table daily_totals"])
                .on_connection("reporting"),
        )
        .unwrap();
    registry
        .register(
            B,
            SqlMigration::new(["select 1"], ["select 1"]).on_connection("archive"),
        )
        .unwrap();
    let migrator = Migrator::new(resolver, registry, MigratorConfig::default()).unwrap();

    let err = migrator.run(&RunOptions::new()).unwrap_err();

    let MigrationError::ExecutionFailed { source, .. } = err else {
        panic!("expected ExecutionFailed");
    };
    assert!(matches!(
        *source,
        MigrationError::ConnectionNotConfigured { ref name } if name == "archive"
    ));
    assert!(Schema::new(reporting.as_ref()).has_table("daily_totals").unwrap());
    assert!(!ctx.schema().has_table("daily_totals").unwrap());
    assert!(!Schema::new(reporting.as_ref()).has_table("migrations").unwrap());
    assert_eq!(migrator.repository().get_applied().unwrap(), vec![A]);
}

#[test]
fn test_file_backed_ledger_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("app.db");
    let log: Log = Arc::new(Mutex::new(Vec::new()));
    let config = MigratorConfig::new().with_table("schema_migrations");

    let open = |names: &[&'static str]| {
        let conn: Arc<dyn Connection> = Arc::new(SqliteConnection::open(&path).unwrap());
        let mut registry = MigrationRegistry::new();
        for name in names {
            registry.register(*name, Recorded::new(*name, &log)).unwrap();
        }
        Migrator::new(
            ConnectionResolver::new("default", conn),
            registry,
            config.clone(),
        )
        .unwrap()
    };

    open(&[A, B]).run(&RunOptions::new()).unwrap();

    let migrator = open(&[A, B, C]);
    assert_eq!(migrator.pending().unwrap(), vec![C]);
    let report = migrator.run(&RunOptions::new()).unwrap();
    assert_eq!(report.records[0].batch, 2);
    assert!(Schema::new(&SqliteConnection::open(&path).unwrap())
        .has_table("schema_migrations")
        .unwrap());
}
