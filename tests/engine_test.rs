//! End-to-end engine tests against an in-memory SQLite store: preview,
//! execute, rollback, ledger bookkeeping, and the failure paths.

use design_rules::{
    Condition, ConditionOperator as Op, EngineConfig, EngineError, FieldModification, Rule,
    RuleEngine,
};
use serde_json::json;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Row, SqlitePool};

async fn seed_pool() -> SqlitePool {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("in-memory sqlite");
    sqlx::query(
        "CREATE TABLE items (
            id INTEGER PRIMARY KEY,
            name TEXT,
            class TEXT,
            level INTEGER,
            damage REAL
        )",
    )
    .execute(&pool)
    .await
    .unwrap();

    for (id, name, class, level, damage) in [
        (1i64, "Apprentice Staff", "mage", 10i64, 100.0f64),
        (2, "Knight Sword", "warrior", 10, 100.0),
        (3, "Archmage Staff", "mage", 60, 200.0),
        (4, "Priest Rod", "priest", 55, 150.0),
    ] {
        sqlx::query("INSERT INTO items (id, name, class, level, damage) VALUES (?, ?, ?, ?, ?)")
            .bind(id)
            .bind(name)
            .bind(class)
            .bind(level)
            .bind(damage)
            .execute(&pool)
            .await
            .unwrap();
    }
    pool
}

fn engine(pool: SqlitePool) -> RuleEngine {
    RuleEngine::new(pool, EngineConfig::default().with_mechanism("ITEM", "items"))
}

fn mage_damage_rule() -> Rule {
    Rule::new("buff mage damage", "ITEM")
        .with_condition(Condition::new("class", Op::Equals, "mage"))
        .with_modification(FieldModification::new("damage", "current * 1.2"))
}

async fn damage_of(pool: &SqlitePool, id: i64) -> f64 {
    sqlx::query("SELECT damage FROM items WHERE id = ?")
        .bind(id)
        .fetch_one(pool)
        .await
        .unwrap()
        .get::<f64, _>(0)
}

#[tokio::test]
async fn compiled_predicate_matches_in_memory_reference() {
    let pool = seed_pool().await;
    let engine = engine(pool);

    // Reference dataset mirroring the seeded table.
    let reference = [
        ("mage", 10i64),
        ("warrior", 10),
        ("mage", 60),
        ("priest", 55),
    ];

    let rule = Rule::new("high level mages", "ITEM")
        .with_condition(Condition::new("class", Op::Equals, "mage"))
        .with_condition(Condition::new("level", Op::Gte, 50))
        .with_modification(FieldModification::new("damage", "current"));
    let expected = reference
        .iter()
        .filter(|(class, level)| *class == "mage" && *level >= 50)
        .count();
    let preview = engine.preview(&rule).await;
    assert!(preview.success);
    assert_eq!(preview.matched_count, expected);

    let rule = Rule::new("casters", "ITEM")
        .with_condition(Condition::new("class", Op::In, json!(["mage", "priest"])))
        .with_modification(FieldModification::new("damage", "current"));
    let expected = reference
        .iter()
        .filter(|(class, _)| *class == "mage" || *class == "priest")
        .count();
    let preview = engine.preview(&rule).await;
    assert!(preview.success);
    assert_eq!(preview.matched_count, expected);
}

#[tokio::test]
async fn preview_reports_diffs_and_stats() {
    let pool = seed_pool().await;
    let engine = engine(pool);

    let preview = engine.preview(&mage_damage_rule()).await;
    assert!(preview.success);
    assert_eq!(preview.matched_count, 2);
    assert_eq!(preview.record_changes.len(), 2);

    let change = preview
        .record_changes
        .iter()
        .find(|c| c.record_id == "1")
        .unwrap();
    assert_eq!(change.record_name, "Apprentice Staff");
    assert_eq!(change.original_values["damage"], json!(100.0));
    assert_eq!(change.new_values["damage"], json!(120));
    // Full snapshot retained for rollback-by-restore semantics.
    assert_eq!(change.original_record["class"], json!("mage"));

    let stats = &preview.field_stats["damage"];
    assert_eq!(stats.before_min, 100.0);
    assert_eq!(stats.before_max, 200.0);
    assert_eq!(stats.before_avg, 150.0);
    assert_eq!(stats.after_avg, 180.0);
    assert!((stats.change_percent.unwrap() - 20.0).abs() < 1e-9);
}

#[tokio::test]
async fn preview_is_read_only() {
    let pool = seed_pool().await;
    let engine = engine(pool.clone());

    for _ in 0..3 {
        let preview = engine.preview(&mage_damage_rule()).await;
        assert!(preview.success);
    }
    assert_eq!(damage_of(&pool, 1).await, 100.0);
    assert_eq!(damage_of(&pool, 3).await, 200.0);
    assert!(engine.execution_history().is_empty());
}

#[tokio::test]
async fn preview_with_no_matches_warns() {
    let pool = seed_pool().await;
    let engine = engine(pool);

    let rule = Rule::new("druids", "ITEM")
        .with_condition(Condition::new("class", Op::Equals, "druid"))
        .with_modification(FieldModification::new("damage", "current * 2"));
    let preview = engine.preview(&rule).await;
    assert!(preview.success);
    assert_eq!(preview.matched_count, 0);
    assert!(preview.warnings.iter().any(|w| w.contains("no matching records")));
}

#[tokio::test]
async fn invalid_rule_fails_preview_without_database_access() {
    let pool = seed_pool().await;
    let engine = engine(pool);

    let rule = Rule::new("", "ITEM"); // no name, no modifications
    let preview = engine.preview(&rule).await;
    assert!(!preview.success);
    let message = preview.error_message.unwrap();
    assert!(message.contains("rule name must not be empty"));
    assert!(message.contains("at least one field modification"));
}

#[tokio::test]
async fn unknown_mechanism_fails_preview() {
    let pool = seed_pool().await;
    let engine = engine(pool);

    let rule = Rule::new("pets", "PET")
        .with_modification(FieldModification::new("damage", "current"));
    let preview = engine.preview(&rule).await;
    assert!(!preview.success);
    assert!(preview.error_message.unwrap().contains("unknown mechanism 'PET'"));
}

#[tokio::test]
async fn mage_damage_rule_full_lifecycle() {
    let pool = seed_pool().await;
    let engine = engine(pool.clone());

    // Execute: both mage rows change, nothing else does.
    let execution = engine.execute(&mage_damage_rule()).await;
    assert!(execution.success, "{:?}", execution.error_message);
    assert_eq!(execution.affected_count, 2);
    assert_eq!(execution.target_table, "items");
    assert_eq!(execution.executed_sqls.len(), 2);
    assert_eq!(execution.rollback_sqls.len(), 2);
    assert_eq!(execution.rollback_data.len(), 2);
    assert_eq!(damage_of(&pool, 1).await, 120.0);
    assert_eq!(damage_of(&pool, 2).await, 100.0);
    assert_eq!(damage_of(&pool, 3).await, 240.0);

    // The ledger now offers the execution for rollback.
    assert_eq!(engine.execution_history().len(), 1);
    let rollbackable = engine.rollbackable_executions();
    assert_eq!(rollbackable.len(), 1);
    assert_eq!(rollbackable[0].execution_id, execution.execution_id);

    // Rollback restores the snapshot exactly.
    let restore = engine.rollback(&execution.execution_id).await.unwrap();
    assert!(restore.success);
    assert_eq!(restore.affected_count, 2);
    assert_ne!(restore.execution_id, execution.execution_id);
    assert_eq!(damage_of(&pool, 1).await, 100.0);
    assert_eq!(damage_of(&pool, 3).await, 200.0);

    let stored = engine
        .ledger()
        .get(&execution.execution_id)
        .unwrap();
    assert!(stored.rolled_back);
    assert!(stored.rollback_time.is_some());
    assert!(engine.rollbackable_executions().is_empty());
}

#[tokio::test]
async fn rollback_is_one_shot() {
    let pool = seed_pool().await;
    let engine = engine(pool.clone());

    let execution = engine.execute(&mage_damage_rule()).await;
    assert!(execution.success);
    engine.rollback(&execution.execution_id).await.unwrap();

    let err = engine.rollback(&execution.execution_id).await.unwrap_err();
    assert!(matches!(err, EngineError::NotRollbackable { .. }));
    // The second call left the table untouched.
    assert_eq!(damage_of(&pool, 1).await, 100.0);
    assert_eq!(damage_of(&pool, 3).await, 200.0);
}

#[tokio::test]
async fn rollback_reports_rows_actually_restored() {
    let pool = seed_pool().await;
    let engine = engine(pool.clone());

    let execution = engine.execute(&mage_damage_rule()).await;
    assert!(execution.success);
    assert_eq!(execution.affected_count, 2);

    // One affected row disappears before the rollback runs.
    sqlx::query("DELETE FROM items WHERE id = 3")
        .execute(&pool)
        .await
        .unwrap();

    let restore = engine.rollback(&execution.execution_id).await.unwrap();
    assert!(restore.success);
    assert_eq!(restore.affected_count, 1);
    assert_eq!(damage_of(&pool, 1).await, 100.0);
}

#[tokio::test]
async fn rollback_of_unknown_execution_fails() {
    let pool = seed_pool().await;
    let engine = engine(pool);
    let err = engine.rollback("no-such-id").await.unwrap_err();
    assert!(matches!(err, EngineError::ExecutionNotFound { .. }));
}

#[tokio::test]
async fn execute_aborts_whole_call_when_any_row_fails_to_evaluate() {
    let pool = seed_pool().await;
    // A mage row whose damage is NULL: computation for it must fail.
    sqlx::query("INSERT INTO items (id, name, class, level, damage) VALUES (5, 'Cursed Blade', 'mage', 70, NULL)")
        .execute(&pool)
        .await
        .unwrap();
    let engine = engine(pool.clone());

    let execution = engine.execute(&mage_damage_rule()).await;
    assert!(!execution.success);
    assert_eq!(execution.affected_count, 0);
    assert!(execution.error_message.unwrap().contains("not numeric"));

    // Fail-closed: zero rows changed, including the healthy ones.
    assert_eq!(damage_of(&pool, 1).await, 100.0);
    assert_eq!(damage_of(&pool, 3).await, 200.0);

    // The failed attempt is in the history but not rollbackable.
    assert_eq!(engine.execution_history().len(), 1);
    assert!(engine.rollbackable_executions().is_empty());
    let err = engine.rollback(&execution.execution_id).await.unwrap_err();
    assert!(matches!(err, EngineError::NotRollbackable { .. }));
}

#[tokio::test]
async fn preview_skips_bad_rows_instead_of_aborting() {
    let pool = seed_pool().await;
    sqlx::query("INSERT INTO items (id, name, class, level, damage) VALUES (5, 'Cursed Blade', 'mage', 70, NULL)")
        .execute(&pool)
        .await
        .unwrap();
    let engine = engine(pool);

    let preview = engine.preview(&mage_damage_rule()).await;
    assert!(preview.success);
    assert_eq!(preview.matched_count, 3);
    // Two healthy rows produce diffs; the cursed one produces a warning.
    assert_eq!(preview.record_changes.len(), 2);
    assert!(preview.warnings.iter().any(|w| w.contains("Cursed") || w.contains("record 5")));
}

#[tokio::test]
async fn executing_twice_compounds_the_modification() {
    let pool = seed_pool().await;
    let engine = engine(pool.clone());

    let rule = Rule::new("raise by 20 percent", "ITEM")
        .with_condition(Condition::new("id", Op::Equals, 1))
        .with_modification(FieldModification::new("damage", "current + 20%"));

    let first = engine.execute(&rule).await;
    assert!(first.success);
    assert_eq!(damage_of(&pool, 1).await, 120.0);

    let second = engine.execute(&rule).await;
    assert!(second.success);
    // x1.2 twice is x1.44, confirming execute is not idempotent.
    assert!((damage_of(&pool, 1).await - 144.0).abs() < 1e-9);

    assert_eq!(engine.execution_history().len(), 2);
}

#[tokio::test]
async fn rollback_sqls_restore_original_literals() {
    let pool = seed_pool().await;
    let engine = engine(pool.clone());

    let execution = engine.execute(&mage_damage_rule()).await;
    assert!(execution.success);

    // The compensating statements carry the pre-execution values inline.
    assert!(execution
        .rollback_sqls
        .iter()
        .any(|sql| sql.contains("WHERE id = 1") && sql.contains("damage = 100")));
    // And the snapshots hold the full original rows.
    assert!(execution
        .rollback_data
        .iter()
        .any(|snap| snap["id"] == json!(1) && snap["damage"] == json!(100.0)));
}

#[tokio::test]
async fn database_calls_are_bounded_by_the_statement_timeout() {
    let pool = seed_pool().await;
    let mut config = EngineConfig::default().with_mechanism("ITEM", "items");
    config.statement_timeout_ms = 50;
    let engine = RuleEngine::new(pool.clone(), config);

    // Park the pool's only connection so every acquire stalls.
    let held = pool.acquire().await.unwrap();

    let preview = engine.preview(&mage_damage_rule()).await;
    assert!(!preview.success);
    assert!(preview
        .error_message
        .unwrap()
        .contains("timed out after 50ms"));

    let execution = engine.execute(&mage_damage_rule()).await;
    assert!(!execution.success);
    assert!(execution.error_message.unwrap().contains("timed out"));

    // With the connection back: nothing was written, and the same engine
    // recovers.
    drop(held);
    assert_eq!(damage_of(&pool, 1).await, 100.0);
    let preview = engine.preview(&mage_damage_rule()).await;
    assert!(preview.success);
}

#[tokio::test]
async fn clamp_and_conditions_work_end_to_end() {
    let pool = seed_pool().await;
    let engine = engine(pool.clone());

    let rule = Rule::new("clamp high level damage", "ITEM")
        .with_condition(Condition::new("level", Op::Between, json!([50, 70])))
        .with_modification(FieldModification::new(
            "damage",
            "CLAMP(current * 1.5, 100, 250)",
        ));
    let execution = engine.execute(&rule).await;
    assert!(execution.success, "{:?}", execution.error_message);
    assert_eq!(execution.affected_count, 2);
    assert_eq!(damage_of(&pool, 3).await, 250.0); // 300 clamped
    assert_eq!(damage_of(&pool, 4).await, 225.0);
}
