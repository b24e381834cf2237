//! Article store schema, in upgrade order.
//!
//! The schema grows in three steps:
//! 1. `articles`: one row per fingerprinted URL (`url_hash` is UNIQUE).
//! 2. `tags` plus the ordered `article_tags` link table.
//! 3. `reflections`: at most one note per article, cascaded on delete.
//!
//! `PRAGMA user_version` records the last applied step. A database written by
//! a newer build is refused rather than partially understood.

use crate::db::{DbError, DbResult};
use log::{debug, info};
use rusqlite::{Connection, Transaction};

/// One schema upgrade; `version` is the `user_version` it leaves behind.
#[derive(Debug, Clone, Copy)]
struct SchemaStep {
    version: u32,
    name: &'static str,
    sql: &'static str,
}

const SCHEMA_STEPS: &[SchemaStep] = &[
    SchemaStep {
        version: 1,
        name: "articles",
        sql: include_str!("0001_init.sql"),
    },
    SchemaStep {
        version: 2,
        name: "tags",
        sql: include_str!("0002_tags.sql"),
    },
    SchemaStep {
        version: 3,
        name: "reflections",
        sql: include_str!("0003_reflections.sql"),
    },
];

/// Schema version this build writes.
pub fn latest_version() -> u32 {
    SCHEMA_STEPS.last().map_or(0, |step| step.version)
}

/// Steps still missing from a database at `from_version`.
fn pending_steps(from_version: u32) -> &'static [SchemaStep] {
    let applied = SCHEMA_STEPS.partition_point(|step| step.version <= from_version);
    &SCHEMA_STEPS[applied..]
}

/// Brings the article schema up to `latest_version()`.
///
/// All pending steps share one transaction, so an interrupted upgrade leaves
/// the previous schema intact.
///
/// # Errors
/// - `UnsupportedSchemaVersion` when the file was written by a newer build.
/// - `Sqlite` when a step fails; nothing from the batch is kept.
pub fn apply_migrations(conn: &mut Connection) -> DbResult<()> {
    let from_version = schema_version(conn)?;
    let latest = latest_version();
    if from_version > latest {
        return Err(DbError::UnsupportedSchemaVersion {
            db_version: from_version,
            latest_supported: latest,
        });
    }

    let pending = pending_steps(from_version);
    if pending.is_empty() {
        return Ok(());
    }

    let tx = conn.transaction()?;
    for step in pending {
        apply_step(&tx, step)?;
    }
    tx.commit()?;

    let names: Vec<&str> = pending.iter().map(|step| step.name).collect();
    info!(
        "event=db_migrate module=db status=ok from_version={} to_version={} steps={}",
        from_version,
        latest,
        names.join(",")
    );
    Ok(())
}

fn apply_step(tx: &Transaction<'_>, step: &SchemaStep) -> DbResult<()> {
    tx.execute_batch(step.sql)?;
    tx.pragma_update(None, "user_version", step.version)?;
    debug!(
        "event=db_migrate module=db status=step_applied version={} step={}",
        step.version, step.name
    );
    Ok(())
}

fn schema_version(conn: &Connection) -> DbResult<u32> {
    let version = conn.query_row("PRAGMA user_version;", [], |row| row.get::<_, u32>(0))?;
    Ok(version)
}
