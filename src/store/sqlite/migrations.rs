use anyhow::{bail, Context, Result};
use rusqlite::Connection;

/// Schema scripts, applied in order; a store at `user_version = n` has run
/// the first `n` of them.
const MIGRATIONS: &[(&str, &str)] = &[
    ("schema_v1.sql", include_str!("schemas/schema_v1.sql")),
    ("schema_v2.sql", include_str!("schemas/schema_v2.sql")),
];

fn schema_version() -> i32 {
    MIGRATIONS.len() as i32
}

pub fn run_migrations(conn: &mut Connection) -> Result<()> {
    let applied: i32 = conn
        .pragma_query_value(None, "user_version", |row| row.get(0))
        .context("failed to read interval store schema version")?;
    let target = schema_version();

    if applied > target {
        bail!("interval store schema {applied} is newer than this build supports ({target})");
    }
    if applied == target {
        return Ok(());
    }

    let tx = conn
        .transaction()
        .context("failed to open migration transaction")?;
    for (name, script) in MIGRATIONS.iter().skip(applied.max(0) as usize) {
        tx.execute_batch(script)
            .with_context(|| format!("failed to execute {name}"))?;
    }
    tx.pragma_update(None, "user_version", target)
        .context("failed to record interval store schema version")?;
    tx.commit().context("failed to commit migrations")?;

    Ok(())
}
