//! Database layer — connection, migrations and event queries.

use std::str::FromStr;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use tracing::info;

use crate::errors::Result;
use crate::events::{CollectedEvent, EventRecord};

const SELECT_EVENTS: &str = r#"
    SELECT id, source, session, sequence, event_type, card_id, actor, counterparty,
           value, detail, emitted_at, payload, received_at
    FROM   events
"#;

/// Establish a SQLite connection pool and run pending migrations.
pub async fn init_pool(database_url: &str) -> Result<SqlitePool> {
    connect(database_url, 5).await
}

/// Like [`init_pool`] with an explicit connection cap. In-memory databases
/// need a cap of 1, since every connection would otherwise see its own database.
pub async fn connect(database_url: &str, max_connections: u32) -> Result<SqlitePool> {
    let url = if database_url.starts_with("sqlite:") {
        database_url.to_string()
    } else {
        format!("sqlite:{database_url}")
    };
    let options = SqliteConnectOptions::from_str(&url)?.create_if_missing(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect_with(options)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;
    info!("Database migrations applied successfully");
    Ok(pool)
}

// ─────────────────────────────────────────────────────────
// Event writes
// ─────────────────────────────────────────────────────────

/// Persist one decoded event. Returns `false` when an event with the same
/// `(source, session, sequence)` was already stored, which makes redelivery
/// harmless.
pub async fn insert_event(pool: &SqlitePool, ev: &CollectedEvent) -> Result<bool> {
    let rows_affected = sqlx::query(
        r#"
        INSERT OR IGNORE INTO events
            (source, session, sequence, event_type, card_id, actor, counterparty,
             value, detail, emitted_at, payload)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
        "#,
    )
    .bind(&ev.source)
    .bind(&ev.session)
    .bind(ev.sequence)
    .bind(&ev.event_type)
    .bind(ev.card_id)
    .bind(&ev.actor)
    .bind(&ev.counterparty)
    .bind(ev.value)
    .bind(&ev.detail)
    .bind(ev.emitted_at)
    .bind(&ev.payload)
    .execute(pool)
    .await?
    .rows_affected();

    Ok(rows_affected > 0)
}

// ─────────────────────────────────────────────────────────
// Event reads
// ─────────────────────────────────────────────────────────

/// Fetch all events, in arrival order.
pub async fn get_all_events(pool: &SqlitePool) -> Result<Vec<EventRecord>> {
    let sql = format!("{SELECT_EVENTS} ORDER BY id ASC");
    let rows = sqlx::query_as::<_, EventRecord>(&sql)
        .fetch_all(pool)
        .await?;
    Ok(rows)
}

/// Fetch the history of one card, in arrival order.
pub async fn get_events_for_card(pool: &SqlitePool, card_id: i64) -> Result<Vec<EventRecord>> {
    let sql = format!("{SELECT_EVENTS} WHERE card_id = ?1 ORDER BY id ASC");
    let rows = sqlx::query_as::<_, EventRecord>(&sql)
        .bind(card_id)
        .fetch_all(pool)
        .await?;
    Ok(rows)
}

/// Fetch every event in which `address` is the actor or the counterparty.
pub async fn get_events_for_account(pool: &SqlitePool, address: &str) -> Result<Vec<EventRecord>> {
    let sql = format!("{SELECT_EVENTS} WHERE actor = ?1 OR counterparty = ?1 ORDER BY id ASC");
    let rows = sqlx::query_as::<_, EventRecord>(&sql)
        .bind(address)
        .fetch_all(pool)
        .await?;
    Ok(rows)
}
