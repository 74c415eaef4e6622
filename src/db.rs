use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::{Arc, Mutex};

use crate::entities::{ActorId, Merchant, MerchantId, NewMerchant};
use crate::store::{
    status_change_payload, MerchantStore, StoreError, DRAFTED_EVENT, MERCHANT_ENTITY,
    STATUS_CHANGED_EVENT,
};

/// One connection shared by the merchant store and the actor resolver
pub type SharedConnection = Arc<Mutex<Connection>>;

/// Event for audit trail ("Every change is an event")
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Event {
    pub event_id: String,
    pub timestamp: DateTime<Utc>,
    pub event_type: String,
    pub entity_type: String,
    pub entity_id: String,
    pub data: serde_json::Value,
    pub actor: String,
}

impl Event {
    pub fn new(
        event_type: &str,
        entity_type: &str,
        entity_id: &str,
        data: serde_json::Value,
        actor: &str,
    ) -> Self {
        Self {
            event_id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            event_type: event_type.to_string(),
            entity_type: entity_type.to_string(),
            entity_id: entity_id.to_string(),
            data,
            actor: actor.to_string(),
        }
    }
}

/// Open (or create) the database file and make sure the schema exists
pub fn open_database(path: &Path) -> Result<Connection> {
    let conn = Connection::open(path)
        .with_context(|| format!("Failed to open database at {}", path.display()))?;
    setup_database(&conn)?;
    Ok(conn)
}

pub fn setup_database(conn: &Connection) -> Result<()> {
    // Enable WAL mode for crash recovery (in-memory databases report "memory")
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "foreign_keys", "ON")?;

    // ==========================================================================
    // Portal users (actors) - tokens are stored as SHA-256 digests only
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS portal_users (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            email TEXT UNIQUE NOT NULL,
            token_hash TEXT UNIQUE NOT NULL,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    // ==========================================================================
    // Merchants
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS merchants (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            dba_trading_name TEXT NOT NULL,
            registered_name TEXT,
            employees_num TEXT NOT NULL,
            monthly_turnover TEXT,
            currency_code TEXT NOT NULL,
            category_code TEXT NOT NULL,
            merchant_type TEXT NOT NULL,
            payinto_alias TEXT NOT NULL,
            license_number TEXT,
            registration_status TEXT NOT NULL,
            registration_status_reason TEXT NOT NULL,
            created_by INTEGER NOT NULL REFERENCES portal_users(id),
            version INTEGER NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )",
        [],
    )?;

    // ==========================================================================
    // Events Table (audit trail)
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS events (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            event_id TEXT UNIQUE NOT NULL,
            timestamp TEXT NOT NULL,
            event_type TEXT NOT NULL,
            entity_type TEXT NOT NULL,
            entity_id TEXT NOT NULL,
            data TEXT NOT NULL,
            actor TEXT NOT NULL,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    // ==========================================================================
    // Indexes
    // ==========================================================================
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_merchants_status ON merchants(registration_status)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_events_entity ON events(entity_type, entity_id)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_events_timestamp ON events(timestamp)",
        [],
    )?;

    Ok(())
}

/// Insert event into audit trail
pub fn insert_event(conn: &Connection, event: &Event) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO events (
            event_id, timestamp, event_type, entity_type, entity_id, data, actor
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            event.event_id,
            event.timestamp.to_rfc3339(),
            event.event_type,
            event.entity_type,
            event.entity_id,
            event.data.to_string(),
            event.actor,
        ],
    )?;

    Ok(())
}

/// Get events for a specific entity, newest first
pub fn get_events_for_entity(
    conn: &Connection,
    entity_type: &str,
    entity_id: &str,
) -> rusqlite::Result<Vec<Event>> {
    let mut stmt = conn.prepare(
        "SELECT event_id, timestamp, event_type, entity_type, entity_id, data, actor
         FROM events
         WHERE entity_type = ?1 AND entity_id = ?2
         ORDER BY id DESC",
    )?;

    let events = stmt
        .query_map(params![entity_type, entity_id], |row| {
            let timestamp_str: String = row.get(1)?;
            let data_json: String = row.get(5)?;

            Ok(Event {
                event_id: row.get(0)?,
                timestamp: parse_timestamp(1, &timestamp_str)?,
                event_type: row.get(2)?,
                entity_type: row.get(3)?,
                entity_id: row.get(4)?,
                data: serde_json::from_str(&data_json)
                    .map_err(|e| conversion_error(5, e.to_string()))?,
                actor: row.get(6)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(events)
}

pub fn count_merchants(conn: &Connection) -> Result<i64> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM merchants", [], |row| row.get(0))?;

    Ok(count)
}

// ============================================================================
// ROW MAPPING
// ============================================================================

const MERCHANT_COLUMNS: &str = "id, dba_trading_name, registered_name, employees_num,
    monthly_turnover, currency_code, category_code, merchant_type, payinto_alias,
    license_number, registration_status, registration_status_reason, created_by,
    version, created_at, updated_at";

fn conversion_error(idx: usize, message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, message.into())
}

fn parse_timestamp(idx: usize, value: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| conversion_error(idx, e.to_string()))
}

fn parse_column<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: std::str::FromStr<Err = String>,
{
    let raw: String = row.get(idx)?;
    raw.parse::<T>().map_err(|e| conversion_error(idx, e))
}

fn merchant_from_row(row: &Row<'_>) -> rusqlite::Result<Merchant> {
    let created_at: String = row.get(14)?;
    let updated_at: String = row.get(15)?;

    Ok(Merchant {
        id: row.get(0)?,
        dba_trading_name: row.get(1)?,
        registered_name: row.get(2)?,
        employees_num: parse_column(row, 3)?,
        monthly_turnover: row.get(4)?,
        currency_code: row.get(5)?,
        category_code: row.get(6)?,
        merchant_type: parse_column(row, 7)?,
        payinto_alias: row.get(8)?,
        license_number: row.get(9)?,
        registration_status: parse_column(row, 10)?,
        registration_status_reason: row.get(11)?,
        created_by: row.get(12)?,
        version: row.get(13)?,
        created_at: parse_timestamp(14, &created_at)?,
        updated_at: parse_timestamp(15, &updated_at)?,
    })
}

fn find_merchant(conn: &Connection, id: MerchantId) -> rusqlite::Result<Option<Merchant>> {
    conn.query_row(
        &format!("SELECT {} FROM merchants WHERE id = ?1", MERCHANT_COLUMNS),
        [id],
        merchant_from_row,
    )
    .optional()
}

fn map_store_error(err: rusqlite::Error) -> StoreError {
    match err {
        rusqlite::Error::FromSqlConversionFailure(_, _, inner) => StoreError::Corrupt(inner.to_string()),
        other => StoreError::Sqlite(other),
    }
}

// ============================================================================
// SQLITE MERCHANT STORE
// ============================================================================

#[derive(Clone)]
pub struct SqliteMerchantStore {
    conn: SharedConnection,
}

impl SqliteMerchantStore {
    pub fn new(conn: SharedConnection) -> Self {
        Self { conn }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }
}

impl MerchantStore for SqliteMerchantStore {
    fn find_by_id(&self, id: MerchantId) -> Result<Option<Merchant>, StoreError> {
        let conn = self.lock()?;
        find_merchant(&conn, id).map_err(map_store_error)
    }

    fn insert(&self, data: NewMerchant, created_by: ActorId) -> Result<Merchant, StoreError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        let mut merchant = Merchant::draft(0, data, created_by);
        tx.execute(
            "INSERT INTO merchants (
                dba_trading_name, registered_name, employees_num, monthly_turnover,
                currency_code, category_code, merchant_type, payinto_alias, license_number,
                registration_status, registration_status_reason, created_by,
                version, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
            params![
                merchant.dba_trading_name,
                merchant.registered_name,
                merchant.employees_num.as_str(),
                merchant.monthly_turnover,
                merchant.currency_code,
                merchant.category_code,
                merchant.merchant_type.as_str(),
                merchant.payinto_alias,
                merchant.license_number,
                merchant.registration_status.as_str(),
                merchant.registration_status_reason,
                merchant.created_by,
                merchant.version,
                merchant.created_at.to_rfc3339(),
                merchant.updated_at.to_rfc3339(),
            ],
        )?;
        merchant.id = tx.last_insert_rowid();

        insert_event(
            &tx,
            &Event::new(
                DRAFTED_EVENT,
                MERCHANT_ENTITY,
                &merchant.id.to_string(),
                status_change_payload(&merchant),
                &created_by.to_string(),
            ),
        )?;
        tx.commit()?;

        tracing::debug!(merchant_id = merchant.id, created_by, "merchant draft stored");
        Ok(merchant)
    }

    fn save(&self, merchant: &Merchant, changed_by: ActorId) -> Result<Merchant, StoreError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        // Compare-and-set: only the version we read may be overwritten.
        // created_by is never part of the SET list.
        let updated = tx.execute(
            "UPDATE merchants
             SET registration_status = ?1,
                 registration_status_reason = ?2,
                 version = version + 1,
                 updated_at = ?3
             WHERE id = ?4 AND version = ?5",
            params![
                merchant.registration_status.as_str(),
                merchant.registration_status_reason,
                Utc::now().to_rfc3339(),
                merchant.id,
                merchant.version,
            ],
        )?;

        if updated == 0 {
            // tx dropped here -> rollback
            return Err(StoreError::Conflict {
                id: merchant.id,
                expected_version: merchant.version,
            });
        }

        let saved = find_merchant(&tx, merchant.id)
            .map_err(map_store_error)?
            .ok_or(StoreError::Conflict {
                id: merchant.id,
                expected_version: merchant.version,
            })?;

        insert_event(
            &tx,
            &Event::new(
                STATUS_CHANGED_EVENT,
                MERCHANT_ENTITY,
                &saved.id.to_string(),
                status_change_payload(&saved),
                &changed_by.to_string(),
            ),
        )?;
        tx.commit()?;

        Ok(saved)
    }

    fn audit_trail(&self, id: MerchantId) -> Result<Vec<Event>, StoreError> {
        let conn = self.lock()?;
        get_events_for_entity(&conn, MERCHANT_ENTITY, &id.to_string()).map_err(map_store_error)
    }
}
