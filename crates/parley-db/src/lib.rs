pub mod migrations;
pub mod models;
pub mod queries;

use anyhow::Result;
use rusqlite::Connection;
use std::path::Path;
use std::sync::Mutex;
use tracing::info;

pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;

        // WAL mode for concurrent reads
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;

        migrations::run(&conn)?;

        info!("Database opened at {}", path.display());
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let conn = self
            .conn
            .lock()
            .map_err(|e| anyhow::anyhow!("DB lock poisoned: {}", e))?;
        f(&conn)
    }

    pub fn with_conn_mut<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T>,
    {
        let mut conn = self
            .conn
            .lock()
            .map_err(|e| anyhow::anyhow!("DB lock poisoned: {}", e))?;
        f(&mut conn)
    }
}

/// Unique constraints enforced by the schema. A write that trips one is the
/// authoritative conflict signal; the read-side pre-checks in the handlers
/// only exist for the friendlier error path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Constraint {
    UserEmail,
    UserUsername,
    ChannelNameOwner,
    ChannelMember,
}

/// Classify a failed write: which UNIQUE constraint did it violate, if any?
///
/// SQLite reports these as `UNIQUE constraint failed: <table>.<column>, ...`;
/// the table.column prefixes below cover the schema's complete set.
pub fn violated_constraint(err: &anyhow::Error) -> Option<Constraint> {
    let rusqlite::Error::SqliteFailure(code, Some(message)) =
        err.downcast_ref::<rusqlite::Error>()?
    else {
        return None;
    };
    if code.code != rusqlite::ErrorCode::ConstraintViolation {
        return None;
    }

    if message.contains("users.email") {
        Some(Constraint::UserEmail)
    } else if message.contains("users.username") {
        Some(Constraint::UserUsername)
    } else if message.contains("channels.name") {
        Some(Constraint::ChannelNameOwner)
    } else if message.contains("memberships.channel_id") {
        Some(Constraint::ChannelMember)
    } else {
        None
    }
}
