use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS users (
            id          TEXT PRIMARY KEY,
            email       TEXT NOT NULL UNIQUE,
            name        TEXT NOT NULL,
            username    TEXT NOT NULL UNIQUE,
            created_at  TEXT NOT NULL DEFAULT (datetime('now'))
        );

        -- 1:1 with users; written once at signup, removed with its owner.
        CREATE TABLE IF NOT EXISTS credentials (
            user_id     TEXT PRIMARY KEY REFERENCES users(id) ON DELETE CASCADE,
            hash        TEXT NOT NULL,
            created_at  TEXT NOT NULL DEFAULT (datetime('now'))
        );

        -- Channel names are unique per creator, not globally.
        CREATE TABLE IF NOT EXISTS channels (
            id          TEXT PRIMARY KEY,
            name        TEXT NOT NULL,
            description TEXT,
            created_by  TEXT NOT NULL REFERENCES users(id),
            created_at  TEXT NOT NULL DEFAULT (datetime('now')),
            UNIQUE (name, created_by)
        );

        CREATE TABLE IF NOT EXISTS memberships (
            channel_id  TEXT NOT NULL REFERENCES channels(id),
            user_id     TEXT NOT NULL REFERENCES users(id),
            role        TEXT NOT NULL CHECK (role IN ('ADMIN', 'MEMBER')),
            created_at  TEXT NOT NULL DEFAULT (datetime('now')),
            PRIMARY KEY (channel_id, user_id)
        );

        CREATE INDEX IF NOT EXISTS idx_memberships_user
            ON memberships(user_id);
        ",
    )?;

    info!("Database migrations complete");
    Ok(())
}
