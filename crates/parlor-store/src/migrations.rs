use rusqlite::Connection;

use crate::StoreError;

pub(crate) fn run(conn: &Connection) -> Result<(), StoreError> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS sessions (
            token           TEXT PRIMARY KEY,
            connection_id   INTEGER NOT NULL,
            username        TEXT NOT NULL,
            user_id         TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS rooms (
            room_name   TEXT PRIMARY KEY,
            password    TEXT NOT NULL DEFAULT ''
        );

        CREATE TABLE IF NOT EXISTS room_members (
            room_name   TEXT NOT NULL,
            user_id     TEXT NOT NULL,
            PRIMARY KEY (room_name, user_id)
        );

        CREATE INDEX IF NOT EXISTS idx_room_members_user
            ON room_members(user_id);

        CREATE TABLE IF NOT EXISTS messages (
            id              INTEGER PRIMARY KEY AUTOINCREMENT,
            from_user_id    TEXT NOT NULL,
            from_user_name  TEXT NOT NULL,
            to_user_id      TEXT,
            room            TEXT,
            content         TEXT NOT NULL,
            is_private      BOOLEAN NOT NULL,
            timestamp       DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP
        );

        CREATE INDEX IF NOT EXISTS idx_messages_room
            ON messages(room, timestamp);

        -- The public room always exists and is never protected
        INSERT OR IGNORE INTO rooms (room_name, password) VALUES ('public', '');
        ",
    )?;

    tracing::info!("store migrations complete");
    Ok(())
}
