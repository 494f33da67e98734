//! SQLite-backed [`Store`].

use std::path::Path;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use parlor_protocol::UserId;
use parlor_transport::ConnectionId;
use rusqlite::{Connection, OptionalExtension, params};

use crate::{
    NewMessage, RoomRecord, SessionRecord, Store, StoreError, StoredMessage,
    migrations,
};

/// Format of timestamps SQLite writes through `CURRENT_TIMESTAMP`.
const SQLITE_DATETIME: &str = "%Y-%m-%d %H:%M:%S";

const MESSAGE_COLUMNS: &str = "id, from_user_id, from_user_name, to_user_id, room, content, is_private, timestamp";

/// A single SQLite connection behind a mutex.
///
/// Queries run on Tokio's blocking pool so the async callers never stall
/// a worker thread on disk I/O. SQLite serializes writers anyway, so one
/// connection is enough for a single-process chat server.
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Opens (creating if needed) the database file and runs migrations.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |_| Ok(()))?;
        migrations::run(&conn)?;
        tracing::info!(path = %path.display(), "store opened");
        Ok(Self::from_connection(conn))
    }

    /// Opens a private in-memory database. Used by tests.
    pub fn in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        migrations::run(&conn)?;
        Ok(Self::from_connection(conn))
    }

    fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
        }
    }

    /// Runs `f` against the connection on the blocking pool.
    async fn run<F, T>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&mut Connection) -> Result<T, StoreError> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut conn = conn.lock().map_err(|_| StoreError::LockPoisoned)?;
            f(&mut conn)
        })
        .await?
    }
}

impl Store for SqliteStore {
    // -- Sessions --

    async fn insert_session(
        &self,
        session: SessionRecord,
    ) -> Result<(), StoreError> {
        self.run(move |conn| {
            conn.execute(
                "INSERT INTO sessions (token, connection_id, username, user_id) VALUES (?1, ?2, ?3, ?4)",
                params![
                    session.token,
                    conn_id_to_sql(session.connection_id),
                    session.username,
                    session.user_id.0,
                ],
            )?;
            Ok(())
        })
        .await
    }

    async fn find_session(
        &self,
        token: &str,
    ) -> Result<Option<SessionRecord>, StoreError> {
        let token = token.to_owned();
        self.run(move |conn| {
            let row = conn
                .query_row(
                    "SELECT token, connection_id, username, user_id FROM sessions WHERE token = ?1",
                    [&token],
                    |row| {
                        Ok(SessionRecord {
                            token: row.get(0)?,
                            connection_id: conn_id_from_sql(row.get(1)?),
                            username: row.get(2)?,
                            user_id: UserId(row.get(3)?),
                        })
                    },
                )
                .optional()?;
            Ok(row)
        })
        .await
    }

    async fn update_session_connection(
        &self,
        token: &str,
        conn_id: ConnectionId,
    ) -> Result<(), StoreError> {
        let token = token.to_owned();
        self.run(move |conn| {
            conn.execute(
                "UPDATE sessions SET connection_id = ?1 WHERE token = ?2",
                params![conn_id_to_sql(conn_id), token],
            )?;
            Ok(())
        })
        .await
    }

    async fn purge_user(
        &self,
        token: &str,
        user_id: &UserId,
    ) -> Result<(), StoreError> {
        let token = token.to_owned();
        let user_id = user_id.0.clone();
        self.run(move |conn| {
            let tx = conn.transaction()?;
            tx.execute("DELETE FROM sessions WHERE token = ?1", [&token])?;
            tx.execute("DELETE FROM messages WHERE from_user_id = ?1", [&user_id])?;
            tx.execute("DELETE FROM room_members WHERE user_id = ?1", [&user_id])?;
            tx.commit()?;
            Ok(())
        })
        .await
    }

    // -- Rooms --

    async fn load_rooms(&self) -> Result<Vec<RoomRecord>, StoreError> {
        self.run(|conn| {
            let mut stmt = conn
                .prepare("SELECT room_name, password FROM rooms ORDER BY rowid")?;
            let rows = stmt
                .query_map([], |row| {
                    Ok(RoomRecord {
                        name: row.get(0)?,
                        password: row
                            .get::<_, Option<String>>(1)?
                            .unwrap_or_default(),
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
        .await
    }

    async fn insert_room_if_absent(
        &self,
        name: &str,
        password: &str,
    ) -> Result<bool, StoreError> {
        let name = name.to_owned();
        let password = password.to_owned();
        self.run(move |conn| {
            let inserted = conn.execute(
                "INSERT OR IGNORE INTO rooms (room_name, password) VALUES (?1, ?2)",
                params![name, password],
            )?;
            Ok(inserted > 0)
        })
        .await
    }

    async fn delete_room(&self, name: &str) -> Result<(), StoreError> {
        let name = name.to_owned();
        self.run(move |conn| {
            let tx = conn.transaction()?;
            tx.execute("DELETE FROM rooms WHERE room_name = ?1", [&name])?;
            tx.execute("DELETE FROM room_members WHERE room_name = ?1", [&name])?;
            tx.execute("DELETE FROM messages WHERE room = ?1", [&name])?;
            tx.commit()?;
            Ok(())
        })
        .await
    }

    async fn add_membership(
        &self,
        room: &str,
        user_id: &UserId,
    ) -> Result<(), StoreError> {
        let room = room.to_owned();
        let user_id = user_id.0.clone();
        self.run(move |conn| {
            conn.execute(
                "INSERT OR IGNORE INTO room_members (room_name, user_id) VALUES (?1, ?2)",
                params![room, user_id],
            )?;
            Ok(())
        })
        .await
    }

    async fn rooms_for_user(
        &self,
        user_id: &UserId,
    ) -> Result<Vec<String>, StoreError> {
        let user_id = user_id.0.clone();
        self.run(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT room_name FROM room_members WHERE user_id = ?1 ORDER BY rowid",
            )?;
            let rows = stmt
                .query_map([&user_id], |row| row.get(0))?
                .collect::<Result<Vec<String>, _>>()?;
            Ok(rows)
        })
        .await
    }

    // -- Messages --

    async fn append_message(
        &self,
        message: NewMessage,
    ) -> Result<i64, StoreError> {
        self.run(move |conn| {
            conn.execute(
                "INSERT INTO messages (from_user_id, from_user_name, to_user_id, room, content, is_private, timestamp)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    message.from_user_id.0,
                    message.from_user_name,
                    message.to_user_id.map(|u| u.0),
                    message.room,
                    message.content,
                    message.is_private,
                    format_timestamp(&message.timestamp),
                ],
            )?;
            Ok(conn.last_insert_rowid())
        })
        .await
    }

    // History orders by julianday(timestamp): rows in SQLite's own
    // format must sort by time next to the RFC 3339 rows written here.
    async fn room_history(
        &self,
        room: &str,
    ) -> Result<Vec<StoredMessage>, StoreError> {
        let room = room.to_owned();
        self.run(move |conn| {
            let sql = format!(
                "SELECT {MESSAGE_COLUMNS} FROM messages
                 WHERE room = ?1 AND is_private = 0
                 ORDER BY julianday(timestamp) ASC, id ASC"
            );
            query_messages(conn, &sql, params![room])
        })
        .await
    }

    async fn private_history(
        &self,
        user: &UserId,
        peer: &UserId,
    ) -> Result<Vec<StoredMessage>, StoreError> {
        let user = user.0.clone();
        let peer = peer.0.clone();
        self.run(move |conn| {
            let sql = format!(
                "SELECT {MESSAGE_COLUMNS} FROM messages
                 WHERE is_private = 1
                   AND ((from_user_id = ?1 AND to_user_id = ?2)
                     OR (from_user_id = ?2 AND to_user_id = ?1))
                 ORDER BY julianday(timestamp) ASC, id ASC"
            );
            query_messages(conn, &sql, params![user, peer])
        })
        .await
    }
}

/// Intermediate row; the timestamp is parsed outside the rusqlite closure
/// so a bad value surfaces as a [`StoreError`].
struct RawMessage {
    id: i64,
    from_user_id: String,
    from_user_name: String,
    to_user_id: Option<String>,
    room: Option<String>,
    content: String,
    is_private: bool,
    timestamp: String,
}

fn query_messages(
    conn: &Connection,
    sql: &str,
    params: impl rusqlite::Params,
) -> Result<Vec<StoredMessage>, StoreError> {
    let mut stmt = conn.prepare(sql)?;
    let raw = stmt
        .query_map(params, |row| {
            Ok(RawMessage {
                id: row.get(0)?,
                from_user_id: row.get(1)?,
                from_user_name: row.get(2)?,
                to_user_id: row.get(3)?,
                room: row.get(4)?,
                content: row.get(5)?,
                is_private: row.get(6)?,
                timestamp: row.get(7)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    raw.into_iter()
        .map(|r| {
            Ok(StoredMessage {
                id: r.id,
                from_user_id: UserId(r.from_user_id),
                from_user_name: r.from_user_name,
                to_user_id: r.to_user_id.map(UserId),
                room: r.room,
                content: r.content,
                is_private: r.is_private,
                timestamp: parse_timestamp(&r.timestamp)?,
            })
        })
        .collect()
}

/// Millisecond RFC 3339 in UTC. Fixed width, so text order is time order.
fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Accepts what we write plus SQLite's own `CURRENT_TIMESTAMP` format.
fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, StoreError> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(s) {
        return Ok(ts.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(s, SQLITE_DATETIME)
        .map(|naive| naive.and_utc())
        .map_err(|_| StoreError::InvalidTimestamp(s.to_owned()))
}

fn conn_id_to_sql(id: ConnectionId) -> i64 {
    id.into_inner() as i64
}

fn conn_id_from_sql(raw: i64) -> ConnectionId {
    ConnectionId::new(raw as u64)
}
