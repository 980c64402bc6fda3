//! SQLite backend.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};

use super::models::{Role, TicketRecord, UserRecord, UserUpdate};
use super::{IdentityStore, TicketStore};
use crate::error::StoreError;
use crate::lookup::LookupDigest;
use crate::scope::{Backend, Session};

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const USER_COLUMNS: &str =
    "uuid, lastname, firstname, age, email, email_hash, password, role, tariff";

const TICKET_COLUMNS: &str = "uuid, showing, user_id, tariff, price_cents";

/// SQLite database holding the `users` and `tickets` tables.
///
/// Sessions lease the single connection exclusively, so concurrent scopes
/// are serialized.
#[derive(Debug)]
pub struct SqliteBackend {
    conn: Mutex<Connection>,
}

impl SqliteBackend {
    /// Opens (or creates) a database file and applies the schema.
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be opened or the schema cannot be
    /// applied.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let conn = Connection::open(path.as_ref())?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        tracing::debug!(path = %path.as_ref().display(), "opened database");
        Self::from_connection(conn)
    }

    /// Opens a private in-memory database.
    ///
    /// # Errors
    ///
    /// Returns error if the schema cannot be applied.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, StoreError> {
        run_migrations(&conn)?;
        Ok(Self { conn: Mutex::new(conn) })
    }
}

fn run_migrations(conn: &Connection) -> Result<(), StoreError> {
    conn.execute_batch(
        "
        PRAGMA foreign_keys = ON;

        CREATE TABLE IF NOT EXISTS users (
            uuid        TEXT PRIMARY KEY,
            lastname    TEXT NOT NULL,
            firstname   TEXT NOT NULL,
            age         TEXT NOT NULL,
            email       TEXT NOT NULL,
            email_hash  TEXT NOT NULL UNIQUE,
            password    TEXT NOT NULL,
            role        TEXT NOT NULL DEFAULT 'user',
            tariff      TEXT NOT NULL DEFAULT 'standard'
        );

        CREATE TABLE IF NOT EXISTS tickets (
            uuid        TEXT PRIMARY KEY,
            showing     TEXT NOT NULL,
            user_id     TEXT NOT NULL,
            tariff      TEXT NOT NULL DEFAULT 'standard',
            price_cents INTEGER NOT NULL,
            FOREIGN KEY(user_id) REFERENCES users(uuid) ON DELETE CASCADE
        );

        CREATE INDEX IF NOT EXISTS idx_tickets_user
            ON tickets(user_id);
        ",
    )?;

    tracing::debug!("database migrations completed");
    Ok(())
}

impl Backend for SqliteBackend {
    type Session<'a> = SqliteSession<'a>;

    fn acquire(&self) -> Result<SqliteSession<'_>, StoreError> {
        let conn = match self.conn.lock() {
            Ok(conn) => conn,
            Err(poisoned) => {
                // A holder panicked mid-transaction; discard whatever it left open.
                let conn = poisoned.into_inner();
                if !conn.is_autocommit() {
                    conn.execute_batch("ROLLBACK").map_err(|_| StoreError::Poisoned)?;
                }
                tracing::warn!("recovered poisoned database connection");
                conn
            }
        };
        Ok(SqliteSession { conn })
    }
}

/// Exclusive lease on the backend's connection.
pub struct SqliteSession<'a> {
    conn: MutexGuard<'a, Connection>,
}

impl std::fmt::Debug for SqliteSession<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteSession").field("autocommit", &self.conn.is_autocommit()).finish()
    }
}

impl Session for SqliteSession<'_> {
    fn begin(&mut self) -> Result<(), StoreError> {
        // Write lock up front; read-then-write units must not hit SQLITE_BUSY midway.
        self.conn.execute_batch("BEGIN IMMEDIATE")?;
        Ok(())
    }

    fn commit(&mut self) -> Result<(), StoreError> {
        self.conn.execute_batch("COMMIT")?;
        Ok(())
    }

    fn rollback(&mut self) -> Result<(), StoreError> {
        self.conn.execute_batch("ROLLBACK")?;
        Ok(())
    }
}

fn row_to_user(row: &Row<'_>) -> rusqlite::Result<UserRecord> {
    let role: String = row.get(7)?;
    let role = role.parse::<Role>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(7, rusqlite::types::Type::Text, e.into())
    })?;

    Ok(UserRecord {
        uuid: row.get(0)?,
        lastname: row.get(1)?,
        firstname: row.get(2)?,
        age: row.get(3)?,
        email: row.get(4)?,
        email_hash: row.get(5)?,
        password: row.get(6)?,
        role,
        tariff: row.get(8)?,
    })
}

fn row_to_ticket(row: &Row<'_>) -> rusqlite::Result<TicketRecord> {
    Ok(TicketRecord {
        uuid: row.get(0)?,
        showing: row.get(1)?,
        user_id: row.get(2)?,
        tariff: row.get(3)?,
        price_cents: row.get(4)?,
    })
}

impl IdentityStore for SqliteSession<'_> {
    fn get_by_key(&self, uuid: &str) -> Result<Option<UserRecord>, StoreError> {
        let user = self
            .conn
            .query_row(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE uuid = ?1"),
                params![uuid],
                row_to_user,
            )
            .optional()?;
        Ok(user)
    }

    fn find_by_digest(&self, digest: &LookupDigest) -> Result<Vec<UserRecord>, StoreError> {
        let mut stmt =
            self.conn.prepare(&format!("SELECT {USER_COLUMNS} FROM users WHERE email_hash = ?1"))?;
        let users = stmt
            .query_map(params![digest.as_str()], row_to_user)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(users)
    }

    fn list_users(&self) -> Result<Vec<UserRecord>, StoreError> {
        let mut stmt = self.conn.prepare(&format!("SELECT {USER_COLUMNS} FROM users ORDER BY rowid"))?;
        let users = stmt.query_map([], row_to_user)?.collect::<Result<Vec<_>, _>>()?;
        Ok(users)
    }

    fn insert_user(&self, user: &UserRecord) -> Result<(), StoreError> {
        self.conn
            .execute(
                &format!("INSERT INTO users ({USER_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)"),
                params![
                    user.uuid,
                    user.lastname,
                    user.firstname,
                    user.age,
                    user.email,
                    user.email_hash,
                    user.password,
                    user.role.as_str(),
                    user.tariff,
                ],
            )
            .map_err(StoreError::from_sqlite)?;
        Ok(())
    }

    fn update_user(&self, uuid: &str, update: &UserUpdate) -> Result<bool, StoreError> {
        let columns = update.columns();
        if columns.is_empty() {
            return Ok(self.get_by_key(uuid)?.is_some());
        }

        let assignments = columns
            .iter()
            .enumerate()
            .map(|(i, (name, _))| format!("{name} = ?{}", i + 1))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!("UPDATE users SET {assignments} WHERE uuid = ?{}", columns.len() + 1);

        let values = columns.into_iter().map(|(_, value)| value).chain(std::iter::once(uuid.to_string()));
        let changed = self.conn.execute(&sql, params_from_iter(values)).map_err(StoreError::from_sqlite)?;
        Ok(changed > 0)
    }

    fn delete_user(&self, uuid: &str) -> Result<bool, StoreError> {
        let changed = self.conn.execute("DELETE FROM users WHERE uuid = ?1", params![uuid])?;
        Ok(changed > 0)
    }
}

impl TicketStore for SqliteSession<'_> {
    fn list_tickets(&self, owner: &str) -> Result<Vec<TicketRecord>, StoreError> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {TICKET_COLUMNS} FROM tickets WHERE user_id = ?1 ORDER BY rowid"))?;
        let tickets = stmt.query_map(params![owner], row_to_ticket)?.collect::<Result<Vec<_>, _>>()?;
        Ok(tickets)
    }

    fn get_ticket(&self, uuid: &str, owner: &str) -> Result<Option<TicketRecord>, StoreError> {
        let ticket = self
            .conn
            .query_row(
                &format!("SELECT {TICKET_COLUMNS} FROM tickets WHERE uuid = ?1 AND user_id = ?2"),
                params![uuid, owner],
                row_to_ticket,
            )
            .optional()?;
        Ok(ticket)
    }

    fn insert_ticket(&self, ticket: &TicketRecord) -> Result<(), StoreError> {
        self.conn
            .execute(
                &format!("INSERT INTO tickets ({TICKET_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5)"),
                params![ticket.uuid, ticket.showing, ticket.user_id, ticket.tariff, ticket.price_cents],
            )
            .map_err(StoreError::from_sqlite)?;
        Ok(())
    }

    fn delete_ticket(&self, uuid: &str, owner: &str) -> Result<bool, StoreError> {
        let changed =
            self.conn.execute("DELETE FROM tickets WHERE uuid = ?1 AND user_id = ?2", params![uuid, owner])?;
        Ok(changed > 0)
    }

    fn delete_all_tickets(&self, owner: &str) -> Result<usize, StoreError> {
        let changed = self.conn.execute("DELETE FROM tickets WHERE user_id = ?1", params![owner])?;
        Ok(changed)
    }
}
