use std::collections::VecDeque;
use std::fmt;
use std::time::Duration;

use rusqlite::fallible_iterator::FallibleIterator;
use rusqlite::{Batch, Connection, Statement};
use tracing::{debug, warn};

use crate::driver::{Driver, OptionError};
use crate::endpoint::EndpointAddr;
use crate::error::DriverError;
use crate::types::{AuthInfo, ClientFlags, ConnectOption};

use super::error::{
    EMPTY_QUERY, MULTI_STATEMENTS_DISABLED, UNSUPPORTED_ENDPOINT, not_connected,
};
use super::result::SqliteResult;

/// What one executed statement left behind.
enum Outcome {
    Rows(SqliteResult),
    Changed(u64),
    /// A later statement of a multi-statement text failed; reported by `next_result`.
    Failed(DriverError),
}

/// Native SQLite handle.
///
/// Statements run eagerly in `query`; their results are buffered and handed
/// out one at a time through `store_result` and `next_result`.
#[derive(Default)]
pub struct SqliteDriver {
    conn: Option<Connection>,
    busy_timeout: Option<Duration>,
    init_commands: Vec<String>,
    multi_statements: bool,
    manual_commit: bool,
    current: Option<Outcome>,
    pending: VecDeque<Outcome>,
    affected_rows: u64,
    last_error: String,
}

impl SqliteDriver {
    /// The underlying rusqlite connection, once connected.
    #[must_use]
    pub fn connection(&self) -> Option<&Connection> {
        self.conn.as_ref()
    }

    fn conn(&self) -> Result<&Connection, DriverError> {
        self.conn.as_ref().ok_or_else(not_connected)
    }

    /// Remember the failure text for `error_message`.
    fn track<T>(&mut self, outcome: Result<T, DriverError>) -> Result<T, DriverError> {
        match &outcome {
            Ok(_) => self.last_error.clear(),
            Err(err) => self.last_error.clone_from(&err.message),
        }
        outcome
    }

    fn execute_control(&mut self, sql: &str) -> Result<(), DriverError> {
        let outcome = self
            .conn()
            .and_then(|conn| conn.execute_batch(sql).map_err(DriverError::from));
        self.track(outcome)
    }

    fn apply_busy_timeout(&self) -> Result<(), DriverError> {
        if let (Some(conn), Some(timeout)) = (self.conn.as_ref(), self.busy_timeout) {
            conn.busy_timeout(timeout)?;
        }
        Ok(())
    }

    fn in_transaction(&self) -> bool {
        self.conn.as_ref().is_some_and(|conn| !conn.is_autocommit())
    }

    fn advance(&mut self, next: Option<Outcome>) {
        self.affected_rows = match &next {
            Some(Outcome::Rows(result)) => result.remaining() as u64,
            Some(Outcome::Changed(changes)) => *changes,
            Some(Outcome::Failed(_)) | None => 0,
        };
        self.current = next;
    }
}

fn run_statements(
    conn: &Connection,
    sql: &str,
    multi_statements: bool,
) -> Result<VecDeque<Outcome>, DriverError> {
    let mut batch = Batch::new(conn, sql);
    let mut outcomes = VecDeque::new();

    let Some(mut first) = batch.next()? else {
        return Err(DriverError::new(EMPTY_QUERY, "Query was empty"));
    };
    if !multi_statements {
        if !matches!(batch.next(), Ok(None)) {
            return Err(DriverError::new(
                MULTI_STATEMENTS_DISABLED,
                "multiple statements require ClientFlags::MULTI_STATEMENTS",
            ));
        }
        outcomes.push_back(run_one(conn, &mut first)?);
        return Ok(outcomes);
    }

    outcomes.push_back(run_one(conn, &mut first)?);
    drop(first);
    loop {
        let step = batch
            .next()
            .map_err(DriverError::from)
            .and_then(|stmt| stmt.map(|mut stmt| run_one(conn, &mut stmt)).transpose());
        match step {
            Ok(Some(outcome)) => outcomes.push_back(outcome),
            Ok(None) => break,
            Err(err) => {
                outcomes.push_back(Outcome::Failed(err));
                break;
            }
        }
    }
    Ok(outcomes)
}

/// `sqlite3_changes` keeps the last DML count across DDL and transaction
/// statements, so the count is taken from the `total_changes` delta instead.
fn run_one(conn: &Connection, stmt: &mut Statement<'_>) -> Result<Outcome, DriverError> {
    if stmt.column_count() > 0 {
        SqliteResult::collect(stmt).map(Outcome::Rows)
    } else {
        let before = conn.total_changes();
        stmt.execute([])?;
        let changed = conn.total_changes().saturating_sub(before);
        Ok(Outcome::Changed(changed as u64))
    }
}

impl Driver for SqliteDriver {
    type Result = SqliteResult;
    type Context = ();

    fn init(_context: &()) -> Result<Self, DriverError> {
        Ok(Self::default())
    }

    fn set_option(&mut self, option: &ConnectOption) -> Result<(), OptionError> {
        match option {
            ConnectOption::ConnectTimeout(timeout)
            | ConnectOption::ReadTimeout(timeout)
            | ConnectOption::WriteTimeout(timeout) => {
                self.busy_timeout = Some(*timeout);
                self.apply_busy_timeout().map_err(OptionError::Driver)
            }
            ConnectOption::InitCommand(sql) => {
                if self.conn.is_some() {
                    self.execute_control(sql).map_err(OptionError::Driver)?;
                }
                self.init_commands.push(sql.clone());
                Ok(())
            }
            ConnectOption::Nonblock(_) | ConnectOption::Reconnect(_) => {
                Err(OptionError::Unsupported(option.name()))
            }
        }
    }

    fn connect(
        &mut self,
        addr: &EndpointAddr,
        _auth: &AuthInfo,
        database: &str,
        flags: ClientFlags,
    ) -> Result<(), DriverError> {
        let opened = match addr {
            EndpointAddr::File(path) => Connection::open(path).map_err(DriverError::from),
            EndpointAddr::Memory => Connection::open_in_memory().map_err(DriverError::from),
            EndpointAddr::Tcp(_) | EndpointAddr::Unix(_) => Err(DriverError::new(
                UNSUPPORTED_ENDPOINT,
                format!("SQLite cannot connect to {addr:?}"),
            )),
        };
        let conn = self.track(opened)?;
        self.conn = Some(conn);
        self.multi_statements = flags.contains(ClientFlags::MULTI_STATEMENTS);

        let setup = self.apply_busy_timeout();
        self.track(setup)?;
        for sql in self.init_commands.clone() {
            self.execute_control(&sql)?;
        }
        debug!(?addr, database, "sqlite handle connected");
        Ok(())
    }

    fn query(&mut self, statement: &str) -> Result<(), DriverError> {
        self.current = None;
        self.pending.clear();
        let ran = self
            .conn()
            .and_then(|conn| run_statements(conn, statement, self.multi_statements));
        let mut outcomes = self.track(ran)?;
        let first = outcomes.pop_front();
        self.pending = outcomes;
        self.advance(first);
        Ok(())
    }

    fn field_count(&self) -> u32 {
        match &self.current {
            Some(Outcome::Rows(result)) => u32::try_from(result.column_count()).unwrap_or(u32::MAX),
            _ => 0,
        }
    }

    fn store_result(&mut self) -> Result<Option<SqliteResult>, DriverError> {
        match self.current.take() {
            Some(Outcome::Rows(result)) => Ok(Some(result)),
            Some(Outcome::Failed(err)) => self.track(Err(err)),
            Some(Outcome::Changed(_)) | None => Ok(None),
        }
    }

    fn more_results(&self) -> bool {
        !self.pending.is_empty()
    }

    fn next_result(&mut self) -> Result<(), DriverError> {
        match self.pending.pop_front() {
            Some(Outcome::Failed(err)) => {
                self.pending.clear();
                self.advance(None);
                self.track(Err(err))
            }
            next => {
                self.advance(next);
                Ok(())
            }
        }
    }

    fn affected_rows(&self) -> u64 {
        self.affected_rows
    }

    fn autocommit(&mut self, mode: bool) -> Result<(), DriverError> {
        self.manual_commit = !mode;
        match (mode, self.in_transaction()) {
            (false, false) => self.execute_control("BEGIN"),
            (true, true) => self.execute_control("COMMIT"),
            _ => Ok(()),
        }
    }

    fn commit(&mut self) -> Result<(), DriverError> {
        if self.in_transaction() {
            self.execute_control("COMMIT")?;
        }
        if self.manual_commit {
            self.execute_control("BEGIN")?;
        }
        Ok(())
    }

    fn rollback(&mut self) -> Result<(), DriverError> {
        if self.in_transaction() {
            self.execute_control("ROLLBACK")?;
        }
        if self.manual_commit {
            self.execute_control("BEGIN")?;
        }
        Ok(())
    }

    fn error_message(&self) -> String {
        self.last_error.clone()
    }

    fn close(&mut self) {
        self.current = None;
        self.pending.clear();
        if let Some(conn) = self.conn.take() {
            if let Err((_, err)) = conn.close() {
                warn!(error = %err, "sqlite handle did not close cleanly");
            }
        }
    }
}

impl fmt::Debug for SqliteDriver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqliteDriver")
            .field("connected", &self.conn.is_some())
            .field("multi_statements", &self.multi_statements)
            .field("pending_results", &self.pending.len())
            .finish_non_exhaustive()
    }
}
