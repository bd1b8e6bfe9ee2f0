use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, ThreadId};
use std::time::{Duration, Instant};

use crate::driver::{Driver, DriverResult, OptionError, RawRow};
use crate::endpoint::EndpointAddr;
use crate::error::DriverError;
use crate::results::FieldInfo;
use crate::types::{AuthInfo, ClientFlags, ConnectOption};

use super::test_helpers::{raw_row, text_fields};

/// Code reported when a scripted fetch fails part-way.
pub const LOST_DURING_FETCH: i32 = 2013;
/// Code reported for calls on a handle that never connected.
pub const NOT_CONNECTED: i32 = 2006;

static LIBRARY_INITS: AtomicUsize = AtomicUsize::new(0);
static LIBRARY_ENDS: AtomicUsize = AtomicUsize::new(0);

/// Scripted outcome of one statement (or one result of a multi-result statement).
#[derive(Debug, Clone)]
pub enum Response {
    Rows {
        fields: Vec<FieldInfo>,
        rows: Vec<RawRow>,
        /// Fetching this row index fails with [`LOST_DURING_FETCH`].
        fail_at_row: Option<usize>,
    },
    Affected(u64),
    Error(DriverError),
}

impl Response {
    /// Text columns with the given rows; `None` cells are NULL.
    #[must_use]
    pub fn table(columns: &[&str], rows: &[&[Option<&str>]]) -> Self {
        Response::Rows {
            fields: text_fields(columns),
            rows: rows.iter().map(|row| raw_row(row)).collect(),
            fail_at_row: None,
        }
    }

    #[must_use]
    pub fn error(code: i32, message: &str) -> Self {
        Response::Error(DriverError::new(code, message))
    }

    /// Make fetching row `index` fail.
    #[must_use]
    pub fn failing_at(self, index: usize) -> Self {
        match self {
            Response::Rows { fields, rows, .. } => Response::Rows {
                fields,
                rows,
                fail_at_row: Some(index),
            },
            other => other,
        }
    }
}

/// One driver call as seen by the scripted driver.
#[derive(Debug, Clone)]
pub struct Execution {
    pub statement: String,
    pub thread: ThreadId,
    pub started: Instant,
    pub finished: Instant,
}

impl Execution {
    /// Whether the two calls ran at the same time.
    #[must_use]
    pub fn overlaps(&self, other: &Execution) -> bool {
        self.started < other.finished && other.started < self.finished
    }
}

#[derive(Debug, Default)]
struct ScriptState {
    responses: HashMap<String, Vec<Response>>,
    init_error: Option<DriverError>,
    connect_error: Option<DriverError>,
    delay: Duration,
    executions: Vec<Execution>,
    closed_handles: usize,
}

/// Shared script and observation log; the context every [`ScriptedDriver`] is created from.
///
/// Clones share state, so a test keeps one clone to configure responses and
/// inspect what the driver did.
#[derive(Debug, Clone, Default)]
pub struct Script {
    state: Arc<Mutex<ScriptState>>,
}

impl Script {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, ScriptState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Respond to `statement` with a single result. Unscripted statements affect zero rows.
    pub fn on(&self, statement: &str, response: Response) -> &Self {
        self.on_multi(statement, vec![response])
    }

    /// Respond to `statement` with several results, as a multi-statement text would.
    pub fn on_multi(&self, statement: &str, responses: Vec<Response>) -> &Self {
        self.state().responses.insert(statement.to_owned(), responses);
        self
    }

    pub fn fail_init(&self, code: i32, message: &str) -> &Self {
        self.state().init_error = Some(DriverError::new(code, message));
        self
    }

    pub fn fail_connect(&self, code: i32, message: &str) -> &Self {
        self.state().connect_error = Some(DriverError::new(code, message));
        self
    }

    /// Time every `connect` and `query` call blocks for.
    pub fn set_delay(&self, delay: Duration) -> &Self {
        self.state().delay = delay;
        self
    }

    #[must_use]
    pub fn executions(&self) -> Vec<Execution> {
        self.state().executions.clone()
    }

    /// Statements in the order the driver received them.
    #[must_use]
    pub fn statements(&self) -> Vec<String> {
        self.state()
            .executions
            .iter()
            .map(|execution| execution.statement.clone())
            .collect()
    }

    /// Native handles released through [`Driver::close`].
    #[must_use]
    pub fn closed_handles(&self) -> usize {
        self.state().closed_handles
    }

    /// Block for the configured delay and log the call's execution window.
    fn perform(&self, statement: &str) {
        let delay = self.state().delay;
        let started = Instant::now();
        if !delay.is_zero() {
            thread::sleep(delay);
        }
        let execution = Execution {
            statement: statement.to_owned(),
            thread: thread::current().id(),
            started,
            finished: Instant::now(),
        };
        self.state().executions.push(execution);
    }

    fn responses_for(&self, statement: &str) -> Vec<Response> {
        self.state()
            .responses
            .get(statement)
            .cloned()
            .unwrap_or_else(|| vec![Response::Affected(0)])
    }
}

/// A [`Driver`] whose behavior is entirely set by a [`Script`].
#[derive(Debug)]
pub struct ScriptedDriver {
    script: Script,
    connected: bool,
    current: Option<Response>,
    pending: VecDeque<Response>,
    affected_rows: u64,
    last_error: String,
    options: Vec<ConnectOption>,
    flags: ClientFlags,
}

impl ScriptedDriver {
    /// Number of `library_init` calls in this process.
    #[must_use]
    pub fn library_inits() -> usize {
        LIBRARY_INITS.load(Ordering::SeqCst)
    }

    /// Number of `library_end` calls in this process.
    #[must_use]
    pub fn library_ends() -> usize {
        LIBRARY_ENDS.load(Ordering::SeqCst)
    }

    /// Flags passed to the most recent `connect`.
    #[must_use]
    pub fn last_flags(&self) -> ClientFlags {
        self.flags
    }

    /// Options accepted through `set_option`, in order.
    #[must_use]
    pub fn options(&self) -> &[ConnectOption] {
        &self.options
    }

    fn fail<T>(&mut self, err: DriverError) -> Result<T, DriverError> {
        self.last_error.clone_from(&err.message);
        Err(err)
    }

    fn advance(&mut self, next: Option<Response>) {
        self.affected_rows = match &next {
            Some(Response::Rows { rows, .. }) => rows.len() as u64,
            Some(Response::Affected(n)) => *n,
            Some(Response::Error(_)) | None => 0,
        };
        self.current = next;
    }

    fn control(&mut self, statement: &str) -> Result<(), DriverError> {
        if !self.connected {
            return self.fail(DriverError::new(NOT_CONNECTED, "not connected"));
        }
        self.script.perform(statement);
        Ok(())
    }
}

impl Driver for ScriptedDriver {
    type Result = ScriptedResult;
    type Context = Script;

    fn library_init() -> Result<(), DriverError> {
        LIBRARY_INITS.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn library_end() {
        LIBRARY_ENDS.fetch_add(1, Ordering::SeqCst);
    }

    fn init(context: &Script) -> Result<Self, DriverError> {
        if let Some(err) = context.state().init_error.clone() {
            return Err(err);
        }
        Ok(Self {
            script: context.clone(),
            connected: false,
            current: None,
            pending: VecDeque::new(),
            affected_rows: 0,
            last_error: String::new(),
            options: Vec::new(),
            flags: ClientFlags::empty(),
        })
    }

    fn set_option(&mut self, option: &ConnectOption) -> Result<(), OptionError> {
        match option {
            ConnectOption::Nonblock(_) => Err(OptionError::Unsupported(option.name())),
            ConnectOption::InitCommand(sql) if sql.trim().is_empty() => Err(OptionError::Driver(
                DriverError::new(1065, "init command is empty"),
            )),
            _ => {
                self.options.push(option.clone());
                Ok(())
            }
        }
    }

    fn connect(
        &mut self,
        _addr: &EndpointAddr,
        _auth: &AuthInfo,
        database: &str,
        flags: ClientFlags,
    ) -> Result<(), DriverError> {
        self.script.perform(&format!("CONNECT {database}"));
        self.flags = flags;
        let failure = self.script.state().connect_error.clone();
        if let Some(err) = failure {
            return self.fail(err);
        }
        self.connected = true;
        Ok(())
    }

    fn query(&mut self, statement: &str) -> Result<(), DriverError> {
        if !self.connected {
            return self.fail(DriverError::new(NOT_CONNECTED, "not connected"));
        }
        self.script.perform(statement);
        self.pending.clear();
        let mut responses: VecDeque<Response> = self.script.responses_for(statement).into();
        match responses.pop_front() {
            Some(Response::Error(err)) => {
                self.advance(None);
                self.fail(err)
            }
            first => {
                self.pending = responses;
                self.advance(first);
                self.last_error.clear();
                Ok(())
            }
        }
    }

    fn field_count(&self) -> u32 {
        match &self.current {
            Some(Response::Rows { fields, .. }) => u32::try_from(fields.len()).unwrap_or(u32::MAX),
            _ => 0,
        }
    }

    fn store_result(&mut self) -> Result<Option<ScriptedResult>, DriverError> {
        match self.current.take() {
            Some(Response::Rows {
                fields,
                rows,
                fail_at_row,
            }) => Ok(Some(ScriptedResult {
                fields,
                rows: rows.into(),
                fetched: 0,
                fail_at_row,
            })),
            Some(Response::Error(err)) => self.fail(err),
            Some(Response::Affected(_)) | None => Ok(None),
        }
    }

    fn more_results(&self) -> bool {
        !self.pending.is_empty()
    }

    fn next_result(&mut self) -> Result<(), DriverError> {
        match self.pending.pop_front() {
            Some(Response::Error(err)) => {
                self.pending.clear();
                self.advance(None);
                self.fail(err)
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
        self.control(if mode { "AUTOCOMMIT=1" } else { "AUTOCOMMIT=0" })
    }

    fn commit(&mut self) -> Result<(), DriverError> {
        self.control("COMMIT")
    }

    fn rollback(&mut self) -> Result<(), DriverError> {
        self.control("ROLLBACK")
    }

    fn error_message(&self) -> String {
        self.last_error.clone()
    }

    fn close(&mut self) {
        self.connected = false;
        self.current = None;
        self.pending.clear();
        self.script.state().closed_handles += 1;
    }
}

/// Native result produced by [`ScriptedDriver::store_result`](Driver::store_result).
#[derive(Debug)]
pub struct ScriptedResult {
    fields: Vec<FieldInfo>,
    rows: VecDeque<RawRow>,
    fetched: usize,
    fail_at_row: Option<usize>,
}

impl DriverResult for ScriptedResult {
    fn num_rows(&self) -> u64 {
        (self.fetched + self.rows.len()) as u64
    }

    fn fields(&mut self) -> Vec<FieldInfo> {
        self.fields.clone()
    }

    fn fetch_row(&mut self) -> Result<Option<RawRow>, DriverError> {
        if self.fail_at_row == Some(self.fetched) {
            return Err(DriverError::new(
                LOST_DURING_FETCH,
                "Lost connection to server during query",
            ));
        }
        let row = self.rows.pop_front();
        if row.is_some() {
            self.fetched += 1;
        }
        Ok(row)
    }
}
