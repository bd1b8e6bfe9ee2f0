use std::sync::{Arc, Weak};

use tracing::debug;

use crate::cancel::GenerationWatch;
use crate::driver::{Driver, DriverResult, OptionError};
use crate::endpoint::Endpoint;
use crate::error::SqlOffloadError;
use crate::native::NativeHandle;
use crate::results::{ResultAnchor, ResultSet};
use crate::types::{AuthInfo, ClientFlags, ConnectOption, ConnectionPhase};

use super::status::Status;

use ConnectionPhase::{Closed, Connected, Open, Querying, ResultAvailable};

const LIVE: &[ConnectionPhase] = &[Connected, ResultAvailable];

/// Mutable per-connection record. Only reachable through the connection's
/// state lock, so the native handle is never used by two threads at once.
pub(crate) struct ConnectionState<D: Driver> {
    status: Arc<Status>,
    context: D::Context,
    handle: Option<NativeHandle<D>>,
    flags: ClientFlags,
    initialized: bool,
    result_pending: bool,
    first_result_stored: bool,
    current_result: Option<NativeHandle<D::Result>>,
}

fn driver_of<'a, D: Driver>(
    handle: &'a mut Option<NativeHandle<D>>,
    op: &str,
) -> Result<&'a mut D, SqlOffloadError> {
    handle
        .as_mut()
        .and_then(NativeHandle::get_mut)
        .ok_or_else(|| SqlOffloadError::usage(format!("{op}: connection is not open")))
}

impl<D: Driver> ConnectionState<D> {
    pub(crate) fn new(status: Arc<Status>, context: D::Context, flags: ClientFlags) -> Self {
        Self {
            status,
            context,
            handle: None,
            flags,
            initialized: false,
            result_pending: false,
            first_result_stored: false,
            current_result: None,
        }
    }

    fn require(&self, op: &str, allowed: &[ConnectionPhase]) -> Result<(), SqlOffloadError> {
        let phase = self.status.phase();
        if allowed.contains(&phase) {
            Ok(())
        } else {
            Err(SqlOffloadError::usage(format!(
                "{op} is not allowed while the connection is {phase:?}"
            )))
        }
    }

    pub(crate) fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub(crate) fn driver_mut(&mut self, op: &str) -> Result<&mut D, SqlOffloadError> {
        driver_of(&mut self.handle, op)
    }

    pub(crate) fn current_result_mut(&mut self) -> Option<&mut D::Result> {
        self.current_result.as_mut().and_then(NativeHandle::get_mut)
    }

    pub(crate) fn open(&mut self) -> Result<(), SqlOffloadError> {
        if self.initialized {
            return Err(SqlOffloadError::usage("open: connection is already open"));
        }
        let driver = D::init(&self.context).map_err(SqlOffloadError::ConnectionError)?;
        self.handle = Some(NativeHandle::new(driver, D::close));
        self.initialized = true;
        self.result_pending = false;
        self.first_result_stored = false;
        self.status.record_affected_rows(0);
        self.status.set_phase(Open);
        Ok(())
    }

    pub(crate) fn set_option(&mut self, option: &ConnectOption) -> Result<(), SqlOffloadError> {
        self.require("set_option", &[Open, Connected, ResultAvailable])?;
        self.driver_mut("set_option")?
            .set_option(option)
            .map_err(|err| match err {
                OptionError::Unsupported(name) => SqlOffloadError::ConfigError(format!(
                    "option '{name}' is not supported by this driver"
                )),
                OptionError::Driver(err) => SqlOffloadError::ConfigError(format!(
                    "option '{}' rejected: {err}",
                    option.name()
                )),
            })
    }

    pub(crate) fn connect<E: Endpoint>(
        &mut self,
        endpoint: &E,
        auth: &AuthInfo,
        database: &str,
        flags: ClientFlags,
    ) -> Result<(), SqlOffloadError> {
        self.require("connect", &[Open])?;
        let addr = endpoint
            .resolve()
            .map_err(SqlOffloadError::ConnectionError)?;
        let effective = self.flags | flags;
        self.driver_mut("connect")?
            .connect(&addr, auth, database, effective)
            .map_err(SqlOffloadError::ConnectionError)?;
        self.status.transition(&[Open], Connected);
        debug!(?addr, database, flags = effective.bits(), "connected");
        Ok(())
    }

    pub(crate) fn query(&mut self, statement: &str) -> Result<(), SqlOffloadError> {
        self.require("query", LIVE)?;
        if !self.status.transition(LIVE, Querying) {
            return Err(SqlOffloadError::usage("query: connection closed concurrently"));
        }
        let driver = driver_of(&mut self.handle, "query")?;
        if let Err(err) = driver.query(statement) {
            self.status.transition(&[Querying], Connected);
            return Err(SqlOffloadError::ProtocolError(err));
        }

        self.first_result_stored = false;
        self.result_pending = driver.field_count() > 0;
        if !self.result_pending {
            self.status.record_affected_rows(driver.affected_rows());
        }
        let next = if self.result_pending || driver.more_results() {
            ResultAvailable
        } else {
            Connected
        };
        self.status.transition(&[Querying], next);
        Ok(())
    }

    pub(crate) fn has_more_results(&self) -> bool {
        self.handle
            .as_ref()
            .and_then(NativeHandle::get)
            .is_some_and(|driver| driver.more_results())
    }

    /// Store the pending result under a fresh result epoch.
    pub(crate) fn store_result(&mut self, watch: &GenerationWatch) -> Result<ResultSet, SqlOffloadError> {
        self.require("store_result", LIVE)?;
        let owner = self.status.install_anchor(watch);
        self.store_into(owner)
    }

    fn store_into(&mut self, owner: Weak<ResultAnchor>) -> Result<ResultSet, SqlOffloadError> {
        let driver = driver_of(&mut self.handle, "store_result")?;
        if self.first_result_stored {
            if !driver.more_results() {
                self.status.transition(&[ResultAvailable], Connected);
                return Ok(ResultSet::without_rows(driver.affected_rows(), owner));
            }
            if let Err(err) = driver.next_result() {
                self.status.transition(&[ResultAvailable], Connected);
                return Err(SqlOffloadError::ProtocolError(err));
            }
        }

        self.first_result_stored = true;
        self.result_pending = false;
        self.current_result = None;

        let outcome = match driver.store_result() {
            Err(err) => Err(SqlOffloadError::ProtocolError(err)),
            Ok(None) => {
                let affected = driver.affected_rows();
                self.status.record_affected_rows(affected);
                Ok(ResultSet::without_rows(affected, owner))
            }
            Ok(Some(mut native)) => match ResultSet::materialize(&mut native, owner) {
                Ok(mut result_set) => {
                    let affected = driver.affected_rows();
                    result_set.set_affected_rows(affected);
                    self.status.record_affected_rows(affected);
                    self.current_result = Some(NativeHandle::new(
                        native,
                        <D::Result as DriverResult>::free,
                    ));
                    Ok(result_set)
                }
                Err(err) => {
                    NativeHandle::new(native, <D::Result as DriverResult>::free).release();
                    Err(SqlOffloadError::ProtocolError(err))
                }
            },
        };

        let next = if driver.more_results() {
            ResultAvailable
        } else {
            Connected
        };
        self.status.transition(LIVE, next);
        outcome
    }

    /// Run each statement and store its first result; extra results of a
    /// multi-statement entry are drained. All sets share one result epoch.
    pub(crate) fn queries(
        &mut self,
        statements: &[String],
        watch: &GenerationWatch,
    ) -> Result<Vec<ResultSet>, SqlOffloadError> {
        let mut owner: Option<Weak<ResultAnchor>> = None;
        let mut outcomes = Vec::with_capacity(statements.len());
        for (index, statement) in statements.iter().enumerate() {
            let batch_error = |source| SqlOffloadError::BatchError {
                index,
                source: Box::new(source),
            };
            self.query(statement).map_err(batch_error)?;
            let owner = owner
                .get_or_insert_with(|| self.status.install_anchor(watch))
                .clone();
            let result_set = self.store_into(owner.clone()).map_err(batch_error)?;
            while self.has_more_results() {
                self.store_into(owner.clone()).map_err(batch_error)?;
            }
            outcomes.push(result_set);
        }
        Ok(outcomes)
    }

    pub(crate) fn query_result(
        &mut self,
        statement: &str,
        watch: &GenerationWatch,
    ) -> Result<ResultSet, SqlOffloadError> {
        self.query(statement)?;
        self.store_result(watch)
    }

    pub(crate) fn autocommit(&mut self, mode: bool) -> Result<(), SqlOffloadError> {
        self.require("autocommit", LIVE)?;
        self.driver_mut("autocommit")?
            .autocommit(mode)
            .map_err(SqlOffloadError::ProtocolError)
    }

    pub(crate) fn commit(&mut self) -> Result<(), SqlOffloadError> {
        self.require("commit", LIVE)?;
        self.driver_mut("commit")?
            .commit()
            .map_err(SqlOffloadError::ProtocolError)
    }

    pub(crate) fn rollback(&mut self) -> Result<(), SqlOffloadError> {
        self.require("rollback", LIVE)?;
        self.driver_mut("rollback")?
            .rollback()
            .map_err(SqlOffloadError::ProtocolError)
    }

    pub(crate) fn error_message(&self) -> String {
        self.handle
            .as_ref()
            .and_then(NativeHandle::get)
            .map(|driver| driver.error_message())
            .unwrap_or_default()
    }

    /// Free the stored result and the connection handle.
    pub(crate) fn release_native(&mut self) {
        self.current_result = None;
        if let Some(mut handle) = self.handle.take() {
            handle.release();
            debug!("native connection released");
        }
        self.initialized = false;
        self.result_pending = false;
        self.first_result_stored = false;
        self.status.transition(&[Open, Connected, Querying, ResultAvailable], Closed);
    }
}
