use crate::cancel::GenerationWatch;
use crate::driver::Driver;
use crate::endpoint::Endpoint;
use crate::error::SqlOffloadError;
use crate::handler::{CompletionHandler, PendingOperation};
use crate::results::ResultSet;
use crate::types::{AuthInfo, ClientFlags};

use super::{Connection, ConnectionState};

impl<D: Driver> Connection<D> {
    fn submit<T, F>(&self, op: &'static str, work: F) -> PendingOperation<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut ConnectionState<D>, &GenerationWatch) -> Result<T, SqlOffloadError>
            + Send
            + 'static,
    {
        PendingOperation::submit(&self.shared, &self.service, op, work)
    }

    /// Connect on the worker. The endpoint, credentials and database name are copied.
    pub fn connect_async<E: Endpoint>(
        &self,
        endpoint: &E,
        auth: &AuthInfo,
        database: &str,
        flags: ClientFlags,
    ) -> PendingOperation<()> {
        let endpoint = endpoint.clone();
        let auth = auth.clone();
        let database = database.to_owned();
        self.submit("connect", move |state, _| {
            state.connect(&endpoint, &auth, &database, flags)
        })
    }

    pub fn async_connect<E: Endpoint, H: CompletionHandler<()>>(
        &self,
        endpoint: &E,
        auth: &AuthInfo,
        database: &str,
        flags: ClientFlags,
        handler: H,
    ) {
        self.connect_async(endpoint, auth, database, flags)
            .deliver_to(handler);
    }

    pub fn query_async(&self, statement: impl Into<String>) -> PendingOperation<()> {
        let statement = statement.into();
        self.submit("query", move |state, _| state.query(&statement))
    }

    pub fn async_query<H: CompletionHandler<()>>(&self, statement: impl Into<String>, handler: H) {
        self.query_async(statement).deliver_to(handler);
    }

    /// Run `statements` in order during one worker turn, storing each one's
    /// result. The first failure stops the batch and is reported as
    /// [`SqlOffloadError::BatchError`] carrying the failed statement's index.
    pub fn queries_async<I, S>(&self, statements: I) -> PendingOperation<Vec<ResultSet>>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let statements: Vec<String> = statements.into_iter().map(Into::into).collect();
        self.submit("queries", move |state, watch| state.queries(&statements, watch))
    }

    pub fn async_queries<I, S, H>(&self, statements: I, handler: H)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
        H: CompletionHandler<Vec<ResultSet>>,
    {
        self.queries_async(statements).deliver_to(handler);
    }

    pub fn store_result_async(&self) -> PendingOperation<ResultSet> {
        self.submit("store_result", |state, watch| state.store_result(watch))
    }

    pub fn async_store_result<H: CompletionHandler<ResultSet>>(&self, handler: H) {
        self.store_result_async().deliver_to(handler);
    }

    /// Query and store in a single worker turn.
    pub fn query_result_async(&self, statement: impl Into<String>) -> PendingOperation<ResultSet> {
        let statement = statement.into();
        self.submit("query_result", move |state, watch| {
            state.query_result(&statement, watch)
        })
    }

    pub fn async_query_result<H: CompletionHandler<ResultSet>>(
        &self,
        statement: impl Into<String>,
        handler: H,
    ) {
        self.query_result_async(statement).deliver_to(handler);
    }

    /// Run `func` against the native handle on the worker thread.
    pub fn run_native_async<R, F>(&self, func: F) -> PendingOperation<R>
    where
        R: Send + 'static,
        F: FnOnce(&mut D) -> R + Send + 'static,
    {
        self.submit("run_native", move |state, _| {
            state.driver_mut("run_native").map(func)
        })
    }
}
