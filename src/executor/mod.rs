//! The single worker thread every blocking driver call of a service runs on.

mod channel;
mod dispatcher;
mod manager;

pub(crate) use manager::Executor;
