use crate::driver::Driver;
use crate::error::SqlOffloadError;
use crate::service::Service;

pub const DEFAULT_WORKER_NAME: &str = "sql-offload-worker";

/// Options for configuring a [`Service`].
#[derive(Debug, Clone)]
pub struct ServiceOptions {
    pub worker_name: String,
}

impl ServiceOptions {
    #[must_use]
    pub fn new() -> Self {
        Self {
            worker_name: DEFAULT_WORKER_NAME.to_string(),
        }
    }

    #[must_use]
    pub fn with_worker_name(mut self, worker_name: impl Into<String>) -> Self {
        self.worker_name = worker_name.into();
        self
    }

    pub(crate) fn validate(&self) -> Result<(), SqlOffloadError> {
        if self.worker_name.trim().is_empty() {
            return Err(SqlOffloadError::ConfigError(
                "worker name must not be empty".into(),
            ));
        }
        if self.worker_name.contains('\0') {
            return Err(SqlOffloadError::ConfigError(
                "worker name must not contain NUL bytes".into(),
            ));
        }
        Ok(())
    }
}

impl Default for ServiceOptions {
    fn default() -> Self {
        Self::new()
    }
}

/// Fluent builder for [`ServiceOptions`].
#[derive(Debug, Clone, Default)]
pub struct ServiceOptionsBuilder {
    opts: ServiceOptions,
}

impl ServiceOptionsBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            opts: ServiceOptions::new(),
        }
    }

    #[must_use]
    pub fn worker_name(mut self, worker_name: impl Into<String>) -> Self {
        self.opts.worker_name = worker_name.into();
        self
    }

    #[must_use]
    pub fn finish(self) -> ServiceOptions {
        self.opts
    }

    /// Build a [`Service`] for driver `D` using its default context.
    ///
    /// # Errors
    ///
    /// Returns `SqlOffloadError` if the options are invalid or the driver library fails to initialize.
    pub fn build<D>(self) -> Result<Service<D>, SqlOffloadError>
    where
        D: Driver,
        D::Context: Default,
    {
        Service::with_context(self.finish(), D::Context::default())
    }

    /// Build a [`Service`] for driver `D` with an explicit driver context.
    ///
    /// # Errors
    ///
    /// Returns `SqlOffloadError` if the options are invalid or the driver library fails to initialize.
    pub fn build_with_context<D: Driver>(
        self,
        context: D::Context,
    ) -> Result<Service<D>, SqlOffloadError> {
        Service::with_context(self.finish(), context)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_overrides_worker_name() {
        let opts = ServiceOptionsBuilder::new().worker_name("db-io").finish();
        assert_eq!(opts.worker_name, "db-io");
        assert!(opts.validate().is_ok());
    }

    #[test]
    fn blank_worker_name_is_rejected() {
        let opts = ServiceOptions::new().with_worker_name("  ");
        assert!(matches!(
            opts.validate(),
            Err(SqlOffloadError::ConfigError(_))
        ));
    }
}
