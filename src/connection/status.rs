use std::sync::atomic::{AtomicBool, AtomicU8, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use crate::cancel::{Generation, GenerationWatch};
use crate::error::SqlOffloadError;
use crate::results::ResultAnchor;
use crate::types::ConnectionPhase;

struct Epoch {
    generation: Generation,
    results: Option<Arc<ResultAnchor>>,
}

/// The part of a connection's state that must be readable without waiting
/// for a driver call in progress on the worker.
pub(crate) struct Status {
    phase: AtomicU8,
    in_flight: AtomicBool,
    pending_close: AtomicBool,
    affected_rows: AtomicU64,
    epoch: Mutex<Epoch>,
}

impl Status {
    pub(crate) fn new() -> Self {
        Self {
            phase: AtomicU8::new(ConnectionPhase::Closed as u8),
            in_flight: AtomicBool::new(false),
            pending_close: AtomicBool::new(false),
            affected_rows: AtomicU64::new(0),
            epoch: Mutex::new(Epoch {
                generation: Generation::new(),
                results: None,
            }),
        }
    }

    fn epoch(&self) -> MutexGuard<'_, Epoch> {
        match self.epoch.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub(crate) fn phase(&self) -> ConnectionPhase {
        ConnectionPhase::from_u8(self.phase.load(Ordering::Acquire))
    }

    pub(crate) fn set_phase(&self, phase: ConnectionPhase) {
        self.phase.store(phase as u8, Ordering::Release);
    }

    /// Move to `to` only from one of `from`. A concurrent close wins.
    pub(crate) fn transition(&self, from: &[ConnectionPhase], to: ConnectionPhase) -> bool {
        self.phase
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |raw| {
                from.contains(&ConnectionPhase::from_u8(raw))
                    .then_some(to as u8)
            })
            .is_ok()
    }

    pub(crate) fn begin_operation(&self, op: &str) -> Result<(), SqlOffloadError> {
        self.in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| ())
            .map_err(|_| {
                SqlOffloadError::usage(format!(
                    "{op}: another asynchronous operation is still in flight on this connection"
                ))
            })
    }

    pub(crate) fn end_operation(&self) {
        self.in_flight.store(false, Ordering::Release);
    }

    pub(crate) fn is_in_flight(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    pub(crate) fn ensure_idle(&self, op: &str) -> Result<(), SqlOffloadError> {
        if self.is_in_flight() {
            Err(SqlOffloadError::usage(format!(
                "{op}: an asynchronous operation is in flight on this connection"
            )))
        } else {
            Ok(())
        }
    }

    pub(crate) fn watch(&self) -> GenerationWatch {
        self.epoch().generation.watch()
    }

    pub(crate) fn is_current(&self, watch: &GenerationWatch) -> bool {
        watch.is_current(&self.epoch().generation)
    }

    /// Mint a new generation; returns its id.
    pub(crate) fn bump_generation(&self) -> u64 {
        let mut epoch = self.epoch();
        epoch.generation = Generation::new();
        epoch.generation.id()
    }

    pub(crate) fn expire_results(&self) {
        self.epoch().results = None;
    }

    /// Start a new result epoch, expiring every earlier result set.
    ///
    /// A stale `watch` gets an anchor nobody keeps, so its results are born expired.
    pub(crate) fn install_anchor(&self, watch: &GenerationWatch) -> Weak<ResultAnchor> {
        let anchor = Arc::new(ResultAnchor);
        let owner = Arc::downgrade(&anchor);
        let mut epoch = self.epoch();
        if watch.is_current(&epoch.generation) {
            epoch.results = Some(anchor);
        } else {
            epoch.results = None;
        }
        owner
    }

    pub(crate) fn record_affected_rows(&self, affected_rows: u64) {
        self.affected_rows.store(affected_rows, Ordering::Release);
    }

    pub(crate) fn affected_rows(&self) -> u64 {
        self.affected_rows.load(Ordering::Acquire)
    }

    pub(crate) fn request_close(&self) {
        self.pending_close.store(true, Ordering::Release);
    }

    pub(crate) fn take_pending_close(&self) -> bool {
        self.pending_close.swap(false, Ordering::AcqRel)
    }
}
