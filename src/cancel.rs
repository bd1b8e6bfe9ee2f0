//! Cancellation generations.
//!
//! A connection holds the only strong reference to its current [`Generation`].
//! Every asynchronous operation captures a [`GenerationWatch`] at submission;
//! replacing the generation drops the old marker, so every outstanding watch
//! stops resolving at once.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

static NEXT_GENERATION: AtomicU64 = AtomicU64::new(1);

#[derive(Debug)]
struct Marker {
    id: u64,
}

#[derive(Debug)]
pub struct Generation {
    marker: Arc<Marker>,
}

impl Generation {
    pub fn new() -> Self {
        Self {
            marker: Arc::new(Marker {
                id: NEXT_GENERATION.fetch_add(1, Ordering::Relaxed),
            }),
        }
    }

    #[must_use]
    pub fn id(&self) -> u64 {
        self.marker.id
    }

    #[must_use]
    pub fn watch(&self) -> GenerationWatch {
        GenerationWatch {
            marker: Arc::downgrade(&self.marker),
            id: self.marker.id,
        }
    }
}

impl Default for Generation {
    fn default() -> Self {
        Self::new()
    }
}

/// Non-owning observation of a [`Generation`].
#[derive(Debug, Clone)]
pub struct GenerationWatch {
    marker: Weak<Marker>,
    id: u64,
}

impl GenerationWatch {
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// True while `current` is still the generation this watch was taken from.
    #[must_use]
    pub fn is_current(&self, current: &Generation) -> bool {
        self.marker
            .upgrade()
            .is_some_and(|marker| Arc::ptr_eq(&marker, &current.marker))
    }
}
