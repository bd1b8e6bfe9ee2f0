use std::any::TypeId;
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::{LazyLock, Mutex, MutexGuard};

use tracing::debug;

use crate::driver::Driver;
use crate::error::DriverError;

type LibraryRefs = LazyLock<Mutex<HashMap<TypeId, usize>>>;

static LIBRARY_REFS: LibraryRefs = LazyLock::new(|| Mutex::new(HashMap::new()));

fn refs() -> MutexGuard<'static, HashMap<TypeId, usize>> {
    match LIBRARY_REFS.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Reference to the process-wide library state of driver `D`.
///
/// The first guard for a driver type runs [`Driver::library_init`]; dropping
/// the last one runs [`Driver::library_end`].
pub struct LibraryGuard<D: Driver> {
    _driver: PhantomData<fn() -> D>,
}

impl<D: Driver> LibraryGuard<D> {
    /// # Errors
    /// Propagates the driver's initialization failure; no reference is taken then.
    pub fn acquire() -> Result<Self, DriverError> {
        let mut refs = refs();
        let count = refs.entry(TypeId::of::<D>()).or_insert(0);
        if *count == 0 {
            debug!(driver = std::any::type_name::<D>(), "initializing driver library");
            D::library_init()?;
        }
        *count += 1;
        Ok(Self {
            _driver: PhantomData,
        })
    }

    /// Number of live guards for driver `D`.
    #[must_use]
    pub fn ref_count() -> usize {
        refs().get(&TypeId::of::<D>()).copied().unwrap_or(0)
    }
}

impl<D: Driver> Drop for LibraryGuard<D> {
    fn drop(&mut self) {
        let mut refs = refs();
        let key = TypeId::of::<D>();
        let remaining = match refs.get_mut(&key) {
            Some(count) => {
                *count = count.saturating_sub(1);
                *count
            }
            None => return,
        };
        if remaining == 0 {
            refs.remove(&key);
            debug!(driver = std::any::type_name::<D>(), "tearing down driver library");
            D::library_end();
        }
    }
}

impl<D: Driver> fmt::Debug for LibraryGuard<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LibraryGuard")
            .field("driver", &std::any::type_name::<D>())
            .finish()
    }
}
