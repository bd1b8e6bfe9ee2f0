use std::fmt;

/// Owns a raw driver resource and runs its release function exactly once,
/// either through [`NativeHandle::release`] or on drop.
pub struct NativeHandle<T> {
    resource: Option<T>,
    release: fn(&mut T),
}

impl<T> NativeHandle<T> {
    pub fn new(resource: T, release: fn(&mut T)) -> Self {
        Self {
            resource: Some(resource),
            release,
        }
    }

    #[must_use]
    pub fn get(&self) -> Option<&T> {
        self.resource.as_ref()
    }

    pub fn get_mut(&mut self) -> Option<&mut T> {
        self.resource.as_mut()
    }

    #[must_use]
    pub fn is_released(&self) -> bool {
        self.resource.is_none()
    }

    /// Release the resource now. Later calls and the eventual drop are no-ops.
    pub fn release(&mut self) {
        if let Some(mut resource) = self.resource.take() {
            (self.release)(&mut resource);
        }
    }
}

impl<T> Drop for NativeHandle<T> {
    fn drop(&mut self) {
        self.release();
    }
}

impl<T> fmt::Debug for NativeHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeHandle")
            .field("released", &self.is_released())
            .finish()
    }
}
