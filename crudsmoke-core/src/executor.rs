use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use super::error::{Error, Result};

/// Admission gate capping how many network calls are in flight at once.
///
/// Slots are handed out in no particular order.
#[derive(Debug, Clone)]
pub struct BoundedExecutor {
    slots: Arc<Semaphore>,
}

/// A held executor slot. Dropping it releases the slot.
#[derive(Debug)]
pub struct Slot {
    _permit: OwnedSemaphorePermit,
}

impl BoundedExecutor {
    /// `capacity` must be in `1..=Semaphore::MAX_PERMITS`.
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity == 0 || capacity > Semaphore::MAX_PERMITS {
            return Err(Error::InvalidConcurrency);
        }

        Ok(Self {
            slots: Arc::new(Semaphore::new(capacity)),
        })
    }

    #[cfg(test)]
    fn available(&self) -> usize {
        self.slots.available_permits()
    }

    /// Waits until a slot is free and takes it.
    pub async fn acquire(&self) -> Result<Slot> {
        let permit = self
            .slots
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| Error::ExecutorClosed)?;
        Ok(Slot { _permit: permit })
    }
}
