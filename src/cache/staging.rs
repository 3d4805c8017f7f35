use tracing::error;

use crate::error::{CacheError, Result};

/// Side buffer holding the records of an in-progress transfer until it completes.
#[derive(Debug, Clone)]
pub struct StagingQueue<T> {
    items: Vec<T>,
    max: usize,
    what: &'static str,
}

impl<T> StagingQueue<T> {
    pub(crate) fn new(what: &'static str, max: usize) -> Self {
        StagingQueue {
            items: Vec::new(),
            max,
            what,
        }
    }

    /// Appends every item of `batch`, or none of them if the queue would overflow.
    pub(crate) fn push_all(&mut self, batch: Vec<T>) -> Result<()> {
        if self.items.len() + batch.len() > self.max {
            error!(
                queue = self.what,
                staged = self.items.len(),
                incoming = batch.len(),
                "staging queue full, dropping batch"
            );
            return Err(CacheError::CapacityExceeded {
                what: self.what,
                max: self.max,
            });
        }
        self.items.extend(batch);
        Ok(())
    }

    /// Appends as much of `batch` as fits and drops the rest, returning how many items were
    /// dropped.
    pub(crate) fn push_capped(&mut self, batch: Vec<T>) -> usize {
        let room = self.max.saturating_sub(self.items.len());
        let dropped = batch.len().saturating_sub(room);
        if dropped > 0 {
            error!(
                queue = self.what,
                staged = self.items.len(),
                incoming = batch.len(),
                dropped,
                "staging queue full, dropping the tail of the batch"
            );
        }
        self.items.extend(batch.into_iter().take(room));
        dropped
    }

    /// takes the staged items, leaving the queue empty
    pub(crate) fn take(&mut self) -> Vec<T> {
        std::mem::take(&mut self.items)
    }

    pub(crate) fn reset(&mut self) {
        self.items.clear();
    }

    /// number of staged items
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// true if nothing is staged
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// fixed maximum number of staged items
    pub fn max(&self) -> usize {
        self.max
    }
}
