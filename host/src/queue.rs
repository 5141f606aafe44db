use std::collections::VecDeque;
use std::sync::Mutex;

use crate::error::HostError;

/// Fixed-capacity, mutex-protected FIFO (spec §4.4: "host: 64
/// recommended"). Single producer (reader thread), single consumer
/// (main thread); a mutex is the simplest correct choice here since
/// pushes and pops are already rare relative to the ~1s read timeout
/// that paces the reader thread (spec §5).
pub struct BoundedQueue<T> {
    capacity: usize,
    inner: Mutex<VecDeque<T>>,
}

/// Default capacity recommended by spec §4.4.
pub const DEFAULT_HOST_QUEUE_CAPACITY: usize = 64;

impl<T> BoundedQueue<T> {
    pub fn new(capacity: usize) -> Self {
        Self { capacity, inner: Mutex::new(VecDeque::with_capacity(capacity)) }
    }

    pub fn push(&self, item: T) -> Result<(), HostError> {
        let mut guard = self.inner.lock().unwrap();
        if guard.len() >= self.capacity {
            return Err(HostError::QueueFull);
        }
        guard.push_back(item);
        Ok(())
    }

    pub fn pop(&self) -> Result<T, HostError> {
        self.inner.lock().unwrap().pop_front().ok_or(HostError::QueueEmpty)
    }

    pub fn size(&self) -> usize {
        self.inner.lock().unwrap().len()
    }

    pub fn empty(&self) -> bool {
        self.size() == 0
    }

    pub fn full(&self) -> bool {
        self.size() >= self.capacity
    }
}

impl<T: Clone> BoundedQueue<T> {
    pub fn peek(&self) -> Option<T> {
        self.inner.lock().unwrap().front().cloned()
    }
}
