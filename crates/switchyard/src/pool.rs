//! Reusable buffers for the variable values captured during a match.
//!
//! A buffer holds byte ranges into the request path rather than owned
//! strings, so capturing never allocates. Each match acquires at most one
//! buffer and the guard hands it back when dropped.

use std::ops::{Deref, DerefMut, Range};

use parking_lot::Mutex;

/// Byte range of one captured value within the matched path.
pub(crate) type Span = Range<usize>;

/// Pool of fixed-capacity value buffers.
#[derive(Debug)]
pub struct ValuePool {
    capacity: usize,
    max_idle: usize,
    idle: Mutex<Vec<Vec<Span>>>,
}

impl ValuePool {
    /// Create a pool of buffers holding `capacity` values each, retaining at
    /// most `max_idle` released buffers.
    pub fn new(capacity: usize, max_idle: usize) -> Self {
        Self {
            capacity,
            max_idle,
            idle: Mutex::new(Vec::new()),
        }
    }

    /// Values per buffer.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of released buffers waiting for reuse.
    pub fn idle(&self) -> usize {
        self.idle.lock().len()
    }

    /// Take a buffer, reusing an idle one when available.
    pub(crate) fn acquire(&self) -> PooledValues<'_> {
        let buf = self
            .idle
            .lock()
            .pop()
            .unwrap_or_else(|| vec![0..0; self.capacity]);
        PooledValues { pool: self, buf }
    }

    fn release(&self, buf: Vec<Span>) {
        // A buffer from before the pool was resized is simply dropped.
        if buf.len() != self.capacity {
            return;
        }
        let mut idle = self.idle.lock();
        if idle.len() < self.max_idle {
            idle.push(buf);
        }
    }
}

/// A buffer on loan from a [`ValuePool`].
#[derive(Debug)]
pub(crate) struct PooledValues<'a> {
    pool: &'a ValuePool,
    buf: Vec<Span>,
}

impl Deref for PooledValues<'_> {
    type Target = [Span];

    fn deref(&self) -> &Self::Target {
        &self.buf
    }
}

impl DerefMut for PooledValues<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.buf
    }
}

impl Drop for PooledValues<'_> {
    fn drop(&mut self) {
        self.pool.release(std::mem::take(&mut self.buf));
    }
}
