use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use crate::structs::sync::MAX_FRAME_SIZE;

/// Pool of reusable frame buffers.
///
/// The extractor copies every emitted frame out of its window; recycling
/// the backing vectors keeps steady-state extraction allocation-free.
#[derive(Debug)]
pub struct BufferPool {
    pool: Arc<Mutex<VecDeque<Vec<u8>>>>,
    max_pooled: usize,
    buffer_capacity: usize,
}

impl BufferPool {
    pub fn new(max_pooled: usize, buffer_capacity: usize) -> Self {
        Self {
            pool: Arc::new(Mutex::new(VecDeque::with_capacity(max_pooled))),
            max_pooled,
            buffer_capacity,
        }
    }

    /// Takes a cleared buffer from the pool, allocating when empty.
    pub fn acquire(&self) -> Vec<u8> {
        let mut pool = self.pool.lock().unwrap();
        pool.pop_front()
            .unwrap_or_else(|| Vec::with_capacity(self.buffer_capacity))
    }

    /// Hands a buffer back for reuse. Excess buffers are dropped.
    pub fn release(&self, mut buffer: Vec<u8>) {
        buffer.clear();

        let mut pool = self.pool.lock().unwrap();
        if pool.len() < self.max_pooled {
            pool.push_back(buffer);
        }
    }
}

impl Default for BufferPool {
    fn default() -> Self {
        Self::new(8, MAX_FRAME_SIZE)
    }
}
