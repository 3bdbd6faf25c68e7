//! Sample hand-off between a hardware producer and channel readers.
//!
//! One producer writes into fixed slots and never waits for readers:
//! when the store wraps, the oldest samples are overwritten. Each reader
//! keeps its own cursor and sees only committed slots. With capacity 1
//! the buffer degenerates to "latest value wins".

use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use contracts::SensorRecord;
use parking_lot::Mutex;
use tokio::sync::watch;

/// Fixed-capacity circular store of sample records
pub struct RingBuffer<T> {
    capacity: usize,
    slots: Mutex<Vec<T>>,
    /// Number of commits since creation; slot index is `seq % capacity`
    committed: AtomicU64,
    wake: watch::Sender<u64>,
}

impl<T: SensorRecord> RingBuffer<T> {
    /// Create a buffer with `capacity` slots (minimum 1)
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (wake, _) = watch::channel(0);
        Self {
            capacity,
            slots: Mutex::new(vec![T::default(); capacity]),
            committed: AtomicU64::new(0),
            wake,
        }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Total number of committed writes
    #[inline]
    pub fn committed_count(&self) -> u64 {
        self.committed.load(Ordering::Acquire)
    }

    /// Obtain a writable record for the next slot.
    ///
    /// Always succeeds. Nothing becomes visible until
    /// [`SlotWriter::commit`].
    #[inline]
    pub fn next_slot(&self) -> SlotWriter<'_, T> {
        SlotWriter {
            buffer: self,
            record: T::default(),
        }
    }

    /// Unblock every reader waiting in [`BufferReader::wait`]
    #[inline]
    pub fn wake_up_readers(&self) {
        self.wake.send_replace(self.committed_count());
    }

    /// Write, commit and wake in one step
    pub fn push(&self, record: T) {
        let mut slot = self.next_slot();
        *slot = record;
        slot.commit();
        self.wake_up_readers();
    }

    /// Most recently committed record
    pub fn latest(&self) -> Option<T> {
        let slots = self.slots.lock();
        let seq = self.committed.load(Ordering::Acquire);
        if seq == 0 {
            return None;
        }
        Some(slots[((seq - 1) % self.capacity as u64) as usize].clone())
    }

    /// Attach a new reader positioned after the last committed record
    pub fn reader(self: &Arc<Self>) -> BufferReader<T> {
        BufferReader {
            read_count: self.committed_count(),
            wake: self.wake.subscribe(),
            buffer: Arc::clone(self),
        }
    }

    fn commit_record(&self, record: T) {
        let mut slots = self.slots.lock();
        let seq = self.committed.load(Ordering::Relaxed);
        slots[(seq % self.capacity as u64) as usize] = record;
        self.committed.store(seq + 1, Ordering::Release);
    }
}

impl<T> std::fmt::Debug for RingBuffer<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RingBuffer")
            .field("capacity", &self.capacity)
            .field("committed", &self.committed.load(Ordering::Relaxed))
            .finish()
    }
}

/// Record being prepared for the next slot
pub struct SlotWriter<'a, T: SensorRecord> {
    buffer: &'a RingBuffer<T>,
    record: T,
}

impl<T: SensorRecord> SlotWriter<'_, T> {
    /// Publish the record to readers
    pub fn commit(self) {
        self.buffer.commit_record(self.record);
    }
}

impl<T: SensorRecord> Deref for SlotWriter<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.record
    }
}

impl<T: SensorRecord> DerefMut for SlotWriter<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.record
    }
}

/// Per-consumer cursor over a [`RingBuffer`]
pub struct BufferReader<T> {
    buffer: Arc<RingBuffer<T>>,
    read_count: u64,
    wake: watch::Receiver<u64>,
}

impl<T: SensorRecord> BufferReader<T> {
    /// Whether committed records are waiting to be read
    #[inline]
    pub fn has_unread(&self) -> bool {
        self.buffer.committed_count() > self.read_count
    }

    /// Drain everything committed since the last read.
    ///
    /// Records overwritten before this reader got to them are skipped.
    pub fn read(&mut self) -> Vec<T> {
        self.read_at_most(usize::MAX)
    }

    /// Drain up to `max` records, oldest first
    pub fn read_at_most(&mut self, max: usize) -> Vec<T> {
        let cap = self.buffer.capacity as u64;
        let slots = self.buffer.slots.lock();
        let committed = self.buffer.committed.load(Ordering::Acquire);
        let start = self.read_count.max(committed.saturating_sub(cap));
        let end = committed.min(start.saturating_add(max as u64));
        let out = (start..end)
            .map(|seq| slots[(seq % cap) as usize].clone())
            .collect();
        self.read_count = end;
        out
    }

    /// Wait until a commit has been announced with `wake_up_readers`.
    ///
    /// Returns `false` only if the buffer's wake channel is gone.
    pub async fn wait(&mut self) -> bool {
        loop {
            if self.has_unread() {
                return true;
            }
            if self.wake.changed().await.is_err() {
                return false;
            }
        }
    }

    pub fn buffer(&self) -> &Arc<RingBuffer<T>> {
        &self.buffer
    }
}
