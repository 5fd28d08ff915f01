//! # Ingest — the write-path facade
//!
//! Ties the `batch`, `wal`, and `memtable` crates together into the single
//! operation the rest of the engine actually calls: take a batch of
//! mutations, assign it a sequence range, make it durable, then make it
//! visible.
//!
//! For one write: assign a base sequence, write the batch's byte image as
//! one WAL record, then replay the batch into the memtable via the handler
//! interface, where each record is materialized in arena memory and
//! inserted into the ordered set. A batch is only ever applied to the
//! memtable after the WAL write for it has succeeded.
//!
//! ```rust
//! use ingest::Ingest;
//! use memtable::{ByteComparator, GetResult, LookupKey};
//!
//! let ingest = Ingest::new(Vec::new(), ByteComparator);
//! ingest.put(b"hello", b"world").unwrap();
//!
//! match ingest.memtable().get(&LookupKey::new(b"hello", u64::MAX)) {
//!     GetResult::Found(v) => assert_eq!(v, b"world"),
//!     _ => panic!("expected a value"),
//! }
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use anyhow::Context;
use batch::{Handler, ValueType, WriteBatch};
use memtable::{Memtable, UserComparator};
use wal::{WritableSink, Writer as WalWriter};

/// Coordinates a WAL writer and a memtable behind one sequence counter.
///
/// All methods take `&self`: the single-writer contract (one caller drives
/// `put`/`delete`/`write_batch` at a time) is the caller's responsibility,
/// matching the memtable's own contract. Concurrent reads of the memtable
/// through [`Ingest::memtable`] are always safe.
pub struct Ingest<C: UserComparator + Send + Sync + 'static, S: WritableSink> {
    wal: Mutex<WalWriter<S>>,
    memtable: Memtable<C>,
    next_seq: AtomicU64,
}

impl<C: UserComparator + Send + Sync + 'static, S: WritableSink> Ingest<C, S> {
    /// Creates an ingest facade writing to a fresh (empty) WAL sink.
    pub fn new(sink: S, cmp: C) -> Self {
        Ingest {
            wal: Mutex::new(WalWriter::new(sink)),
            memtable: Memtable::new(cmp),
            next_seq: AtomicU64::new(0),
        }
    }

    /// Creates an ingest facade continuing to append to a WAL sink that
    /// already holds `existing_wal_length` bytes, starting sequence
    /// assignment at `starting_seq` (as recovered from that WAL's
    /// contents, if any).
    pub fn resuming(sink: S, existing_wal_length: u64, starting_seq: u64, cmp: C) -> Self {
        Ingest {
            wal: Mutex::new(WalWriter::with_existing_length(sink, existing_wal_length)),
            memtable: Memtable::new(cmp),
            next_seq: AtomicU64::new(starting_seq),
        }
    }

    /// Applies a single `Put` as a one-record batch.
    pub fn put(&self, key: &[u8], value: &[u8]) -> anyhow::Result<()> {
        let mut batch = WriteBatch::new();
        batch.put(key, value);
        self.write_batch(&mut batch)
    }

    /// Applies a single `Delete` as a one-record batch.
    pub fn delete(&self, key: &[u8]) -> anyhow::Result<()> {
        let mut batch = WriteBatch::new();
        batch.delete(key);
        self.write_batch(&mut batch)
    }

    /// Assigns `batch` a base sequence, durably logs it, then applies it to
    /// the memtable.
    ///
    /// `batch`'s sequence field is overwritten with the assigned base
    /// sequence as a side effect. If the WAL write fails, the batch is
    /// never applied to the memtable; if the WAL write succeeds but
    /// iteration during memtable application later finds the batch
    /// corrupt, the caller is left with a WAL record that does not fully
    /// match memtable state — recovery is expected to re-derive memtable
    /// state from the WAL, not the other way around.
    pub fn write_batch(&self, batch: &mut WriteBatch) -> anyhow::Result<()> {
        let count = batch.count() as u64;
        let base_seq = self.next_seq.fetch_add(count, Ordering::SeqCst);
        batch.set_sequence(base_seq);

        {
            let mut wal = self.wal.lock().expect("wal mutex poisoned");
            wal.add_record(batch.contents())
                .context("failed to append batch to the write-ahead log")?;
        }

        let mut inserter = MemtableInserter {
            memtable: &self.memtable,
            seq: base_seq,
        };
        batch
            .iterate(&mut inserter)
            .context("batch passed WAL validation but failed to replay into the memtable")?;

        log::debug!(
            "ingest: applied write_batch with {count} record(s) starting at seq {base_seq}"
        );
        Ok(())
    }

    /// The memtable backing this ingest facade. Safe to read concurrently
    /// with in-flight writes.
    pub fn memtable(&self) -> &Memtable<C> {
        &self.memtable
    }
}

struct MemtableInserter<'a, C: UserComparator + Send + Sync + 'static> {
    memtable: &'a Memtable<C>,
    seq: u64,
}

impl<'a, C: UserComparator + Send + Sync + 'static> Handler for MemtableInserter<'a, C> {
    fn put(&mut self, key: &[u8], value: &[u8]) {
        self.memtable.add(self.seq, ValueType::Value, key, value);
        self.seq += 1;
    }

    fn delete(&mut self, key: &[u8]) {
        self.memtable.add(self.seq, ValueType::Deletion, key, b"");
        self.seq += 1;
    }
}
