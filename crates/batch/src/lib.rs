//! # Write batch
//!
//! A self-describing byte buffer packaging a sequence of `Put`/`Delete`
//! mutations under one sequence number. This is both the in-memory batch
//! type callers build up and the exact byte image written as a WAL record
//! and replayed into the memtable — there is only one wire format.
//!
//! ```
//! use batch::{Handler, WriteBatch};
//!
//! struct Recorder(Vec<(Vec<u8>, Option<Vec<u8>>)>);
//! impl Handler for Recorder {
//!     fn put(&mut self, key: &[u8], value: &[u8]) {
//!         self.0.push((key.to_vec(), Some(value.to_vec())));
//!     }
//!     fn delete(&mut self, key: &[u8]) {
//!         self.0.push((key.to_vec(), None));
//!     }
//! }
//!
//! let mut batch = WriteBatch::new();
//! batch.put(b"k1", b"v1");
//! batch.delete(b"k2");
//! assert_eq!(batch.count(), 2);
//!
//! let mut recorder = Recorder(Vec::new());
//! batch.iterate(&mut recorder).unwrap();
//! assert_eq!(recorder.0.len(), 2);
//! ```

use codec::{decode_fixed32, decode_fixed64, encode_fixed32, encode_fixed64, get_length_prefixed_slice, put_length_prefixed_slice};
use thiserror::Error;

/// Byte length of the header: an 8-byte sequence followed by a 4-byte count.
pub const HEADER_LEN: usize = 12;

const SEQUENCE_OFFSET: usize = 0;
const COUNT_OFFSET: usize = 8;

/// Errors raised while decoding a batch's record body.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BatchError {
    /// The buffer is shorter than [`HEADER_LEN`].
    #[error("write batch too small to contain a header: {len} bytes")]
    HeaderTooSmall {
        /// Length of the offending buffer.
        len: usize,
    },
    /// A record's tag byte is neither `VALUE` (0x01) nor `DELETION` (0x00).
    #[error("unknown write batch record tag: {0:#x}")]
    UnknownTag(u8),
    /// A record's key or value was truncated mid-record.
    #[error("truncated write batch record: {0}")]
    Truncated(#[from] codec::CodecError),
    /// The number of records dispatched during iteration did not match the
    /// header's count field.
    #[error("write batch declares {declared} records but {found} were found")]
    CountMismatch {
        /// Count stored in the header.
        declared: u32,
        /// Count actually walked during iteration.
        found: u32,
    },
}

/// The single-byte tag distinguishing a `Put` record from a `Delete` record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ValueType {
    /// Tombstone: the key is deleted as of this record's sequence.
    Deletion = 0x00,
    /// The key is set to the accompanying value.
    Value = 0x01,
}

impl TryFrom<u8> for ValueType {
    type Error = BatchError;

    fn try_from(tag: u8) -> Result<Self, Self::Error> {
        match tag {
            0x00 => Ok(ValueType::Deletion),
            0x01 => Ok(ValueType::Value),
            other => Err(BatchError::UnknownTag(other)),
        }
    }
}

/// Sink a batch's records are dispatched to during [`WriteBatch::iterate`].
///
/// The memtable inserter used on the write path is one implementation;
/// tests typically supply a recording implementation instead.
pub trait Handler {
    /// Called once per `Put` record, in the order records were written.
    fn put(&mut self, key: &[u8], value: &[u8]);
    /// Called once per `Delete` record, in the order records were written.
    fn delete(&mut self, key: &[u8]);
}

/// A sequence of `Put`/`Delete` mutations sharing one sequence number range.
///
/// Backed by a single growing byte vector (`rep`) holding the exact wire
/// image described in the module docs: a 12-byte header followed by
/// variable-length records. Nothing about a `WriteBatch` requires
/// synchronization; the contract is that a single batch is never mutated
/// from more than one place at a time.
#[derive(Debug, Clone)]
pub struct WriteBatch {
    rep: Vec<u8>,
}

impl Default for WriteBatch {
    fn default() -> Self {
        Self::new()
    }
}

impl WriteBatch {
    /// Creates an empty batch: sequence 0, count 0, no records.
    pub fn new() -> Self {
        WriteBatch {
            rep: vec![0u8; HEADER_LEN],
        }
    }

    /// Resets this batch back to its empty state.
    pub fn clear(&mut self) {
        self.rep.clear();
        self.rep.resize(HEADER_LEN, 0);
    }

    /// Appends a `Put` record and increments the header's count.
    pub fn put(&mut self, key: &[u8], value: &[u8]) {
        self.set_count(self.count() + 1);
        self.rep.push(ValueType::Value as u8);
        put_length_prefixed_slice(&mut self.rep, key);
        put_length_prefixed_slice(&mut self.rep, value);
    }

    /// Appends a `Delete` record and increments the header's count.
    pub fn delete(&mut self, key: &[u8]) {
        self.set_count(self.count() + 1);
        self.rep.push(ValueType::Deletion as u8);
        put_length_prefixed_slice(&mut self.rep, key);
    }

    /// Concatenates `other`'s records onto the end of `self`.
    ///
    /// `self`'s count becomes `count(self) + count(other)`. `self`'s
    /// sequence is left untouched; `other`'s sequence is ignored — only its
    /// record body (everything past its own header) is appended.
    pub fn append(&mut self, other: &WriteBatch) {
        self.set_count(self.count() + other.count());
        self.rep.extend_from_slice(&other.rep[HEADER_LEN..]);
    }

    /// Size in bytes of the batch's full wire image, header included.
    pub fn approximate_size(&self) -> usize {
        self.rep.len()
    }

    /// Reads the 56-bit-valued base sequence number from the header.
    pub fn sequence(&self) -> u64 {
        decode_fixed64(&self.rep[SEQUENCE_OFFSET..SEQUENCE_OFFSET + 8])
    }

    /// Overwrites the base sequence number in the header.
    pub fn set_sequence(&mut self, seq: u64) {
        encode_fixed64(&mut self.rep[SEQUENCE_OFFSET..SEQUENCE_OFFSET + 8], seq);
    }

    /// Reads the record count from the header.
    pub fn count(&self) -> u32 {
        decode_fixed32(&self.rep[COUNT_OFFSET..COUNT_OFFSET + 4])
    }

    /// Overwrites the record count in the header.
    pub fn set_count(&mut self, n: u32) {
        encode_fixed32(&mut self.rep[COUNT_OFFSET..COUNT_OFFSET + 4], n);
    }

    /// The full wire image: header followed by the record body. This is
    /// exactly what gets written as a WAL record payload.
    pub fn contents(&self) -> &[u8] {
        &self.rep
    }

    /// Replaces the batch's wire image wholesale, e.g. when reconstructing a
    /// batch read back from the WAL.
    ///
    /// Fails if `bytes` is shorter than [`HEADER_LEN`]; does not otherwise
    /// validate the record body (use [`iterate`](Self::iterate) for that).
    pub fn set_contents(&mut self, bytes: &[u8]) -> Result<(), BatchError> {
        if bytes.len() < HEADER_LEN {
            return Err(BatchError::HeaderTooSmall { len: bytes.len() });
        }
        self.rep = bytes.to_vec();
        Ok(())
    }

    /// Walks the record body in order, dispatching each record to `handler`.
    ///
    /// The whole batch is validated as it is walked: any truncated record,
    /// unknown tag, or a final dispatched-record count that disagrees with
    /// the header is [`BatchError`] and must be treated as corruption —
    /// callers must not apply a batch whose iteration fails partway, since
    /// `handler` has already observed a prefix of the records.
    pub fn iterate<H: Handler>(&self, handler: &mut H) -> Result<(), BatchError> {
        if self.rep.len() < HEADER_LEN {
            return Err(BatchError::HeaderTooSmall { len: self.rep.len() });
        }
        let mut cursor = &self.rep[HEADER_LEN..];
        let mut found: u32 = 0;

        while !cursor.is_empty() {
            let tag = ValueType::try_from(cursor[0]).map_err(|e| {
                log::warn!("write batch iteration hit an unknown tag: {e}");
                e
            })?;
            cursor = &cursor[1..];

            match tag {
                ValueType::Value => {
                    let (key, consumed) = get_length_prefixed_slice(cursor).map_err(|e| {
                        log::warn!("write batch iteration hit a truncated key: {e}");
                        BatchError::from(e)
                    })?;
                    cursor = &cursor[consumed..];
                    let (value, consumed) = get_length_prefixed_slice(cursor).map_err(|e| {
                        log::warn!("write batch iteration hit a truncated value: {e}");
                        BatchError::from(e)
                    })?;
                    handler.put(key, value);
                    cursor = &cursor[consumed..];
                }
                ValueType::Deletion => {
                    let (key, consumed) = get_length_prefixed_slice(cursor).map_err(|e| {
                        log::warn!("write batch iteration hit a truncated key: {e}");
                        BatchError::from(e)
                    })?;
                    handler.delete(key);
                    cursor = &cursor[consumed..];
                }
            }
            found += 1;
        }

        if found != self.count() {
            let err = BatchError::CountMismatch {
                declared: self.count(),
                found,
            };
            log::warn!("{err}");
            return Err(err);
        }
        Ok(())
    }
}
