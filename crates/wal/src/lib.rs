//! # WAL — Write-Ahead Log writer
//!
//! Serializes opaque record payloads (in practice, a serialized write batch
//! — see the `batch` crate) into a block-framed byte stream for crash
//! recovery. This crate only writes; replaying a WAL back into a memtable on
//! restart is a reader's job and is intentionally not provided here.
//!
//! ## Block framing
//!
//! The output is a sequence of fixed 32 KiB blocks. Each block holds one or
//! more **fragments**:
//!
//! ```text
//! [masked_crc32c: u32 LE][length: u16 LE][type: u8][payload: length bytes]
//! ```
//!
//! A record larger than what fits in the remainder of the current block is
//! split across `FIRST · MIDDLE* · LAST` fragments; a record that fits
//! whole becomes a single `FULL` fragment. When fewer than 7 bytes remain in
//! a block, the remainder is zero-padded and the next fragment starts a new
//! block.
//!
//! ```rust
//! use wal::Writer;
//!
//! let mut sink = Vec::new();
//! let mut writer = Writer::new(&mut sink);
//! writer.add_record(b"hello world").unwrap();
//! assert_eq!(sink.len(), 7 + 11);
//! ```

use std::io::{self, Write};

use codec::encode_fixed32;
use thiserror::Error;

/// Size of a WAL block, in bytes. Fixed; there is no rotation policy here.
pub const BLOCK_SIZE: usize = 32 * 1024;

/// Size of a fragment header: 4-byte masked CRC, 2-byte length, 1-byte type.
pub const HEADER_SIZE: usize = 7;

const MASK_DELTA: u32 = 0xA282_EAD8;

/// The type tag stored in a fragment's header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RecordType {
    /// Padding / unused; never written for real payload bytes.
    Zero = 0,
    /// The fragment is the entire record.
    Full = 1,
    /// The fragment is the first piece of a multi-fragment record.
    First = 2,
    /// The fragment is neither the first nor the last piece.
    Middle = 3,
    /// The fragment is the last piece of a multi-fragment record.
    Last = 4,
}

const RECORD_TYPES: [RecordType; 5] = [
    RecordType::Zero,
    RecordType::Full,
    RecordType::First,
    RecordType::Middle,
    RecordType::Last,
];

/// Errors produced while appending a record.
#[derive(Debug, Error)]
pub enum WalError {
    /// The sink rejected an append or flush.
    #[error("wal sink I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Destination a [`Writer`] appends bytes to.
///
/// A blanket implementation covers every [`std::io::Write`] implementor
/// (`File`, `Vec<u8>`, a `BufWriter`, ...), so a `Writer` can be built over
/// whichever concrete sink the caller already has.
pub trait WritableSink {
    /// Appends `bytes` to the sink.
    fn append(&mut self, bytes: &[u8]) -> io::Result<()>;
    /// Flushes any buffering the sink performs internally.
    fn flush(&mut self) -> io::Result<()>;
}

impl<W: Write> WritableSink for W {
    fn append(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.write_all(bytes)
    }

    fn flush(&mut self) -> io::Result<()> {
        Write::flush(self)
    }
}

/// Appends opaque record payloads to a sink as a sequence of block-framed,
/// CRC32C-protected fragments.
///
/// Not `Clone`, not `Sync`: a single writer owns the sink and the current
/// `block_offset`; there is no internal concurrency at this layer (see the
/// crate-level concurrency notes on the `ingest` crate, which serializes
/// access for the whole write path).
pub struct Writer<S> {
    sink: S,
    block_offset: usize,
    type_crc: [u32; 5],
}

impl<S: WritableSink> Writer<S> {
    /// Creates a writer that appends starting at the beginning of a block.
    /// `sink` must be empty, or the caller must otherwise guarantee its
    /// current length is a multiple of [`BLOCK_SIZE`].
    pub fn new(sink: S) -> Self {
        Writer {
            sink,
            block_offset: 0,
            type_crc: Self::init_type_crc(),
        }
    }

    /// Creates a writer appending to a sink that already holds
    /// `existing_length` bytes, so that new fragments continue to align to
    /// the block grid instead of restarting it.
    pub fn with_existing_length(sink: S, existing_length: u64) -> Self {
        Writer {
            sink,
            block_offset: (existing_length as usize) % BLOCK_SIZE,
            type_crc: Self::init_type_crc(),
        }
    }

    /// Fragments `payload` across as many blocks as necessary and appends
    /// the fragments to the sink.
    ///
    /// Runs at least once even for an empty payload, emitting a single
    /// zero-length `FULL` fragment — an empty record is still a record.
    pub fn add_record(&mut self, payload: &[u8]) -> Result<(), WalError> {
        let mut remaining = payload;
        let mut first = true;
        loop {
            let leftover = BLOCK_SIZE - self.block_offset;
            if leftover < HEADER_SIZE {
                if leftover > 0 {
                    log::debug!(
                        "wal: padding {leftover} trailing byte(s) to close out the current block"
                    );
                    let padding = vec![0u8; leftover];
                    self.sink.append(&padding).map_err(|e| {
                        log::warn!("wal: sink rejected block padding: {e}");
                        WalError::from(e)
                    })?;
                }
                self.block_offset = 0;
            }

            debug_assert!(BLOCK_SIZE - self.block_offset >= HEADER_SIZE);
            let avail = BLOCK_SIZE - self.block_offset - HEADER_SIZE;
            let fragment_len = remaining.len().min(avail);
            let is_last = fragment_len == remaining.len();

            let record_type = match (first, is_last) {
                (true, true) => RecordType::Full,
                (true, false) => RecordType::First,
                (false, true) => RecordType::Last,
                (false, false) => RecordType::Middle,
            };

            let (fragment, rest) = remaining.split_at(fragment_len);
            self.emit_physical_record(record_type, fragment)?;
            remaining = rest;
            first = false;

            if remaining.is_empty() {
                return Ok(());
            }
        }
    }

    fn emit_physical_record(&mut self, record_type: RecordType, payload: &[u8]) -> Result<(), WalError> {
        debug_assert!(payload.len() <= 0xFFFF, "fragment length must fit in u16");
        debug_assert!(self.block_offset + HEADER_SIZE + payload.len() <= BLOCK_SIZE);

        let seed = self.type_crc[record_type as usize];
        let crc = crc32c::crc32c_append(seed, payload);
        let masked = mask(crc);

        let mut header = [0u8; HEADER_SIZE];
        encode_fixed32(&mut header[0..4], masked);
        header[4] = (payload.len() & 0xff) as u8;
        header[5] = ((payload.len() >> 8) & 0xff) as u8;
        header[6] = record_type as u8;

        self.sink.append(&header).map_err(|e| {
            log::warn!("wal: sink rejected fragment header: {e}");
            WalError::from(e)
        })?;
        self.sink.append(payload).map_err(|e| {
            log::warn!("wal: sink rejected fragment payload: {e}");
            WalError::from(e)
        })?;
        self.sink.flush().map_err(|e| {
            log::warn!("wal: sink flush failed: {e}");
            WalError::from(e)
        })?;
        self.block_offset += HEADER_SIZE + payload.len();

        log::debug!(
            "wal: wrote {:?} fragment of {} bytes at block_offset {}",
            record_type,
            payload.len(),
            self.block_offset
        );
        Ok(())
    }

    fn init_type_crc() -> [u32; 5] {
        let mut table = [0u32; 5];
        for (i, ty) in RECORD_TYPES.iter().enumerate() {
            table[i] = crc32c::crc32c(&[*ty as u8]);
        }
        table
    }

    /// Current offset within the block currently being written. Exposed for
    /// tests; not meaningful to callers beyond observing block alignment.
    pub fn block_offset(&self) -> usize {
        self.block_offset
    }
}

/// Masks a CRC32C value before storing it in a fragment header: avoids a raw
/// CRC of a zero-length payload colliding trivially with the CRC of the
/// header bytes during a partial write.
fn mask(crc: u32) -> u32 {
    crc.rotate_right(15).wrapping_add(MASK_DELTA)
}
