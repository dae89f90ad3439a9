//! Placement of segment payloads: in memory, spooled to a temporary file, or skipped

use std::{
    fmt,
    fs::File,
    io::{BufReader, BufWriter, Read, Write},
    path::Path,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};

use bon::Builder;
use mktemp::Temp;
use tracing::{debug, info, instrument};

use crate::{
    error::{Error, Result},
    reader::ByteCursor,
};

/// Decides whether a payload of a given length goes to a temporary file
#[derive(Debug, Clone, Copy, Default)]
pub enum SpoolPredicate {
    /// Always keep payloads in memory
    #[default]
    Never,
    /// Always spool
    Always,
    /// Spool payloads longer than the given number of bytes
    Above(u64),
    /// Caller-supplied rule
    Custom(fn(u64) -> bool),
}

impl SpoolPredicate {
    /// Whether a payload of `len` bytes should be spooled
    #[must_use]
    pub fn should_spool(&self, len: u64) -> bool {
        match self {
            Self::Never => false,
            Self::Always => true,
            Self::Above(threshold) => len > *threshold,
            Self::Custom(f) => f(len),
        }
    }
}

/// A caller-owned count of bytes that in-memory payloads may occupy
///
/// Clones share the same counter, so one budget can be handed to several parses. Memory
/// payloads hold their share until they are dropped. The headroom check for spooled payloads
/// is a point-in-time snapshot and is racy under concurrent parses; a stale value can only
/// cause a payload to be skipped.
#[derive(Debug, Clone)]
pub struct MemoryBudget {
    available: Arc<AtomicU64>,
}

impl MemoryBudget {
    /// Creates a budget of `bytes`
    #[must_use]
    pub fn new(bytes: u64) -> Self {
        Self {
            available: Arc::new(AtomicU64::new(bytes)),
        }
    }

    /// Bytes not currently reserved
    #[must_use]
    pub fn available(&self) -> u64 {
        self.available.load(Ordering::Acquire)
    }

    fn reserve(&self, len: u64) -> Option<Reservation> {
        self.available
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |a| a.checked_sub(len))
            .ok()
            .map(|_| Reservation {
                budget: self.clone(),
                len,
            })
    }
}

struct Reservation {
    budget: MemoryBudget,
    len: u64,
}

impl Drop for Reservation {
    fn drop(&mut self) {
        self.budget.available.fetch_add(self.len, Ordering::AcqRel);
    }
}

/// Payload placement policy
#[derive(Builder, Debug, Clone)]
pub struct HeapStrategy {
    /// Payloads longer than this are skipped
    #[builder(default = u64::MAX)]
    max_length: u64,
    /// Rule choosing between memory and a temporary file
    #[builder(default)]
    spool: SpoolPredicate,
    /// Optional limit on memory-resident payload bytes
    budget: Option<MemoryBudget>,
}

impl Default for HeapStrategy {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl HeapStrategy {
    /// Largest payload that is materialized
    #[must_use]
    pub const fn max_length(&self) -> u64 {
        self.max_length
    }

    /// Reads or skips the next `len` bytes of `cursor`
    ///
    /// Returns [`None`] when the payload was skipped; the cursor is past the payload either way.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::UnexpectedEof`] if the source is shorter than `len`, or
    /// [`crate::Error::Io`] if the temporary file cannot be written
    #[instrument(skip(self, cursor), level = "trace")]
    pub fn place<R: Read>(
        &self,
        cursor: &mut ByteCursor<R>,
        len: u64,
        segment: &'static str,
    ) -> Result<Option<Payload>> {
        if len > self.max_length {
            info!(
                "skipping {len} byte {segment} payload, limit is {}",
                self.max_length
            );
            cursor.skip(len, "segment data")?;
            return Ok(None);
        }

        if self.spool.should_spool(len) {
            if let Some(budget) = &self.budget {
                let headroom = budget.available();
                if headroom < len {
                    info!("skipping {len} byte {segment} payload, {headroom} bytes of headroom");
                    cursor.skip(len, "segment data")?;
                    return Ok(None);
                }
            }
            let file = Temp::new_file()?;
            let mut w = BufWriter::new(File::create(&file)?);
            cursor.copy_to(len, &mut w, "segment data")?;
            w.flush()?;
            debug!("spooled {len} byte {segment} payload");
            return Ok(Some(Payload {
                len,
                storage: Storage::Spooled(file),
            }));
        }

        let reservation = match &self.budget {
            Some(budget) => match budget.reserve(len) {
                Some(r) => Some(r),
                None => {
                    info!("skipping {len} byte {segment} payload, memory budget exhausted");
                    cursor.skip(len, "segment data")?;
                    return Ok(None);
                }
            },
            None => None,
        };
        let size = usize::try_from(len).map_err(|_| {
            Error::UnsupportedCombination(format!("{len} byte {segment} payload on this target"))
        })?;
        let data = cursor.read_raw(size, "segment data")?;
        debug!("read {len} byte {segment} payload into memory");
        Ok(Some(Payload {
            len,
            storage: Storage::Memory { data, reservation },
        }))
    }
}

enum Storage {
    Memory {
        data: Vec<u8>,
        reservation: Option<Reservation>,
    },
    Spooled(Temp),
}

/// The bytes of one segment, wherever they were placed
///
/// A spooled payload's temporary file is removed when the payload is dropped.
pub struct Payload {
    len: u64,
    storage: Storage,
}

impl fmt::Debug for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("Payload");
        s.field("len", &self.len);
        match &self.storage {
            Storage::Memory { reservation, .. } => {
                s.field("budgeted", &reservation.is_some());
            }
            Storage::Spooled(file) => {
                s.field("spool", &file.as_path());
            }
        }
        s.finish()
    }
}

impl From<Vec<u8>> for Payload {
    fn from(data: Vec<u8>) -> Self {
        Self {
            len: data.len() as u64,
            storage: Storage::Memory {
                data,
                reservation: None,
            },
        }
    }
}

impl Payload {
    /// Length in bytes
    #[must_use]
    pub const fn len(&self) -> u64 {
        self.len
    }

    /// Whether the payload has no bytes
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Path of the temporary file, if the payload was spooled
    #[must_use]
    pub fn spool_path(&self) -> Option<&Path> {
        match &self.storage {
            Storage::Memory { .. } => None,
            Storage::Spooled(file) => Some(file.as_path()),
        }
    }

    /// The bytes, if they are held in memory
    #[must_use]
    pub fn as_slice(&self) -> Option<&[u8]> {
        match &self.storage {
            Storage::Memory { data, .. } => Some(data),
            Storage::Spooled(_) => None,
        }
    }

    /// Opens a reader over the payload
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Io`] if the temporary file cannot be opened
    pub fn reader(&self) -> Result<Box<dyn Read + '_>> {
        Ok(match &self.storage {
            Storage::Memory { data, .. } => Box::new(data.as_slice()),
            Storage::Spooled(file) => Box::new(BufReader::new(File::open(file)?)),
        })
    }

    /// Copies the payload into a new buffer
    ///
    /// # Errors
    ///
    /// See [`Self::reader`]
    pub fn to_vec(&self) -> Result<Vec<u8>> {
        if let Some(data) = self.as_slice() {
            return Ok(data.to_vec());
        }
        let mut buf = Vec::with_capacity(usize::try_from(self.len).unwrap_or_default());
        self.reader()?.read_to_end(&mut buf)?;
        Ok(buf)
    }

    /// Writes the payload to `w`, returning the number of bytes written
    ///
    /// # Errors
    ///
    /// See [`Self::reader`]
    pub fn copy_to(&self, w: &mut impl Write) -> Result<u64> {
        Ok(std::io::copy(&mut self.reader()?, w)?)
    }
}
