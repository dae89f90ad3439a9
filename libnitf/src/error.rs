use thiserror::Error;

#[derive(Error, Debug)]
#[non_exhaustive]
/// Possible `libnitf` errors
///
/// Every parse-side variant carries the byte offset at which the offending field started.
pub enum Error {
    /// Transparent wrapper for [`std::io::Error`]
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// The source ended before a fixed-width field could be read
    #[error("unexpected end of data reading {field} at offset {offset}")]
    UnexpectedEof {
        /// offset of the field
        offset: u64,
        /// field being read
        field: &'static str,
    },

    /// An expected literal marker was not found
    #[error("expected marker {expected:?} at offset {offset}, found {found:?}")]
    MarkerMismatch {
        /// offset of the marker
        offset: u64,
        /// expected literal
        expected: String,
        /// bytes actually present
        found: String,
    },

    /// A declared length does not match the bytes actually consumed
    #[error("{context} at offset {offset}: declared length {declared}, consumed {consumed}")]
    LengthMismatch {
        /// offset at which the length-bounded section started
        offset: u64,
        /// which length was violated
        context: String,
        /// declared length
        declared: u64,
        /// bytes consumed or available
        consumed: u64,
    },

    /// A coded field holds a value outside its valid set
    #[error("invalid value {value:?} for {field} at offset {offset}")]
    InvalidEnumeratedValue {
        /// offset of the field
        offset: u64,
        /// field name
        field: &'static str,
        /// offending text
        value: String,
    },

    /// A fixed-width numeric field could not be parsed
    #[error("malformed numeric field {field} at offset {offset}: {value:?}")]
    MalformedNumericField {
        /// offset of the field
        offset: u64,
        /// field name
        field: String,
        /// offending text
        value: String,
    },

    /// A coordinate field could not be parsed under its grammar
    #[error("{message}")]
    MalformedCoordinate {
        /// offset of the coordinate block, when read from a subheader
        offset: Option<u64>,
        /// description quoting the offending text
        message: String,
    },

    /// The file header carries a format version this crate does not read
    #[error("unsupported format version {0:?}")]
    UnsupportedVersion(String),

    /// Structurally valid input with no implemented handling
    #[error("unsupported combination: {0}")]
    UnsupportedCombination(String),

    /// A value does not fit in its fixed-width field on write
    #[error("value {value:?} does not fit in {width} bytes for {field}")]
    FieldOverflow {
        /// field name
        field: &'static str,
        /// value that was being written
        value: String,
        /// field width
        width: usize,
    },

    /// A TRE entry was looked up but is not present
    #[error("Failed to look up {0}")]
    MissingEntry(String),

    /// A TRE entry does not hold a value of the requested kind
    #[error("TRE entry {name} holds {value:?}, not a number")]
    InvalidTreValue {
        /// entry name
        name: String,
        /// entry text
        value: String,
    },

    /// A segment payload was skipped at parse time and cannot be written
    #[error("payload for {0} segment was not materialized")]
    PayloadUnavailable(&'static str),

    /// A TRE descriptor source could not be parsed
    #[error("invalid TRE descriptor: {0}")]
    Descriptor(String),

    /// An overflow DES points at a segment that does not exist
    #[error("TRE overflow target {overflow} item {item} does not exist")]
    OverflowTarget {
        /// overflow section name (DESOFLW)
        overflow: String,
        /// segment index (DESITEM)
        item: u16,
    },
}

impl Error {
    pub(crate) fn length_mismatch(
        offset: u64,
        context: impl Into<String>,
        declared: u64,
        consumed: u64,
    ) -> Self {
        Self::LengthMismatch {
            offset,
            context: context.into(),
            declared,
            consumed,
        }
    }
}

/// Generic result type with crate's Error as its error variant
pub type Result<T> = core::result::Result<T, Error>;
