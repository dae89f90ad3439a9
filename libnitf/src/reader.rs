//! Sequential field reader used by every segment parser

use std::{
    io::{self, Read, Write},
    str::FromStr,
};

use tracing::trace;

use crate::error::{Error, Result};

/// Forward-only reader over a byte source that keeps track of the current offset
///
/// Fixed-width text is decoded byte-per-char (ISO 8859-1), so every byte survives a round trip
/// through [`String`] unchanged.
#[derive(Debug)]
pub struct ByteCursor<R> {
    inner: R,
    offset: u64,
}

impl<R: Read> ByteCursor<R> {
    /// Creates a new [`ByteCursor`] starting at offset zero
    pub const fn new(inner: R) -> Self {
        Self::with_offset(inner, 0)
    }

    /// Creates a new [`ByteCursor`] whose reported offsets start at `offset`
    pub const fn with_offset(inner: R, offset: u64) -> Self {
        Self { inner, offset }
    }

    /// Returns the current offset
    #[must_use]
    pub const fn offset(&self) -> u64 {
        self.offset
    }

    /// Consumes the cursor, returning the underlying reader
    pub fn into_inner(self) -> R {
        self.inner
    }

    /// Reads exactly `len` bytes
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnexpectedEof`] if fewer than `len` bytes remain
    pub fn read_raw(&mut self, len: usize, field: &'static str) -> Result<Vec<u8>> {
        let mut buf = vec![0; len];
        self.fill(&mut buf, field)?;
        Ok(buf)
    }

    /// Reads a fixed number of bytes into an array
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnexpectedEof`] if fewer than `N` bytes remain
    pub fn read_array<const N: usize>(&mut self, field: &'static str) -> Result<[u8; N]> {
        let mut buf = [0; N];
        self.fill(&mut buf, field)?;
        Ok(buf)
    }

    fn fill(&mut self, buf: &mut [u8], field: &'static str) -> Result<()> {
        let offset = self.offset;
        self.inner.read_exact(buf).map_err(|e| match e.kind() {
            io::ErrorKind::UnexpectedEof => Error::UnexpectedEof { offset, field },
            _ => Error::Io(e),
        })?;
        self.offset += buf.len() as u64;
        Ok(())
    }

    /// Reads `len` bytes as text, dropping trailing spaces
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnexpectedEof`] if fewer than `len` bytes remain
    pub fn read_text(&mut self, len: usize, field: &'static str) -> Result<String> {
        let mut text = self.read_text_untrimmed(len, field)?;
        text.truncate(text.trim_end_matches(' ').len());
        Ok(text)
    }

    /// Reads `len` bytes as text, keeping padding
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnexpectedEof`] if fewer than `len` bytes remain
    pub fn read_text_untrimmed(&mut self, len: usize, field: &'static str) -> Result<String> {
        let raw = self.read_raw(len, field)?;
        Ok(latin1(&raw))
    }

    /// Reads `len` bytes of text and parses them as a number
    ///
    /// Surrounding spaces and a leading `+` are accepted. Only the value is kept, so such a field
    /// is written back in canonical zero padded form and the file no longer matches byte for
    /// byte.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedNumericField`] if the trimmed text does not parse as `T`
    pub fn read_number<T: FromStr>(&mut self, len: usize, field: &'static str) -> Result<T> {
        let offset = self.offset;
        let text = self.read_text_untrimmed(len, field)?;
        text.trim()
            .parse()
            .map_err(|_| Error::MalformedNumericField {
                offset,
                field: field.to_owned(),
                value: text,
            })
    }

    /// Reads a field holding one of the values of a `strum` enumeration
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidEnumeratedValue`] when the trimmed text matches no variant
    pub fn read_enum<T: FromStr>(&mut self, len: usize, field: &'static str) -> Result<T> {
        let offset = self.offset;
        let text = self.read_text(len, field)?;
        text.parse().map_err(|_| Error::InvalidEnumeratedValue {
            offset,
            field,
            value: text,
        })
    }

    /// Reads `marker.len()` bytes and checks that they match `marker`
    ///
    /// # Errors
    ///
    /// Returns [`Error::MarkerMismatch`] if they differ
    pub fn verify_marker(&mut self, marker: &str) -> Result<()> {
        let offset = self.offset;
        let found = self.read_raw(marker.len(), "marker")?;
        if found != marker.as_bytes() {
            return Err(Error::MarkerMismatch {
                offset,
                expected: marker.to_owned(),
                found: latin1(&found),
            });
        }
        trace!("verified {marker} at {offset}");
        Ok(())
    }

    /// Advances past `len` bytes without keeping them
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnexpectedEof`] if fewer than `len` bytes remain
    pub fn skip(&mut self, len: u64, field: &'static str) -> Result<()> {
        self.copy_to(len, &mut io::sink(), field)
    }

    /// Copies exactly `len` bytes into `w`
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnexpectedEof`] if fewer than `len` bytes remain, or [`Error::Io`] if the
    /// writer fails
    pub fn copy_to(&mut self, len: u64, w: &mut impl Write, field: &'static str) -> Result<()> {
        let offset = self.offset;
        let copied = io::copy(&mut (&mut self.inner).take(len), w)?;
        self.offset += copied;
        if copied < len {
            return Err(Error::UnexpectedEof { offset, field });
        }
        Ok(())
    }
}

pub(crate) fn latin1(raw: &[u8]) -> String {
    raw.iter().copied().map(char::from).collect()
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use super::ByteCursor;
    use crate::error::{Error, Result};

    #[test]
    fn reads_fixed_width_fields() -> Result<()> {
        let mut cursor = ByteCursor::new(&b"IMabc  00042 -12"[..]);
        cursor.verify_marker("IM")?;
        assert_eq!(cursor.read_text(5, "text")?, "abc");
        assert_eq!(cursor.read_number::<u32>(5, "number")?, 42);
        assert_eq!(cursor.read_number::<i32>(4, "signed")?, -12);
        assert_eq!(cursor.offset(), 16);
        Ok(())
    }

    #[test]
    fn lenient_numbers_keep_only_the_value() -> Result<()> {
        let mut cursor = ByteCursor::new(&b"+0042  42 "[..]);
        assert_eq!(cursor.read_number::<u32>(5, "NROWS")?, 42);
        assert_eq!(cursor.read_number::<u32>(5, "NCOLS")?, 42);
        Ok(())
    }

    #[test]
    fn marker_mismatch_reports_offset() {
        let mut cursor = ByteCursor::with_offset(&b"SY"[..], 100);
        let err = cursor.verify_marker("IM").unwrap_err();
        assert!(matches!(err, Error::MarkerMismatch { offset: 100, .. }));
    }

    #[test]
    fn malformed_number_keeps_source_text() {
        let mut cursor = ByteCursor::new(&b"12a4"[..]);
        match cursor.read_number::<u32>(4, "NROWS") {
            Err(Error::MalformedNumericField { value, offset, .. }) => {
                assert_eq!(value, "12a4");
                assert_eq!(offset, 0);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn skip_past_end_is_eof() {
        let mut cursor = ByteCursor::new(&b"abc"[..]);
        assert!(matches!(
            cursor.skip(4, "data"),
            Err(Error::UnexpectedEof { offset: 0, .. })
        ));
    }

    #[test]
    fn text_keeps_high_bytes() -> Result<()> {
        let mut cursor = ByteCursor::new(&[0xE9, b' '][..]);
        let text = cursor.read_text(2, "text")?;
        assert_eq!(text.chars().map(u32::from).collect::<Vec<_>>(), vec![0xE9]);
        Ok(())
    }
}
