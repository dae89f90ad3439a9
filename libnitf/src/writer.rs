//! Fixed-width field encoding shared by every segment writer

use std::io::Write;

use crate::error::{Error, Result};

/// Writes fixed-width fields to an underlying writer
#[derive(Debug)]
pub struct FieldWriter<W> {
    inner: W,
    written: u64,
}

impl<W: Write> FieldWriter<W> {
    pub(crate) const fn new(inner: W) -> Self {
        Self { inner, written: 0 }
    }

    pub(crate) const fn written(&self) -> u64 {
        self.written
    }

    pub(crate) fn into_inner(self) -> W {
        self.inner
    }

    /// Writes raw bytes as-is
    pub(crate) fn raw(&mut self, bytes: &[u8]) -> Result<()> {
        self.inner.write_all(bytes)?;
        self.written += bytes.len() as u64;
        Ok(())
    }

    /// Writes `value` left-justified and space padded to `width`
    pub(crate) fn text(&mut self, value: &str, width: usize, field: &'static str) -> Result<()> {
        let mut bytes = encode_latin1(value, field, width)?;
        if bytes.len() > width {
            return Err(Error::FieldOverflow {
                field,
                value: value.to_owned(),
                width,
            });
        }
        bytes.resize(width, b' ');
        self.raw(&bytes)
    }

    /// Writes text whose length must already equal `width`
    pub(crate) fn exact(&mut self, value: &str, width: usize, field: &'static str) -> Result<()> {
        if value.chars().count() != width {
            return Err(Error::FieldOverflow {
                field,
                value: value.to_owned(),
                width,
            });
        }
        self.text(value, width, field)
    }

    /// Writes an unsigned number right-justified and zero padded to `width`
    pub(crate) fn number(
        &mut self,
        value: impl Into<u64>,
        width: usize,
        field: &'static str,
    ) -> Result<()> {
        let formatted = format!("{:0width$}", value.into());
        self.checked(formatted, width, field)
    }

    /// Writes a signed number zero padded to `width`, with a leading `-` when negative
    pub(crate) fn signed(&mut self, value: i32, width: usize, field: &'static str) -> Result<()> {
        let formatted = if value < 0 {
            format!("-{:0w$}", value.unsigned_abs(), w = width.saturating_sub(1))
        } else {
            format!("{value:0width$}")
        };
        self.checked(formatted, width, field)
    }

    fn checked(&mut self, formatted: String, width: usize, field: &'static str) -> Result<()> {
        if formatted.len() > width {
            return Err(Error::FieldOverflow {
                field,
                value: formatted,
                width,
            });
        }
        self.raw(formatted.as_bytes())
    }
}

fn encode_latin1(value: &str, field: &'static str, width: usize) -> Result<Vec<u8>> {
    value
        .chars()
        .map(u8::try_from)
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|_| Error::FieldOverflow {
            field,
            value: value.to_owned(),
            width,
        })
}
