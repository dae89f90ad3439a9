#![allow(clippy::module_name_repetitions)]

pub(crate) mod des;
pub(crate) mod graphic;
pub(crate) mod image;
pub(crate) mod label;
pub(crate) mod res;
pub(crate) mod symbol;
pub(crate) mod text;

use std::io::{Read, Write};

use strum::{Display, IntoStaticStr};

use crate::{
    error::{Error, Result},
    file_type::FileType,
    heap::Payload,
    reader::ByteCursor,
    tre::TreRegistry,
    writer::FieldWriter,
};

/// The segment types a file can carry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoStaticStr, Display)]
#[strum(serialize_all = "lowercase")]
pub enum SegmentKind {
    /// `IM`
    Image,
    /// `SY`, NITF 2.1
    Graphic,
    /// `SY`, NITF 2.0
    Symbol,
    /// `LA`, NITF 2.0
    Label,
    /// `TE`
    Text,
    /// `DE`
    #[strum(serialize = "data extension")]
    DataExtension,
    /// `RE`
    #[strum(serialize = "reserved extension")]
    ReservedExtension,
}

impl SegmentKind {
    /// Widths of the (subheader length, data length) pair in the file header table
    #[must_use]
    pub const fn length_widths(self) -> (usize, usize) {
        match self {
            Self::Image => (6, 10),
            Self::Graphic | Self::Symbol => (4, 6),
            Self::Label => (4, 3),
            Self::Text => (4, 5),
            Self::DataExtension => (4, 9),
            Self::ReservedExtension => (4, 7),
        }
    }
}

/// A fixed-field subheader that can be read from and written to a byte stream
pub(crate) trait Subheader: Sized {
    const KIND: SegmentKind;

    fn parse<R: Read>(
        cursor: &mut ByteCursor<R>,
        file_type: FileType,
        registry: &TreRegistry,
    ) -> Result<Self>;

    fn write<W: Write>(&self, w: &mut FieldWriter<W>, file_type: FileType) -> Result<()>;
}

/// One segment: its subheader and, when it was materialized, its data
#[derive(Debug)]
pub struct Segment<H> {
    header: H,
    payload: Option<Payload>,
}

impl<H> Segment<H> {
    /// Creates a new [`Segment`]
    pub fn new(header: H, payload: impl Into<Option<Payload>>) -> Self {
        Self {
            header,
            payload: payload.into(),
        }
    }

    /// The subheader
    #[must_use]
    pub const fn header(&self) -> &H {
        &self.header
    }

    pub(crate) fn header_mut(&mut self) -> &mut H {
        &mut self.header
    }

    /// The data, or [`None`] if it was skipped when the file was parsed
    #[must_use]
    pub const fn payload(&self) -> Option<&Payload> {
        self.payload.as_ref()
    }

    /// Reads the whole payload into memory
    ///
    /// # Errors
    ///
    /// Returns [`Error::PayloadUnavailable`] if the payload was skipped, or [`Error::Io`] if a
    /// spooled payload cannot be read
    pub fn data(&self) -> Result<Vec<u8>>
    where
        H: SegmentHeader,
    {
        self.payload
            .as_ref()
            .ok_or_else(|| Error::PayloadUnavailable(H::kind().into()))?
            .to_vec()
    }

    /// Drops the payload, removing any temporary file behind it
    pub fn release(&mut self) -> Option<Payload> {
        self.payload.take()
    }

    /// Splits the segment into subheader and payload
    pub fn into_parts(self) -> (H, Option<Payload>) {
        (self.header, self.payload)
    }
}

/// Public view of a subheader type
pub trait SegmentHeader {
    /// The segment type this subheader belongs to
    fn kind() -> SegmentKind;
}

impl<T: Subheader> SegmentHeader for T {
    fn kind() -> SegmentKind {
        T::KIND
    }
}

/// A row/column pair in the common coordinate system (`ILOC`, `SLOC`, `LLOC`, ...)
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Location {
    /// row offset
    pub row: i32,
    /// column offset
    pub column: i32,
}

impl Location {
    /// Creates a new [`Location`]
    #[must_use]
    pub const fn new(row: i32, column: i32) -> Self {
        Self { row, column }
    }

    pub(crate) fn parse<R: Read>(cursor: &mut ByteCursor<R>, field: &'static str) -> Result<Self> {
        Ok(Self {
            row: cursor.read_number(5, field)?,
            column: cursor.read_number(5, field)?,
        })
    }

    pub(crate) fn write<W: Write>(
        &self,
        w: &mut FieldWriter<W>,
        field: &'static str,
    ) -> Result<()> {
        w.signed(self.row, 5, field)?;
        w.signed(self.column, 5, field)
    }
}

/// `ENCRYP` is reserved and must be `0`
pub(crate) fn read_encryption<R: Read>(cursor: &mut ByteCursor<R>) -> Result<()> {
    let offset = cursor.offset();
    let value = cursor.read_text(1, "ENCRYP")?;
    if value != "0" {
        return Err(Error::InvalidEnumeratedValue {
            offset,
            field: "ENCRYP",
            value,
        });
    }
    Ok(())
}

pub(crate) fn write_encryption<W: Write>(w: &mut FieldWriter<W>) -> Result<()> {
    w.exact("0", 1, "ENCRYP")
}

#[cfg(test)]
pub(crate) mod test {
    use pretty_assertions::assert_eq;

    use super::{read_encryption, Location, SegmentKind, Subheader};
    use crate::{
        error::{Error, Result},
        file_type::FileType,
        reader::ByteCursor,
        tre::TreRegistry,
        writer::FieldWriter,
    };

    /// Parses `bytes` as `H`, checks every byte was consumed and that writing reproduces them
    pub(crate) fn round_trip<H: Subheader>(bytes: &[u8], file_type: FileType) -> Result<H> {
        let mut cursor = ByteCursor::new(bytes);
        let header = H::parse(&mut cursor, file_type, &TreRegistry::default())?;
        assert_eq!(cursor.offset(), bytes.len() as u64);
        let mut w = FieldWriter::new(Vec::new());
        header.write(&mut w, file_type)?;
        assert_eq!(
            String::from_utf8_lossy(&w.into_inner()),
            String::from_utf8_lossy(bytes)
        );
        Ok(header)
    }

    #[test]
    fn locations_are_signed() -> Result<()> {
        let mut cursor = ByteCursor::new(&b"-001200034"[..]);
        assert_eq!(Location::parse(&mut cursor, "ILOC")?, Location::new(-12, 34));
        let mut w = FieldWriter::new(Vec::new());
        Location::new(-12, 34).write(&mut w, "ILOC")?;
        assert_eq!(w.into_inner(), b"-001200034".to_vec());
        Ok(())
    }

    #[test]
    fn encryption_must_be_zero() {
        let mut cursor = ByteCursor::new(&b"1"[..]);
        assert!(matches!(
            read_encryption(&mut cursor),
            Err(Error::InvalidEnumeratedValue { field: "ENCRYP", .. })
        ));
    }

    #[test]
    fn kind_names() {
        assert_eq!(SegmentKind::DataExtension.to_string(), "data extension");
        assert_eq!(SegmentKind::Label.length_widths(), (4, 3));
    }
}
