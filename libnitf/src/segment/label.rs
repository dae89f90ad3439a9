use std::io::{Read, Write};

use bon::Builder;
use tracing::debug;

use super::{read_encryption, write_encryption, Location, SegmentKind, Subheader};
use crate::{
    error::Result,
    file_type::FileType,
    reader::ByteCursor,
    security::SecurityMetadata,
    tre::{read_extension_section, write_extension_section, TreCollection, TreRegistry, TreSource},
    writer::FieldWriter,
};

/// NITF 2.0 label subheader fields
#[derive(Debug, Default, Clone, PartialEq, Builder)]
#[non_exhaustive]
pub struct LabelSubheader {
    /// `LID`
    #[builder(default)]
    pub identifier: String,
    /// Classification block
    #[builder(default)]
    pub security: SecurityMetadata,
    /// `LFS`
    #[builder(default)]
    pub font_style: String,
    /// `LCW`
    #[builder(default)]
    pub cell_width: u8,
    /// `LCH`
    #[builder(default)]
    pub cell_height: u8,
    /// `LDLVL`
    #[builder(default = 1)]
    pub display_level: u16,
    /// `LALVL`
    #[builder(default)]
    pub attachment_level: u16,
    /// `LLOC`
    #[builder(default)]
    pub location: Location,
    /// `LTC`, red/green/blue
    #[builder(default)]
    pub text_colour: [u8; 3],
    /// `LBC`, red/green/blue
    #[builder(default)]
    pub background_colour: [u8; 3],
    /// `LXSOFL`
    #[builder(default)]
    pub extended_overflow: u16,
    /// TREs from `LXSHD`, plus any merged from overflow segments
    #[builder(default)]
    pub tres: TreCollection,
}

impl Subheader for LabelSubheader {
    const KIND: SegmentKind = SegmentKind::Label;

    fn parse<R: Read>(
        cursor: &mut ByteCursor<R>,
        file_type: FileType,
        registry: &TreRegistry,
    ) -> Result<Self> {
        cursor.verify_marker("LA")?;
        let identifier = cursor.read_text(10, "LID")?;
        let security = SecurityMetadata::parse(cursor, file_type)?;
        read_encryption(cursor)?;
        let font_style = cursor.read_text(1, "LFS")?;
        let cell_width = cursor.read_number(2, "LCW")?;
        let cell_height = cursor.read_number(2, "LCH")?;
        let display_level = cursor.read_number(3, "LDLVL")?;
        let attachment_level = cursor.read_number(3, "LALVL")?;
        let location = Location::parse(cursor, "LLOC")?;
        let text_colour = cursor.read_array::<3>("LTC")?;
        let background_colour = cursor.read_array::<3>("LBC")?;
        let mut tres = TreCollection::new();
        let extended_overflow = read_extension_section(
            cursor,
            "LXSHDL",
            "LXSOFL",
            TreSource::LabelExtendedSubheaderData,
            registry,
            &mut tres,
        )?;
        debug!("label {identifier:?}");
        Ok(Self {
            identifier,
            security,
            font_style,
            cell_width,
            cell_height,
            display_level,
            attachment_level,
            location,
            text_colour,
            background_colour,
            extended_overflow,
            tres,
        })
    }

    fn write<W: Write>(&self, w: &mut FieldWriter<W>, file_type: FileType) -> Result<()> {
        w.raw(b"LA")?;
        w.text(&self.identifier, 10, "LID")?;
        self.security.write(w, file_type)?;
        write_encryption(w)?;
        w.text(&self.font_style, 1, "LFS")?;
        w.number(self.cell_width, 2, "LCW")?;
        w.number(self.cell_height, 2, "LCH")?;
        w.number(self.display_level, 3, "LDLVL")?;
        w.number(self.attachment_level, 3, "LALVL")?;
        self.location.write(w, "LLOC")?;
        w.raw(&self.text_colour)?;
        w.raw(&self.background_colour)?;
        write_extension_section(
            w,
            &self.tres,
            TreSource::LabelExtendedSubheaderData,
            self.extended_overflow,
            "LXSHDL",
            "LXSOFL",
        )
    }
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use super::LabelSubheader;
    use crate::{
        error::Result,
        file_type::FileType,
        segment::{symbol::test::security_20, test::round_trip},
    };

    #[test]
    fn label_round_trips() -> Result<()> {
        let mut bytes = format!("LA{:10}{}0 0000001000", "LABEL1", security_20()).into_bytes();
        bytes.extend_from_slice(b"0000500006");
        bytes.extend_from_slice(&[0xFF, 0x00, 0x00, 0x00, 0x00, 0xFF]);
        bytes.extend_from_slice(b"00000");
        let header: LabelSubheader = round_trip(&bytes, FileType::Nitf20)?;
        assert_eq!(header.text_colour, [0xFF, 0, 0]);
        assert_eq!(header.background_colour, [0, 0, 0xFF]);
        assert_eq!(header.location.row, 5);
        Ok(())
    }
}
