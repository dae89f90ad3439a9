use std::io::{Read, Write};

use bon::Builder;
use strum::{Display, EnumString, IntoStaticStr};
use tracing::debug;

use super::{read_encryption, write_encryption, Location, SegmentKind, Subheader};
use crate::{
    error::{Error, Result},
    file_type::FileType,
    reader::ByteCursor,
    security::SecurityMetadata,
    tre::{read_extension_section, write_extension_section, TreCollection, TreRegistry, TreSource},
    writer::FieldWriter,
};

/// `STYPE`
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, EnumString, IntoStaticStr, Display)]
pub enum SymbolType {
    /// `B`, bitmap
    #[strum(serialize = "B")]
    Bitmap,
    /// `C`, computer graphics metafile
    #[default]
    #[strum(serialize = "C")]
    Cgm,
    /// `O`, object
    #[strum(serialize = "O")]
    Object,
}

/// `SCOLOR` of a NITF 2.0 symbol
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, EnumString, IntoStaticStr, Display)]
pub enum SymbolColour {
    /// blank, used by CGM symbols
    #[default]
    #[strum(serialize = "")]
    NotApplicable,
    /// `C`
    #[strum(serialize = "C")]
    Colour,
    /// `G`
    #[strum(serialize = "G")]
    Grayscale,
    /// `M`
    #[strum(serialize = "M")]
    Monochrome,
}

/// NITF 2.0 symbol subheader fields
#[derive(Debug, Default, Clone, PartialEq, Builder)]
#[non_exhaustive]
pub struct SymbolSubheader {
    /// `SID`
    #[builder(default)]
    pub identifier: String,
    /// `SNAME`
    #[builder(default)]
    pub name: String,
    /// Classification block
    #[builder(default)]
    pub security: SecurityMetadata,
    /// `STYPE`
    #[builder(default)]
    pub symbol_type: SymbolType,
    /// `NLIPS`
    #[builder(default)]
    pub lines_per_symbol: u16,
    /// `NPIXPL`
    #[builder(default)]
    pub pixels_per_line: u16,
    /// `NWDTH`
    #[builder(default)]
    pub line_width: u16,
    /// `NBPP`
    #[builder(default)]
    pub bits_per_pixel: u8,
    /// `SDLVL`
    #[builder(default = 1)]
    pub display_level: u16,
    /// `SALVL`
    #[builder(default)]
    pub attachment_level: u16,
    /// `SLOC`
    #[builder(default)]
    pub location: Location,
    /// `SLOC2`
    #[builder(default)]
    pub second_location: Location,
    /// `SCOLOR`
    #[builder(default)]
    pub colour: SymbolColour,
    /// `SNUM`
    #[builder(default)]
    pub number: String,
    /// `SROT`
    #[builder(default)]
    pub rotation: u16,
    /// `SXSOFL`
    #[builder(default)]
    pub extended_overflow: u16,
    /// TREs from `SXSHD`, plus any merged from overflow segments
    #[builder(default)]
    pub tres: TreCollection,
}

impl Subheader for SymbolSubheader {
    const KIND: SegmentKind = SegmentKind::Symbol;

    fn parse<R: Read>(
        cursor: &mut ByteCursor<R>,
        file_type: FileType,
        registry: &TreRegistry,
    ) -> Result<Self> {
        cursor.verify_marker("SY")?;
        let identifier = cursor.read_text(10, "SID")?;
        let name = cursor.read_text(20, "SNAME")?;
        let security = SecurityMetadata::parse(cursor, file_type)?;
        read_encryption(cursor)?;
        let symbol_type = cursor.read_enum(1, "STYPE")?;
        let lines_per_symbol = cursor.read_number(4, "NLIPS")?;
        let pixels_per_line = cursor.read_number(4, "NPIXPL")?;
        let line_width = cursor.read_number(4, "NWDTH")?;
        let bits_per_pixel = cursor.read_number(1, "NBPP")?;
        let display_level = cursor.read_number(3, "SDLVL")?;
        let attachment_level = cursor.read_number(3, "SALVL")?;
        let location = Location::parse(cursor, "SLOC")?;
        let second_location = Location::parse(cursor, "SLOC2")?;
        let colour = cursor.read_enum(1, "SCOLOR")?;
        let number = cursor.read_text(6, "SNUM")?;
        let rotation = cursor.read_number(3, "SROT")?;
        let lut_entries: u16 = cursor.read_number(3, "NELUT")?;
        if lut_entries > 0 {
            return Err(Error::UnsupportedCombination(format!(
                "symbol {identifier:?} carries a {lut_entries} entry lookup table"
            )));
        }
        let mut tres = TreCollection::new();
        let extended_overflow = read_extension_section(
            cursor,
            "SXSHDL",
            "SXSOFL",
            TreSource::SymbolExtendedSubheaderData,
            registry,
            &mut tres,
        )?;
        debug!("symbol {identifier:?} ({symbol_type})");
        Ok(Self {
            identifier,
            name,
            security,
            symbol_type,
            lines_per_symbol,
            pixels_per_line,
            line_width,
            bits_per_pixel,
            display_level,
            attachment_level,
            location,
            second_location,
            colour,
            number,
            rotation,
            extended_overflow,
            tres,
        })
    }

    fn write<W: Write>(&self, w: &mut FieldWriter<W>, file_type: FileType) -> Result<()> {
        w.raw(b"SY")?;
        w.text(&self.identifier, 10, "SID")?;
        w.text(&self.name, 20, "SNAME")?;
        self.security.write(w, file_type)?;
        write_encryption(w)?;
        w.text(self.symbol_type.into(), 1, "STYPE")?;
        w.number(self.lines_per_symbol, 4, "NLIPS")?;
        w.number(self.pixels_per_line, 4, "NPIXPL")?;
        w.number(self.line_width, 4, "NWDTH")?;
        w.number(self.bits_per_pixel, 1, "NBPP")?;
        w.number(self.display_level, 3, "SDLVL")?;
        w.number(self.attachment_level, 3, "SALVL")?;
        self.location.write(w, "SLOC")?;
        self.second_location.write(w, "SLOC2")?;
        w.text(self.colour.into(), 1, "SCOLOR")?;
        w.text(&self.number, 6, "SNUM")?;
        w.number(self.rotation, 3, "SROT")?;
        w.number(0u8, 3, "NELUT")?;
        write_extension_section(
            w,
            &self.tres,
            TreSource::SymbolExtendedSubheaderData,
            self.extended_overflow,
            "SXSHDL",
            "SXSOFL",
        )
    }
}

#[cfg(test)]
pub(crate) mod test {
    use pretty_assertions::assert_eq;

    use super::{SymbolSubheader, SymbolType};
    use crate::{
        error::{Error, Result},
        file_type::FileType,
        reader::ByteCursor,
        segment::{test::round_trip, Subheader},
        tre::TreRegistry,
    };

    /// Blank NITF 2.0 security block
    pub(crate) fn security_20() -> String {
        format!("U{:166}", "")
    }

    fn symbol_subheader(nelut: &str) -> String {
        format!(
            "SY{:10}{:20}{}0C0000000000001001000{}{}{:1}{:6}000{nelut}00000",
            "SYM1",
            "arrow",
            security_20(),
            "0001000020",
            "0000000000",
            "",
            "000001"
        )
    }

    #[test]
    fn symbol_round_trips() -> Result<()> {
        let header: SymbolSubheader =
            round_trip(symbol_subheader("000").as_bytes(), FileType::Nitf20)?;
        assert_eq!(header.symbol_type, SymbolType::Cgm);
        assert_eq!(header.number, "000001");
        assert_eq!(header.location.column, 20);
        Ok(())
    }

    #[test]
    fn symbol_lookup_table_is_unsupported() {
        let bytes = symbol_subheader("002");
        let mut cursor = ByteCursor::new(bytes.as_bytes());
        assert!(matches!(
            SymbolSubheader::parse(&mut cursor, FileType::Nitf20, &TreRegistry::default()),
            Err(Error::UnsupportedCombination(_))
        ));
    }
}
