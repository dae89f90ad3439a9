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

const SFMT_CGM: &str = "C";
const SSTRUCT: &str = "0000000000000";
const SRES: &str = "00";

/// `SCOLOR`
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, EnumString, IntoStaticStr, Display)]
pub enum GraphicColour {
    /// `C`, the graphic uses colour
    #[default]
    #[strum(serialize = "C")]
    Colour,
    /// `M`, monochrome
    #[strum(serialize = "M")]
    Monochrome,
}

/// NITF 2.1 graphic subheader fields
#[derive(Debug, Default, Clone, PartialEq, Builder)]
#[non_exhaustive]
pub struct GraphicSubheader {
    /// `SID`
    #[builder(default)]
    pub identifier: String,
    /// `SNAME`
    #[builder(default)]
    pub name: String,
    /// Classification block
    #[builder(default)]
    pub security: SecurityMetadata,
    /// `SDLVL`
    #[builder(default = 1)]
    pub display_level: u16,
    /// `SALVL`
    #[builder(default)]
    pub attachment_level: u16,
    /// `SLOC`
    #[builder(default)]
    pub location: Location,
    /// `SBND1`
    #[builder(default)]
    pub first_bound: Location,
    /// `SCOLOR`
    #[builder(default)]
    pub colour: GraphicColour,
    /// `SBND2`
    #[builder(default)]
    pub second_bound: Location,
    /// `SXSOFL`
    #[builder(default)]
    pub extended_overflow: u16,
    /// TREs from `SXSHD`, plus any merged from overflow segments
    #[builder(default)]
    pub tres: TreCollection,
}

fn read_constant<R: Read>(
    cursor: &mut ByteCursor<R>,
    expected: &str,
    field: &'static str,
) -> Result<()> {
    let offset = cursor.offset();
    let value = cursor.read_text_untrimmed(expected.len(), field)?;
    if value != expected {
        return Err(Error::InvalidEnumeratedValue {
            offset,
            field,
            value,
        });
    }
    Ok(())
}

impl Subheader for GraphicSubheader {
    const KIND: SegmentKind = SegmentKind::Graphic;

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
        read_constant(cursor, SFMT_CGM, "SFMT")?;
        read_constant(cursor, SSTRUCT, "SSTRUCT")?;
        let display_level = cursor.read_number(3, "SDLVL")?;
        let attachment_level = cursor.read_number(3, "SALVL")?;
        let location = Location::parse(cursor, "SLOC")?;
        let first_bound = Location::parse(cursor, "SBND1")?;
        let colour = cursor.read_enum(1, "SCOLOR")?;
        let second_bound = Location::parse(cursor, "SBND2")?;
        read_constant(cursor, SRES, "SRES")?;
        let mut tres = TreCollection::new();
        let extended_overflow = read_extension_section(
            cursor,
            "SXSHDL",
            "SXSOFL",
            TreSource::GraphicExtendedSubheaderData,
            registry,
            &mut tres,
        )?;
        debug!("graphic {identifier:?} ({} TREs)", tres.len());
        Ok(Self {
            identifier,
            name,
            security,
            display_level,
            attachment_level,
            location,
            first_bound,
            colour,
            second_bound,
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
        w.raw(SFMT_CGM.as_bytes())?;
        w.raw(SSTRUCT.as_bytes())?;
        w.number(self.display_level, 3, "SDLVL")?;
        w.number(self.attachment_level, 3, "SALVL")?;
        self.location.write(w, "SLOC")?;
        self.first_bound.write(w, "SBND1")?;
        w.text(self.colour.into(), 1, "SCOLOR")?;
        self.second_bound.write(w, "SBND2")?;
        w.raw(SRES.as_bytes())?;
        write_extension_section(
            w,
            &self.tres,
            TreSource::GraphicExtendedSubheaderData,
            self.extended_overflow,
            "SXSHDL",
            "SXSOFL",
        )
    }
}

#[cfg(test)]
pub(crate) mod test {
    use pretty_assertions::assert_eq;

    use super::{GraphicColour, GraphicSubheader};
    use crate::{
        error::{Error, Result},
        file_type::FileType,
        reader::ByteCursor,
        segment::{image::test::SECURITY_21, test::round_trip, Location, Subheader},
        tre::TreRegistry,
    };

    /// A graphic subheader with the given `SXSHDL` section
    pub(crate) fn graphic_subheader(sxshd: &str) -> String {
        format!(
            "SY{:10}{:20}{SECURITY_21}0C0000000000000001000{}{}C{}00{sxshd}",
            "0000000001", "lines", "00010-0020", "0000000100", "0010000100"
        )
    }

    #[test]
    fn graphic_with_blocka_round_trips() -> Result<()> {
        let blocka = format!("BLOCKA00123{:123}", "01     00512");
        let sxshd = format!("{:05}000{blocka}", blocka.len() + 3);
        let bytes = graphic_subheader(&sxshd);
        let header: GraphicSubheader = round_trip(bytes.as_bytes(), FileType::Nitf21)?;
        assert_eq!(header.location, Location::new(10, -20));
        assert_eq!(header.colour, GraphicColour::Colour);
        let tre = header.tres.iter().next().unwrap();
        assert_eq!(tre.name(), "BLOCKA");
        let group = tre.group().unwrap();
        assert_eq!(group.int_value("BLOCK_INSTANCE")?, 1);
        assert_eq!(group.int_value("L_LINES")?, 512);
        Ok(())
    }

    #[test]
    fn wrong_format_is_rejected() {
        let bytes = graphic_subheader("00000").replacen("0C000", "0X000", 1);
        let mut cursor = ByteCursor::new(bytes.as_bytes());
        assert!(matches!(
            GraphicSubheader::parse(&mut cursor, FileType::Nitf21, &TreRegistry::default()),
            Err(Error::InvalidEnumeratedValue { field: "SFMT", .. })
        ));
    }
}
