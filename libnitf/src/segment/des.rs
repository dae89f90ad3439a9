use std::io::{Read, Write};

use bon::Builder;
use strum::{Display, EnumString, IntoStaticStr};
use tracing::debug;

use super::{SegmentKind, Subheader};
use crate::{
    error::{Error, Result},
    file_type::FileType,
    reader::ByteCursor,
    security::SecurityMetadata,
    tre::{TreCollection, TreRegistry},
    writer::FieldWriter,
};

/// `DESID` of a TRE overflow segment in NITF 2.1 and NSIF
pub const TRE_OVERFLOW: &str = "TRE_OVERFLOW";
/// `DESID` of a registered TRE overflow segment in NITF 2.0
pub const REGISTERED_EXTENSIONS: &str = "Registered Extensions";
/// `DESID` of a controlled TRE overflow segment in NITF 2.0
pub const CONTROLLED_EXTENSIONS: &str = "Controlled Extensions";

/// `DESOFLW`, the subheader section whose TREs overflowed into a DES
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, IntoStaticStr, Display)]
pub enum OverflowSection {
    /// file header user defined data
    #[strum(serialize = "UDHD")]
    UserDefinedHeaderData,
    /// file header extended data
    #[strum(serialize = "XHD")]
    ExtendedHeaderData,
    /// image user defined data
    #[strum(serialize = "UDID")]
    UserDefinedImageData,
    /// image extended subheader data
    #[strum(serialize = "IXSHD")]
    ImageExtendedSubheaderData,
    /// graphic (2.1) or symbol (2.0) extended subheader data
    #[strum(serialize = "SXSHD")]
    GraphicExtendedSubheaderData,
    /// label extended subheader data
    #[strum(serialize = "LXSHD")]
    LabelExtendedSubheaderData,
    /// text extended subheader data
    #[strum(serialize = "TXSHD")]
    TextExtendedSubheaderData,
}

/// Where an overflow DES sends its TREs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TreOverflow {
    /// `DESOFLW`
    pub section: OverflowSection,
    /// `DESITEM`, 1-based index of the target segment, `0` for the file header
    pub item: u16,
}

/// Whether `identifier` marks a TRE overflow segment in `file_type`
#[must_use]
pub fn is_overflow_identifier(identifier: &str, file_type: FileType) -> bool {
    if file_type.is_nitf20() {
        identifier == REGISTERED_EXTENSIONS || identifier == CONTROLLED_EXTENSIONS
    } else {
        identifier == TRE_OVERFLOW
    }
}

/// Data extension subheader fields
///
/// The TREs of an overflow segment are its data: they are read into [`Self::tres`] instead of a
/// payload, and a copy is merged into the target subheader.
#[derive(Debug, Default, Clone, PartialEq, Builder)]
#[non_exhaustive]
pub struct DataExtensionSubheader {
    /// `DESID`
    #[builder(into)]
    pub identifier: String,
    /// `DESVER`
    #[builder(default = 1)]
    pub version: u8,
    /// Classification block
    #[builder(default)]
    pub security: SecurityMetadata,
    /// `DESOFLW` / `DESITEM`, present on overflow segments only
    pub overflow: Option<TreOverflow>,
    /// `DESSHF`, kept as raw bytes
    #[builder(default)]
    pub user_defined: Vec<u8>,
    /// TREs carried as the data of an overflow segment
    #[builder(default)]
    pub tres: TreCollection,
}

impl DataExtensionSubheader {
    /// Whether this segment carries overflowed TREs
    #[must_use]
    pub const fn is_tre_overflow(&self) -> bool {
        self.overflow.is_some()
    }
}

impl Subheader for DataExtensionSubheader {
    const KIND: SegmentKind = SegmentKind::DataExtension;

    fn parse<R: Read>(
        cursor: &mut ByteCursor<R>,
        file_type: FileType,
        _registry: &TreRegistry,
    ) -> Result<Self> {
        cursor.verify_marker("DE")?;
        let identifier = cursor.read_text(25, "DESID")?;
        let version = cursor.read_number(2, "DESVER")?;
        let security = SecurityMetadata::parse(cursor, file_type)?;
        let overflow = if is_overflow_identifier(&identifier, file_type) {
            Some(TreOverflow {
                section: cursor.read_enum(6, "DESOFLW")?,
                item: cursor.read_number(3, "DESITEM")?,
            })
        } else {
            None
        };
        let user_defined_length = cursor.read_number(4, "DESSHL")?;
        let user_defined = cursor.read_raw(user_defined_length, "DESSHF")?;
        debug!("data extension {identifier:?} (overflow {overflow:?})");
        Ok(Self {
            identifier,
            version,
            security,
            overflow,
            user_defined,
            tres: TreCollection::new(),
        })
    }

    fn write<W: Write>(&self, w: &mut FieldWriter<W>, file_type: FileType) -> Result<()> {
        if is_overflow_identifier(&self.identifier, file_type) != self.overflow.is_some() {
            return Err(Error::UnsupportedCombination(format!(
                "DESID {:?} does not agree with the overflow fields {:?}",
                self.identifier, self.overflow
            )));
        }
        w.raw(b"DE")?;
        w.text(&self.identifier, 25, "DESID")?;
        w.number(self.version, 2, "DESVER")?;
        self.security.write(w, file_type)?;
        if let Some(overflow) = &self.overflow {
            w.text(overflow.section.into(), 6, "DESOFLW")?;
            w.number(overflow.item, 3, "DESITEM")?;
        }
        w.number(self.user_defined.len() as u64, 4, "DESSHL")?;
        w.raw(&self.user_defined)
    }
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use super::{DataExtensionSubheader, OverflowSection, TreOverflow};
    use crate::{
        error::{Error, Result},
        file_type::FileType,
        segment::{image::test::SECURITY_21, symbol::test::security_20, test::round_trip, Subheader},
        writer::FieldWriter,
    };

    #[test]
    fn opaque_des_keeps_user_defined_fields() -> Result<()> {
        let bytes = format!("DE{:25}01{SECURITY_21}0004abcd", "VENDOR_DATA");
        let header: DataExtensionSubheader = round_trip(bytes.as_bytes(), FileType::Nitf21)?;
        assert_eq!(header.overflow, None);
        assert_eq!(header.user_defined, b"abcd");
        Ok(())
    }

    #[test]
    fn overflow_identifier_depends_on_version() -> Result<()> {
        let nitf21 = format!("DE{:25}01{SECURITY_21}IXSHD 0020000", "TRE_OVERFLOW");
        let header: DataExtensionSubheader = round_trip(nitf21.as_bytes(), FileType::Nitf21)?;
        assert_eq!(
            header.overflow,
            Some(TreOverflow {
                section: OverflowSection::ImageExtendedSubheaderData,
                item: 2
            })
        );

        let nitf20 = format!("DE{:25}01{}UDHD  0000000", "Controlled Extensions", security_20());
        let header: DataExtensionSubheader = round_trip(nitf20.as_bytes(), FileType::Nitf20)?;
        assert_eq!(header.overflow.map(|o| o.item), Some(0));
        Ok(())
    }

    #[test]
    fn overflow_fields_must_match_identifier() {
        let header = DataExtensionSubheader::builder()
            .identifier("TRE_OVERFLOW")
            .build();
        let mut w = FieldWriter::new(Vec::new());
        assert!(matches!(
            header.write(&mut w, FileType::Nitf21),
            Err(Error::UnsupportedCombination(_))
        ));
    }
}
