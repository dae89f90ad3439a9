use std::io::{Read, Write};

use bon::Builder;
use strum::{Display, EnumString, IntoStaticStr};
use tracing::debug;

use super::{read_encryption, write_encryption, SegmentKind, Subheader};
use crate::{
    datetime::{NitfDateTime, DATE_TIME_WIDTH},
    error::Result,
    file_type::FileType,
    reader::ByteCursor,
    security::SecurityMetadata,
    tre::{read_extension_section, write_extension_section, TreCollection, TreRegistry, TreSource},
    writer::FieldWriter,
};

/// `TXTFMT`
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, EnumString, IntoStaticStr, Display)]
pub enum TextFormat {
    /// `STA`, basic character set
    #[default]
    #[strum(serialize = "STA")]
    Basic,
    /// `MTF`, USMTF message
    #[strum(serialize = "MTF")]
    MessageTextFormat,
    /// `UT1`, extended character set
    #[strum(serialize = "UT1")]
    Extended,
    /// `U8S`, UTF-8 subset
    #[strum(serialize = "U8S")]
    Utf8Subset,
}

/// Text subheader fields
#[derive(Debug, Default, Clone, PartialEq, Builder)]
#[non_exhaustive]
pub struct TextSubheader {
    /// `TEXTID`
    #[builder(default)]
    pub identifier: String,
    /// `TXTALVL`, NITF 2.1 only
    #[builder(default)]
    pub attachment_level: u16,
    /// `TXTDT`
    #[builder(default)]
    pub date_time: NitfDateTime,
    /// `TXTITL`
    #[builder(default)]
    pub title: String,
    /// Classification block
    #[builder(default)]
    pub security: SecurityMetadata,
    /// `TXTFMT`
    #[builder(default)]
    pub format: TextFormat,
    /// `TXSOFL`
    #[builder(default)]
    pub extended_overflow: u16,
    /// TREs from `TXSHD`, plus any merged from overflow segments
    #[builder(default)]
    pub tres: TreCollection,
}

impl Subheader for TextSubheader {
    const KIND: SegmentKind = SegmentKind::Text;

    fn parse<R: Read>(
        cursor: &mut ByteCursor<R>,
        file_type: FileType,
        registry: &TreRegistry,
    ) -> Result<Self> {
        cursor.verify_marker("TE")?;
        let (identifier, attachment_level) = if file_type.is_nitf20() {
            (cursor.read_text(10, "TEXTID")?, 0)
        } else {
            (
                cursor.read_text(7, "TEXTID")?,
                cursor.read_number(3, "TXTALVL")?,
            )
        };
        let date_time =
            NitfDateTime::parse(&cursor.read_text(DATE_TIME_WIDTH, "TXTDT")?, file_type);
        let title = cursor.read_text(80, "TXTITL")?;
        let security = SecurityMetadata::parse(cursor, file_type)?;
        read_encryption(cursor)?;
        let format = cursor.read_enum(3, "TXTFMT")?;
        let mut tres = TreCollection::new();
        let extended_overflow = read_extension_section(
            cursor,
            "TXSHDL",
            "TXSOFL",
            TreSource::TextExtendedSubheaderData,
            registry,
            &mut tres,
        )?;
        debug!("text {identifier:?} ({format})");
        Ok(Self {
            identifier,
            attachment_level,
            date_time,
            title,
            security,
            format,
            extended_overflow,
            tres,
        })
    }

    fn write<W: Write>(&self, w: &mut FieldWriter<W>, file_type: FileType) -> Result<()> {
        w.raw(b"TE")?;
        if file_type.is_nitf20() {
            w.text(&self.identifier, 10, "TEXTID")?;
        } else {
            w.text(&self.identifier, 7, "TEXTID")?;
            w.number(self.attachment_level, 3, "TXTALVL")?;
        }
        w.text(self.date_time.source(), DATE_TIME_WIDTH, "TXTDT")?;
        w.text(&self.title, 80, "TXTITL")?;
        self.security.write(w, file_type)?;
        write_encryption(w)?;
        w.text(self.format.into(), 3, "TXTFMT")?;
        write_extension_section(
            w,
            &self.tres,
            TreSource::TextExtendedSubheaderData,
            self.extended_overflow,
            "TXSHDL",
            "TXSOFL",
        )
    }
}
