//! The file header: identification, file security and the segment length tables

use std::io::{Read, Write};

use bon::Builder;
use tracing::{debug, instrument};

use crate::{
    datetime::{NitfDateTime, DATE_TIME_WIDTH},
    error::{Error, Result},
    file_type::FileType,
    reader::ByteCursor,
    security::FileSecurityMetadata,
    segment::{read_encryption, write_encryption, SegmentKind},
    tre::{read_extension_section, write_extension_section, TreCollection, TreRegistry, TreSource},
    writer::FieldWriter,
};

/// `FL` value used by streaming writers that did not know the final length
pub const STREAMING_FILE_LENGTH: u64 = 999_999_999_999;

/// File header fields
///
/// `FL`, `HL` and the length tables are not stored here: they are checked while reading and
/// recomputed while writing.
#[derive(Debug, Clone, PartialEq, Builder)]
#[non_exhaustive]
pub struct FileHeader {
    /// `FHDR` + `FVER`
    #[builder(default = FileType::Nitf21)]
    pub file_type: FileType,
    /// `CLEVEL`
    #[builder(default = 3)]
    pub complexity_level: u8,
    /// `STYPE`
    #[builder(default = "BF01".to_owned(), into)]
    pub standard_type: String,
    /// `OSTAID`
    #[builder(default, into)]
    pub originating_station: String,
    /// `FDT`
    #[builder(default)]
    pub date_time: NitfDateTime,
    /// `FTITLE`
    #[builder(default, into)]
    pub title: String,
    /// Classification block with `FSCOP` / `FSCPYS`
    #[builder(default)]
    pub security: FileSecurityMetadata,
    /// `FBKGC`, NITF 2.1 only
    #[builder(default)]
    pub background_colour: [u8; 3],
    /// `ONAME`
    #[builder(default, into)]
    pub originator_name: String,
    /// `OPHONE`
    #[builder(default, into)]
    pub originator_phone: String,
    /// `UDHOFL`
    #[builder(default)]
    pub user_defined_overflow: u16,
    /// `XHDLOFL`
    #[builder(default)]
    pub extended_overflow: u16,
    /// TREs from `UDHD` and `XHD`, plus any merged from overflow segments
    #[builder(default)]
    pub tres: TreCollection,
}

/// Declared (subheader, data) length of one segment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) struct SegmentLengths {
    pub subheader: u64,
    pub data: u64,
}

/// The length-bearing fields of a file header
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub(crate) struct Layout {
    pub file_length: u64,
    pub header_length: u64,
    pub images: Vec<SegmentLengths>,
    /// graphics in 2.1, symbols in 2.0
    pub graphics: Vec<SegmentLengths>,
    /// 2.0 only
    pub labels: Vec<SegmentLengths>,
    pub texts: Vec<SegmentLengths>,
    pub data_extensions: Vec<SegmentLengths>,
    pub reserved_extensions: Vec<SegmentLengths>,
}

impl Layout {
    /// Sum of every declared subheader and data length
    pub(crate) fn segments_length(&self) -> u64 {
        [
            &self.images,
            &self.graphics,
            &self.labels,
            &self.texts,
            &self.data_extensions,
            &self.reserved_extensions,
        ]
        .into_iter()
        .flatten()
        .map(|l| l.subheader + l.data)
        .sum()
    }
}

// (count, subheader length, data length) field names of a length table
const fn table_fields(kind: SegmentKind) -> (&'static str, &'static str, &'static str) {
    match kind {
        SegmentKind::Image => ("NUMI", "LISH", "LI"),
        SegmentKind::Graphic | SegmentKind::Symbol => ("NUMS", "LSSH", "LS"),
        SegmentKind::Label => ("NUML", "LLSH", "LL"),
        SegmentKind::Text => ("NUMT", "LTSH", "LT"),
        SegmentKind::DataExtension => ("NUMDES", "LDSH", "LD"),
        SegmentKind::ReservedExtension => ("NUMRES", "LRESH", "LRE"),
    }
}

fn read_table<R: Read>(
    cursor: &mut ByteCursor<R>,
    kind: SegmentKind,
) -> Result<Vec<SegmentLengths>> {
    let (count_field, subheader_field, data_field) = table_fields(kind);
    let (subheader_width, data_width) = kind.length_widths();
    let count: usize = cursor.read_number(3, count_field)?;
    (0..count)
        .map(|_| {
            Ok(SegmentLengths {
                subheader: cursor.read_number(subheader_width, subheader_field)?,
                data: cursor.read_number(data_width, data_field)?,
            })
        })
        .collect()
}

fn write_table<W: Write>(
    w: &mut FieldWriter<W>,
    kind: SegmentKind,
    lengths: &[SegmentLengths],
) -> Result<()> {
    let (count_field, subheader_field, data_field) = table_fields(kind);
    let (subheader_width, data_width) = kind.length_widths();
    w.number(lengths.len() as u64, 3, count_field)?;
    for l in lengths {
        w.number(l.subheader, subheader_width, subheader_field)?;
        w.number(l.data, data_width, data_field)?;
    }
    Ok(())
}

impl FileHeader {
    /// Name width of `ONAME`, which grew by three bytes when `FBKGC` was dropped in 2.0
    const fn originator_name_width(file_type: FileType) -> usize {
        if file_type.is_nitf20() {
            27
        } else {
            24
        }
    }

    #[instrument(skip(cursor, registry), level = "trace")]
    pub(crate) fn parse<R: Read>(
        cursor: &mut ByteCursor<R>,
        registry: &TreRegistry,
    ) -> Result<(Self, Layout)> {
        let start = cursor.offset();
        let version = cursor.read_text_untrimmed(9, "FHDR")?;
        let file_type: FileType = version
            .parse()
            .map_err(|_| Error::UnsupportedVersion(version.clone()))?;
        debug!("file type {file_type}");
        let complexity_level = cursor.read_number(2, "CLEVEL")?;
        let standard_type = cursor.read_text(4, "STYPE")?;
        let originating_station = cursor.read_text(10, "OSTAID")?;
        let date_time = NitfDateTime::parse(&cursor.read_text(DATE_TIME_WIDTH, "FDT")?, file_type);
        let title = cursor.read_text(80, "FTITLE")?;
        let security = FileSecurityMetadata::parse(cursor, file_type)?;
        read_encryption(cursor)?;
        let background_colour = if file_type.is_nitf20() {
            [0; 3]
        } else {
            cursor.read_array::<3>("FBKGC")?
        };
        let originator_name = cursor.read_text(Self::originator_name_width(file_type), "ONAME")?;
        let originator_phone = cursor.read_text(18, "OPHONE")?;
        let file_length = cursor.read_number(12, "FL")?;
        let header_length = cursor.read_number(6, "HL")?;

        let images = read_table(cursor, SegmentKind::Image)?;
        let (graphics, labels) = if file_type.is_nitf20() {
            (
                read_table(cursor, SegmentKind::Symbol)?,
                read_table(cursor, SegmentKind::Label)?,
            )
        } else {
            let graphics = read_table(cursor, SegmentKind::Graphic)?;
            let _reserved: u16 = cursor.read_number(3, "NUMX")?;
            (graphics, Vec::new())
        };
        let texts = read_table(cursor, SegmentKind::Text)?;
        let data_extensions = read_table(cursor, SegmentKind::DataExtension)?;
        let reserved_extensions = read_table(cursor, SegmentKind::ReservedExtension)?;

        let mut tres = TreCollection::new();
        let user_defined_overflow = read_extension_section(
            cursor,
            "UDHDL",
            "UDHOFL",
            TreSource::UserDefinedHeaderData,
            registry,
            &mut tres,
        )?;
        let extended_overflow = read_extension_section(
            cursor,
            "XHDL",
            "XHDLOFL",
            TreSource::ExtendedHeaderData,
            registry,
            &mut tres,
        )?;

        let consumed = cursor.offset() - start;
        if consumed != header_length {
            return Err(Error::length_mismatch(start, "HL", header_length, consumed));
        }

        let header = Self {
            file_type,
            complexity_level,
            standard_type,
            originating_station,
            date_time,
            title,
            security,
            background_colour,
            originator_name,
            originator_phone,
            user_defined_overflow,
            extended_overflow,
            tres,
        };
        let layout = Layout {
            file_length,
            header_length,
            images,
            graphics,
            labels,
            texts,
            data_extensions,
            reserved_extensions,
        };
        debug!(
            "{} images, {} graphics/symbols, {} labels, {} texts, {} DES, {} RES",
            layout.images.len(),
            layout.graphics.len(),
            layout.labels.len(),
            layout.texts.len(),
            layout.data_extensions.len(),
            layout.reserved_extensions.len()
        );
        Ok((header, layout))
    }

    pub(crate) fn write<W: Write>(&self, w: &mut FieldWriter<W>, layout: &Layout) -> Result<()> {
        let file_type = self.file_type;
        w.raw(file_type.as_str().as_bytes())?;
        w.number(self.complexity_level, 2, "CLEVEL")?;
        w.text(&self.standard_type, 4, "STYPE")?;
        w.text(&self.originating_station, 10, "OSTAID")?;
        w.text(self.date_time.source(), DATE_TIME_WIDTH, "FDT")?;
        w.text(&self.title, 80, "FTITLE")?;
        self.security.write(w, file_type)?;
        write_encryption(w)?;
        if !file_type.is_nitf20() {
            w.raw(&self.background_colour)?;
        }
        w.text(
            &self.originator_name,
            Self::originator_name_width(file_type),
            "ONAME",
        )?;
        w.text(&self.originator_phone, 18, "OPHONE")?;
        w.number(layout.file_length, 12, "FL")?;
        w.number(layout.header_length, 6, "HL")?;

        write_table(w, SegmentKind::Image, &layout.images)?;
        if file_type.is_nitf20() {
            write_table(w, SegmentKind::Symbol, &layout.graphics)?;
            write_table(w, SegmentKind::Label, &layout.labels)?;
        } else {
            write_table(w, SegmentKind::Graphic, &layout.graphics)?;
            w.number(0u8, 3, "NUMX")?;
        }
        write_table(w, SegmentKind::Text, &layout.texts)?;
        write_table(w, SegmentKind::DataExtension, &layout.data_extensions)?;
        write_table(w, SegmentKind::ReservedExtension, &layout.reserved_extensions)?;

        write_extension_section(
            w,
            &self.tres,
            TreSource::UserDefinedHeaderData,
            self.user_defined_overflow,
            "UDHDL",
            "UDHOFL",
        )?;
        write_extension_section(
            w,
            &self.tres,
            TreSource::ExtendedHeaderData,
            self.extended_overflow,
            "XHDL",
            "XHDLOFL",
        )
    }
}

#[cfg(test)]
pub(crate) mod test {
    use pretty_assertions::assert_eq;

    use super::{FileHeader, Layout, SegmentLengths};
    use crate::{
        error::{Error, Result},
        file_type::FileType,
        reader::ByteCursor,
        segment::{image::test::SECURITY_21, symbol::test::security_20},
        tre::TreRegistry,
        writer::FieldWriter,
    };

    /// A NITF 2.1 file header, everything up to `FL`
    pub(crate) fn header_prefix_21() -> String {
        format!(
            "NITF02.1003BF01{:10}20240102030405{:80}{SECURITY_21}00000000010\0\0\0{:24}{:18}",
            "STATION", "title", "originator", "555 0100"
        )
    }

    fn parse(bytes: &[u8]) -> Result<(FileHeader, Layout)> {
        let mut cursor = ByteCursor::new(bytes);
        let parsed = FileHeader::parse(&mut cursor, &TreRegistry::default())?;
        assert_eq!(cursor.offset(), bytes.len() as u64);
        Ok(parsed)
    }

    fn rewrite(header: &FileHeader, layout: &Layout) -> Result<Vec<u8>> {
        let mut w = FieldWriter::new(Vec::new());
        header.write(&mut w, layout)?;
        Ok(w.into_inner())
    }

    #[test]
    fn nitf21_header_round_trips() -> Result<()> {
        let prefix = header_prefix_21();
        // one image, one text, no TREs
        let length = prefix.len() + 12 + 6 + 3 + 16 + 3 + 3 + 3 + 9 + 3 + 3 + 5 + 5;
        let tables = ["001", "000439", "0000001024", "000", "000", "001", "0100", "00004", "000"];
        let bytes = format!(
            "{prefix}{:012}{length:06}{}000{}",
            length + 439 + 1024 + 100 + 4,
            tables.concat(),
            "0000000000"
        );
        let (header, layout) = parse(bytes.as_bytes())?;
        assert_eq!(header.file_type, FileType::Nitf21);
        assert_eq!(header.originator_name, "originator");
        assert_eq!(
            layout.images,
            vec![SegmentLengths {
                subheader: 439,
                data: 1024
            }]
        );
        assert_eq!(layout.texts[0].data, 4);
        assert_eq!(layout.segments_length(), 439 + 1024 + 100 + 4);
        assert_eq!(rewrite(&header, &layout)?, bytes.as_bytes());
        Ok(())
    }

    #[test]
    fn nitf20_header_has_symbols_and_labels() -> Result<()> {
        let prefix = format!(
            "NITF02.0001BF01{:10}02030405ZJAN24{:80}{}00000000000{:27}{:18}",
            "STATION",
            "title",
            security_20(),
            "originator",
            ""
        );
        let length = prefix.len() + 12 + 6 + 3 + 3 + (3 + 7) + 3 + 3 + 3 + 5 + 5;
        let tables = ["000", "000", "001", "0009", "002", "000", "000", "000"];
        let bytes = format!(
            "{prefix}{:012}{length:06}{}{}",
            length + 9 + 2,
            tables.concat(),
            "0000000000"
        );
        let (header, layout) = parse(bytes.as_bytes())?;
        assert_eq!(header.file_type, FileType::Nitf20);
        assert!(layout.graphics.is_empty());
        assert_eq!(
            layout.labels,
            vec![SegmentLengths {
                subheader: 9,
                data: 2
            }]
        );
        assert_eq!(rewrite(&header, &layout)?, bytes.as_bytes());
        Ok(())
    }

    #[test]
    fn header_length_is_checked() {
        let prefix = header_prefix_21();
        let bytes = format!("{prefix}{:012}{:06}{:0>28}", 0, 1, "");
        let mut cursor = ByteCursor::new(bytes.as_bytes());
        assert!(matches!(
            FileHeader::parse(&mut cursor, &TreRegistry::default()),
            Err(Error::LengthMismatch { declared: 1, .. })
        ));
    }

    #[test]
    fn unknown_version_is_rejected() {
        let bytes = header_prefix_21().replacen("NITF02.10", "NITF03.00", 1);
        let mut cursor = ByteCursor::new(bytes.as_bytes());
        assert!(matches!(
            FileHeader::parse(&mut cursor, &TreRegistry::default()),
            Err(Error::UnsupportedVersion(v)) if v == "NITF03.00"
        ));
    }
}
