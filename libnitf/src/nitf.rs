use std::{
    fs::File,
    io::{BufReader, BufWriter, Read, Write},
    path::Path,
};

use tracing::{debug, info, instrument, warn};

use crate::{
    error::{Error, Result},
    file_type::FileType,
    header::{FileHeader, Layout, SegmentLengths, STREAMING_FILE_LENGTH},
    heap::Payload,
    options::ParseOptions,
    reader::ByteCursor,
    segment::{
        des::{DataExtensionSubheader, OverflowSection, TreOverflow},
        graphic::GraphicSubheader,
        image::ImageSubheader,
        label::LabelSubheader,
        res::ReservedExtensionSubheader,
        symbol::SymbolSubheader,
        text::TextSubheader,
        Segment, Subheader,
    },
    tre::{encode_tres, parse_tres, TreCollection, TreSource},
    writer::FieldWriter,
};

/// A typed representation of a NITF / NSIF file
///
/// Graphics only exist in NITF 2.1 and NSIF files, symbols and labels only in NITF 2.0 files.
#[derive(Debug)]
pub struct Nitf {
    header: FileHeader,
    images: Vec<Segment<ImageSubheader>>,
    graphics: Vec<Segment<GraphicSubheader>>,
    symbols: Vec<Segment<SymbolSubheader>>,
    labels: Vec<Segment<LabelSubheader>>,
    texts: Vec<Segment<TextSubheader>>,
    data_extensions: Vec<Segment<DataExtensionSubheader>>,
    reserved_extensions: Vec<Segment<ReservedExtensionSubheader>>,
}

/// One serialized subheader with the data that follows it
struct Encoded<'a> {
    subheader: Vec<u8>,
    data: EncodedData<'a>,
}

enum EncodedData<'a> {
    Payload(&'a Payload),
    Bytes(Vec<u8>),
}

impl Encoded<'_> {
    fn lengths(&self) -> SegmentLengths {
        SegmentLengths {
            subheader: self.subheader.len() as u64,
            data: match &self.data {
                EncodedData::Payload(p) => p.len(),
                EncodedData::Bytes(b) => b.len() as u64,
            },
        }
    }

    fn write_to(&self, w: &mut impl Write) -> Result<()> {
        w.write_all(&self.subheader)?;
        match &self.data {
            EncodedData::Payload(p) => {
                p.copy_to(w)?;
            }
            EncodedData::Bytes(b) => w.write_all(b)?,
        }
        Ok(())
    }
}

fn encode_subheader<H: Subheader>(header: &H, file_type: FileType) -> Result<Vec<u8>> {
    let mut w = FieldWriter::new(Vec::new());
    header.write(&mut w, file_type)?;
    Ok(w.into_inner())
}

fn encode_segments<H: Subheader>(
    segments: &[Segment<H>],
    file_type: FileType,
) -> Result<Vec<Encoded<'_>>> {
    segments
        .iter()
        .map(|s| {
            let payload = s
                .payload()
                .ok_or_else(|| Error::PayloadUnavailable(H::KIND.into()))?;
            Ok(Encoded {
                subheader: encode_subheader(s.header(), file_type)?,
                data: EncodedData::Payload(payload),
            })
        })
        .collect()
}

fn read_segments<H: Subheader, R: Read>(
    cursor: &mut ByteCursor<R>,
    lengths: &[SegmentLengths],
    file_type: FileType,
    options: &ParseOptions,
) -> Result<Vec<Segment<H>>> {
    lengths
        .iter()
        .map(|l| {
            let header: H = read_subheader(cursor, l, file_type, options)?;
            let payload = options.heap.place(cursor, l.data, H::KIND.into())?;
            Ok(Segment::new(header, payload))
        })
        .collect()
}

fn read_subheader<H: Subheader, R: Read>(
    cursor: &mut ByteCursor<R>,
    lengths: &SegmentLengths,
    file_type: FileType,
    options: &ParseOptions,
) -> Result<H> {
    let start = cursor.offset();
    let header = H::parse(cursor, file_type, &options.registry)?;
    let consumed = cursor.offset() - start;
    if consumed != lengths.subheader {
        return Err(Error::length_mismatch(
            start,
            format!("{} subheader", H::KIND),
            lengths.subheader,
            consumed,
        ));
    }
    Ok(header)
}

fn data_length(len: u64) -> Result<usize> {
    usize::try_from(len)
        .map_err(|_| Error::UnsupportedCombination(format!("{len} byte TRE overflow segment")))
}

impl Nitf {
    /// Creates an empty [`Nitf`] that can be filled through the `*_mut` accessors
    #[must_use]
    pub const fn new(header: FileHeader) -> Self {
        Self {
            header,
            images: Vec::new(),
            graphics: Vec::new(),
            symbols: Vec::new(),
            labels: Vec::new(),
            texts: Vec::new(),
            data_extensions: Vec::new(),
            reserved_extensions: Vec::new(),
        }
    }

    /// Reads a [`Self`] with the default [`ParseOptions`]
    ///
    /// # Errors
    ///
    /// See [`Self::from_reader_with`]
    pub fn from_reader(r: impl Read) -> Result<Self> {
        Self::from_reader_with(r, &ParseOptions::default())
    }

    /// Reads a [`Self`] from a byte source
    ///
    /// The whole file is parsed before returning; payloads are placed according to
    /// [`ParseOptions::heap`].
    ///
    /// # Errors
    ///
    /// This function will error if the data is not a valid file:
    /// - a marker, coded value or number does not parse
    /// - a subheader does not consume exactly its declared length, or the header length (`HL`)
    ///   or file length (`FL`) disagree with the bytes read
    /// - an overflow segment points at a segment that does not exist
    #[instrument(skip_all, level = "trace")]
    pub fn from_reader_with(r: impl Read, options: &ParseOptions) -> Result<Self> {
        let mut cursor = ByteCursor::new(r);
        let (header, layout) = FileHeader::parse(&mut cursor, &options.registry)?;
        let file_type = header.file_type;
        debug!("read {} byte {file_type} header", layout.header_length);

        let images = read_segments(&mut cursor, &layout.images, file_type, options)?;
        let (graphics, symbols) = if file_type.is_nitf20() {
            (
                Vec::new(),
                read_segments(&mut cursor, &layout.graphics, file_type, options)?,
            )
        } else {
            (
                read_segments(&mut cursor, &layout.graphics, file_type, options)?,
                Vec::new(),
            )
        };
        let labels = read_segments(&mut cursor, &layout.labels, file_type, options)?;
        let texts = read_segments(&mut cursor, &layout.texts, file_type, options)?;

        let mut data_extensions = Vec::with_capacity(layout.data_extensions.len());
        for l in &layout.data_extensions {
            let mut header: DataExtensionSubheader =
                read_subheader(&mut cursor, l, file_type, options)?;
            let segment = if header.is_tre_overflow() {
                header.tres = parse_tres(
                    &mut cursor,
                    data_length(l.data)?,
                    TreSource::TreOverflowDes,
                    &options.registry,
                )?;
                Segment::new(header, None::<Payload>)
            } else {
                let payload = options
                    .heap
                    .place(&mut cursor, l.data, "data extension")?;
                Segment::new(header, payload)
            };
            data_extensions.push(segment);
        }
        let reserved_extensions =
            read_segments(&mut cursor, &layout.reserved_extensions, file_type, options)?;

        let consumed = cursor.offset();
        if layout.file_length == STREAMING_FILE_LENGTH {
            warn!("file length is the streaming placeholder, read {consumed} bytes");
        } else if consumed != layout.file_length {
            return Err(Error::length_mismatch(0, "FL", layout.file_length, consumed));
        }

        let mut nitf = Self {
            header,
            images,
            graphics,
            symbols,
            labels,
            texts,
            data_extensions,
            reserved_extensions,
        };
        nitf.merge_overflow()?;
        info!("read {consumed} byte {file_type} file");
        Ok(nitf)
    }

    /// Tries to read [`Self`] from a provided file path
    ///
    /// # Errors
    ///
    /// This function will error if the file cannot be opened or if the file contains invalid data.
    /// See [`Self::from_reader_with`] for potential errors
    pub fn from_file(filename: impl AsRef<Path>) -> Result<Self> {
        Self::from_file_with(filename, &ParseOptions::default())
    }

    /// Tries to read [`Self`] from a provided file path with explicit options
    ///
    /// # Errors
    ///
    /// See [`Self::from_file`]
    pub fn from_file_with(filename: impl AsRef<Path>, options: &ParseOptions) -> Result<Self> {
        let file = File::open(filename)?;
        Self::from_reader_with(BufReader::new(file), options)
    }

    /// Serializes [`Self`], recomputing every length field
    ///
    /// TREs merged in from overflow segments are written back to their overflow segment only.
    ///
    /// # Errors
    ///
    /// This function will error if:
    /// - a payload was skipped when the file was read ([`Error::PayloadUnavailable`])
    /// - a value does not fit in its field ([`Error::FieldOverflow`])
    /// - the segments do not exist in the header's format version
    /// - the writer fails
    pub fn write_to(&self, w: impl Write) -> Result<()> {
        let file_type = self.header.file_type;
        if file_type.is_nitf20() && !self.graphics.is_empty() {
            return Err(Error::UnsupportedCombination(format!(
                "graphic segments in a {file_type} file"
            )));
        }
        if !file_type.is_nitf20() && !(self.symbols.is_empty() && self.labels.is_empty()) {
            return Err(Error::UnsupportedCombination(format!(
                "symbol or label segments in a {file_type} file"
            )));
        }

        let images = encode_segments(&self.images, file_type)?;
        let graphics = if file_type.is_nitf20() {
            encode_segments(&self.symbols, file_type)?
        } else {
            encode_segments(&self.graphics, file_type)?
        };
        let labels = encode_segments(&self.labels, file_type)?;
        let texts = encode_segments(&self.texts, file_type)?;
        let data_extensions = self
            .data_extensions
            .iter()
            .map(|s| {
                let header = s.header();
                let data = if header.is_tre_overflow() {
                    let tres = header.tres.from_source(TreSource::TreOverflowDes);
                    EncodedData::Bytes(encode_tres(tres)?)
                } else {
                    EncodedData::Payload(
                        s.payload()
                            .ok_or(Error::PayloadUnavailable("data extension"))?,
                    )
                };
                Ok(Encoded {
                    subheader: encode_subheader(header, file_type)?,
                    data,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        let reserved_extensions = encode_segments(&self.reserved_extensions, file_type)?;

        let lengths = |encoded: &[Encoded<'_>]| encoded.iter().map(Encoded::lengths).collect();
        let mut layout = Layout {
            file_length: 0,
            header_length: 0,
            images: lengths(&images),
            graphics: lengths(&graphics),
            labels: lengths(&labels),
            texts: lengths(&texts),
            data_extensions: lengths(&data_extensions),
            reserved_extensions: lengths(&reserved_extensions),
        };
        // field widths are fixed, so a first pass with zero lengths measures the header
        let mut measure = FieldWriter::new(std::io::sink());
        self.header.write(&mut measure, &layout)?;
        layout.header_length = measure.written();
        layout.file_length = layout.header_length + layout.segments_length();
        debug!(
            "writing {} byte header, {} byte file",
            layout.header_length, layout.file_length
        );

        let mut w = FieldWriter::new(w);
        self.header.write(&mut w, &layout)?;
        let mut w = w.into_inner();
        for encoded in [
            &images,
            &graphics,
            &labels,
            &texts,
            &data_extensions,
            &reserved_extensions,
        ]
        .into_iter()
        .flatten()
        {
            encoded.write_to(&mut w)?;
        }
        w.flush()?;
        Ok(())
    }

    /// Attempts to serialize and save [`Self`] as a file at the provided path
    ///
    /// # Errors
    ///
    /// This will error if unable to open and/or write to the provided filename, or for any
    /// reason listed in [`Self::write_to`]
    pub fn into_file(self, filename: impl AsRef<Path>) -> Result<()> {
        let f = File::options()
            .create(true)
            .write(true)
            .truncate(true)
            .open(filename)?;
        self.write_to(BufWriter::new(f))?;
        info!("Finished writing to file");
        Ok(())
    }

    fn merge_overflow(&mut self) -> Result<()> {
        let overflows: Vec<(TreOverflow, TreCollection)> = self
            .data_extensions
            .iter()
            .filter_map(|des| {
                let header = des.header();
                header.overflow.map(|overflow| {
                    let tres = header
                        .tres
                        .from_source(TreSource::TreOverflowDes)
                        .cloned()
                        .collect();
                    (overflow, tres)
                })
            })
            .collect();
        for (overflow, tres) in overflows {
            debug!(
                "merging {} overflow TREs into {} item {}",
                tres.len(),
                overflow.section,
                overflow.item
            );
            self.overflow_target(overflow)?.merge(tres);
        }
        Ok(())
    }

    fn overflow_target(&mut self, overflow: TreOverflow) -> Result<&mut TreCollection> {
        let index = usize::from(overflow.item).checked_sub(1);
        let is_nitf20 = self.header.file_type.is_nitf20();
        let target = match overflow.section {
            OverflowSection::UserDefinedHeaderData | OverflowSection::ExtendedHeaderData => {
                (overflow.item == 0).then_some(&mut self.header.tres)
            }
            OverflowSection::UserDefinedImageData | OverflowSection::ImageExtendedSubheaderData => {
                index
                    .and_then(|i| self.images.get_mut(i))
                    .map(|s| &mut s.header_mut().tres)
            }
            OverflowSection::GraphicExtendedSubheaderData if is_nitf20 => index
                .and_then(|i| self.symbols.get_mut(i))
                .map(|s| &mut s.header_mut().tres),
            OverflowSection::GraphicExtendedSubheaderData => index
                .and_then(|i| self.graphics.get_mut(i))
                .map(|s| &mut s.header_mut().tres),
            OverflowSection::LabelExtendedSubheaderData => index
                .and_then(|i| self.labels.get_mut(i))
                .map(|s| &mut s.header_mut().tres),
            OverflowSection::TextExtendedSubheaderData => index
                .and_then(|i| self.texts.get_mut(i))
                .map(|s| &mut s.header_mut().tres),
        };
        target.ok_or_else(|| Error::OverflowTarget {
            overflow: overflow.section.to_string(),
            item: overflow.item,
        })
    }

    /// Returns a reference to the [`FileHeader`]
    #[must_use]
    pub const fn header(&self) -> &FileHeader {
        &self.header
    }

    /// Returns a mutable reference to the [`FileHeader`]
    pub fn header_mut(&mut self) -> &mut FileHeader {
        &mut self.header
    }

    /// Image segments
    #[must_use]
    pub fn images(&self) -> &[Segment<ImageSubheader>] {
        &self.images
    }

    /// Image segments, for adding or removing segments
    pub fn images_mut(&mut self) -> &mut Vec<Segment<ImageSubheader>> {
        &mut self.images
    }

    /// Graphic segments (NITF 2.1 / NSIF)
    #[must_use]
    pub fn graphics(&self) -> &[Segment<GraphicSubheader>] {
        &self.graphics
    }

    /// Graphic segments, for adding or removing segments
    pub fn graphics_mut(&mut self) -> &mut Vec<Segment<GraphicSubheader>> {
        &mut self.graphics
    }

    /// Symbol segments (NITF 2.0)
    #[must_use]
    pub fn symbols(&self) -> &[Segment<SymbolSubheader>] {
        &self.symbols
    }

    /// Symbol segments, for adding or removing segments
    pub fn symbols_mut(&mut self) -> &mut Vec<Segment<SymbolSubheader>> {
        &mut self.symbols
    }

    /// Label segments (NITF 2.0)
    #[must_use]
    pub fn labels(&self) -> &[Segment<LabelSubheader>] {
        &self.labels
    }

    /// Label segments, for adding or removing segments
    pub fn labels_mut(&mut self) -> &mut Vec<Segment<LabelSubheader>> {
        &mut self.labels
    }

    /// Text segments
    #[must_use]
    pub fn texts(&self) -> &[Segment<TextSubheader>] {
        &self.texts
    }

    /// Text segments, for adding or removing segments
    pub fn texts_mut(&mut self) -> &mut Vec<Segment<TextSubheader>> {
        &mut self.texts
    }

    /// Data extension segments
    #[must_use]
    pub fn data_extensions(&self) -> &[Segment<DataExtensionSubheader>] {
        &self.data_extensions
    }

    /// Data extension segments, for adding or removing segments
    pub fn data_extensions_mut(&mut self) -> &mut Vec<Segment<DataExtensionSubheader>> {
        &mut self.data_extensions
    }

    /// Reserved extension segments
    #[must_use]
    pub fn reserved_extensions(&self) -> &[Segment<ReservedExtensionSubheader>] {
        &self.reserved_extensions
    }

    /// Reserved extension segments, for adding or removing segments
    pub fn reserved_extensions_mut(&mut self) -> &mut Vec<Segment<ReservedExtensionSubheader>> {
        &mut self.reserved_extensions
    }
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use super::Nitf;
    use crate::{
        error::{Error, Result},
        file_type::FileType,
        header::FileHeader,
        heap::{HeapStrategy, Payload},
        options::ParseOptions,
        security::{FileSecurityMetadata, Nitf20Security, SecurityMetadata},
        segment::{
            des::{DataExtensionSubheader, OverflowSection, TreOverflow, TRE_OVERFLOW},
            image::{BandRepresentation, ImageBand, ImageSubheader},
            Segment,
        },
        tre::{Tre, TreSource},
    };

    // offset of FL in a 2.1 header
    const FL_OFFSET: usize = 342;

    fn image() -> Segment<ImageSubheader> {
        let header = ImageSubheader::builder()
            .rows(2)
            .columns(2)
            .actual_bits_per_pixel(8)
            .bits_per_pixel(8)
            .pixels_per_block_horizontal(2)
            .pixels_per_block_vertical(2)
            .bands(vec![ImageBand::builder()
                .representation(BandRepresentation::Monochrome)
                .build()])
            .build();
        Segment::new(header, Payload::from(vec![1, 2, 3, 4]))
    }

    fn overflow_des(item: u16) -> Segment<DataExtensionSubheader> {
        let mut header = DataExtensionSubheader::builder()
            .identifier(TRE_OVERFLOW)
            .overflow(TreOverflow {
                section: OverflowSection::ImageExtendedSubheaderData,
                item,
            })
            .build();
        header.tres.add(Tre::opaque(
            "ZZTEST",
            TreSource::TreOverflowDes,
            b"overflowed".to_vec(),
        ));
        Segment::new(header, None::<Payload>)
    }

    fn written(nitf: &Nitf) -> Result<Vec<u8>> {
        let mut bytes = Vec::new();
        nitf.write_to(&mut bytes)?;
        Ok(bytes)
    }

    #[test]
    fn overflow_tres_merge_into_target() -> Result<()> {
        let mut nitf = Nitf::new(FileHeader::builder().build());
        nitf.images_mut().push(image());
        nitf.data_extensions_mut().push(overflow_des(1));
        let bytes = written(&nitf)?;

        let parsed = Nitf::from_reader(bytes.as_slice())?;
        let image_tres = &parsed.images()[0].header().tres;
        assert_eq!(image_tres.unique_names(), vec!["ZZTEST"]);
        assert_eq!(parsed.data_extensions()[0].header().tres.len(), 1);
        assert_eq!(parsed.images()[0].data()?, vec![1, 2, 3, 4]);
        // the merged copy stays with the overflow segment
        assert_eq!(written(&parsed)?, bytes);
        Ok(())
    }

    #[test]
    fn missing_overflow_target_is_an_error() -> Result<()> {
        let mut nitf = Nitf::new(FileHeader::builder().build());
        nitf.images_mut().push(image());
        nitf.data_extensions_mut().push(overflow_des(2));
        let bytes = written(&nitf)?;
        assert!(matches!(
            Nitf::from_reader(bytes.as_slice()),
            Err(Error::OverflowTarget { item: 2, .. })
        ));
        Ok(())
    }

    #[test]
    fn file_length_is_checked() -> Result<()> {
        let mut nitf = Nitf::new(FileHeader::builder().build());
        nitf.images_mut().push(image());
        let mut bytes = written(&nitf)?;
        let declared: u64 = String::from_utf8_lossy(&bytes[FL_OFFSET..FL_OFFSET + 12])
            .parse()
            .unwrap();
        assert_eq!(declared, bytes.len() as u64);

        let longer = format!("{:012}", declared + 1);
        bytes[FL_OFFSET..FL_OFFSET + 12].copy_from_slice(longer.as_bytes());
        assert!(matches!(
            Nitf::from_reader(bytes.as_slice()),
            Err(Error::LengthMismatch { .. })
        ));

        bytes[FL_OFFSET..FL_OFFSET + 12].copy_from_slice(b"999999999999");
        assert_eq!(Nitf::from_reader(bytes.as_slice())?.images().len(), 1);
        Ok(())
    }

    #[test]
    fn skipped_payload_cannot_be_written() -> Result<()> {
        let mut nitf = Nitf::new(FileHeader::builder().build());
        nitf.images_mut().push(image());
        let bytes = written(&nitf)?;

        let options = ParseOptions::builder()
            .heap(HeapStrategy::builder().max_length(3).build())
            .build();
        let parsed = Nitf::from_reader_with(bytes.as_slice(), &options)?;
        assert!(parsed.images()[0].payload().is_none());
        assert!(matches!(
            written(&parsed),
            Err(Error::PayloadUnavailable("image"))
        ));
        Ok(())
    }

    #[test]
    fn security_block_follows_the_file_version() {
        let header = FileHeader::builder()
            .file_type(FileType::Nitf21)
            .security(FileSecurityMetadata {
                security: SecurityMetadata::Nitf20(Nitf20Security::default()),
                ..FileSecurityMetadata::default()
            })
            .build();
        let mut bytes = Vec::new();
        assert!(matches!(
            Nitf::new(header).write_to(&mut bytes),
            Err(Error::UnsupportedCombination(_))
        ));
        assert!(bytes.is_empty());

        let mut nitf = Nitf::new(FileHeader::builder().file_type(FileType::Nitf20).build());
        nitf.header_mut().security.security = SecurityMetadata::Nitf20(Nitf20Security::default());
        let mut image = image();
        image.header_mut().security = SecurityMetadata::default();
        nitf.images_mut().push(image);
        assert!(matches!(written(&nitf), Err(Error::UnsupportedCombination(_))));
    }
}
