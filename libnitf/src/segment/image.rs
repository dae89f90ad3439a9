use std::io::{Read, Write};

use bon::Builder;
use strum::{Display, EnumString, IntoStaticStr};
use tracing::{debug, instrument, trace};

use super::{read_encryption, write_encryption, Location, SegmentKind, Subheader};
use crate::{
    coords::{CoordinateRepresentation, CoordinateSet, COORDINATE_SET_WIDTH},
    datetime::{NitfDateTime, DATE_TIME_WIDTH},
    error::{Error, Result},
    file_type::FileType,
    reader::ByteCursor,
    security::SecurityMetadata,
    tre::{read_extension_section, write_extension_section, TreCollection, TreRegistry, TreSource},
    writer::FieldWriter,
};

const MAX_NBANDS: usize = 9;
const MAX_COMMENTS: usize = 9;

/// `PVTYPE`
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, EnumString, IntoStaticStr, Display)]
pub enum PixelValueType {
    /// `INT`, unsigned integer
    #[default]
    #[strum(serialize = "INT")]
    Integer,
    /// `B`, one bit per pixel
    #[strum(serialize = "B")]
    Bilevel,
    /// `SI`, two's complement signed integer
    #[strum(serialize = "SI")]
    SignedInteger,
    /// `R`, IEEE floating point
    #[strum(serialize = "R")]
    Real,
    /// `C`, complex floating point
    #[strum(serialize = "C")]
    Complex,
}

/// `IREP`
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, EnumString, IntoStaticStr, Display)]
pub enum ImageRepresentation {
    /// `MONO`
    #[default]
    #[strum(serialize = "MONO")]
    Monochrome,
    /// `RGB`
    #[strum(serialize = "RGB")]
    Rgb,
    /// `RGB/LUT`
    #[strum(serialize = "RGB/LUT")]
    RgbLut,
    /// `MULTI`
    #[strum(serialize = "MULTI")]
    Multiband,
    /// `NODISPLY`
    #[strum(serialize = "NODISPLY")]
    NoDisplay,
    /// `NVECTOR`
    #[strum(serialize = "NVECTOR")]
    CartesianVector,
    /// `POLAR`
    #[strum(serialize = "POLAR")]
    PolarVector,
    /// `VPH`
    #[strum(serialize = "VPH")]
    SarVideoPhaseHistory,
    /// `YCbCr601`
    #[strum(serialize = "YCbCr601")]
    YCbCr601,
}

/// `ICAT`
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, EnumString, IntoStaticStr, Display)]
#[strum(serialize_all = "UPPERCASE")]
pub enum ImageCategory {
    /// Visible imagery
    #[default]
    Vis,
    /// Side looking radar
    Sl,
    /// Thermal infrared
    Ti,
    /// Forward looking infrared
    Fl,
    /// Radar
    Rd,
    /// Electro-optical
    Eo,
    /// Optical
    Op,
    /// High resolution radar
    Hr,
    /// Hyperspectral
    Hs,
    /// Colour frame photography
    Cp,
    /// Black/white frame photography
    Bp,
    /// Synthetic aperture radar
    Sar,
    /// SAR radio hologram
    Sariq,
    /// Infrared
    Ir,
    /// Raster map
    Map,
    /// Multispectral
    Ms,
    /// Fingerprints
    Fp,
    /// Magnetic resonance imagery
    Mri,
    /// X-rays
    Xray,
    /// CAT scans
    Cat,
    /// Video
    Vd,
    /// Patterns
    Pat,
    /// Legends
    Leg,
    /// Elevation models
    Dtem,
    /// Other matrix data
    Matr,
    /// Location grids
    Locg,
    /// Barometric pressure
    Baro,
    /// Water current
    Current,
    /// Water depth
    Depth,
    /// Air wind
    Wind,
}

/// `PJUST`
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, EnumString, IntoStaticStr, Display)]
pub enum PixelJustification {
    /// `L`, significant bits in the high end of each sample
    #[strum(serialize = "L")]
    Left,
    /// `R`, significant bits in the low end of each sample
    #[default]
    #[strum(serialize = "R")]
    Right,
}

/// `IC`
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, EnumString, IntoStaticStr, Display)]
pub enum ImageCompression {
    /// `NC`
    #[default]
    #[strum(serialize = "NC")]
    NotCompressed,
    /// `NM`, uncompressed with a block/pad mask table
    #[strum(serialize = "NM")]
    NotCompressedMasked,
    /// `C1`, bi-level
    #[strum(serialize = "C1")]
    Bilevel,
    /// `C3`, JPEG
    #[strum(serialize = "C3")]
    Jpeg,
    /// `C4`, vector quantization
    #[strum(serialize = "C4")]
    VectorQuantization,
    /// `C5`, lossless JPEG
    #[strum(serialize = "C5")]
    LosslessJpeg,
    /// `C6`, reserved
    #[strum(serialize = "C6")]
    Reserved,
    /// `C7`, complex SAR
    #[strum(serialize = "C7")]
    ComplexSar,
    /// `C8`, JPEG 2000
    #[strum(serialize = "C8")]
    Jpeg2000,
    /// `I1`, downsampled JPEG
    #[strum(serialize = "I1")]
    DownsampledJpeg,
    /// `M1`
    #[strum(serialize = "M1")]
    MaskedBilevel,
    /// `M3`
    #[strum(serialize = "M3")]
    MaskedJpeg,
    /// `M4`
    #[strum(serialize = "M4")]
    MaskedVectorQuantization,
    /// `M5`
    #[strum(serialize = "M5")]
    MaskedLosslessJpeg,
    /// `M6`
    #[strum(serialize = "M6")]
    MaskedReserved,
    /// `M7`
    #[strum(serialize = "M7")]
    MaskedComplexSar,
    /// `M8`
    #[strum(serialize = "M8")]
    MaskedJpeg2000,
}

impl ImageCompression {
    /// Whether the data starts with a mask table
    #[must_use]
    pub const fn is_masked(self) -> bool {
        !matches!(
            self,
            Self::NotCompressed
                | Self::Bilevel
                | Self::Jpeg
                | Self::VectorQuantization
                | Self::LosslessJpeg
                | Self::Reserved
                | Self::ComplexSar
                | Self::Jpeg2000
                | Self::DownsampledJpeg
        )
    }

    /// Whether the subheader carries `COMRAT`
    #[must_use]
    pub const fn has_compression_rate(self) -> bool {
        !matches!(self, Self::NotCompressed | Self::NotCompressedMasked)
    }
}

/// `IMODE`
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, EnumString, IntoStaticStr, Display)]
pub enum ImageMode {
    /// `B`, band interleaved by block
    #[default]
    #[strum(serialize = "B")]
    Block,
    /// `P`, band interleaved by pixel
    #[strum(serialize = "P")]
    Pixel,
    /// `R`, band interleaved by row
    #[strum(serialize = "R")]
    Row,
    /// `S`, band sequential
    #[strum(serialize = "S")]
    Sequential,
}

/// `IREPBANDn`
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, EnumString, IntoStaticStr, Display)]
pub enum BandRepresentation {
    /// blank
    #[default]
    #[strum(serialize = "")]
    Unspecified,
    /// `M`
    #[strum(serialize = "M")]
    Monochrome,
    /// `R`
    #[strum(serialize = "R")]
    Red,
    /// `G`
    #[strum(serialize = "G")]
    Green,
    /// `B`
    #[strum(serialize = "B")]
    Blue,
    /// `LU`, lookup table indices
    #[strum(serialize = "LU")]
    Lut,
    /// `Y`
    #[strum(serialize = "Y")]
    Luminance,
    /// `Cb`
    #[strum(serialize = "Cb")]
    ChromaBlue,
    /// `Cr`
    #[strum(serialize = "Cr")]
    ChromaRed,
}

/// One band of an image and its lookup tables
#[derive(Debug, Default, Clone, PartialEq, Eq, Builder)]
#[non_exhaustive]
pub struct ImageBand {
    /// `IREPBAND`
    #[builder(default)]
    pub representation: BandRepresentation,
    /// `ISUBCAT`
    #[builder(default)]
    pub subcategory: String,
    /// `IFC`
    #[builder(default = "N".to_owned())]
    pub filter_condition: String,
    /// `IMFLT`
    #[builder(default)]
    pub filter_code: String,
    /// `NLUTS` tables of `NELUT` entries each
    #[builder(default)]
    pub luts: Vec<Vec<u8>>,
}

impl ImageBand {
    /// `NELUT`, zero when the band has no tables
    #[must_use]
    pub fn lut_entries(&self) -> usize {
        self.luts.first().map_or(0, Vec::len)
    }

    fn parse<R: Read>(cursor: &mut ByteCursor<R>) -> Result<Self> {
        let representation = cursor.read_enum(2, "IREPBAND")?;
        let subcategory = cursor.read_text(6, "ISUBCAT")?;
        let filter_condition = cursor.read_text(1, "IFC")?;
        let filter_code = cursor.read_text(3, "IMFLT")?;
        let count: usize = cursor.read_number(1, "NLUTS")?;
        let mut luts = Vec::with_capacity(count);
        if count > 0 {
            let entries: usize = cursor.read_number(5, "NELUT")?;
            for _ in 0..count {
                luts.push(cursor.read_raw(entries, "LUTD")?);
            }
        }
        Ok(Self {
            representation,
            subcategory,
            filter_condition,
            filter_code,
            luts,
        })
    }

    fn write<W: Write>(&self, w: &mut FieldWriter<W>) -> Result<()> {
        w.text(self.representation.into(), 2, "IREPBAND")?;
        w.text(&self.subcategory, 6, "ISUBCAT")?;
        w.text(&self.filter_condition, 1, "IFC")?;
        w.text(&self.filter_code, 3, "IMFLT")?;
        w.number(self.luts.len() as u64, 1, "NLUTS")?;
        if self.luts.is_empty() {
            return Ok(());
        }
        let entries = self.lut_entries();
        w.number(entries as u64, 5, "NELUT")?;
        for lut in &self.luts {
            if lut.len() != entries {
                return Err(Error::length_mismatch(
                    w.written(),
                    "LUTD",
                    entries as u64,
                    lut.len() as u64,
                ));
            }
            w.raw(lut)?;
        }
        Ok(())
    }
}

/// Image subheader fields
#[derive(Debug, Clone, PartialEq, Builder)]
#[non_exhaustive]
pub struct ImageSubheader {
    /// `IID1`
    #[builder(default)]
    pub identifier: String,
    /// `IDATIM`
    #[builder(default)]
    pub date_time: NitfDateTime,
    /// `TGTID`
    #[builder(default)]
    pub target_id: String,
    /// `IID2` (`ITITLE` in NITF 2.0)
    #[builder(default)]
    pub title: String,
    /// Classification block
    #[builder(default)]
    pub security: SecurityMetadata,
    /// `ISORCE`
    #[builder(default)]
    pub source: String,
    /// `NROWS`
    pub rows: u32,
    /// `NCOLS`
    pub columns: u32,
    /// `PVTYPE`
    #[builder(default)]
    pub pixel_value_type: PixelValueType,
    /// `IREP`
    #[builder(default)]
    pub representation: ImageRepresentation,
    /// `ICAT`
    #[builder(default)]
    pub category: ImageCategory,
    /// `ABPP`
    pub actual_bits_per_pixel: u8,
    /// `PJUST`
    #[builder(default)]
    pub justification: PixelJustification,
    /// `ICORDS`
    #[builder(default = CoordinateRepresentation::None)]
    pub coordinate_representation: CoordinateRepresentation,
    /// `IGEOLO`, present unless the representation is [`CoordinateRepresentation::None`]
    pub coordinates: Option<CoordinateSet>,
    /// `ICOMn`
    #[builder(default)]
    pub comments: Vec<String>,
    /// `IC`
    #[builder(default)]
    pub compression: ImageCompression,
    /// `COMRAT`, present when the image is compressed
    pub compression_rate: Option<String>,
    /// Band records, `NBANDS` or `XBANDS` of them
    #[builder(default)]
    pub bands: Vec<ImageBand>,
    /// `IMODE`
    #[builder(default)]
    pub mode: ImageMode,
    /// `NBPR`
    #[builder(default = 1)]
    pub blocks_per_row: u16,
    /// `NBPC`
    #[builder(default = 1)]
    pub blocks_per_column: u16,
    /// `NPPBH`
    pub pixels_per_block_horizontal: u16,
    /// `NPPBV`
    pub pixels_per_block_vertical: u16,
    /// `NBPP`
    pub bits_per_pixel: u8,
    /// `IDLVL`
    #[builder(default = 1)]
    pub display_level: u16,
    /// `IALVL`
    #[builder(default)]
    pub attachment_level: u16,
    /// `ILOC`
    #[builder(default)]
    pub location: Location,
    /// `IMAG`
    #[builder(default = "1.0".to_owned())]
    pub magnification: String,
    /// `UDOFL`
    #[builder(default)]
    pub user_defined_overflow: u16,
    /// `IXSOFL`
    #[builder(default)]
    pub extended_overflow: u16,
    /// TREs from `UDID` and `IXSHD`, plus any merged from overflow segments
    #[builder(default)]
    pub tres: TreCollection,
}

impl ImageSubheader {
    /// Number of blocks in the image
    #[must_use]
    pub fn block_count(&self) -> usize {
        usize::from(self.blocks_per_row) * usize::from(self.blocks_per_column)
    }

    /// Number of bands
    #[must_use]
    pub fn band_count(&self) -> usize {
        self.bands.len()
    }
}

impl Subheader for ImageSubheader {
    const KIND: SegmentKind = SegmentKind::Image;

    #[instrument(skip(cursor, registry), level = "trace")]
    fn parse<R: Read>(
        cursor: &mut ByteCursor<R>,
        file_type: FileType,
        registry: &TreRegistry,
    ) -> Result<Self> {
        cursor.verify_marker("IM")?;
        let identifier = cursor.read_text(10, "IID1")?;
        let date_time =
            NitfDateTime::parse(&cursor.read_text(DATE_TIME_WIDTH, "IDATIM")?, file_type);
        let target_id = cursor.read_text(17, "TGTID")?;
        let title = cursor.read_text(80, "IID2")?;
        let security = SecurityMetadata::parse(cursor, file_type)?;
        read_encryption(cursor)?;
        let source = cursor.read_text(42, "ISORCE")?;
        let rows = cursor.read_number(8, "NROWS")?;
        let columns = cursor.read_number(8, "NCOLS")?;
        let pixel_value_type = cursor.read_enum(3, "PVTYPE")?;
        let representation = cursor.read_enum(8, "IREP")?;
        let category = cursor.read_enum(8, "ICAT")?;
        let actual_bits_per_pixel = cursor.read_number(2, "ABPP")?;
        let justification = cursor.read_enum(1, "PJUST")?;

        let offset = cursor.offset();
        let code = cursor.read_text_untrimmed(1, "ICORDS")?;
        let coordinate_representation = CoordinateRepresentation::from_code(&code, file_type)
            .ok_or_else(|| Error::InvalidEnumeratedValue {
                offset,
                field: "ICORDS",
                value: code,
            })?;
        let coordinates = if coordinate_representation == CoordinateRepresentation::None {
            None
        } else {
            let offset = cursor.offset();
            let igeolo = cursor.read_text_untrimmed(COORDINATE_SET_WIDTH, "IGEOLO")?;
            let set = CoordinateSet::parse(coordinate_representation, &igeolo).map_err(|e| match e {
                Error::MalformedCoordinate { message, .. } => Error::MalformedCoordinate {
                    offset: Some(offset),
                    message,
                },
                other => other,
            })?;
            Some(set)
        };

        let comment_count: usize = cursor.read_number(1, "NICOM")?;
        let comments = (0..comment_count)
            .map(|_| cursor.read_text(80, "ICOM"))
            .collect::<Result<Vec<_>>>()?;

        let compression: ImageCompression = cursor.read_enum(2, "IC")?;
        let compression_rate = if compression.has_compression_rate() {
            Some(cursor.read_text(4, "COMRAT")?)
        } else {
            None
        };

        let mut band_count: usize = cursor.read_number(1, "NBANDS")?;
        if band_count == 0 && !file_type.is_nitf20() {
            band_count = cursor.read_number(5, "XBANDS")?;
        }
        trace!("reading {band_count} band records");
        let bands = (0..band_count)
            .map(|_| ImageBand::parse(cursor))
            .collect::<Result<Vec<_>>>()?;

        let offset = cursor.offset();
        let sync: u8 = cursor.read_number(1, "ISYNC")?;
        if sync != 0 {
            return Err(Error::InvalidEnumeratedValue {
                offset,
                field: "ISYNC",
                value: sync.to_string(),
            });
        }
        let mode = cursor.read_enum(1, "IMODE")?;
        let blocks_per_row = cursor.read_number(4, "NBPR")?;
        let blocks_per_column = cursor.read_number(4, "NBPC")?;
        let pixels_per_block_horizontal = cursor.read_number(4, "NPPBH")?;
        let pixels_per_block_vertical = cursor.read_number(4, "NPPBV")?;
        let bits_per_pixel = cursor.read_number(2, "NBPP")?;
        let display_level = cursor.read_number(3, "IDLVL")?;
        let attachment_level = cursor.read_number(3, "IALVL")?;
        let location = Location::parse(cursor, "ILOC")?;
        let magnification = cursor.read_text(4, "IMAG")?;

        let mut tres = TreCollection::new();
        let user_defined_overflow = read_extension_section(
            cursor,
            "UDIDL",
            "UDOFL",
            TreSource::UserDefinedImageData,
            registry,
            &mut tres,
        )?;
        let extended_overflow = read_extension_section(
            cursor,
            "IXSHDL",
            "IXSOFL",
            TreSource::ImageExtendedSubheaderData,
            registry,
            &mut tres,
        )?;
        debug!("image {identifier:?}: {rows}x{columns}, {band_count} bands, {compression}");

        Ok(Self {
            identifier,
            date_time,
            target_id,
            title,
            security,
            source,
            rows,
            columns,
            pixel_value_type,
            representation,
            category,
            actual_bits_per_pixel,
            justification,
            coordinate_representation,
            coordinates,
            comments,
            compression,
            compression_rate,
            bands,
            mode,
            blocks_per_row,
            blocks_per_column,
            pixels_per_block_horizontal,
            pixels_per_block_vertical,
            bits_per_pixel,
            display_level,
            attachment_level,
            location,
            magnification,
            user_defined_overflow,
            extended_overflow,
            tres,
        })
    }

    fn write<W: Write>(&self, w: &mut FieldWriter<W>, file_type: FileType) -> Result<()> {
        w.raw(b"IM")?;
        w.text(&self.identifier, 10, "IID1")?;
        w.text(self.date_time.source(), DATE_TIME_WIDTH, "IDATIM")?;
        w.text(&self.target_id, 17, "TGTID")?;
        w.text(&self.title, 80, "IID2")?;
        self.security.write(w, file_type)?;
        write_encryption(w)?;
        w.text(&self.source, 42, "ISORCE")?;
        w.number(self.rows, 8, "NROWS")?;
        w.number(self.columns, 8, "NCOLS")?;
        w.text(self.pixel_value_type.into(), 3, "PVTYPE")?;
        w.text(self.representation.into(), 8, "IREP")?;
        w.text(self.category.into(), 8, "ICAT")?;
        w.number(self.actual_bits_per_pixel, 2, "ABPP")?;
        w.text(self.justification.into(), 1, "PJUST")?;

        let code = self.coordinate_representation.code(file_type).ok_or_else(|| {
            Error::UnsupportedCombination(format!(
                "{:?} coordinates in {file_type}",
                self.coordinate_representation
            ))
        })?;
        w.text(code, 1, "ICORDS")?;
        if self.coordinate_representation != CoordinateRepresentation::None {
            let coordinates = self.coordinates.as_ref().ok_or_else(|| {
                Error::UnsupportedCombination("ICORDS without IGEOLO".to_owned())
            })?;
            w.exact(&coordinates.source(), COORDINATE_SET_WIDTH, "IGEOLO")?;
        }

        if self.comments.len() > MAX_COMMENTS {
            return Err(Error::FieldOverflow {
                field: "NICOM",
                value: self.comments.len().to_string(),
                width: 1,
            });
        }
        w.number(self.comments.len() as u64, 1, "NICOM")?;
        for comment in &self.comments {
            w.text(comment, 80, "ICOM")?;
        }

        w.text(self.compression.into(), 2, "IC")?;
        if self.compression.has_compression_rate() {
            w.text(self.compression_rate.as_deref().unwrap_or_default(), 4, "COMRAT")?;
        }

        if self.bands.len() <= MAX_NBANDS {
            w.number(self.bands.len() as u64, 1, "NBANDS")?;
        } else if file_type.is_nitf20() {
            return Err(Error::FieldOverflow {
                field: "NBANDS",
                value: self.bands.len().to_string(),
                width: 1,
            });
        } else {
            w.number(0u8, 1, "NBANDS")?;
            w.number(self.bands.len() as u64, 5, "XBANDS")?;
        }
        for band in &self.bands {
            band.write(w)?;
        }

        w.number(0u8, 1, "ISYNC")?;
        w.text(self.mode.into(), 1, "IMODE")?;
        w.number(self.blocks_per_row, 4, "NBPR")?;
        w.number(self.blocks_per_column, 4, "NBPC")?;
        w.number(self.pixels_per_block_horizontal, 4, "NPPBH")?;
        w.number(self.pixels_per_block_vertical, 4, "NPPBV")?;
        w.number(self.bits_per_pixel, 2, "NBPP")?;
        w.number(self.display_level, 3, "IDLVL")?;
        w.number(self.attachment_level, 3, "IALVL")?;
        self.location.write(w, "ILOC")?;
        w.text(&self.magnification, 4, "IMAG")?;
        write_extension_section(
            w,
            &self.tres,
            TreSource::UserDefinedImageData,
            self.user_defined_overflow,
            "UDIDL",
            "UDOFL",
        )?;
        write_extension_section(
            w,
            &self.tres,
            TreSource::ImageExtendedSubheaderData,
            self.extended_overflow,
            "IXSHDL",
            "IXSOFL",
        )
    }
}
