//! Display of uncompressed image segments
//!
//! Only `NC` and `NM` data is decoded here. Each combination of pixel value type, band layout and
//! bit width that can be shown maps to one decoder; anything else yields
//! [`Rendering::Unsupported`] with a description of what was found, so callers can hand the data
//! to an external codec instead.

mod decode;
mod layout;

use image::DynamicImage;
use itertools::Itertools;
use tracing::{debug, info};

use self::decode::{DecodeFn, Decoder, Mono, MonoUnpacked, Palette, Rgb};
use crate::{
    error::{Error, Result},
    segment::{
        image::{
            BandRepresentation, ImageCompression, ImageRepresentation, ImageSubheader,
            PixelValueType,
        },
        Segment,
    },
};

/// Result of rendering an image segment
#[derive(Debug, Clone, PartialEq)]
pub enum Rendering {
    /// Decoded pixels. Grey images are `Luma8` or `Luma16`, colour images are `Rgba8` with pad
    /// pixels fully transparent
    Decoded(DynamicImage),
    /// The segment's representation cannot be shown
    Unsupported(String),
    /// The segment's data was not kept when reading
    NoData,
}

impl Rendering {
    /// The decoded pixels, if any
    #[must_use]
    pub const fn image(&self) -> Option<&DynamicImage> {
        match self {
            Self::Decoded(image) => Some(image),
            _ => None,
        }
    }

    /// Takes the decoded pixels, if any
    #[must_use]
    pub fn into_image(self) -> Option<DynamicImage> {
        match self {
            Self::Decoded(image) => Some(image),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum BandLayout {
    Mono,
    Rgb,
    Palette,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum BitWidth {
    One,
    Eight,
    Sixteen,
    /// 2 to 15 bits, other than 8
    Packed,
    Wide,
}

impl BitWidth {
    const fn of(bits: u8) -> Self {
        match bits {
            1 => Self::One,
            8 => Self::Eight,
            16 => Self::Sixteen,
            2..=15 => Self::Packed,
            _ => Self::Wide,
        }
    }
}

type Key = (PixelValueType, BandLayout, BitWidth);

const DECODERS: &[(Key, DecodeFn)] = &[
    (
        (PixelValueType::Bilevel, BandLayout::Mono, BitWidth::One),
        <Mono<1> as Decoder>::decode,
    ),
    (
        (PixelValueType::Integer, BandLayout::Mono, BitWidth::One),
        <Mono<1> as Decoder>::decode,
    ),
    (
        (PixelValueType::Integer, BandLayout::Mono, BitWidth::Eight),
        <Mono<8> as Decoder>::decode,
    ),
    (
        (PixelValueType::Integer, BandLayout::Mono, BitWidth::Packed),
        <MonoUnpacked as Decoder>::decode,
    ),
    (
        (PixelValueType::Integer, BandLayout::Mono, BitWidth::Sixteen),
        <Mono<16> as Decoder>::decode,
    ),
    (
        (PixelValueType::Integer, BandLayout::Rgb, BitWidth::Eight),
        <Rgb<8> as Decoder>::decode,
    ),
    (
        (PixelValueType::Bilevel, BandLayout::Palette, BitWidth::One),
        <Palette<1> as Decoder>::decode,
    ),
    (
        (PixelValueType::Integer, BandLayout::Palette, BitWidth::One),
        <Palette<1> as Decoder>::decode,
    ),
    (
        (PixelValueType::Integer, BandLayout::Palette, BitWidth::Eight),
        <Palette<8> as Decoder>::decode,
    ),
];

fn band_layout(header: &ImageSubheader) -> Option<BandLayout> {
    let count = |representation| {
        header
            .bands
            .iter()
            .filter(|b| b.representation == representation)
            .count()
    };
    let has_rgb = [
        BandRepresentation::Red,
        BandRepresentation::Green,
        BandRepresentation::Blue,
    ]
    .into_iter()
    .all(|r| count(r) > 0);
    let single = match header.bands.as_slice() {
        [band] => Some(band),
        _ => None,
    };

    match header.representation {
        ImageRepresentation::Monochrome => single.map(|band| {
            if band.luts.is_empty() {
                BandLayout::Mono
            } else {
                BandLayout::Palette
            }
        }),
        ImageRepresentation::RgbLut => single
            .filter(|band| !band.luts.is_empty())
            .map(|_| BandLayout::Palette),
        ImageRepresentation::Multiband | ImageRepresentation::Rgb if has_rgb => {
            Some(BandLayout::Rgb)
        }
        ImageRepresentation::Multiband if count(BandRepresentation::Monochrome) == 1 => {
            Some(BandLayout::Mono)
        }
        _ => None,
    }
}

fn describe(header: &ImageSubheader) -> String {
    format!(
        "{} {} image at {} bits per pixel, bands [{}]",
        header.pixel_value_type,
        header.representation,
        header.bits_per_pixel,
        header.bands.iter().map(|b| b.representation).join(",")
    )
}

/// Decodes the data of an image segment described by `header`
///
/// Representations that cannot be shown are not an error.
///
/// # Errors
///
/// This function will error if:
/// - `data` is shorter than the header's blocks require ([`Error::LengthMismatch`])
/// - the header is inconsistent: bilevel pixels not 1 bit wide, blocks that do not cover the
///   image, or dimensions too large to address ([`Error::UnsupportedCombination`])
pub fn render_image(header: &ImageSubheader, data: &[u8]) -> Result<Rendering> {
    if !matches!(
        header.compression,
        ImageCompression::NotCompressed | ImageCompression::NotCompressedMasked
    ) {
        return Ok(Rendering::Unsupported(format!(
            "{} compressed data",
            header.compression
        )));
    }
    if header.pixel_value_type == PixelValueType::Bilevel && header.bits_per_pixel != 1 {
        return Err(Error::UnsupportedCombination(format!(
            "bilevel pixels declared with {} bits per pixel",
            header.bits_per_pixel
        )));
    }

    let Some(bands) = band_layout(header) else {
        return Ok(Rendering::Unsupported(describe(header)));
    };
    let key = (
        header.pixel_value_type,
        bands,
        BitWidth::of(header.bits_per_pixel),
    );
    let Some((_, decode)) = DECODERS.iter().find(|(k, _)| *k == key) else {
        return Ok(Rendering::Unsupported(describe(header)));
    };

    debug!(?key, rows = header.rows, columns = header.columns, "rendering image");
    let grid = layout::deblock(header, data)?;
    decode(header, &grid)
}

impl Segment<ImageSubheader> {
    /// Decodes this segment's pixels
    ///
    /// Returns [`Rendering::NoData`] if the payload was skipped when reading.
    ///
    /// # Errors
    ///
    /// See [`render_image`]; a spooled payload that cannot be read is [`Error::Io`]
    pub fn render(&self) -> Result<Rendering> {
        let Some(payload) = self.payload() else {
            info!(id = %self.header().identifier, "image payload was not kept");
            return Ok(Rendering::NoData);
        };
        render_image(self.header(), &payload.to_vec()?)
    }
}

#[cfg(test)]
mod test {
    use image::{GenericImageView, Luma, Rgba};
    use pretty_assertions::assert_eq;
    use tracing_test::traced_test;

    use super::{render_image, Rendering};
    use crate::{
        error::{Error, Result},
        heap::Payload,
        segment::{
            image::{
                BandRepresentation, ImageBand, ImageCompression, ImageMode, ImageRepresentation,
                ImageSubheader, PixelJustification, PixelValueType,
            },
            Segment,
        },
    };

    fn header(
        representation: ImageRepresentation,
        bands: Vec<ImageBand>,
        bits: u8,
        columns: u32,
    ) -> ImageSubheader {
        ImageSubheader::builder()
            .rows(1)
            .columns(columns)
            .representation(representation)
            .actual_bits_per_pixel(bits)
            .bits_per_pixel(bits)
            .pixels_per_block_horizontal(u16::try_from(columns).unwrap())
            .pixels_per_block_vertical(1)
            .mode(ImageMode::Pixel)
            .bands(bands)
            .build()
    }

    fn band(representation: BandRepresentation) -> ImageBand {
        ImageBand::builder().representation(representation).build()
    }

    fn lut_band(luts: Vec<Vec<u8>>) -> ImageBand {
        ImageBand::builder()
            .representation(BandRepresentation::Lut)
            .luts(luts)
            .build()
    }

    fn pixels(rendering: &Rendering) -> Vec<[u8; 4]> {
        let image = rendering.image().expect("decoded image");
        image.pixels().map(|(_, _, p)| p.0).collect()
    }

    #[test]
    fn eight_bit_indices_select_palette_colours() -> Result<()> {
        let mono = header(
            ImageRepresentation::Monochrome,
            vec![lut_band(vec![vec![255, 0], vec![0, 0], vec![0, 255]])],
            8,
            2,
        );
        let rendering = render_image(&mono, &[0, 1])?;
        assert_eq!(pixels(&rendering), [[255, 0, 0, 255], [0, 0, 255, 255]]);
        Ok(())
    }

    #[test]
    fn single_table_palette_is_grey() -> Result<()> {
        let mono = header(
            ImageRepresentation::Monochrome,
            vec![lut_band(vec![vec![0, 128]])],
            8,
            2,
        );
        let rendering = render_image(&mono, &[1, 0])?;
        assert_eq!(pixels(&rendering), [[128, 128, 128, 255], [0, 0, 0, 255]]);
        Ok(())
    }

    #[test]
    fn one_bit_rgb_lut() -> Result<()> {
        let mut image = header(
            ImageRepresentation::RgbLut,
            vec![lut_band(vec![vec![0, 10], vec![0, 20], vec![0, 30]])],
            1,
            8,
        );
        image.pixel_value_type = PixelValueType::Bilevel;
        let rendering = render_image(&image, &[0b1010_0000])?;
        let expected: Vec<[u8; 4]> = [1, 0, 1, 0, 0, 0, 0, 0]
            .into_iter()
            .map(|bit| if bit == 1 { [10, 20, 30, 255] } else { [0, 0, 0, 255] })
            .collect();
        assert_eq!(pixels(&rendering), expected);
        Ok(())
    }

    #[test]
    fn rgb_bands_pack_into_colour() -> Result<()> {
        let rgb = header(
            ImageRepresentation::Rgb,
            vec![
                band(BandRepresentation::Red),
                band(BandRepresentation::Green),
                band(BandRepresentation::Blue),
            ],
            8,
            1,
        );
        let rendering = render_image(&rgb, &[10, 20, 30])?;
        assert_eq!(pixels(&rendering), [[10, 20, 30, 255]]);
        Ok(())
    }

    #[test]
    fn band_order_follows_tags() -> Result<()> {
        let multi = header(
            ImageRepresentation::Multiband,
            vec![
                band(BandRepresentation::Blue),
                band(BandRepresentation::Unspecified),
                band(BandRepresentation::Green),
                band(BandRepresentation::Red),
            ],
            8,
            1,
        );
        let rendering = render_image(&multi, &[30, 99, 20, 10])?;
        assert_eq!(pixels(&rendering), [[10, 20, 30, 255]]);
        Ok(())
    }

    #[test]
    fn packed_mono_samples_are_unpacked() -> Result<()> {
        let mono = header(
            ImageRepresentation::Monochrome,
            vec![band(BandRepresentation::Monochrome)],
            12,
            2,
        );
        let rendering = render_image(&mono, &[0xAB, 0xCD, 0xEF])?;
        let Rendering::Decoded(image) = rendering else {
            panic!("expected pixels, got {rendering:?}");
        };
        let grey = image.as_luma16().expect("16 bit grey");
        assert_eq!(grey.get_pixel(0, 0), &Luma([0xABC]));
        assert_eq!(grey.get_pixel(1, 0), &Luma([0xDEF]));
        Ok(())
    }

    #[test]
    fn left_justified_sixteen_bit_mono() -> Result<()> {
        let mut mono = header(
            ImageRepresentation::Monochrome,
            vec![band(BandRepresentation::Monochrome)],
            16,
            1,
        );
        mono.actual_bits_per_pixel = 12;
        mono.justification = PixelJustification::Left;
        let rendering = render_image(&mono, &[0xAB, 0xC0])?;
        let image = rendering.into_image().expect("decoded image");
        assert_eq!(image.as_luma16().unwrap().get_pixel(0, 0), &Luma([0xABC]));
        Ok(())
    }

    #[test]
    fn unsupported_representations_are_described() -> Result<()> {
        let mut signed = header(
            ImageRepresentation::Monochrome,
            vec![band(BandRepresentation::Monochrome)],
            8,
            1,
        );
        signed.pixel_value_type = PixelValueType::SignedInteger;
        assert!(matches!(render_image(&signed, &[0])?, Rendering::Unsupported(_)));

        let mut compressed = signed.clone();
        compressed.pixel_value_type = PixelValueType::Integer;
        compressed.compression = ImageCompression::Jpeg;
        assert!(matches!(render_image(&compressed, &[])?, Rendering::Unsupported(_)));

        let wide_rgb = header(
            ImageRepresentation::Rgb,
            vec![
                band(BandRepresentation::Red),
                band(BandRepresentation::Green),
                band(BandRepresentation::Blue),
            ],
            16,
            1,
        );
        assert!(matches!(render_image(&wide_rgb, &[0; 6])?, Rendering::Unsupported(_)));
        Ok(())
    }

    #[test]
    fn rgb_tags_take_priority_in_multiband() -> Result<()> {
        let multi = header(
            ImageRepresentation::Multiband,
            vec![
                band(BandRepresentation::Red),
                band(BandRepresentation::Green),
                band(BandRepresentation::Blue),
                band(BandRepresentation::Monochrome),
            ],
            8,
            1,
        );
        let rendering = render_image(&multi, &[10, 20, 30, 40])?;
        assert_eq!(pixels(&rendering), [[10, 20, 30, 255]]);
        Ok(())
    }

    #[test]
    fn bilevel_needs_one_bit_pixels() {
        let mut bilevel = header(
            ImageRepresentation::Monochrome,
            vec![band(BandRepresentation::Monochrome)],
            8,
            1,
        );
        bilevel.pixel_value_type = PixelValueType::Bilevel;
        assert!(matches!(
            render_image(&bilevel, &[1]),
            Err(Error::UnsupportedCombination(_))
        ));
    }

    #[test]
    fn oversized_declaration_is_an_error() {
        let mut mono = header(
            ImageRepresentation::Monochrome,
            vec![band(BandRepresentation::Monochrome)],
            8,
            1,
        );
        mono.rows = 99_999_999;
        mono.columns = 99_999_999;
        mono.pixels_per_block_horizontal = 0;
        mono.pixels_per_block_vertical = 0;
        let segment = Segment::new(mono, Payload::from(vec![1, 2, 3, 4]));
        assert!(matches!(
            segment.render(),
            Err(Error::LengthMismatch { declared, consumed: 4, .. }) if declared > 4
        ));
    }

    #[test]
    fn out_of_range_index_is_unsupported() -> Result<()> {
        let mono = header(
            ImageRepresentation::Monochrome,
            vec![lut_band(vec![vec![0, 255]])],
            8,
            1,
        );
        assert!(matches!(render_image(&mono, &[2])?, Rendering::Unsupported(_)));
        Ok(())
    }

    #[rustfmt::skip]
    #[test]
    fn pad_pixels_are_transparent() -> Result<()> {
        let mut image = header(
            ImageRepresentation::RgbLut,
            vec![lut_band(vec![vec![0, 1, 2], vec![0, 1, 2], vec![0, 1, 2]])],
            8,
            2,
        );
        image.compression = ImageCompression::NotCompressedMasked;
        let data = [
            0, 0, 0, 11,  // IMDATOFF
            0, 0,         // BMRLNTH
            0, 0,         // TMRLNTH
            0, 8,         // TPXCDLNTH
            0,            // TPXCD
            2, 0,
        ];
        let rendering = render_image(&image, &data)?;
        assert_eq!(pixels(&rendering), [[2, 2, 2, 255], [0, 0, 0, 0]]);
        Ok(())
    }

    #[test]
    #[traced_test]
    fn skipped_payload_renders_nothing() -> Result<()> {
        let mono = header(
            ImageRepresentation::Monochrome,
            vec![band(BandRepresentation::Monochrome)],
            8,
            1,
        );
        assert_eq!(Segment::new(mono.clone(), None::<Payload>).render()?, Rendering::NoData);
        assert!(logs_contain("image payload was not kept"));
        let segment = Segment::new(mono, Payload::from(vec![42]));
        let image = segment.render()?.into_image().expect("decoded image");
        assert_eq!(image.as_luma8().unwrap().get_pixel(0, 0), &Luma([42]));
        Ok(())
    }

    #[test]
    fn rgba_output_is_opaque() -> Result<()> {
        let rgb = header(
            ImageRepresentation::Rgb,
            vec![
                band(BandRepresentation::Red),
                band(BandRepresentation::Green),
                band(BandRepresentation::Blue),
            ],
            8,
            1,
        );
        let image = render_image(&rgb, &[1, 2, 3])?.into_image().expect("decoded image");
        assert_eq!(image.as_rgba8().unwrap().get_pixel(0, 0), &Rgba([1, 2, 3, 255]));
        Ok(())
    }
}
