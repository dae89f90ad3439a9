use image::{DynamicImage, GrayImage, ImageBuffer, Luma, Rgba, RgbaImage};

use super::{layout::SampleGrid, Rendering};
use crate::{
    error::Result,
    segment::image::{BandRepresentation, ImageSubheader, PixelJustification},
};

const TRANSPARENT: Rgba<u8> = Rgba([0, 0, 0, 0]);

pub(crate) type DecodeFn = fn(&ImageSubheader, &SampleGrid) -> Result<Rendering>;

/// Turns deblocked samples into pixels
pub(crate) trait Decoder {
    fn decode(header: &ImageSubheader, grid: &SampleGrid) -> Result<Rendering>;
}

/// Single band grey output, `BITS` per sample container
pub(crate) struct Mono<const BITS: u8>;

/// Grey output from containers that are not 8 or 16 bits wide
pub(crate) struct MonoUnpacked;

/// Packed colour from `R`, `G` and `B` tagged bands
pub(crate) struct Rgb<const BITS: u8>;

/// Colour looked up through the band's tables, `INDEX_BITS` per index
pub(crate) struct Palette<const INDEX_BITS: u8>;

/// The `ABPP` significant bits of a sample stored in an `NBPP` bit container
pub(crate) fn significant(value: u32, header: &ImageSubheader) -> u32 {
    let container = u32::from(header.bits_per_pixel);
    let actual = match u32::from(header.actual_bits_per_pixel) {
        0 => container,
        a => a.min(container),
    };
    match header.justification {
        PixelJustification::Left => value >> (container - actual),
        PixelJustification::Right if actual >= 32 => value,
        PixelJustification::Right => value & ((1 << actual) - 1),
    }
}

/// The band shown by a monochrome rendering: the one tagged `M`, or the first
fn mono_band(header: &ImageSubheader) -> usize {
    header
        .bands
        .iter()
        .position(|b| b.representation == BandRepresentation::Monochrome)
        .unwrap_or(0)
}

/// Bit offset of a band's byte in a packed `0x00RRGGBB` value, [`None`] if not visible
const fn band_shift(representation: BandRepresentation) -> Option<u32> {
    match representation {
        BandRepresentation::Red => Some(16),
        BandRepresentation::Green => Some(8),
        BandRepresentation::Blue => Some(0),
        _ => None,
    }
}

fn to_u8(value: u32) -> u8 {
    u8::try_from(value).unwrap_or(u8::MAX)
}

fn to_u16(value: u32) -> u16 {
    u16::try_from(value).unwrap_or(u16::MAX)
}

fn gray8(grid: &SampleGrid, f: impl Fn(usize) -> u8) -> DynamicImage {
    let width = grid.width as usize;
    DynamicImage::ImageLuma8(GrayImage::from_fn(grid.width, grid.height, |x, y| {
        let i = y as usize * width + x as usize;
        Luma([if grid.is_pad(i) { 0 } else { f(i) }])
    }))
}

fn gray16(grid: &SampleGrid, f: impl Fn(usize) -> u16) -> DynamicImage {
    let width = grid.width as usize;
    DynamicImage::ImageLuma16(ImageBuffer::from_fn(grid.width, grid.height, |x, y| {
        let i = y as usize * width + x as usize;
        Luma([if grid.is_pad(i) { 0 } else { f(i) }])
    }))
}

fn rgba(grid: &SampleGrid, f: impl Fn(usize) -> [u8; 3]) -> DynamicImage {
    let width = grid.width as usize;
    DynamicImage::ImageRgba8(RgbaImage::from_fn(grid.width, grid.height, |x, y| {
        let i = y as usize * width + x as usize;
        if grid.is_pad(i) {
            TRANSPARENT
        } else {
            let [r, g, b] = f(i);
            Rgba([r, g, b, u8::MAX])
        }
    }))
}

impl Decoder for Mono<1> {
    fn decode(header: &ImageSubheader, grid: &SampleGrid) -> Result<Rendering> {
        let band = grid.band(mono_band(header));
        Ok(Rendering::Decoded(gray8(grid, |i| {
            if band[i] == 0 {
                0
            } else {
                u8::MAX
            }
        })))
    }
}

impl Decoder for Mono<8> {
    fn decode(header: &ImageSubheader, grid: &SampleGrid) -> Result<Rendering> {
        let band = grid.band(mono_band(header));
        Ok(Rendering::Decoded(gray8(grid, |i| {
            to_u8(significant(band[i], header))
        })))
    }
}

impl Decoder for Mono<16> {
    fn decode(header: &ImageSubheader, grid: &SampleGrid) -> Result<Rendering> {
        let band = grid.band(mono_band(header));
        Ok(Rendering::Decoded(gray16(grid, |i| {
            to_u16(significant(band[i], header))
        })))
    }
}

impl Decoder for MonoUnpacked {
    fn decode(header: &ImageSubheader, grid: &SampleGrid) -> Result<Rendering> {
        let band = grid.band(mono_band(header));
        let image = if header.actual_bits_per_pixel <= 8 {
            gray8(grid, |i| to_u8(significant(band[i], header)))
        } else {
            gray16(grid, |i| to_u16(significant(band[i], header)))
        };
        Ok(Rendering::Decoded(image))
    }
}

impl Decoder for Rgb<8> {
    fn decode(header: &ImageSubheader, grid: &SampleGrid) -> Result<Rendering> {
        let lanes: Vec<(&[u32], u32)> = header
            .bands
            .iter()
            .enumerate()
            .filter_map(|(i, b)| band_shift(b.representation).map(|shift| (grid.band(i), shift)))
            .collect();
        Ok(Rendering::Decoded(rgba(grid, |i| {
            let packed = lanes
                .iter()
                .fold(0u32, |acc, (band, shift)| acc | ((band[i] & 0xFF) << shift));
            let [_, r, g, b] = packed.to_be_bytes();
            [r, g, b]
        })))
    }
}

impl<const INDEX_BITS: u8> Decoder for Palette<INDEX_BITS> {
    fn decode(header: &ImageSubheader, grid: &SampleGrid) -> Result<Rendering> {
        let Some((index, band)) = header
            .bands
            .iter()
            .enumerate()
            .find(|(_, b)| !b.luts.is_empty())
        else {
            return Ok(Rendering::Unsupported("no lookup tables".to_owned()));
        };
        let tables: Vec<&[u8]> = match band.luts.len() {
            1 => vec![band.luts[0].as_slice(); 3],
            3 => band.luts.iter().map(Vec::as_slice).collect(),
            n => return Ok(Rendering::Unsupported(format!("{n} lookup tables on one band"))),
        };
        let entries = band.lut_entries();
        let samples = grid.band(index);
        if let Some(out_of_range) = (0..samples.len())
            .filter(|&i| !grid.is_pad(i))
            .map(|i| significant(samples[i], header) as usize)
            .find(|&s| s >= entries)
        {
            return Ok(Rendering::Unsupported(format!(
                "index {out_of_range} outside a {entries} entry lookup table"
            )));
        }
        Ok(Rendering::Decoded(rgba(grid, |i| {
            let s = significant(samples[i], header) as usize;
            [tables[0][s], tables[1][s], tables[2][s]]
        })))
    }
}

#[cfg(test)]
mod test {
    use super::significant;
    use crate::segment::image::{ImageSubheader, PixelJustification};

    fn header(nbpp: u8, abpp: u8, justification: PixelJustification) -> ImageSubheader {
        ImageSubheader::builder()
            .rows(1)
            .columns(1)
            .bits_per_pixel(nbpp)
            .actual_bits_per_pixel(abpp)
            .justification(justification)
            .pixels_per_block_horizontal(1)
            .pixels_per_block_vertical(1)
            .build()
    }

    #[test]
    fn justification_selects_significant_bits() {
        let left = header(16, 12, PixelJustification::Left);
        assert_eq!(significant(0xABC0, &left), 0xABC);
        let right = header(16, 12, PixelJustification::Right);
        assert_eq!(significant(0xFABC, &right), 0xABC);
        let unset = header(8, 0, PixelJustification::Right);
        assert_eq!(significant(0xFF, &unset), 0xFF);
    }
}
