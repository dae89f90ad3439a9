//! Turns blocked, band-interleaved image data into per-band sample planes

use tracing::{debug, trace};

use crate::{
    error::{Error, Result},
    segment::image::{ImageMode, ImageSubheader},
};

const ABSENT_BLOCK: u32 = 0xFFFF_FFFF;

/// Reads MSB-first bit fields
struct BitReader<'a> {
    data: &'a [u8],
    bit: usize,
}

impl<'a> BitReader<'a> {
    const fn new(data: &'a [u8]) -> Self {
        Self { data, bit: 0 }
    }

    fn read(&mut self, bits: usize) -> u32 {
        if bits % 8 == 0 && self.bit % 8 == 0 {
            let start = self.bit / 8;
            self.bit += bits;
            return self.data[start..start + bits / 8]
                .iter()
                .fold(0, |acc, &b| (acc << 8) | u32::from(b));
        }
        let mut value = 0;
        for _ in 0..bits {
            let byte = self.data[self.bit / 8];
            let set = (byte >> (7 - (self.bit % 8))) & 1;
            value = (value << 1) | u32::from(set);
            self.bit += 1;
        }
        value
    }
}

/// The mask table at the start of `NM` image data
#[derive(Debug, Default, PartialEq, Eq)]
pub(crate) struct MaskTable {
    /// `IMDATOFF`
    pub data_offset: usize,
    /// `BMRnBNDm`, empty when every block is present in order
    pub block_offsets: Vec<u32>,
    /// `TPXCD`, when pad pixels are marked
    pub pad_code: Option<u32>,
}

fn be(data: &[u8], at: usize, len: usize, field: &'static str) -> Result<u32> {
    let bytes = data
        .get(at..at + len)
        .ok_or(Error::UnexpectedEof {
            offset: at as u64,
            field,
        })?;
    Ok(bytes.iter().fold(0, |acc, &b| (acc << 8) | u32::from(b)))
}

impl MaskTable {
    pub(crate) fn parse(data: &[u8], records: usize) -> Result<Self> {
        let data_offset = be(data, 0, 4, "IMDATOFF")? as usize;
        let block_record_length = be(data, 4, 2, "BMRLNTH")?;
        let pad_record_length = be(data, 6, 2, "TMRLNTH")?;
        let pad_code_bits = be(data, 8, 2, "TPXCDLNTH")? as usize;
        let mut at = 10;
        let pad_code = if pad_code_bits > 0 {
            let len = pad_code_bits.div_ceil(8);
            let code = be(data, at, len, "TPXCD")?;
            at += len;
            Some(code)
        } else {
            None
        };
        let block_offsets = if block_record_length == 4 {
            (0..records)
                .map(|i| be(data, at + 4 * i, 4, "BMRnBNDm"))
                .collect::<Result<Vec<_>>>()?
        } else {
            Vec::new()
        };
        trace!(
            "mask table: data at {data_offset}, {} block records, pad records {pad_record_length}",
            block_offsets.len()
        );
        Ok(Self {
            data_offset,
            block_offsets,
            pad_code,
        })
    }
}

/// Samples of every band, in raster order
#[derive(Debug)]
pub(crate) struct SampleGrid {
    pub width: u32,
    pub height: u32,
    bands: usize,
    samples: Vec<u32>,
    pad: Vec<bool>,
}

impl SampleGrid {
    fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Samples of band `band`, in raster order
    pub(crate) fn band(&self, band: usize) -> &[u32] {
        let n = self.pixel_count();
        &self.samples[band * n..(band + 1) * n]
    }

    /// Whether pixel `i` is a pad pixel
    pub(crate) fn is_pad(&self, i: usize) -> bool {
        self.pad[i]
    }
}

/// Placement of a block of pixels in the image data
struct Geometry {
    bands: usize,
    bits: usize,
    block_width: usize,
    block_height: usize,
    blocks_per_row: usize,
    blocks: usize,
    /// bytes of one band of one block (`B`, `S`) or of one whole block (`P`, `R`)
    section: usize,
    mode: ImageMode,
}

fn too_large(header: &ImageSubheader) -> Error {
    Error::UnsupportedCombination(format!(
        "{}x{} image with {} bands at {} bits per pixel",
        header.columns,
        header.rows,
        header.band_count(),
        header.bits_per_pixel
    ))
}

fn product(factors: &[usize], header: &ImageSubheader) -> Result<usize> {
    factors
        .iter()
        .try_fold(1usize, |acc, &f| acc.checked_mul(f))
        .ok_or_else(|| too_large(header))
}

impl Geometry {
    fn new(header: &ImageSubheader) -> Result<Self> {
        // NPPBH/NPPBV of 0 means one block spans the image
        let block_width = match header.pixels_per_block_horizontal {
            0 => header.columns as usize,
            n => usize::from(n),
        };
        let block_height = match header.pixels_per_block_vertical {
            0 => header.rows as usize,
            n => usize::from(n),
        };
        let bands = header.band_count();
        let bits = usize::from(header.bits_per_pixel);
        if bits == 0 || bits > 32 || bands == 0 {
            return Err(too_large(header));
        }
        let covered_columns = product(&[usize::from(header.blocks_per_row), block_width], header)?;
        let covered_rows = product(&[usize::from(header.blocks_per_column), block_height], header)?;
        if covered_columns < header.columns as usize || covered_rows < header.rows as usize {
            return Err(Error::UnsupportedCombination(format!(
                "{}x{} blocks of {block_width}x{block_height} pixels do not cover a {}x{} image",
                header.blocks_per_row, header.blocks_per_column, header.columns, header.rows
            )));
        }
        let band_bits = product(&[block_width, block_height, bits], header)?;
        let section = match header.mode {
            ImageMode::Block | ImageMode::Sequential => band_bits.div_ceil(8),
            ImageMode::Pixel | ImageMode::Row => product(&[band_bits, bands], header)?.div_ceil(8),
        };
        Ok(Self {
            bands,
            bits,
            block_width,
            block_height,
            blocks_per_row: usize::from(header.blocks_per_row),
            blocks: header.block_count(),
            section,
            mode: header.mode,
        })
    }

    /// Bytes of image data the present blocks occupy
    fn required_length(&self, block_offsets: &[u32], header: &ImageSubheader) -> Result<usize> {
        let sections_per_record = match self.mode {
            ImageMode::Block => self.bands,
            ImageMode::Sequential if block_offsets.is_empty() => self.bands,
            _ => 1,
        };
        let records = if block_offsets.is_empty() {
            self.blocks
        } else {
            block_offsets.iter().filter(|&&o| o != ABSENT_BLOCK).count()
        };
        product(&[records, sections_per_record, self.section], header)
    }

    /// Number of block mask records
    const fn records(&self) -> usize {
        match self.mode {
            ImageMode::Sequential => self.blocks * self.bands,
            _ => self.blocks,
        }
    }

    /// Sections a block is split into, with the band each one holds
    fn sections(&self) -> Vec<Option<usize>> {
        match self.mode {
            ImageMode::Block | ImageMode::Sequential => (0..self.bands).map(Some).collect(),
            ImageMode::Pixel | ImageMode::Row => vec![None],
        }
    }

    /// Offset of a section when blocks are stored in order
    const fn sequential_offset(&self, block: usize, band: Option<usize>) -> usize {
        match (self.mode, band) {
            (ImageMode::Block, Some(band)) => (block * self.bands + band) * self.section,
            (ImageMode::Sequential, Some(band)) => (band * self.blocks + block) * self.section,
            _ => block * self.section,
        }
    }
}

/// Splits `data` into per-band planes of `header.rows` x `header.columns` samples
///
/// # Errors
///
/// Returns [`Error::LengthMismatch`] if the data is shorter than its blocks require
pub(crate) fn deblock(header: &ImageSubheader, data: &[u8]) -> Result<SampleGrid> {
    let geometry = Geometry::new(header)?;
    let mask = if header.compression.is_masked() {
        Some(MaskTable::parse(data, geometry.records())?)
    } else {
        None
    };
    let image_data = match &mask {
        Some(m) => data.get(m.data_offset..).unwrap_or_default(),
        None => data,
    };
    let pad_code = mask.as_ref().and_then(|m| m.pad_code);
    let block_offsets = mask.as_ref().map_or(&[][..], |m| &m.block_offsets[..]);

    let required = geometry.required_length(block_offsets, header)?;
    if image_data.len() < required {
        return Err(Error::length_mismatch(
            0,
            "image data",
            required as u64,
            image_data.len() as u64,
        ));
    }

    let (width, height) = (header.columns, header.rows);
    let pixels = product(&[width as usize, height as usize], header)?;
    let mut grid = SampleGrid::zeroed(width, height, geometry.bands, pixels)
        .ok_or_else(|| too_large(header))?;
    debug!(
        "deblocking {} blocks of {}x{} in {} mode",
        geometry.blocks, geometry.block_width, geometry.block_height, geometry.mode
    );

    for block in 0..geometry.blocks {
        let origin_row = (block / geometry.blocks_per_row.max(1)) * geometry.block_height;
        let origin_col = (block % geometry.blocks_per_row.max(1)) * geometry.block_width;
        for band in geometry.sections() {
            let offset = if block_offsets.is_empty() {
                Some(geometry.sequential_offset(block, band))
            } else {
                let record = match (geometry.mode, band) {
                    (ImageMode::Sequential, Some(band)) => band * geometry.blocks + block,
                    _ => block,
                };
                match block_offsets[record] {
                    ABSENT_BLOCK => None,
                    o => Some(match (geometry.mode, band) {
                        (ImageMode::Block, Some(band)) => o as usize + band * geometry.section,
                        _ => o as usize,
                    }),
                }
            };
            let Some(offset) = offset else {
                trace!("block {block} absent");
                grid.mark_block_pad(origin_row, origin_col, &geometry);
                continue;
            };
            let section = image_data
                .get(offset..offset + geometry.section)
                .ok_or_else(|| {
                    Error::length_mismatch(
                        offset as u64,
                        "image block",
                        geometry.section as u64,
                        image_data.len().saturating_sub(offset) as u64,
                    )
                })?;
            grid.fill_section(section, band, origin_row, origin_col, &geometry);
        }
    }

    if let Some(code) = pad_code {
        for i in 0..pixels {
            if (0..grid.bands).all(|b| grid.samples[b * pixels + i] == code) {
                grid.pad[i] = true;
            }
        }
    }
    Ok(grid)
}

impl SampleGrid {
    /// An all-zero grid, [`None`] if it cannot be allocated
    fn zeroed(width: u32, height: u32, bands: usize, pixels: usize) -> Option<Self> {
        let mut samples = Vec::new();
        samples.try_reserve_exact(pixels.checked_mul(bands)?).ok()?;
        samples.resize(pixels * bands, 0);
        let mut pad = Vec::new();
        pad.try_reserve_exact(pixels).ok()?;
        pad.resize(pixels, false);
        Some(Self {
            width,
            height,
            bands,
            samples,
            pad,
        })
    }

    fn store(&mut self, band: usize, row: usize, col: usize, value: u32) {
        if row < self.height as usize && col < self.width as usize {
            let n = self.pixel_count();
            self.samples[band * n + row * self.width as usize + col] = value;
        }
    }

    fn mark_block_pad(&mut self, origin_row: usize, origin_col: usize, geometry: &Geometry) {
        for y in origin_row..origin_row + geometry.block_height {
            for x in origin_col..origin_col + geometry.block_width {
                if y < self.height as usize && x < self.width as usize {
                    self.pad[y * self.width as usize + x] = true;
                }
            }
        }
    }

    fn fill_section(
        &mut self,
        section: &[u8],
        band: Option<usize>,
        origin_row: usize,
        origin_col: usize,
        geometry: &Geometry,
    ) {
        let mut bits = BitReader::new(section);
        let (bw, bh, bpp) = (geometry.block_width, geometry.block_height, geometry.bits);
        match (geometry.mode, band) {
            (_, Some(band)) => {
                for y in 0..bh {
                    for x in 0..bw {
                        self.store(band, origin_row + y, origin_col + x, bits.read(bpp));
                    }
                }
            }
            (ImageMode::Row, None) => {
                for y in 0..bh {
                    for band in 0..geometry.bands {
                        for x in 0..bw {
                            self.store(band, origin_row + y, origin_col + x, bits.read(bpp));
                        }
                    }
                }
            }
            (_, None) => {
                for y in 0..bh {
                    for x in 0..bw {
                        for band in 0..geometry.bands {
                            self.store(band, origin_row + y, origin_col + x, bits.read(bpp));
                        }
                    }
                }
            }
        }
    }
}
