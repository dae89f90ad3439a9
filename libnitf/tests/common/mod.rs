#![allow(dead_code)]

use libnitf::{
    tre::TreSource, BandRepresentation, FileHeader, ImageBand, ImageSubheader, Nitf, Payload,
    Segment, Tre,
};

/// `BLOCKA` with ten lines and blank corner locations
pub const BLOCKA: &str = concat!(
    "01",
    "00000",
    "00010",
    "000",
    "000",
    "                ",
    "                     ",
    "                     ",
    "                     ",
    "                     ",
    "     ",
);

pub fn blocka(source: TreSource) -> Tre {
    Tre::opaque("BLOCKA", source, BLOCKA.as_bytes())
}

/// An 8-bit single band image of `rows` x `columns` held in one block
pub fn mono_image(rows: u32, columns: u32, pixels: Vec<u8>) -> Segment<ImageSubheader> {
    let header = ImageSubheader::builder()
        .identifier("MONO".to_owned())
        .rows(rows)
        .columns(columns)
        .actual_bits_per_pixel(8)
        .bits_per_pixel(8)
        .pixels_per_block_horizontal(u16::try_from(columns).expect("columns fit a block"))
        .pixels_per_block_vertical(u16::try_from(rows).expect("rows fit a block"))
        .bands(vec![ImageBand::builder()
            .representation(BandRepresentation::Monochrome)
            .build()])
        .build();
    Segment::new(header, Payload::from(pixels))
}

pub fn nitf(title: &str) -> Nitf {
    Nitf::new(
        FileHeader::builder()
            .title(title)
            .originating_station("TESTSTN")
            .originator_name("libnitf")
            .build(),
    )
}

pub fn to_bytes(nitf: &Nitf) -> anyhow::Result<Vec<u8>> {
    let mut bytes = Vec::new();
    nitf.write_to(&mut bytes)?;
    Ok(bytes)
}
