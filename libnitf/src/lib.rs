//! # libnitf
//!
//!
//! This library provides datatypes and i/o functionality for NITF 2.0, NITF 2.1 and NSIF 1.0
//! files, the segmented container used for national and allied imagery exchange.
//!
//! A file is a header followed by typed segments: images, graphics (symbols and labels in 2.0
//! files), texts, data extensions and reserved extensions. Each segment is a subheader and an
//! opaque payload. The library reads and writes all of them, decodes tagged record extensions
//! (TREs) through a registry of layouts, and renders uncompressed images.
//!
//! It aims to provide a low-level API to build upon. Lengths, counts and offsets are computed
//! while writing, but the responsibility of filling subheaders with meaningful values is placed on
//! the users of this crate.
//!
//! ### Limitations
//!
//! - Compressed image data (`C1` to `C8`, `I1`, `M1` to `M8`) is carried as bytes, not decoded.
//!   [`Segment::render`] reports [`Rendering::Unsupported`] for it.
//! - Files are read front to back. Streaming files, whose header length is a placeholder, are
//!   accepted without the length check.
//! - Symbol lookup tables (2.0 `NELUT` above zero) are rejected.
//!
//! ### Usage
//!
//! #### Reading a file
//!
//! Payloads are kept in memory by default. [`ParseOptions`] changes where they go and which TRE
//! layouts are known.
//!
//! ```rust
//! use libnitf::{HeapStrategy, Nitf, ParseOptions, SpoolPredicate};
//!
//! # fn main() -> libnitf::Result<()> {
//! # let mut bytes = Vec::new();
//! # Nitf::new(libnitf::FileHeader::builder().build()).write_to(&mut bytes)?;
//! let options = ParseOptions::builder()
//!     .heap(HeapStrategy::builder().spool(SpoolPredicate::Above(1 << 20)).build())
//!     .build();
//! let nitf = Nitf::from_reader_with(bytes.as_slice(), &options)?;
//! for image in nitf.images() {
//!     println!("{} rows", image.header().rows);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! #### Writing and rendering an image
//!
//! ```rust
//! use libnitf::{
//!     BandRepresentation, FileHeader, ImageBand, ImageSubheader, Nitf, Payload, Segment,
//! };
//!
//! fn main() -> anyhow::Result<()> {
//!     let mut nitf = Nitf::new(FileHeader::builder().title("checkerboard").build());
//!     let image = ImageSubheader::builder()
//!         .rows(2)
//!         .columns(2)
//!         .actual_bits_per_pixel(8)
//!         .bits_per_pixel(8)
//!         .pixels_per_block_horizontal(2)
//!         .pixels_per_block_vertical(2)
//!         .bands(vec![ImageBand::builder()
//!             .representation(BandRepresentation::Monochrome)
//!             .build()])
//!         .build();
//!     nitf.images_mut()
//!         .push(Segment::new(image, Payload::from(vec![0, 255, 255, 0])));
//!
//!     let mut bytes = Vec::new();
//!     nitf.write_to(&mut bytes)?;
//!
//!     let read = Nitf::from_reader(bytes.as_slice())?;
//!     let pixels = read.images()[0].render()?.into_image();
//!     assert_eq!(
//!         pixels.and_then(|p| p.as_luma8().map(|g| g.get_pixel(1, 0).0)),
//!         Some([255])
//!     );
//!     Ok(())
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    missing_docs
)]

pub mod coords;
mod datetime;
mod error;
mod file_type;
mod header;
mod heap;
mod nitf;
mod options;
mod reader;
mod render;
mod security;
mod segment;
pub mod tre;
mod writer;

pub use datetime::{NitfDateTime, DATE_TIME_WIDTH};
pub use error::{Error, Result};
pub use file_type::FileType;
pub use header::{FileHeader, STREAMING_FILE_LENGTH};
pub use heap::{HeapStrategy, MemoryBudget, Payload, SpoolPredicate};
pub use nitf::Nitf;
pub use options::ParseOptions;
pub use render::{render_image, Rendering};
pub use security::{
    Classification, FileSecurityMetadata, Nitf20Security, Nitf21Security, SecurityMetadata,
};
pub use segment::des::{
    is_overflow_identifier, DataExtensionSubheader, OverflowSection, TreOverflow,
    CONTROLLED_EXTENSIONS, REGISTERED_EXTENSIONS, TRE_OVERFLOW,
};
pub use segment::graphic::{GraphicColour, GraphicSubheader};
pub use segment::image::{
    BandRepresentation, ImageBand, ImageCategory, ImageCompression, ImageMode,
    ImageRepresentation, ImageSubheader, PixelJustification, PixelValueType,
};
pub use segment::label::LabelSubheader;
pub use segment::res::ReservedExtensionSubheader;
pub use segment::symbol::{SymbolColour, SymbolSubheader, SymbolType};
pub use segment::text::{TextFormat, TextSubheader};
pub use segment::{Location, Segment, SegmentHeader, SegmentKind};
pub use tre::{Tre, TreCollection, TreRegistry};
