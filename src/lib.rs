//! Read and write HEIF / ISOBMFF still-image containers.
//!
//! The crate parses a HEIF file into a typed box tree and exposes a
//! query API over it, and writes conforming files from a declarative
//! configuration:
//!
//! - still images and image collections (`meta` encapsulation),
//! - image sequences (`moov`/`trak` encapsulation),
//! - thumbnails, auxiliary images (alpha, depth), Exif/XML metadata,
//! - derived images: grids, overlays, rotations, mirrors, crops,
//! - HEVC/AVC decoder configurations, parsed down to the parameter
//!   sets to recover image geometry (no pixel decoding).
//!
//! Reading a file:
//!
//! ```no_run
//! use heif::io::HeifFile;
//! use heif::reader::HeifReader;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut file = HeifFile::open("image.heic")?;
//!     let mut reader = HeifReader::new();
//!     reader.initialize(&mut file)?;
//!
//!     let ctx = reader.root_meta_context_id()?;
//!     for item_id in reader.get_item_list_by_type(ctx, "master")? {
//!         println!("item {}: {}x{}", item_id,
//!             reader.get_width(ctx, item_id)?,
//!             reader.get_height(ctx, item_id)?);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! Writing a file: build a [`writer::config::WriterConfig`] (or load
//! one from JSON) and hand it to [`writer::HeifWriter`].
//!
#![allow(semicolon_in_expressions_from_macros)]
#[macro_use]
mod ioerr;
#[macro_use]
pub mod macros;
#[macro_use]
pub mod serialize;
#[macro_use]
pub mod types;
pub mod bitio;
pub mod boxes;
pub mod derived;
pub mod error;
pub mod io;
pub mod mp4box;
pub mod nal;
pub mod parser;
pub mod reader;
pub(crate) mod sample_info;
pub mod timeline;
pub mod writer;

pub use crate::error::{Error, Result};
pub use crate::io::HeifFile;
pub use crate::reader::{Heif, HeifReader};
pub use crate::writer::HeifWriter;
