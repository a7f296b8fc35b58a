//! This is a Rust library for reading Commodore 1541 disk images in the "D64"
//! format: 35 tracks of 256-byte sectors holding a disk header, a Block
//! Availability Map (BAM), a directory, and files stored as chains of linked
//! sectors.
//!
//! Features:
//!
//! * Load a D64 image from a file (memory-mapped) or from bytes in memory.
//! * Read the disk name, id and DOS type from the header.
//! * Decode the BAM into per-sector free flags, and count blocks free.
//! * List the directory in on-disk order.
//! * Resolve each file's sector chain and read its contents, either as raw
//!   256-byte blocks or as the data stream CBM DOS would return.
//! * Find the sector CBM DOS would pick for a new file.
//! * Validate the consistency of disk images.
//! * A sample `d64` program for inspecting disk images from the command line.
//!
//! Images are never written.  40-track images and images with an appended
//! error table are recognised by their size but are not decoded.
//!
//! # Example
//!
//! The following example opens a disk image and prints its directory the way
//! a 1541 would list it:
//!
//! ```
//! use std::io;
//! use d64::disk;
//! # fn list(disk_image_filename: &str) -> io::Result<()> {
//!
//! let disk = disk::open(disk_image_filename)?;
//! println!("{}", disk);
//! for file in disk.directory() {
//!     println!("{}", file.entry());
//! }
//! println!("{} blocks free.", disk.free_blocks());
//! # Ok(())
//! # }
//! ```
//!
//! # Design of disk image access
//!
//! 1. `Image` provides access to the underlying storage containing the disk
//!    image -- either a mapped disk image file or an in-memory array.
//! 2. `D64` checks the image size against the known geometries and divides
//!    the image into `Track`s of `Sector`s.
//! 3. `DiskFormat` describes where CBM DOS keeps the disk header, the BAM,
//!    and the directory, and how it picks free sectors.
//! 4. The header, BAM and directory are decoded once, at load time.  A
//!    `File` holds only the locations of its data; its sector chain and
//!    contents are resolved from the `D64` on first use.
//!
//! CBM DOS tracks start at 1 instead of 0.  The API reflects this 1-based
//! indexing, as does `DiskFormat.tracks` (with the zeroth track unused),
//! while the track list held by `D64` and the BAM entries are 0-based.
//!
//! # License
//!
//! D64 is distributed under the terms of both the MIT license and the
//! Apache License (Version 2.0).

pub mod disk;

mod petscii;
mod util;

pub use crate::petscii::Petscii;
