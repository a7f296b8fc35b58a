//! Structs and functions relating to D64 disk images.

mod bam;
mod block;
mod chain;
mod d64;
mod error;
mod format;
mod header;
mod image;
mod track;
mod validation;

pub mod directory;
pub mod file;

use std::fmt;
use std::io;
use std::path::Path;

use crate::petscii::Petscii;

pub use self::bam::{decode_bitmap, Bam, BamEntry};
pub use self::block::{Location, Position, Sector, BLOCK_SIZE};
pub use self::chain::{resolve_chain, ChainIterator, ChainReader};
pub use self::d64::D64;
pub use self::error::DiskError;
pub use self::format::{DiskFormat, TrackLayout};
pub use self::header::Header;
pub use self::track::Track;
pub use self::validation::ValidationError;

pub(crate) const PADDING_BYTE: u8 = 0xa0; // For padding filenames, disk name, etc.
pub(crate) const DISK_NAME_SIZE: usize = 16;

/// Open a D64 disk image from a file.
#[inline]
pub fn open<P: AsRef<Path>>(path: P) -> io::Result<D64> {
    D64::open(path)
}

/// A `Geometry` specifies the track and sector layout of a disk image, and
/// also whether it has an error table appended or not.
#[derive(Copy, Clone)]
pub struct Geometry {
    track_layouts: &'static [TrackLayout],
    tracks: u8,
    with_error_table: bool,
}

impl Geometry {
    /// Given a disk image file size, return the first matching geometry.
    pub fn find_by_size(
        size: usize,
        geometries: &[&'static Geometry],
    ) -> Option<&'static Geometry> {
        geometries.iter().find(|g| g.size() == size).copied()
    }

    /// The plain 35-track layout, which is the only one decoded.
    #[inline]
    pub fn is_standard(&self) -> bool {
        self.tracks == 35 && !self.with_error_table
    }

    /// Return the size of this geometry, if it didn't have an error table
    /// attached.
    #[inline]
    fn size_without_error_table(&self) -> usize {
        let tracks = self.tracks as usize;
        self.track_layouts[tracks].byte_offset as usize
            + self.track_layouts[tracks].sectors as usize * BLOCK_SIZE
    }

    /// Return the size of the error table for this geometry, if one existed.
    #[inline]
    fn error_table_size(&self) -> usize {
        // The error table is one byte for every sector in this image.
        self.track_layouts
            .iter()
            .take((self.tracks as usize) + 1)
            .map(|t| t.sectors as usize)
            .sum::<usize>()
    }

    /// Return the total number of bytes used to represent a disk image in this
    /// geometry.
    pub fn size(&self) -> usize {
        if self.with_error_table {
            self.size_without_error_table() + self.error_table_size()
        } else {
            self.size_without_error_table()
        }
    }
}

/// Various fields in CBM DOS are two-byte identifiers which are frequently
/// shown as Petscii strings.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Id([u8; 2]);

impl Id {
    pub fn from_bytes(bytes: &[u8]) -> Id {
        bytes.into()
    }

    pub fn to_petscii(&self) -> Petscii {
        Petscii::from_bytes(&self.0)
    }
}

impl AsRef<[u8]> for Id {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl<'a> From<&'a [u8]> for Id {
    fn from(bytes: &[u8]) -> Id {
        // Best-effort only.  Use the first two bytes for the Id, using zeros
        // for any byte not present.
        Id([
            bytes.first().copied().unwrap_or(0),
            bytes.get(1).copied().unwrap_or(0),
        ])
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.to_petscii())
    }
}
