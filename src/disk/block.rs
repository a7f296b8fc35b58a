use std::fmt;
use std::io;

use crate::disk::error::DiskError;
use crate::util;

pub const BLOCK_SIZE: usize = 256;

#[derive(PartialEq, Eq, Hash, Clone, Copy, Debug, PartialOrd, Ord)]
pub struct Location(pub u8, pub u8); // Track and sector

impl Location {
    #[inline]
    pub fn new(track: u8, sector: u8) -> Location {
        Location(track, sector)
    }

    pub fn from_bytes(bytes: &[u8]) -> Location {
        assert!(bytes.len() >= 2);
        Location(bytes[0], bytes[1])
    }

    #[inline]
    pub fn track(&self) -> u8 {
        self.0
    }

    #[inline]
    pub fn sector(&self) -> u8 {
        self.1
    }

    pub fn format_locations(locations: &[Location]) -> String {
        locations
            .iter()
            .map(|l| l.to_string())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "({},{})", self.0, self.1)
    }
}

/// The place a fixed-size record (e.g. a directory entry) was read from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Position {
    pub location: Location,
    pub offset: u8,
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "({},{}@0x{:02x})",
            self.location.0, self.location.1, self.offset
        )
    }
}

/// One 256-byte block of the disk image.
///
/// A sector starts out as occupied; the BAM decoder marks it free once the
/// allocation bitmap has been read.
#[derive(Clone)]
pub struct Sector {
    location: Location,
    data: [u8; BLOCK_SIZE],
    free: bool,
}

impl Sector {
    pub(crate) fn new(location: Location, bytes: &[u8]) -> Sector {
        let mut data = [0u8; BLOCK_SIZE];
        data.copy_from_slice(&bytes[..BLOCK_SIZE]);
        Sector {
            location,
            data,
            free: false,
        }
    }

    #[inline]
    pub fn location(&self) -> Location {
        self.location
    }

    #[inline]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn byte(&self, offset: usize) -> io::Result<u8> {
        self.data
            .get(offset)
            .copied()
            .ok_or_else(|| DiskError::InvalidOffset.into())
    }

    pub fn range(&self, offset: usize, length: usize) -> io::Result<&[u8]> {
        match offset.checked_add(length) {
            Some(end) if end <= BLOCK_SIZE => Ok(&self.data[offset..end]),
            _ => Err(DiskError::InvalidOffset.into()),
        }
    }

    /// The location stored in the first two bytes, or None if the track byte
    /// is zero (the last block of a chain).
    #[inline]
    pub fn next_location(&self) -> Option<Location> {
        match self.data[0] {
            0 => None,
            track => Some(Location(track, self.data[1])),
        }
    }

    #[inline]
    pub fn is_free(&self) -> bool {
        self.free
    }

    #[inline]
    pub(crate) fn set_free(&mut self, free: bool) {
        self.free = free;
    }
}

impl fmt::Debug for Sector {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(
            f,
            "track {:02} sector {:02} ({})",
            self.location.0,
            self.location.1,
            if self.free { "free" } else { "used" }
        )?;
        util::hexdump(f, "", &self.data)
    }
}
