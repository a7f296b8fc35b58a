//! CBM DOS files

use std::cell::OnceCell;
use std::io::{self, Read, Write};

use crate::disk::block::{Location, BLOCK_SIZE};
use crate::disk::chain::{resolve_chain, ChainReader};
use crate::disk::directory::{DirectoryEntry, FileType};
use crate::disk::D64;
use crate::petscii::Petscii;
use crate::util;

/// A file listed in the directory of a disk image.
///
/// A `File` only records where its data lives.  Every method that needs the
/// data takes the `D64` it was read from; the sector chain and the raw
/// contents are resolved on first use and kept.
pub struct File {
    entry: DirectoryEntry,
    chain: OnceCell<Vec<Location>>,
    content: OnceCell<Vec<u8>>,
}

impl File {
    pub(crate) fn new(entry: DirectoryEntry) -> File {
        File {
            entry,
            chain: OnceCell::new(),
            content: OnceCell::new(),
        }
    }

    /// Return a reference to the directory entry this file came from.
    #[inline]
    pub fn entry(&self) -> &DirectoryEntry {
        &self.entry
    }

    #[inline]
    pub fn name(&self) -> &Petscii {
        &self.entry.filename
    }

    #[inline]
    pub fn file_type(&self) -> FileType {
        self.entry.file_attributes.file_type
    }

    /// The size in blocks, as shown in a directory listing.
    #[inline]
    pub fn size(&self) -> u16 {
        self.entry.file_size()
    }

    #[inline]
    pub fn first_sector(&self) -> Location {
        self.entry.first_sector
    }

    #[inline]
    pub fn is_closed(&self) -> bool {
        self.entry.file_attributes.closed_flag
    }

    #[inline]
    pub fn is_locked(&self) -> bool {
        self.entry.file_attributes.locked_flag
    }

    /// Return the sectors holding this file, in chain order.  A file whose
    /// first track is zero has an empty chain.
    pub fn chain(&self, disk: &D64) -> io::Result<&[Location]> {
        if let Some(chain) = self.chain.get() {
            return Ok(chain);
        }
        let chain = resolve_chain(disk, self.entry.first_sector)?;
        Ok(self.chain.get_or_init(|| chain))
    }

    /// Return the full 256-byte blocks of the chain joined in order, link
    /// bytes and any unused tail included.
    pub fn content(&self, disk: &D64) -> io::Result<&[u8]> {
        if let Some(content) = self.content.get() {
            return Ok(content);
        }
        let chain = self.chain(disk)?;
        let mut content = Vec::with_capacity(chain.len() * BLOCK_SIZE);
        for location in chain {
            content.extend_from_slice(disk.sector(*location)?.data());
        }
        Ok(self.content.get_or_init(|| content))
    }

    /// Return a reader over the file's data: the link bytes are skipped and
    /// the last sector is cut to its used length.
    pub fn reader<'a>(&self, disk: &'a D64) -> ChainReader<'a> {
        ChainReader::new(disk, self.entry.first_sector)
    }

    /// Read the file's data into memory.
    pub fn data(&self, disk: &D64) -> io::Result<Vec<u8>> {
        let mut data = vec![];
        self.reader(disk).read_to_end(&mut data)?;
        Ok(data)
    }

    /// Hex-dump the file data to the provided writer.
    pub fn dump(&self, disk: &D64, writer: &mut dyn Write) -> io::Result<()> {
        writeln!(writer, "Filename: \"{}\"", self.name())?;
        writeln!(writer, "Sectors: {}", Location::format_locations(self.chain(disk)?))?;
        writeln!(writer, "{}", util::hex(&self.data(disk)?))?;
        Ok(())
    }
}
