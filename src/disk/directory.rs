//! CBM DOS directories

use std::fmt;
use std::fmt::Write;

use log::{debug, warn};

use crate::disk::block::{Location, Position, BLOCK_SIZE};
use crate::disk::chain::ChainIterator;
use crate::disk::file::File;
use crate::disk::{D64, PADDING_BYTE};
use crate::petscii::Petscii;

const FILE_TYPE_DEL: u8 = 0x00;
const FILE_TYPE_SEQ: u8 = 0x01;
const FILE_TYPE_PRG: u8 = 0x02;
const FILE_TYPE_USR: u8 = 0x03;
const FILE_TYPE_REL: u8 = 0x04;
const FILE_ATTRIB_FILE_TYPE_MASK: u8 = 0x0F;
const FILE_ATTRIB_UNUSED_MASK: u8 = 0x10;
const FILE_ATTRIB_SAVE_WITH_REPLACE_MASK: u8 = 0x20;
const FILE_ATTRIB_LOCKED_MASK: u8 = 0x40;
const FILE_ATTRIB_CLOSED_MASK: u8 = 0x80;

/// A directory entry categorizes files as SEQ, PRG, USR, or REL, along with a
/// pseudo-file-type of DEL to indicate deleted files.
#[derive(PartialEq, Eq, Debug, Clone, Copy)]
pub enum FileType {
    DEL,
    SEQ,
    PRG,
    USR,
    REL,
    Unknown(u8),
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            FileType::DEL => "del",
            FileType::SEQ => "seq",
            FileType::PRG => "prg",
            FileType::USR => "usr",
            FileType::REL => "rel",
            FileType::Unknown(_) => "unk",
        })
    }
}

/// We introduce the term "file attributes" to refer to the full 8-bit
/// directory entry field which contains the file type along with several flags.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct FileAttributes {
    /// Bits 0-3 indicate the file type.
    pub file_type: FileType,
    /// Bit 4 is unused.
    pub unused_bit: bool,
    /// Bit 5 is the "save with replace" flag.
    pub save_with_replace_flag: bool,
    /// Bit 6 is the "locked" flag, indicated by a "<" in directory listings.
    pub locked_flag: bool,
    /// Bit 7 is the "closed" flag.  Files are normally closed, so this bit is
    /// normally set. Unclosed files are indicated in directory listings
    /// with a "*", leading to such files being known as "splat files".
    pub closed_flag: bool,
}

impl FileAttributes {
    /// Parse a byte into a `FileAttributes` struct.
    pub fn from_byte(byte: u8) -> FileAttributes {
        let file_type = match byte & FILE_ATTRIB_FILE_TYPE_MASK {
            FILE_TYPE_DEL => FileType::DEL,
            FILE_TYPE_SEQ => FileType::SEQ,
            FILE_TYPE_PRG => FileType::PRG,
            FILE_TYPE_USR => FileType::USR,
            FILE_TYPE_REL => FileType::REL,
            b => FileType::Unknown(b),
        };
        FileAttributes {
            file_type,
            unused_bit: byte & FILE_ATTRIB_UNUSED_MASK != 0,
            save_with_replace_flag: byte & FILE_ATTRIB_SAVE_WITH_REPLACE_MASK != 0,
            locked_flag: byte & FILE_ATTRIB_LOCKED_MASK != 0,
            closed_flag: byte & FILE_ATTRIB_CLOSED_MASK != 0,
        }
    }

    /// Return true if this slot holds no file.  Only the type nibble counts:
    /// a zero nibble is an empty or scratched slot whatever the flags say.
    pub fn is_empty_slot(&self) -> bool {
        self.file_type == FileType::DEL
    }
}

impl fmt::Display for FileAttributes {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{}{}{}",
            if self.closed_flag { ' ' } else { '*' },
            self.file_type,
            match (self.locked_flag, self.save_with_replace_flag) {
                (true, false) => "<",
                (false, true) => "@",
                (true, true) => "<@",
                (false, false) => " ",
            },
        )
    }
}

impl fmt::Debug for FileAttributes {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        // This is different from the Display impl in that there is no padding.
        if !self.closed_flag {
            f.write_char('*')?;
        }
        <FileType as fmt::Debug>::fmt(&self.file_type, f)?;
        f.write_str(match (self.locked_flag, self.save_with_replace_flag) {
            (true, false) => "<",
            (false, true) => "@",
            (true, true) => "<@",
            (false, false) => "",
        })
    }
}

pub(crate) const ENTRY_SIZE: usize = 32;
const ENTRIES_PER_SECTOR: usize = BLOCK_SIZE / ENTRY_SIZE;
const ENTRY_FILE_ATTRIBUTE_OFFSET: usize = 0x02;
const ENTRY_FIRST_SECTOR_OFFSET: usize = 0x03;
const ENTRY_FILENAME_OFFSET: usize = 0x05;
const ENTRY_FILENAME_LENGTH: usize = 16;
const ENTRY_FILE_SIZE_OFFSET: usize = 0x1E;

/// A CBM DOS directory entry.
#[derive(Clone, PartialEq, Eq)]
pub struct DirectoryEntry {
    pub file_attributes: FileAttributes,
    pub first_sector: Location,
    pub filename: Petscii,
    /// The two block-count bytes, low byte first.
    pub size_bytes: [u8; 2],
    // The disk image position where this entry is stored, if available.
    pub position: Option<Position>,
}

impl DirectoryEntry {
    /// Parse a 32-byte directory entry.
    ///
    /// # Panics
    ///
    /// Panics if `bytes` is not exactly 32 bytes long.
    pub fn from_bytes(bytes: &[u8]) -> DirectoryEntry {
        Self::parse(bytes, None)
    }

    /// Parse a 32-byte directory entry and record where it was found.
    ///
    /// # Panics
    ///
    /// Panics if `bytes` is not exactly 32 bytes long.
    pub fn from_positioned_bytes(bytes: &[u8], position: Position) -> DirectoryEntry {
        Self::parse(bytes, Some(position))
    }

    fn parse(bytes: &[u8], position: Option<Position>) -> DirectoryEntry {
        assert_eq!(bytes.len(), ENTRY_SIZE);
        DirectoryEntry {
            file_attributes: FileAttributes::from_byte(bytes[ENTRY_FILE_ATTRIBUTE_OFFSET]),
            first_sector: Location::from_bytes(&bytes[ENTRY_FIRST_SECTOR_OFFSET..]),
            filename: Petscii::from_padded_bytes(
                &bytes[ENTRY_FILENAME_OFFSET..ENTRY_FILENAME_OFFSET + ENTRY_FILENAME_LENGTH],
                PADDING_BYTE,
            ),
            size_bytes: [
                bytes[ENTRY_FILE_SIZE_OFFSET],
                bytes[ENTRY_FILE_SIZE_OFFSET + 1],
            ],
            position,
        }
    }

    /// The size in blocks as listed: the sum of the two size bytes.  This
    /// agrees with `file_size_le()` for files under 256 blocks.
    #[inline]
    pub fn file_size(&self) -> u16 {
        self.size_bytes[0] as u16 + self.size_bytes[1] as u16
    }

    /// The size in blocks read as a 16-bit little-endian number.
    #[inline]
    pub fn file_size_le(&self) -> u16 {
        u16::from_le_bytes(self.size_bytes)
    }
}

impl fmt::Display for DirectoryEntry {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{:<4} {:18}{}",
            self.file_size(),
            format!("\"{}\"", self.filename),
            self.file_attributes
        )?;
        if f.alternate() {
            // verbose
            write!(f, " {}", self.first_sector)?;
            if let Some(position) = self.position {
                write!(f, " @ {}", position)?;
            }
        }
        Ok(())
    }
}

impl fmt::Debug for DirectoryEntry {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{},{},{:?} @ {:?}",
            format!("\"{}\"", self.filename),
            self.file_size(),
            self.file_attributes,
            self.position
        )
    }
}

/// Walk the directory chain and return the files it lists, in directory
/// order.  The walk always starts at the format's first directory sector
/// (18/1 on a 1541); the pointer recorded in the header is not consulted.
/// At most `directory_sectors` sectors are read, so a looping chain cannot
/// run forever.  A damaged link ends the walk with whatever was read so far.
pub fn read_directory(disk: &D64) -> Vec<File> {
    let format = disk.format();
    let start = format.first_directory_location();
    let mut files = vec![];
    let mut sectors_read = 0;
    for block in ChainIterator::new(disk, start).take(format.directory_sectors as usize) {
        let block = match block {
            Ok(block) => block,
            Err(e) => {
                warn!("directory walk stopped after {} sectors: {}", sectors_read, e);
                break;
            }
        };
        sectors_read += 1;
        let location = block.location();
        for (slot, chunk) in block
            .data()
            .chunks(ENTRY_SIZE)
            .take(ENTRIES_PER_SECTOR)
            .enumerate()
        {
            let position = Position {
                location,
                offset: (slot * ENTRY_SIZE) as u8,
            };
            let entry = DirectoryEntry::from_positioned_bytes(chunk, position);
            // Don't include empty or scratched slots
            if entry.file_attributes.is_empty_slot() {
                continue;
            }
            files.push(File::new(entry));
        }
    }
    debug!(
        "directory: {} sectors, {} of {} entries used",
        sectors_read,
        files.len(),
        format.max_directory_entries()
    );
    files
}
