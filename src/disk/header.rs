use std::fmt;

use crate::disk::block::{Location, Sector};
use crate::disk::{Id, DISK_NAME_SIZE, PADDING_BYTE};
use crate::petscii::Petscii;

/// The number of bytes in the "header" field shown after the disk name in a
/// directory listing: the disk id, a padding byte, and the DOS type.
pub const HEADER_FIELD_SIZE: usize = 5;

/// A HeaderFormat describes where header information is stored for a
/// particular disk image format.
pub struct HeaderFormat {
    pub location: Location,
    // offsets
    pub first_directory_offset: usize,
    pub disk_format_type_offset: usize,
    pub disk_name_offset: usize,
    pub disk_id_offset: usize,
    pub dos_type_offset: usize,
}

pub struct Header {
    // http://unusedino.de/ec64/technical/formats/d64.html
    // says to not trust this field.
    pub first_directory_sector: Location,
    pub disk_format_type: u8,
    pub disk_name: Petscii,
    pub disk_id: Id,
    pub dos_type: [u8; 2],
    /// The raw id, padding, and DOS type bytes, as listed by CBM DOS.
    pub raw: [u8; HEADER_FIELD_SIZE],
}

impl Header {
    /// Read a header from the header sector using the provided format.
    pub fn read(block: &Sector, format: &HeaderFormat) -> Header {
        let block = block.data();

        let mut raw = [0u8; HEADER_FIELD_SIZE];
        raw.copy_from_slice(&block[format.disk_id_offset..format.disk_id_offset + HEADER_FIELD_SIZE]);

        Header {
            first_directory_sector: Location::from_bytes(&block[format.first_directory_offset..]),
            // We don't enforce any particular value for the format type.  A
            // real CBM DOS would read the disk regardless.
            disk_format_type: block[format.disk_format_type_offset],
            disk_name: Petscii::from_padded_bytes(
                &block[format.disk_name_offset..format.disk_name_offset + DISK_NAME_SIZE],
                PADDING_BYTE,
            ),
            disk_id: Id::from_bytes(&block[format.disk_id_offset..format.disk_id_offset + 2]),
            dos_type: [
                block[format.dos_type_offset],
                block[format.dos_type_offset + 1],
            ],
            raw,
        }
    }
}

impl fmt::Debug for Header {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "disk name: {:?}", self.disk_name)?;
        writeln!(f, "disk id: {:?}", self.disk_id)?;
        writeln!(f, "dos type: {}", Petscii::from_bytes(&self.dos_type))?;
        writeln!(
            f,
            "first directory sector (as recorded): {}",
            self.first_directory_sector
        )
    }
}
