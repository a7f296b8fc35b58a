use std::fs::File;
use std::io;
use std::path::Path;

use log::debug;
use memmap::{Mmap, MmapOptions};

use crate::disk::error::DiskError;

/// Provide backing storage (file or memory) for disk images.
pub enum Image {
    ReadOnlyMap(Mmap),
    Memory(Box<[u8]>),
}

impl Image {
    pub fn from_bytes(bytes: Vec<u8>) -> Image {
        Image::Memory(bytes.into_boxed_slice())
    }

    /// Map an image file read-only.  The length is taken from the file
    /// metadata first so that a zero-length file (which cannot be mapped)
    /// is returned as an empty image rather than an I/O error.
    pub fn open_read_only<P: AsRef<Path>>(path: P) -> io::Result<Image> {
        let file = File::open(&path)?;
        let length = file.metadata()?.len();
        debug!("{}: {} bytes", path.as_ref().display(), length);
        if length == 0 {
            return Ok(Image::from_bytes(vec![]));
        }
        let mmap = unsafe { MmapOptions::new().map(&file)? };
        Ok(Image::ReadOnlyMap(mmap))
    }

    pub fn len(&self) -> usize {
        match self {
            Image::ReadOnlyMap(mmap) => mmap.len(),
            Image::Memory(array) => array.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn check_bounds(&self, offset: usize, length: usize) -> io::Result<usize> {
        match offset.checked_add(length) {
            Some(end) if end <= self.len() => Ok(end),
            _ => Err(DiskError::InvalidOffset.into()),
        }
    }

    pub fn slice(&self, offset: usize, length: usize) -> io::Result<&[u8]> {
        let end = self.check_bounds(offset, length)?;
        Ok(match self {
            Image::ReadOnlyMap(mmap) => &mmap[offset..end],
            Image::Memory(array) => &array[offset..end],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_memory_slice() {
        let image = Image::from_bytes((0..=255u8).collect());
        assert_eq!(image.len(), 256);
        assert_eq!(image.slice(0x10, 3).unwrap(), &[0x10, 0x11, 0x12]);
        assert_eq!(image.slice(250, 6).unwrap().len(), 6);
        assert_eq!(image.slice(250, 7).unwrap_err(), DiskError::InvalidOffset);
    }

    #[test]
    fn test_mapped_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&[0xAA; 512]).unwrap();
        file.flush().unwrap();
        let image = Image::open_read_only(file.path()).unwrap();
        assert_eq!(image.len(), 512);
        assert_eq!(image.slice(510, 2).unwrap(), &[0xAA, 0xAA]);

        let empty = tempfile::NamedTempFile::new().unwrap();
        assert!(Image::open_read_only(empty.path()).unwrap().is_empty());
    }
}
