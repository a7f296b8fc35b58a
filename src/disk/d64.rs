use std::fmt;
use std::fs;
use std::io::{self, Write};
use std::path::Path;

use log::{debug, warn};

use crate::disk::bam::{Bam, BamFormat};
use crate::disk::block::{Location, Sector};
use crate::disk::directory::read_directory;
use crate::disk::error::DiskError;
use crate::disk::file::File;
use crate::disk::format::{DiskFormat, TrackLayout};
use crate::disk::header::{Header, HeaderFormat};
use crate::disk::image::Image;
use crate::disk::track::Track;
use crate::disk::validation::{self, ValidationError};
use crate::disk::{Geometry, Id};
use crate::petscii::Petscii;

/// A description of the header format for this disk image type.
pub(crate) static HEADER_FORMAT: HeaderFormat = HeaderFormat {
    location: Location(18, 0),
    first_directory_offset: 0x00,
    disk_format_type_offset: 0x02,
    disk_name_offset: 0x90,
    disk_id_offset: 0xA2,
    dos_type_offset: 0xA5,
};

/// A description of the BAM format for this disk image type.
pub(crate) static BAM_FORMAT: BamFormat = BamFormat {
    location: Location(18, 0),
    entry_offset: 0x04,
    entry_stride: 4,
    bitmap_size: 3,
    tracks: 35,
};

/// A description of the disk format for this disk image type.
pub(crate) static DISK_FORMAT: DiskFormat = DiskFormat {
    directory_track: 18,
    first_directory_sector: 1,
    directory_sectors: 18,
    first_track: 1,
    last_track: 35,
    interleave: 10,
    tracks: &TRACKS,
    header: &HEADER_FORMAT,
    bam: &BAM_FORMAT,
};

pub(crate) static GEOMETRY_35: Geometry = Geometry {
    track_layouts: &TRACKS,
    tracks: 35,
    with_error_table: false,
};

static GEOMETRY_35_ERRORS: Geometry = Geometry {
    track_layouts: &TRACKS,
    tracks: 35,
    with_error_table: true,
};

static GEOMETRY_40: Geometry = Geometry {
    track_layouts: &TRACKS,
    tracks: 40,
    with_error_table: false,
};

static GEOMETRY_40_ERRORS: Geometry = Geometry {
    track_layouts: &TRACKS,
    tracks: 40,
    with_error_table: true,
};

/// Every image size a 1541 image may come in.  Only the plain 35-track
/// layout is decoded; the others are recognised so they can be reported.
static KNOWN_GEOMETRIES: [&Geometry; 4] = [
    &GEOMETRY_35,
    &GEOMETRY_35_ERRORS,
    &GEOMETRY_40,
    &GEOMETRY_40_ERRORS,
];

#[rustfmt::skip]
pub(crate) static TRACKS: [TrackLayout; 41] = [
    TrackLayout { sectors: 0,  sector_offset: 0,   byte_offset: 0, }, // There is no track 0.
    TrackLayout { sectors: 21, sector_offset: 0,   byte_offset: 0x00000, }, // 1
    TrackLayout { sectors: 21, sector_offset: 21,  byte_offset: 0x01500, }, // 2
    TrackLayout { sectors: 21, sector_offset: 42,  byte_offset: 0x02A00, }, // 3
    TrackLayout { sectors: 21, sector_offset: 63,  byte_offset: 0x03F00, }, // 4
    TrackLayout { sectors: 21, sector_offset: 84,  byte_offset: 0x05400, }, // 5
    TrackLayout { sectors: 21, sector_offset: 105, byte_offset: 0x06900, }, // 6
    TrackLayout { sectors: 21, sector_offset: 126, byte_offset: 0x07E00, }, // 7
    TrackLayout { sectors: 21, sector_offset: 147, byte_offset: 0x09300, }, // 8
    TrackLayout { sectors: 21, sector_offset: 168, byte_offset: 0x0A800, }, // 9
    TrackLayout { sectors: 21, sector_offset: 189, byte_offset: 0x0BD00, }, // 10
    TrackLayout { sectors: 21, sector_offset: 210, byte_offset: 0x0D200, }, // 11
    TrackLayout { sectors: 21, sector_offset: 231, byte_offset: 0x0E700, }, // 12
    TrackLayout { sectors: 21, sector_offset: 252, byte_offset: 0x0FC00, }, // 13
    TrackLayout { sectors: 21, sector_offset: 273, byte_offset: 0x11100, }, // 14
    TrackLayout { sectors: 21, sector_offset: 294, byte_offset: 0x12600, }, // 15
    TrackLayout { sectors: 21, sector_offset: 315, byte_offset: 0x13B00, }, // 16
    TrackLayout { sectors: 21, sector_offset: 336, byte_offset: 0x15000, }, // 17
    TrackLayout { sectors: 19, sector_offset: 357, byte_offset: 0x16500, }, // 18
    TrackLayout { sectors: 19, sector_offset: 376, byte_offset: 0x17800, }, // 19
    TrackLayout { sectors: 19, sector_offset: 395, byte_offset: 0x18B00, }, // 20
    TrackLayout { sectors: 19, sector_offset: 414, byte_offset: 0x19E00, }, // 21
    TrackLayout { sectors: 19, sector_offset: 433, byte_offset: 0x1B100, }, // 22
    TrackLayout { sectors: 19, sector_offset: 452, byte_offset: 0x1C400, }, // 23
    TrackLayout { sectors: 19, sector_offset: 471, byte_offset: 0x1D700, }, // 24
    TrackLayout { sectors: 18, sector_offset: 490, byte_offset: 0x1EA00, }, // 25
    TrackLayout { sectors: 18, sector_offset: 508, byte_offset: 0x1FC00, }, // 26
    TrackLayout { sectors: 18, sector_offset: 526, byte_offset: 0x20E00, }, // 27
    TrackLayout { sectors: 18, sector_offset: 544, byte_offset: 0x22000, }, // 28
    TrackLayout { sectors: 18, sector_offset: 562, byte_offset: 0x23200, }, // 29
    TrackLayout { sectors: 18, sector_offset: 580, byte_offset: 0x24400, }, // 30
    TrackLayout { sectors: 17, sector_offset: 598, byte_offset: 0x25600, }, // 31
    TrackLayout { sectors: 17, sector_offset: 615, byte_offset: 0x26700, }, // 32
    TrackLayout { sectors: 17, sector_offset: 632, byte_offset: 0x27800, }, // 33
    TrackLayout { sectors: 17, sector_offset: 649, byte_offset: 0x28900, }, // 34
    TrackLayout { sectors: 17, sector_offset: 666, byte_offset: 0x29A00, }, // 35
    TrackLayout { sectors: 17, sector_offset: 683, byte_offset: 0x2AB00, }, // 36
    TrackLayout { sectors: 17, sector_offset: 700, byte_offset: 0x2BC00, }, // 37
    TrackLayout { sectors: 17, sector_offset: 717, byte_offset: 0x2CD00, }, // 38
    TrackLayout { sectors: 17, sector_offset: 734, byte_offset: 0x2DE00, }, // 39
    TrackLayout { sectors: 17, sector_offset: 751, byte_offset: 0x2EF00, }, // 40
];

/// Confirm that an image of `size` bytes is a standard 35-track D64 image.
fn check_geometry(size: usize) -> io::Result<&'static Geometry> {
    match Geometry::find_by_size(size, &KNOWN_GEOMETRIES[..]) {
        Some(geometry) if geometry.is_standard() => {
            debug!("D64 image with {} tracks ({} bytes)", geometry.tracks, size);
            Ok(geometry)
        }
        Some(geometry) => {
            warn!(
                "{}-track D64 image{} is not supported",
                geometry.tracks,
                if geometry.with_error_table {
                    " with error table"
                } else {
                    ""
                }
            );
            Err(DiskError::InvalidGeometry.into())
        }
        None => {
            debug!("{} bytes is not a D64 image size", size);
            Err(DiskError::InvalidGeometry.into())
        }
    }
}

fn find_sector(tracks: &[Track], location: Location) -> io::Result<&Sector> {
    match location.0 {
        0 => Err(DiskError::InvalidLocation.into()),
        t => tracks
            .get(t as usize - 1)
            .ok_or_else(|| io::Error::from(DiskError::InvalidLocation))?
            .sector(location.1),
    }
}

/// A decoded 1541 disk image in D64 format.
///
/// The whole image is read at load time.  The header, BAM and directory are
/// decoded once and never change; each file's sector chain and contents are
/// resolved on first use.
pub struct D64 {
    tracks: Vec<Track>,
    header: Header,
    bam: Bam,
    directory: Vec<File>,
}

impl D64 {
    /// Open an existing D64 disk image.  The file size is checked before the
    /// file is mapped, so an image of the wrong size is rejected without
    /// reading any of it.
    pub fn open<P: AsRef<Path>>(path: P) -> io::Result<D64> {
        let size = fs::metadata(&path)?.len();
        check_geometry(size as usize)?;
        Self::new(Image::open_read_only(path)?)
    }

    /// Decode a D64 image already held in memory.
    pub fn from_bytes(bytes: Vec<u8>) -> io::Result<D64> {
        Self::new(Image::from_bytes(bytes))
    }

    fn new(image: Image) -> io::Result<D64> {
        let geometry = check_geometry(image.len())?;

        let mut tracks = Vec::with_capacity(geometry.tracks as usize);
        for number in DISK_FORMAT.first_track..=geometry.tracks {
            let layout = &geometry.track_layouts[number as usize];
            let bytes = image.slice(
                layout.byte_offset as usize,
                layout.sectors as usize * crate::disk::BLOCK_SIZE,
            )?;
            tracks.push(Track::new(number, layout, bytes));
        }

        let header = Header::read(find_sector(&tracks, HEADER_FORMAT.location)?, &HEADER_FORMAT);
        let bam = Bam::read(find_sector(&tracks, BAM_FORMAT.location)?, &DISK_FORMAT);
        let mut d64 = D64 {
            tracks,
            header,
            bam,
            directory: vec![],
        };
        d64.mark_free_sectors()?;
        d64.directory = read_directory(&d64);
        debug!(
            "\"{}\": {} files, {} of {} blocks free",
            d64.header.disk_name,
            d64.directory.len(),
            d64.bam.blocks_free(),
            DISK_FORMAT.total_data_blocks()
        );
        Ok(d64)
    }

    /// Copy the BAM's free flags onto every sector.
    fn mark_free_sectors(&mut self) -> io::Result<()> {
        for location in self.bam.free_sectors() {
            self.track_mut(location.0)?
                .sector_mut(location.1)?
                .set_free(true);
        }
        Ok(())
    }

    #[inline]
    pub fn format(&self) -> &'static DiskFormat {
        &DISK_FORMAT
    }

    /// Return the name of this disk as found in the disk header.
    #[inline]
    pub fn name(&self) -> &Petscii {
        &self.header.disk_name
    }

    #[inline]
    pub fn id(&self) -> Id {
        self.header.disk_id
    }

    #[inline]
    pub fn header(&self) -> &Header {
        &self.header
    }

    #[inline]
    pub fn bam(&self) -> &Bam {
        &self.bam
    }

    /// Return the blocks free based on the BAM free sector counts, as shown
    /// at the bottom of a directory listing.
    #[inline]
    pub fn free_blocks(&self) -> usize {
        self.bam.blocks_free()
    }

    /// Return the per-track, per-sector free flags, indexed from track 1.
    pub fn bitmap(&self) -> Vec<Vec<bool>> {
        self.bam.bitmap()
    }

    /// Return the files listed in the directory, in directory order.
    #[inline]
    pub fn directory(&self) -> &[File] {
        &self.directory
    }

    /// Locate a file based on its filename.
    pub fn find_file(&self, filename: &Petscii) -> io::Result<&File> {
        self.directory
            .iter()
            .find(|file| file.name() == filename)
            .ok_or_else(|| DiskError::NotFound.into())
    }

    #[inline]
    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn track(&self, track: u8) -> io::Result<&Track> {
        match track {
            0 => Err(DiskError::InvalidLocation.into()),
            t => self
                .tracks
                .get(t as usize - 1)
                .ok_or_else(|| DiskError::InvalidLocation.into()),
        }
    }

    fn track_mut(&mut self, track: u8) -> io::Result<&mut Track> {
        match track {
            0 => Err(DiskError::InvalidLocation.into()),
            t => self
                .tracks
                .get_mut(t as usize - 1)
                .ok_or_else(|| DiskError::InvalidLocation.into()),
        }
    }

    /// Return the sector at the given location.
    pub fn sector(&self, location: Location) -> io::Result<&Sector> {
        find_sector(&self.tracks, location)
    }

    /// Return the sector CBM DOS would use for the first block of a new file.
    pub fn first_free_sector(&self) -> Option<Location> {
        DISK_FORMAT.first_free_sector(&self.bam)
    }

    /// Check the consistency of the disk image.  Unlike the "validate" ("v0:")
    /// command in CBM DOS, this is a read-only operation and does not
    /// attempt any repairs.  A list of validation errors is returned.
    #[inline]
    pub fn validate(&self) -> io::Result<Vec<ValidationError>> {
        validation::validate(self)
    }

    /// Write a hex dump of the disk image to the provided writer.
    pub fn dump(&self, writer: &mut dyn Write) -> io::Result<()> {
        for track in self.tracks.iter() {
            for sector in track.sectors() {
                writeln!(writer, "{:?}", sector)?;
                writeln!(writer)?;
            }
        }
        Ok(())
    }
}

impl fmt::Display for D64 {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{} \"{:16}\" {} {}",
            0,
            self.header.disk_name,
            self.header.disk_id,
            Petscii::from_bytes(&self.header.dos_type)
        )
    }
}

impl fmt::Debug for D64 {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:?}", self.header)?;
        write!(f, "{:?}", self.bam)
    }
}

/// Build a blank, freshly formatted image: every sector free except the
/// header/BAM sector and the first directory sector.
#[cfg(test)]
pub(crate) fn blank_image(name: &[u8], id: &[u8; 2]) -> Vec<u8> {
    use crate::disk::{BLOCK_SIZE, PADDING_BYTE};

    let mut bytes = vec![0u8; GEOMETRY_35.size()];
    let bam_offset = TRACKS[18].byte_offset as usize;
    let bam = &mut bytes[bam_offset..bam_offset + BLOCK_SIZE];
    bam[0x00] = 18;
    bam[0x01] = 1;
    bam[0x02] = b'A';
    for track in 1..=35u8 {
        let sectors = TRACKS[track as usize].sectors as u32;
        let mut map: u32 = (1 << sectors) - 1;
        if track == 18 {
            map &= !0b11;
        }
        let offset = track as usize * 4;
        bam[offset] = map.count_ones() as u8;
        bam[offset + 1..offset + 4].copy_from_slice(&map.to_le_bytes()[..3]);
    }
    for b in bam[0x90..0xAB].iter_mut() {
        *b = PADDING_BYTE;
    }
    bam[0x90..0x90 + name.len()].copy_from_slice(name);
    bam[0xA2..0xA4].copy_from_slice(id);
    bam[0xA5..0xA7].copy_from_slice(b"2A");

    let directory_offset = bam_offset + BLOCK_SIZE;
    bytes[directory_offset] = 0x00;
    bytes[directory_offset + 1] = 0xFF;
    bytes
}

/// Return the byte offset of a sector within a 35-track image.
#[cfg(test)]
pub(crate) fn image_offset(location: Location) -> usize {
    TRACKS[location.0 as usize].byte_offset as usize
        + location.1 as usize * crate::disk::BLOCK_SIZE
}
