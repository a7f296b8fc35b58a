use std::fmt;
use std::fmt::Write;

use log::warn;

use crate::disk::block::{Location, Sector};
use crate::disk::DiskFormat;

/// A BamFormat describes how BAM information is stored for a particular disk
/// image format.  Each track has a fixed-size record holding a free sector
/// count followed by an allocation bitmap.
pub struct BamFormat {
    /// The track and sector where the BAM records are stored.
    pub location: Location,
    /// The offset within the block of the record for the first track.
    pub entry_offset: usize,
    /// How many bytes apart are the records?  (E.g., on 1541 BAM this is 4:
    /// the free sectors byte plus a three byte bitmap.)
    pub entry_stride: usize,
    /// The size in bytes of the bitmap that follows the free sector count.
    pub bitmap_size: usize,
    /// The total number of tracks (and hence records).
    pub tracks: usize,
}

#[derive(Clone, Copy, Default, Debug, PartialEq, Eq)]
pub struct BamEntry {
    pub free_sectors: u8,
    pub sector_map: u32,
}

impl BamEntry {
    /// Parse the bitmap bytes of a BAM record.  Bit 0 of the first bitmap
    /// byte is sector 0, continuing through the following bytes; a set bit
    /// marks the sector free.
    pub fn from_bytes(free_sectors: u8, bitmap: &[u8]) -> BamEntry {
        let mut sector_map: u32 = 0;
        for byte in bitmap.iter().rev() {
            sector_map = (sector_map << 8) | *byte as u32;
        }

        BamEntry {
            free_sectors,
            sector_map,
        }
    }

    #[inline]
    pub fn is_free(&self, sector: u8) -> bool {
        sector < 32 && self.sector_map >> sector & 1 == 1
    }

    /// Return the free flags of the first `sectors` sectors.  Any further
    /// bits in the map are padding.
    pub fn bitmap(&self, sectors: u8) -> Vec<bool> {
        (0..sectors).map(|s| self.is_free(s)).collect()
    }

    /// Count the free bits among the first `sectors` sectors.
    pub fn free_bits(&self, sectors: u8) -> usize {
        (0..sectors).filter(|s| self.is_free(*s)).count()
    }
}

pub struct Bam {
    format: DiskFormat,
    entries: Vec<BamEntry>,
}

impl Bam {
    /// Read the BAM records from the BAM sector.
    pub fn read(block: &Sector, disk_format: &DiskFormat) -> Bam {
        let format = disk_format.bam;
        let data = block.data();
        let entries = (0..format.tracks)
            .map(|i| {
                let offset = format.entry_offset + i * format.entry_stride;
                BamEntry::from_bytes(data[offset], &data[offset + 1..offset + 1 + format.bitmap_size])
            })
            .collect::<Vec<_>>();

        let bam = Bam {
            format: disk_format.clone(),
            entries,
        };
        for track in bam.mismatched_tracks() {
            warn!(
                "BAM free sector count for track {} does not match its bitmap",
                track
            );
        }
        bam
    }

    /// Return the number of blocks free on the disk image, sans any
    /// unallocated directory blocks. This is equivalent to the "blocks
    /// free" output at the bottom of a directory listing. The number of
    /// free blocks is calculated based on the BAM entry free_sectors field.
    /// It is not based on the allocation bitmaps, nor is it based on the file
    /// usage as embedded in directory entries.
    pub fn blocks_free(&self) -> usize {
        self.data_tracks()
            .map(|track| self.entries[track as usize - 1].free_sectors as usize)
            .sum()
    }

    /// Return the number of blocks free as counted from the allocation
    /// bitmaps, excluding the directory track.  On a consistent disk this
    /// equals `blocks_free()`.
    pub fn bitmap_blocks_free(&self) -> usize {
        self.data_tracks()
            .map(|track| {
                self.entries[track as usize - 1].free_bits(self.format.sectors_in_track(track))
            })
            .sum()
    }

    fn data_tracks(&self) -> impl Iterator<Item = u8> + '_ {
        let directory_track = self.format.directory_track;
        (self.format.first_track..=self.format.last_track).filter(move |t| *t != directory_track)
    }

    /// Return the BAM entry for a track, or None if the track is not covered
    /// by the BAM.
    pub fn entry(&self, track: u8) -> Option<&BamEntry> {
        match track {
            0 => None,
            t => self.entries.get(t as usize - 1),
        }
    }

    pub fn is_free(&self, location: Location) -> bool {
        self.format.is_valid_location(location)
            && self
                .entry(location.0)
                .map_or(false, |entry| entry.is_free(location.1))
    }

    /// Return the per-sector free flags of a track, trimmed to the number of
    /// sectors on that track.
    pub fn track_bitmap(&self, track: u8) -> Vec<bool> {
        match self.entry(track) {
            Some(entry) => entry.bitmap(self.format.sectors_in_track(track)),
            None => vec![],
        }
    }

    /// Return the free flags of every track, indexed from track 1.
    pub fn bitmap(&self) -> Vec<Vec<bool>> {
        (self.format.first_track..=self.format.last_track)
            .map(|track| self.track_bitmap(track))
            .collect()
    }

    /// Return the tracks whose free sector count disagrees with their bitmap.
    pub fn mismatched_tracks(&self) -> Vec<u8> {
        (self.format.first_track..=self.format.last_track)
            .filter(|track| match self.entry(*track) {
                Some(entry) => {
                    entry.free_sectors as usize
                        != entry.free_bits(self.format.sectors_in_track(*track))
                }
                None => false,
            })
            .collect()
    }

    pub fn allocated_sectors(&self) -> Vec<Location> {
        self.locations_where(false)
    }

    pub fn free_sectors(&self) -> Vec<Location> {
        self.locations_where(true)
    }

    fn locations_where(&self, free: bool) -> Vec<Location> {
        let mut locations = vec![];
        for track in self.format.first_track..=self.format.last_track {
            for (sector, is_free) in self.track_bitmap(track).into_iter().enumerate() {
                if is_free == free {
                    locations.push(Location::new(track, sector as u8));
                }
            }
        }
        locations
    }
}

/// Decode the allocation bitmap held in the BAM sector into per-track,
/// per-sector free flags.  The outer vector is indexed from track 1.
pub fn decode_bitmap(allocation_sector: &Sector, disk_format: &DiskFormat) -> Vec<Vec<bool>> {
    Bam::read(allocation_sector, disk_format).bitmap()
}

impl fmt::Debug for Bam {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for track in self.format.first_track..=self.format.last_track {
            let entry = self.entries[track as usize - 1];
            write!(
                f,
                "t{:02}: [{:02}/{:02}] ",
                track,
                entry.free_sectors,
                self.format.sectors_in_track(track)
            )?;
            for free in self.track_bitmap(track) {
                f.write_char(if free { '.' } else { 'x' })?;
            }
            f.write_char('\n')?;
        }
        writeln!(f, "{} blocks free.", self.blocks_free())?;
        Ok(())
    }
}
