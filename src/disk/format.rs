use crate::disk::bam::{Bam, BamFormat};
use crate::disk::block::{Location, BLOCK_SIZE};
use crate::disk::directory::ENTRY_SIZE;
use crate::disk::header::HeaderFormat;

// The allocation policy reflects the information in Peter Schepers'
// DISK.TXT document found at:
// http://ist.uwaterloo.ca/~schepers/formats/DISK.TXT

/// The position and size of one track within the image.
pub struct TrackLayout {
    pub sectors: u8,
    /// The number of sectors on all preceding tracks.
    pub sector_offset: u16,
    pub byte_offset: u32,
}

#[derive(Clone)]
pub struct DiskFormat {
    pub directory_track: u8,
    /// This should be pointed to from the header sector, but the various image
    /// format documents say not to trust it.
    pub first_directory_sector: u8,
    /// The number of sectors the directory chain may span.
    pub directory_sectors: u8,
    pub first_track: u8,
    /// The last track in normal use.  (I.e., inclusive -- not the last track
    /// plus one.)
    pub last_track: u8,
    /// The sector step used when looking for a free block within a track.
    pub interleave: u8,
    /// Per-track parameters, indexed by track number (track 0 is unused).
    pub tracks: &'static [TrackLayout],
    pub header: &'static HeaderFormat,
    pub bam: &'static BamFormat,
}

impl DiskFormat {
    /// Return the number of sectors on the given track, or zero if the track
    /// is not part of this format.
    #[inline]
    pub fn sectors_in_track(&self, track: u8) -> u8 {
        if track < self.first_track || track > self.last_track {
            return 0;
        }
        self.tracks[track as usize].sectors
    }

    #[inline]
    pub fn is_valid_location(&self, location: Location) -> bool {
        location.1 < self.sectors_in_track(location.0)
    }

    #[inline]
    pub fn first_directory_location(&self) -> Location {
        Location(self.directory_track, self.first_directory_sector)
    }

    /// Return the locations that hold CBM DOS metadata rather than file
    /// contents.
    pub fn system_locations(&self) -> Vec<Location> {
        let mut locations = vec![self.header.location, self.bam.location];
        locations.sort();
        locations.dedup();
        locations
    }

    /// Return the maximum number of directory entries that are possible for
    /// this format.
    pub fn max_directory_entries(&self) -> usize {
        self.directory_sectors as usize * BLOCK_SIZE / ENTRY_SIZE
    }

    /// Return the total number of sectors on the disk.  No chain can be
    /// longer than this.
    pub fn total_sectors(&self) -> usize {
        (self.first_track..=self.last_track)
            .map(|t| self.sectors_in_track(t) as usize)
            .sum()
    }

    /// Return the total number of data blocks available for files on a freshly
    /// formatted disk. This is the equivalent of the listed "blocks free"
    /// on a blank disk.
    pub fn total_data_blocks(&self) -> usize {
        (self.first_track..=self.last_track)
            .filter(|t| *t != self.directory_track)
            .map(|t| self.sectors_in_track(t) as usize)
            .sum()
    }

    /// Return the data tracks in the order they are searched for a free block:
    /// growing outward from the directory track, trying the track below
    /// before the one above at each distance.
    pub fn track_search_order(&self) -> Vec<u8> {
        let max_distance = ::std::cmp::max(
            self.directory_track - self.first_track,
            self.last_track - self.directory_track,
        );
        let mut order = Vec::with_capacity(self.last_track as usize);
        for distance in 1..=max_distance {
            // Check bottom half
            if self.directory_track - self.first_track >= distance {
                order.push(self.directory_track - distance);
            }
            // Check top half
            if self.last_track - self.directory_track >= distance {
                order.push(self.directory_track + distance);
            }
        }
        order
    }

    /// Return every sector of the track in the order the interleave visits
    /// them.  Starting at sector 0, step forward by the interleave; when
    /// the step runs off the end of the track, wrap around and go back one
    /// more sector (unless the wrap landed on sector 0).  A sector that was
    /// already visited is skipped in favor of the next sector up.
    pub fn interleave_order(&self, track: u8) -> Vec<u8> {
        let num_sectors = self.sectors_in_track(track) as usize;
        let interleave = self.interleave as usize;
        let mut visited = vec![false; num_sectors];
        let mut order = Vec::with_capacity(num_sectors);

        let mut sector = 0usize;
        while order.len() < num_sectors {
            while visited[sector] {
                sector = (sector + 1) % num_sectors;
            }
            visited[sector] = true;
            order.push(sector as u8);

            sector += interleave;
            while sector >= num_sectors {
                sector -= num_sectors;
                // From DISK.TXT:
                // "Empirical optimization, get one sector backwards if beyond sector zero"
                if sector > 0 {
                    sector -= 1;
                }
            }
        }
        order
    }

    /// Return the sector CBM DOS would pick for the first block of a new
    /// file, or None if every data track is full.  The directory track is
    /// never considered.
    pub fn first_free_sector(&self, bam: &Bam) -> Option<Location> {
        for track in self.track_search_order() {
            for sector in self.interleave_order(track) {
                let location = Location(track, sector);
                if bam.is_free(location) {
                    return Some(location);
                }
            }
        }
        None
    }
}
