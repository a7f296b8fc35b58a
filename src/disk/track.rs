use std::io;

use crate::disk::block::{Location, Sector, BLOCK_SIZE};
use crate::disk::error::DiskError;
use crate::disk::format::TrackLayout;

/// One track of the disk and the sectors it holds.
pub struct Track {
    number: u8,
    sectors: Vec<Sector>,
}

impl Track {
    /// Build a track from its byte range within the image.  `bytes` must hold
    /// exactly `layout.sectors` blocks.
    pub(crate) fn new(number: u8, layout: &TrackLayout, bytes: &[u8]) -> Track {
        assert_eq!(bytes.len(), layout.sectors as usize * BLOCK_SIZE);
        let sectors = bytes
            .chunks(BLOCK_SIZE)
            .enumerate()
            .map(|(sector, block)| Sector::new(Location(number, sector as u8), block))
            .collect();
        Track { number, sectors }
    }

    #[inline]
    pub fn number(&self) -> u8 {
        self.number
    }

    #[inline]
    pub fn sector_count(&self) -> u8 {
        self.sectors.len() as u8
    }

    #[inline]
    pub fn sectors(&self) -> &[Sector] {
        &self.sectors
    }

    pub fn sector(&self, sector: u8) -> io::Result<&Sector> {
        self.sectors
            .get(sector as usize)
            .ok_or_else(|| DiskError::InvalidLocation.into())
    }

    pub(crate) fn sector_mut(&mut self, sector: u8) -> io::Result<&mut Sector> {
        self.sectors
            .get_mut(sector as usize)
            .ok_or_else(|| DiskError::InvalidLocation.into())
    }

    /// Return the numbers of the sectors marked free.
    pub fn free_sectors(&self) -> Vec<u8> {
        self.sectors
            .iter()
            .filter(|s| s.is_free())
            .map(|s| s.location().1)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_track_sectors() {
        let layout = TrackLayout {
            sectors: 17,
            sector_offset: 0,
            byte_offset: 0,
        };
        let mut bytes = vec![0u8; 17 * BLOCK_SIZE];
        for (i, block) in bytes.chunks_mut(BLOCK_SIZE).enumerate() {
            block[2] = i as u8;
        }
        let mut track = Track::new(31, &layout, &bytes);
        assert_eq!(track.number(), 31);
        assert_eq!(track.sector_count(), 17);
        for sector in track.sectors() {
            assert_eq!(sector.byte(2).unwrap(), sector.location().1);
            assert_eq!(sector.location().0, 31);
        }
        assert_eq!(track.sector(17).unwrap_err(), DiskError::InvalidLocation);
        assert!(track.free_sectors().is_empty());

        track.sector_mut(3).unwrap().set_free(true);
        assert_eq!(track.free_sectors(), vec![3]);
    }
}
