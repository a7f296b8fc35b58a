use std::collections::HashSet;
use std::io;

use log::{debug, warn};

use crate::disk::block::{Location, Sector, BLOCK_SIZE};
use crate::disk::error::DiskError;
use crate::disk::D64;

/// The two-byte link at the start of every chained sector.
#[derive(Debug, PartialEq, Eq)]
pub enum ChainLink {
    Next(Location),
    Tail(usize), // used bytes
}

impl ChainLink {
    #[inline]
    pub fn new(block: &[u8]) -> io::Result<ChainLink> {
        if block[0] == 0x00 {
            // This is the last sector of the chain, so the next byte indicates how much of
            // this sector is actually used.
            if block[1] < 1 {
                // It's not valid for a chain sector to not include the first two bytes
                // as allocated.
                return Err(DiskError::InvalidChainLink.into());
            }
            Ok(ChainLink::Tail(block[1] as usize + 1)) // 2..=256
        } else {
            Ok(ChainLink::Next(Location::new(block[0], block[1])))
        }
    }
}

/// Walk a sector chain, yielding each sector in link order.  A sector that
/// is reached twice, a chain longer than the disk has sectors, or a link
/// that leaves the disk ends the walk with `CorruptChain`; nothing is
/// yielded after an error.
pub struct ChainIterator<'a> {
    disk: &'a D64,
    next_sector: Option<Location>,
    visited_sectors: HashSet<Location>,
}

impl<'a> ChainIterator<'a> {
    /// Create a new chain iterator starting at the specified location.  A
    /// starting track of zero is an empty chain.
    pub fn new(disk: &'a D64, starting_sector: Location) -> ChainIterator<'a> {
        ChainIterator {
            disk,
            next_sector: match starting_sector.0 {
                0 => None,
                _ => Some(starting_sector),
            },
            visited_sectors: HashSet::new(),
        }
    }

    /// Read the entire chain and return a list of locations.
    pub fn locations(self) -> io::Result<Vec<Location>> {
        self.map(|r| r.map(|sector| sector.location())).collect()
    }
}

impl<'a> Iterator for ChainIterator<'a> {
    type Item = io::Result<&'a Sector>;

    fn next(&mut self) -> Option<io::Result<&'a Sector>> {
        let location = self.next_sector.take()?;

        // Loop detection.  A chain can't hold more sectors than the disk.
        if self.visited_sectors.len() >= self.disk.format().total_sectors()
            || !self.visited_sectors.insert(location)
        {
            warn!("sector chain revisits {}", location);
            return Some(Err(DiskError::CorruptChain.into()));
        }

        let sector = match self.disk.sector(location) {
            Ok(sector) => sector,
            Err(_) => {
                warn!("sector chain links to {}, which is not on the disk", location);
                return Some(Err(DiskError::CorruptChain.into()));
            }
        };
        self.next_sector = sector.next_location();
        Some(Ok(sector))
    }
}

/// Return the locations of a chain starting at `first`, in link order.
pub fn resolve_chain(disk: &D64, first: Location) -> io::Result<Vec<Location>> {
    let locations = ChainIterator::new(disk, first).locations()?;
    debug!("chain at {}: {} sectors", first, locations.len());
    Ok(locations)
}

/// ChainReader objects implement the Read trait and are used to read the
/// byte stream held in a series of chained sectors.  The link bytes of each
/// sector are skipped, and the last sector is cut to the length given by
/// its link.
pub struct ChainReader<'a> {
    chain: ChainIterator<'a>,
    block: &'a [u8],
    eof: bool,
    // Held back when bytes were already copied in the same call.
    pending_error: Option<io::Error>,
}

impl<'a> ChainReader<'a> {
    pub fn new(disk: &'a D64, start: Location) -> ChainReader<'a> {
        ChainReader {
            chain: ChainIterator::new(disk, start),
            block: &[],
            eof: false,
            pending_error: None,
        }
    }

    /// End the stream with `error`.  If this read already produced bytes,
    /// they are returned first and the error is reported on the next call.
    fn fail(&mut self, error: io::Error, nbytes: usize) -> io::Result<usize> {
        self.eof = true;
        if nbytes > 0 {
            self.pending_error = Some(error);
            Ok(nbytes)
        } else {
            Err(error)
        }
    }
}

impl<'a> io::Read for ChainReader<'a> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if let Some(e) = self.pending_error.take() {
            return Err(e);
        }
        let mut total_nbytes = 0;
        while total_nbytes < buf.len() && !self.eof {
            if self.block.is_empty() {
                // Read the next block.
                match self.chain.next() {
                    Some(Ok(sector)) => {
                        let used = match ChainLink::new(sector.data()) {
                            Ok(ChainLink::Next(_)) => BLOCK_SIZE,
                            Ok(ChainLink::Tail(size)) => size,
                            Err(e) => return self.fail(e, total_nbytes),
                        };
                        // discard the next-track/sector bytes
                        self.block = &sector.data()[2..used];
                    }
                    Some(Err(e)) => return self.fail(e, total_nbytes),
                    None => self.eof = true,
                }
                continue;
            }

            // Copy as much of this block as possible into the caller-provided buffer.
            let nbytes = self.block.len().min(buf.len() - total_nbytes);
            buf[total_nbytes..total_nbytes + nbytes].copy_from_slice(&self.block[..nbytes]);
            self.block = &self.block[nbytes..];
            total_nbytes += nbytes;
        }
        Ok(total_nbytes)
    }
}
