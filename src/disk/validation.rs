use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BTreeSet};
use std::io;

use log::debug;

use crate::disk::block::Location;
use crate::disk::chain::ChainIterator;
use crate::disk::error::DiskError;
use crate::disk::D64;
use crate::petscii::Petscii;

/// A validation error represents an inconsistency in the disk image found by
/// the validate() function.
#[derive(thiserror::Error, Clone, Debug, PartialEq, Eq)]
pub enum ValidationError {
    #[error("System sector not allocated: {0}")]
    SystemSectorNotAllocated(Location),
    #[error("Sector misallocated: {0}")]
    SectorMisallocated(Location),
    #[error("Sector {0} misoccupied by file: {1:?}")]
    SectorMisoccupied(Location, Petscii),
    #[error("Sector {0} occupied by multiple files, including at least: {1:?} {2:?}")]
    SectorOveroccupied(Location, Petscii, Petscii),
    #[error("Error scanning {1:?}: {0}")]
    FileScanError(DiskError, Petscii),
    #[error("Error scanning the directory chain: {0}")]
    DirectoryScanError(DiskError),
    #[error("Track {track} free count is {count}, but its bitmap shows {bits}")]
    FreeCountMismatch { track: u8, count: u8, bits: usize },
}

/// Check the consistency of the provided disk.  Unlike the "validate" ("v0:")
/// command in CBM DOS, this is a read-only operation and does not attempt any
/// repairs.  A list of validation errors is returned, in location order
/// within each kind.
pub fn validate(disk: &D64) -> io::Result<Vec<ValidationError>> {
    static SYSTEM_OWNER: &str = "CBM DOS";
    let mut errors: Vec<ValidationError> = vec![];
    let format = disk.format();
    let bam = disk.bam();
    let system_sectors = format.system_locations();

    // Build a list of all occupied sectors and their owners
    // 1. System sectors
    let mut occupied_sector_map: BTreeMap<Location, Petscii> = BTreeMap::new();
    for system_sector in system_sectors.iter() {
        occupied_sector_map.insert(*system_sector, SYSTEM_OWNER.into());
    }
    // 2. Add the directory chain as occupied sectors.
    let directory_chain = ChainIterator::new(disk, format.first_directory_location())
        .take(format.directory_sectors as usize);
    for sector in directory_chain {
        match sector {
            Ok(sector) => {
                occupied_sector_map.insert(sector.location(), SYSTEM_OWNER.into());
            }
            Err(e) => {
                errors.push(ValidationError::DirectoryScanError(e.into()));
                break;
            }
        }
    }
    // 3. All files
    for file in disk.directory() {
        let file_occupied_sectors = match file.chain(disk) {
            Ok(chain) => chain,
            Err(e) => match DiskError::from_io_error(&e) {
                Some(e) => {
                    errors.push(ValidationError::FileScanError(e, file.name().clone()));
                    continue;
                }
                None => return Err(e),
            },
        };
        for location in file_occupied_sectors.iter() {
            match occupied_sector_map.entry(*location) {
                Entry::Occupied(owner) => {
                    errors.push(ValidationError::SectorOveroccupied(
                        *location,
                        owner.get().clone(),
                        file.name().clone(),
                    ));
                }
                Entry::Vacant(v) => {
                    v.insert(file.name().clone());
                }
            };
        }
    }

    // Confirm all system sectors are still allocated
    for location in system_sectors.iter() {
        if bam.is_free(*location) {
            errors.push(ValidationError::SystemSectorNotAllocated(*location));
        }
    }

    // Look for sectors that are allocated but not occupied.
    for location in bam.allocated_sectors() {
        if !occupied_sector_map.contains_key(&location) {
            errors.push(ValidationError::SectorMisallocated(location));
        }
    }

    // Look for sectors that are occupied but not allocated.
    let system_sectors: BTreeSet<Location> = system_sectors.into_iter().collect();
    for (location, owner) in occupied_sector_map.iter() {
        // System sector misoccupation was handled with SystemSectorNotAllocated above.
        if system_sectors.contains(location) || !bam.is_free(*location) {
            continue;
        }
        errors.push(ValidationError::SectorMisoccupied(*location, owner.clone()));
    }

    // Compare each track's free count with its bitmap.
    for track in bam.mismatched_tracks() {
        if let Some(entry) = bam.entry(track) {
            errors.push(ValidationError::FreeCountMismatch {
                track,
                count: entry.free_sectors,
                bits: entry.free_bits(format.sectors_in_track(track)),
            });
        }
    }

    debug!("validation found {} problems", errors.len());
    Ok(errors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::disk::d64::{blank_image, image_offset};

    /// Clear a sector's free bit and lower the track's free count.
    fn allocate(image: &mut [u8], location: Location) {
        let bam = image_offset(Location(18, 0));
        let record = bam + location.0 as usize * 4;
        let byte = record + 1 + location.1 as usize / 8;
        image[byte] &= !(1 << (location.1 % 8));
        image[record] -= 1;
    }

    fn add_file(image: &mut [u8], slot: usize, name: &[u8], first: Location) {
        let offset = image_offset(Location(18, 1)) + slot * 32;
        image[offset + 0x02] = 0x82;
        image[offset + 0x03] = first.0;
        image[offset + 0x04] = first.1;
        for b in image[offset + 0x05..offset + 0x15].iter_mut() {
            *b = 0xA0;
        }
        image[offset + 0x05..offset + 0x05 + name.len()].copy_from_slice(name);
        image[offset + 0x1E] = 1;
    }

    fn end_chain(image: &mut [u8], location: Location) {
        let offset = image_offset(location);
        image[offset] = 0;
        image[offset + 1] = 0xFF;
    }

    #[test]
    fn test_blank_disk_is_valid() {
        let disk = D64::from_bytes(blank_image(b"OK", b"01")).unwrap();
        assert_eq!(disk.validate().unwrap(), vec![]);
    }

    #[test]
    fn test_consistent_file() {
        let mut image = blank_image(b"OK", b"01");
        add_file(&mut image, 1, b"ONE", Location(17, 0));
        end_chain(&mut image, Location(17, 0));
        allocate(&mut image, Location(17, 0));
        let disk = D64::from_bytes(image).unwrap();
        assert_eq!(disk.validate().unwrap(), vec![]);
    }

    #[test]
    fn test_inconsistencies() {
        let mut image = blank_image(b"BAD", b"01");
        // ONE occupies 17/0 but the BAM still marks it free.
        add_file(&mut image, 1, b"ONE", Location(17, 0));
        end_chain(&mut image, Location(17, 0));
        // TWO starts at 16/0 and then shares 17/0 with ONE.
        add_file(&mut image, 2, b"TWO", Location(16, 0));
        let offset = image_offset(Location(16, 0));
        image[offset] = 17;
        image[offset + 1] = 0;
        allocate(&mut image, Location(16, 0));
        // LOOP links to itself.
        add_file(&mut image, 3, b"LOOP", Location(15, 0));
        let offset = image_offset(Location(15, 0));
        image[offset] = 15;
        image[offset + 1] = 0;
        allocate(&mut image, Location(15, 0));
        // 14/0 is allocated but nothing uses it.
        allocate(&mut image, Location(14, 0));
        // Track 2's free count is off by one.
        image[image_offset(Location(18, 0)) + 2 * 4] -= 1;

        let disk = D64::from_bytes(image).unwrap();
        let errors = disk.validate().unwrap();
        assert_eq!(
            errors,
            vec![
                ValidationError::SectorOveroccupied(Location(17, 0), "ONE".into(), "TWO".into()),
                ValidationError::FileScanError(DiskError::CorruptChain, "LOOP".into()),
                ValidationError::SectorMisallocated(Location(14, 0)),
                ValidationError::SectorMisallocated(Location(15, 0)),
                ValidationError::SectorMisoccupied(Location(17, 0), "ONE".into()),
                ValidationError::FreeCountMismatch {
                    track: 2,
                    count: 20,
                    bits: 21
                },
            ]
        );
        assert_eq!(
            errors[5].to_string(),
            "Track 2 free count is 20, but its bitmap shows 21"
        );
    }
}
