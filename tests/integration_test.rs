use std::io::{self, Read, Write};

use d64::disk::directory::FileType;
use d64::disk::{self, DiskError, Id, Location, D64};
use d64::Petscii;
use rand::{Rng, XorShiftRng};

const ITERATIONS: usize = 25;
const MAX_FILES_PER_IMAGE: usize = 40;
const MAX_FILE_SIZE: usize = 12 * 1024;
const RNG_SEED: [u8; 16] = [
    0x04, 0xC1, 0x1D, 0xB7, 0x1E, 0xDC, 0x6F, 0x41, 0x74, 0x1B, 0x8C, 0xD7, 0x32, 0x58, 0x34, 0x99,
];

const BLOCK_SIZE: usize = 256;
const CONTENT_BYTES_PER_BLOCK: usize = 254;
const IMAGE_SIZE: usize = 174848;
const BLANK_BLOCKS_FREE: usize = 664;
const PADDING_BYTE: u8 = 0xA0;

fn deterministic_rng() -> XorShiftRng {
    rand::SeedableRng::from_seed(RNG_SEED)
}

fn sectors_in_track(track: u8) -> u8 {
    match track {
        1..=17 => 21,
        18..=24 => 19,
        25..=30 => 18,
        31..=35 => 17,
        _ => 0,
    }
}

fn image_offset(location: Location) -> usize {
    let preceding: usize = (1..location.0).map(|t| sectors_in_track(t) as usize).sum();
    (preceding + location.1 as usize) * BLOCK_SIZE
}

/// Builds D64 images byte by byte, the way a 1541 would lay them out after a
/// fresh format and a number of saves.
struct ImageBuilder {
    bytes: Vec<u8>,
    free_data_sectors: Vec<Location>,
    directory_sectors: Vec<Location>,
    entries: usize,
}

impl ImageBuilder {
    fn format(name: &[u8], id: &[u8; 2]) -> ImageBuilder {
        let mut builder = ImageBuilder {
            bytes: vec![0u8; IMAGE_SIZE],
            free_data_sectors: vec![],
            directory_sectors: vec![Location(18, 1)],
            entries: 0,
        };
        let bam = image_offset(Location(18, 0));
        builder.bytes[bam] = 18;
        builder.bytes[bam + 1] = 1;
        builder.bytes[bam + 2] = b'A';
        for track in 1..=35u8 {
            let sectors = sectors_in_track(track);
            let record = bam + track as usize * 4;
            builder.bytes[record] = sectors;
            for sector in 0..sectors {
                builder.bytes[record + 1 + sector as usize / 8] |= 1 << (sector % 8);
                if track != 18 {
                    builder.free_data_sectors.push(Location(track, sector));
                }
            }
        }
        builder.allocate(Location(18, 0));
        builder.allocate(Location(18, 1));
        for b in builder.bytes[bam + 0x90..bam + 0xAB].iter_mut() {
            *b = PADDING_BYTE;
        }
        builder.bytes[bam + 0x90..bam + 0x90 + name.len()].copy_from_slice(name);
        builder.bytes[bam + 0xA2..bam + 0xA4].copy_from_slice(id);
        builder.bytes[bam + 0xA5..bam + 0xA7].copy_from_slice(b"2A");
        builder.link(Location(18, 1), 0, 0xFF);
        builder
    }

    fn allocate(&mut self, location: Location) {
        let record = image_offset(Location(18, 0)) + location.0 as usize * 4;
        let byte = record + 1 + location.1 as usize / 8;
        let bit = 1 << (location.1 % 8);
        assert!(self.bytes[byte] & bit != 0, "{} already allocated", location);
        self.bytes[byte] &= !bit;
        self.bytes[record] -= 1;
    }

    fn link(&mut self, location: Location, track: u8, sector: u8) {
        let offset = image_offset(location);
        self.bytes[offset] = track;
        self.bytes[offset + 1] = sector;
    }

    /// Add a directory entry, growing the directory chain by three sectors
    /// at a time when the current sector is full.
    fn add_entry(&mut self, attributes: u8, name: &[u8], first: Location, blocks: u16) -> Location {
        let slot = self.entries % 8;
        if self.entries > 0 && slot == 0 {
            let last = self.directory_sectors[self.directory_sectors.len() - 1];
            let next = Location(18, (last.1 + 3) % sectors_in_track(18));
            self.allocate(next);
            self.link(last, next.0, next.1);
            self.link(next, 0, 0xFF);
            self.directory_sectors.push(next);
        }
        let sector = self.directory_sectors[self.directory_sectors.len() - 1];
        let offset = image_offset(sector) + slot * 32;
        let entry = &mut self.bytes[offset..offset + 32];
        entry[0x02] = attributes;
        entry[0x03] = first.0;
        entry[0x04] = first.1;
        for b in entry[0x05..0x15].iter_mut() {
            *b = PADDING_BYTE;
        }
        entry[0x05..0x05 + name.len()].copy_from_slice(name);
        entry[0x1E..0x20].copy_from_slice(&blocks.to_le_bytes());
        self.entries += 1;
        sector
    }

    /// Store a file in randomly chosen free sectors and list it in the
    /// directory.  Return the sectors used, in chain order.
    fn save(&mut self, rng: &mut impl Rng, file: &RandomFile) -> Vec<Location> {
        let blocks = file.blocks();
        let mut chain = vec![];
        for _ in 0..blocks {
            let index = rng.gen_range(0, self.free_data_sectors.len());
            let location = self.free_data_sectors.swap_remove(index);
            self.allocate(location);
            chain.push(location);
        }
        for (i, location) in chain.iter().enumerate() {
            let data = file
                .contents
                .chunks(CONTENT_BYTES_PER_BLOCK)
                .nth(i)
                .unwrap_or(&[][..]);
            let offset = image_offset(*location);
            self.bytes[offset + 2..offset + 2 + data.len()].copy_from_slice(data);
            match chain.get(i + 1) {
                Some(next) => self.link(*location, next.0, next.1),
                None => self.link(*location, 0, data.len() as u8 + 1),
            }
        }
        self.add_entry(
            0x80 | file.file_type_nibble(),
            file.name.as_bytes(),
            chain[0],
            blocks as u16,
        );
        chain
    }
}

struct RandomFile {
    name: Petscii,
    file_type: FileType,
    contents: Vec<u8>,
}

impl RandomFile {
    fn new(rng: &mut impl Rng) -> RandomFile {
        static FILE_TYPES: &[FileType] = &[FileType::PRG, FileType::SEQ, FileType::USR];
        let size: usize = rng.gen_range(0, MAX_FILE_SIZE);
        let mut contents = vec![0u8; size];
        rng.fill(&mut contents[..]);
        RandomFile {
            name: random_name(rng),
            file_type: FILE_TYPES[rng.gen_range(0, FILE_TYPES.len())],
            contents,
        }
    }

    /// An empty file still takes one block.
    fn blocks(&self) -> usize {
        ((self.contents.len() + CONTENT_BYTES_PER_BLOCK - 1) / CONTENT_BYTES_PER_BLOCK).max(1)
    }

    fn file_type_nibble(&self) -> u8 {
        match self.file_type {
            FileType::SEQ => 1,
            FileType::PRG => 2,
            FileType::USR => 3,
            _ => unreachable!(),
        }
    }
}

fn random_name(rng: &mut impl Rng) -> Petscii {
    const MIN_NAME_SIZE: usize = 1;
    const MAX_NAME_SIZE: usize = 16;
    let name_size = rng.gen_range(MIN_NAME_SIZE, MAX_NAME_SIZE + 1);
    let mut bytes = vec![0u8; name_size];
    rng.fill(&mut bytes[..]);
    // Filenames can't end with 0xA0 since the field is padded with 0xA0 bytes.
    if bytes[name_size - 1] == PADDING_BYTE {
        bytes[name_size - 1] = b'X';
    }
    Petscii::from_bytes(&bytes)
}

fn write_temp_image(bytes: &[u8]) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(bytes).unwrap();
    file.flush().unwrap();
    file
}

#[test]
fn blank_image() {
    let builder = ImageBuilder::format(b"EMPTY DISK", b"E1");
    let disk = D64::from_bytes(builder.bytes).unwrap();
    assert_eq!(*disk.name(), "EMPTY DISK");
    assert_eq!(disk.id(), Id::from_bytes(b"E1"));
    assert_eq!(&disk.header().raw, &[b'E', b'1', PADDING_BYTE, b'2', b'A']);
    assert!(disk.directory().is_empty());
    assert_eq!(disk.free_blocks(), BLANK_BLOCKS_FREE);
    assert_eq!(disk.bam().bitmap_blocks_free(), BLANK_BLOCKS_FREE);
    assert_eq!(disk.validate().unwrap(), vec![]);
    assert_eq!(disk.first_free_sector(), Some(Location(17, 0)));

    let bitmap = disk.bitmap();
    assert_eq!(bitmap.len(), 35);
    for (i, track) in bitmap.iter().enumerate() {
        let number = i as u8 + 1;
        assert_eq!(track.len(), sectors_in_track(number) as usize);
        for (sector, free) in track.iter().enumerate() {
            let expected = !(number == 18 && sector < 2);
            assert_eq!(*free, expected, "({},{})", number, sector);
        }
    }
}

#[test]
fn random_images() {
    let mut rng = deterministic_rng();
    for _ in 0..ITERATIONS {
        let mut builder = ImageBuilder::format(random_name(&mut rng).as_bytes(), b"R1");
        let file_count = rng.gen_range(0, MAX_FILES_PER_IMAGE + 1);
        let mut saved = vec![];
        let mut blocks_used = 0;
        for _ in 0..file_count {
            let file = RandomFile::new(&mut rng);
            if file.blocks() > builder.free_data_sectors.len() {
                break;
            }
            blocks_used += file.blocks();
            let chain = builder.save(&mut rng, &file);
            saved.push((file, chain));
        }

        let disk = D64::from_bytes(builder.bytes).unwrap();
        assert_eq!(disk.directory().len(), saved.len());
        assert_eq!(disk.free_blocks(), BLANK_BLOCKS_FREE - blocks_used);
        assert_eq!(disk.bam().bitmap_blocks_free(), disk.free_blocks());
        assert_eq!(disk.validate().unwrap(), vec![]);

        for (file, (expected, chain)) in disk.directory().iter().zip(saved.iter()) {
            assert_eq!(*file.name(), expected.name);
            assert_eq!(file.file_type(), expected.file_type);
            assert!(file.is_closed());
            assert_eq!(file.size() as usize, expected.blocks());
            assert_eq!(file.chain(&disk).unwrap(), &chain[..]);
            assert_eq!(file.data(&disk).unwrap(), expected.contents);

            let content = file.content(&disk).unwrap();
            assert_eq!(content.len(), chain.len() * BLOCK_SIZE);
            for (block, location) in content.chunks(BLOCK_SIZE).zip(chain.iter()) {
                assert_eq!(block, disk.sector(*location).unwrap().data());
                assert!(!disk.sector(*location).unwrap().is_free());
            }
        }

        if let Some(location) = disk.first_free_sector() {
            assert_ne!(location.0, 18);
            assert!(disk.sector(location).unwrap().is_free());
        }
    }
}

#[test]
fn open_from_file() {
    let mut builder = ImageBuilder::format(b"ON DISK", b"D1");
    let mut rng = deterministic_rng();
    let file = RandomFile {
        name: "HELLO".into(),
        file_type: FileType::PRG,
        contents: b"\x01\x08HELLO WORLD".to_vec(),
    };
    builder.save(&mut rng, &file);
    let image = write_temp_image(&builder.bytes);

    let disk = disk::open(image.path()).unwrap();
    assert_eq!(*disk.name(), "ON DISK");
    let hello = disk.find_file(&"HELLO".into()).unwrap();
    assert_eq!(hello.file_type(), FileType::PRG);
    assert_eq!(hello.size(), 1);
    let mut data = vec![];
    hello.reader(&disk).read_to_end(&mut data).unwrap();
    assert_eq!(data, file.contents);
    assert_eq!(
        DiskError::from_io_error(&disk.find_file(&"GOODBYE".into()).err().unwrap()),
        Some(DiskError::NotFound)
    );
}

#[test]
fn wrong_sizes_are_rejected() {
    let blank = ImageBuilder::format(b"SIZE", b"S1").bytes;
    for size in &[0, IMAGE_SIZE - 1, IMAGE_SIZE + 1, IMAGE_SIZE + 683, 196608, 196608 + 768] {
        let mut bytes = blank.clone();
        bytes.resize(*size, 0);
        assert_eq!(
            D64::from_bytes(bytes.clone()).err().unwrap(),
            DiskError::InvalidGeometry
        );
        let image = write_temp_image(&bytes);
        assert_eq!(
            D64::open(image.path()).err().unwrap(),
            DiskError::InvalidGeometry
        );
    }

    let missing = tempfile::tempdir().unwrap().path().join("missing.d64");
    let error = disk::open(&missing).err().unwrap();
    assert_eq!(error.kind(), io::ErrorKind::NotFound);
    assert_eq!(DiskError::from_io_error(&error), None);
}

#[test]
fn corrupt_chain_affects_only_its_file() {
    let mut builder = ImageBuilder::format(b"DAMAGED", b"D2");
    let mut rng = deterministic_rng();
    let good = RandomFile {
        name: "GOOD".into(),
        file_type: FileType::SEQ,
        contents: vec![0x55; 600],
    };
    let bad = RandomFile {
        name: "BAD".into(),
        file_type: FileType::SEQ,
        contents: vec![0xAA; 600],
    };
    builder.save(&mut rng, &good);
    let bad_chain = builder.save(&mut rng, &bad);
    // Point the last sector of BAD back at its first.
    let first = bad_chain[0];
    builder.link(bad_chain[2], first.0, first.1);
    // A zero-length entry that has no sectors at all.
    builder.add_entry(0x81, b"NOTHING", Location(0, 0), 0);
    // A scratched entry.
    builder.add_entry(0x00, b"GONE", Location(1, 0), 3);

    let disk = D64::from_bytes(builder.bytes).unwrap();
    let names: Vec<String> = disk
        .directory()
        .iter()
        .map(|f| f.name().to_escaped_string())
        .collect();
    assert_eq!(names, vec!["GOOD", "BAD", "NOTHING"]);

    let bad = disk.find_file(&"BAD".into()).unwrap();
    assert_eq!(
        bad.chain(&disk).err().unwrap(),
        DiskError::CorruptChain
    );
    assert_eq!(bad.data(&disk).unwrap_err(), DiskError::CorruptChain);

    let good_file = disk.find_file(&"GOOD".into()).unwrap();
    assert_eq!(good_file.data(&disk).unwrap(), good.contents);

    let nothing = disk.find_file(&"NOTHING".into()).unwrap();
    assert!(nothing.chain(&disk).unwrap().is_empty());
    assert!(nothing.content(&disk).unwrap().is_empty());
    assert!(nothing.data(&disk).unwrap().is_empty());

    let errors = disk.validate().unwrap();
    assert!(errors.iter().any(|e| e.to_string().contains("BAD")));
}
