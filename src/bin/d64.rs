use clap::{App, AppSettings, Arg, SubCommand};
use log::debug;
use std::fs;
use std::io::{self, Write};
use std::process;

use d64::disk::{self, Location, D64};

// Possible exit codes
static _EXIT_SUCCESS: i32 = 0;
static EXIT_FAILURE: i32 = 1;

/// If a dash is specified for a filename, this indicates that the user wants
/// to write to standard output.
static STDOUT_PSEUDOFILENAME: &str = "-";

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    // Parse command-line arguments
    let app = App::new("D64 Disk Image Utility")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Inspect Commodore 1541 (D64) disk images.")
        .setting(AppSettings::SubcommandRequiredElseHelp)
        .arg(Arg::with_name("diskimage").required(true))
        .subcommand(
            SubCommand::with_name("dir")
                .about("Show a directory listing")
                .arg(
                    Arg::with_name("verbose")
                        .short("v")
                        .long("verbose")
                        .multiple(true)
                        .help("Show more detail"),
                ),
        )
        .subcommand(SubCommand::with_name("bam").about("Show the Block Availability Map (BAM)"))
        .subcommand(
            SubCommand::with_name("read")
                .about("Read a file from a disk image.")
                .arg(
                    Arg::with_name("raw")
                        .long("raw")
                        .help("Write whole sectors, link bytes included"),
                )
                .arg(Arg::with_name("source_filename").required(true))
                .arg(Arg::with_name("destination_filename").required(false)),
        )
        .subcommand(
            SubCommand::with_name("chain")
                .about("List the sectors a file occupies.")
                .arg(Arg::with_name("filename").required(true)),
        )
        .subcommand(
            SubCommand::with_name("dump")
                .about("Provide a hex dump of a disk image or file.")
                .arg(Arg::with_name("filename").required(false)),
        )
        .subcommand(SubCommand::with_name("validate").about("Validate a disk image."))
        .subcommand(
            SubCommand::with_name("free")
                .about("Show the sector CBM DOS would use for the next new file."),
        );

    let mut app_clone = app.clone();
    let matches = app.get_matches();

    let diskimage = matches.value_of("diskimage").unwrap_or_default();
    let result = match matches.subcommand() {
        ("dir", Some(m)) => cmd_dir(diskimage, m.occurrences_of("verbose")),
        ("bam", Some(_)) => cmd_bam(diskimage),
        ("read", Some(m)) => cmd_read(
            diskimage,
            m.value_of("source_filename").unwrap_or_default(),
            m.value_of("destination_filename"),
            m.is_present("raw"),
        ),
        ("chain", Some(m)) => cmd_chain(diskimage, m.value_of("filename").unwrap_or_default()),
        ("dump", Some(m)) => cmd_dump(diskimage, m.value_of("filename")),
        ("validate", Some(_)) => cmd_validate(diskimage),
        ("free", Some(_)) => cmd_free(diskimage),
        _ => {
            let _ = app_clone.print_help();
            println!();
            process::exit(EXIT_FAILURE);
        }
    };
    if let Err(e) = result {
        eprintln!("Error: {}", e);
        process::exit(EXIT_FAILURE);
    }
}

/// Open a file for writing
fn open_fs_writer(filename: &str) -> io::Result<Box<dyn Write>> {
    if filename == STDOUT_PSEUDOFILENAME {
        Ok(Box::new(io::stdout()))
    } else {
        Ok(Box::new(fs::File::create(filename)?))
    }
}

fn cmd_dir(diskimage: &str, verbosity: u64) -> io::Result<()> {
    let disk = disk::open(diskimage)?;
    println!("{}", disk);
    for file in disk.directory() {
        if verbosity > 0 {
            println!("{:#}", file.entry());
            if verbosity > 1 {
                match file.chain(&disk) {
                    Ok(chain) => println!("    {}", Location::format_locations(chain)),
                    Err(e) => println!("    {}", e),
                }
            }
        } else {
            println!("{}", file.entry());
        }
    }
    println!("{} blocks free.", disk.free_blocks());
    Ok(())
}

fn cmd_bam(diskimage: &str) -> io::Result<()> {
    let disk = disk::open(diskimage)?;
    print!("{:?}", disk.bam());
    Ok(())
}

fn cmd_read(
    diskimage: &str,
    source_filename: &str,
    destination_filename: Option<&str>,
    raw: bool,
) -> io::Result<()> {
    let destination_filename = destination_filename.unwrap_or(source_filename);
    let disk = disk::open(diskimage)?;
    let file = disk.find_file(&source_filename.into())?;
    let mut writer = open_fs_writer(destination_filename)?;
    if raw {
        writer.write_all(file.content(&disk)?)?;
    } else {
        let nbytes = io::copy(&mut file.reader(&disk), &mut writer)?;
        debug!("read {} bytes from \"{}\"", nbytes, file.name());
    }
    writer.flush()?;
    Ok(())
}

fn cmd_chain(diskimage: &str, filename: &str) -> io::Result<()> {
    let disk = disk::open(diskimage)?;
    let file = disk.find_file(&filename.into())?;
    for location in file.chain(&disk)? {
        let sector = disk.sector(*location)?;
        match sector.next_location() {
            Some(next) => println!("{} -> {}", location, next),
            None => println!("{} end, {} bytes used", location, sector.byte(1)? as usize + 1),
        }
    }
    Ok(())
}

fn cmd_dump(diskimage: &str, filename: Option<&str>) -> io::Result<()> {
    let disk = disk::open(diskimage)?;
    let mut stdout = io::stdout();
    match filename {
        Some(filename) => {
            let file = disk.find_file(&filename.into())?;
            file.dump(&disk, &mut stdout)?;
        }
        None => disk.dump(&mut stdout)?,
    }
    stdout.flush()?;
    Ok(())
}

fn cmd_validate(diskimage: &str) -> io::Result<()> {
    let disk = disk::open(diskimage)?;
    let errors = disk.validate()?;
    for e in errors.iter() {
        println!("{}", e);
    }
    if errors.is_empty() {
        println!("Disk validates successfully.");
        Ok(())
    } else {
        Err(io::Error::new(
            io::ErrorKind::Other,
            format!("{} errors found during validation.", errors.len()),
        ))
    }
}

fn cmd_free(diskimage: &str) -> io::Result<()> {
    let disk: D64 = disk::open(diskimage)?;
    match disk.first_free_sector() {
        Some(location) => println!("{}", location),
        None => println!("Disk full."),
    }
    Ok(())
}
