use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use mzmrip::{probe_patch, ExtractedImage, Rom, RomMap, SegmentList};
use std::{
    fs,
    path::{Path, PathBuf},
};

#[derive(Parser, Debug)]
struct Arguments {
    /// Increase log verbosity (-v for debug, -vv to trace every token)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Rebuild the embedded program image from a given ROM
    Extract {
        rom: PathBuf,

        /// Where to write the rebuilt image. An existing file is overwritten
        out: PathBuf,

        #[command(flatten)]
        args: ExtractArgs,
    },

    /// Scan a ROM for LZ77 patch blocks. Expect false positives, but every hit decodes cleanly
    Scan {
        rom: PathBuf,

        #[command(flatten)]
        args: ScanArgs,
    },
}

#[derive(Args, Debug, Clone)]
struct ExtractArgs {
    /// Segments as SOURCE:START-END records joined by '+', the first being the primary stream
    #[arg(short, long, conflicts_with = "rom_map")]
    segments: Option<SegmentList>,

    /// Supply a custom ROM map that provides the segment offsets
    #[arg(short = 'm', long)]
    rom_map: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
struct ScanArgs {
    /// The smallest decompressed length to report
    #[arg(long, default_value = "16")]
    min_length: usize,

    /// The largest decompressed length to consider
    #[arg(long, default_value = "0x10000", value_parser = mzmrip::parse_number)]
    max_length: usize,
}

fn main() -> anyhow::Result<()> {
    let args = Arguments::parse();

    let mut logger = colog::default_builder();
    match args.verbose {
        0 => logger.filter_level(log::LevelFilter::Info),
        1 => logger.filter_level(log::LevelFilter::Debug),
        _ => logger.filter_level(log::LevelFilter::Trace),
    };
    logger.init();

    match args.command {
        Commands::Extract { rom, out, args } => {
            let rom = load_rom(&rom)?;
            extract(rom, out, args)
        }
        Commands::Scan { rom, args } => {
            let rom = load_rom(&rom)?;
            scan(rom, args)
        }
    }
}

fn load_rom(path: &Path) -> anyhow::Result<Rom> {
    let rom = Rom::open(path).with_context(|| format!("Failed to read ROM {}", path.display()))?;
    log::info!(
        "Loaded ROM: '{}' ({:#x} bytes) with CRC: {:#010x}",
        path.display(),
        rom.data().len(),
        rom.crc()
    );

    Ok(rom)
}

fn resolve_segments(rom: &Rom, args: ExtractArgs) -> anyhow::Result<SegmentList> {
    if let Some(segments) = args.segments {
        return Ok(segments);
    }

    if let Some(rom_map) = args.rom_map {
        let map = RomMap::parse(
            &fs::read_to_string(&rom_map)
                .with_context(|| format!("Failed to read ROM map {}", rom_map.display()))?,
        )?;

        if !map.is_compatible_with(rom.data()) {
            log::warn!("ROM map is not compatible with the supplied ROM. Continuing anyway.");
        }

        return Ok(map.segments);
    }

    let map = RomMap::find_inbuilt_for(rom.data()).with_context(|| {
        "Failed to find compatible ROM map for the supplied ROM. Supply --segments or --rom-map"
    })?;
    if let Some(metadata) = map.metadata_for(rom.data()) {
        log::info!("Using inbuilt map for '{}'", metadata.name);
    }

    Ok(map.segments.clone())
}

fn extract(rom: Rom, out: PathBuf, args: ExtractArgs) -> anyhow::Result<()> {
    let segments = resolve_segments(&rom, args)?;
    let image = ExtractedImage::new(rom.data(), &segments)?;
    let bytes = image.to_bytes();

    if out.exists() {
        log::info!("Overwriting existing {}", out.display());
    }
    fs::write(&out, &bytes).with_context(|| format!("Failed to write {}", out.display()))?;

    log::info!(
        "Wrote {} ({:#x} bytes, CRC: {:#010x})",
        out.display(),
        bytes.len(),
        crc32fast::hash(&bytes)
    );

    Ok(())
}

fn scan(rom: Rom, args: ScanArgs) -> anyhow::Result<()> {
    use indicatif::ProgressBar;
    use rayon::prelude::*;

    log::info!("Scanning entire ROM for LZ77 blocks...");

    let data = rom.data();
    let progress = ProgressBar::new(data.len() as u64);

    let found = (0..data.len())
        .into_par_iter()
        .filter_map(|offset| {
            progress.inc(1);
            probe_patch(data, offset, args.max_length)
        })
        .filter(|probe| probe.length >= args.min_length)
        .collect::<Vec<_>>();

    progress.finish_and_clear();

    for probe in &found {
        println!(
            "Found LZ77 block at {:#09x}-{:#09x} decompressing to {:#06x} bytes",
            probe.offset,
            probe.offset + probe.bytes_read - 1,
            probe.length
        );
    }

    log::info!("Done! Found {} potential LZ77 blocks", found.len());

    Ok(())
}
