use std::fs;

use anyhow::{Context, Result};
use structopt::StructOpt;

use heif::io::HeifFile;
use heif::reader::HeifReader;
use heif::writer::config::WriterConfig;
use heif::HeifWriter;

#[derive(StructOpt, Debug)]
pub struct MainOpts {
    #[structopt(long)]
    /// Log options (like RUST_LOG; trace, debug, info etc)
    pub log: Option<String>,
    #[structopt(subcommand)]
    pub cmd: Command,
}

#[derive(StructOpt, Debug)]
#[structopt(rename_all = "kebab-case")]
pub enum Command {
    #[structopt(display_order = 1)]
    /// Show the items, tracks and features of a HEIF file.
    Info(InfoOpts),

    #[structopt(display_order = 2)]
    /// Show the box tree.
    Dump(DumpOpts),

    #[structopt(display_order = 3)]
    /// Write a HEIF file from a JSON configuration.
    Write(WriteOpts),
}

#[derive(StructOpt, Debug)]
pub struct InfoOpts {
    /// Input filename.
    pub input: String,
}

#[derive(StructOpt, Debug)]
pub struct DumpOpts {
    /// Input filename.
    pub input: String,
}

#[derive(StructOpt, Debug)]
pub struct WriteOpts {
    /// Configuration file (JSON).
    pub config: String,
    #[structopt(short, long)]
    /// Output filename (overrides the configuration).
    pub output: Option<String>,
}

fn main() -> Result<()> {
    let opts = MainOpts::from_args();

    if let Some(log_opts) = opts.log.as_deref() {
        env_logger::Builder::new().parse_filters(log_opts).init();
    } else {
        env_logger::init();
    }

    match opts.cmd {
        Command::Info(opts) => info(opts),
        Command::Dump(opts) => dump(opts),
        Command::Write(opts) => write(opts),
    }
}

fn info(opts: InfoOpts) -> Result<()> {
    let mut file = HeifFile::open(&opts.input)
        .with_context(|| format!("open {}", opts.input))?;
    let mut reader = HeifReader::new();
    reader.initialize(&mut file)?;

    println!("file features: {:?}", reader.file_feature()?);

    for ctx in reader.context_ids()? {
        if let Ok(feature) = reader.meta_box_feature(ctx) {
            println!("meta context {}: {:?}", ctx, feature);
            for item_type in &["master", "thmb", "auxl", "hidden", "grid", "iovl", "Exif"] {
                let items = reader.get_item_list_by_type(ctx, item_type)?;
                for item_id in items {
                    match (reader.get_width(ctx, item_id), reader.get_height(ctx, item_id)) {
                        (Ok(w), Ok(h)) => {
                            println!("  item {} ({}): {}x{}", item_id, item_type, w, h)
                        },
                        _ => println!("  item {} ({})", item_id, item_type),
                    }
                }
            }
        } else if let Ok(feature) = reader.track_feature(ctx) {
            let samples = reader.get_item_list_by_type(ctx, "samples")?;
            println!(
                "track context {}: {} samples, duration {} ms, {:?}",
                ctx,
                samples.len(),
                reader.get_playback_duration_ms(ctx)?,
                feature
            );
        }
    }
    Ok(())
}

fn dump(opts: DumpOpts) -> Result<()> {
    let mut file = HeifFile::open(&opts.input)
        .with_context(|| format!("open {}", opts.input))?;
    let heif = heif::Heif::read(&mut file)?;
    for b in &heif.boxes {
        println!("{:#?}", b);
    }
    Ok(())
}

fn write(opts: WriteOpts) -> Result<()> {
    let json = fs::read_to_string(&opts.config)
        .with_context(|| format!("read {}", opts.config))?;
    let config = WriterConfig::from_json(&json)
        .with_context(|| format!("parse {}", opts.config))?;
    let writer = HeifWriter::new(config);
    writer.write_file(opts.output.as_deref())?;
    Ok(())
}
