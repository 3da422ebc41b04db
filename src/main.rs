//! tracescope: detect and decode trace captures from the command line.

use std::fs::File;
use std::io::{self, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use flate2::read::GzDecoder;
use serde_json::json;
use tracing::debug;

use tracescope::logging::try_init_tracing_subscriber;
use tracescope::{
    DataFile, DecodeOptions, Dispatcher, FileType, FileTypeKey, FileTypeRegistry,
    InMemoryBlobStore, SchemaRegistry,
};

#[derive(Parser)]
#[command(name = "tracescope")]
#[command(about = "Detect and decode trace captures")]
#[command(version)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace). RUST_LOG overrides.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the supported file types
    Types,

    /// Print the detected file type of each file
    Detect {
        /// Trace files (.gz files are decompressed first)
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Decode a trace file
    Decode {
        /// Trace file (.gz files are decompressed first)
        file: PathBuf,

        /// Replace zero and empty fields with their declared defaults
        #[arg(long)]
        display_defaults: bool,

        /// JSON file with decode options
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Decode as this file type instead of detecting it
        #[arg(short = 't', long = "type")]
        file_type: Option<FileTypeKey>,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Summary)]
        format: OutputFormat,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Summary,
    Json,
}

/// Read a whole trace file, decompressing `.gz` input.
fn read_trace(path: &Path) -> Result<Vec<u8>> {
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    let mut reader: Box<dyn Read> = if path.extension().is_some_and(|ext| ext == "gz") {
        Box::new(GzDecoder::new(file))
    } else {
        Box::new(file)
    };

    let mut buffer = Vec::new();
    reader
        .read_to_end(&mut buffer)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    debug!(path = %path.display(), bytes = buffer.len(), "Read trace file");
    Ok(buffer)
}

/// File name reported in data files and errors.
fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn run_types(file_types: &FileTypeRegistry) -> Result<()> {
    let mut out = BufWriter::new(io::stdout().lock());
    for file_type in file_types.iter() {
        let magic = if file_types.signature(file_type.key).is_some() {
            "magic"
        } else {
            "fallback"
        };
        writeln!(
            out,
            "{:<18} {:<20} {:<16} {}",
            file_type.key, file_type.name, file_type.data_type, magic
        )?;
    }
    out.flush()?;
    Ok(())
}

fn run_detect(dispatcher: &Dispatcher<'_>, files: &[PathBuf]) -> Result<()> {
    let mut failed = 0;
    for path in files {
        let buffer = read_trace(path)?;
        let filename = display_name(path);
        match dispatcher.detect_and_decode(&buffer, &filename, &DecodeOptions::default()) {
            Ok((file_type, data_file)) => {
                println!("{}: {} ({} entries)", filename, file_type.key, data_file.len());
                data_file.release();
            }
            Err(err) => {
                eprintln!("{}: {}", filename, err);
                failed += 1;
            }
        }
    }

    if failed > 0 {
        bail!("{} of {} files could not be decoded", failed, files.len());
    }
    Ok(())
}

fn print_summary(file_type: &FileType, data_file: &DataFile) -> Result<()> {
    let mut out = BufWriter::new(io::stdout().lock());
    writeln!(out, "File:      {}", data_file.filename)?;
    writeln!(out, "Type:      {} ({})", file_type.name, file_type.key)?;
    writeln!(out, "Data type: {}", data_file.data_type)?;
    writeln!(out, "Blob:      {}", data_file.blob.id())?;
    writeln!(out, "Entries:   {}", data_file.len())?;
    if let (Some(first), Some(last)) = (data_file.timeline.first(), data_file.timeline.last()) {
        writeln!(out, "Timeline:  {} .. {} ns", first, last)?;
    }
    if let Some(entries) = data_file.entries() {
        for entry in entries {
            writeln!(out, "  {:>20}  {}", entry.timestamp, entry.name)?;
        }
    }
    out.flush()?;
    Ok(())
}

fn print_json(file_type: &FileType, data_file: &DataFile) -> Result<()> {
    let document = json!({
        "file_type": file_type.key,
        "name": file_type.name,
        "data": data_file,
    });
    let mut out = BufWriter::new(io::stdout().lock());
    serde_json::to_writer_pretty(&mut out, &document)?;
    writeln!(out)?;
    out.flush()?;
    Ok(())
}

fn run_decode(
    dispatcher: &Dispatcher<'_>,
    path: &Path,
    options: &DecodeOptions,
    file_type: Option<FileTypeKey>,
    format: OutputFormat,
) -> Result<()> {
    let buffer = read_trace(path)?;
    let filename = display_name(path);
    let (file_type, data_file) = match file_type {
        Some(key) => dispatcher.decode_as(key, &buffer, &filename, options)?,
        None => dispatcher.detect_and_decode(&buffer, &filename, options)?,
    };

    let printed = match format {
        OutputFormat::Summary => print_summary(file_type, &data_file),
        OutputFormat::Json => print_json(file_type, &data_file),
    };
    data_file.release();
    printed
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Err(err) = try_init_tracing_subscriber(cli.verbose) {
        eprintln!("Failed to initialize logging: {}", err);
    }

    let schemas = SchemaRegistry::builtin().context("Failed to load trace schemas")?;
    let file_types = FileTypeRegistry::builtin(&schemas).context("Invalid file type registry")?;
    let dispatcher = Dispatcher::new(&file_types, &schemas, Arc::new(InMemoryBlobStore::new()));

    match cli.command {
        Commands::Types => run_types(&file_types),
        Commands::Detect { files } => run_detect(&dispatcher, &files),
        Commands::Decode {
            file,
            display_defaults,
            config,
            file_type,
            format,
        } => {
            let mut options = match config {
                Some(path) => DecodeOptions::from_path(&path)?,
                None => DecodeOptions::default(),
            };
            if display_defaults {
                options.apply_defaults = true;
            }
            run_decode(&dispatcher, &file, &options, file_type, format)
        }
    }
}
