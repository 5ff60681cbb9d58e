//! Main Program for Tilecipher
//! Run with `--help` for more instruction

// Copyright (C) 2023 Dheatly23
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

mod logging;

use std::path::{Path, PathBuf};

use anyhow::{Context, Error};
use clap::{Parser, Subcommand};
use tilecipher::media::{ImageSequence, ImageSequenceWriter};
use tilecipher::pipeline::{self, Cancel, RoundtripPaths, RunReport};
use tilecipher::session::{Key, Session};
use tilecipher::{rng_from_seed, ConfigBuilder, PermutationReader, SidecarFormat};

use crate::logging::{init_logging, LogFormat, LogLevel};

const SIDECAR_NAME: &str = "permutations.txt";

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Log output format (stderr)
    #[arg(long, value_enum, default_value = "text", global = true)]
    log_format: LogFormat,

    /// Minimum log level (stderr)
    #[arg(long, value_enum, default_value = "info", global = true)]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Shuffle every frame of an image sequence
    Encrypt(EncryptArgs),
    /// Restore an encrypted image sequence using its sidecar
    Decrypt(DecryptArgs),
    /// Encrypt in the background, then decrypt the result
    Roundtrip(RoundtripArgs),
    /// Replay an interactive session with a scripted key sequence
    Replay(ReplayArgs),
    /// Print what a sidecar file contains
    Inspect(InspectArgs),
}

#[derive(clap::Args, Debug)]
struct EncryptArgs {
    /// Input directory of frames
    input: PathBuf,

    /// Output directory
    #[arg(short = 'o', long)]
    output: PathBuf,

    /// Tiles per row and column
    #[arg(short = 'g', long)]
    grid_size: usize,

    /// Sidecar file (default: permutations.txt in the output directory)
    #[arg(long)]
    sidecar: Option<PathBuf>,

    /// Random seed
    #[arg(long)]
    seed: Option<String>,

    /// Write a bare sidecar without header
    #[arg(long)]
    legacy: bool,
}

#[derive(clap::Args, Debug)]
struct DecryptArgs {
    /// Directory of encrypted frames
    input: PathBuf,

    /// Output directory
    #[arg(short = 'o', long)]
    output: PathBuf,

    /// Sidecar file (default: permutations.txt in the input directory)
    #[arg(long)]
    sidecar: Option<PathBuf>,

    /// Tiles per row and column (required for sidecars without header)
    #[arg(short = 'g', long)]
    grid_size: Option<usize>,
}

#[derive(clap::Args, Debug)]
struct RoundtripArgs {
    /// Input directory of frames
    input: PathBuf,

    /// Directory for encrypted frames and the sidecar
    #[arg(long)]
    encrypted: PathBuf,

    /// Directory for decrypted frames
    #[arg(long)]
    decrypted: PathBuf,

    /// Tiles per row and column
    #[arg(short = 'g', long)]
    grid_size: usize,

    /// Random seed
    #[arg(long)]
    seed: Option<String>,

    /// Write a bare sidecar without header
    #[arg(long)]
    legacy: bool,
}

#[derive(clap::Args, Debug)]
struct ReplayArgs {
    /// Input directory of frames
    input: PathBuf,

    /// Output directory for the displayed frames
    #[arg(short = 'o', long)]
    output: PathBuf,

    /// Tiles per row and column (2 to 64)
    #[arg(short = 'g', long)]
    grid_size: usize,

    /// One key per frame: `e` toggles encryption, `d` decryption,
    /// `q` quits, anything else does nothing
    #[arg(long, default_value = "")]
    keys: String,

    /// Random seed
    #[arg(long)]
    seed: Option<String>,
}

#[derive(clap::Args, Debug)]
struct InspectArgs {
    /// Sidecar file
    sidecar: PathBuf,

    /// Tiles per row and column (required for sidecars without header)
    #[arg(short = 'g', long)]
    grid_size: Option<usize>,
}

fn sidecar_format(legacy: bool) -> SidecarFormat {
    if legacy {
        SidecarFormat::Legacy
    } else {
        SidecarFormat::Headered
    }
}

fn sidecar_path(explicit: Option<PathBuf>, dir: &Path) -> PathBuf {
    explicit.unwrap_or_else(|| dir.join(SIDECAR_NAME))
}

fn print_report(what: &str, report: &RunReport) {
    let status = if report.cancelled { " (cancelled)" } else { "" };
    match report.grid {
        Some(grid) => println!(
            "{what} {} frame(s) with a {g}x{g} grid of {}x{} tiles{status}",
            report.frames,
            grid.tile_width(),
            grid.tile_height(),
            g = grid.grid_size(),
        ),
        None => println!("{what} {} frame(s){status}", report.frames),
    }
}

fn install_ctrlc_handler(cancel: Cancel) -> Result<(), Error> {
    ctrlc::set_handler(move || cancel.cancel()).context("signal handler setup failed")
}

fn main() -> Result<(), Error> {
    let args = Args::parse();
    init_logging(args.log_format, args.log_level);

    let cancel = Cancel::new();
    install_ctrlc_handler(cancel.clone())?;

    match args.command {
        Command::Encrypt(a) => {
            let config = ConfigBuilder::new()
                .grid_size(a.grid_size)
                .seed(a.seed)
                .sidecar_format(sidecar_format(a.legacy))
                .build()?;
            let sidecar = sidecar_path(a.sidecar, &a.output);

            let report = pipeline::encrypt_dir(&config, &a.input, &a.output, &sidecar, &cancel)
                .with_context(|| format!("encrypting {}", a.input.display()))?;
            print_report("Encrypted", &report);
            println!("Permutations written to {}", sidecar.display());
        }
        Command::Decrypt(a) => {
            let sidecar = sidecar_path(a.sidecar, &a.input);

            let report = pipeline::decrypt_dir(&a.input, &a.output, &sidecar, a.grid_size, &cancel)
                .with_context(|| format!("decrypting {}", a.input.display()))?;
            print_report("Decrypted", &report);
        }
        Command::Roundtrip(a) => {
            let config = ConfigBuilder::new()
                .grid_size(a.grid_size)
                .seed(a.seed)
                .sidecar_format(sidecar_format(a.legacy))
                .build()?;
            let paths = RoundtripPaths {
                sidecar: a.encrypted.join(SIDECAR_NAME),
                input: a.input,
                encrypted: a.encrypted,
                decrypted: a.decrypted,
            };

            let (encrypted, decrypted) = pipeline::roundtrip(&config, &paths, &cancel)
                .with_context(|| format!("round trip of {}", paths.input.display()))?;
            print_report("Encrypted", &encrypted);
            if let Some(decrypted) = decrypted {
                print_report("Decrypted", &decrypted);
            }
        }
        Command::Replay(a) => {
            let mut session = Session::new(a.grid_size, rng_from_seed(a.seed.as_deref()))?;
            let mut source = ImageSequence::open(&a.input)?;
            let mut sink = ImageSequenceWriter::create(&a.output)?;
            let keys = a.keys.chars().map(Key::from_char);

            let report = pipeline::replay_stream(&mut session, &mut source, &mut sink, keys, &cancel)
                .with_context(|| format!("replaying {}", a.input.display()))?;
            print_report("Displayed", &report);
        }
        Command::Inspect(a) => {
            let reader = PermutationReader::open(&a.sidecar, a.grid_size)
                .with_context(|| format!("reading {}", a.sidecar.display()))?;
            println!("Grid size: {}", reader.grid_size());
            println!("Tiles per frame: {}", reader.tile_count());
            println!("Frames: {}", reader.frames());
            println!(
                "Checksum: {}",
                if reader.checksum_verified() {
                    "verified"
                } else {
                    "none"
                }
            );
        }
    }

    Ok(())
}
