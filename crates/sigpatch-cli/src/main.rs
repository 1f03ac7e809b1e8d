use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "sigpatch")]
#[command(about = "Signature scanning and byte derivation for binary files")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Scan an image for a signature and print the match addresses
    Scan {
        /// Binary file treated as the image
        image: PathBuf,

        /// Signature string, e.g. "48 8B ? ? [75 90] CC"
        signature: String,

        /// Base address to report matches relative to
        #[arg(short, long, default_value_t = 0, value_parser = parse_hex)]
        base: u64,
    },

    /// Scan for a signature, then run a mask at the first match
    Derive {
        image: PathBuf,
        signature: String,

        /// Mask string, e.g. "90 ? %(+01) $(+02) @4(CC)"
        mask: String,

        #[arg(short, long, default_value_t = 0, value_parser = parse_hex)]
        base: u64,
    },

    /// Scan every entry of a JSON signature catalog
    Resolve {
        image: PathBuf,

        /// Catalog file: {"entries":[{"name","signature","mask"?}]}
        catalog: PathBuf,

        #[arg(short, long, default_value_t = 0, value_parser = parse_hex)]
        base: u64,
    },

    /// Apply a directory of two-line patch files to an image file
    Patch {
        image: PathBuf,

        /// Directory of patch files (line 1: find, line 2: replace)
        patches: PathBuf,

        /// Where to write the patched image
        #[arg(short, long)]
        output: PathBuf,
    },
}

fn parse_hex(value: &str) -> Result<u64, String> {
    let trimmed = value.trim_start_matches("0x").trim_start_matches("0X");
    u64::from_str_radix(trimmed, 16).map_err(|e| e.to_string())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("sigpatch=info".parse()?))
        .init();

    let args = Args::parse();

    match args.command {
        Command::Scan {
            image,
            signature,
            base,
        } => commands::scan::run(&image, &signature, base),
        Command::Derive {
            image,
            signature,
            mask,
            base,
        } => commands::derive::run(&image, &signature, &mask, base),
        Command::Resolve {
            image,
            catalog,
            base,
        } => commands::resolve::run(&image, &catalog, base),
        Command::Patch {
            image,
            patches,
            output,
        } => commands::patch::run(&image, &patches, &output),
    }
}
