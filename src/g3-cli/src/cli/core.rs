//! Core CLI definitions

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;

use super::new::{BoxArg, NewKind};

#[derive(Parser)]
#[command(name = "g3")]
#[command(about = "Genome file inspector", long_about = None)]
pub struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show what kind of Genome file this is and summarize it
    #[command(visible_alias = "i")]
    Info {
        /// Path to a Genome file
        input: PathBuf,
    },

    /// Print the entity tree or the decoded model
    #[command(visible_alias = "d")]
    Dump {
        /// Path to a Genome file
        input: PathBuf,

        /// Emit JSON instead of the indented tree
        #[arg(long)]
        json: bool,
    },

    /// Decode and re-encode a file, reporting whether the bytes match
    #[command(visible_alias = "rt")]
    Roundtrip {
        /// Path to a Genome file
        input: PathBuf,
    },

    /// List or clear the string table
    Strings {
        /// Path to a Genome file
        input: PathBuf,

        /// Clear the table and save the file
        #[arg(long)]
        clear: bool,

        /// Clear even when unknown classes may reference the table
        #[arg(long, requires = "clear")]
        force: bool,
    },

    /// Create an empty file from a built-in template
    #[command(visible_alias = "n")]
    New {
        /// Kind of file to create
        #[arg(value_enum)]
        kind: NewKind,

        /// Output path (the extension is replaced to match the kind)
        output: PathBuf,

        /// Context box for lrgeodat: minx,miny,minz,maxx,maxy,maxz
        #[arg(long = "box")]
        content_box: Option<BoxArg>,
    },

    /// Normalize a GUID or generate random ones
    #[command(visible_alias = "g")]
    Guid {
        /// GUID text to normalize
        text: Option<String>,

        /// Number of GUIDs to generate
        #[arg(short, long, default_value = "1")]
        count: usize,
    },

    /// Search every archive under a directory
    #[command(visible_alias = "s")]
    Scan {
        /// Directory to search (uses configured data directory if not provided)
        dir: Option<PathBuf>,

        /// Find the entity with this GUID
        #[arg(long, conflicts_with = "name", required_unless_present = "name")]
        guid: Option<String>,

        /// Find entities whose name contains this text (case-insensitive)
        #[arg(long)]
        name: Option<String>,
    },

    /// Show a static lighting export
    Lightdata {
        /// Path to the export
        input: PathBuf,
    },

    /// Configure default settings
    #[command(visible_alias = "c")]
    Configure {
        /// Set the default directory for scans
        #[arg(long)]
        data_dir: Option<PathBuf>,

        /// Set the enum definition file used by dump
        #[arg(long)]
        enums: Option<PathBuf>,

        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
}
