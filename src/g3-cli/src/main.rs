mod cli;
mod commands;
mod config;
mod file_utils;
mod logging;

use anyhow::Result;
use clap::Parser;
use config::Config;

use cli::*;

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    match cli.command {
        Commands::Info { input } => {
            commands::info::handle(&input)?;
        }

        Commands::Dump { input, json } => {
            let enums = Config::load()?.enum_registry()?;
            commands::dump::handle(&input, json, &enums)?;
        }

        Commands::Roundtrip { input } => {
            if !commands::roundtrip::handle(&input)? {
                std::process::exit(1);
            }
        }

        Commands::Strings {
            input,
            clear,
            force,
        } => {
            commands::strings::handle(&input, clear, force)?;
        }

        Commands::New {
            kind,
            output,
            content_box,
        } => {
            commands::new::handle(kind, &output, content_box)?;
        }

        Commands::Guid { text, count } => {
            commands::guid::handle(text.as_deref(), count)?;
        }

        Commands::Scan { dir, guid, name } => {
            let query = commands::scan::Query::from_args(guid.as_deref(), name.as_deref())?;
            commands::scan::handle(dir, &query, &Config::load()?)?;
        }

        Commands::Lightdata { input } => {
            commands::lightdata::handle(&input)?;
        }

        Commands::Configure {
            data_dir,
            enums,
            show,
        } => {
            commands::configure::handle(data_dir, enums, show)?;
        }
    }

    Ok(())
}
