#![warn(clippy::all, clippy::pedantic)]

mod bones;
mod info;
mod sequences;
mod textures;
mod verify;

use std::process::ExitCode;

use clap::Parser;
use tracing::Level;

use bones::{bones, Bones};
use info::{info, Info};
use sequences::{sequences, Sequences};
use textures::{textures, Textures};
use verify::{verify, Verify};

#[derive(Parser)]
#[clap(name = "plumber", version = "0.1.0")]
struct Opts {
    /// Log debug output
    #[clap(short, long)]
    verbose: bool,
    #[clap(subcommand)]
    subcommand: SubCommand,
}

#[derive(Parser)]
enum SubCommand {
    Info(Info),
    Bones(Bones),
    Textures(Textures),
    Sequences(Sequences),
    Verify(Verify),
}

fn main() -> ExitCode {
    let opts = Opts::parse();

    tracing_subscriber::fmt()
        .with_max_level(if opts.verbose {
            Level::DEBUG
        } else {
            Level::WARN
        })
        .with_writer(std::io::stderr)
        .init();

    let result = match opts.subcommand {
        SubCommand::Info(opts) => info(&opts),
        SubCommand::Bones(opts) => bones(&opts),
        SubCommand::Textures(opts) => textures(&opts),
        SubCommand::Sequences(opts) => sequences(&opts),
        SubCommand::Verify(opts) => verify(&opts),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {}", err);
            ExitCode::FAILURE
        }
    }
}

/// Reads just the mdl, without companion files.
fn read_mdl(path: &str) -> plumber_studio::Result<plumber_studio::Mdl> {
    let file = std::fs::File::open(path).map_err(|err| plumber_studio::Error::Io {
        path: path.to_owned(),
        error: err.to_string(),
    })?;

    let mdl = plumber_studio::Mdl::read(file).map_err(|err| plumber_studio::Error::Io {
        path: path.to_owned(),
        error: err.to_string(),
    })?;
    mdl.check_signature()?;

    Ok(mdl)
}
