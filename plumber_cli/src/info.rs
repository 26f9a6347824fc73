use std::io::{self, Write};

use clap::Parser;
use serde::Serialize;

use plumber_studio::{mdl::ArrayKind, Error, Result};

use crate::read_mdl;

#[derive(Parser)]
pub struct Info {
    mdl_path: String,
    /// Print the summary as json
    #[clap(short, long)]
    json: bool,
}

#[derive(Serialize)]
struct Summary<'a> {
    name: &'a str,
    version: i32,
    checksum: i32,
    flags: Vec<String>,
    mass: f32,
    surface_prop: Option<&'a str>,
    eye_position: [f32; 3],
    hull: [[f32; 3]; 2],
    arrays: Vec<(&'static str, i32)>,
}

pub fn info(opts: &Info) -> Result<()> {
    let mdl = read_mdl(&opts.mdl_path)?;
    let header = mdl.header()?;

    let (hull_min, hull_max) = header.hull();
    let summary = Summary {
        name: header.name()?,
        version: header.version(),
        checksum: header.checksum(),
        flags: header
            .flags()
            .iter_names()
            .map(|(name, _)| name.to_owned())
            .collect(),
        mass: header.mass(),
        surface_prop: header.surface_prop()?,
        eye_position: header.eye_position().to_array(),
        hull: [hull_min.to_array(), hull_max.to_array()],
        arrays: ArrayKind::ALL
            .iter()
            .map(|&kind| (kind.name(), header.header().array(kind).count))
            .filter(|(_, count)| *count != 0)
            .collect(),
    };

    if opts.json {
        return write_json(&summary, io::stdout().lock());
    }

    println!("{} (version {}, checksum {:#010x})", summary.name, summary.version, summary.checksum);
    if !summary.flags.is_empty() {
        println!("flags: {}", summary.flags.join(" | "));
    }
    println!("mass: {}", summary.mass);
    if let Some(surface_prop) = summary.surface_prop {
        println!("surface prop: {}", surface_prop);
    }
    println!("eye position: {:?}", summary.eye_position);
    println!("hull: {:?} .. {:?}", summary.hull[0], summary.hull[1]);
    for (name, count) in &summary.arrays {
        println!("{}: {}", name, count);
    }

    Ok(())
}

fn write_json<T: Serialize, W: Write>(value: &T, mut writer: W) -> Result<()> {
    let io_error = |error: String| Error::Io {
        path: "<stdout>".to_owned(),
        error,
    };

    serde_json::to_writer_pretty(&mut writer, value).map_err(|err| io_error(err.to_string()))?;
    writeln!(writer).map_err(|err| io_error(err.to_string()))
}
