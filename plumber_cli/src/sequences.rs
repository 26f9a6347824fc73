use clap::Parser;

use plumber_studio::Result;

use crate::read_mdl;

#[derive(Parser)]
pub struct Sequences {
    mdl_path: String,
    /// Only print sequences with this label
    #[clap(short, long)]
    name: Option<String>,
    #[clap(short = 'N', long)]
    names_only: bool,
}

pub fn sequences(opts: &Sequences) -> Result<()> {
    let mdl = read_mdl(&opts.mdl_path)?;
    let header = mdl.header()?;
    let animations: Vec<_> = header.animations()?.collect();
    let bone_count = header.bones()?.len();

    for sequence in header.sequences()? {
        let label = sequence.label()?;

        if let Some(filter) = &opts.name {
            if label != filter {
                continue;
            }
        }

        if opts.names_only {
            println!("{}", label);
            continue;
        }

        println!("{}", label);
        if let Some(activity) = sequence.activity_name()? {
            println!("  activity: {} ({})", activity, sequence.activity.get());
        }
        println!("  flags: {:?}", sequence.flags());
        println!("  fade: {:?}", sequence.fade_times());

        let grid = sequence.blend_grid()?;
        println!("  blend grid {}x{}:", grid.width, grid.height);
        for index in &grid.indexes {
            let name = usize::try_from(*index)
                .ok()
                .and_then(|i| animations.get(i))
                .map(|a| a.name())
                .transpose()?
                .unwrap_or("<invalid>");
            println!("    {} {}", index, name);
        }

        for event in sequence.events()? {
            println!(
                "  event {} at {}: {}",
                event.event.get(),
                event.cycle.get(),
                String::from_utf8_lossy(event.options())
            );
        }

        let weights = sequence.bone_weights(bone_count)?;
        if weights.iter().any(|&w| (w - 1.0).abs() > f32::EPSILON) {
            println!("  bone weights: {:?}", weights);
        }
    }

    Ok(())
}
