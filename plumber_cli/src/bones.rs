use clap::Parser;

use plumber_studio::Result;

use crate::read_mdl;

#[derive(Parser)]
pub struct Bones {
    mdl_path: String,
    /// Also print each bone's position and flags
    #[clap(short, long)]
    details: bool,
}

pub fn bones(opts: &Bones) -> Result<()> {
    let mdl = read_mdl(&opts.mdl_path)?;
    let header = mdl.header()?;
    let skeleton = header.skeleton()?;
    let bones: Vec<_> = header.bones()?.collect();

    for index in skeleton.depth_first() {
        let Some(bone) = bones.get(index) else {
            continue;
        };
        let indent = "  ".repeat(skeleton.depth(index).unwrap_or_default());

        if opts.details {
            println!(
                "{}{} [{}] pos {:?} flags {:?}",
                indent,
                bone.name()?,
                index,
                bone.position(),
                bone.flags()
            );
        } else {
            println!("{}{}", indent, bone.name()?);
        }
    }

    Ok(())
}
