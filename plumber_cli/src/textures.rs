use clap::Parser;

use plumber_studio::Result;

use crate::read_mdl;

#[derive(Parser)]
pub struct Textures {
    mdl_path: String,
}

pub fn textures(opts: &Textures) -> Result<()> {
    let mdl = read_mdl(&opts.mdl_path)?;
    let header = mdl.header()?;

    println!("search paths:");
    for path in header.texture_paths()? {
        println!("  {:?}", path);
    }

    println!("textures:");
    for texture in header.textures()? {
        println!("  {}: {}", texture.index(), texture.name()?);
    }

    for (family, replacements) in header.skin_table()?.iter().enumerate() {
        println!("skin {}: {:?}", family, replacements);
    }

    Ok(())
}
