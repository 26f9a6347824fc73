use clap::Parser;

use plumber_studio::{Model, ModelConfig, Result};

#[derive(Parser)]
pub struct Verify {
    mdl_path: String,
    /// Require every companion file and also check the thin vertices
    #[clap(short, long)]
    strict: bool,
}

pub fn verify(opts: &Verify) -> Result<()> {
    let config = ModelConfig {
        require_vtx: opts.strict,
        require_vvd: opts.strict,
        ..ModelConfig::new()
    };

    let model = Model::read(&opts.mdl_path, &config)?;
    let verified = model.verify()?;
    tracing::debug!("verified `{}`", verified.name()?);

    if opts.strict {
        if let Some(thin) = verified.thin_vertices()? {
            tracing::debug!(
                "{} thin vertices with {} influences",
                thin.len(),
                thin.num_bone_influences()
            );
        }
    }

    println!(
        "{}: ok ({} bones{}{})",
        opts.mdl_path,
        verified.skeleton().len(),
        if verified.vtx_header().is_some() { ", vtx" } else { "" },
        if verified.phy_header().is_some() { ", phy" } else { "" },
    );

    Ok(())
}
