//! Render a galaxy catalog into a simulated field image
//!
//! Writes `<output>_field.fits`, `<output>_noise.fits` (when the sky level is
//! positive), `<output>_stamps.fits` and the effective configuration as
//! `<output>_config.json`.
//!
//! Usage:
//! ```text
//! cargo run --release --bin render_catalog -- --input gcat.dat --output catout --partials
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use fieldsim::io::fits::{output_path, FitsMetadata};
use fieldsim::{CatalogReader, FitsArchive, Pipeline, RenderCatalogArgs};
use log::info;
use std::path::PathBuf;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = RenderCatalogArgs::parse();
    let config = args.to_config().context("invalid configuration")?;
    info!("Using output prefix {}", args.output);

    let prefix = PathBuf::from(&args.output);
    let config_path = PathBuf::from(format!("{}_config.json", args.output));
    config
        .save_to_file(&config_path)
        .with_context(|| format!("failed to save {}", config_path.display()))?;

    let catalog = CatalogReader::open(&args.input)
        .with_context(|| format!("failed to open catalog {}", args.input.display()))?;
    info!("Catalog fields: {}", catalog.header().join(" "));

    let metadata = FitsMetadata {
        pixel_scale: config.pixel_scale,
        nvisits: config.nvisits,
    };
    let mut archive = FitsArchive::create(&prefix, metadata).with_context(|| {
        format!(
            "failed to create {}",
            output_path(&prefix, "stamps").display()
        )
    })?;

    let pipeline = Pipeline::from_config(config)?;
    let summary = pipeline
        .run(catalog, &mut archive)
        .context("field simulation failed")?;

    info!("Wrote {}", config_path.display());
    for path in &summary.files {
        info!("Wrote {}", path.display());
    }

    Ok(())
}
