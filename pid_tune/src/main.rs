use crate::{
    config::{create_default_config, init_config},
    image::{build_image, write_image},
};

use std::path::PathBuf;
use tracing::info;

pub mod config;
pub mod image;
pub mod logging;
pub mod models;

fn should_create_config() -> bool {
    std::env::var("CREATE_CONFIG")
        .map(|val| val == "1" || val.to_lowercase() == "true")
        .unwrap_or(false)
}

fn main() -> anyhow::Result<()> {
    if should_create_config() {
        create_default_config(None::<PathBuf>)?;
    }

    let (config_manager, config) = init_config().map_err(|e| {
        eprintln!("Failed to load configuration: {}", e);
        eprintln!("Run with CREATE_CONFIG=1 to replace it with the default configuration.");
        e
    })?;

    logging::init(&config.logging)?;
    info!(
        "Loaded configuration from {}",
        config_manager.path().display()
    );

    let image = build_image(&config)?;
    info!("Parameter words: {:?}", image.words());

    let records = write_image(&config.output_path, &image)?;
    info!(
        "Wrote {} data records ({} bytes) to {}",
        records,
        image.byte_len(),
        config.output_path.display()
    );

    Ok(())
}
