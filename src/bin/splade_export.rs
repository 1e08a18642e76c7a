use std::env;
use std::path::PathBuf;

use splade::{display_path, init_logging, run_export, SpladeConfig};

fn main() -> anyhow::Result<()> {
    let config_path = env::args_os().nth(1).map(PathBuf::from);
    let config = SpladeConfig::load(config_path.as_deref())?;
    init_logging(&config.logging)?;

    let outcome = run_export(&config)?;

    println!(
        "Exported raw SPLADE model to {}",
        display_path(&outcome.summary.raw.path)
    );
    println!(
        "Exported pooled SPLADE model to {}",
        display_path(&outcome.summary.pooled.path)
    );

    Ok(())
}
