use std::env;
use std::path::PathBuf;

use splade::{format_shape, init_logging, run_inference, SpladeConfig};

fn main() -> anyhow::Result<()> {
    let config_path = env::args_os().nth(1).map(PathBuf::from);
    let config = SpladeConfig::load(config_path.as_deref())?;
    init_logging(&config.logging)?;

    let outcome = run_inference(&config)?;

    println!(
        "{} {}",
        format_shape(&outcome.queries),
        format_shape(&outcome.documents)
    );
    println!("{}", outcome.scores);

    Ok(())
}
