use std::{env, error::Error, path::PathBuf};

use encoder::{EncoderConfig, SpladeEncoder};

fn main() -> Result<(), Box<dyn Error>> {
    let mut args = env::args().skip(1);
    let text = args
        .next()
        .unwrap_or_else(|| "what causes aging fast".into());

    let mut cfg = EncoderConfig::default();
    if let Some(model_path) = args.next() {
        cfg.model_path = Some(PathBuf::from(model_path));
    }
    println!(
        "Encoding with {}",
        cfg.model_path
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| format!("{}@{}", cfg.hub.model_id, cfg.hub.revision))
    );

    let encoder = SpladeEncoder::from_config(cfg)?;
    let embeddings = encoder.encode(&[text.as_str()])?;
    let row = embeddings.row(0).ok_or("encoder returned no rows")?;

    println!("shape: {:?}", embeddings.shape());
    println!("active dims: {:?}", embeddings.active_dims(0));
    for (token, weight) in encoder.decode(row, 20) {
        println!("{token:>16} {weight:.3}");
    }

    Ok(())
}
