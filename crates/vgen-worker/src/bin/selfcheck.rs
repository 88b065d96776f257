use std::path::Path;

use vgen_client::{ClientConfig, API_KEY_ENV};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = ClientConfig::from_env();

    println!(
        "vgen-selfcheck: starting with output_dir={} base_url={}",
        config.output_dir.display(),
        config.base_url
    );
    ensure_dir(&config.output_dir).await?;
    ensure_media_tools()?;
    ensure_api_key(&config)?;

    println!("vgen-selfcheck: ok");
    Ok(())
}

async fn ensure_dir(path: &Path) -> anyhow::Result<()> {
    tokio::fs::create_dir_all(path).await?;
    Ok(())
}

fn ensure_media_tools() -> anyhow::Result<()> {
    let ffmpeg = vgen_media::check_ffmpeg()?;
    let ffprobe = vgen_media::check_ffprobe()?;
    println!(
        "vgen-selfcheck: ffmpeg={} ffprobe={}",
        ffmpeg.display(),
        ffprobe.display()
    );
    Ok(())
}

fn ensure_api_key(config: &ClientConfig) -> anyhow::Result<()> {
    if config.api_key.is_none() {
        return Err(anyhow::anyhow!("missing required env var {}", API_KEY_ENV));
    }
    Ok(())
}
