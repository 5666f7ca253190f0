use std::path::{Path, PathBuf};

use anyhow::Result;
use tokio::fs;
use tracing::info;

pub async fn download_audio(
    client: &reqwest::Client,
    url: &str,
    dest_dir: &Path,
) -> Result<PathBuf> {
    info!("Starting download from URL: {}", url);

    let filename = filename_from_url(url)
        .ok_or_else(|| anyhow::anyhow!("Invalid URL: no filename found"))?;

    let dest_path = dest_dir.join(filename);

    if !dest_dir.exists() {
        fs::create_dir_all(dest_dir).await?;
    }

    let response = client.get(url).send().await?;
    if !response.status().is_success() {
        return Err(anyhow::anyhow!(
            "HTTP request failed with status: {}",
            response.status()
        ));
    }

    let bytes = response.bytes().await?;
    fs::write(&dest_path, bytes).await?;

    info!("Download completed: {:?}", dest_path);
    Ok(dest_path)
}

pub fn filename_from_url(url: &str) -> Option<String> {
    let path = url.split(['?', '#']).next()?;
    let name = path.rsplit('/').next()?.trim();
    if name.is_empty() || name.contains(':') {
        return None;
    }
    Some(name.to_string())
}
