//! Raw-input downloads
//!
//! Downloads the upstream release files into the scratch directory. The
//! files are independent, so they download concurrently; any single failure
//! fails the whole set (a build never runs on partial inputs).

use anyhow::{Context, Result};
use futures::future::try_join_all;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Local filename a URL downloads to (its last path segment)
pub fn download_fname(dir: &Path, url: &str) -> PathBuf {
    let basename = url.rsplit('/').next().unwrap_or(url);
    dir.join(basename)
}

/// Download one file to an explicit destination
pub async fn download_file(client: &reqwest::Client, url: &str, dest: &Path) -> Result<PathBuf> {
    debug!(url = %url, "Downloading");

    let response = client
        .get(url)
        .send()
        .await
        .with_context(|| format!("Request failed: {}", url))?
        .error_for_status()
        .with_context(|| format!("Bad status for: {}", url))?;

    let bytes = response
        .bytes()
        .await
        .with_context(|| format!("Failed to read body: {}", url))?;

    tokio::fs::write(dest, &bytes)
        .await
        .with_context(|| format!("Failed to write {}", dest.display()))?;

    info!(url = %url, bytes = bytes.len(), dest = %dest.display(), "Downloaded");
    Ok(dest.to_path_buf())
}

/// Download a set of URLs into `dir` concurrently.
///
/// Returns the local paths in input order. Fails if any download fails.
pub async fn download_all(urls: &[&str], dir: &Path) -> Result<Vec<PathBuf>> {
    tokio::fs::create_dir_all(dir)
        .await
        .with_context(|| format!("Failed to create {}", dir.display()))?;

    let client = reqwest::Client::new();
    let downloads = urls
        .iter()
        .map(|url| {
            let dest = download_fname(dir, url);
            let client = &client;
            async move { download_file(client, url, &dest).await }
        })
        .collect::<Vec<_>>();

    try_join_all(downloads).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_download_fname_takes_last_segment() {
        let dir = Path::new("/tmp/scratch");
        let path = download_fname(dir, "https://host/releases/WS276/geneIDs.txt.gz");
        assert_eq!(path, PathBuf::from("/tmp/scratch/geneIDs.txt.gz"));
    }
}
