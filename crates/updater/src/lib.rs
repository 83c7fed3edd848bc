//! Self-update of the `wte` executable from its release feed.

pub mod release;
pub mod swap;

pub use release::{is_newer, Asset, Release};
pub use swap::swap_executable;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use wte_common::archive::{extract_tar_gz, find_file};
use wte_common::hash::{find_checksum, verify_file};
use wte_common::{Error, Result};
use wte_system::{ArtifactArch, Fetcher};

/// Repository whose releases carry the tool.
pub const DEFAULT_REPO: &str = "wtepcorp/WTE";
pub const GITHUB_API_URL: &str = "https://api.github.com";

const FEED_TIMEOUT: Duration = Duration::from_secs(30);
const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(300);
const BINARY_NAME: &str = "wte";

/// Checks the release feed and swaps in newer builds.
pub struct Updater {
    current_version: String,
    repo: String,
    api_url: String,
    arch: ArtifactArch,
    fetcher: Arc<dyn Fetcher>,
}

impl Updater {
    pub fn new(current_version: impl Into<String>, arch: ArtifactArch, fetcher: Arc<dyn Fetcher>) -> Self {
        Self {
            current_version: current_version.into(),
            repo: DEFAULT_REPO.to_string(),
            api_url: GITHUB_API_URL.to_string(),
            arch,
            fetcher,
        }
    }

    pub fn with_repo(mut self, repo: impl Into<String>) -> Self {
        self.repo = repo.into();
        self
    }

    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into();
        self
    }

    pub fn current_version(&self) -> &str {
        &self.current_version
    }

    pub fn latest_release_url(&self) -> String {
        format!("{}/repos/{}/releases/latest", self.api_url, self.repo)
    }

    pub async fn latest_release(&self) -> Result<Release> {
        let url = self.latest_release_url();
        let body = self.fetcher.get_text(&url, FEED_TIMEOUT).await.map_err(|e| match e {
            Error::Download { reason, .. } if reason.contains("404") => {
                Error::Network(format!("no releases found for {}", self.repo))
            }
            other => other,
        })?;
        Ok(serde_json::from_str(&body)?)
    }

    /// The latest release and whether it is newer than the running build.
    pub async fn check_for_update(&self) -> Result<(Release, bool)> {
        let release = self.latest_release().await?;
        let newer = is_newer(&self.current_version, &release.tag_name);
        debug!(
            "Current {} latest {} newer={}",
            self.current_version, release.tag_name, newer
        );
        Ok((release, newer))
    }

    /// Download the asset for this platform, verify it and install it at
    /// `executable`.
    pub async fn update(&self, release: &Release, executable: &Path, skip_verify: bool) -> Result<()> {
        let asset = release.select_asset(self.arch).ok_or_else(|| Error::AssetNotFound {
            os: "linux".to_string(),
            arch: self.arch.release_arch().to_string(),
        })?;

        let work_dir = tempfile::Builder::new().prefix("wte-update-").tempdir()?;
        let download = work_dir.path().join(&asset.name);

        info!("Downloading {}", asset.name);
        let size = self
            .fetcher
            .download(&asset.browser_download_url, &download, DOWNLOAD_TIMEOUT)
            .await?;
        debug!("Downloaded {} bytes", size);

        if skip_verify {
            warn!("Checksum verification skipped for {}", asset.name);
        } else {
            self.verify(release, asset, &download).await?;
        }

        let binary = if asset.name.ends_with(".tar.gz") || asset.name.ends_with(".tgz") {
            info!("Extracting archive");
            let extract_dir = work_dir.path().join("extract");
            std::fs::create_dir_all(&extract_dir)?;
            let files = extract_tar_gz(&download, &extract_dir)?;
            find_file(&files, BINARY_NAME)?.clone()
        } else {
            download
        };

        let executable = resolve_executable(executable)?;
        info!("Installing new version to {}", executable.display());
        swap_executable(&binary, &executable)?;
        info!("Updated to version {}", release.tag_name);
        Ok(())
    }

    async fn verify(&self, release: &Release, asset: &Asset, file: &Path) -> Result<()> {
        let listing_asset = release
            .checksum_asset(asset)
            .ok_or_else(|| Error::ChecksumUnavailable(asset.name.clone()))?;
        let listing = self
            .fetcher
            .get_text(&listing_asset.browser_download_url, FEED_TIMEOUT)
            .await
            .map_err(|e| {
                debug!("Checksums unavailable: {}", e);
                Error::ChecksumUnavailable(asset.name.clone())
            })?;
        let expected = find_checksum(&listing, &asset.name)
            .ok_or_else(|| Error::ChecksumUnavailable(asset.name.clone()))?;
        verify_file(file, &expected)?;
        info!("Checksum verified");
        Ok(())
    }
}

fn resolve_executable(path: &Path) -> Result<PathBuf> {
    Ok(std::fs::canonicalize(path)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::fs;
    use wte_common::archive::pack_tar_gz;
    use wte_common::hash::sha256_bytes;
    use wte_system::testing::StaticFetcher;

    const FEED: &str = "https://api.test/repos/wtepcorp/WTE/releases/latest";

    fn feed(tag: &str, assets: &[&str]) -> String {
        let assets: Vec<String> = assets
            .iter()
            .map(|name| {
                format!(
                    r#"{{"name":"{0}","browser_download_url":"https://dl.test/{0}","size":10}}"#,
                    name
                )
            })
            .collect();
        format!(
            r#"{{"tag_name":"{}","name":"","body":"Notes","published_at":"2024-05-01T10:00:00Z","html_url":"","assets":[{}]}}"#,
            tag,
            assets.join(",")
        )
    }

    fn updater(fetcher: StaticFetcher) -> Updater {
        Updater::new("v1.9.0", ArtifactArch::Amd64, Arc::new(fetcher)).with_api_url("https://api.test")
    }

    #[tokio::test]
    async fn test_check_for_update() {
        let fetcher = StaticFetcher::new().with_text(FEED, &feed("v1.10.0", &[]));
        let (release, newer) = updater(fetcher).check_for_update().await.unwrap();
        assert_eq!(release.tag_name, "v1.10.0");
        assert!(newer);

        let fetcher = StaticFetcher::new().with_text(FEED, &feed("v1.9.0", &[]));
        let (_, newer) = updater(fetcher).check_for_update().await.unwrap();
        assert!(!newer);
    }

    #[tokio::test]
    async fn test_missing_feed() {
        let err = updater(StaticFetcher::new()).check_for_update().await.unwrap_err();
        assert!(err.to_string().contains("no releases found"));
    }

    #[tokio::test]
    async fn test_update_from_archive_with_checksums() {
        let dir = tempfile::tempdir().unwrap();
        let exec = dir.path().join("wte");
        fs::write(&exec, "old").unwrap();

        let archive = pack_tar_gz(&[("wte", b"new build", 0o755)]).unwrap();
        let listing = format!("{}  wte-linux-amd64.tar.gz\n", sha256_bytes(&archive));
        let fetcher = StaticFetcher::new()
            .with_text(FEED, &feed("v2.0.0", &["wte-linux-amd64.tar.gz", "checksums.txt"]))
            .with_text("https://dl.test/checksums.txt", &listing)
            .with_bytes("https://dl.test/wte-linux-amd64.tar.gz", archive);
        let updater = updater(fetcher);

        let (release, _) = updater.check_for_update().await.unwrap();
        updater.update(&release, &exec, false).await.unwrap();

        assert_eq!(fs::read_to_string(&exec).unwrap(), "new build");
        assert!(!swap::backup_path(&exec).exists());
    }

    #[tokio::test]
    async fn test_update_requires_checksums_unless_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let exec = dir.path().join("wte");
        fs::write(&exec, "old").unwrap();

        let fetcher = StaticFetcher::new()
            .with_text(FEED, &feed("v2.0.0", &["wte-linux-amd64"]))
            .with_bytes("https://dl.test/wte-linux-amd64", b"bare binary".to_vec());
        let updater = updater(fetcher);
        let (release, _) = updater.check_for_update().await.unwrap();

        let err = updater.update(&release, &exec, false).await.unwrap_err();
        assert!(matches!(err, Error::ChecksumUnavailable(_)));
        assert_eq!(fs::read_to_string(&exec).unwrap(), "old");

        updater.update(&release, &exec, true).await.unwrap();
        assert_eq!(fs::read_to_string(&exec).unwrap(), "bare binary");
    }

    #[tokio::test]
    async fn test_checksum_mismatch_keeps_current_binary() {
        let dir = tempfile::tempdir().unwrap();
        let exec = dir.path().join("wte");
        fs::write(&exec, "old").unwrap();

        let fetcher = StaticFetcher::new()
            .with_text(FEED, &feed("v2.0.0", &["wte-linux-amd64", "wte-linux-amd64.sha256"]))
            .with_text("https://dl.test/wte-linux-amd64.sha256", &"0".repeat(64))
            .with_bytes("https://dl.test/wte-linux-amd64", b"tampered".to_vec());
        let updater = updater(fetcher);
        let (release, _) = updater.check_for_update().await.unwrap();

        let err = updater.update(&release, &exec, false).await.unwrap_err();
        assert!(matches!(err, Error::ChecksumMismatch { .. }));
        assert_eq!(fs::read_to_string(&exec).unwrap(), "old");
    }

    #[tokio::test]
    async fn test_no_asset_for_platform() {
        let fetcher =
            StaticFetcher::new().with_text(FEED, &feed("v2.0.0", &["wte-linux-arm64.tar.gz"]));
        let updater = updater(fetcher);
        let (release, _) = updater.check_for_update().await.unwrap();

        let err = updater
            .update(&release, Path::new("/nonexistent/wte"), true)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "No release asset found for linux/amd64");
    }
}
