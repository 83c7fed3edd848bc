//! Download and installation of the GOST release binary.

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use wte_common::archive::{extract_tar_gz, find_file};
use wte_common::fs::remove_if_exists;
use wte_common::hash::{find_checksum, verify_file};
use wte_common::{Error, Result};
use wte_system::{ArtifactArch, CommandRunner, Fetcher};

/// Where GOST publishes release archives.
pub const RELEASE_BASE_URL: &str = "https://github.com/go-gost/gost/releases/download";

const BINARY_NAME: &str = "gost";
const CHECKSUMS_TIMEOUT: Duration = Duration::from_secs(30);
const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(300);

/// How a downloaded archive is checked before extraction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verification {
    /// Compare against a digest supplied by the operator.
    Pinned(String),
    /// Look the digest up in the release's checksums file.
    ReleaseChecksums,
    /// Install without checking.
    Skip,
}

pub fn archive_name(version: &str, arch: ArtifactArch) -> String {
    format!("gost_{}_linux_{}.tar.gz", version, arch)
}

/// Installs, inspects and removes the GOST binary.
pub struct ArtifactInstaller {
    fetcher: Arc<dyn Fetcher>,
    runner: Arc<dyn CommandRunner>,
    binary_path: PathBuf,
    base_url: String,
}

impl ArtifactInstaller {
    pub fn new(
        fetcher: Arc<dyn Fetcher>,
        runner: Arc<dyn CommandRunner>,
        binary_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            fetcher,
            runner,
            binary_path: binary_path.into(),
            base_url: RELEASE_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn binary_path(&self) -> &Path {
        &self.binary_path
    }

    pub fn download_url(&self, version: &str, arch: ArtifactArch) -> String {
        format!("{}/v{}/{}", self.base_url, version, archive_name(version, arch))
    }

    /// Checksum listings a release may publish, in lookup order.
    pub fn checksums_urls(&self, version: &str) -> [String; 2] {
        [
            format!("{}/v{}/checksums.txt", self.base_url, version),
            format!("{}/v{}/gost_{}_checksums.txt", self.base_url, version, version),
        ]
    }

    /// The digest for `name` from the first listing that has one.
    async fn release_checksum(&self, name: &str, version: &str) -> Option<String> {
        for url in self.checksums_urls(version) {
            match self.fetcher.get_text(&url, CHECKSUMS_TIMEOUT).await {
                Ok(listing) => match find_checksum(&listing, name) {
                    Some(digest) => return Some(digest),
                    None => debug!("{} has no entry for {}", url, name),
                },
                Err(e) => debug!("Checksums unavailable at {}: {}", url, e),
            }
        }
        None
    }

    /// Download, verify and install `version`, returning the reported version.
    ///
    /// All intermediate files live in a temporary directory that is removed
    /// on every exit path.
    pub async fn install(
        &self,
        version: &str,
        arch: ArtifactArch,
        verification: &Verification,
    ) -> Result<String> {
        let version = version.trim_start_matches('v');
        let work_dir = tempfile::Builder::new().prefix("gost_install_").tempdir()?;

        let name = archive_name(version, arch);
        let archive = work_dir.path().join(&name);
        let url = self.download_url(version, arch);
        info!("Downloading GOST v{} for {}", version, arch);
        debug!("URL: {}", url);
        let size = self.fetcher.download(&url, &archive, DOWNLOAD_TIMEOUT).await?;
        debug!("Downloaded {} bytes", size);

        self.verify(&archive, &name, version, verification).await?;

        let extract_dir = work_dir.path().join("extract");
        fs::create_dir_all(&extract_dir)?;
        let files = extract_tar_gz(&archive, &extract_dir)?;
        let binary = find_file(&files, BINARY_NAME)?;

        self.place_binary(binary)?;
        info!("GOST binary installed to {}", self.binary_path.display());

        self.version().await
    }

    async fn verify(
        &self,
        archive: &Path,
        name: &str,
        version: &str,
        verification: &Verification,
    ) -> Result<()> {
        match verification {
            Verification::Pinned(expected) => verify_file(archive, expected)?,
            Verification::ReleaseChecksums => {
                let expected = self
                    .release_checksum(name, version)
                    .await
                    .ok_or_else(|| Error::ChecksumUnavailable(name.to_string()))?;
                verify_file(archive, &expected)?;
            }
            Verification::Skip => {
                warn!("Checksum verification skipped for {}", name);
                return Ok(());
            }
        }
        info!("Checksum verified");
        Ok(())
    }

    /// Copy next to the target then rename over it, so a running daemon
    /// keeps its old file.
    fn place_binary(&self, source: &Path) -> Result<()> {
        if let Some(parent) = self.binary_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let staged = self.binary_path.with_extension("new");
        fs::copy(source, &staged)?;
        fs::set_permissions(&staged, fs::Permissions::from_mode(0o755))?;
        if let Err(e) = fs::rename(&staged, &self.binary_path) {
            let _ = fs::remove_file(&staged);
            return Err(e.into());
        }
        Ok(())
    }

    pub fn is_installed(&self) -> bool {
        self.binary_path.is_file()
    }

    /// Version string printed by `gost -V`.
    pub async fn version(&self) -> Result<String> {
        if !self.is_installed() {
            return Err(Error::NotInstalled("GOST".to_string()));
        }
        let binary = self.binary_path.to_string_lossy();
        let output = self.runner.run_checked(&binary, &["-V"]).await?;
        Ok(output.stdout.trim().to_string())
    }

    /// Remove the binary. Returns whether it existed.
    pub fn uninstall(&self) -> Result<bool> {
        remove_if_exists(&self.binary_path)
    }
}
