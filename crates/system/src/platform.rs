//! Operating system and CPU architecture detection.

use regex::Regex;
use serde::Serialize;
use std::fmt;
use std::path::Path;
use std::sync::LazyLock;
use tracing::{debug, warn};
use wte_common::{Error, Result};
use wte_config::Paths;

static DOTTED_VERSION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+(?:\.\d+)+").unwrap());

/// Distributions wte is tested on. Others are allowed with a warning.
const SUPPORTED_OS: &[&str] = &[
    "ubuntu",
    "debian",
    "centos",
    "rhel",
    "rocky",
    "almalinux",
    "fedora",
    "arch",
    "manjaro",
];

/// Architecture name used by release artifacts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactArch {
    Amd64,
    Arm64,
    Armv7,
}

impl ArtifactArch {
    /// Map a kernel or toolchain architecture name.
    pub fn from_machine(raw: &str) -> Result<Self> {
        match raw {
            "x86_64" | "amd64" => Ok(ArtifactArch::Amd64),
            "aarch64" | "arm64" => Ok(ArtifactArch::Arm64),
            "arm" | "armv7" | "armv7l" => Ok(ArtifactArch::Armv7),
            other => Err(Error::UnsupportedArchitecture(other.to_string())),
        }
    }

    /// Name used in GOST release archives.
    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactArch::Amd64 => "amd64",
            ArtifactArch::Arm64 => "arm64",
            ArtifactArch::Armv7 => "armv7",
        }
    }

    /// Name used in wte's own release assets.
    pub fn release_arch(&self) -> &'static str {
        match self {
            ArtifactArch::Amd64 => "amd64",
            ArtifactArch::Arm64 => "arm64",
            ArtifactArch::Armv7 => "arm",
        }
    }
}

impl fmt::Display for ArtifactArch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Package manager family of the distribution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PackageManager {
    Apt,
    Dnf,
    Yum,
    Pacman,
    Zypper,
    Apk,
    Unknown,
}

impl PackageManager {
    fn for_os(os_id: &str, version: &str) -> Self {
        match os_id {
            "ubuntu" | "debian" | "linuxmint" | "pop" => PackageManager::Apt,
            "centos" | "rhel" | "rocky" | "almalinux" | "oracle" => {
                if major_version(version) >= 8 {
                    PackageManager::Dnf
                } else {
                    PackageManager::Yum
                }
            }
            "fedora" => PackageManager::Dnf,
            "arch" | "manjaro" | "endeavouros" => PackageManager::Pacman,
            "opensuse" | "opensuse-leap" | "opensuse-tumbleweed" => PackageManager::Zypper,
            "alpine" => PackageManager::Apk,
            _ => PackageManager::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PackageManager::Apt => "apt",
            PackageManager::Dnf => "dnf",
            PackageManager::Yum => "yum",
            PackageManager::Pacman => "pacman",
            PackageManager::Zypper => "zypper",
            PackageManager::Apk => "apk",
            PackageManager::Unknown => "unknown",
        }
    }
}

fn major_version(version: &str) -> u32 {
    version
        .split('.')
        .next()
        .and_then(|major| major.trim().parse().ok())
        .unwrap_or(0)
}

/// Facts about the host, detected once per invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlatformInfo {
    pub os_id: String,
    pub os_version: String,
    pub pretty_name: String,
    pub raw_arch: String,
    pub artifact_arch: ArtifactArch,
    pub is_officially_supported: bool,
    pub package_manager: PackageManager,
}

impl PlatformInfo {
    /// Detect the running host.
    pub fn detect(paths: &Paths) -> Result<Self> {
        Self::detect_with(
            &paths.os_release,
            &paths.legacy_release,
            std::env::consts::ARCH,
        )
    }

    /// Detect using explicit release files and architecture name.
    pub fn detect_with(os_release: &Path, legacy_release: &Path, raw_arch: &str) -> Result<Self> {
        let artifact_arch = ArtifactArch::from_machine(raw_arch)?;

        let (os_id, os_version, pretty_name) = match read_os_release(os_release) {
            Some(found) => found,
            None => {
                debug!("{:?} unusable, trying {:?}", os_release, legacy_release);
                read_legacy_release(legacy_release).ok_or_else(|| {
                    Error::OsDetection(format!(
                        "neither {} nor {} could be read",
                        os_release.display(),
                        legacy_release.display()
                    ))
                })?
            }
        };

        let is_officially_supported = SUPPORTED_OS.contains(&os_id.as_str());
        if !is_officially_supported {
            warn!(
                "{} is not officially supported, continuing anyway",
                if pretty_name.is_empty() { &os_id } else { &pretty_name }
            );
        }

        Ok(Self {
            package_manager: PackageManager::for_os(&os_id, &os_version),
            os_id,
            os_version,
            pretty_name,
            raw_arch: raw_arch.to_string(),
            artifact_arch,
            is_officially_supported,
        })
    }
}

/// Parse `ID`, `VERSION_ID` and `PRETTY_NAME` from an os-release file.
fn read_os_release(path: &Path) -> Option<(String, String, String)> {
    let content = std::fs::read_to_string(path).ok()?;
    let (mut id, mut version, mut pretty) = (String::new(), String::new(), String::new());

    for line in content.lines() {
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let value = value.trim().trim_matches('"').trim_matches('\'').to_string();
        match key.trim() {
            "ID" => id = value,
            "VERSION_ID" => version = value,
            "PRETTY_NAME" => pretty = value,
            _ => {}
        }
    }

    if id.is_empty() {
        return None;
    }
    Some((id, version, pretty))
}

/// Fallback for old RHEL-family hosts with a single-line release file.
fn read_legacy_release(path: &Path) -> Option<(String, String, String)> {
    let content = std::fs::read_to_string(path).ok()?;
    let pretty = content.trim().to_string();
    if pretty.is_empty() {
        return None;
    }
    let version = DOTTED_VERSION
        .find(&pretty)
        .map(|m| m.as_str().to_string())
        .unwrap_or_default();
    Some(("centos".to_string(), version, pretty))
}

/// Whether the process runs with an effective uid of 0.
pub fn is_root() -> bool {
    // SAFETY: geteuid has no preconditions and cannot fail.
    unsafe { libc::geteuid() == 0 }
}
