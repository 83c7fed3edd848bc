//! Release feed model and version comparison.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use wte_system::ArtifactArch;

/// A published release of the tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Release {
    pub tag_name: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub draft: bool,
    #[serde(default)]
    pub prerelease: bool,
    pub published_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub assets: Vec<Asset>,
    #[serde(default)]
    pub html_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Asset {
    pub name: String,
    pub browser_download_url: String,
    #[serde(default)]
    pub size: u64,
}

impl Release {
    pub fn version(&self) -> &str {
        self.tag_name.trim_start_matches('v')
    }

    /// Release notes, or `None` when the body is blank.
    pub fn notes(&self) -> Option<&str> {
        self.body.as_deref().map(str::trim).filter(|b| !b.is_empty())
    }

    pub fn asset(&self, name: &str) -> Option<&Asset> {
        self.assets.iter().find(|a| a.name == name)
    }

    /// The executable asset for `arch`.
    ///
    /// Archives are preferred over bare binaries, dashed names over
    /// underscored ones.
    pub fn select_asset(&self, arch: ArtifactArch) -> Option<&Asset> {
        asset_candidates(arch)
            .iter()
            .find_map(|candidate| self.asset(candidate))
    }

    /// A checksum listing covering `asset`, if the release publishes one.
    pub fn checksum_asset(&self, asset: &Asset) -> Option<&Asset> {
        self.asset("checksums.txt")
            .or_else(|| self.assets.iter().find(|a| a.name.ends_with("_checksums.txt")))
            .or_else(|| self.asset(&format!("{}.sha256", asset.name)))
    }
}

pub fn asset_candidates(arch: ArtifactArch) -> [String; 4] {
    let arch = arch.release_arch();
    [
        format!("wte-linux-{}.tar.gz", arch),
        format!("wte_linux_{}.tar.gz", arch),
        format!("wte-linux-{}", arch),
        format!("wte_linux_{}", arch),
    ]
}

/// Whether `latest` is a newer version than `current`.
///
/// Both sides drop a leading `v` and compare as semantic versions. When
/// either tag is not valid semver the plain strings are compared instead.
pub fn is_newer(current: &str, latest: &str) -> bool {
    let current = current.trim().trim_start_matches('v');
    let latest = latest.trim().trim_start_matches('v');

    match (semver::Version::parse(current), semver::Version::parse(latest)) {
        (Ok(current), Ok(latest)) => latest.cmp(&current) == Ordering::Greater,
        _ => latest != current && latest > current,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn asset(name: &str) -> Asset {
        Asset {
            name: name.to_string(),
            browser_download_url: format!("https://dl.test/{}", name),
            size: 1,
        }
    }

    fn release(assets: &[&str]) -> Release {
        Release {
            tag_name: "v1.2.0".to_string(),
            name: "1.2.0".to_string(),
            body: Some("  ".to_string()),
            draft: false,
            prerelease: false,
            published_at: None,
            assets: assets.iter().map(|n| asset(n)).collect(),
            html_url: String::new(),
        }
    }

    #[test]
    fn test_numeric_comparison() {
        assert!(is_newer("v1.9.0", "v1.10.0"));
        // Plain string ordering would get this wrong.
        assert!("1.10.0" < "1.9.0");

        assert!(is_newer("1.0.0", "v1.0.1"));
        assert!(!is_newer("v1.0.0", "v1.0.0"));
        assert!(!is_newer("v2.0.0", "v1.99.0"));
        assert!(is_newer("v1.0.0-rc1", "v1.0.0"));
    }

    #[test]
    fn test_non_semver_falls_back_to_strings() {
        assert!(is_newer("dev", "nightly"));
        assert!(!is_newer("1.2", "1.2"));
        assert!(is_newer("1.2", "1.3"));
    }

    #[test]
    fn test_asset_preference() {
        let r = release(&["wte-linux-arm64", "wte_linux_arm64.tar.gz", "wte-linux-amd64.tar.gz"]);
        assert_eq!(r.select_asset(ArtifactArch::Amd64).unwrap().name, "wte-linux-amd64.tar.gz");
        assert_eq!(r.select_asset(ArtifactArch::Arm64).unwrap().name, "wte_linux_arm64.tar.gz");
        assert!(r.select_asset(ArtifactArch::Armv7).is_none());

        let r = release(&["wte-linux-arm"]);
        assert_eq!(r.select_asset(ArtifactArch::Armv7).unwrap().name, "wte-linux-arm");
    }

    #[test]
    fn test_checksum_asset_lookup() {
        let r = release(&["wte-linux-amd64.tar.gz", "wte-linux-amd64.tar.gz.sha256"]);
        let main = r.select_asset(ArtifactArch::Amd64).unwrap();
        assert_eq!(r.checksum_asset(main).unwrap().name, "wte-linux-amd64.tar.gz.sha256");

        let r = release(&["wte-linux-amd64.tar.gz", "wte_1.2.0_checksums.txt"]);
        let main = r.select_asset(ArtifactArch::Amd64).unwrap();
        assert_eq!(r.checksum_asset(main).unwrap().name, "wte_1.2.0_checksums.txt");

        let r = release(&["wte-linux-amd64.tar.gz"]);
        assert!(r.checksum_asset(r.select_asset(ArtifactArch::Amd64).unwrap()).is_none());
    }

    #[test]
    fn test_parse_feed_entry() {
        let json = r#"{
            "tag_name": "v1.3.0",
            "name": "WTE 1.3.0",
            "body": "Fixes",
            "published_at": "2024-05-01T10:00:00Z",
            "html_url": "https://github.com/wtepcorp/WTE/releases/tag/v1.3.0",
            "assets": [{"name": "wte-linux-amd64.tar.gz",
                        "browser_download_url": "https://dl.test/a",
                        "size": 42, "content_type": "application/gzip"}]
        }"#;
        let release: Release = serde_json::from_str(json).unwrap();
        assert_eq!(release.version(), "1.3.0");
        assert_eq!(release.notes(), Some("Fixes"));
        assert_eq!(release.assets[0].size, 42);
        assert!(release.published_at.is_some());
    }
}
