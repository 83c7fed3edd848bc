//! Operations on an existing installation.

use crate::Provisioner;
use std::path::Path;
use tracing::{info, warn};
use wte_common::{Error, Result};
use wte_config::defaults::PASSWORD_LENGTH;
use wte_config::ServiceConfig;
use wte_gost::{ConfigRenderer, CredentialsReport};
use wte_security::generate_password;
use wte_system::ServiceController;
use wte_updater::Release;

impl Provisioner {
    async fn restart_installed(&self) -> Result<()> {
        let service = self.service();
        if !service.is_installed() {
            return Err(Error::NotInstalled("GOST service".to_string()));
        }
        info!("Restarting service");
        service.restart().await
    }

    /// Re-render the daemon configuration from `cfg` and restart the service.
    pub async fn apply(&self, cfg: &ServiceConfig) -> Result<()> {
        let renderer = ConfigRenderer::new(cfg);
        renderer.validate()?;
        if let Some(backup) = renderer.backup()? {
            info!("Previous configuration kept at {}", backup.display());
        }
        renderer.generate()?;
        self.restart_installed().await
    }

    /// Give every service a fresh password and roll it out.
    ///
    /// The tool configuration at `config_path` and the daemon configuration
    /// are rewritten and the service restarted. Failing to rewrite the
    /// credentials report is returned as a warning.
    pub async fn regenerate_credentials(
        &self,
        cfg: &mut ServiceConfig,
        config_path: &Path,
        server_ip: &str,
    ) -> Result<Vec<String>> {
        let mut warnings = Vec::new();

        cfg.regenerate_passwords(|| generate_password(PASSWORD_LENGTH));
        wte_config::save(cfg, config_path)?;
        ConfigRenderer::new(cfg).generate()?;

        if let Err(e) = CredentialsReport::new(cfg, server_ip).save(&self.paths.credentials_file) {
            warn!("Could not save credentials file: {}", e);
            warnings.push(format!("Could not save the credentials file: {}", e));
        }

        self.restart_installed().await?;
        Ok(warnings)
    }

    /// Install `release` of wte itself over `executable`.
    pub async fn self_update(
        &self,
        current_version: &str,
        release: &Release,
        executable: &Path,
        skip_verify: bool,
    ) -> Result<()> {
        info!("Updating wte {} to {}", current_version, release.version());
        self.updater(current_version)?
            .update(release, executable, skip_verify)
            .await
    }

    /// Replace the configuration at `config_path` with defaults and fresh
    /// passwords.
    pub fn reset_config(&self, config_path: &Path) -> Result<ServiceConfig> {
        let mut cfg = ServiceConfig::default();
        cfg.fill_missing_passwords(|| generate_password(PASSWORD_LENGTH));
        wte_config::save(&cfg, config_path)?;
        Ok(cfg)
    }
}

#[cfg(test)]
mod tests {
    use crate::test_support::*;
    use crate::InstallOptions;
    use pretty_assertions::assert_eq;
    use std::fs;
    use std::sync::Arc;
    use wte_common::Error;
    use wte_config::Paths;
    use wte_system::testing::{ScriptedRunner, StaticFetcher};

    #[tokio::test]
    async fn test_regenerate_credentials_rolls_out_new_passwords() {
        let temp = assert_fs::TempDir::new().unwrap();
        let paths = Paths::rooted(temp.path());
        write_os_release(&paths);
        let base = rooted_config(temp.path());
        let runner = Arc::new(host_runner(&base));
        let provisioner = provisioner(temp.path(), runner.clone(), release_fetcher("3.0.0-rc10"));
        let mut cfg = provisioner
            .install(base, &InstallOptions::default())
            .await
            .unwrap()
            .config;
        let old = cfg.http.auth.password.clone();

        let warnings = provisioner
            .regenerate_credentials(&mut cfg, &paths.tool_config, PUBLIC_IP)
            .await
            .unwrap();

        assert!(warnings.is_empty());
        assert_ne!(cfg.http.auth.password, old);
        let daemon = fs::read_to_string(&cfg.daemon.config_file).unwrap();
        assert!(daemon.contains(&cfg.http.auth.password));
        let saved = wte_config::load_with_env(&paths.tool_config, Vec::new()).unwrap();
        assert_eq!(saved, cfg);
        let report = fs::read_to_string(&paths.credentials_file).unwrap();
        assert!(report.contains(&cfg.shadowsocks.password));
        assert!(runner.was_called("systemctl restart gost"));
    }

    #[tokio::test]
    async fn test_apply_requires_installed_service() {
        let temp = assert_fs::TempDir::new().unwrap();
        let cfg = rooted_config(temp.path());
        let runner = Arc::new(ScriptedRunner::new().with_programs(&["systemctl"]));
        let provisioner = provisioner(temp.path(), runner.clone(), StaticFetcher::new());

        let err = provisioner.apply(&cfg).await.unwrap_err();

        assert!(matches!(err, Error::NotInstalled(_)));
        assert!(cfg.daemon.config_file.exists());
        assert!(!runner.was_called("systemctl restart gost"));
    }

    #[tokio::test]
    async fn test_apply_rejects_conflicts() {
        let temp = assert_fs::TempDir::new().unwrap();
        let mut cfg = rooted_config(temp.path());
        cfg.shadowsocks.port = cfg.http.port;
        let runner = Arc::new(ScriptedRunner::new());
        let provisioner = provisioner(temp.path(), runner, StaticFetcher::new());

        let err = provisioner.apply(&cfg).await.unwrap_err();
        assert!(matches!(err, Error::PortConflict { .. }));
        assert!(!cfg.daemon.config_file.exists());
    }

    #[test]
    fn test_reset_config() {
        let temp = assert_fs::TempDir::new().unwrap();
        let path = temp.path().join("etc/wte/config.yaml");
        let provisioner = provisioner(temp.path(), Arc::new(ScriptedRunner::new()), StaticFetcher::new());

        let cfg = provisioner.reset_config(&path).unwrap();

        assert_eq!(cfg.http.port, 8080);
        assert_eq!(cfg.http.auth.password.len(), 16);
        assert_eq!(cfg.shadowsocks.password.len(), 16);
        assert_eq!(wte_config::load_with_env(&path, Vec::new()).unwrap(), cfg);
    }
}
