//! wte - install and manage a GOST proxy server.

mod commands;
mod ui;

use clap::{ArgAction, Args, Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{debug, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use wte_config::ServiceConfig;

#[derive(Parser)]
#[command(name = "wte")]
#[command(
    author,
    version,
    about = "Install and manage a GOST proxy server (HTTP, HTTPS, Shadowsocks)"
)]
struct Cli {
    /// Configuration file (default: /etc/wte/config.yaml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Only print errors and requested data
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Install GOST and start the proxy service
    Install(InstallArgs),

    /// Remove GOST, its configuration and the service
    Uninstall {
        /// Do not ask for confirmation
        #[arg(short, long)]
        force: bool,

        /// Keep the credentials file
        #[arg(long)]
        keep_creds: bool,
    },

    /// Start the proxy service
    Start,

    /// Stop the proxy service
    Stop,

    /// Restart the proxy service
    Restart,

    /// Show service state, ports and configuration summary
    Status,

    /// Show service logs
    Logs {
        /// Follow the log output
        #[arg(short, long)]
        follow: bool,

        /// Number of lines to show
        #[arg(short = 'n', long, default_value = "50")]
        lines: usize,
    },

    /// Inspect or change the configuration
    #[command(subcommand)]
    Config(ConfigCommand),

    /// Show connection credentials
    #[command(alias = "creds")]
    Credentials {
        /// Generate new passwords and restart the service
        #[arg(long, conflicts_with = "uri")]
        regenerate: bool,

        /// Only print the Shadowsocks URI
        #[arg(long)]
        uri: bool,
    },

    /// Update wte to the latest release
    Update {
        /// Only check whether an update is available
        #[arg(long)]
        check: bool,

        /// Update even if already on the latest release, without asking
        #[arg(short, long)]
        force: bool,

        /// Install without verifying the release checksum
        #[arg(long)]
        skip_verify: bool,
    },

    /// Show version information
    Version,
}

#[derive(Subcommand)]
enum ConfigCommand {
    /// Print the configuration
    Show {
        /// Print passwords in clear text
        #[arg(long)]
        reveal: bool,
    },

    /// Open the configuration in an editor
    Edit,

    /// Set a single value, e.g. `wte config set http.port 3128`
    Set { key: String, value: String },

    /// Reset the configuration to defaults with new passwords
    Reset {
        /// Do not ask for confirmation
        #[arg(short, long)]
        force: bool,
    },

    /// Regenerate the GOST configuration and restart the service
    Apply,
}

#[derive(Args)]
struct InstallArgs {
    /// HTTP proxy port
    #[arg(long)]
    http_port: Option<u16>,

    /// HTTP proxy username
    #[arg(long)]
    http_user: Option<String>,

    /// HTTP proxy password (generated when omitted)
    #[arg(long)]
    http_pass: Option<String>,

    /// Disable HTTP proxy authentication
    #[arg(long)]
    http_no_auth: bool,

    /// Enable the Shadowsocks proxy
    #[arg(long, default_value_t = true, action = ArgAction::Set)]
    ss_enabled: bool,

    /// Shadowsocks port
    #[arg(long)]
    ss_port: Option<u16>,

    /// Shadowsocks password (generated when omitted)
    #[arg(long)]
    ss_password: Option<String>,

    /// Shadowsocks cipher
    #[arg(long)]
    ss_method: Option<String>,

    /// Enable the HTTPS proxy with a self-signed certificate
    #[arg(long)]
    https_enabled: bool,

    /// HTTPS proxy port
    #[arg(long)]
    https_port: Option<u16>,

    /// GOST version to install
    #[arg(long)]
    gost_version: Option<String>,

    /// Do not touch the firewall
    #[arg(long)]
    skip_firewall: bool,

    /// Expected SHA-256 of the GOST release archive
    #[arg(long)]
    gost_sha256: Option<String>,

    /// Install without verifying the archive checksum
    #[arg(long)]
    skip_verify: bool,
}

impl From<InstallArgs> for wte_provision::InstallOptions {
    fn from(args: InstallArgs) -> Self {
        Self {
            gost_version: args.gost_version,
            http_port: args.http_port,
            http_user: args.http_user,
            http_pass: args.http_pass,
            http_no_auth: args.http_no_auth,
            ss_enabled: args.ss_enabled,
            ss_port: args.ss_port,
            ss_password: args.ss_password,
            ss_method: args.ss_method,
            https_enabled: args.https_enabled,
            https_port: args.https_port,
            skip_firewall: args.skip_firewall,
            gost_sha256: args.gost_sha256,
            skip_verify: args.skip_verify,
        }
    }
}

fn log_filter(cli: &Cli, configured_level: &str) -> EnvFilter {
    if cli.verbose {
        EnvFilter::new("debug")
    } else if cli.quiet {
        EnvFilter::new("warn")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(configured_level))
    }
}

impl Commands {
    /// Whether the command changes the host and must run as root.
    fn needs_root(&self) -> bool {
        match self {
            Commands::Install(_)
            | Commands::Uninstall { .. }
            | Commands::Start
            | Commands::Stop
            | Commands::Restart => true,
            Commands::Config(cmd) => !matches!(cmd, ConfigCommand::Show { .. }),
            Commands::Credentials { regenerate, .. } => *regenerate,
            // Root is only checked once an update is actually installed.
            Commands::Update { .. } => false,
            Commands::Status | Commands::Logs { .. } | Commands::Version => false,
        }
    }

    /// Whether the command can run on defaults when the configuration
    /// cannot be loaded.
    fn tolerates_bad_config(&self) -> bool {
        matches!(
            self,
            Commands::Version | Commands::Config(ConfigCommand::Edit | ConfigCommand::Reset { .. })
        )
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config_path = wte_config::resolve_config_path(cli.config.as_deref());
    let loaded = wte_config::load(&config_path);
    let level = match &loaded {
        Ok(cfg) => cfg.logging.level.as_str(),
        Err(_) => wte_config::defaults::LOG_LEVEL,
    };

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(false)
                .with_ansi(!cli.no_color)
                .with_writer(std::io::stderr),
        )
        .with(log_filter(&cli, level))
        .init();

    let cfg = match loaded {
        Ok(cfg) => {
            debug!("Configuration loaded from {:?}", config_path);
            cfg
        }
        Err(e) if cli.command.tolerates_bad_config() => {
            warn!("Ignoring unreadable configuration {}: {}", config_path.display(), e);
            ServiceConfig::default()
        }
        Err(e) => {
            debug!("Configuration load failed: {:?}", e);
            return Err(anyhow::Error::new(e)
                .context(format!("Failed to load {}", config_path.display())));
        }
    };

    if cli.command.needs_root() {
        commands::require_root()?;
    }
    let ctx = commands::Context::new(config_path, cfg)?;

    match cli.command {
        Commands::Install(args) => commands::install::run(ctx, args.into()).await,
        Commands::Uninstall { force, keep_creds } => {
            commands::uninstall::run(ctx, force, keep_creds).await
        }
        Commands::Start => commands::service::start(&ctx).await,
        Commands::Stop => commands::service::stop(&ctx).await,
        Commands::Restart => commands::service::restart(&ctx).await,
        Commands::Status => commands::service::status(&ctx).await,
        Commands::Logs { follow, lines } => commands::service::logs(&ctx, follow, lines).await,
        Commands::Config(cmd) => match cmd {
            ConfigCommand::Show { reveal } => commands::config::show(&ctx, reveal),
            ConfigCommand::Edit => commands::config::edit(&ctx),
            ConfigCommand::Set { key, value } => commands::config::set(ctx, &key, &value),
            ConfigCommand::Reset { force } => commands::config::reset(&ctx, force),
            ConfigCommand::Apply => commands::config::apply(&ctx).await,
        },
        Commands::Credentials { regenerate, uri } => {
            commands::credentials::run(ctx, regenerate, uri).await
        }
        Commands::Update {
            check,
            force,
            skip_verify,
        } => commands::update::run(&ctx, check, force, skip_verify).await,
        Commands::Version => commands::version::run(&ctx).await,
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    ui::init(cli.no_color, cli.quiet);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            ui::error(format!("Error: {:#}", e));
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_install_flags() {
        let cli = Cli::try_parse_from([
            "wte",
            "install",
            "--ss-enabled=false",
            "--http-no-auth",
            "--http-port",
            "3128",
        ])
        .unwrap();
        let Commands::Install(args) = cli.command else {
            panic!("expected install");
        };
        let opts: wte_provision::InstallOptions = args.into();
        assert!(!opts.ss_enabled);
        assert!(opts.http_no_auth);
        assert_eq!(opts.http_port, Some(3128));
    }

    #[test]
    fn test_ss_enabled_by_default() {
        let cli = Cli::try_parse_from(["wte", "install"]).unwrap();
        let Commands::Install(args) = cli.command else {
            panic!("expected install");
        };
        assert!(args.ss_enabled);
    }

    #[test]
    fn test_creds_alias_and_global_config() {
        let cli = Cli::try_parse_from(["wte", "creds", "--uri", "-c", "/tmp/wte.yaml"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Credentials {
                uri: true,
                regenerate: false
            }
        ));
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/wte.yaml")));
    }

    #[test]
    fn test_logs_defaults() {
        let cli = Cli::try_parse_from(["wte", "logs"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Logs {
                follow: false,
                lines: 50
            }
        ));
    }

    #[test]
    fn test_config_set() {
        let cli = Cli::try_parse_from(["wte", "config", "set", "http.port", "3128"]).unwrap();
        let Commands::Config(ConfigCommand::Set { key, value }) = cli.command else {
            panic!("expected config set");
        };
        assert_eq!(key, "http.port");
        assert_eq!(value, "3128");
    }

    fn command(args: &[&str]) -> Commands {
        let mut argv = vec!["wte"];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).unwrap().command
    }

    #[test]
    fn test_mutating_commands_need_root() {
        for args in [
            &["install"][..],
            &["uninstall", "-f"],
            &["start"],
            &["stop"],
            &["restart"],
            &["config", "edit"],
            &["config", "set", "http.port", "3128"],
            &["config", "reset", "-f"],
            &["config", "apply"],
            &["credentials", "--regenerate"],
        ] {
            assert!(command(args).needs_root(), "{:?}", args);
        }
        for args in [
            &["status"][..],
            &["logs"],
            &["version"],
            &["config", "show"],
            &["credentials"],
            &["update", "--check"],
        ] {
            assert!(!command(args).needs_root(), "{:?}", args);
        }
    }

    #[test]
    fn test_commands_tolerating_bad_config() {
        assert!(command(&["version"]).tolerates_bad_config());
        assert!(command(&["config", "edit"]).tolerates_bad_config());
        assert!(command(&["config", "reset"]).tolerates_bad_config());
        assert!(!command(&["config", "set", "http.port", "1"]).tolerates_bad_config());
        assert!(!command(&["install"]).tolerates_bad_config());
    }

    #[test]
    fn test_verbose_and_quiet_conflict() {
        assert!(Cli::try_parse_from(["wte", "-v", "-q", "status"]).is_err());
    }
}
