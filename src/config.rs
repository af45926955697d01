//! Layered configuration: flags > environment (`goru_` prefix) > YAML file
//! > built-in defaults.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Parser;
use config::{Environment, File};
use serde::Deserialize;

use crate::duration::parse_duration;

const DEFAULT_INTERVAL: Duration = Duration::from_secs(2);
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const MIN_INTERVAL: Duration = Duration::from_millis(100);

/// Run mode: which observer front ends to start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Tui,
    Web,
    Both,
}

impl Mode {
    fn parse(s: &str) -> Result<Self> {
        match s {
            "tui" => Ok(Mode::Tui),
            "web" => Ok(Mode::Web),
            "both" => Ok(Mode::Both),
            other => bail!("invalid mode: {other} (must be tui, web, or both)"),
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Mode::Tui => "tui",
            Mode::Web => "web",
            Mode::Both => "both",
        })
    }
}

/// Command-line flags. Every option is optional here; unset flags fall
/// through to environment, config file, and defaults.
#[derive(Parser, Debug, Default)]
#[command(name = "goru", version)]
#[command(about = "Multi-host goroutine-dump explorer")]
pub struct Args {
    /// Comma-separated host:port list to poll via HTTP
    #[arg(long, value_delimiter = ',')]
    pub targets: Vec<String>,

    /// Paths or globs of goroutine-dump files (.txt or .gz)
    #[arg(long, value_delimiter = ',')]
    pub files: Vec<String>,

    /// Re-read changed files (tail-like)
    #[arg(long, num_args = 0..=1, default_missing_value = "true")]
    pub follow: Option<bool>,

    /// Poll interval for HTTP targets or rescan interval for files (e.g. "2s")
    #[arg(long)]
    pub interval: Option<String>,

    /// HTTP timeout for fetching goroutine dumps (e.g. "30s")
    #[arg(long)]
    pub timeout: Option<String>,

    /// Run mode: tui, web, or both
    #[arg(long)]
    pub mode: Option<String>,

    /// Web server host
    #[arg(long = "web.host")]
    pub web_host: Option<String>,

    /// Web server port
    #[arg(long = "web.port")]
    pub web_port: Option<u16>,

    /// Don't open the browser automatically
    #[arg(long = "web.no-open", num_args = 0..=1, default_missing_value = "true")]
    pub web_no_open: Option<bool>,

    /// TLS certificate file
    #[arg(long = "web.tls-cert")]
    pub web_tls_cert: Option<PathBuf>,

    /// TLS key file
    #[arg(long = "web.tls-key")]
    pub web_tls_key: Option<PathBuf>,

    /// Log level (debug, info, warn, error)
    #[arg(long = "log.level")]
    pub log_level: Option<String>,

    /// Use JSON format for logs
    #[arg(long = "log.json", num_args = 0..=1, default_missing_value = "true")]
    pub log_json: Option<bool>,

    /// Config file path (YAML)
    #[arg(long)]
    pub config: Option<PathBuf>,
}

/// The environment / YAML layer, deserialized from the merged
/// `config` crate sources.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Layer {
    targets: Option<Vec<String>>,
    files: Option<Vec<String>>,
    follow: Option<bool>,
    interval: Option<String>,
    timeout: Option<String>,
    mode: Option<String>,
    web: WebLayer,
    log: LogLayer,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct WebLayer {
    host: Option<String>,
    port: Option<u16>,
    no_open: Option<bool>,
    tls_cert: Option<PathBuf>,
    tls_key: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct LogLayer {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebConfig {
    pub host: String,
    pub port: u16,
    pub no_open: bool,
    pub tls_cert: Option<PathBuf>,
    pub tls_key: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    pub level: String,
    pub json: bool,
}

/// Fully resolved and validated configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub targets: Vec<String>,
    pub files: Vec<String>,
    pub follow: bool,
    pub interval: Duration,
    pub timeout: Duration,
    pub mode: Mode,
    pub web: WebConfig,
    pub log: LogConfig,
}

impl Config {
    /// Load from process arguments and environment.
    pub fn load() -> Result<Self> {
        Self::from_args(Args::parse())
    }

    /// Resolve the full layering for the given flags.
    pub fn from_args(args: Args) -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = &args.config {
            builder = builder.add_source(File::from(path.clone()));
        }
        // goru_interval=1s, goru_web__port=9090; "__" nests into sections.
        builder = builder.add_source(
            Environment::with_prefix("goru")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("targets")
                .with_list_parse_key("files"),
        );

        let layer: Layer = builder
            .build()
            .context("loading config")?
            .try_deserialize()
            .context("deserializing config")?;

        let interval = match args.interval.as_deref().or(layer.interval.as_deref()) {
            Some(raw) => parse_duration(raw).context("parsing interval")?,
            None => DEFAULT_INTERVAL,
        };
        let timeout = match args.timeout.as_deref().or(layer.timeout.as_deref()) {
            Some(raw) => parse_duration(raw).context("parsing timeout")?,
            None => DEFAULT_TIMEOUT,
        };
        let mode = match args.mode.as_deref().or(layer.mode.as_deref()) {
            Some(raw) => Mode::parse(raw)?,
            None => Mode::Tui,
        };

        let targets = if args.targets.is_empty() {
            layer.targets.unwrap_or_default()
        } else {
            args.targets
        };
        let files = if args.files.is_empty() {
            layer.files.unwrap_or_default()
        } else {
            args.files
        };

        let cfg = Self {
            targets,
            files,
            follow: args.follow.or(layer.follow).unwrap_or(false),
            interval,
            timeout,
            mode,
            web: WebConfig {
                host: args
                    .web_host
                    .or(layer.web.host)
                    .unwrap_or_else(|| "localhost".to_string()),
                port: args.web_port.or(layer.web.port).unwrap_or(8080),
                no_open: args.web_no_open.or(layer.web.no_open).unwrap_or(false),
                tls_cert: args.web_tls_cert.or(layer.web.tls_cert),
                tls_key: args.web_tls_key.or(layer.web.tls_key),
            },
            log: LogConfig {
                level: args
                    .log_level
                    .or(layer.log.level)
                    .unwrap_or_else(|| "info".to_string())
                    .to_lowercase(),
                json: args.log_json.or(layer.log.json).unwrap_or(false),
            },
        };

        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> Result<()> {
        if self.targets.is_empty() && self.files.is_empty() {
            bail!("at least one of --targets or --files must be specified");
        }

        match self.log.level.as_str() {
            "debug" | "info" | "warn" | "error" => {}
            other => bail!("invalid log level: {other}"),
        }

        if self.web.tls_cert.is_some() != self.web.tls_key.is_some() {
            bail!("both --web.tls-cert and --web.tls-key must be specified for TLS");
        }

        if self.interval < MIN_INTERVAL {
            bail!("interval must be at least 100ms");
        }

        Ok(())
    }

    pub fn has_tui(&self) -> bool {
        matches!(self.mode, Mode::Tui | Mode::Both)
    }

    pub fn has_web(&self) -> bool {
        matches!(self.mode, Mode::Web | Mode::Both)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::io::Write;
    use std::sync::Mutex;

    // Config resolution reads process environment; tests that set goru_*
    // variables or rely on their absence take this lock.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    fn args_with_targets() -> Args {
        Args {
            targets: vec!["localhost:6060".to_string()],
            ..Args::default()
        }
    }

    #[test]
    fn defaults_apply_when_nothing_is_set() {
        let _guard = ENV_LOCK.lock().unwrap();

        let cfg = Config::from_args(args_with_targets()).unwrap();
        assert_eq!(cfg.interval, Duration::from_secs(2));
        assert_eq!(cfg.timeout, Duration::from_secs(30));
        assert_eq!(cfg.mode, Mode::Tui);
        assert!(!cfg.follow);
        assert_eq!(cfg.web.host, "localhost");
        assert_eq!(cfg.web.port, 8080);
        assert_eq!(cfg.log.level, "info");
        assert!(!cfg.log.json);
        assert!(cfg.has_tui());
        assert!(!cfg.has_web());
    }

    #[test]
    fn a_source_is_required() {
        let _guard = ENV_LOCK.lock().unwrap();

        let err = Config::from_args(Args::default()).unwrap_err();
        assert!(err.to_string().contains("at least one of"));
    }

    #[test]
    fn file_values_apply_under_flags() {
        let _guard = ENV_LOCK.lock().unwrap();

        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(
            file,
            "targets:\n  - app:6060\ninterval: 5s\nmode: both\nlog:\n  level: debug"
        )
        .unwrap();

        let args = Args {
            config: Some(file.path().to_path_buf()),
            ..Args::default()
        };
        let cfg = Config::from_args(args).unwrap();

        assert_eq!(cfg.targets, vec!["app:6060"]);
        assert_eq!(cfg.interval, Duration::from_secs(5));
        assert_eq!(cfg.mode, Mode::Both);
        assert_eq!(cfg.log.level, "debug");
        assert!(cfg.has_web());
    }

    #[test]
    fn flags_override_file_values() {
        let _guard = ENV_LOCK.lock().unwrap();

        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(file, "targets:\n  - app:6060\ninterval: 5s").unwrap();

        let args = Args {
            config: Some(file.path().to_path_buf()),
            interval: Some("1s".to_string()),
            targets: vec!["other:6060".to_string()],
            ..Args::default()
        };
        let cfg = Config::from_args(args).unwrap();

        assert_eq!(cfg.interval, Duration::from_secs(1));
        assert_eq!(cfg.targets, vec!["other:6060"]);
    }

    #[test]
    fn environment_overrides_file_but_not_flags() {
        let _guard = ENV_LOCK.lock().unwrap();

        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(file, "interval: 5s\ntimeout: 10s").unwrap();

        std::env::set_var("goru_targets", "env-host:6060,env-host2:6060");
        std::env::set_var("goru_interval", "3s");

        let args = Args {
            config: Some(file.path().to_path_buf()),
            timeout: Some("7s".to_string()),
            ..Args::default()
        };
        let cfg = Config::from_args(args);

        std::env::remove_var("goru_targets");
        std::env::remove_var("goru_interval");

        let cfg = cfg.unwrap();
        assert_eq!(
            cfg.targets,
            vec!["env-host:6060".to_string(), "env-host2:6060".to_string()]
        );
        assert_eq!(cfg.interval, Duration::from_secs(3));
        assert_eq!(cfg.timeout, Duration::from_secs(7));
    }

    #[test]
    fn invalid_mode_is_rejected() {
        let _guard = ENV_LOCK.lock().unwrap();

        let args = Args {
            mode: Some("gui".to_string()),
            ..args_with_targets()
        };
        let err = Config::from_args(args).unwrap_err();
        assert!(err.to_string().contains("invalid mode"));
    }

    #[test]
    fn invalid_log_level_is_rejected() {
        let _guard = ENV_LOCK.lock().unwrap();

        let args = Args {
            log_level: Some("verbose".to_string()),
            ..args_with_targets()
        };
        assert!(Config::from_args(args).is_err());
    }

    #[test]
    fn log_level_is_case_insensitive() {
        let _guard = ENV_LOCK.lock().unwrap();

        let args = Args {
            log_level: Some("DEBUG".to_string()),
            ..args_with_targets()
        };
        let cfg = Config::from_args(args).unwrap();
        assert_eq!(cfg.log.level, "debug");
    }

    #[test]
    fn too_small_interval_is_rejected() {
        let _guard = ENV_LOCK.lock().unwrap();

        let args = Args {
            interval: Some("50ms".to_string()),
            ..args_with_targets()
        };
        let err = Config::from_args(args).unwrap_err();
        assert!(err.to_string().contains("at least 100ms"));
    }

    #[test]
    fn tls_halves_must_come_together() {
        let _guard = ENV_LOCK.lock().unwrap();

        let args = Args {
            web_tls_cert: Some(PathBuf::from("/tmp/cert.pem")),
            ..args_with_targets()
        };
        let err = Config::from_args(args).unwrap_err();
        assert!(err.to_string().contains("tls"));

        let args = Args {
            web_tls_cert: Some(PathBuf::from("/tmp/cert.pem")),
            web_tls_key: Some(PathBuf::from("/tmp/key.pem")),
            ..args_with_targets()
        };
        assert!(Config::from_args(args).is_ok());
    }
}
