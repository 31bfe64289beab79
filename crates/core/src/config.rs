use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default candidate range for preview servers (Vite's own default port upward)
pub const DEFAULT_PREVIEW_PORTS: (u16, u16) = (5173, 5400);

/// Raw TOML configuration structure.
/// Every section and key is optional; missing values fall back to defaults.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    #[serde(default)]
    server: RawServer,
    #[serde(default)]
    paths: RawPaths,
    #[serde(default)]
    preview: RawPreview,
    #[serde(default)]
    tools: RawTools,
    #[serde(default)]
    timeouts: RawTimeouts,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawServer {
    bind: Option<String>,
    port: Option<u16>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawPaths {
    work_root: Option<String>, // Convert to PathBuf
    out_root: Option<String>,  // Convert to PathBuf
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawPreview {
    port_start: Option<u16>,
    port_end: Option<u16>,
    ready_timeout_secs: Option<u64>,
    settle_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawTools {
    git: Option<String>,
    npm: Option<String>,
    npx: Option<String>,
    chrome: Option<String>,
    formatter: Option<FormatterKind>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawTimeouts {
    clone_secs: Option<u64>,
    install_secs: Option<u64>,
    build_secs: Option<u64>,
    render_secs: Option<u64>,
    stop_secs: Option<u64>,
}

/// Complete service configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub server: ServerConfig,
    pub paths: PathsConfig,
    pub preview: PreviewConfig,
    pub tools: ToolsConfig,
    pub timeouts: TimeoutConfig,
}

/// Where the HTTP API listens
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub bind: String,
    pub port: u16,
}

/// Roots under which each run gets its own checkout and bundle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathsConfig {
    pub work_root: PathBuf,
    pub out_root: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreviewConfig {
    /// First candidate port (inclusive)
    pub port_start: u16,
    /// Last candidate port (inclusive)
    pub port_end: u16,
    pub ready_timeout: Duration,
    /// Virtual time a page gets to settle before its DOM is captured
    pub settle_budget: Duration,
}

/// External programs the pipeline drives
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolsConfig {
    pub git: String,
    pub npm: String,
    pub npx: String,
    pub chrome: String,
    pub formatter: FormatterKind,
}

/// Which canonical formatter runs over rewritten documents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FormatterKind {
    Prettier,
    None,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeoutConfig {
    pub clone: Duration,
    pub install: Duration,
    pub build: Duration,
    pub render: Duration,
    /// Grace period between SIGTERM and SIGKILL for the preview server
    pub stop: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                bind: "127.0.0.1".to_string(),
                port: 3000,
            },
            paths: PathsConfig {
                work_root: PathBuf::from("./repos"),
                out_root: PathBuf::from("./out"),
            },
            preview: PreviewConfig {
                port_start: DEFAULT_PREVIEW_PORTS.0,
                port_end: DEFAULT_PREVIEW_PORTS.1,
                ready_timeout: Duration::from_secs(30),
                settle_budget: Duration::from_millis(10_000),
            },
            tools: ToolsConfig {
                git: "git".to_string(),
                npm: "npm".to_string(),
                npx: "npx".to_string(),
                chrome: "chromium".to_string(),
                formatter: FormatterKind::Prettier,
            },
            timeouts: TimeoutConfig {
                clone: Duration::from_secs(300),
                install: Duration::from_secs(900),
                build: Duration::from_secs(900),
                render: Duration::from_secs(60),
                stop: Duration::from_secs(5),
            },
        }
    }
}

impl Config {
    /// Apply environment overrides. `PORT` replaces `server.port`.
    ///
    /// Takes a lookup function so callers (and tests) decide where
    /// variables come from.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(port) = lookup("PORT") {
            self.server.port = port
                .trim()
                .parse()
                .map_err(|_| Error::Config(format!("Invalid PORT value '{}'", port)))?;
        }
        Ok(())
    }
}

/// Load configuration from a TOML file, or defaults when no file is given
pub fn load_config<P: AsRef<Path>>(path: Option<P>) -> Result<Config> {
    match path {
        Some(path) => {
            let content = fs::read_to_string(path)?;
            parse_config_str(&content)
        }
        None => Ok(Config::default()),
    }
}

/// Parse configuration from a string (useful for testing)
pub fn parse_config_str(content: &str) -> Result<Config> {
    let raw: RawConfig = toml::from_str(content)?;
    let defaults = Config::default();

    let server = ServerConfig {
        bind: raw.server.bind.unwrap_or(defaults.server.bind),
        port: raw.server.port.unwrap_or(defaults.server.port),
    };

    let paths = PathsConfig {
        work_root: match raw.paths.work_root {
            Some(p) => validate_path(&p, "paths.work_root")?,
            None => defaults.paths.work_root,
        },
        out_root: match raw.paths.out_root {
            Some(p) => validate_path(&p, "paths.out_root")?,
            None => defaults.paths.out_root,
        },
    };

    let preview = PreviewConfig {
        port_start: raw.preview.port_start.unwrap_or(defaults.preview.port_start),
        port_end: raw.preview.port_end.unwrap_or(defaults.preview.port_end),
        ready_timeout: raw
            .preview
            .ready_timeout_secs
            .map(|s| parse_timeout(s, "preview.ready_timeout_secs"))
            .transpose()?
            .unwrap_or(defaults.preview.ready_timeout),
        settle_budget: match raw.preview.settle_ms {
            Some(0) => {
                return Err(Error::Config(
                    "preview.settle_ms must be greater than zero".to_string(),
                ));
            }
            Some(ms) => Duration::from_millis(ms),
            None => defaults.preview.settle_budget,
        },
    };

    if preview.port_start == 0 || preview.port_start > preview.port_end {
        return Err(Error::Config(format!(
            "Invalid preview port range {}..={}",
            preview.port_start, preview.port_end
        )));
    }

    let tools = ToolsConfig {
        git: validate_program(raw.tools.git, defaults.tools.git, "tools.git")?,
        npm: validate_program(raw.tools.npm, defaults.tools.npm, "tools.npm")?,
        npx: validate_program(raw.tools.npx, defaults.tools.npx, "tools.npx")?,
        chrome: validate_program(raw.tools.chrome, defaults.tools.chrome, "tools.chrome")?,
        formatter: raw.tools.formatter.unwrap_or(defaults.tools.formatter),
    };

    let timeout = |value: Option<u64>, default: Duration, field: &str| -> Result<Duration> {
        match value {
            Some(secs) => parse_timeout(secs, field),
            None => Ok(default),
        }
    };

    let timeouts = TimeoutConfig {
        clone: timeout(raw.timeouts.clone_secs, defaults.timeouts.clone, "timeouts.clone_secs")?,
        install: timeout(
            raw.timeouts.install_secs,
            defaults.timeouts.install,
            "timeouts.install_secs",
        )?,
        build: timeout(raw.timeouts.build_secs, defaults.timeouts.build, "timeouts.build_secs")?,
        render: timeout(
            raw.timeouts.render_secs,
            defaults.timeouts.render,
            "timeouts.render_secs",
        )?,
        stop: timeout(raw.timeouts.stop_secs, defaults.timeouts.stop, "timeouts.stop_secs")?,
    };

    Ok(Config {
        server,
        paths,
        preview,
        tools,
        timeouts,
    })
}

/// Reject empty paths; absolute and relative are both fine.
fn validate_path(path_str: &str, field_name: &str) -> Result<PathBuf> {
    if path_str.trim().is_empty() {
        return Err(Error::Config(format!(
            "Empty path in '{}' field",
            field_name
        )));
    }
    Ok(PathBuf::from(path_str))
}

fn validate_program(value: Option<String>, default: String, field_name: &str) -> Result<String> {
    match value {
        Some(program) if program.trim().is_empty() => Err(Error::Config(format!(
            "Empty program name in '{}'",
            field_name
        ))),
        Some(program) => Ok(program),
        None => Ok(default),
    }
}

fn parse_timeout(secs: u64, field_name: &str) -> Result<Duration> {
    if secs == 0 {
        return Err(Error::Config(format!(
            "Timeout '{}' must be greater than zero",
            field_name
        )));
    }
    Ok(Duration::from_secs(secs))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = parse_config_str("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.preview.port_start, 5173);
        assert_eq!(config.preview.port_end, 5400);
        assert_eq!(config.tools.formatter, FormatterKind::Prettier);
    }

    #[test]
    fn test_parse_full_config() {
        let toml = r#"
[server]
bind = "0.0.0.0"
port = 8080

[paths]
work_root = "/var/lib/vite-ssg/repos"
out_root = "/var/lib/vite-ssg/out"

[preview]
port_start = 6000
port_end = 6010
ready_timeout_secs = 5
settle_ms = 2500

[tools]
chrome = "google-chrome"
formatter = "none"

[timeouts]
render_secs = 20
stop_secs = 2
        "#;

        let config = parse_config_str(toml).unwrap();
        assert_eq!(config.server.bind, "0.0.0.0");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.paths.out_root, PathBuf::from("/var/lib/vite-ssg/out"));
        assert_eq!(config.preview.port_start, 6000);
        assert_eq!(config.preview.ready_timeout, Duration::from_secs(5));
        assert_eq!(config.tools.chrome, "google-chrome");
        assert_eq!(config.tools.git, "git");
        assert_eq!(config.tools.formatter, FormatterKind::None);
        assert_eq!(config.timeouts.render, Duration::from_secs(20));
        assert_eq!(config.timeouts.build, Duration::from_secs(900));
        assert_eq!(config.preview.settle_budget, Duration::from_millis(2500));
        assert_eq!(config.timeouts.stop, Duration::from_secs(2));
    }

    #[test]
    fn test_shutdown_and_settle_defaults() {
        let config = parse_config_str("[timeouts]
render_secs = 30
").unwrap();
        assert_eq!(config.timeouts.stop, Duration::from_secs(5));
        assert_eq!(config.preview.settle_budget, Duration::from_secs(10));

        let result = parse_config_str("[preview]
settle_ms = 0
");
        assert!(result.unwrap_err().to_string().contains("preview.settle_ms"));
        let result = parse_config_str("[timeouts]
stop_secs = 0
");
        assert!(result.unwrap_err().to_string().contains("timeouts.stop_secs"));
    }

    #[test]
    fn test_rejects_inverted_port_range() {
        let result = parse_config_str("[preview]\nport_start = 6000\nport_end = 5000\n");
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("port range"));
    }

    #[test]
    fn test_rejects_zero_timeout() {
        let result = parse_config_str("[timeouts]\nbuild_secs = 0\n");
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("timeouts.build_secs"));
    }

    #[test]
    fn test_rejects_empty_paths_and_programs() {
        let result = parse_config_str("[paths]\nout_root = \"  \"\n");
        assert!(result.unwrap_err().to_string().contains("paths.out_root"));

        let result = parse_config_str("[tools]\nnpm = \"\"\n");
        assert!(result.unwrap_err().to_string().contains("tools.npm"));
    }

    #[test]
    fn test_rejects_unknown_keys() {
        assert!(parse_config_str("[server]\nhost = \"x\"\n").is_err());
        assert!(parse_config_str("[tools]\nformatter = \"black\"\n").is_err());
    }

    #[test]
    fn test_port_env_override() {
        let mut config = Config::default();
        let env: HashMap<&str, &str> = [("PORT", "4100")].into();
        config
            .apply_env(|k| env.get(k).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(config.server.port, 4100);

        let mut config = Config::default();
        let result = config.apply_env(|_| Some("not-a-port".to_string()));
        assert!(result.is_err());
    }

    #[test]
    fn test_load_config_from_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("vite-ssg.toml");
        fs::write(&path, "[server]\nport = 9000\n").unwrap();

        let config = load_config(Some(&path)).unwrap();
        assert_eq!(config.server.port, 9000);

        let defaults = load_config(None::<&Path>).unwrap();
        assert_eq!(defaults, Config::default());
    }
}
