use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context as _;

use crate::selectors::SelectorTable;

pub const DEFAULT_TARGET_URL: &str =
    "https://www.worksheetworks.com/english/writing/handwriting/print-practice.html";

pub const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

/// Upper bounds for every wait in a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Timeouts {
    pub driver_start: Duration,
    pub page_load: Duration,
    pub app_ready: Duration,
    pub settle: Duration,
    pub form: Duration,
    pub create_button: Duration,
    pub network_capture: Duration,
    pub download_capture: Duration,
    pub poll_interval: Duration,
    pub http_fetch: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            driver_start: Duration::from_secs(20),
            page_load: Duration::from_secs(20),
            app_ready: Duration::from_secs(20),
            settle: Duration::from_secs(1),
            form: Duration::from_secs(10),
            create_button: Duration::from_secs(10),
            network_capture: Duration::from_secs(15),
            download_capture: Duration::from_secs(15),
            poll_interval: Duration::from_millis(500),
            http_fetch: Duration::from_secs(30),
        }
    }
}

/// How to get hold of a WebDriver server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriverSource {
    /// Spawn this chromedriver binary for the duration of the run.
    Spawn { binary: String },
    /// Attach to a server that is already listening.
    Attach { url: String },
}

#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    pub target_url: String,
    pub driver: DriverSource,
    pub chrome_binary: Option<String>,
    pub selectors: SelectorTable,
    pub timeouts: Timeouts,
    pub debug_dir: PathBuf,
    pub screenshot_fallback: bool,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            target_url: DEFAULT_TARGET_URL.to_owned(),
            driver: DriverSource::Spawn {
                binary: "chromedriver".to_owned(),
            },
            chrome_binary: None,
            selectors: SelectorTable::default(),
            timeouts: Timeouts::default(),
            debug_dir: PathBuf::from("."),
            screenshot_fallback: true,
        }
    }
}

impl GeneratorConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let mut config = Self::default();

        if let Some(url) = env_non_empty("PENMANSHIP_TARGET_URL") {
            config.target_url = url;
        }
        if let Some(binary) = env_non_empty("PENMANSHIP_CHROMEDRIVER") {
            config.driver = DriverSource::Spawn { binary };
        }
        if let Some(url) = env_non_empty("PENMANSHIP_WEBDRIVER_URL") {
            config.driver = DriverSource::Attach { url };
        }
        config.chrome_binary = env_non_empty("PENMANSHIP_CHROME_BINARY");
        if let Some(path) = env_non_empty("PENMANSHIP_SELECTORS") {
            config.selectors = SelectorTable::load(std::path::Path::new(&path))
                .context("load PENMANSHIP_SELECTORS")?;
        }

        Ok(config)
    }

    pub fn with_cli(mut self, cli: &crate::cli::Cli) -> anyhow::Result<Self> {
        if let Some(url) = cli.webdriver_url.as_deref() {
            config_attach(&mut self, url)?;
        }
        if let Some(path) = cli.selectors.as_deref() {
            self.selectors = SelectorTable::load(path).context("load --selectors")?;
        }
        self.debug_dir = cli.debug_dir.clone();
        if cli.no_screenshot_fallback {
            self.screenshot_fallback = false;
        }
        Ok(self)
    }
}

fn config_attach(config: &mut GeneratorConfig, url: &str) -> anyhow::Result<()> {
    let parsed = url::Url::parse(url).context("parse --webdriver-url")?;
    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        anyhow::bail!("--webdriver-url must be http/https: {parsed}");
    }
    config.driver = DriverSource::Attach {
        url: url.trim_end_matches('/').to_owned(),
    };
    Ok(())
}

fn env_non_empty(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|value| value.trim().to_owned())
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use clap::Parser as _;

    use super::*;
    use crate::cli::Cli;

    #[test]
    fn cli_flags_override_defaults() {
        let cli = Cli::try_parse_from([
            "penmanship",
            "--webdriver-url",
            "http://127.0.0.1:4444/",
            "--debug-dir",
            "/tmp/debug",
            "--no-screenshot-fallback",
        ])
        .unwrap();

        let config = GeneratorConfig::default().with_cli(&cli).unwrap();
        assert_eq!(
            config.driver,
            DriverSource::Attach {
                url: "http://127.0.0.1:4444".to_owned()
            }
        );
        assert_eq!(config.debug_dir, PathBuf::from("/tmp/debug"));
        assert!(!config.screenshot_fallback);
    }

    #[test]
    fn rejects_non_http_webdriver_url() {
        let cli =
            Cli::try_parse_from(["penmanship", "--webdriver-url", "ftp://example.com"]).unwrap();
        let err = GeneratorConfig::default().with_cli(&cli).unwrap_err();
        assert!(err.to_string().contains("http/https"));
    }

    #[test]
    fn defaults_spawn_chromedriver_against_worksheetworks() {
        let config = GeneratorConfig::default();
        assert_eq!(config.target_url, DEFAULT_TARGET_URL);
        assert_eq!(
            config.driver,
            DriverSource::Spawn {
                binary: "chromedriver".to_owned()
            }
        );
        assert!(config.screenshot_fallback);
        assert!(config.timeouts.poll_interval < config.timeouts.form);
    }
}
