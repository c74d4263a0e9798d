use std::path::Path;
use std::process::Stdio;
use std::time::{Duration, Instant};

use fantoccini::wd::{Capabilities, TimeoutConfiguration};
use fantoccini::{Client, ClientBuilder};
use serde_json::json;
use tempfile::TempDir;

use crate::config::{DriverSource, GeneratorConfig, Timeouts, USER_AGENT};
use crate::error::GenerateError;

/// One browser plus everything it owns for a single run. Call [`Session::close`]
/// on every path; a dropped session still kills its driver and removes its
/// download directory, but leaves the WebDriver session to the driver's exit.
pub struct Session {
    client: Client,
    driver: Option<DriverProcess>,
    download_dir: TempDir,
}

impl Session {
    pub async fn start(config: &GeneratorConfig, headless: bool) -> Result<Self, GenerateError> {
        let download_dir = tempfile::Builder::new()
            .prefix("penmanship-downloads-")
            .tempdir()
            .map_err(|err| GenerateError::Environment(format!("create download dir: {err}")))?;

        let (driver, webdriver_url) = match &config.driver {
            DriverSource::Spawn { binary } => {
                let driver = DriverProcess::spawn(binary, config.timeouts.driver_start).await?;
                let url = driver.url.clone();
                (Some(driver), url)
            }
            DriverSource::Attach { url } => (None, url.clone()),
        };

        let capabilities = chrome_capabilities(
            headless,
            download_dir.path(),
            config.chrome_binary.as_deref(),
        );

        tracing::info!(webdriver = %webdriver_url, headless, "start browser session");
        let mut builder = ClientBuilder::native();
        builder.capabilities(capabilities);
        let client = match builder.connect(&webdriver_url).await {
            Ok(client) => client,
            Err(err) => {
                if let Some(driver) = driver {
                    driver.shutdown().await;
                }
                return Err(GenerateError::Environment(format!(
                    "start WebDriver session at {webdriver_url}: {err}"
                )));
            }
        };

        let timeouts_set = client
            .update_timeouts(session_timeouts(&config.timeouts))
            .await;
        if let Err(err) = timeouts_set {
            if let Err(err) = client.close().await {
                tracing::debug!(%err, "close browser session");
            }
            if let Some(driver) = driver {
                driver.shutdown().await;
            }
            return Err(GenerateError::Environment(format!(
                "set WebDriver session timeouts: {err}"
            )));
        }

        Ok(Self {
            client,
            driver,
            download_dir,
        })
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn download_dir(&self) -> &Path {
        self.download_dir.path()
    }

    pub async fn close(self) {
        if let Err(err) = self.client.close().await {
            tracing::warn!(%err, "close browser session");
        }
        if let Some(driver) = self.driver {
            driver.shutdown().await;
        }
        if let Err(err) = self.download_dir.close() {
            tracing::warn!(%err, "remove download dir");
        }
        tracing::debug!("browser session closed");
    }
}

/// Navigation is cut off by the browser at the page-load timeout. Element
/// lookups never wait implicitly; every wait is an explicit poll.
pub fn session_timeouts(timeouts: &Timeouts) -> TimeoutConfiguration {
    TimeoutConfiguration::new(
        Some(timeouts.http_fetch),
        Some(timeouts.page_load),
        Some(Duration::ZERO),
    )
}

pub fn chrome_capabilities(
    headless: bool,
    download_dir: &Path,
    chrome_binary: Option<&str>,
) -> Capabilities {
    let mut args = vec![
        "--no-sandbox".to_owned(),
        "--disable-dev-shm-usage".to_owned(),
        "--disable-gpu".to_owned(),
        "--window-size=1920,1080".to_owned(),
        format!("--user-agent={USER_AGENT}"),
    ];
    if headless {
        args.insert(0, "--headless=new".to_owned());
    }

    let mut chrome_options = json!({
        "args": args,
        "prefs": {
            "download.default_directory": download_dir.to_string_lossy(),
            "download.prompt_for_download": false,
            "download.directory_upgrade": true,
            "safebrowsing.enabled": true,
            "plugins.always_open_pdf_externally": true,
        },
    });
    if let Some(binary) = chrome_binary
        && let Some(obj) = chrome_options.as_object_mut()
    {
        obj.insert("binary".to_owned(), json!(binary));
    }

    let mut capabilities = Capabilities::new();
    capabilities.insert("browserName".to_owned(), json!("chrome"));
    capabilities.insert("goog:chromeOptions".to_owned(), chrome_options);
    capabilities
}

struct DriverProcess {
    child: tokio::process::Child,
    url: String,
}

impl DriverProcess {
    async fn spawn(binary: &str, timeout: Duration) -> Result<Self, GenerateError> {
        let port = free_port()
            .map_err(|err| GenerateError::Environment(format!("pick driver port: {err}")))?;

        tracing::info!(binary, port, "spawn webdriver");
        let child = tokio::process::Command::new(binary)
            .arg(format!("--port={port}"))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|err| match err.kind() {
                std::io::ErrorKind::NotFound => GenerateError::Environment(format!(
                    "{binary} not found; install chromedriver or set PENMANSHIP_CHROMEDRIVER"
                )),
                _ => GenerateError::Environment(format!("spawn {binary}: {err}")),
            })?;

        let mut driver = Self {
            child,
            url: format!("http://127.0.0.1:{port}"),
        };
        if let Err(err) = driver.wait_ready(timeout).await {
            driver.shutdown().await;
            return Err(err);
        }
        Ok(driver)
    }

    async fn wait_ready(&mut self, timeout: Duration) -> Result<(), GenerateError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(2))
            .build()
            .map_err(|err| GenerateError::Environment(format!("build http client: {err}")))?;
        let status_url = format!("{}/status", self.url);
        let started = Instant::now();

        loop {
            match self.child.try_wait() {
                Ok(Some(status)) => {
                    return Err(GenerateError::Environment(format!(
                        "webdriver exited during startup ({status})"
                    )));
                }
                Ok(None) => {}
                Err(err) => {
                    return Err(GenerateError::Environment(format!("poll webdriver: {err}")));
                }
            }

            if let Ok(response) = http.get(&status_url).send().await
                && let Ok(body) = response.json::<serde_json::Value>().await
                && status_is_ready(&body)
            {
                tracing::debug!(url = %self.url, "webdriver ready");
                return Ok(());
            }

            if started.elapsed() >= timeout {
                return Err(GenerateError::Environment(format!(
                    "webdriver at {} not ready after {}s",
                    self.url,
                    timeout.as_secs()
                )));
            }
            tokio::time::sleep(Duration::from_millis(200)).await;
        }
    }

    async fn shutdown(mut self) {
        if let Err(err) = self.child.start_kill() {
            tracing::debug!(%err, "kill webdriver");
        }
        let _ = self.child.wait().await;
    }
}

fn status_is_ready(body: &serde_json::Value) -> bool {
    body.pointer("/value/ready")
        .and_then(|v| v.as_bool())
        .unwrap_or(false)
}

fn free_port() -> std::io::Result<u16> {
    let listener = std::net::TcpListener::bind("127.0.0.1:0")?;
    Ok(listener.local_addr()?.port())
}
