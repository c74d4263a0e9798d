//! Strategies for getting hold of the generated PDF once the form has been
//! submitted. They run in order and the first one to produce a PDF wins.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::Context as _;
use async_trait::async_trait;
use base64::Engine as _;
use fantoccini::Client;
use fantoccini::wd::WindowHandle;
use reqwest::header::{ACCEPT, COOKIE, USER_AGENT};

use crate::config::Timeouts;
use crate::error::GenerateError;
use crate::pdf::{has_pdf_signature, image_to_pdf};
use crate::selectors::SelectorTable;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureSource {
    Network { url: String },
    Download { file_name: String },
    Screenshot,
}

impl CaptureSource {
    /// A screenshot is a raster image of the page, not the site's document.
    pub fn is_degraded(&self) -> bool {
        matches!(self, Self::Screenshot)
    }
}

impl std::fmt::Display for CaptureSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Network { url } => write!(f, "network response from {url}"),
            Self::Download { file_name } => write!(f, "browser download {file_name}"),
            Self::Screenshot => f.write_str("page screenshot"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CapturedPdf {
    pub bytes: Vec<u8>,
    pub source: CaptureSource,
}

/// What the capture strategies need from the live page.
#[async_trait]
pub trait PageProbe: Send + Sync {
    /// URLs the page has loaded or links to that may serve the PDF.
    async fn pdf_candidate_urls(&self) -> anyhow::Result<Vec<String>>;
    /// URL of the window the form was filled in.
    async fn page_url(&self) -> anyhow::Result<String>;
    /// `Cookie` header value carrying the browser session. Only ever sent to
    /// the page's own host.
    async fn cookie_header(&self) -> anyhow::Result<Option<String>>;
    /// Reads a `blob:` URL from inside the page.
    async fn fetch_blob(&self, url: &str) -> anyhow::Result<Vec<u8>>;
    /// Clicks visible download/save controls; returns how many were clicked.
    async fn click_download_buttons(&self) -> usize;
    /// PNG of the current viewport.
    async fn screenshot(&self) -> anyhow::Result<Vec<u8>>;
}

pub struct CaptureContext<'a> {
    pub page: &'a dyn PageProbe,
    pub download_dir: &'a Path,
    pub timeouts: &'a Timeouts,
    pub http: &'a reqwest::Client,
}

#[async_trait]
pub trait CaptureStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    /// `Ok(None)` means this strategy saw no PDF within its budget.
    async fn capture(&self, ctx: &CaptureContext<'_>) -> anyhow::Result<Option<CapturedPdf>>;
}

pub fn default_strategies(screenshot_fallback: bool) -> Vec<Box<dyn CaptureStrategy>> {
    let mut strategies: Vec<Box<dyn CaptureStrategy>> =
        vec![Box::new(NetworkCapture), Box::new(DownloadCapture)];
    if screenshot_fallback {
        strategies.push(Box::new(ScreenshotCapture));
    }
    strategies
}

pub async fn capture_first(
    strategies: &[Box<dyn CaptureStrategy>],
    ctx: &CaptureContext<'_>,
) -> Result<CapturedPdf, GenerateError> {
    let mut tried = Vec::with_capacity(strategies.len());
    for strategy in strategies {
        let name = strategy.name();
        tried.push(name);
        tracing::info!(strategy = name, "look for generated pdf");

        match strategy.capture(ctx).await {
            Ok(Some(pdf)) => {
                tracing::info!(strategy = name, source = %pdf.source, bytes = pdf.bytes.len(), "captured pdf");
                return Ok(pdf);
            }
            Ok(None) => tracing::info!(strategy = name, "no pdf"),
            Err(err) => tracing::warn!(strategy = name, ?err, "capture failed"),
        }
    }

    Err(GenerateError::DetectionTimedOut { tried })
}

/// Watches what the page loads or links to and fetches anything that looks
/// like the worksheet.
pub struct NetworkCapture;

#[async_trait]
impl CaptureStrategy for NetworkCapture {
    fn name(&self) -> &'static str {
        "network"
    }

    async fn capture(&self, ctx: &CaptureContext<'_>) -> anyhow::Result<Option<CapturedPdf>> {
        let started = Instant::now();
        let budget = ctx.timeouts.network_capture;
        let mut seen: HashSet<String> = HashSet::new();
        let page_url = match ctx.page.page_url().await {
            Ok(url) => Some(url),
            Err(err) => {
                tracing::debug!(?err, "read page url");
                None
            }
        };
        let cookies = match ctx.page.cookie_header().await {
            Ok(cookies) => cookies,
            Err(err) => {
                tracing::debug!(?err, "read session cookies");
                None
            }
        };

        loop {
            let candidates = ctx
                .page
                .pdf_candidate_urls()
                .await
                .context("collect candidate urls")?;

            for url in candidates {
                if !looks_like_pdf_url(&url) || !seen.insert(url.clone()) {
                    continue;
                }
                let remaining = budget.saturating_sub(started.elapsed());
                if remaining.is_zero() {
                    return Ok(None);
                }
                tracing::debug!(%url, "candidate pdf url");

                let fetched = if url.starts_with("blob:") {
                    ctx.page.fetch_blob(&url).await.map(Some)
                } else {
                    let cookies = cookies
                        .as_deref()
                        .filter(|_| same_host(&url, page_url.as_deref()));
                    fetch_pdf(ctx.http, &url, cookies, remaining).await
                };
                match fetched {
                    Ok(Some(bytes)) if has_pdf_signature(&bytes) => {
                        return Ok(Some(CapturedPdf {
                            bytes,
                            source: CaptureSource::Network { url },
                        }));
                    }
                    Ok(_) => tracing::debug!(%url, "not a pdf"),
                    Err(err) => tracing::debug!(%url, ?err, "fetch failed"),
                }
            }

            let remaining = budget.saturating_sub(started.elapsed());
            if remaining.is_zero() {
                return Ok(None);
            }
            tokio::time::sleep(ctx.timeouts.poll_interval.min(remaining)).await;
        }
    }
}

/// Waits for the browser to drop a PDF into the session download directory.
pub struct DownloadCapture;

#[async_trait]
impl CaptureStrategy for DownloadCapture {
    fn name(&self) -> &'static str {
        "download"
    }

    async fn capture(&self, ctx: &CaptureContext<'_>) -> anyhow::Result<Option<CapturedPdf>> {
        if newest_pdf(ctx.download_dir)?.is_none() {
            let clicked = ctx.page.click_download_buttons().await;
            tracing::debug!(clicked, "clicked download buttons");
        }

        let started = Instant::now();
        let mut previous: Option<(PathBuf, u64)> = None;
        loop {
            let current = newest_pdf(ctx.download_dir)?;
            if let Some((path, size)) = &current {
                if *size > 0 && previous.as_ref() == current.as_ref() {
                    let bytes = tokio::fs::read(path)
                        .await
                        .with_context(|| format!("read download: {}", path.display()))?;
                    if !has_pdf_signature(&bytes) {
                        anyhow::bail!("downloaded file is not a pdf: {}", path.display());
                    }
                    let file_name = path
                        .file_name()
                        .map(|name| name.to_string_lossy().to_string())
                        .unwrap_or_default();
                    return Ok(Some(CapturedPdf {
                        bytes,
                        source: CaptureSource::Download { file_name },
                    }));
                }
                tracing::debug!(path = %path.display(), size, "download in progress");
            }
            previous = current;

            if started.elapsed() >= ctx.timeouts.download_capture {
                return Ok(None);
            }
            tokio::time::sleep(ctx.timeouts.poll_interval).await;
        }
    }
}

/// Last resort: renders what the page shows into a one-page PDF.
pub struct ScreenshotCapture;

#[async_trait]
impl CaptureStrategy for ScreenshotCapture {
    fn name(&self) -> &'static str {
        "screenshot"
    }

    async fn capture(&self, ctx: &CaptureContext<'_>) -> anyhow::Result<Option<CapturedPdf>> {
        let png = ctx.page.screenshot().await.context("take screenshot")?;
        let bytes = image_to_pdf(&png, "Handwriting practice worksheet")?;
        Ok(Some(CapturedPdf {
            bytes,
            source: CaptureSource::Screenshot,
        }))
    }
}

pub fn looks_like_pdf_url(raw: &str) -> bool {
    if raw.starts_with("blob:") {
        return true;
    }
    let Ok(url) = url::Url::parse(raw) else {
        return false;
    };
    if url.scheme() != "http" && url.scheme() != "https" {
        return false;
    }
    if url.path().to_ascii_lowercase().ends_with(".pdf") {
        return true;
    }
    url.query()
        .is_some_and(|query| query.to_ascii_lowercase().contains("pdf"))
}

fn same_host(candidate: &str, page_url: Option<&str>) -> bool {
    let host = |raw: &str| {
        url::Url::parse(raw)
            .ok()
            .and_then(|url| url.host_str().map(str::to_ascii_lowercase))
    };
    match (host(candidate), page_url.and_then(host)) {
        (Some(candidate), Some(page)) => candidate == page,
        _ => false,
    }
}

async fn fetch_pdf(
    http: &reqwest::Client,
    url: &str,
    cookies: Option<&str>,
    timeout: Duration,
) -> anyhow::Result<Option<Vec<u8>>> {
    let mut request = http
        .get(url)
        .timeout(timeout)
        .header(USER_AGENT, crate::config::USER_AGENT)
        .header(ACCEPT, "application/pdf,*/*;q=0.8");
    if let Some(cookies) = cookies {
        request = request.header(COOKIE, cookies);
    }

    let response = request.send().await.with_context(|| format!("GET {url}"))?;
    if !response.status().is_success() {
        tracing::debug!(url, status = %response.status(), "pdf candidate rejected");
        return Ok(None);
    }
    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);

    let bytes = response.bytes().await.context("read response body")?;
    if !has_pdf_signature(&bytes) {
        tracing::debug!(url, content_type = ?content_type, "response is not a pdf");
        return Ok(None);
    }
    Ok(Some(bytes.to_vec()))
}

fn newest_pdf(dir: &Path) -> anyhow::Result<Option<(PathBuf, u64)>> {
    let mut newest: Option<(PathBuf, u64, std::time::SystemTime)> = None;
    for entry in std::fs::read_dir(dir)
        .with_context(|| format!("read download dir: {}", dir.display()))?
    {
        let entry = entry?;
        let path = entry.path();
        let is_pdf = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));
        if !is_pdf {
            continue;
        }
        let metadata = entry.metadata()?;
        let modified = metadata.modified().unwrap_or(std::time::UNIX_EPOCH);
        if newest.as_ref().is_none_or(|(_, _, seen)| modified > *seen) {
            newest = Some((path, metadata.len(), modified));
        }
    }
    Ok(newest.map(|(path, size, _)| (path, size)))
}

/// [`PageProbe`] over a live WebDriver session.
pub struct WebDriverPage<'a> {
    client: &'a Client,
    selectors: &'a SelectorTable,
}

impl<'a> WebDriverPage<'a> {
    pub fn new(client: &'a Client, selectors: &'a SelectorTable) -> Self {
        Self { client, selectors }
    }

    async fn window_urls(&self) -> anyhow::Result<Vec<String>> {
        let original = self.client.window().await.context("current window")?;
        let handles = self.client.windows().await.context("list windows")?;

        let mut urls = Vec::new();
        let visited = self.visit_windows(&original, handles, &mut urls).await;
        // Later steps click and screenshot in the current window.
        self.client
            .switch_to_window(original)
            .await
            .context("switch back to form window")?;
        visited?;
        Ok(urls)
    }

    async fn visit_windows(
        &self,
        original: &WindowHandle,
        handles: Vec<WindowHandle>,
        urls: &mut Vec<String>,
    ) -> anyhow::Result<()> {
        for handle in handles {
            if &handle == original {
                urls.push(self.client.current_url().await?.to_string());
                continue;
            }
            self.client
                .switch_to_window(handle)
                .await
                .context("switch window")?;
            if let Ok(url) = self.client.current_url().await {
                urls.push(url.to_string());
            }
        }
        Ok(())
    }
}

const PAGE_URLS_SCRIPT: &str = r#"
const out = [];
document.querySelectorAll('a[href]').forEach(function (a) { out.push(a.href); });
document.querySelectorAll('iframe[src], embed[src]').forEach(function (e) { out.push(e.src); });
document.querySelectorAll('object[data]').forEach(function (e) { out.push(e.data); });
if (window.performance && performance.getEntriesByType) {
  performance.getEntriesByType('resource').forEach(function (e) { out.push(e.name); });
}
return out;
"#;

const FETCH_BLOB_SCRIPT: &str = r#"
const url = arguments[0];
const done = arguments[arguments.length - 1];
fetch(url)
  .then(function (r) { return r.arrayBuffer(); })
  .then(function (buf) {
    const bytes = new Uint8Array(buf);
    let bin = '';
    for (let i = 0; i < bytes.length; i++) { bin += String.fromCharCode(bytes[i]); }
    done(btoa(bin));
  })
  .catch(function () { done(null); });
"#;

#[async_trait]
impl PageProbe for WebDriverPage<'_> {
    async fn pdf_candidate_urls(&self) -> anyhow::Result<Vec<String>> {
        let mut urls = self.window_urls().await?;

        let value = self
            .client
            .execute(PAGE_URLS_SCRIPT, Vec::new())
            .await
            .context("list page urls")?;
        if let Some(items) = value.as_array() {
            urls.extend(items.iter().filter_map(|v| v.as_str()).map(str::to_owned));
        }
        Ok(urls)
    }

    async fn page_url(&self) -> anyhow::Result<String> {
        let url = self.client.current_url().await.context("read page url")?;
        Ok(url.to_string())
    }

    async fn cookie_header(&self) -> anyhow::Result<Option<String>> {
        let cookies = self.client.get_all_cookies().await.context("read cookies")?;
        if cookies.is_empty() {
            return Ok(None);
        }
        let header = cookies
            .iter()
            .map(|cookie| format!("{}={}", cookie.name(), cookie.value()))
            .collect::<Vec<_>>()
            .join("; ");
        Ok(Some(header))
    }

    async fn fetch_blob(&self, url: &str) -> anyhow::Result<Vec<u8>> {
        let value = self
            .client
            .execute_async(FETCH_BLOB_SCRIPT, vec![serde_json::json!(url)])
            .await
            .context("read blob in page")?;
        let encoded = value
            .as_str()
            .ok_or_else(|| anyhow::anyhow!("blob fetch returned nothing: {url}"))?;
        base64::engine::general_purpose::STANDARD
            .decode(encoded)
            .context("decode blob base64")
    }

    async fn click_download_buttons(&self) -> usize {
        let mut clicked = 0;
        for selector in &self.selectors.download_buttons {
            for button in crate::form::displayed(self.client, selector).await {
                match crate::form::click(self.client, &button).await {
                    Ok(()) => clicked += 1,
                    Err(err) => tracing::debug!(%err, "click download button"),
                }
            }
        }
        clicked
    }

    async fn screenshot(&self) -> anyhow::Result<Vec<u8>> {
        self.client
            .screenshot()
            .await
            .context("capture viewport screenshot")
    }
}
