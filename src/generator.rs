use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::capture::{self, CaptureContext, CaptureSource, CapturedPdf, WebDriverPage};
use crate::config::GeneratorConfig;
use crate::driver::Session;
use crate::error::GenerateError;
use crate::form;
use crate::pdf;
use crate::request::WorksheetRequest;

/// A worksheet that has been written to disk.
#[derive(Debug, Clone)]
pub struct Worksheet {
    pub path: PathBuf,
    pub bytes: u64,
    pub source: CaptureSource,
}

/// Runs one browser session against the worksheet site and writes the PDF to
/// the request's output path. The browser is closed on every path.
pub async fn generate(
    request: &WorksheetRequest,
    config: &GeneratorConfig,
) -> Result<Worksheet, GenerateError> {
    let session = Session::start(config, !request.visible()).await?;

    let outcome = drive(&session, request, config).await;
    if let Err(err) = &outcome {
        tracing::warn!(category = %err.category(), "generation failed; saving debug artifacts");
        dump_debug_artifacts(session.client(), &config.debug_dir).await;
    }
    session.close().await;

    let captured = outcome?;
    pdf::write_atomic(request.output(), &captured.bytes)?;
    tracing::info!(
        path = %request.output().display(),
        bytes = captured.bytes.len(),
        source = %captured.source,
        "worksheet saved"
    );

    Ok(Worksheet {
        path: request.output().to_path_buf(),
        bytes: captured.bytes.len() as u64,
        source: captured.source,
    })
}

async fn drive(
    session: &Session,
    request: &WorksheetRequest,
    config: &GeneratorConfig,
) -> Result<CapturedPdf, GenerateError> {
    let client = session.client();
    let selectors = &config.selectors;
    let timeouts = &config.timeouts;

    form::open(client, &config.target_url, timeouts).await?;
    form::wait_for_app(client, &selectors.readiness_script, timeouts).await?;
    form::fill_text(client, selectors, request.text(), timeouts).await?;
    form::apply_optional_selects(client, selectors).await;
    form::set_guide_lines(client, selectors, request.line_style()).await;
    form::set_letter_style(client, selectors, request.letter_style(), timeouts).await;
    form::click_create(client, selectors, timeouts).await?;

    let http = http_client(timeouts.http_fetch)?;
    let page = WebDriverPage::new(client, selectors);
    let ctx = CaptureContext {
        page: &page,
        download_dir: session.download_dir(),
        timeouts,
        http: &http,
    };
    let strategies = capture::default_strategies(config.screenshot_fallback);
    capture::capture_first(&strategies, &ctx).await
}

fn http_client(timeout: Duration) -> Result<reqwest::Client, GenerateError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|err| GenerateError::Environment(format!("build http client: {err}")))
}

/// Best effort: failures here are logged and never replace the original error.
async fn dump_debug_artifacts(client: &fantoccini::Client, debug_dir: &Path) {
    let stamp = chrono::Local::now().format("%Y%m%d-%H%M%S");
    let (png_path, html_path) = debug_artifact_paths(debug_dir, &stamp.to_string());

    match client.screenshot().await {
        Ok(png) => match std::fs::write(&png_path, png) {
            Ok(()) => eprintln!("Debug screenshot saved: {}", png_path.display()),
            Err(err) => tracing::warn!(%err, path = %png_path.display(), "write debug screenshot"),
        },
        Err(err) => tracing::warn!(%err, "take debug screenshot"),
    }

    match client.source().await {
        Ok(html) => match std::fs::write(&html_path, html) {
            Ok(()) => eprintln!("Debug HTML saved: {}", html_path.display()),
            Err(err) => tracing::warn!(%err, path = %html_path.display(), "write debug html"),
        },
        Err(err) => tracing::warn!(%err, "read page source"),
    }
}

fn debug_artifact_paths(debug_dir: &Path, stamp: &str) -> (PathBuf, PathBuf) {
    (
        debug_dir.join(format!("penmanship-debug-{stamp}.png")),
        debug_dir.join(format!("penmanship-debug-{stamp}.html")),
    )
}
