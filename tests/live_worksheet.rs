//! Talks to the real site through a local chromedriver. Run with
//! `cargo test -- --ignored` on a machine with Chrome installed.

use penmanship::config::GeneratorConfig;
use penmanship::pdf::has_pdf_signature;
use penmanship::request::{LetterStyle, LineStyle, WorksheetRequest};

#[tokio::test]
#[ignore = "needs Chrome, chromedriver and network access"]
async fn generates_worksheet_from_live_site() {
    let temp = tempfile::TempDir::new().unwrap();
    let output = temp.path().join("live.pdf");
    let request = WorksheetRequest::new(
        "Sam has a red hat.",
        output.clone(),
        LineStyle::Solid,
        LetterStyle::Outline,
        false,
    )
    .unwrap();
    let config = GeneratorConfig {
        debug_dir: temp.path().to_path_buf(),
        screenshot_fallback: false,
        ..GeneratorConfig::from_env().unwrap()
    };

    let worksheet = penmanship::generator::generate(&request, &config)
        .await
        .unwrap();

    assert_eq!(worksheet.path, output);
    assert!(!worksheet.source.is_degraded());
    let bytes = std::fs::read(&output).unwrap();
    assert!(has_pdf_signature(&bytes));
    assert_eq!(bytes.len() as u64, worksheet.bytes);
}
