use std::path::PathBuf;

use clap::Parser;

use crate::request::{DEFAULT_OUTPUT, DEFAULT_TEXT, LetterStyle, LineStyle, WorksheetRequest};

#[derive(Debug, Parser)]
#[command(author, version, about)]
pub struct Cli {
    /// Text for handwriting practice.
    #[arg(long, default_value = DEFAULT_TEXT)]
    pub text: String,

    /// Output PDF path (overwritten if it exists).
    #[arg(long, default_value = DEFAULT_OUTPUT)]
    pub output: PathBuf,

    /// Guide line style.
    #[arg(long, value_enum, default_value_t = LineStyle::Dashed)]
    pub line_style: LineStyle,

    /// Letter style.
    #[arg(long, value_enum, default_value_t = LetterStyle::Dashed)]
    pub letter_style: LetterStyle,

    /// Run the browser visibly instead of headless.
    #[arg(long)]
    pub visible: bool,

    /// Attach to a running WebDriver server instead of spawning chromedriver.
    #[arg(long)]
    pub webdriver_url: Option<String>,

    /// YAML file overriding the built-in page selectors.
    #[arg(long)]
    pub selectors: Option<PathBuf>,

    /// Directory for the screenshot and HTML dump written on failure.
    #[arg(long, default_value = ".")]
    pub debug_dir: PathBuf,

    /// Fail instead of saving a screenshot of the page when no PDF is found.
    #[arg(long)]
    pub no_screenshot_fallback: bool,
}

impl Cli {
    pub fn request(&self) -> anyhow::Result<WorksheetRequest> {
        WorksheetRequest::new(
            self.text.clone(),
            self.output.clone(),
            self.line_style,
            self.letter_style,
            self.visible,
        )
    }
}
