use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Why a worksheet could not be produced. Nothing here is retried.
#[derive(Debug, Error)]
pub enum GenerateError {
    #[error("browser environment setup failed: {0}")]
    Environment(String),

    #[error("navigate to {url}: {source}")]
    Navigation {
        url: String,
        #[source]
        source: fantoccini::error::CmdError,
    },

    #[error("page was not ready after {}s: {what}", timeout.as_secs())]
    NotReady { what: String, timeout: Duration },

    #[error("form not found: {0}")]
    FormNotFound(String),

    #[error("browser command failed: {0}")]
    Browser(#[from] fantoccini::error::CmdError),

    #[error("worksheet generation/detection timed out (tried: {})", tried.join(", "))]
    DetectionTimedOut { tried: Vec<&'static str> },

    #[error("write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl GenerateError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Environment(_) => ErrorCategory::Environment,
            Self::Navigation { .. } | Self::NotReady { .. } => ErrorCategory::Navigation,
            Self::DetectionTimedOut { .. } => ErrorCategory::Timeout,
            Self::FormNotFound(_) | Self::Browser(_) => ErrorCategory::RemoteSite,
            Self::Write { .. } => ErrorCategory::Filesystem,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Environment,
    Navigation,
    RemoteSite,
    Timeout,
    Filesystem,
}

impl ErrorCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Environment => "environment",
            Self::Navigation => "navigation",
            Self::RemoteSite => "remote site",
            Self::Timeout => "timeout",
            Self::Filesystem => "filesystem",
        }
    }

    pub fn hints(self) -> &'static [&'static str] {
        match self {
            Self::Environment => &[
                "Install Chrome and a matching chromedriver, and put chromedriver on PATH",
                "Or point PENMANSHIP_CHROMEDRIVER / --webdriver-url at a working driver",
            ],
            Self::Navigation => &[
                "Check your network connection and run again",
                "Run again with --visible to see whether the page loads",
            ],
            Self::RemoteSite => &[
                "Run again with --visible to watch the page",
                "The site layout may have changed; adjust selectors with --selectors",
                "The site may be showing a CAPTCHA or other anti-bot measures",
            ],
            Self::Timeout => &[
                "Run again with --visible to watch the page",
                "Inspect the debug screenshot and HTML dump",
                "The site may be showing a CAPTCHA or other anti-bot measures",
            ],
            Self::Filesystem => &["Check that the output path is writable"],
        }
    }
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
