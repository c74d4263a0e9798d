use std::path::{Path, PathBuf};

pub const DEFAULT_TEXT: &str = "The quick brown fox jumps over the lazy dog";
pub const DEFAULT_OUTPUT: &str = "handwriting_worksheet.pdf";

/// Guide lines drawn around each row of practice text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum LineStyle {
    Solid,
    Dashed,
    Dotted,
    Minimal,
    None,
}

impl LineStyle {
    /// Four-character pattern the site uses to name its guide-line presets.
    pub fn guide_pattern(self) -> &'static str {
        match self {
            Self::Solid => "1111",
            Self::Dashed => "1010",
            Self::Dotted => "0101",
            Self::Minimal => "1000",
            Self::None => "0000",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Solid => "Solid",
            Self::Dashed => "Dashed",
            Self::Dotted => "Dotted",
            Self::Minimal => "Minimal",
            Self::None => "None",
        }
    }
}

/// Appearance of the traced letters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum LetterStyle {
    Solid,
    Dashed,
    Outline,
}

impl LetterStyle {
    /// Names the site may use for this appearance, most specific first.
    /// Every name is followed by its capitalised form.
    pub fn aliases(self) -> Vec<String> {
        let base: &[&str] = match self {
            Self::Dashed => &["dashed", "outline"],
            Self::Solid => &["solid", "filled"],
            Self::Outline => &["outline", "dashed"],
        };

        let mut out = Vec::with_capacity(base.len() * 2);
        out.extend(base.iter().map(|name| (*name).to_owned()));
        out.extend(base.iter().map(|name| capitalize(name)));
        out
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Solid => "solid",
            Self::Dashed => "dashed",
            Self::Outline => "outline",
        }
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// One worksheet to fetch. Built once per invocation and never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorksheetRequest {
    text: String,
    output: PathBuf,
    line_style: LineStyle,
    letter_style: LetterStyle,
    visible: bool,
}

impl WorksheetRequest {
    pub fn new(
        text: impl Into<String>,
        output: impl Into<PathBuf>,
        line_style: LineStyle,
        letter_style: LetterStyle,
        visible: bool,
    ) -> anyhow::Result<Self> {
        let text = text.into();
        if text.trim().is_empty() {
            anyhow::bail!("--text must not be empty");
        }

        let output = output.into();
        if output.as_os_str().is_empty() {
            anyhow::bail!("--output must not be empty");
        }
        if output.is_dir() {
            anyhow::bail!("--output is a directory: {}", output.display());
        }
        let parent = output_parent(&output);
        if !parent.is_dir() {
            anyhow::bail!(
                "output directory does not exist: {}",
                parent.display()
            );
        }

        Ok(Self {
            text,
            output,
            line_style,
            letter_style,
            visible,
        })
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn output(&self) -> &Path {
        &self.output
    }

    pub fn line_style(&self) -> LineStyle {
        self.line_style
    }

    pub fn letter_style(&self) -> LetterStyle {
        self.letter_style
    }

    pub fn visible(&self) -> bool {
        self.visible
    }
}

impl Default for WorksheetRequest {
    fn default() -> Self {
        Self {
            text: DEFAULT_TEXT.to_owned(),
            output: PathBuf::from(DEFAULT_OUTPUT),
            line_style: LineStyle::Dashed,
            letter_style: LetterStyle::Dashed,
            visible: false,
        }
    }
}

pub(crate) fn output_parent(output: &Path) -> &Path {
    match output.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guide_patterns_cover_every_line_style() {
        let cases = [
            (LineStyle::Solid, "1111"),
            (LineStyle::Dashed, "1010"),
            (LineStyle::Dotted, "0101"),
            (LineStyle::Minimal, "1000"),
            (LineStyle::None, "0000"),
        ];
        for (style, pattern) in cases {
            assert_eq!(style.guide_pattern(), pattern, "style={style:?}");
        }
    }

    #[test]
    fn letter_aliases_put_lowercase_before_capitalised() {
        assert_eq!(
            LetterStyle::Dashed.aliases(),
            vec!["dashed", "outline", "Dashed", "Outline"]
        );
        assert_eq!(
            LetterStyle::Solid.aliases(),
            vec!["solid", "filled", "Solid", "Filled"]
        );
        assert_eq!(LetterStyle::Outline.aliases()[0], "outline");
    }

    #[test]
    fn rejects_blank_text() {
        let err = WorksheetRequest::new(
            "   ",
            DEFAULT_OUTPUT,
            LineStyle::Dashed,
            LetterStyle::Dashed,
            false,
        )
        .unwrap_err();
        assert!(err.to_string().contains("--text"));
    }

    #[test]
    fn rejects_missing_output_directory() {
        let temp = tempfile::TempDir::new().unwrap();
        let output = temp.path().join("missing").join("sheet.pdf");
        let err = WorksheetRequest::new(
            "abc",
            output,
            LineStyle::Dashed,
            LetterStyle::Dashed,
            false,
        )
        .unwrap_err();
        assert!(err.to_string().contains("output directory does not exist"));
    }

    #[test]
    fn bare_file_name_resolves_to_current_directory() {
        assert_eq!(output_parent(Path::new("sheet.pdf")), Path::new("."));
        let request = WorksheetRequest::new(
            "abc",
            "sheet.pdf",
            LineStyle::Solid,
            LetterStyle::Outline,
            true,
        )
        .unwrap();
        assert_eq!(request.line_style(), LineStyle::Solid);
        assert_eq!(request.letter_style(), LetterStyle::Outline);
        assert!(request.visible());
    }
}
