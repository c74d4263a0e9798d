//! Every site-specific selector lives here so a layout change on the remote
//! page means editing a table, not control flow. Defaults are compiled in;
//! any subset can be replaced from YAML (`--selectors`).

use std::borrow::Cow;
use std::path::Path;

use anyhow::Context as _;
use fantoccini::Locator;
use serde::{Deserialize, Serialize};

/// One locator. In YAML it is a single-key map: `{css: ...}`, `{xpath: ...}`,
/// `{id: ...}` or `{name: ...}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "SelectorMap", into = "SelectorMap")]
pub enum Selector {
    Css(String),
    Xpath(String),
    Id(String),
    Name(String),
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct SelectorMap {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    css: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    xpath: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    name: Option<String>,
}

impl TryFrom<SelectorMap> for Selector {
    type Error = String;

    fn try_from(map: SelectorMap) -> Result<Self, Self::Error> {
        match map {
            SelectorMap {
                css: Some(raw),
                xpath: None,
                id: None,
                name: None,
            } => Ok(Self::Css(raw)),
            SelectorMap {
                css: None,
                xpath: Some(raw),
                id: None,
                name: None,
            } => Ok(Self::Xpath(raw)),
            SelectorMap {
                css: None,
                xpath: None,
                id: Some(raw),
                name: None,
            } => Ok(Self::Id(raw)),
            SelectorMap {
                css: None,
                xpath: None,
                id: None,
                name: Some(raw),
            } => Ok(Self::Name(raw)),
            _ => Err("selector needs exactly one of css, xpath, id, name".to_owned()),
        }
    }
}

impl From<Selector> for SelectorMap {
    fn from(selector: Selector) -> Self {
        match selector {
            Selector::Css(raw) => Self {
                css: Some(raw),
                ..Self::default()
            },
            Selector::Xpath(raw) => Self {
                xpath: Some(raw),
                ..Self::default()
            },
            Selector::Id(raw) => Self {
                id: Some(raw),
                ..Self::default()
            },
            Selector::Name(raw) => Self {
                name: Some(raw),
                ..Self::default()
            },
        }
    }
}

impl Selector {
    pub fn css(value: &str) -> Self {
        Self::Css(value.to_owned())
    }

    pub fn xpath(value: &str) -> Self {
        Self::Xpath(value.to_owned())
    }

    /// Substitutes `{key}` placeholders.
    pub fn fill(&self, vars: &[(&str, &str)]) -> Self {
        let fill = |raw: &str| {
            let mut out = raw.to_owned();
            for (key, value) in vars {
                out = out.replace(&format!("{{{key}}}"), value);
            }
            out
        };
        match self {
            Self::Css(raw) => Self::Css(fill(raw)),
            Self::Xpath(raw) => Self::Xpath(fill(raw)),
            Self::Id(raw) => Self::Id(fill(raw)),
            Self::Name(raw) => Self::Name(fill(raw)),
        }
    }

    pub fn query(&self) -> Query<'_> {
        match self {
            Self::Css(raw) => Query::Css(Cow::Borrowed(raw)),
            Self::Xpath(raw) => Query::XPath(raw),
            Self::Id(raw) => Query::Id(raw),
            Self::Name(raw) => Query::Css(Cow::Owned(format!("[name='{raw}']"))),
        }
    }
}

impl std::fmt::Display for Selector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Css(raw) => write!(f, "css:{raw}"),
            Self::Xpath(raw) => write!(f, "xpath:{raw}"),
            Self::Id(raw) => write!(f, "id:{raw}"),
            Self::Name(raw) => write!(f, "name:{raw}"),
        }
    }
}

/// A selector resolved to something WebDriver can locate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Query<'a> {
    Css(Cow<'a, str>),
    XPath(&'a str),
    Id(&'a str),
}

impl Query<'_> {
    pub fn locator(&self) -> Locator<'_> {
        match self {
            Self::Css(raw) => Locator::Css(raw),
            Self::XPath(raw) => Locator::XPath(raw),
            Self::Id(raw) => Locator::Id(raw),
        }
    }
}

/// A `<select>` set to a fixed value when the page has it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionalSelect {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SelectorTable {
    /// Script returning `true` once the page's client-side app has booted.
    pub readiness_script: String,
    pub text_input: Vec<Selector>,
    pub optional_selects: Vec<OptionalSelect>,
    /// Templates over `{pattern}` and `{label}`.
    pub guide_lines: Vec<Selector>,
    pub letters_menu: Vec<Selector>,
    pub letters_menu_probe: Selector,
    /// Templates over `{value}`, tried for each letter-style alias.
    pub letter_option: Vec<Selector>,
    pub letter_control: Vec<Selector>,
    pub confirm_buttons: Vec<Selector>,
    pub create_button: Vec<Selector>,
    pub download_buttons: Vec<Selector>,
}

impl SelectorTable {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("read selector table: {}", path.display()))?;
        serde_yaml::from_str(&raw)
            .with_context(|| format!("parse selector table: {}", path.display()))
    }
}

const READINESS_SCRIPT: &str = r#"
try {
  if (document.readyState !== 'complete') { return false; }
  if (typeof window.getAllAngularTestabilities === 'function') {
    const all = window.getAllAngularTestabilities();
    return all.length > 0 && all.every(function (t) { return t.isStable(); });
  }
  if (window.angular && typeof window.angular.element === 'function') {
    const injector = window.angular.element(document.body).injector();
    if (!injector) { return false; }
    return injector.get('$http').pendingRequests.length === 0;
  }
  return true;
} catch (e) {
  return false;
}
"#;

impl Default for SelectorTable {
    fn default() -> Self {
        Self {
            readiness_script: READINESS_SCRIPT.trim().to_owned(),
            text_input: vec![
                Selector::css("textarea"),
                Selector::Name("text".to_owned()),
                Selector::Id("text".to_owned()),
                Selector::css("input[type='text']"),
                Selector::css(".form-control"),
            ],
            optional_selects: vec![
                OptionalSelect {
                    name: "lineHeight".to_owned(),
                    value: "0.5".to_owned(),
                },
                OptionalSelect {
                    name: "paperSize".to_owned(),
                    value: "letter".to_owned(),
                },
            ],
            guide_lines: vec![
                Selector::xpath("//input[@type='radio' and @value='{pattern}']"),
                Selector::xpath("//img[contains(@src, 'guides') and contains(@src, '{pattern}')]/.."),
                Selector::Name("guides".to_owned()),
                Selector::Id("guides".to_owned()),
                Selector::css("input[value='{pattern}']"),
                Selector::xpath("//label[contains(text(), '{label}')]"),
            ],
            letters_menu: vec![
                Selector::xpath(
                    "//*[contains(text(), 'Letters:') or contains(text(), 'Letter Appearance') or contains(text(), 'Letter Style')]",
                ),
                Selector::xpath("//div[contains(@class, 'letter') or contains(@id, 'letter')]"),
                Selector::xpath(
                    "//img[contains(@src, 'appearance') or contains(@src, 'letter') or contains(@alt, 'letter')]",
                ),
                Selector::xpath(
                    "//button[contains(text(), 'Letter') or contains(text(), 'Font')] | //a[contains(text(), 'Letter') or contains(text(), 'Font')]",
                ),
                Selector::xpath("//*[contains(@class, 'appearance') or contains(@id, 'appearance')]"),
            ],
            letters_menu_probe: Selector::xpath(
                "//input[@type='radio' and (contains(@value, 'dashed') or contains(@value, 'outline') or contains(@value, 'solid'))] | //*[contains(text(), 'Dashed') or contains(text(), 'Outline') or contains(text(), 'Solid')]",
            ),
            letter_option: vec![
                Selector::xpath("//input[@type='radio' and contains(@value, '{value}')]"),
                Selector::xpath(
                    "//*[contains(text(), '{value}') and (self::label or self::span or self::div or self::button)]",
                ),
            ],
            letter_control: vec![
                Selector::Name("letterStyle".to_owned()),
                Selector::Name("letters".to_owned()),
                Selector::Id("letterStyle".to_owned()),
                Selector::Id("letters".to_owned()),
                Selector::css("input[value*='{value}']"),
            ],
            confirm_buttons: vec![
                Selector::xpath("//button[contains(text(), 'OK') or contains(text(), 'ok')]"),
                Selector::xpath(
                    "//input[(@type='button' or @type='submit') and (contains(@value, 'OK') or contains(@value, 'ok'))]",
                ),
                Selector::xpath("//button[contains(text(), 'Apply') or contains(text(), 'apply')]"),
                Selector::xpath("//button[contains(text(), 'Done') or contains(text(), 'done')]"),
                Selector::xpath("//button[contains(text(), 'Save') or contains(text(), 'save')]"),
                Selector::xpath("//button[contains(text(), 'Accept') or contains(text(), 'Confirm')]"),
            ],
            create_button: vec![
                Selector::xpath("//button[contains(text(), 'Create Worksheet')]"),
                Selector::xpath("//input[@value='Create Worksheet']"),
                Selector::css("button[type='submit']"),
                Selector::css(".btn-primary"),
                Selector::xpath("//button[contains(@class, 'btn') and contains(text(), 'Create')]"),
            ],
            download_buttons: vec![Selector::xpath(
                "//button[contains(text(), 'Download')] | //a[contains(text(), 'Download')] | //button[contains(text(), 'Save')] | //a[contains(text(), 'Save')]",
            )],
        }
    }
}
