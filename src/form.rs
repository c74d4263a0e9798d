//! Drives the worksheet form: load, wait for the app, fill, style, submit.

use std::time::{Duration, Instant};

use fantoccini::elements::Element;
use fantoccini::{Client, Locator};

use crate::config::Timeouts;
use crate::error::GenerateError;
use crate::request::{LetterStyle, LineStyle};
use crate::selectors::{Selector, SelectorTable};

pub async fn open(client: &Client, url: &str, timeouts: &Timeouts) -> Result<(), GenerateError> {
    tracing::info!(url, "navigate to worksheet generator");
    client
        .goto(url)
        .await
        .map_err(|source| GenerateError::Navigation {
            url: url.to_owned(),
            source,
        })?;

    client
        .wait()
        .at_most(timeouts.page_load)
        .every(timeouts.poll_interval)
        .for_element(Locator::Css("body"))
        .await
        .map_err(|err| {
            tracing::debug!(%err, "wait for body");
            GenerateError::NotReady {
                what: "page body".to_owned(),
                timeout: timeouts.page_load,
            }
        })?;

    Ok(())
}

/// Polls the readiness script until it returns `true`.
pub async fn wait_for_app(
    client: &Client,
    readiness_script: &str,
    timeouts: &Timeouts,
) -> Result<(), GenerateError> {
    tracing::info!("wait for client-side app");
    let started = Instant::now();
    loop {
        match client.execute(readiness_script, Vec::new()).await {
            Ok(serde_json::Value::Bool(true)) => break,
            Ok(other) => tracing::trace!(?other, "app not ready"),
            Err(err) => tracing::debug!(%err, "readiness script failed"),
        }
        if started.elapsed() >= timeouts.app_ready {
            return Err(GenerateError::NotReady {
                what: "client-side app did not finish loading".to_owned(),
                timeout: timeouts.app_ready,
            });
        }
        tokio::time::sleep(timeouts.poll_interval).await;
    }

    tracing::debug!(elapsed_ms = started.elapsed().as_millis() as u64, "app ready");
    tokio::time::sleep(timeouts.settle).await;
    Ok(())
}

pub async fn fill_text(
    client: &Client,
    selectors: &SelectorTable,
    text: &str,
    timeouts: &Timeouts,
) -> Result<(), GenerateError> {
    let Some((input, selector)) = poll_first(
        client,
        &selectors.text_input,
        timeouts.form,
        timeouts.poll_interval,
    )
    .await
    else {
        return Err(GenerateError::FormNotFound("text input".to_owned()));
    };

    tracing::info!(%selector, chars = text.chars().count(), "enter practice text");
    input.clear().await?;
    input.send_keys(text).await?;
    Ok(())
}

/// Sets fixed-value `<select>` controls. Missing controls are skipped.
pub async fn apply_optional_selects(client: &Client, selectors: &SelectorTable) {
    for select in &selectors.optional_selects {
        let css = format!("select[name='{}']", select.name);
        let Ok(element) = client.find(Locator::Css(&css)).await else {
            tracing::debug!(name = %select.name, "optional select not present");
            continue;
        };
        match element.select_by_value(&select.value).await {
            Ok(()) => tracing::debug!(name = %select.name, value = %select.value, "set option"),
            Err(err) => tracing::debug!(name = %select.name, %err, "set option failed"),
        }
    }
}

/// Returns whether a guide-line control was found and set.
pub async fn set_guide_lines(client: &Client, selectors: &SelectorTable, style: LineStyle) -> bool {
    let pattern = style.guide_pattern();
    let vars = [("pattern", pattern), ("label", style.label())];

    for template in &selectors.guide_lines {
        let selector = template.fill(&vars);
        let Some(element) = first_displayed(client, &selector).await else {
            continue;
        };

        let applied = if is_select(&element).await {
            element.select_by_value(pattern).await.is_ok()
        } else {
            click(client, &element).await.is_ok()
        };
        if applied {
            tracing::info!(?style, pattern, %selector, "set guide lines");
            return true;
        }
    }

    tracing::warn!(?style, "guide line control not found; using site default");
    false
}

/// Opens the letters menu if there is one, picks the style, then confirms.
/// Returns whether a letter-style control was found and set.
pub async fn set_letter_style(
    client: &Client,
    selectors: &SelectorTable,
    style: LetterStyle,
    timeouts: &Timeouts,
) -> bool {
    let aliases = style.aliases();

    let menu_opened = open_letters_menu(client, selectors, timeouts.settle).await;
    let mut applied = false;
    if menu_opened {
        applied = click_first_alias(client, &selectors.letter_option, &aliases).await;
    }
    if !applied {
        applied = use_letter_control(client, &selectors.letter_control, &aliases).await;
    }

    if applied {
        tracing::info!(style = style.as_str(), "set letter style");
    } else {
        tracing::warn!(style = style.as_str(), "letter style control not found; using site default");
    }

    if menu_opened || applied {
        confirm(client, selectors, timeouts.settle).await;
    }
    applied
}

pub async fn click_create(
    client: &Client,
    selectors: &SelectorTable,
    timeouts: &Timeouts,
) -> Result<(), GenerateError> {
    let Some((button, selector)) = poll_first(
        client,
        &selectors.create_button,
        timeouts.create_button,
        timeouts.poll_interval,
    )
    .await
    else {
        return Err(GenerateError::FormNotFound(
            "create worksheet button".to_owned(),
        ));
    };

    tracing::info!(%selector, "click create worksheet");
    click(client, &button).await
}

async fn open_letters_menu(client: &Client, selectors: &SelectorTable, settle: Duration) -> bool {
    for selector in &selectors.letters_menu {
        for element in displayed(client, selector).await {
            if click(client, &element).await.is_err() {
                continue;
            }
            tokio::time::sleep(settle).await;
            if !displayed(client, &selectors.letters_menu_probe).await.is_empty() {
                tracing::debug!(%selector, "letters menu opened");
                return true;
            }
        }
    }
    false
}

async fn click_first_alias(client: &Client, templates: &[Selector], aliases: &[String]) -> bool {
    for alias in aliases {
        for template in templates {
            let selector = template.fill(&[("value", alias.as_str())]);
            if let Some(element) = first_displayed(client, &selector).await
                && click(client, &element).await.is_ok()
            {
                tracing::debug!(%selector, "picked letter option");
                return true;
            }
        }
    }
    false
}

async fn use_letter_control(client: &Client, templates: &[Selector], aliases: &[String]) -> bool {
    for template in templates {
        for alias in aliases {
            let selector = template.fill(&[("value", alias.as_str())]);
            let query = selector.query();
            let Ok(element) = client.find(query.locator()).await else {
                continue;
            };
            let applied = if is_select(&element).await {
                element.select_by_label(alias).await.is_ok()
            } else {
                click(client, &element).await.is_ok()
            };
            if applied {
                tracing::debug!(%selector, "set letter control");
                return true;
            }
        }
    }
    false
}

async fn confirm(client: &Client, selectors: &SelectorTable, settle: Duration) {
    for selector in &selectors.confirm_buttons {
        for button in displayed(client, selector).await {
            if !button.is_enabled().await.unwrap_or(false) {
                continue;
            }
            if click(client, &button).await.is_ok() {
                tracing::debug!(%selector, "clicked confirm button");
                tokio::time::sleep(settle).await;
                return;
            }
        }
    }
    tracing::debug!("no confirm button; changes may apply automatically");
}

/// Scrolls `element` into view and clicks it, falling back to a scripted
/// click when the native one is intercepted.
pub(crate) async fn click(client: &Client, element: &Element) -> Result<(), GenerateError> {
    let arg = serde_json::to_value(element).map_err(|err| {
        GenerateError::Environment(format!("serialize element reference: {err}"))
    })?;
    if let Err(err) = client
        .execute("arguments[0].scrollIntoView(true);", vec![arg.clone()])
        .await
    {
        tracing::debug!(%err, "scroll into view");
    }

    match element.click().await {
        Ok(()) => Ok(()),
        Err(err) => {
            tracing::debug!(%err, "native click failed; trying script click");
            client.execute("arguments[0].click();", vec![arg]).await?;
            Ok(())
        }
    }
}

async fn is_select(element: &Element) -> bool {
    element
        .tag_name()
        .await
        .map(|tag| tag.eq_ignore_ascii_case("select"))
        .unwrap_or(false)
}

pub(crate) async fn displayed(client: &Client, selector: &Selector) -> Vec<Element> {
    let query = selector.query();
    let Ok(elements) = client.find_all(query.locator()).await else {
        return Vec::new();
    };
    let mut out = Vec::new();
    for element in elements {
        if element.is_displayed().await.unwrap_or(false) {
            out.push(element);
        }
    }
    out
}

async fn first_displayed(client: &Client, selector: &Selector) -> Option<Element> {
    displayed(client, selector).await.into_iter().next()
}

/// Tries each candidate in order, round after round, until one matches a
/// displayed element or `timeout` elapses.
async fn poll_first<'a>(
    client: &Client,
    candidates: &'a [Selector],
    timeout: Duration,
    poll_interval: Duration,
) -> Option<(Element, &'a Selector)> {
    let started = Instant::now();
    loop {
        for selector in candidates {
            if let Some(element) = first_displayed(client, selector).await {
                return Some((element, selector));
            }
        }
        if started.elapsed() >= timeout {
            return None;
        }
        tokio::time::sleep(poll_interval).await;
    }
}
