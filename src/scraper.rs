use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};
use serde_json::Value;
use url::Url;

/// Characters of page text kept in failure snapshots and raw submit responses.
pub const SNAPSHOT_LIMIT: usize = 2000;

// Create static selectors to avoid recompiling them each time
static PRE_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("pre").expect("Failed to parse pre selector"));

static FORM_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("form").expect("Failed to parse form selector"));

static SUBMIT_URL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"https?://[^\s'"<>]+/submit[^\s'"<>]*"#)
        .expect("Failed to compile submit url pattern")
});

/// Everything the solver learns from one rendered quiz page.
#[derive(Debug, Clone)]
pub struct QuizPage {
    pub url: String,
    pub text: String,
    pub task: Option<Value>,
    pub form_action: Option<String>,
    pub submit_url: Option<String>,
}

impl QuizPage {
    pub fn snapshot(&self) -> String {
        truncate_chars(&self.text, SNAPSHOT_LIMIT)
    }
}

/// Runs every heuristic over the rendered HTML of `page_url`.
pub fn inspect(page_url: &str, html: &str) -> QuizPage {
    let document = Html::parse_document(html);

    let text = page_text(&document, html);
    let form_action = first_form_action(&document);
    let task = find_task(&text);
    let submit_url = resolve_submit_target(page_url, form_action.as_deref(), &text);

    QuizPage {
        url: page_url.to_string(),
        text,
        task,
        form_action,
        submit_url,
    }
}

/// Text of every `<pre>` joined by newlines, or the whole document when
/// the page has none.
pub fn page_text(document: &Html, html: &str) -> String {
    let blocks: Vec<String> = document
        .select(&PRE_SELECTOR)
        .map(|element| element.text().collect::<String>())
        .collect();

    if blocks.is_empty() {
        html.to_string()
    } else {
        blocks.join("\n")
    }
}

fn first_form_action(document: &Html) -> Option<String> {
    document
        .select(&FORM_SELECTOR)
        .next()
        .and_then(|form| form.value().attr("action"))
        .map(|action| action.trim().to_string())
}

/// First `{...}` substring of `text` that parses as a JSON object.
pub fn find_task(text: &str) -> Option<Value> {
    text.match_indices('{').find_map(|(start, _)| {
        let mut values = serde_json::Deserializer::from_str(&text[start..]).into_iter::<Value>();
        match values.next() {
            Some(Ok(value @ Value::Object(_))) => Some(value),
            _ => None,
        }
    })
}

/// First absolute URL in `text` whose path contains a `/submit` segment.
pub fn find_submit_url(text: &str) -> Option<String> {
    SUBMIT_URL.find(text).map(|m| m.as_str().to_string())
}

/// Prefers a non-empty form action, resolved against the page URL, over
/// URLs mentioned in the text.
pub fn resolve_submit_target(
    page_url: &str,
    form_action: Option<&str>,
    text: &str,
) -> Option<String> {
    if let Some(action) = form_action.filter(|a| !a.is_empty()) {
        let resolved = Url::parse(page_url)
            .and_then(|base| base.join(action))
            .map(|u| u.to_string())
            .unwrap_or_else(|_| action.to_string());
        return Some(resolved);
    }

    find_submit_url(text)
}

pub fn truncate_chars(text: &str, limit: usize) -> String {
    text.chars().take(limit).collect()
}
