//! Answer strategies.
//!
//! A strategy turns an inspected [`QuizPage`] into the value submitted as
//! `answer`. Strategies are chosen by [`PageSignature`]; when nothing
//! matches, [`PlaceholderStrategy`] answers with [`PLACEHOLDER_ANSWER`].

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use url::Url;

use crate::scraper::QuizPage;

pub const PLACEHOLDER_ANSWER: &str = "REPLACE_WITH_COMPUTED_ANSWER";

#[derive(Debug, thiserror::Error)]
pub enum StrategyError {
    #[error("Task is missing field `{0}`")]
    MissingField(String),

    #[error("Failed to compute answer: {0}")]
    Compute(String),
}

/// What a strategy gets to look at when deciding whether it applies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageSignature {
    pub host: Option<String>,
    pub path: String,
    /// Sorted top-level keys of the parsed task, empty without one.
    pub task_keys: Vec<String>,
}

impl PageSignature {
    pub fn of(page: &QuizPage) -> Self {
        let parsed = Url::parse(&page.url).ok();
        let host = parsed.as_ref().and_then(|u| u.host_str()).map(str::to_string);
        let path = parsed
            .as_ref()
            .map(|u| u.path().to_string())
            .unwrap_or_default();

        let mut task_keys: Vec<String> = match &page.task {
            Some(Value::Object(map)) => map.keys().cloned().collect(),
            _ => Vec::new(),
        };
        task_keys.sort();

        PageSignature { host, path, task_keys }
    }

    pub fn has_task_key(&self, key: &str) -> bool {
        self.task_keys.iter().any(|k| k == key)
    }
}

#[async_trait]
pub trait AnswerStrategy: Send + Sync {
    fn name(&self) -> &str;

    fn matches(&self, signature: &PageSignature) -> bool;

    async fn answer(&self, page: &QuizPage) -> Result<Value, StrategyError>;
}

pub struct PlaceholderStrategy;

#[async_trait]
impl AnswerStrategy for PlaceholderStrategy {
    fn name(&self) -> &str {
        "placeholder"
    }

    fn matches(&self, _signature: &PageSignature) -> bool {
        true
    }

    async fn answer(&self, _page: &QuizPage) -> Result<Value, StrategyError> {
        Ok(Value::String(PLACEHOLDER_ANSWER.to_string()))
    }
}

/// Ordered strategies; the first match wins.
#[derive(Clone)]
pub struct StrategyRegistry {
    strategies: Vec<Arc<dyn AnswerStrategy>>,
    fallback: Arc<dyn AnswerStrategy>,
}

impl Default for StrategyRegistry {
    fn default() -> Self {
        StrategyRegistry {
            strategies: Vec::new(),
            fallback: Arc::new(PlaceholderStrategy),
        }
    }
}

impl StrategyRegistry {
    pub fn with(mut self, strategy: Arc<dyn AnswerStrategy>) -> Self {
        self.strategies.push(strategy);
        self
    }

    pub fn select(&self, signature: &PageSignature) -> Arc<dyn AnswerStrategy> {
        self.strategies
            .iter()
            .find(|s| s.matches(signature))
            .cloned()
            .unwrap_or_else(|| self.fallback.clone())
    }

    pub fn names(&self) -> Vec<&str> {
        self.strategies
            .iter()
            .map(|s| s.name())
            .chain(std::iter::once(self.fallback.name()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn page(url: &str, task: Option<Value>) -> QuizPage {
        QuizPage {
            url: url.to_string(),
            text: String::new(),
            task,
            form_action: None,
            submit_url: None,
        }
    }

    struct EchoQuestion;

    #[async_trait]
    impl AnswerStrategy for EchoQuestion {
        fn name(&self) -> &str {
            "echo-question"
        }

        fn matches(&self, signature: &PageSignature) -> bool {
            signature.has_task_key("question")
        }

        async fn answer(&self, page: &QuizPage) -> Result<Value, StrategyError> {
            page.task
                .as_ref()
                .and_then(|t| t.get("question"))
                .cloned()
                .ok_or_else(|| StrategyError::MissingField("question".into()))
        }
    }

    #[test]
    fn signature_collects_host_path_and_sorted_keys() {
        let sig = PageSignature::of(&page(
            "https://quiz.example.com/demo/1?x=2",
            Some(json!({"url": "a", "question": "b"})),
        ));
        assert_eq!(sig.host.as_deref(), Some("quiz.example.com"));
        assert_eq!(sig.path, "/demo/1");
        assert_eq!(sig.task_keys, vec!["question".to_string(), "url".to_string()]);
    }

    #[test]
    fn signature_of_unparsable_url_is_empty() {
        let sig = PageSignature::of(&page("not a url", Some(json!([1, 2]))));
        assert_eq!(sig.host, None);
        assert!(sig.path.is_empty());
        assert!(sig.task_keys.is_empty());
    }

    #[tokio::test]
    async fn default_registry_always_answers_placeholder() {
        let registry = StrategyRegistry::default();
        let quiz = page("https://example.com/quiz", Some(json!({"question": "2+2"})));

        let strategy = registry.select(&PageSignature::of(&quiz));
        assert_eq!(strategy.name(), "placeholder");
        assert_eq!(strategy.answer(&quiz).await.unwrap(), json!(PLACEHOLDER_ANSWER));
    }

    #[tokio::test]
    async fn matching_strategy_wins_over_fallback() {
        let registry = StrategyRegistry::default().with(Arc::new(EchoQuestion));
        assert_eq!(registry.names(), vec!["echo-question", "placeholder"]);

        let quiz = page("https://example.com/quiz", Some(json!({"question": "2+2"})));
        let strategy = registry.select(&PageSignature::of(&quiz));
        assert_eq!(strategy.name(), "echo-question");
        assert_eq!(strategy.answer(&quiz).await.unwrap(), json!("2+2"));

        let bare = page("https://example.com/quiz", None);
        assert_eq!(registry.select(&PageSignature::of(&bare)).name(), "placeholder");
    }
}
