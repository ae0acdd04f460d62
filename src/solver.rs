//! One attempt at a quiz: render, inspect, answer, submit.
//!
//! Failures never escape as errors. Every path ends in a [`SolveOutcome`]
//! that callers report inside a successful HTTP response.

use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use tokio::time::Instant;
use tracing::{info, instrument, warn};

use crate::api::models::QuizRequest;
use crate::browser::{PageRenderer, RenderError};
use crate::scraper;
use crate::strategy::{PageSignature, StrategyRegistry};
use crate::submit::{self, AnswerPayload};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    SubmitUrlNotFound,
    /// The page did not finish loading within the navigation timeout.
    #[serde(rename = "playwright_timeout")]
    NavigationTimeout,
    DeadlineExceeded,
    AnswerFailed,
    Exception,
}

#[derive(Debug, Clone, Serialize)]
pub struct SolveOutcome {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<FailureReason>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_snapshot: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub submit_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strategy: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub submit_response: Option<Value>,
}

impl SolveOutcome {
    pub fn submitted(submit_url: String, strategy: &str, response: Value) -> Self {
        SolveOutcome {
            ok: true,
            reason: None,
            detail: None,
            page_snapshot: None,
            submit_url: Some(submit_url),
            strategy: Some(strategy.to_string()),
            submit_response: Some(response),
        }
    }

    pub fn failed(reason: FailureReason, detail: impl Into<String>) -> Self {
        SolveOutcome {
            ok: false,
            reason: Some(reason),
            detail: Some(detail.into()),
            page_snapshot: None,
            submit_url: None,
            strategy: None,
            submit_response: None,
        }
    }

    fn not_found(page_snapshot: String) -> Self {
        SolveOutcome {
            detail: None,
            page_snapshot: Some(page_snapshot),
            ..SolveOutcome::failed(FailureReason::SubmitUrlNotFound, "")
        }
    }
}

impl From<RenderError> for SolveOutcome {
    fn from(err: RenderError) -> Self {
        let reason = match &err {
            RenderError::NavigationTimeout(_) => FailureReason::NavigationTimeout,
            RenderError::DeadlineExceeded(_) => FailureReason::DeadlineExceeded,
            RenderError::Launch(_) | RenderError::Browser(_) => FailureReason::Exception,
        };
        SolveOutcome::failed(reason, err.to_string())
    }
}

pub struct QuizSolver {
    renderer: Arc<dyn PageRenderer>,
    client: Client,
    strategies: StrategyRegistry,
    submit_timeout: Duration,
}

impl QuizSolver {
    pub fn new(
        renderer: Arc<dyn PageRenderer>,
        client: Client,
        strategies: StrategyRegistry,
        submit_timeout: Duration,
    ) -> Self {
        QuizSolver {
            renderer,
            client,
            strategies,
            submit_timeout,
        }
    }

    #[instrument(skip_all, fields(url = %req.url))]
    pub async fn solve(&self, req: &QuizRequest, deadline: Instant) -> SolveOutcome {
        let rendered = match self.renderer.render(&req.url, deadline).await {
            Ok(rendered) => rendered,
            Err(e) => {
                warn!(error = %e, "rendering failed");
                return e.into();
            }
        };

        let page = scraper::inspect(&rendered.url, &rendered.html);

        let Some(submit_url) = page.submit_url.clone() else {
            info!("no submission target on page");
            return SolveOutcome::not_found(page.snapshot());
        };

        let strategy = self.strategies.select(&PageSignature::of(&page));
        info!(
            %submit_url,
            strategy = strategy.name(),
            has_task = page.task.is_some(),
            "answering quiz"
        );

        let answer = match tokio::time::timeout_at(deadline, strategy.answer(&page)).await {
            Ok(Ok(answer)) => answer,
            Ok(Err(e)) => {
                warn!(error = %e, "strategy failed");
                return SolveOutcome::failed(FailureReason::AnswerFailed, e.to_string());
            }
            Err(_) => {
                return SolveOutcome::failed(
                    FailureReason::DeadlineExceeded,
                    format!("Deadline exceeded while computing answer for {}", req.url),
                );
            }
        };

        let payload = AnswerPayload {
            email: req.email.clone(),
            secret: req.secret.clone(),
            url: req.url.clone(),
            answer,
        };

        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return SolveOutcome::failed(
                FailureReason::DeadlineExceeded,
                format!("Deadline exceeded before submitting to {}", submit_url),
            );
        }

        let timeout = remaining.min(self.submit_timeout);
        match submit::post_answer(&self.client, &submit_url, &payload, timeout).await {
            Ok(response) => {
                info!(%submit_url, "answer submitted");
                SolveOutcome::submitted(submit_url, strategy.name(), response)
            }
            Err(e) => {
                warn!(%submit_url, error = %e, "submission failed");
                SolveOutcome::failed(FailureReason::Exception, e.to_string())
            }
        }
    }
}
