pub mod api;
pub mod browser;
pub mod config;
pub mod error;
pub mod jobs;
pub mod scraper;
pub mod solver;
pub mod strategy;
pub mod submit;

use std::sync::Arc;

use tokio::sync::Semaphore;

use browser::PageRenderer;
use config::Config;
use error::{AppError, Result};
use jobs::JobRegistry;
use solver::QuizSolver;
use strategy::StrategyRegistry;

/// Upper bound on jobs kept for polling.
const JOB_CAPACITY: u64 = 10_000;

/// Application state that will be shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub solver: Arc<QuizSolver>,
    pub jobs: JobRegistry,
    /// One permit per browser session allowed to run at a time.
    pub sessions: Arc<Semaphore>,
}

impl AppState {
    pub fn new(
        config: Config,
        renderer: Arc<dyn PageRenderer>,
        strategies: StrategyRegistry,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(std::time::Duration::from_secs(10))
            .build()
            .map_err(|e| AppError::ConfigError(format!("Failed to build HTTP client: {}", e)))?;

        let solver = QuizSolver::new(renderer, client, strategies, config.submit_timeout);

        Ok(AppState {
            jobs: JobRegistry::new(JOB_CAPACITY, config.job_ttl),
            sessions: Arc::new(Semaphore::new(config.max_browser_sessions)),
            solver: Arc::new(solver),
            config: Arc::new(config),
        })
    }
}
