//! HTTP surface for iterative web search.
//!
//! Routes live under `/api`; `GET /api/auto-search` streams a run as
//! server-sent events. [`build_state`] wires the configured collaborators.

pub mod api;
pub mod metrics;
pub mod state;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::info;

use autosearch_core::{
    create_llm_client,
    brain::LlmJudgeConfig,
    depth::{HttpPageFetcher, HttpRenderer, LlmActionDetector, NoRenderer, PageRenderer},
    ClassifierMode, Config, DepthExplorer, KeywordClassifier, LlmClassifier, LlmClient, LlmJudge,
    QueryClassifier, QueryReformulator, RetrievalAdapter, SearchOrchestrator, Searcher,
    SerperSearcher, SimilarQueryBuilder,
};

use state::AppState;

/// Build the application state from configuration.
pub fn build_state(config: Config) -> Result<AppState> {
    let client = create_llm_client(&config.llm).context("Failed to create LLM client")?;
    info!(provider = client.provider(), model = client.model(), "LLM client ready");

    let searcher: Arc<dyn Searcher> =
        Arc::new(SerperSearcher::new(&config.search).context("Failed to create searcher")?);
    info!(backend = searcher.name(), "Searcher ready");

    let mut orchestrator = build_orchestrator(&config, searcher, Arc::clone(&client));

    if config.depth.enabled {
        let timeout = Duration::from_secs(config.depth.page_timeout_secs as u64);
        let fetcher = HttpPageFetcher::new(config.depth.pdf_proxy_url.clone(), timeout)
            .context("Failed to create page fetcher")?;
        let renderer: Arc<dyn PageRenderer> = match &config.depth.render_url {
            Some(url) => {
                info!(render_url = %url, "Screenshots enabled for depth exploration");
                Arc::new(HttpRenderer::new(url.clone(), timeout).context("Failed to create renderer")?)
            }
            None => Arc::new(NoRenderer),
        };
        let explorer = DepthExplorer::new(
            Arc::new(fetcher),
            renderer,
            Arc::new(LlmActionDetector::new(Arc::clone(&client))),
            Arc::clone(&client),
            config.depth.clone(),
        );
        orchestrator = orchestrator.with_depth(explorer);
        info!(categories = ?config.depth.categories, "Depth exploration enabled");
    } else {
        info!("Depth exploration disabled in config");
    }

    let reformulator =
        QueryReformulator::new(Arc::clone(&client)).with_max_tokens(config.llm.max_tokens);
    let similar = SimilarQueryBuilder::new(client);

    Ok(AppState::new(
        config,
        Arc::new(orchestrator),
        reformulator,
        similar,
    ))
}

/// Assemble an orchestrator over the given searcher and LLM client, without
/// depth exploration.
pub fn build_orchestrator(
    config: &Config,
    searcher: Arc<dyn Searcher>,
    client: Arc<dyn LlmClient>,
) -> SearchOrchestrator {
    let classifier: Arc<dyn QueryClassifier> = match config.orchestrator.classifier {
        ClassifierMode::Llm => Arc::new(LlmClassifier::new(Arc::clone(&client))),
        ClassifierMode::Keyword => Arc::new(KeywordClassifier::new()),
    };
    let judge = LlmJudge::with_config(
        client,
        LlmJudgeConfig {
            max_additional_queries: config.orchestrator.max_additional_queries,
            max_tokens: config.llm.max_tokens,
            ..Default::default()
        },
    );

    SearchOrchestrator::new(
        config.orchestrator.clone(),
        classifier,
        RetrievalAdapter::new(searcher, config.search.result_limit),
        Arc::new(judge),
    )
}
