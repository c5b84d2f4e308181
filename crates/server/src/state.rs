use std::sync::Arc;

use autosearch_core::{
    Config, QueryReformulator, SanitizedConfig, SearchOrchestrator, SimilarQueryBuilder,
};

/// Shared application state
pub struct AppState {
    config: Config,
    orchestrator: Arc<SearchOrchestrator>,
    reformulator: QueryReformulator,
    similar: SimilarQueryBuilder,
}

impl AppState {
    pub fn new(
        config: Config,
        orchestrator: Arc<SearchOrchestrator>,
        reformulator: QueryReformulator,
        similar: SimilarQueryBuilder,
    ) -> Self {
        Self {
            config,
            orchestrator,
            reformulator,
            similar,
        }
    }

    pub fn sanitized_config(&self) -> SanitizedConfig {
        SanitizedConfig::from(&self.config)
    }

    pub fn orchestrator(&self) -> Arc<SearchOrchestrator> {
        Arc::clone(&self.orchestrator)
    }

    pub fn reformulator(&self) -> &QueryReformulator {
        &self.reformulator
    }

    pub fn similar(&self) -> &SimilarQueryBuilder {
        &self.similar
    }
}
