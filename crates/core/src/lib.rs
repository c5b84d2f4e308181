pub mod brain;
pub mod category;
pub mod config;
pub mod depth;
pub mod llm;
pub mod metrics;
pub mod orchestrator;
pub mod searcher;
pub mod testing;

pub use brain::{
    BrainError, KeywordClassifier, LlmClassifier, LlmJudge, QueryClassifier, QueryReformulator,
    RelevanceJudge, SimilarQueryBuilder,
};
pub use category::Category;
pub use config::{
    load_config, load_config_from_str, validate_config, Config, ConfigError, SanitizedConfig,
};
pub use depth::{DepthConfig, DepthExplorer};
pub use llm::{create_llm_client, LlmClient, LlmError};
pub use orchestrator::{
    ClassifierMode, EventSink, OrchestratorConfig, OrchestratorError, RunEvent, RunOutcome,
    SearchOrchestrator,
};
pub use searcher::{RetrievalAdapter, SearchResult, Searcher, SerperSearcher};
