//! Search orchestrator implementation.
//!
//! One run: classify → initial retrieval → first-pass judgment → follow-up
//! rounds (retrieve + second-pass judgment, fanned out) → optional depth
//! probing whose queries go through the same follow-up rounds → done.
//!
//! All mutable state lives in a [`RunContext`] created per run; the
//! orchestrator itself only holds collaborators and configuration, so
//! concurrent runs never see each other's results.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Instant;

use futures::stream::{self, StreamExt};
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::brain::{normalize_whitespace, token_set, QueryClassifier, RelevanceJudge};
use crate::category::Category;
use crate::depth::DepthExplorer;
use crate::llm::LlmUsage;
use crate::metrics;
use crate::searcher::{ResultSet, RetrievalAdapter, SearchResult};

use super::config::OrchestratorConfig;
use super::types::{EventSink, OrchestratorError, RunEvent, RunOutcome, RunPhase};

/// State owned by exactly one run and dropped when it ends.
struct RunContext {
    run_id: String,
    query: String,
    category: Category,
    phase: RunPhase,
    results: Mutex<ResultSet>,
    /// Rounds issued so far; round 0 is the initial retrieval.
    rounds: usize,
    /// Token sets of every query issued, for skipping reworded repeats.
    issued: Vec<BTreeSet<String>>,
    missing_information: Option<String>,
    usage: LlmUsage,
}

impl RunContext {
    fn new(query: String) -> Self {
        Self {
            run_id: Uuid::new_v4().to_string(),
            query,
            category: Category::General,
            phase: RunPhase::Classifying,
            results: Mutex::new(ResultSet::new()),
            rounds: 0,
            issued: Vec::new(),
            missing_information: None,
            usage: LlmUsage::default(),
        }
    }

    fn transition(&mut self, next: RunPhase) -> Result<(), OrchestratorError> {
        if !self.phase.can_transition_to(next) {
            return Err(OrchestratorError::InvalidTransition {
                from: self.phase,
                to: next,
            });
        }
        debug!(run_id = %self.run_id, from = %self.phase, to = %next, "Run phase changed");
        self.phase = next;
        Ok(())
    }

    /// Assign the next round number to `query` and remember it as issued.
    fn issue(&mut self, query: String) -> (usize, String) {
        let round = self.rounds;
        self.rounds += 1;
        self.issued.push(token_set(&query));
        (round, query)
    }

    fn was_issued(&self, query: &str) -> bool {
        self.issued.contains(&token_set(query))
    }

    /// Follow-up rounds still allowed under `cap`; round 0 is not counted.
    fn follow_up_budget(&self, cap: usize) -> usize {
        cap.saturating_sub(self.rounds.saturating_sub(1))
    }
}

/// Drives search runs over the configured collaborators.
pub struct SearchOrchestrator {
    config: OrchestratorConfig,
    classifier: Arc<dyn QueryClassifier>,
    retrieval: RetrievalAdapter,
    judge: Arc<dyn RelevanceJudge>,
    depth: Option<DepthExplorer>,
}

impl SearchOrchestrator {
    pub fn new(
        config: OrchestratorConfig,
        classifier: Arc<dyn QueryClassifier>,
        retrieval: RetrievalAdapter,
        judge: Arc<dyn RelevanceJudge>,
    ) -> Self {
        Self {
            config,
            classifier,
            retrieval,
            judge,
            depth: None,
        }
    }

    /// Enable depth probing with the given explorer.
    pub fn with_depth(mut self, explorer: DepthExplorer) -> Self {
        self.depth = Some(explorer);
        self
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Run in a background task and stream its events.
    ///
    /// The last event is `done` or `error`, after which the channel closes.
    /// Dropping the receiver cancels the run and drops its in-flight calls.
    pub fn run_streaming(self: Arc<Self>, query: String) -> mpsc::Receiver<RunEvent> {
        let (sink, rx) = EventSink::channel(self.config.event_buffer);

        tokio::spawn(async move {
            match self.run(&query, &sink).await {
                Ok(outcome) => {
                    let _ = sink.emit(outcome.into_event()).await;
                }
                Err(OrchestratorError::Cancelled) => {
                    debug!(query = %query, "Run abandoned by caller");
                }
                Err(e) => {
                    let _ = sink
                        .emit(RunEvent::Error {
                            message: e.to_string(),
                        })
                        .await;
                }
            }
        });

        rx
    }

    /// Run to completion, sending progress events to `events`.
    ///
    /// The terminal `done`/`error` event is left to the caller.
    pub async fn run(
        &self,
        query: &str,
        events: &EventSink,
    ) -> Result<RunOutcome, OrchestratorError> {
        let query = normalize_whitespace(query);
        if query.is_empty() {
            return Err(OrchestratorError::EmptyQuery);
        }

        let start = Instant::now();
        let mut ctx = RunContext::new(query);
        info!(run_id = %ctx.run_id, query = %ctx.query, "Starting search run");

        let result = tokio::select! {
            result = self.execute(&mut ctx, events) => result,
            _ = events.closed() => Err(OrchestratorError::Cancelled),
        };

        let label = match &result {
            Ok(()) => "done",
            Err(OrchestratorError::Cancelled) => "cancelled",
            Err(_) => "errored",
        };
        metrics::RUNS_TOTAL.with_label_values(&[label]).inc();
        metrics::RUN_DURATION
            .with_label_values(&[label])
            .observe(start.elapsed().as_secs_f64());

        match result {
            Ok(()) => {
                ctx.transition(RunPhase::Done)?;
                let results = ctx.results.into_inner().into_vec();
                metrics::ROUNDS_PER_RUN
                    .with_label_values(&[])
                    .observe(ctx.rounds as f64);
                metrics::RESULTS_PER_RUN
                    .with_label_values(&[])
                    .observe(results.len() as f64);
                info!(
                    run_id = %ctx.run_id,
                    category = %ctx.category,
                    rounds = ctx.rounds,
                    results = results.len(),
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "Search run complete"
                );
                Ok(RunOutcome {
                    run_id: ctx.run_id,
                    category: ctx.category,
                    results,
                    rounds: ctx.rounds,
                    usage: ctx.usage,
                })
            }
            Err(e) => {
                let terminal = match e {
                    OrchestratorError::Cancelled => RunPhase::Cancelled,
                    _ => RunPhase::Errored,
                };
                if ctx.phase.can_transition_to(terminal) {
                    ctx.phase = terminal;
                }
                warn!(
                    run_id = %ctx.run_id,
                    phase = %ctx.phase,
                    rounds = ctx.rounds,
                    error = %e,
                    "Search run ended early"
                );
                Err(e)
            }
        }
    }

    async fn execute(
        &self,
        ctx: &mut RunContext,
        events: &EventSink,
    ) -> Result<(), OrchestratorError> {
        let classification = self.classifier.classify(&ctx.query).await;
        ctx.category = classification.category;
        ctx.usage.add(classification.usage);
        info!(
            run_id = %ctx.run_id,
            category = %ctx.category,
            classifier = self.classifier.name(),
            fallback = classification.fallback,
            "Query classified"
        );
        events
            .emit(RunEvent::Category {
                category: ctx.category,
                code: ctx.category.code(),
            })
            .await?;

        ctx.transition(RunPhase::InitialRetrieval)?;
        let (round, query) = ctx.issue(ctx.query.clone());
        let batch = self.retrieve_round(ctx, round, &query, events).await?;

        ctx.transition(RunPhase::InitialJudging)?;
        let judgment = self
            .judge
            .first_pass(ctx.category, &ctx.query, &batch)
            .await?;
        ctx.usage.add(judgment.usage);
        if !judgment.reasoning.is_empty() {
            events
                .emit(RunEvent::Evaluation {
                    round,
                    reasoning: judgment.reasoning.clone(),
                })
                .await?;
        }
        self.merge(ctx, round, judgment.select(&batch), events)
            .await?;

        let mut follow_ups: Vec<String> = Vec::new();
        for query in judgment.additional_queries {
            if follow_ups.len() >= self.config.max_additional_queries {
                break;
            }
            if !ctx.was_issued(&query) && !follow_ups.iter().any(|q| token_set(q) == token_set(&query)) {
                follow_ups.push(query);
            }
        }
        ctx.missing_information = judgment.missing_information;
        events
            .emit(RunEvent::AdditionalQueries {
                queries: follow_ups.clone(),
                missing_information: ctx.missing_information.clone(),
            })
            .await?;

        if !follow_ups.is_empty() {
            ctx.transition(RunPhase::Expanding)?;
            self.expand(ctx, follow_ups, events).await?;
        }

        let budget = ctx.follow_up_budget(self.config.max_additional_queries);
        if let Some(explorer) = &self.depth {
            if budget == 0 {
                debug!(run_id = %ctx.run_id, "Follow-up budget spent, skipping depth probing");
            } else if explorer.config().applies_to(ctx.category) {
                let pages = ctx
                    .results
                    .lock()
                    .await
                    .top(explorer.config().max_pages)
                    .to_vec();
                if !pages.is_empty() {
                    ctx.transition(RunPhase::DepthProbing)?;
                    let depth_queries = self.probe(ctx, explorer, &pages, budget, events).await?;
                    if !depth_queries.is_empty() {
                        ctx.transition(RunPhase::Expanding)?;
                        self.expand(ctx, depth_queries, events).await?;
                    }
                }
            }
        }

        ctx.transition(RunPhase::Finalizing)
    }

    /// Run follow-up rounds concurrently; merges are serialized by the
    /// result-set lock.
    async fn expand(
        &self,
        ctx: &mut RunContext,
        queries: Vec<String>,
        events: &EventSink,
    ) -> Result<(), OrchestratorError> {
        let rounds: Vec<(usize, String)> = queries.into_iter().map(|q| ctx.issue(q)).collect();
        debug!(run_id = %ctx.run_id, rounds = rounds.len(), "Expanding with follow-up rounds");

        let shared: &RunContext = ctx;
        let mut pending = stream::iter(rounds)
            .map(|(round, query)| self.follow_up_round(shared, round, query, events))
            .buffer_unordered(self.config.max_concurrent_rounds.max(1));

        let mut usage = LlmUsage::default();
        while let Some(result) = pending.next().await {
            usage.add(result?);
        }
        drop(pending);

        ctx.usage.add(usage);
        Ok(())
    }

    /// Retrieve, judge against the known gap, and merge one follow-up round.
    async fn follow_up_round(
        &self,
        ctx: &RunContext,
        round: usize,
        query: String,
        events: &EventSink,
    ) -> Result<LlmUsage, OrchestratorError> {
        let batch = self.retrieve_round(ctx, round, &query, events).await?;

        let accumulated: Vec<SearchResult> = ctx.results.lock().await.iter().cloned().collect();
        let judgment = self
            .judge
            .second_pass(
                ctx.category,
                &ctx.query,
                &batch,
                ctx.missing_information.as_deref(),
                &accumulated,
            )
            .await?;

        if !judgment.reasoning.is_empty() {
            events
                .emit(RunEvent::Evaluation {
                    round,
                    reasoning: judgment.reasoning.clone(),
                })
                .await?;
        }
        self.merge(ctx, round, judgment.select(&batch), events)
            .await?;
        Ok(judgment.usage)
    }

    async fn retrieve_round(
        &self,
        ctx: &RunContext,
        round: usize,
        query: &str,
        events: &EventSink,
    ) -> Result<Vec<SearchResult>, OrchestratorError> {
        events
            .emit(RunEvent::QueryIssued {
                round,
                query: query.to_string(),
            })
            .await?;

        let batch = self.retrieval.retrieve(query, ctx.category).await;
        debug!(run_id = %ctx.run_id, round, query = %query, results = batch.len(), "Round retrieved");

        events
            .emit(RunEvent::ResultsReceived {
                round,
                results: batch.clone(),
            })
            .await?;
        Ok(batch)
    }

    /// Add the selected results to the run and report the new ones.
    ///
    /// The event is sent while the lock is held so subset events follow the
    /// order in which entries entered the set.
    async fn merge(
        &self,
        ctx: &RunContext,
        round: usize,
        selected: Vec<SearchResult>,
        events: &EventSink,
    ) -> Result<(), OrchestratorError> {
        let mut results = ctx.results.lock().await;
        let selected_count = selected.len();
        let added = results.add_unique(selected);
        debug!(
            run_id = %ctx.run_id,
            round,
            selected = selected_count,
            added = added.len(),
            total = results.len(),
            "Merged relevant results"
        );
        events
            .emit(RunEvent::RelevantSubsetSelected {
                round,
                results: added,
            })
            .await
    }

    /// Explore the top pages and collect at most `budget` new queries from them.
    async fn probe(
        &self,
        ctx: &mut RunContext,
        explorer: &DepthExplorer,
        pages: &[SearchResult],
        budget: usize,
        events: &EventSink,
    ) -> Result<Vec<String>, OrchestratorError> {
        let query = ctx.query.clone();
        let explorations =
            futures::future::join_all(pages.iter().map(|page| explorer.explore(page, &query)))
                .await;

        let limit = explorer.config().max_depth_queries.min(budget);
        let mut queries: Vec<String> = Vec::new();
        for exploration in explorations {
            ctx.usage.add(exploration.usage);
            let candidates = exploration.queries.into_vec();
            events
                .emit(RunEvent::DepthQueries {
                    link: exploration.link.clone(),
                    queries: candidates.clone(),
                })
                .await?;

            for candidate in candidates {
                let fresh = !ctx.was_issued(&candidate)
                    && !queries.iter().any(|q| token_set(q) == token_set(&candidate));
                if fresh && queries.len() < limit {
                    queries.push(candidate);
                }
            }
        }

        debug!(run_id = %ctx.run_id, pages = pages.len(), queries = queries.len(), "Depth probing complete");
        Ok(queries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::brain::{KeywordClassifier, LlmJudge};
    use crate::testing::{fixtures, MockLlmClient, MockSearcher};

    fn orchestrator(
        searcher: Arc<MockSearcher>,
        llm: Arc<MockLlmClient>,
    ) -> SearchOrchestrator {
        SearchOrchestrator::new(
            OrchestratorConfig::default(),
            Arc::new(KeywordClassifier::new()),
            RetrievalAdapter::new(searcher, 8),
            Arc::new(LlmJudge::new(llm)),
        )
    }

    async fn collect(mut rx: mpsc::Receiver<RunEvent>) -> Vec<RunEvent> {
        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn test_empty_query_rejected() {
        let orch = orchestrator(Arc::new(MockSearcher::new()), Arc::new(MockLlmClient::new()));
        let result = orch.run("   ", &EventSink::discard()).await;
        assert!(matches!(result, Err(OrchestratorError::EmptyQuery)));
    }

    #[tokio::test]
    async fn test_run_without_follow_ups() {
        let searcher = Arc::new(MockSearcher::new());
        searcher.set_results(fixtures::raw_hits(4)).await;
        let llm = Arc::new(MockLlmClient::new());
        llm.push_response(&fixtures::first_pass_json(&[0, 2], &[], None));

        let orch = orchestrator(searcher.clone(), llm);
        let outcome = orch.run("rust borrow checker", &EventSink::discard()).await.unwrap();

        assert_eq!(outcome.rounds, 1);
        assert_eq!(outcome.results.len(), 2);
        assert_eq!(outcome.category, Category::General);
        assert_eq!(searcher.recorded_searches().await.len(), 1);
    }

    #[tokio::test]
    async fn test_follow_up_rounds_are_numbered_and_merged() {
        let searcher = Arc::new(MockSearcher::new());
        searcher.set_results(fixtures::raw_hits(3)).await;
        let llm = Arc::new(MockLlmClient::new());
        llm.set_handler(|request| {
            if request.system.as_deref().unwrap_or("").contains("additional_queries") {
                fixtures::first_pass_json(&[0], &["first follow up", "second follow up"], Some("gap"))
            } else {
                fixtures::second_pass_json(&[0, 1])
            }
        });

        let orch = Arc::new(orchestrator(searcher.clone(), llm));
        let events = collect(orch.run_streaming("rust borrow checker".to_string())).await;

        let issued: Vec<usize> = events
            .iter()
            .filter_map(|e| match e {
                RunEvent::QueryIssued { round, .. } => Some(*round),
                _ => None,
            })
            .collect();
        let mut sorted = issued.clone();
        sorted.sort();
        assert_eq!(sorted, vec![0, 1, 2]);

        // Every round returns the same hits, so only positions 0 and 1 are unique.
        match events.last().unwrap() {
            RunEvent::Done { results, rounds, .. } => {
                assert_eq!(*rounds, 3);
                assert_eq!(results.len(), 2);
            }
            other => panic!("expected done, got {:?}", other),
        }
        assert_eq!(searcher.recorded_searches().await.len(), 3);
    }

    #[tokio::test]
    async fn test_judge_failure_emits_error() {
        let searcher = Arc::new(MockSearcher::new());
        searcher.set_results(fixtures::raw_hits(3)).await;
        let llm = Arc::new(MockLlmClient::new());
        llm.push_response("not json at all");

        let orch = Arc::new(orchestrator(searcher, llm));
        let events = collect(orch.run_streaming("rust borrow checker".to_string())).await;

        let last = events.last().unwrap();
        assert_eq!(last.name(), "error");
        assert!(!events.iter().any(|e| e.name() == "done"));
    }

    #[tokio::test]
    async fn test_subset_never_precedes_its_results() {
        let searcher = Arc::new(MockSearcher::new());
        searcher.set_results(fixtures::raw_hits(3)).await;
        let llm = Arc::new(MockLlmClient::new());
        llm.set_handler(|request| {
            if request.system.as_deref().unwrap_or("").contains("additional_queries") {
                fixtures::first_pass_json(&[1], &["a follow up", "another angle"], None)
            } else {
                fixtures::second_pass_json(&[2])
            }
        });

        let orch = Arc::new(orchestrator(searcher, llm));
        let events = collect(orch.run_streaming("rust borrow checker".to_string())).await;

        for (i, event) in events.iter().enumerate() {
            if let RunEvent::RelevantSubsetSelected { round, .. } = event {
                let received = events[..i].iter().any(|e| {
                    matches!(e, RunEvent::ResultsReceived { round: r, .. } if r == round)
                });
                assert!(received, "subset for round {} before its results", round);
            }
        }
    }

    #[test]
    fn test_context_issue_tracks_rounds() {
        let mut ctx = RunContext::new("protein folding".to_string());
        assert_eq!(ctx.issue("protein folding".to_string()).0, 0);
        assert_eq!(ctx.issue("alphafold accuracy".to_string()).0, 1);
        assert!(ctx.was_issued("Folding Protein"));
        assert!(!ctx.was_issued("protein folding benchmarks"));
        assert_eq!(ctx.rounds, 2);
    }

    #[test]
    fn test_follow_up_budget_counts_rounds_after_the_first() {
        let mut ctx = RunContext::new("protein folding".to_string());
        ctx.issue("protein folding".to_string());
        assert_eq!(ctx.follow_up_budget(3), 3);
        ctx.issue("alphafold accuracy".to_string());
        ctx.issue("casp results".to_string());
        assert_eq!(ctx.follow_up_budget(3), 1);
        ctx.issue("rosetta comparison".to_string());
        ctx.issue("one too many".to_string());
        assert_eq!(ctx.follow_up_budget(3), 0);
    }

    #[test]
    fn test_context_refuses_illegal_transition() {
        let mut ctx = RunContext::new("q".to_string());
        let err = ctx.transition(RunPhase::Finalizing).unwrap_err();
        assert!(matches!(err, OrchestratorError::InvalidTransition { .. }));
        assert_eq!(ctx.phase, RunPhase::Classifying);
    }
}
