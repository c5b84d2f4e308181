//! Types for the search orchestrator.

use serde::Serialize;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::brain::BrainError;
use crate::category::Category;
use crate::llm::LlmUsage;
use crate::searcher::SearchResult;

/// Errors that end a run.
#[derive(Debug, Clone, Error)]
pub enum OrchestratorError {
    /// The relevance judge failed; there is no safe default for relevance.
    #[error("relevance judgment failed: {0}")]
    Judgment(#[from] BrainError),

    /// The event receiver was dropped.
    #[error("run cancelled by caller")]
    Cancelled,

    #[error("query is empty")]
    EmptyQuery,

    #[error("invalid phase transition: {from} -> {to}")]
    InvalidTransition { from: RunPhase, to: RunPhase },
}

/// Phase of one orchestration run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunPhase {
    Classifying,
    InitialRetrieval,
    InitialJudging,
    Expanding,
    DepthProbing,
    Finalizing,
    Done,
    Errored,
    Cancelled,
}

impl RunPhase {
    /// Returns true if no further transitions are possible.
    pub fn is_terminal(self) -> bool {
        matches!(self, RunPhase::Done | RunPhase::Errored | RunPhase::Cancelled)
    }

    /// Legal edges of the run state machine.
    pub fn can_transition_to(self, next: RunPhase) -> bool {
        use RunPhase::*;

        if self.is_terminal() {
            return false;
        }
        if matches!(next, Errored | Cancelled) {
            return true;
        }
        matches!(
            (self, next),
            (Classifying, InitialRetrieval)
                | (InitialRetrieval, InitialJudging)
                | (InitialJudging, Expanding)
                | (InitialJudging, DepthProbing)
                | (InitialJudging, Finalizing)
                | (Expanding, DepthProbing)
                | (Expanding, Finalizing)
                | (DepthProbing, Expanding)
                | (DepthProbing, Finalizing)
                | (Finalizing, Done)
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RunPhase::Classifying => "classifying",
            RunPhase::InitialRetrieval => "initial_retrieval",
            RunPhase::InitialJudging => "initial_judging",
            RunPhase::Expanding => "expanding",
            RunPhase::DepthProbing => "depth_probing",
            RunPhase::Finalizing => "finalizing",
            RunPhase::Done => "done",
            RunPhase::Errored => "errored",
            RunPhase::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for RunPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Progress event streamed to the caller.
///
/// Serialized adjacently tagged so [`RunEvent::name`] and [`RunEvent::data`]
/// map directly onto SSE `event:` and `data:` lines.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum RunEvent {
    Category {
        category: Category,
        code: u8,
    },
    QueryIssued {
        round: usize,
        query: String,
    },
    ResultsReceived {
        round: usize,
        results: Vec<SearchResult>,
    },
    Evaluation {
        round: usize,
        reasoning: String,
    },
    AdditionalQueries {
        queries: Vec<String>,
        missing_information: Option<String>,
    },
    /// Only the entries that were new to the run's result set.
    RelevantSubsetSelected {
        round: usize,
        results: Vec<SearchResult>,
    },
    DepthQueries {
        link: String,
        queries: Vec<String>,
    },
    Done {
        results: Vec<SearchResult>,
        category: Category,
        rounds: usize,
        usage: LlmUsage,
    },
    Error {
        message: String,
    },
}

impl RunEvent {
    /// Event name as sent on the wire.
    pub fn name(&self) -> &'static str {
        match self {
            RunEvent::Category { .. } => "category",
            RunEvent::QueryIssued { .. } => "query-issued",
            RunEvent::ResultsReceived { .. } => "results-received",
            RunEvent::Evaluation { .. } => "evaluation",
            RunEvent::AdditionalQueries { .. } => "additional-queries",
            RunEvent::RelevantSubsetSelected { .. } => "relevant-subset-selected",
            RunEvent::DepthQueries { .. } => "depth-queries",
            RunEvent::Done { .. } => "done",
            RunEvent::Error { .. } => "error",
        }
    }

    /// JSON payload of the event.
    pub fn data(&self) -> serde_json::Value {
        match serde_json::to_value(self) {
            Ok(serde_json::Value::Object(mut map)) => {
                map.remove("data").unwrap_or(serde_json::Value::Null)
            }
            _ => serde_json::Value::Null,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, RunEvent::Done { .. } | RunEvent::Error { .. })
    }
}

/// Where a run sends its progress events.
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: Option<mpsc::Sender<RunEvent>>,
}

impl EventSink {
    pub fn new(tx: mpsc::Sender<RunEvent>) -> Self {
        Self { tx: Some(tx) }
    }

    /// A sink plus its receiving end.
    pub fn channel(buffer: usize) -> (Self, mpsc::Receiver<RunEvent>) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        (Self::new(tx), rx)
    }

    /// A sink that drops every event.
    pub fn discard() -> Self {
        Self { tx: None }
    }

    /// Send one event, waiting for buffer space.
    ///
    /// Fails with [`OrchestratorError::Cancelled`] once the receiver is gone.
    pub async fn emit(&self, event: RunEvent) -> Result<(), OrchestratorError> {
        match &self.tx {
            Some(tx) => tx
                .send(event)
                .await
                .map_err(|_| OrchestratorError::Cancelled),
            None => Ok(()),
        }
    }

    /// Resolves once the receiver is gone; never for a discarding sink.
    pub async fn closed(&self) {
        match &self.tx {
            Some(tx) => tx.closed().await,
            None => std::future::pending().await,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.tx.as_ref().map(|tx| tx.is_closed()).unwrap_or(false)
    }
}

/// Final state of a successful run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunOutcome {
    pub run_id: String,
    pub category: Category,
    /// Unique relevant results in the order they were accepted.
    pub results: Vec<SearchResult>,
    /// Retrieval rounds issued, the initial one included.
    pub rounds: usize,
    pub usage: LlmUsage,
}

impl RunOutcome {
    pub fn into_event(self) -> RunEvent {
        RunEvent::Done {
            results: self.results,
            category: self.category,
            rounds: self.rounds,
            usage: self.usage,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_happy_path() {
        use RunPhase::*;
        let path = [
            Classifying,
            InitialRetrieval,
            InitialJudging,
            Expanding,
            DepthProbing,
            Expanding,
            Finalizing,
            Done,
        ];
        for pair in path.windows(2) {
            assert!(pair[0].can_transition_to(pair[1]), "{} -> {}", pair[0], pair[1]);
        }
    }

    #[test]
    fn test_phase_illegal_edges() {
        use RunPhase::*;
        assert!(!Classifying.can_transition_to(Expanding));
        assert!(!InitialRetrieval.can_transition_to(Done));
        assert!(!Expanding.can_transition_to(InitialJudging));
        assert!(!Done.can_transition_to(Errored));
        assert!(!Errored.can_transition_to(Finalizing));
    }

    #[test]
    fn test_any_live_phase_can_fail() {
        use RunPhase::*;
        for phase in [Classifying, InitialRetrieval, Expanding, DepthProbing, Finalizing] {
            assert!(phase.can_transition_to(Errored));
            assert!(phase.can_transition_to(Cancelled));
        }
    }

    #[test]
    fn test_event_name_and_data() {
        let event = RunEvent::QueryIssued {
            round: 2,
            query: "alphafold accuracy".to_string(),
        };
        assert_eq!(event.name(), "query-issued");
        assert_eq!(
            event.data(),
            serde_json::json!({"round": 2, "query": "alphafold accuracy"})
        );

        let event = RunEvent::Category {
            category: Category::ResearchPaper,
            code: 0,
        };
        assert_eq!(event.name(), "category");
        assert_eq!(
            event.data(),
            serde_json::json!({"category": "research_paper", "code": 0})
        );
    }

    #[test]
    fn test_serialized_tag_matches_name() {
        let events = vec![
            RunEvent::AdditionalQueries {
                queries: vec![],
                missing_information: None,
            },
            RunEvent::RelevantSubsetSelected {
                round: 0,
                results: vec![],
            },
            RunEvent::Error {
                message: "boom".to_string(),
            },
        ];
        for event in events {
            let value = serde_json::to_value(&event).unwrap();
            assert_eq!(value["event"], event.name());
        }
    }

    #[tokio::test]
    async fn test_sink_reports_cancel_when_receiver_dropped() {
        let (sink, rx) = EventSink::channel(4);
        drop(rx);
        assert!(sink.is_closed());
        let result = sink
            .emit(RunEvent::Error {
                message: "x".to_string(),
            })
            .await;
        assert!(matches!(result, Err(OrchestratorError::Cancelled)));
    }

    #[tokio::test]
    async fn test_closed_resolves_when_receiver_dropped() {
        let (sink, rx) = EventSink::channel(4);
        let waiter = tokio::spawn(async move { sink.closed().await });
        drop(rx);
        tokio::time::timeout(std::time::Duration::from_secs(1), waiter)
            .await
            .expect("closed() did not resolve")
            .unwrap();
    }

    #[tokio::test]
    async fn test_discard_sink_never_closes() {
        let sink = EventSink::discard();
        let waited =
            tokio::time::timeout(std::time::Duration::from_millis(50), sink.closed()).await;
        assert!(waited.is_err());
    }

    #[tokio::test]
    async fn test_discard_sink_accepts_everything() {
        let sink = EventSink::discard();
        assert!(!sink.is_closed());
        sink.emit(RunEvent::Error {
            message: "x".to_string(),
        })
        .await
        .unwrap();
    }
}
