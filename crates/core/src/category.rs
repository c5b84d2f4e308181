//! Query categories and the per-category data that drives a run.
//!
//! Everything that differs between categories lives in [`PROFILES`]: the
//! site-scope operators appended to search queries and the rubric text the
//! relevance judge is given. The orchestrator never branches on category
//! itself; it looks the profile up once after classification.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Closed classification of query intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    /// Academic papers, studies, preprints.
    ResearchPaper,
    /// Implementations, code samples, tutorials.
    TechnicalExample,
    /// Evidence for or against a claim: reputable reporting, official data.
    SupportiveEvidence,
    /// Everything else. Also the fallback when classification fails.
    #[default]
    General,
}

/// Credibility and relevance criteria handed to the judge.
#[derive(Debug, Clone, Copy)]
pub struct Rubric {
    /// What makes a source trustworthy for this category.
    pub credibility: &'static str,
    /// What makes a source answer the query for this category.
    pub relevance: &'static str,
}

/// Per-category data table entry.
#[derive(Debug, Clone, Copy)]
pub struct CategoryProfile {
    pub category: Category,
    /// Numeric code used by classifier output (0-3).
    pub code: u8,
    pub label: &'static str,
    /// Search-engine operators restricting results to suitable sources.
    pub site_scope: Option<&'static str>,
    pub rubric: Rubric,
}

pub const PROFILES: [CategoryProfile; 4] = [
    CategoryProfile {
        category: Category::ResearchPaper,
        code: 0,
        label: "research paper",
        site_scope: Some(
            "site:arxiv.org | site:nature.com | site:.org | site:.edu | site:.gov | inurl:doi",
        ),
        rubric: Rubric {
            credibility: "Peer-reviewed journals, preprint servers, university and government \
                          hosts, DOIs, named authors and citation counts signal credibility. \
                          Blogs summarising papers without linking them are weak.",
            relevance: "The paper must study the phenomenon the user asked about, not merely \
                        mention its keywords. Prefer primary research and systematic reviews \
                        over news coverage of research.",
        },
    },
    CategoryProfile {
        category: Category::TechnicalExample,
        code: 1,
        label: "technical example",
        site_scope: Some(
            "site:github.com | site:stackoverflow.com | site:medium.com | site:kaggle.com \
             | site:towardsdatascience.com | site:paperswithcode.com | site:huggingface.co",
        ),
        rubric: Rubric {
            credibility: "Working code, repositories with activity, official documentation, \
                          accepted answers and reproducible notebooks signal credibility. \
                          Listicles and SEO content farms are weak.",
            relevance: "The result must show an implementation or concrete example of the \
                        technique asked about, in a setting close to the user's.",
        },
    },
    CategoryProfile {
        category: Category::SupportiveEvidence,
        code: 3,
        label: "supportive evidence",
        site_scope: Some(
            "site:reuters.com | site:apnews.com | site:bbc.com | site:npr.org | site:.gov \
             | site:who.int",
        ),
        rubric: Rubric {
            credibility: "Established news agencies, official statistics, government and \
                          intergovernmental bodies signal credibility. Opinion pieces and \
                          partisan outlets are weak unless they cite primary data.",
            relevance: "The result must contain facts, figures or statements that bear \
                        directly on the claim in the query, for or against it.",
        },
    },
    CategoryProfile {
        category: Category::General,
        code: 2,
        label: "general",
        site_scope: None,
        rubric: Rubric {
            credibility: "Domain authority matters: official sites of the organisation in \
                          question, well-known reference works and established publications \
                          beat aggregators and forums.",
            relevance: "The result must directly answer the user's question or link to the \
                        document that does.",
        },
    },
];

impl Category {
    pub const ALL: [Category; 4] = [
        Category::ResearchPaper,
        Category::TechnicalExample,
        Category::SupportiveEvidence,
        Category::General,
    ];

    /// Data table entry for this category.
    pub fn profile(self) -> &'static CategoryProfile {
        PROFILES
            .iter()
            .find(|p| p.category == self)
            .unwrap_or(&PROFILES[3])
    }

    pub fn code(self) -> u8 {
        self.profile().code
    }

    pub fn label(self) -> &'static str {
        self.profile().label
    }

    pub fn site_scope(self) -> Option<&'static str> {
        self.profile().site_scope
    }

    pub fn rubric(self) -> &'static Rubric {
        &self.profile().rubric
    }

    pub fn from_code(code: u8) -> Option<Self> {
        PROFILES.iter().find(|p| p.code == code).map(|p| p.category)
    }

    /// Lenient parse of classifier output: a numeric code, a snake_case
    /// name, or a human label ("research paper", "other", ...).
    pub fn parse(raw: &str) -> Option<Self> {
        let cleaned = raw
            .trim()
            .trim_matches(|c: char| c == '"' || c == '\'' || c == '.')
            .to_lowercase()
            .replace(['_', '-'], " ");

        if let Ok(code) = cleaned.parse::<u8>() {
            return Self::from_code(code);
        }

        match cleaned.as_str() {
            "research paper" | "research" | "academic" => Some(Category::ResearchPaper),
            "technical example" | "technical" | "code" => Some(Category::TechnicalExample),
            "supportive evidence" | "evidence" | "argumentative" => {
                Some(Category::SupportiveEvidence)
            }
            "general" | "other" | "general search" => Some(Category::General),
            _ => None,
        }
    }

    /// Append this category's site scope to a query.
    ///
    /// Queries that already carry a `site:` operator are left alone so that
    /// LLM-authored follow-ups are not double scoped.
    pub fn scope_query(self, query: &str) -> String {
        let query = query.trim();
        match self.site_scope() {
            Some(scope) if !has_site_operator(query) => {
                format!("{} {}", query, scope)
            }
            _ => query.to_string(),
        }
    }
}

/// Whether a token of `query` starts with a `site:` or `-site:` operator.
fn has_site_operator(query: &str) -> bool {
    query.split_whitespace().any(|token| {
        let token = token.trim_start_matches(['(', '|']).to_lowercase();
        token.starts_with("site:") || token.starts_with("-site:")
    })
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
