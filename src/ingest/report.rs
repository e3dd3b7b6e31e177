use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::app::{NewsdeskError, Result};

/// What happened to one source during a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SourceOutcome {
    Ingested {
        entries: usize,
        upserted: usize,
        dropped: usize,
        persist_failed: usize,
    },
    FetchFailed { reason: String },
    ParseFailed { reason: String },
}

impl SourceOutcome {
    pub(crate) fn from_error(err: &NewsdeskError) -> Self {
        match err {
            NewsdeskError::ParseFailed { reason, .. } => Self::ParseFailed {
                reason: reason.clone(),
            },
            NewsdeskError::FetchFailed { reason, .. } => Self::FetchFailed {
                reason: reason.clone(),
            },
            other => Self::FetchFailed {
                reason: other.to_string(),
            },
        }
    }

    pub fn is_failure(&self) -> bool {
        !matches!(self, Self::Ingested { .. })
    }

    pub fn upserted(&self) -> usize {
        match self {
            Self::Ingested { upserted, .. } => *upserted,
            _ => 0,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SourceReport {
    pub label: String,
    pub category: String,
    #[serde(flatten)]
    pub outcome: SourceOutcome,
}

/// Totals of one completed run, sources in registry order.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub upserted: usize,
    pub sources: Vec<SourceReport>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl RunSummary {
    pub fn failed_sources(&self) -> usize {
        self.sources.iter().filter(|s| s.outcome.is_failure()).count()
    }

    pub fn dropped(&self) -> usize {
        self.sources
            .iter()
            .map(|s| match s.outcome {
                SourceOutcome::Ingested { dropped, .. } => dropped,
                _ => 0,
            })
            .sum()
    }

    pub fn persist_failed(&self) -> usize {
        self.sources
            .iter()
            .map(|s| match s.outcome {
                SourceOutcome::Ingested { persist_failed, .. } => persist_failed,
                _ => 0,
            })
            .sum()
    }
}

/// Response of the "run ingestion now" trigger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upserted: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed_sources: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RunReport {
    pub fn from_summary(summary: &RunSummary) -> Self {
        Self {
            success: true,
            upserted: Some(summary.upserted),
            failed_sources: Some(summary.failed_sources()),
            message: Some(format!(
                "{} records upserted from {} sources ({} failed)",
                summary.upserted,
                summary.sources.len(),
                summary.failed_sources()
            )),
            error: None,
        }
    }

    pub fn failure(err: &NewsdeskError) -> Self {
        Self {
            success: false,
            upserted: None,
            failed_sources: None,
            message: None,
            error: Some(err.to_string()),
        }
    }

    pub fn from_result(result: &Result<RunSummary>) -> Self {
        match result {
            Ok(summary) => Self::from_summary(summary),
            Err(e) => Self::failure(e),
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
