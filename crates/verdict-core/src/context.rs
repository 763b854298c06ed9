//! Per-run context handed to agents

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identity and progress of the run an agent is responding in
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunContext {
    pub run_id: Uuid,
    pub ticker: String,

    /// Turn being taken, starting at 1
    pub turn: usize,

    pub started_at: DateTime<Utc>,
}

impl RunContext {
    pub fn new(run_id: Uuid, ticker: impl Into<String>) -> Self {
        Self {
            run_id,
            ticker: ticker.into(),
            turn: 0,
            started_at: Utc::now(),
        }
    }

    /// Copy of this context positioned at `turn`
    pub fn at_turn(&self, turn: usize) -> Self {
        Self {
            turn,
            ..self.clone()
        }
    }
}
