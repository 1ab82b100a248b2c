use std::collections::BTreeSet;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// A logged catch as delivered by the record store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct CatchRecord {
    pub angler_id: String,
    pub angler_name: Option<String>,
    pub species: Option<String>,
    pub location: Option<String>,
    pub bait: Option<String>,
    pub caught_at: NaiveDateTime,
}

impl CatchRecord {
    /// Bait label, unless it is missing or blank.
    pub fn recorded_bait(&self) -> Option<&str> {
        self.bait.as_deref().filter(|bait| !bait.trim().is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankedEntry {
    pub label: String,
    pub count: usize,
}

impl RankedEntry {
    pub fn new(label: impl Into<String>, count: usize) -> Self {
        Self {
            label: label.into(),
            count,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpeciesBreakdown {
    pub total: usize,
    pub top_baits: Vec<RankedEntry>,
}

/// Community votes for one bait on one fish.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BaitVote {
    pub bait: String,
    pub count: i64,
    pub voters: BTreeSet<String>,
    pub last_vote_at: Option<NaiveDateTime>,
}

impl BaitVote {
    pub fn new(bait: impl Into<String>) -> Self {
        Self {
            bait: bait.into(),
            ..Default::default()
        }
    }

    pub fn has_voted(&self, voter_id: &str) -> bool {
        self.voters.contains(voter_id)
    }

    /// Counts a vote unless `voter_id` already voted. Returns whether it counted.
    pub fn register(&mut self, voter_id: &str, at: NaiveDateTime) -> bool {
        if !self.voters.insert(voter_id.to_string()) {
            return false;
        }

        self.count += 1;
        self.last_vote_at = Some(at);
        true
    }
}
