//! Community leaderboards ranked by catch count.
//!
//! All rankings are computed in memory over the records the store returns.
//! Labels are grouped in the order they first appear and sorted stably by
//! count, so equal counts keep that order. Labels are compared exactly;
//! differently cased names form separate entries.

use std::collections::{BTreeMap, HashMap};

use chrono::{Duration, NaiveDate, NaiveDateTime};
use log::debug;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::{
    game_clock::{start_of_current_game_day, TimeOfDay},
    models::{BaitVote, CatchRecord, RankedEntry, SpeciesBreakdown},
    repository::{CatchRepository, StoreError},
};

pub const DEFAULT_LIMIT: usize = 5;
pub const BREAKDOWN_BAIT_LIMIT: usize = 5;

pub const UNKNOWN_ANGLER: &str = "Unknown";
pub const UNKNOWN_LOCATION: &str = "N/A";
pub const UNKNOWN_SPECIES: &str = "?";

static EPOCH: Lazy<NaiveDateTime> = Lazy::new(|| {
    NaiveDate::from_ymd_opt(1970, 1, 1)
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .unwrap_or(NaiveDateTime::MIN)
});

fn angler_label(record: &CatchRecord) -> &str {
    record.angler_name.as_deref().unwrap_or(UNKNOWN_ANGLER)
}

fn location_label(record: &CatchRecord) -> &str {
    record.location.as_deref().unwrap_or(UNKNOWN_LOCATION)
}

fn species_label(record: &CatchRecord) -> &str {
    record.species.as_deref().unwrap_or(UNKNOWN_SPECIES)
}

fn within(
    records: &[CatchRecord],
    since: NaiveDateTime,
) -> impl Iterator<Item = &CatchRecord> + '_ {
    records
        .iter()
        .filter(move |record| record.caught_at >= since)
}

fn rank<'a>(labels: impl IntoIterator<Item = &'a str>, limit: usize) -> Vec<RankedEntry> {
    let mut positions: HashMap<&str, usize> = HashMap::new();
    let mut entries: Vec<RankedEntry> = Vec::new();

    for label in labels {
        if let Some(&position) = positions.get(label) {
            entries[position].count += 1;
        } else {
            positions.insert(label, entries.len());
            entries.push(RankedEntry::new(label, 1));
        }
    }

    // stable
    entries.sort_by(|a, b| b.count.cmp(&a.count));
    entries.truncate(limit);
    entries
}

pub fn top_anglers(
    records: &[CatchRecord],
    since: NaiveDateTime,
    limit: usize,
) -> Vec<RankedEntry> {
    rank(within(records, since).map(angler_label), limit)
}

pub fn top_locations(
    records: &[CatchRecord],
    since: NaiveDateTime,
    limit: usize,
) -> Vec<RankedEntry> {
    rank(within(records, since).map(location_label), limit)
}

pub fn top_species(
    records: &[CatchRecord],
    since: NaiveDateTime,
    limit: usize,
) -> Vec<RankedEntry> {
    rank(within(records, since).map(species_label), limit)
}

/// Most used baits among catches of `species`. Records without a bait, or
/// with a blank one, are ignored.
pub fn top_baits_for_species(
    records: &[CatchRecord],
    species: &str,
    since: NaiveDateTime,
    limit: usize,
) -> Vec<RankedEntry> {
    rank(
        within(records, since)
            .filter(|record| species_label(record) == species)
            .filter_map(CatchRecord::recorded_bait),
        limit,
    )
}

pub fn species_with_bait_breakdown(
    records: &[CatchRecord],
    since: NaiveDateTime,
) -> BTreeMap<String, SpeciesBreakdown> {
    let mut by_species: HashMap<&str, Vec<&CatchRecord>> = HashMap::new();
    for record in within(records, since) {
        by_species
            .entry(species_label(record))
            .or_default()
            .push(record);
    }

    by_species
        .into_iter()
        .map(|(species, records)| {
            let breakdown = SpeciesBreakdown {
                total: records.len(),
                top_baits: rank(
                    records.iter().filter_map(|record| record.recorded_bait()),
                    BREAKDOWN_BAIT_LIMIT,
                ),
            };
            (species.to_string(), breakdown)
        })
        .collect()
}

/// Baits voted for a fish, most votes first.
pub fn rank_votes(votes: &[BaitVote], limit: Option<usize>) -> Vec<RankedEntry> {
    let mut entries: Vec<RankedEntry> = votes
        .iter()
        .filter(|vote| vote.count > 0)
        .map(|vote| RankedEntry::new(vote.bait.clone(), vote.count as usize))
        .collect();

    entries.sort_by(|a, b| b.count.cmp(&a.count));
    if let Some(limit) = limit {
        entries.truncate(limit);
    }
    entries
}

/// Leaderboard tabs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Period {
    /// Since the most recent in-game midnight.
    Today,
    Week,
    Month,
    AllTime,
}

impl Period {
    pub fn since(&self, now: NaiveDateTime, current_game_time: TimeOfDay) -> NaiveDateTime {
        match self {
            Period::Today => start_of_current_game_day(current_game_time, now),
            Period::Week => now - Duration::days(7),
            Period::Month => now - Duration::days(30),
            Period::AllTime => *EPOCH,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub since: NaiveDateTime,
    pub anglers: Vec<RankedEntry>,
    pub locations: Vec<RankedEntry>,
    pub species: Vec<RankedEntry>,
}

/// Leaderboard queries against a record store.
#[derive(Debug, Clone)]
pub struct Leaderboard<R> {
    repository: R,
    limit: usize,
}

impl<R: CatchRepository> Leaderboard<R> {
    pub fn new(repository: R, limit: usize) -> Self {
        Self { repository, limit }
    }

    pub fn repository(&self) -> &R {
        &self.repository
    }

    async fn records(&self, since: NaiveDateTime) -> Result<Vec<CatchRecord>, StoreError> {
        debug!("Fetching catch records since {since}");
        let records = self.repository.fetch_records_since(since).await?;
        debug!("Aggregating {} catch records", records.len());
        Ok(records)
    }

    /// Anglers, locations and species ranked from a single fetch.
    pub async fn snapshot(&self, since: NaiveDateTime) -> Result<Snapshot, StoreError> {
        let records = self.records(since).await?;

        Ok(Snapshot {
            since,
            anglers: top_anglers(&records, since, self.limit),
            locations: top_locations(&records, since, self.limit),
            species: top_species(&records, since, self.limit),
        })
    }

    pub async fn top_baits_for_species(
        &self,
        species: &str,
        since: NaiveDateTime,
    ) -> Result<Vec<RankedEntry>, StoreError> {
        let records = self.records(since).await?;
        Ok(top_baits_for_species(&records, species, since, self.limit))
    }

    pub async fn species_breakdown(
        &self,
        since: NaiveDateTime,
    ) -> Result<BTreeMap<String, SpeciesBreakdown>, StoreError> {
        let records = self.records(since).await?;
        Ok(species_with_bait_breakdown(&records, since))
    }

    pub async fn community_baits(&self, fish_id: i64) -> Result<Vec<RankedEntry>, StoreError> {
        let votes = self.repository.fetch_votes(fish_id).await?;
        Ok(rank_votes(&votes, Some(self.limit)))
    }
}
