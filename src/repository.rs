use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use chrono::NaiveDateTime;
use log::trace;
use tokio::sync::RwLock;

use crate::{
    models::{BaitVote, CatchRecord},
    votes::VoteError,
};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Could not fetch catch records")]
    FetchRecords(#[source] sqlx::Error),

    #[error("Could not fetch votes for fish {fish_id}")]
    FetchVotes {
        fish_id: i64,
        #[source]
        source: sqlx::Error,
    },

    #[error("Could not record catch")]
    RecordCatch(#[source] sqlx::Error),

    #[error("Could not cast vote")]
    CastVote(#[source] sqlx::Error),
}

/// Storage of catch records and community bait votes.
#[async_trait]
pub trait CatchRepository: Send + Sync {
    /// Records caught at or after `since`, in no particular order.
    async fn fetch_records_since(
        &self,
        since: NaiveDateTime,
    ) -> Result<Vec<CatchRecord>, StoreError>;

    async fn record_catch(&self, record: &CatchRecord) -> Result<(), StoreError>;

    async fn fetch_votes(&self, fish_id: i64) -> Result<Vec<BaitVote>, StoreError>;

    /// Counts one vote of `voter_id` for `bait` on `fish_id`.
    ///
    /// Fails with [`VoteError::DuplicateVote`] when the voter already voted
    /// for this bait on this fish. A vote that fails records nothing.
    async fn cast_vote(
        &self,
        fish_id: i64,
        bait: &str,
        voter_id: &str,
        at: NaiveDateTime,
    ) -> Result<(), VoteError>;
}

#[async_trait]
impl<T: CatchRepository + ?Sized> CatchRepository for Arc<T> {
    async fn fetch_records_since(
        &self,
        since: NaiveDateTime,
    ) -> Result<Vec<CatchRecord>, StoreError> {
        (**self).fetch_records_since(since).await
    }

    async fn record_catch(&self, record: &CatchRecord) -> Result<(), StoreError> {
        (**self).record_catch(record).await
    }

    async fn fetch_votes(&self, fish_id: i64) -> Result<Vec<BaitVote>, StoreError> {
        (**self).fetch_votes(fish_id).await
    }

    async fn cast_vote(
        &self,
        fish_id: i64,
        bait: &str,
        voter_id: &str,
        at: NaiveDateTime,
    ) -> Result<(), VoteError> {
        (**self).cast_vote(fish_id, bait, voter_id, at).await
    }
}

#[derive(Debug, Default)]
pub struct MemoryRepository {
    records: RwLock<Vec<CatchRecord>>,
    votes: RwLock<HashMap<i64, Vec<BaitVote>>>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(records: Vec<CatchRecord>) -> Self {
        Self {
            records: RwLock::new(records),
            ..Default::default()
        }
    }
}

#[async_trait]
impl CatchRepository for MemoryRepository {
    async fn fetch_records_since(
        &self,
        since: NaiveDateTime,
    ) -> Result<Vec<CatchRecord>, StoreError> {
        Ok(self
            .records
            .read()
            .await
            .iter()
            .filter(|record| record.caught_at >= since)
            .cloned()
            .collect())
    }

    async fn record_catch(&self, record: &CatchRecord) -> Result<(), StoreError> {
        self.records.write().await.push(record.clone());
        Ok(())
    }

    async fn fetch_votes(&self, fish_id: i64) -> Result<Vec<BaitVote>, StoreError> {
        Ok(self
            .votes
            .read()
            .await
            .get(&fish_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn cast_vote(
        &self,
        fish_id: i64,
        bait: &str,
        voter_id: &str,
        at: NaiveDateTime,
    ) -> Result<(), VoteError> {
        let mut votes = self.votes.write().await;
        let fish_votes = votes.entry(fish_id).or_default();

        let vote = match fish_votes.iter_mut().position(|vote| vote.bait == bait) {
            Some(index) => &mut fish_votes[index],
            None => {
                fish_votes.push(BaitVote::new(bait));
                let last = fish_votes.len() - 1;
                &mut fish_votes[last]
            }
        };

        if !vote.register(voter_id, at) {
            return Err(VoteError::DuplicateVote {
                voter_id: voter_id.to_string(),
                fish_id,
                bait: bait.to_string(),
            });
        }

        trace!("{voter_id} voted for {bait} on fish {fish_id}");
        Ok(())
    }
}
