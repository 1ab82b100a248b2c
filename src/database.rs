use std::{collections::HashMap, str::FromStr};

use async_trait::async_trait;
use chrono::NaiveDateTime;
use log::{debug, trace};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions},
    SqlitePool,
};

use crate::{
    models::{BaitVote, CatchRecord},
    repository::{CatchRepository, StoreError},
    votes::VoteError,
};

pub const DATABASE_URL: &str = "sqlite://fishing-log.db";

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Could not connect to database")]
    Connect(#[source] sqlx::Error),

    #[error("Could not migrate database")]
    Migrate(#[source] sqlx::migrate::MigrateError),
}

pub async fn connect(url: &str) -> Result<SqlitePool, Error> {
    debug!("Opening database connection");

    let options = SqliteConnectOptions::from_str(url)
        .map_err(Error::Connect)?
        .journal_mode(SqliteJournalMode::Wal)
        .create_if_missing(true);

    SqlitePoolOptions::new()
        .connect_with(options)
        .await
        .map_err(Error::Connect)
}

pub async fn migrate(pool: &SqlitePool) -> Result<(), Error> {
    sqlx::migrate!().run(pool).await.map_err(Error::Migrate)
}

#[derive(Debug, Clone)]
pub struct SqliteRepository {
    pool: SqlitePool,
}

impl SqliteRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

fn duplicate_vote(fish_id: i64, bait: &str, voter_id: &str) -> VoteError {
    VoteError::DuplicateVote {
        voter_id: voter_id.to_string(),
        fish_id,
        bait: bait.to_string(),
    }
}

#[async_trait]
impl CatchRepository for SqliteRepository {
    async fn fetch_records_since(
        &self,
        since: NaiveDateTime,
    ) -> Result<Vec<CatchRecord>, StoreError> {
        sqlx::query_as::<_, CatchRecord>(
            r#"
            SELECT angler_id, angler_name, species, location, bait, caught_at
            FROM catches
            WHERE caught_at >= ?
            ORDER BY id
            "#,
        )
        .bind(since)
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::FetchRecords)
    }

    async fn record_catch(&self, record: &CatchRecord) -> Result<(), StoreError> {
        trace!("Recording catch of {:?}", record.angler_id);

        sqlx::query(
            r#"
            INSERT INTO catches (angler_id, angler_name, species, location, bait, caught_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&record.angler_id)
        .bind(&record.angler_name)
        .bind(&record.species)
        .bind(&record.location)
        .bind(&record.bait)
        .bind(record.caught_at)
        .execute(&self.pool)
        .await
        .map_err(StoreError::RecordCatch)?;

        Ok(())
    }

    async fn fetch_votes(&self, fish_id: i64) -> Result<Vec<BaitVote>, StoreError> {
        let votes_error = |source| StoreError::FetchVotes { fish_id, source };

        let counts: Vec<(String, i64, Option<NaiveDateTime>)> = sqlx::query_as(
            "SELECT bait, count, last_vote_at FROM bait_votes WHERE fish_id = ? ORDER BY rowid",
        )
        .bind(fish_id)
        .fetch_all(&self.pool)
        .await
        .map_err(votes_error)?;

        let voters: Vec<(String, String)> =
            sqlx::query_as("SELECT bait, voter_id FROM bait_voters WHERE fish_id = ?")
                .bind(fish_id)
                .fetch_all(&self.pool)
                .await
                .map_err(votes_error)?;

        let mut voters_by_bait: HashMap<String, Vec<String>> = HashMap::new();
        for (bait, voter_id) in voters {
            voters_by_bait.entry(bait).or_default().push(voter_id);
        }

        Ok(counts
            .into_iter()
            .map(|(bait, count, last_vote_at)| BaitVote {
                voters: voters_by_bait
                    .remove(&bait)
                    .unwrap_or_default()
                    .into_iter()
                    .collect(),
                bait,
                count,
                last_vote_at,
            })
            .collect())
    }

    async fn cast_vote(
        &self,
        fish_id: i64,
        bait: &str,
        voter_id: &str,
        at: NaiveDateTime,
    ) -> Result<(), VoteError> {
        let mut tx = self.pool.begin().await.map_err(StoreError::CastVote)?;

        // a racing vote by the same voter loses on the primary key
        let inserted = sqlx::query(
            "INSERT OR IGNORE INTO bait_voters (fish_id, bait, voter_id) VALUES (?, ?, ?)",
        )
        .bind(fish_id)
        .bind(bait)
        .bind(voter_id)
        .execute(&mut tx)
        .await
        .map_err(StoreError::CastVote)?
        .rows_affected();

        if inserted == 0 {
            return Err(duplicate_vote(fish_id, bait, voter_id));
        }

        sqlx::query(
            r#"
            INSERT INTO bait_votes (fish_id, bait, count, last_vote_at) VALUES (?, ?, 1, ?)
            ON CONFLICT (fish_id, bait)
            DO UPDATE SET count = count + 1, last_vote_at = excluded.last_vote_at
            "#,
        )
        .bind(fish_id)
        .bind(bait)
        .bind(at)
        .execute(&mut tx)
        .await
        .map_err(StoreError::CastVote)?;

        tx.commit().await.map_err(StoreError::CastVote)?;

        Ok(())
    }
}
