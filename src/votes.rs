use chrono::NaiveDateTime;
use log::{debug, info};

use crate::repository::{CatchRepository, StoreError};

#[derive(Debug, thiserror::Error)]
pub enum VoteError {
    #[error("Bait name must not be blank")]
    EmptyBaitName,

    #[error("{voter_id} already voted for {bait:?} on fish {fish_id}")]
    DuplicateVote {
        voter_id: String,
        fish_id: i64,
        bait: String,
    },

    #[error("Could not store vote")]
    Store(#[from] StoreError),
}

/// Registers a community vote for the bait that works on a fish.
///
/// Surrounding whitespace is stripped from the bait name before it is stored.
pub async fn register_vote<R>(
    repository: &R,
    voter_id: &str,
    fish_id: i64,
    bait: &str,
    at: NaiveDateTime,
) -> Result<(), VoteError>
where
    R: CatchRepository + ?Sized,
{
    let bait = bait.trim();
    if bait.is_empty() {
        debug!("Rejecting blank bait vote from {voter_id}");
        return Err(VoteError::EmptyBaitName);
    }

    repository.cast_vote(fish_id, bait, voter_id, at).await?;

    info!("{voter_id} voted {bait} for fish {fish_id}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::repository::MemoryRepository;

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 6, 15)
            .unwrap()
            .and_hms_opt(8, 0, 0)
            .unwrap()
    }

    #[tokio::test]
    async fn duplicate_vote_is_rejected() {
        let repository = MemoryRepository::new();

        register_vote(&repository, "v1", 1, "worm", now())
            .await
            .unwrap();
        let err = register_vote(&repository, "v1", 1, "worm", now())
            .await
            .unwrap_err();

        assert!(matches!(err, VoteError::DuplicateVote { fish_id: 1, .. }));
        let votes = repository.fetch_votes(1).await.unwrap();
        assert_eq!(votes.len(), 1);
        assert_eq!(votes[0].count, 1);
    }

    #[tokio::test]
    async fn same_voter_may_vote_for_other_baits_and_fish() {
        let repository = MemoryRepository::new();

        register_vote(&repository, "v1", 1, "worm", now())
            .await
            .unwrap();
        register_vote(&repository, "v1", 1, "corn", now())
            .await
            .unwrap();
        register_vote(&repository, "v1", 2, "worm", now())
            .await
            .unwrap();
        register_vote(&repository, "v2", 1, "worm", now())
            .await
            .unwrap();

        let votes = repository.fetch_votes(1).await.unwrap();
        assert_eq!(votes[0].bait, "worm");
        assert_eq!(votes[0].count, 2);
        assert_eq!(votes[1].bait, "corn");
        assert_eq!(votes[1].count, 1);
        assert_eq!(repository.fetch_votes(2).await.unwrap()[0].count, 1);
    }

    #[tokio::test]
    async fn bait_name_is_trimmed() {
        let repository = MemoryRepository::new();

        register_vote(&repository, "v1", 1, "  worm ", now())
            .await
            .unwrap();
        let err = register_vote(&repository, "v1", 1, "worm", now())
            .await
            .unwrap_err();

        assert!(matches!(err, VoteError::DuplicateVote { .. }));
    }

    #[tokio::test]
    async fn blank_bait_is_rejected() {
        let repository = MemoryRepository::new();

        for bait in ["", "   ", "\t\n"] {
            let err = register_vote(&repository, "v1", 1, bait, now())
                .await
                .unwrap_err();
            assert!(matches!(err, VoteError::EmptyBaitName), "{bait:?}");
        }

        assert!(repository.fetch_votes(1).await.unwrap().is_empty());
    }

    #[test]
    fn describes_errors() {
        assert_eq!(
            VoteError::EmptyBaitName.to_string(),
            "Bait name must not be blank"
        );
        assert_eq!(
            VoteError::Store(StoreError::FetchVotes {
                fish_id: 3,
                source: sqlx::Error::PoolClosed,
            })
            .to_string(),
            "Could not store vote"
        );
        assert_eq!(
            StoreError::FetchVotes {
                fish_id: 3,
                source: sqlx::Error::PoolClosed,
            }
            .to_string(),
            "Could not fetch votes for fish 3"
        );
    }
}
