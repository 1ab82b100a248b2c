//! Line commands fed to the running binary.
//!
//! ```text
//! catch <angler id> | <name> | <species> | <location> | <bait>
//! vote <voter id> <fish id> <bait>
//! sync <HH:MM[:SS]>
//! top [today|week|month|all]
//! ```
//!
//! Trailing catch fields may be left out and blank ones are stored as unknown.

use std::{num::ParseIntError, str::FromStr};

use log::{debug, trace};

use crate::{
    game_clock::{compute_game_time, Clock, GameClock},
    leaderboard::{Leaderboard, Period, Snapshot},
    models::CatchRecord,
    repository::{CatchRepository, StoreError},
    time_of_day::{InvalidTimeValue, TimeOfDay},
    votes::{register_vote, VoteError},
};

const CATCH_FIELDS: usize = 5;

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("Empty command")]
    Empty,

    #[error("Unknown command {0:?}")]
    Unknown(String),

    #[error("Missing {0}")]
    MissingArgument(&'static str),

    #[error("Too many catch fields, expected at most {CATCH_FIELDS}")]
    TooManyFields,

    #[error("Fish id must be an integer, got {value:?}")]
    InvalidFishId {
        source: ParseIntError,
        value: String,
    },

    #[error("Could not parse game time")]
    InvalidTime(#[source] InvalidTimeValue),

    #[error("Unknown leaderboard period {0:?}")]
    UnknownPeriod(String),
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Could not record catch")]
    Record(#[source] StoreError),

    #[error("Could not register vote")]
    Vote(#[from] VoteError),

    #[error("Could not query leaderboard")]
    Leaderboard(#[source] StoreError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Catch {
        angler_id: String,
        angler_name: Option<String>,
        species: Option<String>,
        location: Option<String>,
        bait: Option<String>,
    },
    Vote {
        voter_id: String,
        fish_id: i64,
        bait: String,
    },
    Sync(TimeOfDay),
    Top(Period),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Recorded,
    Voted,
    /// The clock now runs with `offset`. Persisting it is up to the caller.
    Synced {
        offset: i64,
    },
    Leaderboard {
        period: Period,
        snapshot: Snapshot,
    },
}

fn split_word(s: &str) -> (&str, &str) {
    let s = s.trim();
    s.split_once(char::is_whitespace)
        .map(|(word, rest)| (word, rest.trim_start()))
        .unwrap_or((s, ""))
}

fn parse_catch(args: &str) -> Result<Command, ParseError> {
    let fields: Vec<Option<String>> = args
        .split('|')
        .map(str::trim)
        .map(|field| (!field.is_empty()).then(|| field.to_string()))
        .collect();

    if fields.len() > CATCH_FIELDS {
        return Err(ParseError::TooManyFields);
    }

    let mut fields = fields.into_iter();
    let angler_id = fields
        .next()
        .flatten()
        .ok_or(ParseError::MissingArgument("angler id"))?;

    Ok(Command::Catch {
        angler_id,
        angler_name: fields.next().flatten(),
        species: fields.next().flatten(),
        location: fields.next().flatten(),
        bait: fields.next().flatten(),
    })
}

fn parse_vote(args: &str) -> Result<Command, ParseError> {
    let (voter_id, rest) = split_word(args);
    if voter_id.is_empty() {
        return Err(ParseError::MissingArgument("voter id"));
    }

    let (fish_id, bait) = split_word(rest);
    if fish_id.is_empty() {
        return Err(ParseError::MissingArgument("fish id"));
    }
    let fish_id = fish_id
        .parse()
        .map_err(|source| ParseError::InvalidFishId {
            source,
            value: fish_id.to_string(),
        })?;

    Ok(Command::Vote {
        voter_id: voter_id.to_string(),
        fish_id,
        bait: bait.to_string(),
    })
}

fn parse_period(args: &str) -> Result<Period, ParseError> {
    match args.trim() {
        "" | "today" => Ok(Period::Today),
        "week" => Ok(Period::Week),
        "month" => Ok(Period::Month),
        "all" => Ok(Period::AllTime),
        other => Err(ParseError::UnknownPeriod(other.to_string())),
    }
}

impl FromStr for Command {
    type Err = ParseError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let (name, args) = split_word(line);

        match name {
            "" => Err(ParseError::Empty),
            "catch" => parse_catch(args),
            "vote" => parse_vote(args),
            "sync" if args.is_empty() => Err(ParseError::MissingArgument("game time")),
            "sync" => args
                .parse()
                .map(Command::Sync)
                .map_err(ParseError::InvalidTime),
            "top" => parse_period(args).map(Command::Top),
            other => Err(ParseError::Unknown(other.to_string())),
        }
    }
}

impl Command {
    /// Runs the command against the store and the clock.
    ///
    /// Catches and votes are stamped with the clock's current wall time.
    pub async fn execute<R, C>(
        self,
        leaderboard: &Leaderboard<R>,
        clock: &GameClock<C>,
    ) -> Result<Reply, Error>
    where
        R: CatchRepository,
        C: Clock + 'static,
    {
        trace!("Executing {self:?}");
        let now = clock.now();

        match self {
            Command::Catch {
                angler_id,
                angler_name,
                species,
                location,
                bait,
            } => {
                let record = CatchRecord {
                    angler_id,
                    angler_name,
                    species,
                    location,
                    bait,
                    caught_at: now,
                };
                leaderboard
                    .repository()
                    .record_catch(&record)
                    .await
                    .map_err(Error::Record)?;
                debug!("Recorded catch of {}", record.angler_id);

                Ok(Reply::Recorded)
            }
            Command::Vote {
                voter_id,
                fish_id,
                bait,
            } => {
                register_vote(leaderboard.repository(), &voter_id, fish_id, &bait, now).await?;
                Ok(Reply::Voted)
            }
            Command::Sync(target) => Ok(Reply::Synced {
                offset: clock.adjust_to(target),
            }),
            Command::Top(period) => {
                let since = period.since(now, compute_game_time(now, clock.offset()));
                let snapshot = leaderboard
                    .snapshot(since)
                    .await
                    .map_err(Error::Leaderboard)?;

                Ok(Reply::Leaderboard { period, snapshot })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, NaiveDateTime};
    use test_case::test_case;

    use super::*;
    use crate::{models::RankedEntry, repository::MemoryRepository};

    struct Fixed(NaiveDateTime);

    impl Clock for Fixed {
        fn now(&self) -> NaiveDateTime {
            self.0
        }
    }

    fn at(hour: u32, minute: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 6, 15)
            .unwrap()
            .and_hms_opt(hour, minute, 0)
            .unwrap()
    }

    fn some(s: &str) -> Option<String> {
        Some(s.to_string())
    }

    fn setup() -> (Leaderboard<MemoryRepository>, GameClock<Fixed>) {
        (
            Leaderboard::new(MemoryRepository::new(), 5),
            GameClock::new(Fixed(at(10, 30)), 0),
        )
    }

    #[test]
    fn parses_full_catch() {
        let command: Command = "catch nemo | Nemo | Pike | Lake | Worm".parse().unwrap();
        assert_eq!(
            command,
            Command::Catch {
                angler_id: "nemo".to_string(),
                angler_name: some("Nemo"),
                species: some("Pike"),
                location: some("Lake"),
                bait: some("Worm"),
            }
        );
    }

    #[test]
    fn blank_and_missing_catch_fields_are_unknown() {
        let command: Command = "catch nemo |  | Ver de terre".parse().unwrap();
        assert_eq!(
            command,
            Command::Catch {
                angler_id: "nemo".to_string(),
                angler_name: None,
                species: some("Ver de terre"),
                location: None,
                bait: None,
            }
        );
    }

    #[test]
    fn parses_vote_with_spaced_bait() {
        let command: Command = "vote  v1   7 ver de terre".parse().unwrap();
        assert_eq!(
            command,
            Command::Vote {
                voter_id: "v1".to_string(),
                fish_id: 7,
                bait: "ver de terre".to_string(),
            }
        );
    }

    #[test_case("top", Period::Today ; "defaults to today")]
    #[test_case("top week", Period::Week ; "week")]
    #[test_case("top month", Period::Month ; "month")]
    #[test_case("top all", Period::AllTime ; "all time")]
    fn parses_top(line: &str, period: Period) {
        assert_eq!(line.parse::<Command>().unwrap(), Command::Top(period));
    }

    #[test]
    fn parses_sync() {
        let command: Command = "sync 06:30".parse().unwrap();
        assert_eq!(command, Command::Sync(TimeOfDay::new(6, 30, 0).unwrap()));
    }

    #[test]
    fn rejects_malformed_commands() {
        assert!(matches!("   ".parse::<Command>(), Err(ParseError::Empty)));
        assert!(matches!(
            "fish".parse::<Command>(),
            Err(ParseError::Unknown(name)) if name == "fish"
        ));
        assert!(matches!(
            "catch  | Nemo".parse::<Command>(),
            Err(ParseError::MissingArgument("angler id"))
        ));
        assert!(matches!(
            "catch a | b | c | d | e | f".parse::<Command>(),
            Err(ParseError::TooManyFields)
        ));
        assert!(matches!(
            "vote".parse::<Command>(),
            Err(ParseError::MissingArgument("voter id"))
        ));
        assert!(matches!(
            "vote v1".parse::<Command>(),
            Err(ParseError::MissingArgument("fish id"))
        ));
        assert!(matches!(
            "vote v1 pike worm".parse::<Command>(),
            Err(ParseError::InvalidFishId { value, .. }) if value == "pike"
        ));
        assert!(matches!(
            "sync".parse::<Command>(),
            Err(ParseError::MissingArgument("game time"))
        ));
        assert!(matches!(
            "sync 25:00".parse::<Command>(),
            Err(ParseError::InvalidTime(_))
        ));
        assert!(matches!(
            "top year".parse::<Command>(),
            Err(ParseError::UnknownPeriod(period)) if period == "year"
        ));
    }

    #[tokio::test]
    async fn recorded_catches_reach_the_leaderboard() {
        let (leaderboard, clock) = setup();

        for line in ["catch a | Alice | Pike", "catch b | Bob", "catch a | Alice"] {
            let reply = line
                .parse::<Command>()
                .unwrap()
                .execute(&leaderboard, &clock)
                .await
                .unwrap();
            assert_eq!(reply, Reply::Recorded);
        }

        let reply = Command::Top(Period::AllTime)
            .execute(&leaderboard, &clock)
            .await
            .unwrap();
        let Reply::Leaderboard { period, snapshot } = reply else {
            panic!("expected a leaderboard, got {reply:?}");
        };
        assert_eq!(period, Period::AllTime);
        assert_eq!(
            snapshot.anglers,
            vec![RankedEntry::new("Alice", 2), RankedEntry::new("Bob", 1)]
        );
        assert_eq!(
            snapshot.species,
            vec![RankedEntry::new("?", 2), RankedEntry::new("Pike", 1)]
        );

        let records = leaderboard
            .repository()
            .fetch_records_since(at(0, 0))
            .await
            .unwrap();
        assert!(records.iter().all(|record| record.caught_at == at(10, 30)));
    }

    #[tokio::test]
    async fn votes_are_counted_once() {
        let (leaderboard, clock) = setup();
        let vote = || "vote v1 7 worm".parse::<Command>().unwrap();

        assert_eq!(vote().execute(&leaderboard, &clock).await.unwrap(), Reply::Voted);
        let err = vote().execute(&leaderboard, &clock).await.unwrap_err();
        assert!(matches!(err, Error::Vote(VoteError::DuplicateVote { .. })));

        let err = "vote v2 7  "
            .parse::<Command>()
            .unwrap()
            .execute(&leaderboard, &clock)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Vote(VoteError::EmptyBaitName)));

        assert_eq!(
            leaderboard.community_baits(7).await.unwrap(),
            vec![RankedEntry::new("worm", 1)]
        );
    }

    #[tokio::test]
    async fn sync_adjusts_the_clock() {
        let (leaderboard, clock) = setup();

        let reply = Command::Sync(TimeOfDay::new(6, 0, 0).unwrap())
            .execute(&leaderboard, &clock)
            .await
            .unwrap();

        // the offset is measured from the unwrapped base of 10:30 real
        assert_eq!(
            reply,
            Reply::Synced {
                offset: 6 * 3_600 - 37_800 * 24
            }
        );
        assert_eq!(clock.current(), TimeOfDay::new(6, 0, 0).unwrap());
    }
}
