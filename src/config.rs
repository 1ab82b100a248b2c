use std::{env::VarError, num::ParseIntError};

use crate::{
    database::DATABASE_URL,
    leaderboard::DEFAULT_LIMIT,
    time_of_day::{InvalidTimeValue, TimeOfDay},
};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Could not read environment variable {name}")]
    EnvVar {
        source: VarError,
        name: &'static str,
    },

    #[error("LEADERBOARD_LIMIT must be a non-negative integer, got {value:?}")]
    InvalidLimit {
        source: ParseIntError,
        value: String,
    },

    #[error("SYNC_GAME_TIME must look like HH:MM or HH:MM:SS")]
    InvalidGameTime(#[source] InvalidTimeValue),
}

/// Runtime configuration, read from the environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub database_url: String,
    pub leaderboard_limit: usize,
    /// Game time to synchronise the clock to on startup.
    pub sync_game_time: Option<TimeOfDay>,
}

impl Config {
    pub fn from_env() -> Result<Self, Error> {
        Self::from_lookup(|name| std::env::var(name))
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, Error>
    where
        F: Fn(&'static str) -> Result<String, VarError>,
    {
        let var = |name: &'static str| match lookup(name) {
            Ok(value) if value.trim().is_empty() => Ok(None),
            Ok(value) => Ok(Some(value)),
            Err(VarError::NotPresent) => Ok(None),
            Err(source) => Err(Error::EnvVar { source, name }),
        };

        let database_url = var("DATABASE_URL")?.unwrap_or_else(|| DATABASE_URL.to_string());

        let leaderboard_limit = match var("LEADERBOARD_LIMIT")? {
            Some(value) => value
                .trim()
                .parse()
                .map_err(|source| Error::InvalidLimit { source, value })?,
            None => DEFAULT_LIMIT,
        };

        let sync_game_time = var("SYNC_GAME_TIME")?
            .map(|value| value.parse())
            .transpose()
            .map_err(Error::InvalidGameTime)?;

        Ok(Self {
            database_url,
            leaderboard_limit,
            sync_game_time,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config(vars: &[(&'static str, &str)]) -> Result<Config, Error> {
        let vars: HashMap<_, _> = vars.iter().copied().collect();
        Config::from_lookup(|name| {
            vars.get(name)
                .map(|value| value.to_string())
                .ok_or(VarError::NotPresent)
        })
    }

    #[test]
    fn defaults() {
        assert_eq!(
            config(&[]).unwrap(),
            Config {
                database_url: DATABASE_URL.to_string(),
                leaderboard_limit: DEFAULT_LIMIT,
                sync_game_time: None,
            }
        );
    }

    #[test]
    fn reads_all_variables() {
        let config = config(&[
            ("DATABASE_URL", "sqlite::memory:"),
            ("LEADERBOARD_LIMIT", "10"),
            ("SYNC_GAME_TIME", "06:30"),
        ])
        .unwrap();

        assert_eq!(config.database_url, "sqlite::memory:");
        assert_eq!(config.leaderboard_limit, 10);
        assert_eq!(config.sync_game_time, Some(TimeOfDay::new(6, 30, 0).unwrap()));
    }

    #[test]
    fn blank_values_fall_back_to_defaults() {
        let config = config(&[("LEADERBOARD_LIMIT", " "), ("SYNC_GAME_TIME", "")]).unwrap();

        assert_eq!(config.leaderboard_limit, DEFAULT_LIMIT);
        assert_eq!(config.sync_game_time, None);
    }

    #[test]
    fn rejects_malformed_values() {
        assert!(matches!(
            config(&[("LEADERBOARD_LIMIT", "-3")]),
            Err(Error::InvalidLimit { .. })
        ));
        assert!(matches!(
            config(&[("SYNC_GAME_TIME", "25:00")]),
            Err(Error::InvalidGameTime(_))
        ));
    }
}
