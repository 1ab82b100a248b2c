use log::debug;
use serde::{de::DeserializeOwned, Serialize};
use sqlx::SqlitePool;

const OFFSET_KEY: &str = "game_clock.offset_seconds";

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Could not query preference {key}")]
    Query {
        key: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("Could not decode preference {key}")]
    Decode {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Could not encode preference {key}")]
    Encode {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Key-value store for client state, values kept as JSON.
#[derive(Debug, Clone)]
pub struct Preferences {
    pool: SqlitePool,
}

impl Preferences {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// The persisted game clock offset, zero when none was stored yet.
    pub async fn load_offset(&self) -> Result<i64, Error> {
        Ok(self.load_json(OFFSET_KEY).await?.unwrap_or(0))
    }

    pub async fn store_offset(&self, offset_seconds: i64) -> Result<(), Error> {
        self.store_json(OFFSET_KEY, &offset_seconds).await
    }

    pub async fn load_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, Error> {
        let value: Option<(String,)> = sqlx::query_as("SELECT value FROM preferences WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(|source| Error::Query {
                key: key.to_string(),
                source,
            })?;

        value
            .map(|(value,)| serde_json::from_str(&value))
            .transpose()
            .map_err(|source| Error::Decode {
                key: key.to_string(),
                source,
            })
    }

    pub async fn store_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<(), Error> {
        let value = serde_json::to_string(value).map_err(|source| Error::Encode {
            key: key.to_string(),
            source,
        })?;

        debug!("Storing preference {key}");
        sqlx::query(
            r#"
            INSERT INTO preferences (key, value) VALUES (?, ?)
            ON CONFLICT (key) DO UPDATE SET value = excluded.value
            "#,
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await
        .map_err(|source| Error::Query {
            key: key.to_string(),
            source,
        })?;

        Ok(())
    }
}
