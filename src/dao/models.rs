use std::{
    fmt,
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use serde::{Deserialize, Serialize};

/// Discriminator written with every score produced by the reaction-time protocol.
pub const REACTION_TIME_GAME_TYPE: &str = "reaction-time";

/// Opaque identifier assigned by the document store when a score is created.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScoreId(String);

impl ScoreId {
    /// Wrap an identifier handed back by a store.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the raw identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ScoreId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Score payload handed to a store before it has been assigned an identifier.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NewScoreEntity {
    /// Identifier of the authenticated user who produced the score.
    pub user_id: String,
    /// Display label captured at write time (never re-fetched later).
    pub label: String,
    /// Reaction time in milliseconds.
    pub score: i64,
    /// Measurement protocol that produced the score.
    pub game_type: String,
    /// Creation instant, used for display only.
    pub timestamp: SystemTime,
}

impl NewScoreEntity {
    /// Attach the identifier assigned by the store.
    pub fn with_id(self, id: ScoreId) -> ScoreEntity {
        ScoreEntity {
            id,
            user_id: self.user_id,
            label: self.label,
            score: self.score,
            game_type: self.game_type,
            timestamp: self.timestamp,
        }
    }
}

/// Persisted score record. Never mutated once written.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScoreEntity {
    /// Store-assigned identifier.
    pub id: ScoreId,
    /// Identifier of the user who produced the score.
    pub user_id: String,
    /// Display label captured at write time.
    pub label: String,
    /// Reaction time in milliseconds; ranking is ascending on this field.
    pub score: i64,
    /// Measurement protocol that produced the score.
    pub game_type: String,
    /// Creation instant.
    pub timestamp: SystemTime,
}

/// Current wall-clock time truncated to millisecond precision.
///
/// Every backend can store milliseconds losslessly, so saved timestamps read back unchanged.
pub fn timestamp_now() -> SystemTime {
    truncate_to_millis(SystemTime::now())
}

/// Drop sub-millisecond precision from a timestamp.
pub fn truncate_to_millis(time: SystemTime) -> SystemTime {
    match time.duration_since(UNIX_EPOCH) {
        Ok(elapsed) => UNIX_EPOCH + Duration::from_millis(elapsed.as_millis() as u64),
        Err(_) => time,
    }
}

/// Milliseconds since the Unix epoch, clamped at zero for pre-epoch instants.
pub fn epoch_millis(time: SystemTime) -> i64 {
    time.duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as i64)
        .unwrap_or(0)
}

/// Inverse of [`epoch_millis`].
pub fn from_epoch_millis(millis: i64) -> SystemTime {
    UNIX_EPOCH + Duration::from_millis(millis.max(0) as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncation_keeps_whole_milliseconds() {
        let time = UNIX_EPOCH + Duration::from_nanos(1_700_000_000_123_456_789);
        let truncated = truncate_to_millis(time);
        assert_eq!(epoch_millis(truncated), 1_700_000_000_123);
        assert_eq!(from_epoch_millis(epoch_millis(truncated)), truncated);
    }

    #[test]
    fn with_id_preserves_every_field() {
        let new = NewScoreEntity {
            user_id: "user-1".into(),
            label: "ada@example.com".into(),
            score: 245,
            game_type: REACTION_TIME_GAME_TYPE.into(),
            timestamp: timestamp_now(),
        };
        let saved = new.clone().with_id(ScoreId::new("abc"));
        assert_eq!(saved.id.as_str(), "abc");
        assert_eq!(saved.user_id, new.user_id);
        assert_eq!(saved.label, new.label);
        assert_eq!(saved.score, new.score);
        assert_eq!(saved.game_type, new.game_type);
        assert_eq!(saved.timestamp, new.timestamp);
    }
}
