use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::dao::models::ScoreEntity;
use crate::dto::format_system_time;

/// Qualitative bucket for a reaction time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Rating {
    /// Under 200 ms.
    Excellent,
    /// 200 to 299 ms.
    Good,
    /// 300 to 399 ms.
    Average,
    /// 400 ms and above.
    Slow,
}

impl Rating {
    /// Classify a reaction time in milliseconds.
    pub fn of(reaction_ms: u64) -> Self {
        match reaction_ms {
            0..200 => Rating::Excellent,
            200..300 => Rating::Good,
            300..400 => Rating::Average,
            _ => Rating::Slow,
        }
    }
}

/// A persisted score as returned to clients.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ScoreSummary {
    pub id: String,
    pub user_id: String,
    pub label: String,
    /// Reaction time in milliseconds.
    pub score: i64,
    pub game_type: String,
    /// RFC 3339, millisecond precision.
    pub timestamp: String,
    pub rating: Rating,
}

impl From<ScoreEntity> for ScoreSummary {
    fn from(value: ScoreEntity) -> Self {
        Self {
            id: value.id.to_string(),
            rating: Rating::of(u64::try_from(value.score).unwrap_or(0)),
            user_id: value.user_id,
            label: value.label,
            score: value.score,
            game_type: value.game_type,
            timestamp: format_system_time(value.timestamp),
        }
    }
}

/// Query string of `GET /scores/top`.
#[derive(Debug, Default, Deserialize, Validate, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct TopScoresQuery {
    /// How many scores to return; the configured default applies when omitted.
    #[validate(range(min = 1))]
    pub limit: Option<usize>,
}

/// Leaderboard payload.
#[derive(Debug, Serialize, ToSchema)]
pub struct TopScoresResponse {
    pub scores: Vec<ScoreSummary>,
}

/// Every score of a user, best first.
#[derive(Debug, Serialize, ToSchema)]
pub struct UserScoresResponse {
    pub user_id: String,
    pub scores: Vec<ScoreSummary>,
}

/// Best score of a user, `null` when they have none.
#[derive(Debug, Serialize, ToSchema)]
pub struct UserBestResponse {
    pub user_id: String,
    pub best: Option<ScoreSummary>,
}

/// Payload returned after a settled measurement was saved.
#[derive(Debug, Serialize, ToSchema)]
pub struct SavedScoreResponse {
    pub score: ScoreSummary,
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, UNIX_EPOCH};

    use super::*;
    use crate::dao::models::ScoreId;

    #[test]
    fn rating_buckets() {
        assert_eq!(Rating::of(0), Rating::Excellent);
        assert_eq!(Rating::of(199), Rating::Excellent);
        assert_eq!(Rating::of(200), Rating::Good);
        assert_eq!(Rating::of(299), Rating::Good);
        assert_eq!(Rating::of(300), Rating::Average);
        assert_eq!(Rating::of(399), Rating::Average);
        assert_eq!(Rating::of(400), Rating::Slow);
        assert_eq!(Rating::of(5_000), Rating::Slow);
    }

    #[test]
    fn summary_formats_timestamp_and_rating() {
        let summary = ScoreSummary::from(ScoreEntity {
            id: ScoreId::new("abc"),
            user_id: "u1".into(),
            label: "Ada".into(),
            score: 245,
            game_type: "reaction-time".into(),
            timestamp: UNIX_EPOCH + Duration::from_millis(1_700_000_000_123),
        });
        let value = serde_json::to_value(&summary).unwrap();
        assert_eq!(value["id"], "abc");
        assert_eq!(value["rating"], "good");
        assert_eq!(value["timestamp"], "2023-11-14T22:13:20.123Z");
    }

    #[test]
    fn top_query_rejects_zero() {
        assert!(TopScoresQuery { limit: Some(0) }.validate().is_err());
        assert!(TopScoresQuery { limit: Some(1) }.validate().is_ok());
        assert!(TopScoresQuery { limit: None }.validate().is_ok());
    }
}
