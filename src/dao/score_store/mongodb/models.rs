use mongodb::bson::{DateTime, oid::ObjectId};
use serde::{Deserialize, Serialize};

use crate::dao::models::{NewScoreEntity, ScoreEntity, ScoreId};

/// Shape of a score inside the `scores` collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoScoreDocument {
    /// Left empty on insert so the server assigns the ObjectId.
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub user_id: String,
    pub label: String,
    pub score: i64,
    pub game_type: String,
    pub timestamp: DateTime,
}

impl From<NewScoreEntity> for MongoScoreDocument {
    fn from(value: NewScoreEntity) -> Self {
        Self {
            id: None,
            user_id: value.user_id,
            label: value.label,
            score: value.score,
            game_type: value.game_type,
            timestamp: DateTime::from_system_time(value.timestamp),
        }
    }
}

impl MongoScoreDocument {
    /// Convert a fetched document into an entity. Documents read back from the
    /// collection always carry their `_id`.
    pub fn into_entity(self) -> Option<ScoreEntity> {
        let id = self.id?;
        Some(ScoreEntity {
            id: ScoreId::new(id.to_hex()),
            user_id: self.user_id,
            label: self.label,
            score: self.score,
            game_type: self.game_type,
            timestamp: self.timestamp.to_system_time(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dao::models::{REACTION_TIME_GAME_TYPE, timestamp_now};

    #[test]
    fn document_round_trips_entity_fields() {
        let new = NewScoreEntity {
            user_id: "uid-7".into(),
            label: "grace@example.com".into(),
            score: 231,
            game_type: REACTION_TIME_GAME_TYPE.into(),
            timestamp: timestamp_now(),
        };

        let mut document = MongoScoreDocument::from(new.clone());
        assert!(document.id.is_none());

        let oid = ObjectId::new();
        document.id = Some(oid);
        let entity = document.into_entity().expect("document has an id");
        assert_eq!(entity, new.with_id(ScoreId::new(oid.to_hex())));
    }

    #[test]
    fn document_without_id_is_skipped() {
        let document = MongoScoreDocument {
            id: None,
            user_id: "uid".into(),
            label: "uid".into(),
            score: 1,
            game_type: REACTION_TIME_GAME_TYPE.into(),
            timestamp: DateTime::now(),
        };
        assert!(document.into_entity().is_none());
    }
}
