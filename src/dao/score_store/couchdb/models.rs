use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::dao::models::{
    NewScoreEntity, ScoreEntity, ScoreId, epoch_millis, from_epoch_millis,
};

/// Value of the `doc_type` field tagging score documents.
pub const SCORE_DOC_TYPE: &str = "score";
/// Number of documents requested per `_find` page when reading unbounded projections.
pub const FIND_PAGE_SIZE: usize = 200;

/// Score document as stored in CouchDB. Identifier and revision are server-assigned.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CouchScoreDocument {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "_rev", skip_serializing_if = "Option::is_none")]
    pub rev: Option<String>,
    pub doc_type: String,
    pub user_id: String,
    pub label: String,
    pub score: i64,
    pub game_type: String,
    /// Milliseconds since the Unix epoch.
    pub timestamp_ms: i64,
}

impl From<NewScoreEntity> for CouchScoreDocument {
    fn from(value: NewScoreEntity) -> Self {
        Self {
            id: None,
            rev: None,
            doc_type: SCORE_DOC_TYPE.to_owned(),
            user_id: value.user_id,
            label: value.label,
            score: value.score,
            game_type: value.game_type,
            timestamp_ms: epoch_millis(value.timestamp),
        }
    }
}

impl CouchScoreDocument {
    pub fn into_entity(self) -> Option<ScoreEntity> {
        Some(ScoreEntity {
            id: ScoreId::new(self.id?),
            user_id: self.user_id,
            label: self.label,
            score: self.score,
            game_type: self.game_type,
            timestamp: from_epoch_millis(self.timestamp_ms),
        })
    }
}

/// Body returned by `POST /{db}`.
#[derive(Debug, Deserialize)]
pub struct CreatedResponse {
    pub id: String,
}

/// Mango index definition posted to `/{db}/_index`.
#[derive(Debug, Serialize)]
pub struct IndexRequest {
    pub index: IndexFields,
    pub name: &'static str,
    #[serde(rename = "type")]
    pub kind: &'static str,
}

#[derive(Debug, Serialize)]
pub struct IndexFields {
    pub fields: Vec<&'static str>,
}

impl IndexRequest {
    pub fn json(name: &'static str, fields: Vec<&'static str>) -> Self {
        Self {
            index: IndexFields { fields },
            name,
            kind: "json",
        }
    }
}

/// Mango query posted to `/{db}/_find`.
#[derive(Debug, Clone, Serialize)]
pub struct FindRequest {
    pub selector: Value,
    pub sort: Vec<Value>,
    pub limit: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bookmark: Option<String>,
}

impl FindRequest {
    /// Every score, lowest first.
    pub fn top(limit: usize) -> Self {
        Self {
            selector: json!({
                "doc_type": SCORE_DOC_TYPE,
                "score": { "$gte": 0 },
            }),
            sort: vec![json!({ "score": "asc" })],
            limit,
            bookmark: None,
        }
    }

    /// Scores of one user, lowest first. Sorting on both fields lets CouchDB use the
    /// `[user_id, score]` index.
    pub fn for_user(user_id: &str, limit: usize) -> Self {
        Self {
            selector: json!({
                "doc_type": SCORE_DOC_TYPE,
                "user_id": user_id,
                "score": { "$gte": 0 },
            }),
            sort: vec![json!({ "user_id": "asc" }), json!({ "score": "asc" })],
            limit,
            bookmark: None,
        }
    }

    pub fn after(mut self, bookmark: String) -> Self {
        self.bookmark = Some(bookmark);
        self
    }
}

/// Body returned by `/{db}/_find`.
#[derive(Debug, Deserialize)]
pub struct FindResponse {
    pub docs: Vec<CouchScoreDocument>,
    #[serde(default)]
    pub bookmark: Option<String>,
    #[serde(default)]
    pub warning: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dao::models::{REACTION_TIME_GAME_TYPE, timestamp_now};

    #[test]
    fn new_document_omits_server_fields() {
        let document = CouchScoreDocument::from(NewScoreEntity {
            user_id: "u1".into(),
            label: "u1@example.com".into(),
            score: 199,
            game_type: REACTION_TIME_GAME_TYPE.into(),
            timestamp: timestamp_now(),
        });
        let value = serde_json::to_value(&document).unwrap();
        assert!(value.get("_id").is_none());
        assert!(value.get("_rev").is_none());
        assert_eq!(value["doc_type"], "score");
        assert_eq!(value["score"], 199);
    }

    #[test]
    fn user_query_sorts_on_indexed_fields() {
        let request = FindRequest::for_user("u1", FIND_PAGE_SIZE).after("g1AAAA".into());
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["selector"]["user_id"], "u1");
        assert_eq!(value["sort"][0]["user_id"], "asc");
        assert_eq!(value["sort"][1]["score"], "asc");
        assert_eq!(value["limit"], FIND_PAGE_SIZE);
        assert_eq!(value["bookmark"], "g1AAAA");
    }

    #[test]
    fn find_response_decodes_into_entities() {
        let body = r#"{
            "docs": [{
                "_id": "9f1c", "_rev": "1-a", "doc_type": "score",
                "user_id": "u1", "label": "u1@example.com", "score": 212,
                "game_type": "reaction-time", "timestamp_ms": 1700000000123
            }],
            "bookmark": "g1AAAA"
        }"#;
        let response: FindResponse = serde_json::from_str(body).unwrap();
        assert_eq!(response.bookmark.as_deref(), Some("g1AAAA"));

        let entity = response.docs.into_iter().next().unwrap().into_entity().unwrap();
        assert_eq!(entity.id.as_str(), "9f1c");
        assert_eq!(entity.score, 212);
        assert_eq!(epoch_millis(entity.timestamp), 1_700_000_000_123);
    }
}
