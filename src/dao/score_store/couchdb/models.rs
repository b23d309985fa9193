use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::{
    dao::models::MatchStatus,
    scoring::{Hole, HoleScore, MatchPlayer},
};

use super::error::CouchDaoError;

pub const MATCH_PREFIX: &str = "match::";
pub const SCORE_PREFIX: &str = "score::";
pub const END_SUFFIX: &str = "\u{ffff}";

#[derive(Debug, Deserialize)]
pub struct AllDocsResponse {
    pub rows: Vec<AllDocsRow>,
}

#[derive(Debug, Deserialize)]
pub struct AllDocsRow {
    pub id: String,
    #[serde(default)]
    pub doc: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CouchMatchDocument {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_rev", skip_serializing_if = "Option::is_none")]
    pub rev: Option<String>,
    #[serde(flatten)]
    pub body: MatchBody,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchBody {
    #[serde(default)]
    pub week_number: u32,
    #[serde(default)]
    pub starting_hole: Hole,
    pub status: MatchStatus,
    pub players: Vec<MatchPlayer>,
}

/// One scored cell. Cleared cells have no document at all.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CouchScoreDocument {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_rev", skip_serializing_if = "Option::is_none")]
    pub rev: Option<String>,
    #[serde(flatten)]
    pub body: ScoreBody,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreBody {
    pub match_id: Uuid,
    pub player_id: Uuid,
    pub hole: Hole,
    pub score: u8,
}

impl CouchScoreDocument {
    pub fn new(match_id: Uuid, player_id: Uuid, hole: Hole, score: u8, rev: Option<String>) -> Self {
        Self {
            id: score_doc_id(match_id, player_id, hole),
            rev,
            body: ScoreBody {
                match_id,
                player_id,
                hole,
                score,
            },
        }
    }
}

impl From<CouchScoreDocument> for HoleScore {
    fn from(doc: CouchScoreDocument) -> Self {
        HoleScore {
            player_id: doc.body.player_id,
            hole: doc.body.hole,
            score: Some(doc.body.score),
        }
    }
}

pub fn match_doc_id(match_id: Uuid) -> String {
    format!("{MATCH_PREFIX}{match_id}")
}

/// Key prefix shared by every score document of a match.
pub fn match_scores_prefix(match_id: Uuid) -> String {
    format!("{SCORE_PREFIX}{match_id}::")
}

pub fn score_doc_id(match_id: Uuid, player_id: Uuid, hole: Hole) -> String {
    format!("{SCORE_PREFIX}{match_id}::{player_id}::{hole}")
}

/// Split a score document id back into its (match, player, hole) key.
pub fn parse_score_doc_id(doc_id: &str) -> Result<(Uuid, Uuid, Hole), CouchDaoError> {
    let invalid = |kind| CouchDaoError::InvalidDocId {
        doc_id: doc_id.to_string(),
        kind,
    };

    let rest = doc_id
        .strip_prefix(SCORE_PREFIX)
        .ok_or_else(|| invalid("missing score prefix"))?;
    let mut parts = rest.split("::");
    let (Some(match_id), Some(player_id), Some(hole), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(invalid("expected three key segments"));
    };

    let match_id = Uuid::parse_str(match_id).map_err(|_| invalid("invalid match UUID"))?;
    let player_id = Uuid::parse_str(player_id).map_err(|_| invalid("invalid player UUID"))?;
    let hole = hole
        .parse::<u8>()
        .ok()
        .and_then(|number| Hole::new(number).ok())
        .ok_or_else(|| invalid("invalid hole number"))?;

    Ok((match_id, player_id, hole))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn score_ids_parse_back() {
        let match_id = Uuid::new_v4();
        let player_id = Uuid::new_v4();
        let hole = Hole::new(7).unwrap();

        let id = score_doc_id(match_id, player_id, hole);
        assert!(id.starts_with(&match_scores_prefix(match_id)));
        assert_eq!(parse_score_doc_id(&id).unwrap(), (match_id, player_id, hole));
    }

    #[test]
    fn malformed_ids_are_refused() {
        let match_id = Uuid::new_v4();
        let player_id = Uuid::new_v4();
        for bad in [
            format!("match::{match_id}"),
            format!("score::{match_id}::{player_id}"),
            format!("score::{match_id}::{player_id}::10"),
            format!("score::{match_id}::nope::3"),
        ] {
            assert!(matches!(
                parse_score_doc_id(&bad),
                Err(CouchDaoError::InvalidDocId { .. })
            ));
        }
    }

    #[test]
    fn score_document_flattens_body() {
        let doc = CouchScoreDocument::new(
            Uuid::nil(),
            Uuid::nil(),
            Hole::new(2).unwrap(),
            5,
            None,
        );
        let json = serde_json::to_value(&doc).unwrap();
        assert_eq!(json["hole"], 2);
        assert_eq!(json["score"], 5);
        assert!(json.get("_rev").is_none());
    }
}
