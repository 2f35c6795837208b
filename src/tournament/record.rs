//! Tournament Records
//!
//! Typed tournament descriptors built from the loosely shaped documents the
//! catalog store hands back. Every defaulting rule lives here:
//!
//! | Field            | Accepted input                                  | Missing / null |
//! |------------------|-------------------------------------------------|----------------|
//! | `id`             | string or number                                | error          |
//! | `title`, `game`, `mode` | string                                   | `""`           |
//! | `entryFee`       | number, numeric string, `"Free"`, `""`          | free (0)       |
//! | `prize`          | number, numeric string (`"1,00,000"` allowed)   | 0              |
//! | `date`           | RFC 3339 timestamp (alias `scheduledStart`)     | error          |
//! | `coverUrl`       | string                                          | none           |
//!
//! Negative fees or prizes are rejected.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::core::money::Coins;

/// Tournament identifier as the catalog stores it.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TournamentId(pub String);

impl TournamentId {
    /// Wrap an id.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow as text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TournamentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TournamentId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// A tournament the viewer can join.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tournament {
    /// Catalog id.
    pub id: TournamentId,
    /// Display title.
    pub title: String,
    /// Game name, e.g. "BGMI".
    pub game: String,
    /// Team mode, e.g. "Squad".
    pub mode: String,
    /// Entry fee; zero means free entry.
    pub entry_fee: Coins,
    /// Advertised prize pool.
    pub prize_pool: Coins,
    /// When the match starts.
    pub scheduled_start: DateTime<Utc>,
    /// Cover image.
    pub cover_url: Option<String>,
}

impl Tournament {
    /// Minimal descriptor: id, title, fee and start time.
    pub fn new(
        id: impl Into<TournamentId>,
        title: impl Into<String>,
        entry_fee: Coins,
        scheduled_start: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            game: String::new(),
            mode: String::new(),
            entry_fee,
            prize_pool: Coins::ZERO,
            scheduled_start,
            cover_url: None,
        }
    }

    /// No entry fee.
    pub fn is_free(&self) -> bool {
        self.entry_fee.is_zero()
    }

    /// Parse a raw catalog document.
    pub fn from_json_value(value: Value) -> Result<Self, RecordError> {
        let doc: TournamentDocument = serde_json::from_value(value)?;
        Tournament::try_from(doc)
    }
}

impl From<String> for TournamentId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Match room login handed out near start time.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomCredentials {
    /// In-game room id.
    pub room_id: String,
    /// Room password.
    pub password: String,
}

impl RoomCredentials {
    /// Build credentials.
    pub fn new(room_id: impl Into<String>, password: impl Into<String>) -> Self {
        Self { room_id: room_id.into(), password: password.into() }
    }
}

// =============================================================================
// LOOSE DOCUMENT
// =============================================================================

/// Tournament document as stored; every field optional.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TournamentDocument {
    #[serde(default)]
    id: Option<Value>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    game: Option<String>,
    #[serde(default)]
    mode: Option<String>,
    #[serde(default)]
    entry_fee: Option<Value>,
    #[serde(default)]
    prize: Option<Value>,
    #[serde(default, alias = "scheduledStart")]
    date: Option<String>,
    #[serde(default)]
    cover_url: Option<String>,
}

/// Document could not become a [`Tournament`].
#[derive(Debug, Error)]
pub enum RecordError {
    /// Required field absent or null.
    #[error("missing field `{0}`")]
    MissingField(&'static str),

    /// Amount field unreadable.
    #[error("field `{field}` is not an amount: {value}")]
    InvalidAmount {
        /// Field name.
        field: &'static str,
        /// Raw value.
        value: String,
    },

    /// Amount field below zero.
    #[error("field `{0}` must not be negative")]
    NegativeAmount(&'static str),

    /// Start time unreadable.
    #[error("invalid start time {0:?}")]
    InvalidStart(String),

    /// Document shape not an object.
    #[error("malformed document: {0}")]
    Malformed(#[from] serde_json::Error),
}

impl TryFrom<TournamentDocument> for Tournament {
    type Error = RecordError;

    fn try_from(doc: TournamentDocument) -> Result<Self, Self::Error> {
        let id = match doc.id {
            Some(Value::String(s)) if !s.trim().is_empty() => s,
            Some(Value::Number(n)) => n.to_string(),
            _ => return Err(RecordError::MissingField("id")),
        };

        let raw_start = doc.date.ok_or(RecordError::MissingField("date"))?;
        let scheduled_start = DateTime::parse_from_rfc3339(raw_start.trim())
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|_| RecordError::InvalidStart(raw_start.clone()))?;

        Ok(Tournament {
            id: TournamentId(id),
            title: doc.title.unwrap_or_default(),
            game: doc.game.unwrap_or_default(),
            mode: doc.mode.unwrap_or_default(),
            entry_fee: amount_field("entryFee", doc.entry_fee.as_ref())?,
            prize_pool: amount_field("prize", doc.prize.as_ref())?,
            scheduled_start,
            cover_url: doc.cover_url.filter(|u| !u.is_empty()),
        })
    }
}

fn amount_field(field: &'static str, value: Option<&Value>) -> Result<Coins, RecordError> {
    let invalid = |v: &Value| RecordError::InvalidAmount { field, value: v.to_string() };

    let amount = match value {
        None | Some(Value::Null) => Coins::ZERO,
        Some(v @ Value::Number(n)) => Decimal::from_str(&n.to_string())
            .map(Coins::new)
            .map_err(|_| invalid(v))?,
        Some(v @ Value::String(s)) => {
            let s = s.trim();
            if s.is_empty() || s.eq_ignore_ascii_case("free") {
                Coins::ZERO
            } else {
                Coins::parse_loose(s).map_err(|_| invalid(v))?
            }
        }
        Some(v) => return Err(invalid(v)),
    };

    if amount.is_negative() {
        return Err(RecordError::NegativeAmount(field));
    }
    Ok(amount)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn test_catalog_document_with_string_amounts() {
        let t = Tournament::from_json_value(json!({
            "id": "1",
            "game": "BGMI",
            "title": "BGMI Ultimate Showdown",
            "mode": "Squad",
            "prize": "1,00,000",
            "entryFee": "1000",
            "date": "2024-08-15T18:00:00Z",
            "coverUrl": "https://placehold.co/600x400.png"
        }))
        .unwrap();

        assert_eq!(t.id, TournamentId::new("1"));
        assert_eq!(t.entry_fee, Coins::whole(1000));
        assert_eq!(t.prize_pool, Coins::whole(100_000));
        assert_eq!(t.scheduled_start, Utc.with_ymd_and_hms(2024, 8, 15, 18, 0, 0).unwrap());
        assert!(!t.is_free());
    }

    #[test]
    fn test_numeric_id_and_amounts() {
        let t = Tournament::from_json_value(json!({
            "id": 3,
            "title": "Valorant Cup",
            "entryFee": 49.5,
            "prize": 25000,
            "scheduledStart": "2024-09-01T10:00:00+05:30"
        }))
        .unwrap();

        assert_eq!(t.id.as_str(), "3");
        assert_eq!(t.entry_fee.to_string(), "49.50");
        assert_eq!(t.scheduled_start, Utc.with_ymd_and_hms(2024, 9, 1, 4, 30, 0).unwrap());
        assert_eq!(t.game, "");
    }

    #[test]
    fn test_free_entry_forms() {
        for fee in [json!("Free"), json!("free"), json!(""), json!(null), json!(0)] {
            let t = Tournament::from_json_value(json!({
                "id": "f",
                "entryFee": fee,
                "date": "2024-08-15T18:00:00Z"
            }))
            .unwrap();
            assert!(t.is_free());
        }

        let no_fee = Tournament::from_json_value(json!({"id": "f", "date": "2024-08-15T18:00:00Z"})).unwrap();
        assert!(no_fee.is_free());
    }

    #[test]
    fn test_missing_required_fields() {
        let no_id = Tournament::from_json_value(json!({"date": "2024-08-15T18:00:00Z"}));
        assert!(matches!(no_id, Err(RecordError::MissingField("id"))));

        let no_date = Tournament::from_json_value(json!({"id": "x"}));
        assert!(matches!(no_date, Err(RecordError::MissingField("date"))));

        let bad_date = Tournament::from_json_value(json!({"id": "x", "date": "tomorrow"}));
        assert!(matches!(bad_date, Err(RecordError::InvalidStart(_))));
    }

    #[test]
    fn test_bad_amounts() {
        let negative = Tournament::from_json_value(json!({
            "id": "x", "entryFee": -10, "date": "2024-08-15T18:00:00Z"
        }));
        assert!(matches!(negative, Err(RecordError::NegativeAmount("entryFee"))));

        let junk = Tournament::from_json_value(json!({
            "id": "x", "prize": "lots", "date": "2024-08-15T18:00:00Z"
        }));
        assert!(matches!(junk, Err(RecordError::InvalidAmount { field: "prize", .. })));

        let wrong_type = Tournament::from_json_value(json!({
            "id": "x", "entryFee": [1], "date": "2024-08-15T18:00:00Z"
        }));
        assert!(matches!(wrong_type, Err(RecordError::InvalidAmount { field: "entryFee", .. })));
    }

    #[test]
    fn test_non_object_document() {
        assert!(matches!(
            Tournament::from_json_value(json!([1, 2, 3])),
            Err(RecordError::Malformed(_))
        ));
    }
}
