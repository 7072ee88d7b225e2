use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Voter;

/// Textual format of vote dates on the wire (day.month.year)
pub const VOTE_DATE_FORMAT: &str = "%d.%m.%Y";

/// A user's choice of restaurant for one calendar day.
///
/// At most one vote exists per (`user_email`, `date`); the stores enforce
/// this as a uniqueness constraint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vote {
    pub id: String,
    pub user_email: String,
    pub restaurant_id: i64,
    pub date: NaiveDate,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Vote {
    /// Create a new Vote with a generated ID
    pub fn new(voter: &Voter, restaurant_id: i64, date: NaiveDate, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            user_email: voter.email().to_string(),
            restaurant_id,
            date,
            created_at: now,
            updated_at: now,
        }
    }

    /// Point the vote at another restaurant
    pub fn change_restaurant(&mut self, restaurant_id: i64, now: DateTime<Utc>) {
        self.restaurant_id = restaurant_id;
        self.updated_at = now;
    }

    pub fn to_response(&self) -> VoteResponse {
        VoteResponse {
            id: self.id.clone(),
            restaurant_id: self.restaurant_id,
            user: self.user_email.clone(),
            date: self.date,
        }
    }
}

/// Vote as returned by the API
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteResponse {
    pub id: String,
    pub restaurant_id: i64,
    pub user: String,
    #[serde(with = "vote_date")]
    pub date: NaiveDate,
}

/// Serde adapter for `dd.MM.yyyy` dates
pub mod vote_date {
    use chrono::NaiveDate;
    use serde::{Deserialize, Deserializer, Serializer};

    use super::VOTE_DATE_FORMAT;

    pub fn serialize<S>(date: &NaiveDate, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&date.format(VOTE_DATE_FORMAT).to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<NaiveDate, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        NaiveDate::parse_from_str(&s, VOTE_DATE_FORMAT).map_err(serde::de::Error::custom)
    }
}
