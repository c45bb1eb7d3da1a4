//! Wire and domain types exchanged with the gift service.

use crate::error::ValidationError;
use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// A friend known to the gift service. `name` is the key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Friend {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub name: String,
    pub birthday: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sentiment: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl Friend {
    pub fn new(name: impl Into<String>, birthday: NaiveDate) -> Self {
        Self {
            id: None,
            name: name.into(),
            birthday,
            sentiment: None,
            email: None,
        }
    }
}

/// Payload for registering a friend with the service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewFriend {
    pub name: String,
    pub birthday: NaiveDate,
    pub sentiment: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SuggestionRequest {
    pub name: String,
    pub birthday: NaiveDate,
    pub sentiment: String,
}

impl SuggestionRequest {
    pub fn for_friend(friend: &Friend, sentiment: impl Into<String>) -> Self {
        Self {
            name: friend.name.clone(),
            birthday: friend.birthday,
            sentiment: sentiment.into(),
        }
    }
}

/// A gift recommendation. Transient until accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Suggestion {
    pub recipient: String,
    pub suggested_gift: String,
    /// Echoed by the service; filled from the request when missing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sentiment: Option<String>,
}

/// An accepted suggestion persisted against a recipient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub suggested_gift: String,
    pub sentiment: String,
}

/// The `{gift, recipient}` pair every fulfillment action works from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GiftRef {
    pub gift: String,
    pub recipient: String,
}

impl GiftRef {
    pub fn new(gift: impl Into<String>, recipient: impl Into<String>) -> Self {
        Self {
            gift: gift.into(),
            recipient: recipient.into(),
        }
    }

    pub fn from_history(entry: &HistoryEntry, recipient: impl Into<String>) -> Self {
        Self::new(entry.suggested_gift.clone(), recipient)
    }
}

impl From<&Suggestion> for GiftRef {
    fn from(s: &Suggestion) -> Self {
        Self::new(s.suggested_gift.clone(), s.recipient.clone())
    }
}

/// Money amount in minor units (pence).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Price(u64);

impl Price {
    pub const fn from_minor(minor: u64) -> Self {
        Self(minor)
    }

    pub const fn minor(self) -> u64 {
        self.0
    }

    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}", self.0 / 100, self.0 % 100)
    }
}

impl FromStr for Price {
    type Err = ValidationError;

    /// Accepts `5`, `5.0` and `5.00`; more than two decimals is rejected.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().trim_start_matches('£');
        let (major, minor) = s.split_once('.').unwrap_or((s, ""));
        if major.is_empty() || minor.len() > 2 {
            return Err(ValidationError::InvalidPrice);
        }
        let all_digits = |p: &str| p.chars().all(|c| c.is_ascii_digit());
        if !all_digits(major) || !all_digits(minor) {
            return Err(ValidationError::InvalidPrice);
        }
        let major: u64 = major.parse().map_err(|_| ValidationError::InvalidPrice)?;
        let minor: u64 = match minor.len() {
            0 => 0,
            1 => minor.parse::<u64>().map_err(|_| ValidationError::InvalidPrice)? * 10,
            _ => minor.parse().map_err(|_| ValidationError::InvalidPrice)?,
        };
        major
            .checked_mul(100)
            .and_then(|m| m.checked_add(minor))
            .map(Price)
            .ok_or(ValidationError::InvalidPrice)
    }
}

impl Serialize for Price {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.0 as f64 / 100.0)
    }
}

impl<'de> Deserialize<'de> for Price {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Text(String),
            Number(f64),
        }
        match Raw::deserialize(deserializer)? {
            Raw::Text(s) => s.parse().map_err(serde::de::Error::custom),
            Raw::Number(n) if n.is_finite() && n >= 0.0 => Ok(Price((n * 100.0).round() as u64)),
            Raw::Number(n) => Err(serde::de::Error::custom(format!("invalid price {n}"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CheckoutRequest {
    pub gift: String,
    pub recipient: String,
    pub price: Price,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PostcardRequest {
    pub gift: String,
    pub recipient: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PostcardEmailRequest {
    pub recipient_name: String,
    pub recipient_email: String,
    pub image_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutResult {
    pub checkout_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostcardResult {
    pub image_url: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EmailResult {
    pub delivered: bool,
}
