use crate::client::GiftService;
use crate::error::{Result, ValidationError};
use crate::models::{Friend, NewFriend};
use chrono::{Datelike, NaiveDate};
use std::sync::Arc;
use tracing::info;

/// Friends as known to the gift service.
pub struct FriendDirectory<S> {
    service: Arc<S>,
}

/// A friend whose birthday is coming up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Upcoming {
    pub friend: Friend,
    pub next_birthday: NaiveDate,
    pub days_until: i64,
}

impl<S: GiftService> FriendDirectory<S> {
    pub fn new(service: Arc<S>) -> Self {
        Self { service }
    }

    pub async fn list(&self) -> Result<Vec<Friend>> {
        self.service.list_friends().await
    }

    /// Register a friend. Blank names and sentiments never reach the service.
    pub async fn add(&self, friend: NewFriend) -> Result<Friend> {
        if friend.name.trim().is_empty() {
            return Err(ValidationError::MissingRecipient.into());
        }
        if friend.sentiment.trim().is_empty() {
            return Err(ValidationError::BlankField { field: "sentiment" }.into());
        }
        let stored = self.service.add_friend(&friend).await?;
        info!(name = %stored.name, "friend added");
        Ok(stored)
    }

    /// Fetch friends and keep those with a birthday within `within_days`.
    pub async fn upcoming_from_service(
        &self,
        today: NaiveDate,
        within_days: i64,
    ) -> Result<Vec<Upcoming>> {
        Ok(upcoming(self.list().await?, today, within_days))
    }
}

/// Friends whose next birthday falls within `within_days` of `today`,
/// soonest first. A birthday today counts as zero days away.
pub fn upcoming(friends: Vec<Friend>, today: NaiveDate, within_days: i64) -> Vec<Upcoming> {
    let mut out: Vec<Upcoming> = friends
        .into_iter()
        .filter_map(|friend| {
            let next = next_birthday(friend.birthday, today)?;
            let days_until = (next - today).num_days();
            (days_until <= within_days).then_some(Upcoming {
                friend,
                next_birthday: next,
                days_until,
            })
        })
        .collect();
    out.sort_by(|a, b| {
        a.days_until
            .cmp(&b.days_until)
            .then_with(|| a.friend.name.cmp(&b.friend.name))
    });
    out
}

/// Next occurrence of `birthday`'s month and day on or after `today`.
/// 29 February is observed on the 28th in common years.
pub fn next_birthday(birthday: NaiveDate, today: NaiveDate) -> Option<NaiveDate> {
    let this_year = anniversary(birthday, today.year())?;
    if this_year >= today {
        Some(this_year)
    } else {
        anniversary(birthday, today.year() + 1)
    }
}

fn anniversary(birthday: NaiveDate, year: i32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year, birthday.month(), birthday.day())
        .or_else(|| NaiveDate::from_ymd_opt(year, birthday.month(), birthday.day() - 1))
}
