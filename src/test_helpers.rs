//! In-memory [`GiftService`] used by unit tests.

use crate::client::GiftService;
use crate::error::{GiftError, Operation, Result};
use crate::models::{
    CheckoutRequest, CheckoutResult, EmailResult, Friend, HistoryEntry, NewFriend,
    PostcardEmailRequest, PostcardRequest, PostcardResult, Suggestion, SuggestionRequest,
};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

/// Records every call and keeps an in-memory history ledger.
#[derive(Default)]
pub struct RecordingService {
    pub friends: Mutex<Vec<Friend>>,
    pub gift: Mutex<String>,
    pub history: Mutex<HashMap<String, Vec<HistoryEntry>>>,
    pub saved: Mutex<Vec<Suggestion>>,
    pub checkouts: Mutex<Vec<CheckoutRequest>>,
    calls: Mutex<Vec<Operation>>,
    failures: Mutex<HashMap<&'static str, Vec<Option<String>>>>,
    delays: Mutex<HashMap<String, Duration>>,
    save_delay: Mutex<Option<Duration>>,
}

impl RecordingService {
    pub fn new(gift: &str) -> Self {
        let s = Self::default();
        *s.gift.lock().unwrap() = gift.into();
        s
    }

    /// Make the next call of `operation` fail with a service error.
    pub fn fail_next(&self, operation: Operation, message: Option<&str>) {
        self.failures
            .lock()
            .unwrap()
            .entry(key(operation))
            .or_default()
            .push(message.map(str::to_string));
    }

    /// Delay checkouts for `recipient`.
    pub fn delay_for(&self, recipient: &str, delay: Duration) {
        self.delays
            .lock()
            .unwrap()
            .insert(recipient.to_string(), delay);
    }

    /// Delay every history save; `None` makes saves immediate again.
    pub fn delay_saves(&self, delay: Option<Duration>) {
        *self.save_delay.lock().unwrap() = delay;
    }

    pub fn calls(&self, operation: Operation) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|o| **o == operation)
            .count()
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    fn enter(&self, operation: Operation) -> Result<()> {
        self.calls.lock().unwrap().push(operation);
        let mut failures = self.failures.lock().unwrap();
        match failures.get_mut(key(operation)) {
            Some(queue) if !queue.is_empty() => Err(GiftError::Service {
                operation,
                status: 500,
                message: queue.remove(0),
            }),
            _ => Ok(()),
        }
    }
}

fn key(operation: Operation) -> &'static str {
    match operation {
        Operation::ListFriends => "friends",
        Operation::AddFriend => "add",
        Operation::SuggestGift => "suggest",
        Operation::SaveHistory => "save",
        Operation::ListHistory => "history",
        Operation::Checkout => "checkout",
        Operation::RenderPostcard => "postcard",
        Operation::EmailPostcard => "email",
    }
}

#[async_trait]
impl GiftService for RecordingService {
    async fn list_friends(&self) -> Result<Vec<Friend>> {
        self.enter(Operation::ListFriends)?;
        Ok(self.friends.lock().unwrap().clone())
    }

    async fn add_friend(&self, friend: &NewFriend) -> Result<Friend> {
        self.enter(Operation::AddFriend)?;
        let mut friends = self.friends.lock().unwrap();
        let stored = Friend {
            id: Some(friends.len() as i64 + 1),
            name: friend.name.clone(),
            birthday: friend.birthday,
            sentiment: Some(friend.sentiment.clone()),
            email: friend.email.clone(),
        };
        friends.push(stored.clone());
        Ok(stored)
    }

    async fn suggest_gift(&self, req: &SuggestionRequest) -> Result<Suggestion> {
        self.enter(Operation::SuggestGift)?;
        tokio::task::yield_now().await;
        Ok(Suggestion {
            recipient: req.name.clone(),
            suggested_gift: self.gift.lock().unwrap().clone(),
            sentiment: None,
        })
    }

    async fn save_history(&self, entry: &Suggestion) -> Result<()> {
        self.enter(Operation::SaveHistory)?;
        let delay = *self.save_delay.lock().unwrap();
        if let Some(d) = delay {
            tokio::time::sleep(d).await;
        }
        self.saved.lock().unwrap().push(entry.clone());
        self.history
            .lock()
            .unwrap()
            .entry(entry.recipient.clone())
            .or_default()
            .push(HistoryEntry {
                suggested_gift: entry.suggested_gift.clone(),
                sentiment: entry.sentiment.clone().unwrap_or_default(),
            });
        Ok(())
    }

    async fn list_history(&self, recipient: &str) -> Result<Vec<HistoryEntry>> {
        self.enter(Operation::ListHistory)?;
        Ok(self
            .history
            .lock()
            .unwrap()
            .get(recipient)
            .cloned()
            .unwrap_or_default())
    }

    async fn checkout(&self, req: &CheckoutRequest) -> Result<CheckoutResult> {
        self.enter(Operation::Checkout)?;
        let delay = self.delays.lock().unwrap().get(&req.recipient).copied();
        if let Some(d) = delay {
            tokio::time::sleep(d).await;
        }
        self.checkouts.lock().unwrap().push(req.clone());
        Ok(CheckoutResult {
            checkout_url: format!("https://pay.example/{}", req.recipient.replace(' ', "-")),
        })
    }

    async fn render_postcard(&self, req: &PostcardRequest) -> Result<PostcardResult> {
        self.enter(Operation::RenderPostcard)?;
        Ok(PostcardResult {
            image_url: format!("/postcards/{}.png", req.recipient.replace(' ', "-")),
        })
    }

    async fn email_postcard(&self, _req: &PostcardEmailRequest) -> Result<EmailResult> {
        self.enter(Operation::EmailPostcard)?;
        Ok(EmailResult { delivered: true })
    }
}
