use crate::client::GiftService;
use crate::error::{Result, ValidationError};
use crate::models::{GiftRef, HistoryEntry};
use std::sync::Arc;
use tracing::debug;

/// Read path over a friend's accepted suggestions.
///
/// Every load is a fresh fetch; nothing is cached.
pub struct HistoryLedger<S> {
    service: Arc<S>,
}

impl<S: GiftService> HistoryLedger<S> {
    pub fn new(service: Arc<S>) -> Self {
        Self { service }
    }

    /// Entries for `recipient` in the order the service returns them.
    ///
    /// A blank or absent name fails locally with
    /// [`ValidationError::MissingRecipient`] and never reaches the service.
    pub async fn load_history(&self, recipient: Option<&str>) -> Result<Vec<HistoryEntry>> {
        let recipient = recipient
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .ok_or(ValidationError::MissingRecipient)?;
        let entries = self.service.list_history(recipient).await?;
        debug!(%recipient, count = entries.len(), "history loaded");
        Ok(entries)
    }

    pub async fn view(&self, recipient: &str) -> Result<HistoryView> {
        let entries = self.load_history(Some(recipient)).await?;
        Ok(HistoryView {
            recipient: recipient.trim().to_string(),
            entries,
        })
    }
}

/// A loaded history, ready for re-ordering or postcard re-entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryView {
    pub recipient: String,
    pub entries: Vec<HistoryEntry>,
}

impl HistoryView {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The `{gift, recipient}` pair for the entry at `index`.
    pub fn gift_ref(&self, index: usize) -> Option<GiftRef> {
        self.entries
            .get(index)
            .map(|e| GiftRef::from_history(e, self.recipient.clone()))
    }
}
