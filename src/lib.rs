//! Gift suggestion and fulfillment orchestration for Giftie.
//!
//! The crate wraps the remote gift service behind [`GiftService`] and layers
//! the workflows a front end drives on top of it: [`SuggestionWorkflow`]
//! (suggest, accept or reject, commit), [`Fulfillment`] (checkout and
//! postcards), [`HistoryLedger`] and [`FriendDirectory`].

mod client;
mod config;
mod error;
mod friends;
mod fulfillment;
mod history;
pub mod logging;
mod models;
mod suggestion;
#[cfg(test)]
pub mod test_helpers;

pub use client::{GiftService, HttpGiftService};
pub use config::{
    DEFAULT_BASE_URL, DEFAULT_PRICE, DEFAULT_SENTIMENT, Defaults, ServiceConfig, Settings,
};
pub use error::{GiftError, Operation, Result, ValidationError, WorkflowAction};
pub use friends::{FriendDirectory, Upcoming, next_birthday, upcoming};
pub use fulfillment::Fulfillment;
pub use history::{HistoryLedger, HistoryView};
pub use models::{
    CheckoutRequest, CheckoutResult, EmailResult, Friend, GiftRef, HistoryEntry, NewFriend,
    PostcardEmailRequest, PostcardRequest, PostcardResult, Price, Suggestion, SuggestionRequest,
};
pub use suggestion::{SuggestionWorkflow, WorkflowState};
