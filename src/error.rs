use std::fmt;
use thiserror::Error;

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, GiftError>;

/// Remote capability an error originated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    ListFriends,
    AddFriend,
    SuggestGift,
    SaveHistory,
    ListHistory,
    Checkout,
    RenderPostcard,
    EmailPostcard,
}

impl Operation {
    /// Stable user-facing message shown when the service gave no reason.
    pub fn fallback_message(self) -> &'static str {
        match self {
            Operation::ListFriends => "Could not load friends.",
            Operation::AddFriend => "Failed to import contact.",
            Operation::SuggestGift => "Could not suggest a gift.",
            Operation::SaveHistory => "Could not save gift history.",
            Operation::ListHistory => "Could not load gift history.",
            Operation::Checkout => "Unable to create checkout session",
            Operation::RenderPostcard => "Unable to generate postcard.",
            Operation::EmailPostcard => "Failed to send postcard.",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operation::ListFriends => "list friends",
            Operation::AddFriend => "add friend",
            Operation::SuggestGift => "suggest gift",
            Operation::SaveHistory => "save history",
            Operation::ListHistory => "list history",
            Operation::Checkout => "checkout",
            Operation::RenderPostcard => "render postcard",
            Operation::EmailPostcard => "email postcard",
        };
        f.write_str(name)
    }
}

/// Transition requested of a [`SuggestionWorkflow`](crate::SuggestionWorkflow).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowAction {
    RequestSuggestion,
    Accept,
    Reject,
    Abandon,
}

impl fmt::Display for WorkflowAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WorkflowAction::RequestSuggestion => "request suggestion",
            WorkflowAction::Accept => "accept",
            WorkflowAction::Reject => "reject",
            WorkflowAction::Abandon => "abandon",
        };
        f.write_str(name)
    }
}

/// Problems detected locally, before anything is sent.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Missing friend name.")]
    MissingRecipient,

    #[error("{field} must not be blank")]
    BlankField { field: &'static str },

    #[error("{0:?} is not a valid email address")]
    InvalidEmail(String),

    #[error("price must be greater than zero")]
    InvalidPrice,

    #[error("{0:?} cannot be used as a gift service base url")]
    InvalidBaseUrl(String),

    #[error("cannot {action} while {state}")]
    OutOfOrder {
        action: WorkflowAction,
        state: &'static str,
    },
}

/// Every failure the orchestration core can report.
#[derive(Debug, Error)]
pub enum GiftError {
    /// The request could not be sent, or no usable response came back.
    #[error("{operation}: no usable response from gift service: {source}")]
    Transport {
        operation: Operation,
        #[source]
        source: reqwest::Error,
    },

    /// The service answered with a failure.
    #[error("{operation}: service returned {status}{}", detail_suffix(.message))]
    Service {
        operation: Operation,
        status: u16,
        message: Option<String>,
    },

    #[error(transparent)]
    Validation(#[from] ValidationError),
}

fn detail_suffix(message: &Option<String>) -> String {
    message.as_deref().map(|m| format!(": {m}")).unwrap_or_default()
}

impl GiftError {
    /// Human-readable reason suitable for showing to the user.
    ///
    /// The server-provided message wins when present; otherwise the
    /// operation's fallback text is used.
    pub fn reason(&self) -> String {
        match self {
            GiftError::Service {
                message: Some(m), ..
            } => m.clone(),
            GiftError::Service { operation, .. } | GiftError::Transport { operation, .. } => {
                operation.fallback_message().to_string()
            }
            GiftError::Validation(v) => v.to_string(),
        }
    }

    /// Operation the failure belongs to, if it got as far as the remote call.
    pub fn operation(&self) -> Option<Operation> {
        match self {
            GiftError::Transport { operation, .. } | GiftError::Service { operation, .. } => {
                Some(*operation)
            }
            GiftError::Validation(_) => None,
        }
    }

    /// Whether asking the user to try again could help.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, GiftError::Validation(_))
    }

    pub(crate) fn transport(operation: Operation, source: reqwest::Error) -> Self {
        GiftError::Transport { operation, source }
    }
}
