use crate::client::GiftService;
use crate::error::{Result, ValidationError, WorkflowAction};
use crate::models::{Friend, Suggestion, SuggestionRequest};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info, warn};

/// Where a suggestion cycle currently stands.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum WorkflowState {
    #[default]
    Idle,
    /// A suggestion request is in flight.
    Pending { friend: String },
    /// A suggestion is held until the user accepts or rejects it.
    AwaitingDecision { suggestion: Suggestion },
    /// The accepted suggestion is being written to history.
    Committing { suggestion: Suggestion },
}

impl WorkflowState {
    pub fn label(&self) -> &'static str {
        match self {
            WorkflowState::Idle => "idle",
            WorkflowState::Pending { .. } => "pending",
            WorkflowState::AwaitingDecision { .. } => "awaiting decision",
            WorkflowState::Committing { .. } => "committing",
        }
    }
}

/// Request a suggestion, let the user decide, commit on acceptance.
///
/// Only one cycle runs at a time. Calls that do not fit the current state
/// fail with [`ValidationError::OutOfOrder`] and leave the state alone. A
/// failed commit returns to [`WorkflowState::AwaitingDecision`] with the same
/// suggestion so `accept` can simply be called again.
pub struct SuggestionWorkflow<S> {
    service: Arc<S>,
    state: Mutex<WorkflowState>,
}

impl<S: GiftService> SuggestionWorkflow<S> {
    pub fn new(service: Arc<S>) -> Self {
        Self {
            service,
            state: Mutex::new(WorkflowState::Idle),
        }
    }

    /// Snapshot of the current state for rendering.
    pub fn state(&self) -> WorkflowState {
        self.lock().clone()
    }

    /// The suggestion awaiting a decision or being committed, if any.
    pub fn pending(&self) -> Option<Suggestion> {
        match &*self.lock() {
            WorkflowState::AwaitingDecision { suggestion }
            | WorkflowState::Committing { suggestion } => Some(suggestion.clone()),
            _ => None,
        }
    }

    pub async fn request_suggestion(&self, friend: &Friend, sentiment: &str) -> Result<Suggestion> {
        let action = WorkflowAction::RequestSuggestion;
        {
            let mut state = self.lock();
            if !matches!(*state, WorkflowState::Idle) {
                return Err(out_of_order(action, &state));
            }
            if friend.name.trim().is_empty() {
                return Err(ValidationError::MissingRecipient.into());
            }
            if sentiment.trim().is_empty() {
                return Err(ValidationError::BlankField { field: "sentiment" }.into());
            }
            *state = WorkflowState::Pending {
                friend: friend.name.clone(),
            };
        }
        debug!(friend = %friend.name, %sentiment, "requesting suggestion");

        let rollback = Rollback::new(&self.state, WorkflowState::Idle);
        let req = SuggestionRequest::for_friend(friend, sentiment);
        match self.service.suggest_gift(&req).await {
            Ok(mut suggestion) => {
                if suggestion.recipient != friend.name {
                    warn!(
                        requested = %friend.name,
                        returned = %suggestion.recipient,
                        "suggestion names a different recipient"
                    );
                }
                if suggestion.sentiment.is_none() {
                    suggestion.sentiment = Some(sentiment.to_string());
                }
                info!(
                    recipient = %suggestion.recipient,
                    gift = %suggestion.suggested_gift,
                    "awaiting decision"
                );
                rollback.finish(WorkflowState::AwaitingDecision {
                    suggestion: suggestion.clone(),
                });
                Ok(suggestion)
            }
            Err(e) => {
                rollback.finish(WorkflowState::Idle);
                Err(e)
            }
        }
    }

    /// Commit the held suggestion to history.
    pub async fn accept(&self) -> Result<Suggestion> {
        let suggestion = {
            let mut state = self.lock();
            let WorkflowState::AwaitingDecision { suggestion } = &*state else {
                return Err(out_of_order(WorkflowAction::Accept, &state));
            };
            let suggestion = suggestion.clone();
            *state = WorkflowState::Committing {
                suggestion: suggestion.clone(),
            };
            suggestion
        };

        let rollback = Rollback::new(
            &self.state,
            WorkflowState::AwaitingDecision {
                suggestion: suggestion.clone(),
            },
        );
        match self.service.save_history(&suggestion).await {
            Ok(()) => {
                info!(
                    recipient = %suggestion.recipient,
                    gift = %suggestion.suggested_gift,
                    "suggestion committed"
                );
                rollback.finish(WorkflowState::Idle);
                Ok(suggestion)
            }
            Err(e) => {
                warn!(recipient = %suggestion.recipient, error = %e, "commit failed, decision kept");
                rollback.finish(WorkflowState::AwaitingDecision {
                    suggestion: suggestion.clone(),
                });
                Err(e)
            }
        }
    }

    /// Discard the held suggestion without touching history.
    pub fn reject(&self) -> Result<Suggestion> {
        self.discard(WorkflowAction::Reject)
    }

    /// Give up on a suggestion whose commit keeps failing.
    pub fn abandon(&self) -> Result<Suggestion> {
        self.discard(WorkflowAction::Abandon)
    }

    fn discard(&self, action: WorkflowAction) -> Result<Suggestion> {
        let mut state = self.lock();
        match std::mem::take(&mut *state) {
            WorkflowState::AwaitingDecision { suggestion } => {
                info!(recipient = %suggestion.recipient, %action, "suggestion discarded");
                Ok(suggestion)
            }
            other => {
                let err = out_of_order(action, &other);
                *state = other;
                Err(err)
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, WorkflowState> {
        lock(&self.state)
    }
}

fn lock(state: &Mutex<WorkflowState>) -> MutexGuard<'_, WorkflowState> {
    state.lock().unwrap_or_else(|e| e.into_inner())
}

fn out_of_order(action: WorkflowAction, state: &WorkflowState) -> crate::GiftError {
    ValidationError::OutOfOrder {
        action,
        state: state.label(),
    }
    .into()
}

/// Restores a stable state if an in-flight call is dropped before it
/// resolves.
struct Rollback<'a> {
    state: &'a Mutex<WorkflowState>,
    fallback: Option<WorkflowState>,
}

impl<'a> Rollback<'a> {
    fn new(state: &'a Mutex<WorkflowState>, fallback: WorkflowState) -> Self {
        Self {
            state,
            fallback: Some(fallback),
        }
    }

    fn finish(mut self, next: WorkflowState) {
        self.fallback = None;
        *lock(self.state) = next;
    }
}

impl Drop for Rollback<'_> {
    fn drop(&mut self) {
        if let Some(fallback) = self.fallback.take() {
            debug!(state = fallback.label(), "call dropped, rolling back");
            *lock(self.state) = fallback;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::GiftError;
    use crate::error::Operation;
    use crate::test_helpers::RecordingService;
    use chrono::NaiveDate;
    use tracing_test::traced_test;

    fn emily() -> Friend {
        Friend::new("Emily Wong", NaiveDate::from_ymd_opt(2025, 7, 12).unwrap())
    }

    fn workflow() -> (Arc<RecordingService>, SuggestionWorkflow<RecordingService>) {
        let svc = Arc::new(RecordingService::new("Scented candle set"));
        (svc.clone(), SuggestionWorkflow::new(svc))
    }

    fn is_out_of_order(err: &GiftError) -> bool {
        matches!(
            err,
            GiftError::Validation(ValidationError::OutOfOrder { .. })
        )
    }

    #[tokio::test]
    async fn successful_request_awaits_decision() {
        let (_svc, wf) = workflow();
        let s = wf.request_suggestion(&emily(), "close friend").await.unwrap();
        assert_eq!(s.recipient, "Emily Wong");
        assert_eq!(s.sentiment.as_deref(), Some("close friend"));
        assert_eq!(
            wf.state(),
            WorkflowState::AwaitingDecision { suggestion: s.clone() }
        );
        assert_eq!(wf.pending(), Some(s));
    }

    #[tokio::test]
    async fn failed_request_returns_to_idle() {
        let (svc, wf) = workflow();
        svc.fail_next(Operation::SuggestGift, None);
        let err = wf.request_suggestion(&emily(), "close friend").await.unwrap_err();
        assert_eq!(err.reason(), "Could not suggest a gift.");
        assert_eq!(wf.state(), WorkflowState::Idle);
    }

    #[tokio::test]
    async fn reject_never_saves_history() {
        let (svc, wf) = workflow();
        wf.request_suggestion(&emily(), "close friend").await.unwrap();
        let dropped = wf.reject().unwrap();
        assert_eq!(dropped.suggested_gift, "Scented candle set");
        assert_eq!(wf.state(), WorkflowState::Idle);
        assert_eq!(svc.calls(Operation::SaveHistory), 0);
        assert!(svc.history.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn failed_commit_keeps_suggestion_for_retry() {
        let (svc, wf) = workflow();
        let s = wf.request_suggestion(&emily(), "close friend").await.unwrap();
        svc.fail_next(Operation::SaveHistory, Some("database locked"));

        let err = wf.accept().await.unwrap_err();
        assert_eq!(err.reason(), "database locked");
        assert_eq!(
            wf.state(),
            WorkflowState::AwaitingDecision { suggestion: s.clone() }
        );

        let committed = wf.accept().await.unwrap();
        assert_eq!(committed, s);
        assert_eq!(wf.state(), WorkflowState::Idle);
        assert_eq!(svc.calls(Operation::SaveHistory), 2);
        assert_eq!(svc.saved.lock().unwrap().as_slice(), &[s]);
    }

    #[traced_test]
    #[tokio::test]
    async fn failed_commit_is_logged_and_returned() {
        let (svc, wf) = workflow();
        wf.request_suggestion(&emily(), "close friend").await.unwrap();
        svc.fail_next(Operation::SaveHistory, None);
        assert!(wf.accept().await.is_err());
        assert!(logs_contain("commit failed, decision kept"));
    }

    #[tokio::test]
    async fn abandon_after_failed_commit() {
        let (svc, wf) = workflow();
        wf.request_suggestion(&emily(), "mentor").await.unwrap();
        svc.fail_next(Operation::SaveHistory, None);
        assert!(wf.accept().await.is_err());
        wf.abandon().unwrap();
        assert_eq!(wf.state(), WorkflowState::Idle);
        assert!(svc.saved.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn decisions_without_a_suggestion_are_out_of_order() {
        let (svc, wf) = workflow();
        assert!(is_out_of_order(&wf.accept().await.unwrap_err()));
        assert!(is_out_of_order(&wf.reject().unwrap_err()));
        assert!(is_out_of_order(&wf.abandon().unwrap_err()));
        assert_eq!(svc.total_calls(), 0);
        assert_eq!(wf.state(), WorkflowState::Idle);
    }

    #[tokio::test]
    async fn second_request_while_awaiting_is_rejected() {
        let (svc, wf) = workflow();
        let s = wf.request_suggestion(&emily(), "close friend").await.unwrap();
        let err = wf.request_suggestion(&emily(), "close friend").await.unwrap_err();
        assert!(is_out_of_order(&err));
        assert_eq!(svc.calls(Operation::SuggestGift), 1);
        assert_eq!(wf.pending(), Some(s));
    }

    #[tokio::test]
    async fn accept_while_pending_is_rejected() {
        let (_svc, wf) = workflow();
        let friend = emily();
        let request = wf.request_suggestion(&friend, "close friend");
        tokio::pin!(request);
        tokio::select! {
            biased;
            _ = &mut request => panic!("request resolved before the probe"),
            _ = std::future::ready(()) => {}
        }
        assert!(matches!(wf.state(), WorkflowState::Pending { .. }));
        assert!(is_out_of_order(&wf.accept().await.unwrap_err()));
        assert!(is_out_of_order(&wf.reject().unwrap_err()));

        request.await.unwrap();
        assert!(matches!(wf.state(), WorkflowState::AwaitingDecision { .. }));
    }

    #[tokio::test]
    async fn blank_inputs_fail_without_network() {
        let (svc, wf) = workflow();
        let nameless = Friend::new("  ", NaiveDate::from_ymd_opt(2025, 7, 12).unwrap());
        assert!(matches!(
            wf.request_suggestion(&nameless, "close friend").await,
            Err(GiftError::Validation(ValidationError::MissingRecipient))
        ));
        assert!(matches!(
            wf.request_suggestion(&emily(), " ").await,
            Err(GiftError::Validation(ValidationError::BlankField { .. }))
        ));
        assert_eq!(svc.total_calls(), 0);
        assert_eq!(wf.state(), WorkflowState::Idle);
    }

    #[tokio::test]
    async fn dropped_request_rolls_back_to_idle() {
        let (_svc, wf) = workflow();
        let friend = emily();
        {
            let request = wf.request_suggestion(&friend, "close friend");
            tokio::pin!(request);
            tokio::select! {
                biased;
                _ = &mut request => panic!("request resolved before being dropped"),
                _ = std::future::ready(()) => {}
            }
            assert!(matches!(wf.state(), WorkflowState::Pending { .. }));
        }
        assert_eq!(wf.state(), WorkflowState::Idle);
    }

    #[tokio::test]
    async fn dropped_accept_rolls_back_to_awaiting_decision() {
        let (svc, wf) = workflow();
        let s = wf.request_suggestion(&emily(), "close friend").await.unwrap();
        svc.delay_saves(Some(std::time::Duration::from_millis(500)));

        let res = tokio::time::timeout(std::time::Duration::from_millis(50), wf.accept()).await;
        assert!(res.is_err());
        assert_eq!(wf.pending(), Some(s.clone()));
        assert!(svc.saved.lock().unwrap().is_empty());

        svc.delay_saves(None);
        assert_eq!(wf.accept().await.unwrap(), s);
        assert_eq!(wf.state(), WorkflowState::Idle);
        assert_eq!(svc.calls(Operation::SaveHistory), 2);
        assert_eq!(svc.saved.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn service_sentiment_echo_is_kept() {
        struct Echo;
        #[async_trait::async_trait]
        impl GiftService for Echo {
            async fn list_friends(&self) -> Result<Vec<Friend>> {
                Ok(vec![])
            }
            async fn add_friend(&self, _f: &crate::models::NewFriend) -> Result<Friend> {
                unreachable!()
            }
            async fn suggest_gift(&self, req: &SuggestionRequest) -> Result<Suggestion> {
                Ok(Suggestion {
                    recipient: req.name.clone(),
                    suggested_gift: "Elegant pen".into(),
                    sentiment: Some("Mentor".into()),
                })
            }
            async fn save_history(&self, _e: &Suggestion) -> Result<()> {
                Ok(())
            }
            async fn list_history(&self, _r: &str) -> Result<Vec<crate::HistoryEntry>> {
                Ok(vec![])
            }
            async fn checkout(
                &self,
                _r: &crate::models::CheckoutRequest,
            ) -> Result<crate::models::CheckoutResult> {
                unreachable!()
            }
            async fn render_postcard(
                &self,
                _r: &crate::models::PostcardRequest,
            ) -> Result<crate::models::PostcardResult> {
                unreachable!()
            }
            async fn email_postcard(
                &self,
                _r: &crate::models::PostcardEmailRequest,
            ) -> Result<crate::models::EmailResult> {
                unreachable!()
            }
        }
        let wf = SuggestionWorkflow::new(Arc::new(Echo));
        let s = wf.request_suggestion(&emily(), "mentor").await.unwrap();
        assert_eq!(s.sentiment.as_deref(), Some("Mentor"));
    }
}
