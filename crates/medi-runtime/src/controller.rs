//! `SessionController`: one send cycle per submitted input.
//!
//! The cycle appends the user message, resolves the conversation and records
//! the user turn, sends the full transcript, folds fragments into the
//! transcript, and records the reply. Persistence failures raise a notice and
//! never stop the stream. Transport failures end the cycle in `Errored`.
//! Every path returns to `Idle` and clears the busy flag.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use futures::StreamExt;
use medi_core::conversation::{ConversationSummary, Identity};
use medi_core::ids::ConversationId;
use medi_core::messages::Message;
use medi_core::text::take_chars;
use medi_llm::{ChatTransport, TransportError};
use medi_settings::MediSettings;
use medi_store::{HistoryLimits, PersistenceRouter};
use parking_lot::Mutex;
use tokio::sync::{broadcast, watch};
use tracing::{debug, error, info, instrument, warn};

use crate::errors::{Result, SessionError};
use crate::events::{EventEmitter, SessionEvent};
use crate::identity::IdentityHandle;
use crate::notice::{Notice, NoticeKind};
use crate::state::SessionState;
use crate::transcript::{Transcript, TranscriptUpdate};

/// Resets the busy flag on drop, including on panic.
struct BusyGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> BusyGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| Self { flag })
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

/// Controller tunables.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SessionConfig {
    /// Characters of the first input used as the conversation title.
    pub title_chars: usize,
    /// Listing limits handed to the router.
    pub history: HistoryLimits,
}

impl SessionConfig {
    /// Values from loaded settings.
    pub fn from_settings(settings: &MediSettings) -> Self {
        Self {
            title_chars: settings.history.title_chars,
            history: HistoryLimits {
                preview_limit: settings.history.preview_limit,
                preview_chars: settings.history.preview_chars,
            },
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            title_chars: 50,
            history: HistoryLimits::default(),
        }
    }
}

/// How a cycle ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TurnStatus {
    /// The stream finished normally.
    Completed,
    /// The send or the stream failed.
    Failed,
}

/// Result of one accepted submission.
#[derive(Clone, Debug)]
pub struct TurnOutcome {
    /// How the cycle ended.
    pub status: TurnStatus,
    /// Conversation the turns were recorded to, if one could be resolved.
    pub conversation_id: Option<ConversationId>,
    /// Assistant text accumulated during the cycle.
    pub reply: String,
    /// Notices raised, in order.
    pub notices: Vec<Notice>,
}

impl TurnOutcome {
    /// Whether the stream finished normally.
    pub fn is_completed(&self) -> bool {
        self.status == TurnStatus::Completed
    }

    /// Whether a notice of `kind` was raised.
    pub fn has_notice(&self, kind: NoticeKind) -> bool {
        self.notices.iter().any(|n| n.kind == kind)
    }
}

struct Session {
    state: SessionState,
    transcript: Transcript,
    conversation_id: Option<ConversationId>,
}

/// Drives send cycles for one chat session.
pub struct SessionController {
    transport: Arc<dyn ChatTransport>,
    router: PersistenceRouter,
    config: SessionConfig,
    identity: IdentityHandle,
    identity_rx: Mutex<watch::Receiver<Identity>>,
    emitter: EventEmitter,
    session: Mutex<Session>,
    busy: AtomicBool,
}

impl SessionController {
    /// Controller over `transport` and `router`, following `identity`.
    pub fn new(
        transport: Arc<dyn ChatTransport>,
        router: PersistenceRouter,
        identity: IdentityHandle,
        config: SessionConfig,
    ) -> Self {
        let identity_rx = Mutex::new(identity.subscribe());
        Self {
            transport,
            router,
            config,
            identity,
            identity_rx,
            emitter: EventEmitter::new(),
            session: Mutex::new(Session {
                state: SessionState::Idle,
                transcript: Transcript::new(),
                conversation_id: None,
            }),
            busy: AtomicBool::new(false),
        }
    }

    /// Receiver for state, transcript and notice events.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.emitter.subscribe()
    }

    /// Current state.
    pub fn state(&self) -> SessionState {
        self.session.lock().state
    }

    /// Whether a cycle is in flight.
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }

    /// Snapshot of the transcript.
    pub fn messages(&self) -> Vec<Message> {
        self.session.lock().transcript.messages().to_vec()
    }

    /// Conversation the session is writing to.
    pub fn conversation_id(&self) -> Option<ConversationId> {
        self.session.lock().conversation_id.clone()
    }

    /// Identity the next cycle will use.
    pub fn identity(&self) -> Identity {
        self.identity.current()
    }

    /// The persistence router.
    pub fn router(&self) -> &PersistenceRouter {
        &self.router
    }

    /// Switch identity. Transcript and conversation reset; nothing migrates.
    pub fn set_identity(&self, identity: Identity) -> Result<()> {
        let _guard = self.acquire("identity switch")?;
        let _ = self.identity.set(identity);
        let _ = self.sync_identity();
        Ok(())
    }

    /// Forget the current conversation and start an empty transcript.
    pub fn start_new_conversation(&self) -> Result<()> {
        let _guard = self.acquire("new conversation")?;
        self.reset();
        info!(identity = %self.identity.current().label(), "started new conversation");
        Ok(())
    }

    /// Conversations owned by the current identity.
    pub async fn list_conversations(&self) -> Result<Vec<ConversationSummary>> {
        let identity = self.identity.current();
        Ok(self.router.list_conversations(&identity).await?)
    }

    /// Delete a conversation owned by the current identity.
    ///
    /// Deleting the conversation in progress resets the session, and is
    /// rejected with [`SessionError::Busy`] while a cycle is writing to it.
    pub async fn delete_conversation(&self, id: &ConversationId) -> Result<bool> {
        let is_current = self.session.lock().conversation_id.as_ref() == Some(id);
        let _guard = if is_current {
            Some(self.acquire("delete current conversation")?)
        } else {
            None
        };
        let identity = self.identity.current();
        let removed = self.router.delete_conversation(&identity, id).await?;
        if removed && is_current {
            self.reset();
        }
        Ok(removed)
    }

    /// Run one send cycle for `input`.
    ///
    /// Rejected with [`SessionError::Busy`] while another cycle runs and with
    /// [`SessionError::EmptyInput`] for blank input. Every accepted input
    /// runs to `Idle` and reports how it ended in the returned outcome.
    #[instrument(skip_all, fields(chars = input.chars().count()))]
    pub async fn submit(&self, input: &str) -> Result<TurnOutcome> {
        if input.trim().is_empty() {
            return Err(SessionError::EmptyInput);
        }
        let _guard = self.acquire("submission")?;
        let identity = self.sync_identity();
        let mut notices = Vec::new();

        // Optimistic append: the context is the full transcript including it.
        let (update, context, title_hint, existing) = {
            let mut session = self.session.lock();
            let title_hint = session
                .transcript
                .is_empty()
                .then(|| take_chars(input, self.config.title_chars).to_string());
            let update = session.transcript.push_user(input);
            (
                update,
                session.transcript.messages().to_vec(),
                title_hint,
                session.conversation_id.clone(),
            )
        };
        self.emit_transcript(update);

        self.set_state(SessionState::ConversationResolving);
        let conversation = match self
            .router
            .resolve_conversation(&identity, existing.as_ref(), title_hint.as_deref())
            .await
        {
            Ok(id) => {
                if existing.as_ref() != Some(&id) {
                    self.session.lock().conversation_id = Some(id.clone());
                    let _ = self.emitter.emit(SessionEvent::ConversationResolved {
                        conversation_id: id.clone(),
                    });
                }
                Some(id)
            }
            Err(e) => {
                error!(identity = %identity.label(), error = %e, "failed to resolve conversation");
                self.raise(&mut notices, NoticeKind::PersistenceFailure);
                None
            }
        };
        if let Some(id) = &conversation {
            self.persist(&identity, id, &Message::user(input), &mut notices)
                .await;
        }

        self.set_state(SessionState::AwaitingFirstByte);
        let response = match self.transport.send(&context).await {
            Ok(response) => response,
            Err(e) => {
                warn!(category = e.category(), error = %e, "send failed");
                return Ok(self.fail(&e, conversation, String::new(), notices));
            }
        };
        debug!(status = response.status, "stream opened");

        self.set_state(SessionState::Streaming);
        let mut fragments = response.into_fragments();
        while let Some(item) = fragments.next().await {
            match item {
                Ok(fragment) => {
                    let update = self.session.lock().transcript.apply_fragment(&fragment);
                    self.emit_transcript(update);
                }
                Err(e) => {
                    let reply = self.session.lock().transcript.close_turn();
                    warn!(
                        category = e.category(),
                        error = %e,
                        kept_chars = reply.chars().count(),
                        "stream failed mid-response"
                    );
                    return Ok(self.fail(&e, conversation, reply, notices));
                }
            }
        }
        let reply = self.session.lock().transcript.close_turn();

        self.set_state(SessionState::Persisting);
        match &conversation {
            Some(id) if !reply.is_empty() => {
                self.persist(&identity, id, &Message::assistant(reply.clone()), &mut notices)
                    .await;
            }
            _ => debug!(empty = reply.is_empty(), "assistant turn not recorded"),
        }

        self.set_state(SessionState::Idle);
        info!(
            conversation_id = ?conversation.as_ref().map(ConversationId::as_str),
            reply_chars = reply.chars().count(),
            "turn completed"
        );
        Ok(TurnOutcome {
            status: TurnStatus::Completed,
            conversation_id: conversation,
            reply,
            notices,
        })
    }

    fn acquire(&self, operation: &'static str) -> Result<BusyGuard<'_>> {
        BusyGuard::acquire(&self.busy).ok_or_else(|| {
            let err = SessionError::Busy;
            warn!(operation, category = err.category(), "rejected: cycle in flight");
            err
        })
    }

    /// Pick up an identity change, resetting the session if there was one.
    fn sync_identity(&self) -> Identity {
        let changed = {
            let mut rx = self.identity_rx.lock();
            if rx.has_changed().unwrap_or(false) {
                Some(rx.borrow_and_update().clone())
            } else {
                None
            }
        };
        match changed {
            Some(identity) => {
                self.reset();
                info!(identity = %identity.label(), "identity changed, session reset");
                let _ = self.emitter.emit(SessionEvent::IdentityChanged {
                    identity: identity.clone(),
                });
                identity
            }
            None => self.identity.current(),
        }
    }

    fn reset(&self) {
        let update = {
            let mut session = self.session.lock();
            session.conversation_id = None;
            session.transcript.clear()
        };
        self.emit_transcript(update);
    }

    async fn persist(
        &self,
        identity: &Identity,
        conversation: &ConversationId,
        message: &Message,
        notices: &mut Vec<Notice>,
    ) {
        if let Err(e) = self.router.record_turn(identity, conversation, message).await {
            error!(
                conversation_id = %conversation,
                role = %message.role,
                error = %e,
                "failed to record turn"
            );
            self.raise(notices, NoticeKind::PersistenceFailure);
        }
    }

    fn fail(
        &self,
        error: &TransportError,
        conversation: Option<ConversationId>,
        reply: String,
        mut notices: Vec<Notice>,
    ) -> TurnOutcome {
        self.set_state(SessionState::Errored);
        self.raise(&mut notices, NoticeKind::for_transport(error));
        self.set_state(SessionState::Idle);
        TurnOutcome {
            status: TurnStatus::Failed,
            conversation_id: conversation,
            reply,
            notices,
        }
    }

    fn raise(&self, notices: &mut Vec<Notice>, kind: NoticeKind) {
        let notice = Notice::new(kind);
        notices.push(notice);
        let _ = self.emitter.emit(SessionEvent::Notice { notice });
    }

    fn set_state(&self, state: SessionState) {
        self.session.lock().state = state;
        debug!(%state, "state changed");
        let _ = self.emitter.emit(SessionEvent::StateChanged { state });
    }

    fn emit_transcript(&self, update: TranscriptUpdate) {
        let _ = self.emitter.emit(SessionEvent::Transcript { update });
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
