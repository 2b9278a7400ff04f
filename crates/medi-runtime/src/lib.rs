//! # medi-runtime
//!
//! The chat session engine:
//!
//! - [`SessionController`]: the per-input send cycle and its state machine
//! - [`Transcript`]: ordered messages with a single open assistant turn
//! - [`EventEmitter`]: broadcast of [`SessionEvent`]s to presentation layers
//! - [`IdentityHandle`]: watch channel over the current [`Identity`](medi_core::Identity)
//! - [`Notice`]: fixed user-facing texts for failures

#![deny(unsafe_code)]

pub mod controller;
pub mod errors;
pub mod events;
pub mod identity;
pub mod notice;
pub mod state;
pub mod transcript;

pub use controller::{SessionConfig, SessionController, TurnOutcome, TurnStatus};
pub use errors::{Result, SessionError};
pub use events::{EventEmitter, SessionEvent};
pub use identity::IdentityHandle;
pub use notice::{Notice, NoticeKind};
pub use state::SessionState;
pub use transcript::{Transcript, TranscriptUpdate};
