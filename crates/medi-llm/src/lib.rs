//! # medi-llm
//!
//! Chat-completion transport and incremental response parsing.
//!
//! - [`ChatTransport`]: sends the conversation context, returns the raw stream
//! - [`HttpChatTransport`]: reqwest implementation with status classification
//! - [`EventParser`]: byte chunks to text fragments, tolerant of arbitrary
//!   chunk boundaries and records split by stray line breaks
//! - [`fragment_stream`]: drives the parser over a [`ByteStream`]

#![deny(unsafe_code)]

pub mod error;
pub mod error_parsing;
pub mod sse;
pub mod transport;

pub use error::{TransportError, TransportResult};
pub use error_parsing::{ApiErrorInfo, parse_api_error};
pub use sse::{EventParser, FragmentStream, ParserState, fragment_stream};
pub use transport::{
    ByteStream, ChatResponse, ChatTransport, HttpChatTransport, HttpTransportConfig,
    MEDICAL_SYSTEM_PROMPT, validate_context,
};
