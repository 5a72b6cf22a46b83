//! Core cartchat library (agent client, stream interpretation, session, config).

pub mod client;
pub mod config;
pub mod error;
pub mod fallback;
pub mod interpret;
pub mod markup;
pub mod session;
pub mod sse;
pub mod turn;

pub use client::{AgentClient, AgentReply, RunRequest};
pub use config::Config;
pub use error::{ClientError, ClientErrorKind, ClientResult};
pub use interpret::{ProgressUpdate, ResponseInterpreter, TurnPhase};
pub use session::{AgentBackend, ChatSession, Notification, Notifier, TurnOutcome};
pub use sse::{SseEvent, SseReader};
pub use turn::{Discard, ProgressSink, interpret_stream};
