//! Conversational appeal intake: validators, the appeal model, and the
//! dialogue state machine driven per user session.

pub mod engine;
pub mod event;
pub mod model;
pub mod prompts;
pub mod reply;
pub mod session;
pub mod state;
pub mod validate;

pub use engine::IntakeEngine;
pub use event::{Command, InboundEvent, Trigger};
pub use model::{Appeal, AttachmentKind, AttachmentRef, Category, IncomingAttachment};
pub use reply::{Layout, Reply, TextStyle};
pub use session::SessionStore;
pub use state::{DialogueState, Stage};
