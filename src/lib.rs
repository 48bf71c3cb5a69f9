//! Appeal Desk: a conversational intake bot for student appeals.
//!
//! Users are walked through a fixed dialogue on Telegram; a confirmed appeal
//! is forwarded to an operator chat and to a corporate mailbox.

pub mod channels;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod intake;
pub mod logging;
