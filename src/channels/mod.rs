//! Transport channels: where updates come from and where replies go.

pub mod email;
pub mod router;
pub mod telegram;

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;

use crate::error::ChannelError;
use crate::intake::event::InboundEvent;
use crate::intake::reply::Reply;

pub use router::ConversationRouter;

/// One inbound update, already classified into an [`InboundEvent`].
#[derive(Debug, Clone)]
pub struct IncomingUpdate {
    /// Identity the session is keyed by.
    pub user_id: String,
    /// Chat the replies go to.
    pub chat_id: i64,
    pub user_name: Option<String>,
    pub event: InboundEvent,
    /// Set for button presses; acknowledged before replying.
    pub callback_id: Option<String>,
}

impl IncomingUpdate {
    pub fn new(user_id: impl Into<String>, chat_id: i64, event: InboundEvent) -> Self {
        Self {
            user_id: user_id.into(),
            chat_id,
            user_name: None,
            event,
            callback_id: None,
        }
    }

    pub fn with_user_name(mut self, name: impl Into<String>) -> Self {
        self.user_name = Some(name.into());
        self
    }

    pub fn with_callback_id(mut self, id: impl Into<String>) -> Self {
        self.callback_id = Some(id.into());
        self
    }
}

pub type UpdateStream = Pin<Box<dyn Stream<Item = IncomingUpdate> + Send>>;

/// A conversational transport.
#[async_trait]
pub trait Channel: Send + Sync {
    fn name(&self) -> &str;

    /// Start receiving updates.
    async fn start(&self) -> Result<UpdateStream, ChannelError>;

    /// Deliver the replies produced for `update`, in order.
    async fn respond(&self, update: &IncomingUpdate, replies: Vec<Reply>)
    -> Result<(), ChannelError>;

    async fn health_check(&self) -> Result<(), ChannelError>;

    async fn shutdown(&self) -> Result<(), ChannelError> {
        Ok(())
    }
}
