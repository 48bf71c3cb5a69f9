//! Intake engine: apply one inbound event to a user's session.

use std::sync::Arc;

use tracing::{debug, info};

use super::event::InboundEvent;
use super::prompts;
use super::reply::{Layout, Reply, TextStyle};
use super::session::SessionStore;
use super::state::{Outcome, transition};
use crate::dispatch::Dispatcher;

pub struct IntakeEngine {
    sessions: Arc<SessionStore>,
    dispatcher: Arc<Dispatcher>,
    style: TextStyle,
}

impl IntakeEngine {
    pub fn new(sessions: Arc<SessionStore>, dispatcher: Arc<Dispatcher>, style: TextStyle) -> Self {
        Self {
            sessions,
            dispatcher,
            style,
        }
    }

    /// Process one event for `user_id` and return the replies to show.
    ///
    /// The session stays locked for the whole step, including dispatch, so a
    /// user's events never interleave.
    pub async fn handle(&self, user_id: &str, event: InboundEvent) -> Vec<Reply> {
        let mut session = self.sessions.lock(user_id).await;
        let from = session.state.stage();
        let event_kind = event.label();

        let state = std::mem::take(&mut session.state);
        let step = transition(state, event, self.style);
        debug!(user_id, event = event_kind, %from, to = %step.outcome.stage(), "Transition");

        let mut replies = step.replies;
        match step.outcome {
            Outcome::Continue(next) => {
                session.state = next;
                session.touch();
            }
            Outcome::Dispatch(appeal) => {
                info!(user_id, appeal_id = %appeal.id, "Appeal submitted");
                // The submitter hears the same thing however delivery went.
                let _report = self.dispatcher.dispatch(&appeal).await;
                self.sessions.close(session).await;
                replies.push(Reply::new(
                    prompts::dispatched(self.style),
                    Layout::None,
                    self.style,
                ));
            }
            Outcome::Cancelled => {
                info!(user_id, "Appeal cancelled");
                self.sessions.close(session).await;
            }
        }
        replies
    }
}
