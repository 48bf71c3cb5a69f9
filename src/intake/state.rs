//! Dialogue state machine for the appeal intake.
//!
//! Progresses linearly: AwaitingAgreement → MainMenu → SelectingCategory →
//! EnteringTopic → EnteringBody → UploadingAttachments → EnteringName →
//! EnteringContact → Confirming → (Dispatched | Cancelled).
//!
//! Each [`DialogueState`] variant carries exactly the fields collected up to
//! that point. [`transition`] is pure: it consumes the current state and one
//! event and returns the outcome plus the replies to show. Running the
//! dispatch effect is left to the engine.

use serde::{Deserialize, Serialize};

use super::event::{Command, InboundEvent, Trigger};
use super::model::{Appeal, AttachmentBuffer, AttachmentRef, Category};
use super::prompts::{self, SummaryFields};
use super::reply::{Layout, Reply, TextStyle};
use super::validate::{validate_body, validate_contact, validate_name, validate_topic};

/// Flat view of the dialogue position, including the terminal stages that
/// have no state of their own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    AwaitingAgreement,
    MainMenu,
    SelectingCategory,
    EnteringTopic,
    EnteringBody,
    UploadingAttachments,
    EnteringName,
    EnteringContact,
    Confirming,
    Dispatched,
    Cancelled,
}

impl Stage {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Dispatched | Self::Cancelled)
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::AwaitingAgreement => "awaiting_agreement",
            Self::MainMenu => "main_menu",
            Self::SelectingCategory => "selecting_category",
            Self::EnteringTopic => "entering_topic",
            Self::EnteringBody => "entering_body",
            Self::UploadingAttachments => "uploading_attachments",
            Self::EnteringName => "entering_name",
            Self::EnteringContact => "entering_contact",
            Self::Confirming => "confirming",
            Self::Dispatched => "dispatched",
            Self::Cancelled => "cancelled",
        };
        write!(f, "{s}")
    }
}

/// Category, topic and body: the part of the appeal fixed before uploads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Draft {
    pub category: Category,
    pub topic: String,
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum DialogueState {
    #[default]
    AwaitingAgreement,
    MainMenu,
    SelectingCategory,
    EnteringTopic {
        category: Category,
    },
    EnteringBody {
        category: Category,
        topic: String,
    },
    UploadingAttachments {
        draft: Draft,
        attachments: AttachmentBuffer,
    },
    EnteringName {
        draft: Draft,
        attachments: Vec<AttachmentRef>,
    },
    EnteringContact {
        draft: Draft,
        attachments: Vec<AttachmentRef>,
        submitter_name: String,
    },
    Confirming {
        draft: Draft,
        attachments: Vec<AttachmentRef>,
        submitter_name: String,
        contact_method: String,
    },
}

impl DialogueState {
    pub fn stage(&self) -> Stage {
        match self {
            Self::AwaitingAgreement => Stage::AwaitingAgreement,
            Self::MainMenu => Stage::MainMenu,
            Self::SelectingCategory => Stage::SelectingCategory,
            Self::EnteringTopic { .. } => Stage::EnteringTopic,
            Self::EnteringBody { .. } => Stage::EnteringBody,
            Self::UploadingAttachments { .. } => Stage::UploadingAttachments,
            Self::EnteringName { .. } => Stage::EnteringName,
            Self::EnteringContact { .. } => Stage::EnteringContact,
            Self::Confirming { .. } => Stage::Confirming,
        }
    }
}

/// What the session should do after an event.
#[derive(Debug, Clone)]
pub enum Outcome {
    /// Keep the session in the given state.
    Continue(DialogueState),
    /// `send` confirmed: deliver this appeal, then close the session.
    Dispatch(Box<Appeal>),
    /// `cancel` confirmed: close the session without delivery.
    Cancelled,
}

impl Outcome {
    pub fn stage(&self) -> Stage {
        match self {
            Self::Continue(state) => state.stage(),
            Self::Dispatch(_) => Stage::Dispatched,
            Self::Cancelled => Stage::Cancelled,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Transition {
    pub outcome: Outcome,
    pub replies: Vec<Reply>,
}

impl Transition {
    fn stay(state: DialogueState, replies: Vec<Reply>) -> Self {
        Self {
            outcome: Outcome::Continue(state),
            replies,
        }
    }

    fn silent(state: DialogueState) -> Self {
        Self::stay(state, Vec::new())
    }
}

/// Apply one event to the current state.
pub fn transition(state: DialogueState, event: InboundEvent, style: TextStyle) -> Transition {
    let reply = |text: String, layout: Layout| vec![Reply::new(text, layout, style)];
    let not_understood = |state: DialogueState| {
        Transition::stay(
            state,
            vec![Reply::new(prompts::not_understood(style), Layout::None, style)],
        )
    };

    match event {
        InboundEvent::Command(Command::Restart) => {
            return Transition::stay(
                DialogueState::AwaitingAgreement,
                reply(prompts::agreement(style), Layout::Agreement),
            );
        }
        InboundEvent::Command(Command::Help) => {
            return Transition::stay(state, reply(prompts::help(style), Layout::None));
        }
        _ => {}
    }

    match state {
        DialogueState::AwaitingAgreement => match event {
            InboundEvent::Button(Trigger::Accept) => Transition::stay(
                DialogueState::MainMenu,
                reply(prompts::agreement_accepted(style), Layout::MainMenu),
            ),
            _ => Transition::stay(
                DialogueState::AwaitingAgreement,
                reply(prompts::agreement(style), Layout::Agreement),
            ),
        },

        DialogueState::MainMenu => match event {
            InboundEvent::Button(Trigger::NewAppeal) => Transition::stay(
                DialogueState::SelectingCategory,
                reply(prompts::choose_category(style), Layout::CategoryList),
            ),
            _ => not_understood(DialogueState::MainMenu),
        },

        DialogueState::SelectingCategory => match event {
            InboundEvent::Button(Trigger::SelectCategory(index)) => {
                match Category::from_index(index) {
                    Some(category) => Transition::stay(
                        DialogueState::EnteringTopic { category },
                        reply(prompts::category_selected(style, category), Layout::NextStep),
                    ),
                    None => {
                        tracing::warn!(index, "Category index out of range");
                        not_understood(DialogueState::SelectingCategory)
                    }
                }
            }
            _ => not_understood(DialogueState::SelectingCategory),
        },

        DialogueState::EnteringTopic { category } => match event {
            InboundEvent::Text(topic) => match validate_topic(&topic) {
                Ok(()) => {
                    let text = prompts::topic_accepted(style, &topic);
                    Transition::stay(
                        DialogueState::EnteringBody { category, topic },
                        reply(text, Layout::NextStep),
                    )
                }
                Err(e) => {
                    tracing::debug!(error = %e, "Topic rejected");
                    Transition::stay(
                        DialogueState::EnteringTopic { category },
                        reply(prompts::validation_message(&e), Layout::None),
                    )
                }
            },
            InboundEvent::Button(Trigger::Next) => Transition::stay(
                DialogueState::EnteringTopic { category },
                reply(prompts::ask_topic(style), Layout::None),
            ),
            _ => not_understood(DialogueState::EnteringTopic { category }),
        },

        DialogueState::EnteringBody { category, topic } => match event {
            InboundEvent::Text(body) => match validate_body(&body) {
                Ok(()) => Transition::stay(
                    DialogueState::UploadingAttachments {
                        draft: Draft {
                            category,
                            topic,
                            body,
                        },
                        attachments: AttachmentBuffer::new(),
                    },
                    reply(prompts::upload_instructions(style), Layout::UploadControls),
                ),
                Err(e) => {
                    tracing::debug!(error = %e, "Body rejected");
                    Transition::stay(
                        DialogueState::EnteringBody { category, topic },
                        reply(prompts::validation_message(&e), Layout::None),
                    )
                }
            },
            InboundEvent::Button(Trigger::Next) => Transition::stay(
                DialogueState::EnteringBody { category, topic },
                reply(prompts::ask_body(style), Layout::None),
            ),
            _ => not_understood(DialogueState::EnteringBody { category, topic }),
        },

        DialogueState::UploadingAttachments {
            draft,
            mut attachments,
        } => match event {
            InboundEvent::Attachment(incoming) => {
                let kind = incoming.kind;
                let size = incoming.size;
                match attachments.offer(incoming) {
                    Ok(accepted) => {
                        tracing::debug!(
                            kind = ?kind,
                            size,
                            file_name = %accepted.file_name,
                            "Attachment accepted"
                        );
                    }
                    Err(reason) => {
                        tracing::debug!(kind = ?kind, size, %reason, "Attachment dropped");
                    }
                }
                Transition::silent(DialogueState::UploadingAttachments { draft, attachments })
            }
            InboundEvent::Button(Trigger::Skip) => Transition::stay(
                DialogueState::EnteringName {
                    draft,
                    attachments: attachments.into_items(),
                },
                reply(prompts::upload_skipped(style), Layout::NextStep),
            ),
            InboundEvent::Button(Trigger::Finish) => {
                let report = prompts::upload_report(style, &attachments);
                Transition::stay(
                    DialogueState::EnteringName {
                        draft,
                        attachments: attachments.into_items(),
                    },
                    reply(report, Layout::NextStep),
                )
            }
            _ => Transition::silent(DialogueState::UploadingAttachments { draft, attachments }),
        },

        DialogueState::EnteringName { draft, attachments } => match event {
            InboundEvent::Text(name) => match validate_name(&name) {
                Ok(()) => {
                    let submitter_name = name.trim().to_string();
                    let text = prompts::name_accepted(style, &submitter_name);
                    Transition::stay(
                        DialogueState::EnteringContact {
                            draft,
                            attachments,
                            submitter_name,
                        },
                        reply(text, Layout::NextStep),
                    )
                }
                Err(e) => {
                    tracing::debug!(error = %e, "Name rejected");
                    Transition::stay(
                        DialogueState::EnteringName { draft, attachments },
                        reply(prompts::validation_message(&e), Layout::None),
                    )
                }
            },
            InboundEvent::Button(Trigger::Next) => Transition::stay(
                DialogueState::EnteringName { draft, attachments },
                reply(prompts::ask_name(style), Layout::None),
            ),
            _ => not_understood(DialogueState::EnteringName { draft, attachments }),
        },

        DialogueState::EnteringContact {
            draft,
            attachments,
            submitter_name,
        } => match event {
            InboundEvent::Text(contact) => match validate_contact(&contact) {
                Ok(()) => {
                    let contact_method = contact.trim().to_string();
                    let text = prompts::summary(
                        style,
                        &SummaryFields {
                            category: draft.category,
                            topic: &draft.topic,
                            body: &draft.body,
                            submitter_name: &submitter_name,
                            contact_method: &contact_method,
                            attachment_count: attachments.len(),
                        },
                    );
                    Transition::stay(
                        DialogueState::Confirming {
                            draft,
                            attachments,
                            submitter_name,
                            contact_method,
                        },
                        reply(text, Layout::ConfirmCancel),
                    )
                }
                Err(e) => {
                    tracing::debug!(error = %e, "Contact rejected");
                    Transition::stay(
                        DialogueState::EnteringContact {
                            draft,
                            attachments,
                            submitter_name,
                        },
                        reply(prompts::validation_message(&e), Layout::None),
                    )
                }
            },
            InboundEvent::Button(Trigger::Next) => Transition::stay(
                DialogueState::EnteringContact {
                    draft,
                    attachments,
                    submitter_name,
                },
                reply(prompts::ask_contact(style), Layout::None),
            ),
            _ => not_understood(DialogueState::EnteringContact {
                draft,
                attachments,
                submitter_name,
            }),
        },

        DialogueState::Confirming {
            draft,
            attachments,
            submitter_name,
            contact_method,
        } => match event {
            InboundEvent::Button(Trigger::Send) => {
                let appeal = Appeal::new(
                    draft.category,
                    draft.topic,
                    draft.body,
                    submitter_name,
                    contact_method,
                    attachments,
                );
                Transition {
                    outcome: Outcome::Dispatch(Box::new(appeal)),
                    replies: Vec::new(),
                }
            }
            InboundEvent::Button(Trigger::Cancel) => Transition {
                outcome: Outcome::Cancelled,
                replies: reply(prompts::cancelled(style), Layout::None),
            },
            _ => not_understood(DialogueState::Confirming {
                draft,
                attachments,
                submitter_name,
                contact_method,
            }),
        },
    }
}
