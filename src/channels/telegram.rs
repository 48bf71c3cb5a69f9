//! Telegram channel: long-polls the Bot API for updates.
//!
//! Inbound messages and button presses are classified into
//! [`InboundEvent`]s; replies are rendered with inline keyboards. The same
//! client also serves as the operator sink and the attachment store, since
//! attachments are referenced by Telegram file ids.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde_json::{Value, json};

use crate::channels::{Channel, IncomingUpdate, UpdateStream};
use crate::dispatch::{AttachmentStore, OperatorSink};
use crate::error::ChannelError;
use crate::intake::event::InboundEvent;
use crate::intake::model::{AttachmentKind, AttachmentRef, IncomingAttachment};
use crate::intake::reply::{Layout, Reply, TextStyle};

/// Maximum message length for Telegram's sendMessage API.
const TELEGRAM_MAX_MESSAGE_LENGTH: usize = 4096;

const API_BASE: &str = "https://api.telegram.org";

/// Telegram channel, connected to the Bot API via long-polling.
#[derive(Clone)]
pub struct TelegramChannel {
    bot_token: SecretString,
    client: reqwest::Client,
    api_base: String,
}

impl TelegramChannel {
    pub fn new(bot_token: SecretString) -> Self {
        Self {
            bot_token,
            client: reqwest::Client::new(),
            api_base: API_BASE.to_string(),
        }
    }

    fn api_url(&self, method: &str) -> String {
        format!(
            "{}/bot{}/{method}",
            self.api_base,
            self.bot_token.expose_secret()
        )
    }

    fn file_url(&self, file_path: &str) -> String {
        format!(
            "{}/file/bot{}/{file_path}",
            self.api_base,
            self.bot_token.expose_secret()
        )
    }

    /// POST a Bot API method and return its `result` field.
    async fn call(&self, method: &str, body: &Value) -> Result<Value, ChannelError> {
        let resp = self
            .client
            .post(self.api_url(method))
            .json(body)
            .send()
            .await
            .map_err(|e| ChannelError::SendFailed {
                name: "telegram".into(),
                reason: e.to_string(),
            })?;

        let status = resp.status();
        if !status.is_success() {
            let err = resp.text().await.unwrap_or_default();
            let description = serde_json::from_str::<Value>(&err)
                .ok()
                .and_then(|v| v.get("description").and_then(Value::as_str).map(String::from))
                .unwrap_or(err);
            return Err(ChannelError::Rejected {
                name: "telegram".into(),
                method: method.to_string(),
                status: status.as_u16(),
                description,
            });
        }

        let data: Value = resp.json().await?;
        Ok(data.get("result").cloned().unwrap_or(Value::Null))
    }

    /// Send a text message in the given style, falling back to plain text if
    /// Telegram cannot parse the markup. Long messages are split; the keyboard is
    /// attached to the last chunk.
    async fn send_message(
        &self,
        chat_id: i64,
        text: &str,
        style: TextStyle,
        keyboard: Option<Value>,
    ) -> Result<(), ChannelError> {
        let chunks = split_message(text, TELEGRAM_MAX_MESSAGE_LENGTH);
        let last = chunks.len().saturating_sub(1);

        for (i, chunk) in chunks.iter().enumerate() {
            let markup = if i == last { keyboard.clone() } else { None };
            self.send_message_chunk(chat_id, chunk, style, markup).await?;
        }
        Ok(())
    }

    async fn send_message_chunk(
        &self,
        chat_id: i64,
        text: &str,
        style: TextStyle,
        keyboard: Option<Value>,
    ) -> Result<(), ChannelError> {
        let mut body = json!({
            "chat_id": chat_id,
            "text": text,
        });
        if let Some(markup) = &keyboard {
            body["reply_markup"] = markup.clone();
        }

        if style == TextStyle::Plain {
            self.call("sendMessage", &body).await?;
            return Ok(());
        }

        body["parse_mode"] = json!("HTML");
        match self.call("sendMessage", &body).await {
            Ok(_) => return Ok(()),
            Err(e) if is_markup_rejection(&e) => tracing::warn!(
                error = %e,
                "Telegram could not parse HTML; resending as plain text"
            ),
            // Other failures may still have been delivered.
            Err(e) => return Err(e),
        }

        let mut plain = json!({
            "chat_id": chat_id,
            "text": strip_markup(text),
        });
        if let Some(markup) = keyboard {
            plain["reply_markup"] = markup;
        }
        self.call("sendMessage", &plain).await.map(|_| ())
    }

    /// Stop the client-side spinner on a pressed button.
    async fn answer_callback(&self, callback_id: &str) -> Result<(), ChannelError> {
        self.call(
            "answerCallbackQuery",
            &json!({ "callback_query_id": callback_id }),
        )
        .await
        .map(|_| ())
    }

    /// Look up a file's download path and size.
    async fn get_file(&self, file_id: &str) -> Result<(String, u64), ChannelError> {
        let result = self.call("getFile", &json!({ "file_id": file_id })).await?;
        let path = result
            .get("file_path")
            .and_then(Value::as_str)
            .ok_or_else(|| ChannelError::InvalidMessage(format!("getFile: no path for {file_id}")))?
            .to_string();
        let size = result.get("file_size").and_then(Value::as_u64).unwrap_or(0);
        Ok((path, size))
    }

    /// Fill in the size of an attachment Telegram sent without one.
    async fn resolve_size(&self, update: &mut IncomingUpdate) {
        let InboundEvent::Attachment(attachment) = &mut update.event else {
            return;
        };
        if attachment.size > 0 {
            return;
        }
        match self.get_file(&attachment.file_id).await {
            Ok((_, size)) => attachment.size = size,
            Err(e) => tracing::warn!(error = %e, "Could not resolve attachment size"),
        }
    }

    async fn poll_loop(self, tx: tokio::sync::mpsc::UnboundedSender<IncomingUpdate>) {
        let mut offset: i64 = 0;

        tracing::info!("Telegram channel listening for updates...");

        loop {
            let body = json!({
                "offset": offset,
                "timeout": 30,
                "allowed_updates": ["message", "callback_query"]
            });

            let resp = match self
                .client
                .post(self.api_url("getUpdates"))
                .json(&body)
                .send()
                .await
            {
                Ok(r) => r,
                Err(e) => {
                    tracing::warn!("Telegram poll error: {e}");
                    tokio::time::sleep(std::time::Duration::from_secs(5)).await;
                    continue;
                }
            };

            let data: Value = match resp.json().await {
                Ok(d) => d,
                Err(e) => {
                    tracing::warn!("Telegram parse error: {e}");
                    tokio::time::sleep(std::time::Duration::from_secs(5)).await;
                    continue;
                }
            };

            let Some(results) = data.get("result").and_then(Value::as_array) else {
                tracing::warn!(response = %data, "Telegram getUpdates returned no result");
                tokio::time::sleep(std::time::Duration::from_secs(5)).await;
                continue;
            };

            for update in results {
                // Advance offset past this update
                if let Some(uid) = update.get("update_id").and_then(Value::as_i64) {
                    offset = uid + 1;
                }

                let Some(mut incoming) = parse_update(update) else {
                    continue;
                };
                self.resolve_size(&mut incoming).await;

                if tx.send(incoming).is_err() {
                    tracing::info!("Telegram listener channel closed");
                    return;
                }
            }
        }
    }
}

// ── Channel trait implementation ────────────────────────────────────

#[async_trait]
impl Channel for TelegramChannel {
    fn name(&self) -> &str {
        "telegram"
    }

    async fn start(&self) -> Result<UpdateStream, ChannelError> {
        // getUpdates is refused while a webhook is set. Updates queued while
        // the bot was down are discarded rather than replayed into new sessions.
        self.call("deleteWebhook", &json!({ "drop_pending_updates": true }))
            .await
            .map_err(|e| ChannelError::StartupFailed {
                name: "telegram".into(),
                reason: e.to_string(),
            })?;
        tracing::info!("Telegram webhook cleared, pending updates dropped");

        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        tokio::spawn(self.clone().poll_loop(tx));

        let stream = futures::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|update| (update, rx))
        });

        Ok(Box::pin(stream))
    }

    async fn respond(
        &self,
        update: &IncomingUpdate,
        replies: Vec<Reply>,
    ) -> Result<(), ChannelError> {
        if let Some(callback_id) = &update.callback_id
            && let Err(e) = self.answer_callback(callback_id).await
        {
            tracing::debug!(error = %e, "answerCallbackQuery failed");
        }

        for reply in replies {
            let keyboard = inline_keyboard(reply.layout);
            self.send_message(update.chat_id, &reply.text, reply.style, keyboard)
                .await?;
        }
        Ok(())
    }

    async fn health_check(&self) -> Result<(), ChannelError> {
        let resp = self
            .client
            .get(self.api_url("getMe"))
            .send()
            .await
            .map_err(|e| ChannelError::StartupFailed {
                name: "telegram".into(),
                reason: e.to_string(),
            })?;

        if resp.status().is_success() {
            Ok(())
        } else {
            Err(ChannelError::StartupFailed {
                name: "telegram".into(),
                reason: format!("getMe returned {}", resp.status()),
            })
        }
    }

    async fn shutdown(&self) -> Result<(), ChannelError> {
        tracing::info!("Telegram channel shutting down");
        Ok(())
    }
}

// ── Operator sink and attachment store ──────────────────────────────

#[async_trait]
impl OperatorSink for TelegramChannel {
    async fn send_text(
        &self,
        chat_id: i64,
        text: &str,
        style: TextStyle,
    ) -> Result<(), ChannelError> {
        self.send_message(chat_id, text, style, None).await
    }

    async fn send_attachment(
        &self,
        chat_id: i64,
        attachment: &AttachmentRef,
        caption: &str,
    ) -> Result<(), ChannelError> {
        let (method, field) = match attachment.kind {
            AttachmentKind::Image => ("sendPhoto", "photo"),
            AttachmentKind::Document => ("sendDocument", "document"),
        };
        let mut body = json!({
            "chat_id": chat_id,
            "caption": caption,
        });
        body[field] = json!(attachment.file_id);
        self.call(method, &body).await?;
        tracing::debug!(chat_id, file_name = %attachment.file_name, "Attachment forwarded");
        Ok(())
    }

    async fn send_attachment_group(
        &self,
        chat_id: i64,
        attachments: &[AttachmentRef],
        caption: &str,
    ) -> Result<(), ChannelError> {
        let body = json!({
            "chat_id": chat_id,
            "media": media_group(attachments, caption),
        });
        self.call("sendMediaGroup", &body).await?;
        tracing::debug!(chat_id, count = attachments.len(), "Attachment group forwarded");
        Ok(())
    }
}

#[async_trait]
impl AttachmentStore for TelegramChannel {
    async fn fetch(&self, file_id: &str) -> Result<Vec<u8>, ChannelError> {
        let (path, _) = self.get_file(file_id).await?;
        let resp = self.client.get(self.file_url(&path)).send().await?;
        if !resp.status().is_success() {
            return Err(ChannelError::Http(format!(
                "file download returned {}",
                resp.status()
            )));
        }
        Ok(resp.bytes().await?.to_vec())
    }
}

// ── Helpers ─────────────────────────────────────────────────────────

/// Classify one `getUpdates` entry. Returns `None` for update kinds the bot
/// does not handle (edited messages, channel posts, ...).
pub fn parse_update(update: &Value) -> Option<IncomingUpdate> {
    if let Some(query) = update.get("callback_query") {
        let from = query.get("from")?;
        let user_id = from.get("id").and_then(Value::as_i64)?;
        let chat_id = query
            .get("message")
            .and_then(|m| m.get("chat"))
            .and_then(|c| c.get("id"))
            .and_then(Value::as_i64)
            .unwrap_or(user_id);
        let data = query.get("data").and_then(Value::as_str).unwrap_or_default();

        let mut incoming =
            IncomingUpdate::new(user_id.to_string(), chat_id, InboundEvent::from_callback(data));
        if let Some(id) = query.get("id").and_then(Value::as_str) {
            incoming = incoming.with_callback_id(id);
        }
        if let Some(name) = display_name(from) {
            incoming = incoming.with_user_name(name);
        }
        return Some(incoming);
    }

    let message = update.get("message")?;
    let from = message.get("from")?;
    let user_id = from.get("id").and_then(Value::as_i64)?;
    let chat_id = message
        .get("chat")
        .and_then(|c| c.get("id"))
        .and_then(Value::as_i64)
        .unwrap_or(user_id);

    let event = if let Some(text) = message.get("text").and_then(Value::as_str) {
        InboundEvent::from_text(text)
    } else if let Some(sizes) = message.get("photo").and_then(Value::as_array) {
        // Telegram lists every resolution; the last one is the largest.
        let largest = sizes.last()?;
        InboundEvent::Attachment(IncomingAttachment {
            kind: AttachmentKind::Image,
            file_id: largest.get("file_id").and_then(Value::as_str)?.to_string(),
            file_name: None,
            size: largest.get("file_size").and_then(Value::as_u64).unwrap_or(0),
        })
    } else if let Some(doc) = message.get("document") {
        InboundEvent::Attachment(IncomingAttachment {
            kind: AttachmentKind::Document,
            file_id: doc.get("file_id").and_then(Value::as_str)?.to_string(),
            file_name: doc
                .get("file_name")
                .and_then(Value::as_str)
                .map(String::from),
            size: doc.get("file_size").and_then(Value::as_u64).unwrap_or(0),
        })
    } else {
        InboundEvent::Unsupported
    };

    let mut incoming = IncomingUpdate::new(user_id.to_string(), chat_id, event);
    if let Some(name) = display_name(from) {
        incoming = incoming.with_user_name(name);
    }
    Some(incoming)
}

fn display_name(from: &Value) -> Option<String> {
    from.get("first_name")
        .or_else(|| from.get("username"))
        .and_then(Value::as_str)
        .map(String::from)
}

/// Render a layout as an `inline_keyboard` reply markup.
pub fn inline_keyboard(layout: Layout) -> Option<Value> {
    let rows = layout.rows();
    if rows.is_empty() {
        return None;
    }
    let rows: Vec<Value> = rows
        .into_iter()
        .map(|row| {
            Value::Array(
                row.into_iter()
                    .map(|b| json!({ "text": b.label, "callback_data": b.trigger.callback_data() }))
                    .collect(),
            )
        })
        .collect();
    Some(json!({ "inline_keyboard": rows }))
}

/// `sendMediaGroup` items; the caption rides on the first one.
fn media_group(attachments: &[AttachmentRef], caption: &str) -> Vec<Value> {
    attachments
        .iter()
        .enumerate()
        .map(|(i, a)| {
            let kind = match a.kind {
                AttachmentKind::Image => "photo",
                AttachmentKind::Document => "document",
            };
            let mut item = json!({ "type": kind, "media": a.file_id });
            if i == 0 {
                item["caption"] = json!(caption);
            }
            item
        })
        .collect()
}

/// Drop markup tags and decode the entities `escape_html` produces.
pub fn strip_markup(html: &str) -> String {
    let mut result = String::with_capacity(html.len());
    let mut in_tag = false;
    for ch in html.chars() {
        match ch {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => result.push(ch),
            _ => {}
        }
    }
    result
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}

/// Whether Telegram refused a message because its HTML did not parse.
fn is_markup_rejection(err: &ChannelError) -> bool {
    matches!(
        err,
        ChannelError::Rejected { status: 400, description, .. }
            if description.contains("can't parse entities")
    )
}

/// Split a message into chunks of at most `max_len` characters.
/// Tries to split on newlines, then spaces, then hard-cuts outside any
/// HTML entity.
fn split_message(text: &str, max_len: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut remaining = text;

    loop {
        // Byte offset of the first character past the limit.
        let Some((cut, _)) = remaining.char_indices().nth(max_len) else {
            chunks.push(remaining.to_string());
            break;
        };

        // Find a good split point
        let chunk = &remaining[..cut];
        let split_at = chunk
            .rfind('\n')
            .or_else(|| chunk.rfind(' '))
            .unwrap_or_else(|| entity_safe_cut(chunk));

        // Don't split at position 0 (infinite loop guard)
        let split_at = if split_at == 0 { cut } else { split_at };

        chunks.push(remaining[..split_at].to_string());
        remaining = remaining[split_at..].trim_start();
        if remaining.is_empty() {
            break;
        }
    }

    chunks
}

/// Hard-cut offset for `chunk`, moved back before a trailing `&...` that has
/// no closing `;` yet.
fn entity_safe_cut(chunk: &str) -> usize {
    const MAX_ENTITY_LEN: usize = 8;
    match chunk.rfind('&') {
        Some(amp) if chunk.len() - amp <= MAX_ENTITY_LEN && !chunk[amp..].contains(';') => amp,
        _ => chunk.len(),
    }
}

// ── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intake::event::{Command, Trigger};
    use std::sync::{Arc, Mutex};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn channel(token: &str) -> TelegramChannel {
        TelegramChannel::new(SecretString::from(token.to_string()))
    }

    #[test]
    fn telegram_channel_name() {
        assert_eq!(channel("fake-token").name(), "telegram");
    }

    #[test]
    fn telegram_api_url() {
        let ch = channel("123:ABC");
        assert_eq!(
            ch.api_url("getMe"),
            "https://api.telegram.org/bot123:ABC/getMe"
        );
        assert_eq!(
            ch.file_url("photos/file_1.jpg"),
            "https://api.telegram.org/file/bot123:ABC/photos/file_1.jpg"
        );
    }

    // ── Update parsing ──────────────────────────────────────────────

    #[test]
    fn parse_text_message() {
        let update = json!({
            "update_id": 1,
            "message": {
                "from": {"id": 77, "first_name": "Ivan"},
                "chat": {"id": 77},
                "text": "Broken projector"
            }
        });
        let incoming = parse_update(&update).unwrap();
        assert_eq!(incoming.user_id, "77");
        assert_eq!(incoming.chat_id, 77);
        assert_eq!(incoming.user_name.as_deref(), Some("Ivan"));
        assert_eq!(incoming.event, InboundEvent::Text("Broken projector".into()));
        assert!(incoming.callback_id.is_none());
    }

    #[test]
    fn parse_command() {
        let update = json!({
            "message": {"from": {"id": 5}, "chat": {"id": 5}, "text": "/start"}
        });
        let incoming = parse_update(&update).unwrap();
        assert_eq!(incoming.event, InboundEvent::Command(Command::Restart));
    }

    #[test]
    fn parse_callback_query() {
        let update = json!({
            "callback_query": {
                "id": "cb-1",
                "from": {"id": 9, "username": "anna"},
                "message": {"chat": {"id": 9}},
                "data": "category_3"
            }
        });
        let incoming = parse_update(&update).unwrap();
        assert_eq!(incoming.event, InboundEvent::Button(Trigger::SelectCategory(3)));
        assert_eq!(incoming.callback_id.as_deref(), Some("cb-1"));
        assert_eq!(incoming.user_name.as_deref(), Some("anna"));
    }

    #[test]
    fn parse_photo_takes_largest_size() {
        let update = json!({
            "message": {
                "from": {"id": 1},
                "chat": {"id": 1},
                "photo": [
                    {"file_id": "small", "file_size": 100},
                    {"file_id": "large", "file_size": 90000}
                ]
            }
        });
        match parse_update(&update).unwrap().event {
            InboundEvent::Attachment(a) => {
                assert_eq!(a.kind, AttachmentKind::Image);
                assert_eq!(a.file_id, "large");
                assert_eq!(a.size, 90000);
                assert!(a.file_name.is_none());
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn parse_document() {
        let update = json!({
            "message": {
                "from": {"id": 1},
                "chat": {"id": 1},
                "document": {"file_id": "doc", "file_name": "scan.PDF", "file_size": 2048}
            }
        });
        match parse_update(&update).unwrap().event {
            InboundEvent::Attachment(a) => {
                assert_eq!(a.kind, AttachmentKind::Document);
                assert_eq!(a.file_name.as_deref(), Some("scan.PDF"));
                assert_eq!(a.size, 2048);
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn parse_sticker_is_unsupported() {
        let update = json!({
            "message": {"from": {"id": 1}, "chat": {"id": 1}, "sticker": {"file_id": "s"}}
        });
        assert_eq!(parse_update(&update).unwrap().event, InboundEvent::Unsupported);
    }

    #[test]
    fn parse_ignores_other_update_kinds() {
        assert!(parse_update(&json!({"edited_message": {"text": "x"}})).is_none());
        assert!(parse_update(&json!({"message": {"text": "no sender"}})).is_none());
    }

    // ── Rendering ───────────────────────────────────────────────────

    #[test]
    fn inline_keyboard_encodes_callback_data() {
        assert!(inline_keyboard(Layout::None).is_none());

        let markup = inline_keyboard(Layout::ConfirmCancel).unwrap();
        let rows = markup["inline_keyboard"].as_array().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0][0]["callback_data"], "send_appeal");
        assert_eq!(rows[1][0]["callback_data"], "cancel_appeal");
    }

    #[test]
    fn media_group_caption_on_first_item() {
        let attachments = vec![
            AttachmentRef {
                kind: AttachmentKind::Image,
                file_id: "a".into(),
                file_name: "photo_1.jpg".into(),
                size: 1,
            },
            AttachmentRef {
                kind: AttachmentKind::Image,
                file_id: "b".into(),
                file_name: "photo_2.jpg".into(),
                size: 1,
            },
        ];
        let media = media_group(&attachments, "Attachments");
        assert_eq!(media[0]["type"], "photo");
        assert_eq!(media[0]["caption"], "Attachments");
        assert!(media[1].get("caption").is_none());
    }

    #[test]
    fn strip_markup_restores_plain_text() {
        assert_eq!(
            strip_markup("<b>Topic:</b> a &lt; b &amp; c"),
            "Topic: a < b & c"
        );
        assert_eq!(strip_markup("line one\nline two"), "line one\nline two");
    }

    // ── Message splitting tests ─────────────────────────────────────

    #[test]
    fn split_message_short() {
        let chunks = split_message("Hello", 4096);
        assert_eq!(chunks, vec!["Hello"]);
    }

    #[test]
    fn split_message_exact_limit() {
        let msg = "a".repeat(4096);
        let chunks = split_message(&msg, 4096);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].len(), 4096);
    }

    #[test]
    fn split_message_over_limit_on_newline() {
        let msg = format!("{}\n{}", "a".repeat(2000), "b".repeat(3000));
        let chunks = split_message(&msg, 4096);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0], "a".repeat(2000));
        assert_eq!(chunks[1], "b".repeat(3000));
    }

    #[test]
    fn split_message_no_good_split_point() {
        let msg = "a".repeat(5000);
        let chunks = split_message(&msg, 4096);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].len(), 4096);
        assert_eq!(chunks[1].len(), 904);
    }

    #[test]
    fn split_message_counts_characters() {
        // 3000 two-byte characters are 6000 bytes but fit one message.
        let msg = "ж".repeat(3000);
        assert_eq!(split_message(&msg, 4096), vec![msg.clone()]);

        let msg = "ж".repeat(5000);
        let chunks = split_message(&msg, 4096);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].chars().count(), 4096);
        assert_eq!(chunks[1].chars().count(), 904);
        assert_eq!(chunks.concat(), msg);
    }

    #[test]
    fn split_message_keeps_entities_whole() {
        let msg = format!("{}&amp;{}", "a".repeat(4094), "b".repeat(100));
        let chunks = split_message(&msg, 4096);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0], "a".repeat(4094));
        assert!(chunks[1].starts_with("&amp;bbb"));
        assert_eq!(chunks.concat(), msg);
    }

    #[test]
    fn split_message_drops_trailing_whitespace_chunk() {
        let msg = format!("{}\n   ", "a".repeat(10));
        assert_eq!(split_message(&msg, 11), vec!["a".repeat(10)]);
    }

    #[test]
    fn markup_rejection_is_only_a_parse_error() {
        let rejected = |status, description: &str| ChannelError::Rejected {
            name: "telegram".into(),
            method: "sendMessage".into(),
            status,
            description: description.into(),
        };
        assert!(is_markup_rejection(&rejected(
            400,
            "Bad Request: can't parse entities: unsupported start tag \"x\" at byte offset 0"
        )));
        assert!(!is_markup_rejection(&rejected(400, "Bad Request: chat not found")));
        assert!(!is_markup_rejection(&rejected(502, "Bad Gateway")));
        assert!(!is_markup_rejection(&ChannelError::SendFailed {
            name: "telegram".into(),
            reason: "operation timed out".into(),
        }));
    }

    // ── Bot API calls against a local fake server ───────────────────

    type RequestLog = Arc<Mutex<Vec<(String, Value)>>>;

    /// Serve the scripted `(status, body)` responses in order, one per
    /// connection, recording each request's path and JSON body.
    async fn fake_api(responses: Vec<(u16, Value)>) -> (TelegramChannel, RequestLog) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let api_base = format!("http://{}", listener.local_addr().unwrap());
        let log = RequestLog::default();
        let seen = Arc::clone(&log);

        tokio::spawn(async move {
            for (status, body) in responses {
                let Ok((mut socket, _)) = listener.accept().await else {
                    return;
                };
                let request = read_request(&mut socket).await;
                seen.lock().unwrap().push(request);
                let payload = body.to_string();
                let response = format!(
                    "HTTP/1.1 {status} Scripted\r\ncontent-type: application/json\r\n\
                     content-length: {}\r\nconnection: close\r\n\r\n{payload}",
                    payload.len()
                );
                socket.write_all(response.as_bytes()).await.unwrap();
                let _ = socket.shutdown().await;
            }
        });

        let channel = TelegramChannel {
            bot_token: SecretString::from("123:ABC".to_string()),
            client: reqwest::Client::builder().no_proxy().build().unwrap(),
            api_base,
        };
        (channel, log)
    }

    async fn read_request(socket: &mut tokio::net::TcpStream) -> (String, Value) {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];
        loop {
            let n = socket.read(&mut chunk).await.unwrap();
            assert!(n > 0, "connection closed mid-request");
            buf.extend_from_slice(&chunk[..n]);

            let Some(end) = buf.windows(4).position(|w| w == b"\r\n\r\n") else {
                continue;
            };
            let head = String::from_utf8_lossy(&buf[..end]).to_string();
            let len = head
                .lines()
                .filter_map(|line| line.split_once(':'))
                .find(|(k, _)| k.eq_ignore_ascii_case("content-length"))
                .and_then(|(_, v)| v.trim().parse::<usize>().ok())
                .unwrap_or(0);
            if buf.len() < end + 4 + len {
                continue;
            }
            let path = head.split_whitespace().nth(1).unwrap_or_default().to_string();
            let body = serde_json::from_slice(&buf[end + 4..end + 4 + len]).unwrap_or(Value::Null);
            return (path, body);
        }
    }

    fn ok() -> (u16, Value) {
        (200, json!({ "ok": true, "result": true }))
    }

    #[tokio::test]
    async fn start_clears_webhook_and_pending_updates() {
        let (ch, log) = fake_api(vec![ok()]).await;
        let _updates = ch.start().await.unwrap();

        let (path, body) = log.lock().unwrap()[0].clone();
        assert_eq!(path, "/bot123:ABC/deleteWebhook");
        assert_eq!(body["drop_pending_updates"], json!(true));
    }

    #[tokio::test]
    async fn start_fails_when_webhook_cannot_be_cleared() {
        let (ch, _log) = fake_api(vec![(
            401,
            json!({ "ok": false, "error_code": 401, "description": "Unauthorized" }),
        )])
        .await;
        assert!(matches!(
            ch.start().await,
            Err(ChannelError::StartupFailed { .. })
        ));
    }

    #[tokio::test]
    async fn unparsable_html_is_resent_as_plain_text() {
        let (ch, log) = fake_api(vec![
            (
                400,
                json!({
                    "ok": false,
                    "error_code": 400,
                    "description": "Bad Request: can't parse entities: unclosed tag"
                }),
            ),
            ok(),
        ])
        .await;

        ch.send_message_chunk(7, "<b>Topic</b> a &amp; b", TextStyle::Rich, None)
            .await
            .unwrap();

        let log = log.lock().unwrap();
        assert_eq!(log.len(), 2);
        assert_eq!(log[0].1["parse_mode"], json!("HTML"));
        assert!(log[1].1.get("parse_mode").is_none());
        assert_eq!(log[1].1["text"], json!("Topic a & b"));
    }

    #[tokio::test]
    async fn other_send_failures_are_not_resent() {
        let (ch, log) = fake_api(vec![
            (502, json!({ "ok": false, "description": "Bad Gateway" })),
            ok(),
        ])
        .await;

        let result = ch
            .send_message_chunk(7, "<b>Topic</b>", TextStyle::Rich, None)
            .await;

        assert!(matches!(
            result,
            Err(ChannelError::Rejected { status: 502, .. })
        ));
        assert_eq!(log.lock().unwrap().len(), 1);
    }
}
