//! Message, file and group passthroughs. Payloads are forwarded to the
//! engine as is and answers come back as opaque JSON.

use super::Client;
use crate::session::session_path;
use crate::transport::Method;
use crate::Result;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use bytes::Bytes;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::info;

/// Text message to a chat or group.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SendTextRequest {
    pub chat_id: String,
    #[serde(rename = "message")]
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quoted_message_id: Option<String>,
}

impl SendTextRequest {
    pub fn new(chat_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            chat_id: chat_id.into(),
            text: text.into(),
            quoted_message_id: None,
        }
    }
}

/// Where the engine gets the file content from.
#[derive(Clone, Debug)]
pub enum FileSource {
    Bytes(Bytes),
    Url(String),
}

#[derive(Clone, Debug)]
pub struct SendFileRequest {
    pub chat_id: String,
    pub source: FileSource,
    pub filename: Option<String>,
    pub caption: Option<String>,
    pub mimetype: Option<String>,
}

impl SendFileRequest {
    fn to_body(&self) -> Value {
        let mut file = serde_json::Map::new();
        match &self.source {
            FileSource::Bytes(data) => {
                file.insert("data".into(), Value::String(STANDARD.encode(data)));
            }
            FileSource::Url(url) => {
                file.insert("url".into(), Value::String(url.clone()));
            }
        }
        file.insert(
            "filename".into(),
            Value::String(self.filename.clone().unwrap_or_else(|| "file".into())),
        );
        if let Some(m) = &self.mimetype {
            file.insert("mimetype".into(), Value::String(m.clone()));
        }
        let mut body = json!({ "chatId": self.chat_id, "file": file });
        if let Some(c) = &self.caption {
            body["caption"] = Value::String(c.clone());
        }
        body
    }
}

#[derive(Clone, Debug)]
pub struct ChatMessagesQuery {
    pub chat_id: String,
    pub limit: u32,
}

impl ChatMessagesQuery {
    pub fn new(chat_id: impl Into<String>) -> Self {
        Self {
            chat_id: chat_id.into(),
            limit: 50,
        }
    }
}

impl Client {
    pub async fn send_text(&self, session: &str, req: &SendTextRequest) -> Result<Value> {
        let body = json!(req);
        let path = format!("{}/send/text", session_path(session));
        let resp = self.passthrough(Method::Post, &path, Some(&body), &[]).await?;
        info!(session, chat = %req.chat_id, "message sent");
        Ok(resp.body)
    }

    /// Same as [`send_text`](Self::send_text); group ids are ordinary chat ids.
    pub async fn send_text_to_group(&self, session: &str, group_id: &str, text: &str) -> Result<Value> {
        self.send_text(session, &SendTextRequest::new(group_id, text))
            .await
    }

    pub async fn send_file(&self, session: &str, req: &SendFileRequest) -> Result<Value> {
        let path = format!("{}/send/file", session_path(session));
        let resp = self
            .passthrough(Method::Post, &path, Some(&req.to_body()), &[])
            .await?;
        info!(session, chat = %req.chat_id, "file sent");
        Ok(resp.body)
    }

    /// Upload content for later sending; the engine answers with a file id.
    pub async fn upload_file(&self, session: &str, filename: &str, data: &[u8]) -> Result<Value> {
        let path = format!("{}/files/upload", session_path(session));
        let body = json!({ "file": { "filename": filename, "data": STANDARD.encode(data) } });
        Ok(self
            .passthrough(Method::Post, &path, Some(&body), &[])
            .await?
            .body)
    }

    /// Raw media of a received message.
    pub async fn download_file(&self, session: &str, message_id: &str) -> Result<Bytes> {
        let path = format!(
            "{}/messages/{}/download",
            session_path(session),
            urlencoding::encode(message_id)
        );
        Ok(self.passthrough(Method::Get, &path, None, &[]).await?.bytes)
    }

    pub async fn get_chats(&self, session: &str) -> Result<Value> {
        let path = format!("{}/chats", session_path(session));
        Ok(self.passthrough(Method::Get, &path, None, &[]).await?.body)
    }

    pub async fn get_chat_messages(&self, session: &str, query: &ChatMessagesQuery) -> Result<Value> {
        let path = format!(
            "{}/chats/{}",
            session_path(session),
            urlencoding::encode(&query.chat_id)
        );
        let params = [("limit", query.limit.to_string())];
        Ok(self.passthrough(Method::Get, &path, None, &params).await?.body)
    }

    pub async fn delete_message(&self, session: &str, chat_id: &str, message_id: &str) -> Result<Value> {
        let path = format!("{}/messages", session_path(session));
        let body = json!({ "chatId": chat_id, "messageId": message_id });
        Ok(self
            .passthrough(Method::Delete, &path, Some(&body), &[])
            .await?
            .body)
    }

    pub async fn get_groups(&self, session: &str) -> Result<Value> {
        let path = format!("{}/groups", session_path(session));
        Ok(self.passthrough(Method::Get, &path, None, &[]).await?.body)
    }

    pub async fn create_group(&self, session: &str, name: &str, participants: &[String]) -> Result<Value> {
        let path = format!("{}/groups", session_path(session));
        let body = json!({ "name": name, "participants": participants });
        Ok(self
            .passthrough(Method::Post, &path, Some(&body), &[])
            .await?
            .body)
    }
}
