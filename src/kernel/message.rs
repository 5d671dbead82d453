//! Jupyter messaging protocol: headers, HMAC signing and the multipart wire
//! format `[identities.., <IDS|MSG>, signature, header, parent, metadata, content, buffers..]`.
use bytes::Bytes;
use chrono::{SecondsFormat, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use sha2::Sha256;

use crate::error::{KernelError, Result};

pub const DELIMITER: &[u8] = b"<IDS|MSG>";
pub const PROTOCOL_VERSION: &str = "5.3";

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    pub msg_id: String,
    pub session: String,
    pub username: String,
    pub date: String,
    pub msg_type: String,
    pub version: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub header: Header,
    /// `{}` when the message has no parent
    pub parent_header: Value,
    pub metadata: Value,
    pub content: Value,
}

impl Message {
    pub fn msg_type(&self) -> &str {
        &self.header.msg_type
    }

    pub fn msg_id(&self) -> &str {
        &self.header.msg_id
    }

    pub fn parent_msg_id(&self) -> Option<&str> {
        self.parent_header.get("msg_id").and_then(Value::as_str)
    }

    pub fn is_reply_to(&self, msg_id: &str) -> bool {
        self.parent_msg_id() == Some(msg_id)
    }

    /// Convenience accessor for string fields of `content`.
    pub fn content_str(&self, key: &str) -> Option<&str> {
        self.content.get(key).and_then(Value::as_str)
    }
}

/// Signs outgoing and verifies incoming messages with the connection key.
#[derive(Clone)]
struct Signer {
    key: Vec<u8>,
}

impl Signer {
    fn mac(&self, parts: &[&[u8]]) -> Result<HmacSha256> {
        let mut mac = HmacSha256::new_from_slice(&self.key).map_err(KernelError::protocol)?;
        for part in parts {
            mac.update(part);
        }
        Ok(mac)
    }

    fn sign(&self, parts: &[&[u8]]) -> Result<String> {
        if self.key.is_empty() {
            return Ok(String::new());
        }
        Ok(hex::encode(self.mac(parts)?.finalize().into_bytes()))
    }

    fn verify(&self, signature: &[u8], parts: &[&[u8]]) -> Result<()> {
        if self.key.is_empty() {
            return Ok(());
        }
        let expected = hex::decode(signature).map_err(KernelError::protocol)?;
        self.mac(parts)?
            .verify_slice(&expected)
            .map_err(|_| KernelError::Protocol("invalid message signature".into()).into())
    }
}

/// One client session: owns the session id and signing key.
#[derive(Clone)]
pub struct Session {
    id: String,
    username: String,
    signer: Signer,
}

impl Session {
    pub fn new(key: &str) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            username: "nbrun".into(),
            signer: Signer {
                key: key.as_bytes().to_vec(),
            },
        }
    }

    /// A new request with no parent.
    pub fn request(&self, msg_type: &str, content: Value) -> Message {
        Message {
            header: Header {
                msg_id: uuid::Uuid::new_v4().to_string(),
                session: self.id.clone(),
                username: self.username.clone(),
                date: Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true),
                msg_type: msg_type.into(),
                version: PROTOCOL_VERSION.into(),
            },
            parent_header: Value::Object(Map::new()),
            metadata: Value::Object(Map::new()),
            content,
        }
    }

    /// A message answering `parent`, as a kernel sends it.
    pub fn reply(&self, parent: &Message, msg_type: &str, content: Value) -> Message {
        let mut msg = self.request(msg_type, content);
        let header = &parent.header;
        msg.parent_header = json!({
            "msg_id": header.msg_id,
            "session": header.session,
            "username": header.username,
            "date": header.date,
            "msg_type": header.msg_type,
            "version": header.version,
        });
        msg
    }

    pub fn serialize(&self, msg: &Message) -> Result<Vec<Bytes>> {
        let header = to_json(&msg.header)?;
        let parent = to_json(&msg.parent_header)?;
        let metadata = to_json(&msg.metadata)?;
        let content = to_json(&msg.content)?;
        let signature = self.signer.sign(&[header.as_slice(), parent.as_slice(), metadata.as_slice(), content.as_slice()])?;

        Ok(vec![
            Bytes::from_static(DELIMITER),
            Bytes::from(signature.into_bytes()),
            Bytes::from(header),
            Bytes::from(parent),
            Bytes::from(metadata),
            Bytes::from(content),
        ])
    }

    /// Parse frames received on any channel. Routing identities and pub/sub
    /// topics before the delimiter are discarded; trailing buffers are ignored.
    pub fn deserialize(&self, frames: &[Bytes]) -> Result<Message> {
        let start = frames
            .iter()
            .position(|f| f.as_ref() == DELIMITER)
            .ok_or_else(|| KernelError::Protocol("missing <IDS|MSG> delimiter".into()))?;
        let parts = &frames[start + 1..];
        if parts.len() < 5 {
            return Err(KernelError::Protocol(format!("expected at least 5 frames after delimiter, got {}", parts.len())).into());
        }
        let (signature, body) = (&parts[0], &parts[1..5]);
        let body_parts: Vec<&[u8]> = body.iter().map(|b| b.as_ref()).collect();
        self.signer.verify(signature, &body_parts)?;

        Ok(Message {
            header: from_json(&body[0])?,
            parent_header: from_json(&body[1])?,
            metadata: from_json(&body[2])?,
            content: from_json(&body[3])?,
        })
    }
}

fn to_json<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec(value).map_err(KernelError::protocol)?)
}

fn from_json<T: for<'de> Deserialize<'de>>(bytes: &[u8]) -> Result<T> {
    Ok(serde_json::from_slice(bytes).map_err(KernelError::protocol)?)
}
