//! Wire frame codec
//!
//! Every message crossing a channel is one JSON array:
//!
//! ```text
//! [id, topic, payload]          fire-and-forget
//! [id, topic, payload, true]    sender expects a reply on topic:resolve:id / topic:reject:id
//! ```
//!
//! `id` is a fresh UUID on every frame, including frames that expect no
//! reply, so framing is uniform. `payload` is any JSON value.

use serde_json::Value;
use uuid::Uuid;

use crate::error::FrameError;

/// A decoded wire message.
#[derive(Debug, Clone, PartialEq)]
pub struct WireFrame {
    pub id: String,
    pub topic: String,
    pub payload: Value,
    pub expects_response: bool,
}

impl WireFrame {
    /// Fire-and-forget frame with a fresh id.
    pub fn new(topic: impl Into<String>, payload: Value) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            topic: topic.into(),
            payload,
            expects_response: false,
        }
    }

    /// Frame whose sender awaits a resolve/reject reply.
    pub fn request(topic: impl Into<String>, payload: Value) -> Self {
        Self {
            expects_response: true,
            ..Self::new(topic, payload)
        }
    }

    /// Encode as the 3- or 4-element JSON array.
    pub fn encode(&self) -> Result<String, FrameError> {
        let text = if self.expects_response {
            serde_json::to_string(&(&self.id, &self.topic, &self.payload, true))?
        } else {
            serde_json::to_string(&(&self.id, &self.topic, &self.payload))?
        };
        Ok(text)
    }

    /// Decode a JSON array frame.
    pub fn decode(text: &str) -> Result<Self, FrameError> {
        let value: Value = serde_json::from_str(text)?;
        let Value::Array(mut parts) = value else {
            return Err(FrameError::NotAnArray);
        };

        if parts.len() != 3 && parts.len() != 4 {
            return Err(FrameError::WrongArity(parts.len()));
        }

        let expects_response = if parts.len() == 4 {
            match parts.pop() {
                Some(Value::Bool(flag)) => flag,
                Some(Value::Null) => false,
                _ => return Err(FrameError::InvalidField("expectsResponse")),
            }
        } else {
            false
        };

        let payload = parts.pop().unwrap_or(Value::Null);

        let topic = match parts.pop() {
            Some(Value::String(topic)) if !topic.is_empty() => topic,
            _ => return Err(FrameError::InvalidField("topic")),
        };

        let id = match parts.pop() {
            Some(Value::String(id)) if !id.is_empty() => id,
            _ => return Err(FrameError::InvalidField("id")),
        };

        Ok(Self {
            id,
            topic,
            payload,
            expects_response,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_fire_and_forget_is_three_elements() {
        let frame = WireFrame::new("ar.focus.state", json!({"state": true}));
        let text = frame.encode().unwrap();
        let parsed: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed.as_array().unwrap().len(), 3);
        assert_eq!(parsed[1], "ar.focus.state");
    }

    #[test]
    fn test_request_carries_flag() {
        let frame = WireFrame::request("ar.context.subscribe", json!({"id": "E1"}));
        let text = frame.encode().unwrap();
        let parsed: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed[3], true);

        let decoded = WireFrame::decode(&text).unwrap();
        assert_eq!(decoded, frame);
    }

    #[test]
    fn test_every_frame_gets_fresh_id() {
        let a = WireFrame::new("t", Value::Null);
        let b = WireFrame::new("t", Value::Null);
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_decode_rejects_malformed() {
        assert!(matches!(WireFrame::decode("{}"), Err(FrameError::NotAnArray)));
        assert!(matches!(
            WireFrame::decode(r#"["id", "topic"]"#),
            Err(FrameError::WrongArity(2))
        ));
        assert!(matches!(
            WireFrame::decode(r#"["id", 5, null]"#),
            Err(FrameError::InvalidField("topic"))
        ));
        assert!(matches!(
            WireFrame::decode(r#"["id", "t", null, "yes"]"#),
            Err(FrameError::InvalidField("expectsResponse"))
        ));
        assert!(matches!(WireFrame::decode("not json"), Err(FrameError::Json(_))));
    }

    #[test]
    fn test_decode_accepts_null_flag() {
        let frame = WireFrame::decode(r#"["abc", "ar.session.close", null, null]"#).unwrap();
        assert!(!frame.expects_response);
        assert_eq!(frame.topic, "ar.session.close");
    }
}
