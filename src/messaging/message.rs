//! # Action Messages
//!
//! Wire shapes for the inbound action queue and the outbound result queue,
//! plus callback-descriptor extraction from message metadata.

use crate::constants::{CALLBACK_METHOD_KEY, CALLBACK_QUEUE_KEY, OUTBOUND_QUEUE_SUFFIX};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Discriminator selecting which handler processes a message.
///
/// Unrecognized tags decode to `Unknown` so a bad producer cannot poison
/// deserialization of the envelope; dispatch then classifies them as
/// non-retryable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ActionTag {
    CreateTask,
    UpdateTask,
    DeleteTask,
    TaskResult,
    Unknown,
}

impl std::str::FromStr for ActionTag {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "CreateTask" => Self::CreateTask,
            "UpdateTask" => Self::UpdateTask,
            "DeleteTask" => Self::DeleteTask,
            "TaskResult" => Self::TaskResult,
            _ => Self::Unknown,
        })
    }
}

impl<'de> Deserialize<'de> for ActionTag {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        // Infallible by construction.
        Ok(raw.parse().unwrap_or(Self::Unknown))
    }
}

impl fmt::Display for ActionTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::CreateTask => "CreateTask",
            Self::UpdateTask => "UpdateTask",
            Self::DeleteTask => "DeleteTask",
            Self::TaskResult => "TaskResult",
            Self::Unknown => "Unknown",
        };
        f.write_str(name)
    }
}

/// One queue message: an action tag, an opaque payload, and optional
/// metadata. Immutable once dispatched; the same message may be redelivered.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionMessage {
    pub action: ActionTag,
    #[serde(default)]
    pub payload: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<HashMap<String, String>>,
}

impl ActionMessage {
    pub fn new(action: ActionTag, payload: serde_json::Value) -> Self {
        Self {
            action,
            payload,
            metadata: None,
        }
    }

    pub fn with_metadata(mut self, metadata: HashMap<String, String>) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

/// Reply destination extracted from message metadata. Never persisted;
/// recomputed per message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackDescriptor {
    pub queue_name: String,
    pub method: String,
}

impl CallbackDescriptor {
    /// Extract a descriptor from metadata, if both keys are present and
    /// non-empty. A missing or malformed descriptor is `None`, not an
    /// error: replies are best-effort.
    pub fn from_metadata(metadata: Option<&HashMap<String, String>>) -> Option<Self> {
        let metadata = metadata?;
        let queue_name = metadata.get(CALLBACK_QUEUE_KEY)?.trim();
        let method = metadata.get(CALLBACK_METHOD_KEY)?.trim();
        if queue_name.is_empty() || method.is_empty() {
            return None;
        }
        Some(Self {
            queue_name: queue_name.to_string(),
            method: method.to_string(),
        })
    }

    /// Every inbound queue has a matching outbound companion; replies go
    /// there, never back onto the inbound queue.
    pub fn outbound_queue(&self) -> String {
        format!("{}{}", self.queue_name, OUTBOUND_QUEUE_SUFFIX)
    }
}

/// Final status reported for a processed task action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskStatus {
    Created,
    Updated,
}

/// Payload of the `TaskResult` message emitted to callback destinations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskResultPayload {
    pub id: i64,
    pub status: TaskStatus,
}

impl TaskResultPayload {
    /// Build the full result envelope, echoing the original metadata so the
    /// recipient can correlate the reply.
    pub fn into_message(
        self,
        metadata: Option<HashMap<String, String>>,
    ) -> Result<ActionMessage, serde_json::Error> {
        Ok(ActionMessage {
            action: ActionTag::TaskResult,
            payload: serde_json::to_value(self)?,
            metadata,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metadata(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn unknown_action_tags_decode_instead_of_failing() {
        let msg: ActionMessage =
            serde_json::from_str(r#"{"action": "LaunchRocket", "payload": {}}"#).unwrap();
        assert_eq!(msg.action, ActionTag::Unknown);
    }

    #[test]
    fn descriptor_requires_both_keys() {
        let full = metadata(&[("callback_queue", "lessons"), ("callback_method", "TaskDone")]);
        let desc = CallbackDescriptor::from_metadata(Some(&full)).unwrap();
        assert_eq!(desc.queue_name, "lessons");
        assert_eq!(desc.method, "TaskDone");
        assert_eq!(desc.outbound_queue(), "lessons-out");

        let missing_method = metadata(&[("callback_queue", "lessons")]);
        assert!(CallbackDescriptor::from_metadata(Some(&missing_method)).is_none());
        assert!(CallbackDescriptor::from_metadata(None).is_none());
    }

    #[test]
    fn blank_descriptor_values_are_malformed() {
        let blank = metadata(&[("callback_queue", "  "), ("callback_method", "TaskDone")]);
        assert!(CallbackDescriptor::from_metadata(Some(&blank)).is_none());
    }

    #[test]
    fn result_message_echoes_metadata() {
        let original = metadata(&[("callback_queue", "games"), ("correlation_id", "abc")]);
        let msg = TaskResultPayload {
            id: 7,
            status: TaskStatus::Created,
        }
        .into_message(Some(original.clone()))
        .unwrap();
        assert_eq!(msg.action, ActionTag::TaskResult);
        assert_eq!(msg.metadata, Some(original));
        assert_eq!(msg.payload["status"], "Created");
    }
}
