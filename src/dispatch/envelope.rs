//! Uniform result envelope returned by every dispatch

use serde::Serialize;
use serde_json::{json, Value};
use tracing::error;

use crate::error::{NetdevMcpError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    /// Parsed into a structured record
    Completed,
    /// Raw text; no grammar applied
    CompletedRaw,
    /// Configuration applied
    Success,
    Error,
}

/// Payload of a non-error envelope
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Output {
    Structured(Value),
    Raw(String),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultEnvelope {
    pub status: Status,
    pub device: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<Output>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ResultEnvelope {
    fn new(status: Status, device: &str) -> Self {
        Self {
            status,
            device: device.to_string(),
            message: None,
            output: None,
            error: None,
        }
    }

    pub fn completed(device: &str, record: Value) -> Self {
        Self {
            output: Some(Output::Structured(record)),
            ..Self::new(Status::Completed, device)
        }
    }

    pub fn completed_raw(device: &str, text: impl Into<String>) -> Self {
        Self {
            output: Some(Output::Raw(text.into())),
            ..Self::new(Status::CompletedRaw, device)
        }
    }

    /// Raw text wrapped as `{"raw_output": ...}`
    pub fn learned(device: &str, text: impl Into<String>) -> Self {
        Self {
            output: Some(Output::Structured(json!({ "raw_output": text.into() }))),
            ..Self::new(Status::CompletedRaw, device)
        }
    }

    pub fn configured(device: &str, transcript: impl Into<String>) -> Self {
        Self {
            message: Some(format!("Configuration applied on {}.", device)),
            output: Some(Output::Raw(transcript.into())),
            ..Self::new(Status::Success, device)
        }
    }

    pub fn error(device: &str, message: impl Into<String>) -> Self {
        Self {
            error: Some(message.into()),
            ..Self::new(Status::Error, device)
        }
    }

    /// Convert a dispatch outcome into its envelope
    ///
    /// Policy refusals keep their bare message; every other fault is
    /// reported as `"<prefix>: <fault>"`.
    pub fn from_outcome(device: &str, prefix: &str, outcome: Result<ResultEnvelope>) -> Self {
        match outcome {
            Ok(envelope) => envelope,
            Err(NetdevMcpError::Policy(refusal)) => Self::error(device, refusal.to_string()),
            Err(e) => {
                error!("{} on {}: {}", prefix, device, e);
                Self::error(device, format!("{}: {}", prefix, e))
            }
        }
    }

    pub fn is_error(&self) -> bool {
        self.status == Status::Error
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::PolicyError;

    #[test]
    fn test_serialized_shapes() {
        let parsed = ResultEnvelope::completed("R1", json!({"version": {"os": "IOS-XE"}}));
        assert_eq!(
            serde_json::to_value(&parsed).unwrap(),
            json!({"status": "completed", "device": "R1", "output": {"version": {"os": "IOS-XE"}}})
        );

        let raw = ResultEnvelope::completed_raw("R1", "Gi1 up");
        assert_eq!(
            serde_json::to_value(&raw).unwrap(),
            json!({"status": "completed_raw", "device": "R1", "output": "Gi1 up"})
        );

        let learned = ResultEnvelope::learned("R1", "hostname R1");
        assert_eq!(
            serde_json::to_value(&learned).unwrap(),
            json!({"status": "completed_raw", "device": "R1", "output": {"raw_output": "hostname R1"}})
        );

        let configured = ResultEnvelope::configured("R1", "R1(config)#");
        assert_eq!(
            serde_json::to_value(&configured).unwrap(),
            json!({
                "status": "success",
                "device": "R1",
                "message": "Configuration applied on R1.",
                "output": "R1(config)#"
            })
        );
    }

    #[test]
    fn test_from_outcome_prefixes_faults() {
        let envelope = ResultEnvelope::from_outcome(
            "R1",
            "Execution error",
            Err(NetdevMcpError::connection("refused")),
        );
        assert!(envelope.is_error());
        assert_eq!(
            envelope.error.as_deref(),
            Some("Execution error: SSH connection error: refused")
        );
        assert!(envelope.output.is_none());
    }

    #[test]
    fn test_from_outcome_keeps_policy_message_bare() {
        let envelope = ResultEnvelope::from_outcome(
            "R1",
            "Configuration error",
            Err(PolicyError::DangerousCommand.into()),
        );
        assert_eq!(
            serde_json::to_value(&envelope).unwrap(),
            json!({
                "status": "error",
                "device": "R1",
                "error": "Potentially dangerous command detected (erase). Operation aborted."
            })
        );
    }

    #[test]
    fn test_from_outcome_passes_success_through() {
        let ok = ResultEnvelope::completed_raw("R1", "x");
        assert_eq!(
            ResultEnvelope::from_outcome("R1", "Execution error", Ok(ok.clone())),
            ok
        );
    }
}
