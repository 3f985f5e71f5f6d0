//! One-shot request and response payloads for talking to the producer.
//!
//! Unlike session frames these are single round-trips. A successful
//! `PULL_RECORDING` response acknowledges receipt only; the binary
//! arrives later through a transfer session the producer opens.

use serde::{Deserialize, Serialize};

use crate::types::RecordingInfo;

/// Asks the producer for its recording catalogue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListRecordingsRequest {
    pub limit: usize,
}

/// Catalogue response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListRecordingsResponse {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub recordings: Vec<RecordingInfo>,
}

/// Asks the producer to stream a recording through a transfer session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PullRecordingRequest {
    pub recording_id: String,
    /// Producer-specific payload, echoed back in the session metadata.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<serde_json::Value>,
}

/// Receipt acknowledgment for a pull request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PullRecordingResponse {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub error: String,
}
