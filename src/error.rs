use serde::{Serialize, Deserialize};
use thiserror::Error;

/// Unified error type for the plandeck crate.
/// Public entry points return Result<T, PlanError>; the stage field names
/// the subsystem that produced the error.
#[derive(Debug, Clone, Serialize, Deserialize, Error)]
#[error("[{stage}] {message}{}", detail_suffix(.context, .origin))]
pub struct PlanError {
    pub message: String,
    pub stage: String,
    pub context: Option<String>,
    pub origin: Option<String>,
}

fn detail_suffix(context: &Option<String>, origin: &Option<String>) -> String {
    let mut out = String::new();
    if let Some(context) = context {
        out.push_str(&format!(" (context: {})", context));
    }
    if let Some(origin) = origin {
        out.push_str(&format!(" (source: {})", origin));
    }
    out
}

impl PlanError {
    /// Create a new error with stage and message
    pub fn new<S: Into<String>>(message: S, stage: &'static str) -> Self {
        PlanError {
            message: message.into(),
            stage: stage.to_string(),
            context: None,
            origin: None,
        }
    }

    /// Add additional context information
    pub fn with_context<S: Into<String>>(mut self, context: S) -> Self {
        self.context = Some(context.into());
        self
    }

    /// Record which underlying library produced the error
    pub fn with_origin<S: Into<String>>(mut self, origin: S) -> Self {
        self.origin = Some(origin.into());
        self
    }
}

impl From<anyhow::Error> for PlanError {
    fn from(err: anyhow::Error) -> Self {
        PlanError::new(format!("{:#}", err), "unknown").with_origin("anyhow")
    }
}

impl From<std::io::Error> for PlanError {
    fn from(err: std::io::Error) -> Self {
        PlanError::new(format!("I/O error: {}", err), "io").with_origin("std::io")
    }
}

impl From<serde_json::Error> for PlanError {
    fn from(err: serde_json::Error) -> Self {
        PlanError::new(format!("JSON error: {}", err), "json_parse").with_origin("serde_json")
    }
}

impl From<reqwest::Error> for PlanError {
    fn from(err: reqwest::Error) -> Self {
        PlanError::new(format!("HTTP error: {}", err), "fetch").with_origin("reqwest")
    }
}

impl From<tokio::time::error::Elapsed> for PlanError {
    fn from(_: tokio::time::error::Elapsed) -> Self {
        PlanError::new("Operation timed out", "timeout").with_origin("tokio::time")
    }
}
