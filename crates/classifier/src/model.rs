use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

/// Configuration errors, raised synchronously at parser construction or
/// registry registration time. Never produced during dispatch, and never
/// suppressed.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unknown sub-parser `{name}` for dialect `{dialect}` (available: {available})")]
    UnknownSubParser {
        dialect: &'static str,
        name: String,
        available: String,
    },

    #[error("invalid pattern `{label}`: {source}")]
    InvalidPattern {
        label: String,
        #[source]
        source: regex::Error,
    },
}

/// Dispatch-time failure from a [`LineParser`](crate::traits::LineParser).
///
/// The built-in composite parsers never produce these; third-party parsers
/// can. The registry logs and skips a failing parser instead of aborting
/// the dispatch walk.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("malformed line: {0}")]
    Malformed(String),

    #[error(transparent)]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

/// A structured record produced by one parse call.
///
/// Tagged union over dialect; each dialect carries its own line-subtype
/// union. Immutable once built, with no back-reference to the producing
/// parser.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "dialect", rename_all = "snake_case")]
pub enum LogRecord {
    Rails(RequestRecord),
    Sidekiq(WorkerRecord),
    Custom(CustomRecord),
}

impl LogRecord {
    pub fn dialect(&self) -> &'static str {
        match self {
            LogRecord::Rails(_) => "rails",
            LogRecord::Sidekiq(_) => "sidekiq",
            LogRecord::Custom(_) => "custom",
        }
    }

    /// Classification tag; `"unknown"` is the universal fallback.
    pub fn line_type(&self) -> &str {
        match self {
            LogRecord::Rails(record) => record.line.line_type(),
            LogRecord::Sidekiq(record) => record.line.line_type(),
            LogRecord::Custom(record) => &record.line_type,
        }
    }

    /// Original raw message, carried only by unknown-classified records.
    pub fn raw_message(&self) -> Option<&str> {
        match self {
            LogRecord::Rails(record) => match &record.line {
                RequestLine::Unknown { raw_message } => Some(raw_message),
                _ => None,
            },
            LogRecord::Sidekiq(record) => match &record.line {
                WorkerLine::Unknown { raw_message } => Some(raw_message),
                _ => None,
            },
            LogRecord::Custom(record) => record.raw_message.as_deref(),
        }
    }
}

/// Syslog-style envelope prefix on a request-dialect line.
///
/// The envelope timestamp lacks a year and timezone, so it stays textual.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SyslogEnvelope {
    pub timestamp: String,
    pub host: String,
    pub program: String,
    pub pid: u32,
}

/// One classified line of the request-oriented (`rails`) dialect.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RequestRecord {
    /// Correlation id shared by every line of one request.
    pub request_id: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub envelope: Option<SyslogEnvelope>,

    #[serde(flatten)]
    pub line: RequestLine,
}

/// Line-subtype union for the request-oriented dialect.
///
/// Each variant carries only the fields its line shape produces; `Unknown`
/// preserves the original message verbatim.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "line_type", rename_all = "snake_case")]
pub enum RequestLine {
    Request {
        http_method: String,
        path: String,
        ip_address: String,
    },
    Parameters {
        params: RequestParams,
    },
    Redirect {
        location: String,
    },
    Enqueue {
        job_class: String,
        job_id: String,
        queue: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        arguments: Option<String>,
    },
    Processing {
        handler: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        format: Option<String>,
    },
    Completed {
        status: u16,
        duration_ms: f64,
    },
    Unknown {
        raw_message: String,
    },
}

impl RequestLine {
    pub fn line_type(&self) -> &'static str {
        match self {
            RequestLine::Request { .. } => "request",
            RequestLine::Parameters { .. } => "parameters",
            RequestLine::Redirect { .. } => "redirect",
            RequestLine::Enqueue { .. } => "enqueue",
            RequestLine::Processing { .. } => "processing",
            RequestLine::Completed { .. } => "completed",
            RequestLine::Unknown { .. } => "unknown",
        }
    }
}

/// Parameter-dump payload: structured when the dump parses as a nested
/// key/value tree, the raw text otherwise.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum RequestParams {
    Structured(serde_json::Map<String, serde_json::Value>),
    Raw(String),
}

/// One classified line of the worker/job-oriented (`sidekiq`) dialect.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkerRecord {
    pub timestamp: DateTime<Utc>,
    pub pid: u32,
    pub tid: String,
    pub job_class: String,
    pub jid: String,

    #[serde(flatten)]
    pub line: WorkerLine,
}

/// Line-subtype union for the worker dialect.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "line_type", rename_all = "snake_case")]
pub enum WorkerLine {
    Start,
    Done {
        #[serde(skip_serializing_if = "Option::is_none")]
        elapsed: Option<f64>,
    },
    Fail {
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    Unknown {
        raw_message: String,
    },
}

impl WorkerLine {
    pub fn line_type(&self) -> &'static str {
        match self {
            WorkerLine::Start => "start",
            WorkerLine::Done { .. } => "done",
            WorkerLine::Fail { .. } => "fail",
            WorkerLine::Unknown { .. } => "unknown",
        }
    }

    /// Job status for classified lines; `None` for unknown.
    pub fn status(&self) -> Option<&'static str> {
        match self {
            WorkerLine::Start => Some("start"),
            WorkerLine::Done { .. } => Some("done"),
            WorkerLine::Fail { .. } => Some("fail"),
            WorkerLine::Unknown { .. } => None,
        }
    }
}

/// Record shape for user-supplied registry parsers that do not define a
/// dialect of their own: a classification tag plus whatever fields the
/// parser produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CustomRecord {
    pub line_type: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_message: Option<String>,

    pub fields: BTreeMap<String, String>,
}

impl CustomRecord {
    /// Classified record with the given tag.
    pub fn classified(line_type: impl Into<String>) -> Self {
        Self {
            line_type: line_type.into(),
            raw_message: None,
            fields: BTreeMap::new(),
        }
    }

    /// Unclassified fallback preserving the original message.
    pub fn unknown(raw_message: impl Into<String>) -> Self {
        Self {
            line_type: "unknown".to_string(),
            raw_message: Some(raw_message.into()),
            fields: BTreeMap::new(),
        }
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_dialect_and_line_type_tags() {
        let record = LogRecord::Rails(RequestRecord {
            request_id: "c3784123-8ce1-4b7e-8583-3e6f61ef5676".to_string(),
            envelope: None,
            line: RequestLine::Redirect {
                location: "https://example.com/".to_string(),
            },
        });

        assert_eq!(record.dialect(), "rails");
        assert_eq!(record.line_type(), "redirect");
        assert_eq!(record.raw_message(), None);
    }

    #[test]
    fn test_unknown_record_carries_raw_message() {
        let record = LogRecord::Rails(RequestRecord {
            request_id: "c3784123-8ce1-4b7e-8583-3e6f61ef5676".to_string(),
            envelope: None,
            line: RequestLine::Unknown {
                raw_message: "[c3784123] Some random log message".to_string(),
            },
        });

        assert_eq!(record.line_type(), "unknown");
        assert_eq!(record.raw_message(), Some("[c3784123] Some random log message"));
    }

    #[test]
    fn test_worker_line_status() {
        assert_eq!(WorkerLine::Start.status(), Some("start"));
        assert_eq!(WorkerLine::Done { elapsed: Some(0.152) }.status(), Some("done"));
        assert_eq!(WorkerLine::Fail { error: None }.status(), Some("fail"));
        assert_eq!(
            WorkerLine::Unknown { raw_message: "x".to_string() }.status(),
            None
        );
    }

    #[test]
    fn test_serialized_shape_is_flat_and_tagged() {
        let record = LogRecord::Rails(RequestRecord {
            request_id: "c3784123-8ce1-4b7e-8583-3e6f61ef5676".to_string(),
            envelope: None,
            line: RequestLine::Request {
                http_method: "GET".to_string(),
                path: "/shipments/443155".to_string(),
                ip_address: "45.77.120.91".to_string(),
            },
        });

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["dialect"], "rails");
        assert_eq!(json["line_type"], "request");
        assert_eq!(json["http_method"], "GET");
        assert!(json.get("envelope").is_none(), "absent envelope must be skipped");
    }

    #[test]
    fn test_absent_elapsed_not_serialized_as_zero() {
        let record = LogRecord::Sidekiq(WorkerRecord {
            timestamp: chrono::DateTime::parse_from_rfc3339("2026-02-04T22:37:47.123Z")
                .unwrap()
                .with_timezone(&Utc),
            pid: 70831,
            tid: "owx4".to_string(),
            job_class: "ShipmentSyncJob".to_string(),
            jid: "9480cf0b927e443155f15a3f".to_string(),
            line: WorkerLine::Done { elapsed: None },
        });

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["line_type"], "done");
        assert!(json.get("elapsed").is_none());
    }

    #[test]
    fn test_custom_record_builders() {
        let record = CustomRecord::classified("deploy").with_field("version", "1.2.3");
        assert_eq!(record.line_type, "deploy");
        assert_eq!(record.fields.get("version").map(String::as_str), Some("1.2.3"));
        assert_eq!(record.raw_message, None);

        let fallback = CustomRecord::unknown("garbled input");
        assert_eq!(fallback.line_type, "unknown");
        assert_eq!(fallback.raw_message.as_deref(), Some("garbled input"));
    }
}
