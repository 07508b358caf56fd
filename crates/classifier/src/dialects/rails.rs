//! Request-oriented dialect: web-framework request logs tagged with a
//! bracketed request id, optionally wrapped in a syslog-style envelope
//! (`Feb  4 22:37:47 host program[pid]: …`).

use once_cell::sync::Lazy;

use crate::composite::Composite;
use crate::fields::{FieldMap, FieldPattern};
use crate::model::{LogRecord, RequestLine, RequestParams, RequestRecord, SyslogEnvelope};
use crate::traits::{Builtin, Dialect, SubParser};

use super::params;

/// The request-oriented dialect.
pub struct RailsDialect;

/// Context shared by every line of one request.
#[derive(Debug, Clone)]
pub struct RailsContext {
    pub request_id: String,
    pub envelope: Option<SyslogEnvelope>,
}

static REQUEST_ID: Lazy<FieldPattern> = Lazy::new(|| {
    FieldPattern::must(
        "request_id",
        r"\[(?P<request_id>[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12})\]",
    )
});

static ENVELOPE: Lazy<FieldPattern> = Lazy::new(|| {
    FieldPattern::must(
        "syslog_envelope",
        r"^(?P<timestamp>[A-Z][a-z]{2}\s+\d{1,2} \d{2}:\d{2}:\d{2}) (?P<host>\S+) (?P<program>[^\s\[]+)\[(?P<pid>\d+)\]:\s*",
    )
});

impl Dialect for RailsDialect {
    type Context = RailsContext;
    type Line = RequestLine;

    fn name() -> &'static str {
        "rails"
    }

    fn matches(message: &str) -> bool {
        REQUEST_ID.is_match(message)
    }

    /// The envelope is extracted and stripped whenever present, even if no
    /// sub-parser ends up classifying the payload.
    fn context(message: &str) -> Option<(RailsContext, &str)> {
        let mut id_fields = REQUEST_ID.captures(message)?;
        let request_id = id_fields.remove("request_id")?;
        let (envelope, payload) = match ENVELOPE.strip_prefix(message) {
            Some((fields, rest)) => (envelope_from(fields), rest),
            None => (None, message),
        };
        Some((RailsContext { request_id, envelope }, payload))
    }

    fn unknown(original: &str) -> RequestLine {
        RequestLine::Unknown {
            raw_message: original.to_string(),
        }
    }

    fn assemble(context: RailsContext, line: RequestLine) -> LogRecord {
        LogRecord::Rails(RequestRecord {
            request_id: context.request_id,
            envelope: context.envelope,
            line,
        })
    }

    fn builtins() -> &'static [Builtin<Self>] {
        &BUILTINS
    }
}

fn envelope_from(mut fields: FieldMap) -> Option<SyslogEnvelope> {
    let pid = fields.get("pid")?.parse().ok()?;
    Some(SyslogEnvelope {
        timestamp: fields.remove("timestamp")?,
        host: fields.remove("host")?,
        program: fields.remove("program")?,
        pid,
    })
}

/// `Started GET "/shipments/443155" for 45.77.120.91 at …`
pub struct RequestStart;

static REQUEST_LINE: Lazy<FieldPattern> = Lazy::new(|| {
    FieldPattern::must(
        "request_start",
        r#"Started (?P<http_method>[A-Z]+) "(?P<path>[^"]*)" for (?P<ip_address>[0-9a-fA-F.:]+)"#,
    )
});

impl SubParser<RailsDialect> for RequestStart {
    fn matches(&self, payload: &str) -> bool {
        payload.contains("Started ")
    }

    fn extract(&self, payload: &str, _context: &RailsContext) -> Option<RequestLine> {
        let mut fields = REQUEST_LINE.captures(payload)?;
        Some(RequestLine::Request {
            http_method: fields.remove("http_method")?,
            path: fields.remove("path")?,
            ip_address: fields.remove("ip_address")?,
        })
    }
}

/// `Processing by ShipmentsController#show as HTML`
pub struct ProcessingLine;

static PROCESSING_PATTERN: Lazy<FieldPattern> = Lazy::new(|| {
    FieldPattern::must(
        "processing",
        r"Processing by (?P<handler>[A-Za-z0-9_:]+#[A-Za-z0-9_]+)(?: as (?P<format>\S+))?",
    )
});

impl SubParser<RailsDialect> for ProcessingLine {
    fn matches(&self, payload: &str) -> bool {
        payload.contains("Processing by ")
    }

    fn extract(&self, payload: &str, _context: &RailsContext) -> Option<RequestLine> {
        let mut fields = PROCESSING_PATTERN.captures(payload)?;
        Some(RequestLine::Processing {
            handler: fields.remove("handler")?,
            format: fields.remove("format"),
        })
    }
}

/// `Parameters: {"key"=>"value", …}`: structured when the dump parses,
/// raw text otherwise.
pub struct ParametersLine;

const PARAMETERS_MARKER: &str = "Parameters: ";

impl SubParser<RailsDialect> for ParametersLine {
    fn matches(&self, payload: &str) -> bool {
        payload.contains(PARAMETERS_MARKER)
    }

    fn extract(&self, payload: &str, _context: &RailsContext) -> Option<RequestLine> {
        let start = payload.find(PARAMETERS_MARKER)? + PARAMETERS_MARKER.len();
        let dump = payload[start..].trim();
        let params = match params::parse(dump) {
            Some(serde_json::Value::Object(map)) => RequestParams::Structured(map),
            _ => RequestParams::Raw(dump.to_string()),
        };
        Some(RequestLine::Parameters { params })
    }
}

/// `Redirected to https://…`
pub struct RedirectLine;

static REDIRECT_PATTERN: Lazy<FieldPattern> =
    Lazy::new(|| FieldPattern::must("redirect", r"Redirected to (?P<location>\S+)"));

impl SubParser<RailsDialect> for RedirectLine {
    fn matches(&self, payload: &str) -> bool {
        payload.contains("Redirected to ")
    }

    fn extract(&self, payload: &str, _context: &RailsContext) -> Option<RequestLine> {
        let mut fields = REDIRECT_PATTERN.captures(payload)?;
        Some(RequestLine::Redirect {
            location: fields.remove("location")?,
        })
    }
}

/// `Enqueued ShipmentSyncJob (Job ID: …) to Sidekiq(default) with arguments: …`
pub struct EnqueueLine;

static ENQUEUE_PATTERN: Lazy<FieldPattern> = Lazy::new(|| {
    FieldPattern::must(
        "job_enqueue",
        r"Enqueued (?P<job_class>[A-Za-z0-9_:]+) \(Job ID: (?P<job_id>[0-9a-f-]+)\) to \w+\((?P<queue>[^)]*)\)(?: with arguments: (?P<arguments>.+))?",
    )
});

impl SubParser<RailsDialect> for EnqueueLine {
    fn matches(&self, payload: &str) -> bool {
        payload.contains("Enqueued ")
    }

    fn extract(&self, payload: &str, _context: &RailsContext) -> Option<RequestLine> {
        let mut fields = ENQUEUE_PATTERN.captures(payload)?;
        Some(RequestLine::Enqueue {
            job_class: fields.remove("job_class")?,
            job_id: fields.remove("job_id")?,
            queue: fields.remove("queue")?,
            arguments: fields.remove("arguments"),
        })
    }
}

/// `Completed 200 OK in 52ms (Views: 45.2ms | ActiveRecord: 3.9ms)`
///
/// Durations reported in seconds are normalised to milliseconds.
pub struct CompletedLine;

static COMPLETED_PATTERN: Lazy<FieldPattern> = Lazy::new(|| {
    FieldPattern::must(
        "request_completed",
        r"Completed (?P<status>\d{3})[^(]*? in (?P<duration>\d+(?:\.\d+)?)(?P<unit>ms|s)\b",
    )
});

impl SubParser<RailsDialect> for CompletedLine {
    fn matches(&self, payload: &str) -> bool {
        payload.contains("Completed ")
    }

    fn extract(&self, payload: &str, _context: &RailsContext) -> Option<RequestLine> {
        let mut fields = COMPLETED_PATTERN.captures(payload)?;
        let status = fields.remove("status")?.parse().ok()?;
        let value: f64 = fields.remove("duration")?.parse().ok()?;
        let duration_ms = match fields.remove("unit")?.as_str() {
            "s" => value * 1000.0,
            _ => value,
        };
        Some(RequestLine::Completed { status, duration_ms })
    }
}

static REQUEST: RequestStart = RequestStart;
static PROCESSING: ProcessingLine = ProcessingLine;
static PARAMETERS: ParametersLine = ParametersLine;
static REDIRECT: RedirectLine = RedirectLine;
static ENQUEUE: EnqueueLine = EnqueueLine;
static COMPLETED: CompletedLine = CompletedLine;

static BUILTINS: [Builtin<RailsDialect>; 6] = [
    Builtin { name: "request", parser: &REQUEST },
    Builtin { name: "processing", parser: &PROCESSING },
    Builtin { name: "parameters", parser: &PARAMETERS },
    Builtin { name: "redirect", parser: &REDIRECT },
    Builtin { name: "enqueue", parser: &ENQUEUE },
    Builtin { name: "completed", parser: &COMPLETED },
];

static DEFAULT: Lazy<Composite<RailsDialect>> = Lazy::new(Composite::new);

/// One-shot classification with the default sub-parser set.
pub fn classify(message: &str) -> Option<LogRecord> {
    DEFAULT.extract(message)
}
