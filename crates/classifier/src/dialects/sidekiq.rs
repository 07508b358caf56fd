//! Worker/job-oriented dialect: job-queue worker logs with a timestamp
//! prefix and `pid=`/`tid=`/`class=`/`jid=` context tokens, e.g.
//! `2026-02-04T22:37:47.123Z pid=70831 tid=owx4 class=ShipmentSyncJob
//! jid=9480cf0b927e443155f15a3f elapsed=0.152 INFO: done`.

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;

use crate::composite::Composite;
use crate::fields::FieldPattern;
use crate::model::{LogRecord, WorkerLine, WorkerRecord};
use crate::traits::{Builtin, Dialect, SubParser};

/// The worker/job-oriented dialect.
pub struct SidekiqDialect;

/// Context shared by every line of one job execution.
#[derive(Debug, Clone)]
pub struct SidekiqContext {
    pub timestamp: DateTime<Utc>,
    pub pid: u32,
    pub tid: String,
    pub job_class: String,
    pub jid: String,
}

static TIMESTAMP_PREFIX: Lazy<FieldPattern> = Lazy::new(|| {
    FieldPattern::must(
        "timestamp_prefix",
        r"^\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}(?:\.\d+)?Z",
    )
});

/// One combined pattern for the whole dialect-common context. A line that
/// passes the cheap top-level test but lacks any of these tokens yields no
/// record at all.
static CONTEXT: Lazy<FieldPattern> = Lazy::new(|| {
    FieldPattern::must(
        "worker_context",
        r"^(?P<timestamp>\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}(?:\.\d+)?Z) pid=(?P<pid>\d+) tid=(?P<tid>[A-Za-z0-9]+) class=(?P<job_class>[A-Za-z0-9_:]+) jid=(?P<jid>[0-9a-f]+)",
    )
});

impl Dialect for SidekiqDialect {
    type Context = SidekiqContext;
    type Line = WorkerLine;

    fn name() -> &'static str {
        "sidekiq"
    }

    fn matches(message: &str) -> bool {
        TIMESTAMP_PREFIX.is_match(message)
            && message.contains("pid=")
            && message.contains("tid=")
    }

    fn context(message: &str) -> Option<(SidekiqContext, &str)> {
        let (mut fields, payload) = CONTEXT.strip_prefix(message)?;
        let timestamp = parse_timestamp(fields.get("timestamp")?)?;
        let pid = fields.get("pid")?.parse().ok()?;
        Some((
            SidekiqContext {
                timestamp,
                pid,
                tid: fields.remove("tid")?,
                job_class: fields.remove("job_class")?,
                jid: fields.remove("jid")?,
            },
            payload,
        ))
    }

    fn unknown(original: &str) -> WorkerLine {
        WorkerLine::Unknown {
            raw_message: original.to_string(),
        }
    }

    fn assemble(context: SidekiqContext, line: WorkerLine) -> LogRecord {
        LogRecord::Sidekiq(WorkerRecord {
            timestamp: context.timestamp,
            pid: context.pid,
            tid: context.tid,
            job_class: context.job_class,
            jid: context.jid,
            line,
        })
    }

    fn builtins() -> &'static [Builtin<Self>] {
        &BUILTINS
    }
}

fn parse_timestamp(text: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(text)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// `INFO: start`: fixed status, no extra fields.
pub struct StartLine;

static START_PATTERN: Lazy<FieldPattern> =
    Lazy::new(|| FieldPattern::must("job_start", r"INFO: start\s*$"));

impl SubParser<SidekiqDialect> for StartLine {
    fn matches(&self, payload: &str) -> bool {
        payload.contains("start")
    }

    fn extract(&self, payload: &str, _context: &SidekiqContext) -> Option<WorkerLine> {
        START_PATTERN.is_match(payload).then_some(WorkerLine::Start)
    }
}

/// `elapsed=0.152 INFO: done`; elapsed stays absent when the token is
/// missing.
pub struct DoneLine;

static DONE_PATTERN: Lazy<FieldPattern> = Lazy::new(|| {
    FieldPattern::must(
        "job_done",
        r"(?:elapsed=(?P<elapsed>\d+(?:\.\d+)?)\s+)?INFO: done\s*$",
    )
});

impl SubParser<SidekiqDialect> for DoneLine {
    fn matches(&self, payload: &str) -> bool {
        payload.contains("done")
    }

    fn extract(&self, payload: &str, _context: &SidekiqContext) -> Option<WorkerLine> {
        let fields = DONE_PATTERN.captures(payload)?;
        let elapsed = fields.get("elapsed").and_then(|v| v.parse().ok());
        Some(WorkerLine::Done { elapsed })
    }
}

/// Failure lines: the explicit `INFO: fail` marker, or a generic
/// `ERROR:` severity marker with the error text.
pub struct FailLine;

static FAIL_PATTERN: Lazy<FieldPattern> =
    Lazy::new(|| FieldPattern::must("job_fail", r"INFO: fail\s*$"));

static ERROR_PATTERN: Lazy<FieldPattern> =
    Lazy::new(|| FieldPattern::must("job_error", r"ERROR: (?P<error>.*\S)"));

impl SubParser<SidekiqDialect> for FailLine {
    fn matches(&self, payload: &str) -> bool {
        payload.contains("fail") || payload.contains("ERROR")
    }

    fn extract(&self, payload: &str, _context: &SidekiqContext) -> Option<WorkerLine> {
        if FAIL_PATTERN.is_match(payload) {
            return Some(WorkerLine::Fail { error: None });
        }
        let mut fields = ERROR_PATTERN.captures(payload)?;
        Some(WorkerLine::Fail {
            error: fields.remove("error"),
        })
    }
}

static START: StartLine = StartLine;
static DONE: DoneLine = DoneLine;
static FAIL: FailLine = FailLine;

static BUILTINS: [Builtin<SidekiqDialect>; 3] = [
    Builtin { name: "start", parser: &START },
    Builtin { name: "done", parser: &DONE },
    Builtin { name: "fail", parser: &FAIL },
];

static DEFAULT: Lazy<Composite<SidekiqDialect>> = Lazy::new(Composite::new);

/// One-shot classification with the default sub-parser set.
pub fn classify(message: &str) -> Option<LogRecord> {
    DEFAULT.extract(message)
}
