use std::borrow::Cow;

use crate::model::{LogRecord, ParseError};

/// Registry-facing capability: one log dialect (or any user-supplied
/// classifier) that can claim and extract whole messages.
pub trait LineParser: Send + Sync {
    /// Human-readable identifier reported alongside dispatch results.
    ///
    /// Defaults to a snake_case rendering of the implementing type's name.
    fn name(&self) -> Cow<'_, str> {
        Cow::Owned(derived_name(std::any::type_name::<Self>()))
    }

    /// Cheap membership test; side-effect-free, must not panic for any
    /// input string.
    fn matches(&self, message: &str) -> bool;

    /// Full extraction. `Ok(None)` means the dialect does not apply.
    /// Errors are contained by the registry and never abort a dispatch
    /// walk.
    fn extract(&self, message: &str) -> Result<Option<LogRecord>, ParseError>;
}

/// One line-subtype classifier within a dialect.
pub trait SubParser<D: Dialect>: Send + Sync {
    /// Cheap pre-filter, typically a substring check. Side-effect-free,
    /// must not panic for any input string.
    fn matches(&self, payload: &str) -> bool;

    /// Full classification, called only after [`matches`](Self::matches)
    /// returned `true`. `None` means the pre-filter hit but the line could
    /// not be fully parsed; the composite then tries the next candidate.
    fn extract(&self, payload: &str, context: &D::Context) -> Option<D::Line>;
}

/// A log dialect: the envelope/identifier family a composite parser
/// classifies, plus its built-in sub-parser catalog.
///
/// Implemented by unit structs; all operations are associated functions so
/// a dialect is usable without constructing anything.
pub trait Dialect: Sized + 'static {
    /// Fields common to every line of the dialect.
    type Context;

    /// Line-subtype union, including the unknown fallback variant.
    type Line;

    /// Dialect tag; also the source name reported by the registry.
    fn name() -> &'static str;

    /// Cheap dialect-membership test, independent of sub-parsers.
    fn matches(message: &str) -> bool;

    /// Extract dialect-common context and the payload handed to
    /// sub-parsers (envelope prefix stripped, when one is present).
    ///
    /// `None` when the top-level test passed but the context pattern did
    /// not; the whole extraction then yields no record.
    fn context(message: &str) -> Option<(Self::Context, &str)>;

    /// Fallback line for messages no sub-parser fully classifies; receives
    /// the original, unstripped message.
    fn unknown(original: &str) -> Self::Line;

    /// Assemble the final record from context and the winning line.
    fn assemble(context: Self::Context, line: Self::Line) -> LogRecord;

    /// Built-in sub-parser catalog, in default dispatch order.
    fn builtins() -> &'static [Builtin<Self>];
}

/// Catalog entry: a named built-in sub-parser.
pub struct Builtin<D: Dialect> {
    pub name: &'static str,
    pub parser: &'static dyn SubParser<D>,
}

impl<D: Dialect> Clone for Builtin<D> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<D: Dialect> Copy for Builtin<D> {}

impl<D: Dialect> std::fmt::Debug for Builtin<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Builtin").field("name", &self.name).finish()
    }
}

/// snake_case the final segment of a type path (`foo::ParserB` → `parser_b`).
pub(crate) fn derived_name(type_name: &str) -> String {
    let base = type_name.split('<').next().unwrap_or(type_name);
    let base = base.rsplit("::").next().unwrap_or(base);
    let mut out = String::with_capacity(base.len() + 4);
    for (i, ch) in base.chars().enumerate() {
        if ch.is_ascii_uppercase() {
            if i > 0 {
                out.push('_');
            }
            out.push(ch.to_ascii_lowercase());
        } else {
            out.push(ch);
        }
    }
    out
}
