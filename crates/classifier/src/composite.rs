//! Dialect-level composite parser: ordered sub-parser dispatch.
//!
//! A [`Composite`] owns an ordered, identity-deduplicated list of
//! sub-parsers resolved once at construction. Extraction tries each
//! candidate's cheap filter before committing to its full parse and stops
//! at the first fully classified line; anything left over falls back to
//! the dialect's unknown line carrying the original message.

use std::borrow::Cow;
use std::sync::Arc;

use crate::model::{ConfigError, LogRecord, ParseError};
use crate::traits::{Builtin, Dialect, LineParser, SubParser};

/// Construction-time selector for a composite parser's sub-parser list.
pub enum SubParserSpec<D: Dialect> {
    /// Every built-in, in default catalog order.
    All,
    /// A built-in, by catalog name.
    Named(String),
    /// An externally supplied sub-parser.
    Custom(Arc<dyn SubParser<D>>),
}

impl<D: Dialect> From<&str> for SubParserSpec<D> {
    fn from(name: &str) -> Self {
        SubParserSpec::Named(name.to_string())
    }
}

impl<D: Dialect> From<String> for SubParserSpec<D> {
    fn from(name: String) -> Self {
        SubParserSpec::Named(name)
    }
}

impl<D: Dialect> From<Arc<dyn SubParser<D>>> for SubParserSpec<D> {
    fn from(parser: Arc<dyn SubParser<D>>) -> Self {
        SubParserSpec::Custom(parser)
    }
}

enum ResolvedSub<D: Dialect> {
    Builtin(Builtin<D>),
    Custom(Arc<dyn SubParser<D>>),
}

impl<D: Dialect> ResolvedSub<D> {
    fn parser(&self) -> &dyn SubParser<D> {
        match self {
            ResolvedSub::Builtin(builtin) => builtin.parser,
            ResolvedSub::Custom(parser) => parser.as_ref(),
        }
    }

    /// Built-ins are identified by catalog name, ad hoc sub-parsers by
    /// instance.
    fn same_identity(&self, other: &Self) -> bool {
        match (self, other) {
            (ResolvedSub::Builtin(a), ResolvedSub::Builtin(b)) => a.name == b.name,
            (ResolvedSub::Custom(a), ResolvedSub::Custom(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    fn catalog_name(&self) -> Option<&'static str> {
        match self {
            ResolvedSub::Builtin(builtin) => Some(builtin.name),
            ResolvedSub::Custom(_) => None,
        }
    }
}

/// A dialect-level classifier over an ordered sub-parser list.
///
/// The list is fixed at construction; re-running extraction never
/// reorders it.
pub struct Composite<D: Dialect> {
    subs: Vec<ResolvedSub<D>>,
}

impl<D: Dialect> Composite<D> {
    /// Composite over the full built-in catalog in default order.
    pub fn new() -> Self {
        Self {
            subs: D::builtins().iter().copied().map(ResolvedSub::Builtin).collect(),
        }
    }

    /// Composite over an explicit sub-parser selection.
    ///
    /// An empty selection is equivalent to [`Composite::new`]. Duplicate
    /// entries keep their first position. Unknown catalog names fail fast
    /// with a [`ConfigError`] listing the available built-ins.
    pub fn with<I>(specs: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = SubParserSpec<D>>,
    {
        let mut subs: Vec<ResolvedSub<D>> = Vec::new();
        for spec in specs {
            match spec {
                SubParserSpec::All => {
                    for builtin in D::builtins() {
                        push_unique(&mut subs, ResolvedSub::Builtin(*builtin));
                    }
                }
                SubParserSpec::Named(name) => {
                    let builtin = D::builtins()
                        .iter()
                        .find(|b| b.name == name)
                        .ok_or_else(|| ConfigError::UnknownSubParser {
                            dialect: D::name(),
                            name: name.clone(),
                            available: D::builtins()
                                .iter()
                                .map(|b| b.name)
                                .collect::<Vec<_>>()
                                .join(", "),
                        })?;
                    push_unique(&mut subs, ResolvedSub::Builtin(*builtin));
                }
                SubParserSpec::Custom(parser) => {
                    push_unique(&mut subs, ResolvedSub::Custom(parser));
                }
            }
        }
        if subs.is_empty() {
            return Ok(Self::new());
        }
        Ok(Self { subs })
    }

    /// Catalog names of the configured sub-parsers, in dispatch order.
    /// `None` entries are ad hoc sub-parsers.
    pub fn sub_parsers(&self) -> Vec<Option<&'static str>> {
        self.subs.iter().map(ResolvedSub::catalog_name).collect()
    }

    /// Cheap dialect-level test, independent of the sub-parser list.
    pub fn matches(&self, message: &str) -> bool {
        D::matches(message)
    }

    /// Classify one message.
    ///
    /// `None` means the dialect does not apply (or its context pattern
    /// failed). Otherwise a record is always produced: the first
    /// sub-parser to fully classify the payload wins, and anything left
    /// over becomes the unknown fallback carrying the original message.
    pub fn extract(&self, message: &str) -> Option<LogRecord> {
        if !D::matches(message) {
            return None;
        }
        let (context, payload) = D::context(message)?;
        for sub in &self.subs {
            let parser = sub.parser();
            if !parser.matches(payload) {
                continue;
            }
            if let Some(line) = parser.extract(payload, &context) {
                return Some(D::assemble(context, line));
            }
        }
        Some(D::assemble(context, D::unknown(message)))
    }
}

fn push_unique<D: Dialect>(subs: &mut Vec<ResolvedSub<D>>, candidate: ResolvedSub<D>) {
    if !subs.iter().any(|existing| existing.same_identity(&candidate)) {
        subs.push(candidate);
    }
}

impl<D: Dialect> Default for Composite<D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D: Dialect> std::fmt::Debug for Composite<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Composite")
            .field("dialect", &D::name())
            .field("sub_parsers", &self.sub_parsers())
            .finish()
    }
}

impl<D: Dialect> LineParser for Composite<D> {
    fn name(&self) -> Cow<'_, str> {
        Cow::Borrowed(D::name())
    }

    fn matches(&self, message: &str) -> bool {
        D::matches(message)
    }

    fn extract(&self, message: &str) -> Result<Option<LogRecord>, ParseError> {
        Ok(Composite::extract(self, message))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::CustomRecord;

    /// Minimal dialect for exercising the shared mechanics: messages are
    /// `ctx:<id> <payload>`, built-ins classify the literal payloads
    /// `alpha` and `beta`.
    struct ToyDialect;

    #[derive(Debug, Clone)]
    struct ToyContext {
        id: String,
    }

    struct AlphaSub;
    struct BetaSub;
    /// Cheap filter hits on `beta`, full parse never succeeds.
    struct BetaDecoy;

    impl SubParser<ToyDialect> for AlphaSub {
        fn matches(&self, payload: &str) -> bool {
            payload.contains("alpha")
        }
        fn extract(&self, _payload: &str, _context: &ToyContext) -> Option<CustomRecord> {
            Some(CustomRecord::classified("alpha"))
        }
    }

    impl SubParser<ToyDialect> for BetaSub {
        fn matches(&self, payload: &str) -> bool {
            payload.contains("beta")
        }
        fn extract(&self, _payload: &str, _context: &ToyContext) -> Option<CustomRecord> {
            Some(CustomRecord::classified("beta"))
        }
    }

    impl SubParser<ToyDialect> for BetaDecoy {
        fn matches(&self, payload: &str) -> bool {
            payload.contains("beta")
        }
        fn extract(&self, _payload: &str, _context: &ToyContext) -> Option<CustomRecord> {
            None
        }
    }

    static ALPHA: AlphaSub = AlphaSub;
    static BETA: BetaSub = BetaSub;
    static DECOY: BetaDecoy = BetaDecoy;

    static TOY_BUILTINS: [Builtin<ToyDialect>; 3] = [
        Builtin { name: "alpha", parser: &ALPHA },
        Builtin { name: "decoy", parser: &DECOY },
        Builtin { name: "beta", parser: &BETA },
    ];

    impl Dialect for ToyDialect {
        type Context = ToyContext;
        type Line = CustomRecord;

        fn name() -> &'static str {
            "toy"
        }

        fn matches(message: &str) -> bool {
            message.starts_with("ctx:")
        }

        fn context(message: &str) -> Option<(ToyContext, &str)> {
            let rest = message.strip_prefix("ctx:")?;
            let (id, payload) = rest.split_once(' ')?;
            Some((ToyContext { id: id.to_string() }, payload))
        }

        fn unknown(original: &str) -> CustomRecord {
            CustomRecord::unknown(original)
        }

        fn assemble(context: ToyContext, line: CustomRecord) -> LogRecord {
            LogRecord::Custom(line.with_field("id", context.id))
        }

        fn builtins() -> &'static [Builtin<Self>] {
            &TOY_BUILTINS
        }
    }

    #[test]
    fn test_default_set_is_full_catalog_in_order() {
        let composite = Composite::<ToyDialect>::new();
        assert_eq!(
            composite.sub_parsers(),
            vec![Some("alpha"), Some("decoy"), Some("beta")]
        );
    }

    #[test]
    fn test_empty_selection_equals_default() {
        let composite = Composite::<ToyDialect>::with([]).unwrap();
        assert_eq!(composite.sub_parsers(), Composite::<ToyDialect>::new().sub_parsers());
    }

    #[test]
    fn test_all_sentinel_expands_and_dedups() {
        let composite = Composite::<ToyDialect>::with([
            SubParserSpec::from("beta"),
            SubParserSpec::All,
        ])
        .unwrap();
        // `beta` keeps its explicit front position; All fills in the rest.
        assert_eq!(
            composite.sub_parsers(),
            vec![Some("beta"), Some("alpha"), Some("decoy")]
        );
    }

    #[test]
    fn test_duplicate_names_collapse() {
        let composite = Composite::<ToyDialect>::with([
            SubParserSpec::from("alpha"),
            SubParserSpec::from("alpha"),
            SubParserSpec::from("beta"),
        ])
        .unwrap();
        assert_eq!(composite.sub_parsers(), vec![Some("alpha"), Some("beta")]);
    }

    #[test]
    fn test_unknown_name_is_config_error_listing_builtins() {
        let err = Composite::<ToyDialect>::with([SubParserSpec::from("gamma")]).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("gamma"), "{message}");
        assert!(message.contains("toy"), "{message}");
        assert!(message.contains("alpha, decoy, beta"), "{message}");
    }

    #[test]
    fn test_non_member_message_yields_none() {
        let composite = Composite::<ToyDialect>::new();
        assert!(!composite.matches("no prefix here"));
        assert!(composite.extract("no prefix here").is_none());
    }

    #[test]
    fn test_first_match_wins_in_configured_order() {
        let composite = Composite::<ToyDialect>::with([
            SubParserSpec::from("beta"),
            SubParserSpec::from("alpha"),
        ])
        .unwrap();
        // Payload satisfies both cheap filters; the configured front-runner wins.
        let record = composite.extract("ctx:7 alpha beta").unwrap();
        assert_eq!(record.line_type(), "beta");

        let reordered = Composite::<ToyDialect>::with([
            SubParserSpec::from("alpha"),
            SubParserSpec::from("beta"),
        ])
        .unwrap();
        let record = reordered.extract("ctx:7 alpha beta").unwrap();
        assert_eq!(record.line_type(), "alpha");
    }

    #[test]
    fn test_filter_hit_without_classification_continues() {
        // The decoy's cheap filter hits `beta` but extraction declines;
        // dispatch must fall through to the real beta sub-parser.
        let composite = Composite::<ToyDialect>::with([
            SubParserSpec::from("decoy"),
            SubParserSpec::from("beta"),
        ])
        .unwrap();
        let record = composite.extract("ctx:7 beta").unwrap();
        assert_eq!(record.line_type(), "beta");
    }

    #[test]
    fn test_unknown_fallback_preserves_original_message() {
        let composite = Composite::<ToyDialect>::new();
        let record = composite.extract("ctx:7 gamma payload").unwrap();
        assert_eq!(record.line_type(), "unknown");
        assert_eq!(record.raw_message(), Some("ctx:7 gamma payload"));
    }

    #[test]
    fn test_context_failure_short_circuits_to_none() {
        let composite = Composite::<ToyDialect>::new();
        // Passes the cheap test but has no payload separator for context.
        assert!(composite.matches("ctx:no-payload"));
        assert!(composite.extract("ctx:no-payload").is_none());
    }

    #[test]
    fn test_custom_sub_parser_joins_the_order() {
        struct Always;
        impl SubParser<ToyDialect> for Always {
            fn matches(&self, _payload: &str) -> bool {
                true
            }
            fn extract(&self, _payload: &str, _context: &ToyContext) -> Option<CustomRecord> {
                Some(CustomRecord::classified("always"))
            }
        }

        let custom: Arc<dyn SubParser<ToyDialect>> = Arc::new(Always);
        let composite = Composite::<ToyDialect>::with([
            SubParserSpec::Custom(Arc::clone(&custom)),
            SubParserSpec::All,
        ])
        .unwrap();

        let record = composite.extract("ctx:7 alpha").unwrap();
        assert_eq!(record.line_type(), "always");
    }

    #[test]
    fn test_custom_sub_parser_dedups_by_instance() {
        struct Always;
        impl SubParser<ToyDialect> for Always {
            fn matches(&self, _payload: &str) -> bool {
                true
            }
            fn extract(&self, _payload: &str, _context: &ToyContext) -> Option<CustomRecord> {
                Some(CustomRecord::classified("always"))
            }
        }

        let one: Arc<dyn SubParser<ToyDialect>> = Arc::new(Always);
        let two: Arc<dyn SubParser<ToyDialect>> = Arc::new(Always);

        let composite = Composite::<ToyDialect>::with([
            SubParserSpec::Custom(Arc::clone(&one)),
            SubParserSpec::Custom(Arc::clone(&one)),
            SubParserSpec::Custom(two),
        ])
        .unwrap();
        // Same instance collapses; a distinct instance of the same type stays.
        assert_eq!(composite.sub_parsers(), vec![None, None]);
    }

    #[test]
    fn test_extraction_is_deterministic() {
        let composite = Composite::<ToyDialect>::new();
        let first = composite.extract("ctx:7 alpha");
        let second = composite.extract("ctx:7 alpha");
        assert_eq!(first, second);
    }
}
