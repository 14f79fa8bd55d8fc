use tracing::{field::Visit, Metadata, Subscriber};
use tracing_subscriber::layer::Context;

/// Per-layer filter that drops events whose `"{target}: {message}"` matches
/// any configured pattern. Used to silence noisy third-party decoders
/// (e.g. `lopdf: ...`) without raising the global level.
///
/// ```ignore
/// let filter = LogIgnoreFilter::from_patterns(&config.log.ignore)?;
/// tracing_subscriber::fmt::layer().with_filter(filter)
/// ```
#[derive(Debug, Default)]
pub struct LogIgnoreFilter {
    patterns: Vec<regex::Regex>,
}

impl LogIgnoreFilter {
    /// Compile the patterns. Fails on the first invalid regular expression.
    pub fn from_patterns(patterns: &[String]) -> Result<Self, regex::Error> {
        let patterns = patterns
            .iter()
            .map(|p| regex::Regex::new(p))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { patterns })
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    fn suppresses(&self, target: &str, message: &str) -> bool {
        let candidate = format!("{target}: {message}");
        self.patterns.iter().any(|p| p.is_match(&candidate))
    }
}

impl<S: Subscriber> tracing_subscriber::layer::Filter<S> for LogIgnoreFilter {
    fn enabled(&self, _meta: &Metadata<'_>, _cx: &Context<'_, S>) -> bool {
        true
    }

    fn event_enabled(&self, event: &tracing::Event<'_>, _cx: &Context<'_, S>) -> bool {
        if self.patterns.is_empty() {
            return true;
        }
        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);
        // Events bridged from the `log` crate report target "log"; the real
        // crate name is carried in the `log.target` field.
        let target = visitor
            .log_target
            .as_deref()
            .unwrap_or_else(|| event.metadata().target());
        !self.suppresses(target, &visitor.message)
    }
}

#[derive(Default)]
struct MessageVisitor {
    message: String,
    log_target: Option<String>,
}

impl Visit for MessageVisitor {
    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        match field.name() {
            "message" => self.message = value.to_string(),
            "log.target" => self.log_target = Some(value.to_string()),
            _ => {}
        }
    }

    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        match field.name() {
            "message" => self.message = format!("{value:?}"),
            "log.target" => self.log_target = Some(format!("{value:?}")),
            _ => {}
        }
    }
}
