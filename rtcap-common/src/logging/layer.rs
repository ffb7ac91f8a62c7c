//! tracing-subscriber layer that forwards events into a [`SinkRegistry`]

use super::{LogLevel, SinkRegistry};
use std::fmt::{self, Write as _};
use std::sync::Arc;
use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::Context;
use tracing_subscriber::Layer;

/// Forwards each tracing event to the sink registry as
/// `[<level>][<thread>][<target>]: <message> key=value ...`
#[derive(Clone)]
pub struct SinkLayer {
    registry: Arc<SinkRegistry>,
}

impl SinkLayer {
    pub fn new(registry: Arc<SinkRegistry>) -> Self {
        Self { registry }
    }
}

#[derive(Default)]
struct EventVisitor {
    message: String,
    fields: String,
}

impl Visit for EventVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message.push_str(value);
        } else {
            let _ = write!(self.fields, " {}={}", field.name(), value);
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            let _ = write!(self.message, "{:?}", value);
        } else {
            let _ = write!(self.fields, " {}={:?}", field.name(), value);
        }
    }
}

impl<S> Layer<S> for SinkLayer
where
    S: Subscriber,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();
        let level = LogLevel::from(metadata.level());
        if level < self.registry.min_level() {
            return;
        }

        let mut visitor = EventVisitor::default();
        event.record(&mut visitor);

        let thread = std::thread::current();
        let thread_name = thread.name().unwrap_or("unnamed");

        let text = format!(
            "[{}][{}]: {}{}",
            thread_name,
            metadata.target(),
            visitor.message,
            visitor.fields
        );
        self.registry.write(level, &text);
    }
}
