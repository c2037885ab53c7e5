use std::collections::HashMap;
use std::fmt;
use std::time::SystemTime;

use tracing::{
    Level, Subscriber,
    field::{Field, Visit},
};
use tracing_subscriber::Layer;

use crate::models::{ErrorEntry, ErrorLevel, ErrorStore};

#[derive(Default)]
struct FieldVisitor {
    message: Option<String>,
    fields: HashMap<String, String>,
}

impl Visit for FieldVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.record_str(field, &format!("{:?}", value));
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = Some(value.to_string());
        } else {
            self.fields
                .insert(field.name().to_string(), value.to_string());
        }
    }
}

/// Tracing layer that copies WARN and ERROR events into an [`ErrorStore`]
pub struct ErrorCollectorLayer {
    store: ErrorStore,
}

impl ErrorCollectorLayer {
    pub fn new(store: ErrorStore) -> Self {
        Self { store }
    }
}

impl<S> Layer<S> for ErrorCollectorLayer
where
    S: Subscriber,
{
    fn on_event(
        &self,
        event: &tracing::Event<'_>,
        _ctx: tracing_subscriber::layer::Context<'_, S>,
    ) {
        let metadata = event.metadata();
        let level = match *metadata.level() {
            Level::ERROR => ErrorLevel::Error,
            Level::WARN => ErrorLevel::Warning,
            _ => return,
        };

        let mut visitor = FieldVisitor::default();
        event.record(&mut visitor);

        self.store.add_entry(ErrorEntry {
            timestamp: SystemTime::now(),
            level,
            message: visitor.message.unwrap_or_default(),
            target: metadata.target().to_string(),
            file: metadata.file().map(String::from),
            line: metadata.line(),
            fields: visitor.fields,
        });
    }
}
