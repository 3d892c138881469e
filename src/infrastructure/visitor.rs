//! Field visitor for turning tracing events into records.
//!
//! The `message` field becomes the record's message; every other field
//! becomes a typed attribute, in the order the event declares them.

use crate::domain::record::{Attr, Value};
use std::fmt;
use tracing::field::{Field, Visit};

const MESSAGE_FIELD: &str = "message";

/// A visitor that collects an event's message and attributes.
#[derive(Debug, Default)]
pub(crate) struct FieldVisitor {
    message: Option<String>,
    attrs: Vec<Attr>,
}

impl FieldVisitor {
    /// Create a new field visitor.
    pub fn new() -> Self {
        Self::default()
    }

    /// Consume the visitor and return the message and attributes.
    pub fn into_parts(self) -> (Option<String>, Vec<Attr>) {
        (self.message, self.attrs)
    }

    fn push(&mut self, field: &Field, value: Value) {
        if field.name() == MESSAGE_FIELD {
            self.message = Some(value.to_string());
        } else {
            self.attrs.push(Attr::new(field.name(), value));
        }
    }
}

impl Visit for FieldVisitor {
    fn record_f64(&mut self, field: &Field, value: f64) {
        self.push(field, Value::Float(value));
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.push(field, Value::Int(value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.push(field, Value::Uint(value));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.push(field, Value::Bool(value));
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        self.push(field, Value::Str(value.to_string()));
    }

    fn record_error(&mut self, field: &Field, value: &(dyn std::error::Error + 'static)) {
        self.push(field, Value::Str(value.to_string()));
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.push(field, Value::Str(format!("{:?}", value)));
    }
}
