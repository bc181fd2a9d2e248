use std::fmt::Debug;

use prost_reflect::text_format::FormatOptions;
use prost_reflect::{DynamicMessage, ReflectMessage, SerializeOptions};
use serde_json::{json, Value as JsonValue};
use tonic::metadata::{KeyAndValueRef, MetadataMap};

use crate::entities::FormatMode;
use crate::error::FormatError;

/// Renders protobuf messages as attachment text
///
/// The rendering mode is fixed per formatter, so formatters used from
/// concurrent calls never observe each other's configuration.
///
/// # Example
///
/// ```rust
/// use grpc_allure_client_interceptor::prelude::*;
/// use prost_reflect::DynamicMessage;
///
/// # fn render(reply: &DynamicMessage) {
/// let json = ProtoFormatter::new(FormatMode::Json).format(reply);
/// let text = ProtoFormatter::new(FormatMode::Text).format(reply);
/// # }
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProtoFormatter {
    mode: FormatMode,
}

impl ProtoFormatter {
    pub fn new(mode: FormatMode) -> Self {
        Self { mode }
    }

    pub fn mode(&self) -> FormatMode {
        self.mode
    }

    /// Format one message.
    ///
    /// Falls back to the `Debug` representation when the message cannot be
    /// rendered in the configured mode.
    pub fn format<M: ReflectMessage + Debug>(&self, message: &M) -> String {
        self.try_format(message)
            .unwrap_or_else(|_| debug_text(message))
    }

    /// Format one message, reporting why structured rendering failed
    pub fn try_format<M: ReflectMessage + Debug>(&self, message: &M) -> Result<String, FormatError> {
        match self.mode {
            FormatMode::Json => Ok(serde_json::to_string_pretty(&to_json(message)?)?),
            FormatMode::Text => Ok(to_text(&to_dynamic(message)?)),
        }
    }

    /// Format an ordered collection of messages.
    ///
    /// An empty collection renders as an empty string and a single message
    /// renders exactly like [`ProtoFormatter::format`]. Several messages render
    /// as one pretty printed JSON array in `Json` mode, where any element that
    /// fails is replaced by an `unable_to_format` placeholder, or as the
    /// concatenation of every message in `Text` mode.
    pub fn format_all<M: ReflectMessage + Debug>(&self, messages: &[M]) -> String {
        match messages {
            [] => String::new(),
            [message] => self.format(message),
            many => match self.mode {
                FormatMode::Json => {
                    let items = many
                        .iter()
                        .map(|message| {
                            to_json(message).unwrap_or_else(
                                |_| json!({ "unable_to_format": debug_text(message) }),
                            )
                        })
                        .collect();
                    serde_json::to_string_pretty(&JsonValue::Array(items))
                        .unwrap_or_else(|_| many.iter().map(debug_text).collect())
                }
                FormatMode::Text => many.iter().map(|message| self.format(message)).collect(),
            },
        }
    }
}

/// Render response or request metadata, one `key: value` line per entry
pub fn format_metadata(metadata: &MetadataMap) -> String {
    metadata
        .iter()
        .map(|entry| match entry {
            KeyAndValueRef::Ascii(key, value) => match value.to_str() {
                Ok(text) => format!("{}: {}\n", key.as_str(), text),
                Err(_) => format!("{}: {:?}\n", key.as_str(), value),
            },
            KeyAndValueRef::Binary(key, value) => format!("{}: {:?}\n", key.as_str(), value),
        })
        .collect()
}

/// Pretty text format in declaration order, one field per line
fn to_text(message: &DynamicMessage) -> String {
    let options = FormatOptions::new()
        .pretty(true)
        .print_message_fields_in_index_order(true);
    let mut text = message.to_text_format_with_options(&options);
    if !text.is_empty() {
        text.push('\n');
    }
    text
}

fn to_dynamic<M: ReflectMessage>(message: &M) -> Result<DynamicMessage, FormatError> {
    let bytes = message.encode_to_vec();
    Ok(DynamicMessage::decode(message.descriptor(), bytes.as_slice())?)
}

fn to_json<M: ReflectMessage>(message: &M) -> Result<JsonValue, FormatError> {
    let options = SerializeOptions::new().use_proto_field_name(true);
    let value = to_dynamic(message)?
        .serialize_with_options(serde_json::value::Serializer, &options)?;
    Ok(value)
}

fn debug_text<M: Debug>(message: &M) -> String {
    format!("{:?}", message)
}
