/// Rendering used for message attachments
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FormatMode {
    /// Proto JSON with original field names, pretty printed
    #[default]
    Json,
    /// Protobuf text format
    Text,
}

impl FormatMode {
    pub fn content_type(&self) -> &'static str {
        match self {
            FormatMode::Json => "application/json",
            FormatMode::Text => "text/plain",
        }
    }
}
