//! Response envelopes and composition of handler results.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::binder::Binary;
use crate::error::ToolError;
use crate::sanitize::{GENERIC_ERROR_MESSAGE, sanitize};

/// Audience and priority hints attached to a content item.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Annotations {
    /// Intended readers, e.g. `user` or `assistant`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub audience: Vec<String>,
    /// Relative importance between 0 and 1.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<f64>,
}

/// Resource reference carried by [`ContentItem::Resource`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceContents {
    /// Resource URI.
    pub uri: String,
    /// MIME type of the inline contents.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    /// Inline text contents.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Inline binary contents.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blob: Option<Binary>,
}

/// A single piece of response content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase", rename_all_fields = "camelCase")]
pub enum ContentItem {
    /// Plain text.
    Text {
        /// Text body.
        text: String,
        /// Optional hints.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        annotations: Option<Annotations>,
    },
    /// Image bytes.
    Image {
        /// Encoded image.
        data: Binary,
        /// Image MIME type.
        mime_type: String,
        /// Optional hints.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        annotations: Option<Annotations>,
    },
    /// Audio bytes.
    Audio {
        /// Encoded audio.
        data: Binary,
        /// Audio MIME type.
        mime_type: String,
        /// Optional hints.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        annotations: Option<Annotations>,
    },
    /// Embedded resource.
    Resource {
        /// Resource reference and contents.
        resource: ResourceContents,
        /// Optional hints.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        annotations: Option<Annotations>,
    },
}

impl ContentItem {
    /// Creates a text item.
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text {
            text: text.into(),
            annotations: None,
        }
    }

    /// Returns the body of a text item.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text { text, .. } => Some(text),
            _ => None,
        }
    }

    /// Returns the item's annotations.
    #[must_use]
    pub const fn annotations(&self) -> Option<&Annotations> {
        match self {
            Self::Text { annotations, .. }
            | Self::Image { annotations, .. }
            | Self::Audio { annotations, .. }
            | Self::Resource { annotations, .. } => annotations.as_ref(),
        }
    }

    fn set_annotations(&mut self, value: Annotations) {
        match self {
            Self::Text { annotations, .. }
            | Self::Image { annotations, .. }
            | Self::Audio { annotations, .. }
            | Self::Resource { annotations, .. } => *annotations = Some(value),
        }
    }
}

/// Result of a tool invocation as returned to the caller.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolResponse {
    content: Vec<ContentItem>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    structured_content: Option<Value>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    is_error: bool,
}

impl ToolResponse {
    /// Starts a [`ResponseBuilder`].
    #[must_use]
    pub fn builder() -> ResponseBuilder {
        ResponseBuilder::default()
    }

    /// Single text item.
    pub fn text(text: impl Into<String>) -> Self {
        Self::builder().text(text).build()
    }

    /// Single text item flagged as an error.
    pub fn error(text: impl Into<String>) -> Self {
        Self::builder().text(text).error().build()
    }

    /// Text item plus structured content.
    pub fn structured<T: Serialize + ?Sized>(text: impl Into<String>, data: &T) -> Self {
        Self::builder().text(text).structured(data).build()
    }

    /// Successful response without content.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Content items in order.
    #[must_use]
    pub fn content(&self) -> &[ContentItem] {
        &self.content
    }

    /// Machine-readable payload, if any.
    #[must_use]
    pub const fn structured_content(&self) -> Option<&Value> {
        self.structured_content.as_ref()
    }

    /// Whether the response reports a failure.
    #[must_use]
    pub const fn is_error(&self) -> bool {
        self.is_error
    }

    /// Body of the first text item.
    #[must_use]
    pub fn first_text(&self) -> Option<&str> {
        self.content.iter().find_map(ContentItem::as_text)
    }
}

/// Fluent builder for [`ToolResponse`].
#[derive(Debug, Default)]
#[must_use]
pub struct ResponseBuilder {
    content: Vec<ContentItem>,
    structured_content: Option<Value>,
    is_error: bool,
}

impl ResponseBuilder {
    /// Appends a text item.
    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.content.push(ContentItem::text(text));
        self
    }

    /// Appends an image item.
    pub fn image(mut self, data: impl Into<Vec<u8>>, mime_type: impl Into<String>) -> Self {
        self.content.push(ContentItem::Image {
            data: Binary(data.into()),
            mime_type: mime_type.into(),
            annotations: None,
        });
        self
    }

    /// Appends an audio item.
    pub fn audio(mut self, data: impl Into<Vec<u8>>, mime_type: impl Into<String>) -> Self {
        self.content.push(ContentItem::Audio {
            data: Binary(data.into()),
            mime_type: mime_type.into(),
            annotations: None,
        });
        self
    }

    /// Appends an embedded resource.
    pub fn resource(mut self, resource: ResourceContents) -> Self {
        self.content.push(ContentItem::Resource {
            resource,
            annotations: None,
        });
        self
    }

    /// Sets the structured payload to a snapshot of `data`.
    ///
    /// Later changes to `data` do not affect the response. A value that
    /// cannot be serialized is dropped with a warning.
    pub fn structured<T: Serialize + ?Sized>(mut self, data: &T) -> Self {
        match serde_json::to_value(data) {
            Ok(value) => self.structured_content = Some(value),
            Err(err) => warn!(error = %err, "dropping unserializable structured content"),
        }
        self
    }

    /// Annotates the most recently added item; no-op when there is none.
    pub fn annotations(mut self, annotations: Annotations) -> Self {
        if let Some(last) = self.content.last_mut() {
            last.set_annotations(annotations);
        }
        self
    }

    /// Marks the response as an error.
    pub fn error(mut self) -> Self {
        self.is_error = true;
        self
    }

    /// Finishes the response.
    #[must_use]
    pub fn build(self) -> ToolResponse {
        ToolResponse {
            content: self.content,
            structured_content: self.structured_content,
            is_error: self.is_error,
        }
    }
}

/// Converts a handler's typed output into a response.
///
/// Scalars become a single text item (`null` as empty text); objects and
/// arrays become structured content beside an empty text item.
pub fn compose_output<T: Serialize + ?Sized>(output: &T) -> ToolResponse {
    match serde_json::to_value(output) {
        Ok(Value::String(text)) => ToolResponse::text(text),
        Ok(Value::Null) => ToolResponse::text(""),
        Ok(scalar @ (Value::Number(_) | Value::Bool(_))) => ToolResponse::text(scalar.to_string()),
        Ok(composite) => ToolResponse::builder()
            .text("")
            .structured(&composite)
            .build(),
        Err(err) => compose_error(
            &ToolError::internal("failed to serialize tool output").with_cause(err),
        ),
    }
}

/// Converts an error into a caller-safe error response.
///
/// Causes and unclassified errors are logged here and never rendered.
#[must_use]
pub fn compose_error(err: &ToolError) -> ToolResponse {
    let text = match err {
        ToolError::Validation { field, message } => {
            format!("Invalid input for field '{field}': {}", sanitize(message))
        }
        ToolError::Execution {
            code,
            message,
            cause,
        } => {
            let sanitized = sanitize(message);
            match cause {
                Some(cause) => {
                    debug!(code = %code, cause = %cause, "execution error cause withheld");
                    if sanitized == GENERIC_ERROR_MESSAGE {
                        sanitized
                    } else {
                        format!("{sanitized}: internal error occurred")
                    }
                }
                None => sanitized,
            }
        }
        ToolError::Unclassified(inner) => {
            debug!(error = %inner, "unclassified error withheld");
            GENERIC_ERROR_MESSAGE.to_owned()
        }
    };
    ToolResponse::error(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn text_response_wire_shape() {
        let value = serde_json::to_value(ToolResponse::text("hi")).unwrap();
        assert_eq!(value, json!({"content": [{"type": "text", "text": "hi"}]}));
    }

    #[test]
    fn error_response_sets_flag() {
        let value = serde_json::to_value(ToolResponse::error("nope")).unwrap();
        assert_eq!(value["isError"], true);
    }

    #[test]
    fn builder_encodes_binary_items() {
        let response = ToolResponse::builder()
            .image(vec![1, 2, 3], "image/png")
            .audio(b"RIFF".to_vec(), "audio/wav")
            .resource(ResourceContents {
                uri: "file:///tmp/report.txt".into(),
                mime_type: Some("text/plain".into()),
                text: Some("body".into()),
                blob: None,
            })
            .build();
        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(value["content"][0]["type"], "image");
        assert_eq!(value["content"][0]["data"], "AQID");
        assert_eq!(value["content"][0]["mimeType"], "image/png");
        assert_eq!(value["content"][1]["type"], "audio");
        assert_eq!(value["content"][2]["resource"]["mimeType"], "text/plain");

        let back: ToolResponse = serde_json::from_value(value).unwrap();
        assert_eq!(back, response);
    }

    #[test]
    fn annotations_apply_to_last_item() {
        let annotations = Annotations {
            audience: vec!["user".into()],
            priority: Some(0.5),
        };
        let response = ToolResponse::builder()
            .text("first")
            .text("second")
            .annotations(annotations.clone())
            .build();
        assert!(response.content()[0].annotations().is_none());
        assert_eq!(response.content()[1].annotations(), Some(&annotations));

        let untouched = ToolResponse::builder().annotations(annotations).build();
        assert!(untouched.content().is_empty());
    }

    #[test]
    fn structured_content_is_a_snapshot() {
        let mut data = vec![1, 2];
        let response = ToolResponse::structured("result", &data);
        data.push(3);
        assert_eq!(response.structured_content(), Some(&json!([1, 2])));
        assert_eq!(response.first_text(), Some("result"));
    }

    #[test]
    fn scalars_become_text() {
        assert_eq!(compose_output("hello").first_text(), Some("hello"));
        assert_eq!(compose_output(&42).first_text(), Some("42"));
        assert_eq!(compose_output(&true).first_text(), Some("true"));
        assert_eq!(compose_output(&()).first_text(), Some(""));
        assert!(compose_output(&1.5).structured_content().is_none());
    }

    #[test]
    fn composites_become_structured() {
        let response = compose_output(&json!({"message": "hi"}));
        assert_eq!(response.structured_content(), Some(&json!({"message": "hi"})));
        assert_eq!(response.first_text(), Some(""));
        assert!(!response.is_error());
    }

    #[test]
    fn unserializable_output_is_internal_error() {
        let mut bad = std::collections::HashMap::new();
        bad.insert(vec![1_u8], 1);
        let response = compose_output(&bad);
        assert!(response.is_error());
        assert_eq!(
            response.first_text(),
            Some("failed to serialize tool output: internal error occurred")
        );
    }

    #[test]
    fn errors_are_rendered_safely() {
        let validation = compose_error(&ToolError::invalid_input("message", "is required"));
        assert_eq!(
            validation.first_text(),
            Some("Invalid input for field 'message': is required")
        );

        let plain = compose_error(&ToolError::failed("quota exceeded"));
        assert_eq!(plain.first_text(), Some("quota exceeded"));

        let caused = compose_error(&ToolError::failed("lookup failed").with_cause("db at /home/x"));
        assert_eq!(caused.first_text(), Some("lookup failed: internal error occurred"));

        let leaky = compose_error(&ToolError::failed("panic: oops").with_cause("boom"));
        assert_eq!(leaky.first_text(), Some(GENERIC_ERROR_MESSAGE));

        let other = compose_error(&anyhow::anyhow!("secret /root/key").into());
        assert_eq!(other.first_text(), Some(GENERIC_ERROR_MESSAGE));
        assert!(other.is_error());
    }
}
