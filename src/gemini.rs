//! Gemini transport for the vision extraction client.
//!
//! We use the [`genai`] crate, which speaks the Gemini API natively and picks
//! up `GEMINI_API_KEY` from the environment. The transport is behind the
//! [`VisionModel`] trait so the retry loop and the HTTP handlers can be
//! tested against a scripted model.

use std::{fmt, sync::Arc};

use anyhow::anyhow;
use async_trait::async_trait;
use base64::{Engine as _, prelude::BASE64_STANDARD};
use genai::{
    Client,
    chat::{ChatMessage, ChatRequest, ChatRole, ContentPart, ImageSource, MessageContent},
    webc,
};
use reqwest::StatusCode;

use crate::prelude::*;

/// An uploaded image, ready to send to the model.
#[derive(Clone)]
pub struct ImagePayload {
    /// Raw image bytes.
    pub bytes: Vec<u8>,

    /// MIME type, e.g. `image/jpeg`.
    pub mime_type: String,
}

impl fmt::Debug for ImagePayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // The raw bytes are large and useless in logs.
        f.debug_struct("ImagePayload")
            .field("bytes", &format_args!("({} bytes)", self.bytes.len()))
            .field("mime_type", &self.mime_type)
            .finish()
    }
}

/// How a model call failed.
#[derive(Debug)]
pub enum ModelError {
    /// The upstream service reported temporary overload. Worth retrying.
    Overloaded(anyhow::Error),

    /// Any other failure. Terminates the extraction immediately.
    Other(anyhow::Error),
}

impl ModelError {
    /// Classify a [`genai`] error. We match the structured overload statuses
    /// first, then fall back to message sniffing, because Gemini reports
    /// overload both as HTTP 503 and as `RESOURCE_EXHAUSTED` bodies.
    fn from_genai(err: genai::Error) -> Self {
        let message = err.to_string();
        if err.is_overloaded()
            || message.contains("overloaded")
            || message.contains("RESOURCE_EXHAUSTED")
        {
            ModelError::Overloaded(err.into())
        } else {
            ModelError::Other(err.into())
        }
    }
}

/// Interface trait for the multimodal model.
#[async_trait]
pub trait VisionModel: fmt::Debug + Send + Sync + 'static {
    /// Send `prompt` plus one inline image, returning the model's free text.
    async fn generate(&self, prompt: &str, image: &ImagePayload)
    -> Result<String, ModelError>;
}

/// The production model, backed by the Gemini API.
#[derive(Debug)]
pub struct GeminiModel {
    /// The genai client.
    client: Client,

    /// The model to use, e.g. `gemini-flash-lite-latest`.
    model: String,
}

impl GeminiModel {
    /// Create a model client. Credentials come from the environment.
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            client: Client::default(),
            model: model.into(),
        }
    }
}

#[async_trait]
impl VisionModel for GeminiModel {
    #[instrument(level = "debug", skip_all, fields(model = %self.model))]
    async fn generate(
        &self,
        prompt: &str,
        image: &ImagePayload,
    ) -> Result<String, ModelError> {
        let base64_data = BASE64_STANDARD.encode(&image.bytes);
        let parts = vec![
            ContentPart::Text(prompt.to_owned()),
            ContentPart::Image {
                content_type: image.mime_type.clone(),
                source: ImageSource::Base64(Arc::from(base64_data)),
            },
        ];
        let req = ChatRequest {
            system: None,
            messages: vec![ChatMessage {
                role: ChatRole::User,
                content: MessageContent::Parts(parts),
                options: None,
            }],
            ..ChatRequest::default()
        };

        let chat_res = self
            .client
            .exec_chat(&self.model, req, None)
            .await
            .map_err(ModelError::from_genai)?;

        let content = chat_res
            .content
            .as_ref()
            .ok_or_else(|| ModelError::Other(anyhow!("No content in model response")))?;
        let text = content.text_as_str().ok_or_else(|| {
            ModelError::Other(anyhow!(
                "Expected text content in model response, found: {content:?}"
            ))
        })?;
        debug!(response = %text, "Model response");
        Ok(text.to_owned())
    }
}

/// Is this error the upstream "service overloaded" condition?
///
/// By default errors are not treated as overload. Only statuses and error
/// shapes observed to mean temporary unavailability qualify, so that we never
/// spend the backoff budget on errors that will not resolve.
pub trait IsOverloaded {
    /// Is this error likely to clear up if we wait and retry?
    fn is_overloaded(&self) -> bool;
}

impl IsOverloaded for genai::Error {
    fn is_overloaded(&self) -> bool {
        match self {
            genai::Error::WebAdapterCall { webc_error, .. }
            | genai::Error::WebModelCall { webc_error, .. } => webc_error.is_overloaded(),
            _ => false,
        }
    }
}

impl IsOverloaded for webc::Error {
    fn is_overloaded(&self) -> bool {
        match self {
            webc::Error::ResponseFailedStatus { status, .. } => status.is_overloaded(),
            webc::Error::Reqwest(error) => {
                error.status().is_some_and(|status| status.is_overloaded())
            }
            _ => false,
        }
    }
}

impl IsOverloaded for StatusCode {
    fn is_overloaded(&self) -> bool {
        let overload_statuses = [
            StatusCode::TOO_MANY_REQUESTS,
            StatusCode::SERVICE_UNAVAILABLE,
        ];
        overload_statuses.contains(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overload_statuses() {
        assert!(StatusCode::SERVICE_UNAVAILABLE.is_overloaded());
        assert!(StatusCode::TOO_MANY_REQUESTS.is_overloaded());
        assert!(!StatusCode::BAD_REQUEST.is_overloaded());
        assert!(!StatusCode::INTERNAL_SERVER_ERROR.is_overloaded());
    }

    #[test]
    fn payload_debug_elides_bytes() {
        let payload = ImagePayload {
            bytes: vec![0; 4096],
            mime_type: "image/png".to_owned(),
        };
        let debug = format!("{payload:?}");
        assert!(debug.contains("4096 bytes"));
        assert!(debug.contains("image/png"));
    }
}
