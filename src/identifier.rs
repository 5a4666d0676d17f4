use crate::gateway::{ChatMessage, InferenceError, ModelGateway};
use crate::prompts;
use base64::{engine::general_purpose::STANDARD, DecodeError, Engine};
use thiserror::Error;
use tracing::{debug, instrument};

#[derive(Error, Debug)]
pub enum IdentifyError {
    #[error("invalid base64 image: {0}")]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Inference(#[from] InferenceError),
}

/// Decodes the base64 payload and asks the image model for a
/// `Name_Toxicity` label. [`prompts::NOT_A_MUSHROOM`] comes back as an
/// ordinary `Ok` value.
///
/// Whitespace anywhere in the payload is ignored, so MIME-style line-wrapped
/// base64 decodes the same as the unwrapped form.
#[instrument(skip_all, fields(payload_len = image_base64.len()))]
pub async fn identify(
    gateway: &dyn ModelGateway,
    model: &str,
    image_base64: &str,
) -> Result<String, IdentifyError> {
    let compact: String = image_base64.split_ascii_whitespace().collect();
    let image = STANDARD.decode(compact)?;
    debug!(message = "Decoded image", bytes = image.len());

    let messages = [ChatMessage::user(prompts::image_identification()).with_image(image)];
    let reply = gateway.invoke(model, &messages).await?;
    Ok(reply.trim().to_string())
}
