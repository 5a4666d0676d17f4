use crate::gateway::{ChatMessage, InferenceError, ModelGateway};
use crate::prompts;
use tracing::instrument;

/// Generates the answer for an in-scope message. The language, safety
/// statement, habitat, formatting and sources rules live in the prompt; the
/// reply is returned as the model wrote it.
#[instrument(skip_all)]
pub async fn answer(
    gateway: &dyn ModelGateway,
    model: &str,
    user_message: &str,
) -> Result<String, InferenceError> {
    let messages = [ChatMessage::user(prompts::answer(user_message))];
    gateway.invoke(model, &messages).await
}
