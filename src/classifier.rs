use crate::gateway::{ChatMessage, ModelGateway};
use crate::prompts;
use tracing::{debug, instrument, warn};

/// Asks the classification model whether `user_message` is about mycology
/// or is a greeting.
///
/// Fails open: a gateway error counts as in scope so a transient backend
/// problem never turns a real question into the canned refusal.
#[instrument(skip_all)]
pub async fn is_in_scope(gateway: &dyn ModelGateway, model: &str, user_message: &str) -> bool {
    let messages = [ChatMessage::user(prompts::classification(user_message))];
    match gateway.invoke(model, &messages).await {
        Ok(reply) => {
            let in_scope = decision_is_yes(&reply);
            debug!(message = "Classification decision", reply = %reply.trim(), in_scope);
            in_scope
        }
        Err(err) => {
            warn!(message = "Classification failed, treating as in scope", error = %err);
            true
        }
    }
}

/// Any reply containing `YES` after trimming and upper-casing counts,
/// including verbose or contradictory ones.
pub fn decision_is_yes(reply: &str) -> bool {
    reply.trim().to_uppercase().contains("YES")
}
