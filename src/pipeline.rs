use crate::gateway::{InferenceError, ModelGateway};
use crate::identifier::{self, IdentifyError};
use crate::{classifier, prompts, responder, JobRequest};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, instrument};

/// Failure of a job. The display string is what the polling client sees.
#[derive(Error, Debug)]
pub enum JobError {
    #[error("An error occurred with the main model: {0}")]
    Generation(#[source] InferenceError),

    #[error("An error occurred during image processing: {0}")]
    Identification(#[source] IdentifyError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSet {
    pub classification: String,
    pub chat: String,
    pub image: String,
}

pub struct Pipeline {
    gateway: Arc<dyn ModelGateway>,
    models: ModelSet,
    out_of_scope_response: String,
}

impl Pipeline {
    pub fn new(gateway: Arc<dyn ModelGateway>, models: ModelSet) -> Self {
        Pipeline {
            gateway,
            models,
            out_of_scope_response: prompts::OUT_OF_SCOPE_RESPONSE.to_string(),
        }
    }

    pub fn with_out_of_scope_response(mut self, response: impl Into<String>) -> Self {
        self.out_of_scope_response = response.into();
        self
    }

    pub async fn run(&self, request: &JobRequest) -> Result<String, JobError> {
        match request {
            JobRequest::Chat { message } => self.chat(message).await,
            JobRequest::IdentifyImage { image } => self.identify(image).await,
        }
    }

    #[instrument(skip_all)]
    async fn chat(&self, message: &str) -> Result<String, JobError> {
        let gateway = self.gateway.as_ref();
        if !classifier::is_in_scope(gateway, &self.models.classification, message).await {
            debug!("Message out of scope, answering with canned response");
            return Ok(self.out_of_scope_response.clone());
        }
        responder::answer(gateway, &self.models.chat, message)
            .await
            .map_err(JobError::Generation)
    }

    #[instrument(skip_all)]
    async fn identify(&self, image: &str) -> Result<String, JobError> {
        identifier::identify(self.gateway.as_ref(), &self.models.image, image)
            .await
            .map_err(JobError::Identification)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::testing::{backend_down, ScriptedGateway};

    fn models() -> ModelSet {
        ModelSet {
            classification: "classifier".into(),
            chat: "chat".into(),
            image: "vision".into(),
        }
    }

    fn chat(message: &str) -> JobRequest {
        JobRequest::Chat {
            message: message.into(),
        }
    }

    #[tokio::test]
    async fn out_of_scope_gets_canned_response_without_generation() {
        let gateway = Arc::new(ScriptedGateway::replying(vec![Ok("NO".into())]));
        let pipeline = Pipeline::new(gateway.clone(), models());

        let reply = pipeline.run(&chat("What is the capital of France?")).await.unwrap();

        assert_eq!(reply, prompts::OUT_OF_SCOPE_RESPONSE);
        assert_eq!(gateway.calls().len(), 1);
    }

    #[tokio::test]
    async fn custom_out_of_scope_response() {
        let gateway = Arc::new(ScriptedGateway::replying(vec![Ok("no".into())]));
        let pipeline =
            Pipeline::new(gateway, models()).with_out_of_scope_response("mushrooms only");

        assert_eq!(pipeline.run(&chat("2 + 2?")).await.unwrap(), "mushrooms only");
    }

    #[tokio::test]
    async fn in_scope_is_classified_then_generated() {
        let gateway = Arc::new(ScriptedGateway::replying(vec![
            Ok("YES".into()),
            Ok("Beracun. Amanita muscaria tumbuh di hutan.".into()),
        ]));
        let pipeline = Pipeline::new(gateway.clone(), models());

        let reply = pipeline.run(&chat("Is Amanita muscaria poisonous?")).await.unwrap();

        assert_eq!(reply, "Beracun. Amanita muscaria tumbuh di hutan.");
        let models: Vec<_> = gateway.calls().into_iter().map(|(model, _)| model).collect();
        assert_eq!(models, vec!["classifier", "chat"]);
    }

    #[tokio::test]
    async fn classification_failure_still_generates() {
        let gateway = Arc::new(ScriptedGateway::replying(vec![
            Err(backend_down()),
            Ok("Halo! Ada yang bisa saya bantu?".into()),
        ]));
        let pipeline = Pipeline::new(gateway, models());

        let reply = pipeline.run(&chat("Halo")).await.unwrap();
        assert_eq!(reply, "Halo! Ada yang bisa saya bantu?");
    }

    #[tokio::test]
    async fn generation_failure_embeds_cause() {
        let gateway = Arc::new(ScriptedGateway::replying(vec![
            Ok("YES".into()),
            Err(backend_down()),
        ]));
        let pipeline = Pipeline::new(gateway, models());

        let err = pipeline.run(&chat("Is chanterelle edible?")).await.unwrap_err();
        let diagnostic = err.to_string();
        assert!(diagnostic.starts_with("An error occurred with the main model: "));
        assert!(diagnostic.contains("model not loaded"));
    }

    #[tokio::test]
    async fn bad_image_fails_with_diagnostic() {
        let gateway = Arc::new(ScriptedGateway::default());
        let pipeline = Pipeline::new(gateway, models());

        let err = pipeline
            .run(&JobRequest::IdentifyImage {
                image: "not-valid-base64".into(),
            })
            .await
            .unwrap_err();

        let diagnostic = err.to_string();
        assert!(
            diagnostic.starts_with("An error occurred during image processing: invalid base64")
        );
    }
}
