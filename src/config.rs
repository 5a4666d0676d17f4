use crate::pipeline::ModelSet;
use clap::Parser;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

const DEFAULT_MODEL: &str = "gemma3:4b-it-qat";

#[derive(Parser, Clone, Debug, PartialEq)]
#[command(author, version, about)]
pub struct ConfigContext {
    #[arg(
        long,
        env = "FUNGIMATE_HOST",
        help = "Address to bind the HTTP server to",
        default_value = "127.0.0.1"
    )]
    pub host: IpAddr,

    #[arg(
        long,
        env = "FUNGIMATE_PORT",
        help = "Port to bind the HTTP server to",
        default_value = "5000"
    )]
    pub port: u16,

    #[arg(
        long = "ollama-url",
        help = "Base URL of the Ollama server",
        default_value = "http://127.0.0.1:11434"
    )]
    pub ollama_url: String,

    #[arg(
        long = "classification-model",
        help = "Model deciding whether a question is in scope",
        default_value = DEFAULT_MODEL
    )]
    pub classification_model: String,

    #[arg(
        long = "chat-model",
        help = "Model answering in-scope questions",
        default_value = DEFAULT_MODEL
    )]
    pub chat_model: String,

    #[arg(
        long = "image-model",
        help = "Model identifying mushroom pictures",
        default_value = DEFAULT_MODEL
    )]
    pub image_model: String,

    #[arg(
        long = "out-of-scope-response",
        help = "Reply sent for questions that are not about mushrooms"
    )]
    pub out_of_scope_response: Option<String>,

    #[arg(
        long = "inference-timeout-secs",
        help = "Fail a model call after this many seconds (no limit if unset)"
    )]
    pub inference_timeout_secs: Option<u64>,

    #[arg(
        long = "job-ttl-secs",
        help = "Forget finished jobs after this many seconds (kept forever if unset)"
    )]
    pub job_ttl_secs: Option<u64>,

    #[arg(long = "jaeger-endpoint", help = "Jaeger collector URL for trace export")]
    pub jaeger_endpoint: Option<String>,
}

impl Default for ConfigContext {
    fn default() -> Self {
        ConfigContext {
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: 5000,
            ollama_url: "http://127.0.0.1:11434".into(),
            classification_model: DEFAULT_MODEL.into(),
            chat_model: DEFAULT_MODEL.into(),
            image_model: DEFAULT_MODEL.into(),
            out_of_scope_response: None,
            inference_timeout_secs: None,
            job_ttl_secs: None,
            jaeger_endpoint: None,
        }
    }
}

impl ConfigContext {
    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    pub fn models(&self) -> ModelSet {
        ModelSet {
            classification: self.classification_model.clone(),
            chat: self.chat_model.clone(),
            image: self.image_model.clone(),
        }
    }

    pub fn inference_timeout(&self) -> Option<Duration> {
        self.inference_timeout_secs.map(Duration::from_secs)
    }

    pub fn job_ttl(&self) -> Option<Duration> {
        self.job_ttl_secs.map(Duration::from_secs)
    }
}
