pub mod minimax;
pub mod qwen;

use serde_json::Value;
use std::time::Duration;

use crate::config::Config;

pub use minimax::{AudioUpload, MinimaxCredentials, SpeechClient, SynthesisRequest};
pub use qwen::ChatClient;

pub fn build_client(config: &Config) -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(10))
        .timeout(config.upstream_timeout)
        .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
        .build()
}

/// A primary field that is present but empty defers to the next one.
pub(crate) fn first_text(value: &Value, pointers: &[&str]) -> String {
    pointers
        .iter()
        .filter_map(|pointer| value.pointer(pointer).and_then(Value::as_str))
        .find(|text| !text.is_empty())
        .unwrap_or_default()
        .to_string()
}
