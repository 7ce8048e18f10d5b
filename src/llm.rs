use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error, trace};

use crate::config::Config;
use crate::error::ProviderError;
use crate::prompts::{enforce_stop_sequences, STOP_SEQUENCES};
use crate::settings::Settings;

/// Anything that turns a filled-in prompt into a reply.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str, settings: &Settings) -> Result<String, ProviderError>;

    /// Short name shown in the UI header
    fn name(&self) -> &str;
}

/// Client for the Hugging Face hosted inference API.
#[derive(Clone)]
pub struct HubClient {
    client: reqwest::Client,
    endpoint: String,
    repo_id: String,
    api_token: String,
}

#[derive(Debug, Serialize)]
struct GenerationRequest<'a> {
    inputs: &'a str,
    parameters: GenerationParameters,
}

#[derive(Debug, Serialize)]
struct GenerationParameters {
    temperature: f32,
    top_p: f32,
    max_new_tokens: u32,
    repetition_penalty: f32,
    return_full_text: bool,
}

#[derive(Debug, Deserialize)]
struct GeneratedText {
    generated_text: String,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: String,
    #[serde(default)]
    estimated_time: Option<f64>,
}

impl HubClient {
    pub fn new(config: &Config, api_token: String) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ProviderError::Request(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint: format!(
                "{}/models/{}",
                config.base_url.trim_end_matches('/'),
                config.repo_id
            ),
            repo_id: config.repo_id.clone(),
            api_token,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl TextGenerator for HubClient {
    async fn generate(&self, prompt: &str, settings: &Settings) -> Result<String, ProviderError> {
        let payload = build_request(prompt, settings);

        debug!(
            repo = %self.repo_id,
            temperature = settings.temperature,
            top_p = settings.top_p,
            max_new_tokens = settings.max_new_tokens,
            prompt_len = prompt.len(),
            "sending generation request"
        );
        trace!(prompt = %prompt, "full prompt");

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_token)
            .json(&payload)
            .send()
            .await
            .map_err(|e| {
                error!(url = %self.endpoint, error = %e, timeout = e.is_timeout(), "generation request failed");
                ProviderError::Request(e.to_string())
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ProviderError::Request(format!("failed to read response body: {e}")))?;

        if !status.is_success() {
            let err = status_error(status, &body);
            error!(status = status.as_u16(), error = %err, "inference endpoint returned an error");
            return Err(err);
        }

        let text = parse_generation(&body, prompt)?;
        debug!(reply_len = text.len(), "received generation");
        Ok(text)
    }

    fn name(&self) -> &str {
        &self.repo_id
    }
}

fn build_request<'a>(prompt: &'a str, settings: &Settings) -> GenerationRequest<'a> {
    GenerationRequest {
        inputs: prompt,
        parameters: GenerationParameters {
            temperature: settings.temperature,
            top_p: settings.top_p,
            max_new_tokens: settings.max_new_tokens,
            repetition_penalty: settings.repetition_penalty,
            return_full_text: false,
        },
    }
}

/// Map a non-2xx response to a typed error.
fn status_error(status: StatusCode, body: &str) -> ProviderError {
    let parsed = serde_json::from_str::<ApiErrorBody>(body).ok();
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ProviderError::Unauthorized,
        StatusCode::TOO_MANY_REQUESTS => ProviderError::RateLimited,
        StatusCode::SERVICE_UNAVAILABLE if parsed.as_ref().is_some_and(|b| b.estimated_time.is_some()) => {
            ProviderError::ModelLoading {
                estimated_secs: parsed.and_then(|b| b.estimated_time).unwrap_or_default(),
            }
        }
        _ => ProviderError::Api {
            status: status.as_u16(),
            message: parsed.map(|b| b.error).unwrap_or_else(|| body.trim().to_string()),
        },
    }
}

/// Extract the reply from a successful body: drop an echoed prompt, cut at
/// stop sequences, trim.
fn parse_generation(body: &str, prompt: &str) -> Result<String, ProviderError> {
    let items: Vec<GeneratedText> =
        serde_json::from_str(body).map_err(|e| ProviderError::Decode(e.to_string()))?;
    let first = items
        .into_iter()
        .next()
        .ok_or_else(|| ProviderError::Decode("empty generation list".to_string()))?;

    let text = first
        .generated_text
        .strip_prefix(prompt)
        .unwrap_or(&first.generated_text);
    Ok(enforce_stop_sequences(text, STOP_SEQUENCES).trim().to_string())
}

/// Offline stand-in that echoes the last line of the prompt's question.
#[derive(Debug, Clone, Default)]
pub struct EchoGenerator;

#[async_trait]
impl TextGenerator for EchoGenerator {
    async fn generate(&self, prompt: &str, _settings: &Settings) -> Result<String, ProviderError> {
        let question = prompt
            .rsplit(">>QUESTION<<")
            .next()
            .and_then(|rest| rest.lines().next())
            .unwrap_or(prompt)
            .trim();
        Ok(format!("[echo] {question}"))
    }

    fn name(&self) -> &str {
        "offline echo"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_carries_all_sampling_parameters() {
        let settings = Settings::default();
        let json = serde_json::to_value(build_request("hi", &settings)).unwrap();
        assert_eq!(json["inputs"], "hi");
        let params = &json["parameters"];
        assert_eq!(params["max_new_tokens"], 256);
        assert_eq!(params["return_full_text"], false);
        assert!((params["temperature"].as_f64().unwrap() - 0.1).abs() < 1e-6);
        assert!((params["top_p"].as_f64().unwrap() - 0.9).abs() < 1e-6);
        assert!((params["repetition_penalty"].as_f64().unwrap() - 1.2).abs() < 1e-6);
    }

    #[test]
    fn parse_strips_prompt_and_stop_sequences() {
        let body = r#"[{"generated_text":"PROMPT Bread and cheese.\n>>QUESTION<<next"}]"#;
        assert_eq!(parse_generation(body, "PROMPT").unwrap(), "Bread and cheese.");
    }

    #[test]
    fn parse_rejects_bad_bodies() {
        assert!(matches!(parse_generation("[]", "p"), Err(ProviderError::Decode(_))));
        assert!(matches!(parse_generation("{}", "p"), Err(ProviderError::Decode(_))));
    }

    #[test]
    fn status_mapping() {
        assert!(matches!(
            status_error(StatusCode::UNAUTHORIZED, r#"{"error":"Invalid token"}"#),
            ProviderError::Unauthorized
        ));
        assert!(matches!(
            status_error(StatusCode::TOO_MANY_REQUESTS, ""),
            ProviderError::RateLimited
        ));
        match status_error(
            StatusCode::SERVICE_UNAVAILABLE,
            r#"{"error":"Model is currently loading","estimated_time":20.0}"#,
        ) {
            ProviderError::ModelLoading { estimated_secs } => assert_eq!(estimated_secs, 20.0),
            other => panic!("unexpected {other:?}"),
        }
        match status_error(StatusCode::BAD_REQUEST, r#"{"error":"Input too long"}"#) {
            ProviderError::Api { status, message } => {
                assert_eq!(status, 400);
                assert_eq!(message, "Input too long");
            }
            other => panic!("unexpected {other:?}"),
        }
        match status_error(StatusCode::INTERNAL_SERVER_ERROR, "boom\n") {
            ProviderError::Api { message, .. } => assert_eq!(message, "boom"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn endpoint_joins_base_and_repo() {
        let config = Config {
            base_url: "https://example.test/".to_string(),
            ..Config::default()
        };
        let client = HubClient::new(&config, "tok".to_string()).unwrap();
        assert_eq!(client.endpoint(), "https://example.test/models/tiiuae/falcon-7b-instruct");
        assert_eq!(client.name(), "tiiuae/falcon-7b-instruct");
    }

    /// Answer a single HTTP request with a canned response; resolves to the
    /// raw request text.
    async fn serve_once(
        status_line: &'static str,
        body: &'static str,
    ) -> (String, tokio::task::JoinHandle<String>) {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut chunk = [0u8; 4096];
            loop {
                let n = socket.read(&mut chunk).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&chunk[..n]);
                if let Some(head_end) = request.windows(4).position(|w| w == b"\r\n\r\n") {
                    let head = String::from_utf8_lossy(&request[..head_end]).to_lowercase();
                    let body_len = head
                        .lines()
                        .find_map(|line| line.strip_prefix("content-length:"))
                        .and_then(|v| v.trim().parse::<usize>().ok())
                        .unwrap_or(0);
                    if request.len() >= head_end + 4 + body_len {
                        break;
                    }
                }
            }
            let response = format!(
                "{status_line}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                body.len()
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.ok();
            String::from_utf8_lossy(&request).into_owned()
        });
        (base, handle)
    }

    fn local_client(base: String) -> HubClient {
        let config = Config { base_url: base, ..Config::default() };
        let mut client = HubClient::new(&config, "hf_test".to_string()).unwrap();
        // keep loopback traffic away from any proxy set in the environment
        client.client = reqwest::Client::builder().no_proxy().build().unwrap();
        client
    }

    #[tokio::test]
    async fn generate_posts_prompt_with_bearer_token() {
        let (base, server) = serve_once(
            "HTTP/1.1 200 OK",
            r#"[{"generated_text":" Bread and cheese.\nUser: thanks"}]"#,
        )
        .await;
        let reply = local_client(base)
            .generate("PROMPT", &Settings::default())
            .await
            .unwrap();
        assert_eq!(reply, "Bread and cheese.");

        let request = server.await.unwrap();
        let lowered = request.to_lowercase();
        assert!(lowered.starts_with("post /models/tiiuae/falcon-7b-instruct http/1.1"));
        assert!(lowered.contains("authorization: bearer hf_test"));
        assert!(request.contains(r#""inputs":"PROMPT""#));
        assert!(request.contains(r#""return_full_text":false"#));
    }

    #[tokio::test]
    async fn generate_maps_loading_model_response() {
        let (base, server) = serve_once(
            "HTTP/1.1 503 Service Unavailable",
            r#"{"error":"Model tiiuae/falcon-7b-instruct is currently loading","estimated_time":12.5}"#,
        )
        .await;
        let err = local_client(base)
            .generate("PROMPT", &Settings::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::ModelLoading { estimated_secs } if estimated_secs == 12.5));
        server.await.unwrap();
    }

    #[tokio::test]
    async fn echo_returns_question_line() {
        let prompt = crate::prompts::PromptTemplate::default().render("", "Hello there");
        let reply = EchoGenerator.generate(&prompt, &Settings::default()).await.unwrap();
        assert_eq!(reply, "[echo] Hello there");
    }
}
