use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use signal_core::{LlmError, LlmProvider};

use crate::error::{LlmClientError, LlmClientResult};
use crate::LlmConfig;

const SYSTEM_PROMPT: &str =
    "You are a disciplined trading decision assistant. Answer with a single JSON object and nothing else.";

#[derive(Debug, Clone, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Clone, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f64,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: Option<ChatReply>,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    content: Option<String>,
}

/// Client for an OpenAI-compatible `/chat/completions` endpoint
#[derive(Clone)]
pub struct ChatCompletionsClient {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
}

impl ChatCompletionsClient {
    pub fn new(config: LlmConfig) -> LlmClientResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| LlmClientError::Config(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.api_url,
            api_key: config.api_key,
            model: config.model,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Send one prompt and return the first choice's message content
    pub async fn chat(&self, prompt: &str) -> LlmClientResult<String> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
            temperature: 0.0,
        };

        let mut builder = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .json(&request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await?;

        if !response.status().is_success() {
            return Err(LlmClientError::ServiceUnavailable(format!(
                "Status: {}",
                response.status()
            )));
        }

        let body = response.text().await?;
        extract_content(&body)
    }
}

/// Pull `choices[0].message.content` out of a chat completions body
fn extract_content(body: &str) -> LlmClientResult<String> {
    let parsed: ChatResponse = serde_json::from_str(body)?;
    parsed
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message)
        .and_then(|message| message.content)
        .filter(|content| !content.trim().is_empty())
        .ok_or_else(|| LlmClientError::InvalidResponse("response has no message content".to_string()))
}

#[async_trait]
impl LlmProvider for ChatCompletionsClient {
    async fn complete(&self, prompt: &str) -> Result<String, LlmError> {
        tracing::debug!("Sending {} byte prompt to {} ({})", prompt.len(), self.base_url, self.model);
        self.chat(prompt).await.map_err(LlmError::from)
    }

    fn backend_name(&self) -> &'static str {
        "chat-completions"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;

    /// Serve a single canned HTTP response and hand back the raw request text
    async fn serve_once(status: &'static str, body: &'static str) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}/v1", listener.local_addr().unwrap());

        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut received = Vec::new();
            let mut buf = [0u8; 4096];
            loop {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                received.extend_from_slice(&buf[..n]);
                let text = String::from_utf8_lossy(&received).to_string();
                if let Some(header_end) = text.find("\r\n\r\n") {
                    let content_length = text[..header_end]
                        .lines()
                        .find_map(|line| {
                            let (name, value) = line.split_once(':')?;
                            name.eq_ignore_ascii_case("content-length")
                                .then(|| value.trim().parse::<usize>().ok())
                                .flatten()
                        })
                        .unwrap_or(0);
                    if received.len() >= header_end + 4 + content_length {
                        break;
                    }
                }
            }

            let response = format!(
                "HTTP/1.1 {}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                status,
                body.len(),
                body
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.ok();
            String::from_utf8_lossy(&received).to_string()
        });

        (url, handle)
    }

    fn client(url: &str) -> ChatCompletionsClient {
        let mut config = LlmConfig::new(url);
        config.api_key = Some("sk-test".to_string());
        config.model = "test-model".to_string();
        config.timeout = Duration::from_secs(5);
        ChatCompletionsClient::new(config).unwrap()
    }

    #[test]
    fn test_extract_content() {
        let body = r#"{"choices":[{"index":0,"message":{"role":"assistant","content":"{\"action\":\"BUY\"}"}}]}"#;
        assert_eq!(extract_content(body).unwrap(), r#"{"action":"BUY"}"#);
    }

    #[test]
    fn test_extract_content_rejects_empty_choices() {
        assert!(matches!(
            extract_content(r#"{"choices":[]}"#),
            Err(LlmClientError::InvalidResponse(_))
        ));
        assert!(matches!(
            extract_content(r#"{"choices":[{"message":{"content":null}}]}"#),
            Err(LlmClientError::InvalidResponse(_))
        ));
        assert!(matches!(extract_content("not json"), Err(LlmClientError::Serialization(_))));
    }

    #[tokio::test]
    async fn test_complete_round_trip() {
        let (url, server) = serve_once(
            "200 OK",
            r#"{"choices":[{"message":{"role":"assistant","content":"{\"action\":\"SELL\",\"confidence\":81}"}}]}"#,
        )
        .await;

        let reply = client(&url).complete("decide please").await.unwrap();
        assert_eq!(reply, r#"{"action":"SELL","confidence":81}"#);

        let request = server.await.unwrap();
        assert!(request.starts_with("POST /v1/chat/completions"));
        assert!(request.to_ascii_lowercase().contains("authorization: bearer sk-test"));
        assert!(request.contains("\"model\":\"test-model\""));
        assert!(request.contains("decide please"));
    }

    #[tokio::test]
    async fn test_non_success_status_is_unavailable() {
        let (url, server) = serve_once("503 Service Unavailable", r#"{"error":"overloaded"}"#).await;
        let err = client(&url).complete("decide").await.unwrap_err();
        assert!(matches!(err, LlmError::ServiceUnavailable(_)));
        server.await.unwrap();
    }
}
