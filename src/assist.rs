//! The assistant bridge: sends a free-text prompt to a completion service
//! and turns the reply into subtask strings.
//!
//! Two transports produce the same single free-text reply: the proxy (which
//! holds the credential server-side) or a direct call with a user-supplied
//! key, the latter explicitly unsafe since the key leaves the operator's
//! machine headed straight for the external API.
//!
//! Reply parsing is a best-effort adapter, not a format parser: anything the
//! model sends degrades into one subtask per non-empty line, bullets and
//! numbering stripped, capped at [`MAX_SUBTASKS`].

use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::task::Task;

/// OpenAI chat completions endpoint used by direct mode.
pub const OPENAI_API_URL: &str = "https://api.openai.com/v1/chat/completions";

/// Model requested by both the proxy and direct mode.
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Upper bound on subtasks generated from one reply.
pub const MAX_SUBTASKS: usize = 10;

/// Assistant bridge failures. Each is terminal for the one request and is
/// rendered for the operator; nothing is retried.
#[derive(Debug, Error)]
pub enum AssistError {
    #[error("assistant request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("assistant proxy error: {0}")]
    Proxy(String),
    #[error("assistant API error ({status}): {body}")]
    Api { status: u16, body: String },
}

/// How the completion request leaves the machine.
pub enum Transport {
    /// POST `{prompt, tasks}` to a proxy that holds the credential.
    Proxy { url: String },
    /// Call the external API directly with a user-supplied key. Unsafe:
    /// exposes the credential client-side.
    Direct { api_key: String },
}

#[derive(Serialize)]
struct ProxyRequest<'a> {
    prompt: &'a str,
    tasks: &'a [Task],
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
}

/// Client for the assistant completion service.
pub struct AssistClient {
    client: Client,
    transport: Transport,
}

impl AssistClient {
    pub fn new(transport: Transport) -> Self {
        AssistClient {
            client: Client::new(),
            transport,
        }
    }

    /// Request a completion and parse it into subtask strings.
    pub async fn generate_subtasks(
        &self,
        prompt: &str,
        tasks: &[Task],
    ) -> Result<Vec<String>, AssistError> {
        let reply = self.complete(prompt, tasks).await?;
        Ok(parse_subtask_lines(&reply))
    }

    /// Request a single free-text reply over the configured transport.
    pub async fn complete(&self, prompt: &str, tasks: &[Task]) -> Result<String, AssistError> {
        match &self.transport {
            Transport::Proxy { url } => {
                let response = self
                    .client
                    .post(url)
                    .json(&ProxyRequest { prompt, tasks })
                    .send()
                    .await?;
                let status = response.status();
                if !status.is_success() {
                    return Err(AssistError::Proxy(format!("proxy returned {status}")));
                }
                let body: Value = response.json().await?;
                Ok(extract_reply_text(&body))
            }
            Transport::Direct { api_key } => {
                let request = ChatRequest {
                    model: DEFAULT_MODEL,
                    messages: vec![ChatMessage {
                        role: "user",
                        content: prompt,
                    }],
                    max_tokens: 300,
                };
                let response = self
                    .client
                    .post(OPENAI_API_URL)
                    .bearer_auth(api_key)
                    .json(&request)
                    .send()
                    .await?;
                let status = response.status();
                let body = response.text().await?;
                if !status.is_success() {
                    return Err(AssistError::Api {
                        status: status.as_u16(),
                        body,
                    });
                }
                let body: Value = serde_json::from_str(&body).map_err(|e| AssistError::Api {
                    status: status.as_u16(),
                    body: format!("unparseable response: {e}"),
                })?;
                Ok(extract_reply_text(&body))
            }
        }
    }
}

/// Pull the assistant's text out of a chat-completion response, falling back
/// to the raw JSON when the shape is unfamiliar.
pub fn extract_reply_text(body: &Value) -> String {
    let choice = &body["choices"][0];
    if let Some(text) = choice["message"]["content"].as_str() {
        return text.to_string();
    }
    if let Some(text) = choice["text"].as_str() {
        return text.to_string();
    }
    body.to_string()
}

/// Split a reply into subtask strings: one per line, leading bullet or
/// numbering markup stripped, empty lines dropped, capped at
/// [`MAX_SUBTASKS`].
pub fn parse_subtask_lines(reply: &str) -> Vec<String> {
    reply
        .split(['\n', '\r'])
        .map(strip_list_marker)
        .filter(|line| !line.is_empty())
        .take(MAX_SUBTASKS)
        .map(str::to_string)
        .collect()
}

/// Strip the fixed leading marker set: dashes, asterisks, digits, dots,
/// closing parens and whitespace.
fn strip_list_marker(line: &str) -> &str {
    line.trim_start_matches(|c: char| {
        c == '-' || c == '*' || c == '.' || c == ')' || c.is_ascii_digit() || c.is_whitespace()
    })
    .trim_end()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_numbered_reply_becomes_two_subtasks() {
        let lines = parse_subtask_lines("1. Buy eggs\n2. Call bank");
        assert_eq!(lines, vec!["Buy eggs", "Call bank"]);
    }

    #[test]
    fn test_bullet_markers_are_stripped() {
        let lines = parse_subtask_lines("- first thing\n* second thing\n3) third thing");
        assert_eq!(lines, vec!["first thing", "second thing", "third thing"]);
    }

    #[test]
    fn test_blank_lines_dropped_and_capped_at_ten() {
        let reply = (1..=14)
            .map(|i| format!("{i}. step {i}\n\n"))
            .collect::<String>();
        let lines = parse_subtask_lines(&reply);
        assert_eq!(lines.len(), MAX_SUBTASKS);
        assert_eq!(lines[0], "step 1");
        assert_eq!(lines[9], "step 10");
    }

    #[test]
    fn test_prose_degrades_to_one_subtask_per_line() {
        let lines = parse_subtask_lines("Here is a plan\r\nDo the thing");
        assert_eq!(lines, vec!["Here is a plan", "Do the thing"]);
    }

    #[test]
    fn test_extract_prefers_message_content() {
        let body = json!({"choices": [{"message": {"content": "hello"}}]});
        assert_eq!(extract_reply_text(&body), "hello");
    }

    #[test]
    fn test_extract_falls_back_to_text_field() {
        let body = json!({"choices": [{"text": "legacy"}]});
        assert_eq!(extract_reply_text(&body), "legacy");
    }

    #[test]
    fn test_extract_falls_back_to_raw_json() {
        let body = json!({"error": "overloaded"});
        assert_eq!(extract_reply_text(&body), body.to_string());
    }
}
