//! HTTP skill provider.
//!
//! Requests are sent as the Runly envelope `{"header": {...}, "payload": {...}}`.
//! Providers answer `{"status": "success", "data": ...}` or a non-success
//! status with a `message`. Bodies without a `status` field are passed
//! through unchanged.

use std::time::Duration;

use reqwest::Method;
use runly_core::engine::SkillInvocation;
use runly_core::renderer::value_to_string;
use runly_types::error::StepError;
use serde_json::{Value, json};

/// Delay before retry `n` is `n * RETRY_BACKOFF_MS`.
const RETRY_BACKOFF_MS: u64 = 200;

/// Invokes skills over HTTP, honouring each skill's timeout and retry budget.
#[derive(Debug, Clone)]
pub struct HttpSkillInvoker {
    client: reqwest::Client,
}

impl HttpSkillInvoker {
    pub fn new() -> Result<Self, StepError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("runly/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| StepError::ExecutionFailed(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }

    /// Call the skill, retrying up to `max_retries` times on failure.
    pub async fn invoke(&self, request: &SkillInvocation) -> Result<Value, StepError> {
        if request.endpoint.trim().is_empty() {
            return Err(StepError::ExecutionFailed(format!(
                "skill '{}' has no endpoint configured",
                request.skill_id
            )));
        }

        let mut attempt = 0u32;
        loop {
            match self.attempt(request).await {
                Ok(value) => return Ok(value),
                Err(err) if attempt < request.max_retries => {
                    attempt += 1;
                    tracing::warn!(
                        skill = %request.skill_id,
                        attempt,
                        max_retries = request.max_retries,
                        error = %err,
                        "skill call failed, retrying"
                    );
                    tokio::time::sleep(Duration::from_millis(RETRY_BACKOFF_MS * u64::from(attempt))).await;
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn attempt(&self, request: &SkillInvocation) -> Result<Value, StepError> {
        let method = parse_method(&request.method)?;
        let mut builder = self
            .client
            .request(method.clone(), &request.endpoint)
            .timeout(Duration::from_millis(request.timeout_ms));

        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        builder = if method == Method::GET {
            let query: Vec<(String, String)> = request
                .payload
                .as_object()
                .map(|m| m.iter().map(|(k, v)| (k.clone(), value_to_string(v))).collect())
                .unwrap_or_default();
            builder.query(&query)
        } else {
            builder.json(&json!({
                "header": request.headers,
                "payload": request.payload,
            }))
        };

        tracing::debug!(skill = %request.skill_id, endpoint = %request.endpoint, %method, "calling skill");

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                StepError::Timeout {
                    timeout_ms: request.timeout_ms,
                }
            } else {
                StepError::ExecutionFailed(format!("request to {} failed: {e}", request.endpoint))
            }
        })?;

        let status = response.status();
        let body: Value = response.json().await.map_err(|e| {
            if e.is_timeout() {
                StepError::Timeout {
                    timeout_ms: request.timeout_ms,
                }
            } else {
                StepError::ExecutionFailed(format!("invalid JSON from {}: {e}", request.endpoint))
            }
        })?;

        if !status.is_success() {
            return Err(StepError::ExecutionFailed(format!(
                "{} returned HTTP {status}: {}",
                request.endpoint,
                envelope_message(&body)
            )));
        }

        interpret_envelope(body)
    }
}

fn parse_method(raw: &str) -> Result<Method, StepError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(Method::POST);
    }
    Method::from_bytes(raw.to_ascii_uppercase().as_bytes())
        .map_err(|_| StepError::ExecutionFailed(format!("unsupported HTTP method '{raw}'")))
}

fn envelope_message(body: &Value) -> String {
    body.get("message")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| value_to_string(body))
}

/// Unwrap a provider envelope into its `data`.
pub fn interpret_envelope(body: Value) -> Result<Value, StepError> {
    match body.get("status").and_then(Value::as_str) {
        None => Ok(body),
        Some("success") => Ok(body.get("data").cloned().unwrap_or(Value::Null)),
        Some(status) => Err(StepError::ExecutionFailed(format!(
            "provider reported '{status}': {}",
            envelope_message(&body)
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn invocation(endpoint: String, max_retries: u32) -> SkillInvocation {
        let mut headers = BTreeMap::new();
        headers.insert("Authorization".to_string(), "Bearer t0ken".to_string());
        SkillInvocation {
            node_id: "fetch".to_string(),
            skill_id: "crm".to_string(),
            endpoint,
            method: "post".to_string(),
            headers,
            payload: json!({"query": "acme"}),
            timeout_ms: 2_000,
            max_retries,
        }
    }

    /// Serve one request with `body`, returning the raw request text.
    async fn serve_once(body: &'static str) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}/skill", listener.local_addr().unwrap());
        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = Vec::new();
            let mut chunk = [0u8; 4096];
            loop {
                let n = socket.read(&mut chunk).await.unwrap();
                buf.extend_from_slice(&chunk[..n]);
                let text = String::from_utf8_lossy(&buf).to_string();
                if let Some(end) = text.find("\r\n\r\n") {
                    let len = text[..end]
                        .lines()
                        .find_map(|l| {
                            let lower = l.to_ascii_lowercase();
                            lower
                                .strip_prefix("content-length:")
                                .map(|v| v.trim().parse::<usize>().unwrap())
                        })
                        .unwrap_or(0);
                    if buf.len() >= end + 4 + len {
                        break;
                    }
                }
                if n == 0 {
                    break;
                }
            }
            let response = format!(
                "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                body.len(),
                body
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.unwrap();
            String::from_utf8_lossy(&buf).to_string()
        });
        (url, handle)
    }

    #[test]
    fn test_interpret_envelope_success() {
        let data = interpret_envelope(json!({"status": "success", "data": {"rows": 2}})).unwrap();
        assert_eq!(data, json!({"rows": 2}));
    }

    #[test]
    fn test_interpret_envelope_failure_uses_message() {
        let err = interpret_envelope(json!({"status": "error", "message": "quota exceeded"})).unwrap_err();
        assert!(err.to_string().contains("quota exceeded"));
    }

    #[test]
    fn test_interpret_envelope_passes_through_plain_bodies() {
        assert_eq!(interpret_envelope(json!([1, 2])).unwrap(), json!([1, 2]));
    }

    #[test]
    fn test_parse_method() {
        assert_eq!(parse_method("").unwrap(), Method::POST);
        assert_eq!(parse_method("get").unwrap(), Method::GET);
        assert!(parse_method("NOT A METHOD").is_err());
    }

    #[tokio::test]
    async fn test_invoke_posts_envelope_and_unwraps_data() {
        let (url, server) = serve_once(r#"{"status":"success","data":{"rows":[1,2,3]}}"#).await;
        let invoker = HttpSkillInvoker::new().unwrap();

        let data = invoker.invoke(&invocation(url, 0)).await.unwrap();
        assert_eq!(data, json!({"rows": [1, 2, 3]}));

        let raw = server.await.unwrap();
        assert!(raw.starts_with("POST /skill"));
        assert!(raw.to_ascii_lowercase().contains("authorization: bearer t0ken"));
        assert!(raw.contains(r#""payload":{"query":"acme"}"#));
    }

    #[tokio::test]
    async fn test_invoke_without_endpoint_fails_fast() {
        let invoker = HttpSkillInvoker::new().unwrap();
        let err = invoker.invoke(&invocation(String::new(), 3)).await.unwrap_err();
        assert!(matches!(err, StepError::ExecutionFailed(ref m) if m.contains("no endpoint")));
    }

    #[tokio::test]
    async fn test_invoke_unreachable_endpoint_exhausts_retries() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}/skill", listener.local_addr().unwrap());
        drop(listener);

        let invoker = HttpSkillInvoker::new().unwrap();
        let err = invoker.invoke(&invocation(url, 1)).await.unwrap_err();
        assert!(matches!(err, StepError::ExecutionFailed(_)));
    }
}
