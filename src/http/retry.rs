use std::future::Future;
use std::time::Duration;

use serde_json::Value;
use tracing::{debug, warn};

use crate::config::NETWORK_RETRY_DELAY_SECS;
use crate::error::{AppError, Result};
use crate::http::ApiResponse;

/// Bounded retry with exponential backoff for vendor calls.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    /// Wait before retry n is `base_delay * 2^(n-1)`.
    pub base_delay: Duration,
    /// Fixed wait after a request that got no response.
    pub network_delay: Duration,
    /// Structured error codes worth retrying.
    pub retryable_codes: &'static [i64],
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration, retryable_codes: &'static [i64]) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            network_delay: Duration::from_secs(NETWORK_RETRY_DELAY_SECS),
            retryable_codes,
        }
    }

    pub fn backoff(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(1u32 << attempt.saturating_sub(1).min(16))
    }

    pub fn is_retryable(&self, body: &str) -> bool {
        error_code(body).is_some_and(|code| self.retryable_codes.contains(&code))
    }
}

/// Pulls the vendor error code out of an error body: `error.code` (Graph API,
/// Google) or a top-level `code`.
pub fn error_code(body: &str) -> Option<i64> {
    let v: Value = serde_json::from_str(body).ok()?;
    v.get("error")
        .and_then(|e| e.get("code"))
        .or_else(|| v.get("code"))
        .and_then(|c| c.as_i64().or_else(|| c.as_str().and_then(|s| s.parse().ok())))
}

/// Runs `request` until it yields a 2xx JSON body, retrying retryable error
/// codes with exponential backoff and transport failures with a fixed delay.
pub async fn with_retry<F, Fut>(policy: &RetryPolicy, label: &str, mut request: F) -> Result<Value>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<ApiResponse>>,
{
    let mut attempt = 0u32;
    loop {
        attempt += 1;
        let resp = match request().await {
            Ok(resp) => resp,
            Err(e) => {
                if attempt >= policy.max_attempts {
                    warn!(call = label, attempt, "Request failed on final attempt: {e}");
                    return Err(e);
                }
                warn!(
                    call = label,
                    attempt,
                    delay_secs = policy.network_delay.as_secs_f64(),
                    "Request failed, retrying: {e}"
                );
                tokio::time::sleep(policy.network_delay).await;
                continue;
            }
        };

        if resp.is_success() {
            debug!(call = label, attempt, "Request succeeded");
            return resp.json();
        }

        if !policy.is_retryable(&resp.body) {
            warn!(call = label, status = resp.status, "Non-retryable API error");
            return Err(AppError::Api { status: resp.status, body: resp.body });
        }

        if attempt >= policy.max_attempts {
            warn!(call = label, attempts = attempt, status = resp.status, "Retries exhausted");
            return Err(AppError::RetriesExhausted {
                attempts: attempt,
                status: resp.status,
                body: resp.body,
            });
        }

        let delay = policy.backoff(attempt);
        warn!(
            call = label,
            attempt,
            status = resp.status,
            code = ?error_code(&resp.body),
            delay_secs = delay.as_secs_f64(),
            "Retryable API error, backing off"
        );
        tokio::time::sleep(delay).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::testing::{ok, status, transport_error, ScriptedClient};
    use crate::http::ApiClient;
    use reqwest::Method;

    const RATE_LIMIT: &str = r#"{"error":{"message":"User request limit reached","code":17}}"#;

    fn policy() -> RetryPolicy {
        RetryPolicy::new(3, Duration::from_secs(2), &[4, 17, 613])
    }

    async fn run(client: &ScriptedClient, policy: &RetryPolicy) -> Result<Value> {
        with_retry(policy, "test", || client.request(Method::GET, "/x", None)).await
    }

    #[test]
    fn extracts_nested_and_flat_codes() {
        assert_eq!(error_code(RATE_LIMIT), Some(17));
        assert_eq!(error_code(r#"{"code":"1018","title":"x"}"#), Some(1018));
        assert_eq!(error_code("<html>oops</html>"), None);
    }

    #[test]
    fn backoff_doubles() {
        let p = policy();
        assert_eq!(p.backoff(1), Duration::from_secs(2));
        assert_eq!(p.backoff(2), Duration::from_secs(4));
        assert_eq!(p.backoff(3), Duration::from_secs(8));
    }

    #[tokio::test(start_paused = true)]
    async fn succeeds_after_two_rate_limits() {
        let client = ScriptedClient::new(vec![
            status(400, RATE_LIMIT),
            status(400, RATE_LIMIT),
            ok(r#"{"data":[1]}"#),
        ]);
        let started = tokio::time::Instant::now();
        let v = run(&client, &policy()).await.unwrap();
        assert_eq!(v["data"][0], 1);
        assert_eq!(client.request_count(), 3);
        // 2s + 4s of backoff.
        assert_eq!(started.elapsed(), Duration::from_secs(6));
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_max_attempts() {
        let client = ScriptedClient::new(vec![
            status(400, RATE_LIMIT),
            status(400, RATE_LIMIT),
            status(400, RATE_LIMIT),
            ok("{}"),
        ]);
        let err = run(&client, &policy()).await.unwrap_err();
        assert!(matches!(err, AppError::RetriesExhausted { attempts: 3, status: 400, .. }));
        assert_eq!(client.request_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn non_retryable_code_fails_immediately() {
        let client = ScriptedClient::new(vec![status(400, r#"{"error":{"code":190}}"#), ok("{}")]);
        let err = run(&client, &policy()).await.unwrap_err();
        assert!(matches!(err, AppError::Api { status: 400, .. }));
        assert_eq!(client.request_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn transport_errors_use_fixed_delay() {
        let client = ScriptedClient::new(vec![transport_error(), ok(r#"{"ok":true}"#)]);
        let p = policy();
        let started = tokio::time::Instant::now();
        let v = run(&client, &p).await.unwrap();
        assert_eq!(v["ok"], true);
        assert_eq!(started.elapsed(), p.network_delay);
    }

    #[tokio::test(start_paused = true)]
    async fn transport_error_on_last_attempt_is_reraised() {
        let client = ScriptedClient::new(vec![transport_error(), transport_error(), transport_error()]);
        let err = run(&client, &policy()).await.unwrap_err();
        assert!(matches!(err, AppError::Io(_)));
        assert_eq!(client.request_count(), 3);
    }
}
