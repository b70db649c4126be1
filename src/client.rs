use crate::config::{ApiConfig, DEFAULT_TIMEOUT_SECONDS};
use crate::error::{AnalysisError, SubmitError};
use crate::feedback::FeedbackSubmission;
use crate::threat::{normalize, ThreatLabel};
use crate::url_validator::validate;
use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::{Duration, Instant};

const ANALYZE_PATH: &str = "/api/analyze-url";
const FEEDBACK_PATH: &str = "/api/feedback";
const FEEDBACK_STATS_PATH: &str = "/api/feedback/stats";

#[derive(Debug, Clone, Serialize)]
pub struct AnalysisRequest<'a> {
    pub url: &'a str,
}

/// Outcome of one successful analysis call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub analyzed_url: String,
    pub risk_level: ThreatLabel,
    pub response_time_ms: u64,
    pub timestamp: DateTime<Utc>,
}

impl AnalysisResult {
    pub fn new(analyzed_url: impl Into<String>, risk_level: ThreatLabel, response_time_ms: u64) -> Self {
        Self {
            analyzed_url: analyzed_url.into(),
            risk_level,
            response_time_ms,
            timestamp: Utc::now(),
        }
    }
}

/// Aggregate feedback counters. The backend decides the keys.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeedbackStats(pub BTreeMap<String, Value>);

/// HTTP client for the classifier backend.
///
/// Cheap to clone; clones share the underlying connection pool.
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    timeout: Duration,
}

impl ApiClient {
    pub fn new(config: &ApiConfig) -> Result<Self, reqwest::Error> {
        // 30s ceiling on every request
        let timeout = Duration::from_secs(config.timeout_seconds.min(DEFAULT_TIMEOUT_SECONDS));
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(config.user_agent.as_str())
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            timeout,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Validate `url`, send it to the classifier and normalize the answer.
    ///
    /// Invalid input never reaches the network. No retries are attempted.
    pub async fn analyze(&self, url: &str) -> Result<AnalysisResult, AnalysisError> {
        validate(url)?;
        let analyzed_url = url.trim();

        log::debug!("Dispatching analysis request for {analyzed_url}");
        let started = Instant::now();

        let response = self
            .client
            .post(self.endpoint(ANALYZE_PATH))
            .json(&AnalysisRequest { url: analyzed_url })
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let error = classify_status(status, &body);
            log::warn!("Analysis of {analyzed_url} failed with status {status}: {error}");
            return Err(error);
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| self.transport_error(e))?;
        let response_time_ms = started.elapsed().as_millis() as u64;

        let payload: Value = serde_json::from_slice(&body).map_err(|e| {
            log::warn!("Analysis response for {analyzed_url} is not valid JSON: {e}");
            AnalysisError::network(format!("invalid response body: {e}"))
        })?;

        let raw_label = payload
            .get("prediction")
            .and_then(Value::as_str)
            .unwrap_or_default();
        let risk_level = normalize(raw_label);

        log::info!(
            "Analyzed {analyzed_url}: {risk_level} (raw '{raw_label}', {response_time_ms}ms)"
        );

        Ok(AnalysisResult::new(analyzed_url, risk_level, response_time_ms))
    }

    /// Send a validated feedback record once.
    pub async fn submit_feedback(&self, submission: &FeedbackSubmission) -> Result<(), SubmitError> {
        let response = self
            .client
            .post(self.endpoint(FEEDBACK_PATH))
            .json(submission)
            .send()
            .await
            .map_err(|e| {
                log::warn!("Feedback submission for {} failed: {e}", submission.url);
                SubmitError::NetworkError {
                    detail: e.to_string(),
                }
            })?;

        let status = response.status();
        if status.is_success() {
            log::info!(
                "Feedback submitted for {} ({}, actual {})",
                submission.url,
                submission.category,
                submission.actual_threat
            );
            Ok(())
        } else {
            log::warn!(
                "Feedback submission for {} rejected with status {status}",
                submission.url
            );
            Err(SubmitError::ServerError {
                status: status.as_u16(),
            })
        }
    }

    pub async fn feedback_stats(&self) -> anyhow::Result<FeedbackStats> {
        let response = self
            .client
            .get(self.endpoint(FEEDBACK_STATS_PATH))
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status, &body).into());
        }

        Ok(response.json::<FeedbackStats>().await?)
    }

    fn transport_error(&self, e: reqwest::Error) -> AnalysisError {
        let detail = if e.is_timeout() {
            format!("request timed out after {}s", self.timeout.as_secs())
        } else {
            e.to_string()
        };
        log::warn!("Request to {} failed: {detail}", self.base_url);
        AnalysisError::network(detail)
    }
}

/// Map a non-success status onto the analysis error taxonomy.
pub fn classify_status(status: StatusCode, body: &str) -> AnalysisError {
    match status {
        StatusCode::TOO_MANY_REQUESTS => AnalysisError::RateLimited,
        StatusCode::BAD_REQUEST => AnalysisError::BadRequest {
            message: server_message(body).unwrap_or_else(|| "Invalid request".to_string()),
        },
        StatusCode::INTERNAL_SERVER_ERROR => AnalysisError::ServerError,
        other => AnalysisError::network(format!("unexpected status {other}")),
    }
}

fn server_message(body: &str) -> Option<String> {
    let payload: Value = serde_json::from_str(body).ok()?;
    payload
        .get("error")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|message| !message.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ValidationError;
    use crate::threat::FeedbackCategory;
    use serde_json::json;
    use wiremock::matchers::{body_json, body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> ApiClient {
        ApiClient::new(&ApiConfig {
            base_url: format!("{}/", server.uri()),
            timeout_seconds: 1,
            user_agent: "cybersentinel-test".to_string(),
        })
        .unwrap()
    }

    async fn mount_prediction(server: &MockServer, body: Value) {
        Mock::given(method("POST"))
            .and(path(ANALYZE_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_analyze_normalizes_prediction() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(ANALYZE_PATH))
            .and(body_json(json!({ "url": "https://example.com" })))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "prediction": "malware", "confidence": 0.97 })),
            )
            .expect(1)
            .mount(&server)
            .await;

        let result = client_for(&server)
            .analyze("  https://example.com  ")
            .await
            .unwrap();

        assert_eq!(result.risk_level, ThreatLabel::Malware);
        assert_eq!(result.analyzed_url, "https://example.com");
    }

    #[tokio::test]
    async fn test_missing_or_unknown_prediction_is_benign() {
        let server = MockServer::start().await;
        mount_prediction(&server, json!({ "verdict": "phishing" })).await;
        let result = client_for(&server).analyze("https://a.example").await.unwrap();
        assert_eq!(result.risk_level, ThreatLabel::Benign);

        let server = MockServer::start().await;
        mount_prediction(&server, json!({ "prediction": "xyz" })).await;
        let result = client_for(&server).analyze("https://b.example").await.unwrap();
        assert_eq!(result.risk_level, ThreatLabel::Benign);

        let server = MockServer::start().await;
        mount_prediction(&server, json!({ "prediction": 3 })).await;
        let result = client_for(&server).analyze("https://c.example").await.unwrap();
        assert_eq!(result.risk_level, ThreatLabel::Benign);
    }

    #[tokio::test]
    async fn test_invalid_url_never_hits_network() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let err = client_for(&server).analyze("not-a-url").await.unwrap_err();
        assert_eq!(err, AnalysisError::Validation(ValidationError::MissingScheme));

        let err = client_for(&server).analyze("   ").await.unwrap_err();
        assert_eq!(err, AnalysisError::Validation(ValidationError::EmptyInput));

        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_status_classification() {
        let cases = [
            (ResponseTemplate::new(429), AnalysisError::RateLimited),
            (
                ResponseTemplate::new(400).set_body_json(json!({ "error": "URL is too long" })),
                AnalysisError::BadRequest {
                    message: "URL is too long".to_string(),
                },
            ),
            (
                ResponseTemplate::new(400),
                AnalysisError::BadRequest {
                    message: "Invalid request".to_string(),
                },
            ),
            (ResponseTemplate::new(500), AnalysisError::ServerError),
        ];

        for (template, expected) in cases {
            let server = MockServer::start().await;
            Mock::given(method("POST"))
                .and(path(ANALYZE_PATH))
                .respond_with(template)
                .expect(1)
                .mount(&server)
                .await;

            let err = client_for(&server)
                .analyze("https://example.com")
                .await
                .unwrap_err();
            assert_eq!(err, expected);
        }
    }

    #[tokio::test]
    async fn test_other_failures_are_network_errors() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(ANALYZE_PATH))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;
        let err = client_for(&server)
            .analyze("https://example.com")
            .await
            .unwrap_err();
        assert!(matches!(err, AnalysisError::NetworkError { .. }));

        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(ANALYZE_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&server)
            .await;
        let err = client_for(&server)
            .analyze("https://example.com")
            .await
            .unwrap_err();
        assert!(matches!(err, AnalysisError::NetworkError { .. }));
    }

    #[tokio::test]
    async fn test_timeout_is_network_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(ANALYZE_PATH))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "prediction": "Phishing" }))
                    .set_delay(Duration::from_secs(3)),
            )
            .mount(&server)
            .await;

        let err = client_for(&server)
            .analyze("https://slow.example")
            .await
            .unwrap_err();
        match err {
            AnalysisError::NetworkError { detail } => assert!(detail.contains("timed out")),
            other => panic!("expected network error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_unreachable_backend_is_network_error() {
        let client = ApiClient::new(&ApiConfig {
            base_url: "http://127.0.0.1:9".to_string(),
            timeout_seconds: 2,
            user_agent: "cybersentinel-test".to_string(),
        })
        .unwrap();

        let err = client.analyze("https://example.com").await.unwrap_err();
        assert!(matches!(err, AnalysisError::NetworkError { .. }));
    }

    #[test]
    fn test_timeout_is_capped() {
        let client = ApiClient::new(&ApiConfig {
            base_url: "http://localhost:5000".to_string(),
            timeout_seconds: 120,
            user_agent: "cybersentinel-test".to_string(),
        })
        .unwrap();
        assert_eq!(client.timeout, Duration::from_secs(DEFAULT_TIMEOUT_SECONDS));
        assert_eq!(client.base_url(), "http://localhost:5000");
    }

    #[tokio::test]
    async fn test_submit_feedback_unreachable_backend() {
        let client = ApiClient::new(&ApiConfig {
            base_url: "http://127.0.0.1:9".to_string(),
            timeout_seconds: 2,
            user_agent: "cybersentinel-test".to_string(),
        })
        .unwrap();

        let submission = FeedbackSubmission {
            url: "https://bad.example".to_string(),
            actual_threat: ThreatLabel::Malware,
            our_prediction: None,
            description: String::new(),
            category: FeedbackCategory::NewThreat,
            submitted_at: Utc::now(),
        };

        let err = client.submit_feedback(&submission).await.unwrap_err();
        assert!(matches!(err, SubmitError::NetworkError { .. }));
    }

    #[tokio::test]
    async fn test_submit_feedback_wire_format() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(FEEDBACK_PATH))
            .and(body_partial_json(json!({
                "url": "https://bad.example",
                "actualThreat": "Malware",
                "ourPrediction": "",
                "description": "",
                "category": "new_threat",
            })))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&server)
            .await;

        let submission = FeedbackSubmission {
            url: "https://bad.example".to_string(),
            actual_threat: ThreatLabel::Malware,
            our_prediction: None,
            description: String::new(),
            category: FeedbackCategory::NewThreat,
            submitted_at: Utc::now(),
        };

        client_for(&server).submit_feedback(&submission).await.unwrap();
    }

    #[tokio::test]
    async fn test_submit_feedback_server_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(FEEDBACK_PATH))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let submission = FeedbackSubmission {
            url: "https://bad.example".to_string(),
            actual_threat: ThreatLabel::Phishing,
            our_prediction: Some(ThreatLabel::Benign),
            description: "login clone".to_string(),
            category: FeedbackCategory::FalseNegative,
            submitted_at: Utc::now(),
        };

        let err = client_for(&server)
            .submit_feedback(&submission)
            .await
            .unwrap_err();
        assert_eq!(err, SubmitError::ServerError { status: 500 });
    }

    #[tokio::test]
    async fn test_feedback_stats() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(FEEDBACK_STATS_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "total_feedback": 12,
                "false_negative": 4,
            })))
            .mount(&server)
            .await;

        let stats = client_for(&server).feedback_stats().await.unwrap();
        assert_eq!(stats.0.get("total_feedback"), Some(&json!(12)));
        assert_eq!(stats.0.len(), 2);
    }

    #[test]
    fn test_server_message_extraction() {
        assert_eq!(
            server_message(r#"{"error":"  blocked  "}"#),
            Some("blocked".to_string())
        );
        assert_eq!(server_message(r#"{"error":""}"#), None);
        assert_eq!(server_message("not json"), None);
    }
}
