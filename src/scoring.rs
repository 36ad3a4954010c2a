use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Url};
use tracing::{debug, info, warn};

use crate::classify::classify_scoring;
use crate::config::{endpoint, ClientConfig};
use crate::error::{ConfigError, ScoringError};
use crate::models::{HealthStatus, LearnerMetrics, RiskPrediction};
use crate::risk::{self, NoiseSource};
use crate::validate::validate;

#[async_trait]
pub trait ScoringStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    /// True when results are an approximation rather than model output.
    fn is_approximation(&self) -> bool {
        false
    }

    /// Scores metrics that have already passed validation.
    async fn predict(&self, metrics: &LearnerMetrics) -> Result<RiskPrediction, ScoringError>;
}

pub struct RemoteScorer {
    http: Client,
    predict_url: Url,
    health_url: Url,
}

impl RemoteScorer {
    pub fn new(http: Client, base_url: &Url) -> Result<Self, ConfigError> {
        Ok(Self {
            http,
            predict_url: endpoint(base_url, "predict")?,
            health_url: endpoint(base_url, "health")?,
        })
    }

    pub async fn health(&self) -> Result<HealthStatus, ScoringError> {
        debug!(url = %self.health_url, "checking scoring service health");
        let response = self
            .http
            .get(self.health_url.clone())
            .send()
            .await
            .map_err(|err| classify_scoring(None, &err.to_string()))?;

        let body = read_success_body(response).await?;
        serde_json::from_str(&body).map_err(|err| ScoringError::Protocol(err.to_string()))
    }
}

#[async_trait]
impl ScoringStrategy for RemoteScorer {
    fn name(&self) -> &'static str {
        "remote model"
    }

    async fn predict(&self, metrics: &LearnerMetrics) -> Result<RiskPrediction, ScoringError> {
        info!(url = %self.predict_url, "requesting completion prediction");
        let response = self
            .http
            .post(self.predict_url.clone())
            .json(metrics)
            .send()
            .await
            .map_err(|err| {
                warn!(error = %err, "prediction request failed before a response");
                classify_scoring(None, &err.to_string())
            })?;

        let body = read_success_body(response).await?;
        parse_prediction(&body)
    }
}

/// Reads the body exactly once and classifies non-success statuses.
async fn read_success_body(response: reqwest::Response) -> Result<String, ScoringError> {
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|err| classify_scoring(None, &err.to_string()))?;

    if status.is_success() {
        return Ok(body);
    }

    let err = classify_scoring(Some(status.as_u16()), &body);
    warn!(status = status.as_u16(), error = %err, "scoring service returned an error");
    Err(err)
}

/// Parses the service payload as-is. Probability and confidence must lie in
/// `[0, 1]` and `will_complete` must agree with the probability; the risk
/// bucket is taken on trust.
pub fn parse_prediction(body: &str) -> Result<RiskPrediction, ScoringError> {
    let prediction: RiskPrediction =
        serde_json::from_str(body).map_err(|err| ScoringError::Protocol(err.to_string()))?;

    for (field, value) in [
        ("completion_probability", prediction.completion_probability),
        ("confidence", prediction.confidence),
    ] {
        if !(0.0..=1.0).contains(&value) {
            return Err(ScoringError::Protocol(format!(
                "{field} {value} is outside [0, 1]"
            )));
        }
    }

    if prediction.will_complete != risk::will_complete(prediction.completion_probability) {
        return Err(ScoringError::Protocol(format!(
            "will_complete={} contradicts completion_probability {}",
            prediction.will_complete, prediction.completion_probability
        )));
    }

    Ok(prediction)
}

pub struct HeuristicScorer {
    noise: Mutex<Box<dyn NoiseSource>>,
    latency: Duration,
}

impl HeuristicScorer {
    pub fn new(noise: Box<dyn NoiseSource>) -> Self {
        Self {
            noise: Mutex::new(noise),
            latency: Duration::ZERO,
        }
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }
}

#[async_trait]
impl ScoringStrategy for HeuristicScorer {
    fn name(&self) -> &'static str {
        "local heuristic"
    }

    fn is_approximation(&self) -> bool {
        true
    }

    async fn predict(&self, metrics: &LearnerMetrics) -> Result<RiskPrediction, ScoringError> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        let mut noise = self
            .noise
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let prediction = risk::heuristic_prediction(metrics, noise.as_mut());
        debug!(
            probability = prediction.completion_probability,
            risk = %prediction.dropout_risk,
            "heuristic prediction"
        );
        Ok(prediction)
    }
}

pub struct RiskScoringClient {
    strategy: Box<dyn ScoringStrategy>,
}

impl RiskScoringClient {
    pub fn new(strategy: impl ScoringStrategy + 'static) -> Self {
        Self {
            strategy: Box::new(strategy),
        }
    }

    /// Remote scoring when a base URL is configured, the heuristic otherwise.
    pub fn from_config(config: &ClientConfig) -> Result<Self, ConfigError> {
        match &config.base_url {
            Some(base_url) => Ok(Self::new(RemoteScorer::new(config.http_client()?, base_url)?)),
            None => {
                let noise = match config.seed {
                    Some(seed) => risk::seeded_noise(seed),
                    None => risk::entropy_noise(),
                };
                Ok(Self::new(
                    HeuristicScorer::new(noise).with_latency(config.heuristic_latency),
                ))
            }
        }
    }

    pub fn strategy_name(&self) -> &'static str {
        self.strategy.name()
    }

    pub fn is_approximation(&self) -> bool {
        self.strategy.is_approximation()
    }

    pub async fn score(&self, metrics: &LearnerMetrics) -> Result<RiskPrediction, ScoringError> {
        if let Some(err) = validate(metrics) {
            debug!(error = %err, "metrics rejected before scoring");
            return Err(err.into());
        }
        self.strategy.predict(metrics).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ValidationError;
    use crate::models::{CourseCategory, DeviceType, DropoutRisk};
    use crate::risk::MidpointNoise;
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn sample_metrics() -> LearnerMetrics {
        LearnerMetrics {
            time_spent_minutes: 120.0,
            videos_watched: 15,
            quizzes_taken: 5,
            average_quiz_score: 85.0,
            completion_rate: 65.0,
            course_category: Some(CourseCategory::Programming),
            device_type: Some(DeviceType::Desktop),
        }
    }

    fn sample_payload() -> serde_json::Value {
        json!({
            "will_complete": true,
            "completion_probability": 0.82,
            "dropout_risk": "Low",
            "confidence": 0.91,
            "input_data": serde_json::to_value(sample_metrics()).unwrap()
        })
    }

    async fn remote_client(server: &MockServer) -> RiskScoringClient {
        let config = ClientConfig::remote(&server.uri()).unwrap();
        RiskScoringClient::from_config(&config).unwrap()
    }

    #[tokio::test]
    async fn remote_prediction_is_returned_untransformed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/predict"))
            .and(body_json(serde_json::to_value(sample_metrics()).unwrap()))
            .respond_with(ResponseTemplate::new(200).set_body_json(sample_payload()))
            .expect(1)
            .mount(&server)
            .await;

        let client = remote_client(&server).await;
        let prediction = client.score(&sample_metrics()).await.unwrap();

        assert_eq!(
            prediction,
            RiskPrediction {
                will_complete: true,
                completion_probability: 0.82,
                dropout_risk: DropoutRisk::Low,
                confidence: 0.91,
                input_data: sample_metrics(),
            }
        );
        assert_eq!(serde_json::to_value(&prediction).unwrap(), sample_payload());
        assert!(!client.is_approximation());
    }

    #[tokio::test]
    async fn backend_classification_is_trusted() {
        let server = MockServer::start().await;
        let mut payload = sample_payload();
        payload["completion_probability"] = json!(0.7);
        payload["dropout_risk"] = json!("Low");
        Mock::given(method("POST"))
            .and(path("/predict"))
            .respond_with(ResponseTemplate::new(200).set_body_json(payload))
            .mount(&server)
            .await;

        let prediction = remote_client(&server)
            .await
            .score(&sample_metrics())
            .await
            .unwrap();
        assert_eq!(prediction.dropout_risk, DropoutRisk::Low);
    }

    #[tokio::test]
    async fn service_unavailable_asks_for_retry() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/predict"))
            .respond_with(ResponseTemplate::new(503))
            .expect(1)
            .mount(&server)
            .await;

        let err = remote_client(&server)
            .await
            .score(&sample_metrics())
            .await
            .unwrap_err();
        assert_eq!(err, ScoringError::ServiceUnavailable);
        assert!(err.to_string().contains("try again"));
    }

    #[tokio::test]
    async fn unprocessable_input_surfaces_backend_detail() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/predict"))
            .respond_with(
                ResponseTemplate::new(422).set_body_json(json!({ "detail": "model rejected input" })),
            )
            .mount(&server)
            .await;

        let err = remote_client(&server)
            .await
            .score(&sample_metrics())
            .await
            .unwrap_err();
        assert_eq!(err, ScoringError::InvalidInput("model rejected input".to_string()));
    }

    #[tokio::test]
    async fn forbidden_is_reported_as_connectivity() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/predict"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;

        let err = remote_client(&server)
            .await
            .score(&sample_metrics())
            .await
            .unwrap_err();
        assert!(matches!(err, ScoringError::Connectivity));
    }

    #[tokio::test]
    async fn other_statuses_carry_their_code() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/predict"))
            .respond_with(ResponseTemplate::new(500).set_body_string("Internal Server Error"))
            .mount(&server)
            .await;

        let err = remote_client(&server)
            .await
            .score(&sample_metrics())
            .await
            .unwrap_err();
        assert_eq!(
            err,
            ScoringError::Server {
                status: 500,
                message: "Server error".to_string()
            }
        );
        assert_eq!(err.to_string(), "Server error (HTTP 500)");
    }

    #[tokio::test]
    async fn malformed_success_body_is_a_protocol_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/predict"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "probability": 0.5 })))
            .mount(&server)
            .await;

        let err = remote_client(&server)
            .await
            .score(&sample_metrics())
            .await
            .unwrap_err();
        assert!(matches!(err, ScoringError::Protocol(_)));
    }

    #[test]
    fn out_of_range_probability_is_a_protocol_error() {
        let mut payload = sample_payload();
        payload["completion_probability"] = json!(1.4);
        let err = parse_prediction(&payload.to_string()).unwrap_err();
        assert!(matches!(err, ScoringError::Protocol(_)));

        let mut payload = sample_payload();
        payload["dropout_risk"] = json!("Severe");
        assert!(parse_prediction(&payload.to_string()).is_err());
    }

    #[test]
    fn completion_flag_must_agree_with_probability() {
        let mut payload = sample_payload();
        payload["will_complete"] = json!(false);
        assert!(matches!(
            parse_prediction(&payload.to_string()),
            Err(ScoringError::Protocol(_))
        ));

        let mut payload = sample_payload();
        payload["completion_probability"] = json!(0.5);
        payload["will_complete"] = json!(false);
        payload["dropout_risk"] = json!("Medium");
        assert!(parse_prediction(&payload.to_string()).is_ok());
    }

    #[tokio::test]
    async fn unreachable_backend_is_a_connectivity_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let config = ClientConfig::remote(&format!("http://{addr}")).unwrap();
        let client = RiskScoringClient::from_config(&config).unwrap();
        let err = client.score(&sample_metrics()).await.unwrap_err();
        assert!(matches!(err, ScoringError::Connectivity));
    }

    #[tokio::test]
    async fn validation_failures_never_reach_the_network() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(sample_payload()))
            .expect(0)
            .mount(&server)
            .await;

        let client = remote_client(&server).await;
        let mut metrics = sample_metrics();
        metrics.course_category = None;
        assert_eq!(
            client.score(&metrics).await.unwrap_err(),
            ScoringError::Validation(ValidationError::MissingSelection)
        );

        let mut metrics = sample_metrics();
        metrics.time_spent_minutes = 0.0;
        assert_eq!(
            client.score(&metrics).await.unwrap_err(),
            ScoringError::Validation(ValidationError::NonPositiveDuration)
        );
    }

    #[tokio::test]
    async fn heuristic_strategy_validates_and_scores_locally() {
        let client = RiskScoringClient::new(HeuristicScorer::new(Box::new(MidpointNoise)));
        assert!(client.is_approximation());
        assert_eq!(client.strategy_name(), "local heuristic");

        let prediction = client.score(&sample_metrics()).await.unwrap();
        assert_eq!(prediction.completion_probability, 0.6675);
        assert_eq!(prediction.dropout_risk, DropoutRisk::Medium);
        assert!(prediction.will_complete);

        let mut metrics = sample_metrics();
        metrics.device_type = None;
        assert!(matches!(
            client.score(&metrics).await,
            Err(ScoringError::Validation(ValidationError::MissingSelection))
        ));
    }

    #[tokio::test]
    async fn offline_config_selects_the_heuristic() {
        let config = ClientConfig::offline().with_seed(Some(3));
        let client = RiskScoringClient::from_config(&config).unwrap();
        assert!(client.is_approximation());

        let prediction = client.score(&sample_metrics()).await.unwrap();
        assert_eq!(
            prediction.will_complete,
            prediction.completion_probability > 0.5
        );
    }

    #[tokio::test(start_paused = true)]
    async fn heuristic_latency_is_simulated() {
        let scorer = HeuristicScorer::new(Box::new(MidpointNoise))
            .with_latency(Duration::from_millis(1500));
        let started = tokio::time::Instant::now();
        scorer.predict(&sample_metrics()).await.unwrap();
        assert!(started.elapsed() >= Duration::from_millis(1500));
    }

    #[tokio::test]
    async fn health_probe_reads_backend_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/health"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "healthy",
                "model_loaded": true,
                "gemini_api_configured": false
            })))
            .mount(&server)
            .await;

        let base = crate::config::parse_base_url(&server.uri()).unwrap();
        let scorer = RemoteScorer::new(Client::new(), &base).unwrap();
        let health = scorer.health().await.unwrap();
        assert_eq!(health.status, "healthy");
        assert!(health.model_loaded);
        assert!(!health.assistant_configured);
    }
}
