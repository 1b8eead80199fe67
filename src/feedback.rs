//! AI progress feedback. Purely advisory: nothing here influences playback.

use log::debug;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::http::{self, HttpError};

const PROMPT_TEMPLATE: &str = "\
You are an AI assistant designed to track a user's Quran memorization progress and provide personalized recommendations.

Analyze the user's repetition patterns, identify difficult verses, and suggest tailored learning strategies to optimize their memorization effectiveness.

User ID: {{userId}}
Surah Number: {{surahNo}}
Ayah Number: {{ayahNo}}
Repetition Count: {{repetitionCount}}
Error Rate: {{errorRate}}

Based on this data, provide the following:

- A list of difficult verses (difficultVerses).
- A list of recommended learning strategies (recommendedStrategies).
- An overall memorization progress percentage (progressPercentage).

Respond with a JSON object with exactly these three fields.
";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackRequest {
    pub user_id: String,
    pub surah_no: u32,
    pub ayah_no: u32,
    pub repetition_count: u32,
    /// Between 0 and 1.
    pub error_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressFeedback {
    pub difficult_verses: Vec<u32>,
    pub recommended_strategies: Vec<String>,
    pub progress_percentage: f64,
}

#[derive(Debug, Error)]
pub enum FeedbackError {
    #[error("feedback request failed: {0}")]
    Http(#[from] HttpError),
    #[error("feedback response did not match the expected shape: {0}")]
    Schema(#[from] serde_json::Error),
}

pub trait FeedbackProvider: Send + Sync {
    fn request(&self, request: &FeedbackRequest) -> Result<ProgressFeedback, FeedbackError>;
}

pub fn render_prompt(request: &FeedbackRequest) -> String {
    PROMPT_TEMPLATE
        .replace("{{userId}}", &request.user_id)
        .replace("{{surahNo}}", &request.surah_no.to_string())
        .replace("{{ayahNo}}", &request.ayah_no.to_string())
        .replace("{{repetitionCount}}", &request.repetition_count.to_string())
        .replace("{{errorRate}}", &format!("{:.2}", request.error_rate))
}

#[derive(Serialize)]
struct Envelope<'a> {
    prompt: String,
    input: &'a FeedbackRequest,
}

/// POSTs `{prompt, input}` to a JSON endpoint that answers with a
/// [`ProgressFeedback`] object.
#[derive(Debug)]
pub struct HttpFeedbackProvider {
    agent: ureq::Agent,
    endpoint: String,
}

impl HttpFeedbackProvider {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            agent: http::agent(http::CONNECT_TIMEOUT, http::READ_TIMEOUT),
            endpoint: endpoint.into(),
        }
    }
}

impl FeedbackProvider for HttpFeedbackProvider {
    fn request(&self, request: &FeedbackRequest) -> Result<ProgressFeedback, FeedbackError> {
        let body = serde_json::to_string(&Envelope {
            prompt: render_prompt(request),
            input: request,
        })?;
        debug!(
            "requesting feedback for {}:{}",
            request.surah_no, request.ayah_no
        );
        let response = http::post_json(&self.agent, &self.endpoint, &body)?;
        Ok(serde_json::from_str(&response)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::test_server::TestServer;
    use assert_matches::assert_matches;

    fn request() -> FeedbackRequest {
        FeedbackRequest {
            user_id: "u1".to_string(),
            surah_no: 67,
            ayah_no: 4,
            repetition_count: 3,
            error_rate: 0.25,
        }
    }

    #[test]
    fn test_render_prompt_fills_every_field() {
        let prompt = render_prompt(&request());

        assert!(prompt.contains("User ID: u1"));
        assert!(prompt.contains("Surah Number: 67"));
        assert!(prompt.contains("Ayah Number: 4"));
        assert!(prompt.contains("Repetition Count: 3"));
        assert!(prompt.contains("Error Rate: 0.25"));
        assert!(!prompt.contains("{{"));
    }

    #[test]
    fn test_request_serializes_camel_case() {
        let json = serde_json::to_value(request()).unwrap();
        assert_eq!(json["surahNo"], 67);
        assert_eq!(json["repetitionCount"], 3);
        assert_eq!(json["errorRate"], 0.25);
    }

    #[test]
    fn test_provider_parses_feedback() {
        let server = TestServer::spawn(vec![(
            "/feedback",
            200,
            r#"{"difficultVerses":[2,4],"recommendedStrategies":["Listen before reciting"],"progressPercentage":40.5}"#
                .to_string(),
        )]);
        let provider = HttpFeedbackProvider::new(format!("{}/feedback", server.base_url));

        let feedback = provider.request(&request()).unwrap();

        assert_eq!(feedback.difficult_verses, vec![2, 4]);
        assert_eq!(feedback.recommended_strategies.len(), 1);
        assert_eq!(feedback.progress_percentage, 40.5);

        let sent = &server.requests()[0];
        assert!(sent.contains("\"prompt\""));
        assert!(sent.contains("\"ayahNo\":4"));
    }

    #[test]
    fn test_provider_rejects_wrong_shape() {
        let server = TestServer::spawn(vec![(
            "/feedback",
            200,
            r#"{"difficultVerses":"none"}"#.to_string(),
        )]);
        let provider = HttpFeedbackProvider::new(format!("{}/feedback", server.base_url));

        assert_matches!(provider.request(&request()), Err(FeedbackError::Schema(_)));
    }

    #[test]
    fn test_provider_http_failure() {
        let server = TestServer::spawn(vec![]);
        let provider = HttpFeedbackProvider::new(format!("{}/feedback", server.base_url));

        assert_matches!(provider.request(&request()), Err(FeedbackError::Http(_)));
    }
}
