use std::time::Duration;

use serde_json::{json, Value};
use snapsolve_contracts::{ProblemInfo, SolutionSet};

use crate::cancel::CancelToken;
use crate::config::AppConfig;
use crate::error::{classify_message, classify_status, SolveError};
use crate::retry::RetryPolicy;
use crate::transport::{HttpTransport, Transport, TransportResponse};

pub const EXTRACT_ROUTE: &str = "/api/extract";
pub const GENERATE_ROUTE: &str = "/api/generate";
pub const DEBUG_ROUTE: &str = "/api/debug";

const ERROR_BODY_MAX_CHARS: usize = 512;

/// The three backend calls the pipeline is built from.
pub trait ProblemSolver: Send + Sync {
    fn extract(&self, image_data: &[String], cancel: &CancelToken)
        -> Result<ProblemInfo, SolveError>;

    fn generate(&self, problem: &ProblemInfo, cancel: &CancelToken)
        -> Result<SolutionSet, SolveError>;

    fn debug(
        &self,
        image_data: &[String],
        problem: &ProblemInfo,
        cancel: &CancelToken,
    ) -> Result<SolutionSet, SolveError>;
}

/// JSON-over-HTTP client for the solving backend.
#[derive(Debug, Clone)]
pub struct SolverClient<T: Transport = HttpTransport> {
    api_base: String,
    language: String,
    timeout: Duration,
    retry: RetryPolicy,
    transport: T,
}

impl SolverClient<HttpTransport> {
    pub fn from_config(config: &AppConfig) -> Self {
        Self::with_transport(config, HttpTransport::new(config.api_key.clone()))
    }
}

impl<T: Transport> SolverClient<T> {
    pub fn with_transport(config: &AppConfig, transport: T) -> Self {
        Self {
            api_base: config.api_base(),
            language: config.language.clone(),
            timeout: config.request_timeout(),
            retry: config.retry_policy(),
            transport,
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    fn endpoint(&self, route: &str) -> String {
        format!("{}{}", self.api_base, route)
    }

    fn post(&self, route: &str, payload: &Value, cancel: &CancelToken) -> Result<Value, SolveError> {
        let url = self.endpoint(route);
        self.retry.run(cancel, route, |attempt| {
            tracing::debug!(route, attempt, "posting to backend");
            let response = self
                .transport
                .post_json(&url, payload, self.timeout, cancel)?;
            parse_response(route, response)
        })
    }
}

impl<T: Transport> ProblemSolver for SolverClient<T> {
    fn extract(
        &self,
        image_data: &[String],
        cancel: &CancelToken,
    ) -> Result<ProblemInfo, SolveError> {
        let payload = json!({
            "imageDataList": image_data,
            "language": self.language,
        });
        let body = self.post(EXTRACT_ROUTE, &payload, cancel)?;
        let problem = body
            .get("problemInfo")
            .cloned()
            .ok_or_else(|| SolveError::Decode {
                route: EXTRACT_ROUTE.to_string(),
                message: "missing problemInfo".to_string(),
            })?;
        serde_json::from_value(problem).map_err(|err| SolveError::Decode {
            route: EXTRACT_ROUTE.to_string(),
            message: err.to_string(),
        })
    }

    fn generate(
        &self,
        problem: &ProblemInfo,
        cancel: &CancelToken,
    ) -> Result<SolutionSet, SolveError> {
        let payload = json!({
            "problemInfo": problem,
            "language": self.language,
        });
        let body = self.post(GENERATE_ROUTE, &payload, cancel)?;
        decode_solution(GENERATE_ROUTE, body)
    }

    fn debug(
        &self,
        image_data: &[String],
        problem: &ProblemInfo,
        cancel: &CancelToken,
    ) -> Result<SolutionSet, SolveError> {
        let payload = json!({
            "imageDataList": image_data,
            "problemInfo": { "problemInfo": problem },
            "language": self.language,
        });
        let body = self.post(DEBUG_ROUTE, &payload, cancel)?;
        decode_solution(DEBUG_ROUTE, body)
    }
}

fn parse_response(route: &str, response: TransportResponse) -> Result<Value, SolveError> {
    let parsed: Option<Value> = serde_json::from_str(&response.body).ok();
    if !(200..300).contains(&response.status) {
        let message = parsed
            .as_ref()
            .and_then(error_message)
            .unwrap_or_else(|| truncate_text(response.body.trim(), ERROR_BODY_MAX_CHARS));
        return Err(classify_status(response.status, &message));
    }

    let body = parsed.ok_or_else(|| SolveError::Decode {
        route: route.to_string(),
        message: format!(
            "invalid JSON payload: {}",
            truncate_text(&response.body, ERROR_BODY_MAX_CHARS)
        ),
    })?;
    if body.get("success").and_then(Value::as_bool) == Some(false) {
        let message = error_message(&body).unwrap_or_else(|| format!("{route} reported failure"));
        return Err(classify_message(&message));
    }
    Ok(body)
}

fn decode_solution(route: &str, body: Value) -> Result<SolutionSet, SolveError> {
    let solution: SolutionSet = serde_json::from_value(body).map_err(|err| SolveError::Decode {
        route: route.to_string(),
        message: err.to_string(),
    })?;
    if solution.code.trim().is_empty() {
        return Err(SolveError::Decode {
            route: route.to_string(),
            message: "response contained no code".to_string(),
        });
    }
    Ok(solution)
}

fn error_message(body: &Value) -> Option<String> {
    ["error", "message", "detail"]
        .iter()
        .find_map(|key| match body.get(*key)? {
            Value::String(text) => Some(text.trim().to_string()),
            Value::Object(inner) => inner
                .get("message")
                .and_then(Value::as_str)
                .map(|text| text.trim().to_string()),
            _ => None,
        })
        .filter(|text| !text.is_empty())
}

fn truncate_text(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_string();
    }
    value.chars().take(max_chars).collect::<String>() + "…"
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::time::Duration;

    use serde_json::{json, Value};
    use snapsolve_contracts::ProblemInfo;

    use super::*;
    use crate::error::ErrorKind;

    /// Replays canned responses and records every request.
    #[derive(Default)]
    struct ScriptedTransport {
        responses: Mutex<VecDeque<Result<TransportResponse, SolveError>>>,
        requests: Mutex<Vec<(String, Value)>>,
    }

    impl ScriptedTransport {
        fn new(responses: Vec<Result<TransportResponse, SolveError>>) -> Self {
            Self {
                responses: Mutex::new(responses.into()),
                requests: Mutex::default(),
            }
        }

        fn request_count(&self) -> usize {
            self.requests.lock().unwrap().len()
        }

        fn last_request(&self) -> (String, Value) {
            self.requests.lock().unwrap().last().cloned().unwrap()
        }
    }

    impl Transport for ScriptedTransport {
        fn post_json(
            &self,
            url: &str,
            payload: &Value,
            _timeout: Duration,
            cancel: &CancelToken,
        ) -> Result<TransportResponse, SolveError> {
            cancel.check()?;
            self.requests
                .lock()
                .unwrap()
                .push((url.to_string(), payload.clone()));
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(SolveError::Unknown("script exhausted".to_string())))
        }
    }

    fn ok(body: Value) -> Result<TransportResponse, SolveError> {
        Ok(TransportResponse::new(200, body.to_string()))
    }

    fn status(code: u16, body: &str) -> Result<TransportResponse, SolveError> {
        Ok(TransportResponse::new(code, body))
    }

    fn client(responses: Vec<Result<TransportResponse, SolveError>>) -> SolverClient<ScriptedTransport> {
        let config = AppConfig {
            api_base: "http://backend.test/".to_string(),
            language: "rust".to_string(),
            ..AppConfig::default()
        };
        SolverClient::with_transport(&config, ScriptedTransport::new(responses))
            .with_retry_policy(RetryPolicy::new(2, Duration::from_millis(1)))
    }

    fn problem_body() -> Value {
        json!({"success": true, "problemInfo": {"title": "Two Sum", "description": "add"}})
    }

    #[test]
    fn extract_sends_images_and_language() {
        let client = client(vec![ok(problem_body())]);
        let images = vec!["aGVsbG8=".to_string()];

        let problem = client.extract(&images, &CancelToken::new()).unwrap();

        assert_eq!(problem.display_title(), "Two Sum");
        let (url, payload) = client.transport().last_request();
        assert_eq!(url, "http://backend.test/api/extract");
        assert_eq!(payload["imageDataList"], json!(["aGVsbG8="]));
        assert_eq!(payload["language"], json!("rust"));
    }

    #[test]
    fn extract_retries_twice_on_bad_gateway_then_succeeds() {
        let client = client(vec![
            status(502, "Bad Gateway"),
            status(502, "Bad Gateway"),
            ok(problem_body()),
        ]);

        let problem = client.extract(&[], &CancelToken::new()).unwrap();

        assert_eq!(problem.description, "add");
        assert_eq!(client.transport().request_count(), 3);
    }

    #[test]
    fn extract_surfaces_server_error_after_budget() {
        let client = client(vec![
            status(502, "Bad Gateway"),
            status(502, "Bad Gateway"),
            status(502, "Bad Gateway"),
            ok(problem_body()),
        ]);

        let err = client.extract(&[], &CancelToken::new()).unwrap_err();

        assert_eq!(err.kind(), ErrorKind::ServerError);
        assert_eq!(client.transport().request_count(), 3);
    }

    #[test]
    fn out_of_credits_payload_is_not_retried() {
        let client = client(vec![ok(
            json!({"success": false, "error": "API Key out of credits"}),
        )]);

        let err = client
            .generate(&ProblemInfo::default(), &CancelToken::new())
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::CreditsExhausted);
        assert_eq!(client.transport().request_count(), 1);
    }

    #[test]
    fn client_errors_are_not_retried() {
        let client = client(vec![status(
            400,
            r#"{"error": "Please close this window and re-enter a valid Open AI API key."}"#,
        )]);

        let err = client.extract(&[], &CancelToken::new()).unwrap_err();

        assert_eq!(err.kind(), ErrorKind::InvalidCredential);
        assert_eq!(client.transport().request_count(), 1);
    }

    #[test]
    fn timeouts_are_retried_then_surfaced() {
        let client = client(vec![
            Err(SolveError::Timeout("slow".to_string())),
            Err(SolveError::Timeout("slow".to_string())),
            Err(SolveError::Timeout("slow".to_string())),
        ]);

        let err = client.extract(&[], &CancelToken::new()).unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Timeout);
        assert_eq!(client.transport().request_count(), 3);
    }

    #[test]
    fn generate_wraps_problem_and_decodes_solution() {
        let client = client(vec![ok(json!({
            "success": true,
            "code": "fn main() {}",
            "thoughts": ["use a map"],
            "time_complexity": "O(n)",
            "space_complexity": "O(n)",
        }))]);
        let problem = ProblemInfo {
            description: "add".to_string(),
            ..ProblemInfo::default()
        };

        let solution = client.generate(&problem, &CancelToken::new()).unwrap();

        assert_eq!(solution.code, "fn main() {}");
        let (url, payload) = client.transport().last_request();
        assert!(url.ends_with(GENERATE_ROUTE));
        assert_eq!(payload["problemInfo"]["description"], json!("add"));
    }

    #[test]
    fn debug_nests_problem_and_reads_new_code() {
        let client = client(vec![ok(json!({
            "success": true,
            "new_code": "fixed()",
            "thoughts": [],
            "time_complexity": "O(1)",
            "space_complexity": "O(1)",
        }))]);

        let solution = client
            .debug(&["aQ==".to_string()], &ProblemInfo::default(), &CancelToken::new())
            .unwrap();

        assert_eq!(solution.code, "fixed()");
        let (url, payload) = client.transport().last_request();
        assert!(url.ends_with(DEBUG_ROUTE));
        assert!(payload["problemInfo"]["problemInfo"].is_object());
        assert_eq!(payload["imageDataList"], json!(["aQ=="]));
    }

    #[test]
    fn empty_solution_code_is_a_decode_error() {
        let client = client(vec![ok(json!({"success": true, "thoughts": []}))]);
        let err = client
            .generate(&ProblemInfo::default(), &CancelToken::new())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Decode);
    }

    #[test]
    fn canceled_token_never_reaches_transport() {
        let client = client(vec![ok(problem_body())]);
        let cancel = CancelToken::new();
        cancel.cancel();

        let err = client.extract(&[], &cancel).unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Canceled);
        assert_eq!(client.transport().request_count(), 0);
    }

    #[test]
    fn non_json_error_body_is_truncated_into_message() {
        let long_body = "x".repeat(600);
        let err = parse_response(EXTRACT_ROUTE, TransportResponse::new(418, long_body))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unknown);
        assert!(err.to_string().ends_with('…'));
    }
}
