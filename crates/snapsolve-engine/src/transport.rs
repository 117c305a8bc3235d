use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;

use reqwest::blocking::Client as HttpClient;
use reqwest::header::AUTHORIZATION;
use serde_json::Value;

use crate::cancel::CancelToken;
use crate::error::SolveError;

const CANCEL_POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: u16,
    pub body: String,
}

impl TransportResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }
}

/// One JSON POST against the backend. Implementations enforce `timeout`
/// and must resolve to `SolveError::Canceled` once `cancel` fires.
pub trait Transport: Send + Sync {
    fn post_json(
        &self,
        url: &str,
        payload: &Value,
        timeout: Duration,
        cancel: &CancelToken,
    ) -> Result<TransportResponse, SolveError>;
}

/// Blocking reqwest transport.
///
/// The request runs on a short-lived `snapsolve-http` worker thread so the
/// caller can stop waiting as soon as the token is canceled. reqwest cannot
/// abort a blocking send, so a canceled worker stays alive until the server
/// answers or the request timeout passed to `post_json` elapses. Its late
/// result is dropped. `in_flight` counts workers that have not exited yet.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    http: HttpClient,
    api_key: Option<String>,
    in_flight: Arc<AtomicUsize>,
}

/// Decrements the worker count when a request thread exits.
struct InFlight(Arc<AtomicUsize>);

impl InFlight {
    fn enter(counter: &Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(Arc::clone(counter))
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl HttpTransport {
    pub fn new(api_key: Option<String>) -> Self {
        Self {
            http: HttpClient::new(),
            api_key: api_key
                .map(|key| key.trim().to_string())
                .filter(|key| !key.is_empty()),
            in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Request threads still running, including ones whose caller gave up.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }
}

impl Transport for HttpTransport {
    fn post_json(
        &self,
        url: &str,
        payload: &Value,
        timeout: Duration,
        cancel: &CancelToken,
    ) -> Result<TransportResponse, SolveError> {
        cancel.check()?;

        let mut request = self.http.post(url).timeout(timeout).json(payload);
        if let Some(api_key) = self.api_key.as_deref() {
            request = request.header(AUTHORIZATION, format!("Bearer {api_key}"));
        }

        let (tx, rx) = mpsc::channel();
        let worker = InFlight::enter(&self.in_flight);
        thread::Builder::new()
            .name("snapsolve-http".to_string())
            .spawn(move || {
                let _worker = worker;
                let outcome = request.send().and_then(|response| {
                    let status = response.status().as_u16();
                    response
                        .text()
                        .map(|body| TransportResponse { status, body })
                });
                let _ = tx.send(outcome);
            })
            .map_err(|err| SolveError::Network(format!("request thread spawn failed: {err}")))?;

        loop {
            if cancel.is_canceled() {
                return Err(SolveError::Canceled);
            }
            match rx.recv_timeout(CANCEL_POLL_INTERVAL) {
                Ok(Ok(response)) => return Ok(response),
                Ok(Err(err)) => {
                    if cancel.is_canceled() {
                        return Err(SolveError::Canceled);
                    }
                    return Err(classify_reqwest_error(url, &err));
                }
                Err(mpsc::RecvTimeoutError::Timeout) => continue,
                Err(mpsc::RecvTimeoutError::Disconnected) => {
                    return Err(SolveError::Network(format!(
                        "request worker for {url} exited without a response"
                    )));
                }
            }
        }
    }
}

fn classify_reqwest_error(url: &str, err: &reqwest::Error) -> SolveError {
    if err.is_timeout() {
        return SolveError::Timeout(format!("{url}: {err}"));
    }
    if err.is_connect() || err.is_request() || err.is_body() {
        return SolveError::Network(format!("{url}: {err}"));
    }
    if err.is_decode() {
        return SolveError::Decode {
            route: url.to_string(),
            message: err.to_string(),
        };
    }
    SolveError::Unknown(format!("{url}: {err}"))
}
