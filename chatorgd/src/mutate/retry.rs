use std::time::Duration;

use chatorg_core::{ApiError, ApiErrorClass};
use rand::Rng;
use serde::Serialize;
use tokio::time::Instant;

use super::MutationOp;
use crate::pacing::Jitter;
use crate::progress::millis;
use crate::remote::RemoteApi;

pub const MAX_ATTEMPTS: u32 = 3;

const EXHAUSTED: &str = "Retry loop exhausted";
const BACKOFF_JITTER: Jitter = Jitter::between_ms(0, 400);

/// How a failed attempt is treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryClass {
    RateLimited,
    Server,
    Network,
    /// Any other status; returned to the caller at once.
    Fatal,
}

impl RetryClass {
    pub fn of(err: &ApiError) -> Self {
        match err.classification() {
            ApiErrorClass::RateLimit => RetryClass::RateLimited,
            ApiErrorClass::Server => RetryClass::Server,
            ApiErrorClass::Network => RetryClass::Network,
            ApiErrorClass::Rejected => RetryClass::Fatal,
        }
    }

    /// Retrying is allowed while the failed attempt number is below this.
    pub fn attempt_cap(self) -> u32 {
        match self {
            RetryClass::RateLimited => 3,
            RetryClass::Server | RetryClass::Network => 2,
            RetryClass::Fatal => 0,
        }
    }

    pub fn should_retry(self, attempt: u32) -> bool {
        attempt < self.attempt_cap().min(MAX_ATTEMPTS)
    }

    fn window(self) -> Option<Jitter> {
        match self {
            RetryClass::RateLimited => Some(Jitter::between_ms(5000, 15000)),
            RetryClass::Server => Some(Jitter::between_ms(2000, 5000)),
            RetryClass::Network => Some(Jitter::between_ms(1000, 3000)),
            RetryClass::Fatal => None,
        }
    }

    pub fn backoff(self) -> Option<Duration> {
        let mut rng = rand::thread_rng();
        self.backoff_with_rng(&mut rng)
    }

    pub fn backoff_with_rng<R: Rng + ?Sized>(self, rng: &mut R) -> Option<Duration> {
        let window = self.window()?;
        Some(window.delay_with_rng(rng) + BACKOFF_JITTER.delay_with_rng(rng))
    }
}

/// Terminal result of one id's mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RetryOutcome {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub attempt: u32,
    /// Wall clock of the final attempt alone.
    pub elapsed_ms: u64,
}

impl RetryOutcome {
    pub(crate) fn missing_id() -> Self {
        Self {
            ok: false,
            status: None,
            error: Some("Missing id".to_string()),
            attempt: 1,
            elapsed_ms: 0,
        }
    }
}

pub struct RetryableMutator<'a, A> {
    api: &'a A,
}

impl<'a, A: RemoteApi> RetryableMutator<'a, A> {
    pub fn new(api: &'a A) -> Self {
        Self { api }
    }

    pub async fn mutate(&self, op: &MutationOp, id: &str) -> RetryOutcome {
        let mut last_status = None;
        let mut last_elapsed_ms = 0;

        for attempt in 1..=MAX_ATTEMPTS {
            let started = Instant::now();
            let result = op.apply(self.api, id).await;
            let elapsed_ms = millis(started.elapsed());

            let err = match result {
                Ok(status) => {
                    return RetryOutcome {
                        ok: true,
                        status: Some(status),
                        error: None,
                        attempt,
                        elapsed_ms,
                    };
                }
                Err(err) => err,
            };

            let class = RetryClass::of(&err);
            let backoff = if class.should_retry(attempt) {
                class.backoff()
            } else {
                None
            };
            let Some(backoff) = backoff else {
                return RetryOutcome {
                    ok: false,
                    status: err.status(),
                    error: Some(err.to_string()),
                    attempt,
                    elapsed_ms,
                };
            };

            tracing::warn!(
                op = %op.kind(),
                id,
                attempt,
                status = err.status(),
                ?class,
                backoff_ms = millis(backoff),
                "mutation failed, retrying"
            );
            last_status = err.status();
            last_elapsed_ms = elapsed_ms;
            tokio::time::sleep(backoff).await;
        }

        RetryOutcome {
            ok: false,
            status: last_status,
            error: Some(EXHAUSTED.to_string()),
            attempt: MAX_ATTEMPTS,
            elapsed_ms: last_elapsed_ms,
        }
    }
}
