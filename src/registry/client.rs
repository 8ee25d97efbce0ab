//! Registration Client
//!
//! Used by storage nodes to announce themselves to the coordinator.
//! Transport failures and 5xx answers are retried with exponential backoff;
//! any 4xx answer (for example a name conflict) is final.

use super::types::{ENDPOINT_REGISTER, RegisterRequest};
use crate::error::{Result, TransferError};

use reqwest::StatusCode;
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const INITIAL_DELAY_MS: u64 = 500;
const MAX_DELAY_MS: u64 = 8_000;

pub async fn register_with_coordinator(
    http_client: &reqwest::Client,
    coordinator_url: &str,
    request: &RegisterRequest,
    attempts: usize,
) -> Result<()> {
    let url = format!("{}{}", coordinator_url.trim_end_matches('/'), ENDPOINT_REGISTER);
    let attempts = attempts.max(1);
    let mut delay_ms = INITIAL_DELAY_MS;

    for attempt in 1..=attempts {
        let outcome = http_client
            .post(&url)
            .json(request)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await;

        let retryable = match outcome {
            Ok(resp) if resp.status().is_success() => {
                tracing::info!(
                    "Successfully registered with Transfer Service as {} at {}",
                    request.service_name,
                    request.grpc_address
                );
                return Ok(());
            }
            Ok(resp) => {
                let status = resp.status();
                let body = resp.text().await.unwrap_or_default();
                let err = rejection(status, body);
                if status.is_client_error() {
                    return Err(err);
                }
                err
            }
            Err(e) => TransferError::upstream("coordinator", e),
        };

        if attempt == attempts {
            return Err(retryable);
        }

        tracing::warn!(
            "Registration attempt {}/{} failed: {}. Retrying in {}ms",
            attempt,
            attempts,
            retryable,
            delay_ms
        );
        let jitter = rand::random::<u64>() % 100;
        tokio::time::sleep(Duration::from_millis(delay_ms + jitter)).await;
        delay_ms = (delay_ms * 2).min(MAX_DELAY_MS);
    }

    Err(TransferError::Unavailable("registration attempts exhausted".to_string()))
}

fn rejection(status: StatusCode, body: String) -> TransferError {
    match status {
        StatusCode::CONFLICT => TransferError::Conflict(body),
        s if s.is_client_error() => TransferError::BadRequest(body),
        s => TransferError::upstream("coordinator", format!("{}: {}", s, body)),
    }
}
