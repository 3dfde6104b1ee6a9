use reqwest::blocking::{Client, Response};
use std::time::Duration;

use crate::constants::USER_AGENT;
use crate::error::{PipelineError, Result};

/// Blocking client shared by the Box and Slack adapters
pub fn build_client(timeout: Duration) -> Result<Client> {
    let client = Client::builder()
        .timeout(timeout)
        .user_agent(USER_AGENT)
        .build()?;
    Ok(client)
}

/// Pass successful responses through; turn any other status into the error
/// built by `to_error` from the status code and response body
pub fn check_status<F>(response: Response, to_error: F) -> Result<Response>
where
    F: FnOnce(u16, String) -> PipelineError,
{
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().unwrap_or_default();
    Err(to_error(status.as_u16(), truncate(&body, 500)))
}

fn truncate(body: &str, max_chars: usize) -> String {
    match body.char_indices().nth(max_chars) {
        Some((end, _)) => format!("{}…", &body[..end]),
        None => body.to_string(),
    }
}
