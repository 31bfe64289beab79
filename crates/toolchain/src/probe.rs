use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;
use vite_ssg_core::{Error, Result};

use crate::PreviewProcess;

const POLL_INTERVAL: Duration = Duration::from_millis(250);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(2);

/// Poll `url` until the server answers with any HTTP response.
///
/// Fails with `Error::ServerStart` when `timeout` passes first or when the
/// server process exits while we wait.
pub async fn wait_until_ready(
    url: &str,
    timeout: Duration,
    process: &mut dyn PreviewProcess,
) -> Result<()> {
    let client = reqwest::Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .build()
        .map_err(|e| Error::ServerStart(format!("Failed to build HTTP client: {}", e)))?;

    let deadline = Instant::now() + timeout;
    let mut attempts = 0u32;

    loop {
        if let Some(exit) = process.exited() {
            return Err(Error::ServerStart(exit));
        }

        attempts += 1;
        match client.get(url).send().await {
            Ok(response) => {
                debug!(url, status = %response.status(), attempts, "preview server ready");
                return Ok(());
            }
            Err(e) => debug!(url, error = %e, "preview server not ready yet"),
        }

        if Instant::now() + POLL_INTERVAL > deadline {
            return Err(Error::ServerStart(format!(
                "{} did not respond within {}s",
                url,
                timeout.as_secs()
            )));
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}
