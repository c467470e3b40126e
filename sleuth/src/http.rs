//! Shared plumbing for the HTTP API clients.

use anyhow::Error;
use serde::de::DeserializeOwned;
use std::time::Duration;
use surf::{RequestBuilder, Url};

const TIMEOUT: Duration = Duration::from_secs(30);

/// Build a client which resolves request paths relative to `base_url`.
pub(crate) fn client(base_url: &Url) -> Result<surf::Client, Error> {
    // Relative paths only join onto a base URL whose path ends in a slash.
    let mut base_url = base_url.clone();
    if !base_url.path().ends_with('/') {
        let path = format!("{}/", base_url.path());
        base_url.set_path(&path);
    }
    surf::Config::new()
        .set_base_url(base_url.clone())
        .set_timeout(Some(TIMEOUT))
        .try_into()
        .map_err(|err| Error::msg(format!("unable to create HTTP client for {base_url}: {err:?}")))
}

/// Send a request and parse the response body as JSON, failing on non-success statuses.
pub(crate) async fn recv_json<T: DeserializeOwned>(req: RequestBuilder) -> Result<T, Error> {
    let body = send(req).await?;
    serde_json::from_str(&body).map_err(|err| Error::msg(format!("malformed response: {err}")))
}

/// Send a request and return the response body, failing on non-success statuses.
pub(crate) async fn send(req: RequestBuilder) -> Result<String, Error> {
    let mut res = req.send().await.map_err(Error::msg)?;
    let body = res.body_string().await.map_err(Error::msg)?;
    if !res.status().is_success() {
        return Err(Error::msg(format!(
            "request failed with status {}: {}",
            res.status(),
            body.trim()
        )));
    }
    Ok(body)
}
