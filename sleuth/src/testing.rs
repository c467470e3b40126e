//! Helpers for testing HTTP clients against in-process mock servers.

use async_std::{
    net::TcpStream,
    task::{sleep, spawn},
};
use portpicker::pick_unused_port;
use serde_json::Value;
use std::time::Duration;
use surf::Url;
use tide::{Body, Response};

/// Start `app` on an unused local port and return its base URL once it accepts connections.
pub(crate) async fn serve<S: Clone + Send + Sync + 'static>(app: tide::Server<S>) -> Url {
    crate::init_logging();

    let port = pick_unused_port().unwrap();
    spawn(async move {
        if let Err(err) = app.listen(format!("127.0.0.1:{port}")).await {
            tracing::error!("mock server exited: {err}");
        }
    });
    wait_for_server(port).await;
    format!("http://127.0.0.1:{port}/").parse().unwrap()
}

/// A `200 OK` response with a JSON body.
pub(crate) fn json(value: Value) -> tide::Result<Response> {
    Ok(Body::from_json(&value)?.into())
}

async fn wait_for_server(port: u16) {
    const MAX_CONNECT_RETRIES: usize = 100;

    for _ in 0..MAX_CONNECT_RETRIES {
        match TcpStream::connect(("127.0.0.1", port)).await {
            Ok(_) => return,
            Err(err) => {
                tracing::debug!("waiting for mock server to start: {err}");
                sleep(Duration::from_millis(50)).await;
            }
        }
    }
    panic!("timed out waiting for mock server on port {port}");
}
