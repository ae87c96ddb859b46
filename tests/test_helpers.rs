// Copyright (C) 2023-2025 FeatureHub Contributors (https://www.featurehub.io/)
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
// http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
#![allow(dead_code)]

use std::sync::Once;
use std::time::Duration;

use featurehub_sse_client::responses::FeatureState;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::time;

pub const SDK_KEY: &str = "default/71ed3c04-122b-4312-9ea8-06b2b8d6ceac";

static LOGGER: Once = Once::new();

/// Installs a stderr logger once per test binary so `RUST_LOG`-free runs
/// still show client logs on failure.
pub fn init_logging() {
    LOGGER.call_once(|| {
        let _ = fern::Dispatch::new()
            .level(log::LevelFilter::Trace)
            .chain(std::io::stderr())
            .apply();
    });
}

pub fn feature_from_json(payload: &str) -> FeatureState {
    serde_json::from_str(payload).expect("feature payload should deserialize")
}

/// Polls `condition` until it holds or the timeout elapses.
pub async fn await_condition(condition: impl Fn() -> bool) {
    let deadline = time::Instant::now() + Duration::from_secs(5);
    while !condition() {
        assert!(
            time::Instant::now() < deadline,
            "condition not reached within 5s"
        );
        time::sleep(Duration::from_millis(10)).await;
    }
}

/// A minimal in-process SSE endpoint. Every accepted connection receives the
/// given frames, then the connection is held open until the server task is
/// dropped. Returns the address to use as the client's server address.
pub async fn spawn_sse_server(frames: Vec<(String, String)>) -> String {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("should bind an ephemeral port");
    let address = format!("http://{}", listener.local_addr().expect("bound address"));

    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                return;
            };
            let frames = frames.clone();
            tokio::spawn(async move {
                // Drain the request head before responding.
                let mut buffer = [0u8; 4096];
                let _ = socket.read(&mut buffer).await;

                let mut response = String::from(
                    "HTTP/1.1 200 OK\r\n\
                     Content-Type: text/event-stream\r\n\
                     Cache-Control: no-cache\r\n\
                     Connection: keep-alive\r\n\r\n",
                );
                for (event, data) in &frames {
                    response.push_str(&format!("event: {event}\n"));
                    // Multi-line payloads become one data: field per line;
                    // the SSE parser joins them back with newlines.
                    for line in data.lines() {
                        response.push_str(&format!("data: {line}\n"));
                    }
                    response.push('\n');
                }
                if socket.write_all(response.as_bytes()).await.is_err() {
                    return;
                }
                let _ = socket.flush().await;
                // Keep the stream open; SSE connections are long-lived.
                time::sleep(Duration::from_secs(60)).await;
            });
        }
    });

    address
}
