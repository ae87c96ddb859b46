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

//! The SSE transport: subscribes to the edge's feature stream and forwards
//! framed events and transport errors onto a pair of channels consumed by
//! the dispatcher.

use eventsource_stream::Eventsource;
use futures::StreamExt;
use log::info;
use reqwest::header::ACCEPT;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::Error;

const EVENT_STREAM_CONTENT_TYPE: &str = "text/event-stream";
const CHANNEL_CAPACITY: usize = 64;

/// One framed server-sent event: the `event:` kind and its `data:` payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseFrame {
    pub event: String,
    pub data: String,
}

impl SseFrame {
    pub fn new(event: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            event: event.into(),
            data: data.into(),
        }
    }
}

/// Closes the subscription when asked; dropping the receivers alone would
/// leave the forwarding task parked on the HTTP stream.
pub struct StreamHandle {
    forwarder: JoinHandle<()>,
}

impl StreamHandle {
    /// Wraps an arbitrary task. Used where the frame channels are produced
    /// by something other than an HTTP subscription, such as a test feed.
    pub fn from_task(task: JoinHandle<()>) -> Self {
        Self { forwarder: task }
    }

    pub fn close(&self) {
        if !self.forwarder.is_finished() {
            info!("closing the feature stream");
            self.forwarder.abort();
        }
    }
}

impl Drop for StreamHandle {
    fn drop(&mut self) {
        self.forwarder.abort();
    }
}

/// An open subscription: the events channel, the errors channel, and the
/// handle that tears the stream down.
pub struct EventStream {
    pub events: mpsc::Receiver<SseFrame>,
    pub errors: mpsc::Receiver<Error>,
    pub handle: StreamHandle,
}

/// Performs the HTTP upgrade against `url` and spawns the forwarding task.
/// Events and stream errors arrive on separate channels; both channels close
/// when the server ends the stream or the handle is closed.
pub async fn subscribe(url: &str) -> Result<EventStream, Error> {
    let response = reqwest::Client::new()
        .get(url)
        .header(ACCEPT, EVENT_STREAM_CONTENT_TYPE)
        .send()
        .await
        .map_err(Error::transport)?;

    let status = response.status();
    if !status.is_success() {
        return Err(Error::transport(format!(
            "the server rejected the stream subscription with status {status}"
        )));
    }

    let (events_tx, events_rx) = mpsc::channel(CHANNEL_CAPACITY);
    let (errors_tx, errors_rx) = mpsc::channel(CHANNEL_CAPACITY);

    let mut stream = response.bytes_stream().eventsource();
    let forwarder = tokio::spawn(async move {
        while let Some(item) = stream.next().await {
            let delivered = match item {
                Ok(event) => events_tx
                    .send(SseFrame::new(event.event, event.data))
                    .await
                    .is_ok(),
                Err(error) => errors_tx.send(Error::transport(error)).await.is_ok(),
            };
            // The consumer side has been dropped; stop forwarding.
            if !delivered {
                break;
            }
        }
    });

    Ok(EventStream {
        events: events_rx,
        errors: errors_rx,
        handle: StreamHandle { forwarder },
    })
}
