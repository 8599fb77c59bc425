//! JSONL sink for `redrive`. Writes one pipeline event per line.
//! Always appends; bring your own path.
//!
//! Pointing this at durable storage gives operators an audit trail of dropped and exhausted
//! records that survives process restarts.

use redrive::telemetry::{event_to_json, PipelineEvent, RoutingEvent, TelemetrySink};
use std::io;
use std::path::PathBuf;
use std::pin::Pin;
use std::task::{Context, Poll};

#[derive(Clone, Debug)]
pub struct JsonlSink {
    path: PathBuf,
    routing_only: bool,
}

impl JsonlSink {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into(), routing_only: false }
    }

    /// Only write routing outcomes (redriven / exhausted / dropped).
    pub fn routing_only(mut self) -> Self {
        self.routing_only = true;
        self
    }

    fn accepts(&self, event: &PipelineEvent) -> bool {
        !self.routing_only || matches!(event, PipelineEvent::Routing(_))
    }
}

impl tower_service::Service<PipelineEvent> for JsonlSink {
    type Response = ();
    type Error = io::Error;
    type Future = Pin<Box<dyn std::future::Future<Output = Result<(), Self::Error>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, event: PipelineEvent) -> Self::Future {
        if !self.accepts(&event) {
            return Box::pin(async { Ok(()) });
        }
        if let PipelineEvent::Routing(RoutingEvent::Dropped { error_type, .. }) = &event {
            tracing::debug!(target: "redrive::jsonl", error_type = %error_type, "recording dropped record");
        }
        let path = self.path.clone();
        let line = event_to_json(&event).to_string() + "\n";
        Box::pin(async move {
            use tokio::io::AsyncWriteExt;
            let mut file =
                tokio::fs::OpenOptions::new().create(true).append(true).open(path).await?;
            file.write_all(line.as_bytes()).await?;
            file.flush().await?;
            Ok(())
        })
    }
}

impl TelemetrySink for JsonlSink {
    type SinkError = io::Error;
}
