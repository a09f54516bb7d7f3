use chrono::Utc;
use motion_monitor_common::frame::Frame;
use std::time::Duration;
use tracing::{debug, info};

use super::{conform, FrameSource, SourceError};

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Camera exposed as an HTTP snapshot endpoint: every GET returns one JPEG.
pub struct HttpSnapshotSource {
    url: String,
    width: u32,
    height: u32,
    warmup: Duration,
    request_timeout: Duration,
    client: Option<reqwest::Client>,
    seq: u64,
}

impl HttpSnapshotSource {
    pub fn new(url: impl Into<String>, width: u32, height: u32, warmup: Duration) -> Self {
        Self {
            url: url.into(),
            width,
            height,
            warmup,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            client: None,
            seq: 0,
        }
    }

    /// Bound every snapshot request. A camera that stalls past this fails
    /// the fetch instead of blocking the loop.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    async fn fetch(&self, client: &reqwest::Client) -> Result<Vec<u8>, SourceError> {
        let resp = client
            .get(&self.url)
            .send()
            .await
            .map_err(SourceError::HttpFetch)?;
        if !resp.status().is_success() {
            return Err(SourceError::HttpStatus(resp.status().as_u16()));
        }
        let body = resp.bytes().await.map_err(SourceError::HttpFetch)?;
        Ok(body.to_vec())
    }
}

impl FrameSource for HttpSnapshotSource {
    async fn start(&mut self) -> Result<(), SourceError> {
        let client = reqwest::Client::builder()
            .connect_timeout(self.request_timeout.min(DEFAULT_REQUEST_TIMEOUT))
            .timeout(self.request_timeout)
            .build()
            .map_err(SourceError::HttpClient)?;

        info!(url = self.url, "connecting to camera");
        // A camera that cannot serve one frame now is a startup failure.
        let probe = self.fetch(&client).await?;
        Frame::decode(&probe, Utc::now().timestamp_millis(), 0)?;

        if !self.warmup.is_zero() {
            debug!(warmup = ?self.warmup, "waiting for camera warm-up");
            tokio::time::sleep(self.warmup).await;
        }

        self.client = Some(client);
        info!(
            url = self.url,
            width = self.width,
            height = self.height,
            "camera started"
        );
        Ok(())
    }

    async fn capture(&mut self) -> Result<Frame, SourceError> {
        let client = self.client.as_ref().ok_or(SourceError::NotStarted)?;
        let body = self.fetch(client).await?;

        let seq = self.seq;
        self.seq += 1;
        let frame = Frame::decode(&body, Utc::now().timestamp_millis(), seq)?;
        debug!(seq, bytes = body.len(), "captured frame");
        Ok(conform(frame, self.width, self.height))
    }

    async fn stop(&mut self) {
        if self.client.take().is_some() {
            info!(url = self.url, "camera released");
        }
    }

    fn name(&self) -> &str {
        "http"
    }
}
