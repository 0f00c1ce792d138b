//! # Transport Abstraction Module
//!
//! The network round trip sits behind the [`Transport`] trait so the query engine can be
//! driven by the real HTTP client or by any in-memory implementation.
//!
//! ## Features
//!
//! - **Single attempt**: one request per call, no retry
//! - **Fixed timeouts**: a connect timeout and a whole-request timeout are set once when the
//!   client is built
//! - **Gateway aware**: JSON gateway rejections are turned into remote errors
//! - **Downloads**: raw files are written to local paths, creating parent directories

use crate::error::{DaasError, DaasResult};
use crate::wire::check_gateway;
use log::debug;
use reqwest::Url;
use std::path::Path;
use std::time::Duration;
use tokio::fs;

/// Trait defining one round trip to the service
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    /// Sends a GET request and returns the response body.
    ///
    /// # Errors
    /// Returns `DaasError::Transport` when the request cannot be completed and
    /// `DaasError::RemoteQuery` when the gateway rejected the call.
    async fn fetch(&self, url: &Url) -> DaasResult<Vec<u8>>;

    /// Fetches `url` and stores the body at `dest`, returning the number of bytes written.
    async fn download(&self, url: &Url, dest: &Path) -> DaasResult<u64> {
        let data = self.fetch(url).await?;
        write_local(dest, &data).await?;
        Ok(data.len() as u64)
    }
}

/// Writes `data` to `path`, creating parent directories if they don't exist.
pub async fn write_local(path: &Path, data: &[u8]) -> DaasResult<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).await?;
    }
    fs::write(path, data).await?;
    debug!("Wrote {} bytes to {}", data.len(), path.display());
    Ok(())
}

/// HTTP transport built on `reqwest`
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    /// `request_timeout` bounds a whole call, body included, not a single read.
    pub fn new(conn_timeout: Duration, request_timeout: Duration) -> DaasResult<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(conn_timeout)
            .timeout(request_timeout)
            .build()?;
        Ok(HttpTransport { client })
    }
}

#[async_trait::async_trait]
impl Transport for HttpTransport {
    async fn fetch(&self, url: &Url) -> DaasResult<Vec<u8>> {
        let response = self.client.get(url.clone()).send().await?;
        let status = response.status();
        let body = response.bytes().await?.to_vec();
        check_gateway(&body)?;
        if !status.is_success() {
            return Err(DaasError::Transport(format!(
                "HTTP {} from {}",
                status,
                url.host_str().unwrap_or("?")
            )));
        }
        Ok(body)
    }
}
