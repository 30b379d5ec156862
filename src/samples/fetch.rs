// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
//! Retrieval of encoded sample bytes.

use std::path::Path;

use async_trait::async_trait;
use tracing::debug;

use crate::error::SamplerError;

/// Retrieves the encoded bytes behind a URL. Retry policy, if any, belongs to the fetcher.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, SamplerError>;
}

/// Reads a local file.
pub async fn read_file(path: &Path) -> Result<Vec<u8>, SamplerError> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| SamplerError::IoFailure(format!("{}: {}", path.display(), e)))?;
    debug!(path = ?path, bytes = bytes.len(), "Read sample file");
    Ok(bytes)
}

/// Serves `file://` URLs and plain paths from the local file system.
#[derive(Debug, Default, Clone)]
pub struct FileFetcher;

#[async_trait]
impl Fetcher for FileFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, SamplerError> {
        let path = url.strip_prefix("file://").unwrap_or(url);
        let path = urlencoding::decode(path)
            .map(|decoded| decoded.into_owned())
            .unwrap_or_else(|_| path.to_string());
        read_file(Path::new(&path)).await
    }
}

#[cfg(feature = "http")]
pub use self::http::HttpFetcher;

#[cfg(feature = "http")]
mod http {
    use std::time::Duration;

    use async_trait::async_trait;
    use tracing::{debug, warn};

    use super::Fetcher;
    use crate::config::Download;
    use crate::error::SamplerError;

    /// Downloads samples over HTTP, retrying failed attempts.
    #[derive(Debug, Clone)]
    pub struct HttpFetcher {
        client: reqwest::Client,
        /// Additional attempts after the first failure.
        retries: u32,
        retry_delay: Duration,
    }

    impl HttpFetcher {
        /// Creates a new fetcher with a per-request timeout.
        pub fn new(
            timeout: Duration,
            retries: u32,
            retry_delay: Duration,
        ) -> Result<HttpFetcher, SamplerError> {
            let client = reqwest::Client::builder()
                .timeout(timeout)
                .build()
                .map_err(|e| SamplerError::NetworkFailure(e.to_string()))?;
            Ok(HttpFetcher::with_client(client, retries, retry_delay))
        }

        /// Creates a fetcher that shares an existing client.
        pub fn with_client(client: reqwest::Client, retries: u32, retry_delay: Duration) -> HttpFetcher {
            HttpFetcher {
                client,
                retries,
                retry_delay,
            }
        }

        /// Creates a fetcher from the download configuration.
        pub fn from_config(config: &Download) -> Result<HttpFetcher, Box<dyn std::error::Error>> {
            Ok(HttpFetcher::new(
                config.timeout()?,
                config.retries(),
                config.retry_delay()?,
            )?)
        }

        async fn fetch_once(&self, url: &str) -> Result<Vec<u8>, SamplerError> {
            let response = self
                .client
                .get(url)
                .send()
                .await
                .map_err(|e| SamplerError::NetworkFailure(format!("{}: {}", url, e)))?;

            let status = response.status();
            if !status.is_success() {
                return Err(SamplerError::NetworkFailure(format!(
                    "{}: HTTP {}",
                    url, status
                )));
            }

            let bytes = response
                .bytes()
                .await
                .map_err(|e| SamplerError::NetworkFailure(format!("{}: {}", url, e)))?;
            Ok(bytes.to_vec())
        }
    }

    #[async_trait]
    impl Fetcher for HttpFetcher {
        async fn fetch(&self, url: &str) -> Result<Vec<u8>, SamplerError> {
            let mut attempt = 0;
            loop {
                match self.fetch_once(url).await {
                    Ok(bytes) => {
                        debug!(url, bytes = bytes.len(), attempt, "Downloaded sample");
                        return Ok(bytes);
                    }
                    Err(e) if attempt < self.retries => {
                        attempt += 1;
                        warn!(
                            url,
                            attempt,
                            retries = self.retries,
                            err = %e,
                            "Download failed, retrying"
                        );
                        tokio::time::sleep(self.retry_delay).await;
                    }
                    Err(e) => return Err(e),
                }
            }
        }
    }
}

#[cfg(test)]
mod test {
    use std::io::Write;

    use super::*;
    use crate::error::ErrorKind;

    #[tokio::test]
    async fn test_file_fetcher_reads_paths_and_file_urls() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"RIFF....").unwrap();
        let path = file.path().to_string_lossy().to_string();

        let fetcher = FileFetcher;
        assert_eq!(fetcher.fetch(&path).await.unwrap(), b"RIFF....");
        assert_eq!(
            fetcher.fetch(&format!("file://{}", path)).await.unwrap(),
            b"RIFF...."
        );
    }

    #[tokio::test]
    async fn test_file_fetcher_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.wav");
        let err = FileFetcher
            .fetch(&missing.to_string_lossy())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::IoFailure);
    }

    #[cfg(feature = "http")]
    #[tokio::test]
    async fn test_http_fetcher_unreachable_host() {
        use std::time::Duration;

        // Port 9 (discard) on localhost is closed on any sane test machine.
        let fetcher =
            HttpFetcher::new(Duration::from_secs(2), 1, Duration::from_millis(10)).unwrap();
        let err = fetcher
            .fetch("http://127.0.0.1:9/presets/kick.wav")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NetworkFailure);
    }
}
