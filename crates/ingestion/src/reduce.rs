//! GRIB reduction: fetch only the byte ranges of the wanted fields.

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{header, Client, StatusCode};
use std::time::Duration;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::{debug, info, instrument, warn};
use wx_common::IndexSelector;

use crate::config::FetchConfig;
use crate::error::{FetchError, IngestionError, Result};
use crate::idx::{select_ranges, ByteRange};

/// Remote file access used by the reducer and the worker.
#[async_trait]
pub trait UrlFetcher: Send + Sync {
    async fn get(&self, url: &str) -> std::result::Result<Bytes, FetchError>;

    /// Body of `url` restricted to `range`.
    async fn get_range(&self, url: &str, range: ByteRange)
        -> std::result::Result<Bytes, FetchError>;

    async fn exists(&self, url: &str) -> std::result::Result<bool, FetchError>;
}

/// [`UrlFetcher`] over HTTP with timeouts and bounded retry.
pub struct HttpFetcher {
    client: Client,
    config: FetchConfig,
}

impl HttpFetcher {
    pub fn new(config: FetchConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(config.connect_timeout)
            .pool_max_idle_per_host(4)
            .tcp_nodelay(true)
            .build()
            .map_err(|e| IngestionError::InvalidConfig(format!("HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    /// Send a GET (optionally ranged), retrying transient failures with
    /// exponential backoff.
    async fn fetch(
        &self,
        url: &str,
        range: Option<ByteRange>,
    ) -> std::result::Result<Bytes, FetchError> {
        let mut delays = retry_delays(&self.config);
        let mut attempt = 0;

        loop {
            let err = match self.fetch_once(url, range).await {
                Ok(body) => return Ok(body),
                Err(e) if e.is_transient() => e,
                Err(e) => return Err(e),
            };
            let Some(delay) = delays.next() else {
                return Err(err);
            };

            attempt += 1;
            warn!(
                error = %err,
                retry = attempt,
                max_retries = self.config.max_retries,
                delay_secs = delay.as_secs(),
                "Fetch failed, retrying"
            );
            tokio::time::sleep(delay).await;
        }
    }

    async fn fetch_once(
        &self,
        url: &str,
        range: Option<ByteRange>,
    ) -> std::result::Result<Bytes, FetchError> {
        let mut request = self.client.get(url);
        if let Some(range) = range {
            request = request.header(header::RANGE, range.http_range());
        }

        let response = request.send().await.map_err(|e| request_error(url, e))?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response.bytes().await.map_err(|e| request_error(url, e))?;

        // A server ignoring the Range header sends the whole file
        match range {
            Some(range) if status == StatusCode::OK => Ok(slice_range(body, range)),
            _ => Ok(body),
        }
    }
}

#[async_trait]
impl UrlFetcher for HttpFetcher {
    async fn get(&self, url: &str) -> std::result::Result<Bytes, FetchError> {
        self.fetch(url, None).await
    }

    async fn get_range(
        &self,
        url: &str,
        range: ByteRange,
    ) -> std::result::Result<Bytes, FetchError> {
        self.fetch(url, Some(range)).await
    }

    async fn exists(&self, url: &str) -> std::result::Result<bool, FetchError> {
        let response = self
            .client
            .head(url)
            .send()
            .await
            .map_err(|e| request_error(url, e))?;
        Ok(response.status().is_success())
    }
}

fn request_error(url: &str, e: reqwest::Error) -> FetchError {
    FetchError::Request {
        url: url.to_string(),
        reason: e.to_string(),
    }
}

fn slice_range(body: Bytes, range: ByteRange) -> Bytes {
    let len = body.len() as u64;
    let start = range.start.min(len) as usize;
    let end = (range.start + range.length).min(len) as usize;
    body.slice(start..end)
}

/// Outcome of one reduction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReduceStats {
    pub ranges: usize,
    pub fetched: usize,
    pub failed: usize,
    pub bytes_written: u64,
}

/// Write the ranges of `grib_url` holding the `selectors` fields to `sink`.
///
/// The index fetch must succeed. A failed range fetch is logged and
/// skipped; write errors on `sink` are returned. Both URLs are expected to
/// exist.
#[instrument(skip(fetcher, selectors, sink), fields(url = %grib_url))]
pub async fn reduce<F, S, W>(
    fetcher: &F,
    grib_url: &str,
    idx_url: &str,
    selectors: &[S],
    sink: &mut W,
) -> Result<ReduceStats>
where
    F: UrlFetcher + ?Sized,
    S: AsRef<IndexSelector>,
    W: AsyncWrite + Unpin + ?Sized,
{
    let index = fetcher.get(idx_url).await?;
    let index = String::from_utf8_lossy(&index);
    let ranges = select_ranges(&index, selectors);
    debug!(ranges = ranges.len(), "Selected byte ranges");

    let mut stats = ReduceStats {
        ranges: ranges.len(),
        ..Default::default()
    };

    for range in ranges {
        let data = match fetcher.get_range(grib_url, range).await {
            Ok(data) => data,
            Err(e) => {
                warn!(error = %e, range = %range.http_range(), "Unable to fetch GRIB range, continuing");
                stats.failed += 1;
                continue;
            }
        };

        sink.write_all(&data).await?;
        stats.fetched += 1;
        stats.bytes_written += data.len() as u64;
    }

    sink.flush().await?;

    info!(
        fetched = stats.fetched,
        failed = stats.failed,
        bytes = stats.bytes_written,
        "Reduced GRIB file"
    );
    Ok(stats)
}

/// Delays between attempts: doubling from the initial delay, capped, at
/// most `max_retries` of them.
fn retry_delays(config: &FetchConfig) -> impl Iterator<Item = Duration> + '_ {
    std::iter::successors(Some(config.initial_retry_delay), move |d| {
        Some(std::cmp::min(*d * 2, config.max_retry_delay))
    })
    .take(config.max_retries as usize)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Serves an in-memory file; ranges listed in `failing` error out.
    struct FakeFetcher {
        files: HashMap<String, Bytes>,
        failing: Vec<u64>,
        requests: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl UrlFetcher for FakeFetcher {
        async fn get(&self, url: &str) -> std::result::Result<Bytes, FetchError> {
            self.requests.lock().unwrap().push(url.to_string());
            self.files.get(url).cloned().ok_or(FetchError::Status {
                url: url.to_string(),
                status: 404,
            })
        }

        async fn get_range(
            &self,
            url: &str,
            range: ByteRange,
        ) -> std::result::Result<Bytes, FetchError> {
            self.requests.lock().unwrap().push(range.http_range());
            if self.failing.contains(&range.start) {
                return Err(FetchError::Request {
                    url: url.to_string(),
                    reason: "connection reset".into(),
                });
            }
            let body = self.get(url).await?;
            Ok(slice_range(body, range))
        }

        async fn exists(&self, url: &str) -> std::result::Result<bool, FetchError> {
            Ok(self.files.contains_key(url))
        }
    }

    fn fixture(failing: Vec<u64>) -> FakeFetcher {
        let grib: Vec<u8> = (0..40u8).collect();
        let index = "\
1:0:d=1:A:L:x:
2:10:d=1:B:L:x:
3:20:d=1:A:L:x:
4:30:d=1:A:L:x:
5:35:d=1:B:L:x:
";
        let mut files = HashMap::new();
        files.insert("grib".to_string(), Bytes::from(grib));
        files.insert("idx".to_string(), Bytes::from(index));
        FakeFetcher {
            files,
            failing,
            requests: Mutex::new(Vec::new()),
        }
    }

    #[tokio::test]
    async fn test_reduce_concatenates_ranges() {
        let fetcher = fixture(vec![]);
        let mut out = Vec::new();
        let stats = reduce(&fetcher, "grib", "idx", &[IndexSelector::new("A", "L")], &mut out)
            .await
            .unwrap();

        assert_eq!(stats.ranges, 3);
        assert_eq!(stats.fetched, 3);
        let expected: Vec<u8> = (0..10u8).chain(20..35).collect();
        assert_eq!(out, expected);
        assert!(fetcher
            .requests
            .lock()
            .unwrap()
            .contains(&"bytes=30-34".to_string()));
    }

    #[tokio::test]
    async fn test_failed_range_is_skipped() {
        let fetcher = fixture(vec![20]);
        let mut out = Vec::new();
        let stats = reduce(&fetcher, "grib", "idx", &[IndexSelector::new("A", "L")], &mut out)
            .await
            .unwrap();

        assert_eq!(stats.failed, 1);
        assert_eq!(stats.fetched, 2);
        let expected: Vec<u8> = (0..10u8).chain(30..35).collect();
        assert_eq!(out, expected);
    }

    #[tokio::test]
    async fn test_missing_index_is_an_error() {
        let fetcher = fixture(vec![]);
        let mut out = Vec::new();
        let err = reduce(&fetcher, "grib", "nope", &[IndexSelector::new("A", "L")], &mut out)
            .await
            .unwrap_err();
        assert!(matches!(err, IngestionError::Fetch(FetchError::Status { status: 404, .. })));
        assert!(out.is_empty());
    }

    #[test]
    fn test_slice_range_clamps() {
        let body = Bytes::from_static(b"0123456789");
        assert_eq!(&slice_range(body.clone(), ByteRange::new(2, 3))[..], b"234");
        assert_eq!(&slice_range(body.clone(), ByteRange::new(8, 10))[..], b"89");
        assert!(slice_range(body, ByteRange::new(20, 5)).is_empty());
    }

    #[test]
    fn test_backoff_is_bounded() {
        let config = FetchConfig {
            max_retries: 5,
            initial_retry_delay: Duration::from_secs(2),
            max_retry_delay: Duration::from_secs(10),
            ..Default::default()
        };
        let delays: Vec<u64> = retry_delays(&config).map(|d| d.as_secs()).collect();
        assert_eq!(delays, vec![2, 4, 8, 10, 10]);
    }
}
