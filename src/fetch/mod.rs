mod basic;
mod client;

pub use basic::BasicClient;
pub use client::HttpClient;

use std::io::Read;

use flate2::read::GzDecoder;
use tracing::debug;

use crate::error::{PipelineError, Result};

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// GETs `url` once. Any transport failure or non-success status is a
/// [`PipelineError::SourceUnavailable`].
pub async fn fetch_bytes<C: HttpClient + ?Sized>(client: &C, url: &str) -> Result<Vec<u8>> {
    let parsed = url
        .parse()
        .map_err(|e| PipelineError::unavailable(url, format!("invalid URL: {e}")))?;
    let req = reqwest::Request::new(reqwest::Method::GET, parsed);

    let resp = client
        .execute(req)
        .await
        .map_err(|e| PipelineError::unavailable(url, e))?;

    let status = resp.status();
    if !status.is_success() {
        return Err(PipelineError::unavailable(url, format!("HTTP status {status}")));
    }

    let bytes = resp
        .bytes()
        .await
        .map_err(|e| PipelineError::unavailable(url, e))?;
    Ok(bytes.to_vec())
}

/// Loads a source from a local file path or fetches it over HTTP, inflating
/// gzip payloads.
#[tracing::instrument(skip(client), fields(source = %location))]
pub async fn read_source<C: HttpClient + ?Sized>(client: &C, location: &str) -> Result<Vec<u8>> {
    let bytes = if is_remote(location) {
        fetch_bytes(client, location).await?
    } else {
        tokio::fs::read(location)
            .await
            .map_err(|e| PipelineError::unavailable(location, e))?
    };
    debug!(bytes = bytes.len(), "Source bytes received");

    if location.ends_with(".gz") || bytes.starts_with(&GZIP_MAGIC) {
        let mut inflated = Vec::new();
        GzDecoder::new(bytes.as_slice())
            .read_to_end(&mut inflated)
            .map_err(|e| PipelineError::unavailable(location, format!("gzip decode failed: {e}")))?;
        debug!(inflated = inflated.len(), "Source decompressed");
        return Ok(inflated);
    }

    Ok(bytes)
}

pub fn is_remote(location: &str) -> bool {
    location.starts_with("http://") || location.starts_with("https://")
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use flate2::Compression;
    use flate2::write::GzEncoder;
    use std::io::Write;

    struct CannedClient {
        status: u16,
        body: &'static str,
    }

    #[async_trait]
    impl HttpClient for CannedClient {
        async fn execute(&self, _req: reqwest::Request) -> reqwest::Result<reqwest::Response> {
            let resp = http::Response::builder()
                .status(self.status)
                .body(self.body)
                .unwrap();
            Ok(reqwest::Response::from(resp))
        }
    }

    #[tokio::test]
    async fn test_fetch_bytes_success() {
        let client = CannedClient {
            status: 200,
            body: "timestart,latstartl,lonstartl\n",
        };
        let bytes = fetch_bytes(&client, "https://example.test/day.csv")
            .await
            .unwrap();
        assert_eq!(bytes, b"timestart,latstartl,lonstartl\n");
    }

    #[tokio::test]
    async fn test_fetch_bytes_error_status() {
        let client = CannedClient {
            status: 404,
            body: "not found",
        };
        let err = fetch_bytes(&client, "https://example.test/missing.csv")
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::SourceUnavailable { .. }));
        assert!(err.to_string().contains("404"));
    }

    #[tokio::test]
    async fn test_fetch_bytes_invalid_url() {
        let client = CannedClient { status: 200, body: "" };
        let err = fetch_bytes(&client, "https://").await.unwrap_err();
        assert!(matches!(err, PipelineError::SourceUnavailable { .. }));
    }

    #[tokio::test]
    async fn test_read_source_missing_file() {
        let client = CannedClient { status: 200, body: "" };
        let err = read_source(&client, "/definitely/not/here.csv")
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::SourceUnavailable { .. }));
    }

    #[tokio::test]
    async fn test_read_source_inflates_gzip_file() {
        let path = format!(
            "{}/trip_start_explorer_test_source.csv.gz",
            std::env::temp_dir().display()
        );
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(b"timestart,latstartl,lonstartl\n").unwrap();
        std::fs::write(&path, encoder.finish().unwrap()).unwrap();

        let client = CannedClient { status: 500, body: "" };
        let bytes = read_source(&client, &path).await.unwrap();
        assert_eq!(bytes, b"timestart,latstartl,lonstartl\n");

        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_is_remote() {
        assert!(is_remote("https://raw.githubusercontent.com/x.csv"));
        assert!(is_remote("http://localhost/x.csv"));
        assert!(!is_remote("data/x.csv"));
    }
}
