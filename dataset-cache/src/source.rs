// Copyright (c) James Kassemi, SC, US. All rights reserved.
use async_compression::tokio::bufread::{GzipDecoder, ZlibDecoder};
use async_trait::async_trait;
use bytes::Bytes;
use log::info;
use reqwest::{Client, StatusCode};
use tokio::io::AsyncReadExt;

use crate::DatasetError;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Where the compressed snapshot comes from.
#[async_trait]
pub trait SnapshotSource: Send + Sync + 'static {
    /// Fetch the compressed snapshot blob.
    async fn fetch(&self) -> Result<Bytes, DatasetError>;

    fn describe(&self) -> String;
}

/// Fetches the published snapshot over HTTP.
#[derive(Clone)]
pub struct HttpSnapshotSource {
    client: Client,
    url: String,
}

impl HttpSnapshotSource {
    pub fn new(client: Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }
}

#[async_trait]
impl SnapshotSource for HttpSnapshotSource {
    async fn fetch(&self) -> Result<Bytes, DatasetError> {
        info!("fetching bills snapshot from {}", self.url);
        let resp = self.client.get(&self.url).send().await?;
        check_status(resp.status(), &self.url)?;
        Ok(resp.bytes().await?)
    }

    fn describe(&self) -> String {
        self.url.clone()
    }
}

fn check_status(status: StatusCode, url: &str) -> Result<(), DatasetError> {
    if status.is_success() {
        return Ok(());
    }
    Err(DatasetError::Status {
        status: status.as_u16(),
        url: url.to_string(),
    })
}

/// Inflate a gzip or zlib blob, picked by its header.
pub async fn decompress(compressed: &[u8]) -> Result<Vec<u8>, DatasetError> {
    let mut out = Vec::with_capacity(compressed.len() * 4);
    if compressed.starts_with(&GZIP_MAGIC) {
        GzipDecoder::new(compressed)
            .read_to_end(&mut out)
            .await
            .map_err(DatasetError::Decompress)?;
    } else {
        ZlibDecoder::new(compressed)
            .read_to_end(&mut out)
            .await
            .map_err(DatasetError::Decompress)?;
    }
    Ok(out)
}
