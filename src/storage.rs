use std::time::Duration;

use reqwest::blocking::Client;

use crate::error::{AgentError, AgentResult};
use crate::remote::PhotoStorage;


const UPLOAD_TIMEOUT: u64 = 60; // seconds


/// Uploads photos to the hosted object storage REST endpoint.
pub struct HttpPhotoStorage {
    client: Client,
    base_url: String,
    bucket: String,
    api_key: String,
}

impl HttpPhotoStorage {
    pub fn new(base_url: &str, bucket: &str, api_key: &str) -> AgentResult<Self> {
        let client = Client::builder()
            .timeout(Duration::new(UPLOAD_TIMEOUT, 0))
            .build()?;

        Ok(HttpPhotoStorage {
            client,
            base_url: base_url.trim_end_matches('/').to_owned(),
            bucket: bucket.to_owned(),
            api_key: api_key.to_owned(),
        })
    }

    fn object_url(&self, path: &str) -> String {
        format!("{}/storage/v1/object/{}/{}", self.base_url, self.bucket, path)
    }
}

impl PhotoStorage for HttpPhotoStorage {
    fn upload(&self, path: &str, content_type: &str, bytes: Vec<u8>) -> AgentResult<String> {
        let res = self.client.post(&self.object_url(path))
            .bearer_auth(&self.api_key)
            .header("apikey", &self.api_key)
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .header("x-upsert", "false")
            .body(bytes)
            .send()?;

        let status = res.status();
        if status.is_success() {
            Ok(path.to_owned())
        }
        else {
            let body = res.text().unwrap_or_default();
            Err(AgentError::Remote(format!("photo upload failed ({}): {}", status, body)))
        }
    }
}
