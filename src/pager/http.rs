//! HTTP pager client.
//!
//! Sends `POST http://<host>:<port>/page` with the MRN as the plain-text body.

use super::{BoxFuture, Notifier};
use crate::error::{ClientError, Result};

/// Notifier that calls the hospital pager over HTTP.
#[derive(Clone)]
pub struct HttpPager {
    client: reqwest::Client,
    url: String,
}

impl HttpPager {
    /// Pager at `host:port`.
    pub fn new(host: &str, port: u16) -> Self {
        Self::with_url(format!("http://{}:{}/page", host, port))
    }

    /// Pager at an explicit URL.
    pub fn with_url(url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
        }
    }

    /// Target URL.
    pub fn url(&self) -> &str {
        &self.url
    }
}

impl Notifier for HttpPager {
    fn page(&self, mrn: &str) -> BoxFuture<'static, Result<()>> {
        let request = self.client.post(&self.url).body(mrn.to_string());
        let url = self.url.clone();

        Box::pin(async move {
            let response = request.send().await?;
            let status = response.status();
            if !status.is_success() {
                return Err(ClientError::Notifier(format!(
                    "pager at {} returned {}",
                    url, status
                )));
            }
            Ok(())
        })
    }
}
