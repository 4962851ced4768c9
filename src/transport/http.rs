//! Thin HTTP layer over `reqwest`.
//!
//! One client per `LlmClient`, timeout set once at construction and applied
//! uniformly to every call (primary request, downgrade retry, repair
//! request). Dropping the enclosing future aborts the in-flight call.

use std::time::Duration;

use serde_json::Value;

use crate::transport::validate::checked_json;
use crate::Result;

pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }

    /// GET a URL and run the response through the shape checks.
    pub async fn get_json(
        &self,
        url: &str,
        headers: &[(&'static str, String)],
        context: &str,
    ) -> Result<Value> {
        let mut req = self.client.get(url);
        for (name, value) in headers {
            req = req.header(*name, value);
        }
        let resp = req.send().await?;
        checked_json(resp, context).await
    }

    /// POST a JSON body and run the response through the shape checks.
    pub async fn post_json(
        &self,
        url: &str,
        headers: &[(&'static str, String)],
        body: &Value,
        context: &str,
    ) -> Result<Value> {
        let mut req = self.client.post(url).json(body);
        for (name, value) in headers {
            req = req.header(*name, value);
        }
        let resp = req.send().await?;
        checked_json(resp, context).await
    }
}
