pub mod error;

pub use error::{DriverClientError, Result};

use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use threadwatch_common::{
    BrowserDriver, DriverError, Handle, PageFn, ScrollTarget, WaitPredicate,
};

/// Extra time on top of a wait-for timeout before the HTTP request gives up.
const WAIT_SLACK: Duration = Duration::from_secs(5);

/// Client for one session on a browser-driver sidecar.
///
/// The sidecar owns the real browser and the page scripts behind each
/// [`PageFn`]; this client only ships names, args and handles over JSON.
pub struct DriverClient {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

#[derive(Deserialize)]
struct ValueResponse {
    #[serde(default)]
    value: Value,
}

#[derive(Deserialize)]
struct WaitResponse {
    satisfied: bool,
}

#[derive(Deserialize)]
struct UrlResponse {
    url: String,
}

impl DriverClient {
    pub fn new(base_url: &str, token: Option<&str>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.map(String::from),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        let mut endpoint = format!("{}/session/{}", self.base_url, path);
        if let Some(ref token) = self.token {
            endpoint.push_str(&format!("?token={token}"));
        }
        endpoint
    }

    async fn post<T: DeserializeOwned>(
        &self,
        path: &str,
        body: Value,
        timeout: Option<Duration>,
    ) -> Result<T> {
        debug!(path, "driver request");
        let mut req = self
            .client
            .post(self.endpoint(path))
            .header("Content-Type", "application/json")
            .json(&body);
        if let Some(t) = timeout {
            req = req.timeout(t);
        }
        let resp = req.send().await?;

        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(DriverClientError::Api {
                status: status.as_u16(),
                message,
            });
        }

        Ok(resp.json().await?)
    }

    async fn post_empty(&self, path: &str, body: Value) -> Result<()> {
        let _: Value = self.post(path, body, None).await?;
        Ok(())
    }

    /// Run a named page function in the session.
    pub async fn evaluate_fn(&self, call: PageFn, args: Value) -> Result<Value> {
        let resp: ValueResponse = self
            .post("evaluate", json!({ "fn": call, "args": args }), None)
            .await?;
        Ok(resp.value)
    }

    pub async fn wait_until(&self, predicate: &WaitPredicate, timeout: Duration) -> Result<bool> {
        let resp: WaitResponse = self
            .post(
                "wait-for",
                json!({ "predicate": predicate, "timeoutMs": timeout.as_millis() as u64 }),
                Some(timeout + WAIT_SLACK),
            )
            .await?;
        Ok(resp.satisfied)
    }

    pub async fn click_handle(&self, handle: &Handle) -> Result<()> {
        self.post_empty("click", json!({ "handle": handle })).await
    }

    pub async fn scroll(&self, target: &ScrollTarget, delta: f64) -> Result<()> {
        self.post_empty("scroll", json!({ "target": target, "delta": delta }))
            .await
    }

    pub async fn url(&self) -> Result<String> {
        let resp = self.client.get(self.endpoint("url")).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(DriverClientError::Api {
                status: status.as_u16(),
                message,
            });
        }
        let body: UrlResponse = resp.json().await?;
        Ok(body.url)
    }

    pub async fn goto(&self, url: &str) -> Result<()> {
        self.post_empty("navigate", json!({ "url": url })).await
    }
}

#[async_trait]
impl BrowserDriver for DriverClient {
    async fn evaluate(
        &self,
        call: PageFn,
        args: Value,
    ) -> std::result::Result<Value, DriverError> {
        self.evaluate_fn(call, args)
            .await
            .map_err(|e| e.into_driver_error(call.as_str()))
    }

    async fn wait_for(
        &self,
        predicate: &WaitPredicate,
        timeout: Duration,
    ) -> std::result::Result<bool, DriverError> {
        self.wait_until(predicate, timeout)
            .await
            .map_err(|e| e.into_driver_error("wait_for"))
    }

    async fn click(&self, handle: &Handle) -> std::result::Result<(), DriverError> {
        self.click_handle(handle)
            .await
            .map_err(|e| e.into_driver_error("click"))
    }

    async fn scroll_by(
        &self,
        target: &ScrollTarget,
        delta: f64,
    ) -> std::result::Result<(), DriverError> {
        self.scroll(target, delta)
            .await
            .map_err(|e| e.into_driver_error("scroll"))
    }

    async fn current_url(&self) -> std::result::Result<String, DriverError> {
        self.url().await.map_err(|e| e.into_driver_error("url"))
    }

    async fn navigate(&self, url: &str) -> std::result::Result<(), DriverError> {
        self.goto(url)
            .await
            .map_err(|e| e.into_driver_error("navigate"))
    }
}
