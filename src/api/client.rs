use std::net::SocketAddr;
use std::time::Duration;

use log::{debug, warn};
use reqwest::Client as HttpClient;
use serde_json::Value;
use tokio::net::TcpStream;
use url::{Host, Url};

use crate::api::error::ApiError;
use crate::api::models::{Message, SendMessageRequest, Snapshot, decode_record, decode_snapshot};

const PROBE_TIMEOUT: Duration = Duration::from_secs(3);

pub struct ApiClient {
    http: HttpClient,
    base_api: Url,
}

impl ApiClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ApiError> {
        let http = HttpClient::builder().timeout(timeout).build()?;
        let base_api = Url::parse(&Self::base_api(base_url))?;
        Ok(Self { http, base_api })
    }

    /// `http://host:8000` and `http://host:8000/api/` both become `http://host:8000/api/`.
    fn base_api(base_url: &str) -> String {
        let trimmed = base_url.trim().trim_end_matches('/');
        if trimmed.ends_with("/api") { format!("{}/", trimmed) } else { format!("{}/api/", trimmed) }
    }

    fn endpoint(&self, path: &str) -> Result<Url, ApiError> {
        Ok(self.base_api.join(path)?)
    }

    /// Fetch the full message list. Each record is decoded on its own so one bad
    /// entry does not cost the whole snapshot.
    pub async fn messages(&self) -> Result<Snapshot, ApiError> {
        let endpoint = self.endpoint("messages/")?;
        let resp = self.http.get(endpoint).send().await?;
        if !resp.status().is_success() {
            return Err(ApiError::Status(resp.status()));
        }
        let bytes = resp.bytes().await?;
        let json: Value = serde_json::from_slice(&bytes)?;
        let items = if let Some(arr) = json.as_array() {
            arr
        } else if let Some(arr) = json.get("messages").and_then(|v| v.as_array()) {
            arr
        } else if let Some(arr) = json.get("data").and_then(|v| v.as_array()) {
            arr
        } else {
            return Err(ApiError::UnexpectedBody("expected a list of messages"));
        };

        let snapshot = decode_snapshot(items);
        for rejected in &snapshot.rejected {
            warn!("Skipping malformed message: {}", rejected);
        }
        debug!("Fetched {} messages ({} rejected)", snapshot.messages.len(), snapshot.rejected.len());
        Ok(snapshot)
    }

    pub async fn send_message(&self, req: &SendMessageRequest) -> Result<Message, ApiError> {
        let endpoint = self.endpoint("send_message/")?;
        let resp = self.http.post(endpoint).json(req).send().await?;
        if !resp.status().is_success() {
            return Err(ApiError::Status(resp.status()));
        }
        let bytes = resp.bytes().await?;
        let json: Value = serde_json::from_slice(&bytes)?;
        let item = json.get("message").filter(|v| !v.is_null()).ok_or(ApiError::MissingMessage)?;
        Ok(decode_record(0, item)?)
    }

    /// Cheap reachability check: can we open a TCP connection to the backend at all?
    pub async fn probe(&self) -> bool {
        let Some(port) = self.base_api.port_or_known_default() else {
            return false;
        };
        let connect = match self.base_api.host() {
            Some(Host::Domain(domain)) => {
                tokio::time::timeout(PROBE_TIMEOUT, TcpStream::connect((domain, port))).await
            }
            Some(Host::Ipv4(addr)) => {
                tokio::time::timeout(PROBE_TIMEOUT, TcpStream::connect(SocketAddr::from((addr, port)))).await
            }
            Some(Host::Ipv6(addr)) => {
                tokio::time::timeout(PROBE_TIMEOUT, TcpStream::connect(SocketAddr::from((addr, port)))).await
            }
            None => return false,
        };
        match connect {
            Ok(Ok(_)) => true,
            Ok(Err(e)) => {
                debug!("Probe of {} failed: {}", self.base_api, e);
                false
            }
            Err(_) => {
                debug!("Probe of {} timed out", self.base_api);
                false
            }
        }
    }
}
