//! 稼働中モニターへのHTTPクライアント
//!
//! CLIの `status` / `add` が使用する。

use crate::common::error::{MonitorError, MonitorResult};
use crate::types::node::{AddNodesRequest, NodeConfig, NodeStatus};
use reqwest::{Client, StatusCode, Url};
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// モニターAPIクライアント
#[derive(Debug, Clone)]
pub struct MonitorClient {
    base_url: Url,
    http: Client,
}

impl MonitorClient {
    /// ローカルホストの指定ポートで動くモニターに接続する
    pub fn new(port: u16) -> MonitorResult<Self> {
        Self::with_base_url(&format!("http://127.0.0.1:{}", port))
    }

    /// 任意のベースURLで接続する
    pub fn with_base_url(base_url: &str) -> MonitorResult<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|e| MonitorError::Config(format!("Invalid monitor URL {}: {}", base_url, e)))?;
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .no_proxy()
            .build()
            .map_err(|e| MonitorError::Http(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self { base_url, http })
    }

    fn url(&self, segments: &[&str]) -> MonitorResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| MonitorError::Config(format!("Invalid monitor URL {}", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// ノード状態を取得する
    ///
    /// `environment` は `project` と併せて指定した場合のみ有効。
    pub async fn status(
        &self,
        project: Option<&str>,
        environment: Option<&str>,
    ) -> MonitorResult<Vec<NodeStatus>> {
        let url = match (project, environment) {
            (Some(project), Some(environment)) => self.url(&["status", project, environment])?,
            (Some(project), None) => self.url(&["status", project])?,
            (None, _) => self.url(&["status"])?,
        };

        let response = self.http.get(url).send().await?;
        if !response.status().is_success() {
            return Err(MonitorError::Http(format!(
                "Monitor returned HTTP {}",
                response.status()
            )));
        }
        Ok(response.json().await?)
    }

    /// ノードを登録する
    pub async fn add_nodes(&self, nodes: Vec<NodeConfig>) -> MonitorResult<()> {
        let response = self
            .http
            .post(self.url(&["add"])?)
            .json(&AddNodesRequest { nodes })
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let message = response.text().await.unwrap_or_default();
        if status == StatusCode::BAD_REQUEST {
            Err(MonitorError::Validation(message))
        } else {
            Err(MonitorError::Http(format!("Monitor returned HTTP {}: {}", status, message)))
        }
    }
}
