//! `ServerQuery` over the TeamSpeak WebQuery HTTP API.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value};
use url::Url;

use crate::{
    error::query::QueryError,
    teamspeak::{ServerInfo, ServerQuery},
};

/// `{"body": [...], "status": {"code": 0, "message": "ok"}}`
#[derive(Debug, Deserialize)]
struct Response {
    #[serde(default)]
    body: Vec<Map<String, Value>>,
    status: Status,
}

#[derive(Debug, Deserialize)]
struct Status {
    code: i64,
    #[serde(default)]
    message: String,
}

pub struct WebQueryClient {
    http: reqwest::Client,
    base: Url,
    api_key: String,
    timeout: Duration,
}

impl WebQueryClient {
    /// Creates a client for the WebQuery endpoint at `base`.
    ///
    /// # Returns
    /// - `Ok(WebQueryClient)` - Client ready for use
    /// - `Err(QueryError::InvalidResponse)` - `base` is not a usable base URL
    pub fn new(
        http: reqwest::Client,
        base: &str,
        api_key: &str,
        timeout: Duration,
    ) -> Result<Self, QueryError> {
        let base = Url::parse(base)
            .ok()
            .filter(|url| !url.cannot_be_a_base())
            .ok_or_else(|| QueryError::InvalidResponse(format!("invalid WebQuery URL '{}'", base)))?;

        Ok(Self {
            http,
            base,
            api_key: api_key.to_string(),
            timeout,
        })
    }

    fn url(&self, segments: &[&str]) -> Result<Url, QueryError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| QueryError::InvalidResponse(format!("invalid WebQuery URL '{}'", self.base)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn get(
        &self,
        segments: &[&str],
        query: &[(&str, String)],
    ) -> Result<Vec<Map<String, Value>>, QueryError> {
        let response = self
            .http
            .get(self.url(segments)?)
            .header("x-api-key", &self.api_key)
            .query(query)
            .timeout(self.timeout)
            .send()
            .await?
            .json::<Response>()
            .await?;

        if response.status.code != 0 {
            return Err(QueryError::Status {
                code: response.status.code,
                message: response.status.message,
            });
        }
        Ok(response.body)
    }
}

#[async_trait]
impl ServerQuery for WebQueryClient {
    async fn server_info(&self, virtual_server_id: i32) -> Result<ServerInfo, QueryError> {
        let sid = virtual_server_id.to_string();
        let body = self.get(&[&sid, "serverinfo"], &[]).await?;
        let row = body
            .first()
            .ok_or_else(|| QueryError::InvalidResponse("empty serverinfo body".to_string()))?;

        parse_server_info(row)
    }

    async fn set_max_clients(&self, virtual_server_id: i32, slots: i32) -> Result<(), QueryError> {
        let sid = virtual_server_id.to_string();
        self.get(
            &[&sid, "serveredit"],
            &[("virtualserver_maxclients", slots.to_string())],
        )
        .await
        .map(|_| ())
    }

    async fn stop_server(&self, virtual_server_id: i32) -> Result<(), QueryError> {
        self.get(&["serverstop"], &[("sid", virtual_server_id.to_string())])
            .await
            .map(|_| ())
    }
}

fn parse_server_info(row: &Map<String, Value>) -> Result<ServerInfo, QueryError> {
    let clients = number(row, "virtualserver_clientsonline")?;
    let query_clients = number(row, "virtualserver_queryclientsonline").unwrap_or(0);

    Ok(ServerInfo {
        online_clients: (clients - query_clients).max(0),
        max_clients: number(row, "virtualserver_maxclients")?,
    })
}

/// WebQuery renders every value as a string; accept plain numbers too.
fn number(row: &Map<String, Value>, key: &str) -> Result<i32, QueryError> {
    let value = row
        .get(key)
        .ok_or_else(|| QueryError::InvalidResponse(format!("missing {}", key)))?;

    let parsed = match value {
        Value::String(s) => s.parse::<i32>().ok(),
        Value::Number(n) => n.as_i64().and_then(|n| i32::try_from(n).ok()),
        _ => None,
    };
    parsed.ok_or_else(|| QueryError::InvalidResponse(format!("invalid {}: {}", key, value)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(value: Value) -> Map<String, Value> {
        value.as_object().unwrap().clone()
    }

    #[test]
    fn online_count_excludes_query_clients() {
        let info = parse_server_info(&row(json!({
            "virtualserver_clientsonline": "5",
            "virtualserver_queryclientsonline": "2",
            "virtualserver_maxclients": "32",
        })))
        .unwrap();

        assert_eq!(
            info,
            ServerInfo {
                online_clients: 3,
                max_clients: 32
            }
        );
    }

    #[test]
    fn rejects_missing_fields() {
        let err = parse_server_info(&row(json!({ "virtualserver_clientsonline": 1 }))).unwrap_err();

        assert!(matches!(err, QueryError::InvalidResponse(_)));
    }

    #[test]
    fn builds_sid_routes() {
        let client = WebQueryClient::new(
            reqwest::Client::new(),
            "http://127.0.0.1:10080/",
            "key",
            Duration::from_secs(1),
        )
        .unwrap();

        assert_eq!(
            client.url(&["7", "serverinfo"]).unwrap().as_str(),
            "http://127.0.0.1:10080/7/serverinfo"
        );
        assert!(WebQueryClient::new(
            reqwest::Client::new(),
            "not a url",
            "key",
            Duration::from_secs(1)
        )
        .is_err());
    }

    #[tokio::test]
    async fn closed_port_is_unreachable() {
        let client = WebQueryClient::new(
            reqwest::Client::new(),
            "http://127.0.0.1:1",
            "key",
            Duration::from_secs(2),
        )
        .unwrap();

        let err = client.server_info(1).await.unwrap_err();

        assert!(matches!(err, QueryError::Unreachable(_)));
    }
}
