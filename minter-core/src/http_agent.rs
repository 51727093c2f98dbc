// Copyright (c) Epic NFT Minter developers
// SPDX-License-Identifier: Apache-2.0

//! A wallet agent reached over HTTP, such as a development node with unlocked accounts.

use async_lock::Mutex;
use reqwest::{header::CONTENT_TYPE, Client};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::trace;
use url::Url;

use crate::{agent::WalletAgent, error::AgentError};

/// Sends JSON-RPC 2.0 requests to a node.
#[derive(Debug)]
pub struct HttpAgent {
    url: Url,
    /// The id that is being incremented from one request to the next.
    id: Mutex<u64>,
    client: Client,
}

impl HttpAgent {
    pub fn new(url: Url) -> Self {
        Self {
            url,
            id: Mutex::new(0),
            client: Client::new(),
        }
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    async fn next_id(&self) -> u64 {
        let mut id = self.id.lock().await;
        *id += 1;
        *id
    }
}

impl WalletAgent for HttpAgent {
    fn is_present(&self) -> bool {
        true
    }

    async fn request(&self, method: &str, params: Value) -> Result<Value, AgentError> {
        let id = self.next_id().await;
        let payload = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });
        trace!("Sending {payload} to {}", self.url);
        let body = self
            .client
            .post(self.url.clone())
            .header(CONTENT_TYPE, "application/json")
            .json(&payload)
            .send()
            .await?
            .bytes()
            .await?;
        parse_response(id, &body)
    }
}

#[derive(Debug, Deserialize)]
struct JsonRpcResponse {
    jsonrpc: String,
    id: u64,
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<JsonRpcError>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcError {
    code: i64,
    message: String,
}

/// Unwraps the result from a response envelope to the request numbered `id`.
fn parse_response(id: u64, body: &[u8]) -> Result<Value, AgentError> {
    let response: JsonRpcResponse = serde_json::from_slice(body)?;
    if response.jsonrpc != "2.0" {
        return Err(AgentError::WrongJsonRpcVersion);
    }
    if response.id != id {
        return Err(AgentError::IdIsNotMatching);
    }
    if let Some(JsonRpcError { code, message }) = response.error {
        return Err(AgentError::Rpc { code, message });
    }
    Ok(response.result.unwrap_or(Value::Null))
}
