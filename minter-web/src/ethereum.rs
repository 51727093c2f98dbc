// Copyright (c) Epic NFT Minter developers
// SPDX-License-Identifier: Apache-2.0

//! The wallet injected into the page as `window.ethereum`, such as MetaMask.

use minter_core::{AgentError, WalletAgent};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use wasm_bindgen::{prelude::*, JsCast as _};

pub const ACCOUNTS_CHANGED: &str = "accountsChanged";
pub const CHAIN_CHANGED: &str = "chainChanged";

#[wasm_bindgen(typescript_custom_section)]
const EIP1193_PROVIDER_INTERFACE: &'static str = r#"
export interface EIP1193Provider {
  isMetaMask?: boolean;
  request(args: { method: string; params?: unknown[] }): Promise<unknown>;
  on(event: string, listener: (...args: unknown[]) => void): void;
  removeListener(event: string, listener: (...args: unknown[]) => void): void;
}"#;

#[wasm_bindgen]
extern "C" {
    #[wasm_bindgen(typescript_type = "EIP1193Provider")]
    #[derive(Clone, Debug)]
    pub type EthereumProvider;

    #[wasm_bindgen(catch, method)]
    async fn request(this: &EthereumProvider, args: JsValue) -> Result<JsValue, JsValue>;

    #[wasm_bindgen(method, getter, js_name = isMetaMask)]
    fn is_metamask(this: &EthereumProvider) -> Option<bool>;

    #[wasm_bindgen(method)]
    pub fn on(this: &EthereumProvider, event: &str, listener: &js_sys::Function);

    #[wasm_bindgen(method, js_name = removeListener)]
    pub fn remove_listener(this: &EthereumProvider, event: &str, listener: &js_sys::Function);
}

// Requests go to the wallet as plain JSON objects.
static REQUEST_SERIALIZER: serde_wasm_bindgen::Serializer =
    serde_wasm_bindgen::Serializer::json_compatible();

#[derive(Serialize)]
struct RequestArguments<'a> {
    method: &'a str,
    params: &'a Value,
}

/// The error object an EIP-1193 provider rejects with.
#[derive(Deserialize)]
struct ProviderError {
    code: i64,
    message: String,
}

/// The page's wallet, if one was injected.
pub struct BrowserWallet {
    provider: Option<EthereumProvider>,
}

impl BrowserWallet {
    /// Looks for `window.ethereum`.
    pub fn detect() -> Self {
        let provider = web_sys::window()
            .and_then(|window| js_sys::Reflect::get(&window, &JsValue::from_str("ethereum")).ok())
            .filter(|provider| !provider.is_undefined() && !provider.is_null())
            .map(|provider| provider.unchecked_into::<EthereumProvider>());
        Self { provider }
    }

    pub fn provider(&self) -> Option<&EthereumProvider> {
        self.provider.as_ref()
    }
}

impl WalletAgent for BrowserWallet {
    fn is_present(&self) -> bool {
        self.provider.is_some()
    }

    fn is_metamask(&self) -> bool {
        self.provider
            .as_ref()
            .and_then(EthereumProvider::is_metamask)
            .unwrap_or(false)
    }

    async fn request(&self, method: &str, params: Value) -> Result<Value, AgentError> {
        let provider = self.provider.as_ref().ok_or(AgentError::Unavailable)?;
        let args = RequestArguments {
            method,
            params: &params,
        }
        .serialize(&REQUEST_SERIALIZER)
        .map_err(|error| AgentError::Transport(error.to_string()))?;
        match provider.request(args).await {
            Ok(value) => serde_wasm_bindgen::from_value(value)
                .map_err(|error| AgentError::malformed(method, error)),
            Err(error) => Err(into_agent_error(error)),
        }
    }
}

fn into_agent_error(error: JsValue) -> AgentError {
    match serde_wasm_bindgen::from_value::<ProviderError>(error.clone()) {
        Ok(ProviderError { code, message }) => AgentError::Rpc { code, message },
        Err(_) => AgentError::Transport(format!("{error:?}")),
    }
}
