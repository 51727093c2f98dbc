// Copyright (c) Epic NFT Minter developers
// SPDX-License-Identifier: Apache-2.0

use alloy_primitives::{address, Address, TxHash};
use serde::{Deserialize, Serialize};

use crate::{data_types::NetworkId, time::Duration};

/// The deployment of the minting contract on the test network.
pub const DEFAULT_CONTRACT_ADDRESS: Address = address!("837e67956b53a4d46ba6ee5319089a2d1fa8923a");

/// The chain id of the Rinkeby test network.
pub const DEFAULT_REQUIRED_NETWORK: &str = "0x4";

pub const DEFAULT_POLL_INTERVAL_MS: u64 = 4000;

pub const DEFAULT_EXPLORER_URL: &str = "https://rinkeby.etherscan.io";

pub const DEFAULT_MARKETPLACE_URL: &str = "https://testnets.opensea.io";

/// Where the contract lives and how the session talks to it.
///
/// Every field has a default, so a partial object (e.g. `{ "requiredNetwork": "0x5" }`)
/// deserializes into a complete configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MinterConfig {
    /// The address of the minting contract.
    #[serde(default = "default_contract_address")]
    pub contract_address: Address,

    /// The network the wallet is expected to be on. A mismatch is only advisory.
    #[serde(default = "default_required_network")]
    pub required_network: NetworkId,

    /// How often to poll for new events and transaction receipts.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Stop waiting for a mint confirmation after this long. No limit by default.
    #[serde(default)]
    pub confirmation_timeout_ms: Option<u64>,

    /// Block explorer used to link submitted transactions.
    #[serde(default = "default_explorer_url")]
    pub explorer_url: String,

    /// Marketplace used to link minted tokens.
    #[serde(default = "default_marketplace_url")]
    pub marketplace_url: String,
}

fn default_contract_address() -> Address {
    DEFAULT_CONTRACT_ADDRESS
}

fn default_required_network() -> NetworkId {
    NetworkId::new(DEFAULT_REQUIRED_NETWORK)
}

fn default_poll_interval_ms() -> u64 {
    DEFAULT_POLL_INTERVAL_MS
}

fn default_explorer_url() -> String {
    DEFAULT_EXPLORER_URL.to_string()
}

fn default_marketplace_url() -> String {
    DEFAULT_MARKETPLACE_URL.to_string()
}

impl Default for MinterConfig {
    fn default() -> Self {
        Self {
            contract_address: default_contract_address(),
            required_network: default_required_network(),
            poll_interval_ms: default_poll_interval_ms(),
            confirmation_timeout_ms: None,
            explorer_url: default_explorer_url(),
            marketplace_url: default_marketplace_url(),
        }
    }
}

impl MinterConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn confirmation_timeout(&self) -> Option<Duration> {
        self.confirmation_timeout_ms.map(Duration::from_millis)
    }

    /// The explorer page of a transaction.
    pub fn transaction_url(&self, hash: &TxHash) -> String {
        format!("{}/tx/{}", self.explorer_url.trim_end_matches('/'), hash)
    }

    /// The marketplace page of a minted token.
    pub fn token_url(&self, token_id: u64) -> String {
        format!(
            "{}/assets/{:?}/{}",
            self.marketplace_url.trim_end_matches('/'),
            self.contract_address,
            token_id
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_config_takes_defaults() {
        let config: MinterConfig = serde_json::from_value(serde_json::json!({
            "requiredNetwork": "0x5",
            "pollIntervalMs": 250,
        }))
        .unwrap();
        assert_eq!(config.required_network, NetworkId::new("0x5"));
        assert_eq!(config.poll_interval(), Duration::from_millis(250));
        assert_eq!(config.contract_address, DEFAULT_CONTRACT_ADDRESS);
        assert_eq!(config.confirmation_timeout(), None);
        assert_eq!(config.explorer_url, DEFAULT_EXPLORER_URL);
    }

    #[test]
    fn empty_config_is_default() {
        let config: MinterConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, MinterConfig::default());
    }

    #[test]
    fn links() {
        let config = MinterConfig {
            marketplace_url: "https://market.example/".to_string(),
            ..MinterConfig::default()
        };
        assert_eq!(
            config.token_url(7),
            format!(
                "https://market.example/assets/{:?}/7",
                DEFAULT_CONTRACT_ADDRESS
            )
        );
        let hash = TxHash::repeat_byte(0xab);
        assert_eq!(
            config.transaction_url(&hash),
            format!("{DEFAULT_EXPLORER_URL}/tx/{hash}")
        );
    }
}
