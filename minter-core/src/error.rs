// Copyright (c) Epic NFT Minter developers
// SPDX-License-Identifier: Apache-2.0

use alloy_primitives::TxHash;
use thiserror::Error;

use crate::data_types::NetworkId;

/// Errors reported by a wallet agent or the transport to it.
#[derive(Debug, Error)]
pub enum AgentError {
    /// No wallet agent is present in the environment.
    #[error("no wallet agent is available")]
    Unavailable,

    /// The agent answered with an EIP-1193 / JSON-RPC error object.
    #[error("wallet agent error {code}: {message}")]
    Rpc { code: i64, message: String },

    /// The request never reached the agent, or its answer was lost.
    #[error("transport error: {0}")]
    Transport(String),

    /// The agent answered, but not with what the method should return.
    #[error("malformed response to `{method}`: {reason}")]
    MalformedResponse { method: String, reason: String },

    /// The id should be matching
    #[error("the response id does not match the request id")]
    IdIsNotMatching,

    /// wrong jsonrpc version
    #[error("wrong jsonrpc version")]
    WrongJsonRpcVersion,

    /// `serde_json` error
    #[error(transparent)]
    JsonError(#[from] serde_json::Error),
}

impl AgentError {
    /// EIP-1193 code for a request the user declined in the wallet.
    pub const USER_REJECTED_REQUEST: i64 = 4001;

    pub fn is_user_rejection(&self) -> bool {
        matches!(self, AgentError::Rpc { code, .. } if *code == Self::USER_REJECTED_REQUEST)
    }

    pub fn malformed(method: &str, reason: impl ToString) -> Self {
        AgentError::MalformedResponse {
            method: method.to_string(),
            reason: reason.to_string(),
        }
    }
}

#[cfg(not(target_arch = "wasm32"))]
impl From<reqwest::Error> for AgentError {
    fn from(error: reqwest::Error) -> Self {
        AgentError::Transport(error.to_string())
    }
}

/// Errors from reading, writing or listening to the minting contract.
#[derive(Debug, Error)]
pub enum ContractError {
    #[error(transparent)]
    Agent(#[from] AgentError),

    #[error("`{method}` returned {len} bytes instead of a 32-byte word")]
    ReturnData { method: &'static str, len: usize },

    #[error("the value returned by `{method}` does not fit in 64 bits")]
    Overflow { method: &'static str },

    #[error("current supply {current} exceeds total supply {total}")]
    InconsistentSupply { current: u64, total: u64 },

    #[error("transaction {0} reverted")]
    Reverted(TxHash),

    #[error("gave up waiting for transaction {0} to be confirmed")]
    ConfirmationTimeout(TxHash),

    #[error("invalid event log: {0}")]
    InvalidLog(String),

    #[error("no account is authorized to send the transaction")]
    NoSender,
}

/// The failures a [`MintSession`](crate::MintSession) reports to the presentation layer.
///
/// None of them is fatal: the session always stays in its last valid state.
#[derive(Debug, Error)]
pub enum MintError {
    #[error("wallet unavailable")]
    WalletUnavailable,

    #[error("the request was declined in the wallet")]
    AuthorizationDeclined(#[source] AgentError),

    #[error("the wallet is connected to network {actual}, expected {expected}")]
    NetworkMismatch {
        expected: NetworkId,
        actual: NetworkId,
    },

    #[error("failed to read the contract: {0}")]
    ReadFailure(#[source] ContractError),

    #[error("failed to submit the mint transaction: {0}")]
    SubmissionFailure(#[source] ContractError),

    #[error("the mint transaction failed: {0}")]
    ConfirmationFailure(#[source] ContractError),
}

impl MintError {
    /// Translates an account request failure.
    pub(crate) fn from_authorization(error: AgentError) -> Self {
        match error {
            AgentError::Unavailable => MintError::WalletUnavailable,
            error => MintError::AuthorizationDeclined(error),
        }
    }

    /// Translates a contract read failure.
    pub(crate) fn from_read(error: ContractError) -> Self {
        match error {
            ContractError::Agent(AgentError::Unavailable) => MintError::WalletUnavailable,
            error => MintError::ReadFailure(error),
        }
    }

    /// Translates a transaction submission failure.
    pub(crate) fn from_submission(error: ContractError) -> Self {
        match error {
            ContractError::Agent(AgentError::Unavailable) => MintError::WalletUnavailable,
            ContractError::Agent(error) if error.is_user_rejection() => {
                MintError::AuthorizationDeclined(error)
            }
            error => MintError::SubmissionFailure(error),
        }
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn submission_errors_are_classified() {
        let rejected = ContractError::Agent(AgentError::Rpc {
            code: AgentError::USER_REJECTED_REQUEST,
            message: "User denied transaction signature.".into(),
        });
        assert_matches!(
            MintError::from_submission(rejected),
            MintError::AuthorizationDeclined(AgentError::Rpc { code: 4001, .. })
        );
        assert_matches!(
            MintError::from_submission(ContractError::Agent(AgentError::Unavailable)),
            MintError::WalletUnavailable
        );
        assert_matches!(
            MintError::from_submission(ContractError::Agent(AgentError::Rpc {
                code: -32000,
                message: "insufficient funds".into(),
            })),
            MintError::SubmissionFailure(ContractError::Agent(AgentError::Rpc {
                code: -32000,
                ..
            }))
        );
    }

    #[test]
    fn authorization_errors_are_classified() {
        assert_matches!(
            MintError::from_authorization(AgentError::Unavailable),
            MintError::WalletUnavailable
        );
        assert_matches!(
            MintError::from_authorization(AgentError::Transport("closed".into())),
            MintError::AuthorizationDeclined(AgentError::Transport(_))
        );
    }
}
