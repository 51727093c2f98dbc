// Copyright (c) Epic NFT Minter developers
// SPDX-License-Identifier: Apache-2.0

use crate::data_types::{NetworkId, Notice};

/// Checks that the wallet is on the network the contract is deployed to.
///
/// The guard only advises: a mismatch is reported, never enforced.
#[derive(Clone, Debug)]
pub struct NetworkGuard {
    required: NetworkId,
}

/// The result of [`NetworkGuard::check`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NetworkCheck {
    pub ok: bool,
    pub expected: NetworkId,
    pub actual: NetworkId,
}

impl NetworkGuard {
    pub fn new(required: NetworkId) -> Self {
        Self { required }
    }

    pub fn required(&self) -> &NetworkId {
        &self.required
    }

    pub fn check(&self, network: &NetworkId) -> NetworkCheck {
        NetworkCheck {
            ok: *network == self.required,
            expected: self.required.clone(),
            actual: network.clone(),
        }
    }
}

impl NetworkCheck {
    /// The warning to show the user, if any.
    pub fn warning(&self) -> Option<Notice> {
        (!self.ok).then(|| Notice::NetworkMismatch {
            expected: self.expected.clone(),
            actual: self.actual.clone(),
        })
    }
}
