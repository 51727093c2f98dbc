// Copyright (c) Epic NFT Minter developers
// SPDX-License-Identifier: Apache-2.0

fn main() {
    cfg_aliases::cfg_aliases! {
        web: { all(target_arch = "wasm32", feature = "web") },
        with_testing: { any(test, feature = "test") },
    };
}
