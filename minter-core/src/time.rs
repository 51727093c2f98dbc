// Copyright (c) Epic NFT Minter developers
// SPDX-License-Identifier: Apache-2.0

//! The timers behind receipt and event polling: tokio natively, browser timers on the Web.

cfg_if::cfg_if! {
    if #[cfg(web)] {
        pub use wasmtimer::tokio::{sleep, timeout};
        pub use web_time::Duration;
    } else {
        pub use std::time::Duration;
        pub use tokio::time::{sleep, timeout};
    }
}
