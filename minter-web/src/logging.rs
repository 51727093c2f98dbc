// Copyright (c) Epic NFT Minter developers
// SPDX-License-Identifier: Apache-2.0

//! Browser logging for the minter: events go to the developer console, spans to the
//! Performance API timeline.

use tracing::level_filters::LevelFilter;
use tracing_subscriber::{
    filter::Targets, prelude::__tracing_subscriber_SubscriberExt as _,
    util::SubscriberInitExt as _,
};

/// Minter crates log at `debug`; everything else only at `warn`.
fn minter_targets() -> Targets {
    Targets::new()
        .with_target("minter_core", LevelFilter::DEBUG)
        .with_target("minter_web", LevelFilter::DEBUG)
        .with_default(LevelFilter::WARN)
}

/// Installs the global subscriber. Called once from the module's start hook.
pub fn init() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .without_time()
                .with_target(false)
                .with_writer(tracing_web::MakeWebConsoleWriter::new()),
        )
        .with(
            tracing_web::performance_layer()
                .with_details_from_fields(tracing_subscriber::fmt::format::Pretty::default()),
        )
        .with(minter_targets())
        .init();
}
