// Copyright (c) Epic NFT Minter developers
// SPDX-License-Identifier: Apache-2.0

/*!
# `minter-web`

This module defines the JavaScript bindings to the minting session.

It is compiled to Wasm and drives the wallet injected into the page. The page renders
what it receives through `onStateChange` and `onNotice`, and forwards button clicks to
`connect` and `mint`.
*/

#![cfg(target_arch = "wasm32")]
// We sometimes need functions in this module to be async in order to
// ensure the generated code will return a `Promise`.
#![allow(clippy::unused_async)]

pub mod ethereum;
mod logging;

use std::{
    cell::RefCell,
    rc::{Rc, Weak},
};

use minter_core::{
    MintOutcome, MintSession, MintSessionState, MinterConfig, Notice, SessionPhase,
};
use serde::Serialize;
use wasm_bindgen::{prelude::*, JsCast as _};
use wasm_bindgen_futures::spawn_local;

use crate::ethereum::{BrowserWallet, ACCOUNTS_CHANGED, CHAIN_CHANGED};

type JsResult<T> = Result<T, JsError>;

// A serializer producing plain objects, so that the page can treat values as JSON.
static RESPONSE_SERIALIZER: serde_wasm_bindgen::Serializer =
    serde_wasm_bindgen::Serializer::json_compatible();

fn to_js<T: Serialize>(value: &T) -> Result<JsValue, serde_wasm_bindgen::Error> {
    value.serialize(&RESPONSE_SERIALIZER)
}

/// The session state as the page sees it.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StateView<'a> {
    #[serde(flatten)]
    state: &'a MintSessionState,
    phase: SessionPhase,
}

impl<'a> From<&'a MintSessionState> for StateView<'a> {
    fn from(state: &'a MintSessionState) -> Self {
        StateView {
            phase: state.phase(),
            state,
        }
    }
}

struct Inner {
    session: MintSession<BrowserWallet>,
    /// The wallet event listeners, removed when the minter is dropped.
    listeners: RefCell<Vec<(&'static str, Closure<dyn FnMut(JsValue)>)>>,
}

impl Inner {
    /// Binds the contract and forwards minted tokens, unless that is already done.
    async fn listen(&self) {
        match self.session.setup_listening().await {
            Ok(Some(forwarder)) => spawn_local(forwarder),
            Ok(None) => (),
            Err(error) => tracing::warn!("Not listening for minted tokens: {error}"),
        }
    }

    async fn wallet_changed(&self, event: &str) {
        tracing::debug!("Wallet event: {event}");
        if event == CHAIN_CHANGED {
            self.session.rebind();
        }
        if self.session.on_load().await.is_some() {
            self.listen().await;
        }
    }

    fn install_listeners(self: &Rc<Self>) {
        let Some(provider) = self.session.gateway().agent().provider() else {
            return;
        };
        let mut listeners = self.listeners.borrow_mut();
        if !listeners.is_empty() {
            return;
        }
        for event in [ACCOUNTS_CHANGED, CHAIN_CHANGED] {
            let this = Rc::downgrade(self);
            let listener = Closure::<dyn FnMut(JsValue)>::new(move |_: JsValue| {
                let this: Weak<Inner> = this.clone();
                spawn_local(async move {
                    if let Some(this) = this.upgrade() {
                        this.wallet_changed(event).await;
                    }
                });
            });
            provider.on(event, listener.as_ref().unchecked_ref());
            listeners.push((event, listener));
        }
    }

    /// Reads the supply again after every minted token.
    fn follow_completions(self: &Rc<Self>) {
        let this = Rc::downgrade(self);
        let mut notices = self.session.subscribe_notices();
        spawn_local(async move {
            while let Some(notice) = notices.recv().await {
                let Notice::MintCompleted { .. } = notice else {
                    continue;
                };
                let Some(this) = this.upgrade() else {
                    break;
                };
                if let Err(error) = this.session.refresh_supply().await {
                    tracing::warn!("Failed to refresh the supply: {error}");
                }
            }
        });
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        if let Some(provider) = self.session.gateway().agent().provider() {
            for (event, listener) in self.listeners.get_mut().drain(..) {
                provider.remove_listener(event, listener.as_ref().unchecked_ref());
            }
        }
        self.session.rebind();
    }
}

/// A minting session bound to the page's wallet.
#[wasm_bindgen]
#[derive(Clone)]
pub struct Minter(Rc<Inner>);

#[wasm_bindgen]
impl Minter {
    /// Creates a minter for the wallet injected into the page, if any.
    ///
    /// `config` is an optional object overriding fields of the default configuration,
    /// such as `{ contractAddress, requiredNetwork }`.
    ///
    /// # Errors
    /// If the configuration object is malformed.
    #[wasm_bindgen(constructor)]
    pub fn new(config: JsValue) -> JsResult<Minter> {
        let config: MinterConfig = if config.is_undefined() || config.is_null() {
            MinterConfig::default()
        } else {
            serde_wasm_bindgen::from_value(config)?
        };
        let inner = Rc::new(Inner {
            session: MintSession::new(BrowserWallet::detect(), config),
            listeners: RefCell::default(),
        });
        inner.follow_completions();
        Ok(Minter(inner))
    }

    /// Checks the wallet without prompting the user, and starts following wallet
    /// changes. Resolves to the connected account, or `null`.
    ///
    /// # Errors
    /// If the account cannot be converted.
    #[wasm_bindgen]
    pub async fn load(&self) -> JsResult<JsValue> {
        self.0.install_listeners();
        let account = self.0.session.on_load().await;
        if account.is_some() {
            self.0.listen().await;
        }
        Ok(to_js(&account)?)
    }

    /// Asks the wallet to authorize an account. Resolves to the account, or `null`.
    ///
    /// # Errors
    /// If there is no wallet or the user declines.
    #[wasm_bindgen]
    pub async fn connect(&self) -> JsResult<JsValue> {
        let account = self.0.session.connect().await?;
        if account.is_some() {
            self.0.listen().await;
        }
        Ok(to_js(&account)?)
    }

    /// Mints a token and resolves to the receipt once the transaction is confirmed.
    /// Resolves to `null` when a mint is already in progress.
    ///
    /// # Errors
    /// If the mint could not be submitted or the transaction failed.
    #[wasm_bindgen]
    pub async fn mint(&self) -> JsResult<JsValue> {
        match self.0.session.mint().await? {
            MintOutcome::Ignored => Ok(JsValue::NULL),
            MintOutcome::Confirmed(receipt) => Ok(to_js(&receipt)?),
        }
    }

    /// Reads the supply counters from the contract again.
    ///
    /// # Errors
    /// If the contract cannot be read.
    #[wasm_bindgen(js_name = refreshSupply)]
    pub async fn refresh_supply(&self) -> JsResult<JsValue> {
        let supply = self.0.session.refresh_supply().await?;
        Ok(to_js(&supply)?)
    }

    /// The current state: `{ account, supply, supplyKnown, isMinting, phase }`.
    ///
    /// # Errors
    /// If the state cannot be converted.
    #[wasm_bindgen]
    pub fn snapshot(&self) -> JsResult<JsValue> {
        Ok(to_js(&StateView::from(&self.0.session.snapshot()))?)
    }

    /// Calls `handler` with the current state, then again after every change.
    #[wasm_bindgen(js_name = onStateChange)]
    pub fn on_state_change(&self, handler: js_sys::Function) {
        let mut states = self.0.session.watch_state();
        spawn_local(async move {
            loop {
                let state = states.borrow_and_update().clone();
                match to_js(&StateView::from(&state)) {
                    Ok(value) => {
                        if let Err(error) = handler.call1(&JsValue::NULL, &value) {
                            tracing::warn!("State handler failed: {error:?}");
                        }
                    }
                    Err(error) => tracing::error!("Failed to convert the state: {error}"),
                }
                if states.changed().await.is_err() {
                    break;
                }
            }
        });
    }

    /// Calls `handler` with every notice: `{ kind: "networkMismatch", expected, actual }`
    /// or `{ kind: "mintCompleted", from, tokenId, tokenUrl }`.
    #[wasm_bindgen(js_name = onNotice)]
    pub fn on_notice(&self, handler: js_sys::Function) {
        let mut notices = self.0.session.subscribe_notices();
        spawn_local(async move {
            while let Some(notice) = notices.recv().await {
                tracing::debug!("received notice: {notice:?}");
                match to_js(&notice) {
                    Ok(value) => {
                        if let Err(error) = handler.call1(&JsValue::NULL, &value) {
                            tracing::warn!("Notice handler failed: {error:?}");
                        }
                    }
                    Err(error) => tracing::error!("Failed to convert a notice: {error}"),
                }
            }
        });
    }
}

#[wasm_bindgen(start)]
pub fn main() {
    std::panic::set_hook(Box::new(console_error_panic_hook::hook));
    logging::init();
}
