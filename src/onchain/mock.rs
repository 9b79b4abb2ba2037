//! A mock implementation of the [`OnChain`] trait that serves canned
//! pre-exec results for deterministic testing.

use std::collections::HashMap;
use std::sync::Mutex;

use alloy::primitives::Address;

use super::{OnChain, Param};
use crate::codec::Sink;
use crate::error::InvocationError;
use crate::reserves::{ALL_MARKETS, TOTAL_RESERVES};

/// RPC error code reported for calls configured to fail.
pub(crate) const MOCK_ERROR_CODE: i64 = 47001;

type Response = Result<Vec<u8>, String>;

/// In-memory chain answering pre-exec calls from a table keyed by contract
/// and method.
#[derive(Default)]
pub(crate) struct MockChain {
    responses: HashMap<(Address, String), Response>,
    calls: Mutex<Vec<(Address, String)>>,
}

impl MockChain {
    /// Create a [`MockChain`] whose root contract lists `markets` and where
    /// each market reports the paired reserve.
    pub(crate) fn with_markets(
        root: Address,
        markets: &[(Address, i128)],
    ) -> Self {
        let mut listing = Sink::new();
        listing.write_var_uint(markets.len() as u64);
        for (market, _) in markets {
            listing.write_address(market);
        }

        let mut chain = Self::default();
        chain.set_response(root, ALL_MARKETS, listing.into_bytes());
        for (market, reserve) in markets {
            let mut reserve_bytes = Sink::new();
            reserve_bytes.write_i128(*reserve);
            chain.set_response(
                *market,
                TOTAL_RESERVES,
                reserve_bytes.into_bytes(),
            );
        }
        chain
    }

    /// Answer `method` on `contract` with the given raw bytes.
    pub(crate) fn set_response(
        &mut self,
        contract: Address,
        method: &str,
        bytes: Vec<u8>,
    ) {
        self.responses.insert((contract, method.to_string()), Ok(bytes));
    }

    /// Make `method` on `contract` fail with an RPC error.
    pub(crate) fn set_failure(&mut self, contract: Address, method: &str) {
        self.responses.insert(
            (contract, method.to_string()),
            Err(format!("{method} failed")),
        );
    }

    /// Every call made so far, in order.
    pub(crate) fn calls(&self) -> Vec<(Address, String)> {
        self.calls.lock().map(|calls| calls.clone()).unwrap_or_default()
    }
}

impl OnChain for MockChain {
    async fn pre_exec(
        &self,
        contract: Address,
        method: &str,
        _args: &[Param],
    ) -> Result<Vec<u8>, InvocationError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push((contract, method.to_string()));
        }

        match self.responses.get(&(contract, method.to_string())) {
            Some(Ok(bytes)) => Ok(bytes.clone()),
            Some(Err(desc)) => Err(InvocationError::Rpc {
                code: MOCK_ERROR_CODE,
                desc: desc.clone(),
            }),
            None => Err(InvocationError::Rpc {
                code: MOCK_ERROR_CODE,
                desc: format!("no contract at {contract}"),
            }),
        }
    }
}
