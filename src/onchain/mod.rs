//! A layer of abstraction for controlling interactions with the blockchain
//! depending on whether we are running in a test environment or not.

use alloy::primitives::Address;

use crate::codec::Sink;
use crate::error::InvocationError;

#[cfg(test)]
pub(crate) mod mock;
pub mod real;

/// An argument passed to a WASM contract entry point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Param {
    Str(String),
    Address(Address),
    I128(i128),
    Bytes(Vec<u8>),
    Bool(bool),
}

impl Param {
    fn encode(&self, sink: &mut Sink) {
        match self {
            Param::Str(text) => sink.write_var_bytes(text.as_bytes()),
            Param::Address(address) => sink.write_address(address),
            Param::I128(value) => sink.write_i128(*value),
            Param::Bytes(bytes) => sink.write_var_bytes(bytes),
            Param::Bool(flag) => sink.write_bool(*flag),
        };
    }
}

/// Invoke code for a WASM contract call: the contract address followed by
/// the length-prefixed method name and arguments.
pub fn encode_invoke_code(
    contract: &Address,
    method: &str,
    args: &[Param],
) -> Vec<u8> {
    let mut call = Sink::new();
    call.write_var_bytes(method.as_bytes());
    for arg in args {
        arg.encode(&mut call);
    }

    let mut code = Sink::new();
    code.write_address(contract).write_var_bytes(&call.into_bytes());
    code.into_bytes()
}

/// A trait for read-only access to deployed contracts.
#[allow(async_fn_in_trait)]
pub trait OnChain {
    /// Run `method` on `contract` without committing a transaction and
    /// return the raw bytes it produced.
    async fn pre_exec(
        &self,
        contract: Address,
        method: &str,
        args: &[Param],
    ) -> Result<Vec<u8>, InvocationError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invoke_code_without_args() {
        let contract = Address::repeat_byte(0x11);
        let code = encode_invoke_code(&contract, "allMarkets", &[]);

        let mut expected = vec![0x11; 20];
        expected.push(11);
        expected.push(10);
        expected.extend_from_slice(b"allMarkets");
        assert_eq!(code, expected);
    }

    #[test]
    fn test_invoke_code_encodes_args_in_order() {
        let contract = Address::repeat_byte(0x22);
        let account = Address::repeat_byte(0x33);
        let code = encode_invoke_code(
            &contract,
            "balanceOf",
            &[Param::Address(account), Param::I128(-2), Param::Bool(true)],
        );

        let call = &code[21..];
        assert_eq!(usize::from(code[20]), call.len());
        assert_eq!(call[0], 9);
        assert_eq!(&call[1..10], b"balanceOf");
        assert_eq!(&call[10..30], account.as_slice());
        assert_eq!(&call[30..46], &(-2i128).to_le_bytes());
        assert_eq!(call[46], 1);
        assert_eq!(call.len(), 47);
    }
}
