//! EIP-1967 implementation slot reader.
//!
//! A proxy stores its logic contract address in a fixed storage slot. Reading
//! it takes a single `eth_getStorageAt` call; the address is the low-order
//! 20 bytes of the 32-byte word.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::address::normalize_address;
use crate::error::{TransportError, VerifyError};
use crate::request::JsonRpcRequest;
use crate::transport::RpcTransport;

/// EIP-1967 implementation slot:
/// `keccak256("eip1967.proxy.implementation") - 1`
pub const EIP1967_IMPL_SLOT: &str =
    "0x360894a13ba1a3210667c828492db98dca3e2076cc3735a920a3ca505d382bbc";

/// Derive the implementation address from a raw slot value.
///
/// Takes the last 40 hex characters and left-pads shorter values with zeros,
/// so `0x` and `0x1` are accepted (nodes sometimes trim leading zeros).
/// Anything else is a malformed RPC answer and reads as [`VerifyError::RpcRead`].
pub fn derive_implementation(slot_value: &str) -> Result<String, VerifyError> {
    let hex = slot_value.trim();
    let hex = hex
        .strip_prefix("0x")
        .or_else(|| hex.strip_prefix("0X"))
        .unwrap_or(hex);
    if hex.len() > 64 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(VerifyError::RpcRead(TransportError::Other(format!(
            "malformed storage slot value: {slot_value}"
        ))));
    }
    let low = if hex.len() > 40 { &hex[hex.len() - 40..] } else { hex };
    Ok(format!("0x{:0>40}", low.to_ascii_lowercase()))
}

/// Resolves a proxy address to its implementation address.
#[async_trait]
pub trait ImplementationResolver: Send + Sync {
    async fn resolve(&self, proxy_address: &str) -> Result<String, VerifyError>;
}

/// Reads the EIP-1967 slot over any [`RpcTransport`].
///
/// No retries: a broken RPC endpoint surfaces immediately as
/// [`VerifyError::RpcRead`].
pub struct SlotReader {
    transport: Arc<dyn RpcTransport>,
    next_id: AtomicU64,
}

impl SlotReader {
    pub fn new(transport: Arc<dyn RpcTransport>) -> Self {
        Self {
            transport,
            next_id: AtomicU64::new(1),
        }
    }

    /// Read the raw 32-byte slot value.
    pub async fn read_slot(&self, proxy_address: &str) -> Result<String, VerifyError> {
        let proxy = normalize_address(proxy_address)?;
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let req = JsonRpcRequest::new(
            id,
            "eth_getStorageAt",
            vec![
                Value::String(proxy),
                Value::String(EIP1967_IMPL_SLOT.into()),
                Value::String("latest".into()),
            ],
        );
        let resp = self.transport.send(req).await?;
        let result = resp.into_result().map_err(TransportError::Rpc)?;
        match result {
            Value::String(s) => Ok(s),
            other => Err(VerifyError::RpcRead(TransportError::Other(format!(
                "eth_getStorageAt returned non-string result: {other}"
            )))),
        }
    }
}

#[async_trait]
impl ImplementationResolver for SlotReader {
    async fn resolve(&self, proxy_address: &str) -> Result<String, VerifyError> {
        let raw = self.read_slot(proxy_address).await?;
        let implementation = derive_implementation(&raw)?;
        tracing::debug!(
            proxy = %proxy_address,
            implementation = %implementation,
            rpc = %self.transport.url(),
            "resolved EIP-1967 implementation"
        );
        Ok(implementation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::{JsonRpcError, JsonRpcResponse};
    use std::sync::Mutex;

    struct FakeTransport {
        answer: Result<Value, JsonRpcError>,
        seen: Mutex<Vec<JsonRpcRequest>>,
    }

    #[async_trait]
    impl RpcTransport for FakeTransport {
        async fn send(&self, req: JsonRpcRequest) -> Result<JsonRpcResponse, TransportError> {
            let id = req.id.clone();
            self.seen.lock().unwrap().push(req);
            Ok(match &self.answer {
                Ok(v) => JsonRpcResponse::success(id, v.clone()),
                Err(e) => JsonRpcResponse {
                    jsonrpc: "2.0".into(),
                    id,
                    result: None,
                    error: Some(e.clone()),
                },
            })
        }

        fn url(&self) -> &str {
            "fake://rpc"
        }
    }

    struct DownTransport;

    #[async_trait]
    impl RpcTransport for DownTransport {
        async fn send(&self, _req: JsonRpcRequest) -> Result<JsonRpcResponse, TransportError> {
            Err(TransportError::Http("connection refused".into()))
        }

        fn url(&self) -> &str {
            "fake://down"
        }
    }

    const PROXY: &str = "0x1111111111111111111111111111111111111111";

    #[test]
    fn derive_takes_low_20_bytes() {
        let slot = "0x000000000000000000000000d8da6bf26964af9d7eed9e03e53415d37aa96045";
        assert_eq!(
            derive_implementation(slot).unwrap(),
            "0xd8da6bf26964af9d7eed9e03e53415d37aa96045"
        );
    }

    #[test]
    fn derive_is_exactly_the_last_40_chars() {
        // High bytes are ignored, whatever they hold.
        let slot = format!("0x{}{}", "ff".repeat(12), "ab".repeat(20));
        assert_eq!(derive_implementation(&slot).unwrap(), format!("0x{}", "ab".repeat(20)));

        let long = "c".repeat(39);
        for tail in ["1", "beef", long.as_str()] {
            let derived = derive_implementation(&format!("0x{tail}")).unwrap();
            assert_eq!(derived.len(), 42);
            assert!(derived.ends_with(tail));
            assert!(derived[2..42 - tail.len()].chars().all(|c| c == '0'));
        }
    }

    #[test]
    fn derive_zero_and_empty_slot() {
        let zero = format!("0x{}", "0".repeat(64));
        assert_eq!(derive_implementation(&zero).unwrap(), format!("0x{}", "0".repeat(40)));
        assert_eq!(derive_implementation("0x").unwrap(), format!("0x{}", "0".repeat(40)));
    }

    #[test]
    fn derive_rejects_garbage_as_rpc_read() {
        match derive_implementation("0xnothex") {
            Err(VerifyError::RpcRead(TransportError::Other(msg))) => {
                assert_eq!(msg, "malformed storage slot value: 0xnothex")
            }
            other => panic!("unexpected: {other:?}"),
        }
        let too_long = format!("0x{}", "1".repeat(66));
        assert!(matches!(
            derive_implementation(&too_long),
            Err(VerifyError::RpcRead(TransportError::Other(_)))
        ));
    }

    #[tokio::test]
    async fn garbage_slot_word_from_node_is_rpc_read_error() {
        let reader = SlotReader::new(Arc::new(FakeTransport {
            answer: Ok(Value::String("0xzz".into())),
            seen: Mutex::new(vec![]),
        }));
        assert!(matches!(reader.resolve(PROXY).await, Err(VerifyError::RpcRead(_))));
    }

    #[tokio::test]
    async fn reader_queries_impl_slot_at_latest() {
        let transport = Arc::new(FakeTransport {
            answer: Ok(Value::String(
                "0x000000000000000000000000beefbeefbeefbeefbeefbeefbeefbeefbeefbeef".into(),
            )),
            seen: Mutex::new(vec![]),
        });
        let reader = SlotReader::new(transport.clone());
        let implementation = reader.resolve(PROXY).await.unwrap();
        assert_eq!(implementation, format!("0x{}", "beef".repeat(10)));

        let seen = transport.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].method, "eth_getStorageAt");
        assert_eq!(seen[0].params[0], PROXY);
        assert_eq!(seen[0].params[1], EIP1967_IMPL_SLOT);
        assert_eq!(seen[0].params[2], "latest");
    }

    #[tokio::test]
    async fn reader_rejects_invalid_address_without_calling_out() {
        let transport = Arc::new(FakeTransport {
            answer: Ok(Value::String("0x".into())),
            seen: Mutex::new(vec![]),
        });
        let reader = SlotReader::new(transport.clone());
        let err = reader.resolve("0xnope").await.unwrap_err();
        assert!(matches!(err, VerifyError::InvalidAddress(_)));
        assert!(transport.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn transport_failure_is_rpc_read_error() {
        let reader = SlotReader::new(Arc::new(DownTransport));
        let err = reader.resolve(PROXY).await.unwrap_err();
        match err {
            VerifyError::RpcRead(TransportError::Http(msg)) => assert_eq!(msg, "connection refused"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn node_error_and_non_string_result_are_rpc_read_errors() {
        let reader = SlotReader::new(Arc::new(FakeTransport {
            answer: Err(JsonRpcError {
                code: -32000,
                message: "missing trie node".into(),
                data: None,
            }),
            seen: Mutex::new(vec![]),
        }));
        assert!(matches!(
            reader.resolve(PROXY).await,
            Err(VerifyError::RpcRead(TransportError::Rpc(_)))
        ));

        let reader = SlotReader::new(Arc::new(FakeTransport {
            answer: Ok(Value::Null),
            seen: Mutex::new(vec![]),
        }));
        assert!(matches!(reader.resolve(PROXY).await, Err(VerifyError::RpcRead(_))));
    }
}
