//! chainverify-core: types, classifiers and seams for ChainVerify.
//!
//! # Overview
//!
//! ChainVerify keeps the explorer verification state of deployed EIP-1967
//! proxies. The core crate holds everything that does not need a socket:
//!
//! - [`slot`]: implementation address from the EIP-1967 storage slot
//! - [`classify`]: verifier CLI output → [`VerificationStatus`]
//! - [`explorer`]: explorer API / HTML → [`VerificationRecord`]
//! - [`VerificationCache`]: TTL cache with an injectable [`Clock`]
//! - [`SingleFlight`]: one running task per proxy address
//! - [`poller`]: client-side trigger-then-poll loop
//! - [`token_config`]: launch configuration checks
//! - [`policy`]: token bucket gating explorer calls
//! - [`RpcTransport`]: the JSON-RPC seam implemented by `chainverify-http`

pub mod address;
pub mod cache;
pub mod classify;
pub mod error;
pub mod explorer;
pub mod inflight;
pub mod network;
pub mod policy;
pub mod poller;
pub mod record;
pub mod request;
pub mod slot;
pub mod token_config;
pub mod transport;

pub use address::{is_valid_address, normalize_address};
pub use cache::{Clock, ManualClock, SystemClock, VerificationCache};
pub use classify::{classify_output, Classification};
pub use error::{TransportError, VerifyError};
pub use explorer::ExplorerStatus;
pub use inflight::{FlightAborted, SingleFlight};
pub use network::ExplorerProfile;
pub use poller::{BackendError, PollOutcome, PollStrategy, Poller, PollerConfig, VerificationBackend};
pub use record::{StatusSource, VerificationRecord, VerificationRequest, VerificationStatus, VerifyOutcome};
pub use request::{JsonRpcRequest, JsonRpcResponse, RpcId};
pub use slot::{ImplementationResolver, SlotReader, EIP1967_IMPL_SLOT};
pub use transport::RpcTransport;
