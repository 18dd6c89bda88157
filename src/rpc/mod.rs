mod client;
mod fees;
mod state;
mod types;

pub use client::{RetryConfig, RpcClient};
pub use fees::RpcFeeOracle;
pub use state::RpcChainState;
pub use types::{Balance, RuntimeDispatchInfo};
