//! System-wide constants for the treasury ledger.

/// Decimal places of the treasury token. On-chain amounts are
/// `amount * 10^TOKEN_DECIMALS` base units.
pub const DEFAULT_TOKEN_DECIMALS: u32 = 2;

/// Largest supported `token_decimals` (keeps base-unit scaling inside `Decimal`).
pub const MAX_TOKEN_DECIMALS: u32 = 18;

/// Default chain id (local development chain).
pub const DEFAULT_CHAIN_ID: u64 = 1337;

/// Default gas limit handed out by the static chain-context provider.
pub const DEFAULT_GAS_LIMIT: u64 = 6_721_975;

/// Default gas price in wei for the static chain-context provider.
pub const DEFAULT_GAS_PRICE: u64 = 20_000_000_000;

/// Default page number when a query does not specify one.
pub const DEFAULT_PAGE: usize = 1;

/// Default tracing filter directive.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Domain tag for the clearing pass digest.
pub const PASS_DIGEST_DOMAIN: &[u8] = b"treasury:clearing_pass:v1:";

/// Version string.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Service name.
pub const SERVICE_NAME: &str = "treasury";
