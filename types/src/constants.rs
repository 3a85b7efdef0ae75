/// Length of round commitments and reveals in bytes.
pub const COMMITMENT_LEN: usize = 32;

/// Denominator for commission rates expressed in basis points.
pub const BPS_DENOMINATOR: u64 = 10_000;

/// Highest commission a table may take (50%).
pub const MAX_COMMISSION_BPS: u64 = 5_000;

/// Smallest stake accepted unless a table overrides it.
pub const DEFAULT_MIN_BET: u64 = 1;

/// Tolerance used when checking that stake percentages sum to 100.
pub const PERCENT_TOLERANCE: f64 = 1e-6;

/// Wallet entry that collects the house commission.
pub const DEFAULT_HOUSE_ACCOUNT: &str = "house";

/// Decorative labels assigned to stakes when the caller supplies none.
pub const DEFAULT_PALETTE: [&str; 3] = ["red", "black", "green"];

/// Maximum length of a caller-supplied color label.
pub const MAX_COLOR_LABEL_LENGTH: usize = 32;

/// Maximum length of a user id.
pub const MAX_USER_ID_LENGTH: usize = 64;

/// Upper bound on archived rounds returned by a single history query.
pub const MAX_HISTORY_PAGE: usize = 100;

/// Currency of a table built from `TableConfig::default()`.
pub const DEFAULT_CURRENCY: &str = "stars";

/// Most decimal places a currency may declare; `10^18` still fits in a `u64`.
pub const MAX_CURRENCY_DECIMALS: u8 = 18;

/// Maximum length of a currency code.
pub const MAX_CURRENCY_CODE_LENGTH: usize = 16;
