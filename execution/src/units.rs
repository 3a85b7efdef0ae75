//! Fixed-point currency amounts.
//!
//! Tables hold integer minor units. A currency with `decimals = 2` counts hundredths, so `0.1`
//! whole coins is `10` units.

use colorpot_types::MAX_CURRENCY_DECIMALS;

/// Parse a plain decimal such as `"0.15"` into minor units.
///
/// Signs, exponents, empty input, more significant fractional digits than the currency carries
/// and values past `u64::MAX` all yield `None`.
pub fn parse_units(raw: &str, decimals: u8) -> Option<u64> {
    if decimals > MAX_CURRENCY_DECIMALS {
        return None;
    }
    let (whole, fraction) = raw.split_once('.').unwrap_or((raw, ""));
    if whole.is_empty() && fraction.is_empty() {
        return None;
    }
    if !whole
        .bytes()
        .chain(fraction.bytes())
        .all(|byte| byte.is_ascii_digit())
    {
        return None;
    }

    let fraction = fraction.trim_end_matches('0');
    let places = u32::try_from(fraction.len()).ok()?;
    if places > u32::from(decimals) {
        return None;
    }

    let scale = 10u64.pow(u32::from(decimals));
    let whole: u64 = if whole.is_empty() { 0 } else { whole.parse().ok()? };
    let fraction: u64 = if fraction.is_empty() {
        0
    } else {
        fraction.parse::<u64>().ok()? * 10u64.pow(u32::from(decimals) - places)
    };
    whole.checked_mul(scale)?.checked_add(fraction)
}
