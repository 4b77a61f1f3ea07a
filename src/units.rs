use color_eyre::eyre::{
    Result,
    eyre,
};

fn scale(decimals: u32) -> u64 {
    10u64.saturating_pow(decimals)
}

/// Renders an on-chain amount in human units, trimming trailing zeros
/// (`5_000_000` with 8 decimals is `0.05`).
pub fn format_amount(base_units: u64, decimals: u32) -> String {
    let one_unit = scale(decimals);
    let whole = base_units / one_unit;
    let fractional = base_units % one_unit;
    if fractional == 0 {
        format!("{}", whole)
    } else {
        let digits = format!("{:0width$}", fractional, width = decimals as usize);
        format!("{}.{}", whole, digits.trim_end_matches('0'))
    }
}

/// Parses a human-readable amount into base units. Digits beyond the
/// coin's precision are rejected rather than rounded.
pub fn parse_amount(human: &str, decimals: u32) -> Result<u64> {
    let human = human.trim();
    let (whole, fractional) = match human.split_once('.') {
        Some((w, f)) => (w, f),
        None => (human, ""),
    };
    if whole.is_empty() && fractional.is_empty() {
        return Err(eyre!("empty amount"));
    }
    if !whole.chars().all(|c| c.is_ascii_digit())
        || !fractional.chars().all(|c| c.is_ascii_digit())
    {
        return Err(eyre!("invalid amount '{human}'"));
    }
    if fractional.len() > decimals as usize {
        return Err(eyre!(
            "amount '{human}' has more than {decimals} decimal places"
        ));
    }
    let whole_units = if whole.is_empty() {
        0
    } else {
        whole
            .parse::<u64>()
            .map_err(|e| eyre!("invalid amount '{human}': {e}"))?
    };
    let padded = format!("{:0<width$}", fractional, width = decimals as usize);
    let fractional_units = if padded.is_empty() {
        0
    } else {
        padded
            .parse::<u64>()
            .map_err(|e| eyre!("invalid amount '{human}': {e}"))?
    };
    whole_units
        .checked_mul(scale(decimals))
        .and_then(|w| w.checked_add(fractional_units))
        .ok_or_else(|| eyre!("amount '{human}' overflows"))
}
