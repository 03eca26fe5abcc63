//! Conversion of raw on-chain integer amounts to display units.

use crate::error::ExplorerError;

pub const LAMPORTS_PER_SOL: f64 = 1_000_000_000.0;

/// Scale a decimal integer string (wei, token base units) by `10^decimals`.
///
/// Values beyond `u128` (large ERC-20 supplies) still parse, with f64
/// precision.
pub fn scale_units(raw: &str, decimals: u32) -> Result<f64, ExplorerError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(0.0);
    }
    let value = match raw.parse::<u128>() {
        Ok(v) => v as f64,
        Err(_) => raw
            .parse::<f64>()
            .map_err(|_| ExplorerError::Parse(format!("invalid amount '{}'", raw)))?,
    };
    Ok(value / 10f64.powi(decimals as i32))
}

pub fn lamports_to_sol(lamports: u64) -> f64 {
    lamports as f64 / LAMPORTS_PER_SOL
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scale_wei() {
        let eth = scale_units("1500000000000000000", 18).unwrap();
        assert!((eth - 1.5).abs() < 1e-12);
    }

    #[test]
    fn test_scale_empty_is_zero() {
        assert_eq!(scale_units("", 18).unwrap(), 0.0);
        assert_eq!(scale_units("0", 6).unwrap(), 0.0);
    }

    #[test]
    fn test_scale_beyond_u128() {
        let huge = "1000000000000000000000000000000000000000000000000";
        let scaled = scale_units(huge, 18).unwrap();
        assert!((scaled / 1e30 - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_scale_rejects_garbage() {
        assert!(scale_units("12abc", 18).is_err());
    }

    #[test]
    fn test_lamports() {
        assert_eq!(lamports_to_sol(13_900_000), 0.0139);
    }
}
