//! Resource quantities, as in `cpu: 500m` or `memory: 16Gi`.

use crate::{Error, Result};

/// Parses a quantity into thousandths of its base unit, rounding up.
///
/// Decimal (`n`, `u`, `m`, `k`, `M`, `G`, `T`, `P`, `E`), binary (`Ki` .. `Ei`), and exponent
/// (`1e3`) forms are accepted.
pub fn parse_milli(quantity: &str) -> Result<i128> {
    let invalid = || Error::Invalid(format!("invalid quantity {quantity:?}"));
    let quantity = quantity.trim();
    let split = quantity
        .find(|c: char| !(c.is_ascii_digit() || c == '.' || c == '+' || c == '-'))
        .unwrap_or(quantity.len());
    let (number, suffix) = quantity.split_at(split);
    if number.is_empty() {
        return Err(invalid());
    }

    // Scale as a (numerator, denominator) pair so binary suffixes stay exact.
    let (num, den): (i128, i128) = match suffix {
        "" => (1, 1),
        "n" => (1, 1_000_000_000),
        "u" => (1, 1_000_000),
        "m" => (1, 1_000),
        "k" => (1_000, 1),
        "M" => (1_000_000, 1),
        "G" => (1_000_000_000, 1),
        "T" => (1_000_000_000_000, 1),
        "P" => (1_000_000_000_000_000, 1),
        "E" => (1_000_000_000_000_000_000, 1),
        "Ki" => (1 << 10, 1),
        "Mi" => (1 << 20, 1),
        "Gi" => (1 << 30, 1),
        "Ti" => (1 << 40, 1),
        "Pi" => (1 << 50, 1),
        "Ei" => (1 << 60, 1),
        exp if exp.starts_with(['e', 'E']) => {
            let exp = exp[1..].parse::<i32>().map_err(|_| invalid())?;
            if !(-18..=18).contains(&exp) {
                return Err(invalid());
            }
            if exp >= 0 {
                (10i128.pow(exp as u32), 1)
            } else {
                (1, 10i128.pow(exp.unsigned_abs()))
            }
        }
        _ => return Err(invalid()),
    };

    let (negative, digits) = match number.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, number.strip_prefix('+').unwrap_or(number)),
    };
    let (whole, frac) = digits.split_once('.').unwrap_or((digits, ""));
    if whole.is_empty() && frac.is_empty() {
        return Err(invalid());
    }
    if !whole.chars().chain(frac.chars()).all(|c| c.is_ascii_digit()) || frac.len() > 18 {
        return Err(invalid());
    }

    let digits = format!("{whole}{frac}");
    let mantissa = digits
        .trim_start_matches('0')
        .parse::<i128>()
        .or_else(|e| if digits.trim_start_matches('0').is_empty() { Ok(0) } else { Err(e) })
        .map_err(|_| invalid())?;
    let scale = 10i128.pow(frac.len() as u32);

    let numerator = mantissa
        .checked_mul(num)
        .and_then(|v| v.checked_mul(1_000))
        .ok_or_else(invalid)?;
    let denominator = scale * den;
    let milli = (numerator + denominator - 1) / denominator;
    Ok(if negative { -milli } else { milli })
}
