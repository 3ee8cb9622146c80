//! Flag-computation helpers shared by the data-processing handlers.

/// Adds `a + b + carry_in` and returns `(result, carry_out, overflow)`.
///
/// The carry/overflow derivation follows the ARM `AddWithCarry` pseudocode:
/// carry is the unsigned wrap of the 33-bit sum, overflow the signed wrap.
#[must_use]
pub fn add_with_carry(a: u32, b: u32, carry_in: bool) -> (u32, bool, bool) {
    let unsigned = u64::from(a) + u64::from(b) + u64::from(carry_in);
    let signed = i64::from(a as i32) + i64::from(b as i32) + i64::from(carry_in);
    let result = unsigned as u32;

    let carry = u64::from(result) != unsigned;
    let overflow = i64::from(result as i32) != signed;
    (result, carry, overflow)
}

/// Logical shift left by `amount` (0..=255). Returns the result and the last
/// bit shifted out, or `None` when the shift amount is zero and the carry is
/// architecturally unchanged.
#[must_use]
pub fn lsl_carry(value: u32, amount: u32) -> (u32, Option<bool>) {
    match amount {
        0 => (value, None),
        1..=31 => (value << amount, Some(value & (1 << (32 - amount)) != 0)),
        32 => (0, Some(value & 1 != 0)),
        _ => (0, Some(false)),
    }
}

/// Logical shift right; `amount` semantics as [`lsl_carry`].
#[must_use]
pub fn lsr_carry(value: u32, amount: u32) -> (u32, Option<bool>) {
    match amount {
        0 => (value, None),
        1..=31 => (value >> amount, Some(value & (1 << (amount - 1)) != 0)),
        32 => (0, Some(value & 0x8000_0000 != 0)),
        _ => (0, Some(false)),
    }
}

/// Arithmetic shift right; amounts of 32 or more saturate to the sign bit.
#[must_use]
pub fn asr_carry(value: u32, amount: u32) -> (u32, Option<bool>) {
    match amount {
        0 => (value, None),
        1..=31 => (
            ((value as i32) >> amount) as u32,
            Some(value & (1 << (amount - 1)) != 0),
        ),
        _ => {
            let sign = value & 0x8000_0000 != 0;
            (if sign { u32::MAX } else { 0 }, Some(sign))
        }
    }
}

/// Rotate right; the carry out is the new top bit for nonzero rotations.
#[must_use]
pub fn ror_carry(value: u32, amount: u32) -> (u32, Option<bool>) {
    if amount == 0 {
        return (value, None);
    }
    let rotation = amount % 32;
    let result = value.rotate_right(rotation);
    (result, Some(result & 0x8000_0000 != 0))
}
