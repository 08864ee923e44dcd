//! RK numbers: the 32-bit compressed number encoding used by `RK` and `MULRK` cells.
//!
//! Bit 0 means "divide by 100", bit 1 selects a 30-bit signed integer over the upper 30 bits of
//! an IEEE754 double.

const RK_DIV_100: i32 = 0x01;
const RK_INTEGER: i32 = 0x02;

pub fn decode_rk(rk: i32) -> f64 {
    let value = if rk & RK_INTEGER != 0 {
        // Arithmetic shift keeps the sign of the 30-bit integer.
        f64::from(rk >> 2)
    } else {
        let hi = (rk as u32) & 0xFFFF_FFFC;
        f64::from_bits(u64::from(hi) << 32)
    };
    if rk & RK_DIV_100 != 0 {
        value / 100.0
    } else {
        value
    }
}

/// Encode `value` as an RK number if it decodes back to exactly the same `f64`.
pub fn encode_rk(value: f64) -> Option<i32> {
    if let Some(rk) = integer_rk(value) {
        return Some(rk);
    }
    if let Some(rk) = float_rk(value) {
        return Some(rk);
    }
    let scaled = value * 100.0;
    [integer_rk(scaled.round()), float_rk(scaled)]
        .into_iter()
        .flatten()
        .map(|rk| rk | RK_DIV_100)
        .find(|&rk| decode_rk(rk).to_bits() == value.to_bits())
}

fn integer_rk(value: f64) -> Option<i32> {
    const MIN: f64 = -((1u32 << 29) as f64);
    const MAX: f64 = ((1u32 << 29) - 1) as f64;
    if value.fract() != 0.0 || !(MIN..=MAX).contains(&value) {
        return None;
    }
    // -0.0 would come back as +0.0.
    if value == 0.0 && value.is_sign_negative() {
        return None;
    }
    Some(((value as i32) << 2) | RK_INTEGER)
}

fn float_rk(value: f64) -> Option<i32> {
    let bits = value.to_bits();
    if bits & 0x0000_0003_FFFF_FFFF != 0 {
        return None;
    }
    Some((bits >> 32) as u32 as i32)
}
