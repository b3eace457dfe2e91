//! Random one-time values. Backed by the OS RNG only; a failing RNG is an error,
//! never a weaker fallback.

use anyhow::Context;
use rand::{rngs::OsRng, RngCore};

const LOGIN_CODE_SPACE: u32 = 1_000_000;
// Largest multiple of LOGIN_CODE_SPACE that fits in a u32; draws at or above it are
// rejected so every code is equally likely.
const LOGIN_CODE_LIMIT: u32 = u32::MAX - (u32::MAX % LOGIN_CODE_SPACE);

fn random_u32() -> anyhow::Result<u32> {
    let mut buf = [0u8; 4];
    OsRng
        .try_fill_bytes(&mut buf)
        .context("secure random source unavailable")?;
    Ok(u32::from_be_bytes(buf))
}

/// Six decimal digits, uniform over 000000..=999999.
pub fn login_code() -> anyhow::Result<String> {
    loop {
        let n = random_u32()?;
        if n < LOGIN_CODE_LIMIT {
            return Ok(format!("{:06}", n % LOGIN_CODE_SPACE));
        }
    }
}

/// Eight uppercase hex characters.
pub fn invitation_code() -> anyhow::Result<String> {
    Ok(format!("{:08X}", random_u32()?))
}
