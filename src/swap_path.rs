use alloy_primitives::{Address, Bytes};

use crate::errors::ValidationError;

/// Fee tiers probed when enumerating candidate routes. Route liquidity
/// cannot be predicted analytically, so every tier is tried.
pub const FEE_TIERS: [u32; 4] = [100, 500, 3000, 10000];

const FEE_SIZE: usize = 3;

/// Encode a multi-hop swap route: for each hop the 20-byte token address
/// followed by a 3-byte big-endian fee tier, terminated by the final token
/// address.
///
/// The output is canonical: identical logical routes always encode to
/// identical bytes, so the encoding is usable as a dedup key and for
/// on-chain comparison.
pub fn encode_path(tokens: &[Address], fees: &[u32]) -> Result<Bytes, ValidationError> {
    if tokens.len() < 2 {
        return Err(ValidationError::TooShort);
    }
    if tokens.len() != fees.len() + 1 {
        return Err(ValidationError::LengthMismatch {
            tokens: tokens.len(),
            fees: fees.len(),
        });
    }

    let mut encoded = Vec::with_capacity(tokens.len() * 20 + fees.len() * FEE_SIZE);
    for (token, fee) in tokens.iter().zip(fees) {
        encoded.extend_from_slice(token.as_slice());
        encoded.extend_from_slice(&fee.to_be_bytes()[1..]);
    }
    encoded.extend_from_slice(tokens[tokens.len() - 1].as_slice());

    Ok(Bytes::from(encoded))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn addr(n: u8) -> Address {
        Address::from_slice(&[n; 20])
    }

    #[test]
    fn single_hop_is_43_bytes() {
        let path = encode_path(&[addr(0xaa), addr(0xbb)], &[3000]).unwrap();
        assert_eq!(path.len(), 20 + 3 + 20);
        // 3000 = 0x000bb8 big-endian in the fee slot
        assert_eq!(&path[20..23], &[0x00, 0x0b, 0xb8]);
    }

    #[test]
    fn two_hop_layout() {
        let path = encode_path(&[addr(1), addr(2), addr(3)], &[500, 10000]).unwrap();
        assert_eq!(path.len(), 20 + 3 + 20 + 3 + 20);
        assert_eq!(&path[20..23], &[0x00, 0x01, 0xf4]);
        assert_eq!(&path[43..46], &[0x00, 0x27, 0x10]);
        assert_eq!(&path[46..66], addr(3).as_slice());
    }

    #[test]
    fn deterministic_and_injective() {
        let a = encode_path(&[addr(1), addr(2)], &[3000]).unwrap();
        let b = encode_path(&[addr(1), addr(2)], &[3000]).unwrap();
        assert_eq!(a, b);

        let c = encode_path(&[addr(1), addr(2)], &[500]).unwrap();
        let d = encode_path(&[addr(2), addr(1)], &[3000]).unwrap();
        assert_ne!(a, c);
        assert_ne!(a, d);
    }

    #[test]
    fn length_mismatch_is_rejected() {
        let err = encode_path(&[addr(1), addr(2), addr(3)], &[3000]).unwrap_err();
        assert_eq!(err, ValidationError::LengthMismatch { tokens: 3, fees: 1 });

        let err = encode_path(&[addr(1)], &[]).unwrap_err();
        assert_eq!(err, ValidationError::TooShort);
    }

    #[test]
    fn known_encoding_matches_reference() {
        // Route WETH -> 3000 -> USDC on well-known mainnet addresses.
        let weth = Address::from_str("0xC02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2").unwrap();
        let usdc = Address::from_str("0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48").unwrap();
        let path = encode_path(&[weth, usdc], &[3000]).unwrap();
        assert_eq!(
            hex::encode(&path),
            "c02aaa39b223fe8d0a0e5c4f27ead9083c756cc2000bb8a0b86991c6218b36c1d19d4a2e9eb0ce3606eb48"
        );
    }
}
