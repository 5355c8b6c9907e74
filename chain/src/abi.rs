//! Minimal ABI encoding for the token contract calls the tool makes.

use payout_types::Address;

use crate::error::ChainError;

/// `transfer(address,uint256)`
pub const TRANSFER_SELECTOR: [u8; 4] = [0xa9, 0x05, 0x9c, 0xbb];
/// `balanceOf(address)`
pub const BALANCE_OF_SELECTOR: [u8; 4] = [0x70, 0xa0, 0x82, 0x31];
/// `checkpoint(address,uint256,uint256,bytes)`
pub const CHECKPOINT_SELECTOR: [u8; 4] = [0xd3, 0x39, 0x2d, 0xdf];

fn word_from_address(address: &Address) -> [u8; 32] {
    let mut word = [0u8; 32];
    word[12..].copy_from_slice(&address.to_bytes());
    word
}

fn word_from_u64(value: u64) -> [u8; 32] {
    let mut word = [0u8; 32];
    word[24..].copy_from_slice(&value.to_be_bytes());
    word
}

pub fn encode_balance_of(owner: &Address) -> Vec<u8> {
    let mut data = Vec::with_capacity(4 + 32);
    data.extend_from_slice(&BALANCE_OF_SELECTOR);
    data.extend_from_slice(&word_from_address(owner));
    data
}

pub fn encode_transfer(to: &Address, amount: u64) -> Vec<u8> {
    let mut data = Vec::with_capacity(4 + 64);
    data.extend_from_slice(&TRANSFER_SELECTOR);
    data.extend_from_slice(&word_from_address(to));
    data.extend_from_slice(&word_from_u64(amount));
    data
}

/// Encode a claim checkpoint. `signature_hex` may carry a `0x` prefix.
pub fn encode_checkpoint(
    owner: &Address,
    amount: u64,
    timestamp: u64,
    signature_hex: &str,
) -> Result<Vec<u8>, ChainError> {
    let signature = hex::decode(signature_hex.trim_start_matches("0x"))
        .map_err(|e| ChainError::InvalidResponse(format!("claim signature is not hex: {e}")))?;

    let padded_len = signature.len().div_ceil(32) * 32;
    let mut data = Vec::with_capacity(4 + 5 * 32 + padded_len);
    data.extend_from_slice(&CHECKPOINT_SELECTOR);
    data.extend_from_slice(&word_from_address(owner));
    data.extend_from_slice(&word_from_u64(amount));
    data.extend_from_slice(&word_from_u64(timestamp));
    // Offset of the dynamic `bytes` argument: four head words.
    data.extend_from_slice(&word_from_u64(4 * 32));
    data.extend_from_slice(&word_from_u64(signature.len() as u64));
    data.extend_from_slice(&signature);
    data.resize(4 + 5 * 32 + padded_len, 0);
    Ok(data)
}

/// Decode a 32-byte big-endian return word as `u64`.
pub fn decode_u64_word(word: &[u8]) -> Result<u64, ChainError> {
    if word.len() != 32 {
        return Err(ChainError::InvalidResponse(format!(
            "expected 32-byte return value, got {} bytes",
            word.len()
        )));
    }
    if word[..24].iter().any(|b| *b != 0) {
        return Err(ChainError::Overflow(hex::encode(word)));
    }
    let mut tail = [0u8; 8];
    tail.copy_from_slice(&word[24..]);
    Ok(u64::from_be_bytes(tail))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(byte: &str) -> Address {
        Address::parse(&format!("0x{}", byte.repeat(20))).unwrap()
    }

    #[test]
    fn transfer_layout() {
        let data = encode_transfer(&addr("ab"), 693);
        assert_eq!(data.len(), 68);
        assert_eq!(&data[..4], &TRANSFER_SELECTOR);
        assert!(data[4..16].iter().all(|b| *b == 0));
        assert!(data[16..36].iter().all(|b| *b == 0xab));
        assert_eq!(decode_u64_word(&data[36..68]).unwrap(), 693);
    }

    #[test]
    fn balance_of_layout() {
        let data = encode_balance_of(&addr("01"));
        assert_eq!(data.len(), 36);
        assert_eq!(&data[..4], &BALANCE_OF_SELECTOR);
    }

    #[test]
    fn checkpoint_pads_signature() {
        let sig = "11".repeat(65);
        let data = encode_checkpoint(&addr("02"), 150, 1_700_000_000, &format!("0x{sig}")).unwrap();
        // selector + 4 head words + length word + 65 bytes padded to 96
        assert_eq!(data.len(), 4 + 5 * 32 + 96);
        assert_eq!(decode_u64_word(&data[4 + 96..4 + 128]).unwrap(), 128);
        assert_eq!(decode_u64_word(&data[4 + 128..4 + 160]).unwrap(), 65);
        assert!(data[4 + 160 + 65..].iter().all(|b| *b == 0));
    }

    #[test]
    fn checkpoint_rejects_bad_signature() {
        assert!(encode_checkpoint(&addr("02"), 1, 1, "zz").is_err());
    }

    #[test]
    fn decode_rejects_overflow() {
        let mut word = [0u8; 32];
        word[0] = 1;
        assert!(matches!(decode_u64_word(&word), Err(ChainError::Overflow(_))));
    }
}
