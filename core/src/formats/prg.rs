//! PRG: a 2-byte little-endian load address followed by raw bytes.

use crate::error::{Result, Vc64Error};

pub struct Prg {
    pub load_address: u16,
    pub data: Vec<u8>,
}

pub fn parse(bytes: &[u8]) -> Result<Prg> {
    if bytes.len() < 2 {
        return Err(Vc64Error::Rom("PRG file too short for a load address".into()));
    }
    let load_address = u16::from_le_bytes([bytes[0], bytes[1]]);
    Ok(Prg { load_address, data: bytes[2..].to_vec() })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_load_address_and_payload() {
        let bytes = [0x01, 0x08, 0xAA, 0xBB];
        let prg = parse(&bytes).expect("valid");
        assert_eq!(prg.load_address, 0x0801);
        assert_eq!(prg.data, vec![0xAA, 0xBB]);
    }

    #[test]
    fn rejects_too_short_input() {
        assert!(parse(&[0x01]).is_err());
    }
}
