//! P00: 8-byte magic `"C64File\0"`, 16-byte PETSCII name, 1 padding byte,
//! 1 REL-record-size byte, then the raw PRG payload (itself starting
//! with its own 2-byte load address).

use crate::error::{Result, Vc64Error};

const MAGIC: &[u8; 8] = b"C64File\0";

pub struct P00 {
    pub name: [u8; 16],
    pub rel_record_size: u8,
    pub data: Vec<u8>,
}

pub fn parse(bytes: &[u8]) -> Result<P00> {
    if bytes.len() < 26 || &bytes[0..8] != MAGIC {
        return Err(Vc64Error::Rom("not a P00 file".into()));
    }
    let mut name = [0u8; 16];
    name.copy_from_slice(&bytes[8..24]);
    let rel_record_size = bytes[25];
    Ok(P00 { name, rel_record_size, data: bytes[26..].to_vec() })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_header_and_payload() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(MAGIC);
        bytes.extend_from_slice(&[b'H', b'I'].iter().chain([0u8; 14].iter()).copied().collect::<Vec<u8>>());
        bytes.push(0); // padding
        bytes.push(0); // rel record size
        bytes.extend_from_slice(&[0x01, 0x08, 0xAA]);
        let p00 = parse(&bytes).expect("valid");
        assert_eq!(&p00.name[0..2], b"HI");
        assert_eq!(p00.data, vec![0x01, 0x08, 0xAA]);
    }

    #[test]
    fn rejects_bad_magic() {
        assert!(parse(&[0u8; 30]).is_err());
    }
}
