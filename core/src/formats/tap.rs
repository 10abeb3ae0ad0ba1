//! TAP datasette tape image: 12-byte magic `"C64-TAPE-RAW"`, version byte,
//! 3 reserved bytes, little-endian data length, then raw pulse-length
//! bytes. There is no datasette/cassette-port component in this core, so
//! this parser only exposes the header and pulse stream for a host-side
//! player — it does not decode pulses into loaded program bytes.

use crate::error::{Result, Vc64Error};

const MAGIC: &[u8; 12] = b"C64-TAPE-RAW";

pub struct Tap {
    pub version: u8,
    pub pulses: Vec<u8>,
}

pub fn parse(bytes: &[u8]) -> Result<Tap> {
    if bytes.len() < 20 || &bytes[0..12] != MAGIC {
        return Err(Vc64Error::Rom("not a TAP file".into()));
    }
    let version = bytes[12];
    let data_len = u32::from_le_bytes([bytes[16], bytes[17], bytes[18], bytes[19]]) as usize;
    let pulses = bytes
        .get(20..20 + data_len)
        .ok_or_else(|| Vc64Error::Rom("TAP data length exceeds file size".into()))?
        .to_vec();
    Ok(Tap { version, pulses })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_header_and_pulse_stream() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(MAGIC);
        bytes.push(1); // version
        bytes.extend_from_slice(&[0, 0, 0]);
        bytes.extend_from_slice(&3u32.to_le_bytes());
        bytes.extend_from_slice(&[0x30, 0x40, 0x50]);
        let tap = parse(&bytes).expect("valid");
        assert_eq!(tap.version, 1);
        assert_eq!(tap.pulses, vec![0x30, 0x40, 0x50]);
    }
}
