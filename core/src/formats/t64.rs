//! T64 tape image: a 64-byte container header followed by one 32-byte
//! directory entry per contained program, each pointing at a payload
//! offset elsewhere in the file. We extract only what's needed to load
//! the first program entry as a PRG-equivalent byte stream.

use crate::error::{Result, Vc64Error};

pub struct T64Entry {
    pub name: [u8; 16],
    pub start_address: u16,
    pub data: Vec<u8>,
}

pub fn parse_first_entry(bytes: &[u8]) -> Result<T64Entry> {
    if bytes.len() < 64 + 32 {
        return Err(Vc64Error::Rom("T64 file too short".into()));
    }
    let used_entries = u16::from_le_bytes([bytes[0x24], bytes[0x25]]);
    if used_entries == 0 {
        return Err(Vc64Error::Rom("T64 image has no directory entries".into()));
    }

    let dir = &bytes[64..64 + 32];
    let start_address = u16::from_le_bytes([dir[2], dir[3]]);
    let end_address = u16::from_le_bytes([dir[4], dir[5]]);
    let file_offset = u32::from_le_bytes([dir[8], dir[9], dir[10], dir[11]]) as usize;
    let mut name = [0u8; 16];
    name.copy_from_slice(&dir[16..32]);

    let len = (end_address.wrapping_sub(start_address)) as usize;
    let data = bytes
        .get(file_offset..file_offset + len)
        .ok_or_else(|| Vc64Error::Rom("T64 payload offset out of range".into()))?
        .to_vec();

    Ok(T64Entry { name, start_address, data })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build_t64(payload: &[u8], start: u16) -> Vec<u8> {
        let mut bytes = vec![0u8; 64];
        bytes[0x24] = 1; // used entries = 1
        let mut dir = vec![0u8; 32];
        dir[0] = 1; // entry used
        dir[1] = 1; // PRG
        dir[2..4].copy_from_slice(&start.to_le_bytes());
        let end = start + payload.len() as u16;
        dir[4..6].copy_from_slice(&end.to_le_bytes());
        let offset = (bytes.len() + dir.len()) as u32;
        dir[8..12].copy_from_slice(&offset.to_le_bytes());
        dir[16..19].copy_from_slice(b"HI ");
        bytes.extend_from_slice(&dir);
        bytes.extend_from_slice(payload);
        bytes
    }

    #[test]
    fn extracts_first_program_payload() {
        let payload = [0xDE, 0xAD, 0xBE, 0xEF];
        let bytes = build_t64(&payload, 0x0801);
        let entry = parse_first_entry(&bytes).expect("valid");
        assert_eq!(entry.start_address, 0x0801);
        assert_eq!(entry.data, payload);
    }
}
