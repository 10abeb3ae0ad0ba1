//! GCR (group-coded recording) encode/decode for 1541 disk tracks.
//!
//! Every 4-bit nibble is expanded to a 5-bit GCR code; four data bytes (8
//! nibbles) pack into five GCR bytes. Sectors are framed by a sync run of
//! 0xFF bytes followed by a header block and a data block, each carrying
//! a simple XOR checksum.

use crate::fs::d64::D64;

/// 4-bit nibble → 5-bit GCR code, as burned into the 1541's ROM table.
const ENCODE: [u8; 16] = [
    0b01010, 0b01011, 0b10010, 0b10011, 0b01110, 0b01111, 0b10110, 0b10111, 0b01001, 0b11001,
    0b11010, 0b11011, 0b01101, 0b11101, 0b11110, 0b10101,
];

fn decode_nibble(code: u8) -> Option<u8> {
    ENCODE.iter().position(|&c| c == code).map(|n| n as u8)
}

/// Pack 4 data bytes (8 nibbles) into 5 GCR bytes.
fn encode_group(data: &[u8; 4]) -> [u8; 5] {
    let nibbles = [
        data[0] >> 4,
        data[0] & 0x0F,
        data[1] >> 4,
        data[1] & 0x0F,
        data[2] >> 4,
        data[2] & 0x0F,
        data[3] >> 4,
        data[3] & 0x0F,
    ];
    let codes: Vec<u32> = nibbles.iter().map(|&n| ENCODE[n as usize] as u32).collect();
    let bits: u64 = codes.iter().fold(0u64, |acc, &c| (acc << 5) | c as u64);
    let bits = bits << (40 - 40); // already 40 bits
    [
        (bits >> 32) as u8,
        (bits >> 24) as u8,
        (bits >> 16) as u8,
        (bits >> 8) as u8,
        bits as u8,
    ]
}

/// Unpack 5 GCR bytes into 4 data bytes. Returns `None` on an invalid
/// 5-bit code (used to detect corrupted/unwritten sectors).
pub fn decode_gcr_group(gcr: &[u8; 5]) -> Option<[u8; 4]> {
    let bits: u64 = gcr.iter().fold(0u64, |acc, &b| (acc << 8) | b as u64);
    let mut nibbles = [0u8; 8];
    for (i, nibble) in nibbles.iter_mut().enumerate() {
        let shift = 35 - i * 5;
        let code = ((bits >> shift) & 0x1F) as u8;
        *nibble = decode_nibble(code)?;
    }
    Some([
        (nibbles[0] << 4) | nibbles[1],
        (nibbles[2] << 4) | nibbles[3],
        (nibbles[4] << 4) | nibbles[5],
        (nibbles[6] << 4) | nibbles[7],
    ])
}

/// Decode a 325-byte GCR data block (1 marker + 256 payload + 1 checksum +
/// 2 off bytes, GCR-expanded 260 → 325) back into the 256-byte sector
/// payload. Returns `None` on checksum mismatch or undecodable nibbles.
pub fn decode_data_block(gcr: &[u8]) -> Option<Vec<u8>> {
    if gcr.len() < 325 {
        return None;
    }
    let mut decoded = Vec::with_capacity(260);
    for chunk in gcr[..325].chunks(5) {
        let arr: [u8; 5] = chunk.try_into().ok()?;
        decoded.extend_from_slice(&decode_gcr_group(&arr)?);
    }
    if decoded[0] != 0x07 {
        return None;
    }
    let payload = &decoded[1..257];
    let checksum = decoded[257];
    let computed = payload.iter().fold(0u8, |acc, &b| acc ^ b);
    if computed != checksum {
        return None;
    }
    Some(payload.to_vec())
}

/// Cycles of the drive's ~1 MHz clock consumed per GCR byte, by speed
/// zone. Outer tracks spin the same angular rate but pack bits at a
/// higher linear density, so they're clocked faster.
pub fn cycles_per_byte(track: u8) -> u32 {
    match track {
        1..=17 => 26,
        18..=24 => 28,
        25..=30 => 30,
        _ => 32,
    }
}

fn encode_header(track: u8, sector: u8, id: [u8; 2]) -> Vec<u8> {
    let checksum = sector ^ track ^ id[0] ^ id[1];
    let payload = [0x08, checksum, sector, track, id[1], id[0], 0x0F, 0x0F];
    let mut out = Vec::with_capacity(10);
    out.extend_from_slice(&encode_group(&[payload[0], payload[1], payload[2], payload[3]]));
    out.extend_from_slice(&encode_group(&[payload[4], payload[5], payload[6], payload[7]]));
    out
}

fn encode_data(payload: &[u8; 256]) -> Vec<u8> {
    let checksum = payload.iter().fold(0u8, |acc, &b| acc ^ b);
    let mut full = Vec::with_capacity(260);
    full.push(0x07);
    full.extend_from_slice(payload);
    full.push(checksum);
    full.push(0x00);
    full.push(0x00);
    let mut out = Vec::with_capacity(325);
    for chunk in full.chunks(4) {
        let mut arr = [0u8; 4];
        arr[..chunk.len()].copy_from_slice(chunk);
        out.extend_from_slice(&encode_group(&arr));
    }
    out
}

/// Encode a whole track's worth of sectors (header + sync + data, gaps
/// between sectors) into the byte stream the drive head scans.
pub fn encode_track(d64: &D64, track: u8) -> Vec<u8> {
    let sectors = crate::fs::d64::sectors_per_track(track);
    let id = d64.disk_id();
    let mut out = Vec::new();
    for sector in 0..sectors {
        out.extend(std::iter::repeat_n(0xFFu8, 5));
        out.extend(encode_header(track, sector, id));
        out.extend(std::iter::repeat_n(0x55u8, 9)); // header gap
        out.extend(std::iter::repeat_n(0xFFu8, 5));
        let mut payload = [0u8; 256];
        if let Some(block) = d64.read_block_raw(track, sector) {
            payload.copy_from_slice(block);
        }
        out.extend(encode_data(&payload));
        out.extend(std::iter::repeat_n(0x55u8, 8)); // inter-sector gap
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_decode_group_roundtrips() {
        let data = [0x12, 0x34, 0x56, 0x78];
        let gcr = encode_group(&data);
        let back = decode_gcr_group(&gcr).expect("valid code");
        assert_eq!(back, data);
    }

    #[test]
    fn decode_data_block_verifies_checksum() {
        let mut payload = [0u8; 256];
        for (i, b) in payload.iter_mut().enumerate() {
            *b = i as u8;
        }
        let gcr = encode_data(&payload);
        let decoded = decode_data_block(&gcr).expect("checksum ok");
        assert_eq!(decoded, payload.to_vec());
    }

    #[test]
    fn speed_zones_match_known_boundaries() {
        assert_eq!(cycles_per_byte(1), 26);
        assert_eq!(cycles_per_byte(18), 28);
        assert_eq!(cycles_per_byte(25), 30);
        assert_eq!(cycles_per_byte(35), 32);
    }
}
