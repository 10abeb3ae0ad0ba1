//! CRT cartridge container: a 64-byte header naming a cartridge type,
//! followed by one or more `CHIP` packets carrying the actual ROM/RAM/
//! FlashROM images for each bank.

use crate::cartridge::{Cartridge, EasyFlash, FinalIii, MagicDesk, NormalCartridge, Ocean};
use crate::error::{Result, Vc64Error};

const MAGIC: &[u8; 16] = b"C64 CARTRIDGE   ";
const CHIP_MAGIC: &[u8; 4] = b"CHIP";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChipType {
    Rom,
    Ram,
    FlashRom,
}

pub struct ChipPacket {
    pub chip_type: ChipType,
    pub bank: u16,
    pub load_address: u16,
    pub data: Vec<u8>,
}

pub struct Crt {
    pub cartridge_type: u16,
    pub exrom: u8,
    pub game: u8,
    pub name: [u8; 32],
    pub chips: Vec<ChipPacket>,
}

pub fn parse(bytes: &[u8]) -> Result<Crt> {
    if bytes.len() < 0x40 || &bytes[0..16] != MAGIC {
        return Err(Vc64Error::UnsupportedCartridge("not a CRT file".into()));
    }
    let header_size = u32::from_be_bytes([bytes[0x10], bytes[0x11], bytes[0x12], bytes[0x13]]) as usize;
    let cartridge_type = u16::from_be_bytes([bytes[0x16], bytes[0x17]]);
    let exrom = bytes[0x18];
    let game = bytes[0x19];
    let mut name = [0u8; 32];
    name.copy_from_slice(&bytes[0x20..0x40]);

    let mut chips = Vec::new();
    let mut offset = header_size.max(0x40);
    while offset + 16 <= bytes.len() {
        if &bytes[offset..offset + 4] != CHIP_MAGIC {
            return Err(Vc64Error::UnsupportedCartridge("bad CHIP packet magic".into()));
        }
        let packet_len = u32::from_be_bytes([
            bytes[offset + 4],
            bytes[offset + 5],
            bytes[offset + 6],
            bytes[offset + 7],
        ]) as usize;
        let chip_type = match u16::from_be_bytes([bytes[offset + 8], bytes[offset + 9]]) {
            0 => ChipType::Rom,
            1 => ChipType::Ram,
            2 => ChipType::FlashRom,
            other => return Err(Vc64Error::UnsupportedCartridge(format!("unknown CHIP type {other}"))),
        };
        let bank = u16::from_be_bytes([bytes[offset + 10], bytes[offset + 11]]);
        let load_address = u16::from_be_bytes([bytes[offset + 12], bytes[offset + 13]]);
        let data_size = u16::from_be_bytes([bytes[offset + 14], bytes[offset + 15]]) as usize;
        let data_start = offset + 16;
        let data = bytes
            .get(data_start..data_start + data_size)
            .ok_or_else(|| Vc64Error::UnsupportedCartridge("CHIP data runs past end of file".into()))?
            .to_vec();
        chips.push(ChipPacket { chip_type, bank, load_address, data });
        offset += packet_len.max(16);
    }

    Ok(Crt { cartridge_type, exrom, game, name, chips })
}

/// Concatenate every chip's data in bank order, the layout the simpler
/// (non-FlashROM) cartridge variants expect their ROM image in.
fn flatten_banks(chips: &[ChipPacket]) -> Vec<u8> {
    let mut ordered: Vec<&ChipPacket> = chips.iter().collect();
    ordered.sort_by_key(|c| c.bank);
    ordered.into_iter().flat_map(|c| c.data.clone()).collect()
}

/// Instantiate the cartridge variant named by `cartridge_type` (the CRT
/// hardware-type codes used by VICE and the wider tooling ecosystem).
pub fn build_cartridge(crt: &Crt) -> Result<Box<dyn Cartridge>> {
    let rom = flatten_banks(&crt.chips);
    match crt.cartridge_type {
        0 => Ok(Box::new(NormalCartridge::new(rom))),
        19 => Ok(Box::new(MagicDesk::new(rom))),
        27 => Ok(Box::new(FinalIii::new(rom))),
        5 => Ok(Box::new(Ocean::new(rom))),
        32 => {
            let mid = rom.len() / 2;
            Ok(Box::new(EasyFlash::new(rom[..mid].to_vec(), rom[mid..].to_vec())))
        }
        other => Err(Vc64Error::UnsupportedCartridge(format!("cartridge type {other} not supported"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build_crt(cartridge_type: u16, chip_data: &[u8]) -> Vec<u8> {
        let mut bytes = vec![0u8; 0x40];
        bytes[0..16].copy_from_slice(MAGIC);
        bytes[0x10..0x14].copy_from_slice(&0x40u32.to_be_bytes());
        bytes[0x16..0x18].copy_from_slice(&cartridge_type.to_be_bytes());

        let mut chip = Vec::new();
        chip.extend_from_slice(CHIP_MAGIC);
        let packet_len = (16 + chip_data.len()) as u32;
        chip.extend_from_slice(&packet_len.to_be_bytes());
        chip.extend_from_slice(&0u16.to_be_bytes()); // ROM
        chip.extend_from_slice(&0u16.to_be_bytes()); // bank 0
        chip.extend_from_slice(&0x8000u16.to_be_bytes());
        chip.extend_from_slice(&(chip_data.len() as u16).to_be_bytes());
        chip.extend_from_slice(chip_data);

        bytes.extend_from_slice(&chip);
        bytes
    }

    #[test]
    fn parses_header_and_single_chip_packet() {
        let data = [0xAAu8; 0x2000];
        let bytes = build_crt(0, &data);
        let crt = parse(&bytes).expect("valid");
        assert_eq!(crt.cartridge_type, 0);
        assert_eq!(crt.chips.len(), 1);
        assert_eq!(crt.chips[0].data.len(), 0x2000);
    }

    #[test]
    fn rejects_bad_magic() {
        assert!(parse(&[0u8; 64]).is_err());
    }

    #[test]
    fn builds_normal_cartridge_for_type_zero() {
        let data = [0x11u8; 0x2000];
        let bytes = build_crt(0, &data);
        let crt = parse(&bytes).expect("valid");
        let cart = build_cartridge(&crt).expect("supported type");
        assert_eq!(cart.read_rom_lo(0x8000), 0x11);
    }

    #[test]
    fn rejects_unsupported_cartridge_type() {
        let bytes = build_crt(9999, &[0u8; 0x2000]);
        let crt = parse(&bytes).expect("valid header");
        assert!(build_cartridge(&crt).is_err());
    }
}
