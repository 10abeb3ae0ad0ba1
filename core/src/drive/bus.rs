//! Address decode for the 1541's own 6502: 2 KiB RAM (mirrored through
//! $07FF), two 6522 VIAs at $1800/$1C00 (16-byte register blocks,
//! mirrored through their 1 KiB windows), and 16 KiB ROM at $C000-$FFFF.

use crate::core::{Bus, BusMaster, bus::InterruptState};

use super::via6522::Via6522;

pub struct Drive1541Bus {
    ram: [u8; 0x0800],
    rom: Vec<u8>,
    pub via1: Via6522,
    pub via2: Via6522,
}

impl Drive1541Bus {
    pub fn new(rom: Vec<u8>) -> Self {
        Self {
            ram: [0; 0x0800],
            rom,
            via1: Via6522::new(),
            via2: Via6522::new(),
        }
    }

    pub fn rom(&self) -> &[u8] {
        &self.rom
    }

    pub fn read_rom_byte(&self, addr: u16) -> u8 {
        let off = addr as usize & 0x3FFF;
        self.rom.get(off % self.rom.len()).copied().unwrap_or(0xFF)
    }

    /// Current externally-observed Port B input latch, for callers that
    /// only want to flip a subset of bits before writing it back.
    pub fn via1_external_b(&self) -> u8 {
        self.via1.port_b_output()
    }

    pub fn via2_external_b(&self) -> u8 {
        self.via2.port_b_output()
    }

    pub fn reset(&mut self) {
        self.ram = [0; 0x0800];
        self.via1.reset();
        self.via2.reset();
    }
}

impl crate::serialize::Snapshot for Drive1541Bus {
    /// ROM is the 1541's firmware image, loaded once at construction.
    fn write_persistent(&self, w: &mut crate::serialize::Writer) {
        w.bytes(&self.rom);
    }

    fn write_reset(&self, w: &mut crate::serialize::Writer) {
        use crate::serialize::Snapshot;
        w.fixed_bytes(&self.ram);
        self.via1.write_reset(w);
        self.via2.write_reset(w);
    }

    fn read_persistent(&mut self, r: &mut crate::serialize::Reader) -> crate::error::Result<()> {
        self.rom = r.bytes()?;
        Ok(())
    }

    fn read_reset(&mut self, r: &mut crate::serialize::Reader) -> crate::error::Result<()> {
        use crate::serialize::Snapshot;
        self.ram.copy_from_slice(&r.fixed_bytes(0x0800)?);
        self.via1.read_reset(r)?;
        self.via2.read_reset(r)?;
        Ok(())
    }
}

impl Bus for Drive1541Bus {
    type Address = u16;
    type Data = u8;

    fn read(&mut self, _master: BusMaster, addr: u16) -> u8 {
        match addr {
            0x0000..=0x07FF => self.ram[addr as usize & 0x07FF],
            0x1800..=0x1BFF => self.via1.read((addr & 0x0F) as u8),
            0x1C00..=0x1FFF => self.via2.read((addr & 0x0F) as u8),
            0xC000..=0xFFFF => {
                let off = (addr - 0xC000) as usize;
                self.rom.get(off % self.rom.len()).copied().unwrap_or(0xFF)
            }
            _ => 0xFF,
        }
    }

    fn write(&mut self, _master: BusMaster, addr: u16, data: u8) {
        match addr {
            0x0000..=0x07FF => self.ram[addr as usize & 0x07FF] = data,
            0x1800..=0x1BFF => self.via1.write((addr & 0x0F) as u8, data),
            0x1C00..=0x1FFF => self.via2.write((addr & 0x0F) as u8, data),
            _ => {}
        }
    }

    fn is_halted_for(&self, _master: BusMaster) -> bool {
        false
    }

    fn check_interrupts(&self, _target: BusMaster) -> InterruptState {
        InterruptState {
            nmi: false,
            irq: self.via1.irq_active() || self.via2.irq_active(),
            firq: false,
        }
    }
}
