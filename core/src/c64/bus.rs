//! The C64's main address bus: PLA banking decode plus the
//! peripherals it routes to. Mirrors [`crate::drive::bus::Drive1541Bus`]'s
//! shape, but with a banking table instead of a flat decode, since the
//! 6510's own I/O port participates in the decode here.

use crate::cartridge::{Cartridge, CartridgeLines as CartLines, NoCartridge};
use crate::cia::Cia;
use crate::cpu::mos6510::Port6510;
use crate::core::{Bus, BusMaster, bus::InterruptState};
use crate::memory::{Bank, CartridgeLines as PlaCartLines, DRegion, Memory, Pla, PortDecode};
use crate::sid::Sid;
use crate::vic::{Vic, VicBus};

/// Bridges the cartridge crate's notion of GAME/EXROM to the PLA's, which
/// are the same two booleans under different names from two modules that
/// otherwise know nothing about each other.
fn pla_lines(lines: CartLines) -> PlaCartLines {
    PlaCartLines { game: lines.game, exrom: lines.exrom }
}

/// Read-only view of [`Memory`] the VIC-II sees through its own 16K bank,
/// built fresh each tick since the bank base can change between ticks
/// (CIA2 port A) but never mid-cycle.
pub struct VicBusView<'a> {
    memory: &'a Memory,
    bank_base: u16,
}

impl<'a> VicBusView<'a> {
    pub fn new(memory: &'a Memory, bank_base: u16) -> Self {
        Self { memory, bank_base }
    }
}

impl<'a> VicBus for VicBusView<'a> {
    fn vic_read(&self, addr: u16) -> u8 {
        let real = self.bank_base.wrapping_add(addr & 0x3FFF);
        // Banks 0 and 2 show character ROM, not RAM, at $1000-$1FFF
        // regardless of $01 banking (the VIC has no access to the PLA's
        // CPU-facing ROM overlays; this one is wired directly).
        if matches!(self.bank_base, 0x0000 | 0x8000) && (0x1000..0x2000).contains(&(addr & 0x3FFF)) {
            return self.memory.char_read(addr);
        }
        self.memory.ram_read(real)
    }

    fn color_ram_read(&self, addr: u16) -> u8 {
        self.memory.color_ram_read(addr & 0x03FF)
    }
}

/// CIA2 port A bits 0-1 select the VIC's 16K bank, active-low (a set bit
/// releases the line, which reads back as a 0 meaning "selected").
pub fn vic_bank_base(cia2: &Cia) -> u16 {
    let bank = (!cia2.port_a()) & 0x03;
    (bank as u16) << 14
}

/// Everything the main 6510 addresses: RAM/ROM/banking (via [`Memory`]),
/// the two CIAs, VIC-II, SID, and the cartridge port. Split out from
/// [`super::C64`] so the CPU and the bus it reads through are disjoint
/// struct fields — `cpu.tick_with_bus(&mut bus, ...)` needs that split to
/// borrow-check at all.
pub struct C64Bus {
    pub memory: Memory,
    pub port: Port6510,
    pub cia1: Cia,
    pub cia2: Cia,
    pub vic: Vic,
    pub sid: Sid,
    pub cartridge: Box<dyn Cartridge>,
    /// Last address written this cycle, surfaced to the scheduler's
    /// watchpoint check via `CycleOutcome::write_address`.
    pub last_write: Option<u16>,
}

impl C64Bus {
    pub fn new(memory: Memory, vic: Vic, sid: Sid) -> Self {
        let mut bus = Self {
            memory,
            port: Port6510::new(),
            cia1: Cia::new(),
            cia2: Cia::new(),
            vic,
            sid,
            cartridge: Box::new(NoCartridge),
            last_write: None,
        };
        bus.sync_pla();
        bus
    }

    pub fn reset(&mut self) {
        self.port.reset();
        self.cia1.reset();
        self.cia2.reset();
        self.vic.reset();
        self.sid.reset();
        self.sync_pla();
    }

    pub fn set_cartridge(&mut self, cartridge: Box<dyn Cartridge>) {
        self.cartridge = cartridge;
        self.sync_pla();
    }

    pub fn eject_cartridge(&mut self) {
        self.cartridge = Box::new(NoCartridge);
        self.sync_pla();
    }

    /// Recompute the PLA's decode inputs from the 6510 port and the
    /// current cartridge's GAME/EXROM lines. Called whenever either
    /// changes; `Memory` owns the `Pla` itself (and serializes it), so
    /// this just pushes the latest inputs into it.
    fn sync_pla(&mut self) {
        let port = PortDecode::from(self.port.read());
        let cart = pla_lines(self.cartridge.lines());
        self.memory.pla.update(port, cart);
    }

    fn io_read(&mut self, addr: u16) -> u8 {
        match Pla::io_region(addr) {
            DRegion::Vic => self.vic.read(addr),
            DRegion::Sid => self.sid.read((addr & 0x1F) as u8),
            DRegion::ColorRam => self.memory.color_ram_read(addr & 0x03FF),
            DRegion::Cia1 => self.cia1.read((addr & 0x0F) as u8),
            DRegion::Cia2 => self.cia2.read((addr & 0x0F) as u8),
            DRegion::CartIo1 => self.cartridge.read_io1(addr),
            DRegion::CartIo2 => self.cartridge.read_io2(addr),
            DRegion::Unmapped => 0xFF,
        }
    }

    fn io_write(&mut self, addr: u16, value: u8) {
        match Pla::io_region(addr) {
            DRegion::Vic => self.vic.write(addr, value),
            DRegion::Sid => self.sid.write((addr & 0x1F) as u8, value),
            DRegion::ColorRam => self.memory.color_ram_write(addr & 0x03FF, value),
            DRegion::Cia1 => self.cia1.write((addr & 0x0F) as u8, value),
            DRegion::Cia2 => self.cia2.write((addr & 0x0F) as u8, value),
            DRegion::CartIo1 => self.cartridge.write_io1(addr, value),
            DRegion::CartIo2 => self.cartridge.write_io2(addr, value),
            DRegion::Unmapped => {}
        }
    }
}

impl Bus for C64Bus {
    type Address = u16;
    type Data = u8;

    fn read(&mut self, _master: BusMaster, addr: u16) -> u8 {
        if addr == 0 {
            return self.port.ddr();
        }
        if addr == 1 {
            return self.port.read();
        }
        match self.memory.pla.classify_read(addr) {
            Bank::Io => self.io_read(addr),
            Bank::CartridgeLoRom => self.cartridge.read_rom_lo(addr),
            Bank::CartridgeHiRom => self.cartridge.read_rom_hi(addr),
            bank => self.memory.read_non_io(addr, bank).unwrap_or(0xFF),
        }
    }

    fn write(&mut self, _master: BusMaster, addr: u16, data: u8) {
        self.last_write = Some(addr);
        if addr == 0 {
            self.port.write_ddr(data);
            self.sync_pla();
            return;
        }
        if addr == 1 {
            self.port.write_data(data);
            self.sync_pla();
            return;
        }
        // Bank-switch writes into the cartridge ROM window take effect
        // even though `classify_write` resolves the write itself to RAM
        // (the real bus has RAM underneath the ROM overlay at these
        // addresses; only Ocean decodes the write as a bank select).
        if matches!(self.memory.pla.classify_read(addr), Bank::CartridgeLoRom) {
            self.cartridge.write_rom_lo(addr, data);
        }
        match self.memory.pla.classify_write(addr) {
            Bank::Io => self.io_write(addr, data),
            bank => {
                self.memory.write_non_io(addr, bank, data);
            }
        }
    }

    fn is_halted_for(&self, _master: BusMaster) -> bool {
        self.vic.ba_low()
    }

    fn check_interrupts(&self, _target: BusMaster) -> InterruptState {
        InterruptState {
            nmi: self.cia2.irq_active(),
            irq: self.cia1.irq_active() || self.vic.irq_active(),
            firq: false,
        }
    }
}

impl crate::serialize::Snapshot for C64Bus {
    fn write_persistent(&self, w: &mut crate::serialize::Writer) {
        use crate::serialize::Snapshot;
        self.memory.write_persistent(w);
        self.cartridge.write_state(w);
    }

    fn write_reset(&self, w: &mut crate::serialize::Writer) {
        use crate::serialize::Snapshot;
        self.memory.write_reset(w);
        self.port.write_reset(w);
        self.cia1.write_reset(w);
        self.cia2.write_reset(w);
        self.vic.write_reset(w);
        self.sid.write_reset(w);
    }

    fn read_persistent(&mut self, r: &mut crate::serialize::Reader) -> crate::error::Result<()> {
        use crate::serialize::Snapshot;
        self.memory.read_persistent(r)?;
        self.cartridge.read_state(r)?;
        Ok(())
    }

    fn read_reset(&mut self, r: &mut crate::serialize::Reader) -> crate::error::Result<()> {
        use crate::serialize::Snapshot;
        self.memory.read_reset(r)?;
        self.port.read_reset(r)?;
        self.cia1.read_reset(r)?;
        self.cia2.read_reset(r)?;
        self.vic.read_reset(r)?;
        self.sid.read_reset(r)?;
        Ok(())
    }
}
