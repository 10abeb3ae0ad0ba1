//! The assembled machine: main 6510, [`bus::C64Bus`], attached VC1541
//! drives sharing one IEC bus, configuration, and the message queue
//! bridging to the host. Implements [`crate::scheduler::Runnable`] so a
//! [`crate::scheduler::Scheduler`] can drive it one cycle at a time.

pub mod bus;

use log::{debug, info, warn};

use crate::cartridge::Cartridge;
use crate::config::Config;
use crate::core::{BusMaster, BusMasterComponent};
use crate::cpu::{Cpu as _, mos6510::M6510};
use crate::drive::Drive1541;
use crate::error::{Result, Vc64Error};
use crate::formats::{crt, p00, prg, t64, tap};
use crate::fs::D64;
use crate::iec::IecBus;
use crate::memory::Memory;
use crate::message::{Message, MessageQueue};
use crate::scheduler::{CycleOutcome, Runnable};
use crate::serialize::{self, Reader, Snapshot, Writer};
use crate::sid::Sid;
use crate::vic::Vic;

use bus::{C64Bus, VicBusView, vic_bank_base};

/// Number of VC1541s that can share the IEC bus. [`IecBus`] itself tolerates
/// any drive index via `get_mut`, so this is only the bound this machine
/// chooses to expose, not a limit the bus enforces.
const DRIVE_COUNT: usize = 4;

fn vic_model_from_config(model: crate::config::VicModel) -> crate::vic::VicModel {
    use crate::config::VicModel as C;
    use crate::vic::VicModel as V;
    match model {
        C::Pal6569 => V::Pal6569,
        C::Ntsc6567 => V::Ntsc6567,
        C::Pal8565 => V::Pal8565,
        C::Ntsc8562 => V::Ntsc8562,
    }
}

/// Sender id this machine uses when posting to its own [`MessageQueue`].
const SENDER_MACHINE: u64 = 0;

pub struct C64 {
    cpu: M6510,
    bus: C64Bus,
    drives: [Option<Drive1541>; DRIVE_COUNT],
    iec: IecBus,
    config: Config,
    messages: MessageQueue,
    /// Cycles into the current frame; drives the TOD clocks' independent
    /// 50/60 Hz tick rate, which isn't once-per-PHI2-cycle like everything
    /// else on this bus.
    tod_cycle_accum: f64,
}

impl C64 {
    pub fn new(config: Config) -> Self {
        let memory = Memory::new();
        let vic = Vic::new(vic_model_from_config(config.vic_model));
        let mut sid = Sid::new();
        sid.set_clock_hz(if config.vic_model.is_pal() { 985_248.0 } else { 1_022_730.0 });

        let mut machine = Self {
            cpu: M6510::new(),
            bus: C64Bus::new(memory, vic, sid),
            drives: std::array::from_fn(|_| None),
            iec: IecBus::new(),
            config,
            messages: MessageQueue::new(),
            tod_cycle_accum: 0.0,
        };
        machine.bus.memory.init_ram_pattern(matches!(
            machine.config.ram_pattern,
            crate::config::RamPattern::InitC64C
        ));
        machine
    }

    pub fn messages(&mut self) -> &mut MessageQueue {
        &mut self.messages
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Apply a configuration change. Takes effect immediately; the host is
    /// expected to call this between frames (or `suspend()` the scheduler
    /// first) if it wants the change to land on a clean boundary.
    pub fn configure(&mut self, option: crate::config::ConfigOption, value: crate::config::ConfigValue) -> Result<()> {
        self.config.configure(option, value)?;
        Ok(())
    }

    /// Power-on reset: seats ROM reset vectors, clears peripheral state,
    /// reinitializes RAM to the configured pattern.
    pub fn power_on(&mut self) {
        info!("power-on reset");
        self.bus.memory.init_ram_pattern(matches!(
            self.config.ram_pattern,
            crate::config::RamPattern::InitC64C
        ));
        self.reset();
    }

    /// Soft reset: ROM/RAM contents untouched, everything else reseated.
    pub fn reset(&mut self) {
        if self.bus.memory.kernal_rom.iter().all(|&b| b == 0) {
            warn!("kernal ROM not loaded; CPU will run from empty memory");
            self.messages.put(SENDER_MACHINE, Message::RomMissing);
        }
        self.cpu.reset();
        self.bus.reset();
        self.cpu.reset_vector(&mut self.bus, BusMaster::Cpu(0));
        self.iec.reset();
        for drive in self.drives.iter_mut().flatten() {
            drive.reset();
        }
        self.tod_cycle_accum = 0.0;
    }

    pub fn load_kernal_rom(&mut self, data: &[u8]) -> Result<()> {
        load_rom_image(&mut self.bus.memory.kernal_rom, data)
    }

    pub fn load_basic_rom(&mut self, data: &[u8]) -> Result<()> {
        load_rom_image(&mut self.bus.memory.basic_rom, data)
    }

    pub fn load_char_rom(&mut self, data: &[u8]) -> Result<()> {
        load_rom_image(&mut self.bus.memory.char_rom, data)
    }

    pub fn load_drive_rom(&mut self, index: usize, data: Vec<u8>) -> Result<()> {
        if index >= DRIVE_COUNT {
            return Err(Vc64Error::Config(format!("drive index {index} out of range")));
        }
        self.drives[index] = Some(Drive1541::new(data, index));
        Ok(())
    }

    /// Inject a PRG directly into RAM the way a fast-loader or the host UI's
    /// drag-and-drop would, bypassing the drive entirely. `run` additionally
    /// pokes BASIC's `RUN` into the keyboard buffer's usual spot.
    pub fn load_prg(&mut self, data: &[u8]) -> Result<()> {
        let parsed = prg::parse(data)?;
        debug!("loading PRG at ${:04X}, {} bytes", parsed.load_address, parsed.data.len());
        for (offset, byte) in parsed.data.iter().enumerate() {
            self.bus.memory.ram_write(parsed.load_address.wrapping_add(offset as u16), *byte);
        }
        Ok(())
    }

    pub fn load_p00(&mut self, data: &[u8]) -> Result<()> {
        let parsed = p00::parse(data)?;
        debug!("loading P00 {:?}, {} bytes", parsed.name, parsed.data.len());
        let prg_bytes = parsed.data;
        if prg_bytes.len() < 2 {
            return Err(Vc64Error::Rom("P00 payload too short to contain a load address".into()));
        }
        let load_address = u16::from_le_bytes([prg_bytes[0], prg_bytes[1]]);
        for (offset, byte) in prg_bytes[2..].iter().enumerate() {
            self.bus.memory.ram_write(load_address.wrapping_add(offset as u16), *byte);
        }
        Ok(())
    }

    pub fn load_t64(&mut self, data: &[u8]) -> Result<()> {
        let entry = t64::parse_first_entry(data)?;
        debug!("loading T64 entry {:?} at ${:04X}", entry.name, entry.start_address);
        for (offset, byte) in entry.data.iter().enumerate() {
            self.bus.memory.ram_write(entry.start_address.wrapping_add(offset as u16), *byte);
        }
        Ok(())
    }

    /// Parse a TAP image and hand back its pulse stream; TAP playback drives
    /// CIA1's flag line externally and has no Memory-side effect to apply
    /// here, so the host owns feeding it in.
    pub fn parse_tap(data: &[u8]) -> Result<tap::Tap> {
        tap::parse(data)
    }

    pub fn load_crt(&mut self, data: &[u8]) -> Result<()> {
        let parsed = crt::parse(data)?;
        info!("loading cartridge {:?} (type {})", parsed.name, parsed.cartridge_type);
        let cartridge = crt::build_cartridge(&parsed)?;
        self.set_cartridge(cartridge);
        Ok(())
    }

    pub fn set_cartridge(&mut self, cartridge: Box<dyn Cartridge>) {
        self.bus.set_cartridge(cartridge);
    }

    pub fn eject_cartridge(&mut self) {
        self.bus.eject_cartridge();
    }

    pub fn insert_disk(&mut self, index: usize, d64: D64) -> Result<()> {
        let drive = self
            .drives
            .get_mut(index)
            .and_then(|d| d.as_mut())
            .ok_or_else(|| Vc64Error::Config(format!("no drive at index {index}")))?;
        drive.insert_disk(d64);
        self.messages.put(SENDER_MACHINE, Message::DiskInserted);
        Ok(())
    }

    pub fn eject_disk(&mut self, index: usize) {
        if let Some(Some(drive)) = self.drives.get_mut(index) {
            drive.eject_disk();
            self.messages.put(SENDER_MACHINE, Message::DiskEjected);
        }
    }

    pub fn framebuffer(&self) -> &[u32] {
        &self.bus.vic.framebuffer
    }

    pub fn take_frame_complete(&mut self) -> bool {
        self.bus.vic.take_frame_complete()
    }

    pub fn take_audio_samples(&mut self) -> Vec<i16> {
        self.bus.sid.take_sample_buffer()
    }

    /// Pushes CIA2 port A's serial-out bits onto the IEC bus, then reads the
    /// composite state back into CIA2's input bits. Port A bit layout:
    /// 3=ATN OUT, 4=CLK OUT, 5=DATA OUT (all active-high = asserting a pull
    /// low), 6=CLK IN, 7=DATA IN (active-low as read back from the bus).
    fn sync_host_iec(&mut self) {
        let out = self.bus.cia2.port_a();
        let atn_out = out & 0x08 != 0;
        let clk_out = out & 0x10 != 0;
        let data_out = out & 0x20 != 0;
        self.iec.set_host_output(atn_out, clk_out, data_out);

        let clk_in_bit = if self.iec.clk() { 0x40 } else { 0 };
        let data_in_bit = if self.iec.data() { 0x80 } else { 0 };
        let current = self.bus.cia2.port_a();
        self.bus.cia2.set_port_a_input((current & 0x3F) | clk_in_bit | data_in_bit);
    }

    fn tick_tod(&mut self, frame_hz: f64) {
        // TOD runs off the AC mains frequency, not PHI2; accumulate
        // fractional ticks against the configured model's frame rate.
        let tod_hz = if self.config.vic_model.is_pal() { 50.0 } else { 60.0 };
        self.tod_cycle_accum += tod_hz / (frame_hz * self.config.vic_model.cycles_per_frame() as f64);
        if self.tod_cycle_accum >= 1.0 {
            self.tod_cycle_accum -= 1.0;
            self.bus.cia1.tick_tod();
            self.bus.cia2.tick_tod();
        }
    }
}

fn load_rom_image(dest: &mut [u8], data: &[u8]) -> Result<()> {
    if data.len() != dest.len() {
        return Err(Vc64Error::Rom(format!(
            "expected {} byte ROM image, got {}",
            dest.len(),
            data.len()
        )));
    }
    dest.copy_from_slice(data);
    Ok(())
}

impl Runnable for C64 {
    fn execute_one_cycle(&mut self) -> CycleOutcome {
        self.sync_host_iec();
        for drive in self.drives.iter_mut().flatten() {
            drive.tick(&mut self.iec);
        }
        self.sync_host_iec();

        self.bus.last_write = None;
        let fetch_complete = self.cpu.tick_with_bus(&mut self.bus, BusMaster::Cpu(0));

        let bank_base = vic_bank_base(&self.bus.cia2);
        let view = VicBusView::new(&self.bus.memory, bank_base);
        self.bus.vic.tick(&view);

        self.bus.cia1.tick(false);
        self.bus.cia2.tick(false);
        self.bus.sid.tick();
        self.bus.port.tick();
        self.tick_tod(self.config.vic_model.frame_rate_hz());

        if self.cpu.jam {
            self.messages.put(SENDER_MACHINE, Message::CpuJammed);
        }

        CycleOutcome {
            jammed: self.cpu.jam,
            instruction_retired: fetch_complete,
            write_address: self.bus.last_write.take(),
        }
    }

    fn cycles_per_line(&self) -> u32 {
        self.config.vic_model.cycles_per_line() as u32
    }

    fn raster_lines(&self) -> u32 {
        self.config.vic_model.raster_lines() as u32
    }

    fn frame_nanos(&self) -> u64 {
        (1_000_000_000.0 / self.config.vic_model.frame_rate_hz()) as u64
    }

    fn pc(&self) -> u16 {
        self.cpu.pc
    }

    fn take_snapshot(&self) -> Vec<u8> {
        let mut w = Writer::default();
        serialize::write_header(&mut w);
        self.cpu.write_persistent(&mut w);
        self.cpu.write_reset(&mut w);
        self.bus.write_persistent(&mut w);
        self.bus.write_reset(&mut w);
        self.iec.write_persistent(&mut w);
        self.iec.write_reset(&mut w);
        w.u8(self.drives.iter().filter(|d| d.is_some()).count() as u8);
        for (index, drive) in self.drives.iter().enumerate() {
            if let Some(drive) = drive {
                w.u8(index as u8);
                drive.write_persistent(&mut w);
                drive.write_reset(&mut w);
            }
        }
        w.into_bytes()
    }

    fn restore_snapshot(&mut self, data: &[u8]) -> Result<()> {
        let mut r = Reader::new(data);
        serialize::read_header(&mut r)?;
        self.cpu.read_persistent(&mut r)?;
        self.cpu.read_reset(&mut r)?;
        self.bus.read_persistent(&mut r)?;
        self.bus.read_reset(&mut r)?;
        self.iec.read_persistent(&mut r)?;
        self.iec.read_reset(&mut r)?;
        let drive_count = r.u8()?;
        for _ in 0..drive_count {
            let index = r.u8()? as usize;
            let drive = self
                .drives
                .get_mut(index)
                .and_then(|d| d.as_mut())
                .ok_or_else(|| Vc64Error::Integrity(format!("snapshot references unknown drive {index}")))?;
            drive.read_persistent(&mut r)?;
            drive.read_reset(&mut r)?;
        }
        Ok(())
    }
}
