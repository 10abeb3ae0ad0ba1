//! VC1541 floppy drive: its own 6502, two 6522 VIAs, GCR head
//! model over an inserted D64 image.
//!
//! VIA1 ($1800) bridges the IEC bus: port B bit 0 = DATA IN, bit 1 = DATA
//! OUT, bit 2 = CLK IN, bit 3 = CLK OUT, bit 4 = ATN ACK (pulls DATA low
//! in response to ATN), bit 7 = ATN IN (active-low). CA1 is wired
//! directly to the ATN line for edge detection.
//!
//! VIA2 ($1C00) is the disk controller: port A is the GCR data byte under
//! the read/write head; port B bit 0-1 select stepper phase, bit 2 is
//! motor-on, bit 3 the LED, bit 4 write-protect sense, bit 7 SYNC detect
//! (active-low). CB1 pulses on every byte boundary (byte-ready IRQ); CB2
//! selects read (1) vs write (0) mode.

mod bus;
pub mod via6522;

pub mod gcr;

use crate::core::{Bus, BusMaster, component::BusMasterComponent};
use crate::cpu::M6510;
use crate::fs::d64::D64;
use crate::iec::IecBus;

pub use bus::Drive1541Bus;

pub struct Drive1541 {
    cpu: M6510,
    bus: Drive1541Bus,
    d64: Option<D64>,
    current_track: u8,
    half_track: u8,
    motor_on: bool,
    led_on: bool,
    gcr_track: Vec<u8>,
    gcr_position: usize,
    byte_counter: u32,
    prev_stepper_phase: u8,
    prev_atn: bool,
    prev_byte_ready: bool,
    write_mode: bool,
    write_buffer: Vec<u8>,
    /// Index of this drive's contributor slot on the shared `IecBus`.
    bus_index: usize,
}

impl Drive1541 {
    /// `rom` must be the 16 KiB (or 32 KiB, for the 1541-II's dual image)
    /// 1541 ROM.
    pub fn new(rom: Vec<u8>, bus_index: usize) -> Self {
        let drive_bus = Drive1541Bus::new(rom);
        let mut cpu = M6510::new();
        let lo = drive_bus.read_rom_byte(0x3FFC);
        let hi = drive_bus.read_rom_byte(0x3FFD);
        cpu.pc = u16::from(lo) | (u16::from(hi) << 8);

        Self {
            cpu,
            bus: drive_bus,
            d64: None,
            current_track: 18,
            half_track: 34,
            motor_on: false,
            led_on: false,
            gcr_track: Vec::new(),
            gcr_position: 0,
            byte_counter: 0,
            prev_stepper_phase: 0,
            prev_atn: true,
            prev_byte_ready: false,
            write_mode: false,
            write_buffer: Vec::new(),
            bus_index,
        }
    }

    pub fn reset(&mut self) {
        self.bus.reset();
        self.cpu = M6510::new();
        let lo = self.bus.read_rom_byte(0x3FFC);
        let hi = self.bus.read_rom_byte(0x3FFD);
        self.cpu.pc = u16::from(lo) | (u16::from(hi) << 8);
    }

    pub fn insert_disk(&mut self, d64: D64) {
        self.d64 = Some(d64);
        self.encode_current_track();
    }

    pub fn eject_disk(&mut self) {
        self.d64 = None;
        self.gcr_track.clear();
        self.gcr_position = 0;
    }

    pub fn has_disk(&self) -> bool {
        self.d64.is_some()
    }

    pub fn track(&self) -> u8 {
        self.current_track
    }

    pub fn motor_on(&self) -> bool {
        self.motor_on
    }

    pub fn led_on(&self) -> bool {
        self.led_on
    }

    /// Advance the drive by one cycle. Must be called once per C64 master
    /// cycle (both CPUs run at roughly 1 MHz) to preserve IEC timing.
    pub fn tick(&mut self, iec: &mut IecBus) {
        self.update_via1_from_iec(iec);

        let atn_level = !iec.atn();
        if atn_level != self.prev_atn {
            self.bus.via1.set_ca1(atn_level);
            self.prev_atn = atn_level;
        }

        self.cpu.tick_with_bus(&mut self.bus, BusMaster::Cpu(0));
        self.bus.via1.tick();
        self.bus.via2.tick();

        self.update_iec_from_via1(iec);
        self.update_mechanics();
        self.advance_disk();
    }

    fn update_via1_from_iec(&mut self, iec: &IecBus) {
        let mut ext = self.bus.via1_external_b();
        ext = (ext & !0x01) | if !iec.data() { 0x01 } else { 0x00 };
        ext = (ext & !0x04) | if !iec.clk() { 0x04 } else { 0x00 };
        ext = (ext & !0x80) | if iec.atn() { 0x80 } else { 0x00 };
        self.bus.via1.set_port_b_input(ext);
    }

    fn update_iec_from_via1(&mut self, iec: &mut IecBus) {
        let pb = self.bus.via1.port_b_output();
        let atn_ack = pb & 0x10 != 0;
        iec.set_drive_data(self.bus_index, (pb & 0x02 != 0) || atn_ack);
        iec.set_drive_clk(self.bus_index, pb & 0x08 != 0);
    }

    fn update_mechanics(&mut self) {
        let pb = self.bus.via2.port_b_output();
        self.motor_on = pb & 0x04 != 0;
        self.led_on = pb & 0x08 != 0;

        let phase = pb & 0x03;
        if phase != self.prev_stepper_phase {
            self.step_head(phase);
            self.prev_stepper_phase = phase;
        }

        let wp = if self.d64.is_some() { 0x10 } else { 0x00 };
        let ext = (self.bus.via2_external_b() & !0x10) | wp;
        self.bus.via2.set_port_b_input(ext);

        let crb = self.bus.via2.read(0x0C); // PCR
        let cb2_low = (crb & 0xE0) == 0xC0;
        let was_writing = self.write_mode;
        self.write_mode = cb2_low;
        if was_writing && !self.write_mode {
            self.flush_write_buffer();
        }
    }

    fn advance_disk(&mut self) {
        if !self.motor_on || self.gcr_track.is_empty() {
            return;
        }

        self.byte_counter += 1;
        let cpb = gcr::cycles_per_byte(self.current_track);

        if self.byte_counter < cpb {
            if self.prev_byte_ready {
                self.bus.via2.set_cb1(false);
                self.prev_byte_ready = false;
            }
            return;
        }
        self.byte_counter = 0;

        if self.write_mode {
            let byte = self.bus.via2.port_a_output();
            if self.gcr_position < self.gcr_track.len() {
                self.gcr_track[self.gcr_position] = byte;
            }
            self.write_buffer.push(byte);
        } else {
            let byte = self.gcr_track[self.gcr_position];
            self.bus.via2.set_port_a_input(byte);
            let in_sync = byte == 0xFF;
            let ext = (self.bus.via2_external_b() & !0x80) | if in_sync { 0x00 } else { 0x80 };
            self.bus.via2.set_port_b_input(ext);
        }

        self.gcr_position += 1;
        if self.gcr_position >= self.gcr_track.len() {
            self.gcr_position = 0;
        }

        if !self.prev_byte_ready {
            self.bus.via2.set_cb1(true);
        }
        self.prev_byte_ready = true;
    }

    fn flush_write_buffer(&mut self) {
        if self.write_buffer.is_empty() || self.d64.is_none() {
            self.write_buffer.clear();
            return;
        }

        let sector_num = self.find_sector_at_track_position();
        let mut writes: Vec<(u8, Vec<u8>)> = Vec::new();
        let buf = &self.write_buffer;
        let mut i = 0;
        while i + 5 + 325 <= buf.len() {
            if buf[i..i + 5].iter().all(|&b| b == 0xFF) {
                let gcr_start = i + 5;
                if gcr_start + 325 <= buf.len() {
                    if let Some(data) = gcr::decode_data_block(&buf[gcr_start..gcr_start + 325]) {
                        if let Some(sector) = sector_num {
                            writes.push((sector, data));
                        }
                    }
                }
                i = gcr_start + 325;
            } else {
                i += 1;
            }
        }
        self.write_buffer.clear();

        let track = self.current_track;
        if let Some(d64) = self.d64.as_mut() {
            for (sector, data) in &writes {
                let _ = d64.write_sector(track, *sector, data);
            }
        }
        self.encode_current_track();
    }

    fn find_sector_at_track_position(&self) -> Option<u8> {
        if self.gcr_track.is_empty() {
            return None;
        }
        let len = self.gcr_track.len();
        let start = if self.gcr_position == 0 { len - 1 } else { self.gcr_position - 1 };

        for offset in 0..len {
            let pos = (start + len - offset) % len;
            let mut sync_count = 0;
            for j in 0..5 {
                if self.gcr_track[(pos + len - j) % len] == 0xFF {
                    sync_count += 1;
                } else {
                    break;
                }
            }
            if sync_count >= 5 {
                let hdr_start = (pos + 1) % len;
                if hdr_start + 5 <= len {
                    let mut group = [0u8; 5];
                    group.copy_from_slice(&self.gcr_track[hdr_start..hdr_start + 5]);
                    if let Some(decoded) = gcr::decode_gcr_group(&group) {
                        if decoded[0] == 0x08 {
                            return Some(decoded[2]);
                        }
                    }
                }
            }
        }
        None
    }

    /// 4-phase stepper: incrementing phases step inward (higher track),
    /// decrementing phases step outward.
    fn step_head(&mut self, new_phase: u8) {
        let delta = (new_phase as i8 - self.prev_stepper_phase as i8 + 4) % 4;
        match delta {
            1 => {
                if self.half_track < 69 {
                    self.half_track += 1;
                }
            }
            3 => {
                if self.half_track > 0 {
                    self.half_track -= 1;
                }
            }
            _ => {}
        }

        let new_track = (self.half_track / 2) + 1;
        if new_track != self.current_track {
            self.current_track = new_track;
            self.encode_current_track();
        }
    }

    /// Half-tracks carry no valid sync data on real media; fill with
    /// zeros so the drive ROM's sync-search never finds a header there.
    fn encode_current_track(&mut self) {
        let on_half_track = self.half_track & 1 != 0;
        if on_half_track || !(1..=35).contains(&self.current_track) {
            self.gcr_track = vec![0x00; 7692];
            self.gcr_position = 0;
            return;
        }

        if let Some(d64) = self.d64.as_ref() {
            self.gcr_track = gcr::encode_track(d64, self.current_track);
            if self.gcr_position >= self.gcr_track.len() {
                self.gcr_position = 0;
            }
        } else {
            self.gcr_track.clear();
            self.gcr_position = 0;
        }
    }
}

impl crate::serialize::Snapshot for Drive1541 {
    /// Everything `Drive1541::reset()` leaves untouched: the firmware
    /// image, the inserted disk, the mechanical head position, and the
    /// in-flight GCR track buffer.
    fn write_persistent(&self, w: &mut crate::serialize::Writer) {
        use crate::serialize::Snapshot;
        w.u32(self.bus_index as u32);
        self.bus.write_persistent(w);
        w.bool(self.d64.is_some());
        if let Some(d64) = &self.d64 {
            w.bytes(&d64.export_volume());
        }
        w.u8(self.current_track);
        w.u8(self.half_track);
        w.bool(self.motor_on);
        w.bool(self.led_on);
        w.bytes(&self.gcr_track);
        w.u32(self.gcr_position as u32);
        w.u32(self.byte_counter);
        w.u8(self.prev_stepper_phase);
        w.bool(self.prev_atn);
        w.bool(self.prev_byte_ready);
        w.bool(self.write_mode);
        w.bytes(&self.write_buffer);
    }

    fn write_reset(&self, w: &mut crate::serialize::Writer) {
        use crate::serialize::Snapshot;
        self.cpu.write_reset(w);
        self.bus.write_reset(w);
    }

    fn read_persistent(&mut self, r: &mut crate::serialize::Reader) -> crate::error::Result<()> {
        use crate::serialize::Snapshot;
        self.bus_index = r.u32()? as usize;
        self.bus.read_persistent(r)?;
        self.d64 = if r.bool()? { Some(D64::import_volume(&r.bytes()?)?) } else { None };
        self.current_track = r.u8()?;
        self.half_track = r.u8()?;
        self.motor_on = r.bool()?;
        self.led_on = r.bool()?;
        self.gcr_track = r.bytes()?;
        self.gcr_position = r.u32()? as usize;
        self.byte_counter = r.u32()?;
        self.prev_stepper_phase = r.u8()?;
        self.prev_atn = r.bool()?;
        self.prev_byte_ready = r.bool()?;
        self.write_mode = r.bool()?;
        self.write_buffer = r.bytes()?;
        Ok(())
    }

    fn read_reset(&mut self, r: &mut crate::serialize::Reader) -> crate::error::Result<()> {
        use crate::serialize::Snapshot;
        self.cpu.read_reset(r)?;
        self.bus.read_reset(r)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_drive() -> Drive1541 {
        let mut rom = vec![0xEAu8; 16384]; // NOP sled
        rom[0x3FFC] = 0x00;
        rom[0x3FFD] = 0xC0;
        Drive1541::new(rom, 0)
    }

    #[test]
    fn drive_starts_on_track_18() {
        let drive = make_drive();
        assert_eq!(drive.track(), 18);
        assert!(!drive.motor_on());
        assert!(!drive.has_disk());
        assert_eq!(drive.cpu.pc, 0xC000);
    }

    #[test]
    fn insert_and_eject_disk() {
        let mut drive = make_drive();
        let d64 = D64::from_bytes(&vec![0u8; 174_848]).expect("valid");
        drive.insert_disk(d64);
        assert!(drive.has_disk());
        assert!(!drive.gcr_track.is_empty());
        drive.eject_disk();
        assert!(!drive.has_disk());
        assert!(drive.gcr_track.is_empty());
    }

    #[test]
    fn motor_and_led_bits_decode_from_via2() {
        let mut drive = make_drive();
        drive.bus.via2.write(0x02, 0x0C);
        drive.bus.via2.write(0x00, 0x04);
        drive.update_mechanics();
        assert!(drive.motor_on());
        assert!(!drive.led_on());

        drive.bus.via2.write(0x00, 0x08);
        drive.update_mechanics();
        assert!(!drive.motor_on());
        assert!(drive.led_on());
    }

    #[test]
    fn ticking_drives_iec_bus_without_panicking() {
        let mut drive = make_drive();
        let mut iec = IecBus::new();
        for _ in 0..100 {
            drive.tick(&mut iec);
        }
    }
}
