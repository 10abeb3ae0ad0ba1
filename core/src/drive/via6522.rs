//! MOS 6522 Versatile Interface Adapter.
//!
//! Port+DDR+edge-detected-control-line shape, plus the 6522's pair of
//! 16-bit timers, a shift register, and an interrupt-flag/enable
//! register pair (IFR/IER).

const IFR_CA2: u8 = 0x01;
const IFR_CA1: u8 = 0x02;
const IFR_SR: u8 = 0x04;
const IFR_CB2: u8 = 0x08;
const IFR_CB1: u8 = 0x10;
const IFR_T2: u8 = 0x20;
const IFR_T1: u8 = 0x40;
const IFR_IRQ: u8 = 0x80;

pub struct Via6522 {
    pub ora: u8,
    pub orb: u8,
    pub ddra: u8,
    pub ddrb: u8,
    input_a: u8,
    input_b: u8,

    t1_counter: u16,
    t1_latch_lo: u8,
    t1_latch_hi: u8,
    t1_running: bool,
    t1_pb7: bool,

    t2_counter: u16,
    t2_latch_lo: u8,
    t2_running: bool,

    sr: u8,
    acr: u8,
    pcr: u8,
    ifr: u8,
    ier: u8,

    ca1: bool,
    ca2: bool,
    cb1: bool,
    cb2: bool,
}

impl Via6522 {
    pub fn new() -> Self {
        Self {
            ora: 0,
            orb: 0,
            ddra: 0,
            ddrb: 0,
            input_a: 0,
            input_b: 0,
            t1_counter: 0xFFFF,
            t1_latch_lo: 0,
            t1_latch_hi: 0,
            t1_running: false,
            t1_pb7: false,
            t2_counter: 0xFFFF,
            t2_latch_lo: 0,
            t2_running: false,
            sr: 0,
            acr: 0,
            pcr: 0,
            ifr: 0,
            ier: 0,
            ca1: false,
            ca2: false,
            cb1: false,
            cb2: false,
        }
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }

    pub fn set_port_a_input(&mut self, value: u8) {
        self.input_a = value;
    }

    pub fn set_port_b_input(&mut self, value: u8) {
        self.input_b = value;
    }

    /// Port A output as externally observed (driven bits only where DDR=1;
    /// input bits float as whatever the external line currently reads).
    pub fn port_a_output(&self) -> u8 {
        (self.ora & self.ddra) | (self.input_a & !self.ddra)
    }

    pub fn port_b_output(&self) -> u8 {
        let mut pb = (self.orb & self.ddrb) | (self.input_b & !self.ddrb);
        if self.acr & 0x80 != 0 && self.ddrb & 0x80 != 0 {
            pb = (pb & !0x80) | if self.t1_pb7 { 0x80 } else { 0 };
        }
        pb
    }

    pub fn set_ca1(&mut self, state: bool) {
        let rising = state && !self.ca1;
        let falling = !state && self.ca1;
        self.ca1 = state;
        let trigger_on_rising = self.pcr & 0x01 != 0;
        if (trigger_on_rising && rising) || (!trigger_on_rising && falling) {
            self.ifr |= IFR_CA1;
            self.update_irq();
        }
    }

    pub fn set_cb1(&mut self, state: bool) {
        let rising = state && !self.cb1;
        let falling = !state && self.cb1;
        self.cb1 = state;
        let trigger_on_rising = self.pcr & 0x10 != 0;
        if (trigger_on_rising && rising) || (!trigger_on_rising && falling) {
            self.ifr |= IFR_CB1;
            self.update_irq();
        }
    }

    pub fn set_ca2(&mut self, state: bool) {
        if self.pcr & 0x08 != 0 {
            return; // CA2 output mode
        }
        let rising = state && !self.ca2;
        let falling = !state && self.ca2;
        self.ca2 = state;
        let trigger_on_rising = self.pcr & 0x04 != 0;
        if (trigger_on_rising && rising) || (!trigger_on_rising && falling) {
            self.ifr |= IFR_CA2;
            self.update_irq();
        }
    }

    pub fn irq_active(&self) -> bool {
        self.ifr & IFR_IRQ != 0
    }

    fn update_irq(&mut self) {
        if self.ifr & self.ier & 0x7F != 0 {
            self.ifr |= IFR_IRQ;
        } else {
            self.ifr &= !IFR_IRQ;
        }
    }

    /// Advance by one PHI2 cycle: timers count down, shift register
    /// advances when configured from ∅2.
    pub fn tick(&mut self) {
        if self.t1_running {
            if self.t1_counter == 0 {
                self.ifr |= IFR_T1;
                self.t1_pb7 = !self.t1_pb7;
                self.update_irq();
                if self.acr & 0x40 != 0 {
                    // free-run: reload from latch
                    self.t1_counter = u16::from_le_bytes([self.t1_latch_lo, self.t1_latch_hi]);
                } else {
                    self.t1_running = false;
                    self.t1_counter = 0xFFFF;
                }
            } else {
                self.t1_counter -= 1;
            }
        }

        if self.t2_running {
            if self.t2_counter == 0 {
                self.ifr |= IFR_T2;
                self.update_irq();
                self.t2_running = false; // T2 is always one-shot on ∅2 mode
                self.t2_counter = 0xFFFF;
            } else {
                self.t2_counter -= 1;
            }
        }
    }

    /// Register offset 0-15 (standard 6522 map).
    pub fn read(&mut self, reg: u8) -> u8 {
        match reg & 0x0F {
            0x00 => {
                self.ifr &= !(IFR_CA1 | IFR_CA2);
                self.update_irq();
                self.port_b_output()
            }
            0x01 => {
                self.ifr &= !(IFR_CA1 | IFR_CA2);
                self.update_irq();
                self.port_a_output()
            }
            0x02 => self.ddrb,
            0x03 => self.ddra,
            0x04 => {
                self.ifr &= !IFR_T1;
                self.update_irq();
                (self.t1_counter & 0xFF) as u8
            }
            0x05 => (self.t1_counter >> 8) as u8,
            0x06 => self.t1_latch_lo,
            0x07 => self.t1_latch_hi,
            0x08 => {
                self.ifr &= !IFR_T2;
                self.update_irq();
                (self.t2_counter & 0xFF) as u8
            }
            0x09 => (self.t2_counter >> 8) as u8,
            0x0A => {
                self.ifr &= !IFR_SR;
                self.update_irq();
                self.sr
            }
            0x0B => self.acr,
            0x0C => self.pcr,
            0x0D => self.ifr,
            0x0E => self.ier | 0x80,
            0x0F => self.port_a_output(),
            _ => unreachable!(),
        }
    }

    pub fn write(&mut self, reg: u8, value: u8) {
        match reg & 0x0F {
            0x00 => self.orb = value,
            0x01 => self.ora = value,
            0x02 => self.ddrb = value,
            0x03 => self.ddra = value,
            0x04 => {
                self.t1_latch_lo = value;
            }
            0x05 => {
                self.t1_latch_hi = value;
                self.t1_counter = u16::from_le_bytes([self.t1_latch_lo, self.t1_latch_hi]);
                self.t1_running = true;
                self.ifr &= !IFR_T1;
                self.update_irq();
                self.t1_pb7 = false;
            }
            0x06 => self.t1_latch_lo = value,
            0x07 => self.t1_latch_hi = value,
            0x08 => self.t2_latch_lo = value,
            0x09 => {
                self.t2_counter = u16::from_le_bytes([self.t2_latch_lo, value]);
                self.t2_running = true;
                self.ifr &= !IFR_T2;
                self.update_irq();
            }
            0x0A => self.sr = value,
            0x0B => self.acr = value,
            0x0C => self.pcr = value,
            0x0D => {
                // Writing a 1 to a bit clears that interrupt flag.
                self.ifr &= !(value & 0x7F);
                self.update_irq();
            }
            0x0E => {
                if value & 0x80 != 0 {
                    self.ier |= value & 0x7F;
                } else {
                    self.ier &= !(value & 0x7F);
                }
                self.update_irq();
            }
            0x0F => self.ora = value,
            _ => {}
        }
    }
}

impl Default for Via6522 {
    fn default() -> Self {
        Self::new()
    }
}

impl crate::serialize::Snapshot for Via6522 {
    fn write_persistent(&self, _w: &mut crate::serialize::Writer) {}

    fn write_reset(&self, w: &mut crate::serialize::Writer) {
        w.u8(self.ora);
        w.u8(self.orb);
        w.u8(self.ddra);
        w.u8(self.ddrb);
        w.u8(self.input_a);
        w.u8(self.input_b);
        w.u16(self.t1_counter);
        w.u8(self.t1_latch_lo);
        w.u8(self.t1_latch_hi);
        w.bool(self.t1_running);
        w.bool(self.t1_pb7);
        w.u16(self.t2_counter);
        w.u8(self.t2_latch_lo);
        w.bool(self.t2_running);
        w.u8(self.sr);
        w.u8(self.acr);
        w.u8(self.pcr);
        w.u8(self.ifr);
        w.u8(self.ier);
        w.bool(self.ca1);
        w.bool(self.ca2);
        w.bool(self.cb1);
        w.bool(self.cb2);
    }

    fn read_persistent(&mut self, _r: &mut crate::serialize::Reader) -> crate::error::Result<()> {
        Ok(())
    }

    fn read_reset(&mut self, r: &mut crate::serialize::Reader) -> crate::error::Result<()> {
        self.ora = r.u8()?;
        self.orb = r.u8()?;
        self.ddra = r.u8()?;
        self.ddrb = r.u8()?;
        self.input_a = r.u8()?;
        self.input_b = r.u8()?;
        self.t1_counter = r.u16()?;
        self.t1_latch_lo = r.u8()?;
        self.t1_latch_hi = r.u8()?;
        self.t1_running = r.bool()?;
        self.t1_pb7 = r.bool()?;
        self.t2_counter = r.u16()?;
        self.t2_latch_lo = r.u8()?;
        self.t2_running = r.bool()?;
        self.sr = r.u8()?;
        self.acr = r.u8()?;
        self.pcr = r.u8()?;
        self.ifr = r.u8()?;
        self.ier = r.u8()?;
        self.ca1 = r.bool()?;
        self.ca2 = r.bool()?;
        self.cb1 = r.bool()?;
        self.cb2 = r.bool()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timer1_underflow_sets_ifr_and_reloads_in_freerun() {
        let mut via = Via6522::new();
        via.write(0x0B, 0x40); // ACR: T1 free-run
        via.write(0x06, 0x02); // latch lo
        via.write(0x07, 0x00); // latch hi, starts timer at 2
        for _ in 0..3 {
            via.tick();
        }
        assert!(via.ifr & IFR_T1 != 0);
        assert!(via.t1_running);
    }

    #[test]
    fn ca1_edge_sets_ifr_ca1() {
        let mut via = Via6522::new();
        via.set_ca1(true);
        assert!(via.ifr & IFR_CA1 != 0);
    }

    #[test]
    fn ier_set_clear_via_bit7() {
        let mut via = Via6522::new();
        via.write(0x0E, 0x80 | IFR_CA1);
        assert_eq!(via.ier & IFR_CA1, IFR_CA1);
        via.write(0x0E, IFR_CA1);
        assert_eq!(via.ier & IFR_CA1, 0);
    }
}
