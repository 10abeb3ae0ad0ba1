mod alu;
mod binary;
mod branch;
mod illegal;
mod load_store;
mod port;
mod shift;
mod stack;
mod unary;

pub use port::{Port6510, PortDecay};

use crate::core::{
    Bus, BusMaster,
    bus::InterruptState,
    component::{BusMasterComponent, Component},
};
use crate::cpu::{
    Cpu,
    state::{CpuStateTrait, M6510State},
};

#[repr(u8)]
#[derive(Copy, Clone, Debug)]
pub enum StatusFlag {
    C = 0x01, // Carry
    Z = 0x02, // Zero
    I = 0x04, // Interrupt Disable
    D = 0x08, // Decimal
    B = 0x10, // Break
    U = 0x20, // Unused (always 1)
    V = 0x40, // Overflow
    N = 0x80, // Negative
}

pub struct M6510 {
    // Registers
    pub a: u8,
    pub x: u8,
    pub y: u8,
    pub pc: u16,
    pub sp: u8,
    pub p: u8,

    // Internal state
    pub(crate) state: ExecState,
    pub(crate) opcode: u8,
    pub(crate) temp_addr: u16,
    /// Temporary data storage for multi-cycle operations (RMW operand, address bytes)
    pub(crate) temp_data: u8,
    /// Interrupt type being processed: 0=none, 1=NMI, 2=IRQ, 3=BRK
    pub(crate) interrupt_type: u8,
    /// Previous NMI line state for edge detection
    pub(crate) nmi_previous: bool,
    /// Set by a JAM (HLT/KIL) opcode; the run loop observes this and stops.
    pub jam: bool,
    /// $0000/$0001 on-chip I/O port (data-direction register + data register).
    pub port: port::Port6510,
    /// Consecutive cycles seen with BA low while the current micro-op was a
    /// read. Three tolerated (the 6510 keeps running off its internal
    /// pipeline); the fourth actually halts the CPU.
    pub(crate) ba_low_cycles: u8,
}

#[derive(Clone, Debug)]
pub(crate) enum ExecState {
    Fetch,
    Execute(u8, u8), // (opcode, cycle)
    /// Hardware interrupt response sequence (NMI/IRQ push + vector)
    Interrupt(u8),
    /// Terminal state entered by a JAM/HLT/KIL opcode; never leaves except on reset.
    Jammed,
}

impl Default for M6510 {
    fn default() -> Self {
        Self::new()
    }
}

impl M6510 {
    pub fn new() -> Self {
        Self {
            a: 0,
            x: 0,
            y: 0,
            pc: 0,
            sp: 0xFD,
            p: 0x24, // I=1, U=1
            state: ExecState::Fetch,
            opcode: 0,
            temp_addr: 0,
            temp_data: 0,
            interrupt_type: 0,
            nmi_previous: false,
            jam: false,
            port: port::Port6510::new(),
            ba_low_cycles: 0,
        }
    }

    /// True once a JAM/HLT/KIL opcode has retired. Sticky until `reset()`.
    pub fn is_jammed(&self) -> bool {
        self.jam
    }

    /// Whether the micro-op at the *current* (opcode, cycle) pair performs a
    /// bus write this cycle. A VIC-asserted stall (BA low) never holds a
    /// write — only reads are deferred — so the dispatcher consults this
    /// before honoring `Bus::is_halted_for`.
    fn current_cycle_is_write(&self) -> bool {
        let ExecState::Execute(opcode, cycle) = self.state else {
            return false;
        };
        match opcode {
            // Simple stores: final cycle of the addressing mode is the write.
            0x85 | 0x95 | 0x8D | 0x86 | 0x96 | 0x8E | 0x84 | 0x94 | 0x8C | 0x87 | 0x97 | 0x8F => {
                cycle >= 1
            }
            0x9D | 0x99 | 0x81 | 0x91 | 0x83 => cycle >= 2,
            // RMW (documented + illegal SLO/RLA/SRE/RRA/DCP/ISC): the dummy
            // write-back of the unmodified value and the final real write
            // are both genuine bus writes.
            0x06 | 0x26 | 0x46 | 0x66 | 0xC6 | 0xE6 | 0x07 | 0x27 | 0x47 | 0x67 | 0xC7 | 0xE7 => {
                cycle >= 2
            }
            0x16 | 0x36 | 0x56 | 0x76 | 0xD6 | 0xF6 | 0x17 | 0x37 | 0x57 | 0x77 | 0xD7 => {
                cycle >= 3
            }
            0x0E | 0x2E | 0x4E | 0x6E | 0xCE | 0xEE | 0x0F | 0x2F | 0x4F | 0x6F | 0xCF | 0xEF => {
                cycle >= 3
            }
            0x1E | 0x3E | 0x5E | 0x7E | 0xDE | 0xFE | 0x1F | 0x3F | 0x5F | 0x7F | 0xDF | 0xFF
            | 0x1B | 0x3B | 0x5B | 0x7B | 0xDB | 0xFB | 0x03 | 0x23 | 0x43 | 0x63 | 0xC3 | 0xE3
            | 0x13 | 0x33 | 0x53 | 0x73 | 0xD3 | 0xF3 => cycle >= 4,
            // Stack/interrupt sequences write on every cycle after the first.
            0x48 | 0x08 | 0x20 | 0x00 => cycle >= 1,
            _ => false,
        }
    }

    #[inline]
    pub(crate) fn set_flag(&mut self, flag: StatusFlag, set: bool) {
        if set {
            self.p |= flag as u8;
        } else {
            self.p &= !(flag as u8);
        }
    }

    pub fn execute_cycle<B: Bus<Address = u16, Data = u8> + ?Sized>(
        &mut self,
        bus: &mut B,
        master: BusMaster,
    ) {
        if matches!(self.state, ExecState::Jammed) {
            return;
        }

        // VIC bad-line / sprite DMA asserts BA, which the generic bus
        // surfaces as `is_halted_for`. Writes are never stalled; reads are,
        // but only once BA has been observed low for three prior cycles.
        if bus.is_halted_for(master) && !self.current_cycle_is_write() {
            self.ba_low_cycles = self.ba_low_cycles.saturating_add(1);
            if self.ba_low_cycles > 3 {
                return;
            }
        } else {
            self.ba_low_cycles = 0;
        }

        match self.state {
            ExecState::Fetch => {
                let ints = bus.check_interrupts(master);
                if self.handle_interrupts(ints) {
                    return;
                }
                self.opcode = bus.read(master, self.pc);
                self.pc = self.pc.wrapping_add(1);
                self.state = ExecState::Execute(self.opcode, 0);
            }
            ExecState::Execute(op, cyc) => {
                self.execute_instruction(op, cyc, bus, master);
            }
            ExecState::Interrupt(cycle) => {
                self.execute_interrupt(cycle, bus, master);
            }
            ExecState::Jammed => {}
        }
    }

    fn execute_instruction<B: Bus<Address = u16, Data = u8> + ?Sized>(
        &mut self,
        opcode: u8,
        cycle: u8,
        bus: &mut B,
        master: BusMaster,
    ) {
        match opcode {
            // --- LDA ---
            0xA9 => self.op_lda_imm(cycle, bus, master),
            0xA5 => self.op_lda_zp(cycle, bus, master),
            0xB5 => self.op_lda_zp_x(cycle, bus, master),
            0xAD => self.op_lda_abs(cycle, bus, master),
            0xBD => self.op_lda_abs_x(cycle, bus, master),
            0xB9 => self.op_lda_abs_y(cycle, bus, master),
            0xA1 => self.op_lda_ind_x(cycle, bus, master),
            0xB1 => self.op_lda_ind_y(cycle, bus, master),

            // --- LDX ---
            0xA2 => self.op_ldx_imm(cycle, bus, master),
            0xA6 => self.op_ldx_zp(cycle, bus, master),
            0xB6 => self.op_ldx_zp_y(cycle, bus, master),
            0xAE => self.op_ldx_abs(cycle, bus, master),
            0xBE => self.op_ldx_abs_y(cycle, bus, master),

            // --- LDY ---
            0xA0 => self.op_ldy_imm(cycle, bus, master),
            0xA4 => self.op_ldy_zp(cycle, bus, master),
            0xB4 => self.op_ldy_zp_x(cycle, bus, master),
            0xAC => self.op_ldy_abs(cycle, bus, master),
            0xBC => self.op_ldy_abs_x(cycle, bus, master),

            // --- STA ---
            0x85 => self.op_sta_zp(cycle, bus, master),
            0x95 => self.op_sta_zp_x(cycle, bus, master),
            0x8D => self.op_sta_abs(cycle, bus, master),
            0x9D => self.op_sta_abs_x(cycle, bus, master),
            0x99 => self.op_sta_abs_y(cycle, bus, master),
            0x81 => self.op_sta_ind_x(cycle, bus, master),
            0x91 => self.op_sta_ind_y(cycle, bus, master),

            // --- STX ---
            0x86 => self.op_stx_zp(cycle, bus, master),
            0x96 => self.op_stx_zp_y(cycle, bus, master),
            0x8E => self.op_stx_abs(cycle, bus, master),

            // --- STY ---
            0x84 => self.op_sty_zp(cycle, bus, master),
            0x94 => self.op_sty_zp_x(cycle, bus, master),
            0x8C => self.op_sty_abs(cycle, bus, master),

            // --- ADC ---
            0x69 => self.op_adc_imm(cycle, bus, master),
            0x65 => self.op_adc_zp(cycle, bus, master),
            0x75 => self.op_adc_zp_x(cycle, bus, master),
            0x6D => self.op_adc_abs(cycle, bus, master),
            0x7D => self.op_adc_abs_x(cycle, bus, master),
            0x79 => self.op_adc_abs_y(cycle, bus, master),
            0x61 => self.op_adc_ind_x(cycle, bus, master),
            0x71 => self.op_adc_ind_y(cycle, bus, master),

            // --- SBC ---
            0xE9 => self.op_sbc_imm(cycle, bus, master),
            0xE5 => self.op_sbc_zp(cycle, bus, master),
            0xF5 => self.op_sbc_zp_x(cycle, bus, master),
            0xED => self.op_sbc_abs(cycle, bus, master),
            0xFD => self.op_sbc_abs_x(cycle, bus, master),
            0xF9 => self.op_sbc_abs_y(cycle, bus, master),
            0xE1 => self.op_sbc_ind_x(cycle, bus, master),
            0xF1 => self.op_sbc_ind_y(cycle, bus, master),

            // --- CMP ---
            0xC9 => self.op_cmp_imm(cycle, bus, master),
            0xC5 => self.op_cmp_zp(cycle, bus, master),
            0xD5 => self.op_cmp_zp_x(cycle, bus, master),
            0xCD => self.op_cmp_abs(cycle, bus, master),
            0xDD => self.op_cmp_abs_x(cycle, bus, master),
            0xD9 => self.op_cmp_abs_y(cycle, bus, master),
            0xC1 => self.op_cmp_ind_x(cycle, bus, master),
            0xD1 => self.op_cmp_ind_y(cycle, bus, master),

            // --- AND ---
            0x29 => self.op_and_imm(cycle, bus, master),
            0x25 => self.op_and_zp(cycle, bus, master),
            0x35 => self.op_and_zp_x(cycle, bus, master),
            0x2D => self.op_and_abs(cycle, bus, master),
            0x3D => self.op_and_abs_x(cycle, bus, master),
            0x39 => self.op_and_abs_y(cycle, bus, master),
            0x21 => self.op_and_ind_x(cycle, bus, master),
            0x31 => self.op_and_ind_y(cycle, bus, master),

            // --- ORA ---
            0x09 => self.op_ora_imm(cycle, bus, master),
            0x05 => self.op_ora_zp(cycle, bus, master),
            0x15 => self.op_ora_zp_x(cycle, bus, master),
            0x0D => self.op_ora_abs(cycle, bus, master),
            0x1D => self.op_ora_abs_x(cycle, bus, master),
            0x19 => self.op_ora_abs_y(cycle, bus, master),
            0x01 => self.op_ora_ind_x(cycle, bus, master),
            0x11 => self.op_ora_ind_y(cycle, bus, master),

            // --- EOR ---
            0x49 => self.op_eor_imm(cycle, bus, master),
            0x45 => self.op_eor_zp(cycle, bus, master),
            0x55 => self.op_eor_zp_x(cycle, bus, master),
            0x4D => self.op_eor_abs(cycle, bus, master),
            0x5D => self.op_eor_abs_x(cycle, bus, master),
            0x59 => self.op_eor_abs_y(cycle, bus, master),
            0x41 => self.op_eor_ind_x(cycle, bus, master),
            0x51 => self.op_eor_ind_y(cycle, bus, master),

            // --- BIT ---
            0x24 => self.op_bit_zp(cycle, bus, master),
            0x2C => self.op_bit_abs(cycle, bus, master),

            // --- CPX ---
            0xE0 => self.op_cpx_imm(cycle, bus, master),
            0xE4 => self.op_cpx_zp(cycle, bus, master),
            0xEC => self.op_cpx_abs(cycle, bus, master),

            // --- CPY ---
            0xC0 => self.op_cpy_imm(cycle, bus, master),
            0xC4 => self.op_cpy_zp(cycle, bus, master),
            0xCC => self.op_cpy_abs(cycle, bus, master),

            // --- ASL ---
            0x0A => {
                // ASL Accumulator - 2 cycles
                if cycle == 0 {
                    self.a = self.perform_asl(self.a);
                    self.state = ExecState::Fetch;
                }
            }
            0x06 => self.op_asl_zp(cycle, bus, master),
            0x16 => self.op_asl_zp_x(cycle, bus, master),
            0x0E => self.op_asl_abs(cycle, bus, master),
            0x1E => self.op_asl_abs_x(cycle, bus, master),

            // --- LSR ---
            0x4A => {
                // LSR Accumulator - 2 cycles
                if cycle == 0 {
                    self.a = self.perform_lsr(self.a);
                    self.state = ExecState::Fetch;
                }
            }
            0x46 => self.op_lsr_zp(cycle, bus, master),
            0x56 => self.op_lsr_zp_x(cycle, bus, master),
            0x4E => self.op_lsr_abs(cycle, bus, master),
            0x5E => self.op_lsr_abs_x(cycle, bus, master),

            // --- ROL ---
            0x2A => {
                // ROL Accumulator - 2 cycles
                if cycle == 0 {
                    self.a = self.perform_rol(self.a);
                    self.state = ExecState::Fetch;
                }
            }
            0x26 => self.op_rol_zp(cycle, bus, master),
            0x36 => self.op_rol_zp_x(cycle, bus, master),
            0x2E => self.op_rol_abs(cycle, bus, master),
            0x3E => self.op_rol_abs_x(cycle, bus, master),

            // --- ROR ---
            0x6A => {
                // ROR Accumulator - 2 cycles
                if cycle == 0 {
                    self.a = self.perform_ror(self.a);
                    self.state = ExecState::Fetch;
                }
            }
            0x66 => self.op_ror_zp(cycle, bus, master),
            0x76 => self.op_ror_zp_x(cycle, bus, master),
            0x6E => self.op_ror_abs(cycle, bus, master),
            0x7E => self.op_ror_abs_x(cycle, bus, master),

            // --- INC ---
            0xE6 => self.op_inc_zp(cycle, bus, master),
            0xF6 => self.op_inc_zp_x(cycle, bus, master),
            0xEE => self.op_inc_abs(cycle, bus, master),
            0xFE => self.op_inc_abs_x(cycle, bus, master),

            // --- DEC ---
            0xC6 => self.op_dec_zp(cycle, bus, master),
            0xD6 => self.op_dec_zp_x(cycle, bus, master),
            0xCE => self.op_dec_abs(cycle, bus, master),
            0xDE => self.op_dec_abs_x(cycle, bus, master),

            // --- Flag instructions (all 2-cycle implied) ---
            0x18 => {
                // CLC - Clear Carry
                if cycle == 0 {
                    self.set_flag(StatusFlag::C, false);
                    self.state = ExecState::Fetch;
                }
            }
            0x38 => {
                // SEC - Set Carry
                if cycle == 0 {
                    self.set_flag(StatusFlag::C, true);
                    self.state = ExecState::Fetch;
                }
            }
            0x58 => {
                // CLI - Clear Interrupt Disable
                if cycle == 0 {
                    self.set_flag(StatusFlag::I, false);
                    self.state = ExecState::Fetch;
                }
            }
            0x78 => {
                // SEI - Set Interrupt Disable
                if cycle == 0 {
                    self.set_flag(StatusFlag::I, true);
                    self.state = ExecState::Fetch;
                }
            }
            0xB8 => {
                // CLV - Clear Overflow
                if cycle == 0 {
                    self.set_flag(StatusFlag::V, false);
                    self.state = ExecState::Fetch;
                }
            }
            0xD8 => {
                // CLD - Clear Decimal
                if cycle == 0 {
                    self.set_flag(StatusFlag::D, false);
                    self.state = ExecState::Fetch;
                }
            }
            0xF8 => {
                // SED - Set Decimal
                if cycle == 0 {
                    self.set_flag(StatusFlag::D, true);
                    self.state = ExecState::Fetch;
                }
            }

            // --- Transfer instructions (all 2-cycle implied) ---
            0xAA => {
                // TAX - Transfer A to X. Sets N, Z.
                if cycle == 0 {
                    self.x = self.a;
                    self.set_nz(self.x);
                    self.state = ExecState::Fetch;
                }
            }
            0xA8 => {
                // TAY - Transfer A to Y. Sets N, Z.
                if cycle == 0 {
                    self.y = self.a;
                    self.set_nz(self.y);
                    self.state = ExecState::Fetch;
                }
            }
            0x8A => {
                // TXA - Transfer X to A. Sets N, Z.
                if cycle == 0 {
                    self.a = self.x;
                    self.set_nz(self.a);
                    self.state = ExecState::Fetch;
                }
            }
            0x98 => {
                // TYA - Transfer Y to A. Sets N, Z.
                if cycle == 0 {
                    self.a = self.y;
                    self.set_nz(self.a);
                    self.state = ExecState::Fetch;
                }
            }
            0xBA => {
                // TSX - Transfer SP to X. Sets N, Z.
                if cycle == 0 {
                    self.x = self.sp;
                    self.set_nz(self.x);
                    self.state = ExecState::Fetch;
                }
            }
            0x9A => {
                // TXS - Transfer X to SP. Does NOT set flags.
                if cycle == 0 {
                    self.sp = self.x;
                    self.state = ExecState::Fetch;
                }
            }

            // --- Register increment/decrement (all 2-cycle implied) ---
            0xE8 => {
                // INX - Increment X. Sets N, Z.
                if cycle == 0 {
                    self.x = self.x.wrapping_add(1);
                    self.set_nz(self.x);
                    self.state = ExecState::Fetch;
                }
            }
            0xC8 => {
                // INY - Increment Y. Sets N, Z.
                if cycle == 0 {
                    self.y = self.y.wrapping_add(1);
                    self.set_nz(self.y);
                    self.state = ExecState::Fetch;
                }
            }
            0xCA => {
                // DEX - Decrement X. Sets N, Z.
                if cycle == 0 {
                    self.x = self.x.wrapping_sub(1);
                    self.set_nz(self.x);
                    self.state = ExecState::Fetch;
                }
            }
            0x88 => {
                // DEY - Decrement Y. Sets N, Z.
                if cycle == 0 {
                    self.y = self.y.wrapping_sub(1);
                    self.set_nz(self.y);
                    self.state = ExecState::Fetch;
                }
            }

            // --- NOP (2-cycle implied) ---
            0xEA => {
                if cycle == 0 {
                    self.state = ExecState::Fetch;
                }
            }

            // --- Branches ---
            0x10 => self.op_bpl(cycle, bus, master),
            0x30 => self.op_bmi(cycle, bus, master),
            0x50 => self.op_bvc(cycle, bus, master),
            0x70 => self.op_bvs(cycle, bus, master),
            0x90 => self.op_bcc(cycle, bus, master),
            0xB0 => self.op_bcs(cycle, bus, master),
            0xD0 => self.op_bne(cycle, bus, master),
            0xF0 => self.op_beq(cycle, bus, master),

            // --- Jumps ---
            0x4C => self.op_jmp_abs(cycle, bus, master),
            0x6C => self.op_jmp_ind(cycle, bus, master),
            0x20 => self.op_jsr(cycle, bus, master),
            0x60 => self.op_rts(cycle, bus, master),
            0x40 => self.op_rti(cycle, bus, master),

            // --- Stack ---
            0x48 => self.op_pha(cycle, bus, master),
            0x68 => self.op_pla(cycle, bus, master),
            0x08 => self.op_php(cycle, bus, master),
            0x28 => self.op_plp(cycle, bus, master),

            // --- BRK ---
            0x00 => self.op_brk(cycle, bus, master),

            // --- SLO (ASL + ORA) ---
            0x07 => self.op_slo_zp(cycle, bus, master),
            0x17 => self.op_slo_zp_x(cycle, bus, master),
            0x0F => self.op_slo_abs(cycle, bus, master),
            0x1F => self.op_slo_abs_x(cycle, bus, master),
            0x1B => self.op_slo_abs_y(cycle, bus, master),
            0x03 => self.op_slo_ind_x(cycle, bus, master),
            0x13 => self.op_slo_ind_y(cycle, bus, master),

            // --- RLA (ROL + AND) ---
            0x27 => self.op_rla_zp(cycle, bus, master),
            0x37 => self.op_rla_zp_x(cycle, bus, master),
            0x2F => self.op_rla_abs(cycle, bus, master),
            0x3F => self.op_rla_abs_x(cycle, bus, master),
            0x3B => self.op_rla_abs_y(cycle, bus, master),
            0x23 => self.op_rla_ind_x(cycle, bus, master),
            0x33 => self.op_rla_ind_y(cycle, bus, master),

            // --- SRE (LSR + EOR) ---
            0x47 => self.op_sre_zp(cycle, bus, master),
            0x57 => self.op_sre_zp_x(cycle, bus, master),
            0x4F => self.op_sre_abs(cycle, bus, master),
            0x5F => self.op_sre_abs_x(cycle, bus, master),
            0x5B => self.op_sre_abs_y(cycle, bus, master),
            0x43 => self.op_sre_ind_x(cycle, bus, master),
            0x53 => self.op_sre_ind_y(cycle, bus, master),

            // --- RRA (ROR + ADC) ---
            0x67 => self.op_rra_zp(cycle, bus, master),
            0x77 => self.op_rra_zp_x(cycle, bus, master),
            0x6F => self.op_rra_abs(cycle, bus, master),
            0x7F => self.op_rra_abs_x(cycle, bus, master),
            0x7B => self.op_rra_abs_y(cycle, bus, master),
            0x63 => self.op_rra_ind_x(cycle, bus, master),
            0x73 => self.op_rra_ind_y(cycle, bus, master),

            // --- SAX (store A & X) ---
            0x87 => self.op_sax_zp(cycle, bus, master),
            0x97 => self.op_sax_zp_y(cycle, bus, master),
            0x8F => self.op_sax_abs(cycle, bus, master),
            0x83 => self.op_sax_ind_x(cycle, bus, master),

            // --- LAX (load A and X) ---
            0xA7 => self.op_lax_zp(cycle, bus, master),
            0xB7 => self.op_lax_zp_y(cycle, bus, master),
            0xAF => self.op_lax_abs(cycle, bus, master),
            0xBF => self.op_lax_abs_y(cycle, bus, master),
            0xA3 => self.op_lax_ind_x(cycle, bus, master),
            0xB3 => self.op_lax_ind_y(cycle, bus, master),

            // --- DCP (DEC + CMP) ---
            0xC7 => self.op_dcp_zp(cycle, bus, master),
            0xD7 => self.op_dcp_zp_x(cycle, bus, master),
            0xCF => self.op_dcp_abs(cycle, bus, master),
            0xDF => self.op_dcp_abs_x(cycle, bus, master),
            0xDB => self.op_dcp_abs_y(cycle, bus, master),
            0xC3 => self.op_dcp_ind_x(cycle, bus, master),
            0xD3 => self.op_dcp_ind_y(cycle, bus, master),

            // --- ISC/ISB (INC + SBC) ---
            0xE7 => self.op_isc_zp(cycle, bus, master),
            0xF7 => self.op_isc_zp_x(cycle, bus, master),
            0xEF => self.op_isc_abs(cycle, bus, master),
            0xFF => self.op_isc_abs_x(cycle, bus, master),
            0xFB => self.op_isc_abs_y(cycle, bus, master),
            0xE3 => self.op_isc_ind_x(cycle, bus, master),
            0xF3 => self.op_isc_ind_y(cycle, bus, master),

            // --- Immediate-mode illegals ---
            0x0B | 0x2B => self.op_anc_imm(cycle, bus, master),
            0x4B => self.op_alr_imm(cycle, bus, master),
            0x6B => self.op_arr_imm(cycle, bus, master),
            0xCB => self.op_axs_imm(cycle, bus, master),
            0xBB => self.op_las_abs_y(cycle, bus, master),

            // --- Unofficial NOPs that still consume operand bytes ---
            0x04 | 0x44 | 0x64 => self.op_nop_zp(cycle, bus, master),
            0x14 | 0x34 | 0x54 | 0x74 | 0xD4 | 0xF4 => self.op_nop_zp_x(cycle, bus, master),
            0x0C => self.op_nop_abs(cycle, bus, master),
            0x1C | 0x3C | 0x5C | 0x7C | 0xDC | 0xFC => self.op_nop_abs_x(cycle, bus, master),
            0x80 | 0x82 | 0x89 | 0xC2 | 0xE2 => self.op_nop_imm(cycle, bus, master),
            0x1A | 0x3A | 0x5A | 0x7A | 0xDA | 0xFA => {
                if cycle == 0 {
                    self.state = ExecState::Fetch;
                }
            }

            // --- JAM/HLT/KIL family: documented NMOS halting opcodes ---
            0x02 | 0x12 | 0x22 | 0x32 | 0x42 | 0x52 | 0x62 | 0x72 | 0x92 | 0xB2 | 0xD2 | 0xF2 => {
                self.op_jam();
            }

            // Remaining unassigned opcodes behave as 2-cycle NOPs.
            _ => {
                self.state = ExecState::Fetch;
            }
        }
    }

    /// Check for pending interrupts during Fetch state. Returns true if an
    /// interrupt was taken (state transitions to Interrupt sequence).
    fn handle_interrupts(&mut self, ints: InterruptState) -> bool {
        // NMI is edge-triggered: detect rising edge
        let nmi_edge = ints.nmi && !self.nmi_previous;
        self.nmi_previous = ints.nmi;

        if nmi_edge {
            self.interrupt_type = 1; // NMI
            self.state = ExecState::Interrupt(0);
            return true;
        }

        // IRQ is level-triggered, masked by I flag
        if ints.irq && (self.p & StatusFlag::I as u8) == 0 {
            self.interrupt_type = 2; // IRQ
            self.state = ExecState::Interrupt(0);
            return true;
        }

        false
    }

    /// Execute hardware interrupt sequence (NMI/IRQ).
    /// 7 cycles total: 1 (detection in Fetch) + 6 (this handler, cycles 0-5).
    /// Pushes PC and P (with B=0), then reads vector and sets I flag.
    fn execute_interrupt<B: Bus<Address = u16, Data = u8> + ?Sized>(
        &mut self,
        cycle: u8,
        bus: &mut B,
        master: BusMaster,
    ) {
        match cycle {
            0 => {
                // Internal cycle (replaces phantom opcode read)
                self.state = ExecState::Interrupt(1);
            }
            1 => {
                // Push PCH
                bus.write(master, 0x0100 | self.sp as u16, (self.pc >> 8) as u8);
                self.sp = self.sp.wrapping_sub(1);
                self.state = ExecState::Interrupt(2);
            }
            2 => {
                // Push PCL
                bus.write(master, 0x0100 | self.sp as u16, self.pc as u8);
                self.sp = self.sp.wrapping_sub(1);
                self.state = ExecState::Interrupt(3);
            }
            3 => {
                // Push P with B=0, U=1 (hardware interrupt, not BRK)
                let p_push = (self.p | StatusFlag::U as u8) & !(StatusFlag::B as u8);
                bus.write(master, 0x0100 | self.sp as u16, p_push);
                self.sp = self.sp.wrapping_sub(1);
                self.state = ExecState::Interrupt(4);
            }
            4 => {
                // Set I flag, read vector low byte
                self.set_flag(StatusFlag::I, true);
                let vector_addr = match self.interrupt_type {
                    1 => 0xFFFA, // NMI
                    _ => 0xFFFE, // IRQ
                };
                self.pc = bus.read(master, vector_addr) as u16;
                self.state = ExecState::Interrupt(5);
            }
            5 => {
                // Read vector high byte
                let vector_addr = match self.interrupt_type {
                    1 => 0xFFFB, // NMI
                    _ => 0xFFFF, // IRQ
                };
                self.pc |= (bus.read(master, vector_addr) as u16) << 8;
                self.interrupt_type = 0;
                self.state = ExecState::Fetch;
            }
            _ => self.state = ExecState::Fetch,
        }
    }
}

impl M6510 {
    /// Fetch the reset vector at $FFFC/$FFFD and seat the CPU at it.
    /// Split out from `Cpu::reset()` because the generic `Cpu` trait doesn't
    /// carry bus access; the owning `C64` calls this right after `reset()`
    /// once the memory map is wired up, mirroring the real 6-cycle reset
    /// sequence minus its internal-only cycles (which have no visible effect
    /// on any bus-observing component).
    pub fn reset_vector<B: Bus<Address = u16, Data = u8> + ?Sized>(
        &mut self,
        bus: &mut B,
        master: BusMaster,
    ) {
        let lo = bus.read(master, 0xFFFC) as u16;
        let hi = bus.read(master, 0xFFFD) as u16;
        self.pc = (hi << 8) | lo;
        self.state = ExecState::Fetch;
    }
}

impl Component for M6510 {
    fn tick(&mut self) -> bool {
        false
    }
}

impl BusMasterComponent for M6510 {
    type Bus = dyn Bus<Address = u16, Data = u8>;

    fn tick_with_bus(&mut self, bus: &mut Self::Bus, master: BusMaster) -> bool {
        self.execute_cycle(bus, master);
        matches!(self.state, ExecState::Fetch)
    }
}

impl Cpu for M6510 {
    fn reset(&mut self) {
        self.sp = 0xFD;
        self.p = 0x24;
        self.jam = false;
        self.ba_low_cycles = 0;
        self.nmi_previous = false;
        self.state = ExecState::Fetch;
        self.port.reset();
    }

    fn signal_interrupt(&mut self, _int: InterruptState) {}

    fn is_sleeping(&self) -> bool {
        self.jam
    }
}

impl CpuStateTrait for M6510 {
    type Snapshot = M6510State;

    fn snapshot(&self) -> M6510State {
        M6510State {
            a: self.a,
            x: self.x,
            y: self.y,
            pc: self.pc,
            sp: self.sp,
            p: self.p,
        }
    }
}

fn exec_state_to_code(state: &ExecState) -> (u8, u8, u8) {
    match *state {
        ExecState::Fetch => (0, 0, 0),
        ExecState::Execute(opcode, cycle) => (1, opcode, cycle),
        ExecState::Interrupt(cycle) => (2, cycle, 0),
        ExecState::Jammed => (3, 0, 0),
    }
}

fn exec_state_from_code(tag: u8, a: u8, b: u8) -> crate::error::Result<ExecState> {
    match tag {
        0 => Ok(ExecState::Fetch),
        1 => Ok(ExecState::Execute(a, b)),
        2 => Ok(ExecState::Interrupt(a)),
        3 => Ok(ExecState::Jammed),
        other => Err(crate::error::Vc64Error::Integrity(format!("unknown exec state tag {other}"))),
    }
}

impl crate::serialize::Snapshot for M6510 {
    /// Nothing about the CPU itself outlives `reset()` — the program in ROM
    /// is Memory's persistent state, not the CPU's.
    fn write_persistent(&self, _w: &mut crate::serialize::Writer) {}

    fn write_reset(&self, w: &mut crate::serialize::Writer) {
        use crate::serialize::Snapshot;
        w.u8(self.a);
        w.u8(self.x);
        w.u8(self.y);
        w.u16(self.pc);
        w.u8(self.sp);
        w.u8(self.p);
        let (tag, a, b) = exec_state_to_code(&self.state);
        w.u8(tag);
        w.u8(a);
        w.u8(b);
        w.u8(self.opcode);
        w.u16(self.temp_addr);
        w.u8(self.temp_data);
        w.u8(self.interrupt_type);
        w.bool(self.nmi_previous);
        w.bool(self.jam);
        self.port.write_reset(w);
        w.u8(self.ba_low_cycles);
    }

    fn read_persistent(&mut self, _r: &mut crate::serialize::Reader) -> crate::error::Result<()> {
        Ok(())
    }

    fn read_reset(&mut self, r: &mut crate::serialize::Reader) -> crate::error::Result<()> {
        use crate::serialize::Snapshot;
        self.a = r.u8()?;
        self.x = r.u8()?;
        self.y = r.u8()?;
        self.pc = r.u16()?;
        self.sp = r.u8()?;
        self.p = r.u8()?;
        let tag = r.u8()?;
        let a = r.u8()?;
        let b = r.u8()?;
        self.state = exec_state_from_code(tag, a, b)?;
        self.opcode = r.u8()?;
        self.temp_addr = r.u16()?;
        self.temp_data = r.u8()?;
        self.interrupt_type = r.u8()?;
        self.nmi_previous = r.bool()?;
        self.jam = r.bool()?;
        self.port.read_reset(r)?;
        self.ba_low_cycles = r.u8()?;
        Ok(())
    }
}
