//! Undocumented ("illegal") 6510 opcodes.
//!
//! These are combinations of two documented micro-operations that the NMOS
//! decode PLA happens to produce together. Implemented as thin wrappers over
//! the existing RMW/store/alu addressing-mode helpers so each illegal opcode
//! reads like "the two documented ops it's made of".

use super::{ExecState, M6510, StatusFlag};
use crate::core::{Bus, BusMaster};

impl M6510 {
    // ---- SLO: ASL memory, then ORA A with the result ----

    pub(crate) fn op_slo_zp<B: Bus<Address = u16, Data = u8> + ?Sized>(
        &mut self,
        cycle: u8,
        bus: &mut B,
        master: BusMaster,
    ) {
        self.rmw_zp(cycle, bus, master, |cpu, v| cpu.slo(v));
    }
    pub(crate) fn op_slo_zp_x<B: Bus<Address = u16, Data = u8> + ?Sized>(
        &mut self,
        cycle: u8,
        bus: &mut B,
        master: BusMaster,
    ) {
        self.rmw_zp_x(cycle, bus, master, |cpu, v| cpu.slo(v));
    }
    pub(crate) fn op_slo_abs<B: Bus<Address = u16, Data = u8> + ?Sized>(
        &mut self,
        cycle: u8,
        bus: &mut B,
        master: BusMaster,
    ) {
        self.rmw_abs(cycle, bus, master, |cpu, v| cpu.slo(v));
    }
    pub(crate) fn op_slo_abs_x<B: Bus<Address = u16, Data = u8> + ?Sized>(
        &mut self,
        cycle: u8,
        bus: &mut B,
        master: BusMaster,
    ) {
        self.rmw_abs_x(cycle, bus, master, |cpu, v| cpu.slo(v));
    }
    pub(crate) fn op_slo_abs_y<B: Bus<Address = u16, Data = u8> + ?Sized>(
        &mut self,
        cycle: u8,
        bus: &mut B,
        master: BusMaster,
    ) {
        self.rmw_abs_y(cycle, bus, master, |cpu, v| cpu.slo(v));
    }
    pub(crate) fn op_slo_ind_x<B: Bus<Address = u16, Data = u8> + ?Sized>(
        &mut self,
        cycle: u8,
        bus: &mut B,
        master: BusMaster,
    ) {
        self.rmw_ind_x(cycle, bus, master, |cpu, v| cpu.slo(v));
    }
    pub(crate) fn op_slo_ind_y<B: Bus<Address = u16, Data = u8> + ?Sized>(
        &mut self,
        cycle: u8,
        bus: &mut B,
        master: BusMaster,
    ) {
        self.rmw_ind_y(cycle, bus, master, |cpu, v| cpu.slo(v));
    }

    #[inline]
    fn slo(&mut self, v: u8) -> u8 {
        let shifted = self.perform_asl(v);
        self.perform_ora(shifted);
        shifted
    }

    // ---- RLA: ROL memory, then AND A with the result ----

    pub(crate) fn op_rla_zp<B: Bus<Address = u16, Data = u8> + ?Sized>(
        &mut self,
        cycle: u8,
        bus: &mut B,
        master: BusMaster,
    ) {
        self.rmw_zp(cycle, bus, master, |cpu, v| cpu.rla(v));
    }
    pub(crate) fn op_rla_zp_x<B: Bus<Address = u16, Data = u8> + ?Sized>(
        &mut self,
        cycle: u8,
        bus: &mut B,
        master: BusMaster,
    ) {
        self.rmw_zp_x(cycle, bus, master, |cpu, v| cpu.rla(v));
    }
    pub(crate) fn op_rla_abs<B: Bus<Address = u16, Data = u8> + ?Sized>(
        &mut self,
        cycle: u8,
        bus: &mut B,
        master: BusMaster,
    ) {
        self.rmw_abs(cycle, bus, master, |cpu, v| cpu.rla(v));
    }
    pub(crate) fn op_rla_abs_x<B: Bus<Address = u16, Data = u8> + ?Sized>(
        &mut self,
        cycle: u8,
        bus: &mut B,
        master: BusMaster,
    ) {
        self.rmw_abs_x(cycle, bus, master, |cpu, v| cpu.rla(v));
    }
    pub(crate) fn op_rla_abs_y<B: Bus<Address = u16, Data = u8> + ?Sized>(
        &mut self,
        cycle: u8,
        bus: &mut B,
        master: BusMaster,
    ) {
        self.rmw_abs_y(cycle, bus, master, |cpu, v| cpu.rla(v));
    }
    pub(crate) fn op_rla_ind_x<B: Bus<Address = u16, Data = u8> + ?Sized>(
        &mut self,
        cycle: u8,
        bus: &mut B,
        master: BusMaster,
    ) {
        self.rmw_ind_x(cycle, bus, master, |cpu, v| cpu.rla(v));
    }
    pub(crate) fn op_rla_ind_y<B: Bus<Address = u16, Data = u8> + ?Sized>(
        &mut self,
        cycle: u8,
        bus: &mut B,
        master: BusMaster,
    ) {
        self.rmw_ind_y(cycle, bus, master, |cpu, v| cpu.rla(v));
    }

    #[inline]
    fn rla(&mut self, v: u8) -> u8 {
        let rotated = self.perform_rol(v);
        self.perform_and(rotated);
        rotated
    }

    // ---- SRE: LSR memory, then EOR A with the result ----

    pub(crate) fn op_sre_zp<B: Bus<Address = u16, Data = u8> + ?Sized>(
        &mut self,
        cycle: u8,
        bus: &mut B,
        master: BusMaster,
    ) {
        self.rmw_zp(cycle, bus, master, |cpu, v| cpu.sre(v));
    }
    pub(crate) fn op_sre_zp_x<B: Bus<Address = u16, Data = u8> + ?Sized>(
        &mut self,
        cycle: u8,
        bus: &mut B,
        master: BusMaster,
    ) {
        self.rmw_zp_x(cycle, bus, master, |cpu, v| cpu.sre(v));
    }
    pub(crate) fn op_sre_abs<B: Bus<Address = u16, Data = u8> + ?Sized>(
        &mut self,
        cycle: u8,
        bus: &mut B,
        master: BusMaster,
    ) {
        self.rmw_abs(cycle, bus, master, |cpu, v| cpu.sre(v));
    }
    pub(crate) fn op_sre_abs_x<B: Bus<Address = u16, Data = u8> + ?Sized>(
        &mut self,
        cycle: u8,
        bus: &mut B,
        master: BusMaster,
    ) {
        self.rmw_abs_x(cycle, bus, master, |cpu, v| cpu.sre(v));
    }
    pub(crate) fn op_sre_abs_y<B: Bus<Address = u16, Data = u8> + ?Sized>(
        &mut self,
        cycle: u8,
        bus: &mut B,
        master: BusMaster,
    ) {
        self.rmw_abs_y(cycle, bus, master, |cpu, v| cpu.sre(v));
    }
    pub(crate) fn op_sre_ind_x<B: Bus<Address = u16, Data = u8> + ?Sized>(
        &mut self,
        cycle: u8,
        bus: &mut B,
        master: BusMaster,
    ) {
        self.rmw_ind_x(cycle, bus, master, |cpu, v| cpu.sre(v));
    }
    pub(crate) fn op_sre_ind_y<B: Bus<Address = u16, Data = u8> + ?Sized>(
        &mut self,
        cycle: u8,
        bus: &mut B,
        master: BusMaster,
    ) {
        self.rmw_ind_y(cycle, bus, master, |cpu, v| cpu.sre(v));
    }

    #[inline]
    fn sre(&mut self, v: u8) -> u8 {
        let shifted = self.perform_lsr(v);
        self.perform_eor(shifted);
        shifted
    }

    // ---- RRA: ROR memory, then ADC A with the result ----

    pub(crate) fn op_rra_zp<B: Bus<Address = u16, Data = u8> + ?Sized>(
        &mut self,
        cycle: u8,
        bus: &mut B,
        master: BusMaster,
    ) {
        self.rmw_zp(cycle, bus, master, |cpu, v| cpu.rra(v));
    }
    pub(crate) fn op_rra_zp_x<B: Bus<Address = u16, Data = u8> + ?Sized>(
        &mut self,
        cycle: u8,
        bus: &mut B,
        master: BusMaster,
    ) {
        self.rmw_zp_x(cycle, bus, master, |cpu, v| cpu.rra(v));
    }
    pub(crate) fn op_rra_abs<B: Bus<Address = u16, Data = u8> + ?Sized>(
        &mut self,
        cycle: u8,
        bus: &mut B,
        master: BusMaster,
    ) {
        self.rmw_abs(cycle, bus, master, |cpu, v| cpu.rra(v));
    }
    pub(crate) fn op_rra_abs_x<B: Bus<Address = u16, Data = u8> + ?Sized>(
        &mut self,
        cycle: u8,
        bus: &mut B,
        master: BusMaster,
    ) {
        self.rmw_abs_x(cycle, bus, master, |cpu, v| cpu.rra(v));
    }
    pub(crate) fn op_rra_abs_y<B: Bus<Address = u16, Data = u8> + ?Sized>(
        &mut self,
        cycle: u8,
        bus: &mut B,
        master: BusMaster,
    ) {
        self.rmw_abs_y(cycle, bus, master, |cpu, v| cpu.rra(v));
    }
    pub(crate) fn op_rra_ind_x<B: Bus<Address = u16, Data = u8> + ?Sized>(
        &mut self,
        cycle: u8,
        bus: &mut B,
        master: BusMaster,
    ) {
        self.rmw_ind_x(cycle, bus, master, |cpu, v| cpu.rra(v));
    }
    pub(crate) fn op_rra_ind_y<B: Bus<Address = u16, Data = u8> + ?Sized>(
        &mut self,
        cycle: u8,
        bus: &mut B,
        master: BusMaster,
    ) {
        self.rmw_ind_y(cycle, bus, master, |cpu, v| cpu.rra(v));
    }

    #[inline]
    fn rra(&mut self, v: u8) -> u8 {
        let rotated = self.perform_ror(v);
        self.perform_adc(rotated);
        rotated
    }

    // ---- DCP: DEC memory, then CMP A with the result ----

    pub(crate) fn op_dcp_zp<B: Bus<Address = u16, Data = u8> + ?Sized>(
        &mut self,
        cycle: u8,
        bus: &mut B,
        master: BusMaster,
    ) {
        self.rmw_zp(cycle, bus, master, |cpu, v| cpu.dcp(v));
    }
    pub(crate) fn op_dcp_zp_x<B: Bus<Address = u16, Data = u8> + ?Sized>(
        &mut self,
        cycle: u8,
        bus: &mut B,
        master: BusMaster,
    ) {
        self.rmw_zp_x(cycle, bus, master, |cpu, v| cpu.dcp(v));
    }
    pub(crate) fn op_dcp_abs<B: Bus<Address = u16, Data = u8> + ?Sized>(
        &mut self,
        cycle: u8,
        bus: &mut B,
        master: BusMaster,
    ) {
        self.rmw_abs(cycle, bus, master, |cpu, v| cpu.dcp(v));
    }
    pub(crate) fn op_dcp_abs_x<B: Bus<Address = u16, Data = u8> + ?Sized>(
        &mut self,
        cycle: u8,
        bus: &mut B,
        master: BusMaster,
    ) {
        self.rmw_abs_x(cycle, bus, master, |cpu, v| cpu.dcp(v));
    }
    pub(crate) fn op_dcp_abs_y<B: Bus<Address = u16, Data = u8> + ?Sized>(
        &mut self,
        cycle: u8,
        bus: &mut B,
        master: BusMaster,
    ) {
        self.rmw_abs_y(cycle, bus, master, |cpu, v| cpu.dcp(v));
    }
    pub(crate) fn op_dcp_ind_x<B: Bus<Address = u16, Data = u8> + ?Sized>(
        &mut self,
        cycle: u8,
        bus: &mut B,
        master: BusMaster,
    ) {
        self.rmw_ind_x(cycle, bus, master, |cpu, v| cpu.dcp(v));
    }
    pub(crate) fn op_dcp_ind_y<B: Bus<Address = u16, Data = u8> + ?Sized>(
        &mut self,
        cycle: u8,
        bus: &mut B,
        master: BusMaster,
    ) {
        self.rmw_ind_y(cycle, bus, master, |cpu, v| cpu.dcp(v));
    }

    #[inline]
    fn dcp(&mut self, v: u8) -> u8 {
        let decremented = v.wrapping_sub(1);
        self.perform_compare(self.a, decremented);
        decremented
    }

    // ---- ISC (a.k.a. ISB): INC memory, then SBC A with the result ----

    pub(crate) fn op_isc_zp<B: Bus<Address = u16, Data = u8> + ?Sized>(
        &mut self,
        cycle: u8,
        bus: &mut B,
        master: BusMaster,
    ) {
        self.rmw_zp(cycle, bus, master, |cpu, v| cpu.isc(v));
    }
    pub(crate) fn op_isc_zp_x<B: Bus<Address = u16, Data = u8> + ?Sized>(
        &mut self,
        cycle: u8,
        bus: &mut B,
        master: BusMaster,
    ) {
        self.rmw_zp_x(cycle, bus, master, |cpu, v| cpu.isc(v));
    }
    pub(crate) fn op_isc_abs<B: Bus<Address = u16, Data = u8> + ?Sized>(
        &mut self,
        cycle: u8,
        bus: &mut B,
        master: BusMaster,
    ) {
        self.rmw_abs(cycle, bus, master, |cpu, v| cpu.isc(v));
    }
    pub(crate) fn op_isc_abs_x<B: Bus<Address = u16, Data = u8> + ?Sized>(
        &mut self,
        cycle: u8,
        bus: &mut B,
        master: BusMaster,
    ) {
        self.rmw_abs_x(cycle, bus, master, |cpu, v| cpu.isc(v));
    }
    pub(crate) fn op_isc_abs_y<B: Bus<Address = u16, Data = u8> + ?Sized>(
        &mut self,
        cycle: u8,
        bus: &mut B,
        master: BusMaster,
    ) {
        self.rmw_abs_y(cycle, bus, master, |cpu, v| cpu.isc(v));
    }
    pub(crate) fn op_isc_ind_x<B: Bus<Address = u16, Data = u8> + ?Sized>(
        &mut self,
        cycle: u8,
        bus: &mut B,
        master: BusMaster,
    ) {
        self.rmw_ind_x(cycle, bus, master, |cpu, v| cpu.isc(v));
    }
    pub(crate) fn op_isc_ind_y<B: Bus<Address = u16, Data = u8> + ?Sized>(
        &mut self,
        cycle: u8,
        bus: &mut B,
        master: BusMaster,
    ) {
        self.rmw_ind_y(cycle, bus, master, |cpu, v| cpu.isc(v));
    }

    #[inline]
    fn isc(&mut self, v: u8) -> u8 {
        let incremented = v.wrapping_add(1);
        self.perform_sbc(incremented);
        incremented
    }

    // ---- SAX: store A & X (no flags affected) ----

    pub(crate) fn op_sax_zp<B: Bus<Address = u16, Data = u8> + ?Sized>(
        &mut self,
        cycle: u8,
        bus: &mut B,
        master: BusMaster,
    ) {
        self.store_zp(cycle, bus, master, self.a & self.x);
    }
    pub(crate) fn op_sax_zp_y<B: Bus<Address = u16, Data = u8> + ?Sized>(
        &mut self,
        cycle: u8,
        bus: &mut B,
        master: BusMaster,
    ) {
        self.store_zp_y(cycle, bus, master, self.a & self.x);
    }
    pub(crate) fn op_sax_abs<B: Bus<Address = u16, Data = u8> + ?Sized>(
        &mut self,
        cycle: u8,
        bus: &mut B,
        master: BusMaster,
    ) {
        self.store_abs(cycle, bus, master, self.a & self.x);
    }
    pub(crate) fn op_sax_ind_x<B: Bus<Address = u16, Data = u8> + ?Sized>(
        &mut self,
        cycle: u8,
        bus: &mut B,
        master: BusMaster,
    ) {
        self.store_ind_x(cycle, bus, master, self.a & self.x);
    }

    // ---- LAX: load A and X simultaneously from memory ----

    pub(crate) fn op_lax_zp<B: Bus<Address = u16, Data = u8> + ?Sized>(
        &mut self,
        cycle: u8,
        bus: &mut B,
        master: BusMaster,
    ) {
        self.alu_zp(cycle, bus, master, |cpu, v| cpu.lax(v));
    }
    pub(crate) fn op_lax_zp_y<B: Bus<Address = u16, Data = u8> + ?Sized>(
        &mut self,
        cycle: u8,
        bus: &mut B,
        master: BusMaster,
    ) {
        self.alu_zp_y(cycle, bus, master, |cpu, v| cpu.lax(v));
    }
    pub(crate) fn op_lax_abs<B: Bus<Address = u16, Data = u8> + ?Sized>(
        &mut self,
        cycle: u8,
        bus: &mut B,
        master: BusMaster,
    ) {
        self.alu_abs(cycle, bus, master, |cpu, v| cpu.lax(v));
    }
    pub(crate) fn op_lax_abs_y<B: Bus<Address = u16, Data = u8> + ?Sized>(
        &mut self,
        cycle: u8,
        bus: &mut B,
        master: BusMaster,
    ) {
        self.alu_abs_y(cycle, bus, master, |cpu, v| cpu.lax(v));
    }
    pub(crate) fn op_lax_ind_x<B: Bus<Address = u16, Data = u8> + ?Sized>(
        &mut self,
        cycle: u8,
        bus: &mut B,
        master: BusMaster,
    ) {
        self.alu_ind_x(cycle, bus, master, |cpu, v| cpu.lax(v));
    }
    pub(crate) fn op_lax_ind_y<B: Bus<Address = u16, Data = u8> + ?Sized>(
        &mut self,
        cycle: u8,
        bus: &mut B,
        master: BusMaster,
    ) {
        self.alu_ind_y(cycle, bus, master, |cpu, v| cpu.lax(v));
    }

    #[inline]
    fn lax(&mut self, v: u8) {
        self.a = v;
        self.x = v;
        self.set_nz(v);
    }

    // ---- Immediate-mode illegals: ANC, ALR, ARR, AXS (SBX), LAS ----

    /// ANC #imm (0x0B/0x2B) - AND A with immediate, then copy N into C.
    pub(crate) fn op_anc_imm<B: Bus<Address = u16, Data = u8> + ?Sized>(
        &mut self,
        cycle: u8,
        bus: &mut B,
        master: BusMaster,
    ) {
        self.alu_imm(cycle, bus, master, |cpu, v| {
            cpu.perform_and(v);
            let n = cpu.p & StatusFlag::N as u8 != 0;
            cpu.set_flag(StatusFlag::C, n);
        });
    }

    /// ALR #imm (0x4B) - AND A with immediate, then LSR the accumulator.
    pub(crate) fn op_alr_imm<B: Bus<Address = u16, Data = u8> + ?Sized>(
        &mut self,
        cycle: u8,
        bus: &mut B,
        master: BusMaster,
    ) {
        self.alu_imm(cycle, bus, master, |cpu, v| {
            cpu.perform_and(v);
            cpu.a = cpu.perform_lsr(cpu.a);
        });
    }

    /// ARR #imm (0x6B) - AND A with immediate, then ROR the accumulator with
    /// the documented quirky C/V derivation from bits 6 and 5 of the result.
    pub(crate) fn op_arr_imm<B: Bus<Address = u16, Data = u8> + ?Sized>(
        &mut self,
        cycle: u8,
        bus: &mut B,
        master: BusMaster,
    ) {
        self.alu_imm(cycle, bus, master, |cpu, v| {
            cpu.a &= v;
            let carry_in = cpu.p & StatusFlag::C as u8 != 0;
            cpu.a = (cpu.a >> 1) | if carry_in { 0x80 } else { 0 };
            cpu.set_nz(cpu.a);
            let bit6 = cpu.a & 0x40 != 0;
            let bit5 = cpu.a & 0x20 != 0;
            cpu.set_flag(StatusFlag::C, bit6);
            cpu.set_flag(StatusFlag::V, bit6 ^ bit5);
        });
    }

    /// AXS/SBX #imm (0xCB) - X = (A & X) - immediate, sets flags like CMP.
    pub(crate) fn op_axs_imm<B: Bus<Address = u16, Data = u8> + ?Sized>(
        &mut self,
        cycle: u8,
        bus: &mut B,
        master: BusMaster,
    ) {
        self.alu_imm(cycle, bus, master, |cpu, v| {
            let src = cpu.a & cpu.x;
            cpu.set_flag(StatusFlag::C, src >= v);
            cpu.x = src.wrapping_sub(v);
            cpu.set_nz(cpu.x);
        });
    }

    /// LAS abs,Y (0xBB) - A = X = SP = memory & SP.
    pub(crate) fn op_las_abs_y<B: Bus<Address = u16, Data = u8> + ?Sized>(
        &mut self,
        cycle: u8,
        bus: &mut B,
        master: BusMaster,
    ) {
        self.alu_abs_y(cycle, bus, master, |cpu, v| {
            let result = v & cpu.sp;
            cpu.a = result;
            cpu.x = result;
            cpu.sp = result;
            cpu.set_nz(result);
        });
    }

    /// NOP variants that consume operand bytes/cycles but do nothing else.
    /// Covers the documented "unofficial NOP" opcode families.
    pub(crate) fn op_nop_zp<B: Bus<Address = u16, Data = u8> + ?Sized>(
        &mut self,
        cycle: u8,
        bus: &mut B,
        master: BusMaster,
    ) {
        self.alu_zp(cycle, bus, master, |_, _| {});
    }
    pub(crate) fn op_nop_zp_x<B: Bus<Address = u16, Data = u8> + ?Sized>(
        &mut self,
        cycle: u8,
        bus: &mut B,
        master: BusMaster,
    ) {
        self.alu_zp_x(cycle, bus, master, |_, _| {});
    }
    pub(crate) fn op_nop_abs<B: Bus<Address = u16, Data = u8> + ?Sized>(
        &mut self,
        cycle: u8,
        bus: &mut B,
        master: BusMaster,
    ) {
        self.alu_abs(cycle, bus, master, |_, _| {});
    }
    pub(crate) fn op_nop_abs_x<B: Bus<Address = u16, Data = u8> + ?Sized>(
        &mut self,
        cycle: u8,
        bus: &mut B,
        master: BusMaster,
    ) {
        self.alu_abs_x(cycle, bus, master, |_, _| {});
    }
    pub(crate) fn op_nop_imm<B: Bus<Address = u16, Data = u8> + ?Sized>(
        &mut self,
        cycle: u8,
        bus: &mut B,
        master: BusMaster,
    ) {
        self.alu_imm(cycle, bus, master, |_, _| {});
    }

    /// JAM (HLT/KIL family): halts the CPU permanently until reset.
    /// Sets `jam`, which the run loop observes via `is_jammed()`.
    pub(crate) fn op_jam(&mut self) {
        self.jam = true;
        self.state = ExecState::Jammed;
    }
}
