use crate::core::bus::BusMaster;

/// A component that advances its own internal state by one step without
/// needing bus access (e.g. a component that is only ever driven through
/// `BusMasterComponent`, or a leaf device ticked by its owner directly).
///
/// Returns `true` when the component has completed a full "unit of work"
/// for this step (an instruction retiring, a byte shifted out, etc.) — the
/// exact meaning is component-defined; callers that don't care can ignore
/// the return value.
pub trait Component {
    fn tick(&mut self) -> bool;
}

/// A component that needs to act as a bus master to advance (reads/writes
/// memory as part of its own step). CPUs are the canonical example: each
/// `tick_with_bus` call advances exactly one bus cycle.
pub trait BusMasterComponent {
    type Bus: ?Sized;

    /// Advance by one cycle, performing any bus traffic that cycle requires.
    /// Returns `true` when this call completed an instruction (the component
    /// is back at its fetch/idle state), mirroring `Component::tick`.
    fn tick_with_bus(&mut self, bus: &mut Self::Bus, master: BusMaster) -> bool;
}
