//! Emulator thread & run loop.
//!
//! The scheduler owns no hardware state of its own; it drives whatever
//! implements [`Runnable`] one frame at a time and arbitrates power
//! state, breakpoints, snapshots and host-thread synchronization around
//! that. A host spawns its own dedicated emulation thread and calls
//! [`Scheduler::run_loop`] from it; every other thread talks to the
//! emulation thread only through the [`ControlHandle`] returned by
//! [`Scheduler::new`] — message queue, thread-lock/suspend-resume, and
//! the atomic `runLoopCtrl` bits are the only supported crossings.

pub mod snapshot;

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

use snapshot::SnapshotRing;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerState {
    Off,
    Paused,
    Running,
}

mod ctrl {
    pub const STOP: u32 = 1 << 0;
    pub const CPU_JAMMED: u32 = 1 << 1;
    pub const BREAKPOINT_REACHED: u32 = 1 << 2;
    pub const WATCHPOINT_REACHED: u32 = 1 << 3;
    pub const INSPECT: u32 = 1 << 4;
    pub const AUTO_SNAPSHOT: u32 = 1 << 5;
    pub const USER_SNAPSHOT: u32 = 1 << 6;
}

/// Flags a host can read off [`ControlHandle::flags`] and must
/// acknowledge with [`ControlHandle::clear_flags`].
pub mod flags {
    pub use super::ctrl::{
        BREAKPOINT_REACHED, CPU_JAMMED, INSPECT, STOP, USER_SNAPSHOT, WATCHPOINT_REACHED,
    };
}

/// The effect of one bus cycle, as far as the scheduler needs to know.
#[derive(Debug, Clone, Copy, Default)]
pub struct CycleOutcome {
    pub jammed: bool,
    pub instruction_retired: bool,
    pub write_address: Option<u16>,
}

/// What the scheduler drives. The top-level system struct implements
/// this; the scheduler itself has no hardware knowledge.
pub trait Runnable {
    fn execute_one_cycle(&mut self) -> CycleOutcome;
    fn cycles_per_line(&self) -> u32;
    fn raster_lines(&self) -> u32;
    /// Wall-clock duration of one frame at the configured model's
    /// nominal refresh rate, in nanoseconds.
    fn frame_nanos(&self) -> u64;
    fn pc(&self) -> u16;
    fn take_snapshot(&self) -> Vec<u8>;
    fn restore_snapshot(&mut self, data: &[u8]) -> crate::error::Result<()>;
}

struct Shared {
    state: Mutex<PowerState>,
    quiesced: Condvar,
    ctrl: AtomicU32,
    suspend_depth: AtomicUsize,
    warp: AtomicBool,
}

/// Cross-thread handle for state-changing calls; cheap to clone.
#[derive(Clone)]
pub struct ControlHandle(Arc<Shared>);

impl ControlHandle {
    pub fn power_state(&self) -> PowerState {
        *self.0.state.lock().unwrap()
    }

    pub fn power_on(&self) {
        let mut state = self.0.state.lock().unwrap();
        if *state == PowerState::Off {
            *state = PowerState::Paused;
        }
    }

    /// `powerOff()` on RUNNING pauses first; a no-op when already OFF.
    pub fn power_off(&self) {
        let mut state = self.0.state.lock().unwrap();
        if *state == PowerState::Off {
            return;
        }
        if *state == PowerState::Running {
            self.0.ctrl.fetch_or(ctrl::STOP, Ordering::SeqCst);
            state = self.0.quiesced.wait_while(state, |s| *s == PowerState::Running).unwrap();
        }
        *state = PowerState::Off;
    }

    pub fn run(&self) {
        let mut state = self.0.state.lock().unwrap();
        if *state != PowerState::Off {
            self.0.ctrl.fetch_and(!ctrl::STOP, Ordering::SeqCst);
            *state = PowerState::Running;
            self.0.quiesced.notify_all();
        }
    }

    /// A no-op if already paused (or off).
    pub fn pause(&self) {
        let mut state = self.0.state.lock().unwrap();
        if *state != PowerState::Running {
            return;
        }
        self.0.ctrl.fetch_or(ctrl::STOP, Ordering::SeqCst);
        state = self.0.quiesced.wait_while(state, |s| *s == PowerState::Running).unwrap();
        // the run loop already parked it at Paused; nothing further to set.
        debug_assert_ne!(*state, PowerState::Running);
    }

    /// Nests via a counter: suspend above zero must pause, decrementing
    /// back to zero resumes.
    pub fn suspend(&self) {
        if self.0.suspend_depth.fetch_add(1, Ordering::SeqCst) == 0 {
            self.pause();
        }
    }

    pub fn resume(&self) {
        if self.0.suspend_depth.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.run();
        }
    }

    /// Sticky and idempotent.
    pub fn request_stop(&self) {
        self.0.ctrl.fetch_or(ctrl::STOP, Ordering::SeqCst);
    }

    pub fn set_warp(&self, warp: bool) {
        self.0.warp.store(warp, Ordering::Relaxed);
    }

    pub fn request_user_snapshot(&self) {
        self.0.ctrl.fetch_or(ctrl::USER_SNAPSHOT, Ordering::SeqCst);
    }

    pub fn request_inspect(&self) {
        self.0.ctrl.fetch_or(ctrl::INSPECT, Ordering::SeqCst);
    }

    pub fn flags(&self) -> u32 {
        self.0.ctrl.load(Ordering::SeqCst)
    }

    pub fn clear_flags(&self, mask: u32) {
        self.0.ctrl.fetch_and(!mask, Ordering::SeqCst);
    }
}

pub struct Scheduler {
    shared: Arc<Shared>,
    frame: u64,
    last_auto_snapshot_frame: u64,
    auto_snapshot_interval_frames: Option<u64>,
    auto_snapshots_suspended: bool,
    breakpoints: HashSet<u16>,
    watchpoints: HashSet<u16>,
    step_into_armed: bool,
    step_over_target: Option<u16>,
    auto_ring: SnapshotRing,
    user_ring: SnapshotRing,
    nano_target_time: Option<Instant>,
}

impl Scheduler {
    pub fn new() -> (Self, ControlHandle) {
        let shared = Arc::new(Shared {
            state: Mutex::new(PowerState::Off),
            quiesced: Condvar::new(),
            ctrl: AtomicU32::new(0),
            suspend_depth: AtomicUsize::new(0),
            warp: AtomicBool::new(false),
        });
        let handle = ControlHandle(shared.clone());
        let scheduler = Self {
            shared,
            frame: 0,
            last_auto_snapshot_frame: 0,
            auto_snapshot_interval_frames: None,
            auto_snapshots_suspended: false,
            breakpoints: HashSet::new(),
            watchpoints: HashSet::new(),
            step_into_armed: false,
            step_over_target: None,
            auto_ring: SnapshotRing::new(),
            user_ring: SnapshotRing::new(),
            nano_target_time: None,
        };
        (scheduler, handle)
    }

    pub fn add_breakpoint(&mut self, pc: u16) {
        self.breakpoints.insert(pc);
    }

    pub fn remove_breakpoint(&mut self, pc: u16) {
        self.breakpoints.remove(&pc);
    }

    pub fn add_watchpoint(&mut self, addr: u16) {
        self.watchpoints.insert(addr);
    }

    pub fn remove_watchpoint(&mut self, addr: u16) {
        self.watchpoints.remove(&addr);
    }

    /// Runs until the current instruction retires and one more fetch
    /// begins, then pauses.
    pub fn step_into(&mut self) {
        self.step_into_armed = true;
    }

    /// One-shot soft breakpoint at `return_pc` (normally PC + the
    /// retiring instruction's length).
    pub fn step_over(&mut self, return_pc: u16) {
        self.step_over_target = Some(return_pc);
    }

    pub fn set_auto_snapshot_interval(&mut self, seconds: Option<u64>, frame_nanos: u64) {
        self.auto_snapshot_interval_frames =
            seconds.map(|s| (s.saturating_mul(1_000_000_000)) / frame_nanos.max(1));
    }

    /// Biases the interval to +infinity: no auto-snapshot fires until
    /// [`resume_auto_snapshots`].
    pub fn suspend_auto_snapshots(&mut self) {
        self.auto_snapshots_suspended = true;
    }

    pub fn resume_auto_snapshots(&mut self) {
        self.auto_snapshots_suspended = false;
    }

    pub fn auto_snapshots(&self) -> &SnapshotRing {
        &self.auto_ring
    }

    pub fn user_snapshots(&self) -> &SnapshotRing {
        &self.user_ring
    }

    pub fn frame(&self) -> u64 {
        self.frame
    }

    /// Drives `machine` a frame at a time until `STOP` is observed
    /// (before a frame begins, or set by that frame's own jam/breakpoint/
    /// watchpoint), parks the power state at PAUSED (or leaves it OFF, if
    /// a host raced us to `power_off()`), and returns.
    ///
    /// A host calls this in its own loop from a dedicated emulation
    /// thread: each call services frames until the next pause, and the
    /// following call blocks (inside the PAUSED wait) until
    /// [`ControlHandle::run`] wakes it or the state reaches OFF.
    pub fn run_loop<M: Runnable>(&mut self, machine: &mut M) {
        loop {
            {
                let mut state = self.shared.state.lock().unwrap();
                while *state == PowerState::Paused {
                    state = self.shared.quiesced.wait(state).unwrap();
                }
                if *state == PowerState::Off {
                    return;
                }
            }

            if self.shared.ctrl.load(Ordering::SeqCst) & ctrl::STOP != 0 {
                let mut state = self.shared.state.lock().unwrap();
                if *state != PowerState::Off {
                    *state = PowerState::Paused;
                }
                self.shared.quiesced.notify_all();
                return;
            }

            self.execute_one_frame(machine);
        }
    }

    fn execute_one_frame<M: Runnable>(&mut self, machine: &mut M) {
        let cycles_per_line = machine.cycles_per_line();
        let raster_lines = machine.raster_lines();
        for _ in 0..raster_lines {
            for _ in 0..cycles_per_line {
                let outcome = machine.execute_one_cycle();
                if outcome.jammed {
                    self.shared.ctrl.fetch_or(ctrl::CPU_JAMMED | ctrl::STOP, Ordering::SeqCst);
                }
                if let Some(addr) = outcome.write_address {
                    if self.watchpoints.contains(&addr) {
                        self.shared.ctrl.fetch_or(ctrl::WATCHPOINT_REACHED | ctrl::STOP, Ordering::SeqCst);
                    }
                }
                if outcome.instruction_retired {
                    self.on_instruction_retired(machine.pc());
                }
            }
        }
        self.end_frame(machine);
    }

    fn on_instruction_retired(&mut self, pc: u16) {
        if self.step_into_armed {
            self.step_into_armed = false;
            self.shared.ctrl.fetch_or(ctrl::STOP, Ordering::SeqCst);
        }
        if self.step_over_target == Some(pc) {
            self.step_over_target = None;
            self.shared.ctrl.fetch_or(ctrl::STOP, Ordering::SeqCst);
        }
        if self.breakpoints.contains(&pc) {
            self.shared.ctrl.fetch_or(ctrl::BREAKPOINT_REACHED | ctrl::STOP, Ordering::SeqCst);
        }
    }

    /// Priority order for flags serviced at a frame boundary: STOP >
    /// JAMMED > BREAKPOINT > WATCHPOINT > INSPECT > AUTO_SNAPSHOT >
    /// USER_SNAPSHOT. STOP/JAMMED/BREAKPOINT/WATCHPOINT are left set for
    /// the host to observe via [`ControlHandle::flags`] and acknowledge;
    /// only the snapshot/inspect flags are serviced and cleared here.
    fn end_frame<M: Runnable>(&mut self, machine: &mut M) {
        self.frame += 1;

        if !self.auto_snapshots_suspended {
            if let Some(interval) = self.auto_snapshot_interval_frames {
                if self.frame - self.last_auto_snapshot_frame >= interval {
                    self.shared.ctrl.fetch_or(ctrl::AUTO_SNAPSHOT, Ordering::SeqCst);
                }
            }
        }

        let pending = self.shared.ctrl.load(Ordering::SeqCst);
        if pending & ctrl::INSPECT != 0 {
            self.shared.ctrl.fetch_and(!ctrl::INSPECT, Ordering::SeqCst);
        }
        if pending & ctrl::AUTO_SNAPSHOT != 0 {
            self.auto_ring.insert(machine.take_snapshot());
            self.last_auto_snapshot_frame = self.frame;
            self.shared.ctrl.fetch_and(!ctrl::AUTO_SNAPSHOT, Ordering::SeqCst);
        }
        if pending & ctrl::USER_SNAPSHOT != 0 {
            self.user_ring.insert(machine.take_snapshot());
            self.shared.ctrl.fetch_and(!ctrl::USER_SNAPSHOT, Ordering::SeqCst);
        }

        self.synchronize_timing(machine.frame_nanos());
    }

    fn synchronize_timing(&mut self, frame_nanos: u64) {
        if self.shared.warp.load(Ordering::Relaxed) {
            self.nano_target_time = None;
            return;
        }
        let now = Instant::now();
        let target = self.nano_target_time.unwrap_or(now) + Duration::from_nanos(frame_nanos);
        if now > target + Duration::from_millis(200) {
            self.nano_target_time = Some(now);
            return;
        }
        if target > now {
            std::thread::sleep(target - now);
        }
        self.nano_target_time = Some(target);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct CountingMachine {
        cycles_run: u64,
        cycles_per_line: u32,
        raster_lines: u32,
    }

    impl Runnable for CountingMachine {
        fn execute_one_cycle(&mut self) -> CycleOutcome {
            self.cycles_run += 1;
            CycleOutcome::default()
        }
        fn cycles_per_line(&self) -> u32 {
            self.cycles_per_line
        }
        fn raster_lines(&self) -> u32 {
            self.raster_lines
        }
        fn frame_nanos(&self) -> u64 {
            0 // warp-equivalent: synchronize_timing sleeps 0ns either way
        }
        fn pc(&self) -> u16 {
            0
        }
        fn take_snapshot(&self) -> Vec<u8> {
            self.cycles_run.to_le_bytes().to_vec()
        }
        fn restore_snapshot(&mut self, data: &[u8]) -> crate::error::Result<()> {
            self.cycles_run = u64::from_le_bytes(data.try_into().unwrap());
            Ok(())
        }
    }

    /// Jams on its first cycle, so exactly one frame runs unconditionally
    /// before the run loop observes `STOP` and pauses.
    struct JamsImmediately(CountingMachine);

    impl Runnable for JamsImmediately {
        fn execute_one_cycle(&mut self) -> CycleOutcome {
            let was_first = self.0.cycles_run == 0;
            self.0.execute_one_cycle();
            CycleOutcome { jammed: was_first, ..Default::default() }
        }
        fn cycles_per_line(&self) -> u32 {
            self.0.cycles_per_line()
        }
        fn raster_lines(&self) -> u32 {
            self.0.raster_lines()
        }
        fn frame_nanos(&self) -> u64 {
            0
        }
        fn pc(&self) -> u16 {
            0
        }
        fn take_snapshot(&self) -> Vec<u8> {
            self.0.take_snapshot()
        }
        fn restore_snapshot(&mut self, data: &[u8]) -> crate::error::Result<()> {
            self.0.restore_snapshot(data)
        }
    }

    #[test]
    fn executes_exactly_one_frame_worth_of_cycles() {
        let (mut scheduler, handle) = Scheduler::new();
        handle.power_on();
        handle.run();
        let mut machine =
            JamsImmediately(CountingMachine { cycles_run: 0, cycles_per_line: 63, raster_lines: 312 });
        scheduler.run_loop(&mut machine);
        assert_eq!(machine.0.cycles_run, 63 * 312);
        assert_eq!(scheduler.frame(), 1);
        assert_eq!(handle.power_state(), PowerState::Paused);
        assert_eq!(handle.flags() & flags::CPU_JAMMED, flags::CPU_JAMMED);
    }

    #[test]
    fn breakpoint_stops_the_loop_and_sets_its_flag() {
        let (mut scheduler, handle) = Scheduler::new();
        handle.power_on();
        handle.run();
        scheduler.add_breakpoint(0);

        struct RetiringMachine(CountingMachine);
        impl Runnable for RetiringMachine {
            fn execute_one_cycle(&mut self) -> CycleOutcome {
                self.0.execute_one_cycle();
                CycleOutcome { instruction_retired: true, ..Default::default() }
            }
            fn cycles_per_line(&self) -> u32 {
                self.0.cycles_per_line()
            }
            fn raster_lines(&self) -> u32 {
                self.0.raster_lines()
            }
            fn frame_nanos(&self) -> u64 {
                0
            }
            fn pc(&self) -> u16 {
                0
            }
            fn take_snapshot(&self) -> Vec<u8> {
                self.0.take_snapshot()
            }
            fn restore_snapshot(&mut self, data: &[u8]) -> crate::error::Result<()> {
                self.0.restore_snapshot(data)
            }
        }
        let mut retiring = RetiringMachine(CountingMachine { cycles_run: 0, cycles_per_line: 2, raster_lines: 2 });
        scheduler.run_loop(&mut retiring);
        assert_eq!(handle.flags() & flags::BREAKPOINT_REACHED, flags::BREAKPOINT_REACHED);
        assert_eq!(handle.flags() & flags::STOP, flags::STOP);
    }

    #[test]
    fn suspend_resume_nests_via_counter() {
        // Exercised while PAUSED, not RUNNING, so suspend()/resume() never
        // block waiting for a run loop that isn't executing anywhere.
        let (_scheduler, handle) = Scheduler::new();
        handle.power_on();
        assert_eq!(handle.power_state(), PowerState::Paused);
        handle.suspend();
        handle.suspend();
        assert_eq!(handle.power_state(), PowerState::Paused);
        handle.resume();
        assert_eq!(handle.power_state(), PowerState::Paused);
        handle.resume();
        assert_eq!(handle.power_state(), PowerState::Running);
    }

    #[test]
    fn auto_snapshot_fires_at_the_configured_cadence() {
        let (mut scheduler, handle) = Scheduler::new();
        handle.power_on();
        handle.run();
        scheduler.set_auto_snapshot_interval(Some(0), 1_000_000_000);
        let mut machine =
            JamsImmediately(CountingMachine { cycles_run: 0, cycles_per_line: 1, raster_lines: 1 });
        scheduler.run_loop(&mut machine);
        assert_eq!(scheduler.auto_snapshots().len(), 1);
    }
}
