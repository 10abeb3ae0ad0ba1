//! Serial IEC bus: a wired-AND of ATN/CLK/DATA contributed by the
//! C64 (via CIA2) and every attached drive.
//!
//! The composite line state is recomputed inside this component whenever
//! any contributor's output changes, rather than inside CIA2 or the
//! drive — neither side can see what the other is driving.

/// Maximum number of drives that can be daisy-chained onto one bus.
const MAX_DRIVES: usize = 4;

#[derive(Debug, Clone, Copy, Default)]
struct Contributor {
    atn: bool,
    clk: bool,
    data: bool,
}

/// Wired-AND serial bus. Every line is high unless *any* contributor pulls
/// it low — true open-collector semantics.
pub struct IecBus {
    host: Contributor,
    drives: [Contributor; MAX_DRIVES],
    atn_composite: bool,
    clk_composite: bool,
    data_composite: bool,
}

impl IecBus {
    pub fn new() -> Self {
        Self {
            host: Contributor::default(),
            drives: [Contributor::default(); MAX_DRIVES],
            atn_composite: true,
            clk_composite: true,
            data_composite: true,
        }
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Composite ATN level (true = high/released).
    pub fn atn(&self) -> bool {
        self.atn_composite
    }

    pub fn clk(&self) -> bool {
        self.clk_composite
    }

    pub fn data(&self) -> bool {
        self.data_composite
    }

    /// Set the host's (CIA2) line outputs. `true` means the host is
    /// pulling that line low (asserting it); `false` means released.
    pub fn set_host_output(&mut self, atn_low: bool, clk_low: bool, data_low: bool) {
        self.host.atn = atn_low;
        self.host.clk = clk_low;
        self.host.data = data_low;
        self.recompute();
    }

    pub fn set_drive_clk(&mut self, index: usize, clk_low: bool) {
        if let Some(d) = self.drives.get_mut(index) {
            d.clk = clk_low;
            self.recompute();
        }
    }

    pub fn set_drive_data(&mut self, index: usize, data_low: bool) {
        if let Some(d) = self.drives.get_mut(index) {
            d.data = data_low;
            self.recompute();
        }
    }

    /// Convenience for a single attached drive (index 0), matching the
    /// drive-side call sites that don't track a bus address.
    pub fn set_drive0_data(&mut self, data_low: bool) {
        self.set_drive_data(0, data_low);
    }

    pub fn set_drive0_clk(&mut self, clk_low: bool) {
        self.set_drive_clk(0, clk_low);
    }

    fn recompute(&mut self) {
        let atn_low = self.host.atn || self.drives.iter().any(|d| d.atn);
        let clk_low = self.host.clk || self.drives.iter().any(|d| d.clk);
        let data_low = self.host.data || self.drives.iter().any(|d| d.data);
        self.atn_composite = !atn_low;
        self.clk_composite = !clk_low;
        self.data_composite = !data_low;
    }
}

impl Default for IecBus {
    fn default() -> Self {
        Self::new()
    }
}

impl crate::serialize::Snapshot for IecBus {
    fn write_persistent(&self, _w: &mut crate::serialize::Writer) {}

    fn write_reset(&self, w: &mut crate::serialize::Writer) {
        write_contributor(w, &self.host);
        for d in &self.drives {
            write_contributor(w, d);
        }
        w.bool(self.atn_composite);
        w.bool(self.clk_composite);
        w.bool(self.data_composite);
    }

    fn read_persistent(&mut self, _r: &mut crate::serialize::Reader) -> crate::error::Result<()> {
        Ok(())
    }

    fn read_reset(&mut self, r: &mut crate::serialize::Reader) -> crate::error::Result<()> {
        self.host = read_contributor(r)?;
        for d in &mut self.drives {
            *d = read_contributor(r)?;
        }
        self.atn_composite = r.bool()?;
        self.clk_composite = r.bool()?;
        self.data_composite = r.bool()?;
        Ok(())
    }
}

fn write_contributor(w: &mut crate::serialize::Writer, c: &Contributor) {
    w.bool(c.atn);
    w.bool(c.clk);
    w.bool(c.data);
}

fn read_contributor(r: &mut crate::serialize::Reader) -> crate::error::Result<Contributor> {
    Ok(Contributor { atn: r.bool()?, clk: r.bool()?, data: r.bool()? })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_lines_high_when_released() {
        let bus = IecBus::new();
        assert!(bus.atn());
        assert!(bus.clk());
        assert!(bus.data());
    }

    #[test]
    fn host_pulling_data_low_overrides_drive() {
        let mut bus = IecBus::new();
        bus.set_host_output(false, false, true);
        assert!(!bus.data());
        bus.set_host_output(false, false, false);
        assert!(bus.data());
    }

    #[test]
    fn wired_and_any_contributor_pulls_low() {
        let mut bus = IecBus::new();
        bus.set_drive0_clk(true);
        assert!(!bus.clk());
        bus.set_host_output(false, true, false);
        assert!(!bus.clk()); // still low: drive still asserting
        bus.set_drive0_clk(false);
        assert!(!bus.clk()); // still low: host now asserting
        bus.set_host_output(false, false, false);
        assert!(bus.clk());
    }
}
