//! The `configure(option, value)` surface of the external interface.
//!
//! Configuration changes take effect at the start of the next frame;
//! a host needing instant effect is expected to `suspend()` the emulator
//! thread first. This module only models the typed option/value pairs and
//! validation — applying them lives alongside each affected component.

use crate::error::{Vc64Error, Vc64ErrorCode};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VicModel {
    Pal6569,
    Ntsc6567,
    Pal8565,
    Ntsc8562,
}

impl VicModel {
    pub fn is_pal(self) -> bool {
        matches!(self, VicModel::Pal6569 | VicModel::Pal8565)
    }

    /// Raster lines per frame.
    pub fn raster_lines(self) -> u16 {
        if self.is_pal() { 312 } else { 263 }
    }

    /// Cycles per raster line.
    pub fn cycles_per_line(self) -> u16 {
        if self.is_pal() { 63 } else { 65 }
    }

    pub fn cycles_per_frame(self) -> u32 {
        self.raster_lines() as u32 * self.cycles_per_line() as u32
    }

    pub fn frame_rate_hz(self) -> f64 {
        if self.is_pal() { 50.125 } else { 59.826 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GlueLogic {
    Discrete,
    CustomIc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CiaRevision {
    Mos6526,
    Mos6526A,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SidRevision {
    Mos6581,
    Mos8580,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SidEngine {
    Fast,
    ReSid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SidSampling {
    Fast,
    Interpolate,
    Resample,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RamPattern {
    C64,
    InitC64C,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriveType {
    Vc1541II,
}

/// Every option recognized by `configure()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigOption {
    VicModel,
    GlueLogic,
    CiaRevision,
    SidRevision,
    SidFilter,
    SidEngine,
    SidSampling,
    RamPattern,
    DriveConnect,
    DriveType,
    DrivePowerSave,
    WarpLoad,
    EmulateDriveSound,
    AutoSnapshots,
    AutoSnapshotInterval,
}

/// The value half of a `configure()` call. One variant per option shape;
/// `configure()` rejects a mismatched (option, value) pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ConfigValue {
    VicModel(VicModel),
    GlueLogic(GlueLogic),
    CiaRevision(CiaRevision),
    SidRevision(SidRevision),
    SidEngine(SidEngine),
    SidSampling(SidSampling),
    RamPattern(RamPattern),
    DriveType(DriveType),
    Bool(bool),
    Seconds(f64),
}

/// Resolved configuration state. `configure()` mutates this; components read
/// from it at frame boundaries.
#[derive(Debug, Clone)]
pub struct Config {
    pub vic_model: VicModel,
    pub glue_logic: GlueLogic,
    pub cia_revision: CiaRevision,
    pub sid_revision: SidRevision,
    pub sid_filter: bool,
    pub sid_engine: SidEngine,
    pub sid_sampling: SidSampling,
    pub ram_pattern: RamPattern,
    pub drive_connect: bool,
    pub drive_type: DriveType,
    pub drive_power_save: bool,
    pub warp_load: bool,
    pub emulate_drive_sound: bool,
    pub auto_snapshots: bool,
    pub auto_snapshot_interval: f64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            vic_model: VicModel::Pal6569,
            glue_logic: GlueLogic::CustomIc,
            cia_revision: CiaRevision::Mos6526,
            sid_revision: SidRevision::Mos6581,
            sid_filter: true,
            sid_engine: SidEngine::ReSid,
            sid_sampling: SidSampling::Resample,
            ram_pattern: RamPattern::C64,
            drive_connect: true,
            drive_type: DriveType::Vc1541II,
            drive_power_save: false,
            warp_load: false,
            emulate_drive_sound: false,
            auto_snapshots: true,
            auto_snapshot_interval: 3.0,
        }
    }
}

impl Config {
    /// Apply one `(option, value)` pair. Returns an error (state unchanged)
    /// if the value doesn't match the option's expected shape.
    pub fn configure(&mut self, option: ConfigOption, value: ConfigValue) -> Result<(), Vc64Error> {
        use ConfigOption::*;
        use ConfigValue as V;
        match (option, value) {
            (VicModel, V::VicModel(v)) => self.vic_model = v,
            (GlueLogic, V::GlueLogic(v)) => self.glue_logic = v,
            (CiaRevision, V::CiaRevision(v)) => self.cia_revision = v,
            (SidRevision, V::SidRevision(v)) => self.sid_revision = v,
            (SidFilter, V::Bool(v)) => self.sid_filter = v,
            (SidEngine, V::SidEngine(v)) => self.sid_engine = v,
            (SidSampling, V::SidSampling(v)) => self.sid_sampling = v,
            (RamPattern, V::RamPattern(v)) => self.ram_pattern = v,
            (DriveConnect, V::Bool(v)) => self.drive_connect = v,
            (DriveType, V::DriveType(v)) => self.drive_type = v,
            (DrivePowerSave, V::Bool(v)) => self.drive_power_save = v,
            (WarpLoad, V::Bool(v)) => self.warp_load = v,
            (EmulateDriveSound, V::Bool(v)) => self.emulate_drive_sound = v,
            (AutoSnapshots, V::Bool(v)) => self.auto_snapshots = v,
            (AutoSnapshotInterval, V::Seconds(v)) => self.auto_snapshot_interval = v,
            _ => {
                return Err(Vc64Error::Config(format!(
                    "value does not match option {option:?}"
                )));
            }
        }
        Ok(())
    }
}

impl From<Vc64ErrorCode> for &'static str {
    fn from(code: Vc64ErrorCode) -> Self {
        match code {
            Vc64ErrorCode::Ok => "ERR_OK",
            Vc64ErrorCode::OutOfMemory => "ERR_OUT_OF_MEMORY",
            Vc64ErrorCode::CantRead => "ERR_CANT_READ",
            Vc64ErrorCode::CantWrite => "ERR_CANT_WRITE",
            Vc64ErrorCode::UnsupportedCrt => "ERR_UNSUPPORTED_CRT",
            Vc64ErrorCode::RomMissing => "ERR_ROM_MISSING",
            Vc64ErrorCode::FsWrongCapacity => "ERR_FS_WRONG_CAPACITY",
            Vc64ErrorCode::FsDirectoryNotEmpty => "ERR_FS_DIRECTORY_NOT_EMPTY",
            Vc64ErrorCode::FsHasNoFiles => "ERR_FS_HAS_NO_FILES",
            Vc64ErrorCode::FsCorrupted => "ERR_FS_CORRUPTED",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_mismatched_value_shape() {
        let mut cfg = Config::default();
        let err = cfg
            .configure(ConfigOption::VicModel, ConfigValue::Bool(true))
            .unwrap_err();
        assert!(matches!(err, Vc64Error::Config(_)));
    }

    #[test]
    fn applies_matching_value() {
        let mut cfg = Config::default();
        cfg.configure(ConfigOption::VicModel, ConfigValue::VicModel(VicModel::Ntsc6567))
            .unwrap();
        assert_eq!(cfg.vic_model, VicModel::Ntsc6567);
    }
}
