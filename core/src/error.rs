//! Crate-wide error type and the `ERR_*` code taxonomy surfaced to hosts.

use thiserror::Error;

/// The stable, host-facing error code taxonomy of the external interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Vc64ErrorCode {
    Ok,
    OutOfMemory,
    CantRead,
    CantWrite,
    UnsupportedCrt,
    RomMissing,
    FsWrongCapacity,
    FsDirectoryNotEmpty,
    FsHasNoFiles,
    FsCorrupted,
}

/// Crate-wide error type. Variants line up with the taxonomy of the error
/// handling design: fatal conditions abort at the call site (they are not
/// represented here — an allocation failure during startup panics, as it
/// would in any Rust program); everything recoverable returns one of these.
#[derive(Debug, Error)]
pub enum Vc64Error {
    /// Invalid `configure()` option or value. State is left unchanged.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// File read/write failure. State is left unchanged.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A ROM image didn't match the size/identity expected for its slot.
    #[error("ROM error: {0}")]
    Rom(String),

    /// D64/FSDevice-level failure.
    #[error("filesystem error: {0}")]
    FileSystem(Vc64ErrorCode),

    /// CRT container couldn't be parsed or names an unsupported cartridge type.
    #[error("unsupported cartridge: {0}")]
    UnsupportedCartridge(String),

    /// Snapshot version mismatch or checksum failure. The old state is kept.
    #[error("snapshot integrity failure: {0}")]
    Integrity(String),
}

impl Vc64Error {
    pub fn code(&self) -> Vc64ErrorCode {
        match self {
            Vc64Error::Config(_) => Vc64ErrorCode::Ok, // recoverable-config: caller just gets `false`
            Vc64Error::Io(_) => Vc64ErrorCode::CantRead,
            Vc64Error::Rom(_) => Vc64ErrorCode::RomMissing,
            Vc64Error::FileSystem(code) => *code,
            Vc64Error::UnsupportedCartridge(_) => Vc64ErrorCode::UnsupportedCrt,
            Vc64Error::Integrity(_) => Vc64ErrorCode::CantRead,
        }
    }
}

pub type Result<T> = std::result::Result<T, Vc64Error>;
