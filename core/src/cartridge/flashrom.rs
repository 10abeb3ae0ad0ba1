//! Am29F040B FlashROM state machine: the command sequencer used by
//! EasyFlash and similar flashable cartridges. 512 KiB, 8 sectors of 64
//! KiB each.

pub const SIZE: usize = 512 * 1024;
pub const SECTOR_SIZE: usize = 64 * 1024;
const NUM_SECTORS: usize = SIZE / SECTOR_SIZE;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Read,
    Magic1,
    Magic2,
    Autoselect,
    ByteProgram,
    ByteProgramError,
    EraseMagic1,
    EraseMagic2,
    EraseSelect,
    ChipErase,
    SectorErase(usize),
    SectorEraseTimeout(usize),
    SectorEraseSuspend(usize),
}

pub struct FlashRom {
    data: Vec<u8>,
    state: State,
    base_state: State,
}

fn first_command_addr(a: u32) -> bool {
    (a & 0x7FF) == 0x555
}

fn second_command_addr(a: u32) -> bool {
    (a & 0x7FF) == 0x2AA
}

impl FlashRom {
    pub fn new() -> Self {
        Self {
            data: vec![0xFF; SIZE],
            state: State::Read,
            base_state: State::Read,
        }
    }

    pub fn from_image(bytes: &[u8]) -> Self {
        let mut data = vec![0xFF; SIZE];
        let n = bytes.len().min(SIZE);
        data[..n].copy_from_slice(&bytes[..n]);
        Self {
            data,
            state: State::Read,
            base_state: State::Read,
        }
    }

    pub fn reset(&mut self) {
        self.state = State::Read;
        self.base_state = State::Read;
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn peek(&self, addr: u32) -> u8 {
        match self.state {
            State::Autoselect => match addr & 0xFF {
                0x00 => 0x01, // manufacturer id (AMD)
                0x01 => 0xA4, // device id (Am29F040B)
                _ => self.data[addr as usize % SIZE],
            },
            _ => self.data[addr as usize % SIZE],
        }
    }

    pub fn poke(&mut self, addr: u32, value: u8) {
        match self.state {
            State::Read | State::Autoselect => {
                if first_command_addr(addr) && value == 0xAA {
                    self.state = State::Magic1;
                } else {
                    self.state = self.base_state;
                }
            }
            State::Magic1 => {
                if second_command_addr(addr) && value == 0x55 {
                    self.state = State::Magic2;
                } else {
                    self.state = self.base_state;
                }
            }
            State::Magic2 => {
                if first_command_addr(addr) {
                    self.state = match value {
                        0xA0 => State::ByteProgram,
                        0x80 => State::EraseMagic1,
                        0x90 => State::Autoselect,
                        0xF0 => State::Read,
                        _ => self.base_state,
                    };
                } else {
                    self.state = self.base_state;
                }
                if matches!(self.state, State::Autoselect | State::Read) {
                    self.base_state = self.state;
                }
            }
            State::ByteProgram => {
                let idx = addr as usize % SIZE;
                self.data[idx] &= value; // can only clear bits, never set
                self.state = State::Read;
                self.base_state = State::Read;
            }
            State::ByteProgramError => {
                self.state = State::Read;
                self.base_state = State::Read;
            }
            State::EraseMagic1 => {
                if first_command_addr(addr) && value == 0xAA {
                    self.state = State::EraseMagic2;
                } else {
                    self.state = self.base_state;
                }
            }
            State::EraseMagic2 => {
                if second_command_addr(addr) && value == 0x55 {
                    self.state = State::EraseSelect;
                } else {
                    self.state = self.base_state;
                }
            }
            State::EraseSelect => {
                if first_command_addr(addr) && value == 0x10 {
                    self.data.fill(0xFF);
                    self.state = State::Read;
                    self.base_state = State::Read;
                } else if value == 0x30 {
                    let sector = (addr as usize / SECTOR_SIZE).min(NUM_SECTORS - 1);
                    let start = sector * SECTOR_SIZE;
                    self.data[start..start + SECTOR_SIZE].fill(0xFF);
                    self.state = State::Read;
                    self.base_state = State::Read;
                } else {
                    self.state = self.base_state;
                }
            }
            State::ChipErase | State::SectorErase(_) | State::SectorEraseTimeout(_) | State::SectorEraseSuspend(_) => {
                self.state = self.base_state;
            }
        }
    }
}

impl Default for FlashRom {
    fn default() -> Self {
        Self::new()
    }
}

fn state_to_code(state: State) -> (u8, u32) {
    match state {
        State::Read => (0, 0),
        State::Magic1 => (1, 0),
        State::Magic2 => (2, 0),
        State::Autoselect => (3, 0),
        State::ByteProgram => (4, 0),
        State::ByteProgramError => (5, 0),
        State::EraseMagic1 => (6, 0),
        State::EraseMagic2 => (7, 0),
        State::EraseSelect => (8, 0),
        State::ChipErase => (9, 0),
        State::SectorErase(s) => (10, s as u32),
        State::SectorEraseTimeout(s) => (11, s as u32),
        State::SectorEraseSuspend(s) => (12, s as u32),
    }
}

fn state_from_code(tag: u8, sector: u32) -> crate::error::Result<State> {
    let sector = sector as usize;
    match tag {
        0 => Ok(State::Read),
        1 => Ok(State::Magic1),
        2 => Ok(State::Magic2),
        3 => Ok(State::Autoselect),
        4 => Ok(State::ByteProgram),
        5 => Ok(State::ByteProgramError),
        6 => Ok(State::EraseMagic1),
        7 => Ok(State::EraseMagic2),
        8 => Ok(State::EraseSelect),
        9 => Ok(State::ChipErase),
        10 => Ok(State::SectorErase(sector)),
        11 => Ok(State::SectorEraseTimeout(sector)),
        12 => Ok(State::SectorEraseSuspend(sector)),
        other => Err(crate::error::Vc64Error::Integrity(format!("unknown flash state tag {other}"))),
    }
}

impl FlashRom {
    /// The flash array is persistent (programmed/erased data outlives a
    /// CPU reset); the command sequencer state does too, since the real
    /// chip has no reset pin.
    pub fn write_state(&self, w: &mut crate::serialize::Writer) {
        w.fixed_bytes(&self.data);
        let (tag, sector) = state_to_code(self.state);
        w.u8(tag);
        w.u32(sector);
        let (base_tag, base_sector) = state_to_code(self.base_state);
        w.u8(base_tag);
        w.u32(base_sector);
    }

    pub fn read_state(&mut self, r: &mut crate::serialize::Reader) -> crate::error::Result<()> {
        self.data = r.fixed_bytes(SIZE)?;
        let tag = r.u8()?;
        let sector = r.u32()?;
        self.state = state_from_code(tag, sector)?;
        let base_tag = r.u8()?;
        let base_sector = r.u32()?;
        self.base_state = state_from_code(base_tag, base_sector)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn autoselect_reports_amd_ids_then_f0_restores_read() {
        let mut f = FlashRom::new();
        f.poke(0x555, 0xAA);
        f.poke(0x2AA, 0x55);
        f.poke(0x555, 0x90);
        assert_eq!(f.peek(0), 0x01);
        assert_eq!(f.peek(1), 0xA4);
        f.poke(0x1234, 0xF0);
        assert_eq!(f.state(), State::Read);
        assert_eq!(f.peek(0), 0xFF);
    }

    #[test]
    fn byte_program_can_only_clear_bits() {
        let mut f = FlashRom::new();
        f.poke(0x555, 0xAA);
        f.poke(0x2AA, 0x55);
        f.poke(0x555, 0xA0);
        f.poke(0x1000, 0x0F);
        assert_eq!(f.peek(0x1000), 0x0F);
    }

    #[test]
    fn mismatched_sequence_returns_to_base_state() {
        let mut f = FlashRom::new();
        f.poke(0x555, 0xAA);
        f.poke(0x2AA, 0x12); // wrong value
        assert_eq!(f.state(), State::Read);
    }

    #[test]
    fn chip_erase_fills_ff() {
        let mut f = FlashRom::new();
        f.poke(0x1000, 0x00); // no program in effect, data stays 0xFF
        f.poke(0x555, 0xAA);
        f.poke(0x2AA, 0x55);
        f.poke(0x555, 0x80);
        f.poke(0x555, 0xAA);
        f.poke(0x2AA, 0x55);
        f.poke(0x555, 0x10);
        assert!(f.data.iter().all(|&b| b == 0xFF));
        assert_eq!(f.state(), State::Read);
    }
}
