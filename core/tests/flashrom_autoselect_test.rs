use vc64_core::cartridge::flashrom::{FlashRom, State, SECTOR_SIZE};

#[test]
fn autoselect_sequence_from_a_programmed_image_still_reports_amd_ids() {
    let mut rom = FlashRom::from_image(&[0x60; SECTOR_SIZE]);
    rom.poke(0x555, 0xAA);
    rom.poke(0x2AA, 0x55);
    rom.poke(0x555, 0x90);
    assert_eq!(rom.state(), State::Autoselect);
    assert_eq!(rom.peek(0), 0x01);
    assert_eq!(rom.peek(1), 0xA4);

    rom.poke(0x1234, 0xF0);
    assert_eq!(rom.state(), State::Read);
    assert_eq!(rom.peek(0x10), 0x60);
}

#[test]
fn sector_erase_clears_only_the_targeted_sector() {
    let mut rom = FlashRom::from_image(&[0x42; 2 * SECTOR_SIZE]);

    rom.poke(0x555, 0xAA);
    rom.poke(0x2AA, 0x55);
    rom.poke(0x555, 0x80);
    rom.poke(0x555, 0xAA);
    rom.poke(0x2AA, 0x55);
    rom.poke(SECTOR_SIZE as u32, 0x30);

    assert_eq!(rom.peek(0), 0x42);
    assert_eq!(rom.peek(SECTOR_SIZE as u32), 0xFF);
    assert_eq!(rom.state(), State::Read);
}

#[test]
fn reset_drops_an_in_progress_command_sequence() {
    let mut rom = FlashRom::new();
    rom.poke(0x555, 0xAA);
    rom.poke(0x2AA, 0x55);
    assert_eq!(rom.state(), State::Magic2);
    rom.reset();
    assert_eq!(rom.state(), State::Read);
}
