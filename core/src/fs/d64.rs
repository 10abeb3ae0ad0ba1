//! D64 disk-image filesystem: 35-track single-sided image,
//! block availability map at (18,0), directory chain from (18,1).

use crate::error::{Result, Vc64Error, Vc64ErrorCode};

const NUM_TRACKS: u8 = 35;
const BAM_TRACK: u8 = 18;
const BAM_SECTOR: u8 = 0;
const DIR_FIRST_SECTOR: u8 = 1;
const BLOCK_SIZE: usize = 256;
const DIR_INTERLEAVE: u8 = 3;
const DATA_INTERLEAVE: u8 = 10;

/// Sectors per track, 1-based track numbering.
pub fn sectors_per_track(track: u8) -> u8 {
    match track {
        1..=17 => 21,
        18..=24 => 19,
        25..=30 => 18,
        31..=35 => 17,
        _ => 0,
    }
}

fn total_blocks() -> usize {
    (1..=NUM_TRACKS).map(|t| sectors_per_track(t) as usize).sum()
}

/// Linear block index for (track, sector), 0-based.
fn block_index(track: u8, sector: u8) -> Option<usize> {
    if !(1..=NUM_TRACKS).contains(&track) || sector >= sectors_per_track(track) {
        return None;
    }
    let prior: usize = (1..track).map(|t| sectors_per_track(t) as usize).sum();
    Some(prior + sector as usize)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    Prg,
    Seq,
    Usr,
    Rel,
}

pub struct DirEntry {
    pub file_type: FileType,
    pub first_track: u8,
    pub first_sector: u8,
    pub name: [u8; 16],
    pub blocks: u16,
}

pub struct CheckReport {
    pub corrupted_blocks: Vec<(u8, u8)>,
    pub first_error_block: Option<(u8, u8)>,
    pub last_error_block: Option<(u8, u8)>,
}

/// A D64 image: `total_blocks()` blocks of 256 bytes each.
pub struct D64 {
    blocks: Vec<[u8; BLOCK_SIZE]>,
}

impl D64 {
    /// Format a blank disk: empty BAM (all sectors free except the BAM/
    /// directory-header block itself), empty directory chain.
    pub fn make_with_format(name: &str) -> Self {
        let mut d64 = Self {
            blocks: vec![[0u8; BLOCK_SIZE]; total_blocks()],
        };
        d64.init_bam(name);
        d64
    }

    fn init_bam(&mut self, name: &str) {
        let bam = self.block_mut(BAM_TRACK, BAM_SECTOR).expect("BAM block exists");
        bam[0] = BAM_TRACK;
        bam[1] = DIR_FIRST_SECTOR;
        bam[2] = b'A'; // DOS version
        for (i, &b) in name.as_bytes().iter().take(16).enumerate() {
            bam[0x90 + i] = b;
        }
        for i in name.len()..16 {
            bam[0x90 + i] = 0xA0;
        }
        bam[0xA2] = 0xA0;
        bam[0xA3] = 0xA0;
        bam[0xA4] = b'2';
        bam[0xA5] = b'A';
        for i in 0xA6..0xAA {
            bam[i] = 0xA0;
        }

        for track in 1..=NUM_TRACKS {
            let free = sectors_per_track(track);
            let mut bits = [0u8; 3];
            for s in 0..free {
                bits[(s / 8) as usize] |= 1 << (s % 8);
            }
            let offset = 4 * track as usize;
            let block = self.block_mut(BAM_TRACK, BAM_SECTOR).unwrap();
            block[offset] = free;
            block[offset + 1..offset + 4].copy_from_slice(&bits);
        }
        // The BAM/header block and the first directory block are in use.
        self.mark_used(BAM_TRACK, BAM_SECTOR);
        self.mark_used(BAM_TRACK, DIR_FIRST_SECTOR);

        let dir = self.block_mut(BAM_TRACK, DIR_FIRST_SECTOR).unwrap();
        dir[0] = 0;
        dir[1] = 0xFF; // end of directory chain for now
    }

    pub fn import_volume(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != total_blocks() * BLOCK_SIZE {
            return Err(Vc64Error::FileSystem(Vc64ErrorCode::FsWrongCapacity));
        }
        let mut blocks = Vec::with_capacity(total_blocks());
        for chunk in bytes.chunks(BLOCK_SIZE) {
            let mut block = [0u8; BLOCK_SIZE];
            block.copy_from_slice(chunk);
            blocks.push(block);
        }
        Ok(Self { blocks })
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Self::import_volume(bytes)
    }

    pub fn export_volume(&self) -> Vec<u8> {
        self.blocks.iter().flat_map(|b| b.iter().copied()).collect()
    }

    fn block(&self, track: u8, sector: u8) -> Option<&[u8; BLOCK_SIZE]> {
        block_index(track, sector).map(|i| &self.blocks[i])
    }

    fn block_mut(&mut self, track: u8, sector: u8) -> Option<&mut [u8; BLOCK_SIZE]> {
        block_index(track, sector).map(|i| &mut self.blocks[i])
    }

    /// Raw 256-byte block contents, for GCR encoding.
    pub fn read_block_raw(&self, track: u8, sector: u8) -> Option<&[u8; BLOCK_SIZE]> {
        self.block(track, sector)
    }

    pub fn write_sector(&mut self, track: u8, sector: u8, data: &[u8]) -> Result<()> {
        let block = self
            .block_mut(track, sector)
            .ok_or(Vc64Error::FileSystem(Vc64ErrorCode::FsCorrupted))?;
        let n = data.len().min(BLOCK_SIZE);
        block[..n].copy_from_slice(&data[..n]);
        Ok(())
    }

    /// The two-byte disk ID stored in the BAM header, used by the GCR
    /// encoder for sector header checksums.
    pub fn disk_id(&self) -> [u8; 2] {
        let bam = self.block(BAM_TRACK, BAM_SECTOR).unwrap();
        [bam[0xA2], bam[0xA3]]
    }

    fn bam_free_count(&self, track: u8) -> u8 {
        let bam = self.block(BAM_TRACK, BAM_SECTOR).unwrap();
        bam[4 * track as usize]
    }

    fn bam_bits(&self, track: u8) -> [u8; 3] {
        let bam = self.block(BAM_TRACK, BAM_SECTOR).unwrap();
        let o = 4 * track as usize;
        [bam[o + 1], bam[o + 2], bam[o + 3]]
    }

    fn is_free(&self, track: u8, sector: u8) -> bool {
        let bits = self.bam_bits(track);
        bits[(sector / 8) as usize] & (1 << (sector % 8)) != 0
    }

    fn mark_used(&mut self, track: u8, sector: u8) {
        let bam = self.block_mut(BAM_TRACK, BAM_SECTOR).unwrap();
        let o = 4 * track as usize + 1 + (sector / 8) as usize;
        let mask = !(1u8 << (sector % 8));
        if bam[o] & !mask != 0 {
            bam[o] &= mask;
            bam[4 * track as usize] -= 1;
        }
    }

    /// Walk the interleaved allocation order starting from `(track,
    /// sector)`, allocating `n` free blocks. Track 18 (BAM/directory) is
    /// never allocated to file data. Returns fewer than `n` entries if
    /// the disk fills up.
    ///
    /// Within a track, sectors are visited in interleave-stride order;
    /// since the stride need not be coprime with every track's sector
    /// count (e.g. stride 10 against 18 sectors), a track is exhausted by
    /// its full sector count rather than by cycling back to the start
    /// sector, so no free sector is ever skipped.
    fn allocate(&mut self, start: (u8, u8), n: usize, interleave: u8) -> Vec<(u8, u8)> {
        let mut out = Vec::with_capacity(n);
        let mut track = start.0;
        let mut sector = start.1;
        let mut tracks_tried = 0u16;

        while out.len() < n && tracks_tried <= NUM_TRACKS as u16 * 2 {
            if track == BAM_TRACK {
                track = next_track(track);
                sector = 0;
                tracks_tried += 1;
                continue;
            }
            let spt = sectors_per_track(track);
            for _ in 0..spt {
                if self.is_free(track, sector) {
                    self.mark_used(track, sector);
                    out.push((track, sector));
                    if out.len() >= n {
                        break;
                    }
                }
                sector = (sector + interleave) % spt;
            }
            track = next_track(track);
            sector = 0;
            tracks_tried += 1;
        }
        out
    }

    pub fn make_file(&mut self, name: &str, data: &[u8]) -> Result<()> {
        let num_blocks = data.len().div_ceil(254).max(1);
        let chain = self.allocate((1, 0), num_blocks, DATA_INTERLEAVE);
        if chain.len() < num_blocks {
            return Err(Vc64Error::FileSystem(Vc64ErrorCode::FsWrongCapacity));
        }

        for (i, &(track, sector)) in chain.iter().enumerate() {
            let offset = i * 254;
            let remaining = data.len() - offset;
            let n = remaining.min(254);
            let block = self.block_mut(track, sector).unwrap();
            block[2..2 + n].copy_from_slice(&data[offset..offset + n]);
            if i + 1 < chain.len() {
                let (next_t, next_s) = chain[i + 1];
                block[0] = next_t;
                block[1] = next_s;
            } else {
                block[0] = 0;
                block[1] = (n + 1) as u8; // last block: byte count includes link bytes convention
            }
        }

        let entry_slot = self
            .find_free_dir_slot()
            .ok_or(Vc64Error::FileSystem(Vc64ErrorCode::FsDirectoryNotEmpty))?;
        let (dir_track, dir_sector, index) = entry_slot;
        let block = self.block_mut(dir_track, dir_sector).unwrap();
        let off = 2 + index * 32;
        block[off] = 0x82; // PRG, closed
        block[off + 1] = chain[0].0;
        block[off + 2] = chain[0].1;
        let name_bytes = name.as_bytes();
        for i in 0..16 {
            block[off + 3 + i] = if i < name_bytes.len() { name_bytes[i] } else { 0xA0 };
        }
        let blocks = chain.len() as u16;
        block[off + 28] = (blocks & 0xFF) as u8;
        block[off + 29] = (blocks >> 8) as u8;
        Ok(())
    }

    /// Find the next free 32-byte directory entry slot, extending the
    /// chain with a new sector if every existing sector is full.
    fn find_free_dir_slot(&mut self) -> Option<(u8, u8, usize)> {
        let mut track = BAM_TRACK;
        let mut sector = DIR_FIRST_SECTOR;
        loop {
            let block = self.block(track, sector)?;
            for i in 0..8 {
                let off = 2 + i * 32;
                if block[off] == 0 {
                    return Some((track, sector, i));
                }
            }
            let (next_t, next_s) = (block[0], block[1]);
            if next_t == 0 {
                // Extend the chain.
                let new = self.allocate((track, sector), 1, DIR_INTERLEAVE);
                let (nt, ns) = *new.first()?;
                let cur = self.block_mut(track, sector).unwrap();
                cur[0] = nt;
                cur[1] = ns;
                let fresh = self.block_mut(nt, ns).unwrap();
                fresh[0] = 0;
                fresh[1] = 0xFF;
                return Some((nt, ns, 0));
            }
            track = next_t;
            sector = next_s;
        }
    }

    /// Follow a file's block chain and reassemble its payload bytes.
    pub fn read_file_chain(&self, first_track: u8, first_sector: u8) -> Vec<u8> {
        let mut out = Vec::new();
        let mut track = first_track;
        let mut sector = first_sector;
        loop {
            let Some(block) = self.block(track, sector) else { break };
            let (next_t, next_s) = (block[0], block[1]);
            if next_t == 0 {
                let n = (next_s as usize).saturating_sub(1).min(254);
                out.extend_from_slice(&block[2..2 + n]);
                break;
            }
            out.extend_from_slice(&block[2..256]);
            track = next_t;
            sector = next_s;
        }
        out
    }

    pub fn scan_directory(&self, skip_invisible: bool) -> Vec<DirEntry> {
        let mut out = Vec::new();
        let mut track = BAM_TRACK;
        let mut sector = DIR_FIRST_SECTOR;
        let mut count = 0;
        'outer: loop {
            let Some(block) = self.block(track, sector) else { break };
            for i in 0..8 {
                if count >= 144 {
                    break 'outer;
                }
                let off = 2 + i * 32;
                let type_byte = block[off];
                if type_byte == 0 && i == 0 {
                    break 'outer;
                }
                count += 1;
                if type_byte == 0 {
                    continue;
                }
                if skip_invisible && type_byte & 0x80 == 0 {
                    continue;
                }
                let file_type = match type_byte & 0x0F {
                    1 => FileType::Seq,
                    2 => FileType::Usr,
                    3 => FileType::Rel,
                    _ => FileType::Prg,
                };
                let mut name = [0u8; 16];
                name.copy_from_slice(&block[off + 3..off + 19]);
                let blocks = block[off + 28] as u16 | ((block[off + 29] as u16) << 8);
                out.push(DirEntry {
                    file_type,
                    first_track: block[off + 1],
                    first_sector: block[off + 2],
                    name,
                    blocks,
                });
            }
            let (next_t, next_s) = (block[0], block[1]);
            if next_t == 0 {
                break;
            }
            track = next_t;
            sector = next_s;
        }
        out
    }

    /// Scan every block's BAM accounting against its track's recorded
    /// free count. `strict` treats any mismatch as corruption; otherwise
    /// mismatches only warn (recorded but not treated as fatal).
    pub fn check(&self, strict: bool) -> CheckReport {
        let mut corrupted = Vec::new();
        for track in 1..=NUM_TRACKS {
            let recorded = self.bam_free_count(track);
            let bits = self.bam_bits(track);
            let actual: u32 = bits.iter().map(|b| b.count_ones()).sum();
            if actual != recorded as u32 && (strict || track != BAM_TRACK) {
                corrupted.push((track, 0));
            }
        }
        let first = corrupted.first().copied();
        let last = corrupted.last().copied();
        CheckReport {
            corrupted_blocks: corrupted,
            first_error_block: first,
            last_error_block: last,
        }
    }
}

/// Interleaved track progression used once a track fills: inward from 17
/// down to 1, then outward from 19 up to 35, always skipping 18.
fn next_track(track: u8) -> u8 {
    if track == BAM_TRACK {
        return 19;
    }
    if track < BAM_TRACK {
        if track == 1 { 19 } else { track - 1 }
    } else if track >= NUM_TRACKS {
        1
    } else {
        track + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formatted_disk_has_free_bam_matching_popcount() {
        let d64 = D64::make_with_format("TEST");
        let report = d64.check(true);
        assert!(report.corrupted_blocks.is_empty(), "{:?}", report.corrupted_blocks);
    }

    #[test]
    fn make_file_then_scan_roundtrips() {
        let mut d64 = D64::make_with_format("TEST");
        let payload: Vec<u8> = (0..1000u32).map(|i| (i % 251) as u8).collect();
        d64.make_file("HELLO", &payload).expect("file written");
        let entries = d64.scan_directory(false);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].blocks as usize, 1000usize.div_ceil(254));
        let bytes = d64.read_file_chain(entries[0].first_track, entries[0].first_sector);
        assert_eq!(bytes, payload);
    }

    #[test]
    fn import_rejects_wrong_capacity() {
        let err = D64::import_volume(&[0u8; 100]).unwrap_err();
        assert_eq!(err.code(), Vc64ErrorCode::FsWrongCapacity);
    }

    #[test]
    fn export_then_import_is_identity() {
        let d64 = D64::make_with_format("X");
        let bytes = d64.export_volume();
        let reimported = D64::import_volume(&bytes).expect("valid size");
        assert_eq!(reimported.export_volume(), bytes);
    }
}
