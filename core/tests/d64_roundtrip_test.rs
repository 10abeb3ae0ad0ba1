use vc64_core::error::Vc64ErrorCode;
use vc64_core::fs::D64;

#[test]
fn make_file_survives_export_import_and_directory_scan() {
    let mut disk = D64::make_with_format("WORKBENCH");
    let payload: Vec<u8> = (0..1200).map(|i| (i % 251) as u8).collect();
    disk.make_file("LONGFILE", &payload).unwrap();

    let bytes = disk.export_volume();
    let reloaded = D64::import_volume(&bytes).unwrap();

    let entries = reloaded.scan_directory(false);
    assert_eq!(entries.len(), 1);
    let entry = &entries[0];
    assert!(entry.name.starts_with(b"LONGFILE"));

    let data = reloaded.read_file_chain(entry.first_track, entry.first_sector);
    assert_eq!(data, payload);
}

#[test]
fn import_rejects_a_buffer_with_the_wrong_capacity() {
    let err = D64::import_volume(&[0u8; 1234]).unwrap_err();
    assert_eq!(err.code(), Vc64ErrorCode::FsWrongCapacity);
}

#[test]
fn freshly_formatted_disk_passes_a_strict_check() {
    let disk = D64::make_with_format("EMPTY");
    let report = disk.check(true);
    assert!(report.corrupted_blocks.is_empty());
    assert!(report.first_error_block.is_none());
}
