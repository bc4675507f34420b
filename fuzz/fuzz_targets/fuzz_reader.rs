#![no_main]

use libfuzzer_sys::fuzz_target;
use std::io::Write;

fuzz_target!(|data: &[u8]| {
    // Arbitrary bytes on disk must surface as errors, never as panics
    let Ok(mut file) = tempfile::NamedTempFile::new() else {
        return;
    };
    if file.write_all(data).is_err() {
        return;
    }
    if let Ok(reader) = flocate::index::reader::StoreReader::open(file.path()) {
        let mut cursor = reader.cursor();
        while let Ok(Some(_)) = cursor.next_entry() {}
    }
});
