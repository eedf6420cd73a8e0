#![no_main]
use dat_image::DatFile;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(dat) = DatFile::from_bytes(data) else {
        return;
    };
    for sub in dat.groups().iter().flat_map(|g| g.subs()) {
        // Keep LZMA payloads small enough to decode quickly
        if sub.width() as usize * sub.height() as usize <= 1 << 16 {
            let _ = sub.to_bgra(None);
        }
    }
    // Anything that parsed must serialise
    let _ = dat.to_bytes();
});
