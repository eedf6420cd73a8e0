#![no_main]
use dat_image::lzma::{Decoder, LzmaProperties};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if data.len() < LzmaProperties::SIZE + 2 {
        return;
    }
    let (props, rest) = data.split_at(LzmaProperties::SIZE);
    let Ok(mut decoder) = Decoder::from_properties(props) else {
        return;
    };

    // First byte picks a declared size, 0 means end marker
    let out_size = match rest[0] {
        0 => None,
        n => Some(n as u64 * 64),
    };
    let _ = decoder.decode(&rest[1..], out_size);
});
