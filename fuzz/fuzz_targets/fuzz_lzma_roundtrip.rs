#![no_main]
use dat_image::lzma::{self, EncoderProperties, MatchFinderKind};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Some((&selector, input)) = data.split_first() else {
        return;
    };
    let kind = if selector & 1 == 0 {
        MatchFinderKind::Bt4
    } else {
        MatchFinderKind::Bt2
    };
    let props = EncoderProperties::default()
        .with_dictionary_size(1 << 16)
        .with_pos_bits(u32::from(selector >> 1) % 5)
        .with_match_finder(kind)
        .with_end_marker(selector & 0x80 != 0);

    let packed = lzma::compress(input, &props).expect("valid properties");
    let unpacked = lzma::decompress(&packed).expect("own output decodes");
    assert_eq!(unpacked, input);
});
