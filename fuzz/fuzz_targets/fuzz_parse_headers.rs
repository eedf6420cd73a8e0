#![no_main]
use dat_image::parsing::{
    FileHeaderParser, GroupHeaderParser, ImageHeaderParser, SubHeaderParser,
};
use dat_image::Sub;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let _ = FileHeaderParser::parse(data);
    let _ = GroupHeaderParser::parse(data);
    let _ = SubHeaderParser::parse(data);
    let _ = ImageHeaderParser::parse(data);

    // Sub parsing also decodes the rows of palette images
    let _ = Sub::parse(data);
});
