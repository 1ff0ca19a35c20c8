#![no_main]

use libfuzzer_sys::fuzz_target;
use optfields::prelude::*;

fuzz_target!(|data: &[u8]| {
    let _ = RuntimeFieldBuilder::from_stream(Some(data));

    let mut image = ImageBuilder::new(0);
    image.begin_region(Region::FieldStreams, 128);
    image.append(data);
    let image = image.finish(128, Vec::new());

    let fields = image.optional_fields(Some(0));
    let _ = fields.raw_fields();
    let _ = fields.dispatch_map(0);
    let _ = fields.generic_composition();
    let _ = fields.thread_static_info();
});
