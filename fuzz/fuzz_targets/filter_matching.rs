#![no_main]

use libfuzzer_sys::fuzz_target;
use vpl_dispatch::description::DecoderCodec;
use vpl_dispatch::description::DecoderProfile;
use vpl_dispatch::description::MemDesc;
use vpl_dispatch::description::CODEC_AVC;
use vpl_dispatch::description::FOURCC_NV12;
use vpl_dispatch::matching::validate;
use vpl_dispatch::matching::Offer;
use vpl_dispatch::ConfigFilter;
use vpl_dispatch::ImplDescription;
use vpl_dispatch::SpecialConfig;
use vpl_dispatch::Variant;

// Each line of the input sets one property: "<name>=<value>". Values parsing as a number are set
// as `U32`, anything else as a string.
fuzz_target!(|data: &[u8]| {
    let Ok(input) = std::str::from_utf8(data) else {
        return;
    };

    let mut filter = ConfigFilter::new();
    for line in input.lines() {
        let Some((name, value)) = line.split_once('=') else {
            continue;
        };
        let value = match value.parse::<u32>() {
            Ok(v) => Variant::from(v),
            Err(_) => Variant::from(value),
        };
        let _ = filter.set_property(name, value);
    }

    let mut description = ImplDescription { impl_type: 2, vendor_id: 0x8086, ..Default::default() };
    description.device.device_id = "56a0/0".to_string();
    description.decoders.codecs.push(DecoderCodec {
        codec_id: CODEC_AVC,
        max_codec_level: 51,
        profiles: vec![DecoderProfile {
            profile: 100,
            mem_descs: vec![MemDesc { color_formats: vec![FOURCC_NV12], ..Default::default() }],
        }],
    });

    let offer = Offer {
        description: &description,
        functions: None,
        extended_device_id: None,
        legacy: false,
        adapter_index: description.parse_x86_device_id().and_then(|(_, a)| a),
    };
    let filters = [filter];
    let _ = validate(&offer, &filters, &SpecialConfig::collect(&filters));
});
