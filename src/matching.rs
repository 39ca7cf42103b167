// Copyright 2025 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Matching of implementation descriptions against configuration filters.
//!
//! Every filter is checked on its own and an implementation is accepted only if it satisfies all
//! of them. Within one filter, all the decoder properties must be satisfied by a single
//! combination of codec, profile, memory type and color format, and likewise for encoders and
//! VPP filters.

use thiserror::Error;

use crate::config::ConfigFilter;
use crate::config::SpecialConfig;
use crate::description::ExtendedDeviceId;
use crate::description::ImplDescription;
use crate::description::ImplementedFunctions;
use crate::description::Range32U;
use crate::description::StructVersion;
use crate::property::Prop;
use crate::property::PropGroup;
use crate::property::Variant;
use crate::ApiVersion;

/// Reason an implementation was rejected.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mismatch {
    #[error("general properties do not match")]
    General,
    #[error("extended device properties do not match")]
    ExtendedDevice,
    #[error("no decoder matches")]
    Decoder,
    #[error("no encoder matches")]
    Encoder,
    #[error("no VPP filter matches")]
    Vpp,
    #[error("API version is too old")]
    ApiVersion,
    #[error("required functions are not implemented")]
    Functions,
    #[error("adapter index differs")]
    AdapterIndex,
}

/// An implementation as seen by the matcher.
#[derive(Clone, Copy, Debug)]
pub struct Offer<'a> {
    pub description: &'a ImplDescription,
    pub functions: Option<&'a ImplementedFunctions>,
    pub extended_device_id: Option<&'a ExtendedDeviceId>,
    /// Legacy runtimes report no codec capabilities, so codec filters are not applied to them.
    pub legacy: bool,
    /// Adapter index parsed from the device ID, if any.
    pub adapter_index: Option<u32>,
}

/// API version from which encoders report their statistics capabilities.
const REPORTED_STATS_SINCE: ApiVersion = ApiVersion::new(2, 7);

#[derive(Clone, Debug, PartialEq, Eq)]
struct DecoderConfig {
    codec_id: u32,
    max_codec_level: u16,
    profile: u32,
    mem_handle_type: u32,
    width: Range32U,
    height: Range32U,
    color_format: u32,
}

#[derive(Clone, Debug, PartialEq, Eq)]
struct EncoderConfig {
    codec_id: u32,
    max_codec_level: u16,
    bidirectional_prediction: u16,
    reported_stats: u16,
    profile: u32,
    mem_handle_type: u32,
    width: Range32U,
    height: Range32U,
    color_format: u32,
}

#[derive(Clone, Debug, PartialEq, Eq)]
struct VppConfig {
    filter_fourcc: u32,
    max_delay_in_frames: u16,
    mem_handle_type: u32,
    width: Range32U,
    height: Range32U,
    in_format: u32,
    out_format: u32,
}

fn flatten_decoders(desc: &ImplDescription) -> Vec<DecoderConfig> {
    let mut configs = Vec::new();
    for codec in &desc.decoders.codecs {
        for profile in &codec.profiles {
            for mem in &profile.mem_descs {
                for color_format in &mem.color_formats {
                    configs.push(DecoderConfig {
                        codec_id: codec.codec_id,
                        max_codec_level: codec.max_codec_level,
                        profile: profile.profile,
                        mem_handle_type: mem.mem_handle_type,
                        width: mem.width,
                        height: mem.height,
                        color_format: *color_format,
                    });
                }
            }
        }
    }
    configs
}

fn flatten_encoders(desc: &ImplDescription) -> Vec<EncoderConfig> {
    let mut configs = Vec::new();
    for codec in &desc.encoders.codecs {
        // Earlier runtimes left this field reserved.
        let reported_stats = if desc.api_version >= REPORTED_STATS_SINCE {
            codec.reported_stats
        } else {
            0
        };

        for profile in &codec.profiles {
            for mem in &profile.mem_descs {
                for color_format in &mem.color_formats {
                    configs.push(EncoderConfig {
                        codec_id: codec.codec_id,
                        max_codec_level: codec.max_codec_level,
                        bidirectional_prediction: codec.bidirectional_prediction,
                        reported_stats,
                        profile: profile.profile,
                        mem_handle_type: mem.mem_handle_type,
                        width: mem.width,
                        height: mem.height,
                        color_format: *color_format,
                    });
                }
            }
        }
    }
    configs
}

fn flatten_vpp(desc: &ImplDescription) -> Vec<VppConfig> {
    let mut configs = Vec::new();
    for filter in &desc.vpp.filters {
        for mem in &filter.mem_descs {
            for format in &mem.formats {
                for out_format in &format.out_formats {
                    configs.push(VppConfig {
                        filter_fourcc: filter.filter_fourcc,
                        max_delay_in_frames: filter.max_delay_in_frames,
                        mem_handle_type: mem.mem_handle_type,
                        width: mem.width,
                        height: mem.height,
                        in_format: format.in_format,
                        out_format: *out_format,
                    });
                }
            }
        }
    }
    configs
}

/// Whether the U32 property `prop` is unset or equal to `offered`.
fn u32_matches(filter: &ConfigFilter, prop: Prop, offered: u32) -> bool {
    filter.u32(prop).map_or(true, |v| v == offered)
}

fn u16_matches(filter: &ConfigFilter, prop: Prop, offered: u16) -> bool {
    filter.u16(prop).map_or(true, |v| v == offered)
}

fn range_matches(filter: &ConfigFilter, prop: Prop, offered: &Range32U) -> bool {
    filter.get(prop).and_then(Variant::as_range).map_or(true, |r| offered.covers(r))
}

/// Whether every comma separated token of `requested` appears in `offered`.
fn tokens_match(offered: &str, requested: &str) -> bool {
    let offered: Vec<&str> = offered.split(',').collect();
    requested.split(',').all(|token| offered.contains(&token))
}

/// Parses the leading hexadecimal number of `s`, with an optional sign and `0x` prefix.
///
/// Trailing characters are ignored, so `"46a6/0"` gives `0x46a6`. Returns `None` if `s` does not
/// start with a number or if the number does not fit in an `i32`.
pub(crate) fn parse_hex_prefix(s: &str) -> Option<u32> {
    let s = s.trim_start();
    let (negative, s) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };

    // "0x" without digits after it reads as 0 followed by garbage.
    let digits = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(rest) if rest.starts_with(|c: char| c.is_ascii_hexdigit()) => rest,
        _ => s,
    };

    let end = digits.find(|c: char| !c.is_ascii_hexdigit()).unwrap_or(digits.len());
    if end == 0 {
        return None;
    }

    let value = i64::from_str_radix(&digits[..end], 16).ok()?;
    let value = if negative { -value } else { value };
    let value = i32::try_from(value).ok()?;

    Some(value as u32)
}

fn check_general(filter: &ConfigFilter, desc: &ImplDescription) -> bool {
    let mut compatible = u32_matches(filter, Prop::Impl, desc.impl_type)
        && u32_matches(filter, Prop::VendorId, desc.vendor_id)
        && u32_matches(filter, Prop::VendorImplId, desc.vendor_impl_id);

    if let Some(mode) = filter.u32(Prop::AccelerationMode) {
        let modes = &desc.acceleration_modes.modes;
        if modes.is_empty() {
            compatible &= mode == desc.acceleration_mode;
        } else {
            compatible &= modes.contains(&mode);
        }
    }

    if let Some(policy) = filter.u32(Prop::PoolAllocationPolicy) {
        let policies = if desc.version >= StructVersion::new(1, 2) {
            desc.pool_policies.policies.as_slice()
        } else {
            &[]
        };
        compatible &= policies.contains(&policy);
    }

    if let Some(name) = filter.string(Prop::ImplName) {
        compatible &= name == desc.impl_name;
    }
    if let Some(license) = filter.string(Prop::License) {
        compatible &= tokens_match(&desc.license, license);
    }
    if let Some(keywords) = filter.string(Prop::Keywords) {
        compatible &= tokens_match(&desc.keywords, keywords);
    }

    if let Some(device_id) = filter.u16(Prop::DeviceId) {
        match parse_hex_prefix(&desc.device.device_id) {
            Some(offered) => compatible &= offered == device_id as u32,
            None => return false,
        }
    }
    if let Some(device_id) = filter.string(Prop::DeviceIdStr) {
        compatible &= device_id == desc.device.device_id;
    }

    // Only present in 2.x descriptions, from version 1.1 of the device description.
    if desc.api_version.major >= 2 && filter.is_set(Prop::MediaAdapterType) {
        compatible &= desc.device.version >= StructVersion::new(1, 1)
            && u16_matches(filter, Prop::MediaAdapterType, desc.device.media_adapter_type);
    }

    compatible
}

fn check_extended_device(filter: &ConfigFilter, id: &ExtendedDeviceId) -> bool {
    let mut compatible = u16_matches(filter, Prop::ExtDevVendorId, id.vendor_id)
        && u16_matches(filter, Prop::ExtDevDeviceId, id.device_id)
        && u32_matches(filter, Prop::ExtDevPciDomain, id.pci_domain)
        && u32_matches(filter, Prop::ExtDevPciBus, id.pci_bus)
        && u32_matches(filter, Prop::ExtDevPciDevice, id.pci_device)
        && u32_matches(filter, Prop::ExtDevPciFunction, id.pci_function)
        && u16_matches(filter, Prop::ExtDevRevisionId, id.revision_id);

    if let Some(Variant::Luid(luid)) = filter.get(Prop::ExtDevDeviceLuid) {
        compatible &= id.luid_valid && *luid == id.device_luid;
    }
    if filter.is_set(Prop::ExtDevLuidDeviceNodeMask) {
        compatible &= id.luid_valid
            && u32_matches(filter, Prop::ExtDevLuidDeviceNodeMask, id.luid_device_node_mask);
    }
    if filter.is_set(Prop::ExtDevDrmRenderNodeNum) {
        compatible &= id.drm_render_node_num != 0
            && u32_matches(filter, Prop::ExtDevDrmRenderNodeNum, id.drm_render_node_num);
    }
    if filter.is_set(Prop::ExtDevDrmPrimaryNodeNum) {
        compatible &= id.drm_render_node_num != 0x7fff_ffff
            && u32_matches(filter, Prop::ExtDevDrmPrimaryNodeNum, id.drm_primary_node_num);
    }
    if let Some(name) = filter.string(Prop::ExtDevDeviceName) {
        compatible &= name == id.device_name;
    }

    compatible
}

fn check_decoders(filter: &ConfigFilter, configs: &[DecoderConfig]) -> bool {
    configs.iter().any(|dc| {
        u32_matches(filter, Prop::DecCodecId, dc.codec_id)
            && u16_matches(filter, Prop::DecMaxCodecLevel, dc.max_codec_level)
            && u32_matches(filter, Prop::DecProfile, dc.profile)
            && u32_matches(filter, Prop::DecMemHandleType, dc.mem_handle_type)
            && u32_matches(filter, Prop::DecColorFormat, dc.color_format)
            && range_matches(filter, Prop::DecWidth, &dc.width)
            && range_matches(filter, Prop::DecHeight, &dc.height)
    })
}

fn check_encoders(filter: &ConfigFilter, configs: &[EncoderConfig]) -> bool {
    configs.iter().any(|ec| {
        let stats_match = filter
            .u16(Prop::EncReportedStats)
            .map_or(true, |requested| requested & ec.reported_stats == requested);

        u32_matches(filter, Prop::EncCodecId, ec.codec_id)
            && u16_matches(filter, Prop::EncMaxCodecLevel, ec.max_codec_level)
            && u16_matches(filter, Prop::EncBiDirectionalPrediction, ec.bidirectional_prediction)
            && u32_matches(filter, Prop::EncProfile, ec.profile)
            && u32_matches(filter, Prop::EncMemHandleType, ec.mem_handle_type)
            && u32_matches(filter, Prop::EncColorFormat, ec.color_format)
            && range_matches(filter, Prop::EncWidth, &ec.width)
            && range_matches(filter, Prop::EncHeight, &ec.height)
            && stats_match
    })
}

fn check_vpp(filter: &ConfigFilter, configs: &[VppConfig]) -> bool {
    configs.iter().any(|vc| {
        u32_matches(filter, Prop::VppFilterFourCC, vc.filter_fourcc)
            && u16_matches(filter, Prop::VppMaxDelayInFrames, vc.max_delay_in_frames)
            && u32_matches(filter, Prop::VppMemHandleType, vc.mem_handle_type)
            && u32_matches(filter, Prop::VppInFormat, vc.in_format)
            && u32_matches(filter, Prop::VppOutFormat, vc.out_format)
            && range_matches(filter, Prop::VppWidth, &vc.width)
            && range_matches(filter, Prop::VppHeight, &vc.height)
    })
}

/// Checks `offer` against every filter.
///
/// `special` holds the session parameters collected from the same filters; its API version and
/// adapter index constrain the implementation too.
pub fn validate(
    offer: &Offer,
    filters: &[ConfigFilter],
    special: &SpecialConfig,
) -> Result<(), Mismatch> {
    let desc = offer.description;
    let decoders = flatten_decoders(desc);
    let encoders = flatten_encoders(desc);
    let vpp = flatten_vpp(desc);

    for filter in filters {
        if !check_general(filter, desc) {
            return Err(Mismatch::General);
        }

        if filter.has_group(PropGroup::ExtendedDevice)
            && !offer.extended_device_id.is_some_and(|id| check_extended_device(filter, id))
        {
            return Err(Mismatch::ExtendedDevice);
        }

        if offer.legacy {
            continue;
        }
        if filter.has_group(PropGroup::Decoder) && !check_decoders(filter, &decoders) {
            return Err(Mismatch::Decoder);
        }
        if filter.has_group(PropGroup::Encoder) && !check_encoders(filter, &encoders) {
            return Err(Mismatch::Encoder);
        }
        if filter.has_group(PropGroup::Vpp) && !check_vpp(filter, &vpp) {
            return Err(Mismatch::Vpp);
        }
    }

    if special.api_version.is_some_and(|requested| desc.api_version < requested) {
        return Err(Mismatch::ApiVersion);
    }

    let required: Vec<&str> = filters.iter().filter_map(|f| f.string(Prop::FunctionName)).collect();
    if !required.is_empty() {
        match offer.functions {
            Some(functions) if required.iter().all(|name| functions.contains(name)) => (),
            _ => return Err(Mismatch::Functions),
        }
    }

    if special.adapter_index.is_some() && special.adapter_index != offer.adapter_index {
        return Err(Mismatch::AdapterIndex);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::description::DecoderCodec;
    use crate::description::DecoderProfile;
    use crate::description::EncoderCodec;
    use crate::description::EncoderProfile;
    use crate::description::MemDesc;
    use crate::description::ResourceType;
    use crate::description::VppFilter;
    use crate::description::VppFormat;
    use crate::description::VppMemDesc;
    use crate::description::CODEC_AVC;
    use crate::description::CODEC_HEVC;
    use crate::description::ENCODE_STATS_LEVEL_BLK;
    use crate::description::ENCODE_STATS_LEVEL_FRAME;
    use crate::description::FOURCC_NV12;
    use crate::description::FOURCC_P010;
    use crate::description::FOURCC_RGB4;
    use crate::fourcc;
    use crate::runtime::dummy::hw_description;

    fn mem(width: Range32U, color_formats: Vec<u32>) -> MemDesc {
        MemDesc {
            mem_handle_type: ResourceType::SystemSurface as u32,
            width,
            height: Range32U::new(64, 2304, 16),
            color_formats,
        }
    }

    fn gpu() -> ImplDescription {
        let mut desc = hw_description("mfx-gen", ApiVersion::new(2, 9), "46a6/0");
        desc.decoders.codecs = vec![
            DecoderCodec {
                codec_id: CODEC_HEVC,
                max_codec_level: 186,
                profiles: vec![DecoderProfile {
                    profile: 1,
                    mem_descs: vec![mem(
                        Range32U::new(64, 8192, 16),
                        vec![FOURCC_NV12, FOURCC_P010],
                    )],
                }],
            },
            DecoderCodec {
                codec_id: CODEC_AVC,
                max_codec_level: 51,
                profiles: vec![DecoderProfile {
                    profile: 100,
                    mem_descs: vec![mem(Range32U::new(64, 4096, 16), vec![FOURCC_NV12])],
                }],
            },
        ];
        desc.encoders.codecs = vec![EncoderCodec {
            codec_id: CODEC_AVC,
            max_codec_level: 51,
            bidirectional_prediction: 1,
            reported_stats: ENCODE_STATS_LEVEL_BLK | ENCODE_STATS_LEVEL_FRAME,
            profiles: vec![EncoderProfile {
                profile: 100,
                mem_descs: vec![mem(Range32U::new(64, 4096, 16), vec![FOURCC_NV12])],
            }],
        }];
        desc.vpp.filters = vec![VppFilter {
            filter_fourcc: fourcc(b'D', b'N', b'I', b'S'),
            max_delay_in_frames: 1,
            mem_descs: vec![VppMemDesc {
                mem_handle_type: ResourceType::SystemSurface as u32,
                width: Range32U::new(64, 4096, 16),
                height: Range32U::new(64, 4096, 16),
                formats: vec![VppFormat { in_format: FOURCC_NV12, out_formats: vec![FOURCC_RGB4] }],
            }],
        }];
        desc
    }

    fn offer(desc: &ImplDescription) -> Offer<'_> {
        Offer {
            description: desc,
            functions: None,
            extended_device_id: None,
            legacy: false,
            adapter_index: desc.parse_x86_device_id().and_then(|(_, adapter)| adapter),
        }
    }

    fn filter(props: &[(&str, Variant)]) -> ConfigFilter {
        let mut filter = ConfigFilter::new();
        for (name, value) in props {
            filter.set_property(name, value.clone()).unwrap();
        }
        filter
    }

    fn check(desc: &ImplDescription, filters: &[ConfigFilter]) -> Result<(), Mismatch> {
        validate(&offer(desc), filters, &SpecialConfig::collect(filters))
    }

    const DEC_CODEC: &str = "mfxImplDescription.mfxDecoderDescription.decoder.CodecID";
    const DEC_MEM: &str =
        "mfxImplDescription.mfxDecoderDescription.decoder.decprofile.decmemdesc.MemHandleType";
    const DEC_WIDTH: &str =
        "mfxImplDescription.mfxDecoderDescription.decoder.decprofile.decmemdesc.Width";
    const DEC_COLOR: &str =
        "mfxImplDescription.mfxDecoderDescription.decoder.decprofile.decmemdesc.ColorFormat";

    #[test]
    fn no_filters_accept_everything() {
        assert_eq!(check(&gpu(), &[]), Ok(()));
        assert_eq!(check(&gpu(), &[ConfigFilter::new()]), Ok(()));
    }

    #[test]
    fn general_properties() {
        let desc = gpu();
        assert_eq!(check(&desc, &[filter(&[("mfxImplDescription.Impl", 2u32.into())])]), Ok(()));
        assert_eq!(
            check(&desc, &[filter(&[("mfxImplDescription.Impl", 1u32.into())])]),
            Err(Mismatch::General)
        );
        assert_eq!(
            check(&desc, &[filter(&[("mfxImplDescription.VendorID", 0x8086u32.into())])]),
            Ok(())
        );
        assert_eq!(
            check(&desc, &[filter(&[("mfxImplDescription.ImplName", "mfx-gen-2".into())])]),
            Err(Mismatch::General)
        );
    }

    #[test]
    fn license_and_keywords_are_token_subsets() {
        let mut desc = gpu();
        desc.keywords = "GPU,HW,VAAPI".to_string();

        let keywords = |k: &str| [filter(&[("mfxImplDescription.Keywords", k.into())])];
        assert_eq!(check(&desc, &keywords("HW")), Ok(()));
        assert_eq!(check(&desc, &keywords("VAAPI,GPU")), Ok(()));
        assert_eq!(check(&desc, &keywords("GPU,D3D11")), Err(Mismatch::General));
        assert_eq!(check(&desc, &keywords("GP")), Err(Mismatch::General));
    }

    #[test]
    fn acceleration_mode_uses_mode_list() {
        let mut desc = gpu();
        desc.acceleration_mode = 0x400;
        desc.acceleration_modes.modes = vec![0x400, 0x401];

        let mode = |m: u32| [filter(&[("mfxImplDescription.AccelerationMode", m.into())])];
        assert_eq!(check(&desc, &mode(0x401)), Ok(()));
        assert_eq!(check(&desc, &mode(0x300)), Err(Mismatch::General));

        desc.acceleration_modes.modes.clear();
        assert_eq!(check(&desc, &mode(0x401)), Err(Mismatch::General));
        assert_eq!(check(&desc, &mode(0x400)), Ok(()));
    }

    #[test]
    fn pool_policy_needs_recent_description() {
        let mut desc = gpu();
        desc.pool_policies.policies = vec![0, 2];
        let policy = [filter(&[("mfxImplDescription.mfxSurfacePoolMode", 2u32.into())])];

        desc.version = StructVersion::new(1, 1);
        assert_eq!(check(&desc, &policy), Err(Mismatch::General));

        desc.version = StructVersion::new(1, 2);
        assert_eq!(check(&desc, &policy), Ok(()));

        desc.pool_policies.policies.clear();
        assert_eq!(check(&desc, &policy), Err(Mismatch::General));
    }

    #[test]
    fn device_id_forms() {
        let desc = gpu();
        let name = "mfxImplDescription.mfxDeviceDescription.DeviceID";

        assert_eq!(check(&desc, &[filter(&[(name, 0x46a6u16.into())])]), Ok(()));
        assert_eq!(check(&desc, &[filter(&[(name, 0x46a7u16.into())])]), Err(Mismatch::General));
        assert_eq!(check(&desc, &[filter(&[(name, "46a6/0".into())])]), Ok(()));
        assert_eq!(check(&desc, &[filter(&[(name, "46a6".into())])]), Err(Mismatch::General));

        let mut unparseable = gpu();
        unparseable.device.device_id = "gpu".to_string();
        assert_eq!(
            check(&unparseable, &[filter(&[(name, 0x46a6u16.into())])]),
            Err(Mismatch::General)
        );
    }

    #[test]
    fn hex_prefix() {
        assert_eq!(parse_hex_prefix("46a6/0"), Some(0x46a6));
        assert_eq!(parse_hex_prefix("0x56A0"), Some(0x56a0));
        assert_eq!(parse_hex_prefix("  9a49"), Some(0x9a49));
        assert_eq!(parse_hex_prefix("0xZ"), Some(0));
        assert_eq!(parse_hex_prefix("gpu"), None);
        assert_eq!(parse_hex_prefix(""), None);
        assert_eq!(parse_hex_prefix("ffffffffff"), None);
    }

    #[test]
    fn media_adapter_type_needs_device_version() {
        let mut desc = gpu();
        desc.device.media_adapter_type = 2;
        let adapter =
            [filter(&[("mfxImplDescription.mfxDeviceDescription.MediaAdapterType", 2u16.into())])];

        assert_eq!(check(&desc, &adapter), Err(Mismatch::General));
        desc.device.version = StructVersion::new(1, 1);
        assert_eq!(check(&desc, &adapter), Ok(()));

        // Not checked on 1.x implementations.
        desc.device.version = StructVersion::default();
        desc.api_version = ApiVersion::new(1, 35);
        assert_eq!(check(&desc, &adapter), Ok(()));
    }

    #[test]
    fn decoder_properties_match_one_combination() {
        let desc = gpu();

        let avc_nv12 = filter(&[(DEC_CODEC, CODEC_AVC.into()), (DEC_COLOR, FOURCC_NV12.into())]);
        assert_eq!(check(&desc, &[avc_nv12]), Ok(()));

        // P010 is only offered for HEVC.
        let avc_p010 = filter(&[(DEC_CODEC, CODEC_AVC.into()), (DEC_COLOR, FOURCC_P010.into())]);
        assert_eq!(check(&desc, &[avc_p010]), Err(Mismatch::Decoder));

        // Separate filters are checked separately.
        let avc = filter(&[(DEC_CODEC, CODEC_AVC.into())]);
        let p010 = filter(&[(DEC_COLOR, FOURCC_P010.into())]);
        assert_eq!(check(&desc, &[avc, p010]), Ok(()));
    }

    #[test]
    fn decoder_excludes_other_codec() {
        let mut hevc_only = gpu();
        hevc_only.decoders.codecs.retain(|c| c.codec_id == CODEC_HEVC);

        let avc_sys = filter(&[
            (DEC_CODEC, CODEC_AVC.into()),
            (DEC_MEM, (ResourceType::SystemSurface as u32).into()),
        ]);
        assert_eq!(check(&hevc_only, &[avc_sys.clone()]), Err(Mismatch::Decoder));
        assert_eq!(check(&gpu(), &[avc_sys]), Ok(()));
    }

    #[test]
    fn range_boundaries() {
        let desc = gpu();
        let width = |r: Range32U| {
            [filter(&[(DEC_CODEC, CODEC_AVC.into()), (DEC_WIDTH, r.into())])]
        };

        assert_eq!(check(&desc, &width(Range32U::new(64, 4096, 16))), Ok(()));
        assert_eq!(check(&desc, &width(Range32U::new(128, 1920, 32))), Ok(()));
        assert_eq!(check(&desc, &width(Range32U::new(32, 1920, 16))), Err(Mismatch::Decoder));
        assert_eq!(check(&desc, &width(Range32U::new(64, 4097, 16))), Err(Mismatch::Decoder));
        assert_eq!(check(&desc, &width(Range32U::new(64, 1920, 8))), Err(Mismatch::Decoder));
    }

    #[test]
    #[cfg(feature = "experimental")]
    fn reported_stats_depend_on_api_version() {
        let stats = |s: u16| {
            [filter(&[(
                "mfxImplDescription.mfxEncoderDescription.encoder.ReportedStats",
                s.into(),
            )])]
        };

        let mut desc = gpu();
        assert_eq!(check(&desc, &stats(ENCODE_STATS_LEVEL_FRAME)), Ok(()));
        assert_eq!(
            check(&desc, &stats(ENCODE_STATS_LEVEL_FRAME | ENCODE_STATS_LEVEL_BLK)),
            Ok(())
        );
        assert_eq!(
            check(&desc, &stats(crate::description::ENCODE_STATS_LEVEL_SLICE)),
            Err(Mismatch::Encoder)
        );

        desc.api_version = ApiVersion::new(2, 6);
        assert_eq!(check(&desc, &stats(ENCODE_STATS_LEVEL_FRAME)), Err(Mismatch::Encoder));
    }

    #[test]
    fn vpp_formats() {
        let desc = gpu();
        let vpp = |out: u32| {
            [filter(&[
                (
                    "mfxImplDescription.mfxVPPDescription.filter.memdesc.format.InFormat",
                    FOURCC_NV12.into(),
                ),
                (
                    "mfxImplDescription.mfxVPPDescription.filter.memdesc.format.OutFormat",
                    out.into(),
                ),
            ])]
        };
        assert_eq!(check(&desc, &vpp(FOURCC_RGB4)), Ok(()));
        assert_eq!(check(&desc, &vpp(FOURCC_P010)), Err(Mismatch::Vpp));
    }

    #[test]
    fn legacy_ignores_codec_filters() {
        let desc = hw_description("mfxhw64", ApiVersion::new(1, 35), "9a49/0");
        let avc = [filter(&[(DEC_CODEC, CODEC_AVC.into())])];

        let mut legacy = offer(&desc);
        assert_eq!(validate(&legacy, &avc, &SpecialConfig::collect(&avc)), Err(Mismatch::Decoder));
        legacy.legacy = true;
        assert_eq!(validate(&legacy, &avc, &SpecialConfig::collect(&avc)), Ok(()));
    }

    #[test]
    fn api_version_from_parts() {
        let desc = gpu();
        let major = filter(&[("mfxImplDescription.ApiVersion.Major", 2u16.into())]);
        let newer = filter(&[("mfxImplDescription.ApiVersion.Minor", 10u16.into())]);
        let older = filter(&[("mfxImplDescription.ApiVersion.Minor", 5u16.into())]);

        // Only the major version: not checked.
        assert_eq!(check(&desc, &[major.clone()]), Ok(()));
        assert_eq!(check(&desc, &[major.clone(), newer]), Err(Mismatch::ApiVersion));
        assert_eq!(check(&desc, &[major, older]), Ok(()));

        let whole = filter(&[("mfxImplDescription.ApiVersion.Version", 0x0002_0009u32.into())]);
        assert_eq!(check(&desc, &[whole]), Ok(()));
    }

    #[test]
    fn required_functions() {
        let desc = gpu();
        let functions = ImplementedFunctions {
            names: vec!["MFXInitialize".to_string(), "MFXVideoDECODE_Init".to_string()],
        };
        let name = "mfxImplementedFunctions.FunctionsName";
        let filters = [
            filter(&[(name, "MFXVideoDECODE_Init".into())]),
            filter(&[(name, "MFXInitialize".into())]),
        ];
        let special = SpecialConfig::collect(&filters);

        let mut with_functions = offer(&desc);
        assert_eq!(validate(&with_functions, &filters, &special), Err(Mismatch::Functions));

        with_functions.functions = Some(&functions);
        assert_eq!(validate(&with_functions, &filters, &special), Ok(()));

        let missing = [filter(&[(name, "MFXVideoENCODE_Init".into())])];
        assert_eq!(
            validate(&with_functions, &missing, &SpecialConfig::collect(&missing)),
            Err(Mismatch::Functions)
        );
    }

    #[test]
    fn adapter_index() {
        let desc = gpu();
        let index = |i: u32| [filter(&[("DXGIAdapterIndex", i.into())])];

        assert_eq!(check(&desc, &index(0)), Ok(()));
        assert_eq!(check(&desc, &index(1)), Err(Mismatch::AdapterIndex));

        let mut unknown = gpu();
        unknown.device.device_id = "gpu".to_string();
        assert_eq!(check(&unknown, &index(0)), Err(Mismatch::AdapterIndex));
    }

    #[test]
    #[cfg(feature = "experimental")]
    fn extended_device() {
        let desc = gpu();
        let id = ExtendedDeviceId {
            vendor_id: 0x8086,
            device_id: 0x46a6,
            drm_render_node_num: 128,
            drm_primary_node_num: 0,
            device_luid: [1, 2, 3, 4, 5, 6, 7, 8],
            ..Default::default()
        };
        let render = [filter(&[("mfxExtendedDeviceId.DRMRenderNodeNum", 128u32.into())])];
        let luid = [filter(&[(
            "mfxExtendedDeviceId.DeviceLUID",
            Variant::Luid([1, 2, 3, 4, 5, 6, 7, 8]),
        )])];

        let mut with_id = offer(&desc);
        assert_eq!(
            validate(&with_id, &render, &SpecialConfig::default()),
            Err(Mismatch::ExtendedDevice)
        );

        with_id.extended_device_id = Some(&id);
        assert_eq!(validate(&with_id, &render, &SpecialConfig::default()), Ok(()));
        // The LUID is only meaningful when flagged valid.
        assert_eq!(
            validate(&with_id, &luid, &SpecialConfig::default()),
            Err(Mismatch::ExtendedDevice)
        );

        let valid = ExtendedDeviceId { luid_valid: true, ..id.clone() };
        with_id.extended_device_id = Some(&valid);
        assert_eq!(validate(&with_id, &luid, &SpecialConfig::default()), Ok(()));

        let no_render = ExtendedDeviceId { drm_render_node_num: 0, ..id.clone() };
        with_id.extended_device_id = Some(&no_render);
        assert_eq!(
            validate(&with_id, &render, &SpecialConfig::default()),
            Err(Mismatch::ExtendedDevice)
        );
    }

    #[test]
    #[cfg(feature = "experimental")]
    fn drm_primary_node_needs_render_node() {
        let desc = gpu();
        let primary =
            |node: u32| [filter(&[("mfxExtendedDeviceId.DRMPrimaryNodeNum", node.into())])];
        let special = SpecialConfig::default();
        let id = ExtendedDeviceId {
            vendor_id: 0x8086,
            device_id: 0x46a6,
            drm_render_node_num: 128,
            drm_primary_node_num: 1,
            ..Default::default()
        };

        let mut with_id = offer(&desc);
        with_id.extended_device_id = Some(&id);
        assert_eq!(validate(&with_id, &primary(1), &special), Ok(()));
        assert_eq!(validate(&with_id, &primary(2), &special), Err(Mismatch::ExtendedDevice));

        // A device without a render node never matches a primary node, even an equal one.
        let no_render = ExtendedDeviceId { drm_render_node_num: 0x7fff_ffff, ..id.clone() };
        with_id.extended_device_id = Some(&no_render);
        assert_eq!(validate(&with_id, &primary(1), &special), Err(Mismatch::ExtendedDevice));
    }

    #[test]
    fn vendor_impl_id() {
        let mut desc = gpu();
        desc.vendor_impl_id = 3;
        let vendor_impl = |id: u32| [filter(&[("mfxImplDescription.VendorImplID", id.into())])];

        assert_eq!(check(&desc, &vendor_impl(3)), Ok(()));
        assert_eq!(check(&desc, &vendor_impl(0)), Err(Mismatch::General));
        assert_eq!(check(&desc, &vendor_impl(4)), Err(Mismatch::General));
    }

    #[test]
    fn slots_do_not_interfere() {
        let desc = gpu();
        let mut f = filter(&[(DEC_CODEC, CODEC_HEVC.into())]);
        assert_eq!(check(&desc, &[f.clone()]), Ok(()));

        // Setting an unrelated slot keeps the decoder constraint as it was.
        f.set_property("mfxImplDescription.VendorID", 0x8086u32.into()).unwrap();
        assert_eq!(check(&desc, &[f.clone()]), Ok(()));
        f.set_property(DEC_CODEC, fourcc(b'V', b'P', b'9', b' ').into()).unwrap();
        assert_eq!(check(&desc, &[f]), Err(Mismatch::Decoder));
    }
}
