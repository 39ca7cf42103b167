// Copyright 2025 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Capability descriptions reported by runtime implementations.
//!
//! These are owned copies of the structures a runtime hands out from its query entrypoint. Field
//! values are kept raw (`u32` codes rather than enums) because runtimes routinely report values
//! this crate does not know about, and those must still be comparable against filter properties.

use enumn::N;

use crate::fourcc;
use crate::ApiVersion;

/// Kind of implementation.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, N)]
#[repr(u32)]
pub enum ImplType {
    Software = 1,
    Hardware = 2,
}

/// Hardware acceleration mode, i.e. which device API the implementation drives.
#[derive(Copy, Clone, Debug, PartialEq, Eq, N)]
#[repr(u32)]
pub enum AccelerationMode {
    NotApplicable = 0x0000,
    ViaD3d9 = 0x0200,
    ViaD3d11 = 0x0300,
    ViaVaapi = 0x0400,
    ViaVaapiDrmRenderNode = 0x0401,
    ViaVaapiDrmModeset = 0x0402,
    ViaVaapiGlx = 0x0403,
    ViaVaapiX11 = 0x0404,
    ViaVaapiWayland = 0x0405,
    ViaHddlUnite = 0x0500,
}

impl AccelerationMode {
    /// Default mode of hardware implementations on the current platform.
    #[cfg(windows)]
    pub const PLATFORM_DEFAULT: AccelerationMode = AccelerationMode::ViaD3d11;
    #[cfg(not(windows))]
    pub const PLATFORM_DEFAULT: AccelerationMode = AccelerationMode::ViaVaapi;
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, N)]
#[repr(u16)]
pub enum MediaAdapterType {
    Unknown = 0,
    Integrated = 1,
    Discrete = 2,
}

/// Surface pool allocation policies.
#[derive(Copy, Clone, Debug, PartialEq, Eq, N)]
#[repr(u32)]
pub enum PoolAllocationPolicy {
    Optimal = 0,
    LimitPoolSize = 1,
    Unlimited = 2,
}

/// Resource types a codec can read from or write to.
#[derive(Copy, Clone, Debug, PartialEq, Eq, N)]
#[repr(u32)]
pub enum ResourceType {
    SystemSurface = 1,
    VaSurfacePtr = 2,
    VaBufferPtr = 3,
    Dx9Surface = 4,
    Dx11Texture = 5,
    Dx12Resource = 6,
    DmaResource = 7,
    HddlUniteRemoteMemory = 8,
}

/// Vendor ID of Intel devices.
pub const VENDOR_INTEL: u32 = 0x8086;

pub const CODEC_AVC: u32 = fourcc(b'A', b'V', b'C', b' ');
pub const CODEC_HEVC: u32 = fourcc(b'H', b'E', b'V', b'C');
pub const CODEC_MPEG2: u32 = fourcc(b'M', b'P', b'G', b'2');
pub const CODEC_VC1: u32 = fourcc(b'V', b'C', b'1', b' ');
pub const CODEC_VP8: u32 = fourcc(b'V', b'P', b'8', b' ');
pub const CODEC_VP9: u32 = fourcc(b'V', b'P', b'9', b' ');
pub const CODEC_AV1: u32 = fourcc(b'A', b'V', b'1', b' ');
pub const CODEC_JPEG: u32 = fourcc(b'J', b'P', b'E', b'G');

pub const FOURCC_NV12: u32 = fourcc(b'N', b'V', b'1', b'2');
pub const FOURCC_P010: u32 = fourcc(b'P', b'0', b'1', b'0');
pub const FOURCC_I420: u32 = fourcc(b'I', b'4', b'2', b'0');
pub const FOURCC_RGB4: u32 = fourcc(b'R', b'G', b'B', b'4');

/// Encoder statistics levels, combined as a bitmask.
pub const ENCODE_STATS_LEVEL_BLK: u16 = 0x1;
pub const ENCODE_STATS_LEVEL_SLICE: u16 = 0x2;
pub const ENCODE_STATS_LEVEL_TILE: u16 = 0x4;
pub const ENCODE_STATS_LEVEL_FRAME: u16 = 0x8;

/// Version of a description structure, used to tell which fields a runtime actually filled.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct StructVersion {
    pub major: u8,
    pub minor: u8,
}

impl StructVersion {
    pub const fn new(major: u8, minor: u8) -> Self {
        Self { major, minor }
    }
}

/// Inclusive range of supported values with a granularity.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Range32U {
    pub min: u32,
    pub max: u32,
    pub step: u32,
}

impl Range32U {
    pub const fn new(min: u32, max: u32, step: u32) -> Self {
        Self { min, max, step }
    }

    /// Whether a requested range fits into this supported one.
    pub fn covers(&self, requested: &Range32U) -> bool {
        requested.max <= self.max && requested.min >= self.min && requested.step >= self.step
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SubDevice {
    pub index: u32,
    pub sub_device_id: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DeviceDescription {
    pub version: StructVersion,
    pub media_adapter_type: u16,
    /// Device identifier, usually `"<hex device id>"` or `"<hex device id>/<adapter>"`.
    pub device_id: String,
    pub sub_devices: Vec<SubDevice>,
}

/// Memory descriptor shared by decoders and encoders.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MemDesc {
    pub mem_handle_type: u32,
    pub width: Range32U,
    pub height: Range32U,
    pub color_formats: Vec<u32>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DecoderProfile {
    pub profile: u32,
    pub mem_descs: Vec<MemDesc>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DecoderCodec {
    pub codec_id: u32,
    pub max_codec_level: u16,
    pub profiles: Vec<DecoderProfile>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DecoderDescription {
    pub version: StructVersion,
    pub codecs: Vec<DecoderCodec>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EncoderProfile {
    pub profile: u32,
    pub mem_descs: Vec<MemDesc>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EncoderCodec {
    pub codec_id: u32,
    pub max_codec_level: u16,
    pub bidirectional_prediction: u16,
    /// Bitmask of `ENCODE_STATS_LEVEL_*`. Only meaningful for API 2.7 and later.
    pub reported_stats: u16,
    pub profiles: Vec<EncoderProfile>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EncoderDescription {
    pub version: StructVersion,
    pub codecs: Vec<EncoderCodec>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct VppFormat {
    pub in_format: u32,
    pub out_formats: Vec<u32>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct VppMemDesc {
    pub mem_handle_type: u32,
    pub width: Range32U,
    pub height: Range32U,
    pub formats: Vec<VppFormat>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct VppFilter {
    pub filter_fourcc: u32,
    pub max_delay_in_frames: u16,
    pub mem_descs: Vec<VppMemDesc>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct VppDescription {
    pub version: StructVersion,
    pub filters: Vec<VppFilter>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AccelerationModeDescription {
    pub version: StructVersion,
    pub modes: Vec<u32>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PoolPolicyDescription {
    pub version: StructVersion,
    pub policies: Vec<u32>,
}

/// Full description of one implementation.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ImplDescription {
    pub version: StructVersion,
    pub impl_type: u32,
    /// Default acceleration mode.
    pub acceleration_mode: u32,
    pub api_version: ApiVersion,
    pub impl_name: String,
    /// Comma separated list of licenses.
    pub license: String,
    /// Comma separated list of keywords.
    pub keywords: String,
    pub vendor_id: u32,
    pub vendor_impl_id: u32,
    pub device: DeviceDescription,
    pub decoders: DecoderDescription,
    pub encoders: EncoderDescription,
    pub vpp: VppDescription,
    /// All supported acceleration modes. May be empty, in which case only the default mode is.
    pub acceleration_modes: AccelerationModeDescription,
    /// Only filled from structure version 1.2.
    pub pool_policies: PoolPolicyDescription,
}

impl ImplDescription {
    pub fn impl_type(&self) -> Option<ImplType> {
        ImplType::n(self.impl_type)
    }

    pub fn is_hardware(&self) -> bool {
        self.impl_type == ImplType::Hardware as u32
    }

    /// Parses the device identifier of an x86 GPU.
    ///
    /// The identifier is either `"<hex device id>"` or `"<hex device id>/<decimal adapter>"`.
    /// Returns the device id and, if present, the adapter index.
    pub fn parse_x86_device_id(&self) -> Option<(u32, Option<u32>)> {
        parse_x86_device_id(&self.device.device_id)
    }
}

pub(crate) fn parse_x86_device_id(device_id: &str) -> Option<(u32, Option<u32>)> {
    let (id, adapter) = match device_id.split_once('/') {
        Some((id, adapter)) => (id, Some(adapter)),
        None => (device_id, None),
    };

    if id.is_empty() || !id.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    let id = u32::from_str_radix(id, 16).ok()?;

    let adapter = match adapter {
        Some(a) if !a.is_empty() && a.chars().all(|c| c.is_ascii_digit()) => Some(a.parse().ok()?),
        Some(_) => return None,
        None => None,
    };

    Some((id, adapter))
}

/// Names of the functions an implementation provides.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ImplementedFunctions {
    pub names: Vec<String>,
}

impl ImplementedFunctions {
    pub fn contains(&self, name: &str) -> bool {
        self.names.iter().any(|n| n == name)
    }
}

/// Extended identity of the device behind an implementation.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ExtendedDeviceId {
    pub version: StructVersion,
    pub vendor_id: u16,
    pub device_id: u16,
    pub pci_domain: u32,
    pub pci_bus: u32,
    pub pci_device: u32,
    pub pci_function: u32,
    pub device_luid: [u8; 8],
    pub luid_device_node_mask: u32,
    pub luid_valid: bool,
    /// Zero when the device has no DRM render node.
    pub drm_render_node_num: u32,
    /// `0x7fffffff` when the device has no DRM primary node.
    pub drm_primary_node_num: u32,
    pub revision_id: u16,
    pub device_name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn range_coverage() {
        let supported = Range32U::new(64, 4096, 16);

        assert!(supported.covers(&Range32U::new(64, 4096, 16)));
        assert!(supported.covers(&Range32U::new(128, 1920, 32)));
        assert!(!supported.covers(&Range32U::new(32, 1920, 16)));
        assert!(!supported.covers(&Range32U::new(64, 8192, 16)));
        assert!(!supported.covers(&Range32U::new(64, 1920, 8)));
    }

    #[test]
    fn x86_device_id() {
        assert_eq!(parse_x86_device_id("46a6"), Some((0x46a6, None)));
        assert_eq!(parse_x86_device_id("56A0/1"), Some((0x56a0, Some(1))));
        assert_eq!(parse_x86_device_id("56a0/"), None);
        assert_eq!(parse_x86_device_id("gpu0"), None);
        assert_eq!(parse_x86_device_id(""), None);
        assert_eq!(parse_x86_device_id("46a6/x"), None);
    }

    #[test]
    fn impl_type_codes() {
        let desc = ImplDescription { impl_type: 2, ..Default::default() };
        assert_eq!(desc.impl_type(), Some(ImplType::Hardware));
        assert!(desc.is_hardware());
        assert_eq!(ImplType::n(3), None);
        assert_eq!(AccelerationMode::n(0x0401), Some(AccelerationMode::ViaVaapiDrmRenderNode));
    }
}
