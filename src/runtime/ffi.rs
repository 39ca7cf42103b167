// Copyright 2025 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! C layouts of the structures exchanged with runtime libraries, and conversion of the reported
//! ones into owned descriptions.

#![allow(non_camel_case_types)]

use std::ffi::c_char;
use std::ffi::c_void;
use std::ffi::CStr;

use crate::description::AccelerationModeDescription;
use crate::description::DecoderCodec;
use crate::description::DecoderDescription;
use crate::description::DecoderProfile;
use crate::description::DeviceDescription;
use crate::description::EncoderCodec;
use crate::description::EncoderDescription;
use crate::description::EncoderProfile;
use crate::description::ExtendedDeviceId;
use crate::description::ImplDescription;
use crate::description::ImplementedFunctions;
use crate::description::MemDesc;
use crate::description::PoolPolicyDescription;
use crate::description::Range32U;
use crate::description::StructVersion;
use crate::description::SubDevice;
use crate::description::VppDescription;
use crate::description::VppFilter;
use crate::description::VppFormat;
use crate::description::VppMemDesc;
use crate::ApiVersion;

pub type Status = i32;
pub type Session = *mut c_void;
pub type Handle = *mut c_void;

/// Delivery formats of `MFXQueryImplsDescription`.
pub const IMPLCAPS_IMPLDESCSTRUCTURE: u32 = 1;
pub const IMPLCAPS_IMPLEMENTEDFUNCTIONS: u32 = 2;
pub const IMPLCAPS_IMPLPATH: u32 = 3;
pub const IMPLCAPS_DEVICE_ID_EXTENDED: u32 = 4;

const STRFIELD_LEN: usize = 128;
const IMPL_NAME_LEN: usize = 32;

#[repr(C)]
#[derive(Copy, Clone, Debug, Default)]
pub struct mfxStructVersion {
    pub minor: u8,
    pub major: u8,
}

#[repr(C)]
#[derive(Copy, Clone, Debug, Default)]
pub struct mfxVersion {
    pub minor: u16,
    pub major: u16,
}

#[repr(C)]
#[derive(Copy, Clone, Debug, Default)]
pub struct mfxRange32U {
    pub min: u32,
    pub max: u32,
    pub step: u32,
}

#[repr(C)]
pub struct mfxSubDevice {
    pub index: u32,
    pub sub_device_id: [c_char; STRFIELD_LEN],
    pub reserved: [u32; 7],
}

#[repr(C)]
pub struct mfxDeviceDescription {
    pub version: mfxStructVersion,
    pub reserved: [u16; 6],
    pub media_adapter_type: u16,
    pub device_id: [c_char; STRFIELD_LEN],
    pub num_sub_devices: u16,
    pub sub_devices: *const mfxSubDevice,
}

#[repr(C)]
pub struct mfxMemDesc {
    pub mem_handle_type: u32,
    pub width: mfxRange32U,
    pub height: mfxRange32U,
    pub reserved: [u16; 7],
    pub num_color_formats: u16,
    pub color_formats: *const u32,
}

#[repr(C)]
pub struct mfxCodecProfile {
    pub profile: u32,
    pub reserved: [u16; 7],
    pub num_mem_types: u16,
    pub mem_desc: *const mfxMemDesc,
}

#[repr(C)]
pub struct mfxDecoderCodec {
    pub codec_id: u32,
    pub reserved: [u16; 8],
    pub max_codec_level: u16,
    pub num_profiles: u16,
    pub profiles: *const mfxCodecProfile,
}

#[repr(C)]
pub struct mfxDecoderDescription {
    pub version: mfxStructVersion,
    pub reserved: [u16; 7],
    pub num_codecs: u16,
    pub codecs: *const mfxDecoderCodec,
}

#[repr(C)]
pub struct mfxEncoderCodec {
    pub codec_id: u32,
    pub max_codec_level: u16,
    pub bidirectional_prediction: u16,
    pub reported_stats: u16,
    pub reserved: [u16; 6],
    pub num_profiles: u16,
    pub profiles: *const mfxCodecProfile,
}

#[repr(C)]
pub struct mfxEncoderDescription {
    pub version: mfxStructVersion,
    pub reserved: [u16; 7],
    pub num_codecs: u16,
    pub codecs: *const mfxEncoderCodec,
}

#[repr(C)]
pub struct mfxVppFormat {
    pub in_format: u32,
    pub reserved: [u16; 5],
    pub num_out_format: u16,
    pub out_formats: *const u32,
}

#[repr(C)]
pub struct mfxVppMemDesc {
    pub mem_handle_type: u32,
    pub width: mfxRange32U,
    pub height: mfxRange32U,
    pub reserved: [u16; 7],
    pub num_in_formats: u16,
    pub formats: *const mfxVppFormat,
}

#[repr(C)]
pub struct mfxVppFilter {
    pub filter_fourcc: u32,
    pub max_delay_in_frames: u16,
    pub reserved: [u16; 7],
    pub num_mem_types: u16,
    pub mem_desc: *const mfxVppMemDesc,
}

#[repr(C)]
pub struct mfxVPPDescription {
    pub version: mfxStructVersion,
    pub reserved: [u16; 7],
    pub num_filters: u16,
    pub filters: *const mfxVppFilter,
}

#[repr(C)]
pub struct mfxAccelerationModeDescription {
    pub version: mfxStructVersion,
    pub reserved: [u16; 2],
    pub num_acceleration_modes: u16,
    pub mode: *const u32,
}

#[repr(C)]
pub struct mfxPoolPolicyDescription {
    pub version: mfxStructVersion,
    pub reserved: [u16; 2],
    pub num_pool_policies: u16,
    pub policy: *const u32,
}

#[repr(C)]
pub struct mfxImplDescription {
    pub version: mfxStructVersion,
    pub impl_: u32,
    pub acceleration_mode: u32,
    pub api_version: mfxVersion,
    pub impl_name: [c_char; IMPL_NAME_LEN],
    pub license: [c_char; STRFIELD_LEN],
    pub keywords: [c_char; STRFIELD_LEN],
    pub vendor_id: u32,
    pub vendor_impl_id: u32,
    pub dev: mfxDeviceDescription,
    pub dec: mfxDecoderDescription,
    pub enc: mfxEncoderDescription,
    pub vpp: mfxVPPDescription,
    pub acceleration_mode_description: mfxAccelerationModeDescription,
    pub pool_policies: mfxPoolPolicyDescription,
    pub reserved: [u32; 8],
    pub num_ext_param: u32,
    pub ext_params: *mut *mut c_void,
}

#[repr(C)]
pub struct mfxImplementedFunctions {
    pub num_functions: u16,
    pub functions_name: *const *const c_char,
}

#[repr(C)]
pub struct mfxExtendedDeviceId {
    pub version: mfxStructVersion,
    pub vendor_id: u16,
    pub device_id: u16,
    pub pci_domain: u32,
    pub pci_bus: u32,
    pub pci_device: u32,
    pub pci_function: u32,
    pub device_luid: [u8; 8],
    pub luid_device_node_mask: u32,
    pub luid_valid: u32,
    pub drm_render_node_num: u32,
    pub drm_primary_node_num: u32,
    pub revision_id: u16,
    pub reserved1: [u16; 19],
    pub device_name: [c_char; STRFIELD_LEN],
}

#[repr(C)]
pub struct mfxInitializationParam {
    pub acceleration_mode: u32,
    pub device_copy: u16,
    pub reserved: [u16; 2],
    pub num_ext_param: u16,
    pub ext_param: *mut *mut c_void,
    pub vendor_impl_id: u32,
    pub reserved2: [u32; 3],
}

/// Extension buffers of `mfxInitParam`, which live in a union padded to pointer alignment.
#[repr(C)]
pub struct mfxInitExtParams {
    pub ext_param: *mut *mut c_void,
    pub num_ext_param: u16,
}

#[repr(C)]
pub struct mfxInitParam {
    pub implementation: i32,
    pub version: mfxVersion,
    pub external_threads: u16,
    pub ext: mfxInitExtParams,
    pub gpu_copy: u16,
    pub reserved: [u16; 21],
}

#[repr(C)]
#[derive(Copy, Clone, Debug, Default)]
pub struct mfxPlatform {
    pub code_name: u16,
    pub device_id: u16,
    pub media_adapter_type: u16,
    pub reserved: [u16; 13],
}

pub type QueryImplsDescriptionFn = unsafe extern "C" fn(u32, *mut u32) -> *mut Handle;
pub type ReleaseImplDescriptionFn = unsafe extern "C" fn(Handle) -> Status;
pub type InitializeFn = unsafe extern "C" fn(mfxInitializationParam, *mut Session) -> Status;
pub type InitExFn = unsafe extern "C" fn(mfxInitParam, *mut Session) -> Status;
pub type CloseFn = unsafe extern "C" fn(Session) -> Status;
pub type QueryVersionFn = unsafe extern "C" fn(Session, *mut mfxVersion) -> Status;
pub type SetHandleFn = unsafe extern "C" fn(Session, u32, Handle) -> Status;
pub type QueryPlatformFn = unsafe extern "C" fn(Session, *mut mfxPlatform) -> Status;

/// Views a runtime array as a slice. A null array is treated as empty.
///
/// # Safety
///
/// If `ptr` is not null, it must point to at least `len` valid elements that outlive `'a`.
unsafe fn array<'a, T>(ptr: *const T, len: usize) -> &'a [T] {
    if ptr.is_null() || len == 0 {
        &[]
    } else {
        std::slice::from_raw_parts(ptr, len)
    }
}

/// Reads a fixed-size, possibly unterminated, character field.
fn fixed_string(field: &[c_char]) -> String {
    let bytes: Vec<u8> = field.iter().take_while(|c| **c != 0).map(|c| *c as u8).collect();
    String::from_utf8_lossy(&bytes).into_owned()
}

fn struct_version(version: mfxStructVersion) -> StructVersion {
    StructVersion::new(version.major, version.minor)
}

fn range(range: mfxRange32U) -> Range32U {
    Range32U::new(range.min, range.max, range.step)
}

unsafe fn mem_descs(ptr: *const mfxMemDesc, len: u16) -> Vec<MemDesc> {
    array(ptr, len as usize)
        .iter()
        .map(|m| MemDesc {
            mem_handle_type: m.mem_handle_type,
            width: range(m.width),
            height: range(m.height),
            color_formats: array(m.color_formats, m.num_color_formats as usize).to_vec(),
        })
        .collect()
}

unsafe fn device(dev: &mfxDeviceDescription) -> DeviceDescription {
    DeviceDescription {
        version: struct_version(dev.version),
        media_adapter_type: dev.media_adapter_type,
        device_id: fixed_string(&dev.device_id),
        sub_devices: array(dev.sub_devices, dev.num_sub_devices as usize)
            .iter()
            .map(|s| SubDevice { index: s.index, sub_device_id: fixed_string(&s.sub_device_id) })
            .collect(),
    }
}

unsafe fn decoders(dec: &mfxDecoderDescription) -> DecoderDescription {
    let codecs = array(dec.codecs, dec.num_codecs as usize)
        .iter()
        .map(|c| DecoderCodec {
            codec_id: c.codec_id,
            max_codec_level: c.max_codec_level,
            profiles: array(c.profiles, c.num_profiles as usize)
                .iter()
                .map(|p| DecoderProfile {
                    profile: p.profile,
                    mem_descs: mem_descs(p.mem_desc, p.num_mem_types),
                })
                .collect(),
        })
        .collect();

    DecoderDescription { version: struct_version(dec.version), codecs }
}

unsafe fn encoders(enc: &mfxEncoderDescription) -> EncoderDescription {
    let codecs = array(enc.codecs, enc.num_codecs as usize)
        .iter()
        .map(|c| EncoderCodec {
            codec_id: c.codec_id,
            max_codec_level: c.max_codec_level,
            bidirectional_prediction: c.bidirectional_prediction,
            reported_stats: c.reported_stats,
            profiles: array(c.profiles, c.num_profiles as usize)
                .iter()
                .map(|p| EncoderProfile {
                    profile: p.profile,
                    mem_descs: mem_descs(p.mem_desc, p.num_mem_types),
                })
                .collect(),
        })
        .collect();

    EncoderDescription { version: struct_version(enc.version), codecs }
}

unsafe fn vpp(vpp: &mfxVPPDescription) -> VppDescription {
    let filters = array(vpp.filters, vpp.num_filters as usize)
        .iter()
        .map(|f| VppFilter {
            filter_fourcc: f.filter_fourcc,
            max_delay_in_frames: f.max_delay_in_frames,
            mem_descs: array(f.mem_desc, f.num_mem_types as usize)
                .iter()
                .map(|m| VppMemDesc {
                    mem_handle_type: m.mem_handle_type,
                    width: range(m.width),
                    height: range(m.height),
                    formats: array(m.formats, m.num_in_formats as usize)
                        .iter()
                        .map(|fmt| VppFormat {
                            in_format: fmt.in_format,
                            out_formats: array(fmt.out_formats, fmt.num_out_format as usize)
                                .to_vec(),
                        })
                        .collect(),
                })
                .collect(),
        })
        .collect();

    VppDescription { version: struct_version(vpp.version), filters }
}

/// Copies a reported implementation description.
///
/// # Safety
///
/// `desc` must point to a valid description whose nested arrays are consistent with their
/// counts.
pub unsafe fn copy_impl_description(desc: *const mfxImplDescription) -> ImplDescription {
    let desc = &*desc;
    let version = struct_version(desc.version);

    // Pool policies were added in version 1.2 of the structure.
    let pool_policies = if version >= StructVersion::new(1, 2) {
        PoolPolicyDescription {
            version: struct_version(desc.pool_policies.version),
            policies: array(
                desc.pool_policies.policy,
                desc.pool_policies.num_pool_policies as usize,
            )
                .to_vec(),
        }
    } else {
        PoolPolicyDescription::default()
    };

    let modes = &desc.acceleration_mode_description;

    ImplDescription {
        version,
        impl_type: desc.impl_,
        acceleration_mode: desc.acceleration_mode,
        api_version: ApiVersion::new(desc.api_version.major, desc.api_version.minor),
        impl_name: fixed_string(&desc.impl_name),
        license: fixed_string(&desc.license),
        keywords: fixed_string(&desc.keywords),
        vendor_id: desc.vendor_id,
        vendor_impl_id: desc.vendor_impl_id,
        device: device(&desc.dev),
        decoders: decoders(&desc.dec),
        encoders: encoders(&desc.enc),
        vpp: vpp(&desc.vpp),
        acceleration_modes: AccelerationModeDescription {
            version: struct_version(modes.version),
            modes: array(modes.mode, modes.num_acceleration_modes as usize).to_vec(),
        },
        pool_policies,
    }
}

/// Copies a reported list of implemented functions.
///
/// # Safety
///
/// `funcs` must point to a valid list whose names are null or NUL-terminated strings.
pub unsafe fn copy_implemented_functions(
    funcs: *const mfxImplementedFunctions,
) -> ImplementedFunctions {
    let funcs = &*funcs;
    let names = array(funcs.functions_name, funcs.num_functions as usize)
        .iter()
        .filter(|name| !name.is_null())
        .map(|name| CStr::from_ptr(*name).to_string_lossy().into_owned())
        .collect();

    ImplementedFunctions { names }
}

/// Copies a reported extended device identity.
///
/// # Safety
///
/// `id` must point to a valid extended device identity.
pub unsafe fn copy_extended_device_id(id: *const mfxExtendedDeviceId) -> ExtendedDeviceId {
    let id = &*id;

    ExtendedDeviceId {
        version: struct_version(id.version),
        vendor_id: id.vendor_id,
        device_id: id.device_id,
        pci_domain: id.pci_domain,
        pci_bus: id.pci_bus,
        pci_device: id.pci_device,
        pci_function: id.pci_function,
        device_luid: id.device_luid,
        luid_device_node_mask: id.luid_device_node_mask,
        luid_valid: id.luid_valid != 0,
        drm_render_node_num: id.drm_render_node_num,
        drm_primary_node_num: id.drm_primary_node_num,
        revision_id: id.revision_id,
        device_name: fixed_string(&id.device_name),
    }
}
