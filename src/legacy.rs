// Copyright 2025 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Support for 1.x runtimes, which cannot describe themselves.
//!
//! A legacy runtime only exports the session entrypoints, so its capabilities are synthesized by
//! opening a trial session on each adapter and asking it for its version and platform.

use crate::description::AccelerationMode;
use crate::description::AccelerationModeDescription;
use crate::description::DeviceDescription;
use crate::description::ImplDescription;
use crate::description::ImplType;
use crate::description::ImplementedFunctions;
use crate::description::StructVersion;
use crate::description::VENDOR_INTEL;
use crate::runtime::LegacyInitParams;
use crate::runtime::Platform;
use crate::runtime::RawSession;
use crate::runtime::RuntimeModule;
use crate::ApiVersion;
use crate::Result;

/// Part of the file name identifying a legacy runtime.
pub(crate) const LIBRARY_NAME: &str = "libmfxhw";
/// Name given to synthesized implementations.
pub(crate) const IMPL_NAME: &str = "mfxhw64";

/// Implementation flag selecting any hardware adapter.
pub(crate) const IMPL_HARDWARE_ANY: u32 = 0x0004;
/// Implementation flags selecting the first, second, third and fourth adapter.
pub(crate) const ADAPTER_IMPLEMENTATIONS: [u32; 4] = [0x0002, 0x0005, 0x0006, 0x0007];
pub(crate) const MAX_ADAPTERS: usize = ADAPTER_IMPLEMENTATIONS.len();

/// API version legacy runtimes built on top of a 2.x runtime report.
pub(crate) const BRIDGED_API_VERSION: ApiVersion = ApiVersion::new(1, 255);

/// Version requested for trial sessions. Any 1.x runtime accepts it.
const TRIAL_VERSION: ApiVersion = ApiVersion::new(1, 0);

/// Functions every 1.x runtime provides.
const FUNCTIONS: &[&str] = &[
    "MFXInit",
    "MFXInitEx",
    "MFXClose",
    "MFXQueryIMPL",
    "MFXQueryVersion",
    "MFXJoinSession",
    "MFXDisjoinSession",
    "MFXCloneSession",
    "MFXSetPriority",
    "MFXGetPriority",
    "MFXVideoCORE_SetFrameAllocator",
    "MFXVideoCORE_SetHandle",
    "MFXVideoCORE_GetHandle",
    "MFXVideoCORE_QueryPlatform",
    "MFXVideoCORE_SyncOperation",
    "MFXVideoENCODE_Query",
    "MFXVideoENCODE_QueryIOSurf",
    "MFXVideoENCODE_Init",
    "MFXVideoENCODE_Reset",
    "MFXVideoENCODE_Close",
    "MFXVideoENCODE_GetVideoParam",
    "MFXVideoENCODE_GetEncodeStat",
    "MFXVideoENCODE_EncodeFrameAsync",
    "MFXVideoDECODE_Query",
    "MFXVideoDECODE_DecodeHeader",
    "MFXVideoDECODE_QueryIOSurf",
    "MFXVideoDECODE_Init",
    "MFXVideoDECODE_Reset",
    "MFXVideoDECODE_Close",
    "MFXVideoDECODE_GetVideoParam",
    "MFXVideoDECODE_GetDecodeStat",
    "MFXVideoDECODE_SetSkipMode",
    "MFXVideoDECODE_GetPayload",
    "MFXVideoDECODE_DecodeFrameAsync",
    "MFXVideoVPP_Query",
    "MFXVideoVPP_QueryIOSurf",
    "MFXVideoVPP_Init",
    "MFXVideoVPP_Reset",
    "MFXVideoVPP_Close",
    "MFXVideoVPP_GetVideoParam",
    "MFXVideoVPP_GetVPPStat",
    "MFXVideoVPP_RunFrameVPPAsync",
];

/// Maps an acceleration mode to the matching `MFX_IMPL_VIA_*` flag.
///
/// The flags share their values with the acceleration modes. Modes a legacy runtime does not know
/// fall back to the platform default.
fn via_flag(mode: u32) -> u32 {
    match AccelerationMode::n(mode) {
        Some(AccelerationMode::ViaD3d9) | Some(AccelerationMode::ViaD3d11) => mode,
        Some(
            AccelerationMode::ViaVaapi
            | AccelerationMode::ViaVaapiDrmRenderNode
            | AccelerationMode::ViaVaapiDrmModeset
            | AccelerationMode::ViaVaapiGlx
            | AccelerationMode::ViaVaapiX11
            | AccelerationMode::ViaVaapiWayland,
        ) => AccelerationMode::ViaVaapi as u32,
        _ => AccelerationMode::PLATFORM_DEFAULT as u32,
    }
}

/// Implementation flags selecting `adapter` with acceleration `mode`.
pub(crate) fn adapter_implementation(adapter: usize, mode: u32) -> u32 {
    let adapter = ADAPTER_IMPLEMENTATIONS.get(adapter).copied().unwrap_or(IMPL_HARDWARE_ANY);
    adapter | via_flag(mode)
}

/// Opens a session with `implementation`, runs `f` on it and closes it again.
fn with_trial_session<T>(
    module: &dyn RuntimeModule,
    implementation: u32,
    f: impl FnOnce(RawSession) -> Result<T>,
) -> Result<T> {
    let session = module.init_legacy(&LegacyInitParams {
        implementation,
        version: TRIAL_VERSION,
        ext_buffers: &[],
    })?;

    let result = f(session);
    if let Err(e) = module.close(session) {
        log::warn!("failed to close trial session of {}: {}", module.path().display(), e);
    }

    result
}

/// Reads the API version of a legacy runtime from a session on any adapter.
pub(crate) fn query_api_version(module: &dyn RuntimeModule) -> Result<ApiVersion> {
    let implementation = IMPL_HARDWARE_ANY | via_flag(AccelerationMode::PLATFORM_DEFAULT as u32);
    with_trial_session(module, implementation, |session| module.query_version(session))
}

/// Capabilities synthesized for one adapter of a legacy runtime.
#[derive(Clone, Debug)]
pub(crate) struct LegacyCaps {
    pub description: ImplDescription,
    pub functions: ImplementedFunctions,
}

fn describe(
    adapter: usize,
    version: ApiVersion,
    platform: Platform,
    modes: Vec<u32>,
) -> LegacyCaps {
    let description = ImplDescription {
        version: StructVersion::new(1, 0),
        impl_type: ImplType::Hardware as u32,
        acceleration_mode: AccelerationMode::PLATFORM_DEFAULT as u32,
        api_version: version,
        impl_name: IMPL_NAME.to_string(),
        vendor_id: VENDOR_INTEL,
        device: DeviceDescription {
            version: StructVersion::new(1, 1),
            media_adapter_type: platform.media_adapter_type,
            device_id: format!("{:x}/{}", platform.device_id, adapter),
            ..Default::default()
        },
        acceleration_modes: AccelerationModeDescription {
            version: StructVersion::new(1, 0),
            modes,
        },
        ..Default::default()
    };

    let functions =
        ImplementedFunctions { names: FUNCTIONS.iter().map(|f| f.to_string()).collect() };

    LegacyCaps { description, functions }
}

/// Synthesizes the capabilities of `adapter` by opening a trial session on it.
///
/// With `probe_d3d9`, a second session checks whether D3D9 acceleration is available too. D3D9 only
/// exists on Windows and is never probed elsewhere.
pub(crate) fn query_caps(
    module: &dyn RuntimeModule,
    adapter: usize,
    probe_d3d9: bool,
) -> Result<LegacyCaps> {
    let default_mode = AccelerationMode::PLATFORM_DEFAULT as u32;
    let implementation = adapter_implementation(adapter, default_mode);

    let (version, platform) = with_trial_session(module, implementation, |session| {
        Ok((module.query_version(session)?, module.query_platform(session)?))
    })?;

    let mut modes = vec![default_mode];
    if cfg!(windows) && probe_d3d9 {
        let d3d9 = AccelerationMode::ViaD3d9 as u32;
        if with_trial_session(module, adapter_implementation(adapter, d3d9), |_| Ok(())).is_ok() {
            modes.push(d3d9);
        }
    }

    log::debug!(
        "legacy runtime {} adapter {}: API {}, device {:#x}",
        module.path().display(),
        adapter,
        version,
        platform.device_id
    );

    Ok(describe(adapter, version, platform, modes))
}
