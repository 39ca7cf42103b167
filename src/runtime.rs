// Copyright 2025 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Access to runtime libraries.
//!
//! A runtime library is seen through the [`RuntimeModule`] trait: which entrypoints it exports,
//! the capability descriptions it reports, and the handful of calls needed to open a session on
//! it. [`native`] implements it on top of dynamically loaded libraries; tests use the fake
//! modules of `dummy`.

#[cfg(test)]
pub(crate) mod dummy;
pub mod ffi;
pub mod native;

use std::ffi::c_void;
use std::path::Path;
use std::rc::Rc;

use enumn::N;

use crate::description::ExtendedDeviceId;
use crate::description::ImplDescription;
use crate::description::ImplementedFunctions;
use crate::property::DeviceHandle;
use crate::session::ExtBuffer;
use crate::ApiVersion;
use crate::Result;

/// Entrypoints the dispatcher looks up in a runtime library.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, N)]
#[repr(u8)]
pub enum Export {
    QueryImplsDescription,
    ReleaseImplDescription,
    MemoryGetSurfaceForVpp,
    MemoryGetSurfaceForEncode,
    MemoryGetSurfaceForDecode,
    Initialize,
    MemoryGetSurfaceForVppOut,
    DecodeVppInit,
    DecodeVppDecodeFrameAsync,
    DecodeVppReset,
    DecodeVppGetChannelParam,
    DecodeVppClose,
    VppProcessFrameAsync,
    InitEx,
    Close,
    QueryVersion,
    SetHandle,
    QueryPlatform,
}

impl Export {
    pub const COUNT: usize = Export::QueryPlatform as usize + 1;

    pub fn all() -> impl Iterator<Item = Export> {
        (0..Self::COUNT as u8).filter_map(Export::n)
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Export::QueryImplsDescription => "MFXQueryImplsDescription",
            Export::ReleaseImplDescription => "MFXReleaseImplDescription",
            Export::MemoryGetSurfaceForVpp => "MFXMemory_GetSurfaceForVPP",
            Export::MemoryGetSurfaceForEncode => "MFXMemory_GetSurfaceForEncode",
            Export::MemoryGetSurfaceForDecode => "MFXMemory_GetSurfaceForDecode",
            Export::Initialize => "MFXInitialize",
            Export::MemoryGetSurfaceForVppOut => "MFXMemory_GetSurfaceForVPPOut",
            Export::DecodeVppInit => "MFXVideoDECODE_VPP_Init",
            Export::DecodeVppDecodeFrameAsync => "MFXVideoDECODE_VPP_DecodeFrameAsync",
            Export::DecodeVppReset => "MFXVideoDECODE_VPP_Reset",
            Export::DecodeVppGetChannelParam => "MFXVideoDECODE_VPP_GetChannelParam",
            Export::DecodeVppClose => "MFXVideoDECODE_VPP_Close",
            Export::VppProcessFrameAsync => "MFXVideoVPP_ProcessFrameAsync",
            Export::InitEx => "MFXInitEx",
            Export::Close => "MFXClose",
            Export::QueryVersion => "MFXQueryVersion",
            Export::SetHandle => "MFXVideoCORE_SetHandle",
            Export::QueryPlatform => "MFXVideoCORE_QueryPlatform",
        }
    }

    /// API version from which a 2.x runtime must export this entrypoint, if it is part of the
    /// 2.x entrypoint table.
    pub fn required_since(self) -> Option<ApiVersion> {
        match self {
            Export::QueryImplsDescription
            | Export::ReleaseImplDescription
            | Export::MemoryGetSurfaceForVpp
            | Export::MemoryGetSurfaceForEncode
            | Export::MemoryGetSurfaceForDecode
            | Export::Initialize => Some(ApiVersion::new(2, 0)),
            Export::MemoryGetSurfaceForVppOut
            | Export::DecodeVppInit
            | Export::DecodeVppDecodeFrameAsync
            | Export::DecodeVppReset
            | Export::DecodeVppGetChannelParam
            | Export::DecodeVppClose
            | Export::VppProcessFrameAsync => Some(ApiVersion::new(2, 1)),
            _ => None,
        }
    }
}

/// Entrypoints a legacy 1.x runtime must export to be usable.
pub const LEGACY_EXPORTS: [Export; 2] = [Export::InitEx, Export::Close];

/// Set of entrypoints exported by a module.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct ExportSet(u32);

impl ExportSet {
    pub fn insert(&mut self, export: Export) {
        self.0 |= 1 << export as u32;
    }

    pub fn contains(&self, export: Export) -> bool {
        self.0 & (1 << export as u32) != 0
    }

    pub fn contains_all(&self, exports: &[Export]) -> bool {
        exports.iter().all(|e| self.contains(*e))
    }

    /// Whether the modern initializer is available.
    pub fn is_modern(&self) -> bool {
        self.contains(Export::Initialize)
    }

    /// Returns the first entrypoint a runtime reporting `version` should export but does not.
    pub fn missing_for(&self, version: ApiVersion) -> Option<Export> {
        Export::all().find(|e| {
            e.required_since().is_some_and(|since| since <= version) && !self.contains(*e)
        })
    }
}

impl FromIterator<Export> for ExportSet {
    fn from_iter<I: IntoIterator<Item = Export>>(iter: I) -> Self {
        let mut set = ExportSet::default();
        for export in iter {
            set.insert(export);
        }
        set
    }
}

/// Handle given back to the runtime to release something it reported.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ReleaseToken(pub *mut c_void);

/// Native session handle.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct RawSession(pub *mut c_void);

/// A value reported by a runtime, copied into owned memory, along with the handle needed to
/// release the runtime's own copy.
#[derive(Debug)]
pub struct Reported<T> {
    pub value: T,
    pub token: ReleaseToken,
}

/// Result of a capability query: one entry per implementation, `None` for null entries.
pub type ReportedList<T> = Vec<Option<Reported<T>>>;

/// Parameters of the modern session initializer.
#[derive(Debug)]
pub struct InitParams<'a> {
    pub acceleration_mode: u32,
    pub device_copy: u16,
    pub vendor_impl_id: u32,
    pub ext_buffers: &'a [ExtBuffer],
}

/// Parameters of the legacy session initializer.
#[derive(Debug)]
pub struct LegacyInitParams<'a> {
    /// Legacy implementation flags, i.e. adapter and device API.
    pub implementation: u32,
    pub version: ApiVersion,
    pub ext_buffers: &'a [ExtBuffer],
}

/// Platform information reported by a legacy session.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Platform {
    pub code_name: u16,
    pub device_id: u16,
    pub media_adapter_type: u16,
}

/// A loaded runtime library.
///
/// Methods calling an entrypoint the module does not export fail with `Unsupported`.
pub trait RuntimeModule {
    /// Path the module was loaded from.
    fn path(&self) -> &Path;

    fn exports(&self) -> ExportSet;

    /// Queries the descriptions of all implementations. `None` if the runtime returned no list.
    fn query_descriptions(&self) -> Option<ReportedList<ImplDescription>>;

    /// Queries the implemented functions of all implementations. `None` if the runtime does not
    /// support this query.
    fn query_implemented_functions(&self) -> Option<ReportedList<ImplementedFunctions>>;

    /// Queries the extended device identity of all implementations. `None` if the runtime does
    /// not support this query.
    fn query_extended_device_ids(&self) -> Option<ReportedList<ExtendedDeviceId>>;

    /// Releases something previously reported by one of the query methods.
    fn release(&self, token: ReleaseToken) -> Result<()>;

    fn initialize(&self, params: &InitParams) -> Result<RawSession>;

    fn init_legacy(&self, params: &LegacyInitParams) -> Result<RawSession>;

    fn query_version(&self, session: RawSession) -> Result<ApiVersion>;

    fn query_platform(&self, session: RawSession) -> Result<Platform>;

    fn set_handle(&self, session: RawSession, handle_type: u32, handle: DeviceHandle)
        -> Result<()>;

    fn close(&self, session: RawSession) -> Result<()>;
}

/// Opens runtime libraries.
pub trait ModuleOpener {
    /// Opens the library at `path`. Bare file names are resolved by the system loader.
    fn open(&self, path: &Path) -> anyhow::Result<Rc<dyn RuntimeModule>>;
}
