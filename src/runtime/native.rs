// Copyright 2025 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Runtime libraries loaded from disk with `libloading`.

use std::ffi::c_void;
use std::path::Path;
use std::path::PathBuf;
use std::ptr;
use std::rc::Rc;

use anyhow::Context;
use libloading::Library;

use super::ffi;
use super::Export;
use super::ExportSet;
use super::InitParams;
use super::LegacyInitParams;
use super::ModuleOpener;
use super::Platform;
use super::RawSession;
use super::ReleaseToken;
use super::Reported;
use super::ReportedList;
use super::RuntimeModule;
use crate::description::ExtendedDeviceId;
use crate::description::ImplDescription;
use crate::description::ImplementedFunctions;
use crate::property::DeviceHandle;
use crate::session::ExtBuffer;
use crate::ApiVersion;
use crate::Error;
use crate::Result;
use crate::Status;

/// Looks up `export` in `library`.
///
/// # Safety
///
/// `T` must be the function pointer type matching the C prototype of `export`.
unsafe fn lookup<T: Copy>(library: &Library, export: Export) -> Option<T> {
    library.get::<T>(export.symbol().as_bytes()).ok().map(|symbol| *symbol)
}

fn ext_buffer_pointers(buffers: &[ExtBuffer]) -> Vec<*mut c_void> {
    buffers.iter().map(|b| b.as_ptr() as *mut c_void).collect()
}

/// A runtime library opened with the system's dynamic loader.
pub struct NativeModule {
    path: PathBuf,
    exports: ExportSet,
    query_impls_description: Option<ffi::QueryImplsDescriptionFn>,
    release_impl_description: Option<ffi::ReleaseImplDescriptionFn>,
    initialize: Option<ffi::InitializeFn>,
    init_ex: Option<ffi::InitExFn>,
    close: Option<ffi::CloseFn>,
    query_version: Option<ffi::QueryVersionFn>,
    set_handle: Option<ffi::SetHandleFn>,
    query_platform: Option<ffi::QueryPlatformFn>,
    // Must stay loaded for as long as the function pointers above may be called.
    _library: Library,
}

impl NativeModule {
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        // SAFETY: runtime libraries are regular shared libraries whose initializers have no
        // preconditions.
        let library = unsafe { Library::new(path) }
            .with_context(|| format!("failed to load {}", path.display()))?;

        let exports: ExportSet = Export::all()
            // SAFETY: only the presence of the symbol is checked.
            .filter(|e| unsafe { lookup::<*const c_void>(&library, *e) }.is_some())
            .collect();

        // SAFETY: each pointer type below matches the prototype of the corresponding entrypoint.
        let module = unsafe {
            Self {
                path: path.to_path_buf(),
                exports,
                query_impls_description: lookup(&library, Export::QueryImplsDescription),
                release_impl_description: lookup(&library, Export::ReleaseImplDescription),
                initialize: lookup(&library, Export::Initialize),
                init_ex: lookup(&library, Export::InitEx),
                close: lookup(&library, Export::Close),
                query_version: lookup(&library, Export::QueryVersion),
                set_handle: lookup(&library, Export::SetHandle),
                query_platform: lookup(&library, Export::QueryPlatform),
                _library: library,
            }
        };

        log::debug!("loaded {} with exports {:?}", path.display(), module.exports);

        Ok(module)
    }

    /// Runs one capability query and copies each reported entry with `copy`.
    fn query<C, T>(&self, format: u32, copy: unsafe fn(*const C) -> T) -> Option<ReportedList<T>> {
        let query = self.query_impls_description?;

        let mut count = 0u32;
        // SAFETY: `count` is a valid output location.
        let list = unsafe { query(format, &mut count) };
        if list.is_null() {
            return None;
        }

        // SAFETY: the runtime returns an array of `count` handles, which stays valid until each
        // handle is released.
        let handles = unsafe { std::slice::from_raw_parts(list, count as usize) };

        let reported = handles
            .iter()
            .map(|handle| {
                if handle.is_null() {
                    return None;
                }
                Some(Reported {
                    // SAFETY: a non-null handle of this format points to a structure of type `C`.
                    value: unsafe { copy(*handle as *const C) },
                    token: ReleaseToken(*handle),
                })
            })
            .collect();

        Some(reported)
    }
}

impl RuntimeModule for NativeModule {
    fn path(&self) -> &Path {
        &self.path
    }

    fn exports(&self) -> ExportSet {
        self.exports
    }

    fn query_descriptions(&self) -> Option<ReportedList<ImplDescription>> {
        self.query(ffi::IMPLCAPS_IMPLDESCSTRUCTURE, ffi::copy_impl_description)
    }

    fn query_implemented_functions(&self) -> Option<ReportedList<ImplementedFunctions>> {
        self.query(ffi::IMPLCAPS_IMPLEMENTEDFUNCTIONS, ffi::copy_implemented_functions)
    }

    fn query_extended_device_ids(&self) -> Option<ReportedList<ExtendedDeviceId>> {
        self.query(ffi::IMPLCAPS_DEVICE_ID_EXTENDED, ffi::copy_extended_device_id)
    }

    fn release(&self, token: ReleaseToken) -> Result<()> {
        let release = self.release_impl_description.ok_or(Error::Unsupported)?;
        // SAFETY: the token was handed out by this module's query and has not been released yet.
        Status(unsafe { release(token.0) }).check()
    }

    fn initialize(&self, params: &InitParams) -> Result<RawSession> {
        let initialize = self.initialize.ok_or(Error::Unsupported)?;

        let mut buffers = ext_buffer_pointers(params.ext_buffers);
        let par = ffi::mfxInitializationParam {
            acceleration_mode: params.acceleration_mode,
            device_copy: params.device_copy,
            reserved: [0; 2],
            num_ext_param: buffers.len() as u16,
            ext_param: if buffers.is_empty() { ptr::null_mut() } else { buffers.as_mut_ptr() },
            vendor_impl_id: params.vendor_impl_id,
            reserved2: [0; 3],
        };

        let mut session = ptr::null_mut();
        // SAFETY: the extension buffers outlive the call and `session` is a valid output location.
        Status(unsafe { initialize(par, &mut session) }).check()?;

        Ok(RawSession(session))
    }

    fn init_legacy(&self, params: &LegacyInitParams) -> Result<RawSession> {
        let init_ex = self.init_ex.ok_or(Error::Unsupported)?;

        let mut buffers = ext_buffer_pointers(params.ext_buffers);
        let par = ffi::mfxInitParam {
            implementation: params.implementation as i32,
            version: ffi::mfxVersion { major: params.version.major, minor: params.version.minor },
            external_threads: 0,
            ext: ffi::mfxInitExtParams {
                ext_param: if buffers.is_empty() { ptr::null_mut() } else { buffers.as_mut_ptr() },
                num_ext_param: buffers.len() as u16,
            },
            gpu_copy: 0,
            reserved: [0; 21],
        };

        let mut session = ptr::null_mut();
        // SAFETY: the extension buffers outlive the call and `session` is a valid output location.
        Status(unsafe { init_ex(par, &mut session) }).check()?;

        Ok(RawSession(session))
    }

    fn query_version(&self, session: RawSession) -> Result<ApiVersion> {
        let query_version = self.query_version.ok_or(Error::Unsupported)?;

        let mut version = ffi::mfxVersion::default();
        // SAFETY: `session` was opened by this module and `version` is a valid output location.
        Status(unsafe { query_version(session.0, &mut version) }).check()?;

        Ok(ApiVersion::new(version.major, version.minor))
    }

    fn query_platform(&self, session: RawSession) -> Result<Platform> {
        let query_platform = self.query_platform.ok_or(Error::Unsupported)?;

        let mut platform = ffi::mfxPlatform::default();
        // SAFETY: `session` was opened by this module and `platform` is a valid output location.
        Status(unsafe { query_platform(session.0, &mut platform) }).check()?;

        Ok(Platform {
            code_name: platform.code_name,
            device_id: platform.device_id,
            media_adapter_type: platform.media_adapter_type,
        })
    }

    fn set_handle(
        &self,
        session: RawSession,
        handle_type: u32,
        handle: DeviceHandle,
    ) -> Result<()> {
        let set_handle = self.set_handle.ok_or(Error::Unsupported)?;
        // SAFETY: `session` was opened by this module. The handle is passed through untouched.
        Status(unsafe { set_handle(session.0, handle_type, handle.0) }).check()
    }

    fn close(&self, session: RawSession) -> Result<()> {
        let close = self.close.ok_or(Error::Unsupported)?;
        // SAFETY: `session` was opened by this module and is not used after this call.
        Status(unsafe { close(session.0) }).check()
    }
}

/// Opens runtime libraries with the system's dynamic loader.
#[derive(Debug, Default)]
pub struct NativeOpener;

impl ModuleOpener for NativeOpener {
    fn open(&self, path: &Path) -> anyhow::Result<Rc<dyn RuntimeModule>> {
        Ok(Rc::new(NativeModule::open(path)?))
    }
}
