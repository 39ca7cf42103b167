// Copyright 2025 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Fake runtime modules for testing the dispatcher without real runtime libraries.

use std::cell::Cell;
use std::cell::RefCell;
use std::collections::HashMap;
use std::ffi::c_void;
use std::path::Path;
use std::path::PathBuf;
use std::rc::Rc;

use anyhow::anyhow;

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
use super::LEGACY_EXPORTS;
use crate::description::ExtendedDeviceId;
use crate::description::ImplDescription;
use crate::description::ImplementedFunctions;
use crate::description::VENDOR_INTEL;
use crate::discovery::Locator;
use crate::discovery::SearchLocation;
use crate::legacy;
use crate::property::DeviceHandle;
use crate::ApiVersion;
use crate::Error;
use crate::Result;

/// Session initialization observed by a fake module.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum InitCall {
    Modern {
        acceleration_mode: u32,
        device_copy: u16,
        vendor_impl_id: u32,
        ext_buffer_ids: Vec<u32>,
    },
    Legacy {
        implementation: u32,
        version: ApiVersion,
        ext_buffer_ids: Vec<u32>,
    },
}

/// Calls received by a fake module.
#[derive(Debug, Default)]
pub(crate) struct Calls {
    pub query_descriptions: Cell<usize>,
    pub query_functions: Cell<usize>,
    pub query_extended_ids: Cell<usize>,
    pub released: RefCell<Vec<ReleaseToken>>,
    pub inits: RefCell<Vec<InitCall>>,
    pub set_handle: RefCell<Vec<(u32, DeviceHandle)>>,
    pub closed: Cell<usize>,
}

impl Calls {
    pub fn queries(&self) -> usize {
        self.query_descriptions.get() + self.query_functions.get() + self.query_extended_ids.get()
    }
}

/// Builds a distinct non-null pointer value for tokens and sessions.
fn fake_pointer(value: usize) -> *mut c_void {
    (0x1000 + value * 0x10) as *mut c_void
}

pub(crate) struct FakeModule {
    pub path: PathBuf,
    pub exports: ExportSet,
    /// `None` makes the description query return no list.
    pub descriptions: Option<Vec<Option<ImplDescription>>>,
    pub functions: Option<Vec<Option<ImplementedFunctions>>>,
    pub extended_ids: Option<Vec<Option<ExtendedDeviceId>>>,
    /// Version reported by sessions of this module.
    pub session_version: ApiVersion,
    /// Number of adapters a legacy module can open sessions on.
    pub legacy_adapters: usize,
    /// Device ID reported by legacy sessions.
    pub legacy_device_id: u16,
    pub fail_initialize: bool,
    pub fail_set_handle: bool,
    pub calls: Rc<Calls>,
    next_pointer: Cell<usize>,
}

impl FakeModule {
    /// A 2.x runtime exporting the full 2.1 entrypoint table.
    pub fn modern(path: impl Into<PathBuf>, descriptions: Vec<ImplDescription>) -> Self {
        let exports = Export::all()
            .filter(|e| e.required_since().is_some())
            .chain([Export::Close, Export::QueryVersion, Export::SetHandle])
            .collect();

        Self {
            path: path.into(),
            exports,
            descriptions: Some(descriptions.into_iter().map(Some).collect()),
            functions: None,
            extended_ids: None,
            session_version: ApiVersion::new(2, 9),
            legacy_adapters: 0,
            legacy_device_id: 0,
            fail_initialize: false,
            fail_set_handle: false,
            calls: Default::default(),
            next_pointer: Cell::new(1),
        }
    }

    /// A 1.x runtime driving `adapters` adapters.
    pub fn legacy(path: impl Into<PathBuf>, version: ApiVersion, adapters: usize) -> Self {
        let exports = LEGACY_EXPORTS
            .into_iter()
            .chain([Export::QueryVersion, Export::SetHandle, Export::QueryPlatform])
            .collect();

        Self {
            path: path.into(),
            exports,
            descriptions: None,
            functions: None,
            extended_ids: None,
            session_version: version,
            legacy_adapters: adapters,
            legacy_device_id: 0x9a49,
            fail_initialize: false,
            fail_set_handle: false,
            calls: Default::default(),
            next_pointer: Cell::new(1),
        }
    }

    fn next_pointer(&self) -> *mut c_void {
        let value = self.next_pointer.get();
        self.next_pointer.set(value + 1);
        fake_pointer(value)
    }

    fn report<T: Clone>(&self, list: &Option<Vec<Option<T>>>) -> Option<ReportedList<T>> {
        let list = list.as_ref()?;
        Some(
            list.iter()
                .map(|entry| {
                    entry.as_ref().map(|value| Reported {
                        value: value.clone(),
                        token: ReleaseToken(self.next_pointer()),
                    })
                })
                .collect(),
        )
    }

    fn require(&self, export: Export) -> Result<()> {
        if self.exports.contains(export) {
            Ok(())
        } else {
            Err(Error::Unsupported)
        }
    }
}

impl RuntimeModule for FakeModule {
    fn path(&self) -> &Path {
        &self.path
    }

    fn exports(&self) -> ExportSet {
        self.exports
    }

    fn query_descriptions(&self) -> Option<ReportedList<ImplDescription>> {
        self.calls.query_descriptions.set(self.calls.query_descriptions.get() + 1);
        self.report(&self.descriptions)
    }

    fn query_implemented_functions(&self) -> Option<ReportedList<ImplementedFunctions>> {
        self.calls.query_functions.set(self.calls.query_functions.get() + 1);
        self.report(&self.functions)
    }

    fn query_extended_device_ids(&self) -> Option<ReportedList<ExtendedDeviceId>> {
        self.calls.query_extended_ids.set(self.calls.query_extended_ids.get() + 1);
        self.report(&self.extended_ids)
    }

    fn release(&self, token: ReleaseToken) -> Result<()> {
        self.require(Export::ReleaseImplDescription)?;
        self.calls.released.borrow_mut().push(token);
        Ok(())
    }

    fn initialize(&self, params: &InitParams) -> Result<RawSession> {
        self.require(Export::Initialize)?;
        self.calls.inits.borrow_mut().push(InitCall::Modern {
            acceleration_mode: params.acceleration_mode,
            device_copy: params.device_copy,
            vendor_impl_id: params.vendor_impl_id,
            ext_buffer_ids: params.ext_buffers.iter().map(|b| b.id()).collect(),
        });

        if self.fail_initialize {
            return Err(Error::Unsupported);
        }
        Ok(RawSession(self.next_pointer()))
    }

    fn init_legacy(&self, params: &LegacyInitParams) -> Result<RawSession> {
        self.require(Export::InitEx)?;
        self.calls.inits.borrow_mut().push(InitCall::Legacy {
            implementation: params.implementation,
            version: params.version,
            ext_buffer_ids: params.ext_buffers.iter().map(|b| b.id()).collect(),
        });

        let adapter = params.implementation & 0xff;
        let supported = adapter == legacy::IMPL_HARDWARE_ANY
            || legacy::ADAPTER_IMPLEMENTATIONS[..self.legacy_adapters.min(legacy::MAX_ADAPTERS)]
                .contains(&adapter);
        if self.fail_initialize || !supported {
            return Err(Error::Unsupported);
        }
        Ok(RawSession(self.next_pointer()))
    }

    fn query_version(&self, _session: RawSession) -> Result<ApiVersion> {
        self.require(Export::QueryVersion)?;
        Ok(self.session_version)
    }

    fn query_platform(&self, _session: RawSession) -> Result<Platform> {
        self.require(Export::QueryPlatform)?;
        Ok(Platform { code_name: 0x2b, device_id: self.legacy_device_id, media_adapter_type: 1 })
    }

    fn set_handle(
        &self,
        _session: RawSession,
        handle_type: u32,
        handle: DeviceHandle,
    ) -> Result<()> {
        self.require(Export::SetHandle)?;
        self.calls.set_handle.borrow_mut().push((handle_type, handle));
        if self.fail_set_handle {
            return Err(Error::Unsupported);
        }
        Ok(())
    }

    fn close(&self, _session: RawSession) -> Result<()> {
        self.require(Export::Close)?;
        self.calls.closed.set(self.calls.closed.get() + 1);
        Ok(())
    }
}

/// Opens fake modules registered by path.
#[derive(Default)]
pub(crate) struct FakeOpener {
    modules: HashMap<PathBuf, Rc<FakeModule>>,
    pub opened: Rc<RefCell<Vec<PathBuf>>>,
}

impl FakeOpener {
    /// Registers `module` under its path and returns its call record.
    pub fn add(&mut self, module: FakeModule) -> Rc<Calls> {
        let calls = module.calls.clone();
        self.modules.insert(module.path.clone(), Rc::new(module));
        calls
    }
}

impl ModuleOpener for FakeOpener {
    fn open(&self, path: &Path) -> anyhow::Result<Rc<dyn RuntimeModule>> {
        self.opened.borrow_mut().push(path.to_path_buf());
        let module = self
            .modules
            .get(path)
            .ok_or_else(|| anyhow!("no fake module at {}", path.display()))?;
        Ok(module.clone())
    }
}

/// Locator returning fixed file lists.
#[derive(Default)]
pub(crate) struct FakeLocator {
    pub locations: HashMap<SearchLocation, Vec<PathBuf>>,
    pub fast_path: Vec<PathBuf>,
}

impl FakeLocator {
    pub fn with(mut self, location: SearchLocation, path: impl Into<PathBuf>) -> Self {
        self.locations.entry(location).or_default().push(path.into());
        self
    }
}

impl Locator for FakeLocator {
    fn list(&self, location: SearchLocation) -> Vec<PathBuf> {
        self.locations.get(&location).cloned().unwrap_or_default()
    }

    fn fast_path(&self) -> Vec<PathBuf> {
        self.fast_path.clone()
    }
}

/// A hardware implementation description as reported by a GPU runtime.
pub(crate) fn hw_description(name: &str, api: ApiVersion, device_id: &str) -> ImplDescription {
    let mut desc = ImplDescription {
        impl_type: 2,
        acceleration_mode: crate::description::AccelerationMode::PLATFORM_DEFAULT as u32,
        api_version: api,
        impl_name: name.to_string(),
        license: "MIT".to_string(),
        keywords: "GPU,HW".to_string(),
        vendor_id: VENDOR_INTEL,
        ..Default::default()
    };
    desc.device.device_id = device_id.to_string();
    desc.acceleration_modes.modes = vec![desc.acceleration_mode];
    desc
}

/// A software implementation description.
pub(crate) fn sw_description(name: &str, api: ApiVersion) -> ImplDescription {
    ImplDescription {
        impl_type: 1,
        api_version: api,
        impl_name: name.to_string(),
        license: "MIT".to_string(),
        keywords: "CPU".to_string(),
        ..Default::default()
    }
}
