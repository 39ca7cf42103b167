// Copyright 2025 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! The loader: the entry point of the dispatcher.
//!
//! A [`Loader`] owns the filters set by the user and the runtime libraries it loaded. Libraries
//! are only discovered and queried when an implementation is first enumerated, or when a session
//! is created. A session request whose filters only name the Intel GPU runtime takes the
//! low-latency path instead, which loads that runtime alone without querying it.

pub mod library;
pub(crate) mod registry;

use std::path::PathBuf;
use std::rc::Rc;

use enumn::N;

use crate::config::ConfigFilter;
use crate::config::SpecialConfig;
use crate::description::ExtendedDeviceId;
use crate::description::ImplDescription;
use crate::description::ImplementedFunctions;
use crate::discovery;
use crate::discovery::Locator;
use crate::discovery::SystemLocator;
use crate::dispatch_log::dispatch_msg;
use crate::dispatch_log::DispatchLog;
use crate::env::Environment;
use crate::lowlatency;
use crate::property::Variant;
use crate::runtime::native::NativeOpener;
use crate::runtime::ModuleOpener;
use crate::session;
use crate::session::Session;
use crate::Error;
use crate::Result;
use library::CandidateLibrary;
use registry::Caps;
use registry::Registry;

/// Identifies a filter created with [`Loader::new_filter`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct FilterId(usize);

/// Kind of capability data requested from [`Loader::enumerate_implementation`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, N)]
#[repr(u32)]
pub enum CapsFormat {
    Description = 1,
    ImplementedFunctions = 2,
    /// Path of the library providing the implementation.
    Path = 3,
    ExtendedDeviceId = 4,
}

/// Capability data of an implementation.
///
/// The data stays valid for as long as the caller holds it, even after it has been released.
#[derive(Clone, Debug)]
pub enum ImplCaps {
    Description(Rc<ImplDescription>),
    ImplementedFunctions(Rc<ImplementedFunctions>),
    Path(Rc<PathBuf>),
    ExtendedDeviceId(Rc<ExtendedDeviceId>),
}

impl ImplCaps {
    pub fn format(&self) -> CapsFormat {
        match self {
            ImplCaps::Description(_) => CapsFormat::Description,
            ImplCaps::ImplementedFunctions(_) => CapsFormat::ImplementedFunctions,
            ImplCaps::Path(_) => CapsFormat::Path,
            ImplCaps::ExtendedDeviceId(_) => CapsFormat::ExtendedDeviceId,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Mode {
    /// Nothing loaded yet.
    Unloaded,
    /// Every library was discovered and queried.
    Full,
    /// A single library was loaded through the low-latency path.
    LowLatency,
}

pub struct Loader {
    locator: Box<dyn Locator>,
    opener: Box<dyn ModuleOpener>,
    filters: Vec<ConfigFilter>,
    mode: Mode,
    registry: Registry,
    /// Whether the registry must be validated against the filters again.
    needs_update: bool,
    release_on_demand: bool,
    log: Rc<DispatchLog>,
}

impl Default for Loader {
    fn default() -> Self {
        Self::new()
    }
}

impl Loader {
    /// Creates a loader searching the locations given by the environment of the process.
    pub fn new() -> Self {
        Self::with_environment(Environment::from_process())
    }

    pub fn with_environment(env: Environment) -> Self {
        let log = DispatchLog::from_env(&env);
        let mut loader =
            Self::with_parts(Box::new(SystemLocator::new(env)), Box::new(NativeOpener));
        loader.log = Rc::new(log);
        loader
    }

    /// Creates a loader finding libraries with `locator` and loading them with `opener`.
    pub fn with_parts(locator: Box<dyn Locator>, opener: Box<dyn ModuleOpener>) -> Self {
        Self {
            locator,
            opener,
            filters: Vec::new(),
            mode: Mode::Unloaded,
            registry: Registry::default(),
            needs_update: true,
            release_on_demand: false,
            log: Rc::new(DispatchLog::disabled()),
        }
    }

    /// Adds an empty filter. Implementations must match every filter with at least one property
    /// set.
    pub fn new_filter(&mut self) -> FilterId {
        let _scope = self.log.scope("new_filter");
        self.filters.push(ConfigFilter::new());
        FilterId(self.filters.len() - 1)
    }

    pub fn filter(&self, id: FilterId) -> Option<&ConfigFilter> {
        self.filters.get(id.0)
    }

    /// Sets property `name` of filter `id` to `value`.
    ///
    /// Fails with `InvalidHandle` if `id` does not belong to this loader, `NotFound` if `name` is
    /// unknown and `Unsupported` if `value` has the wrong type.
    pub fn set_filter_property(&mut self, id: FilterId, name: &str, value: Variant) -> Result<()> {
        let log = self.log.clone();
        let _scope = log.scope("set_filter_property");

        let filter = self.filters.get_mut(id.0).ok_or(Error::InvalidHandle)?;
        let prop = filter.set_property(name, value)?;
        dispatch_msg!(log, "filter {} property {} set ({:?})", id.0, name, prop);
        self.needs_update = true;

        Ok(())
    }

    /// Whether released capability data is handed back to its runtime right away, instead of when
    /// the loader is dropped.
    pub fn set_release_on_demand(&mut self, release_on_demand: bool) {
        self.release_on_demand = release_on_demand;
    }

    fn special_config(&self) -> SpecialConfig {
        SpecialConfig::collect(&self.filters)
    }

    /// Makes sure every library is loaded and queried, and the implementations validated against
    /// the current filters.
    fn load_all(&mut self) {
        let special = self.special_config();

        if self.mode != Mode::Full {
            // Unload whatever the low-latency path loaded before starting over.
            self.registry = Registry::default();

            let candidates = discovery::discover(self.locator.as_ref());
            dispatch_msg!(self.log, "found {} candidate libraries", candidates.len());
            let libraries = library::load_candidates(&candidates, self.opener.as_ref());
            self.registry = Registry::query(&libraries, &special);
            if self.registry.is_empty() {
                log::warn!("no runtime implementation found");
            }
            self.mode = Mode::Full;
            self.needs_update = true;
        }

        if self.needs_update {
            self.registry.update(&self.filters, &special);
            self.needs_update = false;
            dispatch_msg!(self.log, "{} valid implementations", self.registry.valid_count());
        }
    }

    /// Returns capability data of the valid implementation at `index`.
    ///
    /// Indexes are dense and follow the ranking of the implementations. Fails with `NotFound` past
    /// the last valid implementation, and with `Unsupported` if the implementation has no data of
    /// the requested `format`.
    pub fn enumerate_implementation(
        &mut self,
        index: usize,
        format: CapsFormat,
    ) -> Result<ImplCaps> {
        let log = self.log.clone();
        let _scope = log.scope("enumerate_implementation");

        self.load_all();

        let implementation = self.registry.get(index).ok_or(Error::NotFound)?;
        let caps = match format {
            CapsFormat::Description => {
                implementation.description.as_ref().map(|c| ImplCaps::Description(c.value.clone()))
            }
            CapsFormat::ImplementedFunctions => implementation
                .functions
                .as_ref()
                .map(|c| ImplCaps::ImplementedFunctions(c.value.clone())),
            CapsFormat::Path => Some(ImplCaps::Path(implementation.path.clone())),
            CapsFormat::ExtendedDeviceId => implementation
                .extended_device_id
                .as_ref()
                .map(|c| ImplCaps::ExtendedDeviceId(c.value.clone())),
        };

        caps.ok_or(Error::Unsupported)
    }

    /// Releases capability data returned by [`Loader::enumerate_implementation`].
    ///
    /// Unless [`Loader::set_release_on_demand`] was enabled, the runtime's copy is kept until the
    /// loader is dropped and this only checks that `caps` belongs to this loader.
    pub fn release_implementation_description(&mut self, caps: &ImplCaps) -> Result<()> {
        let log = self.log.clone();
        let _scope = log.scope("release_implementation_description");

        let release_on_demand = self.release_on_demand;
        for implementation in self.registry.iter_mut() {
            let library = &implementation.library;
            let found = match caps {
                ImplCaps::Description(value) => {
                    find_caps(&mut implementation.description, value)
                        .map(|c| release_caps(library, release_on_demand, c))
                }
                ImplCaps::ImplementedFunctions(value) => {
                    find_caps(&mut implementation.functions, value)
                        .map(|c| release_caps(library, release_on_demand, c))
                }
                ImplCaps::ExtendedDeviceId(value) => {
                    find_caps(&mut implementation.extended_device_id, value)
                        .map(|c| release_caps(library, release_on_demand, c))
                }
                ImplCaps::Path(value) => {
                    if Rc::ptr_eq(&implementation.path, value) {
                        return Ok(());
                    }
                    continue;
                }
            };

            if let Some(result) = found {
                return result;
            }
        }

        Err(Error::InvalidHandle)
    }

    /// Opens a session on the valid implementation at `index`.
    ///
    /// If no library has been loaded yet and the filters form a low-latency request, only the
    /// Intel GPU runtime is loaded and the loader stays in that mode until the next enumeration.
    /// The request then fails with `NotFound` if that runtime cannot be loaded or implements an
    /// older API than requested.
    pub fn create_session(&mut self, index: usize) -> Result<Session> {
        let log = self.log.clone();
        let _scope = log.scope("create_session");

        if self.mode == Mode::Unloaded {
            if let Some(special) = lowlatency::signature(&self.filters) {
                dispatch_msg!(log, "low-latency mode requested");
                let (library, version) =
                    lowlatency::load(self.locator.as_ref(), self.opener.as_ref(), &special)?;
                self.registry = Registry::low_latency(&library, version);
                self.mode = Mode::LowLatency;
            }
        }

        if self.mode != Mode::LowLatency {
            self.load_all();
        }

        let special = self.special_config();
        let implementation = self.registry.get(index).ok_or(Error::NotFound)?;

        if self.mode == Mode::LowLatency {
            if let Some(required) = special.api_version {
                if implementation.api_version < required {
                    dispatch_msg!(
                        log,
                        "API {} requested but {} implements {}",
                        required,
                        implementation.path.display(),
                        implementation.api_version
                    );
                    return Err(Error::NotFound);
                }
            }
        }

        session::bind(
            implementation.library.module.clone(),
            implementation.initializer(&special),
            &special,
            &log,
        )
    }
}

/// Returns the capability data in `caps` if it holds `value`.
fn release_caps<T>(
    library: &CandidateLibrary,
    release_on_demand: bool,
    caps: &mut Caps<T>,
) -> Result<()> {
    if !release_on_demand {
        return Ok(());
    }
    registry::release(library, caps)
}

fn find_caps<'a, T>(caps: &'a mut Option<Caps<T>>, value: &Rc<T>) -> Option<&'a mut Caps<T>> {
    caps.as_mut().filter(|c| Rc::ptr_eq(&c.value, value))
}
