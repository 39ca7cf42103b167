// Copyright 2025 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! The implementations offered by the loaded libraries, and which of them are valid.

use std::path::PathBuf;
use std::rc::Rc;

use crate::config::ConfigFilter;
use crate::config::SpecialConfig;
use crate::description::AccelerationMode;
use crate::description::ExtendedDeviceId;
use crate::description::ImplDescription;
use crate::description::ImplementedFunctions;
use crate::description::VENDOR_INTEL;
use crate::legacy;
use crate::loader::library::CandidateLibrary;
use crate::loader::library::LibraryKind;
use crate::matching;
use crate::matching::Offer;
use crate::priority;
use crate::priority::Rank;
use crate::runtime::ReleaseToken;
use crate::runtime::Reported;
use crate::session::Initializer;
use crate::ApiVersion;
use crate::Result;

/// Capability data of an implementation, possibly still owned by its runtime.
pub(crate) struct Caps<T> {
    pub value: Rc<T>,
    /// Set while the runtime's copy has not been released.
    pub token: Option<ReleaseToken>,
}

impl<T> Caps<T> {
    /// Data the runtime has no copy of.
    fn owned(value: T) -> Self {
        Self { value: Rc::new(value), token: None }
    }

    fn reported(reported: Reported<T>) -> Self {
        Self { value: Rc::new(reported.value), token: Some(reported.token) }
    }
}

pub(crate) struct Implementation {
    pub library: Rc<CandidateLibrary>,
    /// Absent for implementations loaded through the low-latency path.
    pub description: Option<Caps<ImplDescription>>,
    pub functions: Option<Caps<ImplementedFunctions>>,
    pub extended_device_id: Option<Caps<ExtendedDeviceId>>,
    pub path: Rc<PathBuf>,
    /// Index of the implementation within its library, i.e. the adapter for legacy runtimes.
    pub library_index: usize,
    pub api_version: ApiVersion,
    /// Adapter index parsed from the device ID of Intel GPUs.
    pub adapter_index: Option<u32>,
    /// Excluded regardless of the filters.
    pub excluded: bool,
    /// Position among the valid implementations, if valid.
    pub valid_index: Option<usize>,
}

impl Implementation {
    fn new(library: &Rc<CandidateLibrary>, library_index: usize, api_version: ApiVersion) -> Self {
        Self {
            library: library.clone(),
            description: None,
            functions: None,
            extended_device_id: None,
            path: Rc::new(library.path.clone()),
            library_index,
            api_version,
            adapter_index: None,
            excluded: false,
            valid_index: None,
        }
    }

    pub fn description(&self) -> Option<&ImplDescription> {
        self.description.as_ref().map(|c| c.value.as_ref())
    }

    fn offer(&self) -> Option<Offer<'_>> {
        Some(Offer {
            description: self.description()?,
            functions: self.functions.as_ref().map(|c| c.value.as_ref()),
            extended_device_id: self.extended_device_id.as_ref().map(|c| c.value.as_ref()),
            legacy: self.library.is_legacy(),
            adapter_index: self.adapter_index,
        })
    }

    /// Releases the runtime's copies of the capability data.
    fn release_all(&mut self) {
        let tokens = [
            self.description.as_mut().and_then(|c| c.token.take()),
            self.functions.as_mut().and_then(|c| c.token.take()),
            self.extended_device_id.as_mut().and_then(|c| c.token.take()),
        ];

        for token in tokens.into_iter().flatten() {
            if let Err(e) = self.library.module.release(token) {
                log::warn!("failed to release capabilities of {}: {}", self.path.display(), e);
            }
        }
    }

    /// Parameters for opening a session on this implementation.
    ///
    /// In low-latency mode there is no description: the acceleration mode and the adapter come
    /// from the session parameters only.
    pub fn initializer(&self, special: &SpecialConfig) -> Initializer {
        let default_mode = self
            .description()
            .map_or(AccelerationMode::NotApplicable as u32, |d| d.acceleration_mode);
        let acceleration_mode = special.acceleration_mode.unwrap_or(default_mode);

        match self.library.kind {
            LibraryKind::Modern => {
                let vendor_impl_id = match self.description() {
                    Some(desc) => desc.vendor_impl_id,
                    None => special.adapter_index.unwrap_or(0),
                };
                Initializer::Modern {
                    acceleration_mode,
                    device_copy: special.device_copy.unwrap_or(0),
                    vendor_impl_id,
                }
            }
            LibraryKind::Legacy { .. } => {
                let adapter = match self.description() {
                    Some(_) => self.library_index,
                    None => special.adapter_index.unwrap_or(0) as usize,
                };
                Initializer::Legacy {
                    implementation: legacy::adapter_implementation(adapter, acceleration_mode),
                    version: self.api_version,
                }
            }
        }
    }
}

impl Drop for Implementation {
    fn drop(&mut self) {
        self.release_all();
    }
}

impl Rank for Implementation {
    fn priority(&self) -> u32 {
        self.library.priority
    }

    fn api_version(&self) -> ApiVersion {
        self.api_version
    }

    fn acceleration_mode(&self) -> u32 {
        self.description().map_or(0, |d| d.acceleration_mode)
    }

    fn impl_type(&self) -> u32 {
        self.description().map_or(0, |d| d.impl_type)
    }
}

fn query_modern(library: &Rc<CandidateLibrary>) -> Vec<Implementation> {
    let module = &library.module;

    let descriptions = match module.query_descriptions() {
        Some(list) if list.iter().all(Option::is_some) => list,
        _ => {
            log::debug!("dropping {}: invalid implementation descriptions", library.path.display());
            return Vec::new();
        }
    };

    let mut functions = module.query_implemented_functions().unwrap_or_default().into_iter();
    let mut extended_ids = if cfg!(feature = "experimental") {
        module.query_extended_device_ids().unwrap_or_default().into_iter()
    } else {
        Vec::new().into_iter()
    };

    let mut implementations = Vec::new();
    for (index, description) in descriptions.into_iter().flatten().enumerate() {
        let mut implementation =
            Implementation::new(library, index, description.value.api_version);
        implementation.description = Some(Caps::reported(description));
        implementation.functions = functions.next().flatten().map(Caps::reported);
        implementation.extended_device_id = extended_ids.next().flatten().map(Caps::reported);

        // Dropping the implementation releases what was reported for it.
        if let Some(missing) = library.exports().missing_for(implementation.api_version) {
            log::debug!(
                "dropping implementation {} of {}: API {} requires {}",
                index,
                library.path.display(),
                implementation.api_version,
                missing.symbol()
            );
            continue;
        }

        implementations.push(implementation);
    }

    implementations
}

fn query_legacy(library: &Rc<CandidateLibrary>, special: &SpecialConfig) -> Vec<Implementation> {
    // Opening a D3D9 session is only worth it if D3D9 may be requested.
    let probe_d3d9 = special.acceleration_mode.map_or(true, |_| special.wants_d3d9());

    let implementations: Vec<Implementation> = (0..legacy::MAX_ADAPTERS)
        .filter_map(|adapter| {
            let caps = legacy::query_caps(library.module.as_ref(), adapter, probe_d3d9).ok()?;
            let mut implementation =
                Implementation::new(library, adapter, caps.description.api_version);
            implementation.description = Some(Caps::owned(caps.description));
            implementation.functions = Some(Caps::owned(caps.functions));
            Some(implementation)
        })
        .collect();

    if implementations.is_empty() {
        log::debug!("dropping {}: no usable adapter", library.path.display());
    }

    implementations
}

/// All the implementations of the loaded libraries, in ranking order once validated.
#[derive(Default)]
pub(crate) struct Registry {
    implementations: Vec<Implementation>,
}

impl Registry {
    /// Queries the capabilities of every library.
    ///
    /// Libraries offering no implementation are not referenced anymore and get unloaded once the
    /// caller drops its own list.
    pub fn query(libraries: &[Rc<CandidateLibrary>], special: &SpecialConfig) -> Self {
        let mut implementations: Vec<Implementation> = libraries
            .iter()
            .flat_map(|library| match library.kind {
                LibraryKind::Modern => query_modern(library),
                LibraryKind::Legacy { .. } => query_legacy(library, special),
            })
            .collect();

        for implementation in &mut implementations {
            let Some(desc) = implementation.description() else {
                continue;
            };
            if desc.is_hardware() && desc.vendor_id == VENDOR_INTEL {
                implementation.adapter_index = desc.parse_x86_device_id().and_then(|(_, a)| a);
            }
        }

        Self::exclude_shadowed_legacy(&mut implementations, special);
        for implementation in &mut implementations {
            implementation.valid_index = (!implementation.excluded).then_some(0);
        }

        let mut registry = Self { implementations };
        registry.renumber();
        registry
    }

    /// Registry holding the single implementation of a library loaded through the low-latency
    /// path.
    pub fn low_latency(library: &Rc<CandidateLibrary>, api_version: ApiVersion) -> Self {
        let mut implementation = Implementation::new(library, 0, api_version);
        implementation.valid_index = Some(0);
        Self { implementations: vec![implementation] }
    }

    /// Excludes legacy implementations also offered by a modern runtime, or which are a modern
    /// runtime behind the compatibility entrypoints.
    fn exclude_shadowed_legacy(implementations: &mut [Implementation], special: &SpecialConfig) {
        let modern_devices: Vec<String> = implementations
            .iter()
            .filter(|i| !i.library.is_legacy())
            .filter_map(|i| i.description())
            .filter(|d| d.is_hardware())
            .map(|d| d.device.device_id.clone())
            .collect();

        for implementation in implementations.iter_mut().filter(|i| i.library.is_legacy()) {
            let Some(desc) = implementation.description() else {
                continue;
            };

            let shadowed = !special.wants_d3d9() && modern_devices.contains(&desc.device.device_id);
            let bridged = desc.api_version == legacy::BRIDGED_API_VERSION;
            if shadowed || bridged {
                log::debug!(
                    "excluding legacy implementation {} of {}",
                    implementation.library_index,
                    implementation.path.display()
                );
                implementation.excluded = true;
            }
        }
    }

    /// Re-validates every implementation against `filters`, then ranks them.
    pub fn update(&mut self, filters: &[ConfigFilter], special: &SpecialConfig) {
        for implementation in &mut self.implementations {
            let valid = !implementation.excluded
                && match implementation.offer() {
                    Some(offer) => match matching::validate(&offer, filters, special) {
                        Ok(()) => true,
                        Err(mismatch) => {
                            log::debug!(
                                "implementation {} of {} rejected: {}",
                                implementation.library_index,
                                implementation.path.display(),
                                mismatch
                            );
                            false
                        }
                    },
                    None => false,
                };
            implementation.valid_index = if valid { Some(0) } else { None };
        }

        self.implementations = priority::prioritize(std::mem::take(&mut self.implementations));
        self.renumber();
    }

    /// Numbers the valid implementations densely, in list order.
    fn renumber(&mut self) {
        let mut next = 0;
        for implementation in &mut self.implementations {
            if implementation.valid_index.is_some() {
                implementation.valid_index = Some(next);
                next += 1;
            }
        }
    }

    /// Number of valid implementations.
    pub fn valid_count(&self) -> usize {
        self.implementations.iter().filter(|i| i.valid_index.is_some()).count()
    }

    pub fn get(&self, valid_index: usize) -> Option<&Implementation> {
        self.implementations.iter().find(|i| i.valid_index == Some(valid_index))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Implementation> {
        self.implementations.iter_mut()
    }

    pub fn is_empty(&self) -> bool {
        self.implementations.is_empty()
    }
}

/// Releases one runtime copy of capability data, if it has not been released yet.
pub(crate) fn release<T>(library: &CandidateLibrary, caps: &mut Caps<T>) -> Result<()> {
    match caps.token.take() {
        Some(token) => library.module.release(token),
        None => Ok(()),
    }
}
