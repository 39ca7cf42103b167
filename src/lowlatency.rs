// Copyright 2025 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Low-latency loading of the Intel GPU runtime.
//!
//! When the filters only ask for the Intel hardware runtime by name, the loader skips discovery
//! and capability queries altogether. It loads the runtime by its well-known file name and trusts
//! it to support the requested acceleration mode.

use std::path::PathBuf;
use std::rc::Rc;

use crate::config::ConfigFilter;
use crate::config::SpecialConfig;
use crate::description::ImplType;
use crate::description::VENDOR_INTEL;
use crate::discovery::Locator;
use crate::discovery::SearchLocation;
use crate::loader::library::CandidateLibrary;
use crate::loader::library::LibraryKind;
use crate::property::Prop;
use crate::property::Variant;
use crate::runtime::InitParams;
use crate::runtime::ModuleOpener;
use crate::runtime::RuntimeModule;
use crate::ApiVersion;
use crate::Error;
use crate::Result;

/// Name of the runtime that may be requested in low-latency mode.
pub const RUNTIME_NAME: &str = "mfx-gen";

/// Properties that may be set without leaving low-latency mode.
const OPTIONAL: &[Prop] = &[
    Prop::ApiVersion,
    Prop::HandleType,
    Prop::Handle,
    Prop::NumThread,
    Prop::DeviceCopy,
    Prop::ExtBuffer,
    Prop::AdapterIndex,
];

/// Checks whether `filters` form a low-latency request and returns its session parameters.
///
/// All filters are merged, the last value of each property winning. The result must set `Impl` to
/// hardware, `VendorID` to Intel, `ImplName` to [`RUNTIME_NAME`] and `AccelerationMode` to
/// anything, and may only set the properties in `OPTIONAL` besides those.
pub fn signature(filters: &[ConfigFilter]) -> Option<SpecialConfig> {
    let mut merged: Vec<Option<&Variant>> = vec![None; Prop::COUNT];
    for filter in filters {
        for (prop, value) in filter.iter() {
            merged[prop.index()] = Some(value);
        }
    }

    for prop in Prop::all() {
        let value = merged[prop.index()];
        let accepted = match prop {
            Prop::Impl => value.and_then(Variant::as_u32) == Some(ImplType::Hardware as u32),
            Prop::VendorId => value.and_then(Variant::as_u32) == Some(VENDOR_INTEL),
            Prop::ImplName => value.and_then(Variant::as_str) == Some(RUNTIME_NAME),
            Prop::AccelerationMode => value.is_some(),
            p if OPTIONAL.contains(&p) => true,
            _ => value.is_none(),
        };

        if !accepted {
            return None;
        }
    }

    Some(SpecialConfig::collect(filters))
}

/// Reads the API version of a modern runtime from a trial session.
fn modern_version(module: &dyn RuntimeModule, special: &SpecialConfig) -> Result<ApiVersion> {
    let session = module.initialize(&InitParams {
        acceleration_mode: special.acceleration_mode.unwrap_or_default(),
        device_copy: 0,
        vendor_impl_id: special.adapter_index.unwrap_or(0),
        ext_buffers: &[],
    })?;

    let version = module.query_version(session);
    if let Err(e) = module.close(session) {
        log::warn!("failed to close trial session of {}: {}", module.path().display(), e);
    }

    version
}

/// Loads the first usable runtime among the well-known ones.
///
/// Fails with `NotFound` if none can be loaded. No capability query is made.
pub(crate) fn load(
    locator: &dyn Locator,
    opener: &dyn ModuleOpener,
    special: &SpecialConfig,
) -> Result<(Rc<CandidateLibrary>, ApiVersion)> {
    let paths: Vec<PathBuf> = locator.fast_path();

    for path in &paths {
        let Some(library) =
            CandidateLibrary::open(path, SearchLocation::SystemDefault.priority(), opener)
        else {
            continue;
        };

        let version = match library.kind {
            LibraryKind::Legacy { version } => version,
            LibraryKind::Modern => match modern_version(library.module.as_ref(), special) {
                Ok(version) => version,
                Err(e) => {
                    log::debug!("{}: cannot open a trial session: {}", path.display(), e);
                    continue;
                }
            },
        };

        if let Some(missing) = library.exports().missing_for(version) {
            log::debug!("{}: API {} requires {}", path.display(), version, missing.symbol());
            continue;
        }

        log::debug!("low-latency mode loaded {} (API {})", path.display(), version);
        return Ok((Rc::new(library), version));
    }

    log::debug!("low-latency mode found no runtime among {:?}", paths);
    Err(Error::NotFound)
}
