// Copyright 2025 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Classification of the libraries found during discovery.

use std::path::Path;
use std::path::PathBuf;
use std::rc::Rc;

use crate::discovery::Candidate;
use crate::legacy;
use crate::priority;
use crate::runtime::ExportSet;
use crate::runtime::ModuleOpener;
use crate::runtime::RuntimeModule;
use crate::runtime::LEGACY_EXPORTS;
use crate::ApiVersion;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum LibraryKind {
    /// A 2.x runtime able to describe its implementations.
    Modern,
    /// A 1.x runtime, driven through the compatibility entrypoints.
    Legacy { version: ApiVersion },
}

/// An opened runtime library that passed classification.
pub struct CandidateLibrary {
    pub path: PathBuf,
    /// Priority of the location the library was found in. Lower is preferred.
    pub priority: u32,
    pub kind: LibraryKind,
    pub module: Rc<dyn RuntimeModule>,
}

impl CandidateLibrary {
    /// Opens the library at `path` and works out what kind of runtime it is.
    ///
    /// Returns `None`, after logging why, if the library cannot be used.
    pub fn open(path: &Path, priority: u32, opener: &dyn ModuleOpener) -> Option<Self> {
        let module = match opener.open(path) {
            Ok(module) => module,
            Err(e) => {
                log::debug!("skipping {}: {:#}", path.display(), e);
                return None;
            }
        };

        let kind = classify(path, priority, module.as_ref())?;
        log::debug!("{} is a {:?} runtime", path.display(), kind);

        Some(Self { path: path.to_path_buf(), priority, kind, module })
    }

    pub fn exports(&self) -> ExportSet {
        self.module.exports()
    }

    pub fn is_legacy(&self) -> bool {
        matches!(self.kind, LibraryKind::Legacy { .. })
    }
}

fn classify(path: &Path, priority: u32, module: &dyn RuntimeModule) -> Option<LibraryKind> {
    let exports = module.exports();

    // Legacy locations may hold old runtimes exporting a stub of the modern initializer.
    if exports.is_modern() && !priority::is_legacy_location(priority) {
        return Some(LibraryKind::Modern);
    }

    let is_legacy_name = path
        .file_name()
        .is_some_and(|name| name.to_string_lossy().contains(legacy::LIBRARY_NAME));
    if !is_legacy_name || !exports.contains_all(&LEGACY_EXPORTS) {
        log::debug!("skipping {}: missing required exports", path.display());
        return None;
    }

    match legacy::query_api_version(module) {
        Ok(version) => Some(LibraryKind::Legacy { version }),
        Err(e) => {
            log::debug!("skipping {}: cannot open a session: {}", path.display(), e);
            None
        }
    }
}

/// Opens and classifies `candidates`, keeping their order.
///
/// At most one legacy library is kept: the one with the highest API version, taken from the
/// driver store if it holds any.
pub fn load_candidates(
    candidates: &[Candidate],
    opener: &dyn ModuleOpener,
) -> Vec<Rc<CandidateLibrary>> {
    let libraries: Vec<CandidateLibrary> = candidates
        .iter()
        .filter_map(|c| CandidateLibrary::open(&c.path, c.priority, opener))
        .collect();

    let legacy_version = |lib: &CandidateLibrary| match lib.kind {
        LibraryKind::Legacy { version } => Some(version),
        LibraryKind::Modern => None,
    };

    // The first library wins among those of the same version.
    let best_of = |from_driver_store: bool| {
        libraries
            .iter()
            .enumerate()
            .filter(|(_, lib)| {
                !from_driver_store || lib.priority == priority::LEGACY_DRIVER_STORE
            })
            .filter_map(|(i, lib)| legacy_version(lib).map(|v| (i, v)))
            .fold(None, |best: Option<(usize, ApiVersion)>, (i, v)| match best {
                Some((_, best_version)) if best_version >= v => best,
                _ => Some((i, v)),
            })
            .map(|(i, _)| i)
    };
    let best_legacy = best_of(true).or_else(|| best_of(false));

    libraries
        .into_iter()
        .enumerate()
        .filter(|(i, lib)| {
            let keep = !lib.is_legacy() || Some(*i) == best_legacy;
            if !keep {
                log::debug!(
                    "dropping {}: a better legacy runtime is available",
                    lib.path.display()
                );
            }
            keep
        })
        .map(|(_, lib)| Rc::new(lib))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::SearchLocation;
    use crate::runtime::dummy::FakeModule;
    use crate::runtime::dummy::FakeOpener;
    use crate::runtime::Export;

    fn candidate(path: &str, location: SearchLocation) -> Candidate {
        Candidate { path: PathBuf::from(path), location, priority: location.priority() }
    }

    fn names(libraries: &[Rc<CandidateLibrary>]) -> Vec<&str> {
        libraries.iter().map(|l| l.path.to_str().unwrap()).collect()
    }

    #[test]
    fn modern_and_unusable_libraries() {
        let mut opener = FakeOpener::default();
        opener.add(FakeModule::modern("/fake/libvpl-a.so.2", vec![]));
        let mut no_init = FakeModule::modern("/fake/libvpl-b.so.2", vec![]);
        no_init.exports = [Export::QueryImplsDescription].into_iter().collect();
        opener.add(no_init);

        let candidates = [
            candidate("/fake/libvpl-a.so.2", SearchLocation::LibraryPath),
            candidate("/fake/libvpl-b.so.2", SearchLocation::LibraryPath),
            candidate("/fake/libvpl-missing.so.2", SearchLocation::SearchPath),
        ];

        let libraries = load_candidates(&candidates, &opener);
        assert_eq!(names(&libraries), vec!["/fake/libvpl-a.so.2"]);
        assert_eq!(libraries[0].kind, LibraryKind::Modern);
        assert_eq!(libraries[0].priority, 1);
    }

    #[test]
    fn modern_runtime_in_legacy_location_is_ignored() {
        let mut opener = FakeOpener::default();
        opener.add(FakeModule::modern("/opt/intel/mediasdk/lib64/libmfx-gen.so.1.2", vec![]));

        let candidates =
            [candidate("/opt/intel/mediasdk/lib64/libmfx-gen.so.1.2", SearchLocation::Legacy)];
        assert!(load_candidates(&candidates, &opener).is_empty());
    }

    #[test]
    fn legacy_needs_name_and_working_session() {
        let mut opener = FakeOpener::default();
        opener.add(FakeModule::legacy("/fake/libmfxhw64.so.1", ApiVersion::new(1, 35), 1));
        opener.add(FakeModule::legacy("/fake/libother.so.1", ApiVersion::new(1, 35), 1));
        let mut broken = FakeModule::legacy("/fake/libmfxhw32.so.1", ApiVersion::new(1, 35), 1);
        broken.fail_initialize = true;
        opener.add(broken);

        let candidates = [
            candidate("/fake/libother.so.1", SearchLocation::Legacy),
            candidate("/fake/libmfxhw32.so.1", SearchLocation::Legacy),
            candidate("/fake/libmfxhw64.so.1", SearchLocation::Legacy),
        ];

        let libraries = load_candidates(&candidates, &opener);
        assert_eq!(names(&libraries), vec!["/fake/libmfxhw64.so.1"]);
        assert_eq!(libraries[0].kind, LibraryKind::Legacy { version: ApiVersion::new(1, 35) });
    }

    #[test]
    fn single_legacy_library_kept() {
        let mut opener = FakeOpener::default();
        opener.add(FakeModule::modern("/fake/libvpl-a.so.2", vec![]));
        opener.add(FakeModule::legacy("/a/libmfxhw64.so.1", ApiVersion::new(1, 30), 1));
        opener.add(FakeModule::legacy("/b/libmfxhw64.so.1", ApiVersion::new(1, 35), 1));
        opener.add(FakeModule::legacy("/c/libmfxhw64.so.1", ApiVersion::new(1, 35), 1));

        let candidates = [
            candidate("/fake/libvpl-a.so.2", SearchLocation::LibraryPath),
            candidate("/a/libmfxhw64.so.1", SearchLocation::Legacy),
            candidate("/b/libmfxhw64.so.1", SearchLocation::Legacy),
            candidate("/c/libmfxhw64.so.1", SearchLocation::Legacy),
        ];

        let libraries = load_candidates(&candidates, &opener);
        assert_eq!(names(&libraries), vec!["/fake/libvpl-a.so.2", "/b/libmfxhw64.so.1"]);
    }

    #[test]
    fn driver_store_legacy_library_preferred() {
        let mut opener = FakeOpener::default();
        opener.add(FakeModule::legacy("/driver/libmfxhw64.dll", ApiVersion::new(1, 30), 1));
        opener.add(FakeModule::legacy("/system/libmfxhw64.dll", ApiVersion::new(1, 35), 1));

        let candidates = [
            candidate("/driver/libmfxhw64.dll", SearchLocation::LegacyDriverStore),
            candidate("/system/libmfxhw64.dll", SearchLocation::Legacy),
        ];

        let libraries = load_candidates(&candidates, &opener);
        assert_eq!(names(&libraries), vec!["/driver/libmfxhw64.dll"]);
    }
}
