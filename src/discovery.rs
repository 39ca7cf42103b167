// Copyright 2025 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Discovery of candidate runtime libraries.
//!
//! Libraries are searched in a fixed sequence of [`SearchLocation`]s, each carrying a priority
//! that later drives the ranking of the implementations found in them. Listing the files of a
//! location is the job of a [`Locator`]; [`SystemLocator`] does it by scanning the directories
//! given by the environment and the platform conventions.

use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::path::PathBuf;

use crate::env::split_path_list;
use crate::env::Environment;
use crate::priority;

/// Category of places runtime libraries are searched in.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum SearchLocation {
    /// `ONEVPL_PRIORITY_PATH`. Libraries found here always come first.
    PriorityPath,
    /// Runtime directory of the installed graphics driver.
    DriverStore,
    /// `LD_LIBRARY_PATH`.
    LibraryPath,
    /// Directory of the running executable.
    ExecutableDir,
    /// Default library directories of the system.
    SystemDefault,
    CurrentDir,
    /// `PATH`.
    SystemPath,
    /// `ONEVPL_SEARCH_PATH`.
    SearchPath,
    /// Legacy runtime shipped with the graphics driver.
    LegacyDriverStore,
    /// Other places legacy runtimes are installed to.
    Legacy,
}

impl SearchLocation {
    /// Locations searched on this platform, in search order.
    #[cfg(not(windows))]
    pub const ORDER: &'static [SearchLocation] = &[
        SearchLocation::PriorityPath,
        SearchLocation::LibraryPath,
        SearchLocation::SystemDefault,
        SearchLocation::CurrentDir,
        SearchLocation::SearchPath,
        SearchLocation::Legacy,
    ];
    #[cfg(windows)]
    pub const ORDER: &'static [SearchLocation] = &[
        SearchLocation::PriorityPath,
        SearchLocation::DriverStore,
        SearchLocation::ExecutableDir,
        SearchLocation::CurrentDir,
        SearchLocation::SystemPath,
        SearchLocation::SearchPath,
        SearchLocation::LegacyDriverStore,
        SearchLocation::Legacy,
    ];

    /// Priority of the libraries found in this location. Lower is preferred.
    pub fn priority(self) -> u32 {
        match self {
            SearchLocation::PriorityPath => priority::SPECIAL,
            SearchLocation::DriverStore | SearchLocation::LibraryPath => 1,
            SearchLocation::ExecutableDir => 2,
            SearchLocation::SystemDefault => 3,
            SearchLocation::CurrentDir if cfg!(windows) => 3,
            SearchLocation::CurrentDir => 4,
            SearchLocation::SystemPath => 4,
            SearchLocation::SearchPath => 5,
            SearchLocation::LegacyDriverStore => priority::LEGACY_DRIVER_STORE,
            SearchLocation::Legacy => priority::LEGACY,
        }
    }

    /// Whether only 2.x runtimes are looked for in this location.
    pub fn modern_only(self) -> bool {
        self == SearchLocation::DriverStore
    }
}

/// Lists the runtime libraries present in each search location.
pub trait Locator {
    /// Candidate library files of `location`, in preference order.
    fn list(&self, location: SearchLocation) -> Vec<PathBuf>;

    /// Libraries to try, in order, when only the GPU runtime is wanted. Bare file names are
    /// resolved by the system loader.
    fn fast_path(&self) -> Vec<PathBuf>;
}

/// Whether `name` looks like a runtime library on Linux.
pub fn is_linux_runtime_name(name: &str) -> bool {
    if !name.contains(".so") {
        return false;
    }
    // The dispatcher itself and the tracer.
    if name.contains("libmfx.so") || name.contains("libvpl.so") || name.contains("libmfx-tracer")
    {
        return false;
    }

    name.starts_with("libvpl") || name == "libmfx-gen.so.1.2" || name == "libmfxhw64.so.1"
}

#[cfg(target_pointer_width = "64")]
const WINDOWS_GEN_NAME: &str = "libmfx64-gen.dll";
#[cfg(target_pointer_width = "64")]
const WINDOWS_LEGACY_NAME: &str = "libmfxhw64.dll";
#[cfg(not(target_pointer_width = "64"))]
const WINDOWS_GEN_NAME: &str = "libmfx32-gen.dll";
#[cfg(not(target_pointer_width = "64"))]
const WINDOWS_LEGACY_NAME: &str = "libmfxhw32.dll";

/// Whether `name` looks like a runtime library on Windows. Legacy runtimes are rejected when
/// `modern_only` is set.
pub fn is_windows_runtime_name(name: &str, modern_only: bool) -> bool {
    let name = name.to_ascii_lowercase();

    if matches!(name.as_str(), "libmfx.dll" | "libvpl.dll" | "libvpld.dll") {
        return false;
    }

    (name.starts_with("libvpl") && name.ends_with(".dll"))
        || name == WINDOWS_GEN_NAME
        || (!modern_only && name == WINDOWS_LEGACY_NAME)
}

fn is_runtime_name(name: &str, modern_only: bool) -> bool {
    if cfg!(windows) {
        is_windows_runtime_name(name, modern_only)
    } else {
        is_linux_runtime_name(name)
    }
}

/// Lists the runtime libraries in `dir`, sorted by name. Unreadable directories are empty.
pub fn scan_directory(dir: &Path, modern_only: bool) -> Vec<PathBuf> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            log::debug!("skipping {}: {}", dir.display(), e);
            return Vec::new();
        }
    };

    let mut libraries: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.path().is_file())
        .filter(|entry| entry.file_name().to_str().is_some_and(|n| is_runtime_name(n, modern_only)))
        .map(|entry| entry.path())
        .collect();
    libraries.sort();

    libraries
}

/// Locator scanning the directories of the real system.
pub struct SystemLocator {
    env: Environment,
    /// Directories of [`SearchLocation::SystemDefault`].
    pub system_dirs: Vec<PathBuf>,
    /// Directories of [`SearchLocation::Legacy`].
    pub legacy_dirs: Vec<PathBuf>,
}

impl SystemLocator {
    pub fn new(env: Environment) -> Self {
        let (system_dirs, legacy_dirs) = Self::platform_dirs(&env);
        Self { env, system_dirs, legacy_dirs }
    }

    #[cfg(not(windows))]
    fn platform_dirs(_env: &Environment) -> (Vec<PathBuf>, Vec<PathBuf>) {
        let system = ["/usr/lib/x86_64-linux-gnu", "/lib", "/usr/lib", "/lib64", "/usr/lib64"];
        let legacy = ["/opt/intel/mediasdk/lib", "/opt/intel/mediasdk/lib64"];
        (
            system.iter().map(PathBuf::from).collect(),
            legacy.iter().map(PathBuf::from).collect(),
        )
    }

    #[cfg(windows)]
    fn platform_dirs(env: &Environment) -> (Vec<PathBuf>, Vec<PathBuf>) {
        let system_dir = if cfg!(target_pointer_width = "64") { "System32" } else { "SysWOW64" };
        let legacy = env.windows_dir.iter().map(|windir| windir.join(system_dir)).collect();
        (Vec::new(), legacy)
    }

    fn directories(&self, location: SearchLocation) -> Vec<PathBuf> {
        match location {
            SearchLocation::PriorityPath => split_path_list(self.env.priority_path.as_deref()),
            SearchLocation::LibraryPath => split_path_list(self.env.library_path.as_deref()),
            SearchLocation::SystemPath => split_path_list(self.env.system_path.as_deref()),
            SearchLocation::SearchPath => split_path_list(self.env.search_path.as_deref()),
            SearchLocation::ExecutableDir => self.env.executable_dir.iter().cloned().collect(),
            SearchLocation::CurrentDir => self.env.current_dir.iter().cloned().collect(),
            SearchLocation::SystemDefault => self.system_dirs.clone(),
            SearchLocation::Legacy => self.legacy_dirs.clone(),
            SearchLocation::DriverStore | SearchLocation::LegacyDriverStore => {
                log::debug!("driver store lookup is not available, skipping {:?}", location);
                Vec::new()
            }
        }
    }
}

impl Locator for SystemLocator {
    fn list(&self, location: SearchLocation) -> Vec<PathBuf> {
        self.directories(location)
            .iter()
            .flat_map(|dir| scan_directory(dir, location.modern_only()))
            .collect()
    }

    fn fast_path(&self) -> Vec<PathBuf> {
        if cfg!(windows) {
            self.legacy_dirs
                .iter()
                .flat_map(|dir| [dir.join(WINDOWS_GEN_NAME), dir.join(WINDOWS_LEGACY_NAME)])
                .collect()
        } else {
            vec![PathBuf::from("libmfx-gen.so.1.2"), PathBuf::from("libmfxhw64.so.1")]
        }
    }
}

/// A library file found during discovery.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Candidate {
    /// Canonical path of the library.
    pub path: PathBuf,
    pub location: SearchLocation,
    pub priority: u32,
}

/// Lists the candidate libraries of every search location, in search order.
///
/// A library reachable from several locations is only kept for the first one.
pub fn discover(locator: &dyn Locator) -> Vec<Candidate> {
    let mut seen = HashSet::new();
    let mut candidates = Vec::new();

    for location in SearchLocation::ORDER {
        for path in locator.list(*location) {
            let path = fs::canonicalize(&path).unwrap_or(path);
            if !seen.insert(path.clone()) {
                log::debug!("{} already found, skipping", path.display());
                continue;
            }

            candidates.push(Candidate { path, location: *location, priority: location.priority() });
        }
    }

    candidates
}
