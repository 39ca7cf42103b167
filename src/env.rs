// Copyright 2025 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Process environment as seen by a loader.
//!
//! The environment is read once when a [`crate::Loader`] is created and never consulted again, so
//! that discovery behaves the same for the whole lifetime of the loader and can be driven by tests
//! without touching the real process environment.

use std::ffi::OsStr;
use std::ffi::OsString;
use std::path::PathBuf;

/// Libraries found in these directories are loaded before any other and are not re-ranked.
pub const PRIORITY_PATH_VAR: &str = "ONEVPL_PRIORITY_PATH";
/// Additional directories searched after the system ones.
pub const SEARCH_PATH_VAR: &str = "ONEVPL_SEARCH_PATH";
/// Set to `ON` to enable the dispatcher log.
pub const LOG_VAR: &str = "ONEVPL_DISPATCHER_LOG";
/// File receiving the dispatcher log. Standard output is used when unset.
pub const LOG_FILE_VAR: &str = "ONEVPL_DISPATCHER_LOG_FILE";

#[cfg(windows)]
const PATH_LIST_SEPARATOR: char = ';';
#[cfg(not(windows))]
const PATH_LIST_SEPARATOR: char = ':';

#[derive(Clone, Debug, Default)]
pub struct Environment {
    pub priority_path: Option<OsString>,
    pub search_path: Option<OsString>,
    /// `LD_LIBRARY_PATH`.
    pub library_path: Option<OsString>,
    /// `PATH`.
    pub system_path: Option<OsString>,
    /// `windir`, used to locate the system directories on Windows.
    pub windows_dir: Option<PathBuf>,
    pub current_dir: Option<PathBuf>,
    pub executable_dir: Option<PathBuf>,
    pub log: Option<String>,
    pub log_file: Option<PathBuf>,
}

impl Environment {
    /// Captures the relevant parts of the current process environment.
    pub fn from_process() -> Self {
        Self {
            priority_path: std::env::var_os(PRIORITY_PATH_VAR),
            search_path: std::env::var_os(SEARCH_PATH_VAR),
            library_path: std::env::var_os("LD_LIBRARY_PATH"),
            system_path: std::env::var_os("PATH"),
            windows_dir: std::env::var_os("windir").map(PathBuf::from),
            current_dir: std::env::current_dir().ok(),
            executable_dir: std::env::current_exe()
                .ok()
                .and_then(|exe| exe.parent().map(PathBuf::from)),
            log: std::env::var(LOG_VAR).ok(),
            log_file: std::env::var_os(LOG_FILE_VAR).map(PathBuf::from),
        }
    }

    /// Whether `ONEVPL_DISPATCHER_LOG` asks for the dispatcher log.
    pub fn log_enabled(&self) -> bool {
        self.log.as_deref() == Some("ON")
    }
}

/// Splits a path list variable into its directories, in order.
///
/// Empty entries are kept out of the result.
pub fn split_path_list(list: Option<&OsStr>) -> Vec<PathBuf> {
    let Some(list) = list else {
        return Vec::new();
    };

    list.to_string_lossy()
        .split(PATH_LIST_SEPARATOR)
        .filter(|dir| !dir.is_empty())
        .map(PathBuf::from)
        .collect()
}
