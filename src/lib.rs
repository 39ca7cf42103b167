// Copyright 2025 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Discovery and selection of oneVPL media runtime implementations.
//!
//! A [`Loader`] finds the runtime libraries installed on the system, asks each of them to describe
//! the implementations (usually one per GPU adapter) it provides, filters those descriptions
//! against the properties set on its [`ConfigFilter`]s, ranks the survivors and finally opens a
//! [`Session`] on the selected one.
//!
//! The runtimes themselves are reached through the [`runtime::RuntimeModule`] trait. The default
//! implementation loads them with `libloading`, but any other provider (e.g. a fake one for
//! testing) can be plugged in with [`Loader::with_parts`].

pub mod config;
pub mod description;
pub mod discovery;
pub mod env;
pub mod loader;
pub mod lowlatency;
pub mod matching;
pub mod priority;
pub mod property;
pub mod runtime;
pub mod session;

mod dispatch_log;
mod legacy;

use std::fmt;

use thiserror::Error;

pub use config::ConfigFilter;
pub use config::SpecialConfig;
pub use description::ImplDescription;
pub use loader::CapsFormat;
pub use loader::FilterId;
pub use loader::ImplCaps;
pub use loader::Loader;
pub use property::Variant;
pub use session::ExtBuffer;
pub use session::Session;

/// Builds a FourCC code the way the runtime headers do.
pub const fn fourcc(a: u8, b: u8, c: u8, d: u8) -> u32 {
    (a as u32) | (b as u32) << 8 | (c as u32) << 16 | (d as u32) << 24
}

/// Version of the runtime API, ordered the same way as its packed `u32` representation.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ApiVersion {
    pub major: u16,
    pub minor: u16,
}

impl ApiVersion {
    pub const fn new(major: u16, minor: u16) -> Self {
        Self { major, minor }
    }

    /// Unpacks a version where the major number is stored in the upper 16 bits.
    pub const fn from_u32(version: u32) -> Self {
        Self { major: (version >> 16) as u16, minor: (version & 0xffff) as u16 }
    }

    pub const fn as_u32(self) -> u32 {
        (self.major as u32) << 16 | self.minor as u32
    }
}

impl fmt::Display for ApiVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// Raw status code returned by a runtime entrypoint.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Status(pub i32);

impl Status {
    pub const NONE: Status = Status(0);
    pub const UNKNOWN: Status = Status(-1);
    pub const NULL_PTR: Status = Status(-2);
    pub const UNSUPPORTED: Status = Status(-3);
    pub const MEMORY_ALLOC: Status = Status(-4);
    pub const INVALID_HANDLE: Status = Status(-6);
    pub const NOT_FOUND: Status = Status(-9);

    /// Turns a status into a `Result`. Warnings (positive values) are treated as success.
    pub fn check(self) -> Result<()> {
        match self {
            s if s.0 >= 0 => Ok(()),
            Status::NULL_PTR => Err(Error::NullArgument),
            Status::UNSUPPORTED => Err(Error::Unsupported),
            Status::MEMORY_ALLOC => Err(Error::AllocationFailure),
            Status::INVALID_HANDLE => Err(Error::InvalidHandle),
            Status::NOT_FOUND => Err(Error::NotFound),
            s => Err(Error::Runtime(s)),
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    #[error("no implementation or property matches the request")]
    NotFound,
    #[error("unsupported value type, capability or query format")]
    Unsupported,
    #[error("a required argument is missing")]
    NullArgument,
    #[error("failed to allocate memory")]
    AllocationFailure,
    #[error("handle does not belong to this loader")]
    InvalidHandle,
    #[error("runtime call failed with status {0}")]
    Runtime(Status),
}
