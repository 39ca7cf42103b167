// Copyright 2025 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Ranking of implementations.
//!
//! Implementations are ordered by a sequence of stable sorts, from the least to the most
//! significant rule:
//!
//! 1. priority of the location their library was found in, lowest first;
//! 2. API version, highest first;
//! 3. general hardware acceleration before VSI (HDDL Unite) acceleration;
//! 4. hardware before software.
//!
//! Implementations from the priority path are kept out of the sorts and stay in front, in the
//! order they were found.

use crate::description::AccelerationMode;
use crate::ApiVersion;

/// Priority of libraries found in the priority path.
pub const SPECIAL: u32 = 0;
/// Priority of the legacy runtime shipped with the graphics driver.
pub const LEGACY_DRIVER_STORE: u32 = 10000;
/// Priority of legacy runtimes found anywhere else.
pub const LEGACY: u32 = 10001;

/// Whether a library of this priority was found in a legacy location.
pub fn is_legacy_location(priority: u32) -> bool {
    priority >= LEGACY_DRIVER_STORE
}

/// Properties implementations are ranked by.
pub trait Rank {
    fn priority(&self) -> u32;
    fn api_version(&self) -> ApiVersion;
    fn acceleration_mode(&self) -> u32;
    fn impl_type(&self) -> u32;
}

/// Sorts `items` from the most to the least preferred.
pub fn prioritize<T: Rank>(items: Vec<T>) -> Vec<T> {
    let (mut ranked, mut rest): (Vec<T>, Vec<T>) =
        items.into_iter().partition(|item| item.priority() == SPECIAL);

    rest.sort_by_key(|item| item.priority());
    rest.sort_by(|a, b| b.api_version().cmp(&a.api_version()));
    rest.sort_by_key(|item| item.acceleration_mode() == AccelerationMode::ViaHddlUnite as u32);
    rest.sort_by(|a, b| b.impl_type().cmp(&a.impl_type()));

    ranked.append(&mut rest);
    ranked
}
