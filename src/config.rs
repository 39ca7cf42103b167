// Copyright 2025 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Configuration filters.
//!
//! A [`ConfigFilter`] holds at most one value per property slot. Filtering properties restrict
//! which implementations a loader reports; special properties ([`PropGroup::Special`]) carry
//! parameters for the session and are gathered into a [`SpecialConfig`].

use crate::description::AccelerationMode;
use crate::property::DeviceHandle;
use crate::property::Prop;
use crate::property::PropGroup;
use crate::property::Variant;
use crate::session::ExtBuffer;
use crate::ApiVersion;
use crate::Error;
use crate::Result;

#[derive(Clone, Debug)]
pub struct ConfigFilter {
    values: [Option<Variant>; Prop::COUNT],
}

impl Default for ConfigFilter {
    fn default() -> Self {
        Self { values: std::array::from_fn(|_| None) }
    }
}

impl ConfigFilter {
    pub fn new() -> Self {
        Default::default()
    }

    /// Sets the property called `name` to `value`.
    ///
    /// Fails with `NotFound` if `name` is not a known property and with `Unsupported` if `value`
    /// does not have the property's type. Setting a null device handle fails with `NullArgument`
    /// and leaves the slot unset.
    pub fn set_property(&mut self, name: &str, value: Variant) -> Result<Prop> {
        let prop = Prop::from_name(name, &value)?;
        self.set(prop, value)?;
        Ok(prop)
    }

    /// Stores `value` in the slot `prop` after checking its type.
    pub fn set(&mut self, prop: Prop, value: Variant) -> Result<()> {
        if let Err(e) = prop.check_value(&value) {
            if e == Error::NullArgument {
                self.values[prop.index()] = None;
            }
            return Err(e);
        }

        self.values[prop.index()] = Some(value);
        Ok(())
    }

    pub fn get(&self, prop: Prop) -> Option<&Variant> {
        self.values[prop.index()].as_ref()
    }

    pub fn is_set(&self, prop: Prop) -> bool {
        self.values[prop.index()].is_some()
    }

    pub fn u16(&self, prop: Prop) -> Option<u16> {
        self.get(prop).and_then(Variant::as_u16)
    }

    pub fn u32(&self, prop: Prop) -> Option<u32> {
        self.get(prop).and_then(Variant::as_u32)
    }

    pub fn string(&self, prop: Prop) -> Option<&str> {
        self.get(prop).and_then(Variant::as_str)
    }

    /// Iterates over the slots that hold a value, in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (Prop, &Variant)> {
        Prop::all().filter_map(|p| self.get(p).map(|v| (p, v)))
    }

    /// Whether any property of `group` is set.
    pub fn has_group(&self, group: PropGroup) -> bool {
        self.iter().any(|(p, _)| p.group() == group)
    }
}

/// Session parameters collected from all the filters of a loader.
///
/// When several filters set the same property, the one created last wins. Extension buffers
/// accumulate instead.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SpecialConfig {
    /// Overrides the default acceleration mode of the implementation.
    pub acceleration_mode: Option<u32>,
    pub handle_type: Option<u32>,
    pub handle: Option<DeviceHandle>,
    pub num_thread: Option<u32>,
    pub device_copy: Option<u16>,
    pub adapter_index: Option<u32>,
    pub ext_buffers: Vec<ExtBuffer>,
    /// Minimum API version, once both major and minor are known.
    pub api_version: Option<ApiVersion>,
}

impl SpecialConfig {
    /// Collects the session parameters of `filters`.
    pub fn collect(filters: &[ConfigFilter]) -> Self {
        let mut special = SpecialConfig::default();
        let mut major = None;
        let mut minor = None;

        for filter in filters {
            special.absorb(filter);

            // The version may be given as a whole, or as major and minor possibly coming from
            // different filters.
            if let Some(version) = filter.u32(Prop::ApiVersion) {
                let version = ApiVersion::from_u32(version);
                major = Some(version.major);
                minor = Some(version.minor);
            } else {
                major = filter.u16(Prop::ApiVersionMajor).or(major);
                minor = filter.u16(Prop::ApiVersionMinor).or(minor);
            }
        }

        if let (Some(major), Some(minor)) = (major, minor) {
            special.api_version = Some(ApiVersion::new(major, minor));
        }

        special
    }

    /// Takes the special properties set on `filter`, overriding any previous value.
    pub(crate) fn absorb(&mut self, filter: &ConfigFilter) {
        if let Some(mode) = filter.u32(Prop::AccelerationMode) {
            self.acceleration_mode = Some(mode);
        }
        if let Some(handle_type) = filter.u32(Prop::HandleType) {
            self.handle_type = Some(handle_type);
        }
        if let Some(Variant::Handle(handle)) = filter.get(Prop::Handle) {
            self.handle = Some(*handle);
        }
        if let Some(num_thread) = filter.u32(Prop::NumThread) {
            self.num_thread = Some(num_thread);
        }
        if let Some(device_copy) = filter.u16(Prop::DeviceCopy) {
            self.device_copy = Some(device_copy);
        }
        if let Some(index) = filter.u32(Prop::AdapterIndex) {
            self.adapter_index = Some(index);
        }
        if let Some(Variant::ExtBuffer(buffer)) = filter.get(Prop::ExtBuffer) {
            self.ext_buffers.push(buffer.clone());
        }
    }

    /// Whether D3D9 acceleration was explicitly requested.
    pub fn wants_d3d9(&self) -> bool {
        self.acceleration_mode == Some(AccelerationMode::ViaD3d9 as u32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_and_get() {
        let mut filter = ConfigFilter::new();
        assert_eq!(filter.set_property("mfxImplDescription.Impl", Variant::U32(2)), Ok(Prop::Impl));
        assert_eq!(filter.u32(Prop::Impl), Some(2));
        assert!(filter.has_group(PropGroup::Main));
        assert!(!filter.has_group(PropGroup::Decoder));

        // Wrong type leaves the previous value alone.
        assert_eq!(
            filter.set_property("mfxImplDescription.Impl", Variant::U16(1)),
            Err(Error::Unsupported)
        );
        assert_eq!(filter.u32(Prop::Impl), Some(2));

        assert_eq!(
            filter.set_property("mfxImplDescription.Bogus", Variant::U32(1)),
            Err(Error::NotFound)
        );
    }

    #[test]
    fn null_handle_unsets_slot() {
        let mut filter = ConfigFilter::new();
        let mut display = 0u8;
        let handle = DeviceHandle(&mut display as *mut u8 as *mut _);

        filter.set_property("mfxHDL", Variant::Handle(handle)).unwrap();
        assert!(filter.is_set(Prop::Handle));

        assert_eq!(
            filter.set_property("mfxHDL", Variant::Handle(DeviceHandle(std::ptr::null_mut()))),
            Err(Error::NullArgument)
        );
        assert!(!filter.is_set(Prop::Handle));
    }

    #[test]
    fn slots_are_independent() {
        let mut filter = ConfigFilter::new();
        filter.set_property("mfxImplDescription.VendorID", Variant::U32(0x8086)).unwrap();
        filter.set_property("mfxImplDescription.ImplName", "mfx-gen".into()).unwrap();
        filter.set_property("mfxImplDescription.VendorID", Variant::U32(0x1002)).unwrap();

        assert_eq!(filter.u32(Prop::VendorId), Some(0x1002));
        assert_eq!(filter.string(Prop::ImplName), Some("mfx-gen"));
        assert_eq!(
            filter.iter().map(|(p, _)| p).collect::<Vec<_>>(),
            vec![Prop::ImplName, Prop::VendorId]
        );
    }

    #[test]
    fn special_last_value_wins() {
        let mut first = ConfigFilter::new();
        first.set_property("NumThread", Variant::U32(2)).unwrap();
        first.set_property("mfxImplDescription.AccelerationMode", Variant::U32(0x0400)).unwrap();
        first
            .set_property("ExtBuffer", Variant::ExtBuffer(ExtBuffer::new(1, &[1, 2, 3, 4])))
            .unwrap();

        let mut second = ConfigFilter::new();
        second.set_property("NumThread", Variant::U32(8)).unwrap();
        second.set_property("ExtBuffer", Variant::ExtBuffer(ExtBuffer::new(2, &[]))).unwrap();

        let special = SpecialConfig::collect(&[first, second]);
        assert_eq!(special.num_thread, Some(8));
        assert_eq!(special.acceleration_mode, Some(0x0400));
        assert_eq!(special.ext_buffers.iter().map(ExtBuffer::id).collect::<Vec<_>>(), vec![1, 2]);
        assert!(!special.wants_d3d9());
    }

    #[test]
    fn api_version_from_separate_filters() {
        let mut major = ConfigFilter::new();
        major.set_property("mfxImplDescription.ApiVersion.Major", Variant::U16(2)).unwrap();
        assert_eq!(SpecialConfig::collect(std::slice::from_ref(&major)).api_version, None);

        let mut minor = ConfigFilter::new();
        minor.set_property("mfxImplDescription.ApiVersion.Minor", Variant::U16(6)).unwrap();
        assert_eq!(
            SpecialConfig::collect(&[major, minor]).api_version,
            Some(ApiVersion::new(2, 6))
        );

        let mut whole = ConfigFilter::new();
        whole
            .set_property("mfxImplDescription.ApiVersion.Version", Variant::U32(0x0002_0004))
            .unwrap();
        assert_eq!(
            SpecialConfig::collect(&[whole]).api_version,
            Some(ApiVersion::new(2, 4))
        );
    }
}
