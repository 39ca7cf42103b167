// Copyright 2025 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Filter properties and their dotted names.
//!
//! Every property a [`crate::ConfigFilter`] can hold lives in one of a fixed set of slots
//! ([`Prop`]). Slots are addressed by dotted names mirroring the layout of the capability
//! description, e.g. `mfxImplDescription.mfxDecoderDescription.decoder.CodecID`, and each slot
//! declares the type of value it accepts.

use std::ffi::c_void;

use enumn::N;

use crate::description::Range32U;
use crate::session::ExtBuffer;
use crate::Error;
use crate::Result;

/// Declared type of a property slot.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum VariantType {
    U16,
    U32,
    /// Any value passed by reference: strings, ranges, handles, buffers.
    Ptr,
}

/// Opaque native device handle (e.g. a `VADisplay` or an `ID3D11Device*`).
///
/// The handle is only passed through to the runtime and never dereferenced.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct DeviceHandle(pub *mut c_void);

impl DeviceHandle {
    pub fn is_null(&self) -> bool {
        self.0.is_null()
    }
}

/// Value of a filter property.
#[derive(Clone, Debug, PartialEq)]
pub enum Variant {
    U16(u16),
    U32(u32),
    String(String),
    Range(Range32U),
    Luid([u8; 8]),
    Handle(DeviceHandle),
    ExtBuffer(ExtBuffer),
}

impl Variant {
    pub fn variant_type(&self) -> VariantType {
        match self {
            Variant::U16(_) => VariantType::U16,
            Variant::U32(_) => VariantType::U32,
            Variant::String(_)
            | Variant::Range(_)
            | Variant::Luid(_)
            | Variant::Handle(_)
            | Variant::ExtBuffer(_) => VariantType::Ptr,
        }
    }

    pub fn as_u16(&self) -> Option<u16> {
        match self {
            Variant::U16(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_u32(&self) -> Option<u32> {
        match self {
            Variant::U32(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Variant::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_range(&self) -> Option<&Range32U> {
        match self {
            Variant::Range(r) => Some(r),
            _ => None,
        }
    }
}

impl From<u16> for Variant {
    fn from(v: u16) -> Self {
        Variant::U16(v)
    }
}

impl From<u32> for Variant {
    fn from(v: u32) -> Self {
        Variant::U32(v)
    }
}

impl From<&str> for Variant {
    fn from(s: &str) -> Self {
        Variant::String(s.to_owned())
    }
}

impl From<Range32U> for Variant {
    fn from(r: Range32U) -> Self {
        Variant::Range(r)
    }
}

/// Shape of the data a pointer-typed slot refers to.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum PtrKind {
    String,
    Range,
    Luid,
    Handle,
    ExtBuffer,
}

/// Section of the description a property belongs to.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PropGroup {
    Main,
    Device,
    Decoder,
    Encoder,
    Vpp,
    ExtendedDevice,
    /// Parameters passed to the session rather than used for filtering.
    Special,
    Function,
}

/// Property slots.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, N)]
#[repr(u8)]
pub enum Prop {
    Impl,
    AccelerationMode,
    ApiVersion,
    ApiVersionMajor,
    ApiVersionMinor,
    ImplName,
    License,
    Keywords,
    VendorId,
    VendorImplId,
    PoolAllocationPolicy,

    DeviceId,
    DeviceIdStr,
    MediaAdapterType,

    DecCodecId,
    DecMaxCodecLevel,
    DecProfile,
    DecMemHandleType,
    DecWidth,
    DecHeight,
    DecColorFormat,

    EncCodecId,
    EncMaxCodecLevel,
    EncBiDirectionalPrediction,
    EncReportedStats,
    EncProfile,
    EncMemHandleType,
    EncWidth,
    EncHeight,
    EncColorFormat,

    VppFilterFourCC,
    VppMaxDelayInFrames,
    VppMemHandleType,
    VppWidth,
    VppHeight,
    VppInFormat,
    VppOutFormat,

    ExtDevVendorId,
    ExtDevDeviceId,
    ExtDevPciDomain,
    ExtDevPciBus,
    ExtDevPciDevice,
    ExtDevPciFunction,
    ExtDevDeviceLuid,
    ExtDevLuidDeviceNodeMask,
    ExtDevDrmRenderNodeNum,
    ExtDevDrmPrimaryNodeNum,
    ExtDevRevisionId,
    ExtDevDeviceName,

    HandleType,
    Handle,
    NumThread,
    DeviceCopy,
    ExtBuffer,
    AdapterIndex,

    FunctionName,
}

impl Prop {
    pub const COUNT: usize = Prop::FunctionName as usize + 1;

    /// All slots, in slot order.
    pub fn all() -> impl Iterator<Item = Prop> {
        (0..Self::COUNT as u8).filter_map(Prop::n)
    }

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn declared_type(self) -> VariantType {
        use Prop::*;

        match self {
            ApiVersionMajor | ApiVersionMinor | DeviceId | MediaAdapterType | DecMaxCodecLevel
            | EncMaxCodecLevel | EncBiDirectionalPrediction | EncReportedStats
            | VppMaxDelayInFrames | ExtDevVendorId | ExtDevDeviceId | ExtDevRevisionId
            | DeviceCopy => VariantType::U16,
            Impl | AccelerationMode | ApiVersion | VendorId | VendorImplId
            | PoolAllocationPolicy | DecCodecId | DecProfile | DecMemHandleType
            | DecColorFormat | EncCodecId | EncProfile | EncMemHandleType | EncColorFormat
            | VppFilterFourCC | VppMemHandleType | VppInFormat | VppOutFormat | ExtDevPciDomain
            | ExtDevPciBus | ExtDevPciDevice | ExtDevPciFunction | ExtDevLuidDeviceNodeMask
            | ExtDevDrmRenderNodeNum | ExtDevDrmPrimaryNodeNum | HandleType | NumThread
            | AdapterIndex => VariantType::U32,
            _ => VariantType::Ptr,
        }
    }

    fn ptr_kind(self) -> Option<PtrKind> {
        use Prop::*;

        match self {
            ImplName | License | Keywords | DeviceIdStr | ExtDevDeviceName | FunctionName => {
                Some(PtrKind::String)
            }
            DecWidth | DecHeight | EncWidth | EncHeight | VppWidth | VppHeight => {
                Some(PtrKind::Range)
            }
            ExtDevDeviceLuid => Some(PtrKind::Luid),
            Handle => Some(PtrKind::Handle),
            ExtBuffer => Some(PtrKind::ExtBuffer),
            _ => None,
        }
    }

    pub fn group(self) -> PropGroup {
        use Prop::*;

        match self {
            Impl | AccelerationMode | ApiVersion | ApiVersionMajor | ApiVersionMinor | ImplName
            | License | Keywords | VendorId | VendorImplId | PoolAllocationPolicy => {
                PropGroup::Main
            }
            DeviceId | DeviceIdStr | MediaAdapterType => PropGroup::Device,
            DecCodecId | DecMaxCodecLevel | DecProfile | DecMemHandleType | DecWidth
            | DecHeight | DecColorFormat => PropGroup::Decoder,
            EncCodecId | EncMaxCodecLevel | EncBiDirectionalPrediction | EncReportedStats
            | EncProfile | EncMemHandleType | EncWidth | EncHeight | EncColorFormat => {
                PropGroup::Encoder
            }
            VppFilterFourCC | VppMaxDelayInFrames | VppMemHandleType | VppWidth | VppHeight
            | VppInFormat | VppOutFormat => PropGroup::Vpp,
            ExtDevVendorId | ExtDevDeviceId | ExtDevPciDomain | ExtDevPciBus | ExtDevPciDevice
            | ExtDevPciFunction | ExtDevDeviceLuid | ExtDevLuidDeviceNodeMask
            | ExtDevDrmRenderNodeNum | ExtDevDrmPrimaryNodeNum | ExtDevRevisionId
            | ExtDevDeviceName => PropGroup::ExtendedDevice,
            HandleType | Handle | NumThread | DeviceCopy | ExtBuffer | AdapterIndex => {
                PropGroup::Special
            }
            FunctionName => PropGroup::Function,
        }
    }

    /// Checks that `value` can be stored in this slot.
    ///
    /// Returns `Unsupported` if the value's type differs from the declared one, and `NullArgument`
    /// for a null device handle.
    pub fn check_value(self, value: &Variant) -> Result<()> {
        if value.variant_type() != self.declared_type() {
            return Err(Error::Unsupported);
        }

        let kind = match value {
            Variant::U16(_) | Variant::U32(_) => return Ok(()),
            Variant::String(_) => PtrKind::String,
            Variant::Range(_) => PtrKind::Range,
            Variant::Luid(_) => PtrKind::Luid,
            Variant::Handle(h) if h.is_null() => return Err(Error::NullArgument),
            Variant::Handle(_) => PtrKind::Handle,
            Variant::ExtBuffer(_) => PtrKind::ExtBuffer,
        };

        if self.ptr_kind() == Some(kind) {
            Ok(())
        } else {
            Err(Error::Unsupported)
        }
    }

    /// Resolves a dotted property name to its slot.
    ///
    /// `value` is needed because the device ID may be given either as a `U16` or as a string,
    /// which selects two different slots.
    pub fn from_name(name: &str, value: &Variant) -> Result<Prop> {
        let mut parts = name.split('.');
        let first = parts.next().unwrap_or_default();

        let prop = match first {
            "mfxHandleType" => Some(Prop::HandleType),
            "mfxHDL" => Some(Prop::Handle),
            "NumThread" => Some(Prop::NumThread),
            #[cfg(feature = "experimental")]
            "DeviceCopy" => Some(Prop::DeviceCopy),
            "ExtBuffer" => Some(Prop::ExtBuffer),
            "DXGIAdapterIndex" => Some(Prop::AdapterIndex),
            "mfxImplementedFunctions" => match parts.next() {
                Some("FunctionsName") => Some(Prop::FunctionName),
                _ => None,
            },
            #[cfg(feature = "experimental")]
            "mfxExtendedDeviceId" => parse_extended_device(parts.next()),
            "mfxImplDescription" => parse_description(&mut parts, value),
            _ => None,
        };

        prop.ok_or(Error::NotFound)
    }
}

fn parse_description<'a>(
    parts: &mut impl Iterator<Item = &'a str>,
    value: &Variant,
) -> Option<Prop> {
    let prop = match parts.next()? {
        "Impl" => Prop::Impl,
        "AccelerationMode" => Prop::AccelerationMode,
        "mfxSurfacePoolMode" => Prop::PoolAllocationPolicy,
        "ApiVersion" => match parts.next()? {
            "Version" => Prop::ApiVersion,
            "Major" => Prop::ApiVersionMajor,
            "Minor" => Prop::ApiVersionMinor,
            _ => return None,
        },
        "VendorID" => Prop::VendorId,
        "ImplName" => Prop::ImplName,
        "License" => Prop::License,
        "Keywords" => Prop::Keywords,
        "VendorImplID" => Prop::VendorImplId,
        "mfxDeviceDescription" => {
            let mut next = parts.next()?;
            // Older documentation had an extra "device" level.
            if next == "device" {
                next = parts.next()?;
            }
            match next {
                "DeviceID" if value.variant_type() == VariantType::Ptr => Prop::DeviceIdStr,
                "DeviceID" => Prop::DeviceId,
                "MediaAdapterType" => Prop::MediaAdapterType,
                _ => return None,
            }
        }
        "mfxDecoderDescription" => return parse_decoder(parts),
        "mfxEncoderDescription" => return parse_encoder(parts),
        "mfxVPPDescription" => return parse_vpp(parts),
        _ => return None,
    };

    Some(prop)
}

fn parse_decoder<'a>(parts: &mut impl Iterator<Item = &'a str>) -> Option<Prop> {
    if parts.next()? != "decoder" {
        return None;
    }
    match parts.next()? {
        "CodecID" => return Some(Prop::DecCodecId),
        "MaxcodecLevel" => return Some(Prop::DecMaxCodecLevel),
        "decprofile" => (),
        _ => return None,
    }
    match parts.next()? {
        "Profile" => return Some(Prop::DecProfile),
        "decmemdesc" => (),
        _ => return None,
    }
    match parts.next()? {
        "MemHandleType" => Some(Prop::DecMemHandleType),
        "Width" => Some(Prop::DecWidth),
        "Height" => Some(Prop::DecHeight),
        "ColorFormat" | "ColorFormats" => Some(Prop::DecColorFormat),
        _ => None,
    }
}

fn parse_encoder<'a>(parts: &mut impl Iterator<Item = &'a str>) -> Option<Prop> {
    if parts.next()? != "encoder" {
        return None;
    }
    match parts.next()? {
        "CodecID" => return Some(Prop::EncCodecId),
        "MaxcodecLevel" => return Some(Prop::EncMaxCodecLevel),
        "BiDirectionalPrediction" => return Some(Prop::EncBiDirectionalPrediction),
        #[cfg(feature = "experimental")]
        "ReportedStats" => return Some(Prop::EncReportedStats),
        "encprofile" => (),
        _ => return None,
    }
    match parts.next()? {
        "Profile" => return Some(Prop::EncProfile),
        "encmemdesc" => (),
        _ => return None,
    }
    match parts.next()? {
        "MemHandleType" => Some(Prop::EncMemHandleType),
        "Width" => Some(Prop::EncWidth),
        "Height" => Some(Prop::EncHeight),
        "ColorFormat" | "ColorFormats" => Some(Prop::EncColorFormat),
        _ => None,
    }
}

fn parse_vpp<'a>(parts: &mut impl Iterator<Item = &'a str>) -> Option<Prop> {
    if parts.next()? != "filter" {
        return None;
    }
    match parts.next()? {
        "FilterFourCC" => return Some(Prop::VppFilterFourCC),
        "MaxDelayInFrames" => return Some(Prop::VppMaxDelayInFrames),
        "memdesc" => (),
        _ => return None,
    }
    match parts.next()? {
        "MemHandleType" => return Some(Prop::VppMemHandleType),
        "Width" => return Some(Prop::VppWidth),
        "Height" => return Some(Prop::VppHeight),
        "format" => (),
        _ => return None,
    }
    match parts.next()? {
        "InFormat" => Some(Prop::VppInFormat),
        "OutFormat" | "OutFormats" => Some(Prop::VppOutFormat),
        _ => None,
    }
}

#[cfg(feature = "experimental")]
fn parse_extended_device(field: Option<&str>) -> Option<Prop> {
    let prop = match field? {
        "VendorID" => Prop::ExtDevVendorId,
        "DeviceID" => Prop::ExtDevDeviceId,
        "PCIDomain" => Prop::ExtDevPciDomain,
        "PCIBus" => Prop::ExtDevPciBus,
        "PCIDevice" => Prop::ExtDevPciDevice,
        "PCIFunction" => Prop::ExtDevPciFunction,
        "DeviceLUID" => Prop::ExtDevDeviceLuid,
        "LUIDDeviceNodeMask" => Prop::ExtDevLuidDeviceNodeMask,
        "DRMRenderNodeNum" => Prop::ExtDevDrmRenderNodeNum,
        "DRMPrimaryNodeNum" => Prop::ExtDevDrmPrimaryNodeNum,
        "RevisionID" => Prop::ExtDevRevisionId,
        "DeviceName" => Prop::ExtDevDeviceName,
        _ => return None,
    };

    Some(prop)
}
