// Copyright 2025 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! vplinfo, a small program listing the media runtime implementations installed on the system,
//! optionally filtered, and opening a session on the best one.

use std::str::FromStr;

use argh::FromArgs;

use vpl_dispatch::description::CODEC_AV1;
use vpl_dispatch::description::CODEC_AVC;
use vpl_dispatch::description::CODEC_HEVC;
use vpl_dispatch::description::CODEC_VP9;
use vpl_dispatch::CapsFormat;
use vpl_dispatch::Error;
use vpl_dispatch::ImplCaps;
use vpl_dispatch::ImplDescription;
use vpl_dispatch::Loader;

#[derive(Debug, PartialEq, Eq, Copy, Clone)]
enum ImplKind {
    Software,
    Hardware,
}

impl FromStr for ImplKind {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sw" | "software" => Ok(ImplKind::Software),
            "hw" | "hardware" => Ok(ImplKind::Hardware),
            _ => Err("unrecognized implementation kind. Valid values: sw, hw"),
        }
    }
}

#[derive(Debug, PartialEq, Eq, Copy, Clone)]
struct Codec(u32);

impl FromStr for Codec {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "h264" | "H264" => Ok(Codec(CODEC_AVC)),
            "h265" | "H265" => Ok(Codec(CODEC_HEVC)),
            "vp9" | "VP9" => Ok(Codec(CODEC_VP9)),
            "av1" | "AV1" => Ok(Codec(CODEC_AV1)),
            _ => Err("unrecognized codec. Valid values: h264, h265, vp9, av1"),
        }
    }
}

/// List the available media runtime implementations
#[derive(Debug, FromArgs)]
struct Args {
    /// only list implementations of this kind (sw or hw)
    #[argh(option)]
    impl_kind: Option<ImplKind>,

    /// only list implementations able to decode this codec
    #[argh(option)]
    decoder: Option<Codec>,

    /// only list implementations with this name
    #[argh(option)]
    name: Option<String>,

    /// acceleration mode to request, e.g. 0x400 for VA-API
    #[argh(option, from_str_fn(parse_hex))]
    acceleration_mode: Option<u32>,

    /// open a session on the first implementation after listing
    #[argh(switch)]
    session: bool,

    /// print the functions each implementation provides
    #[argh(switch)]
    functions: bool,
}

fn parse_hex(s: &str) -> Result<u32, String> {
    let digits = s.trim_start_matches("0x");
    u32::from_str_radix(digits, 16).map_err(|e| format!("invalid hexadecimal value {}: {}", s, e))
}

fn fourcc_to_string(code: u32) -> String {
    code.to_le_bytes().iter().map(|b| *b as char).collect::<String>().trim_end().to_string()
}

fn print_description(index: usize, desc: &ImplDescription) {
    let kind = match desc.impl_type {
        1 => "software",
        2 => "hardware",
        _ => "unknown",
    };

    println!("Implementation #{}: {}", index, desc.impl_name);
    println!("  type:              {}", kind);
    println!("  API version:       {}", desc.api_version);
    println!("  vendor:            {:#06x}", desc.vendor_id);
    println!("  device:            {}", desc.device.device_id);
    println!("  acceleration mode: {:#x}", desc.acceleration_mode);
    if !desc.license.is_empty() {
        println!("  license:           {}", desc.license);
    }

    let decoders: Vec<String> =
        desc.decoders.codecs.iter().map(|c| fourcc_to_string(c.codec_id)).collect();
    let encoders: Vec<String> =
        desc.encoders.codecs.iter().map(|c| fourcc_to_string(c.codec_id)).collect();
    println!("  decoders:          {}", decoders.join(", "));
    println!("  encoders:          {}", encoders.join(", "));
    println!("  VPP filters:       {}", desc.vpp.filters.len());
}

fn main() {
    env_logger::init();

    let args: Args = argh::from_env();
    let mut loader = Loader::new();
    let filter = loader.new_filter();

    let mut set = |name: &str, value: vpl_dispatch::Variant| {
        loader
            .set_filter_property(filter, name, value)
            .unwrap_or_else(|e| panic!("cannot set {}: {}", name, e));
    };

    if let Some(kind) = args.impl_kind {
        let value = match kind {
            ImplKind::Software => 1u32,
            ImplKind::Hardware => 2u32,
        };
        set("mfxImplDescription.Impl", value.into());
    }
    if let Some(Codec(codec)) = args.decoder {
        set("mfxImplDescription.mfxDecoderDescription.decoder.CodecID", codec.into());
    }
    if let Some(name) = &args.name {
        set("mfxImplDescription.ImplName", name.as_str().into());
    }
    if let Some(mode) = args.acceleration_mode {
        set("mfxImplDescription.AccelerationMode", mode.into());
    }

    let mut index = 0;
    loop {
        let desc = match loader.enumerate_implementation(index, CapsFormat::Description) {
            Ok(ImplCaps::Description(desc)) => desc,
            Ok(other) => panic!("unexpected capability format {:?}", other.format()),
            Err(Error::NotFound) => break,
            Err(e) => panic!("cannot enumerate implementation {}: {}", index, e),
        };
        print_description(index, &desc);

        if let Ok(ImplCaps::Path(path)) = loader.enumerate_implementation(index, CapsFormat::Path) {
            println!("  library:           {}", path.display());
        }

        if args.functions {
            match loader.enumerate_implementation(index, CapsFormat::ImplementedFunctions) {
                Ok(ImplCaps::ImplementedFunctions(functions)) => {
                    println!("  functions:         {}", functions.names.join(" "));
                }
                _ => println!("  functions:         (not reported)"),
            }
        }

        index += 1;
    }

    if index == 0 {
        println!("No implementation found");
        return;
    }

    if args.session {
        match loader.create_session(0) {
            Ok(session) => {
                let version = session
                    .api_version()
                    .map(|v| v.to_string())
                    .unwrap_or_else(|e| format!("unknown ({})", e));
                println!(
                    "Opened a session on {} (API {})",
                    session.library_path().display(),
                    version
                );
            }
            Err(e) => println!("Failed to open a session: {}", e),
        }
    }
}
