// Copyright 2025 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Sessions opened on a selected implementation.

use std::ffi::c_void;
use std::fmt;
use std::path::Path;
use std::rc::Rc;

use crate::config::SpecialConfig;
use crate::dispatch_log::dispatch_msg;
use crate::dispatch_log::DispatchLog;
use crate::fourcc;
use crate::runtime::InitParams;
use crate::runtime::LegacyInitParams;
use crate::runtime::RawSession;
use crate::runtime::RuntimeModule;
use crate::ApiVersion;
use crate::Result;

/// Size of the header every extension buffer starts with: its ID and its total size.
const EXT_BUFFER_HEADER_SIZE: usize = 8;

/// ID of the threading parameters buffer.
pub const EXTBUFF_THREADS_PARAM: u32 = fourcc(b'T', b'H', b'D', b'P');
const THREADS_PARAM_SIZE: usize = 132;

/// Owned extension buffer passed to the runtime at session creation.
///
/// The buffer starts with the standard header (`BufferId`, `BufferSz`) followed by its payload,
/// and is kept 8-byte aligned so it can be handed to the runtime as is.
#[derive(Clone, PartialEq, Eq)]
pub struct ExtBuffer {
    words: Vec<u64>,
    len: usize,
}

impl ExtBuffer {
    /// Creates a buffer with ID `id` whose payload (the part after the header) is `payload`.
    pub fn new(id: u32, payload: &[u8]) -> Self {
        let len = EXT_BUFFER_HEADER_SIZE + payload.len();
        let mut bytes = Vec::with_capacity(len.next_multiple_of(8));
        bytes.extend_from_slice(&id.to_ne_bytes());
        bytes.extend_from_slice(&(len as u32).to_ne_bytes());
        bytes.extend_from_slice(payload);
        bytes.resize(len.next_multiple_of(8), 0);

        let words = bytes
            .chunks_exact(8)
            .map(|chunk| {
                let mut word = [0u8; 8];
                word.copy_from_slice(chunk);
                u64::from_ne_bytes(word)
            })
            .collect();

        Self { words, len }
    }

    /// Threading parameters buffer requesting `num_thread` worker threads.
    pub fn threads(num_thread: u32) -> Self {
        let mut payload = [0u8; THREADS_PARAM_SIZE - EXT_BUFFER_HEADER_SIZE];
        payload[0..2].copy_from_slice(&(num_thread as u16).to_ne_bytes());
        Self::new(EXTBUFF_THREADS_PARAM, &payload)
    }

    pub fn id(&self) -> u32 {
        // The header always occupies the first word.
        let header = self.words[0].to_ne_bytes();
        u32::from_ne_bytes([header[0], header[1], header[2], header[3]])
    }

    /// Total size of the buffer, header included.
    pub fn size(&self) -> usize {
        self.len
    }

    /// Contents of the buffer, header included.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes: Vec<u8> = self.words.iter().flat_map(|w| w.to_ne_bytes()).collect();
        bytes.truncate(self.len);
        bytes
    }

    /// Payload of the buffer, i.e. everything after the header.
    pub fn payload(&self) -> Vec<u8> {
        self.to_bytes().split_off(EXT_BUFFER_HEADER_SIZE)
    }

    /// Pointer to the start of the buffer, to be handed to the runtime.
    pub fn as_ptr(&self) -> *const c_void {
        self.words.as_ptr() as *const c_void
    }
}

impl fmt::Debug for ExtBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtBuffer").field("id", &self.id()).field("size", &self.len).finish()
    }
}

/// How a session must be initialized on its runtime.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum Initializer {
    Modern { acceleration_mode: u32, device_copy: u16, vendor_impl_id: u32 },
    Legacy { implementation: u32, version: ApiVersion },
}

/// An open session on a runtime implementation. The session is closed when dropped.
pub struct Session {
    module: Rc<dyn RuntimeModule>,
    raw: Option<RawSession>,
}

impl Session {
    /// Native session handle, for use with the runtime's own entrypoints.
    pub fn raw(&self) -> Option<RawSession> {
        self.raw
    }

    /// Path of the library providing this session.
    pub fn library_path(&self) -> &Path {
        self.module.path()
    }

    /// API version implemented by the session.
    pub fn api_version(&self) -> Result<ApiVersion> {
        let raw = self.raw.ok_or(crate::Error::InvalidHandle)?;
        self.module.query_version(raw)
    }

    /// Closes the session, returning any error reported by the runtime.
    pub fn close(mut self) -> Result<()> {
        match self.raw.take() {
            Some(raw) => self.module.close(raw),
            None => Ok(()),
        }
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("library", &self.module.path())
            .field("raw", &self.raw)
            .finish()
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if let Some(raw) = self.raw.take() {
            if let Err(e) = self.module.close(raw) {
                log::warn!("failed to close session: {}", e);
            }
        }
    }
}

/// Opens a session on `module` with the parameters in `special`.
///
/// A threading parameters buffer is attached first if a thread count was requested, followed by
/// the user's extension buffers. If a device handle was given, it is set on the new session.
pub(crate) fn bind(
    module: Rc<dyn RuntimeModule>,
    init: Initializer,
    special: &SpecialConfig,
    log: &DispatchLog,
) -> Result<Session> {
    let mut ext_buffers = Vec::with_capacity(special.ext_buffers.len() + 1);
    if let Some(num_thread) = special.num_thread {
        dispatch_msg!(log, "extension buffer enabled, num_thread = {}", num_thread);
        ext_buffers.push(ExtBuffer::threads(num_thread));
    }
    ext_buffers.extend(special.ext_buffers.iter().cloned());

    let raw = match init {
        Initializer::Modern { acceleration_mode, device_copy, vendor_impl_id } => {
            dispatch_msg!(
                log,
                "initializing {} with mode {:#x}, implementation {}",
                module.path().display(),
                acceleration_mode,
                vendor_impl_id
            );
            module.initialize(&InitParams {
                acceleration_mode,
                device_copy,
                vendor_impl_id,
                ext_buffers: &ext_buffers,
            })?
        }
        Initializer::Legacy { implementation, version } => {
            dispatch_msg!(
                log,
                "initializing legacy {} with implementation {:#x}, API {}",
                module.path().display(),
                implementation,
                version
            );
            module.init_legacy(&LegacyInitParams {
                implementation,
                version,
                ext_buffers: &ext_buffers,
            })?
        }
    };

    let session = Session { module, raw: Some(raw) };

    if let (Some(handle_type), Some(handle)) = (special.handle_type, special.handle) {
        if handle_type != 0 && !handle.is_null() {
            session.module.set_handle(raw, handle_type, handle)?;
        }
    }

    Ok(session)
}
