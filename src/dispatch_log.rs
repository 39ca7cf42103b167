// Copyright 2025 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Optional trace of the dispatcher's activity, enabled through the environment.
//!
//! Everything is always forwarded to the `log` facade at debug level. When
//! `ONEVPL_DISPATCHER_LOG=ON`, messages are additionally written to `ONEVPL_DISPATCHER_LOG_FILE`,
//! or to standard output if no file was given.

use std::cell::Cell;
use std::cell::RefCell;
use std::fmt;
use std::fs::File;
use std::io::LineWriter;
use std::io::Write;

use crate::env::Environment;

pub(crate) struct DispatchLog {
    sink: Option<RefCell<Box<dyn Write>>>,
    /// Set once writing to the sink failed, so the failure is only reported once.
    sink_failed: Cell<bool>,
}

impl DispatchLog {
    pub(crate) fn disabled() -> Self {
        Self { sink: None, sink_failed: Cell::new(false) }
    }

    pub(crate) fn from_env(env: &Environment) -> Self {
        if !env.log_enabled() {
            return Self::disabled();
        }

        let sink: Box<dyn Write> = match &env.log_file {
            Some(path) => match File::create(path) {
                Ok(file) => Box::new(LineWriter::new(file)),
                Err(e) => {
                    log::warn!("cannot open dispatcher log {}: {}", path.display(), e);
                    Box::new(std::io::stdout())
                }
            },
            None => Box::new(std::io::stdout()),
        };

        Self { sink: Some(RefCell::new(sink)), sink_failed: Cell::new(false) }
    }

    pub(crate) fn message(&self, args: fmt::Arguments) {
        log::debug!("{}", args);

        self.write_line(format_args!("message:  {}", args));
    }

    /// Traces entry into `function`, and its exit when the returned guard is dropped.
    pub(crate) fn scope(&self, function: &'static str) -> FunctionScope<'_> {
        self.write_marker(function, "enter");
        FunctionScope { log: self, function }
    }

    fn write_marker(&self, function: &str, marker: &str) {
        log::trace!("function: {} ({})", function, marker);

        self.write_line(format_args!("function: {} ({})", function, marker));
    }

    /// Writes `line` to the sink, if any. Dispatching goes on if that fails.
    fn write_line(&self, line: fmt::Arguments) {
        let Some(sink) = &self.sink else {
            return;
        };

        if let Err(e) = writeln!(sink.borrow_mut(), "{}", line) {
            if !self.sink_failed.replace(true) {
                log::warn!("failed to write to the dispatcher log: {}", e);
            }
        }
    }
}

pub(crate) struct FunctionScope<'a> {
    log: &'a DispatchLog,
    function: &'static str,
}

impl Drop for FunctionScope<'_> {
    fn drop(&mut self) {
        self.log.write_marker(self.function, "return");
    }
}

macro_rules! dispatch_msg {
    ($log:expr, $($arg:tt)+) => {
        $log.message(format_args!($($arg)+))
    };
}

pub(crate) use dispatch_msg;
