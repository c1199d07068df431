// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Boot trace.
//!
//! Boot runs before any console or log task exists, so everything the
//! framework wants to say goes into a fixed-size ring of [`Trace`] events
//! that a debugger can read back. The ring works like the task ring buffers:
//! each entry records the source line that produced it along with its
//! payload, and recording the same (line, payload) twice in a row bumps the
//! count on the existing entry instead of consuming a new one.
//!
//! Errors are also tallied per [`ErrorKind`], so that they stay visible
//! after the ring has wrapped.

use abi::{AppId, DeviceName, ObjectRef, Priority, Role, SysService};

use crate::descs::PartitionSet;
use crate::err::{ConfigError, ResolveError};

/// Number of entries in a `BootLog`.
pub const BOOT_LOG_ENTRIES: usize = 128;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Trace {
    None,
    PartitionInit {
        index: u8,
    },
    /// Slot has no entry point registered.
    Unpopulated(AppId),
    /// Slot has an entry point but no resource table entry.
    NoResources(AppId),
    Config(ConfigError),
    ThreadCreated {
        app: AppId,
        priority: Priority,
        user: bool,
    },
    ObjectGranted {
        app: AppId,
        object: ObjectRef,
    },
    ObjectGrantFailed {
        app: AppId,
        object: ObjectRef,
    },
    PoolAssigned(AppId),
    DomainBuilt {
        app: AppId,
        partitions: PartitionSet,
    },
    NoDeviceRequest(AppId),
    DeviceGranted {
        app: AppId,
        device: DeviceName,
    },
    Resolve(ResolveError),
    DeviceGrantFailed {
        app: AppId,
        device: DeviceName,
    },
    ConfigCallback(AppId),
    CapabilityGranted {
        app: AppId,
        cap: SysService,
    },
    Released {
        app: AppId,
        role: Role,
    },
    BootDone {
        services: u8,
        apps: u8,
    },
}

/// Classes of error the log keeps a running count of.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ErrorKind {
    Config,
    ObjectGrant,
    DeviceBind,
    DeviceGrant,
}

impl ErrorKind {
    const COUNT: usize = 4;

    fn index(self) -> usize {
        match self {
            Self::Config => 0,
            Self::ObjectGrant => 1,
            Self::DeviceBind => 2,
            Self::DeviceGrant => 3,
        }
    }
}

impl Trace {
    /// The error class of this event, or `None` for informational events.
    pub fn error_kind(&self) -> Option<ErrorKind> {
        match self {
            Self::Config(_) => Some(ErrorKind::Config),
            Self::ObjectGrantFailed { .. } => Some(ErrorKind::ObjectGrant),
            Self::Resolve(_) => Some(ErrorKind::DeviceBind),
            Self::DeviceGrantFailed { .. } => Some(ErrorKind::DeviceGrant),
            _ => None,
        }
    }
}

impl From<ConfigError> for Trace {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

impl From<ResolveError> for Trace {
    fn from(e: ResolveError) -> Self {
        Self::Resolve(e)
    }
}

/// One slot in the ring.
#[derive(Copy, Clone, Debug)]
pub struct LogEntry {
    pub line: u16,
    pub generation: u16,
    pub count: u32,
    pub payload: Trace,
}

const EMPTY_ENTRY: LogEntry = LogEntry {
    line: 0,
    generation: 0,
    count: 0,
    payload: Trace::None,
};

#[derive(Debug)]
pub struct BootLog {
    last: Option<usize>,
    buffer: [LogEntry; BOOT_LOG_ENTRIES],
    counts: [u32; ErrorKind::COUNT],
}

impl Default for BootLog {
    fn default() -> Self {
        Self::new()
    }
}

impl BootLog {
    pub const fn new() -> Self {
        Self {
            last: None,
            buffer: [EMPTY_ENTRY; BOOT_LOG_ENTRIES],
            counts: [0; ErrorKind::COUNT],
        }
    }

    /// Records `payload` as produced by source line `line`. Use the
    /// `boot_trace!` macro rather than calling this directly.
    pub fn entry(&mut self, line: u16, payload: Trace) {
        if let Some(kind) = payload.error_kind() {
            let c = &mut self.counts[kind.index()];
            *c = c.saturating_add(1);
        }

        // A repeat of the newest entry only bumps its count.
        if let Some(last) = self.last {
            let newest = &mut self.buffer[last];
            if newest.line == line && newest.payload == payload {
                if let Some(count) = newest.count.checked_add(1) {
                    newest.count = count;
                    return;
                }
            }
        }

        let next = self.last.map_or(0, |last| (last + 1) % BOOT_LOG_ENTRIES);
        let generation = self.buffer[next].generation.wrapping_add(1);
        self.buffer[next] = LogEntry {
            line,
            generation,
            count: 1,
            payload,
        };
        self.last = Some(next);
    }

    /// Total number of errors recorded so far.
    pub fn errors(&self) -> u32 {
        self.counts.iter().sum()
    }

    /// Number of errors of `kind` recorded so far.
    pub fn count(&self, kind: ErrorKind) -> u32 {
        self.counts[kind.index()]
    }

    /// Iterates over live entries, oldest first.
    pub fn entries(&self) -> impl Iterator<Item = &LogEntry> + '_ {
        let start = match self.last {
            Some(last) => last + 1,
            None => 0,
        };
        let (newer, older) = self.buffer.split_at(start.min(self.buffer.len()));
        older.iter().chain(newer.iter()).filter(|e| e.count != 0)
    }

    /// Iterates over the payloads of live entries, oldest first. Repeated
    /// events appear once.
    pub fn events(&self) -> impl Iterator<Item = Trace> + '_ {
        self.entries().map(|e| e.payload)
    }

    /// Checks whether `event` is still in the ring.
    pub fn contains(&self, event: &Trace) -> bool {
        self.events().any(|e| e == *event)
    }

    /// Number of times `event` was recorded, as far as the ring remembers.
    pub fn occurrences(&self, event: &Trace) -> u32 {
        self.entries()
            .filter(|e| e.payload == *event)
            .map(|e| e.count)
            .sum()
    }
}

/// Records an event in a `BootLog`, tagged with the current source line.
macro_rules! boot_trace {
    ($log:expr, $payload:expr) => {
        $log.entry(line!() as u16, $crate::trace::Trace::from($payload))
    };
}
pub(crate) use boot_trace;
