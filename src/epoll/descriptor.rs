//! A single readiness descriptor and the events a wait reports.

use super::{native::NativePoller, SocketId};
use std::{collections::BTreeSet, io, os::fd::RawFd, sync::Arc};
use tokio::sync::Notify;
use tracing::warn;

/// Which ready sets a wait should inspect.
///
/// 等待时要检查的就绪集合。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interest {
    pub read: bool,
    pub write: bool,
    pub native_read: bool,
    pub native_write: bool,
}

impl Interest {
    /// Every set, transport and native.
    pub const ALL: Self = Self {
        read: true,
        write: true,
        native_read: true,
        native_write: true,
    };

    /// Readable transport sockets and native descriptors.
    pub const READ: Self = Self {
        read: true,
        write: false,
        native_read: true,
        native_write: false,
    };

    /// Writable transport sockets and native descriptors.
    pub const WRITE: Self = Self {
        read: false,
        write: true,
        native_read: false,
        native_write: true,
    };

    fn any_native(&self) -> bool {
        self.native_read || self.native_write
    }
}

impl Default for Interest {
    fn default() -> Self {
        Self::ALL
    }
}

/// The entities a wait found ready. Sets not selected by the wait's
/// [`Interest`] are always empty.
///
/// 一次等待发现的就绪实体。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReadyEvents {
    pub read: BTreeSet<SocketId>,
    pub write: BTreeSet<SocketId>,
    pub native_read: BTreeSet<RawFd>,
    pub native_write: BTreeSet<RawFd>,
}

impl ReadyEvents {
    /// The total number of ready entries across all four sets. An entity
    /// ready in both directions counts twice.
    pub fn len(&self) -> usize {
        self.read.len() + self.write.len() + self.native_read.len() + self.native_write.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Direction {
    Read,
    Write,
}

/// Watch and ready sets of one descriptor.
///
/// `ready_read` and `ready_write` are always subsets of `watched`.
#[derive(Debug)]
pub(super) struct Descriptor {
    pub(super) watched: BTreeSet<SocketId>,
    pub(super) natives: BTreeSet<RawFd>,
    ready_read: BTreeSet<SocketId>,
    ready_write: BTreeSet<SocketId>,
    notify: Arc<Notify>,
    poller: NativePoller,
}

impl Descriptor {
    pub(super) fn new(poller: NativePoller) -> Self {
        Self {
            watched: BTreeSet::new(),
            natives: BTreeSet::new(),
            ready_read: BTreeSet::new(),
            ready_write: BTreeSet::new(),
            notify: Arc::new(Notify::new()),
            poller,
        }
    }

    pub(super) fn notifier(&self) -> Arc<Notify> {
        self.notify.clone()
    }

    pub(super) fn wake(&self) {
        self.notify.notify_waiters();
    }

    pub(super) fn watch_sockets(&mut self, sockets: impl IntoIterator<Item = SocketId>) {
        self.watched.extend(sockets);
    }

    /// Registers `fds` with the native poller, all of them or none. Returns
    /// whether any was new.
    ///
    /// Descriptors already watched are registered again: the kernel forgets
    /// a closed descriptor, and its number may since belong to another file.
    pub(super) fn watch_natives(&mut self, fds: impl IntoIterator<Item = RawFd>) -> io::Result<bool> {
        let mut fresh = Vec::new();
        for fd in fds {
            if let Err(err) = self.poller.register(fd) {
                for &fd in &fresh {
                    if let Err(e) = self.poller.deregister(fd) {
                        warn!(fd, error = %e, "Failed to roll back native registration");
                    }
                }
                return Err(err);
            }
            if !self.natives.contains(&fd) && !fresh.contains(&fd) {
                fresh.push(fd);
            }
        }
        let added = !fresh.is_empty();
        self.natives.extend(fresh);
        Ok(added)
    }

    pub(super) fn unwatch_sockets(&mut self, sockets: impl IntoIterator<Item = SocketId>) {
        for socket in sockets {
            self.watched.remove(&socket);
            self.ready_read.remove(&socket);
            self.ready_write.remove(&socket);
        }
    }

    pub(super) fn unwatch_natives(&mut self, fds: impl IntoIterator<Item = RawFd>) -> io::Result<()> {
        for fd in fds {
            if self.natives.remove(&fd) {
                self.poller.deregister(fd)?;
            }
        }
        Ok(())
    }

    /// Sets or clears the readiness of a watched socket, waking waiters when
    /// it becomes ready. Returns whether the ready set changed.
    pub(super) fn set_ready(&mut self, socket: SocketId, direction: Direction, ready: bool) -> bool {
        if ready && !self.watched.contains(&socket) {
            return false;
        }
        let set = match direction {
            Direction::Read => &mut self.ready_read,
            Direction::Write => &mut self.ready_write,
        };
        let changed = if ready {
            set.insert(socket)
        } else {
            set.remove(&socket)
        };
        if ready {
            self.wake();
        }
        changed
    }

    /// Snapshots the ready sets selected by `interest`, polling natives once.
    pub(super) fn collect(&self, interest: Interest) -> io::Result<ReadyEvents> {
        let mut events = ReadyEvents::default();
        if interest.read {
            events.read = self.ready_read.clone();
        }
        if interest.write {
            events.write = self.ready_write.clone();
        }
        if interest.any_native() && !self.natives.is_empty() {
            let native = self.poller.poll(&self.natives)?;
            if interest.native_read {
                events.native_read = native.read;
            }
            if interest.native_write {
                events.native_write = native.write;
            }
        }
        Ok(events)
    }
}
