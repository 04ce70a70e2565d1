//! 就绪多路复用器
//! The readiness multiplexer.
//!
//! An application registers transport sockets and native descriptors with a
//! descriptor, then waits on it for any of them to become ready. Transport
//! socket readiness is pushed in by the engine through the `enable_*` /
//! `disable_*` calls and is edge-triggered: it persists until the engine
//! clears it. Native descriptors are polled through the operating system.

mod descriptor;
mod native;


pub use descriptor::{Interest, ReadyEvents};

use crate::{
    config::EpollConfig,
    error::{Error, Result},
};
use dashmap::DashMap;
use descriptor::{Descriptor, Direction};
use native::NativePoller;
use std::{
    collections::BTreeSet,
    fmt,
    os::fd::RawFd,
    sync::atomic::{AtomicU32, AtomicUsize, Ordering},
    time::Duration,
};
use tokio::time::Instant;
use tracing::{debug, trace};

/// The identifier of a transport socket, as assigned by the engine.
pub type SocketId = u32;

/// The identifier of a readiness descriptor.
///
/// Identifiers are handed out in increasing order and never reused by the
/// multiplexer that created them.
///
/// 就绪描述符的标识符。
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EpollId(u32);

impl EpollId {
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    pub const fn as_raw(self) -> u32 {
        self.0
    }
}

impl fmt::Display for EpollId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A registry of readiness descriptors.
///
/// `Epoll` is shared between the application and the engine, typically behind
/// an `Arc`. Id allocation and the descriptor table are synchronized
/// separately, so readiness updates never wait on descriptor creation.
///
/// 就绪描述符的注册表。通常通过 `Arc` 在应用和引擎之间共享。
#[derive(Debug)]
pub struct Epoll {
    config: EpollConfig,
    /// The next identifier to hand out.
    next_id: AtomicU32,
    /// Live descriptors, counted separately so the limit holds under contention.
    live: AtomicUsize,
    descriptors: DashMap<EpollId, Descriptor>,
}

impl Epoll {
    pub fn new(config: EpollConfig) -> Self {
        Self {
            config,
            next_id: AtomicU32::new(1),
            live: AtomicUsize::new(0),
            descriptors: DashMap::new(),
        }
    }

    /// Creates a new, empty descriptor.
    ///
    /// Fails with [`Error::ResourceExhausted`] when `max_descriptors` are
    /// already live or the identifier space is used up, and with
    /// [`Error::SystemResource`] when the native poller cannot be created.
    ///
    /// 创建一个新的空描述符。
    pub fn create(&self) -> Result<EpollId> {
        let max = self.config.max_descriptors;
        self.live
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                (n < max).then_some(n + 1)
            })
            .map_err(|_| Error::ResourceExhausted)?;

        let created = self.allocate_id().and_then(|id| {
            let native = NativePoller::new(self.config.native_event_capacity)
                .map_err(Error::SystemResource)?;
            Ok((id, native))
        });
        let (id, native) = match created {
            Ok(created) => created,
            Err(e) => {
                self.live.fetch_sub(1, Ordering::AcqRel);
                return Err(e);
            }
        };

        self.descriptors.insert(id, Descriptor::new(native));
        debug!(epoll_id = %id, live = self.len(), "Epoll descriptor created");
        Ok(id)
    }

    fn allocate_id(&self) -> Result<EpollId> {
        self.next_id
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |id| id.checked_add(1))
            .map(EpollId)
            .map_err(|_| Error::ResourceExhausted)
    }

    /// Starts watching `sockets` and `natives` on descriptor `id`. Sockets
    /// already watched are left as they are; natives already watched are
    /// registered again. If any native cannot be registered, nothing is added.
    ///
    /// A native should be removed before it is closed. Adding its number
    /// again after reuse re-arms it for the new file.
    ///
    /// 开始在描述符 `id` 上监视 `sockets` 和 `natives`。注册失败时不做任何更改。
    pub fn add(
        &self,
        id: EpollId,
        sockets: impl IntoIterator<Item = SocketId>,
        natives: impl IntoIterator<Item = RawFd>,
    ) -> Result<()> {
        let mut desc = self
            .descriptors
            .get_mut(&id)
            .ok_or(Error::InvalidDescriptor(id))?;
        let natives_added = desc.watch_natives(natives)?;
        desc.watch_sockets(sockets);
        if natives_added {
            // A waiter without natives sleeps on the notifier alone.
            desc.wake();
        }
        trace!(
            epoll_id = %id,
            sockets = desc.watched.len(),
            natives = desc.natives.len(),
            "Epoll watch set extended"
        );
        Ok(())
    }

    /// Stops watching `sockets` and `natives` on descriptor `id`. Their
    /// readiness is dropped with them.
    ///
    /// 停止在描述符 `id` 上监视 `sockets` 和 `natives`，其就绪状态一并清除。
    pub fn remove(
        &self,
        id: EpollId,
        sockets: impl IntoIterator<Item = SocketId>,
        natives: impl IntoIterator<Item = RawFd>,
    ) -> Result<()> {
        let mut desc = self
            .descriptors
            .get_mut(&id)
            .ok_or(Error::InvalidDescriptor(id))?;
        desc.unwatch_sockets(sockets);
        desc.unwatch_natives(natives)?;
        trace!(
            epoll_id = %id,
            sockets = desc.watched.len(),
            natives = desc.natives.len(),
            "Epoll watch set reduced"
        );
        Ok(())
    }

    /// Waits until an entity watched by `id` is ready in one of the sets
    /// selected by `interest`.
    ///
    /// `None` waits indefinitely and `Some(Duration::ZERO)` checks once.
    /// Returns [`Error::Timeout`] if nothing became ready in time, and
    /// [`Error::InvalidDescriptor`] if `id` is unknown or is released while
    /// waiting. Waits on the same descriptor from several tasks are not
    /// serialized: every one of them is woken and may report the same events.
    ///
    /// 等待 `id` 监视的实体在 `interest` 选择的集合中就绪。
    pub async fn wait(
        &self,
        id: EpollId,
        interest: Interest,
        timeout: Option<Duration>,
    ) -> Result<ReadyEvents> {
        let deadline = timeout.map(|t| Instant::now() + t);

        loop {
            let notify = self
                .descriptors
                .get(&id)
                .ok_or(Error::InvalidDescriptor(id))?
                .notifier();
            let notified = notify.notified();
            tokio::pin!(notified);
            // Register before inspecting the sets so no wake-up is lost.
            notified.as_mut().enable();

            let (events, has_natives) = {
                let desc = self
                    .descriptors
                    .get(&id)
                    .ok_or(Error::InvalidDescriptor(id))?;
                (desc.collect(interest)?, !desc.natives.is_empty())
            };
            if !events.is_empty() {
                trace!(epoll_id = %id, ready = events.len(), "Epoll wait satisfied");
                return Ok(events);
            }

            let now = Instant::now();
            if deadline.is_some_and(|d| now >= d) {
                return Err(Error::Timeout);
            }

            let mut wake_at = deadline;
            if has_natives {
                let repoll = now + self.config.native_poll_interval;
                wake_at = Some(wake_at.map_or(repoll, |d| d.min(repoll)));
            }
            match wake_at {
                Some(at) => {
                    let _ = tokio::time::timeout_at(at, notified).await;
                }
                None => notified.await,
            }
        }
    }

    /// Releases descriptor `id`, closing its native poller. Tasks waiting on
    /// it are woken and fail with [`Error::InvalidDescriptor`].
    ///
    /// 释放描述符 `id`，关闭其本地轮询器。
    pub fn release(&self, id: EpollId) -> Result<()> {
        let (_, desc) = self
            .descriptors
            .remove(&id)
            .ok_or(Error::InvalidDescriptor(id))?;
        self.live.fetch_sub(1, Ordering::AcqRel);
        desc.wake();
        debug!(epoll_id = %id, live = self.len(), "Epoll descriptor released");
        Ok(())
    }

    /// Marks `socket` readable on every descriptor in `eids` that watches it.
    /// Released descriptors are pruned from `eids`.
    ///
    /// 在 `eids` 中每个监视 `socket` 的描述符上将其标记为可读。
    pub fn enable_read(&self, socket: SocketId, eids: &mut BTreeSet<EpollId>) {
        self.update(socket, eids, Direction::Read, true);
    }

    /// Marks `socket` writable on every descriptor in `eids` that watches it.
    pub fn enable_write(&self, socket: SocketId, eids: &mut BTreeSet<EpollId>) {
        self.update(socket, eids, Direction::Write, true);
    }

    /// Clears the read readiness of `socket` on every descriptor in `eids`.
    pub fn disable_read(&self, socket: SocketId, eids: &mut BTreeSet<EpollId>) {
        self.update(socket, eids, Direction::Read, false);
    }

    /// Clears the write readiness of `socket` on every descriptor in `eids`.
    pub fn disable_write(&self, socket: SocketId, eids: &mut BTreeSet<EpollId>) {
        self.update(socket, eids, Direction::Write, false);
    }

    fn update(
        &self,
        socket: SocketId,
        eids: &mut BTreeSet<EpollId>,
        direction: Direction,
        ready: bool,
    ) {
        eids.retain(|id| match self.descriptors.get_mut(id) {
            Some(mut desc) => {
                if desc.set_ready(socket, direction, ready) {
                    trace!(epoll_id = %id, socket, ?direction, ready, "Socket readiness changed");
                }
                true
            }
            None => {
                trace!(epoll_id = %id, socket, "Released epoll descriptor pruned");
                false
            }
        });
    }

    /// The number of live descriptors.
    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    pub fn contains(&self, id: EpollId) -> bool {
        self.descriptors.contains_key(&id)
    }
}

impl Default for Epoll {
    fn default() -> Self {
        Self::new(EpollConfig::default())
    }
}
