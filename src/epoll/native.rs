//! 本地描述符的就绪轮询
//! Readiness polling for native descriptors.
//!
//! On Linux every descriptor owns an `epoll(7)` instance that the watched
//! descriptors are registered with. Other Unix systems have no such primitive
//! in common, so there the watched set is handed to `poll(2)` on every pass.
//! Polls never block; waiting is done by the async caller.

use std::{collections::BTreeSet, os::fd::RawFd};

/// Native descriptors found ready by one poll.
#[derive(Debug, Default)]
pub(super) struct NativeReady {
    pub(super) read: BTreeSet<RawFd>,
    pub(super) write: BTreeSet<RawFd>,
}

#[cfg(target_os = "linux")]
pub(super) use self::epoll::NativePoller;
#[cfg(not(target_os = "linux"))]
pub(super) use self::poll::NativePoller;

#[cfg(target_os = "linux")]
mod epoll {
    use super::NativeReady;
    use std::{
        collections::BTreeSet,
        io,
        os::fd::{AsRawFd, FromRawFd, OwnedFd, RawFd},
    };
    use tracing::trace;

    /// An `epoll` instance, closed when dropped.
    #[derive(Debug)]
    pub(in crate::epoll) struct NativePoller {
        epfd: OwnedFd,
        capacity: usize,
    }

    impl NativePoller {
        pub(in crate::epoll) fn new(capacity: usize) -> io::Result<Self> {
            let fd = unsafe { libc::epoll_create1(libc::EPOLL_CLOEXEC) };
            if fd < 0 {
                return Err(io::Error::last_os_error());
            }
            Ok(Self {
                // SAFETY: `fd` was just returned by `epoll_create1` and is owned by nobody else.
                epfd: unsafe { OwnedFd::from_raw_fd(fd) },
                capacity: capacity.max(1),
            })
        }

        pub(in crate::epoll) fn register(&self, fd: RawFd) -> io::Result<()> {
            let mut event = libc::epoll_event {
                events: (libc::EPOLLIN | libc::EPOLLOUT) as u32,
                u64: fd as u64,
            };
            let rc = unsafe {
                libc::epoll_ctl(self.epfd.as_raw_fd(), libc::EPOLL_CTL_ADD, fd, &mut event)
            };
            if rc < 0 {
                let err = io::Error::last_os_error();
                if err.raw_os_error() != Some(libc::EEXIST) {
                    return Err(err);
                }
            }
            Ok(())
        }

        pub(in crate::epoll) fn deregister(&self, fd: RawFd) -> io::Result<()> {
            let mut event = libc::epoll_event { events: 0, u64: 0 };
            let rc = unsafe {
                libc::epoll_ctl(self.epfd.as_raw_fd(), libc::EPOLL_CTL_DEL, fd, &mut event)
            };
            if rc < 0 {
                let err = io::Error::last_os_error();
                // Already closed by its owner, which also drops it from the set.
                match err.raw_os_error() {
                    Some(libc::ENOENT) | Some(libc::EBADF) => {
                        trace!(fd, "Native descriptor was already gone");
                    }
                    _ => return Err(err),
                }
            }
            Ok(())
        }

        pub(in crate::epoll) fn poll(&self, _watched: &BTreeSet<RawFd>) -> io::Result<NativeReady> {
            let mut events = vec![libc::epoll_event { events: 0, u64: 0 }; self.capacity];
            let max_events = i32::try_from(self.capacity).unwrap_or(i32::MAX);
            let n = unsafe {
                libc::epoll_wait(self.epfd.as_raw_fd(), events.as_mut_ptr(), max_events, 0)
            };
            if n < 0 {
                let err = io::Error::last_os_error();
                if err.kind() == io::ErrorKind::Interrupted {
                    return Ok(NativeReady::default());
                }
                return Err(err);
            }

            let mut ready = NativeReady::default();
            for event in &events[..n as usize] {
                let event = *event;
                let flags = event.events;
                let fd = event.u64 as RawFd;
                // Errors and hang-ups surface as readable so the owner reads them.
                if flags & (libc::EPOLLIN | libc::EPOLLERR | libc::EPOLLHUP) as u32 != 0 {
                    ready.read.insert(fd);
                }
                if flags & libc::EPOLLOUT as u32 != 0 {
                    ready.write.insert(fd);
                }
            }
            Ok(ready)
        }
    }
}

#[cfg(not(target_os = "linux"))]
mod poll {
    use super::NativeReady;
    use std::{collections::BTreeSet, io, os::fd::RawFd};

    /// Stateless: the watched set is passed to `poll(2)` each time.
    #[derive(Debug)]
    pub(in crate::epoll) struct NativePoller;

    impl NativePoller {
        pub(in crate::epoll) fn new(_capacity: usize) -> io::Result<Self> {
            Ok(Self)
        }

        pub(in crate::epoll) fn register(&self, fd: RawFd) -> io::Result<()> {
            if unsafe { libc::fcntl(fd, libc::F_GETFD) } < 0 {
                return Err(io::Error::last_os_error());
            }
            Ok(())
        }

        pub(in crate::epoll) fn deregister(&self, _fd: RawFd) -> io::Result<()> {
            Ok(())
        }

        pub(in crate::epoll) fn poll(&self, watched: &BTreeSet<RawFd>) -> io::Result<NativeReady> {
            let mut fds: Vec<libc::pollfd> = watched
                .iter()
                .map(|&fd| libc::pollfd {
                    fd,
                    events: libc::POLLIN | libc::POLLOUT,
                    revents: 0,
                })
                .collect();
            let n = unsafe { libc::poll(fds.as_mut_ptr(), fds.len() as libc::nfds_t, 0) };
            if n < 0 {
                let err = io::Error::last_os_error();
                if err.kind() == io::ErrorKind::Interrupted {
                    return Ok(NativeReady::default());
                }
                return Err(err);
            }

            let mut ready = NativeReady::default();
            for pfd in &fds {
                if pfd.revents & libc::POLLNVAL != 0 {
                    continue;
                }
                if pfd.revents & (libc::POLLIN | libc::POLLERR | libc::POLLHUP) != 0 {
                    ready.read.insert(pfd.fd);
                }
                if pfd.revents & libc::POLLOUT != 0 {
                    ready.write.insert(pfd.fd);
                }
            }
            Ok(ready)
        }
    }
}
