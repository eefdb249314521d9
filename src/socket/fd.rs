//! Adapters over raw Unix descriptors.
//!
//! Message-oriented sockets go through `recvmsg(2)`/`sendmsg(2)` so a
//! datagram buffer receives and sends exactly one kernel message per call.
//! Byte streams and plain files go through `readv(2)`/`writev(2)`.
#![allow(unsafe_code)]

use std::io::{self, IoSlice, IoSliceMut};
use std::mem;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr, SocketAddrV4, SocketAddrV6};
use std::os::unix::io::RawFd;

use super::{io_slices, io_slices_mut, would_block};
use crate::storage::RingBuffer;
use crate::time::Instant;

bitflags::bitflags! {
    /// Flags passed through to `recvmsg(2)` and `sendmsg(2)`.
    pub struct MsgFlags: libc::c_int {
        const DONTWAIT = libc::MSG_DONTWAIT;
        const PEEK = libc::MSG_PEEK;
        const TRUNC = libc::MSG_TRUNC;
        const WAITALL = libc::MSG_WAITALL;
        #[cfg(not(any(target_os = "macos", target_os = "ios")))]
        const NOSIGNAL = libc::MSG_NOSIGNAL;
    }
}

fn cvt(ret: libc::ssize_t) -> io::Result<usize> {
    if ret < 0 {
        Err(io::Error::last_os_error())
    } else {
        Ok(ret as usize)
    }
}

fn recvmsg(
    fd: RawFd,
    iov: &mut [IoSliceMut<'_>],
    name: Option<&mut (libc::sockaddr_storage, libc::socklen_t)>,
    flags: MsgFlags,
) -> io::Result<usize> {
    let mut msg: libc::msghdr = unsafe { mem::zeroed() };
    msg.msg_iov = iov.as_mut_ptr() as *mut libc::iovec;
    msg.msg_iovlen = iov.len() as _;

    let ret = match name {
        Some((storage, len)) => {
            msg.msg_name = storage as *mut libc::sockaddr_storage as *mut libc::c_void;
            msg.msg_namelen = mem::size_of::<libc::sockaddr_storage>() as libc::socklen_t;
            let ret = unsafe { libc::recvmsg(fd, &mut msg, flags.bits()) };
            *len = msg.msg_namelen;
            ret
        }
        None => unsafe { libc::recvmsg(fd, &mut msg, flags.bits()) },
    };

    // With MSG_TRUNC the kernel reports the full datagram length.
    let capacity: usize = iov.iter().map(|s| s.len()).sum();
    cvt(ret).map(|n| n.min(capacity))
}

fn sendmsg(
    fd: RawFd,
    iov: &[IoSlice<'_>],
    name: Option<&(libc::sockaddr_storage, libc::socklen_t)>,
    flags: MsgFlags,
) -> io::Result<usize> {
    let mut msg: libc::msghdr = unsafe { mem::zeroed() };
    msg.msg_iov = iov.as_ptr() as *mut libc::iovec;
    msg.msg_iovlen = iov.len() as _;
    if let Some((storage, len)) = name {
        msg.msg_name = storage as *const libc::sockaddr_storage as *mut libc::c_void;
        msg.msg_namelen = *len;
    }
    cvt(unsafe { libc::sendmsg(fd, &msg, flags.bits()) })
}

fn sockaddr_to_addr(storage: &libc::sockaddr_storage, len: libc::socklen_t) -> Option<SocketAddr> {
    let len = len as usize;
    match storage.ss_family as libc::c_int {
        libc::AF_INET if len >= mem::size_of::<libc::sockaddr_in>() => {
            let sin = unsafe { &*(storage as *const _ as *const libc::sockaddr_in) };
            let ip = Ipv4Addr::from(u32::from_be(sin.sin_addr.s_addr));
            Some(SocketAddr::V4(SocketAddrV4::new(ip, u16::from_be(sin.sin_port))))
        }
        libc::AF_INET6 if len >= mem::size_of::<libc::sockaddr_in6>() => {
            let sin6 = unsafe { &*(storage as *const _ as *const libc::sockaddr_in6) };
            Some(SocketAddr::V6(SocketAddrV6::new(
                Ipv6Addr::from(sin6.sin6_addr.s6_addr),
                u16::from_be(sin6.sin6_port),
                sin6.sin6_flowinfo,
                sin6.sin6_scope_id,
            )))
        }
        _ => None,
    }
}

fn addr_to_sockaddr(addr: &SocketAddr) -> (libc::sockaddr_storage, libc::socklen_t) {
    let mut storage: libc::sockaddr_storage = unsafe { mem::zeroed() };
    let len = match addr {
        SocketAddr::V4(addr) => {
            let sin = unsafe { &mut *(&mut storage as *mut _ as *mut libc::sockaddr_in) };
            sin.sin_family = libc::AF_INET as libc::sa_family_t;
            sin.sin_port = addr.port().to_be();
            sin.sin_addr.s_addr = u32::from(*addr.ip()).to_be();
            mem::size_of::<libc::sockaddr_in>()
        }
        SocketAddr::V6(addr) => {
            let sin6 = unsafe { &mut *(&mut storage as *mut _ as *mut libc::sockaddr_in6) };
            sin6.sin6_family = libc::AF_INET6 as libc::sa_family_t;
            sin6.sin6_port = addr.port().to_be();
            sin6.sin6_flowinfo = addr.flowinfo();
            sin6.sin6_addr.s6_addr = addr.ip().octets();
            sin6.sin6_scope_id = addr.scope_id();
            mem::size_of::<libc::sockaddr_in6>()
        }
    };
    (storage, len as libc::socklen_t)
}

impl<'a> RingBuffer<'a> {
    /// Receive into the buffer with one `recvmsg(2)` call on `fd`.
    ///
    /// In datagram mode the received message is stored as one message; a
    /// message longer than the free space is truncated by the kernel.
    pub fn recv(&mut self, fd: RawFd, flags: MsgFlags, now: Instant) -> io::Result<usize> {
        let size = self.enqueue_vectored_with(|spans| {
            if spans.is_empty() {
                return Err(would_block());
            }
            recvmsg(fd, &mut io_slices_mut(spans), None, flags)
        })?;

        net_trace!("socket: fd {} received {} bytes", fd, size);
        self.mark_recv(now);
        Ok(size)
    }

    /// Like [recv](#method.recv), also returning the address of the sender
    /// when it is an IPv4 or IPv6 peer.
    pub fn recv_from(
        &mut self,
        fd: RawFd,
        flags: MsgFlags,
        now: Instant,
    ) -> io::Result<(usize, Option<SocketAddr>)> {
        let mut name = (unsafe { mem::zeroed::<libc::sockaddr_storage>() }, 0);
        let size = self.enqueue_vectored_with(|spans| {
            if spans.is_empty() {
                return Err(would_block());
            }
            recvmsg(fd, &mut io_slices_mut(spans), Some(&mut name), flags)
        })?;

        net_trace!("socket: fd {} received {} bytes", fd, size);
        self.mark_recv(now);
        Ok((size, sockaddr_to_addr(&name.0, name.1)))
    }

    /// Send from the buffer with one `sendmsg(2)` call on a connected `fd`.
    ///
    /// In datagram mode exactly the message at the head is sent.
    pub fn send(&mut self, fd: RawFd, flags: MsgFlags, now: Instant) -> io::Result<usize> {
        self.send_msg(fd, None, flags, now)
    }

    /// Send from the buffer with one `sendmsg(2)` call addressed to `addr`.
    pub fn send_to(
        &mut self,
        fd: RawFd,
        addr: SocketAddr,
        flags: MsgFlags,
        now: Instant,
    ) -> io::Result<usize> {
        let name = addr_to_sockaddr(&addr);
        self.send_msg(fd, Some(&name), flags, now)
    }

    fn send_msg(
        &mut self,
        fd: RawFd,
        name: Option<&(libc::sockaddr_storage, libc::socklen_t)>,
        flags: MsgFlags,
        now: Instant,
    ) -> io::Result<usize> {
        let size = self.dequeue_vectored_with(usize::MAX, |spans| {
            if spans.is_empty() {
                return Err(would_block());
            }
            sendmsg(fd, &io_slices(spans), name, flags)
        })?;

        net_trace!("socket: fd {} sent {} bytes", fd, size);
        self.mark_send(now);
        Ok(size)
    }

    /// Fill the buffer with one `readv(2)` call on `fd`.
    pub fn read(&mut self, fd: RawFd, now: Instant) -> io::Result<usize> {
        let size = self.enqueue_vectored_with(|spans| {
            if spans.is_empty() {
                return Err(would_block());
            }
            let iov = io_slices_mut(spans);
            cvt(unsafe {
                libc::readv(
                    fd,
                    iov.as_ptr() as *const libc::iovec,
                    iov.len() as libc::c_int,
                )
            })
        })?;

        net_trace!("socket: fd {} read {} bytes", fd, size);
        self.mark_recv(now);
        Ok(size)
    }

    /// Drain the buffer with one `writev(2)` call on `fd`.
    pub fn write(&mut self, fd: RawFd, now: Instant) -> io::Result<usize> {
        let size = self.dequeue_vectored_with(usize::MAX, |spans| {
            if spans.is_empty() {
                return Err(would_block());
            }
            let iov = io_slices(spans);
            cvt(unsafe {
                libc::writev(
                    fd,
                    iov.as_ptr() as *const libc::iovec,
                    iov.len() as libc::c_int,
                )
            })
        })?;

        net_trace!("socket: fd {} wrote {} bytes", fd, size);
        self.mark_send(now);
        Ok(size)
    }
}
