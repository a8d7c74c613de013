//! File-descriptor passing over a Unix domain socket via `SCM_RIGHTS`.
//!
//! Exactly one fd travels per frame. Per the transport contract, the
//! receiver must observe the fd in the same `recvmsg` call that delivers
//! the frame's announcing payload bytes — never a payload-then-fd or
//! fd-then-payload two-step, which would leave a window where one arrived
//! without the other.

use std::mem;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd, RawFd};
use std::os::unix::net::UnixStream;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::{ProtocolError, ProtocolResult};

/// Frames that carry an fd are small JSON objects; this bounds one `recvmsg`.
const MAX_FD_FRAME_BYTES: usize = 8192;

/// Serialize `msg` as a newline-terminated JSON line and send it together
/// with `fd` as `SCM_RIGHTS` ancillary data, in one `sendmsg` call.
pub fn send_frame_with_fd<T: Serialize>(
    stream: &UnixStream,
    msg: &T,
    fd: RawFd,
) -> ProtocolResult<()> {
    let mut line = serde_json::to_vec(msg)?;
    line.push(b'\n');

    let cmsg_space = unsafe { libc::CMSG_SPACE(mem::size_of::<RawFd>() as u32) } as usize;
    let mut cmsg_buf = vec![0u8; cmsg_space];

    let mut iov = libc::iovec { iov_base: line.as_mut_ptr() as *mut libc::c_void, iov_len: line.len() };

    let mut msghdr: libc::msghdr = unsafe { mem::zeroed() };
    msghdr.msg_iov = &mut iov;
    msghdr.msg_iovlen = 1;
    msghdr.msg_control = cmsg_buf.as_mut_ptr() as *mut libc::c_void;
    msghdr.msg_controllen = cmsg_space as _;

    unsafe {
        let cmsg = libc::CMSG_FIRSTHDR(&msghdr);
        debug_assert!(!cmsg.is_null());
        (*cmsg).cmsg_level = libc::SOL_SOCKET;
        (*cmsg).cmsg_type = libc::SCM_RIGHTS;
        (*cmsg).cmsg_len = libc::CMSG_LEN(mem::size_of::<RawFd>() as u32) as _;
        std::ptr::write_unaligned(libc::CMSG_DATA(cmsg) as *mut RawFd, fd);
    }

    let n = unsafe { libc::sendmsg(stream.as_raw_fd(), &msghdr, 0) };
    if n < 0 {
        return Err(ProtocolError::FdPassing(std::io::Error::last_os_error().to_string()));
    }
    Ok(())
}

/// Receive one newline-terminated JSON line together with exactly one fd,
/// in a single `recvmsg` call. Fails with [`ProtocolError::NoFdReceived`]
/// if no `SCM_RIGHTS` ancillary data accompanied the payload.
pub fn recv_frame_with_fd<T: DeserializeOwned>(stream: &UnixStream) -> ProtocolResult<(T, OwnedFd)> {
    let mut data_buf = vec![0u8; MAX_FD_FRAME_BYTES];
    let cmsg_space = unsafe { libc::CMSG_SPACE(mem::size_of::<RawFd>() as u32) } as usize;
    let mut cmsg_buf = vec![0u8; cmsg_space];

    let mut iov = libc::iovec { iov_base: data_buf.as_mut_ptr() as *mut libc::c_void, iov_len: data_buf.len() };

    let mut msghdr: libc::msghdr = unsafe { mem::zeroed() };
    msghdr.msg_iov = &mut iov;
    msghdr.msg_iovlen = 1;
    msghdr.msg_control = cmsg_buf.as_mut_ptr() as *mut libc::c_void;
    msghdr.msg_controllen = cmsg_space as _;

    let n = unsafe { libc::recvmsg(stream.as_raw_fd(), &mut msghdr, 0) };
    if n < 0 {
        return Err(ProtocolError::FdPassing(std::io::Error::last_os_error().to_string()));
    }
    if n == 0 {
        return Err(ProtocolError::ConnectionClosed);
    }
    data_buf.truncate(n as usize);

    let mut fd: Option<RawFd> = None;
    unsafe {
        let mut cmsg = libc::CMSG_FIRSTHDR(&msghdr);
        while !cmsg.is_null() {
            if (*cmsg).cmsg_level == libc::SOL_SOCKET && (*cmsg).cmsg_type == libc::SCM_RIGHTS {
                let data_ptr = libc::CMSG_DATA(cmsg) as *const RawFd;
                fd = Some(std::ptr::read_unaligned(data_ptr));
                break;
            }
            cmsg = libc::CMSG_NXTHDR(&msghdr, cmsg);
        }
    }
    let Some(fd) = fd else {
        return Err(ProtocolError::NoFdReceived);
    };

    let line = data_buf.strip_suffix(b"\n").unwrap_or(&data_buf);
    let msg = serde_json::from_slice(line)?;
    // SAFETY: `fd` was just handed to us by the kernel via SCM_RIGHTS; we
    // are its sole owner until we hand it off again.
    let owned = unsafe { OwnedFd::from_raw_fd(fd) };
    Ok((msg, owned))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Tagged {
        n: u32,
    }

    #[test]
    fn sends_and_receives_fd_with_payload() {
        let (a, b) = UnixStream::pair().unwrap();

        // Use stdin (fd 0) as a stand-in for a real PTY master fd; it is
        // always open in a test process and safe to duplicate.
        send_frame_with_fd(&a, &Tagged { n: 9 }, 0).unwrap();

        let (msg, fd): (Tagged, OwnedFd) = recv_frame_with_fd(&b).unwrap();
        assert_eq!(msg, Tagged { n: 9 });
        assert!(fd.as_raw_fd() >= 0);
    }

    #[test]
    fn missing_fd_is_an_error() {
        use std::io::Write;

        let (mut a, b) = UnixStream::pair().unwrap();
        let mut line = serde_json::to_vec(&Tagged { n: 1 }).unwrap();
        line.push(b'\n');
        a.write_all(&line).unwrap();
        drop(a);

        let err = recv_frame_with_fd::<Tagged>(&b).unwrap_err();
        assert!(matches!(err, ProtocolError::NoFdReceived));
    }
}
