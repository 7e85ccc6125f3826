//! Single-owner OS handles with blocking read-all / write-all.
//!
//! A [`Handle`] owns one file or pipe end. Ownership moves with the value;
//! [`Handle::take`] leaves the source closed. Closing is idempotent and also
//! happens on drop, so a pipe end can never be closed twice or leaked.

use std::fs::File;
use std::io::{self, ErrorKind, Read, Write};
use std::process::Stdio;

use thiserror::Error;

#[cfg(unix)]
pub use std::os::fd::RawFd as RawOsHandle;
#[cfg(windows)]
pub use std::os::windows::io::RawHandle as RawOsHandle;

/// Size of the buffer used by [`Handle::read_file`].
pub const READ_CHUNK_BYTES: usize = 16 * 1024;

/// Largest byte count handed to a single OS write call.
const MAX_WRITE_CHUNK: usize = i32::MAX as usize;

#[derive(Debug, Error)]
pub enum HandleError {
    #[error("invalid OS handle")]
    Invalid,
    #[error("handle is closed")]
    Closed,
    #[error("{op} failed: {source}")]
    Os {
        op: &'static str,
        #[source]
        source: io::Error,
    },
}

impl HandleError {
    fn os(op: &'static str, source: io::Error) -> Self {
        Self::Os { op, source }
    }

    /// The OS error code, when the failure came from a system call.
    #[must_use]
    pub fn raw_os_error(&self) -> Option<i32> {
        match self {
            Self::Os { source, .. } => source.raw_os_error(),
            Self::Invalid | Self::Closed => None,
        }
    }
}

/// An owned OS handle (file descriptor on unix, `HANDLE` on Windows).
#[derive(Debug)]
pub struct Handle {
    file: Option<File>,
    /// Pipes report "peer closed" as a normal end of stream.
    is_pipe: bool,
}

impl Handle {
    /// Take ownership of a raw OS handle.
    ///
    /// Fails with [`HandleError::Invalid`] for the platform's invalid sentinel
    /// (`-1` on unix, null or `INVALID_HANDLE_VALUE` on Windows).
    ///
    /// # Safety
    ///
    /// `raw` must be an open handle that nothing else owns or will close.
    pub unsafe fn from_raw(raw: RawOsHandle, is_pipe: bool) -> Result<Self, HandleError> {
        #[cfg(unix)]
        {
            use std::os::fd::FromRawFd;
            if raw < 0 {
                return Err(HandleError::Invalid);
            }
            // SAFETY: validity checked above, ownership guaranteed by the caller.
            let file = unsafe { File::from_raw_fd(raw) };
            Ok(Self {
                file: Some(file),
                is_pipe,
            })
        }
        #[cfg(windows)]
        {
            use std::os::windows::io::FromRawHandle;
            if raw.is_null() || raw == windows_sys::Win32::Foundation::INVALID_HANDLE_VALUE {
                return Err(HandleError::Invalid);
            }
            // SAFETY: validity checked above, ownership guaranteed by the caller.
            let file = unsafe { File::from_raw_handle(raw) };
            Ok(Self {
                file: Some(file),
                is_pipe,
            })
        }
    }

    /// Wrap an open file.
    #[must_use]
    pub fn from_file(file: File) -> Self {
        Self {
            file: Some(file),
            is_pipe: false,
        }
    }

    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.file.is_some()
    }

    #[must_use]
    pub fn is_pipe(&self) -> bool {
        self.is_pipe
    }

    /// Move the handle out, leaving `self` closed.
    #[must_use]
    pub fn take(&mut self) -> Self {
        Self {
            file: self.file.take(),
            is_pipe: self.is_pipe,
        }
    }

    /// Close the handle. Safe to call any number of times.
    pub fn close(&mut self) {
        drop(self.file.take());
    }

    /// Hand the handle to a child process as one of its stdio streams.
    pub fn into_stdio(mut self) -> Result<Stdio, HandleError> {
        self.file.take().map(Stdio::from).ok_or(HandleError::Closed)
    }

    /// Allow or forbid child processes from inheriting this handle.
    pub fn set_inheritable(&self, inheritable: bool) -> Result<(), HandleError> {
        let file = self.file.as_ref().ok_or(HandleError::Closed)?;
        set_inheritable(file, inheritable).map_err(|e| HandleError::os("set_inheritable", e))
    }

    /// Whether child processes would inherit this handle.
    pub fn is_inheritable(&self) -> Result<bool, HandleError> {
        let file = self.file.as_ref().ok_or(HandleError::Closed)?;
        is_inheritable(file).map_err(|e| HandleError::os("is_inheritable", e))
    }

    /// Write all of `data`, splitting it into OS-sized chunks.
    pub fn write_file(&mut self, data: &[u8]) -> Result<(), HandleError> {
        let file = self.file.as_mut().ok_or(HandleError::Closed)?;
        let mut written = 0;
        while written < data.len() {
            let end = data.len().min(written + MAX_WRITE_CHUNK);
            match file.write(&data[written..end]) {
                Ok(0) => {
                    return Err(HandleError::os(
                        "write",
                        io::Error::from(ErrorKind::WriteZero),
                    ));
                }
                Ok(n) => written += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) => return Err(HandleError::os("write", e)),
            }
        }
        Ok(())
    }

    /// Read until end of stream.
    ///
    /// For pipes, the peer closing its write end ends the stream normally
    /// instead of surfacing as an error.
    pub fn read_file(&mut self) -> Result<Vec<u8>, HandleError> {
        let is_pipe = self.is_pipe;
        let file = self.file.as_mut().ok_or(HandleError::Closed)?;
        let mut out = Vec::new();
        let mut buf = [0u8; READ_CHUNK_BYTES];
        loop {
            match file.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => out.extend_from_slice(&buf[..n]),
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) if is_pipe && e.kind() == ErrorKind::BrokenPipe => break,
                Err(e) => return Err(HandleError::os("read", e)),
            }
        }
        Ok(out)
    }
}

#[cfg(unix)]
fn set_inheritable(file: &File, inheritable: bool) -> io::Result<()> {
    use std::os::fd::AsRawFd;
    let fd = file.as_raw_fd();
    // SAFETY: fcntl on a descriptor we own.
    unsafe {
        let flags = libc::fcntl(fd, libc::F_GETFD);
        if flags == -1 {
            return Err(io::Error::last_os_error());
        }
        let flags = if inheritable {
            flags & !libc::FD_CLOEXEC
        } else {
            flags | libc::FD_CLOEXEC
        };
        if libc::fcntl(fd, libc::F_SETFD, flags) == -1 {
            return Err(io::Error::last_os_error());
        }
    }
    Ok(())
}

#[cfg(unix)]
fn is_inheritable(file: &File) -> io::Result<bool> {
    use std::os::fd::AsRawFd;
    // SAFETY: fcntl on a descriptor we own.
    let flags = unsafe { libc::fcntl(file.as_raw_fd(), libc::F_GETFD) };
    if flags == -1 {
        return Err(io::Error::last_os_error());
    }
    Ok(flags & libc::FD_CLOEXEC == 0)
}

#[cfg(windows)]
fn set_inheritable(file: &File, inheritable: bool) -> io::Result<()> {
    use std::os::windows::io::AsRawHandle;
    use windows_sys::Win32::Foundation::{HANDLE_FLAG_INHERIT, SetHandleInformation};
    let flags = if inheritable { HANDLE_FLAG_INHERIT } else { 0 };
    // SAFETY: Win32 call on a handle we own.
    let ok = unsafe { SetHandleInformation(file.as_raw_handle(), HANDLE_FLAG_INHERIT, flags) };
    if ok == 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

#[cfg(windows)]
fn is_inheritable(file: &File) -> io::Result<bool> {
    use std::os::windows::io::AsRawHandle;
    use windows_sys::Win32::Foundation::{GetHandleInformation, HANDLE_FLAG_INHERIT};
    let mut flags = 0u32;
    // SAFETY: Win32 call on a handle we own; `flags` is a valid out pointer.
    let ok = unsafe { GetHandleInformation(file.as_raw_handle(), &raw mut flags) };
    if ok == 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(flags & HANDLE_FLAG_INHERIT != 0)
}
