//! Pipe pairs wired for one direction of a child process's stdio.
//!
//! The parent's end is always made non-inheritable. If it leaked into a
//! child, that child (and every process it spawns) would hold the pipe open
//! and the other side would never observe end-of-file. The child's end is
//! handed to the spawn call through [`Handle::into_stdio`], which installs it
//! as the child's stdin/stdout/stderr; the parent must drop its copy right
//! after spawning.

use std::io;

use crate::handle::{Handle, HandleError};

/// A reader/writer pair created together.
#[derive(Debug)]
pub struct ChildPipe {
    reader: Handle,
    writer: Handle,
}

impl ChildPipe {
    fn create() -> Result<Self, HandleError> {
        let (reader, writer) = io::pipe().map_err(|source| HandleError::Os {
            op: "pipe",
            source,
        })?;
        Ok(Self {
            reader: adopt(reader)?,
            writer: adopt(writer)?,
        })
    }

    #[must_use]
    pub fn reader(&self) -> &Handle {
        &self.reader
    }

    #[must_use]
    pub fn writer(&self) -> &Handle {
        &self.writer
    }

    /// Split into `(reader, writer)`.
    #[must_use]
    pub fn into_parts(self) -> (Handle, Handle) {
        (self.reader, self.writer)
    }
}

#[cfg(unix)]
fn adopt(end: impl std::os::fd::IntoRawFd) -> Result<Handle, HandleError> {
    // SAFETY: the end was just created and is released to the new handle.
    unsafe { Handle::from_raw(end.into_raw_fd(), true) }
}

#[cfg(windows)]
fn adopt(end: impl std::os::windows::io::IntoRawHandle) -> Result<Handle, HandleError> {
    // SAFETY: the end was just created and is released to the new handle.
    unsafe { Handle::from_raw(end.into_raw_handle(), true) }
}

/// A pipe for a child's stdin: the child reads, the parent writes.
pub fn create_input_pipe() -> Result<ChildPipe, HandleError> {
    let pipe = ChildPipe::create()?;
    pipe.writer.set_inheritable(false)?;
    Ok(pipe)
}

/// A pipe for a child's stdout or stderr: the child writes, the parent reads.
pub fn create_output_pipe() -> Result<ChildPipe, HandleError> {
    let pipe = ChildPipe::create()?;
    pipe.reader.set_inheritable(false)?;
    Ok(pipe)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_input_pipe_hides_writer() {
        let pipe = create_input_pipe().unwrap();
        assert!(!pipe.writer().is_inheritable().unwrap());
        assert!(pipe.reader().is_pipe());
    }

    #[test]
    fn test_output_pipe_hides_reader() {
        let pipe = create_output_pipe().unwrap();
        assert!(!pipe.reader().is_inheritable().unwrap());
    }

    #[test]
    fn test_reader_sees_eof_once_writer_closed() {
        let (mut reader, mut writer) = create_input_pipe().unwrap().into_parts();
        writer.write_file(b"abc").unwrap();
        writer.close();
        assert_eq!(reader.read_file().unwrap(), b"abc");
    }
}
