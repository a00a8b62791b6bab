// SPDX-License-Identifier: GPL-3.0-only

//! Scrubbed credential handling
//!
//! Plaintext secrets live in [`zeroize::Zeroizing`] buffers from the moment
//! they are read off the credential pipe until the helper that consumes them
//! is done. [`VolatileFile`] materializes a single secret as a 0600 file for
//! helpers that can only read credentials from disk; the file contents are
//! overwritten before the file is unlinked.

use std::io::{Seek, SeekFrom, Write};
use std::os::fd::RawFd;
use std::path::Path;

use tempfile::NamedTempFile;
use zeroize::Zeroizing;

use crate::error::{Result, SysError};

/// Upper bound for a single credential-pipe payload read.
pub const SECRET_LIMIT: usize = 1024;

/// A user/password pair parsed from the credential pipe.
///
/// The password buffer is overwritten when the value is dropped. Pass by
/// move; the type is deliberately not `Clone`.
pub struct Credentials {
    user: String,
    password: Zeroizing<String>,
}

impl Credentials {
    pub fn new(user: String, password: Zeroizing<String>) -> Self {
        Self { user, password }
    }

    /// Parse a `user\0password\0` payload.
    ///
    /// Exactly two NUL delimiters must appear in the payload; anything else
    /// is rejected so downstream splitting is never fed a half-formed pair.
    pub fn from_payload(payload: &[u8]) -> Result<Self> {
        if payload.iter().filter(|b| **b == 0).count() != 2 {
            return Err(SysError::MalformedSecret);
        }
        let mut fields = payload.split(|b| *b == 0);
        let user = fields.next().unwrap_or_default();
        let password = fields.next().unwrap_or_default();
        let user =
            String::from_utf8(user.to_vec()).map_err(|_| SysError::MalformedSecret)?;
        let password = Zeroizing::new(
            String::from_utf8(password.to_vec()).map_err(|_| SysError::MalformedSecret)?,
        );
        Ok(Self { user, password })
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    pub fn password(&self) -> &str {
        &self.password
    }

    /// Copy the password into a scrubbed byte buffer, e.g. to seed a
    /// [`VolatileFile`].
    pub fn pack_password(&self) -> Zeroizing<Vec<u8>> {
        Zeroizing::new(self.password.as_bytes().to_vec())
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Read one credential payload from a pipe file descriptor.
///
/// A single read of at most [`SECRET_LIMIT`] bytes; the sender is expected to
/// write the whole payload in one go. The returned buffer is scrubbed on
/// drop.
pub fn read_secret_payload(fd: RawFd) -> Result<Zeroizing<Vec<u8>>> {
    let mut buf = Zeroizing::new(vec![0u8; SECRET_LIMIT]);
    let n = nix::unistd::read(fd, buf.as_mut_slice())
        .map_err(|e| SysError::Io(std::io::Error::from_raw_os_error(e as i32)))?;
    buf.truncate(n);
    Ok(buf)
}

/// A 0600 temp file holding one secret, unlinked on drop.
///
/// The drop implementation overwrites the contents with zeros before the
/// underlying temp file removes itself, so the secret never survives the
/// handle even on filesystems without discard. Handles are moved into the
/// exit callback of the child process that reads the file, which keeps the
/// file alive for the whole child lifetime.
pub struct VolatileFile {
    file: NamedTempFile,
    len: usize,
}

impl VolatileFile {
    pub fn new(content: Zeroizing<Vec<u8>>) -> Result<Self> {
        let mut file = tempfile::Builder::new()
            .prefix("vm-secret.")
            .tempfile()?;
        file.write_all(&content)?;
        file.flush()?;
        Ok(Self {
            file,
            len: content.len(),
        })
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }
}

impl Drop for VolatileFile {
    fn drop(&mut self) {
        let zeros = vec![0u8; self.len];
        let file = self.file.as_file_mut();
        if file
            .seek(SeekFrom::Start(0))
            .and_then(|_| file.write_all(&zeros))
            .and_then(|()| file.flush())
            .is_err()
        {
            tracing::warn!(path = %self.file.path().display(), "failed to scrub secret file");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_two_field_payload() {
        let creds = Credentials::from_payload(b"alice\0s3cret\0").unwrap();
        assert_eq!(creds.user(), "alice");
        assert_eq!(creds.password(), "s3cret");
    }

    #[test]
    fn rejects_wrong_delimiter_count() {
        assert!(matches!(
            Credentials::from_payload(b"alice\0"),
            Err(SysError::MalformedSecret)
        ));
        assert!(matches!(
            Credentials::from_payload(b"a\0b\0c\0"),
            Err(SysError::MalformedSecret)
        ));
        assert!(matches!(
            Credentials::from_payload(b"no delimiters"),
            Err(SysError::MalformedSecret)
        ));
    }

    #[test]
    fn pipe_payload_buffer_is_scrubbed_on_drop() {
        use std::os::fd::AsRawFd;

        let (read_end, write_end) = nix::unistd::pipe().unwrap();
        nix::unistd::write(&write_end, b"bob\0pw\0").unwrap();
        drop(write_end);

        let payload = read_secret_payload(read_end.as_raw_fd()).unwrap();
        let creds = Credentials::from_payload(&payload).unwrap();
        assert_eq!(creds.password(), "pw");

        let ptr = payload.as_ptr();
        let len = payload.len();
        drop(payload);

        // Probe the released allocation: the buffer must have been
        // overwritten before it was freed. Read immediately, before the
        // allocator can hand the block out again.
        let remains = unsafe { core::slice::from_raw_parts(ptr, len) };
        assert!(remains.iter().all(|b| *b == 0), "payload survived drop");
    }

    #[test]
    fn volatile_file_zero_fills_before_unlink() {
        let secret = Zeroizing::new(b"hunter2".to_vec());
        let file = VolatileFile::new(secret).unwrap();
        let path = file.path().to_path_buf();
        assert_eq!(std::fs::read(&path).unwrap(), b"hunter2");

        // Independent handle on the inode: still readable once the path is
        // gone, so the on-disk bytes at unlink time are observable.
        let mut probe = std::fs::File::open(&path).unwrap();

        drop(file);
        assert!(!path.exists());

        use std::io::Read;
        let mut remains = Vec::new();
        probe.read_to_end(&mut remains).unwrap();
        assert_eq!(remains, vec![0u8; b"hunter2".len()]);
    }

    #[test]
    fn pipe_payload_roundtrip() {
        use std::os::fd::AsRawFd;

        let (read_end, write_end) = nix::unistd::pipe().unwrap();
        nix::unistd::write(&write_end, b"bob\0pw\0").unwrap();
        drop(write_end);

        let payload = read_secret_payload(read_end.as_raw_fd()).unwrap();
        let creds = Credentials::from_payload(&payload).unwrap();
        assert_eq!(creds.user(), "bob");
        assert_eq!(creds.password(), "pw");
    }
}
