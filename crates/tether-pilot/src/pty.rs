//! Pseudo-terminal allocation.
//!
//! The subject is given the slave end as its stdin and stdout and becomes the
//! session leader with the slave as its controlling terminal, so `isatty`,
//! raw mode, and window size queries behave as they would for a human. The
//! harness keeps the master end for reading output and injecting keystrokes.

use std::fs::File;
use std::os::fd::{AsFd, OwnedFd};
use std::os::unix::process::CommandExt;
use std::process::{Command, Stdio};

use nix::fcntl::{fcntl, FcntlArg, FdFlag};
use nix::pty::{openpty, Winsize};
use nix::unistd;

use tether_types::TetherError;

/// Both ends of a freshly opened pseudo-terminal.
pub struct PtyPair {
    master: OwnedFd,
    slave: OwnedFd,
}

impl PtyPair {
    /// Open a pseudo-terminal with the given window size.
    ///
    /// Both descriptors are close-on-exec so the subject only sees the slave
    /// through its standard streams.
    pub fn open(rows: u16, cols: u16) -> Result<Self, TetherError> {
        let size = Winsize {
            ws_row: rows,
            ws_col: cols,
            ws_xpixel: 0,
            ws_ypixel: 0,
        };
        let pty = openpty(Some(&size), None)
            .map_err(|e| TetherError::PtyError(format!("openpty failed: {e}")))?;
        set_cloexec(&pty.master)?;
        set_cloexec(&pty.slave)?;
        Ok(Self {
            master: pty.master,
            slave: pty.slave,
        })
    }

    /// Wire `command` to the slave: stdin and stdout on the terminal, a new
    /// session, and the slave as controlling terminal.
    ///
    /// Stderr is left for the caller to configure.
    pub fn attach(&self, command: &mut Command) -> Result<(), TetherError> {
        let stdin = self.slave.try_clone()?;
        let stdout = self.slave.try_clone()?;
        command.stdin(Stdio::from(stdin)).stdout(Stdio::from(stdout));

        // Safety: setsid and ioctl are async-signal-safe. The closure runs in
        // the forked child after stdio has been duplicated onto fds 0-2, so
        // STDIN_FILENO is the slave.
        unsafe {
            command.pre_exec(|| {
                unistd::setsid()?;
                if libc::ioctl(libc::STDIN_FILENO, libc::TIOCSCTTY as _, 0) < 0 {
                    return Err(std::io::Error::last_os_error());
                }
                Ok(())
            });
        }
        Ok(())
    }

    /// Split into a reader and a writer on the master end, closing the
    /// parent's copy of the slave.
    ///
    /// Call after the child has been spawned; once every slave descriptor is
    /// closed, reads on the master report end-of-stream.
    pub fn into_master_io(self) -> Result<(File, File), TetherError> {
        drop(self.slave);
        let reader = File::from(self.master.try_clone()?);
        let writer = File::from(self.master);
        Ok((reader, writer))
    }
}

fn set_cloexec(fd: impl AsFd) -> Result<(), TetherError> {
    fcntl(fd, FcntlArg::F_SETFD(FdFlag::FD_CLOEXEC))
        .map_err(|e| TetherError::PtyError(format!("fcntl FD_CLOEXEC failed: {e}")))?;
    Ok(())
}
