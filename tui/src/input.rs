//! Raw Input Reader
//!
//! Reads one line of text from the terminal in raw mode (no line
//! discipline, no echo), decoding UTF-8 as the bytes arrive. Multi-byte
//! characters can be split across reads, so incomplete sequences are held
//! back and completed one byte at a time.
//!
//! The reader never writes to the terminal itself. Every edit is reported
//! through a callback with the full current line, and the display redraws
//! the whole input row from it.
//!
//! # Blocking
//!
//! Reading blocks and must run off the async runtime; the display gives
//! it a dedicated thread. On unix the terminal reader polls stdin
//! and re-checks the session's running flag between polls, so closing the
//! session unblocks a pending read within one poll interval.

use std::collections::VecDeque;
use std::io::{self, BufRead, Read};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use thiserror::Error;

/// Reasons a line read ends without a line
#[derive(Debug, Error)]
pub enum InputError {
    /// The user pressed Ctrl-C
    #[error("Input interrupted")]
    Interrupted,

    /// End of input, or the session stopped while waiting
    #[error("Input closed")]
    Closed,

    /// Reading from the terminal failed
    #[error("Input read failed: {0}")]
    Io(#[from] io::Error),
}

/// Classification of one decoded character
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Key {
    /// Carriage return or line feed
    Enter,
    /// DEL or BS
    Backspace,
    /// Ctrl-C (ETX)
    Interrupt,
    /// Any other control character
    Ignored,
    /// Printable text
    Char(char),
}

impl Key {
    pub fn classify(ch: char) -> Self {
        match ch {
            '\r' | '\n' => Key::Enter,
            '\x7f' | '\x08' => Key::Backspace,
            '\x03' => Key::Interrupt,
            c if c.is_control() => Key::Ignored,
            c => Key::Char(c),
        }
    }
}

/// Reassembles UTF-8 characters from arbitrarily split byte chunks
#[derive(Debug, Default)]
pub struct Utf8Assembler {
    pending: Vec<u8>,
}

impl Utf8Assembler {
    /// Whether an incomplete sequence is waiting for more bytes
    pub fn is_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Feed bytes, returning every character completed by them
    ///
    /// Bytes that can never start a valid sequence are dropped.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<char> {
        self.pending.extend_from_slice(bytes);
        let mut out = Vec::new();
        loop {
            match std::str::from_utf8(&self.pending) {
                Ok(text) => {
                    out.extend(text.chars());
                    self.pending.clear();
                    return out;
                }
                Err(err) => {
                    let valid = err.valid_up_to();
                    out.extend(String::from_utf8_lossy(&self.pending[..valid]).chars());
                    match err.error_len() {
                        // Incomplete tail: wait for the rest
                        None => {
                            self.pending.drain(..valid);
                            return out;
                        }
                        Some(len) => {
                            self.pending.drain(..valid + len);
                        }
                    }
                }
            }
        }
    }
}

/// Characters typed so far on the current line
#[derive(Clone, Debug, Default)]
pub struct InputBuffer {
    chars: Vec<char>,
}

impl InputBuffer {
    pub fn push(&mut self, ch: char) {
        self.chars.push(ch);
    }

    /// Remove the last character (a whole character, never a byte)
    pub fn pop(&mut self) -> Option<char> {
        self.chars.pop()
    }

    pub fn is_empty(&self) -> bool {
        self.chars.is_empty()
    }

    pub fn as_string(&self) -> String {
        self.chars.iter().collect()
    }

    /// Take the line, leaving the buffer empty
    pub fn take(&mut self) -> String {
        let line = self.as_string();
        self.chars.clear();
        line
    }
}

/// Splits a raw byte stream into lines
///
/// Reads up to 4 bytes at a time, or 1 byte at a time while a multi-byte
/// character is incomplete. A single read can carry the end of one line and
/// the start of the next; characters past the Enter stay queued for the next
/// call, as does an incomplete sequence.
#[derive(Debug, Default)]
pub struct LineDecoder {
    assembler: Utf8Assembler,
    queued: VecDeque<char>,
}

impl LineDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether decoded characters are waiting for the next line
    pub fn has_queued(&self) -> bool {
        !self.queued.is_empty()
    }

    /// Read one line
    ///
    /// `on_edit` receives the whole line after every character added or
    /// removed.
    pub fn read_line<R: Read>(
        &mut self,
        reader: &mut R,
        on_edit: &mut dyn FnMut(&str),
    ) -> Result<String, InputError> {
        let mut buffer = InputBuffer::default();
        let mut chunk = [0u8; 4];

        loop {
            while let Some(ch) = self.queued.pop_front() {
                match Key::classify(ch) {
                    Key::Enter => return Ok(buffer.take()),
                    Key::Interrupt => return Err(InputError::Interrupted),
                    Key::Backspace => {
                        buffer.pop();
                        on_edit(&buffer.as_string());
                    }
                    Key::Char(c) => {
                        buffer.push(c);
                        on_edit(&buffer.as_string());
                    }
                    Key::Ignored => {}
                }
            }

            let want = if self.assembler.is_pending() { 1 } else { chunk.len() };
            let n = match reader.read(&mut chunk[..want]) {
                Ok(0) => return Err(InputError::Closed),
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            };
            self.queued.extend(self.assembler.push(&chunk[..n]));
        }
    }
}

/// Read one cooked line (used when stdout is not a terminal)
pub fn read_plain_line<R: BufRead>(reader: &mut R) -> Result<String, InputError> {
    let mut line = String::new();
    if reader.read_line(&mut line)? == 0 {
        return Err(InputError::Closed);
    }
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

/// Something the display can pull input lines from
///
/// Called repeatedly from a blocking thread. `running` turns false when the
/// session closes; implementations that can wait should give up then.
pub trait InputSource: Send + 'static {
    fn read_line(
        &mut self,
        running: &AtomicBool,
        on_edit: &mut dyn FnMut(&str),
    ) -> Result<String, InputError>;
}

/// Lines decoded from any byte stream
pub struct ReaderInput<R> {
    reader: R,
    decoder: LineDecoder,
}

impl<R> ReaderInput<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            decoder: LineDecoder::new(),
        }
    }
}

impl<R: Read + Send + 'static> InputSource for ReaderInput<R> {
    fn read_line(
        &mut self,
        _running: &AtomicBool,
        on_edit: &mut dyn FnMut(&str),
    ) -> Result<String, InputError> {
        self.decoder.read_line(&mut self.reader, on_edit)
    }
}

/// The process's standard input
pub struct TerminalInput {
    /// Raw mode with per-keystroke redraw; cooked line reads otherwise
    raw: bool,
    poll_interval: Duration,
    decoder: LineDecoder,
}

impl TerminalInput {
    pub fn new(raw: bool, poll_interval: Duration) -> Self {
        Self {
            raw,
            poll_interval,
            decoder: LineDecoder::new(),
        }
    }
}

impl InputSource for TerminalInput {
    fn read_line(
        &mut self,
        running: &AtomicBool,
        on_edit: &mut dyn FnMut(&str),
    ) -> Result<String, InputError> {
        if !running.load(Ordering::SeqCst) {
            return Err(InputError::Closed);
        }
        if !self.raw {
            return read_plain_line(&mut io::stdin().lock());
        }
        read_raw_line(&mut self.decoder, self.poll_interval, running, on_edit)
    }
}

#[cfg(unix)]
fn read_raw_line(
    decoder: &mut LineDecoder,
    poll_interval: Duration,
    running: &AtomicBool,
    on_edit: &mut dyn FnMut(&str),
) -> Result<String, InputError> {
    use std::os::fd::AsRawFd;

    let fd = io::stdin().as_raw_fd();
    // Restores the saved mode on every way out of this function
    let _guard = unix::RawModeGuard::enter(fd)?;
    let mut reader = unix::PollingReader::new(fd, poll_interval, running);
    decoder.read_line(&mut reader, on_edit)
}

#[cfg(not(unix))]
fn read_raw_line(
    decoder: &mut LineDecoder,
    _poll_interval: Duration,
    _running: &AtomicBool,
    on_edit: &mut dyn FnMut(&str),
) -> Result<String, InputError> {
    let _guard = fallback::RawModeGuard::enter()?;
    decoder.read_line(&mut io::stdin().lock(), on_edit)
}

#[cfg(unix)]
pub mod unix {
    //! termios raw mode and a poll-based stdin reader

    use std::io::{self, Read};
    use std::os::fd::RawFd;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    /// Puts a terminal in raw mode; restores the saved mode on drop
    pub struct RawModeGuard {
        fd: RawFd,
        saved: libc::termios,
    }

    impl RawModeGuard {
        /// Save the current mode of `fd` and switch it to raw mode
        pub fn enter(fd: RawFd) -> io::Result<Self> {
            let mut saved: libc::termios = unsafe { std::mem::zeroed() };
            if unsafe { libc::tcgetattr(fd, &mut saved) } != 0 {
                return Err(io::Error::last_os_error());
            }

            let mut raw = saved;
            unsafe { libc::cfmakeraw(&mut raw) };
            if unsafe { libc::tcsetattr(fd, libc::TCSANOW, &raw) } != 0 {
                return Err(io::Error::last_os_error());
            }

            tracing::trace!(fd, "terminal switched to raw mode");
            Ok(Self { fd, saved })
        }
    }

    impl Drop for RawModeGuard {
        fn drop(&mut self) {
            let result = unsafe { libc::tcsetattr(self.fd, libc::TCSADRAIN, &self.saved) };
            if result != 0 {
                tracing::warn!(
                    "Failed to restore terminal mode: {}",
                    io::Error::last_os_error()
                );
            }
        }
    }

    /// Reads a file descriptor, waking every `poll_interval` to check `running`
    ///
    /// Returns end-of-input once `running` is false.
    pub struct PollingReader<'a> {
        fd: RawFd,
        timeout_ms: libc::c_int,
        running: &'a AtomicBool,
    }

    impl<'a> PollingReader<'a> {
        pub fn new(fd: RawFd, poll_interval: Duration, running: &'a AtomicBool) -> Self {
            let timeout_ms = poll_interval.as_millis().clamp(1, libc::c_int::MAX as u128);
            Self {
                fd,
                timeout_ms: timeout_ms as libc::c_int,
                running,
            }
        }
    }

    impl Read for PollingReader<'_> {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            loop {
                if !self.running.load(Ordering::SeqCst) {
                    return Ok(0);
                }

                let mut pfd = libc::pollfd {
                    fd: self.fd,
                    events: libc::POLLIN,
                    revents: 0,
                };
                let ready = unsafe { libc::poll(&mut pfd, 1, self.timeout_ms) };
                if ready < 0 {
                    let err = io::Error::last_os_error();
                    if err.kind() == io::ErrorKind::Interrupted {
                        continue;
                    }
                    return Err(err);
                }
                if ready == 0 {
                    continue;
                }

                let n = unsafe { libc::read(self.fd, buf.as_mut_ptr().cast(), buf.len()) };
                if n < 0 {
                    let err = io::Error::last_os_error();
                    if err.kind() == io::ErrorKind::Interrupted {
                        continue;
                    }
                    return Err(err);
                }
                return Ok(n as usize);
            }
        }
    }
}

#[cfg(not(unix))]
mod fallback {
    use std::io;

    /// Raw mode through crossterm where termios is unavailable
    pub struct RawModeGuard;

    impl RawModeGuard {
        pub fn enter() -> io::Result<Self> {
            crossterm::terminal::enable_raw_mode()?;
            Ok(Self)
        }
    }

    impl Drop for RawModeGuard {
        fn drop(&mut self) {
            let _ = crossterm::terminal::disable_raw_mode();
        }
    }
}
