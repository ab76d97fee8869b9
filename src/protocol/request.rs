//! Request builder
//!
//! Accumulates pipelined commands into one RESP-encoded buffer.
//!
//! Every add call is independent: a failed add leaves the buffer as it
//! was and returns the error, but it also raises a sticky flag that no
//! later success clears. Commands that were added successfully are
//! still serialized, so a partially failed pipeline is sent as far as
//! it got.

use std::fmt;

use bytes::{Bytes, BytesMut};

use super::codec;
use super::format::{format_command, FormatArg};
use crate::config::ParserLimits;
use crate::error::{RespError, Result};

/// Add a formatted command to a [`CommandBuilder`].
///
/// ```
/// use respline::{add_command, CommandBuilder};
///
/// let mut request = CommandBuilder::new();
/// let blob = [b'a', 0, b'b', b' '];
/// add_command!(request, "SET %s %b", "key", &blob[..]).unwrap();
/// assert_eq!(request.command_size(), 1);
/// ```
#[macro_export]
macro_rules! add_command {
    ($builder:expr, $format:expr $(, $arg:expr)* $(,)?) => {
        $builder.add_command_v($format, &[$($crate::protocol::FormatArg::from($arg)),*])
    };
}

/// Pipelined command request
#[derive(Debug, Clone, Default)]
pub struct CommandBuilder {
    /// Wire bytes of every successfully added command
    buf: BytesMut,

    /// Number of successfully added commands
    ncommand: usize,

    /// Set once any add failed
    has_error: bool,
}

impl CommandBuilder {
    /// Create an empty request
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a command that takes no arguments, e.g. `PING`
    pub fn add_command(&mut self, name: impl AsRef<[u8]>) -> Result<()> {
        let name = name.as_ref();
        if name.is_empty() {
            return Err(self.fail(RespError::EmptyCommand));
        }
        self.push(&[name]);
        Ok(())
    }

    /// Add a command described by a printf-style format.
    ///
    /// See [`format_command`] for the accepted conversions. The
    /// [`add_command!`] macro converts arguments for you.
    pub fn add_command_v(&mut self, format: &str, args: &[FormatArg<'_>]) -> Result<()> {
        match format_command(format, args) {
            Ok(argv) => {
                self.push(&argv);
                Ok(())
            }
            Err(e) => {
                tracing::warn!("Rejected command format {:?}: {}", format, e);
                Err(self.fail(e))
            }
        }
    }

    /// Add a command whose arguments are already split
    pub fn add_command_by_components<A: AsRef<[u8]>>(&mut self, components: &[A]) -> Result<()> {
        if components.is_empty() {
            return Err(self.fail(RespError::EmptyCommand));
        }
        self.push(components);
        Ok(())
    }

    fn push<A: AsRef<[u8]>>(&mut self, argv: &[A]) {
        codec::encode_command(&mut self.buf, argv);
        self.ncommand += 1;
    }

    fn fail(&mut self, err: RespError) -> RespError {
        self.has_error = true;
        err
    }

    /// Number of successfully added commands
    pub fn command_size(&self) -> usize {
        self.ncommand
    }

    /// True if any add call has failed since creation or the last clear
    pub fn has_error(&self) -> bool {
        self.has_error
    }

    pub fn is_empty(&self) -> bool {
        self.ncommand == 0
    }

    /// Encoded size in bytes
    pub fn byte_size(&self) -> usize {
        self.buf.len()
    }

    /// Encoded bytes of the pipeline
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Append the encoded pipeline to `out`
    pub fn serialize_to(&self, out: &mut BytesMut) -> Result<()> {
        if self.is_empty() {
            return Err(RespError::EmptyRequest);
        }
        out.extend_from_slice(&self.buf);
        Ok(())
    }

    /// Append the commands of `other` after ours
    pub fn merge_from(&mut self, other: &CommandBuilder) {
        self.buf.extend_from_slice(&other.buf);
        self.ncommand += other.ncommand;
        self.has_error |= other.has_error;
    }

    /// Drop all commands and reset the error flag
    pub fn clear(&mut self) {
        self.buf.clear();
        self.ncommand = 0;
        self.has_error = false;
    }

    /// Decode the pipeline back into argument vectors
    pub fn commands(&self) -> Result<Vec<Vec<Bytes>>> {
        let mut pending = self.buf.clone();
        let limits = ParserLimits {
            max_bulk_len: usize::MAX,
            max_array_len: usize::MAX,
            max_depth: 1,
        };
        let mut commands = Vec::with_capacity(self.ncommand);
        while let Some(argv) = codec::decode_command(&mut pending, &limits)? {
            commands.push(argv);
        }
        Ok(commands)
    }
}

impl fmt::Display for CommandBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let commands = self.commands().map_err(|_| fmt::Error)?;
        for (i, argv) in commands.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            f.write_str("[")?;
            for (j, arg) in argv.iter().enumerate() {
                if j > 0 {
                    f.write_str(" ")?;
                }
                write!(f, "{}", arg.escape_ascii())?;
            }
            f.write_str("]")?;
        }
        if self.has_error {
            f.write_str(" (has error)")?;
        }
        Ok(())
    }
}
