use core::fmt;

/// Errors returned by the DTN stack.
#[derive(Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    /// PDU specified an invalid length value, was too short, or would exceed a layer's maximum
    /// size.
    InvalidLength,

    /// Invalid value supplied for field.
    InvalidValue,

    /// Unexpectedly reached EOF while reading or writing data.
    ///
    /// This is returned when a payload does not fit into a PDU or other fixed-size buffer, and
    /// also when reaching EOF prematurely while reading data from a buffer.
    Eof,

    /// The checksum carried by a PDU does not match its contents.
    ///
    /// Receive paths treat this as corruption on the wireless channel and drop the PDU silently.
    ChecksumMismatch,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Error::InvalidLength => "invalid length value specified",
            Error::InvalidValue => "invalid value for field",
            Error::Eof => "end of buffer",
            Error::ChecksumMismatch => "checksum mismatch",
        })
    }
}
