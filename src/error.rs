//! Engine error taxonomy.

use thiserror::Error;

use crate::device::DeviceError;

/// Every failure the engine can surface.
///
/// The first three variants are fatal to mount; name, capacity and handle
/// failures are recoverable and surfaced to the caller. Running out of data
/// blocks during a write is not listed: it degrades to a partial byte count
/// by design. Device failures are wrapped unchanged.
#[derive(Debug, Error)]
pub enum FsError {
    #[error("bad superblock signature")]
    BadSignature,
    #[error("superblock says {stored} blocks but the device has {device}")]
    BlockCountMismatch { stored: u32, device: u32 },
    #[error("superblock geometry is inconsistent")]
    BadGeometry,

    #[error("invalid file name")]
    InvalidName,
    #[error("file already exists")]
    AlreadyExists,
    #[error("no such file")]
    NotFound,

    #[error("root directory is full")]
    DirectoryFull,
    #[error("too many open files")]
    TooManyOpen,

    #[error("invalid file handle")]
    InvalidHandle,
    #[error("offset is beyond the end of the file")]
    OffsetBeyondEnd,
    #[error("file is currently open")]
    FileOpen,
    #[error("volume still has open file handles")]
    HandlesStillOpen,

    #[error(transparent)]
    Device(#[from] DeviceError),
}
