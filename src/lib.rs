//! Single-volume FAT-style file system over a fixed-size-block device.
//!
//! The volume layout is the ECS150FS image format: one superblock, a FAT
//! region of u16 chain entries, a single root-directory block of 128 fixed
//! entries, and a data region addressed through the FAT. There are no
//! subdirectories and no journaling; one caller drives one mounted volume.
//!
//! All disk I/O is abstracted behind `BlockDevice`, making the engine
//! unit-testable against an in-memory disk. `FileDisk` mounts disk-image
//! files, `RamDisk` backs tests and tooling.
//!
//! ```no_run
//! use flatfs::{FileDisk, Volume};
//!
//! let mut disk = FileDisk::create("vol.img", 4100)?;
//! Volume::format(&mut disk)?;
//!
//! let mut vol = Volume::mount(disk)?;
//! vol.create("hello.txt")?;
//! let fd = vol.open("hello.txt")?;
//! vol.write(fd, b"hello")?;
//! vol.close(fd)?;
//! vol.unmount().map_err(|(_, e)| e)?;
//! # Ok::<(), flatfs::FsError>(())
//! ```

mod device;
mod dir;
mod error;
mod fat;
mod handle;
mod superblock;
mod volume;

pub use device::{Block, BlockDevice, DeviceError, FileDisk, RamDisk, BLOCK_SIZE};
pub use dir::{FS_FILENAME_LEN, FS_FILE_MAX_COUNT};
pub use error::FsError;
pub use fat::FAT_EOC;
pub use handle::FS_OPEN_MAX_COUNT;
pub use volume::{FileStat, Volume, VolumeInfo};
