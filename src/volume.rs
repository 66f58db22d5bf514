//! The mounted-volume engine.
//!
//! `Volume` composes the superblock, FAT, root directory and handle table
//! over one block device and turns byte-range reads and writes into
//! block-chain traversals with partial-block merges through a one-block
//! staging buffer. All block I/O happens here; the leaf components are pure
//! in-memory structures with block codecs.

use crate::device::{BlockDevice, FileDisk, BLOCK_SIZE};
use crate::dir::{RootDirectory, FS_FILE_MAX_COUNT};
use crate::error::FsError;
use crate::fat::{FatTable, FAT_EOC};
use crate::handle::{HandleTable, OpenFile};
use crate::superblock::SuperBlock;

/// One `list()` row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileStat {
    pub name: String,
    pub size: u32,
    pub first_block: u16,
}

/// Geometry and occupancy snapshot returned by `info()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VolumeInfo {
    pub total_blocks: u16,
    pub fat_blocks: u8,
    pub root_dir_block: u16,
    pub data_start: u16,
    pub data_blocks: u16,
    pub free_data_blocks: usize,
    pub free_dir_entries: usize,
}

impl core::fmt::Display for VolumeInfo {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        writeln!(f, "FS Info:")?;
        writeln!(f, "total_blk_count={}", self.total_blocks)?;
        writeln!(f, "fat_blk_count={}", self.fat_blocks)?;
        writeln!(f, "rdir_blk={}", self.root_dir_block)?;
        writeln!(f, "data_blk={}", self.data_start)?;
        writeln!(f, "data_blk_count={}", self.data_blocks)?;
        writeln!(f, "fat_free_ratio={}/{}", self.free_data_blocks, self.data_blocks)?;
        write!(f, "rdir_free_ratio={}/{}", self.free_dir_entries, FS_FILE_MAX_COUNT)
    }
}

/// A mounted volume. Owns the device and every in-memory structure for the
/// lifetime of the mount; every mutation is persisted as soon as it is fully
/// computed, so dropping a `Volume` loses nothing.
pub struct Volume<D: BlockDevice> {
    device: D,
    superblock: SuperBlock,
    fat: FatTable,
    dir: RootDirectory,
    handles: HandleTable,
}

impl Volume<FileDisk> {
    /// Mount the disk image at `path`.
    pub fn mount_path(path: impl AsRef<std::path::Path>) -> Result<Self, FsError> {
        Self::mount(FileDisk::open(path)?)
    }
}

impl<D: BlockDevice> Volume<D> {
    /// Write a fresh, empty volume covering the whole of `device`.
    pub fn format(device: &mut D) -> Result<(), FsError> {
        let superblock = SuperBlock::for_device(device.block_count())?;
        let mut block = [0u8; BLOCK_SIZE];
        superblock.encode(&mut block);
        device.write(0, &block)?;

        let fat = FatTable::new(superblock.data_blocks());
        for i in 0..superblock.fat_blocks() as u32 {
            fat.encode_block(i as usize, &mut block);
            device.write(1 + i, &block)?;
        }

        RootDirectory::new().encode(&mut block);
        device.write(superblock.root_dir_block() as u32, &block)?;
        device.flush()?;

        log::info!(
            "format: {} blocks ({} data, {} fat)",
            superblock.total_blocks(),
            superblock.data_blocks(),
            superblock.fat_blocks()
        );
        Ok(())
    }

    /// Validate the superblock against `device` and load the FAT region and
    /// the root directory.
    pub fn mount(mut device: D) -> Result<Self, FsError> {
        let mut block = [0u8; BLOCK_SIZE];
        device.read(0, &mut block)?;
        let superblock = SuperBlock::parse(&block, device.block_count())?;

        let mut region = Vec::with_capacity(superblock.fat_blocks() as usize);
        for i in 0..superblock.fat_blocks() as u32 {
            device.read(1 + i, &mut block)?;
            region.push(block);
        }
        let fat = FatTable::load(&region, superblock.data_blocks());

        device.read(superblock.root_dir_block() as u32, &mut block)?;
        let dir = RootDirectory::load(&block);

        log::info!(
            "mount: {} blocks, {} data blocks, {} files",
            superblock.total_blocks(),
            superblock.data_blocks(),
            FS_FILE_MAX_COUNT - dir.free_count()
        );

        Ok(Self {
            device,
            superblock,
            fat,
            dir,
            handles: HandleTable::new(),
        })
    }

    /// Unmount and hand the device back. Refused while any handle is open;
    /// the still-mounted volume rides back in the error so the caller can
    /// close its handles and retry.
    pub fn unmount(mut self) -> Result<D, (Self, FsError)> {
        if self.handles.open_count() > 0 {
            return Err((self, FsError::HandlesStillOpen));
        }
        if let Err(e) = self.device.flush() {
            return Err((self, e.into()));
        }
        log::info!("unmount: {} blocks", self.superblock.total_blocks());
        Ok(self.device)
    }

    // ─── Directory operations ──────────────────────────────────────────────────

    /// Create an empty file named `name`.
    pub fn create(&mut self, name: &str) -> Result<(), FsError> {
        self.dir.create(name)?;
        self.persist_dir()
    }

    /// Delete `name` and free its chain. Refused while the file is open.
    pub fn delete(&mut self, name: &str) -> Result<(), FsError> {
        let slot = self.dir.lookup(name).ok_or(FsError::NotFound)?;
        if self.handles.references(slot) {
            return Err(FsError::FileOpen);
        }
        self.fat.free_chain(self.dir.entry(slot).first_block);
        self.dir.remove(slot);
        self.persist_fat()?;
        self.persist_dir()
    }

    /// Every file on the volume, in directory-slot order.
    pub fn list(&self) -> Vec<FileStat> {
        self.dir
            .occupied()
            .map(|(_, e)| FileStat {
                name: e.name_str().to_string(),
                size: e.size,
                first_block: e.first_block,
            })
            .collect()
    }

    pub fn info(&self) -> VolumeInfo {
        VolumeInfo {
            total_blocks: self.superblock.total_blocks(),
            fat_blocks: self.superblock.fat_blocks(),
            root_dir_block: self.superblock.root_dir_block(),
            data_start: self.superblock.data_start(),
            data_blocks: self.superblock.data_blocks(),
            free_data_blocks: self.fat.free_count(),
            free_dir_entries: self.dir.free_count(),
        }
    }

    // ─── Handle operations ─────────────────────────────────────────────────────

    /// Open `name`. Every open gets its own handle with an independent
    /// cursor starting at 0.
    pub fn open(&mut self, name: &str) -> Result<usize, FsError> {
        let slot = self.dir.lookup(name).ok_or(FsError::NotFound)?;
        self.handles.open(slot).ok_or(FsError::TooManyOpen)
    }

    pub fn close(&mut self, fd: usize) -> Result<(), FsError> {
        if self.handles.close(fd) {
            Ok(())
        } else {
            Err(FsError::InvalidHandle)
        }
    }

    /// Current size of the file behind `fd`.
    pub fn stat(&self, fd: usize) -> Result<u32, FsError> {
        let open = self.handle(fd)?;
        Ok(self.dir.entry(open.slot).size)
    }

    /// Move the cursor. It may land anywhere inside existing content or
    /// exactly at its end; growth only happens through writing.
    pub fn seek(&mut self, fd: usize, offset: u32) -> Result<(), FsError> {
        let open = self.handle(fd)?;
        if offset > self.dir.entry(open.slot).size {
            return Err(FsError::OffsetBeyondEnd);
        }
        self.handles.set_cursor(fd, offset);
        Ok(())
    }

    /// Fetch a handle and re-validate the directory slot it references.
    fn handle(&self, fd: usize) -> Result<OpenFile, FsError> {
        let open = self.handles.get(fd).ok_or(FsError::InvalidHandle)?;
        if self.dir.entry(open.slot).is_free() {
            return Err(FsError::InvalidHandle);
        }
        Ok(open)
    }

    // ─── Read / write orchestration ────────────────────────────────────────────

    /// Read up to `buf.len()` bytes at the cursor. Short reads near the end
    /// of the file are normal, and a cursor at EOF reads 0 bytes.
    pub fn read(&mut self, fd: usize, buf: &mut [u8]) -> Result<usize, FsError> {
        let open = self.handle(fd)?;
        let entry = self.dir.entry(open.slot);
        let size = entry.size;
        let first = entry.first_block;
        let mut cursor = open.cursor;

        let count = buf.len().min((size - cursor) as usize);
        if count == 0 {
            return Ok(0);
        }

        let mut block = self.resolve(first, cursor);
        let mut staging = [0u8; BLOCK_SIZE];
        let mut done = 0;
        while done < count {
            let off = cursor as usize % BLOCK_SIZE;
            let take = (count - done).min(BLOCK_SIZE - off);
            self.device.read(self.data_block(block), &mut staging)?;
            buf[done..done + take].copy_from_slice(&staging[off..off + take]);
            cursor += take as u32;
            done += take;
            if done < count {
                block = self.fat.next(block);
            }
        }
        self.handles.set_cursor(fd, cursor);
        Ok(done)
    }

    /// Write `data` at the cursor, growing the file as needed. Running out
    /// of data blocks mid-way returns the bytes that made it (0 when not
    /// even the chain head could be allocated); neither is an error.
    pub fn write(&mut self, fd: usize, data: &[u8]) -> Result<usize, FsError> {
        let open = self.handle(fd)?;
        if data.is_empty() {
            return Ok(0);
        }
        let mut cursor = open.cursor;

        // First write into an empty file allocates the chain head.
        let first = self.dir.entry(open.slot).first_block;
        let mut block = if first != FAT_EOC {
            first
        } else {
            match self.fat.allocate() {
                Some(b) => {
                    self.dir.entry_mut(open.slot).first_block = b;
                    b
                }
                None => {
                    log::debug!("write: no free block for a chain head");
                    return Ok(0);
                }
            }
        };

        // Walk to the block under the cursor. A cursor parked exactly one
        // block past the tail extends the chain before any byte moves.
        for _ in 0..cursor as usize / BLOCK_SIZE {
            block = match self.fat.next(block) {
                FAT_EOC => match self.fat.allocate() {
                    Some(b) => {
                        self.fat.link(block, b);
                        b
                    }
                    None => return self.finish_write(fd, open.slot, cursor, 0),
                },
                next => next,
            };
        }

        let mut staging = [0u8; BLOCK_SIZE];
        let mut written = 0;
        loop {
            let off = cursor as usize % BLOCK_SIZE;
            let take = (data.len() - written).min(BLOCK_SIZE - off);
            let addr = self.data_block(block);
            if take < BLOCK_SIZE {
                // Partial block: merge into the existing content so bytes
                // outside the write window survive.
                self.device.read(addr, &mut staging)?;
            }
            staging[off..off + take].copy_from_slice(&data[written..written + take]);
            self.device.write(addr, &staging)?;
            cursor += take as u32;
            written += take;
            if written == data.len() {
                break;
            }
            block = match self.fat.next(block) {
                FAT_EOC => match self.fat.allocate() {
                    Some(b) => {
                        self.fat.link(block, b);
                        b
                    }
                    None => {
                        log::debug!("write: volume full after {written} bytes");
                        break;
                    }
                },
                next => next,
            };
        }
        self.finish_write(fd, open.slot, cursor, written)
    }

    /// Post-write bookkeeping: grow the recorded size to the cursor, persist
    /// the FAT region and then the directory block once each, advance the
    /// handle cursor. The FAT goes first so a failure between the two leaks
    /// blocks instead of publishing an entry whose chain never landed.
    fn finish_write(
        &mut self,
        fd: usize,
        slot: usize,
        cursor: u32,
        written: usize,
    ) -> Result<usize, FsError> {
        let entry = self.dir.entry_mut(slot);
        entry.size = entry.size.max(cursor);
        self.persist_fat()?;
        self.persist_dir()?;
        self.handles.set_cursor(fd, cursor);
        Ok(written)
    }

    /// Block holding byte `cursor`: follow `cursor / BLOCK_SIZE` links from
    /// the chain head. Only called for positions inside the chain.
    fn resolve(&self, first_block: u16, cursor: u32) -> u16 {
        let mut block = first_block;
        for _ in 0..cursor as usize / BLOCK_SIZE {
            block = self.fat.next(block);
        }
        block
    }

    /// Absolute device index of data block `idx`.
    fn data_block(&self, idx: u16) -> u32 {
        self.superblock.data_start() as u32 + idx as u32
    }

    fn persist_fat(&mut self) -> Result<(), FsError> {
        let mut block = [0u8; BLOCK_SIZE];
        for i in 0..self.superblock.fat_blocks() as u32 {
            self.fat.encode_block(i as usize, &mut block);
            self.device.write(1 + i, &block)?;
        }
        Ok(())
    }

    fn persist_dir(&mut self) -> Result<(), FsError> {
        let mut block = [0u8; BLOCK_SIZE];
        self.dir.encode(&mut block);
        self.device.write(self.superblock.root_dir_block() as u32, &block)?;
        Ok(())
    }
}

// ─── Tests ─────────────────────────────────────────────────────────────────────
