//! Shared-memory buffers and the pool they are carved from.

use memmap2::MmapMut;
use std::fs::File;
use std::io;
use std::os::fd::{AsRawFd, RawFd};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;

/// Every supported format uses four bytes per pixel.
pub const BYTES_PER_PIXEL: u32 = 4;

/// Errors raised by the buffer pool.
#[derive(Debug, Error)]
pub enum BufferError {
    /// Creating, sizing or mapping the backing file failed.
    #[error("Buffer I/O error: {0}")]
    Io(#[from] io::Error),

    /// A pool needs at least one buffer with non-zero dimensions, and the total size
    /// must fit the address space.
    #[error("Invalid buffer pool dimensions: {count} buffers of {width}x{height}")]
    InvalidDimensions { count: usize, width: u32, height: u32 },

    /// The buffer is locked by the compositor and must not be written.
    #[error("Buffer {index} is in use by the compositor")]
    InUse { index: usize },
}

/// Pixel format of a buffer, matching `wl_shm.format`. Panels are translucent, so
/// only ARGB is produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferFormat {
    /// 32-bit ARGB, 8 bits per channel, alpha first. Stored little-endian.
    Argb8888,
}

/// Everything a compositor needs to attach a buffer: where it lives in the pool file
/// and how it is laid out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferHandle {
    pub index: usize,
    /// Descriptor of the pool's backing file, owned by the pool.
    pub fd: RawFd,
    pub offset: usize,
    pub width: u32,
    pub height: u32,
    pub stride: u32,
    pub format: BufferFormat,
}

/// One fixed-size render target inside a [`BufferPool`].
///
/// `in_use` goes false -> true on [`Buffer::lock`] and true -> false on
/// [`Buffer::release`]. The geometry never changes after construction.
#[derive(Debug)]
pub struct Buffer {
    index: usize,
    offset: usize,
    width: u32,
    height: u32,
    stride: u32,
    fd: RawFd,
    in_use: AtomicBool,
    memory: Arc<Mutex<MmapMut>>,
}

impl Buffer {
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn stride(&self) -> u32 {
        self.stride
    }

    pub fn size_in_bytes(&self) -> usize {
        self.stride as usize * self.height as usize
    }

    pub fn is_in_use(&self) -> bool {
        self.in_use.load(Ordering::Acquire)
    }

    /// Marks the buffer as handed to the compositor and returns its description.
    pub fn lock(&self) -> BufferHandle {
        if self.in_use.swap(true, Ordering::AcqRel) {
            tracing::warn!("Buffer {} locked while already in use", self.index);
        }
        tracing::trace!("Buffer {} locked", self.index);
        BufferHandle {
            index: self.index,
            fd: self.fd,
            offset: self.offset,
            width: self.width,
            height: self.height,
            stride: self.stride,
            format: BufferFormat::Argb8888,
        }
    }

    /// The compositor's release callback. This is the only way back to availability.
    pub fn release(&self) {
        self.in_use.store(false, Ordering::Release);
        tracing::trace!("Buffer {} released", self.index);
    }

    /// Runs `f` over this buffer's bytes, `stride * height` of them.
    ///
    /// # Errors
    ///
    /// [`BufferError::InUse`] while the buffer is locked.
    pub fn with_pixels<R>(&self, f: impl FnOnce(&mut [u8]) -> R) -> Result<R, BufferError> {
        if self.is_in_use() {
            return Err(BufferError::InUse { index: self.index });
        }
        let mut memory = lock_memory(&self.memory);
        let end = self.offset + self.size_in_bytes();
        Ok(f(&mut memory[self.offset..end]))
    }

    /// Fills every pixel with the packed ARGB value `argb`.
    pub fn clear(&self, argb: u32) -> Result<(), BufferError> {
        let pixel = argb.to_le_bytes();
        self.with_pixels(|bytes| {
            for chunk in bytes.chunks_exact_mut(BYTES_PER_PIXEL as usize) {
                chunk.copy_from_slice(&pixel);
            }
        })
    }
}

fn lock_memory(memory: &Mutex<MmapMut>) -> MutexGuard<'_, MmapMut> {
    // A panic inside a painter must not make the pool unusable.
    memory.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// A fixed set of buffers sharing one `MAP_SHARED` mapping.
///
/// The pool is never resized. Buffer `i` starts at `i * stride * height`.
#[derive(Debug)]
pub struct BufferPool {
    file: File,
    buffers: Vec<Arc<Buffer>>,
    width: u32,
    height: u32,
    stride: u32,
    size_in_bytes: usize,
}

impl BufferPool {
    /// Creates `count` buffers of `width` x `height` pixels backed by an anonymous
    /// temporary file.
    pub fn new(count: usize, width: u32, height: u32) -> Result<Self, BufferError> {
        let invalid = || BufferError::InvalidDimensions { count, width, height };
        if count == 0 || width == 0 || height == 0 {
            return Err(invalid());
        }
        let stride = width.checked_mul(BYTES_PER_PIXEL).ok_or_else(invalid)?;
        let buffer_size = (stride as usize)
            .checked_mul(height as usize)
            .ok_or_else(invalid)?;
        let size_in_bytes = buffer_size.checked_mul(count).ok_or_else(invalid)?;

        let file = tempfile::tempfile()?;
        file.set_len(size_in_bytes as u64)?;
        // SAFETY: the file is private to this process until its descriptor is handed to
        // the compositor, which only reads buffers while they are locked.
        let mmap = unsafe { MmapMut::map_mut(&file)? };
        let memory = Arc::new(Mutex::new(mmap));
        let fd = file.as_raw_fd();

        let buffers = (0..count)
            .map(|index| {
                Arc::new(Buffer {
                    index,
                    offset: index * buffer_size,
                    width,
                    height,
                    stride,
                    fd,
                    in_use: AtomicBool::new(false),
                    memory: Arc::clone(&memory),
                })
            })
            .collect();

        tracing::debug!(
            "Created buffer pool: {} buffers of {}x{} ({} bytes)",
            count,
            width,
            height,
            size_in_bytes
        );

        Ok(Self {
            file,
            buffers,
            width,
            height,
            stride,
            size_in_bytes,
        })
    }

    /// Returns the first buffer that is not in use, or `None` when every buffer is
    /// locked.
    pub fn get(&self) -> Option<Arc<Buffer>> {
        self.buffers.iter().find(|b| !b.is_in_use()).cloned()
    }

    /// Descriptor of the backing file, for sharing the pool with a compositor.
    pub fn fd(&self) -> RawFd {
        self.file.as_raw_fd()
    }

    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn stride(&self) -> u32 {
        self.stride
    }

    pub fn size_in_bytes(&self) -> usize {
        self.size_in_bytes
    }
}
