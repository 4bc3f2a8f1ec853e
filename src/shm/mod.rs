//! Shared-memory pixel buffers
//!
//! A [`ShmPool`] is an anonymous, zero-filled file in the runtime directory,
//! mapped into this process and registered with the compositor's shm global.
//! Windows carve their ARGB8888 buffers out of a pool and hand widgets
//! [`ShmBuffer`] views into it.
//!
//! The backing file is created, unlinked, truncated and mapped in exactly that
//! order, so a crash at any point leaves nothing behind in the filesystem.

use log::{debug, error, warn};
use memmap2::{MmapMut, MmapOptions};
use std::os::fd::AsFd;

use crate::config::ShmConfig;
use crate::error::{Result, ToolkitError};
use crate::protocol::{ObjectId, Rect, Transport};

/// Bytes per ARGB8888 pixel
pub const BYTES_PER_PIXEL: u32 = 4;

/// Mapped shared-memory region plus its server-side pool object
pub struct ShmPool {
    id: ObjectId,
    map: MmapMut,
    size: usize,
}

impl std::fmt::Debug for ShmPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShmPool")
            .field("id", &self.id)
            .field("size", &self.size)
            .finish()
    }
}

impl ShmPool {
    /// Allocate a pool of exactly `size` bytes and register it with `shm`
    pub fn allocate(
        transport: &mut dyn Transport,
        shm: ObjectId,
        config: &ShmConfig,
        size: usize,
    ) -> Result<Self> {
        if size == 0 {
            return Err(ToolkitError::InvalidArgument("shm pool size must be non-zero".into()));
        }

        let dir = config.runtime_dir().map_err(|e| {
            error!("❌ {}", e);
            e
        })?;

        let named = tempfile::Builder::new()
            .prefix(config.file_prefix.as_str())
            .rand_bytes(6)
            .tempfile_in(&dir)
            .map_err(|e| {
                error!("❌ Cannot create temporary file in {}: {}", dir.display(), e);
                ToolkitError::resource(format!("cannot create shm file in {}: {}", dir.display(), e))
            })?;

        let (file, path) = named.into_parts();
        if let Err(e) = path.close() {
            warn!("⚠️ Cannot unlink temporary shm file: {}", e);
        }

        file.set_len(size as u64).map_err(|e| {
            error!("❌ Cannot truncate shm file to {} bytes: {}", size, e);
            ToolkitError::resource(format!("cannot truncate shm file to {} bytes: {}", size, e))
        })?;

        // SAFETY: the file is private to this process (already unlinked) and
        // was just sized to `size` bytes.
        let map = unsafe { MmapOptions::new().len(size).map_mut(&file) }.map_err(|e| {
            error!("❌ Cannot mmap shm file: {}", e);
            ToolkitError::resource(format!("cannot mmap shm file: {}", e))
        })?;

        let id = transport.create_pool(shm, file.as_fd(), size).map_err(|e| {
            error!("❌ Cannot create shm pool object: {}", e);
            e
        })?;

        debug!("🧱 Allocated shm pool {} ({} bytes)", id, size);
        Ok(Self { id, map, size })
    }

    pub fn id(&self) -> ObjectId {
        self.id
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.map[..]
    }

    /// Release the server-side pool and unmap the region
    pub fn release(self, transport: &mut dyn Transport) {
        debug!("🧱 Releasing shm pool {} ({} bytes)", self.id, self.size);
        transport.destroy_pool(self.id);
        drop(self.map);
    }
}

/// Geometry of a buffer view relative to the start of its pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BufferRegion {
    pub width: u32,
    pub height: u32,
    pub stride: u32,
    pub offset: usize,
}

impl BufferRegion {
    /// Clip `request` to a committed `width` x `height` buffer
    ///
    /// A request starting outside the buffer yields the empty region; `None`
    /// yields the whole buffer.
    pub fn clip(width: u32, height: u32, request: Option<Rect>) -> Self {
        let stride = width * BYTES_PER_PIXEL;
        let Some(rect) = request else {
            return Self {
                width,
                height,
                stride,
                offset: 0,
            };
        };

        if rect.x >= width || rect.y >= height {
            return Self::default();
        }

        let clipped_width = rect.width.min(width - rect.x);
        let clipped_height = rect.height.min(height - rect.y);

        Self {
            width: clipped_width,
            height: clipped_height,
            stride,
            offset: rect.y as usize * stride as usize + rect.x as usize * BYTES_PER_PIXEL as usize,
        }
    }

    /// Number of bytes from `offset` to the last pixel of the region
    pub fn byte_len(&self) -> usize {
        if self.width == 0 || self.height == 0 {
            return 0;
        }
        (self.height as usize - 1) * self.stride as usize + self.width as usize * BYTES_PER_PIXEL as usize
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// Non-owning view into a window's pixel memory
///
/// `data` starts at the first pixel of the view; row `r` begins at
/// `r * stride`.
#[derive(Debug)]
pub struct ShmBuffer<'a> {
    pub width: u32,
    pub height: u32,
    pub stride: u32,
    pub data: &'a mut [u8],
}

impl<'a> ShmBuffer<'a> {
    /// Build a view of `region` inside `pool`; the region must lie within the pool
    pub(crate) fn from_region(pool: &'a mut [u8], region: BufferRegion) -> Self {
        let len = region.byte_len();
        let data = match pool.get_mut(region.offset..region.offset + len) {
            Some(slice) if len > 0 => slice,
            _ => &mut [],
        };

        Self {
            width: if len > 0 { region.width } else { 0 },
            height: if len > 0 { region.height } else { 0 },
            stride: if len > 0 { region.stride } else { 0 },
            data,
        }
    }

    pub fn empty() -> Self {
        Self {
            width: 0,
            height: 0,
            stride: 0,
            data: &mut [],
        }
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Mutable pixels of row `row`, `width * 4` bytes long
    pub fn row_mut(&mut self, row: u32) -> Option<&mut [u8]> {
        if row >= self.height {
            return None;
        }
        let start = row as usize * self.stride as usize;
        let end = start + self.width as usize * BYTES_PER_PIXEL as usize;
        self.data.get_mut(start..end)
    }

    /// Fill every pixel of the view with one ARGB value (little-endian words)
    pub fn fill(&mut self, argb: u32) {
        let bytes = argb.to_le_bytes();
        for row in 0..self.height {
            if let Some(pixels) = self.row_mut(row) {
                for pixel in pixels.chunks_exact_mut(BYTES_PER_PIXEL as usize) {
                    pixel.copy_from_slice(&bytes);
                }
            }
        }
    }
}
