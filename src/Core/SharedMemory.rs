// Shared memory backend abstraction for Linux
// Named segments live in /dev/shm so that two unrelated processes can map the same pages

use std::fmt::Debug;
use std::io;
use std::ptr::NonNull;

/// Shared memory backend trait for cross-platform memory mapping
pub trait SharedMemoryBackend: Send + Sync + Debug {
    /// Get a pointer to the mapped memory region
    fn as_ptr(&self) -> *mut u8;

    /// Get the size of the mapped region in bytes
    fn size(&self) -> usize;

    /// Get the underlying file descriptor
    fn raw_handle(&self) -> RawHandle;

    /// Name of the segment under /dev/shm
    fn name(&self) -> &str;

    /// True when dropping this mapping unlinks the name.
    fn is_owner(&self) -> bool;
}

/// Platform-specific handle type
#[derive(Debug, Clone, Copy)]
pub enum RawHandle {
    /// Unix file descriptor (Linux)
    Fd(i32),
}

/// Alignment every segment size is rounded up to.
pub const SEGMENT_ALIGN: usize = 128;

#[inline]
fn align_segment(size: usize) -> usize {
    (size + SEGMENT_ALIGN - 1) & !(SEGMENT_ALIGN - 1)
}

fn shm_path(name: &str) -> String {
    format!("/dev/shm/{}", name)
}

/// Create (or truncate) a named shared memory region with the specified size.
///
/// The creator owns the name: dropping the returned backend unlinks the
/// /dev/shm entry, while mappings held by other processes stay valid until
/// they are dropped too.
///
/// # Arguments
/// * `size` - Size of the shared memory region in bytes (rounded up to 128)
/// * `name` - Name of the region under /dev/shm
#[cfg(target_os = "linux")]
pub fn create_shared_memory(size: usize, name: &str) -> io::Result<Box<dyn SharedMemoryBackend>> {
    Ok(Box::new(LinuxSharedMemory::create(size, name)?))
}

/// Attach to an existing named shared memory region.
///
/// # Arguments
/// * `name` - Name of the shared memory region to attach to
/// * `size` - Expected size of the region (for validation)
#[cfg(target_os = "linux")]
pub fn attach_shared_memory(name: &str, size: usize) -> io::Result<Box<dyn SharedMemoryBackend>> {
    Ok(Box::new(LinuxSharedMemory::attach(name, size)?))
}

/// Remove a named region from /dev/shm. Missing entries are not an error.
#[cfg(target_os = "linux")]
pub fn unlink_shared_memory(name: &str) -> io::Result<()> {
    match std::fs::remove_file(shm_path(name)) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

#[cfg(not(target_os = "linux"))]
pub fn create_shared_memory(_size: usize, _name: &str) -> io::Result<Box<dyn SharedMemoryBackend>> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "Shared memory only supported on Linux",
    ))
}

#[cfg(not(target_os = "linux"))]
pub fn attach_shared_memory(_name: &str, _size: usize) -> io::Result<Box<dyn SharedMemoryBackend>> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "Shared memory only supported on Linux",
    ))
}

#[cfg(not(target_os = "linux"))]
pub fn unlink_shared_memory(_name: &str) -> io::Result<()> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "Shared memory only supported on Linux",
    ))
}

#[cfg(target_os = "linux")]
#[derive(Debug)]
pub struct LinuxSharedMemory {
    ptr: NonNull<u8>,
    size: usize,
    fd: i32,
    name: String,
    owner: bool,
}

#[cfg(target_os = "linux")]
unsafe impl Send for LinuxSharedMemory {}
#[cfg(target_os = "linux")]
unsafe impl Sync for LinuxSharedMemory {}

#[cfg(target_os = "linux")]
impl LinuxSharedMemory {
    /// Create a new shared memory region using /dev/shm
    pub fn create(size: usize, name: &str) -> io::Result<Self> {
        use std::fs::OpenOptions;
        use std::os::fd::IntoRawFd;
        use std::os::unix::fs::OpenOptionsExt;

        let size = align_segment(size);
        let path = shm_path(name);

        // Create or truncate the file in /dev/shm
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(&path)
            .map_err(|e| {
                io::Error::new(
                    e.kind(),
                    format!("Failed to create shared memory file at {}: {}", path, e),
                )
            })?;

        // Truncation zero-fills, so every queue header starts out at position 0
        file.set_len(size as u64)?;

        let fd = file.into_raw_fd();
        let ptr = unsafe { Self::map(fd, size)? };

        Ok(Self {
            ptr,
            size,
            fd,
            name: name.to_owned(),
            owner: true,
        })
    }

    /// Attach to a region previously created by [`LinuxSharedMemory::create`]
    pub fn attach(name: &str, expected_size: usize) -> io::Result<Self> {
        use std::fs::OpenOptions;
        use std::os::fd::IntoRawFd;

        let aligned_size = align_segment(expected_size);
        let path = shm_path(name);
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&path)
            .map_err(|e| {
                io::Error::new(
                    e.kind(),
                    format!("Failed to open shared memory at {}: {}", path, e),
                )
            })?;

        let file_size = file.metadata()?.len() as usize;
        if file_size < aligned_size {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "Shared memory size too small: expected at least {} bytes, got {}",
                    aligned_size, file_size
                ),
            ));
        }

        let fd = file.into_raw_fd();
        let ptr = unsafe { Self::map(fd, file_size)? };

        Ok(Self {
            ptr,
            size: file_size,
            fd,
            name: name.to_owned(),
            owner: false,
        })
    }

    /// Map `size` bytes of `fd` shared. Closes `fd` on failure.
    unsafe fn map(fd: i32, size: usize) -> io::Result<NonNull<u8>> {
        let ptr = libc::mmap(
            std::ptr::null_mut(),
            size,
            libc::PROT_READ | libc::PROT_WRITE,
            libc::MAP_SHARED,
            fd,
            0,
        );

        if ptr == libc::MAP_FAILED {
            let err = io::Error::last_os_error();
            libc::close(fd);
            return Err(err);
        }

        // mmap hands out page aligned addresses, which covers our 128 byte requirement
        if (ptr as usize) % SEGMENT_ALIGN != 0 {
            libc::munmap(ptr, size);
            libc::close(fd);
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "Shared memory not properly aligned",
            ));
        }

        NonNull::new(ptr as *mut u8)
            .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "mmap returned null"))
    }

}

#[cfg(target_os = "linux")]
impl Drop for LinuxSharedMemory {
    fn drop(&mut self) {
        unsafe {
            libc::munmap(self.ptr.as_ptr() as *mut libc::c_void, self.size);
            libc::close(self.fd);
        }
        if self.owner {
            if let Err(e) = unlink_shared_memory(&self.name) {
                log::warn!("failed to unlink shared memory {}: {}", self.name, e);
            }
        }
    }
}

#[cfg(target_os = "linux")]
impl SharedMemoryBackend for LinuxSharedMemory {
    fn as_ptr(&self) -> *mut u8 {
        self.ptr.as_ptr()
    }

    fn size(&self) -> usize {
        self.size
    }

    fn raw_handle(&self) -> RawHandle {
        RawHandle::Fd(self.fd)
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn is_owner(&self) -> bool {
        self.owner
    }
}
