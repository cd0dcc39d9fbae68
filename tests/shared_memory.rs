// Shared memory backend tests for Linux
// Run with: cargo test --test shared_memory -- --nocapture

#[cfg(target_os = "linux")]
mod linux_tests {
    use dmxp_bridge::Core::{
        attach_shared_memory, create_shared_memory, unlink_shared_memory, RawHandle,
        SharedMemoryBackend,
    };
    use std::path::Path;

    #[test]
    fn test_create_shared_memory() {
        let size = 4096;
        let shm = create_shared_memory(size, "dmxp_test_create").unwrap();

        assert_eq!(shm.size(), size);
        assert!(!shm.as_ptr().is_null());
        assert!(shm.is_owner());
        assert_eq!(shm.name(), "dmxp_test_create");

        unsafe {
            let slice = std::slice::from_raw_parts_mut(shm.as_ptr(), size);
            slice[0] = 0x42;
            assert_eq!(slice[0], 0x42);
        }
    }

    #[test]
    fn test_size_rounded_to_128() {
        let shm = create_shared_memory(1000, "dmxp_test_round").unwrap();
        assert_eq!(shm.size(), 1024);
    }

    #[test]
    fn test_raw_handle() {
        let shm = create_shared_memory(4096, "dmxp_test_handle").unwrap();
        match shm.raw_handle() {
            RawHandle::Fd(fd) => {
                assert!(fd > 0, "File descriptor should be positive");
            }
        }
    }

    #[test]
    fn test_attach_sees_creator_writes() {
        let size = 8192;
        let creator = create_shared_memory(size, "dmxp_test_attach").unwrap();
        let attached = attach_shared_memory("dmxp_test_attach", size).unwrap();
        assert!(!attached.is_owner());

        unsafe {
            let src = std::slice::from_raw_parts_mut(creator.as_ptr(), size);
            for (i, byte) in src.iter_mut().enumerate().take(100) {
                *byte = (i % 256) as u8;
            }

            let dst = std::slice::from_raw_parts(attached.as_ptr(), size);
            for (i, byte) in dst.iter().enumerate().take(100) {
                assert_eq!(*byte, (i % 256) as u8);
            }
        }
    }

    #[test]
    fn test_attach_missing_segment() {
        let result = attach_shared_memory("dmxp_test_does_not_exist", 4096);
        assert!(result.is_err());
        assert_eq!(result.unwrap_err().kind(), std::io::ErrorKind::NotFound);
    }

    #[test]
    fn test_attach_rejects_smaller_segment() {
        let _creator = create_shared_memory(4096, "dmxp_test_small").unwrap();
        let result = attach_shared_memory("dmxp_test_small", 8192);
        assert_eq!(result.unwrap_err().kind(), std::io::ErrorKind::InvalidData);
    }

    #[test]
    fn test_creator_drop_unlinks() {
        let path = Path::new("/dev/shm/dmxp_test_unlink");
        {
            let _shm = create_shared_memory(4096, "dmxp_test_unlink").unwrap();
            assert!(path.exists());
        }
        assert!(!path.exists());
        // Unlinking twice is fine
        unlink_shared_memory("dmxp_test_unlink").unwrap();
    }

    #[test]
    fn test_attached_mapping_outlives_unlink() {
        let creator = create_shared_memory(4096, "dmxp_test_outlive").unwrap();
        let attached = attach_shared_memory("dmxp_test_outlive", 4096).unwrap();
        unsafe { *creator.as_ptr() = 7 };
        drop(creator);
        assert_eq!(unsafe { *attached.as_ptr() }, 7);
    }

    #[test]
    fn test_mmap_zero_initialized() {
        let size = 1024;
        let shm = create_shared_memory(size, "dmxp_test_zero").unwrap();

        unsafe {
            let slice = std::slice::from_raw_parts(shm.as_ptr(), size);
            for byte in slice {
                assert_eq!(*byte, 0, "Mmap'd memory should be zero-initialized");
            }
        }
    }
}

#[cfg(not(target_os = "linux"))]
mod non_linux_tests {
    use dmxp_bridge::Core::{attach_shared_memory, create_shared_memory};

    #[test]
    fn test_unsupported_platform() {
        let result = create_shared_memory(4096, "dmxp_test");
        assert!(result.is_err());

        if let Err(err) = result {
            assert_eq!(err.kind(), std::io::ErrorKind::Unsupported);
        }
    }

    #[test]
    fn test_attach_unsupported_platform() {
        let result = attach_shared_memory("dmxp_test", 4096);
        assert!(result.is_err());

        if let Err(err) = result {
            assert_eq!(err.kind(), std::io::ErrorKind::Unsupported);
        }
    }
}
