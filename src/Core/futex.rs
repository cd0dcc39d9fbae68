use std::sync::atomic::AtomicU32;
use std::time::Duration;

// The futex words live in memory mapped by two processes, so the PRIVATE
// flag must not be used here: private futexes are keyed per address space.

/// Block while `atomic == expected`, for at most `timeout`.
///
/// Returns early on wake-ups, signals or spurious wake-ups; callers always
/// re-check their own condition.
#[cfg(target_os = "linux")]
pub fn futex_wait(atomic: &AtomicU32, expected: u32, timeout: Duration) {
    use std::ptr;
    use std::sync::atomic::Ordering;

    // Check condition first to avoid syscall if possible
    if atomic.load(Ordering::Acquire) != expected {
        return;
    }

    let ts = libc::timespec {
        tv_sec: timeout.as_secs() as libc::time_t,
        tv_nsec: timeout.subsec_nanos() as libc::c_long,
    };

    unsafe {
        libc::syscall(
            libc::SYS_futex,
            atomic as *const AtomicU32 as *const u32,
            libc::FUTEX_WAIT,
            expected,
            &ts as *const libc::timespec,
            ptr::null::<u32>(),
            0u32,
        );
    }
}

/// Wake every waiter parked on `atomic`, in any process.
#[cfg(target_os = "linux")]
pub fn futex_wake(atomic: &AtomicU32) {
    unsafe {
        libc::syscall(
            libc::SYS_futex,
            atomic as *const AtomicU32 as *const u32,
            libc::FUTEX_WAKE,
            i32::MAX,
            std::ptr::null::<libc::timespec>(),
            std::ptr::null::<u32>(),
            0u32,
        );
    }
}

#[cfg(not(target_os = "linux"))]
pub fn futex_wait(_atomic: &AtomicU32, _expected: u32, timeout: Duration) {
    // Fallback for non-Linux: sleep out the slice
    std::thread::sleep(timeout);
}

#[cfg(not(target_os = "linux"))]
pub fn futex_wake(_atomic: &AtomicU32) {
    // No-op on non-Linux
}
