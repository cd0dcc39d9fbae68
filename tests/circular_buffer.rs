use dmxp_bridge::Queue::Buffer::layout::QueueHeader;
use dmxp_bridge::Queue::Buffer::CircularBuffer;
use dmxp_bridge::Queue::Structs::Header;
use dmxp_bridge::CommandId;
use std::alloc::{alloc_zeroed, dealloc, Layout};
use std::mem::size_of;
use std::sync::Arc;
use std::thread;

/// Heap-backed control block plus slots, laid out as in a channel segment.
struct Backing {
    ptr: *mut u8,
    layout: Layout,
}

unsafe impl Send for Backing {}
unsafe impl Sync for Backing {}

impl Backing {
    fn new<T: bytemuck::Pod>(capacity: usize) -> (Self, CircularBuffer<T>) {
        let size = size_of::<QueueHeader>() + capacity * size_of::<T>();
        let layout = Layout::from_size_align(size, 128).unwrap();
        let ptr = unsafe { alloc_zeroed(layout) };
        if ptr.is_null() {
            panic!("Failed to allocate aligned memory");
        }
        let header = ptr as *mut QueueHeader;
        let buffer = unsafe {
            CircularBuffer::<T>::init_header(header, capacity);
            CircularBuffer::new(header, ptr.add(size_of::<QueueHeader>()) as *mut T)
        };
        (Self { ptr, layout }, buffer)
    }
}

impl Drop for Backing {
    fn drop(&mut self) {
        unsafe { dealloc(self.ptr, self.layout) };
    }
}

#[test]
fn simple_push_pull() {
    let (_backing, rb) = Backing::new::<u32>(16);

    assert!(rb.is_empty());
    assert!(rb.push(7));
    assert!(rb.push(8));
    assert_eq!(rb.available(), 2);
    assert_eq!(rb.peek(), Some(7));
    assert_eq!(rb.pull(), Some(7));
    assert_eq!(rb.pull(), Some(8));
    assert_eq!(rb.pull(), None);
}

#[test]
fn full_buffer_rejects_push() {
    let (_backing, rb) = Backing::new::<u32>(4);
    for i in 0..4 {
        assert!(rb.push(i));
    }
    assert_eq!(rb.free_slots(), 0);
    assert!(!rb.push(99));

    assert_eq!(rb.pull(), Some(0));
    assert!(rb.push(4));
}

#[test]
fn push_slice_is_all_or_nothing() {
    let (_backing, rb) = Backing::new::<u32>(8);
    assert!(rb.push_slice(&[1, 2, 3, 4, 5]));
    assert!(!rb.push_slice(&[6, 7, 8, 9]));
    assert_eq!(rb.available(), 5);
    assert!(rb.push_slice(&[6, 7, 8]));
    assert_eq!(rb.free_slots(), 0);
}

#[test]
fn positions_are_monotonic_and_wrap_onto_slots() {
    let (_backing, rb) = Backing::new::<u32>(8);
    for i in 0..20u32 {
        assert!(rb.push(i));
        assert_eq!(rb.pull(), Some(i));
    }
    assert_eq!(rb.write_cursor(), 20);
    assert_eq!(rb.read_cursor(), 20);
    assert_eq!(rb.write_index(), 20 % 8);
    assert_eq!(rb.read_index(), 20 % 8);
    assert_eq!(rb.published_positions(), (20, 20));
}

#[test]
fn headers_round_trip() {
    let (_backing, rb) = Backing::new::<Header>(4);
    let mut header = Header::new(CommandId::SYN, 0xdead, Default::default());
    header.uid = 42;
    assert!(rb.push(header));
    assert_eq!(rb.pull(), Some(header));
}

#[test]
fn attach_view_starts_at_published_positions() {
    let (backing, rb) = Backing::new::<u32>(8);
    rb.push_slice(&[1, 2, 3]);
    rb.pull();

    let second = unsafe {
        CircularBuffer::<u32>::new(
            backing.ptr as *const QueueHeader,
            backing.ptr.add(size_of::<QueueHeader>()) as *mut u32,
        )
    };
    assert_eq!(second.read_cursor(), 1);
    assert_eq!(second.write_cursor(), 3);
    assert_eq!(second.pull(), Some(2));
}

#[test]
fn spsc_threads_preserve_order() {
    const COUNT: u32 = 100_000;
    let (_backing, rb) = Backing::new::<u32>(64);
    let rb = Arc::new(rb);

    let producer = {
        let rb = Arc::clone(&rb);
        thread::spawn(move || {
            let mut next = 0;
            while next < COUNT {
                if rb.push(next) {
                    next += 1;
                } else {
                    thread::yield_now();
                }
            }
        })
    };

    let mut expected = 0;
    while expected < COUNT {
        match rb.pull() {
            Some(value) => {
                assert_eq!(value, expected);
                expected += 1;
            }
            None => thread::yield_now(),
        }
    }
    producer.join().unwrap();
}
