// Data queue tests over real /dev/shm segments.
// The writer and reader views are two independent attachments, as they
// would be in two processes.

use dmxp_bridge::Bridge::Channel;
use dmxp_bridge::Core::alloc::ChannelSize;
use dmxp_bridge::Queue::{words_for, WaitPolicy, SKIP_MARKER};
use dmxp_bridge::Status;
use std::sync::atomic::AtomicBool;
use std::time::{Duration, Instant};

const SMALL: ChannelSize = ChannelSize::new(64 * 1024, 16, 8);

fn pair(name: &str, size: &ChannelSize) -> (Channel, Channel) {
    let writer = Channel::create(name, size).unwrap();
    let reader = Channel::attach(name, size).unwrap();
    (writer, reader)
}

#[test]
fn test_words_for() {
    assert_eq!(words_for(0), 1);
    assert_eq!(words_for(1), 2);
    assert_eq!(words_for(4), 2);
    assert_eq!(words_for(5), 3);
    assert_eq!(words_for(20), 6);
}

#[test]
fn test_word_and_blob_round_trip() {
    let (w, r) = pair("dmxp_dq_round_trip", &SMALL);

    assert_eq!(w.data().push(0xabcd), Status::Success);
    assert_eq!(w.data().push_blob(b"hello"), Status::Success);
    assert_eq!(w.data().write_pos(), 1 + words_for(5));

    assert_eq!(r.data().pull(), Some(0xabcd));
    assert_eq!(r.data().pull_blob().as_deref(), Some(&b"hello"[..]));
    assert_eq!(r.data().pull(), None);
    assert_eq!(r.data().get_pos(), w.data().write_pos());
}

#[test]
fn test_empty_blob() {
    let (w, r) = pair("dmxp_dq_empty_blob", &SMALL);
    assert_eq!(w.data().push_blob(&[]), Status::Success);
    assert_eq!(r.data().pull_blob(), Some(Vec::new()));
    assert_eq!(r.data().get_pos(), 1);
}

#[test]
fn test_blob_straddling_end_skips_to_start() {
    let (w, r) = pair("dmxp_dq_straddle", &SMALL);

    // Move both cursors to index 5
    assert_eq!(w.data().push_many(&[1, 2, 3, 4, 5]), Status::Success);
    for _ in 0..5 {
        r.data().pull().unwrap();
    }

    // 12 bytes need 4 words but only 3 remain before the end
    assert_eq!(w.data().reservation(4, true), 4 + 3);
    assert_eq!(w.data().reservation(4, false), 4);
    assert_eq!(w.data().push_blob(b"0123456789ab"), Status::Success);
    assert_eq!(w.data().write_pos(), 4);

    // The reader sits on the marker left in the skipped tail
    assert_eq!(r.data().buffer().peek(), Some(SKIP_MARKER));

    assert_eq!(r.data().pull_blob().as_deref(), Some(&b"0123456789ab"[..]));
    assert_eq!(r.data().get_pos(), 4);
}

#[test]
fn test_blob_too_large_fails() {
    let (w, _r) = pair("dmxp_dq_too_large", &SMALL);
    // 7 words of payload + prefix == capacity
    assert_eq!(w.data().push_blob(&[0u8; 28]), Status::Failure);
    assert_eq!(w.data().write_pos(), 0);
}

#[test]
fn test_blob_fails_without_room() {
    let (w, _r) = pair("dmxp_dq_no_room", &SMALL);
    assert_eq!(w.data().push_many(&[0; 6]), Status::Success);
    assert_eq!(w.data().push_blob(b"12345"), Status::Failure);
    assert_eq!(w.data().free_slots(), 2);
}

#[test]
fn test_crosses_lap() {
    let (w, _r) = pair("dmxp_dq_lap", &SMALL);
    assert!(!w.data().crosses_lap(7));
    assert!(w.data().crosses_lap(8));
    assert_eq!(w.data().push_many(&[0; 6]), Status::Success);
    assert!(!w.data().crosses_lap(1));
    assert!(w.data().crosses_lap(2));
}

#[test]
fn test_two_phase_blob_is_invisible_until_end() {
    let (w, r) = pair("dmxp_dq_two_phase", &SMALL);

    let mut slot = w.data().begin_blob_push(6).unwrap();
    assert_eq!(slot.len(), 6);
    assert_eq!(slot.write(b"abcdef"), 6);
    assert!(r.data().pull_blob().is_none());

    // Only one blob may be open at a time
    assert!(w.data().begin_blob_push(2).is_none());

    assert_eq!(w.data().end_blob_push(), Status::Success);
    assert_eq!(w.data().end_blob_push(), Status::Failure);
    assert_eq!(r.data().pull_blob().as_deref(), Some(&b"abcdef"[..]));
}

#[test]
fn test_pull_into_truncates_and_reports_length() {
    let (w, r) = pair("dmxp_dq_pull_into", &SMALL);
    assert_eq!(w.data().push_blob(b"abcdefgh"), Status::Success);
    let mut out = [0u8; 3];
    assert_eq!(r.data().pull_into(&mut out), Some(8));
    assert_eq!(&out, b"abc");
    // The whole blob was consumed
    assert_eq!(r.data().available(), 0);
}

#[test]
fn test_pull_and_copy_pod() {
    let (w, r) = pair("dmxp_dq_copy", &SMALL);
    let sent: [u32; 3] = [7, 8, 9];
    assert_eq!(w.data().push_blob(bytemuck::bytes_of(&sent)), Status::Success);

    let mut received = [0u32; 3];
    assert_eq!(r.data().pull_and_copy(&mut received), Some(12));
    assert_eq!(received, sent);
}

#[test]
fn test_read_batch_defers_release() {
    let (w, r) = pair("dmxp_dq_read_batch", &SMALL);
    assert_eq!(w.data().push_many(&[1, 2, 3, 4]), Status::Success);
    assert_eq!(w.data().free_slots(), 4);

    assert_eq!(r.data().begin_batch(), Status::Success);
    assert_eq!(r.data().begin_batch(), Status::Failure);
    r.data().pull().unwrap();
    r.data().pull().unwrap();
    r.data().pull().unwrap();
    // Still held by the reader
    assert_eq!(w.data().free_slots(), 4);

    assert_eq!(r.data().end_batch(), 3);
    assert_eq!(w.data().free_slots(), 7);
    assert_eq!(r.data().end_batch(), 0);
}

#[test]
fn test_wait_for_space_times_out_then_succeeds() {
    let (w, r) = pair("dmxp_dq_wait_space", &SMALL);
    let running = AtomicBool::new(true);
    assert_eq!(w.data().push_many(&[0; 8]), Status::Success);

    let start = Instant::now();
    let policy = WaitPolicy::new(Some(Duration::from_millis(50)), Duration::from_millis(5), &running);
    assert_eq!(w.data().wait_for_space(1, &policy), Status::Timeout);
    assert!(start.elapsed() >= Duration::from_millis(50));

    r.data().pull().unwrap();
    let policy = WaitPolicy::new(Some(Duration::from_millis(50)), Duration::from_millis(5), &running);
    assert_eq!(w.data().wait_for_space(1, &policy), Status::Success);
}

#[test]
fn test_read_lap_counts_skipped_wraps() {
    let (w, r) = pair("dmxp_dq_read_lap", &SMALL);
    assert_eq!(w.data().push_blob(&[7u8; 16]), Status::Success);
    assert_eq!(r.data().pull_blob().map(|b| b.len()), Some(16));
    assert_eq!(r.data().read_lap(), 0);

    // Skip 3 + 5 words: the reader ends one lap later on the same index
    assert_eq!(w.data().push_blob(&[8u8; 16]), Status::Success);
    assert_eq!(r.data().pull_blob().map(|b| b.len()), Some(16));
    assert_eq!(r.data().get_pos(), 5);
    assert_eq!(r.data().read_lap(), 1);
}
