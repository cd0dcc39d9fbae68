// Bridge transport: binds the outbound and inbound channel of one process

use std::collections::HashSet;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytemuck::Pod;
use lazy_static::lazy_static;
use parking_lot::Mutex;

use super::channel::{Channel, ReaderChannel, WriterChannel};
use super::role::{segment_name, BridgeId, Side};
use crate::config::{option_for_channel, BridgeConfig, BridgeOptions};
use crate::Core::alloc::ChannelSize;
use crate::error::{BridgeError, BridgeResult, Status};
use crate::Queue::wait::{wait_on, WaitPolicy};
use crate::Queue::{CommandId, DataQueue, Header};

/// Pass as `timeout_ms` to wait until cancelled.
pub const INFINITE_TIMEOUT: u32 = u32::MAX;

lazy_static! {
    /// `<side>:<segment>` keys bound by a live [`Bridge`] in this process.
    static ref BOUND_CHANNELS: Mutex<HashSet<String>> = Mutex::new(HashSet::new());
}

/// Claim on [`BOUND_CHANNELS`], released on drop.
struct Registration {
    keys: Vec<String>,
}

impl Registration {
    fn claim(side: Side, names: &[&str]) -> BridgeResult<Self> {
        let keys: Vec<String> = names.iter().map(|n| format!("{:?}:{}", side, n)).collect();
        let mut bound = BOUND_CHANNELS.lock();
        if let Some((_, name)) = keys.iter().zip(names).find(|(k, _)| bound.contains(*k)) {
            return Err(BridgeError::AlreadyBound(name.to_string()));
        }
        for key in &keys {
            bound.insert(key.clone());
        }
        Ok(Self { keys })
    }
}

impl Drop for Registration {
    fn drop(&mut self) {
        let mut bound = BOUND_CHANNELS.lock();
        for key in &self.keys {
            bound.remove(key);
        }
    }
}

/// One process's end of the bridge.
///
/// Owns the writer channel (outbound direction) and the reader channel
/// (inbound direction) and is handed by reference to every call site that
/// sends or receives. At most one `Bridge` per side and segment name may be
/// alive in a process; a second `init` is rejected until the first is dropped.
///
/// Every operation observes the liveness flag passed to `init`: once it is
/// false, sends become silent no-ops and reads/waits fail fast.
pub struct Bridge<R: BridgeId> {
    side: Side,
    writer: WriterChannel,
    reader: ReaderChannel,
    options: BridgeOptions,
    running: Arc<AtomicBool>,
    /// Uids handed out to outbound messages.
    counter: AtomicU64,
    /// Sends that were dropped or truncated.
    failures: AtomicU64,
    _registration: Registration,
    _role: PhantomData<R>,
}

impl<R: BridgeId> Bridge<R> {
    /// Create (client) or attach (server) both channel segments.
    pub fn init(
        side: Side,
        config: &BridgeConfig,
        options: BridgeOptions,
        running: Arc<AtomicBool>,
    ) -> BridgeResult<Self> {
        let writer_name = segment_name(&config.base_name, side.writer_suffix());
        let reader_name = segment_name(&config.base_name, side.reader_suffix());
        let registration = Registration::claim(side, &[&writer_name, &reader_name])?;

        let (writer_size, reader_size) = match side {
            Side::Client => (&config.client_to_server, &config.server_to_client),
            Side::Server => (&config.server_to_client, &config.client_to_server),
        };

        let open = |name: &str, size: &ChannelSize| {
            let channel = if side.creates_segments() {
                Channel::create(name, size)
            } else {
                Channel::attach(name, size)
            };
            channel.map_err(|e| {
                log::error!("Bridge<{}>::init(): failed to bind {}: {}", R::NAME, name, e);
                e
            })
        };
        let writer = open(&writer_name, writer_size)?;
        let reader = open(&reader_name, reader_size)?;

        log::debug!(
            "Bridge<{}>::init(): {:?} bound writer {} and reader {}",
            R::NAME,
            side,
            writer_name,
            reader_name
        );

        Ok(Self {
            side,
            writer,
            reader,
            options,
            running,
            counter: AtomicU64::new(0),
            failures: AtomicU64::new(0),
            _registration: registration,
            _role: PhantomData,
        })
    }

    pub fn side(&self) -> Side {
        self.side
    }

    pub fn options(&self) -> &BridgeOptions {
        &self.options
    }

    pub fn writer_channel(&self) -> &WriterChannel {
        &self.writer
    }

    pub fn reader_channel(&self) -> &ReaderChannel {
        &self.reader
    }

    #[inline]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub fn running_flag(&self) -> &Arc<AtomicBool> {
        &self.running
    }

    fn poll_interval(&self) -> Duration {
        Duration::from_micros(self.options.poll_interval_us)
    }

    /// Wait policy for `timeout_ms` (0 selects the configured ack timeout).
    pub(crate) fn policy<'a>(&'a self, timeout_ms: u32, early_out: Option<&'a AtomicBool>) -> WaitPolicy<'a> {
        let timeout = match timeout_ms {
            0 => Some(Duration::from_millis(self.options.ack_timeout_ms as u64)),
            INFINITE_TIMEOUT => None,
            ms => Some(Duration::from_millis(ms as u64)),
        };
        WaitPolicy::new(timeout, self.poll_interval(), &self.running).with_early_out(early_out)
    }

    // ---------------------------------------------------------------------
    // Counters
    // ---------------------------------------------------------------------

    /// Number of outbound messages started by this process; also the uid of
    /// the latest one.
    pub fn get_counter(&self) -> u64 {
        self.counter.load(Ordering::Relaxed)
    }

    pub fn reset_counter(&self) {
        self.counter.store(0, Ordering::Relaxed);
    }

    /// Number of sends that could not be completed.
    pub fn send_failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    pub(crate) fn record_failure(&self) {
        self.failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Claim the uid of a new outbound message.
    pub(crate) fn reserve_uid(&self) -> u64 {
        self.counter.fetch_add(1, Ordering::Relaxed) + 1
    }

    // ---------------------------------------------------------------------
    // Writer side
    // ---------------------------------------------------------------------

    /// Enter the outbound batch, blocking while another thread holds it.
    pub fn begin_batch(&self) -> Status {
        if !self.is_running() {
            return Status::Failure;
        }
        self.writer.commands.begin_write_batch()
    }

    /// Leave the outbound batch. Returns the headers pushed during it, or 0
    /// when the bridge is not running (the batch is released either way).
    pub fn end_batch(&self) -> usize {
        let pushed = self.writer.commands.end_write_batch();
        if self.is_running() {
            pushed
        } else {
            0
        }
    }

    /// Reserve room for `words` data words before pushing them.
    ///
    /// With `pos_reset_on_last_index` the words must be contiguous: if they
    /// would straddle the end of the buffer, the tail is skipped and counted
    /// against the reservation. When the write carries the data cursor into a
    /// new lap, waits for the reader to acknowledge the previous lap and then
    /// raises the reader loop flag.
    pub fn sync_data_queue(&self, words: usize, pos_reset_on_last_index: bool) -> Status {
        if !self.is_running() {
            return Status::Failure;
        }

        let data = &self.writer.data;
        let capacity = data.capacity();
        let reservation = data.reservation(words, pos_reset_on_last_index);
        if words >= capacity || reservation > capacity {
            log::error!(
                "Out of buffer memory in channel {}: {} words requested but the data queue holds {}. \
                 Increase {}_data_queue_size and {}_channel_mem_size.",
                self.writer.name(),
                words,
                capacity,
                option_for_channel::<R>(self.writer.name()),
                option_for_channel::<R>(self.writer.name())
            );
            return Status::Failure;
        }

        let crosses = data.crosses_lap(reservation);
        let policy = self.policy(0, None);

        if crosses {
            let status = wait_on(self.writer.loop_flag_word(), &policy, || {
                !self.writer.reader_loop_flag()
            });
            if status != Status::Success {
                log::error!(
                    "sync_data_queue(): reader of {} has not acknowledged the previous lap ({:?})",
                    self.writer.name(),
                    status
                );
                return status;
            }
        }

        let status = data.wait_for_space(reservation, &policy);
        if status != Status::Success {
            log::error!(
                "sync_data_queue(): no room for {} words in {} ({:?})",
                reservation,
                self.writer.name(),
                status
            );
            return status;
        }

        if crosses {
            self.writer.set_reader_loop_flag();
        }
        Status::Success
    }

    // ---------------------------------------------------------------------
    // Reader side
    // ---------------------------------------------------------------------

    /// Remove and return the next inbound header.
    ///
    /// Only call this after `wait_for_command` returned `Success`: the queue
    /// is not checked for emptiness and popping an empty queue corrupts it.
    pub fn pop_front(&self) -> Header {
        self.reader.commands.pop_front()
    }

    /// Run one data-queue read and acknowledge a writer lap if the read
    /// cursor entered a new lap during it.
    ///
    /// Compared by lap number, not physical index: a read that skips to
    /// index 0 can end on the index it started from.
    fn track_read<T>(&self, read: impl FnOnce(&DataQueue) -> T) -> T {
        let data = &self.reader.data;
        let before = data.read_lap();
        let out = read(data);
        if data.read_lap() > before && self.reader.reader_loop_flag() {
            self.reader.clear_reader_loop_flag();
        }
        out
    }

    /// Pull one data word. Returns 0 (and logs) when nothing is queued.
    pub fn get_data(&self) -> u32 {
        if !self.is_running() {
            return 0;
        }
        match self.track_read(|data| data.pull()) {
            Some(word) => word,
            None => {
                log::error!("get_data(): data queue of {} is empty", self.reader.name());
                0
            }
        }
    }

    /// Pull a length-prefixed blob into a fresh buffer.
    pub fn get_data_blob(&self) -> Option<Vec<u8>> {
        if !self.is_running() {
            return None;
        }
        let blob = self.track_read(|data| data.pull_blob());
        if blob.is_none() {
            log::error!("get_data_blob(): no blob queued in {}", self.reader.name());
        }
        blob
    }

    /// Pull a blob into `out`, truncating if it is longer. Returns the blob's
    /// full length in bytes, 0 when nothing could be read.
    pub fn get_data_into(&self, out: &mut [u8]) -> u32 {
        if !self.is_running() {
            return 0;
        }
        match self.track_read(|data| data.pull_into(out)) {
            Some(len) => len as u32,
            None => {
                log::error!("get_data_into(): no blob queued in {}", self.reader.name());
                0
            }
        }
    }

    /// Pull a blob holding one `T` straight into `obj`. With `check_size`, a
    /// blob whose length differs from `size_of::<T>()` is logged.
    pub fn copy_data<T: Pod>(&self, obj: &mut T, check_size: bool) -> u32 {
        if !self.is_running() {
            return 0;
        }
        match self.track_read(|data| data.pull_and_copy(obj)) {
            Some(len) => {
                let expected = std::mem::size_of::<T>();
                if check_size && len != expected {
                    log::error!(
                        "copy_data(): size mismatch, blob holds {} bytes but {} were expected",
                        len,
                        expected
                    );
                }
                len as u32
            }
            None => {
                log::error!("copy_data(): no blob queued in {}", self.reader.name());
                0
            }
        }
    }

    /// Physical read index of the inbound data queue.
    pub fn get_data_pos(&self) -> usize {
        self.reader.data.get_pos()
    }

    /// Hold back the inbound read position until `end_read_data`.
    pub fn begin_read_data(&self) -> Status {
        if !self.is_running() {
            return Status::Failure;
        }
        self.reader.data.begin_batch()
    }

    /// Publish the inbound read position. Returns the words consumed since
    /// `begin_read_data`, or 0 when not running.
    pub fn end_read_data(&self) -> usize {
        let consumed = self.reader.data.end_batch();
        if self.is_running() {
            consumed
        } else {
            0
        }
    }

    /// Throw away inbound data up to the position a header recorded.
    pub(crate) fn discard_payload(&self, header: &Header) {
        let target = header.data_offset as usize;
        self.track_read(|data| {
            while data.get_pos() != target && data.pull().is_some() {}
        });
    }

    /// Drain and discard everything queued inbound.
    ///
    /// Repeats until a pass finds both queues empty; fails when the peer
    /// keeps producing for `drain_attempts` passes.
    pub fn ensure_queue_empty(&self) -> Status {
        if !self.is_running() {
            return Status::Failure;
        }

        for _ in 0..self.options.drain_attempts.max(1) {
            let commands = self.reader.commands.drain();
            let words = self.track_read(|data| data.drain());
            if commands == 0 && words == 0 {
                return Status::Success;
            }
            log::debug!(
                "ensure_queue_empty(): discarded {} commands and {} words from {}",
                commands,
                words,
                self.reader.name()
            );
            std::thread::sleep(self.poll_interval());
        }

        log::error!(
            "ensure_queue_empty(): {} did not drain after {} attempts",
            self.reader.name(),
            self.options.drain_attempts
        );
        Status::Failure
    }

    /// Wait until an inbound header is queued and matches `expected`
    /// ([`CommandId::ANY`] matches everything). The header stays queued.
    ///
    /// `timeout_ms == 0` uses the configured ack timeout and
    /// [`INFINITE_TIMEOUT`] waits until cancelled. Returns `Failure` when
    /// cancelled or when the queued header is a different command.
    pub fn wait_for_command(
        &self,
        expected: CommandId,
        timeout_ms: u32,
        early_out: Option<&AtomicBool>,
    ) -> Status {
        if !self.is_running() {
            return Status::Failure;
        }
        let policy = self.policy(timeout_ms, early_out);
        self.wait_for_command_with(expected, &policy)
    }

    pub(crate) fn wait_for_command_with(&self, expected: CommandId, policy: &WaitPolicy<'_>) -> Status {
        let status = self.reader.commands.wait_for_header(policy);
        if status != Status::Success {
            return status;
        }
        match self.reader.commands.peek() {
            Some(header) if header.command.matches(expected) => Status::Success,
            Some(header) => {
                log::error!(
                    "wait_for_command(): expected {:?} but {:?} is queued",
                    expected,
                    header.command
                );
                Status::Failure
            }
            None => Status::Failure,
        }
    }

    /// `wait_for_command` followed by `pop_front` on success.
    pub fn wait_for_command_and_discard(
        &self,
        expected: CommandId,
        timeout_ms: u32,
        early_out: Option<&AtomicBool>,
    ) -> Status {
        let status = self.wait_for_command(expected, timeout_ms, early_out);
        if status == Status::Success {
            let _ = self.pop_front();
        }
        status
    }
}

impl<R: BridgeId> Drop for Bridge<R> {
    fn drop(&mut self) {
        log::debug!(
            "Bridge<{}>: {:?} unbinding {} and {} after {} messages",
            R::NAME,
            self.side,
            self.writer.name(),
            self.reader.name(),
            self.get_counter()
        );
    }
}
