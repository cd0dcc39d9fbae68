// Scoped writer for one outbound message

use std::cell::Cell;
use std::marker::PhantomData;

use super::role::BridgeId;
use super::transport::Bridge;
use crate::error::Status;
use crate::Queue::{words_for, BlobSlot, CommandId, Flags, Header};

thread_local! {
    /// Live `Command`s created on this thread.
    static ACTIVE_COMMANDS: Cell<usize> = Cell::new(0);
}

/// One in-flight outbound message.
///
/// Creating a `Command` enters the outbound batch; data pushed through it is
/// published as it goes, and dropping it pushes the header, so the peer never
/// sees a header before all of its payload. There is no way to abort: once
/// created, the header is sent.
///
/// When the bridge is not running every operation is a silent no-op.
pub struct Command<'a, R: BridgeId> {
    bridge: &'a Bridge<R>,
    header: Header,
    /// False when the bridge was not running at construction.
    active: bool,
    blob_open: bool,
    // The batch gate is owned by the creating thread.
    _not_send: PhantomData<*const ()>,
}

impl<'a, R: BridgeId> Command<'a, R> {
    pub fn new(bridge: &'a Bridge<R>, command: CommandId) -> Self {
        Self::with_flags(bridge, command, 0, Flags::empty())
    }

    pub fn with_handle(bridge: &'a Bridge<R>, command: CommandId, handle: u32) -> Self {
        Self::with_flags(bridge, command, handle, Flags::empty())
    }

    pub fn with_flags(bridge: &'a Bridge<R>, command: CommandId, handle: u32, flags: Flags) -> Self {
        let mut header = Header::new(command, handle, flags);
        let active = bridge.begin_batch() == Status::Success;
        if active {
            header.uid = bridge.reserve_uid();
            ACTIVE_COMMANDS.with(|count| {
                if count.get() > 0 {
                    log::error!("Multiple active Command instances detected!");
                }
                count.set(count.get() + 1);
            });
        }
        Self {
            bridge,
            header,
            active,
            blob_open: false,
            _not_send: PhantomData,
        }
    }

    /// Reply to the message with uid `request_uid`.
    pub fn response(bridge: &'a Bridge<R>, request_uid: u64) -> Self {
        let mut command = Self::new(bridge, CommandId::RESPONSE);
        command.header.uid = request_uid;
        command
    }

    pub fn get_uid(&self) -> u64 {
        self.header.uid
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    fn live(&self) -> bool {
        self.active && self.bridge.is_running()
    }

    fn push_failed(&self, what: &str, status: Status) {
        log::error!(
            "Command {:?}: {} failed ({:?}), message uid {} will be incomplete",
            self.header.command,
            what,
            status,
            self.header.uid
        );
        self.bridge.record_failure();
    }

    /// Push one data word.
    pub fn send_data(&mut self, word: u32) {
        if !self.live() {
            return;
        }
        let status = match self.bridge.sync_data_queue(1, false) {
            Status::Success => self.bridge.writer_channel().data.push(word),
            other => other,
        };
        if status != Status::Success {
            self.push_failed("send_data", status);
        }
    }

    /// Push a length-prefixed blob; the bytes land contiguously in the
    /// data queue.
    pub fn send_blob(&mut self, bytes: &[u8]) {
        if !self.live() {
            return;
        }
        let status = match self.bridge.sync_data_queue(words_for(bytes.len()), true) {
            Status::Success => self.bridge.writer_channel().data.push_blob(bytes),
            other => other,
        };
        if status != Status::Success {
            self.push_failed("send_blob", status);
        }
    }

    /// Push several words under one reservation.
    pub fn send_many(&mut self, words: &[u32]) {
        if !self.live() || words.is_empty() {
            return;
        }
        let status = match self.bridge.sync_data_queue(words.len(), false) {
            Status::Success => self.bridge.writer_channel().data.push_many(words),
            other => other,
        };
        if status != Status::Success {
            self.push_failed("send_many", status);
        }
    }

    /// Reserve a `size`-byte blob and return a window to fill in place.
    /// Nothing is visible to the peer until [`Command::end_data_blob`] (or
    /// the drop of this command).
    pub fn begin_data_blob(&mut self, size: usize) -> Option<BlobSlot<'_>> {
        if !self.live() {
            return None;
        }
        if self.blob_open {
            log::error!("Command {:?}: begin_data_blob while a blob is open", self.header.command);
            return None;
        }
        let status = self.bridge.sync_data_queue(words_for(size), true);
        if status != Status::Success {
            self.push_failed("begin_data_blob", status);
            return None;
        }
        match self.bridge.writer_channel().data.begin_blob_push(size) {
            Some(slot) => {
                self.blob_open = true;
                Some(slot)
            }
            None => {
                self.push_failed("begin_data_blob", Status::Failure);
                None
            }
        }
    }

    /// Publish the blob opened by [`Command::begin_data_blob`].
    pub fn end_data_blob(&mut self) {
        if !self.blob_open {
            return;
        }
        self.blob_open = false;
        let status = self.bridge.writer_channel().data.end_blob_push();
        if status != Status::Success {
            self.push_failed("end_data_blob", status);
        }
    }

    fn finalize(&mut self) {
        if self.blob_open {
            log::warn!("Command {:?}: blob left open, publishing it", self.header.command);
            self.end_data_blob();
        }

        if self.bridge.is_running() {
            let writer = self.bridge.writer_channel();
            self.header.data_offset = writer.data.write_pos() as u32;
            let policy = self.bridge.policy(0, None);
            let status = writer.commands.push(self.header, &policy);
            if status != Status::Success {
                self.push_failed("header push", status);
            }
        }

        let _ = self.bridge.end_batch();
        ACTIVE_COMMANDS.with(|count| count.set(count.get().saturating_sub(1)));
    }
}

impl<'a, R: BridgeId> Drop for Command<'a, R> {
    fn drop(&mut self) {
        if self.active {
            self.finalize();
        }
    }
}
