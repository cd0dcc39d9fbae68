// Waiting for replies to earlier commands

use std::sync::atomic::AtomicBool;

use super::role::BridgeId;
use super::transport::Bridge;
use crate::error::Status;
use crate::Queue::CommandId;

impl<R: BridgeId> Bridge<R> {
    /// Wait for the `RESPONSE` to the message with uid `uid`; the response
    /// stays queued on success.
    ///
    /// Responses to older messages found at the front of the queue were
    /// given up on by their sender and are discarded together with their
    /// payload. A response with a newer uid, or any other command, fails.
    pub fn wait_for_response(&self, uid: u64, timeout_ms: u32, early_out: Option<&AtomicBool>) -> Status {
        if !self.is_running() {
            return Status::Failure;
        }
        let policy = self.policy(timeout_ms, early_out);
        loop {
            let status = self.wait_for_command_with(CommandId::RESPONSE, &policy);
            if status != Status::Success {
                return status;
            }

            let header = match self.reader_channel().commands().peek() {
                Some(header) => header,
                None => return Status::Failure,
            };
            if header.uid == uid {
                return Status::Success;
            }
            if header.uid > uid {
                log::error!(
                    "wait_for_response(): waiting for uid {} but response {} arrived first",
                    uid,
                    header.uid
                );
                return Status::Failure;
            }

            log::warn!("wait_for_response(): discarding stale response {}", header.uid);
            let header = self.pop_front();
            self.discard_payload(&header);
        }
    }

    /// Wait for and pop the response to `uid`, logging on failure.
    /// The response payload is left for the caller to read.
    pub fn wait_for_server_response(&self, func: &str, uid: u64) -> Status {
        let status = self.wait_for_response(uid, 0, None);
        if status == Status::Success {
            let _ = self.pop_front();
        } else {
            log::error!("{} failed with: no response from server.", func);
        }
        status
    }

    /// When the server answers every command, wait for the response to `uid`
    /// and return its first data word; otherwise return `default` at once.
    pub fn wait_for_optional_server_response(&self, func: &str, uid: u64, default: u32) -> u32 {
        if !self.options().send_all_server_responses {
            return default;
        }
        if self.wait_for_server_response(func, uid) != Status::Success {
            return default;
        }
        self.get_data()
    }
}
