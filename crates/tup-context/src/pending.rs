use std::collections::VecDeque;

use tracing::warn;
use tup_message::{Message, MessageType};

/// The command a response answers, if it is a response at all.
pub(crate) fn answered_command(msg: &Message) -> Option<MessageType> {
    match msg.kind()? {
        MessageType::Ack => msg.parse_ack().ok(),
        MessageType::Error => msg.parse_error().ok().map(|report| report.command),
        other => other.answers(),
    }
}

/// Commands sent and not yet answered, oldest first.
#[derive(Debug)]
pub(crate) struct PendingRequests {
    queue: VecDeque<MessageType>,
    limit: usize,
}

impl PendingRequests {
    pub(crate) fn new(limit: usize) -> Self {
        Self {
            queue: VecDeque::with_capacity(limit),
            limit,
        }
    }

    pub(crate) fn push(&mut self, command: MessageType) {
        if self.limit == 0 {
            return;
        }
        if self.queue.len() == self.limit {
            if let Some(dropped) = self.queue.pop_front() {
                warn!(%dropped, limit = self.limit, "too many outstanding commands, forgetting oldest");
            }
        }
        self.queue.push_back(command);
    }

    /// Match `msg` against the oldest outstanding command it answers.
    pub(crate) fn resolve(&mut self, msg: &Message) -> Option<MessageType> {
        let command = answered_command(msg)?;
        let index = self.queue.iter().position(|&c| c == command)?;
        self.queue.remove(index)
    }

    /// Forget the oldest outstanding `command`.
    pub(crate) fn cancel(&mut self, command: MessageType) {
        if let Some(index) = self.queue.iter().position(|&c| c == command) {
            self.queue.remove(index);
        }
    }

    pub(crate) fn clear(&mut self) {
        self.queue.clear();
    }

    pub(crate) fn len(&self) -> usize {
        self.queue.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ack(command: MessageType) -> Message {
        let mut msg = Message::new();
        msg.init_ack(command);
        msg
    }

    #[test]
    fn ack_and_error_resolve_by_command() {
        let mut pending = PendingRequests::new(8);
        pending.push(MessageType::Load);
        pending.push(MessageType::Play);

        let mut err = Message::new();
        err.init_error(MessageType::Play, 7);
        assert_eq!(pending.resolve(&err), Some(MessageType::Play));
        assert_eq!(pending.resolve(&ack(MessageType::Load)), Some(MessageType::Load));
        assert_eq!(pending.len(), 0);
    }

    #[test]
    fn data_response_resolves_getter() {
        let mut pending = PendingRequests::new(8);
        pending.push(MessageType::GetVersion);

        let mut resp = Message::new();
        resp.init_resp_version("1.0").unwrap();
        assert_eq!(pending.resolve(&resp), Some(MessageType::GetVersion));
        assert_eq!(pending.resolve(&resp), None);
    }

    #[test]
    fn unmatched_frames_stay_unsolicited() {
        let mut pending = PendingRequests::new(8);
        pending.push(MessageType::Stop);

        assert_eq!(pending.resolve(&ack(MessageType::Play)), None);
        let mut cmd = Message::new();
        cmd.init_play(0);
        assert_eq!(pending.resolve(&cmd), None);
        assert_eq!(pending.len(), 1);
    }

    #[test]
    fn oldest_forgotten_at_limit() {
        let mut pending = PendingRequests::new(2);
        pending.push(MessageType::Load);
        pending.push(MessageType::Play);
        pending.push(MessageType::Stop);

        assert_eq!(pending.len(), 2);
        assert_eq!(pending.resolve(&ack(MessageType::Load)), None);
        assert_eq!(pending.resolve(&ack(MessageType::Play)), Some(MessageType::Play));
    }

    #[test]
    fn cancel_removes_one_entry() {
        let mut pending = PendingRequests::new(4);
        pending.push(MessageType::Play);
        pending.push(MessageType::Play);
        pending.cancel(MessageType::Play);
        assert_eq!(pending.len(), 1);
        pending.clear();
        assert_eq!(pending.len(), 0);
    }
}
