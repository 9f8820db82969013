use std::collections::VecDeque;

use crate::broker::message::Message;

/// Strict FIFO of pending messages for one (subscriber, topic) pair.
#[derive(Debug, Default)]
pub struct MessageQueue {
    messages: VecDeque<Message>,
}

impl MessageQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, message: Message) {
        self.messages.push_back(message);
    }

    /// Removes and returns the oldest message.
    pub fn pop(&mut self) -> Option<Message> {
        self.messages.pop_front()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}
