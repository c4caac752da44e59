use std::collections::VecDeque;
use std::sync::{Condvar, Mutex};
use std::time::Duration;

/// One scheduled frame waiting to be sent, queued ahead of its deadline so the
/// sender thread never blocks the scheduler on socket I/O.
#[derive(Debug, Clone)]
pub struct QueuedFrame {
    pub send_time: Duration,
    pub bytes: Vec<u8>,
}

struct State {
    items: VecDeque<QueuedFrame>,
    closed: bool,
}

/// A bounded FIFO handed off between a single producer (the scheduler) and a
/// single consumer (the sender worker thread). `push` blocks while the queue
/// is full; `pop` blocks while it is empty. Mirrors the original's
/// `prepareSendQueue`/`flushSendQueue` producer/consumer split around a
/// fixed-capacity buffer, done here with a `Mutex` + `Condvar` pair instead of
/// its POSIX semaphore/mutex pair.
pub struct SendQueue {
    state: Mutex<State>,
    not_full: Condvar,
    not_empty: Condvar,
    capacity: usize,
}

impl SendQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            state: Mutex::new(State { items: VecDeque::with_capacity(capacity), closed: false }),
            not_full: Condvar::new(),
            not_empty: Condvar::new(),
            capacity: capacity.max(1),
        }
    }

    /// Blocks until there is room, then enqueues `frame`. Returns `false` if
    /// the queue was closed while waiting (frame is dropped).
    pub fn push(&self, frame: QueuedFrame) -> bool {
        let mut state = self.state.lock().unwrap();
        while state.items.len() >= self.capacity && !state.closed {
            state = self.not_full.wait(state).unwrap();
        }
        if state.closed {
            return false;
        }
        state.items.push_back(frame);
        self.not_empty.notify_one();
        true
    }

    /// Blocks until a frame is available or the queue is closed and drained.
    pub fn pop(&self) -> Option<QueuedFrame> {
        let mut state = self.state.lock().unwrap();
        loop {
            if let Some(frame) = state.items.pop_front() {
                self.not_full.notify_one();
                return Some(frame);
            }
            if state.closed {
                return None;
            }
            state = self.not_empty.wait(state).unwrap();
        }
    }

    /// Signals that no more frames will be pushed; wakes any blocked consumer
    /// or producer so they can observe the closed state.
    pub fn close(&self) {
        let mut state = self.state.lock().unwrap();
        state.closed = true;
        self.not_empty.notify_all();
        self.not_full.notify_all();
    }

    pub fn len(&self) -> usize {
        self.state.lock().unwrap().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn push_then_pop_preserves_fifo_order() {
        let queue = SendQueue::new(4);
        queue.push(QueuedFrame { send_time: Duration::ZERO, bytes: vec![1] });
        queue.push(QueuedFrame { send_time: Duration::ZERO, bytes: vec![2] });
        assert_eq!(queue.pop().unwrap().bytes, vec![1]);
        assert_eq!(queue.pop().unwrap().bytes, vec![2]);
    }

    #[test]
    fn close_unblocks_a_waiting_consumer() {
        let queue = Arc::new(SendQueue::new(2));
        let consumer = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || queue.pop())
        };
        thread::sleep(Duration::from_millis(20));
        queue.close();
        assert!(consumer.join().unwrap().is_none());
    }

    #[test]
    fn push_blocks_until_space_then_close_releases_producer() {
        let queue = Arc::new(SendQueue::new(1));
        queue.push(QueuedFrame { send_time: Duration::ZERO, bytes: vec![1] });

        let producer = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || queue.push(QueuedFrame { send_time: Duration::ZERO, bytes: vec![2] }))
        };
        thread::sleep(Duration::from_millis(20));
        queue.close();
        assert!(!producer.join().unwrap());
    }
}
