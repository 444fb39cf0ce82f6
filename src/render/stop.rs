//! Stop signals polled once per frame boundary.

use std::io::BufRead;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread;
use std::time::Duration;

use log::debug;

/// Source of the request to leave the render loop.
pub trait StopSignal {
    /// Wait up to `timeout` for a stop request.
    fn should_stop(&mut self, timeout: Duration) -> bool;
}

/// Never asks to stop; the loop runs until its frame budget is spent.
#[derive(Debug, Clone, Copy, Default)]
pub struct NeverStop;

impl StopSignal for NeverStop {
    fn should_stop(&mut self, _timeout: Duration) -> bool {
        false
    }
}

/// Stops on the first message, or once every sender is gone.
pub struct ChannelStop {
    receiver: Receiver<()>,
}

impl ChannelStop {
    /// A stop signal and the sender that triggers it.
    pub fn new() -> (Sender<()>, Self) {
        let (sender, receiver) = mpsc::channel();
        (sender, Self { receiver })
    }

    /// Stop on a line of input or end of input on stdin.
    ///
    /// The reader thread is detached; it only ever touches stdin.
    pub fn stdin() -> Self {
        let (sender, stop) = Self::new();
        thread::spawn(move || {
            let mut line = String::new();
            let read = std::io::stdin().lock().read_line(&mut line);
            debug!("Stdin reader finished: {read:?}");
            let _ = sender.send(());
        });
        stop
    }
}

impl StopSignal for ChannelStop {
    fn should_stop(&mut self, timeout: Duration) -> bool {
        match self.receiver.recv_timeout(timeout) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => true,
            Err(RecvTimeoutError::Timeout) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_never_stop() {
        assert!(!NeverStop.should_stop(Duration::ZERO));
    }

    #[test]
    fn test_channel_stop_waits_for_message() {
        let (sender, mut stop) = ChannelStop::new();
        assert!(!stop.should_stop(Duration::from_millis(1)));

        sender.send(()).unwrap();
        assert!(stop.should_stop(Duration::from_millis(1)));
    }

    #[test]
    fn test_channel_stop_on_disconnect() {
        let (sender, mut stop) = ChannelStop::new();
        drop(sender);
        assert!(stop.should_stop(Duration::from_millis(1)));
    }

    #[test]
    fn test_channel_stop_from_thread() {
        let (sender, mut stop) = ChannelStop::new();
        let handle = thread::spawn(move || sender.send(()).unwrap());
        assert!(stop.should_stop(Duration::from_secs(5)));
        handle.join().unwrap();
    }
}
