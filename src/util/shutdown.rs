//! Graceful shutdown handling.

use tokio::sync::broadcast;

/// Fans a single shutdown request out to every background task (driver loop,
/// status server, report subscribers).
#[derive(Clone)]
pub struct ShutdownSignal {
    sender: broadcast::Sender<()>,
}

impl ShutdownSignal {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(1);
        Self { sender }
    }

    /// Subscribe to shutdown notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.sender.subscribe()
    }

    /// Trigger shutdown. Returns how many tasks were listening.
    pub fn shutdown(&self) -> usize {
        self.sender.send(()).unwrap_or(0)
    }
}

impl Default for ShutdownSignal {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_subscribers_are_notified() {
        let signal = ShutdownSignal::new();
        let mut a = signal.subscribe();
        let mut b = signal.clone().subscribe();

        assert_eq!(signal.shutdown(), 2);
        assert!(a.recv().await.is_ok());
        assert!(b.recv().await.is_ok());
    }

    #[test]
    fn test_shutdown_without_subscribers() {
        assert_eq!(ShutdownSignal::new().shutdown(), 0);
    }
}
