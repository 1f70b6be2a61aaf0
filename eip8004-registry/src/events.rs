use eip8004_types::RegistryEvent;
use tokio::sync::mpsc;

/// Append-only journal of one registry's events, fanned out to subscribers.
///
/// Emission is synchronous: when a mutating call returns, its events are
/// already in the journal and queued on every live subscriber channel.
/// Subscribers whose receiver was dropped are pruned on the next emit.
pub struct EventLog {
    /// Registry name used as the log prefix
    source: &'static str,
    journal: Vec<RegistryEvent>,
    subscribers: Vec<mpsc::UnboundedSender<RegistryEvent>>,
}

impl EventLog {
    pub fn new(source: &'static str) -> Self {
        Self {
            source,
            journal: Vec::new(),
            subscribers: Vec::new(),
        }
    }

    /// Receive every event emitted from now on.
    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<RegistryEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.attach(tx);
        rx
    }

    /// Forward future events into an existing channel.
    pub fn attach(&mut self, sender: mpsc::UnboundedSender<RegistryEvent>) {
        self.subscribers.push(sender);
        log::debug!(
            "[{}] Subscriber attached ({} total)",
            self.source,
            self.subscriber_count()
        );
    }

    pub(crate) fn emit(&mut self, event: RegistryEvent) {
        if log::log_enabled!(log::Level::Debug) {
            if let Ok(json) = serde_json::to_string(&event) {
                log::debug!("[{}] EMIT {} {}", self.source, event.name(), json);
            }
        }

        let before = self.subscribers.len();
        self.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
        let dropped = before - self.subscribers.len();
        if dropped > 0 {
            log::debug!("[{}] Removed {} closed subscriber(s)", self.source, dropped);
        }

        self.journal.push(event);
    }

    /// Everything emitted so far, oldest first
    pub fn journal(&self) -> &[RegistryEvent] {
        &self.journal
    }

    pub fn last(&self) -> Option<&RegistryEvent> {
        self.journal.last()
    }

    pub fn len(&self) -> usize {
        self.journal.len()
    }

    pub fn is_empty(&self) -> bool {
        self.journal.is_empty()
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ethers::types::Address;

    fn approval_for_all(approved: bool) -> RegistryEvent {
        RegistryEvent::ApprovalForAll {
            owner: Address::from_low_u64_be(1),
            operator: Address::from_low_u64_be(2),
            approved,
        }
    }

    #[test]
    fn test_emit_reaches_journal_and_subscriber() {
        let mut log = EventLog::new("Test");
        let mut rx = log.subscribe();

        log.emit(approval_for_all(true));

        assert_eq!(log.len(), 1);
        assert_eq!(rx.try_recv().unwrap(), approval_for_all(true));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_closed_subscribers_are_pruned() {
        let mut log = EventLog::new("Test");
        let rx = log.subscribe();
        let mut kept = log.subscribe();
        drop(rx);

        log.emit(approval_for_all(false));

        assert_eq!(log.subscriber_count(), 1);
        assert_eq!(kept.try_recv().unwrap(), approval_for_all(false));
    }

    #[test]
    fn test_late_subscriber_sees_only_new_events() {
        let mut log = EventLog::new("Test");
        log.emit(approval_for_all(true));
        let mut rx = log.subscribe();
        log.emit(approval_for_all(false));

        assert_eq!(rx.try_recv().unwrap(), approval_for_all(false));
        assert_eq!(log.journal().len(), 2);
        assert_eq!(log.last(), Some(&approval_for_all(false)));
    }
}
