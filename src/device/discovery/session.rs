use tokio::sync::watch;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    Stopped,
    Scanning,
    Connecting { device_id: String },
    Connected { device_id: String },
    Disconnecting { device_id: String },
}

/// Current link state of the discovery loop, observable by the UI.
pub struct ConnectionSession {
    state: watch::Sender<ConnectionState>,
}

impl Default for ConnectionSession {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionSession {
    pub fn new() -> Self {
        let (state, _) = watch::channel(ConnectionState::Stopped);
        Self { state }
    }

    pub fn state(&self) -> ConnectionState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    pub(crate) fn transition(&self, next: ConnectionState) {
        self.state.send_if_modified(|current| {
            if *current == next {
                return false;
            }
            tracing::debug!("Connection state {:?} -> {:?}", current, next);
            *current = next;
            true
        });
    }
}
