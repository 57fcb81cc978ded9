//! Connection state machine.

use std::sync::{Mutex, MutexGuard, PoisonError};

use hublink_core::{ConnectionError, ConnectionStatus, StatusEvent};

/// Holds the session status; every read-modify-write happens under one lock.
#[derive(Debug, Default)]
pub(crate) struct Session {
    status: Mutex<ConnectionStatus>,
}

impl Session {
    fn lock(&self) -> MutexGuard<'_, ConnectionStatus> {
        self.status.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn status(&self) -> ConnectionStatus {
        *self.lock()
    }

    /// Adopts a status reported by the transport.
    pub(crate) fn set(&self, status: ConnectionStatus) {
        *self.lock() = status;
    }

    /// DISCONNECTED becomes CONNECTING; any other status yields the event
    /// rejecting the request.
    pub(crate) fn begin_connect(&self) -> Result<(), StatusEvent> {
        let mut status = self.lock();
        match *status {
            ConnectionStatus::Disconnected => {
                *status = ConnectionStatus::Connecting;
                Ok(())
            }
            ConnectionStatus::Connecting => Err(StatusEvent::error(
                ConnectionStatus::Connecting,
                ConnectionError::ConnProgress,
                "connection already in progress",
            )),
            ConnectionStatus::Connected => Err(StatusEvent::error(
                ConnectionStatus::Connected,
                ConnectionError::AlreadyConnected,
                "already connected",
            )),
            ConnectionStatus::Disconnecting => Err(StatusEvent::error(
                ConnectionStatus::Disconnecting,
                ConnectionError::ConnProgress,
                "disconnection in progress",
            )),
        }
    }

    /// CONNECTED becomes DISCONNECTING; any other status yields the event
    /// rejecting the request.
    pub(crate) fn begin_disconnect(&self) -> Result<(), StatusEvent> {
        let mut status = self.lock();
        match *status {
            ConnectionStatus::Connected => {
                *status = ConnectionStatus::Disconnecting;
                Ok(())
            }
            ConnectionStatus::Connecting => Err(StatusEvent::error(
                ConnectionStatus::Connecting,
                ConnectionError::ConnProgress,
                "connection in progress, cannot disconnect",
            )),
            current @ (ConnectionStatus::Disconnected | ConnectionStatus::Disconnecting) => {
                Err(StatusEvent::error(
                    current,
                    ConnectionError::NotConnected,
                    "not connected",
                ))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connect_transitions() {
        let session = Session::default();
        assert_eq!(session.status(), ConnectionStatus::Disconnected);

        assert!(session.begin_connect().is_ok());
        assert_eq!(session.status(), ConnectionStatus::Connecting);

        let rejected = session.begin_connect().unwrap_err();
        assert_eq!(rejected.error, ConnectionError::ConnProgress);
        assert_eq!(session.status(), ConnectionStatus::Connecting);

        session.set(ConnectionStatus::Connected);
        let rejected = session.begin_connect().unwrap_err();
        assert_eq!(rejected.error, ConnectionError::AlreadyConnected);

        session.set(ConnectionStatus::Disconnecting);
        let rejected = session.begin_connect().unwrap_err();
        assert_eq!(rejected.status, ConnectionStatus::Disconnecting);
        assert_eq!(rejected.error, ConnectionError::ConnProgress);
        assert_eq!(session.status(), ConnectionStatus::Disconnecting);
    }

    #[test]
    fn disconnect_transitions() {
        let session = Session::default();
        let rejected = session.begin_disconnect().unwrap_err();
        assert_eq!(rejected.error, ConnectionError::NotConnected);

        session.set(ConnectionStatus::Connecting);
        let rejected = session.begin_disconnect().unwrap_err();
        assert_eq!(rejected.error, ConnectionError::ConnProgress);

        session.set(ConnectionStatus::Connected);
        assert!(session.begin_disconnect().is_ok());
        assert_eq!(session.status(), ConnectionStatus::Disconnecting);

        let rejected = session.begin_disconnect().unwrap_err();
        assert_eq!(rejected.error, ConnectionError::NotConnected);
    }
}
