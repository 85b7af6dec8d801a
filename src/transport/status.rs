//! # Connection Status State Machine
//!
//! Transport event handling is reduced to a single pure transition function
//! over an event enum, so every transition is exhaustively testable without
//! a broker.
//!
//! `Connected` is only reached on subscription acknowledgment: a broker
//! connection whose subscribe fails is an error state, never "connected".

/// Connection status surfaced to consumers.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// No connection and none in progress
    #[default]
    Disconnected,
    /// Initial dial/subscribe in progress
    Connecting,
    /// Connected and subscribed
    Connected,
    /// Transport lost; automatic reconnect in progress
    Reconnecting,
    /// Terminal failure, carrying a message
    Error(String),
}

impl ConnectionState {
    /// Whether telemetry can currently flow.
    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionState::Connected)
    }
}

/// Discrete transport events, produced by the MQTT event loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// `connect()` was called; dialing begins
    Dial,
    /// Broker acknowledged the connection (subscription still pending)
    ConnAck,
    /// Broker acknowledged the subscriptions
    SubAck,
    /// Subscribe request could not be issued or was rejected
    SubFail(String),
    /// Transport dropped mid-stream; reconnect will follow
    ConnectionLost(String),
    /// Terminal failure
    Fatal(String),
    /// `disconnect()` was called; deterministic teardown
    Teardown,
}

impl ConnectionState {
    /// Apply one transport event, yielding the next state.
    ///
    /// Transitions:
    /// `Disconnected -> Connecting -> Connected`, with
    /// `Connected -> Reconnecting -> Connected|Disconnected` on transport
    /// loss, and any state `-> Error` on a terminal failure.
    pub fn apply(&self, event: &TransportEvent) -> ConnectionState {
        use ConnectionState::*;
        use TransportEvent::*;

        match (self, event) {
            (_, Teardown) => Disconnected,
            (_, Fatal(msg)) => Error(msg.clone()),
            (_, SubFail(msg)) => Error(format!("subscription failed: {}", msg)),

            (Disconnected | Error(_), Dial) => Connecting,
            // Dial while already live is a no-op
            (state, Dial) => state.clone(),

            // ConnAck alone is not "connected"; keep waiting for SubAck
            (Connecting | Reconnecting, ConnAck) => self.clone(),
            (Connecting | Reconnecting | Connected, SubAck) => Connected,

            (Connected | Connecting | Reconnecting, ConnectionLost(_)) => Reconnecting,
            (state, _) => state.clone(),
        }
    }
}
