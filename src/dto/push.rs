use serde::Serialize;

#[derive(Clone, Debug)]
/// Dispatched payload carried to every connected client.
///
/// The same value is delivered over both transports: SSE subscribers use
/// `event` as the SSE event name, WebSocket sessions wrap it into a typed
/// JSON frame.
pub struct ServerEvent {
    pub event: String,
    pub data: String,
}

impl ServerEvent {
    /// Convenience wrapper that serialises `payload` into the data field.
    pub fn json<T>(event: &str, payload: &T) -> serde_json::Result<Self>
    where
        T: Serialize,
    {
        Ok(Self {
            event: event.to_owned(),
            data: serde_json::to_string(payload)?,
        })
    }
}
