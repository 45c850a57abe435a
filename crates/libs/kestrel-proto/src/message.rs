use core::fmt;

/// Maximum number of payload bytes rendered by the `Debug` impl.
const PAYLOAD_PREVIEW_LEN: usize = 16;

/// The pair that matches a reply to the request that is waiting for it.
///
/// The code is the protocol-defined message type; the id is unique per
/// in-flight request within a session and may repeat across sessions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct CorrelationKey {
    pub code: u16,
    pub id: u32,
}

impl CorrelationKey {
    pub fn new(code: u16, id: u32) -> Self {
        Self { code, id }
    }
}

impl fmt::Display for CorrelationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.code, self.id)
    }
}

/// A decoded protocol message: a correlation key and an opaque payload.
///
/// The payload is carried as-is and never inspected; decoding and
/// interpretation belong to the session layer.
#[derive(Clone)]
pub struct Message {
    code: u16,
    id: u32,
    payload: Vec<u8>,
}

impl Message {
    pub fn new(code: u16, id: u32, payload: Vec<u8>) -> Self {
        Self { code, id, payload }
    }

    pub fn code(&self) -> u16 {
        self.code
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn key(&self) -> CorrelationKey {
        CorrelationKey::new(self.code, self.id)
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn into_payload(self) -> Vec<u8> {
        self.payload
    }

    /// Matching equality: key only, payload content does not participate.
    pub fn matches(&self, key: &CorrelationKey) -> bool {
        self.key() == *key
    }
}

impl fmt::Debug for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let preview_len = self.payload.len().min(PAYLOAD_PREVIEW_LEN);
        write!(
            f,
            "Message({}, {} bytes: {}{})",
            self.key(),
            self.payload.len(),
            hex::encode(&self.payload[..preview_len]),
            if self.payload.len() > preview_len { ".." } else { "" }
        )
    }
}
