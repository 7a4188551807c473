use serde::{Deserialize, Serialize};

/// Byte accounting for one transfer. Only ever moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadProgress {
    bytes_sent: u64,
    bytes_total: u64,
    percentage: u8,
}

/// `round(sent / total * 100)`, halves rounded up, computed without floats.
fn percentage_of(bytes_sent: u64, bytes_total: u64) -> u8 {
    let total = u128::from(bytes_total.max(1));
    let sent = u128::from(bytes_sent.min(bytes_total));
    let rounded = (sent * 200 + total) / (2 * total);
    u8::try_from(rounded.min(100)).unwrap_or(100)
}

impl UploadProgress {
    pub const fn start(bytes_total: u64) -> Self {
        Self {
            bytes_sent: 0,
            bytes_total,
            percentage: 0,
        }
    }

    pub const fn bytes_sent(&self) -> u64 {
        self.bytes_sent
    }

    pub const fn bytes_total(&self) -> u64 {
        self.bytes_total
    }

    pub const fn percentage(&self) -> u8 {
        self.percentage
    }

    pub const fn is_complete(&self) -> bool {
        self.bytes_sent == self.bytes_total
    }

    /// Progress after `bytes_sent` cumulative bytes, or `None` if that is not ahead of
    /// the current count. Values past the total are clamped to it.
    pub fn advance(&self, bytes_sent: u64) -> Option<Self> {
        let bytes_sent = bytes_sent.min(self.bytes_total);
        (bytes_sent > self.bytes_sent).then(|| Self {
            bytes_sent,
            bytes_total: self.bytes_total,
            percentage: percentage_of(bytes_sent, self.bytes_total),
        })
    }
}
