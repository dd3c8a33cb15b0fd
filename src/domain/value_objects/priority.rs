use serde::{Deserialize, Serialize};

/// Delivery priority of an alert record.
///
/// `High` alerts bypass batching and hold windows in the notification
/// dispatcher; `Normal` alerts may be batched or dropped while held.
#[derive(
    Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash,
)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    #[default]
    Normal,
    High,
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Normal => write!(f, "NORMAL"),
            Self::High => write!(f, "HIGH"),
        }
    }
}

impl Priority {
    #[must_use]
    pub const fn is_high(self) -> bool {
        matches!(self, Self::High)
    }

    #[must_use]
    pub const fn color_hex(self) -> &'static str {
        match self {
            Self::Normal => "#3498DB",
            Self::High => "#E74C3C",
        }
    }

    #[must_use]
    pub const fn color_decimal(self) -> u32 {
        match self {
            Self::Normal => 0x00_34_98_DB,
            Self::High => 0x00_E7_4C_3C,
        }
    }
}
