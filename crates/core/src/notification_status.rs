//! Notification ledger status and state machine.
//!
//! ```text
//! (enqueue) -> pending -> sending -> sent -> delivered -> read
//!                                  \        \___________/^
//!                                   -> error
//! (enqueue, test mode) -> test_prepared
//! ```
//!
//! `error`, `failed`, `read` and `test_prepared` are terminal. `delivered` may
//! still advance to `read`. Nothing ever moves backwards.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationStatus {
    Pending,
    Sending,
    Sent,
    Delivered,
    Read,
    Error,
    /// Legacy spelling of `error` still present in old rows.
    Failed,
    TestPrepared,
}

impl NotificationStatus {
    pub const ALL: [NotificationStatus; 8] = [
        NotificationStatus::Pending,
        NotificationStatus::Sending,
        NotificationStatus::Sent,
        NotificationStatus::Delivered,
        NotificationStatus::Read,
        NotificationStatus::Error,
        NotificationStatus::Failed,
        NotificationStatus::TestPrepared,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            NotificationStatus::Pending => "pending",
            NotificationStatus::Sending => "sending",
            NotificationStatus::Sent => "sent",
            NotificationStatus::Delivered => "delivered",
            NotificationStatus::Read => "read",
            NotificationStatus::Error => "error",
            NotificationStatus::Failed => "failed",
            NotificationStatus::TestPrepared => "test_prepared",
        }
    }

    /// Status a new ledger row starts in.
    pub fn initial(test_mode: bool) -> Self {
        if test_mode {
            NotificationStatus::TestPrepared
        } else {
            NotificationStatus::Pending
        }
    }

    /// Statuses reachable in one step from `self`.
    pub fn valid_transitions(self) -> &'static [NotificationStatus] {
        use NotificationStatus::*;
        match self {
            Pending => &[Sending],
            Sending => &[Sent, Error],
            Sent => &[Delivered, Read],
            Delivered => &[Read],
            Read | Error | Failed | TestPrepared => &[],
        }
    }

    pub fn can_transition(self, to: NotificationStatus) -> bool {
        self.valid_transitions().contains(&to)
    }

    pub fn is_terminal(self) -> bool {
        self.valid_transitions().is_empty()
    }

    /// Whether the row still belongs in the outbound queue projection.
    pub fn is_queued(self) -> bool {
        matches!(self, NotificationStatus::Pending | NotificationStatus::Sending)
    }

    /// Apply a ledger event, returning the new status or the rejected edge.
    pub fn apply(self, event: LedgerEvent) -> Result<NotificationStatus, InvalidTransition> {
        let to = event.target();
        if self.can_transition(to) {
            Ok(to)
        } else {
            Err(InvalidTransition { from: self, to })
        }
    }

    /// Reporting bucket for window statistics.
    pub fn bucket(self) -> StatsBucket {
        match self {
            NotificationStatus::Pending | NotificationStatus::Sent => StatsBucket::Sent,
            NotificationStatus::Sending => StatsBucket::Sending,
            NotificationStatus::Delivered => StatsBucket::Delivered,
            NotificationStatus::Read => StatsBucket::Read,
            NotificationStatus::Error | NotificationStatus::Failed => StatsBucket::Error,
            NotificationStatus::TestPrepared => StatsBucket::TestPrepared,
        }
    }
}

impl fmt::Display for NotificationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NotificationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NotificationStatus::ALL
            .into_iter()
            .find(|st| st.as_str() == s)
            .ok_or_else(|| format!("Unknown notification status '{s}'"))
    }
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// Something that happened to a ledger row after it was enqueued.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerEvent {
    DispatchStarted,
    ProviderAck,
    ProviderReject,
    DeliveryReceipt,
    ReadConfirmed,
}

impl LedgerEvent {
    pub const ALL: [LedgerEvent; 5] = [
        LedgerEvent::DispatchStarted,
        LedgerEvent::ProviderAck,
        LedgerEvent::ProviderReject,
        LedgerEvent::DeliveryReceipt,
        LedgerEvent::ReadConfirmed,
    ];

    pub fn target(self) -> NotificationStatus {
        match self {
            LedgerEvent::DispatchStarted => NotificationStatus::Sending,
            LedgerEvent::ProviderAck => NotificationStatus::Sent,
            LedgerEvent::ProviderReject => NotificationStatus::Error,
            LedgerEvent::DeliveryReceipt => NotificationStatus::Delivered,
            LedgerEvent::ReadConfirmed => NotificationStatus::Read,
        }
    }

    /// Statuses from which this event is legal.
    pub fn sources(self) -> Vec<NotificationStatus> {
        let to = self.target();
        NotificationStatus::ALL
            .into_iter()
            .filter(|from| from.can_transition(to))
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("Invalid transition: {from} -> {to}")]
pub struct InvalidTransition {
    pub from: NotificationStatus,
    pub to: NotificationStatus,
}

// ---------------------------------------------------------------------------
// Statistics
// ---------------------------------------------------------------------------

/// Reporting buckets. Every status lands in exactly one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatsBucket {
    Sent,
    Sending,
    Delivered,
    Read,
    Error,
    TestPrepared,
}

impl StatsBucket {
    pub const ALL: [StatsBucket; 6] = [
        StatsBucket::Sent,
        StatsBucket::Sending,
        StatsBucket::Delivered,
        StatsBucket::Read,
        StatsBucket::Error,
        StatsBucket::TestPrepared,
    ];
}

/// Aggregated counts over a time window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LedgerStats {
    pub total_prepared: i64,
    pub sent: i64,
    pub sending: i64,
    pub delivered: i64,
    pub read: i64,
    pub error: i64,
    pub test_prepared: i64,
}

impl LedgerStats {
    /// Fold `(status, count)` pairs into bucket totals.
    ///
    /// Unknown status strings still count toward `total_prepared` but land in
    /// `error`, so the buckets always sum to the total.
    pub fn from_counts<'a>(counts: impl IntoIterator<Item = (&'a str, i64)>) -> Self {
        let mut stats = LedgerStats::default();
        for (status, count) in counts {
            let bucket = status
                .parse::<NotificationStatus>()
                .map(NotificationStatus::bucket)
                .unwrap_or(StatsBucket::Error);
            stats.add(bucket, count);
        }
        stats
    }

    pub fn add(&mut self, bucket: StatsBucket, count: i64) {
        self.total_prepared += count;
        match bucket {
            StatsBucket::Sent => self.sent += count,
            StatsBucket::Sending => self.sending += count,
            StatsBucket::Delivered => self.delivered += count,
            StatsBucket::Read => self.read += count,
            StatsBucket::Error => self.error += count,
            StatsBucket::TestPrepared => self.test_prepared += count,
        }
    }

    pub fn bucket_sum(&self) -> i64 {
        self.sent + self.sending + self.delivered + self.read + self.error + self.test_prepared
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
