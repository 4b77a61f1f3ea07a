use std::time::Duration;
use tokio::time::Instant;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum NoticeKind {
    Info,
    Win,
    Loss,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Notice {
    pub kind: NoticeKind,
    pub text: String,
    expires_at: Instant,
}

impl Notice {
    pub fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// Transient messages that dismiss themselves after their lifetime.
#[derive(Clone, Debug, Default)]
pub struct Notices {
    items: Vec<Notice>,
}

impl Notices {
    pub fn push(
        &mut self,
        kind: NoticeKind,
        text: impl Into<String>,
        lifetime: Duration,
        now: Instant,
    ) {
        self.items.push(Notice {
            kind,
            text: text.into(),
            expires_at: now + lifetime,
        });
    }

    pub fn dismiss_all(&mut self) {
        self.items.clear();
    }

    /// Drops expired notices, returning true if anything was removed.
    pub fn prune(&mut self, now: Instant) -> bool {
        let before = self.items.len();
        self.items.retain(|n| !n.is_expired(now));
        self.items.len() != before
    }

    pub fn active(&self) -> &[Notice] {
        &self.items
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
