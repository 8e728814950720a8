//! The sync decision engine.
//!
//! One pure function, [`decide`], chooses what to do with a single file given
//! what is known about the source and the destination. Every handler and
//! driver goes through it; they only differ in how they gather the two
//! [`Side`]s and which [`Policy`] they pass.
//!
//! Rules, in priority order:
//!
//! 1. Content that originates from the destination's system is skipped
//!    (circular sync guard), before any hash is compared.
//! 2. Content synced within the suppression window is skipped.
//! 3. Source gone, destination present: delete (if the policy allows it).
//! 4. Destination gone, source present: create.
//! 5. Both present: skip on equal hashes, otherwise update.
//! 6. Both gone: nothing to do.
//!
//! Rules 1 and 2 only apply while [`Policy::provenance_guard`] is set.

mod reconcile;

pub use self::reconcile::{Presence, Status, compare, reconcile};
use crate::provenance::Provenance;
use crate::record::Backend;
use derive_more::Display;
use time::{Duration, OffsetDateTime};

/// Default suppression window for recently synced content.
pub const SUPPRESSION_WINDOW: Duration = Duration::minutes(5);

#[derive(Debug, Display, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    #[display("skip")]
    Skip,
    #[display("create")]
    Create,
    #[display("update")]
    Update,
    #[display("delete")]
    Delete,
}

#[derive(Debug, Display, Clone, Copy, PartialEq, Eq)]
pub enum Reason {
    #[display("content originates from the destination")]
    OriginatesFromDestination,
    #[display("synced within the suppression window")]
    RecentlySynced,
    #[display("deleted at the source")]
    SourceDeleted,
    #[display("deletion propagation is disabled")]
    DeletionDisabled,
    #[display("missing at the destination")]
    DestinationMissing,
    #[display("content is unchanged")]
    Unchanged,
    #[display("content changed")]
    ContentChanged,
    #[display("missing on both sides")]
    NothingToSync,
}

/// What is known about one side of a sync.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Side {
    pub exists: bool,
    /// Fingerprint of the content; both sides must use the same algorithm.
    pub hash: Option<String>,
    pub provenance: Option<Provenance>,
}

impl Side {
    pub fn absent() -> Self {
        Self::default()
    }

    pub fn present(hash: impl Into<String>) -> Self {
        Self {
            exists: true,
            hash: Some(hash.into()),
            provenance: None,
        }
    }

    /// The file exists but its fingerprint could not be determined.
    pub fn unhashed() -> Self {
        Self {
            exists: true,
            hash: None,
            provenance: None,
        }
    }

    pub fn with_provenance(mut self, provenance: Option<Provenance>) -> Self {
        self.provenance = provenance;
        self
    }
}

/// How decisions are made for one destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Policy {
    pub destination: Backend,
    pub suppression_window: Duration,
    pub propagate_deletes: bool,
    /// Apply the provenance rules (origin and recency). Off only where
    /// writing to the destination can't echo back to the source.
    pub provenance_guard: bool,
}

impl Policy {
    pub fn new(destination: Backend) -> Self {
        Self {
            destination,
            suppression_window: SUPPRESSION_WINDOW,
            propagate_deletes: true,
            provenance_guard: true,
        }
    }

    pub fn with_suppression_window(mut self, window: Duration) -> Self {
        self.suppression_window = window;
        self
    }

    pub fn with_deletes(mut self, propagate: bool) -> Self {
        self.propagate_deletes = propagate;
        self
    }

    pub fn with_provenance_guard(mut self, enabled: bool) -> Self {
        self.provenance_guard = enabled;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    pub action: Action,
    pub reason: Reason,
}

impl Decision {
    fn new(action: Action, reason: Reason) -> Self {
        Self { action, reason }
    }

    fn skip(reason: Reason) -> Self {
        Self::new(Action::Skip, reason)
    }

    pub fn is_skip(&self) -> bool {
        self.action == Action::Skip
    }
}

/// Decide what to do with one file, given both sides and the time.
pub fn decide(source: &Side, destination: &Side, policy: &Policy, now: OffsetDateTime) -> Decision {
    if policy.provenance_guard
        && let Some(provenance) = &source.provenance
    {
        if provenance.originates_from(policy.destination.system()) {
            return Decision::skip(Reason::OriginatesFromDestination);
        }
        if provenance.synced_within(policy.suppression_window, now) {
            return Decision::skip(Reason::RecentlySynced);
        }
    }
    match (source.exists, destination.exists) {
        (false, true) if policy.propagate_deletes => Decision::new(Action::Delete, Reason::SourceDeleted),
        (false, true) => Decision::skip(Reason::DeletionDisabled),
        (true, false) => Decision::new(Action::Create, Reason::DestinationMissing),
        (true, true) => match (&source.hash, &destination.hash) {
            (Some(a), Some(b)) if a == b => Decision::skip(Reason::Unchanged),
            _ => Decision::new(Action::Update, Reason::ContentChanged),
        },
        (false, false) => Decision::skip(Reason::NothingToSync),
    }
}
