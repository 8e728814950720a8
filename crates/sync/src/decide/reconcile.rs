use crate::record::Backend;
use derive_more::Display;

/// Whether a backend holds a copy of a file, and its SHA-256 if so.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Presence {
    Absent,
    Present(String),
}

impl Presence {
    pub fn from_hash(hash: Option<String>) -> Self {
        match hash {
            Some(hash) => Self::Present(hash),
            None => Self::Absent,
        }
    }

    pub fn hash(&self) -> Option<&str> {
        match self {
            Self::Absent => None,
            Self::Present(hash) => Some(hash),
        }
    }
}

/// How the copies of one file relate to each other.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    #[display("in sync")]
    InSync,
    /// Majority agreement: `stale` should be brought in line with `authority`
    /// (either of the agreeing pair).
    #[display("{stale} out of sync with {authority}")]
    OutOfSync { stale: Backend, authority: Backend },
    /// Only `only` has the file; it has not been propagated anywhere.
    #[display("only in {only}")]
    Unpropagated { only: Backend },
    /// Two copies differ and nothing breaks the tie.
    #[display("{_0} and {_1} differ")]
    Diverged(Backend, Backend),
    /// Every copy differs. Never resolved automatically.
    #[display("conflict")]
    Conflict,
}

impl Status {
    pub fn needs_attention(&self) -> bool {
        *self != Self::InSync
    }
}

/// Three-way reconciliation by majority agreement.
pub fn reconcile(local: &Presence, object_store: &Presence, vcs: &Presence) -> Status {
    if local == object_store && object_store == vcs {
        return Status::InSync;
    }
    // (odd one out, first of the pair, second of the pair)
    let candidates = [
        (Backend::Vcs, (Backend::Local, local), object_store),
        (Backend::ObjectStore, (Backend::Local, local), vcs),
        (Backend::Local, (Backend::ObjectStore, object_store), vcs),
    ];
    for (stale, (authority, first), second) in candidates {
        if first == second {
            return match first {
                Presence::Absent => Status::Unpropagated { only: stale },
                Presence::Present(_) => Status::OutOfSync { stale, authority },
            };
        }
    }
    Status::Conflict
}

/// Two-way comparison of the local tree and the object store.
pub fn compare(local: &Presence, object_store: &Presence) -> Status {
    match (local, object_store) {
        (a, b) if a == b => Status::InSync,
        (Presence::Present(_), Presence::Absent) => Status::Unpropagated { only: Backend::Local },
        (Presence::Absent, Presence::Present(_)) => Status::Unpropagated {
            only: Backend::ObjectStore,
        },
        _ => Status::Diverged(Backend::Local, Backend::ObjectStore),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn present(hash: &str) -> Presence {
        Presence::Present(hash.to_string())
    }

    #[rstest]
    #[case(present("a"), present("a"), present("a"), Status::InSync)]
    #[case(Presence::Absent, Presence::Absent, Presence::Absent, Status::InSync)]
    #[case(present("a"), present("a"), present("b"), Status::OutOfSync { stale: Backend::Vcs, authority: Backend::Local })]
    #[case(present("b"), present("a"), present("a"), Status::OutOfSync { stale: Backend::Local, authority: Backend::ObjectStore })]
    #[case(present("a"), present("b"), present("a"), Status::OutOfSync { stale: Backend::ObjectStore, authority: Backend::Local })]
    #[case(present("a"), present("a"), Presence::Absent, Status::OutOfSync { stale: Backend::Vcs, authority: Backend::Local })]
    #[case(Presence::Absent, present("a"), Presence::Absent, Status::Unpropagated { only: Backend::ObjectStore })]
    #[case(present("a"), present("b"), present("c"), Status::Conflict)]
    #[case(present("a"), present("b"), Presence::Absent, Status::Conflict)]
    fn test_reconcile(
        #[case] local: Presence,
        #[case] object_store: Presence,
        #[case] vcs: Presence,
        #[case] expected: Status,
    ) {
        assert_eq!(reconcile(&local, &object_store, &vcs), expected);
    }

    #[rstest]
    #[case(present("a"), present("a"), Status::InSync)]
    #[case(present("a"), Presence::Absent, Status::Unpropagated { only: Backend::Local })]
    #[case(Presence::Absent, present("a"), Status::Unpropagated { only: Backend::ObjectStore })]
    #[case(present("a"), present("b"), Status::Diverged(Backend::Local, Backend::ObjectStore))]
    fn test_compare(#[case] local: Presence, #[case] object_store: Presence, #[case] expected: Status) {
        assert_eq!(compare(&local, &object_store), expected);
    }

    #[test]
    fn test_conflict_needs_attention() {
        assert!(reconcile(&present("a"), &present("b"), &present("c")).needs_attention());
        assert!(!reconcile(&present("a"), &present("a"), &present("a")).needs_attention());
    }
}
