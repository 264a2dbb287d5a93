//! Thin wrapper around the collaboration library's document state.
//!
//! The wire schema of document operations is treated as opaque and
//! upstream-library-defined (spec.md §1 Non-goals); this module's only job
//! is to satisfy the `state` contract from spec.md §3: seed from a snapshot,
//! apply an inbound change, and produce a new snapshot. We depend on `yrs`
//! (the Rust port of the Yjs CRDT) as that collaboration library, the same
//! way the retrieval pack's own realtime document servers do.

use crate::errors::EngineError;
use yrs::updates::decoder::Decode;
use yrs::{Doc, ReadTxn, StateVector, Transact, Update};

pub struct DocState {
    doc: Doc,
}

impl DocState {
    /// Construct a new document, optionally seeded from a prior snapshot.
    /// A malformed seed is treated as "no prior state" (spec.md §7
    /// NotFound/snapshot-read-failure semantics live one layer up; here we
    /// only need to not panic on garbage bytes).
    pub fn new(seed: Option<&[u8]>) -> Self {
        let doc = Doc::new();
        if let Some(bytes) = seed
            && let Ok(update) = Update::decode_v1(bytes)
        {
            let mut txn = doc.transact_mut();
            let _ = txn.apply_update(update);
        }
        Self { doc }
    }

    /// Encode the full current state as a single update, suitable for
    /// persistence and for seeding a fresh `DocState`.
    pub fn snapshot(&self) -> Vec<u8> {
        let txn = self.doc.transact();
        txn.encode_state_as_update_v1(&StateVector::default())
    }

    /// Apply an inbound change. A message that fails to decode or apply is a
    /// `ProtocolError` (spec.md §7): the caller closes the offending session,
    /// the Room and its document continue unaffected.
    pub fn apply_change(&self, msg: &[u8]) -> Result<(), EngineError> {
        let update =
            Update::decode_v1(msg).map_err(|e| EngineError::Protocol(e.to_string()))?;
        let mut txn = self.doc.transact_mut();
        txn.apply_update(update)
            .map_err(|e| EngineError::Protocol(e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_round_trips_on_quiescent_doc() {
        let doc = DocState::new(None);
        let snap1 = doc.snapshot();
        let reloaded = DocState::new(Some(&snap1));
        let snap2 = reloaded.snapshot();
        assert_eq!(snap1, snap2);
    }

    #[test]
    fn garbage_seed_yields_empty_doc_not_a_panic() {
        let doc = DocState::new(Some(b"not a valid yrs update"));
        // Should behave like a fresh empty doc rather than propagating an error.
        assert_eq!(doc.snapshot(), DocState::new(None).snapshot());
    }

    #[test]
    fn malformed_change_is_a_protocol_error() {
        let doc = DocState::new(None);
        let err = doc.apply_change(b"garbage").unwrap_err();
        assert!(matches!(err, EngineError::Protocol(_)));
    }
}
