use std::collections::HashSet;

/// Identities already submitted for classification in the current epoch.
#[derive(Debug, Default)]
pub struct DedupLedger {
    seen: HashSet<String>,
}

impl DedupLedger {
    pub fn has_seen(&self, identity: &str) -> bool {
        self.seen.contains(identity)
    }

    pub fn mark_seen(&mut self, identity: &str) {
        self.seen.insert(identity.to_string());
    }

    /// Marks `identity` and reports whether it was new.
    pub fn claim(&mut self, identity: &str) -> bool {
        if self.has_seen(identity) {
            return false;
        }
        self.mark_seen(identity);
        true
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}
