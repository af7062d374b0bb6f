//! Loading gate: a full-viewport overlay held up during the first scan of an
//! epoch until a quorum of classifications has resolved.

use crate::page::FeedPage;

use super::scanner::ScanMode;

pub const GATE_MESSAGES: [&str; 2] = ["Blocking the junk...", "Preparing the page..."];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatePhase {
    Idle,
    Gating,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GateState {
    pub active: bool,
    pub quorum_target: usize,
    pub quorum_reached: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateTransition {
    /// Not gating; the resolution does not count.
    Ignored,
    Progress { reached: usize, target: usize },
    Released,
}

#[derive(Debug)]
pub struct Gate {
    phase: GatePhase,
    quorum_target: usize,
    quorum_reached: usize,
    message_index: usize,
    released: bool,
}

impl Gate {
    pub fn new(quorum_target: usize) -> Self {
        Self {
            phase: GatePhase::Idle,
            quorum_target,
            quorum_reached: 0,
            message_index: 0,
            released: false,
        }
    }

    pub fn phase(&self) -> GatePhase {
        self.phase
    }

    pub fn is_gating(&self) -> bool {
        self.phase == GatePhase::Gating
    }

    pub fn state(&self) -> GateState {
        GateState {
            active: self.is_gating(),
            quorum_target: self.quorum_target,
            quorum_reached: self.quorum_reached,
        }
    }

    pub fn scan_mode(&self) -> ScanMode {
        if self.is_gating() {
            ScanMode::Gated {
                limit: self.quorum_target,
            }
        } else {
            ScanMode::Full
        }
    }

    /// Enters `Gating`. Refused once the gate has released in this epoch, or when
    /// the quorum is zero.
    pub fn open(&mut self, page: &dyn FeedPage) -> bool {
        if self.released || self.is_gating() || self.quorum_target == 0 {
            return false;
        }
        self.phase = GatePhase::Gating;
        self.quorum_reached = 0;
        self.message_index = 0;

        page.set_scroll_locked(true);
        if !page.show_overlay(GATE_MESSAGES[0]) {
            page.set_overlay_message(GATE_MESSAGES[0]);
        }
        tracing::info!(target: "gate", quorum = self.quorum_target, "loading gate opened");
        true
    }

    pub fn record_resolution(&mut self, page: &dyn FeedPage) -> GateTransition {
        if !self.is_gating() {
            return GateTransition::Ignored;
        }
        self.quorum_reached += 1;
        tracing::debug!(
            target: "gate",
            reached = self.quorum_reached,
            target = self.quorum_target,
            "quorum progress"
        );

        if self.quorum_reached >= self.quorum_target {
            self.released = true;
            self.teardown(page);
            tracing::info!(target: "gate", quorum = self.quorum_target, "quorum reached; gate released");
            GateTransition::Released
        } else {
            GateTransition::Progress {
                reached: self.quorum_reached,
                target: self.quorum_target,
            }
        }
    }

    /// Alternates the overlay message. Presentational only.
    pub fn rotate_message(&mut self, page: &dyn FeedPage) {
        if !self.is_gating() {
            return;
        }
        self.message_index = 1 - self.message_index;
        page.set_overlay_message(GATE_MESSAGES[self.message_index]);
    }

    /// Removes the overlay and always restores scrolling.
    pub fn teardown(&mut self, page: &dyn FeedPage) {
        self.phase = GatePhase::Idle;
        if page.remove_overlay() {
            tracing::debug!(target: "gate", "overlay removed");
        }
        page.set_scroll_locked(false);
    }
}
