pub mod gate;
pub mod ledger;
pub mod navigation;
pub mod scanner;
pub mod suppression;

pub use gate::{Gate, GatePhase, GateState, GateTransition};
pub use ledger::DedupLedger;
pub use navigation::NavigationWatcher;
pub use scanner::{FeedScanner, ScanMode};
pub use suppression::Suppressor;
