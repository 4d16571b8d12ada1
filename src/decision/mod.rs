// =============================================================================
// Decision Layer
// =============================================================================
//
// Stateless functions invoked once per symbol or position per cycle.  Nothing
// here touches the network; the orchestrators feed in fetched snapshots.

pub mod entry;
pub mod exit;
pub mod funding;
pub mod margin;

pub use entry::EntryRule;
pub use exit::{evaluate_exit, profit_target};
pub use funding::{funding_label, is_funding_favorable};
pub use margin::{propose_top_up, size_order, size_top_up, top_up_due};
