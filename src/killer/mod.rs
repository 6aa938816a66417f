// Victim selection and signalling

mod emergency;
mod selector;
pub mod signals;

pub use emergency::emergency_kill;
pub use selector::{ProcCandidate, SelectionOutcome, SelectionStats, VictimSelector};
pub use signals::{kill_with_escalation, EscalationOutcome, KillResult};
