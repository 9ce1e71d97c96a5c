pub mod attempts;
pub mod exoself;
pub mod report;
pub mod selection;

pub use attempts::AttemptPolicy;
pub use exoself::{Exoself, TunableAgent, TuneOutcome, TunerSettings, tune};
pub use report::TuneReport;
pub use selection::normalise_selection;
