//! Cortica is a neuro-evolution library: populations of neural genomes are
//! evaluated against pluggable scapes and improved through selection,
//! weighted mutation, speciation and in-place exoself tuning.
//!
//! The crates compose bottom-up: `cortica-core` holds the genome model,
//! runtime agent, evaluator pool and speciator; `cortica-mutators` the
//! weighted operator catalogue; `cortica-selectors` the parent-selection
//! strategies; `cortica-tuner` the exoself hill-climber; and
//! `cortica-engines` the generation monitor that orchestrates a run. This
//! facade re-exports the whole public surface.
//!
//! # Example
//!
//! ```rust,ignore
//! use cortica::*;
//! use std::sync::Arc;
//!
//! let polis = Polis::new();
//! polis.register_scape(Arc::new(MyScape));
//!
//! let handle = polis.launch(
//!     MonitorBuilder::new()
//!         .scape(polis.scape("my_scape")?)
//!         .seed(2, 1, 64)
//!         .generations(100)
//!         .fitness_goal(3.9)
//!         .workers(4)
//!         .selector_name("shared_tournament")
//!         .tuner(TunerSettings::default()),
//! )?;
//!
//! let result = handle.join()?;
//! println!("best: {:?}", result.final_best_fitness());
//! ```

pub use cortica_engines::*;

pub mod prelude {
    pub use cortica_core::prelude::*;
    pub use cortica_engines::{
        Monitor, MonitorBuilder, MonitorCommand, MonitorState, Polis, RunHandle, RunResult,
        TerminationReason, init_logging,
    };
    pub use cortica_mutators::{MutationEngine, OperatorCatalogue};
    pub use cortica_selectors::parse_selector;
    pub use cortica_tuner::{AttemptPolicy, Exoself, TuneReport, TunerSettings};
}
