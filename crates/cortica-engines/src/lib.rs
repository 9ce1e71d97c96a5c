pub mod builder;
mod command;
pub mod monitor;
mod polis;
mod registry;
mod result;

pub use builder::{MonitorBuilder, MonitorParams};
pub use command::{Controller, MonitorCommand};
pub use monitor::Monitor;
pub use polis::{Polis, RunHandle};
pub use registry::RunRegistry;
pub use result::{MonitorState, RunResult, TerminationReason};

pub use cortica_core::*;
pub use cortica_error::{CorticaError, cortica_bail, cortica_err, ensure};
pub use cortica_mutators::*;
pub use cortica_selectors::*;
pub use cortica_tuner::*;

pub fn init_logging() {
    pub use std::sync::Once;
    static INIT_LOGGING: Once = Once::new();

    INIT_LOGGING.call_once(|| {
        use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

        tracing_subscriber::registry()
            .with(tracing_subscriber::EnvFilter::from_default_env())
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_level(true)
                    .compact(),
            )
            .init();
    });
}
