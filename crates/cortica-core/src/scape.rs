use crate::CancelToken;
use crate::agent::NetworkAgent;
use cortica_error::CorticaResult;

/// Free-form per-evaluation payload produced by a scape and persisted as
/// diagnostic context.
pub type Trace = hashbrown::HashMap<String, f64>;

/// How an evaluation is being driven. Scapes may shorten or reshape their
/// episode for tuning probes versus full generational evaluations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EvalMode {
    #[default]
    Full,
    Tuning,
    Validation,
}

/// Context threaded into every scape evaluation: the cancellation token for
/// the enclosing run plus the evaluation mode.
#[derive(Clone)]
pub struct EvalContext {
    token: CancelToken,
    mode: EvalMode,
}

impl EvalContext {
    pub fn new(token: CancelToken, mode: EvalMode) -> Self {
        EvalContext { token, mode }
    }

    pub fn token(&self) -> &CancelToken {
        &self.token
    }

    pub fn mode(&self) -> EvalMode {
        self.mode
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

/// Result of one scape evaluation.
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub fitness: f32,
    pub trace: Trace,
    pub goal_reached: bool,
}

impl Evaluation {
    pub fn new(fitness: f32) -> Self {
        Evaluation {
            fitness,
            trace: Trace::default(),
            goal_reached: false,
        }
    }

    pub fn with_trace(mut self, key: impl Into<String>, value: f64) -> Self {
        self.trace.insert(key.into(), value);
        self
    }

    pub fn goal(mut self) -> Self {
        self.goal_reached = true;
        self
    }
}

/// An evaluation environment. The core only ever drives a scape through
/// this contract; scapes themselves are external collaborators.
pub trait Scape: Send + Sync + std::fmt::Debug {
    fn name(&self) -> &str;

    /// Run one episode against the agent and score it. A returned error
    /// fails the whole generation; there is no retry.
    fn evaluate(&self, ctx: &EvalContext, agent: &mut NetworkAgent) -> CorticaResult<Evaluation>;
}
