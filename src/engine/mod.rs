//! Execution engine for officebatch scripts

pub mod condition;
pub mod dispatcher;
pub mod executor;

pub use condition::ConditionEvaluator;
pub use dispatcher::{CommandDispatcher, DispatchOutcome, ProcessDispatcher};
pub use executor::{ExecutionContext, ExecutionReport, Executor, Flow, LineResult, LOOP_INDEX_VAR};
