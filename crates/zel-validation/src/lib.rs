//! Validation-style layers: argument checks that can veto a call, a
//! lock-free create/destroy balance counter and a call tracer.

pub mod api_trace;
pub mod basic_leak;
pub mod param;

pub use api_trace::ApiTracingLayer;
pub use basic_leak::{BalanceRow, BasicLeakChecker};
pub use param::ParameterValidationLayer;
