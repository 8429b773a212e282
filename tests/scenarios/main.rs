//! Scenario tests: whole runs against scripted providers and mock tools

mod helpers;

mod cancellation;
mod concurrent_runs;
mod conditional_skip;
mod tool_gaps;
mod validation_rejection;
