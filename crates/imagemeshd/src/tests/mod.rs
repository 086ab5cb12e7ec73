//! Test suites for the coordinator and worker runtime.

mod support;
