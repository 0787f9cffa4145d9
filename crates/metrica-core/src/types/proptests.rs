//! Property-based tests for core types and KPI derivation.
