//! End-to-end scenario coverage for the audit engine lives under `tests/`;
//! this crate has no public API of its own.
