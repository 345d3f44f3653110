//! Integration tests for verdiplan-api
//!
//! Uses wiremock to simulate the Verdiplan backend and verifies end-to-end
//! behavior of the ApiClient: task mutations, photo uploads, listing and
//! reachability probes.

mod common;

mod test_tasks;
mod test_upload;
