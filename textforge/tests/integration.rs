// /////////////////////////////////////////////////////////////////////////////
// Textforge
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Integration Tests
//!
//! End-to-end workflows across the engines and their real infrastructure:
//! bulk edits with snapshot-backed rollback, streaming with checkpoint
//! resume, and the supporting services working together.

mod integration {
    pub mod common;

    mod bulk_edit_test;
    mod rollback_store_test;
    mod streaming_test;
    mod workflows_test;
}
