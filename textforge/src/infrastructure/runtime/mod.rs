// /////////////////////////////////////////////////////////////////////////////
// Textforge
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Runtime concerns: the process-wide resource governor that bounds
//! parallel dispatch across every engine.

pub mod resource_governor;

pub use resource_governor::{GovernorConfig, ResourceGovernor};
