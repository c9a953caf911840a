// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//
//! Command implementations

pub mod attribution;
pub mod completions;
pub mod config;
pub mod consumers;
pub mod create;
pub mod estimate;
pub mod fields;
pub mod plan;
pub mod span;
pub mod status;
pub mod subtasks;
