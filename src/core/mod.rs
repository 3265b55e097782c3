// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025-2026 JR Morton

//! Runtime core: shared state, the listener loop, and the per-session driver.

pub mod alerts;
pub mod app_state;
pub mod orchestrator;
pub mod session;
