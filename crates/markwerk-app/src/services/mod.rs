// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Service layer: resolves where configuration and results live and opens
// them for the commands.

pub mod app_services;
pub mod data_dir;
