// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
pub mod service;
pub mod sweeper;

pub use service::DispatchService;
pub use sweeper::spawn_offer_sweeper;
