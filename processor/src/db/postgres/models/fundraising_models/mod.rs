// Copyright © Aptos Foundation
// SPDX-License-Identifier: Apache-2.0

pub mod chainhook_deliveries;
pub mod fundraising_events;
pub mod fundraising_views;
