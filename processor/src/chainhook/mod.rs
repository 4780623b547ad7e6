// Copyright © Aptos Foundation
// SPDX-License-Identifier: Apache-2.0

pub mod canonical;
pub mod clarity_repr;
pub mod extractor;
pub mod metadata;

pub use canonical::compute_event_uid;
pub use extractor::{extract_fundraising_events, ExtractOptions, ExtractedFundraisingEvent};
pub use metadata::{extract_top_level_meta, TopLevelMeta};
