// Copyright (c) 2024 Mike Tsao. All rights reserved.

//! Useful things that don't have anything to do with version control.

/// The most commonly used imports.
pub mod prelude {
    pub use super::{ChannelPair, ResourceSyncSettings};
}

pub use channel_pair::ChannelPair;
pub use settings::ResourceSyncSettings;

mod channel_pair;
mod settings;
