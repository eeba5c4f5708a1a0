// Copyright (c) 2024 Mike Tsao. All rights reserved.

/// The build's version for display, most specific first: `git describe`, then
/// the commit hash, then the crate version. The build environment supplies the
/// git values when it has them.
pub fn app_version() -> &'static str {
    option_env!("GIT_DESCRIBE")
        .or(option_env!("GIT_REV_PARSE"))
        .unwrap_or(env!("CARGO_PKG_VERSION"))
}
