// Copyright (c) 2024 Mike Tsao. All rights reserved.

use crate::traits::Translates;
use serde::{Deserialize, Serialize};

/// What a [Delta](super::Delta) looks like in the history list: a
/// translatable text key, an optional string parameter, and an optional count
/// of changes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct DeltaDescription {
    text_key: String,
    string_parameter: String,
    num_changes: i64,
}
impl Default for DeltaDescription {
    fn default() -> Self {
        Self {
            text_key: Default::default(),
            string_parameter: Default::default(),
            num_changes: Self::DEFAULT_NUM_CHANGES,
        }
    }
}
impl DeltaDescription {
    /// Means "no count". Never display it as a number.
    pub const DEFAULT_NUM_CHANGES: i64 = -1;

    /// A description with only a text key.
    pub fn new(text_key: &str) -> Self {
        Self {
            text_key: text_key.to_string(),
            ..Default::default()
        }
    }

    /// A description that counts `num_changes` things.
    pub fn new_with_count(text_key: &str, num_changes: i64) -> Self {
        Self {
            text_key: text_key.to_string(),
            num_changes,
            ..Default::default()
        }
    }

    /// A description with a string parameter, such as a track name.
    pub fn new_with_parameter(text_key: &str, string_parameter: &str) -> Self {
        Self {
            text_key: text_key.to_string(),
            string_parameter: string_parameter.to_string(),
            ..Default::default()
        }
    }

    /// All three fields at once. This is what a deserializer uses.
    pub fn new_with(text_key: &str, num_changes: i64, string_parameter: &str) -> Self {
        Self {
            text_key: text_key.to_string(),
            string_parameter: string_parameter.to_string(),
            num_changes,
        }
    }

    #[allow(missing_docs)]
    pub fn text_key(&self) -> &str {
        &self.text_key
    }

    #[allow(missing_docs)]
    pub fn string_parameter(&self) -> &str {
        &self.string_parameter
    }

    /// The number of changes, or `None` if this description doesn't count
    /// anything.
    pub fn num_changes(&self) -> Option<i64> {
        (self.num_changes != Self::DEFAULT_NUM_CHANGES).then_some(self.num_changes)
    }

    /// The raw integer parameter, sentinel included. Only serializers should
    /// need this.
    pub fn raw_num_changes(&self) -> i64 {
        self.num_changes
    }

    /// Resolves the key and parameters into display text.
    pub fn full_text(&self, translator: &dyn Translates) -> String {
        if let Some(count) = self.num_changes() {
            return translator.translate_plural(&self.text_key, count);
        }
        let text = translator.translate(&self.text_key);
        if self.string_parameter.is_empty() {
            text
        } else {
            format!("{} {}", text, self.string_parameter)
        }
    }
}
