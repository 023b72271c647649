//! Search chips and the chip set a filter bar holds.
//!
//! Chip sets round-trip through URL query parameters as repeated
//! `f=<field>:<value>` pairs so the active filters survive a reload.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::classify::{LifecycleStage, Severity};
use crate::derived::Lifecycle;
use crate::error::FilterError;
use crate::phase::PodPhase;
use crate::types::EventType;

/// Query parameter key carrying chips.
pub const CHIP_QUERY_KEY: &str = "f";

/// Granularity a field filters at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChipScope {
    /// Keeps or drops a whole task group
    Task,
    /// Narrows the events shown inside a group
    Event,
    /// Satisfied by the task name, otherwise narrows events
    Both,
}

/// Field a chip filters on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChipField {
    Task,
    Retry,
    Lifecycle,
    Phase,
    Reason,
    Type,
    Stage,
    Severity,
    Host,
    Message,
    Search,
}

impl ChipField {
    pub const ALL: [Self; 11] = [
        Self::Task,
        Self::Retry,
        Self::Lifecycle,
        Self::Phase,
        Self::Reason,
        Self::Type,
        Self::Stage,
        Self::Severity,
        Self::Host,
        Self::Message,
        Self::Search,
    ];

    #[must_use]
    pub const fn id(&self) -> &'static str {
        match self {
            Self::Task => "task",
            Self::Retry => "retry",
            Self::Lifecycle => "lifecycle",
            Self::Phase => "phase",
            Self::Reason => "reason",
            Self::Type => "type",
            Self::Stage => "stage",
            Self::Severity => "severity",
            Self::Host => "host",
            Self::Message => "message",
            Self::Search => "search",
        }
    }

    #[must_use]
    pub const fn display_name(&self) -> &'static str {
        match self {
            Self::Task => "Task",
            Self::Retry => "Retry",
            Self::Lifecycle => "Lifecycle",
            Self::Phase => "Phase",
            Self::Reason => "Reason",
            Self::Type => "Type",
            Self::Stage => "Stage",
            Self::Severity => "Severity",
            Self::Host => "Host",
            Self::Message => "Message",
            Self::Search => "Search",
        }
    }

    /// Closed set of values for enum-like fields, for filter-bar completion.
    /// Free-text fields return an empty list.
    #[must_use]
    pub fn suggestions(&self) -> Vec<&'static str> {
        match self {
            Self::Lifecycle => Lifecycle::ALL.iter().map(Lifecycle::as_str).collect(),
            Self::Phase => PodPhase::ALL.iter().map(PodPhase::as_str).collect(),
            Self::Stage => LifecycleStage::ALL.iter().map(LifecycleStage::as_str).collect(),
            Self::Severity => [Severity::Info, Severity::Warn, Severity::Error]
                .iter()
                .map(Severity::as_str)
                .collect(),
            Self::Type => [EventType::Normal, EventType::Warning]
                .iter()
                .map(EventType::as_str)
                .collect(),
            _ => Vec::new(),
        }
    }

    #[must_use]
    pub const fn scope(&self) -> ChipScope {
        match self {
            Self::Task | Self::Retry | Self::Lifecycle | Self::Phase => ChipScope::Task,
            Self::Reason
            | Self::Type
            | Self::Stage
            | Self::Severity
            | Self::Host
            | Self::Message => ChipScope::Event,
            Self::Search => ChipScope::Both,
        }
    }
}

impl fmt::Display for ChipField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for ChipField {
    type Err = FilterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|field| field.id().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| FilterError::UnknownField(s.to_string()))
    }
}

/// Visual style of a chip in the filter bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChipVariant {
    Neutral,
    Success,
    Warning,
    Danger,
}

/// One filter predicate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchChip {
    pub field: ChipField,
    pub value: String,
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variant: Option<ChipVariant>,
}

impl SearchChip {
    #[must_use]
    pub fn new(field: ChipField, value: impl Into<String>) -> Self {
        let value = value.into().trim().to_string();
        let label = format!("{}: {}", field.display_name(), value);
        Self {
            field,
            value,
            label,
            variant: None,
        }
    }

    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    #[must_use]
    pub fn with_variant(mut self, variant: ChipVariant) -> Self {
        self.variant = Some(variant);
        self
    }

    fn same_predicate(&self, other: &Self) -> bool {
        self.field == other.field && self.value.eq_ignore_ascii_case(&other.value)
    }
}

impl FromStr for SearchChip {
    type Err = FilterError;

    /// Parse `field:value`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (field, value) = s
            .split_once(':')
            .ok_or_else(|| FilterError::Malformed(s.to_string()))?;
        if value.trim().is_empty() {
            return Err(FilterError::Malformed(s.to_string()));
        }
        Ok(Self::new(field.parse()?, value))
    }
}

impl fmt::Display for SearchChip {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.field, self.value)
    }
}

/// Ordered set of chips with no two sharing a (field, value) pair.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChipSet {
    chips: Vec<SearchChip>,
}

impl ChipSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a set, rejecting duplicate (field, value) pairs.
    pub fn from_chips(chips: impl IntoIterator<Item = SearchChip>) -> Result<Self, FilterError> {
        let mut set = Self::new();
        for chip in chips {
            set.add(chip)?;
        }
        Ok(set)
    }

    pub fn add(&mut self, chip: SearchChip) -> Result<(), FilterError> {
        if self.chips.iter().any(|existing| existing.same_predicate(&chip)) {
            return Err(FilterError::DuplicateChip {
                field: chip.field.id().to_string(),
                value: chip.value,
            });
        }
        self.chips.push(chip);
        Ok(())
    }

    /// Remove a chip by predicate; returns whether one was removed.
    pub fn remove(&mut self, field: ChipField, value: &str) -> bool {
        let before = self.chips.len();
        self.chips
            .retain(|chip| !(chip.field == field && chip.value.eq_ignore_ascii_case(value)));
        self.chips.len() != before
    }

    pub fn clear(&mut self) {
        self.chips.clear();
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.chips.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.chips.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SearchChip> {
        self.chips.iter()
    }

    #[must_use]
    pub fn as_slice(&self) -> &[SearchChip] {
        &self.chips
    }

    /// Parse a URL query string such as `?f=reason%3AFailed&page=2`.
    ///
    /// Pairs with other keys are ignored.
    pub fn from_query(query: &str) -> Result<Self, FilterError> {
        let mut set = Self::new();
        for pair in query.trim_start_matches('?').split('&') {
            let Some((key, raw)) = pair.split_once('=') else {
                continue;
            };
            if key != CHIP_QUERY_KEY {
                continue;
            }
            let decoded = urlencoding::decode(&raw.replace('+', " "))
                .map_err(|_| FilterError::Malformed(raw.to_string()))?
                .into_owned();
            set.add(decoded.parse()?)?;
        }
        Ok(set)
    }

    /// Serialize as query pairs, without a leading `?`.
    #[must_use]
    pub fn to_query(&self) -> String {
        self.chips
            .iter()
            .map(|chip| format!("{CHIP_QUERY_KEY}={}", urlencoding::encode(&chip.to_string())))
            .collect::<Vec<_>>()
            .join("&")
    }
}

impl<'a> IntoIterator for &'a ChipSet {
    type Item = &'a SearchChip;
    type IntoIter = std::slice::Iter<'a, SearchChip>;

    fn into_iter(self) -> Self::IntoIter {
        self.chips.iter()
    }
}
