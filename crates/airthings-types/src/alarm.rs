//! Threshold-based alarm classification of sensor readings.
//!
//! Each sensor kind has an ordered list of [`AlarmRuleSet`]s. A ruleset
//! matches when every one of its conditions holds; the first matching
//! ruleset decides the severity. A reading that no ruleset matches is
//! classified [`Severity::Unknown`].

use core::fmt;
use std::collections::BTreeMap;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::measurement::{MeasurementSet, SensorKind, SensorValue};

/// Alarm severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Severity {
    High,
    Medium,
    Low,
    Caution,
    None,
    /// No ruleset matched the reading.
    Unknown,
}

impl Severity {
    /// Human-readable label.
    pub fn label(&self) -> &'static str {
        match self {
            Severity::High => "High",
            Severity::Medium => "Medium",
            Severity::Low => "Low",
            Severity::Caution => "Caution",
            Severity::None => "Normal",
            Severity::Unknown => "Unknown",
        }
    }

    /// Display color associated with the severity.
    pub fn color(&self) -> &'static str {
        match self {
            Severity::High => "red",
            Severity::Medium => "yellow",
            Severity::Low => "blue",
            Severity::Caution => "orange",
            Severity::None => "green",
            Severity::Unknown => "gray",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Comparison applied between a reading and a threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Comparator {
    #[cfg_attr(feature = "serde", serde(rename = "=="))]
    Eq,
    #[cfg_attr(feature = "serde", serde(rename = "!="))]
    Ne,
    #[cfg_attr(feature = "serde", serde(rename = ">"))]
    Gt,
    #[cfg_attr(feature = "serde", serde(rename = "<"))]
    Lt,
    #[cfg_attr(feature = "serde", serde(rename = ">="))]
    Ge,
    #[cfg_attr(feature = "serde", serde(rename = "<="))]
    Le,
}

impl Comparator {
    /// Evaluate `value <op> threshold`. Any comparison with NaN is false
    /// except `!=`.
    pub fn holds(self, value: f64, threshold: f64) -> bool {
        match self {
            Comparator::Eq => value == threshold,
            Comparator::Ne => value != threshold,
            Comparator::Gt => value > threshold,
            Comparator::Lt => value < threshold,
            Comparator::Ge => value >= threshold,
            Comparator::Le => value <= threshold,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Comparator::Eq => "==",
            Comparator::Ne => "!=",
            Comparator::Gt => ">",
            Comparator::Lt => "<",
            Comparator::Ge => ">=",
            Comparator::Le => "<=",
        }
    }
}

/// One `(comparator, threshold)` pair.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Condition {
    pub comparator: Comparator,
    pub threshold: f64,
}

impl Condition {
    pub fn new(comparator: Comparator, threshold: f64) -> Self {
        Self {
            comparator,
            threshold,
        }
    }

    pub fn holds(&self, value: f64) -> bool {
        self.comparator.holds(value, self.threshold)
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.comparator.symbol(), self.threshold)
    }
}

/// A severity together with the conditions that must all hold for it.
///
/// Deserialized rulesets go through [`AlarmRuleSet::new`], so duplicate
/// conditions are collapsed there too.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(from = "RawAlarmRuleSet"))]
pub struct AlarmRuleSet {
    pub severity: Severity,
    conditions: Vec<Condition>,
}

#[cfg(feature = "serde")]
#[derive(Deserialize)]
struct RawAlarmRuleSet {
    severity: Severity,
    conditions: Vec<Condition>,
}

#[cfg(feature = "serde")]
impl From<RawAlarmRuleSet> for AlarmRuleSet {
    fn from(raw: RawAlarmRuleSet) -> Self {
        Self::new(raw.severity, raw.conditions)
    }
}

impl AlarmRuleSet {
    /// Create a ruleset. Duplicate conditions are collapsed.
    pub fn new(severity: Severity, conditions: impl IntoIterator<Item = Condition>) -> Self {
        let mut unique: Vec<Condition> = Vec::new();
        for condition in conditions {
            if !unique.contains(&condition) {
                unique.push(condition);
            }
        }
        Self {
            severity,
            conditions: unique,
        }
    }

    /// Ruleset with a single condition.
    pub fn when(severity: Severity, comparator: Comparator, threshold: f64) -> Self {
        Self::new(severity, [Condition::new(comparator, threshold)])
    }

    /// Ruleset matching the half-open range `low <= value < high`.
    pub fn between(severity: Severity, low: f64, high: f64) -> Self {
        Self::new(
            severity,
            [
                Condition::new(Comparator::Ge, low),
                Condition::new(Comparator::Lt, high),
            ],
        )
    }

    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    /// Whether every condition holds. A ruleset without conditions never
    /// matches.
    pub fn matches(&self, value: f64) -> bool {
        !self.conditions.is_empty() && self.conditions.iter().all(|c| c.holds(value))
    }
}

/// Result of classifying one reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct AlarmState {
    pub severity: Severity,
}

impl AlarmState {
    pub fn new(severity: Severity) -> Self {
        Self { severity }
    }

    pub fn label(&self) -> &'static str {
        self.severity.label()
    }

    pub fn color(&self) -> &'static str {
        self.severity.color()
    }

    /// Whether the state should be raised to the user. `Unknown` counts as
    /// important; only `None` does not.
    pub fn is_important(&self) -> bool {
        self.severity != Severity::None
    }
}

impl fmt::Display for AlarmState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.severity)
    }
}

/// Classify a reading against an ordered list of rulesets.
///
/// ```
/// use airthings_types::{AlarmRuleSet, Comparator, Severity, SensorValue, classify};
///
/// let rules = [
///     AlarmRuleSet::when(Severity::High, Comparator::Ge, 1000.0),
///     AlarmRuleSet::when(Severity::None, Comparator::Lt, 1000.0),
/// ];
/// assert_eq!(classify(&rules, SensorValue::Number(1200.0)).severity, Severity::High);
/// assert_eq!(classify(&rules, SensorValue::Unavailable).severity, Severity::Unknown);
/// ```
pub fn classify(rule_sets: &[AlarmRuleSet], value: SensorValue) -> AlarmState {
    let matched = value.as_f64().and_then(|v| {
        rule_sets
            .iter()
            .find(|rule_set| rule_set.matches(v))
            .map(|rule_set| rule_set.severity)
    });

    match matched {
        Some(severity) => AlarmState::new(severity),
        None => {
            warn!(%value, "No alarm ruleset matched reading; severity is unknown");
            AlarmState::new(Severity::Unknown)
        }
    }
}

/// Alarm rule tables keyed by sensor kind.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct AlarmRules {
    tables: BTreeMap<SensorKind, Vec<AlarmRuleSet>>,
}

impl AlarmRules {
    /// Rules with no tables; every reading is left without an alarm.
    pub fn empty() -> Self {
        Self {
            tables: BTreeMap::new(),
        }
    }

    /// Replace the table for a kind.
    #[must_use]
    pub fn with_table(mut self, kind: SensorKind, rule_sets: Vec<AlarmRuleSet>) -> Self {
        self.tables.insert(kind, rule_sets);
        self
    }

    /// The table for a kind, if one is configured.
    pub fn table(&self, kind: SensorKind) -> Option<&[AlarmRuleSet]> {
        self.tables.get(&kind).map(Vec::as_slice)
    }

    /// Evaluate a single reading. Returns `None` for kinds without a table.
    pub fn evaluate(&self, kind: SensorKind, value: SensorValue) -> Option<AlarmState> {
        let table = self.table(kind)?;
        let state = classify(table, value);
        if state.severity == Severity::Unknown {
            warn!(sensor = kind.key(), "Alarm severity unknown for sensor reading");
        }
        Some(state)
    }

    /// Set the alarm state of every measurement in the set.
    pub fn annotate(&self, measurements: &mut MeasurementSet) {
        for (kind, measurement) in measurements.iter_mut() {
            measurement.alarm = self.evaluate(kind, measurement.value);
        }
    }
}

impl Default for AlarmRules {
    fn default() -> Self {
        use Comparator::*;
        use Severity::*;

        let radon = vec![
            AlarmRuleSet::when(High, Ge, 150.0),
            AlarmRuleSet::between(Medium, 100.0, 150.0),
            AlarmRuleSet::when(None, Lt, 100.0),
        ];

        Self::empty()
            .with_table(
                SensorKind::Humidity,
                vec![
                    AlarmRuleSet::when(High, Lt, 25.0),
                    AlarmRuleSet::when(High, Ge, 70.0),
                    AlarmRuleSet::between(Medium, 25.0, 30.0),
                    AlarmRuleSet::between(Medium, 60.0, 70.0),
                    AlarmRuleSet::between(None, 30.0, 60.0),
                ],
            )
            .with_table(
                SensorKind::Co2,
                vec![
                    AlarmRuleSet::when(High, Ge, 1000.0),
                    AlarmRuleSet::between(Medium, 800.0, 1000.0),
                    AlarmRuleSet::when(None, Lt, 800.0),
                ],
            )
            .with_table(SensorKind::RadonShortTermAvg, radon.clone())
            .with_table(SensorKind::RadonLongTermAvg, radon)
            .with_table(
                SensorKind::Voc,
                vec![
                    AlarmRuleSet::when(High, Ge, 2000.0),
                    AlarmRuleSet::between(Medium, 250.0, 2000.0),
                    AlarmRuleSet::when(None, Lt, 250.0),
                ],
            )
            .with_table(
                SensorKind::Temperature,
                vec![
                    AlarmRuleSet::when(Low, Lt, 18.0),
                    AlarmRuleSet::when(Caution, Gt, 25.0),
                    AlarmRuleSet::new(
                        None,
                        [Condition::new(Ge, 18.0), Condition::new(Le, 25.0)],
                    ),
                ],
            )
    }
}
