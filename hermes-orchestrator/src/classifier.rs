//! Output classification
//!
//! Maps lines of agent output to coarse progress milestones. The classifier
//! only matches text; which milestones already fired is tracked by the state
//! machine, so classifying the same line twice is harmless.

use hermes_sdk::Milestone;
use serde::{Deserialize, Serialize};

/// One entry of the milestone table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MilestoneRule {
    /// Substring looked for in each output line
    pub pattern: String,
    pub label: String,
    pub percentage: u8,
}

impl MilestoneRule {
    pub fn new(pattern: impl Into<String>, label: impl Into<String>, percentage: u8) -> Self {
        Self {
            pattern: pattern.into(),
            label: label.into(),
            percentage,
        }
    }

    fn milestone(&self) -> Milestone {
        Milestone::new(self.label.clone(), self.percentage)
    }
}

/// Markers printed by the zswe agent, in priority order
pub fn default_rules() -> Vec<MilestoneRule> {
    vec![
        MilestoneRule::new("Step 1:", "Generating test case", 25),
        MilestoneRule::new("Step 2:", "Generating initial code", 50),
        MilestoneRule::new("Debate Round", "Agent debate in progress", 75),
    ]
}

#[derive(Debug, Clone)]
pub struct OutputClassifier {
    rules: Vec<MilestoneRule>,
}

impl OutputClassifier {
    /// Build a classifier from a custom table.
    ///
    /// Rules are evaluated in the given order. Returns the offending rule's
    /// description when a rule has an empty pattern/label or a percentage
    /// above 100.
    pub fn new(rules: Vec<MilestoneRule>) -> Result<Self, String> {
        for (idx, rule) in rules.iter().enumerate() {
            if rule.pattern.is_empty() {
                return Err(format!("milestone rule {} has an empty pattern", idx));
            }
            if rule.label.trim().is_empty() {
                return Err(format!("milestone rule '{}' has an empty label", rule.pattern));
            }
            if rule.percentage > 100 {
                return Err(format!(
                    "milestone rule '{}' has percentage {} (max 100)",
                    rule.pattern, rule.percentage
                ));
            }
        }
        Ok(Self { rules })
    }

    pub fn rules(&self) -> &[MilestoneRule] {
        &self.rules
    }

    /// Classify a chunk of output. The earliest-defined matching rule wins.
    pub fn classify(&self, text: &str) -> Option<Milestone> {
        self.rules
            .iter()
            .find(|rule| text.contains(rule.pattern.as_str()))
            .map(MilestoneRule::milestone)
    }
}

impl Default for OutputClassifier {
    fn default() -> Self {
        Self {
            rules: default_rules(),
        }
    }
}
