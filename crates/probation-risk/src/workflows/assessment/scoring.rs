use serde::{Deserialize, Serialize};

use super::segments::{
    recommendation_label, scored_slots, ScoredSlot, MANDATORY_PROGRAMS, SEGMENT_COUNT,
};
use super::session::{SegmentAnswers, SHORT_SENTENCE};

/// Ordered risk bands; upper bounds are inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskTier {
    Low,
    Medium,
    High,
    VeryHigh,
}

impl RiskTier {
    pub fn from_total(total_score: i32) -> Self {
        match total_score {
            i32::MIN..=17 => RiskTier::Low,
            18..=28 => RiskTier::Medium,
            29..=39 => RiskTier::High,
            _ => RiskTier::VeryHigh,
        }
    }

    pub fn level(&self) -> u8 {
        match self {
            RiskTier::Low => 1,
            RiskTier::Medium => 2,
            RiskTier::High => 3,
            RiskTier::VeryHigh => 4,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            RiskTier::Low => "Low Risk (Level 1)",
            RiskTier::Medium => "Medium Risk (Level 2)",
            RiskTier::High => "High Risk (Level 3)",
            RiskTier::VeryHigh => "Very High Risk (Level 4)",
        }
    }

    pub fn supervision(&self) -> &'static str {
        match self {
            RiskTier::Low => "Once in 2 months",
            RiskTier::Medium => "Once a month",
            RiskTier::High | RiskTier::VeryHigh => "Twice a month",
        }
    }

    /// `(short sentence, any other sentence)` probation periods.
    pub fn probation_periods(&self) -> (&'static str, &'static str) {
        match self {
            RiskTier::Low | RiskTier::Medium => ("6 months", "1 year"),
            RiskTier::High => ("1 year", "2 years"),
            RiskTier::VeryHigh => ("2 years", "3 years"),
        }
    }
}

/// Tier plus the supervision regime it implies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskClassification {
    pub tier: RiskTier,
    pub level: String,
    pub supervision: String,
    pub probation_period: String,
    pub probation_short_sentence: String,
    pub probation_other_sentence: String,
}

/// Subtotal of one split-aware slot alongside its threshold rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotSubtotal {
    pub slot: u8,
    pub segment: u8,
    pub name: String,
    pub subtotal: i32,
    pub threshold: i32,
    pub max_subtotal: i32,
    pub program: String,
}

impl SlotSubtotal {
    pub fn triggered(&self) -> bool {
        self.subtotal >= self.threshold
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskAssessmentResult {
    pub total_score: i32,
    pub classification: RiskClassification,
    pub recommended_programs: Vec<String>,
}

/// Everything the rendering and export collaborators consume.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssessmentSummary {
    pub subtotals: Vec<SlotSubtotal>,
    pub total_score: i32,
    pub classification: RiskClassification,
    pub recommended_programs: Vec<String>,
    pub mandatory_programs: Vec<String>,
}

impl AssessmentSummary {
    pub fn subtotal(&self, slot: u8) -> i32 {
        self.subtotals
            .iter()
            .find(|entry| entry.slot == slot)
            .map_or(0, |entry| entry.subtotal)
    }

    pub fn result(&self) -> RiskAssessmentResult {
        RiskAssessmentResult {
            total_score: self.total_score,
            classification: self.classification.clone(),
            recommended_programs: self.recommended_programs.clone(),
        }
    }
}

/// Stateless scorer over stored answers. Results are never cached.
#[derive(Debug, Default, Clone, Copy)]
pub struct ScoringEngine;

impl ScoringEngine {
    pub fn new() -> Self {
        Self
    }

    /// Sum of the answers feeding one split-aware slot.
    pub fn slot_subtotal(&self, answers: &SegmentAnswers, slot: &ScoredSlot) -> i32 {
        slot.span.select(answers.scores(slot.segment)).iter().sum()
    }

    /// Raw sum of one nominal segment, ignoring the split.
    pub fn segment_total(&self, answers: &SegmentAnswers, segment: u8) -> i32 {
        answers.scores(segment).iter().sum()
    }

    pub fn subtotals(&self, answers: &SegmentAnswers) -> Vec<SlotSubtotal> {
        scored_slots()
            .iter()
            .map(|slot| SlotSubtotal {
                slot: slot.slot,
                segment: slot.segment,
                name: slot.name.to_string(),
                subtotal: self.slot_subtotal(answers, slot),
                threshold: slot.rule.threshold,
                max_subtotal: slot.max_subtotal(),
                program: slot.rule.program.to_string(),
            })
            .collect()
    }

    /// Sum over all eight nominal segments.
    pub fn total_score(&self, answers: &SegmentAnswers) -> i32 {
        (1..=SEGMENT_COUNT)
            .map(|segment| self.segment_total(answers, segment))
            .sum()
    }

    pub fn classify(&self, total_score: i32, length_of_sentence: &str) -> RiskClassification {
        let tier = RiskTier::from_total(total_score);
        let (short, other) = tier.probation_periods();
        let probation = if length_of_sentence == SHORT_SENTENCE {
            short
        } else {
            other
        };

        RiskClassification {
            tier,
            level: tier.label().to_string(),
            supervision: tier.supervision().to_string(),
            probation_period: probation.to_string(),
            probation_short_sentence: short.to_string(),
            probation_other_sentence: other.to_string(),
        }
    }

    /// One entry per triggered slot in slot order; repeated programs are kept.
    pub fn recommended_programs(&self, subtotals: &[SlotSubtotal]) -> Vec<String> {
        let mut ordered: Vec<&SlotSubtotal> = subtotals.iter().collect();
        ordered.sort_by_key(|entry| entry.slot);
        ordered
            .into_iter()
            .filter(|entry| entry.triggered())
            .map(|entry| recommendation_label(&entry.program, &entry.name))
            .collect()
    }

    pub fn mandatory_programs(&self) -> Vec<String> {
        MANDATORY_PROGRAMS.iter().map(|program| program.to_string()).collect()
    }

    pub fn summarize(&self, answers: &SegmentAnswers, length_of_sentence: &str) -> AssessmentSummary {
        let subtotals = self.subtotals(answers);
        let total_score = self.total_score(answers);
        let classification = self.classify(total_score, length_of_sentence);
        let recommended_programs = self.recommended_programs(&subtotals);

        AssessmentSummary {
            subtotals,
            total_score,
            classification,
            recommended_programs,
            mandatory_programs: self.mandatory_programs(),
        }
    }

    pub fn assess(&self, answers: &SegmentAnswers, length_of_sentence: &str) -> RiskAssessmentResult {
        self.summarize(answers, length_of_sentence).result()
    }
}
