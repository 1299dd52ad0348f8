//! Health risk heuristics
//!
//! Static threshold rules mapping one night's sleep metrics to a risk score,
//! flagged conditions, an estimated life-expectancy impact, and
//! recommendations. These are rules of thumb, not a trained model.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::types::Observation;

/// Upper bound of the risk score
pub const MAX_RISK_SCORE: u32 = 100;

/// Scalar inputs to the risk heuristics
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiskInputs {
    /// Hours
    pub sleep_duration: f64,
    /// 0-100
    pub quality_score: f64,
    pub deep_sleep_pct: f64,
    pub rem_sleep_pct: f64,
    /// Years
    pub age: f64,
    /// 0-10
    pub stress_level: f64,
    /// Average sleeping heart rate (bpm)
    pub heart_rate: f64,
}

impl RiskInputs {
    /// Build inputs from a table observation. `None` if any metric is missing.
    pub fn from_observation(observation: &Observation, age: f64) -> Option<Self> {
        Some(Self {
            sleep_duration: observation.sleep_duration?,
            quality_score: observation.quality_score?,
            deep_sleep_pct: observation.deep_sleep_pct?,
            rem_sleep_pct: observation.rem_sleep_pct?,
            age,
            stress_level: observation.stress_level?,
            heart_rate: observation.heart_rate?,
        })
    }

    /// Remaining share of light sleep
    pub fn light_sleep_pct(&self) -> f64 {
        100.0 - self.deep_sleep_pct - self.rem_sleep_pct
    }
}

/// Additive risk score in `[0, 100]`
pub fn calculate_health_risk_score(inputs: &RiskInputs) -> u32 {
    let mut score = 0;

    score += if inputs.sleep_duration < 6.0 {
        30
    } else if inputs.sleep_duration < 7.0 {
        15
    } else if inputs.sleep_duration > 9.0 {
        10
    } else {
        0
    };

    score += if inputs.quality_score < 60.0 {
        25
    } else if inputs.quality_score < 75.0 {
        15
    } else {
        0
    };

    if inputs.deep_sleep_pct < 15.0 {
        score += 20;
    }
    if inputs.rem_sleep_pct < 20.0 {
        score += 15;
    }

    score += if inputs.age >= 60.0 {
        20
    } else if inputs.age >= 45.0 {
        10
    } else {
        0
    };

    score += if inputs.stress_level >= 8.0 {
        25
    } else if inputs.stress_level >= 6.0 {
        15
    } else {
        0
    };

    score += if inputs.heart_rate > 75.0 {
        15
    } else if inputs.heart_rate < 55.0 {
        10
    } else {
        0
    };

    score.min(MAX_RISK_SCORE)
}

/// Condition flagged by the heuristics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthCondition {
    CardiovascularRisk,
    MetabolicDisorderRisk,
    CognitiveDeclineRisk,
    MentalHealthVulnerability,
    AgeRelatedSleepDisorderRisk,
}

impl HealthCondition {
    pub fn label(&self) -> &'static str {
        match self {
            HealthCondition::CardiovascularRisk => "Increased cardiovascular risk",
            HealthCondition::MetabolicDisorderRisk => "Metabolic disorder risk",
            HealthCondition::CognitiveDeclineRisk => "Cognitive decline risk",
            HealthCondition::MentalHealthVulnerability => "Mental health vulnerability",
            HealthCondition::AgeRelatedSleepDisorderRisk => "Age-related sleep disorder risk",
        }
    }
}

/// Conditions whose rule fires, in a fixed order
pub fn predict_health_conditions(inputs: &RiskInputs) -> Vec<HealthCondition> {
    let rules = [
        (
            inputs.sleep_duration < 6.0 && inputs.heart_rate > 70.0,
            HealthCondition::CardiovascularRisk,
        ),
        (
            inputs.sleep_duration < 6.0 || inputs.sleep_duration > 9.0,
            HealthCondition::MetabolicDisorderRisk,
        ),
        (
            inputs.deep_sleep_pct < 15.0 || inputs.rem_sleep_pct < 20.0,
            HealthCondition::CognitiveDeclineRisk,
        ),
        (
            inputs.stress_level > 7.0 && inputs.quality_score < 70.0,
            HealthCondition::MentalHealthVulnerability,
        ),
        (
            inputs.age > 50.0 && inputs.deep_sleep_pct < 18.0,
            HealthCondition::AgeRelatedSleepDisorderRisk,
        ),
    ];

    rules
        .into_iter()
        .filter_map(|(fires, condition)| fires.then_some(condition))
        .collect()
}

/// Estimated change in life expectancy (years, never positive)
pub fn estimate_life_expectancy_impact(inputs: &RiskInputs) -> f64 {
    let mut impact = 0.0;

    if inputs.sleep_duration < 6.0 {
        impact -= 3.0;
    } else if inputs.sleep_duration < 7.0 {
        impact -= 1.5;
    } else if inputs.sleep_duration > 9.0 {
        impact -= 1.0;
    }

    if inputs.quality_score < 60.0 {
        impact -= 2.0;
    } else if inputs.quality_score < 75.0 {
        impact -= 1.0;
    }

    if inputs.stress_level > 7.0 {
        impact -= 2.0;
    }

    let age_factor = 1.0 + (inputs.age - 30.0).max(0.0) / 100.0;
    impact * age_factor
}

/// Advice attached to an assessment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Recommendation {
    IncreaseDuration,
    ImproveHygiene,
    ManageStress,
    ImproveDeepSleep,
    ImproveRemSleep,
}

impl Recommendation {
    pub fn message(&self) -> &'static str {
        match self {
            Recommendation::IncreaseDuration => "Increase sleep duration to at least 7 hours",
            Recommendation::ImproveHygiene => "Improve sleep quality through better sleep hygiene",
            Recommendation::ManageStress => "Implement stress management techniques",
            Recommendation::ImproveDeepSleep => "Focus on improving deep sleep through exercise",
            Recommendation::ImproveRemSleep => {
                "Improve REM sleep by maintaining regular sleep patterns"
            }
        }
    }
}

/// Recommendations whose rule fires, in a fixed order
pub fn get_recommendations(inputs: &RiskInputs) -> Vec<Recommendation> {
    let rules = [
        (inputs.sleep_duration < 7.0, Recommendation::IncreaseDuration),
        (inputs.quality_score < 75.0, Recommendation::ImproveHygiene),
        (inputs.stress_level > 6.0, Recommendation::ManageStress),
        (inputs.deep_sleep_pct < 15.0, Recommendation::ImproveDeepSleep),
        (inputs.rem_sleep_pct < 20.0, Recommendation::ImproveRemSleep),
    ];

    rules
        .into_iter()
        .filter_map(|(fires, rec)| fires.then_some(rec))
        .collect()
}

/// All heuristics evaluated for one set of inputs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub inputs: RiskInputs,
    pub risk_score: u32,
    pub conditions: Vec<HealthCondition>,
    pub life_expectancy_impact: f64,
    pub recommendations: Vec<Recommendation>,
}

impl RiskAssessment {
    pub fn assess(inputs: &RiskInputs) -> Self {
        Self {
            inputs: *inputs,
            risk_score: calculate_health_risk_score(inputs),
            conditions: predict_health_conditions(inputs),
            life_expectancy_impact: estimate_life_expectancy_impact(inputs),
            recommendations: get_recommendations(inputs),
        }
    }
}

/// One tracked night in an [`AssessmentHistory`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub date: NaiveDate,
    pub sleep_duration: f64,
    pub quality_score: f64,
    pub risk_score: u32,
}

/// Append-only log of assessments for a single user session
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AssessmentHistory {
    entries: Vec<HistoryEntry>,
}

impl AssessmentHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, date: NaiveDate, assessment: &RiskAssessment) {
        self.entries.push(HistoryEntry {
            date,
            sleep_duration: assessment.inputs.sleep_duration,
            quality_score: assessment.inputs.quality_score,
            risk_score: assessment.risk_score,
        });
    }

    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    pub fn latest(&self) -> Option<&HistoryEntry> {
        self.entries.last()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
