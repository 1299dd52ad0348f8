//! Analysis result types
//!
//! Every sub-report is a named struct. Sections the analyzer could not compute
//! are `None` in [`SleepReport`] and listed in [`SleepReport::omitted`].

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::types::{Column, SleepRecord};

/// Summary statistics over the present values of one column
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SummaryStats {
    /// Number of present values
    pub count: usize,
    pub mean: f64,
    pub median: f64,
    /// Sample standard deviation; undefined for a single value
    pub std_dev: Option<f64>,
    pub min: f64,
    pub max: f64,
}

/// Summary statistics for the headline sleep metrics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BasicStats {
    pub sleep_duration: SummaryStats,
    pub quality_score: SummaryStats,
    pub deep_sleep_pct: SummaryStats,
    pub rem_sleep_pct: SummaryStats,
    pub light_sleep_pct: SummaryStats,
}

impl BasicStats {
    pub const COLUMNS: [Column; 5] = [
        Column::SleepDuration,
        Column::QualityScore,
        Column::DeepSleepPct,
        Column::RemSleepPct,
        Column::LightSleepPct,
    ];

    pub fn get(&self, column: Column) -> Option<&SummaryStats> {
        match column {
            Column::SleepDuration => Some(&self.sleep_duration),
            Column::QualityScore => Some(&self.quality_score),
            Column::DeepSleepPct => Some(&self.deep_sleep_pct),
            Column::RemSleepPct => Some(&self.rem_sleep_pct),
            Column::LightSleepPct => Some(&self.light_sleep_pct),
            _ => None,
        }
    }
}

/// Per-weekday averages, rounded to two decimals
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeekdayPattern {
    /// 0 = Monday .. 6 = Sunday
    pub day_of_week: u32,
    /// Rows in the group
    pub count: usize,
    pub sleep_duration: Option<f64>,
    pub quality_score: Option<f64>,
    pub deep_sleep_pct: Option<f64>,
    pub bedtime: Option<f64>,
    pub wake_time: Option<f64>,
}

/// Symmetric pairwise correlation matrix
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelationMatrix {
    pub columns: Vec<Column>,
    /// Row-major coefficients; `None` where the pair is undefined
    pub values: Vec<Vec<Option<f64>>>,
}

impl CorrelationMatrix {
    /// Coefficient for a pair of columns, if both are in the matrix and defined
    pub fn get(&self, a: Column, b: Column) -> Option<f64> {
        let i = self.columns.iter().position(|c| *c == a)?;
        let j = self.columns.iter().position(|c| *c == b)?;
        self.values.get(i)?.get(j).copied().flatten()
    }
}

/// A row whose value lies more than the threshold away from the mean
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Anomaly {
    /// Position of the row in the analyzed table
    pub index: usize,
    pub z_score: f64,
    pub record: SleepRecord,
}

/// Trailing moving averages of the trend metrics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SleepTrends {
    pub window: usize,
    pub dates: Vec<NaiveDate>,
    pub sleep_duration_ma: Vec<Option<f64>>,
    pub quality_score_ma: Vec<Option<f64>>,
    pub deep_sleep_pct_ma: Vec<Option<f64>>,
}

impl SleepTrends {
    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    /// Keep only the last `n` rows
    pub fn tail(&self, n: usize) -> SleepTrends {
        let start = self.len().saturating_sub(n);
        SleepTrends {
            window: self.window,
            dates: self.dates[start..].to_vec(),
            sleep_duration_ma: self.sleep_duration_ma[start..].to_vec(),
            quality_score_ma: self.quality_score_ma[start..].to_vec(),
            deep_sleep_pct_ma: self.deep_sleep_pct_ma[start..].to_vec(),
        }
    }
}

/// Direction of recent sleep quality
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendLabel {
    Improving,
    Varying,
}

/// Headline findings
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Insights {
    pub average_sleep_duration: Option<f64>,
    /// Weekday with the highest mean quality score
    pub best_sleep_day: Option<u32>,
    /// Weekday with the lowest mean quality score
    pub worst_sleep_day: Option<u32>,
    pub sleep_trend: Option<TrendLabel>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportSection {
    BasicStats,
    WeeklyPatterns,
    Correlations,
    Trends,
    Anomalies,
}

/// A report section that was skipped, and why
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OmittedSection {
    pub section: ReportSection,
    pub reason: String,
}

/// Composed analysis of a finalized table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SleepReport {
    pub basic_stats: Option<BasicStats>,
    pub weekly_patterns: Option<Vec<WeekdayPattern>>,
    pub correlations: Option<CorrelationMatrix>,
    /// Last rows of the moving averages
    pub trends: Option<SleepTrends>,
    pub insights: Insights,
    pub omitted: Vec<OmittedSection>,
}

impl SleepReport {
    pub fn is_complete(&self) -> bool {
        self.omitted.is_empty()
    }
}

/// English name of a Monday-based weekday number
pub fn weekday_name(day_of_week: u32) -> &'static str {
    match day_of_week {
        0 => "Monday",
        1 => "Tuesday",
        2 => "Wednesday",
        3 => "Thursday",
        4 => "Friday",
        5 => "Saturday",
        6 => "Sunday",
        _ => "Unknown",
    }
}
