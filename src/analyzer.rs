//! Statistical analysis of a finalized sleep table
//!
//! The analyzer borrows a table read-only; every operation is a pure
//! computation over it. Missing cells are skipped, never imputed.

use log::{debug, info, warn};
use std::collections::BTreeMap;

use crate::error::{AnalysisError, FluxError, SchemaError};
use crate::report::{
    Anomaly, BasicStats, CorrelationMatrix, Insights, OmittedSection, ReportSection,
    SleepReport, SleepTrends, SummaryStats, TrendLabel, WeekdayPattern,
};
use crate::stats;
use crate::types::{Column, SleepRecord, SleepTable};

/// Columns included in the correlation matrix
pub const CORRELATION_COLUMNS: [Column; 8] = [
    Column::SleepDuration,
    Column::QualityScore,
    Column::ActivityLevel,
    Column::StressLevel,
    Column::HeartRate,
    Column::DeepSleepPct,
    Column::RemSleepPct,
    Column::LightSleepPct,
];

pub const DEFAULT_ANOMALY_THRESHOLD: f64 = 2.0;
pub const DEFAULT_TREND_WINDOW: usize = 7;

/// Rows kept from the trend series in the composed report
pub const REPORT_TREND_ROWS: usize = 5;

/// Quality scores inspected for the trend label
const INSIGHT_TREND_ROWS: usize = 5;

/// Read-only analyzer over a table
pub struct SleepAnalyzer<'a> {
    table: &'a SleepTable,
}

impl<'a> SleepAnalyzer<'a> {
    pub fn new(table: &'a SleepTable) -> Self {
        Self { table }
    }

    pub fn table(&self) -> &SleepTable {
        self.table
    }

    /// Count, mean, median, sample std-dev, min and max of the headline metrics
    pub fn basic_stats(&self) -> Result<BasicStats, FluxError> {
        Ok(BasicStats {
            sleep_duration: self.summarize(Column::SleepDuration)?,
            quality_score: self.summarize(Column::QualityScore)?,
            deep_sleep_pct: self.summarize(Column::DeepSleepPct)?,
            rem_sleep_pct: self.summarize(Column::RemSleepPct)?,
            light_sleep_pct: self.summarize(Column::LightSleepPct)?,
        })
    }

    fn summarize(&self, column: Column) -> Result<SummaryStats, FluxError> {
        const OPERATION: &str = "basic_stats";
        let values = self.finite_values(column, OPERATION)?;
        let no_values = || AnalysisError::NoValues {
            operation: OPERATION,
            column,
        };

        Ok(SummaryStats {
            count: values.len(),
            mean: stats::mean(&values).ok_or_else(no_values)?,
            median: stats::median(&values).ok_or_else(no_values)?,
            std_dev: stats::std_dev(&values, 1),
            min: stats::min(&values).ok_or_else(no_values)?,
            max: stats::max(&values).ok_or_else(no_values)?,
        })
    }

    /// Per-weekday means of the sleep metrics, ascending by weekday.
    ///
    /// Only weekdays that occur in the table are listed.
    pub fn weekly_patterns(&self) -> Result<Vec<WeekdayPattern>, FluxError> {
        const OPERATION: &str = "weekly_patterns";
        for column in [
            Column::DayOfWeek,
            Column::SleepDuration,
            Column::QualityScore,
            Column::DeepSleepPct,
            Column::Bedtime,
            Column::WakeTime,
        ] {
            self.table.require_numeric(column, OPERATION)?;
        }

        let mut groups: BTreeMap<u32, Vec<&SleepRecord>> = BTreeMap::new();
        for record in self.table.records() {
            let features = record.features.as_ref().ok_or(SchemaError::MissingColumn {
                column: Column::DayOfWeek,
                operation: OPERATION,
            })?;
            groups.entry(features.day_of_week).or_default().push(record);
        }

        let patterns = groups
            .into_iter()
            .map(|(day_of_week, records)| {
                let group_mean = |column: Column| {
                    let values: Vec<f64> = records.iter().filter_map(|r| r.value(column)).collect();
                    stats::mean(&values).map(|m| stats::round_to(m, 2))
                };
                WeekdayPattern {
                    day_of_week,
                    count: records.len(),
                    sleep_duration: group_mean(Column::SleepDuration),
                    quality_score: group_mean(Column::QualityScore),
                    deep_sleep_pct: group_mean(Column::DeepSleepPct),
                    bedtime: group_mean(Column::Bedtime),
                    wake_time: group_mean(Column::WakeTime),
                }
            })
            .collect();

        Ok(patterns)
    }

    /// Pairwise-complete Pearson correlations between the metric columns
    pub fn correlations(&self) -> Result<CorrelationMatrix, FluxError> {
        const OPERATION: &str = "correlations";
        let series = CORRELATION_COLUMNS
            .iter()
            .map(|&c| self.table.column(c, OPERATION))
            .collect::<Result<Vec<_>, _>>()?;

        let n = series.len();
        let mut values = vec![vec![None; n]; n];
        for i in 0..n {
            for j in i..n {
                let r = stats::pearson(&series[i], &series[j]);
                values[i][j] = r;
                values[j][i] = r;
            }
        }

        Ok(CorrelationMatrix {
            columns: CORRELATION_COLUMNS.to_vec(),
            values,
        })
    }

    /// Rows whose standard score on `column` exceeds `threshold` in absolute
    /// value.
    ///
    /// Scores use the population standard deviation of the present values.
    /// A column without spread, or holding NaN or infinite values, cannot be
    /// scored and is an error.
    pub fn detect_anomalies(&self, column: Column, threshold: f64) -> Result<Vec<Anomaly>, FluxError> {
        const OPERATION: &str = "detect_anomalies";
        let values = self.finite_values(column, OPERATION)?;
        let mean = stats::mean(&values).ok_or(AnalysisError::NoValues {
            operation: OPERATION,
            column,
        })?;
        let std = match stats::std_dev(&values, 0) {
            Some(std) if std > 0.0 => std,
            _ => {
                return Err(AnalysisError::ZeroVariance {
                    operation: OPERATION,
                    column,
                }
                .into())
            }
        };

        let anomalies: Vec<Anomaly> = self
            .table
            .records()
            .iter()
            .enumerate()
            .filter_map(|(index, record)| {
                let z_score = (record.value(column)? - mean) / std;
                (z_score.abs() > threshold).then(|| Anomaly {
                    index,
                    z_score,
                    record: record.clone(),
                })
            })
            .collect();

        debug!(
            "{} anomalies in {} (threshold {})",
            anomalies.len(),
            column,
            threshold
        );
        Ok(anomalies)
    }

    /// Trailing moving averages over `window` rows
    pub fn calculate_trends(&self, window: usize) -> Result<SleepTrends, FluxError> {
        const OPERATION: &str = "calculate_trends";
        let rows = self.table.len();
        if window == 0 || window > rows {
            return Err(AnalysisError::InvalidWindow {
                operation: OPERATION,
                window,
                rows,
            }
            .into());
        }

        let moving_average = |column: Column| -> Result<Vec<Option<f64>>, SchemaError> {
            Ok(stats::rolling_mean(&self.table.column(column, OPERATION)?, window))
        };

        Ok(SleepTrends {
            window,
            dates: self.table.records().iter().map(|r| r.observation.date).collect(),
            sleep_duration_ma: moving_average(Column::SleepDuration)?,
            quality_score_ma: moving_average(Column::QualityScore)?,
            deep_sleep_pct_ma: moving_average(Column::DeepSleepPct)?,
        })
    }

    /// Compose every analysis into one report.
    ///
    /// A section that cannot be computed is left out and its reason recorded;
    /// report generation itself never fails.
    pub fn generate_report(&self) -> SleepReport {
        self.generate_report_with_window(DEFAULT_TREND_WINDOW)
    }

    pub fn generate_report_with_window(&self, trend_window: usize) -> SleepReport {
        let mut omitted = Vec::new();

        let basic_stats = keep(ReportSection::BasicStats, self.basic_stats(), &mut omitted);
        let weekly_patterns = keep(
            ReportSection::WeeklyPatterns,
            self.weekly_patterns(),
            &mut omitted,
        );
        let correlations = keep(ReportSection::Correlations, self.correlations(), &mut omitted);
        let trends = keep(
            ReportSection::Trends,
            self.calculate_trends(trend_window),
            &mut omitted,
        )
        .map(|t| t.tail(REPORT_TREND_ROWS));

        let insights = self.insights(weekly_patterns.as_deref());

        info!(
            "Generated report over {} rows ({} sections omitted)",
            self.table.len(),
            omitted.len()
        );

        SleepReport {
            basic_stats,
            weekly_patterns,
            correlations,
            trends,
            insights,
            omitted,
        }
    }

    /// Present values of `column`, rejecting NaN and infinities
    fn finite_values(&self, column: Column, operation: &'static str) -> Result<Vec<f64>, FluxError> {
        let values = self.table.present_values(column, operation)?;
        if values.iter().any(|v| !v.is_finite()) {
            return Err(AnalysisError::NonFinite { operation, column }.into());
        }
        Ok(values)
    }

    fn insights(&self, weekly: Option<&[WeekdayPattern]>) -> Insights {
        let durations: Vec<f64> = self
            .table
            .records()
            .iter()
            .filter_map(|r| r.value(Column::SleepDuration))
            .collect();

        let ranked: Vec<(u32, f64)> = weekly
            .unwrap_or_default()
            .iter()
            .filter_map(|p| Some((p.day_of_week, p.quality_score?)))
            .collect();
        // Strict comparisons keep the earliest weekday on ties
        let best_sleep_day = ranked
            .iter()
            .copied()
            .reduce(|best, next| if next.1 > best.1 { next } else { best })
            .map(|(day, _)| day);
        let worst_sleep_day = ranked
            .iter()
            .copied()
            .reduce(|worst, next| if next.1 < worst.1 { next } else { worst })
            .map(|(day, _)| day);

        Insights {
            average_sleep_duration: stats::mean(&durations),
            best_sleep_day,
            worst_sleep_day,
            sleep_trend: self.quality_trend(),
        }
    }

    /// `Improving` when the latest quality scores never decrease
    fn quality_trend(&self) -> Option<TrendLabel> {
        let records = self.table.records();
        if records.is_empty() || !self.table.has_column(Column::QualityScore) {
            return None;
        }
        let recent = &records[records.len().saturating_sub(INSIGHT_TREND_ROWS)..];
        let scores: Option<Vec<f64>> = recent
            .iter()
            .map(|r| r.value(Column::QualityScore))
            .collect();

        let improving = scores.is_some_and(|s| s.windows(2).all(|w| w[0] <= w[1]));
        Some(if improving {
            TrendLabel::Improving
        } else {
            TrendLabel::Varying
        })
    }
}

fn keep<T>(
    section: ReportSection,
    result: Result<T, FluxError>,
    omitted: &mut Vec<OmittedSection>,
) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(e) => {
            warn!("Omitting {:?} from report: {}", section, e);
            omitted.push(OmittedSection {
                section,
                reason: e.to_string(),
            });
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::engineer_features;
    use crate::generator::generate_table;
    use crate::transformer::Transformer;
    use crate::types::test_support::observation;
    use pretty_assertions::assert_eq;

    fn make_table() -> SleepTable {
        // 2025-01-06 is a Monday
        engineer_features(SleepTable::from_observations(vec![
            observation("2025-01-06", 7.0, 60.0),
            observation("2025-01-07", 6.0, 65.0),
            observation("2025-01-08", 8.0, 70.0),
            observation("2025-01-13", 9.0, 80.0),
            observation("2025-01-14", 5.0, 90.0),
            observation("2025-01-15", 7.0, 95.0),
        ]))
    }

    fn engineered(n: usize, seed: u64) -> SleepTable {
        Transformer::new()
            .clean()
            .engineer_features()
            .run(generate_table(n, seed).unwrap())
            .unwrap()
            .table
    }

    #[test]
    fn test_basic_stats() {
        let table = make_table();
        let stats = SleepAnalyzer::new(&table).basic_stats().unwrap();

        let duration = stats.sleep_duration;
        assert_eq!(duration.count, 6);
        assert_eq!(duration.mean, 7.0);
        assert_eq!(duration.median, 7.0);
        assert_eq!(duration.min, 5.0);
        assert_eq!(duration.max, 9.0);
        // Sample std-dev of [7, 6, 8, 9, 5, 7]
        assert!((duration.std_dev.unwrap() - 1.414_213_562).abs() < 1e-6);
        assert_eq!(stats.get(Column::QualityScore), Some(&stats.quality_score));
    }

    #[test]
    fn test_basic_stats_empty_metric() {
        let mut obs = observation("2025-01-06", 7.0, 60.0);
        obs.rem_sleep_pct = None;
        let table = SleepTable::from_observations(vec![obs]);

        let result = SleepAnalyzer::new(&table).basic_stats();
        assert!(matches!(
            result,
            Err(FluxError::Analysis(AnalysisError::NoValues {
                column: Column::RemSleepPct,
                ..
            }))
        ));
    }

    #[test]
    fn test_weekly_patterns_grouping() {
        let table = make_table();
        let patterns = SleepAnalyzer::new(&table).weekly_patterns().unwrap();

        let days: Vec<u32> = patterns.iter().map(|p| p.day_of_week).collect();
        assert_eq!(days, vec![0, 1, 2]);
        assert_eq!(patterns[0].count, 2);
        assert_eq!(patterns[0].sleep_duration, Some(8.0));
        assert_eq!(patterns[1].quality_score, Some(77.5));
    }

    #[test]
    fn test_weekly_patterns_requires_features() {
        let table = SleepTable::from_observations(vec![observation("2025-01-06", 7.0, 60.0)]);
        let result = SleepAnalyzer::new(&table).weekly_patterns();

        assert!(matches!(
            result,
            Err(FluxError::Schema(SchemaError::MissingColumn { .. }))
        ));
    }

    #[test]
    fn test_weekly_means_reaggregate_to_overall_mean() {
        let table = engineered(200, 3);
        let analyzer = SleepAnalyzer::new(&table);
        let patterns = analyzer.weekly_patterns().unwrap();
        let overall = analyzer.basic_stats().unwrap().sleep_duration.mean;

        let total: usize = patterns.iter().map(|p| p.count).sum();
        let weighted: f64 = patterns
            .iter()
            .map(|p| p.sleep_duration.unwrap() * p.count as f64)
            .sum::<f64>()
            / total as f64;

        assert_eq!(total, table.len());
        assert!((weighted - overall).abs() < 0.005);
    }

    #[test]
    fn test_correlations_symmetric_with_unit_diagonal() {
        let table = engineered(120, 9);
        let matrix = SleepAnalyzer::new(&table).correlations().unwrap();

        assert_eq!(matrix.columns.len(), CORRELATION_COLUMNS.len());
        for &a in &CORRELATION_COLUMNS {
            assert!((matrix.get(a, a).unwrap() - 1.0).abs() < 1e-9);
            for &b in &CORRELATION_COLUMNS {
                assert_eq!(matrix.get(a, b), matrix.get(b, a));
            }
        }
    }

    #[test]
    fn test_correlations_zero_variance_undefined() {
        // activity_level is constant in the fixture
        let table = make_table();
        let matrix = SleepAnalyzer::new(&table).correlations().unwrap();

        assert_eq!(matrix.get(Column::ActivityLevel, Column::SleepDuration), None);
        assert!(matrix.get(Column::QualityScore, Column::SleepDuration).is_some());
    }

    #[test]
    fn test_detect_anomalies_strict_threshold() {
        let table = engineered(300, 21);
        let analyzer = SleepAnalyzer::new(&table);
        let values = table.present_values(Column::SleepDuration, "test").unwrap();
        let mean = stats::mean(&values).unwrap();
        let std = stats::std_dev(&values, 0).unwrap();

        let anomalies = analyzer
            .detect_anomalies(Column::SleepDuration, DEFAULT_ANOMALY_THRESHOLD)
            .unwrap();

        let expected = values
            .iter()
            .filter(|v| ((*v - mean) / std).abs() > DEFAULT_ANOMALY_THRESHOLD)
            .count();
        assert_eq!(anomalies.len(), expected);
        for anomaly in &anomalies {
            assert!(anomaly.z_score.abs() > DEFAULT_ANOMALY_THRESHOLD);
            assert_eq!(&table.records()[anomaly.index], &anomaly.record);
        }
    }

    #[test]
    fn test_detect_anomalies_value_on_threshold_excluded() {
        // Values -1, 1 have mean 0 and population std 1
        let mut low = observation("2025-01-06", 7.0, 60.0);
        low.heart_rate = Some(-1.0);
        let mut high = observation("2025-01-07", 7.0, 60.0);
        high.heart_rate = Some(1.0);
        let table = SleepTable::from_observations(vec![low, high]);

        let anomalies = SleepAnalyzer::new(&table)
            .detect_anomalies(Column::HeartRate, 1.0)
            .unwrap();
        assert!(anomalies.is_empty());
    }

    #[test]
    fn test_detect_anomalies_zero_variance() {
        let table = make_table();
        let result = SleepAnalyzer::new(&table).detect_anomalies(Column::ActivityLevel, 2.0);

        assert!(matches!(
            result,
            Err(FluxError::Analysis(AnalysisError::ZeroVariance {
                column: Column::ActivityLevel,
                ..
            }))
        ));
    }

    #[test]
    fn test_detect_anomalies_non_finite_is_not_zero_variance() {
        let mut records = make_table().into_records();
        records[2].observation.heart_rate = Some(f64::NAN);
        let table = SleepTable::new(records);
        let analyzer = SleepAnalyzer::new(&table);

        assert!(matches!(
            analyzer.detect_anomalies(Column::HeartRate, 2.0),
            Err(FluxError::Analysis(AnalysisError::NonFinite {
                column: Column::HeartRate,
                ..
            }))
        ));
    }

    #[test]
    fn test_basic_stats_rejects_non_finite() {
        let mut records = make_table().into_records();
        records[0].observation.sleep_duration = Some(f64::INFINITY);
        let table = SleepTable::new(records);

        assert!(matches!(
            SleepAnalyzer::new(&table).basic_stats(),
            Err(FluxError::Analysis(AnalysisError::NonFinite {
                column: Column::SleepDuration,
                ..
            }))
        ));
    }

    #[test]
    fn test_absent_column_is_schema_error() {
        let records = make_table().into_records();
        let columns = Column::RAW
            .into_iter()
            .filter(|c| *c != Column::QualityScore);
        let table = SleepTable::with_raw_columns(records, columns);
        let analyzer = SleepAnalyzer::new(&table);

        let missing = |result: Result<(), FluxError>| {
            matches!(
                result,
                Err(FluxError::Schema(SchemaError::MissingColumn {
                    column: Column::QualityScore,
                    ..
                }))
            )
        };
        assert!(missing(analyzer.basic_stats().map(|_| ())));
        assert!(missing(analyzer.weekly_patterns().map(|_| ())));
        assert!(missing(analyzer.correlations().map(|_| ())));
        assert!(missing(analyzer.detect_anomalies(Column::QualityScore, 2.0).map(|_| ())));

        let report = analyzer.generate_report_with_window(3);
        assert_eq!(report.basic_stats, None);
        assert_eq!(report.correlations, None);
        assert_eq!(report.insights.sleep_trend, None);
        assert!(report.omitted[0].reason.contains("quality_score"));
    }

    #[test]
    fn test_calculate_trends() {
        let table = make_table();
        let trends = SleepAnalyzer::new(&table).calculate_trends(3).unwrap();

        assert_eq!(trends.len(), 6);
        assert_eq!(
            trends.sleep_duration_ma,
            vec![None, None, Some(7.0), Some(23.0 / 3.0), Some(22.0 / 3.0), Some(7.0)]
        );
    }

    #[test]
    fn test_calculate_trends_invalid_window() {
        let table = make_table();
        let analyzer = SleepAnalyzer::new(&table);

        for window in [0, 7] {
            assert!(matches!(
                analyzer.calculate_trends(window),
                Err(FluxError::Analysis(AnalysisError::InvalidWindow { .. }))
            ));
        }
    }

    #[test]
    fn test_report_insights() {
        let table = make_table();
        let report = SleepAnalyzer::new(&table).generate_report_with_window(3);

        assert!(report.is_complete());
        let insights = &report.insights;
        assert_eq!(insights.average_sleep_duration, Some(7.0));
        // Weekday quality means: Mon 70, Tue 77.5, Wed 82.5
        assert_eq!(insights.best_sleep_day, Some(2));
        assert_eq!(insights.worst_sleep_day, Some(0));
        assert_eq!(insights.sleep_trend, Some(TrendLabel::Improving));
        assert_eq!(report.trends.unwrap().len(), REPORT_TREND_ROWS);
    }

    #[test]
    fn test_best_day_tie_goes_to_earliest_weekday() {
        let table = engineer_features(SleepTable::from_observations(vec![
            observation("2025-01-08", 7.0, 80.0),
            observation("2025-01-06", 7.0, 80.0),
            observation("2025-01-07", 7.0, 60.0),
        ]));
        let report = SleepAnalyzer::new(&table).generate_report_with_window(1);

        assert_eq!(report.insights.best_sleep_day, Some(0));
        assert_eq!(report.insights.worst_sleep_day, Some(1));
        assert_eq!(report.insights.sleep_trend, Some(TrendLabel::Varying));
    }

    #[test]
    fn test_report_omits_unavailable_sections() {
        // No features and fewer rows than the default window
        let table = SleepTable::from_observations(vec![
            observation("2025-01-06", 7.0, 60.0),
            observation("2025-01-07", 8.0, 70.0),
        ]);
        let report = SleepAnalyzer::new(&table).generate_report();

        assert!(report.basic_stats.is_some());
        assert!(report.correlations.is_some());
        assert_eq!(report.weekly_patterns, None);
        assert_eq!(report.trends, None);
        let sections: Vec<ReportSection> = report.omitted.iter().map(|o| o.section).collect();
        assert_eq!(
            sections,
            vec![ReportSection::WeeklyPatterns, ReportSection::Trends]
        );
        assert_eq!(report.insights.best_sleep_day, None);
        assert_eq!(report.insights.sleep_trend, Some(TrendLabel::Improving));
    }

    #[test]
    fn test_generated_hundred_rows_scenario() {
        let table = engineered(100, 42);
        let stats = SleepAnalyzer::new(&table).basic_stats().unwrap();
        let duration = stats.sleep_duration;

        assert!(table.len() <= 100);
        assert_eq!(duration.count, table.len());
        assert!((4.0..=12.0).contains(&duration.mean));
    }
}
