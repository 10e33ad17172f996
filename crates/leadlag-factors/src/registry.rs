//! Lead-Lag Measure Registry
//!
//! The three per-window summaries of the shifted correlations, with their
//! factor table column names. A column is named `<measure>(<cash flow>)`,
//! e.g. `LL_max(EBITDA)`.

use crate::error::FactorError;
use std::fmt;
use std::str::FromStr;

/// Summary statistic of the shifted correlations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LeadLagMeasure {
    /// Shift with the maximum correlation
    Max,
    /// Correlation-weighted average shift
    Average,
    /// Shift weighted by each shift's share of correlation across industries
    Industry,
}

impl LeadLagMeasure {
    /// All measures in factor table column order
    pub const ALL: [Self; 3] = [Self::Max, Self::Average, Self::Industry];

    /// Column prefix
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Max => "LL_max",
            Self::Average => "LL_average",
            Self::Industry => "LL_industry",
        }
    }

    /// Brief description of what the measure captures
    pub const fn description(&self) -> &'static str {
        match self {
            Self::Max => "Shift with the largest absolute lead-lag correlation",
            Self::Average => "Absolute-correlation weighted mean shift",
            Self::Industry => "Shift weighted by its correlation share across industries",
        }
    }

    /// Factor table column for one cash-flow measure
    pub fn column(&self, cashflow: &str) -> String {
        format!("{}({})", self.name(), cashflow)
    }

    /// Split a factor table column into its measure and cash-flow name
    pub fn parse_column(column: &str) -> Option<(Self, &str)> {
        let (name, rest) = column.split_once('(')?;
        let cashflow = rest.strip_suffix(')')?;
        let measure = name.parse().ok()?;
        (!cashflow.is_empty()).then_some((measure, cashflow))
    }
}

impl fmt::Display for LeadLagMeasure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for LeadLagMeasure {
    type Err = FactorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|m| m.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| FactorError::UnknownMeasure(s.to_string()))
    }
}

/// Measure metadata
#[derive(Debug, Clone)]
pub struct MeasureInfo {
    /// Measure
    pub measure: LeadLagMeasure,
    /// Column prefix (unique identifier)
    pub name: &'static str,
    /// Brief description
    pub description: &'static str,
}

/// Get all available measure info
pub fn available_measures() -> Vec<MeasureInfo> {
    LeadLagMeasure::ALL
        .into_iter()
        .map(|measure| MeasureInfo {
            measure,
            name: measure.name(),
            description: measure.description(),
        })
        .collect()
}

/// Get measure info by name
pub fn get_measure_info(name: &str) -> Option<MeasureInfo> {
    available_measures()
        .into_iter()
        .find(|m| m.name.eq_ignore_ascii_case(name))
}

/// Value columns of a factor table, measure-major per cash flow
pub fn factor_columns<S: AsRef<str>>(cashflows: &[S]) -> Vec<String> {
    cashflows
        .iter()
        .flat_map(|cf| LeadLagMeasure::ALL.map(|m| m.column(cf.as_ref())))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_available_measures_count() {
        assert_eq!(available_measures().len(), 3);
    }

    #[rstest]
    #[case(LeadLagMeasure::Max, "LL_max(EBITDA)")]
    #[case(LeadLagMeasure::Average, "LL_average(EBITDA)")]
    #[case(LeadLagMeasure::Industry, "LL_industry(EBITDA)")]
    fn test_column_round_trip(#[case] measure: LeadLagMeasure, #[case] column: &str) {
        assert_eq!(measure.column("EBITDA"), column);
        assert_eq!(LeadLagMeasure::parse_column(column), Some((measure, "EBITDA")));
    }

    #[test]
    fn test_parse_column_rejects_malformed() {
        assert!(LeadLagMeasure::parse_column("LL_max").is_none());
        assert!(LeadLagMeasure::parse_column("LL_max()").is_none());
        assert!(LeadLagMeasure::parse_column("LL_min(EBITDA)").is_none());
        assert!(LeadLagMeasure::parse_column("industry_code").is_none());
    }

    #[test]
    fn test_from_str() {
        assert_eq!("ll_average".parse::<LeadLagMeasure>().unwrap(), LeadLagMeasure::Average);
        assert!(matches!(
            "LL_median".parse::<LeadLagMeasure>(),
            Err(FactorError::UnknownMeasure(_))
        ));
    }

    #[test]
    fn test_get_measure_info() {
        let info = get_measure_info("LL_industry").unwrap();
        assert_eq!(info.measure, LeadLagMeasure::Industry);
        assert_eq!(get_measure_info("ll_max").unwrap().name, "LL_max");
        assert!(get_measure_info("nonexistent").is_none());
    }

    #[test]
    fn test_factor_columns() {
        let columns = factor_columns(&["EBITDA", "EBIT"]);
        assert_eq!(
            columns,
            vec![
                "LL_max(EBITDA)",
                "LL_average(EBITDA)",
                "LL_industry(EBITDA)",
                "LL_max(EBIT)",
                "LL_average(EBIT)",
                "LL_industry(EBIT)",
            ]
        );
    }
}
