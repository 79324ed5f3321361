use serde::Serialize;
use std::collections::HashMap;

pub const GRADE_MIN: f64 = 1.0;
pub const GRADE_MAX: f64 = 20.0;
pub const WEIGHT_MIN: f64 = 1.0;
pub const PERIOD_WEIGHT_BUDGET: f64 = 100.0;

/// Letter shorthand accepted at grade entry. Stored grades are always numeric.
pub const LITERAL_SCALE: [(char, f64); 5] =
    [('A', 20.0), ('B', 16.0), ('C', 12.0), ('D', 8.0), ('E', 1.0)];

#[derive(Debug, Clone, Serialize)]
pub struct CalcError {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl CalcError {
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }
}

/// Result of normalising one grade cell edit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GradeInput {
    Set(f64),
    Clear,
}

pub fn literal_grade(letter: char) -> Option<f64> {
    let up = letter.to_ascii_uppercase();
    LITERAL_SCALE
        .iter()
        .find(|(l, _)| *l == up)
        .map(|(_, v)| *v)
}

pub fn is_valid_grade(v: f64) -> bool {
    v.is_finite() && (GRADE_MIN..=GRADE_MAX).contains(&v)
}

fn invalid_grade(raw: &str) -> CalcError {
    CalcError::new(
        "validation_failed",
        "invalid grade: use 1-20 or A, B, C, D, E",
    )
    .with_details(serde_json::json!({ "value": raw }))
}

/// Accepts a number in [1, 20] or a single letter A-E (any case).
/// Blank input clears the cell.
pub fn normalize_grade_input(raw: &str) -> Result<GradeInput, CalcError> {
    let t = raw.trim();
    if t.is_empty() {
        return Ok(GradeInput::Clear);
    }
    if let Ok(v) = t.parse::<f64>() {
        if is_valid_grade(v) {
            return Ok(GradeInput::Set(v));
        }
        return Err(invalid_grade(t));
    }
    let mut chars = t.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => literal_grade(c)
            .map(GradeInput::Set)
            .ok_or_else(|| invalid_grade(t)),
        _ => Err(invalid_grade(t)),
    }
}

/// Same rules as [`normalize_grade_input`] for a JSON request value
/// (number, string or null). An absent value is a malformed request, not a
/// clear.
pub fn normalize_grade_value(value: Option<&serde_json::Value>) -> Result<GradeInput, CalcError> {
    match value {
        None => Err(CalcError::new("bad_params", "missing value")),
        Some(v) if v.is_null() => Ok(GradeInput::Clear),
        Some(v) => {
            if let Some(n) = v.as_f64() {
                if is_valid_grade(n) {
                    return Ok(GradeInput::Set(n));
                }
                return Err(invalid_grade(&n.to_string()));
            }
            if let Some(s) = v.as_str() {
                return normalize_grade_input(s);
            }
            Err(CalcError::new(
                "bad_params",
                "value must be a number, a string or null",
            ))
        }
    }
}

pub fn round_off_2_decimals(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "status", content = "value", rename_all = "lowercase")]
pub enum FinalGrade {
    Graded(f64),
    Pending,
}

impl FinalGrade {
    pub fn value(self) -> Option<f64> {
        match self {
            FinalGrade::Graded(v) => Some(v),
            FinalGrade::Pending => None,
        }
    }

    /// Table text: two decimals, or "-" while pending.
    pub fn display(self) -> String {
        match self {
            FinalGrade::Graded(v) => format!("{:.2}", v),
            FinalGrade::Pending => "-".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanEvaluation {
    pub id: String,
    pub title: String,
    pub period: i64,
    pub weight: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PeriodAggregate {
    pub final_grade: FinalGrade,
    pub graded_count: usize,
    pub missing_count: usize,
    pub weight_covered: f64,
}

/// Weighted average of the student's recorded grades for one period.
/// `grades` is keyed by evaluation id. Missing or out-of-range grades are
/// skipped, so a partially graded period averages over what is recorded.
pub fn period_aggregate(
    evaluations: &[PlanEvaluation],
    period: i64,
    grades: &HashMap<String, f64>,
) -> PeriodAggregate {
    let mut weighted_sum = 0.0_f64;
    let mut weight_sum = 0.0_f64;
    let mut graded_count = 0_usize;
    let mut missing_count = 0_usize;

    for e in evaluations.iter().filter(|e| e.period == period) {
        let Some(grade) = grades.get(&e.id).copied().filter(|g| is_valid_grade(*g)) else {
            missing_count += 1;
            continue;
        };
        graded_count += 1;
        weighted_sum += grade * e.weight;
        weight_sum += e.weight;
    }

    let final_grade = if weight_sum > 0.0 {
        FinalGrade::Graded(round_off_2_decimals(weighted_sum / weight_sum))
    } else {
        FinalGrade::Pending
    };

    PeriodAggregate {
        final_grade,
        graded_count,
        missing_count,
        weight_covered: weight_sum,
    }
}

pub fn final_grade(
    evaluations: &[PlanEvaluation],
    period: i64,
    grades: &HashMap<String, f64>,
) -> FinalGrade {
    period_aggregate(evaluations, period, grades).final_grade
}

/// Mean of the period finals of one course. Pending until every period has
/// a final grade.
pub fn course_average(period_finals: &[FinalGrade]) -> FinalGrade {
    if period_finals.is_empty() {
        return FinalGrade::Pending;
    }
    let mut sum = 0.0_f64;
    for f in period_finals {
        match f {
            FinalGrade::Graded(v) => sum += v,
            FinalGrade::Pending => return FinalGrade::Pending,
        }
    }
    FinalGrade::Graded(round_off_2_decimals(sum / period_finals.len() as f64))
}

pub fn validate_weight(weight: f64) -> Result<(), CalcError> {
    if !weight.is_finite() || weight < WEIGHT_MIN || weight > PERIOD_WEIGHT_BUDGET {
        return Err(
            CalcError::new("validation_failed", "weight must be between 1 and 100")
                .with_details(serde_json::json!({ "weight": weight })),
        );
    }
    Ok(())
}

pub fn period_weight_total(
    evaluations: &[PlanEvaluation],
    period: i64,
    exclude_id: Option<&str>,
) -> f64 {
    evaluations
        .iter()
        .filter(|e| e.period == period)
        .filter(|e| exclude_id.map(|x| x != e.id).unwrap_or(true))
        .map(|e| e.weight)
        .sum()
}

/// Rejects an insert that would push the period past 100%.
/// Returns the period total including the new weight.
pub fn check_weight_budget(
    evaluations: &[PlanEvaluation],
    period: i64,
    new_weight: f64,
) -> Result<f64, CalcError> {
    let current = period_weight_total(evaluations, period, None);
    let total = current + new_weight;
    if total > PERIOD_WEIGHT_BUDGET {
        return Err(CalcError::new(
            "validation_failed",
            "total weight for the period exceeds 100%",
        )
        .with_details(serde_json::json!({
            "period": period,
            "currentTotal": current,
            "requested": new_weight,
        })));
    }
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn eval(id: &str, period: i64, weight: f64) -> PlanEvaluation {
        PlanEvaluation {
            id: id.to_string(),
            title: id.to_string(),
            period,
            weight,
        }
    }

    #[test]
    fn normalize_accepts_numbers_and_letters() {
        assert_eq!(normalize_grade_input("A").unwrap(), GradeInput::Set(20.0));
        assert_eq!(normalize_grade_input("e").unwrap(), GradeInput::Set(1.0));
        assert_eq!(normalize_grade_input("15").unwrap(), GradeInput::Set(15.0));
        assert_eq!(normalize_grade_input(" 12.5 ").unwrap(), GradeInput::Set(12.5));
        assert_eq!(normalize_grade_input("").unwrap(), GradeInput::Clear);
    }

    #[test]
    fn normalize_rejects_out_of_range_and_unknown_letters() {
        for raw in ["21", "0", "-3", "F", "AB", "NaN", "inf"] {
            let e = normalize_grade_input(raw).expect_err(raw);
            assert_eq!(e.code, "validation_failed", "{}", raw);
        }
    }

    #[test]
    fn normalize_json_values() {
        assert_eq!(
            normalize_grade_value(Some(&serde_json::json!(18))).unwrap(),
            GradeInput::Set(18.0)
        );
        assert_eq!(
            normalize_grade_value(Some(&serde_json::json!("b"))).unwrap(),
            GradeInput::Set(16.0)
        );
        assert_eq!(
            normalize_grade_value(Some(&serde_json::Value::Null)).unwrap(),
            GradeInput::Clear
        );
        assert!(normalize_grade_value(Some(&serde_json::json!(0))).is_err());
        assert_eq!(
            normalize_grade_value(None).map_err(|e| e.code).unwrap_err(),
            "bad_params"
        );
        assert_eq!(
            normalize_grade_value(Some(&serde_json::json!(true)))
                .unwrap_err()
                .code,
            "bad_params"
        );
    }

    #[test]
    fn exam_and_project_scenario() {
        let evals = vec![eval("examen-1", 1, 40.0), eval("proyecto-1", 1, 60.0)];
        let grades = HashMap::from([
            ("examen-1".to_string(), 18.0),
            ("proyecto-1".to_string(), 20.0),
        ]);
        let f = final_grade(&evals, 1, &grades);
        assert_eq!(f, FinalGrade::Graded(19.2));
        assert_eq!(f.display(), "19.20");
    }

    #[test]
    fn ungraded_period_is_pending() {
        let evals = vec![eval("exposicion", 3, 100.0)];
        let agg = period_aggregate(&evals, 3, &HashMap::new());
        assert_eq!(agg.final_grade, FinalGrade::Pending);
        assert_eq!(agg.missing_count, 1);
        assert_eq!(agg.final_grade.display(), "-");
    }

    #[test]
    fn partial_grades_average_over_recorded_only() {
        let evals = vec![eval("a", 1, 40.0), eval("b", 1, 60.0), eval("c", 2, 100.0)];
        let grades = HashMap::from([("a".to_string(), 15.0), ("c".to_string(), 5.0)]);
        let agg = period_aggregate(&evals, 1, &grades);
        assert_eq!(agg.final_grade, FinalGrade::Graded(15.0));
        assert_eq!(agg.graded_count, 1);
        assert_eq!(agg.missing_count, 1);
        assert_eq!(agg.weight_covered, 40.0);
    }

    #[test]
    fn stored_out_of_range_grade_is_skipped() {
        let evals = vec![eval("a", 1, 50.0), eval("b", 1, 50.0)];
        let grades = HashMap::from([("a".to_string(), 0.0), ("b".to_string(), 14.0)]);
        assert_eq!(final_grade(&evals, 1, &grades), FinalGrade::Graded(14.0));
    }

    #[test]
    fn weight_zero_contributes_nothing() {
        let evals = vec![eval("a", 1, 0.0)];
        let grades = HashMap::from([("a".to_string(), 18.0)]);
        assert_eq!(final_grade(&evals, 1, &grades), FinalGrade::Pending);
    }

    #[test]
    fn course_average_needs_every_period() {
        assert_eq!(
            course_average(&[
                FinalGrade::Graded(19.0),
                FinalGrade::Graded(19.0),
                FinalGrade::Graded(16.0)
            ]),
            FinalGrade::Graded(18.0)
        );
        assert_eq!(
            course_average(&[FinalGrade::Graded(19.2), FinalGrade::Pending]),
            FinalGrade::Pending
        );
        assert_eq!(course_average(&[]), FinalGrade::Pending);
    }

    #[test]
    fn weight_budget_rejects_overflow_per_period() {
        let evals = vec![eval("a", 1, 40.0), eval("b", 1, 60.0), eval("c", 2, 30.0)];
        assert!(check_weight_budget(&evals, 1, 1.0).is_err());
        assert_eq!(check_weight_budget(&evals, 2, 70.0).unwrap(), 100.0);
        assert_eq!(period_weight_total(&evals, 1, Some("a")), 60.0);
    }

    #[test]
    fn weight_range() {
        assert!(validate_weight(1.0).is_ok());
        assert!(validate_weight(100.0).is_ok());
        assert!(validate_weight(0.0).is_err());
        assert!(validate_weight(100.5).is_err());
    }

    #[test]
    fn final_grade_serializes_with_status() {
        assert_eq!(
            serde_json::to_value(FinalGrade::Graded(19.2)).unwrap(),
            serde_json::json!({ "status": "graded", "value": 19.2 })
        );
        assert_eq!(
            serde_json::to_value(FinalGrade::Pending).unwrap(),
            serde_json::json!({ "status": "pending" })
        );
    }

    proptest! {
        #[test]
        fn fully_graded_period_is_weighted_mean(
            cells in prop::collection::vec((1u32..=100, 1u32..=20), 1..8)
        ) {
            let mut evals = Vec::new();
            let mut grades = HashMap::new();
            let mut num = 0.0_f64;
            let mut den = 0.0_f64;
            for (i, (w, g)) in cells.iter().enumerate() {
                let id = format!("e{}", i);
                evals.push(eval(&id, 1, *w as f64));
                grades.insert(id, *g as f64);
                num += (*g as f64) * (*w as f64);
                den += *w as f64;
            }
            let got = final_grade(&evals, 1, &grades).value().expect("graded");
            prop_assert!((got - num / den).abs() <= 0.005 + 1e-9);
            prop_assert!((GRADE_MIN..=GRADE_MAX).contains(&got));
        }

        #[test]
        fn no_grades_never_produces_a_number(
            weights in prop::collection::vec(0u32..=100, 0..8)
        ) {
            let evals: Vec<PlanEvaluation> = weights
                .iter()
                .enumerate()
                .map(|(i, w)| eval(&format!("e{}", i), 1, *w as f64))
                .collect();
            prop_assert_eq!(final_grade(&evals, 1, &HashMap::new()), FinalGrade::Pending);
        }
    }
}
