//! Score reconciliation.
//!
//! The grading service returns a single number whose meaning is only fixed
//! by convention. Whatever the interpretation, the raw value is first turned
//! into a count of correct answers and every derived field is computed from
//! that count with one formula, so the result is always self-consistent:
//!
//! ```text
//! percentage      = round(correct / total_questions * 100)
//! normalized      = round(correct / total_questions * total_marks)
//! passed          = normalized >= passing_marks
//! ```

use serde::{Deserialize, Serialize};

use crate::error::ExamError;
use crate::model::{Assessment, SubmissionResult};

/// How to read the raw score returned by the grading service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreInterpretation {
    /// Number of correctly answered questions (the documented contract).
    #[default]
    CorrectCount,
    /// Percentage of correct answers, 0..=100.
    Percentage,
    /// Marks out of the assessment's total marks.
    Marks,
}

/// Turns raw grading values into [`SubmissionResult`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScoreReconciler {
    interpretation: ScoreInterpretation,
}

impl ScoreReconciler {
    pub fn new(interpretation: ScoreInterpretation) -> Self {
        Self { interpretation }
    }

    pub fn interpretation(&self) -> ScoreInterpretation {
        self.interpretation
    }

    /// Reconcile `raw` against `assessment`.
    ///
    /// Fails with `InconsistentScore` when `raw` is not a finite value inside
    /// the range its interpretation allows.
    pub fn normalize(
        &self,
        raw: f64,
        assessment: &Assessment,
    ) -> Result<SubmissionResult, ExamError> {
        let total_questions = assessment.questions.len() as u32;
        let max = match self.interpretation {
            ScoreInterpretation::CorrectCount => f64::from(total_questions),
            ScoreInterpretation::Percentage => 100.0,
            ScoreInterpretation::Marks => f64::from(assessment.total_marks),
        };
        if !raw.is_finite() || raw < 0.0 || raw > max {
            return Err(ExamError::InconsistentScore { raw, max });
        }
        // A count of correct answers is whole; anything else is a contract break.
        if self.interpretation == ScoreInterpretation::CorrectCount && raw.fract() != 0.0 {
            return Err(ExamError::InconsistentScore { raw, max });
        }

        let correct_answers = match self.interpretation {
            ScoreInterpretation::CorrectCount => raw,
            ScoreInterpretation::Percentage => (raw / 100.0 * f64::from(total_questions)).round(),
            ScoreInterpretation::Marks => {
                (raw / f64::from(assessment.total_marks) * f64::from(total_questions)).round()
            }
        } as u32;

        Ok(derive(
            correct_answers,
            total_questions,
            assessment.total_marks,
            assessment.passing_marks,
        ))
    }
}

/// The single formula every interpretation funnels into.
pub fn derive(
    correct_answers: u32,
    total_questions: u32,
    total_marks: u32,
    passing_marks: u32,
) -> SubmissionResult {
    let ratio = if total_questions == 0 {
        0.0
    } else {
        f64::from(correct_answers) / f64::from(total_questions)
    };
    let percentage = (ratio * 100.0).round() as u32;
    let normalized_score = (ratio * f64::from(total_marks)).round() as u32;

    SubmissionResult {
        correct_answers,
        total_questions,
        normalized_score,
        total_marks,
        percentage,
        passed: normalized_score >= passing_marks,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::EntityId;
    use crate::model::{Choice, Question};

    fn assessment(questions: usize, total_marks: u32, passing_marks: u32) -> Assessment {
        Assessment {
            id: EntityId::from(1),
            title: "scoring".into(),
            duration_minutes: 10,
            questions: (0..questions as i64)
                .map(|i| Question {
                    id: EntityId::from(i),
                    text: format!("q{i}"),
                    choices: vec![Choice {
                        id: EntityId::from(100 + i),
                        text: "c".into(),
                    }],
                })
                .collect(),
            total_marks,
            passing_marks,
        }
    }

    #[test]
    fn seven_of_ten_passes() {
        let result = ScoreReconciler::default()
            .normalize(7.0, &assessment(10, 100, 50))
            .unwrap();
        assert_eq!(result.correct_answers, 7);
        assert_eq!(result.total_questions, 10);
        assert_eq!(result.percentage, 70);
        assert_eq!(result.normalized_score, 70);
        assert_eq!(result.total_marks, 100);
        assert!(result.passed);
    }

    #[test]
    fn three_of_ten_fails() {
        let result = ScoreReconciler::default()
            .normalize(3.0, &assessment(10, 100, 50))
            .unwrap();
        assert_eq!(result.percentage, 30);
        assert!(!result.passed);
    }

    #[test]
    fn pass_mark_is_inclusive() {
        let result = ScoreReconciler::default()
            .normalize(5.0, &assessment(10, 100, 50))
            .unwrap();
        assert_eq!(result.normalized_score, 50);
        assert!(result.passed);
    }

    #[test]
    fn rounding_follows_half_up() {
        // 1/8 of 20 marks = 2.5 -> 3; 12.5% -> 13.
        let result = ScoreReconciler::default()
            .normalize(1.0, &assessment(8, 20, 3))
            .unwrap();
        assert_eq!(result.normalized_score, 3);
        assert_eq!(result.percentage, 13);
        assert!(result.passed);
    }

    #[test]
    fn out_of_range_scores_are_rejected() {
        let reconciler = ScoreReconciler::default();
        let exam = assessment(10, 100, 50);
        assert!(matches!(
            reconciler.normalize(70.0, &exam),
            Err(ExamError::InconsistentScore { .. })
        ));
        assert!(reconciler.normalize(-1.0, &exam).is_err());
        assert!(reconciler.normalize(f64::NAN, &exam).is_err());
    }

    #[test]
    fn fractional_correct_count_is_rejected() {
        let reconciler = ScoreReconciler::default();
        assert_eq!(reconciler.interpretation(), ScoreInterpretation::CorrectCount);
        assert_eq!(
            reconciler.normalize(4.5, &assessment(10, 100, 50)),
            Err(ExamError::InconsistentScore {
                raw: 4.5,
                max: 10.0
            })
        );

        let percent = ScoreReconciler::new(ScoreInterpretation::Percentage);
        assert_eq!(percent.interpretation(), ScoreInterpretation::Percentage);
        assert_eq!(
            percent
                .normalize(45.5, &assessment(10, 100, 50))
                .unwrap()
                .correct_answers,
            5
        );
    }

    #[test]
    fn other_interpretations_funnel_into_the_same_formula() {
        let exam = assessment(10, 40, 20);
        let from_count = ScoreReconciler::new(ScoreInterpretation::CorrectCount)
            .normalize(6.0, &exam)
            .unwrap();
        let from_percent = ScoreReconciler::new(ScoreInterpretation::Percentage)
            .normalize(60.0, &exam)
            .unwrap();
        let from_marks = ScoreReconciler::new(ScoreInterpretation::Marks)
            .normalize(24.0, &exam)
            .unwrap();
        assert_eq!(from_count, from_percent);
        assert_eq!(from_count, from_marks);
        assert_eq!(from_count.normalized_score, 24);
    }

    #[test]
    fn derived_fields_stay_consistent() {
        for total in 1..=12u32 {
            for marks in [1u32, 7, 50, 100, 250] {
                for correct in 0..=total {
                    let r = derive(correct, total, marks, marks / 2);
                    let ratio = f64::from(correct) / f64::from(total);
                    assert_eq!(r.percentage, (ratio * 100.0).round() as u32);
                    assert_eq!(r.normalized_score, (ratio * f64::from(marks)).round() as u32);
                    assert_eq!(r.passed, r.normalized_score >= marks / 2);
                    assert!(r.percentage <= 100);
                    assert!(r.normalized_score <= marks);
                }
            }
        }
    }
}
