//! Assessment payload parser.
//!
//! Turns loosely-shaped JSON from any source into a validated
//! [`Assessment`]: structural problems are rejected, optional fields fall
//! back to defaults, and unusable questions and choices are filtered out.

use serde_json::{Map, Value};

use crate::error::ExamError;
use crate::ids::EntityId;
use crate::model::{
    Assessment, Choice, Question, DEFAULT_DURATION_MINUTES, DEFAULT_PASSING_MARKS,
    DEFAULT_TOTAL_MARKS,
};

const DURATION_KEYS: &[&str] = &["duration", "duration_minutes", "durationMinutes"];
const TOTAL_MARKS_KEYS: &[&str] = &["total_marks", "totalMarks"];
const PASSING_MARKS_KEYS: &[&str] = &["passing_marks", "passingMarks"];
const QUESTION_TEXT_KEYS: &[&str] = &["text", "question"];
const CHOICE_LIST_KEYS: &[&str] = &["choices", "options"];
const CHOICE_TEXT_KEYS: &[&str] = &["text", "choice"];

/// Take the resource out of a `{result, data|message}` envelope.
///
/// `data` wins when present and non-null; otherwise `message` is used. A
/// value without either key is returned unchanged.
pub fn unwrap_envelope(body: Value) -> Value {
    match body {
        Value::Object(mut map) if map.contains_key("data") || map.contains_key("message") => {
            match map.remove("data") {
                Some(data) if !data.is_null() => data,
                _ => map.remove("message").unwrap_or(Value::Null),
            }
        }
        other => other,
    }
}

/// Validate a raw payload into an assessment.
pub fn parse_assessment(payload: &Value) -> Result<Assessment, ExamError> {
    let obj = match payload {
        Value::Object(obj) => obj,
        Value::String(s) => {
            return Err(ExamError::InvalidSchema(format!(
                "expected an assessment object, got a bare string ({s:?})"
            )))
        }
        other => {
            return Err(ExamError::InvalidSchema(format!(
                "expected an assessment object, got {}",
                json_kind(other)
            )))
        }
    };

    let id = obj
        .get("id")
        .and_then(EntityId::from_json)
        .ok_or_else(|| ExamError::InvalidSchema("assessment must set id".into()))?;
    let title = text_field(obj, &["title"])
        .ok_or_else(|| ExamError::InvalidSchema(format!("assessment {id} must set title")))?;

    let duration_minutes = positive_field(obj, DURATION_KEYS).unwrap_or(DEFAULT_DURATION_MINUTES);
    let total_marks = positive_field(obj, TOTAL_MARKS_KEYS).unwrap_or(DEFAULT_TOTAL_MARKS);
    let mut passing_marks =
        number_field(obj, PASSING_MARKS_KEYS).unwrap_or(DEFAULT_PASSING_MARKS);
    if passing_marks > total_marks {
        tracing::warn!(
            assessment = %id,
            passing_marks,
            total_marks,
            "pass mark exceeds total marks, clamping"
        );
        passing_marks = total_marks;
    }

    let raw_questions = obj.get("questions").and_then(Value::as_array);
    let questions: Vec<Question> = raw_questions
        .map(|list| list.iter().filter_map(parse_question).collect())
        .unwrap_or_default();

    let offered = raw_questions.map_or(0, Vec::len);
    if questions.len() < offered {
        tracing::warn!(
            assessment = %id,
            dropped = offered - questions.len(),
            "dropped unusable questions"
        );
    }
    if questions.is_empty() {
        return Err(ExamError::NoValidQuestions(id));
    }

    Ok(Assessment {
        id,
        title,
        duration_minutes,
        questions,
        total_marks,
        passing_marks,
    })
}

/// Search a learner context payload for an embedded assessment.
///
/// Walks nested arrays and objects depth-first and returns the first object
/// whose `id` matches and that carries a `questions` key, so a course or
/// lesson sharing the numeric id is not mistaken for the exam.
pub fn find_in_context<'a>(context: &'a Value, id: &EntityId) -> Option<&'a Value> {
    match context {
        Value::Object(map) => {
            let is_match = map.contains_key("questions")
                && map.get("id").is_some_and(|v| id.matches_json(v));
            if is_match {
                return Some(context);
            }
            map.values().find_map(|v| find_in_context(v, id))
        }
        Value::Array(items) => items.iter().find_map(|v| find_in_context(v, id)),
        _ => None,
    }
}

fn parse_question(value: &Value) -> Option<Question> {
    let obj = value.as_object()?;
    let id = obj.get("id").and_then(EntityId::from_json)?;
    let text = text_field(obj, QUESTION_TEXT_KEYS)?;
    let raw_choices = CHOICE_LIST_KEYS
        .iter()
        .find_map(|k| obj.get(*k).and_then(Value::as_array))?;

    let choices: Vec<Choice> = raw_choices.iter().filter_map(parse_choice).collect();
    if choices.is_empty() {
        tracing::debug!(question = %id, "question has no usable choices");
        return None;
    }

    Some(Question { id, text, choices })
}

// Correctness flags in the payload are deliberately not read.
fn parse_choice(value: &Value) -> Option<Choice> {
    let obj = value.as_object()?;
    let id = obj.get("id").and_then(EntityId::from_json)?;
    let text = text_field(obj, CHOICE_TEXT_KEYS)?;
    Some(Choice { id, text })
}

fn text_field(obj: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|k| {
        obj.get(*k)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    })
}

/// Read a non-negative whole number from a number or numeric string.
fn number_field(obj: &Map<String, Value>, keys: &[&str]) -> Option<u32> {
    keys.iter().find_map(|k| {
        let raw = match obj.get(*k)? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        }?;
        if raw.is_finite() && raw >= 0.0 && raw <= f64::from(u32::MAX) {
            Some(raw.round() as u32)
        } else {
            None
        }
    })
}

fn positive_field(obj: &Map<String, Value>, keys: &[&str]) -> Option<u32> {
    number_field(obj, keys).filter(|n| *n > 0)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn full_payload() -> Value {
        json!({
            "id": 7,
            "title": "Ownership quiz",
            "duration": 15,
            "total_marks": 20,
            "passing_marks": 12,
            "questions": [
                {
                    "id": 1,
                    "text": "Who owns a moved value?",
                    "choices": [
                        {"id": 10, "text": "The receiver", "is_correct": true},
                        {"id": 11, "text": "Nobody"}
                    ]
                },
                {
                    "id": "q2",
                    "question": "Is Copy implied by Clone?",
                    "options": [{"id": "a", "choice": "yes"}, {"id": "b", "choice": "no"}]
                }
            ]
        })
    }

    #[test]
    fn parses_complete_payload() {
        let assessment = parse_assessment(&full_payload()).unwrap();
        assert_eq!(assessment.id, EntityId::from(7));
        assert_eq!(assessment.title, "Ownership quiz");
        assert_eq!(assessment.duration_minutes, 15);
        assert_eq!(assessment.total_marks, 20);
        assert_eq!(assessment.passing_marks, 12);
        assert_eq!(assessment.questions.len(), 2);
        assert_eq!(assessment.questions[1].choices[1].text, "no");
    }

    #[test]
    fn correctness_flags_never_reach_the_model() {
        let assessment = parse_assessment(&full_payload()).unwrap();
        let serialized = serde_json::to_string(&assessment).unwrap();
        assert!(!serialized.contains("is_correct"));
    }

    #[test]
    fn bare_string_is_invalid_schema() {
        let err = parse_assessment(&json!("Exam fetched successfully")).unwrap_err();
        assert!(matches!(err, ExamError::InvalidSchema(_)));

        let err = parse_assessment(&json!([1, 2])).unwrap_err();
        assert!(matches!(err, ExamError::InvalidSchema(_)));
    }

    #[test]
    fn missing_id_or_title_is_invalid_schema() {
        let err = parse_assessment(&json!({"title": "No id"})).unwrap_err();
        assert!(matches!(err, ExamError::InvalidSchema(_)));

        let err = parse_assessment(&json!({"id": 1, "title": "  "})).unwrap_err();
        assert!(matches!(err, ExamError::InvalidSchema(_)));
    }

    #[test]
    fn optional_fields_default() {
        let payload = json!({
            "id": "exam-1",
            "title": "Defaults",
            "duration": "not a number",
            "total_marks": 0,
            "questions": [{"id": 1, "text": "q", "choices": [{"id": 1, "text": "c"}]}]
        });
        let assessment = parse_assessment(&payload).unwrap();
        assert_eq!(assessment.duration_minutes, 60);
        assert_eq!(assessment.total_marks, 100);
        assert_eq!(assessment.passing_marks, 50);
    }

    #[test]
    fn pass_mark_is_clamped_to_total_marks() {
        let payload = json!({
            "id": 4,
            "title": "Unpassable",
            "total_marks": 50,
            "passing_marks": 80,
            "questions": [{"id": 1, "text": "q", "choices": [{"id": 1, "text": "c"}]}]
        });
        let assessment = parse_assessment(&payload).unwrap();
        assert_eq!(assessment.total_marks, 50);
        assert_eq!(assessment.passing_marks, 50);

        let payload = json!({
            "id": 5,
            "title": "Small default",
            "total_marks": 20,
            "questions": [{"id": 1, "text": "q", "choices": [{"id": 1, "text": "c"}]}]
        });
        assert_eq!(parse_assessment(&payload).unwrap().passing_marks, 20);
    }

    #[test]
    fn numeric_strings_are_accepted() {
        let payload = json!({
            "id": 3,
            "title": "Strings",
            "durationMinutes": "45",
            "totalMarks": "40",
            "passingMarks": "20",
            "questions": [{"id": 1, "text": "q", "choices": [{"id": 1, "text": "c"}]}]
        });
        let assessment = parse_assessment(&payload).unwrap();
        assert_eq!(assessment.duration_minutes, 45);
        assert_eq!(assessment.total_marks, 40);
        assert_eq!(assessment.passing_marks, 20);
    }

    #[test]
    fn unusable_questions_and_choices_are_dropped() {
        let payload = json!({
            "id": 9,
            "title": "Filtering",
            "questions": [
                {"text": "no id", "choices": [{"id": 1, "text": "c"}]},
                {"id": 2, "choices": [{"id": 1, "text": "c"}]},
                {"id": 3, "text": "no choices"},
                {"id": 4, "text": "only broken choices", "choices": [{"id": 1}, {"text": "x"}]},
                {"id": 5, "text": "kept", "choices": [{"id": 1}, {"id": 2, "text": "ok"}]},
                "not even an object"
            ]
        });
        let assessment = parse_assessment(&payload).unwrap();
        assert_eq!(assessment.questions.len(), 1);
        assert_eq!(assessment.questions[0].id, EntityId::from(5));
        assert_eq!(assessment.questions[0].choices.len(), 1);
    }

    #[test]
    fn zero_usable_questions_fails() {
        let payload = json!({
            "id": 4,
            "title": "Empty",
            "questions": [{"id": 1, "text": "broken", "choices": []}]
        });
        assert_eq!(
            parse_assessment(&payload).unwrap_err(),
            ExamError::NoValidQuestions(EntityId::from(4))
        );

        let payload = json!({"id": 4, "title": "No list"});
        assert!(matches!(
            parse_assessment(&payload),
            Err(ExamError::NoValidQuestions(_))
        ));
    }

    #[test]
    fn envelope_prefers_data_then_message() {
        let body = json!({"result": true, "data": {"id": 1}, "message": "ok"});
        assert_eq!(unwrap_envelope(body), json!({"id": 1}));

        let body = json!({"result": true, "data": null, "message": {"id": 2}});
        assert_eq!(unwrap_envelope(body), json!({"id": 2}));

        let body = json!({"result": false, "message": "Exam not available"});
        assert_eq!(unwrap_envelope(body), json!("Exam not available"));

        let body = json!({"id": 3, "title": "naked"});
        assert_eq!(unwrap_envelope(body.clone()), body);
    }

    #[test]
    fn context_search_walks_nested_collections() {
        let context = json!({
            "user": {"id": 12, "name": "learner"},
            "courses": [
                {"id": 7, "title": "Course seven", "lessons": []},
                {
                    "id": 8,
                    "modules": [{"exams": [{"id": 7, "title": "Exam seven", "questions": []}]}]
                }
            ]
        });
        let found = find_in_context(&context, &EntityId::from("7")).unwrap();
        assert_eq!(found["title"], "Exam seven");
        assert!(find_in_context(&context, &EntityId::from(99)).is_none());
    }
}
