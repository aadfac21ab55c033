use regex::Regex;
use serde_json::{Map, Value};
use std::sync::LazyLock;

use crate::log_validation;
use crate::models::{Difficulty, Language, QuizRequest, ValidationOutcome};

pub const MIN_TOPIC_LENGTH: usize = 3;
pub const MAX_TOPIC_LENGTH: usize = 200;
pub const MIN_QUESTIONS: i64 = 1;
pub const MIN_ANSWERS_PER_QUESTION: i64 = 2;
pub const DEFAULT_ANSWERS_PER_QUESTION: u32 = 4;

const TOPIC_KEYS: &[&str] = &["topic"];
const DIFFICULTY_KEYS: &[&str] = &["difficulty"];
const QUESTION_COUNT_KEYS: &[&str] = &["questionCount", "questions", "num_of_questions"];
const LANGUAGE_KEYS: &[&str] = &["language"];
const ANSWER_COUNT_KEYS: &[&str] = &["answersPerQuestion", "num_of_replies"];
const EXPLANATION_KEYS: &[&str] = &["includeExplanations"];

/// Case-insensitive substrings that reject a topic outright
const HARMFUL_TERMS: &[&str] = &[
    "script",
    "javascript:",
    "eval(",
    "document.",
    "window.",
    "alert(",
    "prompt(",
    "confirm(",
    "onclick",
    "onerror",
    "onload",
];

static SCRIPT_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<script.*?</script>").expect("valid script regex"));
static HTML_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[^>]*>").expect("valid tag regex"));
static JS_SCHEME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)javascript:").expect("valid scheme regex"));
static WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("valid whitespace regex"));

/// A field held a JSON type that cannot be interpreted at all
/// (e.g. an array where a topic string was expected).
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("InvalidInputType: field '{field}' cannot be a JSON {found}")]
pub struct InvalidInputType {
    pub field: String,
    pub found: &'static str,
}

impl InvalidInputType {
    fn new(field: &str, value: &Value) -> Self {
        Self {
            field: field.to_string(),
            found: json_type_name(value),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidationLimits {
    pub max_questions: u32,
    pub max_answers: u32,
}

impl Default for ValidationLimits {
    fn default() -> Self {
        Self {
            max_questions: 50,
            max_answers: 10,
        }
    }
}

/// Checks raw quiz requests and produces sanitized [`QuizRequest`]s.
///
/// Every rule is evaluated and all violations are reported together; the
/// validator never stops at the first problem.
#[derive(Debug, Clone, Default)]
pub struct RequestValidator {
    limits: ValidationLimits,
}

impl RequestValidator {
    pub fn new(limits: ValidationLimits) -> Self {
        Self { limits }
    }

    pub fn validate(&self, raw: &Value) -> Result<ValidationOutcome, InvalidInputType> {
        let Some(fields) = raw.as_object() else {
            return Err(InvalidInputType::new("request", raw));
        };

        let mut errors = Vec::new();

        let topic = match lookup(fields, TOPIC_KEYS) {
            Some(value) => validate_topic(value, &mut errors)?,
            None => missing("topic", &mut errors),
        };
        let difficulty = match lookup(fields, DIFFICULTY_KEYS) {
            Some(value) => validate_enum::<Difficulty>(value, "Difficulty", &difficulty_names(), &mut errors),
            None => missing("difficulty", &mut errors),
        };
        let question_count = match lookup(fields, QUESTION_COUNT_KEYS) {
            Some(value) => validate_count(
                value,
                "Question count",
                MIN_QUESTIONS,
                i64::from(self.limits.max_questions),
                &mut errors,
            ),
            None => missing("questionCount", &mut errors),
        };
        let language = match lookup(fields, LANGUAGE_KEYS) {
            Some(value) => validate_enum::<Language>(value, "Language", &language_names(), &mut errors),
            None => missing("language", &mut errors),
        };

        let answers_per_question = match lookup(fields, ANSWER_COUNT_KEYS) {
            Some(Value::Null) | None => Some(DEFAULT_ANSWERS_PER_QUESTION),
            Some(value) => validate_count(
                value,
                "Answers per question",
                MIN_ANSWERS_PER_QUESTION,
                i64::from(self.limits.max_answers),
                &mut errors,
            ),
        };
        let include_explanations = lookup(fields, EXPLANATION_KEYS)
            .map(coerce_bool)
            .unwrap_or(true);

        let outcome = match (topic, difficulty, question_count, language, answers_per_question) {
            (Some(topic), Some(difficulty), Some(question_count), Some(language), Some(answers))
                if errors.is_empty() =>
            {
                ValidationOutcome::Valid(QuizRequest {
                    topic,
                    difficulty,
                    question_count,
                    language,
                    include_explanations,
                    answers_per_question: answers,
                })
            }
            _ => ValidationOutcome::Invalid(errors),
        };

        match &outcome {
            ValidationOutcome::Valid(request) => {
                log_validation!(success, "quiz_request", format!("topic '{}' accepted", request.topic));
            }
            ValidationOutcome::Invalid(errors) => {
                log_validation!(failure, "quiz_request", error = errors.join("; "));
            }
        }

        Ok(outcome)
    }
}

/// Strip script blocks and HTML-like tags, drop `javascript:` schemes and
/// collapse runs of whitespace into single spaces.
pub fn sanitize_text(text: &str) -> String {
    let text = SCRIPT_BLOCK.replace_all(text, "");
    let text = HTML_TAG.replace_all(&text, "");
    let text = JS_SCHEME.replace_all(&text, "");
    WHITESPACE.replace_all(&text, " ").trim().to_string()
}

pub fn contains_harmful_content(text: &str) -> bool {
    let lowered = text.to_lowercase();
    HARMFUL_TERMS.iter().any(|term| lowered.contains(term))
}

fn validate_topic(value: &Value, errors: &mut Vec<String>) -> Result<Option<String>, InvalidInputType> {
    let text = match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Null => String::new(),
        other => return Err(InvalidInputType::new("topic", other)),
    };

    if text.trim().is_empty() {
        errors.push("Topic cannot be empty".to_string());
        return Ok(None);
    }

    let before = errors.len();

    if contains_harmful_content(&text) {
        errors.push("Topic contains inappropriate content".to_string());
    }

    let sanitized = sanitize_text(&text);
    let length = sanitized.chars().count();
    if sanitized.is_empty() {
        errors.push("Topic cannot be empty".to_string());
    } else if length < MIN_TOPIC_LENGTH {
        errors.push(format!("Topic must be at least {} characters long", MIN_TOPIC_LENGTH));
    } else if length > MAX_TOPIC_LENGTH {
        errors.push(format!("Topic cannot exceed {} characters", MAX_TOPIC_LENGTH));
    }

    Ok((errors.len() == before).then_some(sanitized))
}

fn validate_enum<T: std::str::FromStr>(
    value: &Value,
    label: &str,
    allowed: &str,
    errors: &mut Vec<String>,
) -> Option<T> {
    match value {
        Value::String(s) if s.trim().is_empty() => {
            errors.push(format!("{} cannot be empty", label));
            None
        }
        Value::String(s) => match s.parse::<T>() {
            Ok(parsed) => Some(parsed),
            Err(_) => {
                errors.push(format!("{} must be one of: {}", label, allowed));
                None
            }
        },
        Value::Null => {
            errors.push(format!("{} cannot be empty", label));
            None
        }
        _ => {
            errors.push(format!("{} must be a string", label));
            None
        }
    }
}

fn validate_count(value: &Value, label: &str, min: i64, max: i64, errors: &mut Vec<String>) -> Option<u32> {
    let Some(count) = coerce_integer(value) else {
        errors.push(format!("{} must be a valid number", label));
        return None;
    };

    if count < min || count > max {
        errors.push(format!("{} must be between {} and {}", label, min, max));
        return None;
    }

    u32::try_from(count).ok()
}

fn coerce_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0 && f.is_finite()).map(|f| f as i64)),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}

fn coerce_bool(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !matches!(s.trim().to_lowercase().as_str(), "" | "false" | "0" | "no"),
        Value::Null => false,
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

fn missing<T>(field: &str, errors: &mut Vec<String>) -> Option<T> {
    errors.push(format!("Missing required field: {}", field));
    None
}

fn lookup<'a>(fields: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().find_map(|key| fields.get(*key))
}

fn difficulty_names() -> String {
    Difficulty::ALL.iter().map(|d| d.as_str()).collect::<Vec<_>>().join(", ")
}

fn language_names() -> String {
    Language::ALL.iter().map(|l| l.as_str()).collect::<Vec<_>>().join(", ")
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
