use serde_json::{Map, Value};

use crate::models::{AnswerOption, ParsedQuizResult, QuizQuestion};
use crate::prompt_builder::option_letters;

pub const MIN_OPTIONS: usize = 2;
/// One option per letter `A`..=`Z`
pub const MAX_OPTIONS: usize = 26;

/// Accepted spellings for each output key; the first one is canonical.
const TOPIC: &[&str] = &["topic"];
const SUMMARY: &[&str] = &["summary", "sintesi"];
const QUESTIONS: &[&str] = &["questions", "questionario"];
const QUESTION_TEXT: &[&str] = &["question", "domanda"];
const OPTIONS: &[&str] = &["options", "risposte"];
const CORRECT: &[&str] = &["correct", "risposta_corretta"];
const EXPLANATION: &[&str] = &["explanation", "spiegazione"];

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ParseError {
    #[error("NoJsonFound")]
    NoJsonFound,

    #[error("InvalidJson: {0}")]
    InvalidJson(String),

    #[error("MissingField:{field}")]
    MissingField { field: String, question: Option<usize> },

    #[error("InvalidFieldType:{field}")]
    InvalidFieldType { field: String, question: Option<usize> },

    #[error("NoQuestions")]
    NoQuestions,

    #[error("InvalidOptions: question {question} has {found} options, expected between 2 and 26")]
    InvalidOptions { question: usize, found: usize },

    #[error("InvalidCorrectAnswerReference: question {question} names '{letter}', which is not one of its options")]
    InvalidCorrectAnswerReference { question: usize, letter: String },
}

impl ParseError {
    /// Machine-readable kind for logs and metrics
    pub fn kind(&self) -> &'static str {
        match self {
            ParseError::NoJsonFound => "NoJsonFound",
            ParseError::InvalidJson(_) => "InvalidJson",
            ParseError::MissingField { .. } => "MissingField",
            ParseError::InvalidFieldType { .. } => "InvalidFieldType",
            ParseError::NoQuestions => "NoQuestions",
            ParseError::InvalidOptions { .. } => "InvalidOptions",
            ParseError::InvalidCorrectAnswerReference { .. } => "InvalidCorrectAnswerReference",
        }
    }
}

/// Turns raw backend text into a [`ParsedQuizResult`].
///
/// Checks shape only, never content. Unlike request validation this stops at
/// the first violation.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResponseParser;

impl ResponseParser {
    /// Slice from the first `{` to the last `}`. A ```json fence is tried
    /// first; when it holds no brace pair the whole text is used.
    pub fn extract_json_from_response(content: &str) -> Option<&str> {
        fenced_block(content)
            .and_then(brace_span)
            .or_else(|| brace_span(content))
    }

    pub fn parse(raw_text: &str) -> Result<ParsedQuizResult, ParseError> {
        let json = Self::extract_json_from_response(raw_text).ok_or(ParseError::NoJsonFound)?;
        let value: Value =
            serde_json::from_str(json).map_err(|e| ParseError::InvalidJson(e.to_string()))?;
        Self::parse_value(&value)
    }

    pub fn parse_value(value: &Value) -> Result<ParsedQuizResult, ParseError> {
        let root = value.as_object().ok_or_else(|| ParseError::InvalidFieldType {
            field: "root".to_string(),
            question: None,
        })?;

        let topic = required_string(root, TOPIC, None)?;
        let summary = required_string(root, SUMMARY, None)?;

        let questions = match required(root, QUESTIONS, None)? {
            Value::Array(items) => items,
            _ => return Err(invalid_type(QUESTIONS, None)),
        };
        if questions.is_empty() {
            return Err(ParseError::NoQuestions);
        }

        let questions = questions
            .iter()
            .enumerate()
            .map(|(index, item)| parse_question(index, item))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(ParsedQuizResult {
            topic,
            summary,
            questions,
            image_url: None,
        })
    }
}

fn parse_question(index: usize, value: &Value) -> Result<QuizQuestion, ParseError> {
    let fields = value
        .as_object()
        .ok_or_else(|| invalid_type(QUESTIONS, Some(index)))?;

    let question = required_string(fields, QUESTION_TEXT, Some(index))?;

    let options = match required(fields, OPTIONS, Some(index))? {
        Value::Object(map) => map
            .iter()
            .map(|(letter, text)| {
                option_text(text, index).map(|text| AnswerOption {
                    letter: letter.trim().to_string(),
                    text,
                })
            })
            .collect::<Result<Vec<_>, _>>()?,
        // A bare list gets letters assigned in order
        Value::Array(items) if items.len() > MAX_OPTIONS => {
            return Err(ParseError::InvalidOptions {
                question: index,
                found: items.len(),
            })
        }
        Value::Array(items) => option_letters(items.len() as u32)
            .into_iter()
            .zip(items)
            .map(|(letter, text)| option_text(text, index).map(|text| AnswerOption { letter, text }))
            .collect::<Result<Vec<_>, _>>()?,
        _ => return Err(invalid_type(OPTIONS, Some(index))),
    };
    if !(MIN_OPTIONS..=MAX_OPTIONS).contains(&options.len()) {
        return Err(ParseError::InvalidOptions {
            question: index,
            found: options.len(),
        });
    }

    let correct = resolve_correct(required(fields, CORRECT, Some(index))?, &options, index)?;

    let explanation = match lookup(fields, EXPLANATION) {
        None | Some(Value::Null) => None,
        Some(Value::String(text)) => Some(text.clone()),
        Some(_) => return Err(invalid_type(EXPLANATION, Some(index))),
    };

    Ok(QuizQuestion {
        question,
        options,
        correct,
        explanation,
    })
}

/// The correct answer must name one of the question's option letters.
/// A numeric index into the option list is also accepted.
fn resolve_correct(value: &Value, options: &[AnswerOption], index: usize) -> Result<String, ParseError> {
    let wanted = match value {
        Value::String(letter) => letter.trim().to_string(),
        Value::Number(n) => match n.as_u64().and_then(|i| options.get(i as usize)) {
            Some(option) => return Ok(option.letter.clone()),
            None => {
                return Err(ParseError::InvalidCorrectAnswerReference {
                    question: index,
                    letter: n.to_string(),
                })
            }
        },
        _ => return Err(invalid_type(CORRECT, Some(index))),
    };

    options
        .iter()
        .find(|o| o.letter == wanted)
        .or_else(|| options.iter().find(|o| o.letter.eq_ignore_ascii_case(&wanted)))
        .map(|o| o.letter.clone())
        .ok_or_else(|| ParseError::InvalidCorrectAnswerReference {
            question: index,
            letter: wanted.clone(),
        })
}

fn option_text(value: &Value, index: usize) -> Result<String, ParseError> {
    match value {
        Value::String(text) => Ok(text.clone()),
        Value::Number(n) => Ok(n.to_string()),
        _ => Err(invalid_type(OPTIONS, Some(index))),
    }
}

fn brace_span(scope: &str) -> Option<&str> {
    let start = scope.find('{')?;
    let end = scope.rfind('}')?;
    (end > start).then(|| &scope[start..=end])
}

fn fenced_block(content: &str) -> Option<&str> {
    let start = content.find("```json")? + "```json".len();
    let end = content[start..].find("```")?;
    Some(&content[start..start + end])
}

fn lookup<'a>(fields: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().find_map(|key| fields.get(*key))
}

fn required<'a>(
    fields: &'a Map<String, Value>,
    keys: &[&str],
    question: Option<usize>,
) -> Result<&'a Value, ParseError> {
    lookup(fields, keys).ok_or_else(|| ParseError::MissingField {
        field: keys[0].to_string(),
        question,
    })
}

fn required_string(
    fields: &Map<String, Value>,
    keys: &[&str],
    question: Option<usize>,
) -> Result<String, ParseError> {
    match required(fields, keys, question)? {
        Value::String(text) => Ok(text.clone()),
        _ => Err(invalid_type(keys, question)),
    }
}

fn invalid_type(keys: &[&str], question: Option<usize>) -> ParseError {
    ParseError::InvalidFieldType {
        field: keys[0].to_string(),
        question,
    }
}
