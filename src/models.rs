use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Beginner,
    Intermediate,
    Advanced,
    Expert,
}

impl Difficulty {
    pub const ALL: [Difficulty; 4] = [
        Difficulty::Beginner,
        Difficulty::Intermediate,
        Difficulty::Advanced,
        Difficulty::Expert,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Beginner => "beginner",
            Difficulty::Intermediate => "intermediate",
            Difficulty::Advanced => "advanced",
            Difficulty::Expert => "expert",
        }
    }

    /// Audience description embedded in the prompt next to the level name
    pub fn description(&self) -> &'static str {
        match self {
            Difficulty::Beginner => "suitable for beginners with basic knowledge",
            Difficulty::Intermediate => "for learners with some existing knowledge",
            Difficulty::Advanced => "challenging questions for experienced learners",
            Difficulty::Expert => "complex questions for experts in the field",
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Difficulty {
    type Err = ();

    /// Case-insensitive, surrounding whitespace ignored
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|d| d.as_str() == wanted)
            .ok_or(())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Italian,
    English,
    French,
    Spanish,
    German,
}

impl Language {
    pub const ALL: [Language; 5] = [
        Language::Italian,
        Language::English,
        Language::French,
        Language::Spanish,
        Language::German,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Language::Italian => "italian",
            Language::English => "english",
            Language::French => "french",
            Language::Spanish => "spanish",
            Language::German => "german",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Language {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|l| l.as_str() == wanted)
            .ok_or(())
    }
}

/// A sanitized quiz request. Only the validator constructs one from raw input,
/// so every instance is within bounds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizRequest {
    pub topic: String,
    pub difficulty: Difficulty,
    pub question_count: u32,
    pub language: Language,
    pub include_explanations: bool,
    pub answers_per_question: u32,
}

/// Result of validating a raw request: either a sanitized value or a
/// non-empty list of human-readable errors.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationOutcome {
    Valid(QuizRequest),
    Invalid(Vec<String>),
}

impl ValidationOutcome {
    pub fn is_valid(&self) -> bool {
        matches!(self, ValidationOutcome::Valid(_))
    }

    pub fn errors(&self) -> &[String] {
        match self {
            ValidationOutcome::Valid(_) => &[],
            ValidationOutcome::Invalid(errors) => errors,
        }
    }

    pub fn sanitized_value(&self) -> Option<&QuizRequest> {
        match self {
            ValidationOutcome::Valid(request) => Some(request),
            ValidationOutcome::Invalid(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnswerOption {
    pub letter: String,
    pub text: String,
}

/// One generated question. `options` keeps the order the backend listed them in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizQuestion {
    pub question: String,
    #[serde(with = "options_map")]
    pub options: Vec<AnswerOption>,
    pub correct: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
}

impl QuizQuestion {
    pub fn option(&self, letter: &str) -> Option<&AnswerOption> {
        self.options.iter().find(|o| o.letter == letter)
    }

    pub fn correct_option(&self) -> Option<&AnswerOption> {
        self.option(&self.correct)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedQuizResult {
    pub topic: String,
    pub summary: String,
    pub questions: Vec<QuizQuestion>,
    /// Topic illustration, attached after parsing
    #[serde(rename = "imageUrl", default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

/// Serializes answer options as a JSON object (`{"A": "...", "B": "..."}`)
/// while keeping them as an ordered list in memory.
mod options_map {
    use super::AnswerOption;
    use serde::de::{MapAccess, Visitor};
    use serde::{Deserializer, Serializer};
    use std::fmt;

    pub fn serialize<S>(options: &[AnswerOption], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_map(options.iter().map(|o| (&o.letter, &o.text)))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<AnswerOption>, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct OptionsVisitor;

        impl<'de> Visitor<'de> for OptionsVisitor {
            type Value = Vec<AnswerOption>;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of option letters to option text")
            }

            fn visit_map<A>(self, mut access: A) -> Result<Self::Value, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut options = Vec::with_capacity(access.size_hint().unwrap_or(4));
                while let Some((letter, text)) = access.next_entry::<String, String>()? {
                    options.push(AnswerOption { letter, text });
                }
                Ok(options)
            }
        }

        deserializer.deserialize_map(OptionsVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_question() -> QuizQuestion {
        QuizQuestion {
            question: "Which gas do plants absorb?".to_string(),
            options: vec![
                AnswerOption { letter: "B".to_string(), text: "Oxygen".to_string() },
                AnswerOption { letter: "A".to_string(), text: "Carbon dioxide".to_string() },
            ],
            correct: "A".to_string(),
            explanation: None,
        }
    }

    #[test]
    fn test_enum_parsing_is_case_insensitive() {
        assert_eq!("ADVANCED".parse::<Difficulty>(), Ok(Difficulty::Advanced));
        assert_eq!(" German ".parse::<Language>(), Ok(Language::German));
        assert!("portuguese".parse::<Language>().is_err());
        assert!("easy".parse::<Difficulty>().is_err());
    }

    #[test]
    fn test_options_serialize_in_display_order() {
        let json = serde_json::to_string(&sample_question()).unwrap();
        let b = json.find("\"B\"").unwrap();
        let a = json.find("\"A\"").unwrap();
        assert!(b < a, "insertion order must survive serialization: {}", json);
        assert!(!json.contains("explanation"));
    }

    #[test]
    fn test_correct_option_lookup() {
        let question = sample_question();
        assert_eq!(question.correct_option().unwrap().text, "Carbon dioxide");
        assert!(question.option("C").is_none());
    }

    #[test]
    fn test_validation_outcome_accessors() {
        let invalid = ValidationOutcome::Invalid(vec!["Topic cannot be empty".to_string()]);
        assert!(!invalid.is_valid());
        assert_eq!(invalid.errors().len(), 1);
        assert!(invalid.sanitized_value().is_none());
    }
}
