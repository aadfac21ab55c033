use serde_json::{json, Map, Value};
use sha2::{Digest, Sha256};

use crate::models::{Language, QuizRequest};

/// Number of hex characters of the SHA-256 digest used as a cache key
pub const PROMPT_HASH_LENGTH: usize = 16;

pub const SYSTEM_MESSAGE: &str = "You are a teacher writing educational multiple-choice quizzes. Always respond with valid JSON in the exact requested format.";

/// Localized phrasing for one response language.
#[derive(Debug)]
pub struct LanguageTemplate {
    pub language: Language,
    /// Opening sentence; `{topic}` and `{count}` are substituted
    intro: &'static str,
    response_instruction: &'static str,
    one_question: &'static str,
    /// `{n}` is substituted with the literal question count
    many_questions: &'static str,
    summary_instruction: &'static str,
}

static ENGLISH: LanguageTemplate = LanguageTemplate {
    language: Language::English,
    intro: "Create an educational quiz about \"{topic}\" with {count}.",
    response_instruction: "Respond in English",
    one_question: "one question",
    many_questions: "{n} questions",
    summary_instruction: "Before the questions, write a summary of the topic of about 300 words.",
};

static ITALIAN: LanguageTemplate = LanguageTemplate {
    language: Language::Italian,
    intro: "Genera un quiz educativo sull'argomento \"{topic}\" con {count}.",
    response_instruction: "Rispondi in italiano",
    one_question: "una domanda",
    many_questions: "{n} domande",
    summary_instruction: "Prima delle domande, scrivi una sintesi dell'argomento di circa 300 parole.",
};

static FRENCH: LanguageTemplate = LanguageTemplate {
    language: Language::French,
    intro: "Crée un quiz éducatif sur le sujet \"{topic}\" avec {count}.",
    response_instruction: "Répondez en français",
    one_question: "une question",
    many_questions: "{n} questions",
    summary_instruction: "Avant les questions, rédigez une synthèse du sujet d'environ 300 mots.",
};

static SPANISH: LanguageTemplate = LanguageTemplate {
    language: Language::Spanish,
    intro: "Crea un cuestionario educativo sobre el tema \"{topic}\" con {count}.",
    response_instruction: "Responde en español",
    one_question: "una pregunta",
    many_questions: "{n} preguntas",
    summary_instruction: "Antes de las preguntas, escribe un resumen del tema de unas 300 palabras.",
};

static GERMAN: LanguageTemplate = LanguageTemplate {
    language: Language::German,
    intro: "Erstelle ein Lern-Quiz zum Thema \"{topic}\" mit {count}.",
    response_instruction: "Antworten Sie auf Deutsch",
    one_question: "einer Frage",
    many_questions: "{n} Fragen",
    summary_instruction: "Schreiben Sie vor den Fragen eine Zusammenfassung des Themas mit etwa 300 Wörtern.",
};

static TEMPLATES: &[&LanguageTemplate] = &[&ITALIAN, &ENGLISH, &FRENCH, &SPANISH, &GERMAN];

impl LanguageTemplate {
    pub fn question_phrase(&self, count: u32) -> String {
        if count == 1 {
            self.one_question.to_string()
        } else {
            self.many_questions.replace("{n}", &count.to_string())
        }
    }
}

/// Renders validated requests into backend prompts.
///
/// Rendering is a pure function of the request: the prompt text feeds the
/// cache key, so identical requests must produce byte-identical prompts.
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    default_language: Language,
}

impl Default for PromptBuilder {
    fn default() -> Self {
        Self::new(Language::English)
    }
}

impl PromptBuilder {
    pub fn new(default_language: Language) -> Self {
        Self { default_language }
    }

    /// Template lookup; a language without a template uses the default
    /// language's, and English if that is missing too.
    pub fn template_for(&self, language: Language) -> &'static LanguageTemplate {
        find_template(language)
            .or_else(|| find_template(self.default_language))
            .unwrap_or(&ENGLISH)
    }

    pub fn build(&self, request: &QuizRequest) -> String {
        let template = self.template_for(request.language);
        let letters = option_letters(request.answers_per_question);

        // topic goes in last so user text is never scanned for placeholders
        let intro = template
            .intro
            .replace("{count}", &template.question_phrase(request.question_count))
            .replace("{topic}", &request.topic);

        let explanation_rule = if request.include_explanations {
            "Include a detailed explanation of the correct answer for every question"
        } else {
            "Do not include explanations"
        };

        format!(
            r#"{intro}

Requirements:
- Language: {instruction}
- Difficulty level: {difficulty} ({description})
- Number of questions: {count}
- Answer options per question: {answers} ({letters})
- Exactly one correct answer per question; the other options must be wrong but plausible
- Give the correct answer as its option letter only, without repeating the option text
- {explanation_rule}
- {summary}

Respond with a single JSON object in exactly this format:
{skeleton}

Generate the quiz now:"#,
            instruction = template.response_instruction,
            difficulty = request.difficulty,
            description = request.difficulty.description(),
            count = request.question_count,
            answers = request.answers_per_question,
            letters = letters.join(", "),
            summary = template.summary_instruction,
            skeleton = output_skeleton(request, &letters),
        )
    }
}

/// Stable cache key for a rendered prompt
pub fn prompt_hash(prompt: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(prompt.as_bytes());
    let digest = format!("{:x}", hasher.finalize());
    digest[..PROMPT_HASH_LENGTH].to_string()
}

/// `A`, `B`, `C`, ... for the requested number of options (at most 26)
pub fn option_letters(count: u32) -> Vec<String> {
    ('A'..='Z').take(count as usize).map(String::from).collect()
}

fn find_template(language: Language) -> Option<&'static LanguageTemplate> {
    TEMPLATES.iter().copied().find(|t| t.language == language)
}

/// Minimal example of the JSON the response parser extracts
fn output_skeleton(request: &QuizRequest, letters: &[String]) -> String {
    let options: Map<String, Value> = letters
        .iter()
        .map(|letter| (letter.clone(), json!(format!("Option {} text", letter))))
        .collect();

    let mut question = Map::new();
    question.insert("question".to_string(), json!("Question text"));
    question.insert("options".to_string(), Value::Object(options));
    question.insert("correct".to_string(), json!(letters.first().cloned().unwrap_or_default()));
    if request.include_explanations {
        question.insert("explanation".to_string(), json!("Why the correct answer is right"));
    }

    let skeleton = json!({
        "topic": request.topic,
        "summary": "Summary of the topic",
        "questions": [Value::Object(question)],
    });

    serde_json::to_string_pretty(&skeleton).unwrap_or_else(|_| skeleton.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Difficulty;
    use crate::response_parser::ResponseParser;

    fn request(language: Language, question_count: u32) -> QuizRequest {
        QuizRequest {
            topic: "Photosynthesis".to_string(),
            difficulty: Difficulty::Beginner,
            question_count,
            language,
            include_explanations: true,
            answers_per_question: 4,
        }
    }

    #[test]
    fn test_build_is_deterministic() {
        let builder = PromptBuilder::default();
        for language in Language::ALL {
            let req = request(language, 5);
            assert_eq!(builder.build(&req), builder.build(&req));
            assert_eq!(prompt_hash(&builder.build(&req)), prompt_hash(&builder.build(&req)));
        }
    }

    #[test]
    fn test_singular_and_plural_phrasing() {
        let builder = PromptBuilder::default();
        let single = builder.build(&request(Language::English, 1));
        assert!(single.contains("with one question."));

        let many = builder.build(&request(Language::English, 7));
        assert!(many.contains("with 7 questions."));

        let italian = builder.build(&request(Language::Italian, 1));
        assert!(italian.contains("con una domanda."));
        assert!(italian.contains("Rispondi in italiano"));

        let german = builder.build(&request(Language::German, 3));
        assert!(german.contains("mit 3 Fragen."));
    }

    #[test]
    fn test_topic_placeholders_are_left_alone() {
        let builder = PromptBuilder::default();
        let mut req = request(Language::English, 1);
        req.topic = "The {count} problem".to_string();
        let prompt = builder.build(&req);
        assert!(prompt.starts_with("Create an educational quiz about \"The {count} problem\" with one question."));

        req.topic = "{n} and {topic}".to_string();
        assert!(builder.build(&req).contains("about \"{n} and {topic}\" with one question."));
    }

    #[test]
    fn test_languages_produce_distinct_prompts() {
        let builder = PromptBuilder::default();
        let english = builder.build(&request(Language::English, 2));
        let spanish = builder.build(&request(Language::Spanish, 2));
        assert_ne!(english, spanish);
        assert_ne!(prompt_hash(&english), prompt_hash(&spanish));
    }

    #[test]
    fn test_every_language_has_a_template() {
        let builder = PromptBuilder::new(Language::Italian);
        for language in Language::ALL {
            assert_eq!(builder.template_for(language).language, language);
        }
    }

    #[test]
    fn test_skeleton_matches_parser_contract() {
        let builder = PromptBuilder::default();
        let prompt = builder.build(&request(Language::French, 2));
        let quiz = ResponseParser::parse(&prompt).expect("skeleton should parse");
        assert_eq!(quiz.topic, "Photosynthesis");
        assert_eq!(quiz.questions.len(), 1);
        assert_eq!(quiz.questions[0].options.len(), 4);
        assert_eq!(quiz.questions[0].correct, "A");
        assert!(quiz.questions[0].explanation.is_some());
    }

    #[test]
    fn test_explanations_toggle() {
        let builder = PromptBuilder::default();
        let mut req = request(Language::English, 2);
        req.include_explanations = false;
        let prompt = builder.build(&req);
        assert!(prompt.contains("Do not include explanations"));
        assert!(!prompt.contains("\"explanation\""));
    }

    #[test]
    fn test_prompt_hash_shape() {
        let hash = prompt_hash("hello");
        assert_eq!(hash.len(), PROMPT_HASH_LENGTH);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
        // sha256("hello") = 2cf24dba5fb0a30e...
        assert_eq!(hash, "2cf24dba5fb0a30e");
    }

    #[test]
    fn test_option_letters() {
        assert_eq!(option_letters(3), ["A", "B", "C"]);
        assert_eq!(option_letters(30).len(), 26);
    }
}
