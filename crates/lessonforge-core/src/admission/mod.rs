//! Admission Filter - rejects outlines before any generation cost is spent
//!
//! Checks run cheapest first and stop at the first failure:
//! length, invisible characters, emoji density, spam signatures, SQL-injection
//! shapes, prompt-injection shapes, unsafe content, educational intent and
//! finally a gibberish heuristic for Latin-only text.

pub mod lexicon;

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use lexicon::{has_educational_keyword, has_non_latin_script, script_of};

/// Minimum trimmed outline length, in characters
pub const MIN_OUTLINE_CHARS: usize = 10;
/// Maximum trimmed outline length, in characters
pub const MAX_OUTLINE_CHARS: usize = 1000;
/// Maximum number of emoji accepted in one outline
pub const MAX_EMOJI: usize = 10;
/// A single character repeated this many times in a row is spam
pub const SPAM_REPEAT_RUN: usize = 11;

const MAX_CONSONANT_RUN: usize = 6;
const MAX_VOWEL_RUN: usize = 5;

lazy_static! {
    static ref SQL_PATTERNS: Vec<(&'static str, Regex)> = vec![
        ("union select", Regex::new(r"(?i)\bunion\s+(all\s+)?select\b").unwrap()),
        ("select from", Regex::new(r"(?i)\bselect\s+(\*|[\w,\s]+)\s+from\s+\w+\s+where\b").unwrap()),
        ("select star", Regex::new(r"(?i)\bselect\s+\*\s+from\b").unwrap()),
        ("drop", Regex::new(r"(?i)\bdrop\s+(table|database|schema)\b").unwrap()),
        ("insert", Regex::new(r"(?i)\binsert\s+into\s+\w+\s*(\(|values\b)").unwrap()),
        ("delete", Regex::new(r"(?i)\bdelete\s+from\s+\w+\s*(where\b|;)").unwrap()),
        ("update", Regex::new(r"(?i)\bupdate\s+\w+\s+set\s+\w+\s*=").unwrap()),
        ("truncate", Regex::new(r"(?i)\btruncate\s+table\b").unwrap()),
        ("stacked statement", Regex::new(r"(?i);\s*(drop|delete|update|insert|alter|exec)\b").unwrap()),
        ("quote comment", Regex::new(r"\w['\x22];?(--|#|/\*)").unwrap()),
        ("always true", Regex::new(r"(?i)['\x22]\s*or\s+['\x22]?\w+['\x22]?\s*=\s*['\x22]?\w+").unwrap()),
        ("tautology", Regex::new(r"(?i)\bor\s+1\s*=\s*1\b").unwrap()),
        ("exec proc", Regex::new(r"(?i)\bexec(\s+|\s*\()(xp_|sp_)\w+").unwrap()),
    ];

    static ref PROMPT_INJECTION_PATTERNS: Vec<(&'static str, Regex)> = vec![
        ("ignore instructions", Regex::new(r"(?i)\bignore\s+(all\s+)?(the\s+)?(previous|prior|above|earlier|preceding)\s+(instructions?|prompts?|rules|directions)").unwrap()),
        ("role override", Regex::new(r"(?i)\byou\s+are\s+now\b").unwrap()),
        ("system marker", Regex::new(r"(?im)(^\s*system\s*:|\[\s*system\s*\]|<\|?\s*system\s*\|?>|#{2,}\s*system\b)").unwrap()),
        ("forget instructions", Regex::new(r"(?i)\b(forget|disregard)\s+(all\s+)?(of\s+)?(the\s+|your\s+)?(previous|prior|above|earlier|everything)\b").unwrap()),
        ("new instructions", Regex::new(r"(?i)\bnew\s+instructions\s*:").unwrap()),
        ("jailbreak", Regex::new(r"(?i)\b(jailbreak|developer\s+mode|DAN\s+mode)\b").unwrap()),
    ];

    static ref UNSAFE_TERMS: Regex = Regex::new(
        r"(?i)\b(porn|pornography|pornographic|nsfw|hentai|xxx|nude|nudes|sexting|make\s+a\s+bomb|build\s+a\s+bomb|bomb\s+making|pipe\s+bomb|kill\s+yourself|suicide\s+method|self[-\s]harm\s+instructions|cook\s+meth|meth\s+recipe|child\s+abuse|plan\s+a\s+terrorist\s+attack|mass\s+shooting\s+plan|buy\s+drugs|credit\s+card\s+fraud)\b"
    )
    .unwrap();
}

const KEYBOARD_MASH: &[&str] = &[
    "qwerty", "qwertz", "azerty", "asdfgh", "zxcvbn", "asdfasdf", "jkljkl", "hjklhjkl",
    "sdfsdf", "dfgdfg", "fghfgh", "ghjghj", "lkjlkj",
];

/// The check that refused an outline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdmissionStage {
    Length,
    InvisibleCharacters,
    EmojiLimit,
    Spam,
    SqlInjection,
    PromptInjection,
    UnsafeContent,
    EducationalIntent,
    Gibberish,
}

/// Structured refusal
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{message}")]
pub struct AdmissionRejection {
    pub stage: AdmissionStage,
    pub message: String,
}

impl AdmissionRejection {
    fn new(stage: AdmissionStage, message: impl Into<String>) -> Self {
        Self {
            stage,
            message: message.into(),
        }
    }

    /// Corrective suggestion for the failed stage
    pub fn suggestion(&self) -> &'static str {
        match self.stage {
            AdmissionStage::Length => {
                "Describe the lesson in one or two sentences, between 10 and 1000 characters."
            }
            AdmissionStage::InvisibleCharacters => {
                "Retype the outline instead of pasting it; it contains hidden formatting characters."
            }
            AdmissionStage::EmojiLimit => "Use words instead of emoji to describe the lesson.",
            AdmissionStage::Spam => {
                "Write a real description of the topic, for example: \"Explain how volcanoes form\"."
            }
            AdmissionStage::SqlInjection | AdmissionStage::PromptInjection => {
                "Describe only the lesson topic and what learners should do."
            }
            AdmissionStage::UnsafeContent => "Choose a topic that is appropriate for learners.",
            AdmissionStage::EducationalIntent => {
                "Say what should be taught, for example: \"Teach fractions with an interactive pizza\"."
            }
            AdmissionStage::Gibberish => "Check the spelling of the outline and try again.",
        }
    }
}

/// Admission verdict, mirroring the guardrail decision shape
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdmissionDecision {
    pub is_valid: bool,
    pub error: Option<AdmissionRejection>,
}

impl AdmissionDecision {
    fn accept() -> Self {
        Self {
            is_valid: true,
            error: None,
        }
    }

    fn reject(rejection: AdmissionRejection) -> Self {
        Self {
            is_valid: false,
            error: Some(rejection),
        }
    }

    pub fn into_result(self) -> std::result::Result<(), AdmissionRejection> {
        match self.error {
            Some(rejection) => Err(rejection),
            None => Ok(()),
        }
    }
}

pub struct AdmissionFilter;

impl AdmissionFilter {
    /// Evaluate an outline. Pure function of the input text.
    pub fn check(text: &str) -> AdmissionDecision {
        match Self::run_stages(text) {
            Ok(()) => AdmissionDecision::accept(),
            Err(rejection) => {
                tracing::debug!(stage = ?rejection.stage, "outline rejected: {}", rejection.message);
                AdmissionDecision::reject(rejection)
            }
        }
    }

    fn run_stages(text: &str) -> std::result::Result<(), AdmissionRejection> {
        let trimmed = text.trim();
        check_length(trimmed)?;
        check_invisible(trimmed)?;
        check_emoji(trimmed)?;
        check_spam(trimmed)?;
        check_patterns(trimmed, &SQL_PATTERNS, AdmissionStage::SqlInjection, "database commands")?;
        check_patterns(
            trimmed,
            &PROMPT_INJECTION_PATTERNS,
            AdmissionStage::PromptInjection,
            "instructions aimed at the generator",
        )?;
        check_unsafe(trimmed)?;
        check_educational_intent(trimmed)?;
        check_gibberish(trimmed)?;
        Ok(())
    }
}

fn check_length(trimmed: &str) -> std::result::Result<(), AdmissionRejection> {
    let len = trimmed.chars().count();
    if len == 0 {
        return Err(AdmissionRejection::new(AdmissionStage::Length, "Outline is empty"));
    }
    if len < MIN_OUTLINE_CHARS {
        return Err(AdmissionRejection::new(
            AdmissionStage::Length,
            format!("Outline is too short ({} characters, minimum {})", len, MIN_OUTLINE_CHARS),
        ));
    }
    if len > MAX_OUTLINE_CHARS {
        return Err(AdmissionRejection::new(
            AdmissionStage::Length,
            format!("Outline is too long ({} characters, maximum {})", len, MAX_OUTLINE_CHARS),
        ));
    }
    Ok(())
}

fn is_invisible(c: char) -> bool {
    matches!(
        c,
        '\u{200B}'..='\u{200F}' | '\u{202A}'..='\u{202E}' | '\u{2060}'..='\u{2064}' | '\u{FEFF}' | '\u{00AD}'
    ) || (c.is_control() && !matches!(c, '\n' | '\r' | '\t'))
}

fn check_invisible(trimmed: &str) -> std::result::Result<(), AdmissionRejection> {
    match trimmed.chars().find(|c| is_invisible(*c)) {
        Some(c) => Err(AdmissionRejection::new(
            AdmissionStage::InvisibleCharacters,
            format!("Outline contains an invisible control character (U+{:04X})", c as u32),
        )),
        None => Ok(()),
    }
}

fn is_emoji(c: char) -> bool {
    matches!(
        c as u32,
        0x1F000..=0x1FAFF | 0x2600..=0x27BF | 0x2B00..=0x2BFF | 0x1F1E6..=0x1F1FF
    )
}

fn check_emoji(trimmed: &str) -> std::result::Result<(), AdmissionRejection> {
    let count = trimmed.chars().filter(|c| is_emoji(*c)).count();
    if count > MAX_EMOJI {
        return Err(AdmissionRejection::new(
            AdmissionStage::EmojiLimit,
            format!("Outline contains {} emoji (maximum {})", count, MAX_EMOJI),
        ));
    }
    Ok(())
}

fn longest_repeat_run(text: &str) -> (usize, Option<char>) {
    let mut best = (0, None);
    let mut current: Option<char> = None;
    let mut run = 0;
    for c in text.chars() {
        if c.is_whitespace() {
            current = None;
            run = 0;
            continue;
        }
        if Some(c) == current {
            run += 1;
        } else {
            current = Some(c);
            run = 1;
        }
        if run > best.0 {
            best = (run, current);
        }
    }
    best
}

fn check_spam(trimmed: &str) -> std::result::Result<(), AdmissionRejection> {
    let (run, repeated) = longest_repeat_run(trimmed);
    if run >= SPAM_REPEAT_RUN {
        return Err(AdmissionRejection::new(
            AdmissionStage::Spam,
            format!(
                "Outline looks like spam: '{}' repeated {} times",
                repeated.unwrap_or(' '),
                run
            ),
        ));
    }

    if !trimmed
        .chars()
        .any(|c| c.is_alphanumeric() || script_of(c).is_some())
    {
        return Err(AdmissionRejection::new(
            AdmissionStage::Spam,
            "Outline contains only symbols or punctuation",
        ));
    }

    let squashed: String = trimmed
        .to_lowercase()
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();
    if let Some(mash) = KEYBOARD_MASH.iter().find(|m| squashed.contains(*m)) {
        return Err(AdmissionRejection::new(
            AdmissionStage::Spam,
            format!("Outline looks like keyboard mashing ('{}')", mash),
        ));
    }
    Ok(())
}

fn check_patterns(
    trimmed: &str,
    patterns: &[(&'static str, Regex)],
    stage: AdmissionStage,
    what: &str,
) -> std::result::Result<(), AdmissionRejection> {
    match patterns.iter().find(|(_, regex)| regex.is_match(trimmed)) {
        Some((name, _)) => Err(AdmissionRejection::new(
            stage,
            format!("Outline contains {} ({})", what, name),
        )),
        None => Ok(()),
    }
}

fn check_unsafe(trimmed: &str) -> std::result::Result<(), AdmissionRejection> {
    if UNSAFE_TERMS.is_match(trimmed) {
        return Err(AdmissionRejection::new(
            AdmissionStage::UnsafeContent,
            "Outline requests content that is not appropriate for a lesson",
        ));
    }
    Ok(())
}

fn has_substantive_content(trimmed: &str) -> bool {
    let words: Vec<&str> = trimmed.split_whitespace().collect();

    let proper_noun = words.iter().any(|word| {
        let mut letters = word.chars().filter(|c| c.is_alphabetic());
        matches!(
            (letters.next(), letters.next()),
            (Some(first), Some(second)) if first.is_uppercase() && second.is_lowercase()
        )
    });

    proper_noun
        || trimmed.chars().any(|c| c.is_ascii_digit())
        || words.len() >= 4
        || has_non_latin_script(trimmed)
}

fn check_educational_intent(trimmed: &str) -> std::result::Result<(), AdmissionRejection> {
    if has_educational_keyword(trimmed) || has_substantive_content(trimmed) {
        return Ok(());
    }
    Err(AdmissionRejection::new(
        AdmissionStage::EducationalIntent,
        "Outline does not describe something to learn",
    ))
}

fn is_vowel(c: char) -> bool {
    matches!(
        c,
        'a' | 'e' | 'i' | 'o' | 'u' | 'á' | 'é' | 'í' | 'ó' | 'ú' | 'à' | 'è' | 'ì' | 'ò' | 'ù'
            | 'â' | 'ê' | 'î' | 'ô' | 'û' | 'ä' | 'ë' | 'ï' | 'ö' | 'ü' | 'ã' | 'õ'
    )
}

/// Longest consonant and vowel runs of a lowercase word. `y` breaks both runs.
fn letter_runs(word: &str) -> (usize, usize) {
    let (mut consonants, mut vowels) = (0usize, 0usize);
    let (mut max_consonants, mut max_vowels) = (0usize, 0usize);
    for c in word.chars() {
        if is_vowel(c) {
            vowels += 1;
            consonants = 0;
        } else if c == 'y' || !c.is_alphabetic() {
            vowels = 0;
            consonants = 0;
        } else {
            consonants += 1;
            vowels = 0;
        }
        max_consonants = max_consonants.max(consonants);
        max_vowels = max_vowels.max(vowels);
    }
    (max_consonants, max_vowels)
}

fn check_gibberish(trimmed: &str) -> std::result::Result<(), AdmissionRejection> {
    if has_non_latin_script(trimmed) {
        return Ok(());
    }

    let lower = trimmed.to_lowercase();
    let suspicious = lower
        .split(|c: char| !c.is_alphabetic())
        .filter(|word| word.chars().count() >= 4)
        .find(|word| {
            let (consonants, vowels) = letter_runs(word);
            consonants >= MAX_CONSONANT_RUN || vowels >= MAX_VOWEL_RUN
        });

    match suspicious {
        Some(word) => Err(AdmissionRejection::new(
            AdmissionStage::Gibberish,
            format!("Outline contains an unreadable word ('{}')", word),
        )),
        None => Ok(()),
    }
}
