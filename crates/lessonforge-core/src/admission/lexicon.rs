//! Script detection and the educational-intent keyword lexicon.

/// Writing systems the admission filter understands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Script {
    Latin,
    Devanagari,
    Bengali,
    Gurmukhi,
    Gujarati,
    Tamil,
    Telugu,
    Kannada,
    Malayalam,
    Arabic,
    Cyrillic,
    Greek,
    Hebrew,
    Thai,
    Han,
    Kana,
    Hangul,
}

/// Classify a character into a supported script, if any
pub fn script_of(c: char) -> Option<Script> {
    let script = match c as u32 {
        0x41..=0x5A | 0x61..=0x7A | 0xC0..=0xD6 | 0xD8..=0xF6 | 0xF8..=0x24F => Script::Latin,
        0x0900..=0x097F => Script::Devanagari,
        0x0980..=0x09FF => Script::Bengali,
        0x0A00..=0x0A7F => Script::Gurmukhi,
        0x0A80..=0x0AFF => Script::Gujarati,
        0x0B80..=0x0BFF => Script::Tamil,
        0x0C00..=0x0C7F => Script::Telugu,
        0x0C80..=0x0CFF => Script::Kannada,
        0x0D00..=0x0D7F => Script::Malayalam,
        0x0600..=0x06FF | 0x0750..=0x077F => Script::Arabic,
        0x0400..=0x04FF => Script::Cyrillic,
        0x0370..=0x03FF => Script::Greek,
        0x0590..=0x05FF => Script::Hebrew,
        0x0E00..=0x0E7F => Script::Thai,
        0x4E00..=0x9FFF | 0x3400..=0x4DBF => Script::Han,
        0x3040..=0x30FF => Script::Kana,
        0xAC00..=0xD7AF | 0x1100..=0x11FF => Script::Hangul,
        _ => return None,
    };
    Some(script)
}

/// True if the text contains any supported script other than Latin
pub fn has_non_latin_script(text: &str) -> bool {
    text.chars()
        .filter_map(script_of)
        .any(|script| script != Script::Latin)
}

/// Latin-script keywords, lowercase. Entries of five or more characters also
/// match as word prefixes ("explain" matches "explaining").
pub const LATIN_KEYWORDS: &[&str] = &[
    // English: actions
    "learn", "teach", "explain", "understand", "introduce", "describe", "demonstrate",
    "visualize", "visualise", "illustrate", "compare", "explore", "discover", "practice",
    "practise", "study", "review", "show", "how", "what", "why", "when", "who",
    // English: formats
    "lesson", "course", "tutorial", "quiz", "exam", "test", "lecture", "module",
    "chapter", "unit", "guide", "overview", "introduction", "intro", "basics",
    "fundamentals", "primer", "worksheet", "exercise", "flashcard", "simulation",
    "interactive", "diagram", "timeline", "activity", "game", "puzzle", "class",
    "students", "student", "beginner", "beginners", "kids", "children", "grade",
    "curriculum", "homework", "revision", "concept", "theory", "principle",
    // English: subjects
    "math", "maths", "mathematics", "algebra", "geometry", "calculus", "statistics",
    "fraction", "equation", "science", "physics", "chemistry", "biology", "ecology",
    "astronomy", "geology", "geography", "history", "economics", "finance",
    "literature", "poetry", "grammar", "vocabulary", "language", "spelling", "reading",
    "writing", "music", "art", "philosophy", "psychology", "sociology", "politics",
    "civics", "programming", "coding", "algorithm", "computer", "software",
    "engineering", "anatomy", "medicine", "health", "nutrition", "climate", "energy",
    "cell", "atom", "molecule", "planet", "photosynthesis", "evolution", "war",
    "revolution", "empire", "culture",
    // Spanish
    "aprender", "enseñar", "explicar", "lección", "leccion", "clase", "curso",
    "historia", "ciencia", "matemáticas", "matematicas", "física", "química",
    "biología", "idioma", "gramática",
    // French
    "apprendre", "enseigner", "expliquer", "leçon", "cours", "histoire", "sciences",
    "mathématiques", "physique", "chimie", "langue", "grammaire",
    // German
    "lernen", "lehren", "erklären", "erklaren", "lektion", "kurs", "unterricht",
    "geschichte", "wissenschaft", "mathematik", "physik", "chemie", "biologie",
    "sprache",
    // Portuguese
    "ensinar", "aula", "matemática", "ciências", "língua",
    // Italian
    "imparare", "insegnare", "spiegare", "lezione", "corso", "storia", "scienza",
    "matematica", "fisica", "chimica", "lingua",
];

/// Keywords for non-Latin scripts, matched as substrings
pub const SCRIPT_KEYWORDS: &[(Script, &[&str])] = &[
    (
        Script::Devanagari,
        &["सीख", "पढ़", "पाठ", "शिक्षा", "समझा", "विज्ञान", "गणित", "इतिहास", "भाषा", "अध्याय"],
    ),
    (
        Script::Bengali,
        &["শিখ", "পাঠ", "শিক্ষা", "বিজ্ঞান", "গণিত", "ইতিহাস", "ব্যাখ্যা"],
    ),
    (Script::Gurmukhi, &["ਸਿੱਖ", "ਪਾਠ", "ਸਿੱਖਿਆ", "ਵਿਗਿਆਨ", "ਗਣਿਤ"]),
    (Script::Gujarati, &["શીખ", "પાઠ", "શિક્ષણ", "વિજ્ઞાન", "ગણિત"]),
    (Script::Tamil, &["கற்", "பாடம்", "கல்வி", "அறிவியல்", "கணிதம்", "வரலாறு", "விளக்க"]),
    (Script::Telugu, &["నేర్చు", "పాఠం", "విద్య", "విజ్ఞాన", "గణితం", "చరిత్ర", "వివరించ"]),
    (Script::Kannada, &["ಕಲಿ", "ಪಾಠ", "ಶಿಕ್ಷಣ", "ವಿಜ್ಞಾನ", "ಗಣಿತ"]),
    (Script::Malayalam, &["പഠ", "പാഠം", "വിദ്യാഭ്യാസ", "ശാസ്ത്ര", "ഗണിത"]),
    (
        Script::Arabic,
        &["تعلم", "تعليم", "درس", "شرح", "علوم", "رياضيات", "تاريخ", "لغة", "اشرح"],
    ),
    (
        Script::Cyrillic,
        &["изуч", "урок", "объясн", "учить", "обучен", "курс", "наука", "математик", "истори", "физик"],
    ),
    (Script::Greek, &["μάθη", "μαθαίν", "εξήγη", "ιστορία", "επιστήμη", "μαθηματικά"]),
    (Script::Hebrew, &["ללמוד", "שיעור", "הסבר", "מדע", "מתמטיקה", "היסטוריה"]),
    (Script::Thai, &["เรียน", "สอน", "บทเรียน", "อธิบาย", "วิทยาศาสตร์", "คณิตศาสตร์", "ประวัติศาสตร์"]),
    (
        Script::Han,
        &["学习", "學習", "教学", "教學", "解释", "解釋", "课程", "課程", "数学", "數學", "科学", "科學", "历史", "歷史", "语言"],
    ),
    (Script::Kana, &["学ぶ", "勉強", "説明", "授業", "レッスン", "学習", "教え", "クイズ"]),
    (Script::Hangul, &["배우", "학습", "설명", "수업", "강의", "과학", "수학", "역사", "공부"]),
];

/// True if any word or substring matches the educational lexicon
pub fn has_educational_keyword(text: &str) -> bool {
    let lower = text.to_lowercase();

    let latin_hit = lower
        .split(|c: char| !c.is_alphanumeric())
        .filter(|word| !word.is_empty())
        .any(|word| {
            LATIN_KEYWORDS.iter().any(|keyword| {
                word == *keyword || (keyword.chars().count() >= 5 && word.starts_with(keyword))
            })
        });
    if latin_hit {
        return true;
    }

    SCRIPT_KEYWORDS
        .iter()
        .flat_map(|(_, keywords)| keywords.iter())
        .any(|keyword| lower.contains(keyword))
}
