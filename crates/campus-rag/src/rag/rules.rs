//! Multilingual rule tables
//!
//! Keyword and phrase tables for English, Filipino and Cebuano, compiled once
//! into regex matchers. Weights sit next to the rule they belong to, so adding
//! a language or a category is a change to the tables below and nothing else.

use std::sync::LazyLock;

use regex::Regex;

use super::intent_classifier::ConversationalIntent;
use super::query_analyzer::IntentMatch;

// ============================================================================
// Weights
// ============================================================================

/// Added once per matched topic category.
pub const TOPIC_WEIGHT: f64 = 0.5;

/// Added once per distinct plural noun found.
pub const PLURAL_WEIGHT: f64 = 1.5;

/// Added once when any plural noun appears near the start of the query.
pub const EARLY_PLURAL_WEIGHT: f64 = 1.0;

/// Byte offset below which a plural counts as "near the start".
pub const EARLY_PLURAL_OFFSET: usize = 20;

// ============================================================================
// Rule types
// ============================================================================

/// A single keyword with its compiled matcher.
pub struct Keyword {
    pub text: &'static str,
    matcher: Regex,
}

impl Keyword {
    /// Whole word with an optional plural suffix, so "program" matches
    /// "programs" but not "programming".
    fn inflected(text: &'static str) -> Self {
        Self {
            text,
            matcher: Regex::new(&format!(r"\b{}(?:s|es)?\b", regex::escape(text)))
                .expect("escaped keyword is a valid pattern"),
        }
    }

    /// Word boundary on both sides.
    fn whole(text: &'static str) -> Self {
        Self {
            text,
            matcher: Regex::new(&format!(r"\b{}\b", regex::escape(text)))
                .expect("escaped keyword is a valid pattern"),
        }
    }

    pub fn is_match(&self, normalized: &str) -> bool {
        self.matcher.is_match(normalized)
    }

    /// Byte offset of the first occurrence.
    pub fn find(&self, normalized: &str) -> Option<usize> {
        self.matcher.find(normalized).map(|m| m.start())
    }
}

pub struct TopicRule {
    pub category: &'static str,
    pub weight: f64,
    pub keywords: Vec<Keyword>,
}

impl TopicRule {
    /// Keywords of this category present in the query, in table order.
    pub fn matched_keywords(&self, normalized: &str) -> Vec<String> {
        self.keywords
            .iter()
            .filter(|k| k.is_match(normalized))
            .map(|k| k.text.to_string())
            .collect()
    }
}

pub struct PhrasingRule {
    pub tag: IntentMatch,
    pub weight: f64,
    patterns: Vec<Regex>,
}

impl PhrasingRule {
    pub fn is_match(&self, normalized: &str) -> bool {
        self.patterns.iter().any(|p| p.is_match(normalized))
    }
}

pub struct ConversationalRule {
    pub intent: ConversationalIntent,
    pub base_confidence: u8,
    /// Longer messages are not considered for this register.
    pub max_words: Option<usize>,
    patterns: Vec<Regex>,
}

impl ConversationalRule {
    /// Returns the rule's score for the message, or `None` when it does not apply.
    ///
    /// A match that spans the whole message (ignoring trailing punctuation)
    /// scores higher than one buried in a longer sentence.
    pub fn score(&self, normalized: &str, word_count: usize) -> Option<u8> {
        if self.max_words.is_some_and(|max| word_count > max) {
            return None;
        }
        let core = normalized.trim_end_matches(|c: char| c.is_ascii_punctuation() || c.is_whitespace());
        let mut best = None;
        for pattern in &self.patterns {
            if let Some(m) = pattern.find(normalized) {
                let full = m.start() == 0 && m.end() >= core.len();
                let score = if full {
                    self.base_confidence.saturating_add(5).min(100)
                } else {
                    self.base_confidence
                };
                best = Some(best.map_or(score, |b: u8| b.max(score)));
            }
        }
        best
    }
}

fn compile_all(patterns: &[&str]) -> Vec<Regex> {
    patterns
        .iter()
        .map(|p| Regex::new(p).expect("rule table pattern is valid"))
        .collect()
}

// ============================================================================
// Topic categories
// ============================================================================

const TOPIC_TABLE: &[(&str, &[&str])] = &[
    (
        "identity",
        &[
            "dorsu", "davao oriental state university", "mission", "vision", "mandate",
            "core values", "motto", "hymn", "logo", "misyon", "bisyon", "layunin", "tumong",
        ],
    ),
    (
        "leadership",
        &[
            "president", "chancellor", "dean", "director", "chairperson", "board of regents",
            "official", "administrator", "registrar", "pangulo", "presidente", "dekano",
            "pinuno", "punoan", "nangulo",
        ],
    ),
    (
        "academic",
        &[
            "program", "course", "degree", "curriculum", "major", "college", "faculty",
            "faculties", "department", "bachelor", "master", "doctorate", "kurso", "programa",
            "kolehiyo", "asignatura",
        ],
    ),
    (
        "campus",
        &[
            "campus", "extension", "location", "address", "building", "facility", "facilities",
            "library", "libraries", "dormitory", "dormitories", "kampus", "lokasyon", "gusali",
            "nahimutangan",
        ],
    ),
    (
        "enrollment",
        &[
            "enroll", "enrolled", "enrolling", "enrollment", "enrol", "enrolment", "admission",
            "apply", "applying", "applicant", "application", "requirement", "tuition",
            "fee", "scholarship", "entrance exam", "registration", "pag-enroll",
            "magpa-enroll", "matrikula", "bayarin", "iskolar", "eksamin", "pagpalista",
        ],
    ),
    (
        "quality",
        &[
            "accreditation", "accredited", "aaccup", "iso", "certification", "ranking",
            "quality", "award", "awarded", "recognition", "akreditasyon", "kalidad", "parangal",
            "pasidungog",
        ],
    ),
    (
        "historical",
        &[
            "history", "historical", "founded", "established", "founding", "origin", "anniversary",
            "formerly", "kasaysayan", "itinatag", "natatag", "gitukod", "kagikan", "sinugdanan",
        ],
    ),
];

pub static TOPIC_RULES: LazyLock<Vec<TopicRule>> = LazyLock::new(|| {
    TOPIC_TABLE
        .iter()
        .map(|(category, keywords)| TopicRule {
            category,
            weight: TOPIC_WEIGHT,
            keywords: keywords.iter().copied().map(Keyword::inflected).collect(),
        })
        .collect()
});

// ============================================================================
// Plural subject nouns
// ============================================================================

const PLURAL_TABLE: &[&str] = &[
    "programs", "campuses", "deans", "faculties", "colleges", "departments", "courses",
    "degrees", "officials", "directors", "presidents", "requirements", "scholarships",
    "offices", "institutes", "majors", "facilities",
];

pub static PLURAL_KEYWORDS: LazyLock<Vec<Keyword>> =
    LazyLock::new(|| PLURAL_TABLE.iter().copied().map(Keyword::whole).collect());

// ============================================================================
// Phrasing intents (order is detection order)
// ============================================================================

const PHRASING_TABLE: &[(IntentMatch, f64, &[&str])] = &[
    (
        IntentMatch::Listing,
        1.5,
        &[
            r"\b(list|enumerate|name all|name the|what are|which are|show me all|show all)\b",
            r"\b(ilista|ano-ano|anu-ano|ano ang mga|ipakita)\b",
            r"\b(unsa-unsa|unsa ang mga|ipakita ang mga)\b",
        ],
    ),
    (
        IntentMatch::Counting,
        1.5,
        &[
            r"\b(how many|number of|count|total)\b",
            r"\b(ilan|ilang|gaano karami)\b",
            r"\b(pila|ihap)\b",
        ],
    ),
    (
        IntentMatch::Multiple,
        1.0,
        &[
            r"\b(both|several|various|multiple|different|each)\b",
            r"\b(iba't ibang|iba-iba|bawat)\b",
            r"\b(lain-lain|matag|tagsa)\b",
        ],
    ),
    (
        IntentMatch::Comprehensive,
        0.3,
        &[
            r"\b(all|every|everything|complete|entire|comprehensive|full|overview|detailed|in detail)\b",
            r"\b(lahat|kumpleto|buo)\b",
            r"\b(tanan|tibuok|kompleto)\b",
        ],
    ),
    (
        IntentMatch::FollowUp,
        0.5,
        &[
            r"^(what about|how about|and|also|then|what else)\b",
            r"\b(tell me more|more about|more details|elaborate)\b",
            r"\b(he|she|him|her|his|they|them|their)\b",
            r"^(paano naman|eh si|e si|at si)\b",
            r"^(unsa pa|ug si|kana si)\b",
            r"\b(siya|niya|kanya|nila|iya|kaniya)\b",
        ],
    ),
    (
        IntentMatch::MultiPart,
        1.0,
        &[
            r"\?.*\?",
            r"\b(and|also|as well as) (what|who|where|when|how|why|which)\b",
            r"\b(at|saka) (ano|sino|saan|kailan|paano|bakit)\b",
            r"\b(ug|og) (unsa|kinsa|asa|kanus-a|giunsa|ngano)\b",
        ],
    ),
];

pub static PHRASING_RULES: LazyLock<Vec<PhrasingRule>> = LazyLock::new(|| {
    PHRASING_TABLE
        .iter()
        .map(|(tag, weight, patterns)| PhrasingRule {
            tag: *tag,
            weight: *weight,
            patterns: compile_all(patterns),
        })
        .collect()
});

// ============================================================================
// Conversational register (order is tie-break priority)
// ============================================================================

const CONVERSATIONAL_TABLE: &[(ConversationalIntent, u8, Option<usize>, &[&str])] = &[
    (
        ConversationalIntent::Greeting,
        95,
        Some(6),
        &[
            r"^(hi|hello|hey|hiya|yo|greetings|good (morning|afternoon|evening|day))\b",
            r"^(kumusta|kamusta|musta|magandang (umaga|hapon|gabi|araw))\b",
            r"^(maayong (buntag|udto|hapon|gabii|adlaw))\b",
        ],
    ),
    (
        ConversationalIntent::Farewell,
        95,
        Some(8),
        &[
            r"\b(bye|goodbye|good bye|see you|see ya|take care|good night|farewell)\b",
            r"\b(paalam|ingat ka|babay)\b",
            r"\b(amping|adios|sige una ko)\b",
        ],
    ),
    (
        ConversationalIntent::Gratitude,
        95,
        Some(12),
        &[
            r"\b(thanks|thank you|thank u|thx|ty|appreciate it|much appreciated)\b",
            r"\b(salamat|maraming salamat)\b",
            r"\b(daghang salamat)\b",
        ],
    ),
    (
        ConversationalIntent::EmotionExpression,
        80,
        Some(15),
        &[
            r"\bi('m| am) (so |really |very )?(sad|happy|stressed|tired|worried|anxious|excited|confused|frustrated|bored|lonely|scared|nervous)\b",
            r"\bi feel\b",
            r"\b(nalulungkot|masaya ako|pagod na ako|kinakabahan|naiinis)\b",
            r"\b(kapoy kaayo|nalipay ko|nasubo ko|gikulbaan ko)\b",
        ],
    ),
    (
        ConversationalIntent::TaskRequest,
        75,
        None,
        &[
            r"^(please |pls |can you |could you |would you )?(write|draft|compose|create|make|generate|summarize|summarise|translate|calculate|help me)\b",
            r"^(pakigawa|gumawa ka|isulat mo|pakisulat)\b",
            r"^(palihug|himo-i|buhati)\b",
        ],
    ),
    (
        ConversationalIntent::ClarificationRequest,
        80,
        Some(15),
        &[
            r"\b(what do you mean|i don't understand|i dont understand|can you clarify|clarify|what does that mean|come again|pardon)\b",
            r"\b(ano ibig mong sabihin|hindi ko maintindihan|di ko gets)\b",
            r"\b(unsay buot nimo ipasabot|wala ko kasabot)\b",
        ],
    ),
    (
        ConversationalIntent::FollowUp,
        70,
        Some(12),
        &[
            r"^(what about|how about|and what about|what else|tell me more|more about)\b",
            r"\b(about|of|from|with|for) (him|her|them|it)\b",
            r"^(paano naman|eh si|e si|at si|ano pa)\b",
            r"^(unsa pa|ug si|kana si)\b",
        ],
    ),
    (
        ConversationalIntent::SmallTalk,
        65,
        Some(10),
        &[
            r"\b(how are you|how's it going|what's up|who are you|what's your name|are you a (bot|robot|human)|tell me a joke)\b",
            r"\b(kumusta ka|sino ka|anong pangalan mo)\b",
            r"\b(kinsa ka|unsay imong ngalan)\b",
        ],
    ),
];

pub static CONVERSATIONAL_RULES: LazyLock<Vec<ConversationalRule>> = LazyLock::new(|| {
    CONVERSATIONAL_TABLE
        .iter()
        .map(|(intent, base, max_words, patterns)| ConversationalRule {
            intent: *intent,
            base_confidence: *base,
            max_words: *max_words,
            patterns: compile_all(patterns),
        })
        .collect()
});

// ============================================================================
// Institution references
// ============================================================================

static INSTITUTION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\b(dorsu|davao oriental state university|davao oriental state college|the university|this university|our university|our school|this school|unibersidad|paaralan|eskwelahan|tunghaan)\b",
    )
    .expect("institution regex is valid")
});

/// Whether the normalized query names the institution itself.
pub fn mentions_institution(normalized: &str) -> bool {
    INSTITUTION_RE.is_match(normalized)
}

/// Words that only ever name the institution or its location, never a person.
pub const INSTITUTION_WORDS: &[&str] = &[
    "dorsu", "davao", "oriental", "state", "university", "college", "campus", "mati",
    "city", "philippines", "mindanao", "unibersidad", "kolehiyo", "board", "regents",
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tables_compile() {
        assert_eq!(TOPIC_RULES.len(), 7);
        assert_eq!(PHRASING_RULES.len(), 6);
        assert_eq!(CONVERSATIONAL_RULES.len(), 8);
        assert!(!PLURAL_KEYWORDS.is_empty());
    }

    #[test]
    fn test_topic_keyword_matches_plural_form() {
        let academic = TOPIC_RULES.iter().find(|r| r.category == "academic").unwrap();
        assert_eq!(academic.matched_keywords("list the programs"), vec!["program"]);
        assert!(academic.matched_keywords("learn programming in python").is_empty());

        let enrollment = TOPIC_RULES.iter().find(|r| r.category == "enrollment").unwrap();
        assert!(enrollment.matched_keywords("i feel sad today").is_empty());
        assert_eq!(enrollment.matched_keywords("enrollment schedule"), vec!["enrollment"]);
    }

    #[test]
    fn test_whole_word_plural_position() {
        let programs = PLURAL_KEYWORDS.iter().find(|k| k.text == "programs").unwrap();
        assert_eq!(programs.find("list all programs offered by dorsu"), Some(9));
        assert_eq!(programs.find("programsx"), None);
    }

    #[test]
    fn test_full_match_scores_higher() {
        let greeting = &CONVERSATIONAL_RULES[0];
        assert_eq!(greeting.score("hi", 1), Some(100));
        assert_eq!(greeting.score("hi there friend", 3), Some(95));
        assert_eq!(greeting.score("hi this message is far too long for a greeting", 10), None);
    }

    #[test]
    fn test_institution_mentions() {
        assert!(mentions_institution("what is dorsu"));
        assert!(mentions_institution("saan ang unibersidad"));
        assert!(!mentions_institution("what is photosynthesis"));
    }
}
