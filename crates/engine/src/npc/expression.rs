use std::collections::HashMap;

pub const TYPE_NUMBER: &str = "NUM";
pub const TYPE_VERB: &str = "VER";
pub const TYPE_OBJECT: &str = "OBJ";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expression {
    original: String,
    normalized: String,
    type_tag: String,
}

impl Expression {
    /// Builds an expression without vocabulary processing.
    pub fn new(text: &str, type_tag: &str) -> Self {
        Self {
            original: text.to_string(),
            normalized: text.trim().to_string(),
            type_tag: type_tag.to_string(),
        }
    }

    pub fn original(&self) -> &str {
        &self.original
    }

    pub fn normalized(&self) -> &str {
        &self.normalized
    }

    pub fn type_tag(&self) -> &str {
        &self.type_tag
    }

    pub fn is_empty(&self) -> bool {
        self.normalized.is_empty()
    }
}

/// Turns raw utterances into expressions: trims, drops trailing punctuation,
/// collapses whitespace and replaces known synonyms with their canonical word.
#[derive(Debug, Clone)]
pub struct Vocabulary {
    synonyms: HashMap<String, String>,
    verbs: Vec<String>,
}

const DEFAULT_SYNONYMS: &[(&str, &str)] = &[
    ("hello", "hi"),
    ("hey", "hi"),
    ("greetings", "hi"),
    ("hallo", "hi"),
    ("goodbye", "bye"),
    ("farewell", "bye"),
    ("cya", "bye"),
    ("ok", "yes"),
    ("okay", "yes"),
    ("sure", "yes"),
    ("yep", "yes"),
    ("yeah", "yes"),
    ("nope", "no"),
    ("nah", "no"),
    ("task", "quest"),
    ("mission", "quest"),
    ("favor", "quest"),
    ("work", "job"),
];

const DEFAULT_VERBS: &[&str] = &[
    "hi", "bye", "yes", "no", "quest", "job", "help", "offer", "done", "buy", "sell",
];

impl Default for Vocabulary {
    fn default() -> Self {
        let mut vocabulary = Self {
            synonyms: HashMap::new(),
            verbs: DEFAULT_VERBS.iter().map(|verb| verb.to_string()).collect(),
        };
        for (word, canonical) in DEFAULT_SYNONYMS {
            vocabulary.add_synonym(word, canonical);
        }
        vocabulary
    }
}

impl Vocabulary {
    pub fn add_synonym(&mut self, word: &str, canonical: &str) {
        self.synonyms
            .insert(word.trim().to_lowercase(), canonical.trim().to_lowercase());
    }

    pub fn parse(&self, text: &str) -> Expression {
        let stripped = text
            .trim()
            .trim_end_matches(|c: char| matches!(c, '.' | '!' | '?' | ',' | ';' | ':'));
        let normalized = stripped
            .split_whitespace()
            .map(|word| {
                self.synonyms
                    .get(&word.to_lowercase())
                    .cloned()
                    .unwrap_or_else(|| word.to_string())
            })
            .collect::<Vec<_>>()
            .join(" ");
        let type_tag = self.type_of(&normalized);
        Expression {
            original: text.to_string(),
            normalized,
            type_tag: type_tag.to_string(),
        }
    }

    fn type_of(&self, normalized: &str) -> &'static str {
        if !normalized.is_empty() && normalized.parse::<i64>().is_ok() {
            TYPE_NUMBER
        } else if self
            .verbs
            .iter()
            .any(|verb| verb.eq_ignore_ascii_case(normalized))
        {
            TYPE_VERB
        } else {
            TYPE_OBJECT
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_strips_punctuation_and_collapses_spaces() {
        let vocabulary = Vocabulary::default();
        let expr = vocabulary.parse("  unicorn    horn?! ");
        assert_eq!(expr.normalized(), "unicorn horn");
        assert_eq!(expr.type_tag(), TYPE_OBJECT);
        assert_eq!(expr.original(), "  unicorn    horn?! ");
    }

    #[test]
    fn synonyms_map_to_canonical_words() {
        let vocabulary = Vocabulary::default();
        assert_eq!(vocabulary.parse("Hello!").normalized(), "hi");
        assert_eq!(vocabulary.parse("task").normalized(), "quest");
        assert_eq!(vocabulary.parse("Farewell.").normalized(), "bye");
        assert_eq!(vocabulary.parse("Farewell").type_tag(), TYPE_VERB);
    }

    #[test]
    fn numbers_are_tagged() {
        let vocabulary = Vocabulary::default();
        assert_eq!(vocabulary.parse("10").type_tag(), TYPE_NUMBER);
    }
}
