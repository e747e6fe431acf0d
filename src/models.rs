//! Data models for courses, study sets and words.

use chrono::{DateTime, Utc};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::card::{CardState, LearningState};

/// Placeholder used for the missing word in fill-in-the-blank questions.
pub const BLANK: &str = "___";

pub fn short_id() -> String {
    Uuid::new_v4().to_string()[..8].to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Language {
    pub code: String,
    pub name: String,
}

impl Language {
    pub fn new(code: &str, name: &str) -> Self {
        Self {
            code: code.to_string(),
            name: name.to_string(),
        }
    }

    /// The interface language, used as every course's native language.
    pub fn site() -> Self {
        Self::new("en", "English")
    }

    pub fn supported() -> Vec<Language> {
        SUPPORTED_LANGUAGES
            .iter()
            .map(|(code, name)| Self::new(code, name))
            .collect()
    }

    /// Look up a learnable language by code or name, case-insensitively.
    pub fn find(query: &str) -> Option<Language> {
        let query = query.trim().to_lowercase();
        SUPPORTED_LANGUAGES
            .iter()
            .find(|(code, name)| *code == query || name.to_lowercase() == query)
            .map(|(code, name)| Self::new(code, name))
    }
}

const SUPPORTED_LANGUAGES: [(&str, &str); 10] = [
    ("es", "Spanish"),
    ("fr", "French"),
    ("de", "German"),
    ("it", "Italian"),
    ("pt", "Portuguese"),
    ("nl", "Dutch"),
    ("ja", "Japanese"),
    ("ko", "Korean"),
    ("zh", "Mandarin"),
    ("ru", "Russian"),
];

/// An example sentence and its translation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Example {
    pub sentence: String,
    pub translation: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExerciseKind {
    TranslateMc,
    FillBlankMc,
    FillBlankType,
    PronounceWord,
    PronounceSentence,
}

impl ExerciseKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::TranslateMc => "Translate",
            Self::FillBlankMc => "Fill in the blank",
            Self::FillBlankType => "Type the missing word",
            Self::PronounceWord => "Pronounce the word",
            Self::PronounceSentence => "Pronounce the sentence",
        }
    }

    pub fn is_multiple_choice(&self) -> bool {
        matches!(self, Self::TranslateMc | Self::FillBlankMc)
    }

    pub fn is_fill_blank(&self) -> bool {
        matches!(self, Self::FillBlankMc | Self::FillBlankType)
    }

    /// Pronunciation has no typed answer; the learner grades themselves.
    pub fn is_self_graded(&self) -> bool {
        matches!(self, Self::PronounceWord | Self::PronounceSentence)
    }
}

/// A single question about a word. Never changes once generated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Exercise {
    pub id: String,
    pub kind: ExerciseKind,
    pub question: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
    pub correct_answer: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sentence_context: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub translation_context: Option<String>,
}

impl Exercise {
    pub fn new(kind: ExerciseKind, question: String, correct_answer: String) -> Self {
        Self {
            id: short_id(),
            kind,
            question,
            options: Vec::new(),
            correct_answer,
            sentence_context: None,
            translation_context: None,
        }
    }

    pub fn is_correct(&self, answer: &str) -> bool {
        answer.trim().to_lowercase() == self.correct_answer.trim().to_lowercase()
    }

    /// Options plus the correct answer, de-duplicated and shuffled.
    pub fn choices<R: Rng + ?Sized>(&self, rng: &mut R) -> Vec<String> {
        let mut choices: Vec<String> = Vec::with_capacity(self.options.len() + 1);
        for option in self.options.iter().chain(std::iter::once(&self.correct_answer)) {
            if !choices.contains(option) {
                choices.push(option.clone());
            }
        }
        choices.shuffle(rng);
        choices
    }

    /// The full sentence for fill-in-the-blank exercises.
    pub fn full_sentence(&self) -> String {
        self.sentence_context
            .clone()
            .unwrap_or_else(|| self.question.replace(BLANK, &self.correct_answer))
    }

    /// Why this exercise cannot be shown, if anything.
    pub fn problem(&self) -> Option<&'static str> {
        if self.question.trim().is_empty() {
            return Some("empty question");
        }
        if self.correct_answer.trim().is_empty() {
            return Some("empty answer");
        }
        if self.kind.is_multiple_choice()
            && !self.options.iter().any(|o| o.trim() != self.correct_answer.trim())
        {
            return Some("multiple choice without distractors");
        }
        if self.kind.is_fill_blank() && !self.question.contains(BLANK) {
            return Some("fill-in-the-blank question without a blank");
        }
        None
    }
}

/// Generation status of a word's exercises.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum WordContent {
    /// Generation requested, not finished.
    Pending,
    Ready { exercises: Vec<Exercise> },
    Failed { reason: String },
}

impl WordContent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Ready { .. } => "ready",
            Self::Failed { .. } => "failed",
        }
    }
}

/// A vocabulary item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Word {
    pub id: String,
    pub learning_word: String,
    pub native_word: String,
    #[serde(default)]
    pub examples: Vec<Example>,
    pub srs: CardState,
    pub content: WordContent,
    pub created_at: DateTime<Utc>,
}

impl Word {
    pub fn new(
        learning_word: String,
        native_word: String,
        examples: Vec<Example>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: short_id(),
            learning_word,
            native_word,
            examples,
            srs: CardState::new(now),
            content: WordContent::Pending,
            created_at: now,
        }
    }

    /// Generated exercises; empty unless content is ready.
    pub fn exercises(&self) -> &[Exercise] {
        match &self.content {
            WordContent::Ready { exercises } => exercises,
            _ => &[],
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self.content, WordContent::Pending)
    }

    pub fn is_practicable(&self) -> bool {
        !self.exercises().is_empty()
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.srs.is_due(now)
    }

    pub fn matches(&self, learning_word: &str) -> bool {
        self.learning_word.trim().to_lowercase() == learning_word.trim().to_lowercase()
    }
}

/// Statistics for a study set.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct StudySetStats {
    pub total_words: usize,
    pub pending_words: usize,
    pub new_words: usize,
    pub learning_words: usize,
    pub review_words: usize,
    pub relearning_words: usize,
    pub due_words: usize,
}

/// An ordered, named collection of words.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudySet {
    pub id: String,
    pub name: String,
    pub words: Vec<Word>,
    pub created_at: DateTime<Utc>,
}

impl StudySet {
    pub fn new(name: String, now: DateTime<Utc>) -> Self {
        Self {
            id: short_id(),
            name,
            words: Vec::new(),
            created_at: now,
        }
    }

    pub fn word(&self, word_id: &str) -> Option<&Word> {
        self.words.iter().find(|w| w.id == word_id)
    }

    pub fn word_mut(&mut self, word_id: &str) -> Option<&mut Word> {
        self.words.iter_mut().find(|w| w.id == word_id)
    }

    pub fn find_word(&self, learning_word: &str) -> Option<&Word> {
        self.words.iter().find(|w| w.matches(learning_word))
    }

    pub fn remove_word(&mut self, word_id: &str) -> Option<Word> {
        let index = self.words.iter().position(|w| w.id == word_id)?;
        Some(self.words.remove(index))
    }

    pub fn get_stats(&self, now: DateTime<Utc>) -> StudySetStats {
        let mut stats = StudySetStats {
            total_words: self.words.len(),
            ..Default::default()
        };

        for word in &self.words {
            if word.is_pending() {
                stats.pending_words += 1;
            }
            match word.srs.state {
                LearningState::New => stats.new_words += 1,
                LearningState::Learning => stats.learning_words += 1,
                LearningState::Review => stats.review_words += 1,
                LearningState::Relearning => stats.relearning_words += 1,
            }
            if word.is_practicable() && word.is_due(now) {
                stats.due_words += 1;
            }
        }

        stats
    }
}

/// A learner's whole course, stored as one document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Course {
    pub id: String,
    pub learning_language: Language,
    pub native_language: Language,
    #[serde(default)]
    pub study_sets: Vec<StudySet>,
    /// Bumped by the store on every successful save.
    #[serde(default)]
    pub revision: u64,
    pub created_at: DateTime<Utc>,
}

impl Course {
    pub fn new(learning_language: Language, now: DateTime<Utc>) -> Self {
        Self {
            id: short_id(),
            learning_language,
            native_language: Language::site(),
            study_sets: Vec::new(),
            revision: 0,
            created_at: now,
        }
    }

    pub fn study_set(&self, set_id: &str) -> Option<&StudySet> {
        self.study_sets.iter().find(|s| s.id == set_id)
    }

    pub fn study_set_mut(&mut self, set_id: &str) -> Option<&mut StudySet> {
        self.study_sets.iter_mut().find(|s| s.id == set_id)
    }

    /// Find a set by id, or by name ignoring case.
    pub fn find_study_set(&self, key: &str) -> Option<&StudySet> {
        self.study_set(key).or_else(|| {
            let key = key.trim().to_lowercase();
            self.study_sets.iter().find(|s| s.name.to_lowercase() == key)
        })
    }

    pub fn word_count(&self) -> usize {
        self.study_sets.iter().map(|s| s.words.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 2, 1, 0, 0, 0).unwrap()
    }

    fn mc() -> Exercise {
        let mut ex = Exercise::new(
            ExerciseKind::TranslateMc,
            "perro".to_string(),
            "dog".to_string(),
        );
        ex.options = vec!["cat".to_string(), "dog".to_string(), "bird".to_string()];
        ex
    }

    #[test]
    fn answers_compare_loosely() {
        let ex = mc();
        assert!(ex.is_correct("  DOG "));
        assert!(!ex.is_correct("cat"));
    }

    #[test]
    fn choices_are_unique_and_include_answer() {
        let mut rng = StdRng::seed_from_u64(4);
        let choices = mc().choices(&mut rng);
        assert_eq!(choices.len(), 3);
        assert!(choices.contains(&"dog".to_string()));
    }

    #[test]
    fn exercise_problems() {
        assert_eq!(mc().problem(), None);

        let mut no_distractors = mc();
        no_distractors.options = vec!["dog".to_string()];
        assert!(no_distractors.problem().is_some());

        let blank = Exercise::new(
            ExerciseKind::FillBlankType,
            "El perro corre".to_string(),
            "perro".to_string(),
        );
        assert!(blank.problem().is_some());
    }

    #[test]
    fn full_sentence_falls_back_to_filling_blank() {
        let ex = Exercise::new(
            ExerciseKind::FillBlankType,
            format!("El {} corre", BLANK),
            "perro".to_string(),
        );
        assert_eq!(ex.full_sentence(), "El perro corre");
    }

    #[test]
    fn pending_word_has_no_exercises() {
        let mut word = Word::new("perro".into(), "dog".into(), Vec::new(), now());
        assert!(word.is_pending());
        assert!(!word.is_practicable());
        word.content = WordContent::Ready {
            exercises: vec![mc()],
        };
        assert!(word.is_practicable());
        assert!(word.matches("PERRO"));
    }

    #[test]
    fn stats_count_due_practicable_words() {
        let mut set = StudySet::new("Animals".into(), now());
        let mut ready = Word::new("perro".into(), "dog".into(), Vec::new(), now());
        ready.content = WordContent::Ready {
            exercises: vec![mc()],
        };
        set.words.push(ready);
        set.words
            .push(Word::new("gato".into(), "cat".into(), Vec::new(), now()));

        let stats = set.get_stats(now());
        assert_eq!(stats.total_words, 2);
        assert_eq!(stats.pending_words, 1);
        assert_eq!(stats.new_words, 2);
        assert_eq!(stats.due_words, 1);
    }

    #[test]
    fn language_lookup() {
        assert_eq!(Language::find("es").unwrap().name, "Spanish");
        assert_eq!(Language::find("german").unwrap().code, "de");
        assert!(Language::find("klingon").is_none());
        assert_eq!(Language::supported().len(), 10);
    }

    #[test]
    fn word_content_serializes_tagged() {
        let json = serde_json::to_value(WordContent::Pending).unwrap();
        assert_eq!(json["status"], "pending");
        let kind = serde_json::to_value(ExerciseKind::FillBlankMc).unwrap();
        assert_eq!(kind, "FILL_BLANK_MC");
    }
}
