//! Exercise generation.
//!
//! Generation is an external concern: a [`ContentGenerator`] receives a word
//! with its context and returns exercises, or fails. [`OfflineGenerator`]
//! builds exercises from the word's own data and its neighbours in the
//! study set, without any network service.

use thiserror::Error;
use tracing::warn;

use crate::models::{Course, Example, Exercise, ExerciseKind, Language, StudySet, Word, BLANK};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum GenerationError {
    #[error("Invalid generation request: {0}")]
    InvalidRequest(String),

    #[error("Content service unavailable: {0}")]
    Unavailable(String),

    #[error("Content service returned an unusable response: {0}")]
    InvalidResponse(String),

    #[error("No usable exercises generated for \"{0}\"")]
    NoExercises(String),
}

/// Everything a generator may use to build exercises for one word.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub learning_word: String,
    pub native_word: String,
    pub learning_language: Language,
    pub native_language: Language,
    pub examples: Vec<Example>,
    /// Native words of other words in the set.
    pub native_distractors: Vec<String>,
    /// Learning words of other words in the set.
    pub learning_distractors: Vec<String>,
}

impl GenerationRequest {
    /// Build a request for `word`, drawing distractors from the rest of `set`.
    pub fn for_word(course: &Course, set: &StudySet, word: &Word) -> Self {
        let others = set.words.iter().filter(|w| w.id != word.id);
        let mut native_distractors = Vec::new();
        let mut learning_distractors = Vec::new();
        for other in others {
            push_distinct(&mut native_distractors, &other.native_word, &word.native_word);
            push_distinct(&mut learning_distractors, &other.learning_word, &word.learning_word);
        }

        Self {
            learning_word: word.learning_word.clone(),
            native_word: word.native_word.clone(),
            learning_language: course.learning_language.clone(),
            native_language: course.native_language.clone(),
            examples: word.examples.clone(),
            native_distractors,
            learning_distractors,
        }
    }
}

fn push_distinct(list: &mut Vec<String>, candidate: &str, answer: &str) {
    let candidate = candidate.trim();
    let lower = candidate.to_lowercase();
    if candidate.is_empty()
        || lower == answer.trim().to_lowercase()
        || list.iter().any(|c| c.to_lowercase() == lower)
    {
        return;
    }
    list.push(candidate.to_string());
}

pub trait ContentGenerator {
    fn name(&self) -> &str;

    fn generate(&self, request: &GenerationRequest) -> Result<Vec<Exercise>, GenerationError>;
}

/// Drop exercises that cannot be shown. Each dropped exercise is logged.
pub fn validate_exercises(word: &str, exercises: Vec<Exercise>) -> Vec<Exercise> {
    exercises
        .into_iter()
        .filter(|exercise| match exercise.problem() {
            None => true,
            Some(problem) => {
                warn!(word, kind = exercise.kind.name(), problem, "Dropping invalid exercise");
                false
            }
        })
        .collect()
}

/// Generates exercises locally from the word, its examples and the other
/// words of its set.
#[derive(Debug, Clone)]
pub struct OfflineGenerator {
    max_options: usize,
}

impl Default for OfflineGenerator {
    fn default() -> Self {
        Self { max_options: 3 }
    }
}

impl OfflineGenerator {
    /// `max_options` distractors at most per multiple-choice exercise.
    pub fn new(max_options: usize) -> Self {
        Self {
            max_options: max_options.max(1),
        }
    }

    fn options(&self, distractors: &[String], answer: &str) -> Vec<String> {
        let mut options: Vec<String> = distractors.iter().take(self.max_options).cloned().collect();
        options.push(answer.to_string());
        options
    }
}

impl ContentGenerator for OfflineGenerator {
    fn name(&self) -> &str {
        "offline"
    }

    fn generate(&self, request: &GenerationRequest) -> Result<Vec<Exercise>, GenerationError> {
        let word = request.learning_word.trim();
        let native = request.native_word.trim();
        if word.is_empty() || native.is_empty() {
            return Err(GenerationError::InvalidRequest(
                "learning and native word must not be empty".to_string(),
            ));
        }

        let mut exercises = Vec::new();

        if !request.native_distractors.is_empty() {
            let mut ex = Exercise::new(
                ExerciseKind::TranslateMc,
                format!(
                    "What does \"{}\" mean in {}?",
                    word, request.native_language.name
                ),
                native.to_string(),
            );
            ex.options = self.options(&request.native_distractors, native);
            exercises.push(ex);
        }

        let blanked = request
            .examples
            .iter()
            .find_map(|example| blank_out(&example.sentence, word).map(|q| (example, q)));
        if let Some((example, question)) = blanked {
            let mut typed = Exercise::new(ExerciseKind::FillBlankType, question.clone(), word.to_string());
            typed.sentence_context = Some(example.sentence.clone());
            typed.translation_context = Some(example.translation.clone());

            if !request.learning_distractors.is_empty() {
                let mut mc = typed.clone();
                mc.id = crate::models::short_id();
                mc.kind = ExerciseKind::FillBlankMc;
                mc.options = self.options(&request.learning_distractors, word);
                exercises.push(mc);
            }
            exercises.push(typed);
        }

        let mut pronounce = Exercise::new(ExerciseKind::PronounceWord, word.to_string(), word.to_string());
        pronounce.translation_context = Some(native.to_string());
        exercises.push(pronounce);

        if let Some(example) = request.examples.iter().find(|e| !e.sentence.trim().is_empty()) {
            let mut sentence = Exercise::new(
                ExerciseKind::PronounceSentence,
                example.sentence.clone(),
                example.sentence.clone(),
            );
            sentence.translation_context = Some(example.translation.clone());
            exercises.push(sentence);
        }

        Ok(exercises)
    }
}

/// Replace the first whole-word occurrence of `word` in `sentence` with the
/// blank. Exact matches win; otherwise single tokens are compared ignoring
/// case and surrounding punctuation.
fn blank_out(sentence: &str, word: &str) -> Option<String> {
    if word.is_empty() {
        return None;
    }
    let on_boundary = |pos: usize| {
        let before = sentence[..pos].chars().next_back();
        let after = sentence[pos + word.len()..].chars().next();
        !before.is_some_and(char::is_alphanumeric) && !after.is_some_and(char::is_alphanumeric)
    };
    if let Some((pos, _)) = sentence.match_indices(word).find(|&(pos, _)| on_boundary(pos)) {
        let mut out = String::with_capacity(sentence.len());
        out.push_str(&sentence[..pos]);
        out.push_str(BLANK);
        out.push_str(&sentence[pos + word.len()..]);
        return Some(out);
    }

    let target = word.to_lowercase();
    let mut found = false;
    let tokens: Vec<String> = sentence
        .split(' ')
        .map(|token| {
            let core = token.trim_matches(|c: char| !c.is_alphanumeric());
            if !found && !core.is_empty() && core.to_lowercase() == target {
                found = true;
                token.replacen(core, BLANK, 1)
            } else {
                token.to_string()
            }
        })
        .collect();
    found.then(|| tokens.join(" "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn request(examples: Vec<Example>, distractors: bool) -> GenerationRequest {
        let (native, learning) = if distractors {
            (
                vec!["cat".to_string(), "house".to_string()],
                vec!["gato".to_string(), "casa".to_string()],
            )
        } else {
            (Vec::new(), Vec::new())
        };
        GenerationRequest {
            learning_word: "perro".into(),
            native_word: "dog".into(),
            learning_language: Language::new("es", "Spanish"),
            native_language: Language::site(),
            examples,
            native_distractors: native,
            learning_distractors: learning,
        }
    }

    fn example(sentence: &str) -> Example {
        Example {
            sentence: sentence.into(),
            translation: "The dog runs.".into(),
        }
    }

    fn kinds(exercises: &[Exercise]) -> Vec<ExerciseKind> {
        exercises.iter().map(|e| e.kind).collect()
    }

    #[test]
    fn full_request_yields_every_kind() {
        let exercises = OfflineGenerator::default()
            .generate(&request(vec![example("El perro corre.")], true))
            .unwrap();
        assert_eq!(
            kinds(&exercises),
            vec![
                ExerciseKind::TranslateMc,
                ExerciseKind::FillBlankMc,
                ExerciseKind::FillBlankType,
                ExerciseKind::PronounceWord,
                ExerciseKind::PronounceSentence,
            ]
        );
        assert!(exercises.iter().all(|e| e.problem().is_none()));
        assert_eq!(exercises[2].question, "El ___ corre.");
        assert_eq!(exercises[2].full_sentence(), "El perro corre.");
        assert_ne!(exercises[1].id, exercises[2].id);
    }

    #[test]
    fn bare_word_still_gets_pronunciation() {
        let exercises = OfflineGenerator::default()
            .generate(&request(Vec::new(), false))
            .unwrap();
        assert_eq!(kinds(&exercises), vec![ExerciseKind::PronounceWord]);
    }

    #[test]
    fn empty_word_is_rejected() {
        let mut req = request(Vec::new(), false);
        req.native_word = "  ".into();
        assert!(matches!(
            OfflineGenerator::default().generate(&req),
            Err(GenerationError::InvalidRequest(_))
        ));
    }

    #[test]
    fn blanking_ignores_case_and_punctuation() {
        assert_eq!(blank_out("Perro, ven aquí", "perro").as_deref(), Some("___, ven aquí"));
        assert_eq!(blank_out("Sin coincidencias", "perro"), None);
        assert_eq!(blank_out("mi perro y tu perro", "perro").as_deref(), Some("mi ___ y tu perro"));
    }

    #[test]
    fn blank_never_splits_a_longer_word() {
        assert_eq!(blank_out("Me gusta amar", "mar"), None);
        assert_eq!(
            blank_out("Voy a amar el mar.", "mar").as_deref(),
            Some("Voy a amar el ___.")
        );
        assert_eq!(
            blank_out("Dilo por favor, ahora.", "por favor").as_deref(),
            Some("Dilo ___, ahora.")
        );
    }

    #[test]
    fn options_are_capped() {
        let mut req = request(Vec::new(), true);
        req.native_distractors = (0..10).map(|i| format!("d{}", i)).collect();
        let exercises = OfflineGenerator::new(2).generate(&req).unwrap();
        assert_eq!(exercises[0].options, vec!["d0", "d1", "dog"]);
    }

    #[test]
    fn request_collects_distinct_distractors() {
        let now = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let course = Course::new(Language::new("es", "Spanish"), now);
        let mut set = StudySet::new("Animals".into(), now);
        set.words.push(Word::new("perro".into(), "dog".into(), Vec::new(), now));
        set.words.push(Word::new("gato".into(), "cat".into(), Vec::new(), now));
        set.words.push(Word::new("can".into(), "Dog".into(), Vec::new(), now));
        set.words.push(Word::new("minino".into(), "cat".into(), Vec::new(), now));

        let req = GenerationRequest::for_word(&course, &set, &set.words[0]);
        assert_eq!(req.native_distractors, vec!["cat"]);
        assert_eq!(req.learning_distractors, vec!["gato", "can", "minino"]);
        assert_eq!(req.native_language.code, "en");
    }

    #[test]
    fn invalid_exercises_are_dropped() {
        let good = Exercise::new(ExerciseKind::PronounceWord, "perro".into(), "perro".into());
        let bad = Exercise::new(ExerciseKind::TranslateMc, "perro".into(), "dog".into());
        let kept = validate_exercises("perro", vec![good.clone(), bad]);
        assert_eq!(kept, vec![good]);
    }
}
