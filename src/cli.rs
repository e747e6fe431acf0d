//! Terminal front end: command handlers and the interactive session loop.
//!
//! Handlers write to any `Write` and read answers from any `BufRead`, so the
//! binary passes stdin/stdout and tests pass buffers.

use std::io::{BufRead, Write};
use std::path::Path;

use anyhow::{anyhow, bail, Context, Result};
use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use tracing::warn;

use crate::card::Grade;
use crate::content::ContentGenerator;
use crate::models::{Example, Exercise, ExerciseKind, Language};
use crate::scheduler::format_interval;
use crate::session::{GradeRecord, SessionError, SessionPhase, WordStep};
use crate::storage::{filename_to_title_case, read_word_csv};
use crate::workspace::{AddWord, GenerationOutcome, Workspace, WorkspaceError};

const WRAP_WIDTH: usize = 72;

// ══════════════════════════════════════════════════════════════════════════
// Course, sets and words
// ══════════════════════════════════════════════════════════════════════════

pub fn course_init(ws: &mut Workspace, language: &str, out: &mut dyn Write) -> Result<()> {
    let language = Language::find(language).ok_or_else(|| {
        let names: Vec<String> = Language::supported().into_iter().map(|l| l.name).collect();
        anyhow!("Unknown language '{}'. Choose one of: {}", language, names.join(", "))
    })?;
    let course = ws.create_course(language, Utc::now())?;
    writeln!(
        out,
        "✓ Created a {} course (native language: {})",
        course.learning_language.name, course.native_language.name
    )?;
    Ok(())
}

pub fn course_show(ws: &Workspace, now: DateTime<Utc>, out: &mut dyn Write) -> Result<()> {
    let course = ws.course().ok_or(WorkspaceError::NoCourse)?;
    writeln!(
        out,
        "{} → {}  ({} words, {} study sets)",
        course.learning_language.name,
        course.native_language.name,
        course.word_count(),
        course.study_sets.len()
    )?;
    writeln!(out, "Scheduler: {}", ws.scheduler().name())?;
    set_list(ws, now, out)
}

pub fn set_list(ws: &Workspace, now: DateTime<Utc>, out: &mut dyn Write) -> Result<()> {
    let course = ws.course().ok_or(WorkspaceError::NoCourse)?;
    if course.study_sets.is_empty() {
        writeln!(out, "No study sets yet. Add one with `vocab set add <name>`.")?;
        return Ok(());
    }
    for set in &course.study_sets {
        let stats = set.get_stats(now);
        writeln!(
            out,
            "  {:<24} {:>4} words  {:>3} due  (new {}, learning {}, review {}, relearning {})",
            set.name,
            stats.total_words,
            stats.due_words,
            stats.new_words,
            stats.learning_words,
            stats.review_words,
            stats.relearning_words
        )?;
    }
    Ok(())
}

pub fn set_add(ws: &mut Workspace, name: &str, out: &mut dyn Write) -> Result<()> {
    let set_id = ws.add_study_set(name, Utc::now())?;
    writeln!(out, "✓ Added study set '{}'", ws.study_set(&set_id)?.name)?;
    Ok(())
}

pub fn set_remove(ws: &mut Workspace, set: &str, out: &mut dyn Write) -> Result<()> {
    let removed = ws.remove_study_set(set)?;
    writeln!(out, "✓ Removed '{}' ({} words)", removed.name, removed.words.len())?;
    Ok(())
}

pub fn word_remove(ws: &mut Workspace, set: &str, word: &str, out: &mut dyn Write) -> Result<()> {
    let removed = ws.remove_word(set, word)?;
    writeln!(out, "✓ Removed '{}'", removed.learning_word)?;
    Ok(())
}

pub fn word_add(
    ws: &mut Workspace,
    set: &str,
    learning_word: &str,
    native_word: &str,
    examples: Vec<Example>,
    generator: &dyn ContentGenerator,
    out: &mut dyn Write,
) -> Result<()> {
    let (added, outcome) =
        ws.add_and_generate(set, learning_word, native_word, examples, generator, Utc::now())?;
    match (added, outcome) {
        (AddWord::Duplicate { .. }, _) => {
            writeln!(out, "'{}' is already in this set", learning_word.trim())?;
        }
        (_, Some(GenerationOutcome::Ready { exercises, .. })) => {
            writeln!(out, "✓ Added '{}' with {} exercises", learning_word.trim(), exercises)?;
        }
        (_, Some(GenerationOutcome::RolledBack { error, .. })) => {
            writeln!(out, "✗ Could not add '{}': {}", learning_word.trim(), error)?;
        }
        (AddWord::Added { .. }, None) => {}
    }
    Ok(())
}

pub fn word_list(ws: &Workspace, set: &str, now: DateTime<Utc>, out: &mut dyn Write) -> Result<()> {
    let set = ws.study_set(set)?;
    if set.words.is_empty() {
        writeln!(out, "'{}' has no words yet", set.name)?;
        return Ok(());
    }
    for word in &set.words {
        let due = if word.is_due(now) {
            "due".to_string()
        } else {
            let days = (word.srs.due - now).num_seconds() as f64 / 86_400.0;
            format!("in {}", format_interval(days))
        };
        writeln!(
            out,
            "  {:<20} {:<20} {:<10} {:<8} {}",
            word.learning_word,
            word.native_word,
            word.srs.state.name(),
            due,
            word.content.name()
        )?;
    }
    Ok(())
}

pub fn due(ws: &Workspace, set: &str, now: DateTime<Utc>, out: &mut dyn Write) -> Result<()> {
    let queue = ws.practice_queue(set, now)?;
    if queue.is_empty() {
        writeln!(out, "Nothing due. ✓")?;
        return Ok(());
    }
    writeln!(out, "{} due:", queue.len())?;
    for word in queue {
        writeln!(out, "  {:<20} {}", word.learning_word, word.srs.state.name())?;
    }
    Ok(())
}

/// Import a CSV word list into `set`, or into a set named after the file.
/// Returns the number of words added.
pub fn import_csv(
    ws: &mut Workspace,
    path: &Path,
    set: Option<&str>,
    generator: &dyn ContentGenerator,
    out: &mut dyn Write,
) -> Result<usize> {
    let words = read_word_csv(path).with_context(|| format!("Failed to read {:?}", path))?;
    let set_name = match set {
        Some(name) => name.to_string(),
        None => path
            .file_stem()
            .and_then(|s| s.to_str())
            .map(filename_to_title_case)
            .unwrap_or_else(|| "Imported Words".to_string()),
    };
    if ws.study_set(&set_name).is_err() {
        ws.add_study_set(&set_name, Utc::now())?;
    }

    let (mut added, mut duplicates, mut failed) = (0, 0, 0);
    for row in words {
        let examples = row.example.into_iter().collect();
        let (result, outcome) = ws.add_and_generate(
            &set_name,
            &row.learning_word,
            &row.native_word,
            examples,
            generator,
            Utc::now(),
        )?;
        match (result, outcome) {
            (AddWord::Duplicate { .. }, _) => duplicates += 1,
            (_, Some(GenerationOutcome::RolledBack { error, .. })) => {
                warn!(word = %row.learning_word, %error, "Import of word failed");
                failed += 1;
            }
            _ => added += 1,
        }
    }

    writeln!(
        out,
        "✓ Imported {} words into '{}' ({} duplicates, {} failed)",
        added, set_name, duplicates, failed
    )?;
    Ok(added)
}

// ══════════════════════════════════════════════════════════════════════════
// Sessions
// ══════════════════════════════════════════════════════════════════════════

pub fn run_review(
    ws: &mut Workspace,
    set: &str,
    seed: u64,
    input: &mut dyn BufRead,
    out: &mut dyn Write,
) -> Result<()> {
    let mut session = ws.start_review(set, Utc::now(), seed)?;
    if session.phase() == SessionPhase::Complete {
        writeln!(out, "Nothing due in '{}'. ✓", ws.study_set(set)?.name)?;
        return Ok(());
    }

    while session.phase() == SessionPhase::Active {
        let (Some(exercise), Some(word_id)) = (
            session.current_exercise().cloned(),
            session.current_word_id().map(str::to_string),
        ) else {
            break;
        };
        let (position, total) = session.progress();
        writeln!(out, "\n[{}/{}] {}", position, total, exercise.kind.name())?;
        if let Ok(preview) = ws.preview(session.set_id(), &word_id, Utc::now()) {
            writeln!(
                out,
                "      (correct: {}, wrong: {})",
                format_interval(preview.success),
                format_interval(preview.fail)
            )?;
        }

        let Some(correct) = ask(&exercise, session.rng(), input, out)? else {
            writeln!(out, "\nSession ended early. Graded words are saved.")?;
            return Ok(());
        };

        match ws.grade_review(&mut session, Grade::from_correct(correct), Utc::now()) {
            Ok(record) => report_grade(&record, out)?,
            Err(WorkspaceError::Store(e)) => {
                warn!(error = %e, "Review result not saved yet");
                writeln!(out, "! Could not save progress ({}); will retry", e)?;
            }
            Err(WorkspaceError::Session(SessionError::WordNotFound(_))) => {
                writeln!(out, "  Word was removed from the set; skipped")?;
            }
            Err(e) => return Err(e.into()),
        }
    }

    let summary = session.summary();
    writeln!(
        out,
        "\nDone: {} reviewed, {} correct{}",
        summary.graded,
        summary.successes,
        if summary.skipped > 0 {
            format!(", {} skipped", summary.skipped)
        } else {
            String::new()
        }
    )?;
    ws.flush()?;
    Ok(())
}

pub fn run_practice(
    ws: &mut Workspace,
    set: &str,
    word: &str,
    seed: u64,
    input: &mut dyn BufRead,
    out: &mut dyn Write,
) -> Result<()> {
    let mut session = ws.start_word_practice(set, word, seed)?;

    while let Some(exercise) = session.current_exercise().cloned() {
        let (position, total) = session.progress();
        writeln!(out, "\n[{}/{}] {}", position, total, exercise.kind.name())?;

        let Some(correct) = ask(&exercise, session.rng(), input, out)? else {
            writeln!(out, "\nPractice ended early. Nothing was graded.")?;
            return Ok(());
        };

        match ws.record_word_practice(&mut session, correct, Utc::now()) {
            Ok(WordStep::Next) => {}
            Ok(WordStep::Complete(record)) => {
                let results = session.results();
                let right = results.iter().filter(|&&r| r).count();
                writeln!(out, "\n{}/{} correct", right, results.len())?;
                report_grade(&record, out)?;
            }
            Err(WorkspaceError::Store(e)) => {
                warn!(error = %e, "Practice result not saved yet");
                writeln!(out, "! Could not save progress ({}); will retry", e)?;
            }
            Err(e) => return Err(e.into()),
        }
    }

    ws.flush()?;
    Ok(())
}

fn report_grade(record: &GradeRecord, out: &mut dyn Write) -> Result<()> {
    writeln!(
        out,
        "{} Next review in {} ({})",
        if record.grade.is_success() { "✓" } else { "✗" },
        format_interval(record.after.scheduled_days),
        record.after.state
    )?;
    Ok(())
}

/// Read one trimmed line; `None` at end of input or on `q`.
fn read_answer(input: &mut dyn BufRead, out: &mut dyn Write, prompt: &str) -> Result<Option<String>> {
    write!(out, "{}", prompt)?;
    out.flush()?;
    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Ok(None);
    }
    let line = line.trim().to_string();
    if line.eq_ignore_ascii_case("q") {
        return Ok(None);
    }
    Ok(Some(line))
}

/// Present one exercise and return whether it was answered correctly.
fn ask(
    exercise: &Exercise,
    rng: &mut StdRng,
    input: &mut dyn BufRead,
    out: &mut dyn Write,
) -> Result<Option<bool>> {
    writeln!(out, "{}", textwrap::fill(&exercise.question, WRAP_WIDTH))?;
    if exercise.kind.is_fill_blank() {
        if let Some(hint) = &exercise.translation_context {
            writeln!(out, "{}", textwrap::fill(&format!("({})", hint), WRAP_WIDTH))?;
        }
    }

    let correct = match exercise.kind {
        ExerciseKind::TranslateMc | ExerciseKind::FillBlankMc => {
            let choices = exercise.choices(rng);
            for (i, choice) in choices.iter().enumerate() {
                writeln!(out, "  {}) {}", i + 1, choice)?;
            }
            let Some(answer) = read_answer(input, out, "> ")? else {
                return Ok(None);
            };
            let picked = answer
                .parse::<usize>()
                .ok()
                .and_then(|n| n.checked_sub(1))
                .and_then(|i| choices.get(i))
                .cloned()
                .unwrap_or(answer);
            exercise.is_correct(&picked)
        }
        ExerciseKind::FillBlankType => {
            let Some(answer) = read_answer(input, out, "> ")? else {
                return Ok(None);
            };
            exercise.is_correct(&answer)
        }
        ExerciseKind::PronounceWord | ExerciseKind::PronounceSentence => {
            if let Some(meaning) = &exercise.translation_context {
                writeln!(out, "({})", meaning)?;
            }
            loop {
                let Some(answer) = read_answer(input, out, "Say it aloud. Did you get it right? [y/n] ")?
                else {
                    return Ok(None);
                };
                match answer.chars().next().and_then(Grade::from_key) {
                    Some(grade) => break grade.is_success(),
                    None => continue,
                }
            }
        }
    };

    if !exercise.kind.is_self_graded() {
        if correct {
            writeln!(out, "Correct!")?;
        } else {
            writeln!(out, "Answer: {}", exercise.correct_answer)?;
        }
        if exercise.kind.is_fill_blank() {
            writeln!(out, "{}", textwrap::fill(&exercise.full_sentence(), WRAP_WIDTH))?;
        }
    }
    Ok(Some(correct))
}

/// Parse the optional example given on the command line.
pub fn example_from_args(sentence: Option<String>, translation: Option<String>) -> Result<Vec<Example>> {
    match (sentence, translation) {
        (Some(sentence), translation) => Ok(vec![Example {
            sentence,
            translation: translation.unwrap_or_default(),
        }]),
        (None, Some(_)) => bail!("--sentence-translation needs --sentence"),
        (None, None) => Ok(Vec::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::BLANK;
    use rand::SeedableRng;
    use std::io::Cursor;

    fn run_ask(exercise: &Exercise, input: &str) -> (Option<bool>, String) {
        let mut rng = StdRng::seed_from_u64(1);
        let mut input = Cursor::new(input.as_bytes().to_vec());
        let mut out = Vec::new();
        let result = ask(exercise, &mut rng, &mut input, &mut out).unwrap();
        (result, String::from_utf8(out).unwrap())
    }

    #[test]
    fn typed_answer_is_checked_loosely() {
        let mut ex = Exercise::new(
            ExerciseKind::FillBlankType,
            format!("El {} ladra", BLANK),
            "perro".into(),
        );
        ex.translation_context = Some("The dog barks".into());
        let (result, output) = run_ask(&ex, " Perro\n");
        assert_eq!(result, Some(true));
        assert!(output.contains("El perro ladra"));
    }

    #[test]
    fn choice_by_number_or_text() {
        let mut ex = Exercise::new(ExerciseKind::TranslateMc, "perro".into(), "dog".into());
        ex.options = vec!["cat".into(), "dog".into()];

        let (by_text, _) = run_ask(&ex, "dog\n");
        assert_eq!(by_text, Some(true));

        let mut rng = StdRng::seed_from_u64(1);
        let choices = ex.choices(&mut rng);
        let index = choices.iter().position(|c| c == "cat").unwrap() + 1;
        let (by_number, output) = run_ask(&ex, &format!("{}\n", index));
        assert_eq!(by_number, Some(false));
        assert!(output.contains("Answer: dog"));
    }

    #[test]
    fn pronunciation_reprompts_until_y_or_n() {
        let ex = Exercise::new(ExerciseKind::PronounceWord, "perro".into(), "perro".into());
        let (result, _) = run_ask(&ex, "maybe\ny\n");
        assert_eq!(result, Some(true));
    }

    #[test]
    fn end_of_input_or_q_abandons() {
        let ex = Exercise::new(ExerciseKind::PronounceWord, "perro".into(), "perro".into());
        assert_eq!(run_ask(&ex, "").0, None);
        assert_eq!(run_ask(&ex, "q\n").0, None);
    }

    #[test]
    fn example_arguments() {
        assert!(example_from_args(None, None).unwrap().is_empty());
        assert_eq!(
            example_from_args(Some("Hola".into()), None).unwrap()[0].translation,
            ""
        );
        assert!(example_from_args(None, Some("Hi".into())).is_err());
    }

    #[test]
    fn set_and_word_handlers_write_to_output() {
        use crate::content::OfflineGenerator;
        use crate::scheduler::FsrsScheduler;
        use crate::storage::{MemoryStore, UserKey};
        use std::sync::Arc;

        let mut ws = Workspace::open(
            UserKey::parse("ana@example.com").unwrap(),
            Arc::new(MemoryStore::new()),
            Box::new(FsrsScheduler::default()),
        )
        .unwrap();
        let mut out = Vec::new();
        course_init(&mut ws, "es", &mut out).unwrap();
        set_add(&mut ws, "  Animales ", &mut out).unwrap();
        word_add(
            &mut ws,
            "animales",
            "perro",
            "dog",
            Vec::new(),
            &OfflineGenerator::default(),
            &mut out,
        )
        .unwrap();
        word_remove(&mut ws, "animales", "perro", &mut out).unwrap();
        set_remove(&mut ws, "animales", &mut out).unwrap();

        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("✓ Added study set 'Animales'"));
        assert!(text.contains("✓ Removed 'perro'"));
        assert!(text.contains("✓ Removed 'Animales' (0 words)"));
        assert!(ws.study_set("Animales").is_err());
    }
}
