//! End-to-end flows through the workspace and the on-disk stores.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::io::Cursor;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};
use rand::RngCore;

use vocaboost::cli;
use vocaboost::scheduler::IntervalPreview;
use vocaboost::{
    build_practice_queue, CardState, CourseStore, Example, Exercise, ExerciseKind, FsrsScheduler,
    GenerationOutcome, Grade, JsonFileStore, Language, LearningState, MemoryStore,
    OfflineGenerator, ScheduleError, Scheduler, SessionPhase, SqliteStore, UserKey, Word,
    WordContent, WordSession, WordStep, Workspace,
};

fn user() -> UserKey {
    UserKey::parse("Learner@Example.com").unwrap()
}

fn pronounce(text: &str) -> Exercise {
    Exercise::new(ExerciseKind::PronounceWord, text.into(), text.into())
}

/// Records the grade of every call.
#[derive(Default)]
struct RecordingScheduler {
    inner: FsrsScheduler,
    grades: Mutex<Vec<Grade>>,
}

impl Scheduler for RecordingScheduler {
    fn name(&self) -> &'static str {
        "recording"
    }

    fn next_state(
        &self,
        card: &CardState,
        grade: Grade,
        now: DateTime<Utc>,
        rng: &mut dyn RngCore,
    ) -> Result<CardState, ScheduleError> {
        self.grades.lock().unwrap().push(grade);
        self.inner.next_state(card, grade, now, rng)
    }

    fn preview(&self, card: &CardState, now: DateTime<Utc>) -> Result<IntervalPreview, ScheduleError> {
        self.inner.preview(card, now)
    }
}

fn open(store: Arc<dyn CourseStore>) -> Workspace {
    Workspace::open(user(), store, Box::new(FsrsScheduler::default())).unwrap()
}

#[test]
fn three_due_words_one_without_exercises() {
    let now = Utc::now();
    let store: Arc<dyn CourseStore> = Arc::new(MemoryStore::new());
    let mut ws = open(store);
    ws.create_course(Language::new("es", "Spanish"), now).unwrap();
    let set_id = ws.add_study_set("Casa", now).unwrap();

    let mut ids = Vec::new();
    for word in ["mesa", "silla", "puerta"] {
        let added = ws.add_word(&set_id, word, word, Vec::new(), now).unwrap();
        ids.push(added.word_id().to_string());
    }
    ws.finish_generation(&set_id, &ids[0], Ok(vec![pronounce("mesa")]))
        .unwrap();
    ws.finish_generation(&set_id, &ids[2], Ok(vec![pronounce("puerta")]))
        .unwrap();

    // "silla" stays pending: due, but without exercises.
    let later = now + Duration::minutes(1);
    let queue = ws.practice_queue("casa", later).unwrap();
    assert_eq!(queue.len(), 2);
    assert!(queue[0].srs.due <= queue[1].srs.due);
    assert!(queue.iter().all(|w| w.learning_word != "silla"));
}

#[test]
fn single_word_session_with_two_misses_is_one_success() {
    let now = Utc::now();
    let mut set = vocaboost::StudySet::new("Cocina".into(), now);
    let mut word = Word::new("cuchara".into(), "spoon".into(), Vec::new(), now);
    word.content = WordContent::Ready {
        exercises: (0..5).map(|i| pronounce(&format!("cuchara {}", i))).collect(),
    };
    let word_id = word.id.clone();
    set.words.push(word);

    let scheduler = RecordingScheduler::default();
    let mut session = WordSession::new(set.id.clone(), word_id, 17);
    session.start(&set).unwrap();

    let answers = [true, false, true, false, true];
    let mut completed = None;
    for correct in answers {
        if let WordStep::Complete(record) = session.answer(&mut set, &scheduler, correct, now).unwrap() {
            completed = Some(record);
        }
    }

    let record = completed.unwrap();
    assert_eq!(record.grade, Grade::Success);
    assert_eq!(*scheduler.grades.lock().unwrap(), vec![Grade::Success]);
    assert_eq!(session.phase(), SessionPhase::Complete);
    assert_eq!(set.words[0].srs.reps, 1);
}

#[test]
fn json_store_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let now = Utc::now();
    let store: Arc<dyn CourseStore> =
        Arc::new(JsonFileStore::new(dir.path().join("courses")).unwrap());

    let mut ws = open(store.clone());
    ws.create_course(Language::find("french").unwrap(), now).unwrap();
    ws.add_study_set("Verbes", now).unwrap();
    let generator = OfflineGenerator::default();
    let examples = vec![Example {
        sentence: "Je veux manger.".into(),
        translation: "I want to eat.".into(),
    }];
    let (_, outcome) = ws
        .add_and_generate("verbes", "manger", "to eat", examples, &generator, now)
        .unwrap();
    assert!(matches!(outcome, Some(GenerationOutcome::Ready { exercises: 3, .. })));
    ws.close().unwrap();

    let ws = open(store);
    let set = ws.study_set("Verbes").unwrap();
    assert_eq!(set.words.len(), 1);
    let kinds: Vec<ExerciseKind> = set.words[0].exercises().iter().map(|e| e.kind).collect();
    assert!(kinds.contains(&ExerciseKind::FillBlankType));
    assert!(kinds.contains(&ExerciseKind::PronounceSentence));
}

#[test]
fn sqlite_review_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let now = Utc::now();
    let store: Arc<dyn CourseStore> =
        Arc::new(SqliteStore::new(dir.path().join("vocab.db")).unwrap());

    let mut ws = open(store.clone());
    ws.create_course(Language::new("de", "German"), now).unwrap();
    ws.add_study_set("Tiere", now).unwrap();
    let generator = OfflineGenerator::default();
    for (de, en) in [("Hund", "dog"), ("Katze", "cat"), ("Vogel", "bird")] {
        ws.add_and_generate("Tiere", de, en, Vec::new(), &generator, now)
            .unwrap();
    }

    let mut session = ws.start_review("Tiere", now, 99).unwrap();
    let mut graded = 0;
    while session.phase() == SessionPhase::Active {
        ws.grade_review(&mut session, Grade::Fail, now).unwrap();
        graded += 1;
    }
    assert_eq!(graded, 3);
    ws.close().unwrap();

    let ws = open(store);
    let set = ws.study_set("Tiere").unwrap();
    assert!(set
        .words
        .iter()
        .all(|w| w.srs.lapses == 1 && w.srs.state == LearningState::Learning));
    assert!(build_practice_queue(set, now).is_empty());
}

#[test]
fn csv_import_and_scripted_review() {
    let dir = tempfile::tempdir().unwrap();
    let csv = dir.path().join("false_friends.csv");
    std::fs::write(
        &csv,
        "learning,native,sentence,translation\n\
         embarazada,pregnant,\"Ella está embarazada.\",\"She is pregnant.\"\n\
         librería,bookshop,,\n\
         EMBARAZADA,pregnant,,\n",
    )
    .unwrap();

    let store: Arc<dyn CourseStore> = Arc::new(MemoryStore::new());
    let mut ws = open(store);
    ws.create_course(Language::new("es", "Spanish"), Utc::now())
        .unwrap();

    let mut out = Vec::new();
    let generator = OfflineGenerator::default();
    let added = cli::import_csv(&mut ws, &csv, None, &generator, &mut out).unwrap();
    assert_eq!(added, 2);
    assert!(String::from_utf8(out).unwrap().contains("1 duplicates"));

    // One answer line per word. A wrong answer still grades the word.
    let set = ws.study_set("False Friends").unwrap();
    assert_eq!(set.words.len(), 2);
    let mut input = Cursor::new(b"y\ny\ny\ny\n".to_vec());
    let mut out = Vec::new();
    cli::run_review(&mut ws, "False Friends", 4, &mut input, &mut out).unwrap();

    let set = ws.study_set("False Friends").unwrap();
    assert!(set.words.iter().all(|w| w.srs.reps == 1));
    let text = String::from_utf8(out).unwrap();
    assert!(text.contains("[1/2]"));
    assert!(text.contains("Done: 2 reviewed"));
}

#[test]
fn review_of_empty_set_reports_nothing_due() {
    let store: Arc<dyn CourseStore> = Arc::new(MemoryStore::new());
    let mut ws = open(store);
    ws.create_course(Language::new("ja", "Japanese"), Utc::now())
        .unwrap();
    ws.add_study_set("Kanji", Utc::now()).unwrap();

    let mut out = Vec::new();
    cli::run_review(&mut ws, "kanji", 1, &mut Cursor::new(Vec::new()), &mut out).unwrap();
    assert!(String::from_utf8(out).unwrap().contains("Nothing due"));
}
