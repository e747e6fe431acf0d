//! Practice queue construction.

use chrono::{DateTime, Utc};

use crate::models::{StudySet, Word};

/// Words of `set` that are due at `now` and have exercises, earliest due
/// first. Equal due times keep the set's insertion order.
pub fn build_practice_queue(set: &StudySet, now: DateTime<Utc>) -> Vec<&Word> {
    let mut queue: Vec<&Word> = set
        .words
        .iter()
        .filter(|w| w.is_practicable() && w.is_due(now))
        .collect();
    // sort_by_key is stable
    queue.sort_by_key(|w| w.srs.due);
    queue
}

/// Same as [`build_practice_queue`], truncated to `limit` words when set.
pub fn build_limited_queue(set: &StudySet, now: DateTime<Utc>, limit: Option<usize>) -> Vec<&Word> {
    let mut queue = build_practice_queue(set, now);
    if let Some(limit) = limit {
        queue.truncate(limit);
    }
    queue
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Exercise, ExerciseKind, WordContent};
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 4, 2, 10, 0, 0).unwrap()
    }

    fn word(name: &str, due: DateTime<Utc>, ready: bool) -> Word {
        let mut w = Word::new(name.to_string(), name.to_uppercase(), Vec::new(), now());
        w.srs.due = due;
        if ready {
            w.content = WordContent::Ready {
                exercises: vec![Exercise::new(
                    ExerciseKind::PronounceWord,
                    name.to_string(),
                    name.to_string(),
                )],
            };
        }
        w
    }

    fn names(queue: &[&Word]) -> Vec<String> {
        queue.iter().map(|w| w.learning_word.clone()).collect()
    }

    #[test]
    fn excludes_words_without_exercises() {
        let mut set = StudySet::new("s".into(), now());
        set.words.push(word("uno", now() - Duration::hours(1), true));
        set.words.push(word("dos", now() - Duration::hours(3), false));
        set.words.push(word("tres", now() - Duration::hours(2), true));

        let queue = build_practice_queue(&set, now());
        assert_eq!(names(&queue), vec!["tres", "uno"]);
    }

    #[test]
    fn excludes_future_words() {
        let mut set = StudySet::new("s".into(), now());
        set.words.push(word("uno", now() + Duration::minutes(1), true));
        set.words.push(word("dos", now(), true));

        assert_eq!(names(&build_practice_queue(&set, now())), vec!["dos"]);
    }

    #[test]
    fn ties_keep_insertion_order() {
        let mut set = StudySet::new("s".into(), now());
        let due = now() - Duration::days(1);
        for name in ["a", "b", "c", "d"] {
            set.words.push(word(name, due, true));
        }
        assert_eq!(
            names(&build_practice_queue(&set, now())),
            vec!["a", "b", "c", "d"]
        );
    }

    #[test]
    fn limit_truncates_after_sorting() {
        let mut set = StudySet::new("s".into(), now());
        set.words.push(word("late", now() - Duration::hours(1), true));
        set.words.push(word("early", now() - Duration::hours(9), true));

        let queue = build_limited_queue(&set, now(), Some(1));
        assert_eq!(names(&queue), vec!["early"]);
        assert_eq!(build_limited_queue(&set, now(), None).len(), 2);
    }

    #[test]
    fn empty_set_gives_empty_queue() {
        let set = StudySet::new("s".into(), now());
        assert!(build_practice_queue(&set, now()).is_empty());
    }
}
