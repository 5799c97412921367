// src/engine/grading.rs

use std::collections::BTreeSet;

use serde::Serialize;

use crate::models::quiz::QuestionKind;

/// Outcome of grading one question. A closed set so the matching logic can
/// be switched on exhaustively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerVerdict {
    Correct,
    /// No identifiers were submitted for this question.
    NoAnswer,
    /// Wrong single-choice selection, or more than one identifier submitted
    /// for a single-choice question.
    Incorrect,
    /// Multiple-choice: at least one submitted identifier is not in the key.
    ExtraSelected,
    /// Multiple-choice: only correct identifiers submitted, but not all of them.
    MissedCorrect,
}

impl AnswerVerdict {
    pub fn is_correct(&self) -> bool {
        matches!(self, AnswerVerdict::Correct)
    }

    /// Explanation shown to the guide next to each question.
    pub fn message(&self) -> &'static str {
        match self {
            AnswerVerdict::Correct => "Your answer is correct.",
            AnswerVerdict::NoAnswer => "You did not provide an answer.",
            AnswerVerdict::Incorrect => "Your answer is incorrect.",
            AnswerVerdict::ExtraSelected => "You selected some incorrect options.",
            AnswerVerdict::MissedCorrect => "You missed some correct options.",
        }
    }
}

/// The options flagged correct for one question. `ids` and `texts` are
/// parallel: `texts[i]` is the display text of the option with `ids[i]`.
#[derive(Debug, Clone, Default)]
pub struct AnswerKey {
    pub ids: Vec<String>,
    pub texts: Vec<String>,
}

/// Per-question grading record, kept verbose so the caller can render an
/// explanation without re-querying anything.
#[derive(Debug, Clone, Serialize)]
pub struct GradedQuestion {
    pub question_id: i64,
    pub is_correct: bool,
    pub user_answers: Vec<String>,
    pub user_answer_texts: Vec<String>,
    pub correct_answers: Vec<String>,
    pub correct_answer_texts: Vec<String>,
    pub reason: String,
    #[serde(skip)]
    pub verdict: AnswerVerdict,
}

/// Grades one question against its answer key.
///
/// Matching is two-tier: option identifiers first, then trimmed display
/// texts. Identifiers are per-question letters and are not stable across
/// quiz edits, so an attempt captured against an older revision can still
/// be honored when the rendered texts line up.
pub fn grade_question(
    question_id: i64,
    kind: QuestionKind,
    key: &AnswerKey,
    submitted_ids: &[String],
    submitted_texts: &[String],
) -> GradedQuestion {
    let verdict = if submitted_ids.is_empty() {
        AnswerVerdict::NoAnswer
    } else {
        match kind {
            QuestionKind::Single => grade_single(key, submitted_ids, submitted_texts),
            QuestionKind::Multiple => grade_multiple(key, submitted_ids, submitted_texts),
        }
    };

    GradedQuestion {
        question_id,
        is_correct: verdict.is_correct(),
        user_answers: submitted_ids.to_vec(),
        user_answer_texts: submitted_texts.to_vec(),
        correct_answers: key.ids.clone(),
        correct_answer_texts: key.texts.clone(),
        reason: verdict.message().to_string(),
        verdict,
    }
}

/// Single choice: exactly one identifier, matching by id or by trimmed text.
fn grade_single(key: &AnswerKey, submitted_ids: &[String], submitted_texts: &[String]) -> AnswerVerdict {
    if submitted_ids.len() != 1 {
        return AnswerVerdict::Incorrect;
    }

    if key.ids.iter().any(|id| id == &submitted_ids[0]) {
        return AnswerVerdict::Correct;
    }

    // Identifier mismatch: fall back to the rendered text of the single
    // correct option.
    let submitted_text = submitted_texts.first().map(|t| t.trim());
    let correct_text = key.texts.first().map(|t| t.trim());
    match (submitted_text, correct_text) {
        (Some(s), Some(c)) if !s.is_empty() && s == c => AnswerVerdict::Correct,
        _ => AnswerVerdict::Incorrect,
    }
}

/// Multiple choice: the submitted identifier set must equal the key set,
/// with a trimmed-text set comparison as the fallback tier.
fn grade_multiple(key: &AnswerKey, submitted_ids: &[String], submitted_texts: &[String]) -> AnswerVerdict {
    let submitted: BTreeSet<&str> = submitted_ids.iter().map(|s| s.as_str()).collect();
    let correct: BTreeSet<&str> = key.ids.iter().map(|s| s.as_str()).collect();

    if submitted == correct {
        return AnswerVerdict::Correct;
    }

    let submitted_text_set: BTreeSet<&str> = submitted_texts.iter().map(|t| t.trim()).collect();
    let correct_text_set: BTreeSet<&str> = key.texts.iter().map(|t| t.trim()).collect();
    if !submitted_text_set.is_empty() && submitted_text_set == correct_text_set {
        return AnswerVerdict::Correct;
    }

    if submitted.difference(&correct).next().is_some() {
        AnswerVerdict::ExtraSelected
    } else {
        AnswerVerdict::MissedCorrect
    }
}

/// Aggregate score as a rounded percentage. A quiz with no questions grades
/// to zero rather than dividing by zero.
pub fn score_percent(correct: usize, total: usize) -> i32 {
    if total == 0 {
        return 0;
    }
    ((correct as f64 / total as f64) * 100.0).round() as i32
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(pairs: &[(&str, &str)]) -> AnswerKey {
        AnswerKey {
            ids: pairs.iter().map(|(id, _)| id.to_string()).collect(),
            texts: pairs.iter().map(|(_, text)| text.to_string()).collect(),
        }
    }

    fn ids(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn single_choice_id_match() {
        let graded = grade_question(
            1,
            QuestionKind::Single,
            &key(&[("B", "Paris")]),
            &ids(&["B"]),
            &ids(&["Paris"]),
        );
        assert!(graded.is_correct);
        assert_eq!(graded.verdict, AnswerVerdict::Correct);
    }

    #[test]
    fn single_choice_text_fallback_is_trim_insensitive() {
        // Option letters were reshuffled by an edit; the submitted option 'C'
        // renders the same text as the correct option 'B', modulo whitespace.
        let graded = grade_question(
            1,
            QuestionKind::Single,
            &key(&[("B", "Paris")]),
            &ids(&["C"]),
            &ids(&["Paris "]),
        );
        assert!(graded.is_correct);
    }

    #[test]
    fn single_choice_wrong_answer() {
        let graded = grade_question(
            1,
            QuestionKind::Single,
            &key(&[("B", "Paris")]),
            &ids(&["A"]),
            &ids(&["London"]),
        );
        assert!(!graded.is_correct);
        assert_eq!(graded.verdict, AnswerVerdict::Incorrect);
    }

    #[test]
    fn single_choice_rejects_multiple_selections() {
        let graded = grade_question(
            1,
            QuestionKind::Single,
            &key(&[("B", "Paris")]),
            &ids(&["A", "B"]),
            &ids(&["London", "Paris"]),
        );
        assert!(!graded.is_correct);
        assert_eq!(graded.verdict, AnswerVerdict::Incorrect);
    }

    #[test]
    fn no_answer_provided() {
        let graded = grade_question(1, QuestionKind::Single, &key(&[("B", "Paris")]), &[], &[]);
        assert_eq!(graded.verdict, AnswerVerdict::NoAnswer);
        assert_eq!(graded.reason, "You did not provide an answer.");
    }

    #[test]
    fn multiple_choice_exact_set_match() {
        let graded = grade_question(
            2,
            QuestionKind::Multiple,
            &key(&[("A", "Hornbill"), ("C", "Orangutan")]),
            &ids(&["C", "A"]),
            &ids(&["Orangutan", "Hornbill"]),
        );
        assert!(graded.is_correct);
    }

    #[test]
    fn multiple_choice_text_fallback() {
        let graded = grade_question(
            2,
            QuestionKind::Multiple,
            &key(&[("A", "Hornbill"), ("C", "Orangutan")]),
            &ids(&["B", "D"]),
            &ids(&[" Hornbill", "Orangutan "]),
        );
        assert!(graded.is_correct);
    }

    #[test]
    fn multiple_choice_partial_miss() {
        let graded = grade_question(
            2,
            QuestionKind::Multiple,
            &key(&[("A", "Hornbill"), ("C", "Orangutan")]),
            &ids(&["A"]),
            &ids(&["Hornbill"]),
        );
        assert!(!graded.is_correct);
        assert_eq!(graded.verdict, AnswerVerdict::MissedCorrect);
        assert_eq!(graded.reason, "You missed some correct options.");
    }

    #[test]
    fn multiple_choice_extra_selection() {
        let graded = grade_question(
            2,
            QuestionKind::Multiple,
            &key(&[("A", "Hornbill")]),
            &ids(&["A", "B"]),
            &ids(&["Hornbill", "Gibbon"]),
        );
        assert!(!graded.is_correct);
        assert_eq!(graded.verdict, AnswerVerdict::ExtraSelected);
        assert_eq!(graded.reason, "You selected some incorrect options.");
    }

    #[test]
    fn multiple_choice_empty_submission_is_no_answer() {
        let graded = grade_question(
            2,
            QuestionKind::Multiple,
            &key(&[("A", "Hornbill")]),
            &[],
            &[],
        );
        assert_eq!(graded.verdict, AnswerVerdict::NoAnswer);
    }

    #[test]
    fn score_rounds_to_nearest_percent() {
        assert_eq!(score_percent(1, 3), 33);
        assert_eq!(score_percent(2, 3), 67);
        assert_eq!(score_percent(1, 2), 50);
        assert_eq!(score_percent(3, 3), 100);
        assert_eq!(score_percent(0, 5), 0);
    }

    #[test]
    fn empty_quiz_scores_zero() {
        assert_eq!(score_percent(0, 0), 0);
    }
}
