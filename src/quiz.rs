/**
 * The core data model: multiple-choice questions, per-question statistics,
 * quiz results and grading, and the interactive quiz-taking flow.
 */
use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use unicode_normalization::UnicodeNormalization;

use super::common::{FilterOptions, QuizError, Result, TakeOptions};
use super::repetition;
use super::ui::CmdUI;


/// The letters used to label answer alternatives, in display order.
pub const LETTERS: &str = "abcde";


/// Represents an entire question bank.
#[derive(Debug)]
pub struct Quiz {
    pub questions: Vec<Question>,
}


/// Represents a single multiple-choice question.
#[derive(Debug, Clone)]
pub struct Question {
    pub id: i64,
    pub text: String,
    /// Supplementary formula, stored as raw LaTeX source and shown as plain
    /// text.
    pub formula: Option<String>,
    /// Answer alternatives, in authored order. The order is part of the bank
    /// format: `correct` refers to positions in this list.
    pub alternatives: Vec<String>,
    /// Indices into `alternatives` that count as correct. Never empty.
    pub correct: Vec<usize>,
    pub category: String,
    /// Image file reference, carried through storage but never displayed.
    pub image: Option<String>,
}


/// Running statistics for one question, for one user.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct QuestionStats {
    pub correct: u32,
    pub wrong: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_seen: Option<DateTime<Utc>>,
}


/// Represents the result of answering a question on a particular occasion.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct AnswerRecord {
    pub id: i64,
    /// Index of the alternative the user chose.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chosen: Option<usize>,
    pub correct: bool,
}


/// Represents the results of taking a quiz on a particular occasion.
#[derive(Debug)]
pub struct QuizResult {
    pub time_finished: DateTime<Utc>,
    pub total: usize,
    pub total_correct: usize,
    pub total_incorrect: usize,
    /// Percentage of questions answered correctly.
    pub score: f64,
    pub grade: char,
    pub per_question: Vec<AnswerRecord>,
}


impl Quiz {
    pub fn new(questions: Vec<Question>) -> Self {
        Quiz { questions }
    }

    /// Take the quiz and return the overall result, or `None` if the user
    /// abandoned the quiz partway through. An abandoned quiz is discarded
    /// entirely; nothing about it is recorded.
    pub fn take(
        &self,
        ui: &mut CmdUI,
        stats: &BTreeMap<i64, QuestionStats>,
        options: &TakeOptions,
    ) -> Result<Option<QuizResult>> {
        let questions = repetition::choose_questions(&self.questions, stats, options);
        if questions.len() == 0 {
            return Err(QuizError::EmptyQuiz);
        }

        let mut results = Vec::new();
        ui.begin(questions.len());
        for question in questions.iter() {
            ui.next();
            match question.ask(ui) {
                Ok(result) => {
                    results.push(result);
                },
                Err(QuizError::ReadlineInterrupted) => {
                    return Ok(None);
                },
                Err(e) => {
                    return Err(e);
                },
            }
        }

        let total = results.len();
        let total_correct = results.iter().filter(|r| r.correct).count();
        let total_incorrect = total - total_correct;
        let score = if total > 0 {
            100.0 * (total_correct as f64) / (total as f64)
        } else {
            0.0
        };
        Ok(Some(QuizResult {
            time_finished: Utc::now(),
            total,
            total_correct,
            total_incorrect,
            score,
            grade: letter_grade(score),
            per_question: results,
        }))
    }

    /// Return the questions that satisfy the category filters in `options`.
    pub fn filter_questions(&self, options: &FilterOptions) -> Vec<&Question> {
        let mut candidates = Vec::new();
        for question in self.questions.iter() {
            if filter_question(question, options) {
                candidates.push(question);
            }
        }
        candidates
    }

    pub fn question_by_id(&self, id: i64) -> Option<&Question> {
        self.questions.iter().find(|q| q.id == id)
    }
}


impl Question {
    /// Ask the question, wait for a letter answer, and print feedback.
    fn ask(&self, ui: &mut CmdUI) -> Result<AnswerRecord> {
        ui.text(&self.text)?;
        if let Some(formula) = &self.formula {
            ui.formula(formula)?;
        }
        ui.choices(&self.alternatives)?;

        loop {
            match ui.prompt()? {
                Some(response) => {
                    if let Some(chosen) = parse_choice(&response, self.alternatives.len()) {
                        let correct = self.correct.contains(&chosen);
                        if correct {
                            ui.correct()?;
                        } else {
                            ui.incorrect(&self.alternatives[self.correct[0]])?;
                        }
                        return Ok(AnswerRecord {
                            id: self.id,
                            chosen: Some(chosen),
                            correct,
                        });
                    }
                    ui.bad_choice()?;
                },
                // End of input is treated the same as an interrupt: the quiz
                // is abandoned.
                None => {
                    return Err(QuizError::ReadlineInterrupted);
                },
            }
        }
    }

    /// Return `true` if the question text contains `term`, ignoring case and
    /// Unicode representation.
    pub fn matches(&self, term: &str) -> bool {
        normalize(&self.text).contains(&normalize(term))
    }
}


impl QuestionStats {
    pub fn attempts(&self) -> u32 {
        self.correct + self.wrong
    }

    /// The fraction of attempts that were answered correctly. A question that
    /// has never been attempted sits in the middle, at 0.5.
    pub fn accuracy(&self) -> f64 {
        let attempts = self.attempts();
        if attempts == 0 {
            0.5
        } else {
            f64::from(self.correct) / f64::from(attempts)
        }
    }
}


/// Return `true` if `q` satisfies the category filters in `options`.
pub fn filter_question(q: &Question, options: &FilterOptions) -> bool {
    // Either no categories were specified, or `q` belongs to one of them.
    (options.categories.len() == 0
        || options.categories.iter().any(|c| same_category(c, &q.category)))
        // `q` must not belong to an excluded category.
        && options.exclude.iter().all(|c| !same_category(c, &q.category))
}


/// Compare two category names, ignoring case and Unicode representation.
fn same_category(a: &str, b: &str) -> bool {
    normalize(a) == normalize(b)
}


/// Lowercase and NFC-normalize a string for comparison.
pub fn normalize(text: &str) -> String {
    text.to_lowercase().nfc().collect::<String>()
}


/// Parse a single-letter response into an alternative index.
pub fn parse_choice(response: &str, num_alternatives: usize) -> Option<usize> {
    let response = response.trim().to_lowercase();
    let mut chars = response.chars();
    let letter = chars.next()?;
    if chars.next().is_some() {
        return None;
    }
    let index = LETTERS.chars().position(|c| c == letter)?;
    if index < num_alternatives {
        Some(index)
    } else {
        None
    }
}


/// The letter grade for a percentage score, on an A to F scale.
pub fn letter_grade(score: f64) -> char {
    const STEPS: [(f64, char); 5] =
        [(90.0, 'A'), (72.0, 'B'), (62.0, 'C'), (48.0, 'D'), (38.0, 'E')];
    for (limit, grade) in STEPS.iter() {
        if score >= *limit {
            return *grade;
        }
    }
    'F'
}
