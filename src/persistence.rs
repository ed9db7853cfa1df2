/**
 * Functions and data structures for reading and writing question banks and
 * user records in the filesystem.
 *
 * A question bank is a semicolon-delimited CSV file with one question per
 * row. User records are JSON files in a `results` directory next to the
 * bank, one per (bank, user) pair.
 */
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use log::debug;
use serde::{Deserialize, Serialize};

use super::common::{QuizError, Result};
use super::quiz::{AnswerRecord, Question, QuestionStats, Quiz, QuizResult};


/// Load a `Quiz` object from the bank file at `path`.
pub fn load_bank(path: &Path) -> Result<Quiz> {
    let questions = read_bank_file(path)?;
    Ok(Quiz::new(questions))
}


/// The column layout of a bank file. `_correct_alt` holds one or more
/// references of the form `_altN`, joined by slashes.
#[derive(Serialize, Deserialize, Debug)]
struct BankRecord {
    #[serde(rename = "_pid")]
    pid: i64,
    #[serde(rename = "_question")]
    question: String,
    #[serde(rename = "_latex")]
    latex: Option<String>,
    #[serde(rename = "_alt1")]
    alt1: Option<String>,
    #[serde(rename = "_alt2")]
    alt2: Option<String>,
    #[serde(rename = "_alt3")]
    alt3: Option<String>,
    #[serde(rename = "_alt4")]
    alt4: Option<String>,
    #[serde(rename = "_alt5")]
    alt5: Option<String>,
    #[serde(rename = "_correct_alt")]
    correct_alt: String,
    #[serde(rename = "_genre")]
    genre: String,
    #[serde(rename = "_image")]
    image: Option<String>,
}


/// Read and validate the questions in a bank file. Any malformed row fails
/// the whole read; there are no partial loads.
pub fn read_bank_file(path: &Path) -> Result<Vec<Question>> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b';')
        .from_path(path)
        .map_err(QuizError::Csv)?;
    let headers = reader.headers().map_err(QuizError::Csv)?.clone();

    let mut questions: Vec<Question> = Vec::new();
    for (i, row) in reader.records().enumerate() {
        let row = row.map_err(QuizError::Csv)?;
        let line = row.position().map(|p| p.line()).unwrap_or((i + 2) as u64);
        let record: BankRecord = row.deserialize(Some(&headers)).map_err(QuizError::Csv)?;
        let question = record_to_question(&record, path, line)?;
        if questions.iter().any(|q| q.id == question.id) {
            return Err(bad_question(
                path,
                line,
                format!("duplicate question id {}", question.id),
            ));
        }
        questions.push(question);
    }

    let mut categories: Vec<&str> = Vec::new();
    for question in questions.iter() {
        if !categories.contains(&question.category.as_str()) {
            categories.push(question.category.as_str());
        }
    }
    debug!(
        "loaded {} questions in {} categories from {}",
        questions.len(),
        categories.len(),
        path.display()
    );
    Ok(questions)
}


/// Write `questions` to `path` in the bank format.
pub fn write_bank(path: &Path, questions: &[Question]) -> Result<()> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(b';')
        .from_path(path)
        .map_err(|_| QuizError::CannotWriteToFile(path.to_path_buf()))?;
    for question in questions.iter() {
        writer.serialize(question_to_record(question)).map_err(QuizError::Csv)?;
    }
    writer.flush().map_err(QuizError::Io)?;
    Ok(())
}


fn record_to_question(record: &BankRecord, path: &Path, line: u64) -> Result<Question> {
    let text = record.question.trim();
    if text.is_empty() {
        return Err(bad_question(path, line, String::from("question text is empty")));
    }

    let category = record.genre.trim();
    if category.is_empty() {
        return Err(bad_question(path, line, String::from("question has no category")));
    }

    let alts = [
        trimmed(&record.alt1),
        trimmed(&record.alt2),
        trimmed(&record.alt3),
        trimmed(&record.alt4),
        trimmed(&record.alt5),
    ];
    let count = alts.iter().take_while(|alt| !alt.is_empty()).count();
    if alts[count..].iter().any(|alt| !alt.is_empty()) {
        return Err(bad_question(
            path,
            line,
            String::from("gap in alternatives (only trailing alternatives may be empty)"),
        ));
    }
    if count < 2 {
        return Err(bad_question(
            path,
            line,
            String::from("a question needs at least two alternatives"),
        ));
    }
    let alternatives: Vec<String> = alts[..count].iter().map(|alt| String::from(*alt)).collect();

    let mut correct = Vec::new();
    for part in record.correct_alt.split('/') {
        let part = part.trim();
        let index = part
            .strip_prefix("_alt")
            .and_then(|n| n.parse::<usize>().ok())
            .ok_or_else(|| {
                bad_question(
                    path,
                    line,
                    format!("could not parse correct alternative '{}'", part),
                )
            })?;
        if index < 1 || index > alternatives.len() {
            return Err(bad_question(
                path,
                line,
                format!("correct alternative '{}' is out of range", part),
            ));
        }
        if !correct.contains(&(index - 1)) {
            correct.push(index - 1);
        }
    }

    Ok(Question {
        id: record.pid,
        text: String::from(text),
        formula: optional(&record.latex),
        alternatives,
        correct,
        category: String::from(category),
        image: optional(&record.image),
    })
}


fn question_to_record(question: &Question) -> BankRecord {
    let mut alts = [None, None, None, None, None];
    for (i, alt) in question.alternatives.iter().enumerate() {
        alts[i] = Some(alt.clone());
    }
    let [alt1, alt2, alt3, alt4, alt5] = alts;

    let correct_alt = question
        .correct
        .iter()
        .map(|i| format!("_alt{}", i + 1))
        .collect::<Vec<String>>()
        .join("/");

    BankRecord {
        pid: question.id,
        question: question.text.clone(),
        latex: question.formula.clone(),
        alt1,
        alt2,
        alt3,
        alt4,
        alt5,
        correct_alt,
        genre: question.category.clone(),
        image: question.image.clone(),
    }
}


fn trimmed(field: &Option<String>) -> &str {
    field.as_ref().map(|text| text.trim()).unwrap_or("")
}


fn optional(field: &Option<String>) -> Option<String> {
    let text = trimmed(field);
    if text.is_empty() {
        None
    } else {
        Some(String::from(text))
    }
}


fn bad_question(path: &Path, line: u64, message: String) -> QuizError {
    QuizError::BadQuestion { path: path.to_path_buf(), line, message }
}


/// Everything stored on disk for one (bank, user) pair.
#[derive(Serialize, Deserialize, Debug, Default)]
pub struct UserRecord {
    #[serde(default)]
    pub stats: BTreeMap<i64, QuestionStats>,
    #[serde(default)]
    pub sittings: Vec<SittingRecord>,
}


/// One finished quiz.
#[derive(Serialize, Deserialize, Debug)]
pub struct SittingRecord {
    pub taken_at: DateTime<Utc>,
    pub total: usize,
    pub total_correct: usize,
    pub score: f64,
    pub grade: char,
    pub per_question: Vec<AnswerRecord>,
}


impl UserRecord {
    /// Fold a finished quiz into the running statistics and the history.
    pub fn record(&mut self, result: &QuizResult) {
        for answer in result.per_question.iter() {
            let stats = self.stats.entry(answer.id).or_insert_with(QuestionStats::default);
            if answer.correct {
                stats.correct += 1;
            } else {
                stats.wrong += 1;
            }
            stats.last_seen = Some(result.time_finished);
        }
        self.sittings.push(SittingRecord {
            taken_at: result.time_finished,
            total: result.total,
            total_correct: result.total_correct,
            score: result.score,
            grade: result.grade,
            per_question: result.per_question.clone(),
        });
    }
}


/// Load the record for `user`, or an empty record if none has been saved yet.
/// A present but unreadable record is an error.
pub fn load_user_record(bank_path: &Path, user: &str) -> Result<UserRecord> {
    let path = get_record_path(bank_path, user)?;
    match fs::read_to_string(&path) {
        Ok(data) => serde_json::from_str(&data).map_err(QuizError::Json),
        Err(_) => Ok(UserRecord::default()),
    }
}


/// Save `record`, creating the results directory next to the bank if it does
/// not exist yet.
pub fn save_user_record(bank_path: &Path, user: &str, record: &UserRecord) -> Result<()> {
    let results_dir = get_results_dir_path(bank_path);
    if !results_dir.as_path().exists() {
        fs::create_dir(&results_dir).map_err(QuizError::Io)?;
    }

    let path = get_record_path(bank_path, user)?;
    let serialized = serde_json::to_string_pretty(record).map_err(QuizError::Json)?;
    fs::write(&path, serialized).or(Err(QuizError::CannotWriteToFile(path.clone())))?;
    debug!(
        "saved record with {} sittings for user '{}' to {}",
        record.sittings.len(),
        user,
        path.display()
    );
    Ok(())
}


fn get_results_dir_path(bank_path: &Path) -> PathBuf {
    let mut builder = if let Some(parent) = bank_path.parent() {
        parent.to_path_buf()
    } else {
        PathBuf::new()
    };
    builder.push("results");
    builder
}


/// The record file for `user` lives in the results directory next to the
/// bank, e.g. `banks/results/main_alice.json` for `banks/main.csv`.
pub fn get_record_path(bank_path: &Path, user: &str) -> Result<PathBuf> {
    let shortname = bank_path
        .file_stem()
        .and_then(|name| name.to_str())
        .ok_or_else(|| QuizError::BankNotFound(bank_path.to_string_lossy().into_owned()))?;

    let mut builder = get_results_dir_path(bank_path);
    builder.push(format!("{}_{}.json", shortname, user));
    Ok(builder)
}


/// Find the bank file that `name` refers to. `name` may be a filesystem path
/// or the name of a bank in the bank directory, with or without the `.csv`
/// extension.
pub fn resolve_bank(directory: Option<&PathBuf>, name: &str) -> Result<PathBuf> {
    let direct = PathBuf::from(name);
    if direct.is_file() {
        return Ok(direct);
    }
    let with_ext = direct.with_extension("csv");
    if with_ext.is_file() {
        return Ok(with_ext);
    }

    let dir = bank_dir_path(directory)?;
    let named = dir.join(name);
    if named.is_file() {
        return Ok(named);
    }
    let named_ext = dir.join(format!("{}.csv", name));
    if named_ext.is_file() {
        return Ok(named_ext);
    }

    Err(QuizError::BankNotFound(String::from(name)))
}


/// Like `resolve_bank`, but for banks that may not exist yet: returns the
/// path where the bank should be created, making the bank directory first if
/// necessary. A `name` that looks like a path is used as-is.
pub fn resolve_or_create_bank(directory: Option<&PathBuf>, name: &str) -> Result<PathBuf> {
    match resolve_bank(directory, name) {
        Ok(path) => Ok(path),
        Err(QuizError::BankNotFound(_)) => {
            let direct = PathBuf::from(name);
            if name.ends_with(".csv") || direct.components().count() > 1 {
                return Ok(direct);
            }
            let dir = bank_dir_path(directory)?;
            if !dir.exists() {
                fs::create_dir_all(&dir).or(Err(QuizError::CannotMakeAppDir))?;
            }
            Ok(dir.join(format!("{}.csv", name)))
        },
        Err(e) => Err(e),
    }
}


/// The directory where banks live: `--directory` if given, otherwise the
/// `cram/banks` directory under the platform data directory.
pub fn bank_dir_path(directory: Option<&PathBuf>) -> Result<PathBuf> {
    if let Some(directory) = directory {
        return Ok(directory.clone());
    }
    let mut dirpath = dirs::data_dir().ok_or(QuizError::CannotMakeAppDir)?;
    dirpath.push("cram");
    dirpath.push("banks");
    Ok(dirpath)
}


#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
_pid;_question;_latex;_alt1;_alt2;_alt3;_alt4;_alt5;_correct_alt;_genre;_image
1;What is the capital of Mongolia?;;Ulan Bator;Astana;Bishkek;Tashkent;;_alt1;geography;
2;Which numbers are prime?;;4;5;6;7;9;_alt2/_alt4;arithmetic;
3;What is the area of a circle?;A = \\pi r^2;pi r squared;2 pi r;pi d;;;_alt1;geometry;circle.png
";

    #[test]
    fn can_read_a_bank_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sample.csv");
        fs::write(&path, SAMPLE).unwrap();

        let questions = read_bank_file(&path).unwrap();
        assert_eq!(questions.len(), 3);

        assert_eq!(questions[0].id, 1);
        assert_eq!(questions[0].text, "What is the capital of Mongolia?");
        assert_eq!(questions[0].formula, None);
        assert_eq!(questions[0].alternatives.len(), 4);
        assert_eq!(questions[0].correct, vec![0]);
        assert_eq!(questions[0].category, "geography");
        assert_eq!(questions[0].image, None);

        assert_eq!(questions[1].correct, vec![1, 3]);
        assert_eq!(questions[1].alternatives.len(), 5);

        assert_eq!(questions[2].formula.as_deref(), Some("A = \\pi r^2"));
        assert_eq!(questions[2].alternatives.len(), 3);
        assert_eq!(questions[2].image.as_deref(), Some("circle.png"));
    }

    #[test]
    fn bank_files_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sample.csv");
        fs::write(&path, SAMPLE).unwrap();
        let questions = read_bank_file(&path).unwrap();

        let copy = dir.path().join("copy.csv");
        write_bank(&copy, &questions).unwrap();
        let reread = read_bank_file(&copy).unwrap();

        assert_eq!(reread.len(), questions.len());
        for (a, b) in questions.iter().zip(reread.iter()) {
            assert_eq!(a.id, b.id);
            assert_eq!(a.text, b.text);
            assert_eq!(a.formula, b.formula);
            assert_eq!(a.alternatives, b.alternatives);
            assert_eq!(a.correct, b.correct);
            assert_eq!(a.category, b.category);
            assert_eq!(a.image, b.image);
        }
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let data = "\
_pid;_question;_latex;_alt1;_alt2;_alt3;_alt4;_alt5;_correct_alt;_genre;_image
1;First?;;a;b;;;;_alt1;misc;
1;Second?;;a;b;;;;_alt1;misc;
";
        assert_bad_question(data, "duplicate question id 1");
    }

    #[test]
    fn gaps_in_alternatives_are_rejected() {
        let data = "\
_pid;_question;_latex;_alt1;_alt2;_alt3;_alt4;_alt5;_correct_alt;_genre;_image
1;Question?;;a;;c;;;_alt1;misc;
";
        assert_bad_question(data, "gap in alternatives");
    }

    #[test]
    fn too_few_alternatives_are_rejected() {
        let data = "\
_pid;_question;_latex;_alt1;_alt2;_alt3;_alt4;_alt5;_correct_alt;_genre;_image
1;Question?;;only one;;;;;_alt1;misc;
";
        assert_bad_question(data, "at least two alternatives");
    }

    #[test]
    fn out_of_range_correct_alternative_is_rejected() {
        let data = "\
_pid;_question;_latex;_alt1;_alt2;_alt3;_alt4;_alt5;_correct_alt;_genre;_image
1;Question?;;a;b;;;;_alt3;misc;
";
        assert_bad_question(data, "out of range");
    }

    #[test]
    fn unparsable_correct_alternative_is_rejected() {
        let data = "\
_pid;_question;_latex;_alt1;_alt2;_alt3;_alt4;_alt5;_correct_alt;_genre;_image
1;Question?;;a;b;;;;second;misc;
";
        assert_bad_question(data, "could not parse correct alternative");
    }

    #[test]
    fn missing_category_is_rejected() {
        let data = "\
_pid;_question;_latex;_alt1;_alt2;_alt3;_alt4;_alt5;_correct_alt;_genre;_image
1;Question?;;a;b;;;;_alt1;;
";
        assert_bad_question(data, "no category");
    }

    #[test]
    fn user_records_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let bank_path = dir.path().join("sample.csv");
        fs::write(&bank_path, SAMPLE).unwrap();

        let mut record = UserRecord::default();
        record.record(&QuizResult {
            time_finished: Utc::now(),
            total: 2,
            total_correct: 1,
            total_incorrect: 1,
            score: 50.0,
            grade: 'D',
            per_question: vec![
                AnswerRecord { id: 1, chosen: Some(0), correct: true },
                AnswerRecord { id: 2, chosen: Some(2), correct: false },
            ],
        });
        save_user_record(&bank_path, "alice", &record).unwrap();

        let path = get_record_path(&bank_path, "alice").unwrap();
        assert!(path.ends_with("results/sample_alice.json"));
        assert!(path.is_file());

        let reread = load_user_record(&bank_path, "alice").unwrap();
        assert_eq!(reread.sittings.len(), 1);
        assert_eq!(reread.sittings[0].grade, 'D');
        assert_eq!(reread.stats.get(&1).unwrap().correct, 1);
        assert_eq!(reread.stats.get(&2).unwrap().wrong, 1);
        assert!(reread.stats.get(&1).unwrap().last_seen.is_some());
    }

    #[test]
    fn missing_record_is_an_empty_record() {
        let dir = tempfile::tempdir().unwrap();
        let bank_path = dir.path().join("sample.csv");
        let record = load_user_record(&bank_path, "nobody").unwrap();
        assert!(record.stats.is_empty());
        assert!(record.sittings.is_empty());
    }

    #[test]
    fn recording_twice_accumulates_counters() {
        let mut record = UserRecord::default();
        let result = QuizResult {
            time_finished: Utc::now(),
            total: 1,
            total_correct: 1,
            total_incorrect: 0,
            score: 100.0,
            grade: 'A',
            per_question: vec![AnswerRecord { id: 7, chosen: Some(1), correct: true }],
        };
        record.record(&result);
        record.record(&result);
        assert_eq!(record.stats.get(&7).unwrap().correct, 2);
        assert_eq!(record.stats.get(&7).unwrap().wrong, 0);
        assert_eq!(record.sittings.len(), 2);
    }

    #[test]
    fn banks_resolve_by_path_and_by_name() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("capitals.csv");
        fs::write(&path, SAMPLE).unwrap();

        let by_path = resolve_bank(None, path.to_str().unwrap()).unwrap();
        assert_eq!(by_path, path);

        let directory = dir.path().to_path_buf();
        let by_name = resolve_bank(Some(&directory), "capitals").unwrap();
        assert_eq!(by_name, path);
        let by_name_ext = resolve_bank(Some(&directory), "capitals.csv").unwrap();
        assert_eq!(by_name_ext, path);

        match resolve_bank(Some(&directory), "missing") {
            Err(QuizError::BankNotFound(name)) => assert_eq!(name, "missing"),
            other => panic!("expected BankNotFound, got {:?}", other.map(|p| p.display().to_string())),
        }
    }

    fn assert_bad_question(data: &str, needle: &str) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.csv");
        fs::write(&path, data).unwrap();
        match read_bank_file(&path) {
            Err(QuizError::BadQuestion { message, .. }) => {
                assert!(message.contains(needle), "unexpected message: {}", message);
            },
            other => panic!("expected BadQuestion, got {:?}", other),
        }
    }
}
