//! Tab-separated loaders for interaction splits and recommendation runs.
//!
//! # Data Format
//!
//! ```text
//! train.tsv / test.tsv     user \t item [\t value [\t timestamp]]
//! run.tsv                  user \t item \t score
//! ```
//!
//! Blank lines and lines starting with `#` are skipped. A missing interaction
//! value counts as 1.0 and timestamps are ignored. Recommendation lists keep
//! file order per user; the loader never re-sorts by score.
//!
//! External identifiers are interned so that every file of a run shares one
//! dense id space. Items are numbered in first-seen order, which also fixes
//! the tie-break order of the popularity ranking.

use super::interactions::{Recommendations, TrainingInteractions};
use super::relevance::{GainMap, Relevance};
use crate::error::DatasetError;
use crate::types::{IdInterner, ItemId, UserId};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::{info, instrument, warn};

/// Training and test splits with the interners that produced their ids.
#[derive(Debug)]
pub struct DatasetSplit {
    pub users: IdInterner,
    pub items: IdInterner,
    pub train: TrainingInteractions,
    pub test: Relevance,
}

/// Loads a training file and a test file into one id space.
///
/// Training is read first, so item ids follow training order.
///
/// # Errors
///
/// Any [`DatasetError`] from reading either file, or
/// [`DatasetError::Relevance`] if a test value is negative or not finite.
pub fn load_split(train_path: &Path, test_path: &Path) -> Result<DatasetSplit, DatasetError> {
    let mut users = IdInterner::new();
    let mut items = IdInterner::new();

    let train = load_interactions(train_path, &mut users, &mut items)?;
    let test = load_interactions(test_path, &mut users, &mut items)?;

    Ok(DatasetSplit {
        users,
        items,
        train: TrainingInteractions::new(train),
        test: Relevance::new(test)?,
    })
}

/// Reads `user \t item [\t value [\t timestamp]]` rows.
///
/// A repeated (user, item) pair keeps its last value.
#[instrument(skip_all, fields(path = %path.display()))]
pub fn load_interactions(
    path: &Path,
    users: &mut IdInterner,
    items: &mut IdInterner,
) -> Result<HashMap<UserId, GainMap>, DatasetError> {
    let mut interactions: HashMap<UserId, GainMap> = HashMap::new();
    let mut rows = 0usize;
    let mut duplicates = 0usize;

    for_each_record(path, |line, fields| {
        if fields.len() < 2 {
            return Err(invalid(
                path,
                line,
                format!("expected at least 2 tab-separated fields, got {}", fields.len()),
            ));
        }

        let user = UserId::from_u64(users.intern(fields[0]));
        let item = ItemId::from_u64(items.intern(fields[1]));
        let value = match fields.get(2) {
            Some(raw) => parse_field::<f64>(path, line, "value", raw)?,
            None => 1.0,
        };

        if interactions
            .entry(user)
            .or_default()
            .insert(item, value)
            .is_some()
        {
            duplicates += 1;
        }
        rows += 1;
        Ok(())
    })?;

    if duplicates > 0 {
        warn!(duplicates, "Repeated (user, item) pairs; kept the last value");
    }
    info!(rows, users = interactions.len(), "Loaded interactions");
    Ok(interactions)
}

/// Reads `user \t item \t score` rows into per-user lists in file order.
#[instrument(skip_all, fields(path = %path.display()))]
pub fn load_recommendations(
    path: &Path,
    users: &mut IdInterner,
    items: &mut IdInterner,
) -> Result<Recommendations, DatasetError> {
    let mut recs = Recommendations::default();
    let mut rows = 0usize;

    for_each_record(path, |line, fields| {
        if fields.len() < 3 {
            return Err(invalid(
                path,
                line,
                format!("expected 3 tab-separated fields, got {}", fields.len()),
            ));
        }

        let user = UserId::from_u64(users.intern(fields[0]));
        let item = ItemId::from_u64(items.intern(fields[1]));
        let score = parse_field::<f32>(path, line, "score", fields[2])?;
        recs.push(user, item, score);
        rows += 1;
        Ok(())
    })?;

    info!(rows, users = recs.num_users(), "Loaded recommendations");
    Ok(recs)
}

/// Calls `handle` with the 1-based line number and tab-split fields of every
/// non-blank, non-comment line.
fn for_each_record<F>(path: &Path, mut handle: F) -> Result<(), DatasetError>
where
    F: FnMut(usize, &[&str]) -> Result<(), DatasetError>,
{
    if !path.exists() {
        return Err(DatasetError::MissingFile(path.display().to_string()));
    }
    let reader = BufReader::new(File::open(path)?);

    for (line_num, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim_end();
        if trimmed.trim().is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let fields: Vec<&str> = trimmed.split('\t').map(str::trim).collect();
        handle(line_num + 1, &fields)?;
    }
    Ok(())
}

fn parse_field<T: std::str::FromStr>(
    path: &Path,
    line: usize,
    what: &str,
    raw: &str,
) -> Result<T, DatasetError> {
    raw.parse()
        .map_err(|_| invalid(path, line, format!("invalid {} '{}'", what, raw)))
}

fn invalid(path: &Path, line: usize, message: String) -> DatasetError {
    DatasetError::InvalidFormat {
        path: path.display().to_string(),
        line,
        message,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{item, user};
    use std::fs;
    use tempfile::TempDir;

    fn write(dir: &TempDir, name: &str, content: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_load_split_shares_id_space() {
        let dir = TempDir::new().unwrap();
        let train = write(&dir, "train.tsv", "alice\tx\nbob\ty\t1\t1600000000\n");
        let test = write(&dir, "test.tsv", "# user item rating\nalice\ty\t4\n\nbob\tz\t2.5\n");

        let split = load_split(&train, &test).unwrap();

        assert_eq!(split.users.len(), 2);
        assert_eq!(split.items.len(), 3);
        assert_eq!(split.items.get("x"), Some(0));
        assert_eq!(split.items.get("z"), Some(2));

        let alice = user(split.users.get("alice").unwrap());
        assert!(split.train.contains(alice, item(0)));
        assert_eq!(split.test.user_gains(alice).unwrap()[&item(1)], 4.0);
    }

    #[test]
    fn test_missing_value_defaults_to_one() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "train.tsv", "u1\ti1\n");
        let mut users = IdInterner::new();
        let mut items = IdInterner::new();

        let data = load_interactions(&path, &mut users, &mut items).unwrap();
        assert_eq!(data[&user(0)][&item(0)], 1.0);
    }

    #[test]
    fn test_duplicates_keep_last_value() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "test.tsv", "u1\ti1\t2\nu1\ti1\t5\n");
        let mut users = IdInterner::new();
        let mut items = IdInterner::new();

        let data = load_interactions(&path, &mut users, &mut items).unwrap();
        assert_eq!(data[&user(0)].len(), 1);
        assert_eq!(data[&user(0)][&item(0)], 5.0);
    }

    #[test]
    fn test_recommendations_keep_file_order() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "run.tsv", "u1\tb\t0.2\nu1\ta\t0.9\nu2\ta\t0.5\n");
        let mut users = IdInterner::new();
        let mut items = IdInterner::new();

        let recs = load_recommendations(&path, &mut users, &mut items).unwrap();
        let list = recs.list(user(0)).unwrap();
        assert_eq!(list[0].0, item(items.get("b").unwrap()));
        assert_eq!(list[1].0, item(items.get("a").unwrap()));
        assert_eq!(recs.num_users(), 2);
    }

    #[test]
    fn test_invalid_lines_report_position() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "run.tsv", "u1\ta\t0.9\nu1\tb\tnot-a-number\n");
        let mut users = IdInterner::new();
        let mut items = IdInterner::new();

        match load_recommendations(&path, &mut users, &mut items) {
            Err(DatasetError::InvalidFormat { line, message, .. }) => {
                assert_eq!(line, 2);
                assert!(message.contains("not-a-number"));
            }
            other => panic!("expected InvalidFormat, got {:?}", other),
        }

        let short = write(&dir, "short.tsv", "only-one-field\n");
        assert!(matches!(
            load_interactions(&short, &mut users, &mut items),
            Err(DatasetError::InvalidFormat { line: 1, .. })
        ));
    }

    #[test]
    fn test_negative_test_gain_rejected() {
        let dir = TempDir::new().unwrap();
        let train = write(&dir, "train.tsv", "u1\ti1\n");
        let test = write(&dir, "test.tsv", "u1\ti2\t-1\n");
        assert!(matches!(
            load_split(&train, &test),
            Err(DatasetError::Relevance(_))
        ));
    }

    #[test]
    fn test_missing_file() {
        let dir = TempDir::new().unwrap();
        let mut users = IdInterner::new();
        let mut items = IdInterner::new();
        let result = load_interactions(&dir.path().join("absent.tsv"), &mut users, &mut items);
        assert!(matches!(result, Err(DatasetError::MissingFile(_))));
    }
}
