use std::collections::{HashMap, HashSet};
use std::iter;

use crate::errors::{Error, Result};
use crate::time_series::scalar_value::{JoinKey, Row, Value};

/// Identifier column every per-series query returns
pub const TIME_SERIES_ID_LABEL: &str = "TID";

/// Columns and rows drained from one cursor in one round
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Frame {
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
}

impl Frame {
    pub fn new(columns: Vec<String>, rows: Vec<Row>) -> Self {
        Self { columns, rows }
    }

    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|column| column == name)
    }

    fn drop_column(&mut self, name: &str) {
        if let Some(index) = self.column_index(name) {
            self.columns.remove(index);
            for row in &mut self.rows {
                row.remove(index);
            }
        }
    }
}

/// Combine the frames of one pull round into a single frame.
///
/// One frame passes through untouched. Without a merge key the frames are
/// stacked in order and must share identical columns; with a key each frame
/// is outer-joined onto the accumulated result.
pub fn merge_frames(frames: Vec<Frame>, merge_on: Option<&str>) -> Result<Frame> {
    let mut frames = frames.into_iter();
    let Some(first) = frames.next() else {
        return Ok(Frame::default());
    };

    match merge_on {
        Some(key) => frames.try_fold(first, |mut master, mut current| {
            if key != TIME_SERIES_ID_LABEL {
                current.drop_column(TIME_SERIES_ID_LABEL);
                master.drop_column(TIME_SERIES_ID_LABEL);
            }
            outer_join(master, current, key)
        }),
        None => frames.enumerate().try_fold(first, |mut master, (i, current)| {
            if current.columns != master.columns {
                return Err(Error::SchemaMismatch(format!(
                    "cannot stack series {} with columns {:?} onto columns {:?}",
                    i + 1,
                    current.columns,
                    master.columns
                )));
            }
            master.rows.extend(current.rows);
            Ok(master)
        }),
    }
}

fn key_index(frame: &Frame, key: &str) -> Result<usize> {
    frame.column_index(key).ok_or_else(|| {
        Error::MissingColumn(format!(
            "merge key '{}' not found in columns {:?}",
            key, frame.columns
        ))
    })
}

fn without(row: &Row, skip: usize) -> impl Iterator<Item = Value> + '_ {
    row.iter()
        .enumerate()
        .filter(move |(i, _)| *i != skip)
        .map(|(_, value)| value.clone())
}

/// Full outer join of `left` and `right` on `key`, ordered by key.
///
/// Non-key column names present on both sides get `_x` / `_y` suffixes.
pub fn outer_join(left: Frame, right: Frame, key: &str) -> Result<Frame> {
    let li = key_index(&left, key)?;
    let ri = key_index(&right, key)?;

    let right_names: HashSet<&str> = right
        .columns
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != ri)
        .map(|(_, name)| name.as_str())
        .collect();
    let left_names: HashSet<&str> = left
        .columns
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != li)
        .map(|(_, name)| name.as_str())
        .collect();

    let mut columns = Vec::with_capacity(left.columns.len() + right.columns.len() - 1);
    for (i, name) in left.columns.iter().enumerate() {
        if i != li && right_names.contains(name.as_str()) {
            columns.push(format!("{}_x", name));
        } else {
            columns.push(name.clone());
        }
    }
    for (i, name) in right.columns.iter().enumerate() {
        if i == ri {
            continue;
        }
        if left_names.contains(name.as_str()) {
            columns.push(format!("{}_y", name));
        } else {
            columns.push(name.clone());
        }
    }

    let mut index: HashMap<JoinKey, Vec<usize>> = HashMap::new();
    for (i, row) in right.rows.iter().enumerate() {
        if let Some(join_key) = row[ri].join_key() {
            index.entry(join_key).or_default().push(i);
        }
    }

    let right_width = right.columns.len() - 1;
    let left_width = left.columns.len();
    let mut matched = vec![false; right.rows.len()];
    let mut rows = Vec::with_capacity(left.rows.len().max(right.rows.len()));

    for left_row in left.rows {
        match left_row[li].join_key().and_then(|k| index.get(&k)) {
            Some(hits) => {
                for &hit in hits {
                    matched[hit] = true;
                    let mut row = left_row.clone();
                    row.extend(without(&right.rows[hit], ri));
                    rows.push(row);
                }
            }
            None => {
                let mut row = left_row;
                row.extend(iter::repeat_n(Value::Null, right_width));
                rows.push(row);
            }
        }
    }

    for (i, right_row) in right.rows.iter().enumerate() {
        if matched[i] {
            continue;
        }
        let mut row = vec![Value::Null; left_width];
        row[li] = right_row[ri].clone();
        row.extend(without(right_row, ri));
        rows.push(row);
    }

    rows.sort_by(|a, b| a[li].cmp_key(&b[li]));

    Ok(Frame::new(columns, rows))
}
