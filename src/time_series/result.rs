use std::iter::FusedIterator;

use crate::errors::{Error, Result};
use crate::time_series::accessors::{FetchType, RenderOptions, Rendered, render};
use crate::time_series::cursor::SeriesCursor;
use crate::time_series::merge::{Frame, merge_frames};
use crate::time_series::scalar_value::Row;

/// Handle over one or more series cursors and the policy merging them.
///
/// `columns` and `result_set` hold the snapshot of the most recent pull
/// only. Every pull replaces them.
#[derive(Debug)]
pub struct Timeseries {
    cursors: Vec<SeriesCursor>,
    merge_on: Option<String>,
    columns: Vec<String>,
    result_set: Vec<Row>,
    pulled: bool,
    render_options: RenderOptions,
}

impl Timeseries {
    pub fn new(cursors: Vec<SeriesCursor>, merge_on: Option<&str>) -> Self {
        Self {
            cursors,
            merge_on: merge_on.map(str::to_string),
            columns: Vec::new(),
            result_set: Vec::new(),
            pulled: false,
            render_options: RenderOptions::default(),
        }
    }

    /// Known columns before the first pull; replaced by the merged columns
    /// once data is fetched
    pub fn with_columns(mut self, columns: Vec<String>) -> Self {
        self.columns = columns;
        self
    }

    pub fn with_render_options(mut self, render_options: RenderOptions) -> Self {
        self.render_options = render_options;
        self
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn result_set(&self) -> &[Row] {
        &self.result_set
    }

    pub fn merge_on(&self) -> Option<&str> {
        self.merge_on.as_deref()
    }

    pub fn num_cursors(&self) -> usize {
        self.cursors.len()
    }

    /// Rows in the current snapshot
    pub fn count(&self) -> usize {
        self.result_set.len()
    }

    pub fn is_empty(&self) -> bool {
        self.result_set.is_empty()
    }

    /// Every cursor has been drained to the end
    pub fn is_exhausted(&self) -> bool {
        self.cursors.iter().all(SeriesCursor::is_exhausted)
    }

    /// Render everything.
    ///
    /// An existing snapshot is re-rendered as is. Otherwise one unbounded
    /// pull is made; `None` means the cursors had already run dry.
    pub fn fetch_all(&mut self, fetch_type: FetchType) -> Result<Option<Rendered>> {
        if !self.pulled {
            if !self.cursors.is_empty() && self.is_exhausted() {
                return Ok(None);
            }
            self.pull(None)?;
        }
        self.render(fetch_type).map(Some)
    }

    /// Rendered batches of at most `batch_size` rows per cursor, pulled on
    /// demand until the cursors run dry.
    ///
    /// Calling this again resumes where the cursors were left.
    pub fn fetch_next(&mut self, fetch_type: FetchType, batch_size: usize) -> Result<Batches<'_>> {
        if batch_size == 0 {
            return Err(Error::InvalidArgument(
                "batch_size must be at least 1".to_string(),
            ));
        }
        Ok(Batches {
            series: self,
            fetch_type,
            batch_size,
            done: false,
        })
    }

    fn render(&self, fetch_type: FetchType) -> Result<Rendered> {
        render(fetch_type, &self.columns, &self.result_set, &self.render_options)
    }

    /// Drain up to `batch_size` rows from every cursor and merge them into a
    /// new snapshot. Returns the number of rows drained.
    ///
    /// A round that drains nothing keeps the previous snapshot; only the very
    /// first pull turns an empty round into an (empty) snapshot.
    fn pull(&mut self, batch_size: Option<usize>) -> Result<usize> {
        let mut frames = Vec::with_capacity(self.cursors.len());
        for cursor in &mut self.cursors {
            let rows = cursor.drain(batch_size)?;
            frames.push(Frame::new(cursor.columns().to_vec(), rows));
        }

        let drained: usize = frames.iter().map(Frame::num_rows).sum();
        if drained == 0 && self.pulled {
            return Ok(0);
        }

        let merged = merge_frames(frames, self.merge_on.as_deref())?;
        log::trace!(
            "drained {} rows from {} cursors into {} merged rows",
            drained,
            self.cursors.len(),
            merged.num_rows()
        );
        self.columns = merged.columns;
        self.result_set = merged.rows;
        self.pulled = true;
        Ok(drained)
    }
}

/// Lazily pulled, rendered batches of a [`Timeseries`]
pub struct Batches<'a> {
    series: &'a mut Timeseries,
    fetch_type: FetchType,
    batch_size: usize,
    done: bool,
}

impl Iterator for Batches<'_> {
    type Item = Result<Rendered>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        match self.series.pull(Some(self.batch_size)) {
            Ok(0) => {
                self.done = true;
                None
            }
            Ok(_) => {
                let rendered = self.series.render(self.fetch_type);
                self.done = rendered.is_err();
                Some(rendered)
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

impl FusedIterator for Batches<'_> {}
