// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.
//! K-way merge state over retained sorted runs.
//!
//! Responsibilities:
//! - Own the run arena, the merge priority queue, and the offset/limit
//!   counters for the output stream.
//! - Produce offset-skipped, limit-bounded chunks in global key order.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use arrow::array::{Array, RecordBatch};
use arrow::compute::interleave;

use crate::common::error::{Result, SortError};
use crate::common::logging::debug;
use crate::exec::chunk::Chunk;
use crate::exec::operators::sort::cursor::{MergeEntry, RowCursor, SortedRun};

/// Owns the retained runs, their merge cursors, the merge priority queue,
/// and the output row counters.
pub(crate) struct MergeSorterState {
    runs: Vec<SortedRun>,
    queue: BinaryHeap<Reverse<MergeEntry>>,
    /// Rows still to skip before emission.
    offset: usize,
    /// Remaining emit budget when a limit is declared.
    limit: Option<usize>,
    /// Total rows accepted across retained runs.
    num_rows: usize,
    /// Read position for the single-run fast path.
    single_pos: usize,
}

impl MergeSorterState {
    pub fn new(offset: usize, limit: Option<usize>) -> Self {
        Self {
            runs: Vec::new(),
            queue: BinaryHeap::new(),
            offset,
            limit,
            num_rows: 0,
            single_pos: 0,
        }
    }

    pub fn run_count(&self) -> usize {
        self.runs.len()
    }

    pub fn num_rows(&self) -> usize {
        self.num_rows
    }

    /// Store a run in the arena; returns its index.
    pub fn add_run(&mut self, run: SortedRun) -> usize {
        self.num_rows += run.len();
        self.runs.push(run);
        self.runs.len() - 1
    }

    /// Create one cursor per retained run and seed the merge queue.
    /// With zero or one run the queue is never built; those reads bypass it.
    pub fn build_merge_tree(&mut self) {
        if self.runs.len() <= 1 {
            return;
        }
        for (idx, run) in self.runs.iter().enumerate() {
            let cursor = RowCursor::new(idx, run.len());
            self.queue.push(Reverse(MergeEntry {
                key: run.keys.row(0).owned(),
                cursor,
            }));
        }
        debug!(
            "sort merge tree built: runs={} rows={}",
            self.runs.len(),
            self.num_rows
        );
    }

    /// Stream the only retained run, skipping the offset prefix in place.
    pub fn read_single_run(&mut self, batch_size: usize) -> Result<Option<Chunk>> {
        if self.runs.len() != 1 {
            return Err(SortError::InvariantViolation(format!(
                "single-run read requires exactly one run, got {}",
                self.runs.len()
            )));
        }
        let run = &self.runs[0];
        if self.offset > 0 {
            let skip = self.offset.min(run.len() - self.single_pos);
            self.single_pos += skip;
            self.offset -= skip;
        }
        let mut take_len = (run.len() - self.single_pos).min(batch_size);
        if let Some(limit) = self.limit {
            take_len = take_len.min(limit);
        }
        if take_len == 0 {
            return Ok(None);
        }
        let out = run.chunk.slice(self.single_pos, take_len);
        self.single_pos += take_len;
        if let Some(limit) = self.limit.as_mut() {
            *limit -= take_len;
        }
        Ok(Some(out))
    }

    /// K-way merge read: repeatedly extract the minimum cursor, skip the
    /// offset prefix, gather up to `batch_size` rows, and advance/reinsert
    /// cursors that are not exhausted. Returns `None` iff zero rows were
    /// gathered; callers must stop after observing it.
    pub fn merge_sort_read(&mut self, batch_size: usize) -> Result<Option<Chunk>> {
        if self.runs.len() < 2 {
            return Err(SortError::InvariantViolation(format!(
                "merge read requires at least two runs, got {}",
                self.runs.len()
            )));
        }

        let mut picked: Vec<(usize, usize)> = Vec::with_capacity(batch_size);
        while picked.len() < batch_size {
            if self.limit == Some(0) {
                self.queue.clear();
                break;
            }
            let Some(Reverse(mut entry)) = self.queue.pop() else {
                break;
            };
            if self.offset > 0 {
                self.offset -= 1;
            } else {
                picked.push((entry.cursor.run(), entry.cursor.pos()));
                if let Some(limit) = self.limit.as_mut() {
                    *limit -= 1;
                }
            }
            if !entry.cursor.is_last() {
                entry.cursor.advance()?;
                let run = &self.runs[entry.cursor.run()];
                entry.key = run.keys.row(entry.cursor.pos()).owned();
                self.queue.push(Reverse(entry));
            }
        }

        if picked.is_empty() {
            return Ok(None);
        }
        self.gather(&picked).map(Some)
    }

    /// Assemble the gathered `(run, row)` pairs into one output chunk,
    /// column by column.
    fn gather(&self, picked: &[(usize, usize)]) -> Result<Chunk> {
        let schema = self.runs[0].chunk.schema();
        let num_columns = schema.fields().len();
        let mut columns = Vec::with_capacity(num_columns);
        for col_idx in 0..num_columns {
            let arrays: Vec<&dyn Array> = self
                .runs
                .iter()
                .map(|run| run.chunk.batch.column(col_idx).as_ref())
                .collect();
            columns.push(interleave(&arrays, picked)?);
        }
        let batch = RecordBatch::try_new(schema, columns)?;
        Ok(Chunk::new(batch))
    }
}
