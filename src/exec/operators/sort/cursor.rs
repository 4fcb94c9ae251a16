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
//! Sorted runs and merge cursors.
//!
//! A run's sort keys are carried in arrow row format: byte-wise comparison
//! of encoded rows realizes column-by-column comparison under the
//! descriptor, with null placement applied before direction.

use std::cmp::Ordering;

use arrow::row::{OwnedRow, Rows};

use crate::common::error::{Result, SortError};
use crate::exec::chunk::Chunk;

/// One fully sorted, immutable run plus the row-format encoding of its
/// sort keys. `keys` has exactly one entry per chunk row; `keys.row(0)` and
/// `keys.row(len - 1)` are the run's min/max key summary.
pub(crate) struct SortedRun {
    pub chunk: Chunk,
    pub keys: Rows,
}

impl SortedRun {
    pub fn len(&self) -> usize {
        self.chunk.len()
    }

    pub fn min_key(&self) -> OwnedRow {
        self.keys.row(0).owned()
    }

    pub fn max_key(&self) -> OwnedRow {
        self.keys.row(self.len() - 1).owned()
    }

    /// True iff every row of this run sorts strictly after the run whose
    /// maximum key summary is `other_max_key`. Valid because runs are
    /// intra-sorted, so the first row is the minimum.
    pub fn totally_greater(&self, other_max_key: &OwnedRow) -> bool {
        self.min_key().cmp(other_max_key) == Ordering::Greater
    }
}

/// Position of the merge within one sorted run.
///
/// Holds an index into the merge state's run arena rather than a reference,
/// so a cursor cannot outlive the runs it walks.
#[derive(Clone, Copy, Debug)]
pub(crate) struct RowCursor {
    run: usize,
    pos: usize,
    num_rows: usize,
}

impl RowCursor {
    pub fn new(run: usize, num_rows: usize) -> Self {
        Self {
            run,
            pos: 0,
            num_rows,
        }
    }

    pub fn run(&self) -> usize {
        self.run
    }

    pub fn pos(&self) -> usize {
        self.pos
    }

    pub fn is_last(&self) -> bool {
        self.pos + 1 >= self.num_rows
    }

    pub fn advance(&mut self) -> Result<()> {
        if self.is_last() {
            return Err(SortError::InvariantViolation(format!(
                "cursor advanced past run end: run={} pos={} rows={}",
                self.run, self.pos, self.num_rows
            )));
        }
        self.pos += 1;
        Ok(())
    }
}

/// Merge queue item: the cursor's current key plus the cursor itself.
///
/// Ordering is `(key, run index)`; the run-index tie-break keeps equal keys
/// deterministic, with the first-admitted run winning under min-extraction.
/// Cursor identity never participates in the comparison beyond that
/// tie-break.
#[derive(Debug)]
pub(crate) struct MergeEntry {
    pub key: OwnedRow,
    pub cursor: RowCursor,
}

impl PartialEq for MergeEntry {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key && self.cursor.run() == other.cursor.run()
    }
}

impl Eq for MergeEntry {}

impl PartialOrd for MergeEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for MergeEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key
            .cmp(&other.key)
            .then_with(|| self.cursor.run().cmp(&other.cursor.run()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{ArrayRef, Int32Array};
    use arrow::compute::SortOptions;
    use arrow::row::{RowConverter, SortField};
    use std::sync::Arc;

    fn encode_keys(values: Vec<Option<i32>>) -> Rows {
        let converter = RowConverter::new(vec![SortField::new_with_options(
            arrow::datatypes::DataType::Int32,
            SortOptions {
                descending: false,
                nulls_first: false,
            },
        )])
        .expect("row converter");
        let column: ArrayRef = Arc::new(Int32Array::from(values));
        converter.convert_columns(&[column]).expect("rows")
    }

    #[test]
    fn cursor_advances_to_last_row_then_fails() {
        let mut cursor = RowCursor::new(0, 2);
        assert!(!cursor.is_last());
        cursor.advance().expect("advance");
        assert!(cursor.is_last());
        let err = cursor.advance().expect_err("past end");
        assert!(matches!(err, SortError::InvariantViolation(_)), "{err}");
    }

    #[test]
    fn merge_entries_order_by_key_then_run() {
        let keys = encode_keys(vec![Some(1), Some(2)]);
        let small = MergeEntry {
            key: keys.row(0).owned(),
            cursor: RowCursor::new(1, 4),
        };
        let large = MergeEntry {
            key: keys.row(1).owned(),
            cursor: RowCursor::new(0, 4),
        };
        assert!(small < large);

        let tied_first = MergeEntry {
            key: keys.row(0).owned(),
            cursor: RowCursor::new(0, 4),
        };
        // Equal keys resolve toward the first-admitted run.
        assert!(tied_first < small);
    }

    #[test]
    fn null_ordering_is_encoded_into_keys() {
        // nulls_first=false places nulls after every value.
        let keys = encode_keys(vec![Some(7), None]);
        assert!(keys.row(0) < keys.row(1));
    }
}
