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
//! Top-n run pruning.
//!
//! Tracks only run-level max-key summaries, never full row data. Pruning is
//! admission-time only: a freshly produced run whose minimum key sorts
//! strictly after the worst retained run's maximum key is discarded before
//! storage. Admitted runs are never re-examined or evicted.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use arrow::row::OwnedRow;

/// Max-key summary of one retained run.
#[derive(Debug)]
struct RunMaxKey {
    key: OwnedRow,
    run: usize,
}

impl PartialEq for RunMaxKey {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key && self.run == other.run
    }
}

impl Eq for RunMaxKey {}

impl PartialOrd for RunMaxKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for RunMaxKey {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap keeps the largest element on top.
        // "Largest" here means the worst retained run.
        self.key
            .cmp(&other.key)
            .then_with(|| self.run.cmp(&other.run))
    }
}

/// Bounded max-structure over retained runs' max keys, one entry per
/// retained run. Used only when the query declares a limit.
pub(crate) struct TopNPruner {
    heap: BinaryHeap<RunMaxKey>,
}

impl TopNPruner {
    pub fn new() -> Self {
        Self {
            heap: BinaryHeap::new(),
        }
    }

    /// Record the max-key summary of a newly retained run.
    pub fn record(&mut self, run: usize, max_key: OwnedRow) {
        self.heap.push(RunMaxKey { key: max_key, run });
    }

    /// Max key of the worst retained run.
    pub fn worst_max_key(&self) -> Option<&OwnedRow> {
        self.heap.peek().map(|entry| &entry.key)
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{ArrayRef, Int32Array};
    use arrow::compute::SortOptions;
    use arrow::row::{RowConverter, Rows, SortField};
    use std::sync::Arc;

    fn encode_keys(values: Vec<i32>) -> Rows {
        let converter = RowConverter::new(vec![SortField::new_with_options(
            arrow::datatypes::DataType::Int32,
            SortOptions {
                descending: false,
                nulls_first: true,
            },
        )])
        .expect("row converter");
        let column: ArrayRef = Arc::new(Int32Array::from(values));
        converter.convert_columns(&[column]).expect("rows")
    }

    #[test]
    fn worst_retained_run_surfaces_on_top() {
        let keys = encode_keys(vec![4, 9, 6]);
        let mut pruner = TopNPruner::new();
        pruner.record(0, keys.row(0).owned());
        pruner.record(1, keys.row(1).owned());
        pruner.record(2, keys.row(2).owned());

        assert_eq!(pruner.len(), 3);
        assert_eq!(pruner.worst_max_key(), Some(&keys.row(1).owned()));
    }

    #[test]
    fn empty_pruner_has_no_worst_key() {
        let pruner = TopNPruner::new();
        assert!(pruner.worst_max_key().is_none());
        assert_eq!(pruner.len(), 0);
    }
}
