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
//! Full sorter: ingestion batching, run production, retention/pruning
//! policy, and pull-based merged output.
//!
//! Responsibilities:
//! - Accumulate pushed chunks and flush them into intra-sorted runs.
//! - Apply the top-n retention policy so runs that provably cannot reach
//!   the final window are dropped before storage.
//! - Stream globally ordered, offset-skipped, limit-bounded output chunks.

use std::sync::Arc;

use arrow::array::RecordBatch;
use arrow::compute::{concat_batches, lexsort_to_indices, take};
use arrow::row::RowConverter;

use crate::common::error::{Result, SortError};
use crate::common::logging::debug;
use crate::exec::chunk::Chunk;
use crate::exec::operators::sort::cursor::SortedRun;
use crate::exec::operators::sort::merge_sorter_state::MergeSorterState;
use crate::exec::operators::sort::topn_pruner::TopNPruner;
use crate::exec::operators::sort::{SortConfig, SortKeyDescriptor, TupleMaterializer};

/// Converts one unordered batch into an intra-sorted run.
///
/// When `sort_bound` is known (offset + limit), only the first `sort_bound`
/// rows of each run are produced: a partial-selection sort is sufficient
/// for top-n correctness. Without a bound the sort is total.
pub(crate) struct Sorter {
    sort_keys: SortKeyDescriptor,
    materializer: Option<Arc<dyn TupleMaterializer>>,
    sort_bound: Option<usize>,
    // Shared across all runs so keys from different runs compare
    // consistently.
    row_converter: Option<RowConverter>,
}

impl Sorter {
    pub fn new(
        sort_keys: SortKeyDescriptor,
        materializer: Option<Arc<dyn TupleMaterializer>>,
        sort_bound: Option<usize>,
    ) -> Self {
        Self {
            sort_keys,
            materializer,
            sort_bound,
            row_converter: None,
        }
    }

    /// Sort one batch into a run. Tuple materialization, when injected,
    /// happens first and key extraction operates on the re-projected shape.
    pub fn partial_sort(&mut self, chunk: Chunk) -> Result<SortedRun> {
        if self.sort_keys.is_empty() {
            return Err(SortError::InvariantViolation(
                "sort requires at least one sort key".to_string(),
            ));
        }
        if chunk.is_empty() {
            return Err(SortError::InvariantViolation(
                "partial sort requires a non-empty batch".to_string(),
            ));
        }
        let chunk = match self.materializer.as_ref() {
            Some(materializer) => materializer.materialize(&chunk)?,
            None => chunk,
        };

        let key_columns = self.sort_keys.key_columns(&chunk)?;
        let sort_columns = self.sort_keys.sort_columns(&key_columns);
        let indices = lexsort_to_indices(&sort_columns, self.sort_bound)?;
        let columns = chunk
            .batch
            .columns()
            .iter()
            .map(|col| take(col.as_ref(), &indices, None))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        let sorted = Chunk::new(RecordBatch::try_new(chunk.batch.schema(), columns)?);

        let sorted_keys = self.sort_keys.key_columns(&sorted)?;
        if self.row_converter.is_none() {
            self.row_converter = Some(self.sort_keys.row_converter(&sorted_keys)?);
        }
        let keys = self
            .row_converter
            .as_ref()
            .expect("row converter initialized")
            .convert_columns(&sorted_keys)?;
        Ok(SortedRun {
            chunk: sorted,
            keys,
        })
    }
}

/// Pull-based multi-run sorter composing run production, the top-n
/// retention policy, and the k-way merge.
///
/// Lifecycle: `append_block` repeatedly, `prepare_for_read` exactly once,
/// then `get_next` until it returns `None`. Calls are strictly sequential
/// per instance; parallel tasks each build their own instance.
pub struct FullSorter {
    sorter: Sorter,
    state: MergeSorterState,
    pruner: TopNPruner,
    limit: Option<usize>,
    offset: usize,
    batch_size: usize,
    flush_threshold_rows: usize,
    flush_threshold_bytes: Option<usize>,
    buffered: Vec<Chunk>,
    buffered_rows: usize,
    buffered_bytes: usize,
    prepared: bool,
}

impl FullSorter {
    pub fn new(config: SortConfig) -> Self {
        let rows_to_keep = config
            .limit
            .map(|limit| config.offset.saturating_add(limit));
        Self {
            sorter: Sorter::new(config.sort_keys, config.materializer, rows_to_keep),
            state: MergeSorterState::new(config.offset, config.limit),
            pruner: TopNPruner::new(),
            limit: config.limit,
            offset: config.offset,
            batch_size: config.batch_size,
            flush_threshold_rows: config.flush_threshold_rows,
            flush_threshold_bytes: config.flush_threshold_bytes,
            buffered: Vec::new(),
            buffered_rows: 0,
            buffered_bytes: 0,
            prepared: false,
        }
    }

    /// Rows that must be retained to answer the query window; `None` when
    /// unbounded.
    fn rows_to_keep(&self) -> Option<usize> {
        self.limit.map(|limit| self.offset.saturating_add(limit))
    }

    /// Push one unordered chunk. Empty chunks are ignored; reaching a flush
    /// threshold triggers run production.
    pub fn append_block(&mut self, chunk: Chunk) -> Result<()> {
        if self.prepared {
            return Err(SortError::InvariantViolation(
                "append_block called after prepare_for_read".to_string(),
            ));
        }
        if chunk.is_empty() {
            return Ok(());
        }
        self.buffered_rows += chunk.len();
        self.buffered_bytes = self.buffered_bytes.saturating_add(chunk.estimated_bytes());
        self.buffered.push(chunk);
        if self.should_flush() {
            self.do_sort()?;
        }
        Ok(())
    }

    fn should_flush(&self) -> bool {
        if self.buffered_rows >= self.flush_threshold_rows {
            return true;
        }
        self.flush_threshold_bytes
            .map(|max_bytes| self.buffered_bytes >= max_bytes)
            .unwrap_or(false)
    }

    /// Materialize the accumulation buffer into one sorted run and apply
    /// the retention policy. The buffer is dropped only after the run is
    /// built, keeping ingestion atomic at run granularity.
    fn do_sort(&mut self) -> Result<()> {
        if self.buffered.is_empty() {
            return Ok(());
        }
        if self.rows_to_keep() == Some(0) {
            // LIMIT 0 retains nothing.
            self.clear_buffered();
            return Ok(());
        }
        let schema = self.buffered[0].schema();
        let batches: Vec<_> = self.buffered.iter().map(|c| c.batch.clone()).collect();
        let batch = concat_batches(&schema, &batches)?;
        let run = self.sorter.partial_sort(Chunk::new(batch))?;
        self.clear_buffered();
        self.retain_run(run);
        Ok(())
    }

    /// Top-n retention: keep every run until `offset + limit` rows are
    /// retained; afterwards admit a run only if it is not totally greater
    /// than the worst retained run. No limit means unconditional retention.
    fn retain_run(&mut self, run: SortedRun) {
        let Some(rows_to_keep) = self.rows_to_keep() else {
            self.state.add_run(run);
            return;
        };
        if self.state.num_rows() >= rows_to_keep
            && let Some(worst) = self.pruner.worst_max_key()
            && run.totally_greater(worst)
        {
            debug!(
                "pruned sorted run: rows={} retained_runs={}",
                run.len(),
                self.pruner.len()
            );
            return;
        }
        let max_key = run.max_key();
        let run_idx = self.state.add_run(run);
        self.pruner.record(run_idx, max_key);
    }

    fn clear_buffered(&mut self) {
        self.buffered.clear();
        self.buffered_rows = 0;
        self.buffered_bytes = 0;
    }

    /// Flush any buffered tail and build the merge structures. Must be
    /// called exactly once, after the last `append_block` and before any
    /// `get_next`.
    pub fn prepare_for_read(&mut self) -> Result<()> {
        if self.prepared {
            return Err(SortError::InvariantViolation(
                "prepare_for_read called twice".to_string(),
            ));
        }
        if self.buffered_rows > 0 {
            self.do_sort()?;
        }
        self.state.build_merge_tree();
        self.prepared = true;
        Ok(())
    }

    /// Pull one output chunk; `None` is end-of-stream and every later call
    /// keeps returning `None`. Zero retained runs end the stream
    /// immediately; exactly one run streams directly without a merge
    /// queue; two or more go through the k-way merge.
    pub fn get_next(&mut self) -> Result<Option<Chunk>> {
        if !self.prepared {
            return Err(SortError::InvariantViolation(
                "get_next called before prepare_for_read".to_string(),
            ));
        }
        match self.state.run_count() {
            0 => Ok(None),
            1 => self.state.read_single_run(self.batch_size),
            _ => self.state.merge_sort_read(self.batch_size),
        }
    }

    /// Retained-run count; the pruning tests assert its bound.
    pub fn retained_runs(&self) -> usize {
        self.state.run_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::operators::sort::SortKeyColumn;
    use arrow::array::{Array, Int32Array};
    use arrow::datatypes::{DataType, Field, Schema};

    fn make_chunk(values: Vec<Option<i32>>) -> Chunk {
        let schema = Arc::new(Schema::new(vec![Field::new("v", DataType::Int32, true)]));
        let batch = RecordBatch::try_new(schema, vec![Arc::new(Int32Array::from(values))])
            .expect("record batch");
        Chunk::new(batch)
    }

    fn single_key_config(asc: bool, nulls_first: bool) -> SortConfig {
        SortConfig {
            sort_keys: SortKeyDescriptor::new(vec![SortKeyColumn {
                column: 0,
                asc,
                nulls_first,
            }]),
            flush_threshold_rows: 3,
            batch_size: 10,
            ..SortConfig::default()
        }
    }

    fn collect_i32(chunk: &Chunk) -> Vec<Option<i32>> {
        let col = chunk
            .batch
            .column(0)
            .as_any()
            .downcast_ref::<Int32Array>()
            .expect("int32");
        (0..col.len())
            .map(|i| {
                if col.is_null(i) {
                    None
                } else {
                    Some(col.value(i))
                }
            })
            .collect()
    }

    fn drain(sorter: &mut FullSorter) -> Vec<Option<i32>> {
        let mut out = Vec::new();
        while let Some(chunk) = sorter.get_next().expect("get_next") {
            out.extend(collect_i32(&chunk));
        }
        out
    }

    #[test]
    fn two_runs_merge_into_global_order() {
        let mut sorter = FullSorter::new(single_key_config(true, false));
        sorter
            .append_block(make_chunk(vec![Some(3), Some(1), Some(4)]))
            .expect("append");
        sorter
            .append_block(make_chunk(vec![Some(1), Some(5), Some(9)]))
            .expect("append");
        sorter.prepare_for_read().expect("prepare");

        assert_eq!(sorter.retained_runs(), 2);
        assert_eq!(
            drain(&mut sorter),
            vec![Some(1), Some(1), Some(3), Some(4), Some(5), Some(9)]
        );
    }

    #[test]
    fn limit_two_emits_only_the_two_smallest_rows() {
        let mut sorter = FullSorter::new(SortConfig {
            limit: Some(2),
            ..single_key_config(true, false)
        });
        sorter
            .append_block(make_chunk(vec![Some(3), Some(1), Some(4)]))
            .expect("append");
        sorter
            .append_block(make_chunk(vec![Some(1), Some(5), Some(9)]))
            .expect("append");
        sorter.prepare_for_read().expect("prepare");

        assert_eq!(drain(&mut sorter), vec![Some(1), Some(1)]);
    }

    #[test]
    fn totally_greater_run_is_pruned_at_admission() {
        let mut sorter = FullSorter::new(SortConfig {
            limit: Some(2),
            ..single_key_config(true, false)
        });
        sorter
            .append_block(make_chunk(vec![Some(3), Some(1), Some(2)]))
            .expect("append");
        sorter
            .append_block(make_chunk(vec![Some(7), Some(5), Some(6)]))
            .expect("append");
        sorter.prepare_for_read().expect("prepare");

        // Second run's minimum (5) exceeds the first run's maximum retained
        // key (2 after the partial-sort bound), so it is never stored.
        assert_eq!(sorter.retained_runs(), 1);
        assert_eq!(drain(&mut sorter), vec![Some(1), Some(2)]);
    }

    #[test]
    fn overlapping_run_is_retained_despite_limit() {
        let mut sorter = FullSorter::new(SortConfig {
            limit: Some(2),
            ..single_key_config(true, false)
        });
        sorter
            .append_block(make_chunk(vec![Some(3), Some(1), Some(4)]))
            .expect("append");
        sorter
            .append_block(make_chunk(vec![Some(2), Some(9), Some(8)]))
            .expect("append");
        sorter.prepare_for_read().expect("prepare");

        assert_eq!(sorter.retained_runs(), 2);
        assert_eq!(drain(&mut sorter), vec![Some(1), Some(2)]);
    }

    #[test]
    fn offset_widens_the_retention_window() {
        let mut sorter = FullSorter::new(SortConfig {
            limit: Some(1),
            offset: 2,
            ..single_key_config(true, false)
        });
        sorter
            .append_block(make_chunk(vec![Some(3), Some(1), Some(2)]))
            .expect("append");
        sorter
            .append_block(make_chunk(vec![Some(4), Some(6), Some(5)]))
            .expect("append");
        sorter.prepare_for_read().expect("prepare");

        // offset=2, limit=1 needs the third-smallest row overall.
        assert_eq!(drain(&mut sorter), vec![Some(3)]);
    }

    #[test]
    fn descending_with_nulls_last() {
        let mut sorter = FullSorter::new(single_key_config(false, false));
        sorter
            .append_block(make_chunk(vec![Some(2), None, Some(9)]))
            .expect("append");
        sorter
            .append_block(make_chunk(vec![Some(4), None, Some(7)]))
            .expect("append");
        sorter.prepare_for_read().expect("prepare");

        assert_eq!(
            drain(&mut sorter),
            vec![Some(9), Some(7), Some(4), Some(2), None, None]
        );
    }

    #[test]
    fn empty_input_reports_eos_immediately() {
        let mut sorter = FullSorter::new(single_key_config(true, true));
        sorter.prepare_for_read().expect("prepare");
        assert!(sorter.get_next().expect("get_next").is_none());
        assert!(sorter.get_next().expect("get_next").is_none());
    }

    #[test]
    fn eos_is_idempotent_after_merge() {
        let mut sorter = FullSorter::new(single_key_config(true, true));
        sorter
            .append_block(make_chunk(vec![Some(2), Some(1), Some(3)]))
            .expect("append");
        sorter
            .append_block(make_chunk(vec![Some(6), Some(5), Some(4)]))
            .expect("append");
        sorter.prepare_for_read().expect("prepare");

        while sorter.get_next().expect("get_next").is_some() {}
        assert!(sorter.get_next().expect("get_next").is_none());
        assert!(sorter.get_next().expect("get_next").is_none());
    }

    #[test]
    fn append_after_prepare_is_an_invariant_violation() {
        let mut sorter = FullSorter::new(single_key_config(true, true));
        sorter.prepare_for_read().expect("prepare");
        let err = sorter
            .append_block(make_chunk(vec![Some(1)]))
            .expect_err("append after prepare");
        assert!(matches!(err, SortError::InvariantViolation(_)), "{err}");
    }

    #[test]
    fn prepare_twice_is_an_invariant_violation() {
        let mut sorter = FullSorter::new(single_key_config(true, true));
        sorter.prepare_for_read().expect("prepare");
        let err = sorter.prepare_for_read().expect_err("second prepare");
        assert!(matches!(err, SortError::InvariantViolation(_)), "{err}");
    }

    struct FailingMaterializer;

    impl TupleMaterializer for FailingMaterializer {
        fn materialize(&self, _chunk: &Chunk) -> Result<Chunk> {
            Err(SortError::Evaluation("boom".to_string()))
        }
    }

    #[test]
    fn failing_materializer_leaves_the_buffer_intact() {
        let mut sorter = FullSorter::new(SortConfig {
            materializer: Some(Arc::new(FailingMaterializer)),
            ..single_key_config(true, true)
        });
        let err = sorter
            .append_block(make_chunk(vec![Some(3), Some(1), Some(2)]))
            .expect_err("materializer failure");
        assert!(matches!(err, SortError::Evaluation(_)), "{err}");
        // No run was committed and the accumulated rows are still buffered.
        assert_eq!(sorter.retained_runs(), 0);
        assert_eq!(sorter.buffered_rows, 3);
    }

    #[test]
    fn limit_zero_emits_nothing() {
        let mut sorter = FullSorter::new(SortConfig {
            limit: Some(0),
            ..single_key_config(true, true)
        });
        sorter
            .append_block(make_chunk(vec![Some(3), Some(1), Some(2)]))
            .expect("append");
        sorter.prepare_for_read().expect("prepare");
        assert_eq!(sorter.retained_runs(), 0);
        assert!(sorter.get_next().expect("get_next").is_none());
    }

    #[test]
    fn single_run_streams_with_offset_prefix_skipped() {
        let mut sorter = FullSorter::new(SortConfig {
            offset: 2,
            ..single_key_config(true, true)
        });
        sorter
            .append_block(make_chunk(vec![Some(5), Some(1), Some(4)]))
            .expect("append");
        sorter.prepare_for_read().expect("prepare");

        assert_eq!(sorter.retained_runs(), 1);
        assert_eq!(drain(&mut sorter), vec![Some(5)]);
    }
}
