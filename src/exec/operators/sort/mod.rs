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
//! Sort operator kernels.
//!
//! Responsibilities:
//! - Host the sort key model shared by run production, merging, and
//!   pruning.
//! - Keep sorting algorithms isolated from operator state transitions.
//!
//! Key exported interfaces:
//! - Types: `SortKeyColumn`, `SortKeyDescriptor`, `SortConfig`,
//!   `FullSorter`, `SortProcessorFactory`.
//! - Traits: `TupleMaterializer`.

use std::sync::Arc;

use arrow::array::ArrayRef;
use arrow::compute::{SortColumn, SortOptions};
use arrow::row::{RowConverter, SortField};

use crate::common::error::{Result, SortError};
use crate::exec::chunk::Chunk;

mod cursor;
mod full_sorter;
mod merge_sorter_state;
mod sort_processor;
mod topn_pruner;

pub use full_sorter::FullSorter;
pub use sort_processor::SortProcessorFactory;

/// One sort key: source column plus direction and null placement.
#[derive(Clone, Debug)]
pub struct SortKeyColumn {
    /// Column index in the (materialized) chunk schema.
    pub column: usize,
    pub asc: bool,
    pub nulls_first: bool,
}

/// Ordered sequence of sort keys. Built once per operator instance and
/// immutable thereafter; column indices must be valid in every run's schema.
#[derive(Clone, Debug, Default)]
pub struct SortKeyDescriptor {
    keys: Vec<SortKeyColumn>,
}

impl SortKeyDescriptor {
    pub fn new(keys: Vec<SortKeyColumn>) -> Self {
        Self { keys }
    }

    pub fn keys(&self) -> &[SortKeyColumn] {
        &self.keys
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    fn options(key: &SortKeyColumn) -> SortOptions {
        SortOptions {
            descending: !key.asc,
            nulls_first: key.nulls_first,
        }
    }

    /// Project the key columns out of a chunk by descriptor index.
    pub(crate) fn key_columns(&self, chunk: &Chunk) -> Result<Vec<ArrayRef>> {
        let mut columns = Vec::with_capacity(self.keys.len());
        for key in &self.keys {
            let column = chunk
                .batch
                .columns()
                .get(key.column)
                .cloned()
                .ok_or_else(|| {
                    SortError::InvariantViolation(format!(
                        "sort key column {} out of range for chunk with {} columns",
                        key.column,
                        chunk.batch.num_columns()
                    ))
                })?;
            columns.push(column);
        }
        Ok(columns)
    }

    pub(crate) fn sort_columns(&self, key_columns: &[ArrayRef]) -> Vec<SortColumn> {
        key_columns
            .iter()
            .zip(self.keys.iter())
            .map(|(values, key)| SortColumn {
                values: values.clone(),
                options: Some(Self::options(key)),
            })
            .collect()
    }

    /// Row converter over the key columns; encoded rows compare in the
    /// configured key order (null placement applied before direction).
    pub(crate) fn row_converter(&self, key_columns: &[ArrayRef]) -> Result<RowConverter> {
        let fields = key_columns
            .iter()
            .zip(self.keys.iter())
            .map(|(col, key)| {
                SortField::new_with_options(col.data_type().clone(), Self::options(key))
            })
            .collect::<Vec<_>>();
        Ok(RowConverter::new(fields)?)
    }
}

/// Re-materializes the sort tuple before key extraction.
///
/// Injected by the plan layer when ORDER BY operates on expressions rather
/// than plain input columns: the implementation executes its output
/// expressions against the chunk and returns the re-projected chunk that
/// the descriptor's column indices refer to. Must produce deterministic
/// column identities per chunk.
pub trait TupleMaterializer: Send + Sync {
    fn materialize(&self, chunk: &Chunk) -> Result<Chunk>;
}

pub const DEFAULT_BATCH_SIZE: usize = 4096;
pub const DEFAULT_FLUSH_THRESHOLD_ROWS: usize = 16384;

/// Construction-time configuration for [`FullSorter`].
#[derive(Clone)]
pub struct SortConfig {
    pub sort_keys: SortKeyDescriptor,
    /// Maximum rows to emit; `None` is unbounded.
    pub limit: Option<usize>,
    /// Rows to skip before the first emitted row.
    pub offset: usize,
    /// Output chunk size for `get_next`.
    pub batch_size: usize,
    /// Accumulated row count that triggers an intra-batch sort flush.
    pub flush_threshold_rows: usize,
    /// Optional byte bound on the accumulation buffer.
    pub flush_threshold_bytes: Option<usize>,
    pub materializer: Option<Arc<dyn TupleMaterializer>>,
}

impl Default for SortConfig {
    fn default() -> Self {
        Self {
            sort_keys: SortKeyDescriptor::default(),
            limit: None,
            offset: 0,
            batch_size: DEFAULT_BATCH_SIZE,
            flush_threshold_rows: DEFAULT_FLUSH_THRESHOLD_ROWS,
            flush_threshold_bytes: None,
            materializer: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{Int32Array, RecordBatch};
    use arrow::datatypes::{DataType, Field, Schema};

    #[test]
    fn key_columns_rejects_out_of_range_index() {
        let schema = Arc::new(Schema::new(vec![Field::new("v", DataType::Int32, true)]));
        let batch = RecordBatch::try_new(schema, vec![Arc::new(Int32Array::from(vec![1, 2]))])
            .expect("record batch");
        let chunk = Chunk::new(batch);
        let descriptor = SortKeyDescriptor::new(vec![SortKeyColumn {
            column: 3,
            asc: true,
            nulls_first: true,
        }]);

        let err = descriptor.key_columns(&chunk).expect_err("out of range");
        assert!(matches!(err, SortError::InvariantViolation(_)), "{err}");
    }

    #[test]
    fn default_config_is_unbounded() {
        let config = SortConfig::default();
        assert!(config.limit.is_none());
        assert_eq!(config.offset, 0);
        assert_eq!(config.batch_size, DEFAULT_BATCH_SIZE);
    }
}
