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
//! Sort processor for ORDER BY execution.
//!
//! Responsibilities:
//! - Bridge [`FullSorter`] into the pipeline processor contract: chunks are
//!   pushed while the stage builds, and sorted output is pulled after the
//!   stage finishes.

use crate::common::error::Result;
use crate::common::logging::debug;
use crate::exec::chunk::Chunk;
use crate::exec::operators::sort::{FullSorter, SortConfig};
use crate::exec::pipeline::operator::{Operator, OperatorFactory, ProcessorOperator};

/// Factory for sort processors that materialize ORDER BY output chunks.
pub struct SortProcessorFactory {
    name: String,
    config: SortConfig,
}

impl SortProcessorFactory {
    pub fn new(node_id: i32, config: SortConfig) -> Self {
        let name = if node_id >= 0 {
            if config.limit.is_some() {
                format!("TOP_N (id={node_id})")
            } else {
                format!("SORT (id={node_id})")
            }
        } else if config.limit.is_some() {
            "TOP_N".to_string()
        } else {
            "SORT".to_string()
        };
        Self { name, config }
    }
}

impl OperatorFactory for SortProcessorFactory {
    fn name(&self) -> &str {
        &self.name
    }

    fn create(&self) -> Box<dyn Operator> {
        Box::new(SortProcessor {
            name: self.name.clone(),
            sorter: FullSorter::new(self.config.clone()),
            pending_output: None,
            finishing: false,
            finished: false,
        })
    }
}

struct SortProcessor {
    name: String,
    sorter: FullSorter,
    pending_output: Option<Chunk>,
    finishing: bool,
    finished: bool,
}

impl Operator for SortProcessor {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_finished(&self) -> bool {
        self.finished
    }

    fn as_processor_mut(&mut self) -> Option<&mut dyn ProcessorOperator> {
        Some(self)
    }

    fn as_processor_ref(&self) -> Option<&dyn ProcessorOperator> {
        Some(self)
    }
}

impl ProcessorOperator for SortProcessor {
    fn need_input(&self) -> bool {
        !self.finishing && !self.finished
    }

    fn has_output(&self) -> bool {
        self.pending_output.is_some()
    }

    fn push_chunk(&mut self, chunk: Chunk) -> Result<()> {
        if self.finished {
            return Ok(());
        }
        self.sorter.append_block(chunk)
    }

    fn pull_chunk(&mut self) -> Result<Option<Chunk>> {
        let out = self.pending_output.take();
        if self.finishing {
            if out.is_some() {
                self.pending_output = self.sorter.get_next()?;
            }
            if self.pending_output.is_none() {
                self.finished = true;
            }
        }
        Ok(out)
    }

    fn set_finishing(&mut self) -> Result<()> {
        if self.finishing || self.finished {
            return Ok(());
        }
        self.finishing = true;
        self.sorter.prepare_for_read()?;
        self.pending_output = self.sorter.get_next()?;
        if self.pending_output.is_none() {
            self.finished = true;
        }
        debug!(
            "sort processor finishing: name={} retained_runs={}",
            self.name,
            self.sorter.retained_runs()
        );
        Ok(())
    }
}
