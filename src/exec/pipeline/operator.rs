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
//! Core operator traits for processor stages.
//!
//! Responsibilities:
//! - Defines the push/pull execution contract a pipeline driver uses to move
//!   chunks through a processor stage.
//!
//! Key exported interfaces:
//! - Types: `Operator`, `ProcessorOperator`, `OperatorFactory`.

use crate::common::error::Result;
use crate::exec::chunk::Chunk;

/// Base operator contract implemented by processor stage implementations.
pub trait Operator: Send {
    fn name(&self) -> &str;

    fn prepare(&mut self) -> Result<()> {
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        Ok(())
    }

    fn is_finished(&self) -> bool {
        false
    }

    fn as_processor_mut(&mut self) -> Option<&mut dyn ProcessorOperator> {
        None
    }

    fn as_processor_ref(&self) -> Option<&dyn ProcessorOperator> {
        None
    }
}

/// Extended operator contract for processor stages with push/pull semantics.
///
/// A driver pushes chunks while `need_input` holds, calls `set_finishing`
/// exactly once after the last push, then drains with `pull_chunk` until the
/// operator reports finished. Calls are strictly sequential; no internal
/// locking is provided.
pub trait ProcessorOperator: Operator {
    fn need_input(&self) -> bool;

    fn has_output(&self) -> bool;

    fn push_chunk(&mut self, chunk: Chunk) -> Result<()>;

    fn pull_chunk(&mut self) -> Result<Option<Chunk>>;

    fn set_finishing(&mut self) -> Result<()>;
}

/// Creates operator instances, one per parallel execution task.
pub trait OperatorFactory: Send + Sync {
    fn name(&self) -> &str;

    fn create(&self) -> Box<dyn Operator>;
}
