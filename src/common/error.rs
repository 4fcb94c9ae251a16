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
use arrow::error::ArrowError;
use thiserror::Error;

/// Errors surfaced by the sort operator family.
///
/// Every failure is synchronous; there is no I/O and no retry policy.
/// User-facing formatting is the caller's responsibility.
#[derive(Debug, Error)]
pub enum SortError {
    /// Sort tuple materialization or key evaluation failed. The in-progress
    /// ingestion call aborts with no partial run committed.
    #[error("sort key evaluation failed: {0}")]
    Evaluation(String),

    /// Internal contract breach (merge requested without enough runs, a
    /// cursor advanced past its run, append after prepare). Programming
    /// error; fail fast instead of silently corrupting ordering.
    #[error("sort invariant violated: {0}")]
    InvariantViolation(String),

    /// An arrow kernel failed while rearranging rows.
    #[error("arrow compute failed: {0}")]
    Arrow(#[from] ArrowError),
}

pub type Result<T> = std::result::Result<T, SortError>;
