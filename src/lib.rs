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
//! Batched in-memory multi-run sort for a vectorized columnar engine.
//!
//! The crate realizes ORDER BY / TOP-N physical plan nodes: unordered
//! chunks are pushed in, intra-sorted runs are produced per flush, and a
//! k-way merge streams one globally ordered output. When a row limit is
//! declared, whole runs that provably cannot reach the final top-k window
//! are discarded at admission time.

pub mod common;
pub mod exec;

pub use common::error::{Result, SortError};
pub use common::logging as vexsort_logging;
pub use exec::chunk::Chunk;
pub use exec::operators::sort::{
    FullSorter, SortConfig, SortKeyColumn, SortKeyDescriptor, SortProcessorFactory,
    TupleMaterializer,
};
