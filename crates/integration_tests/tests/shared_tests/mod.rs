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

use arrow_array::RecordBatch;
use futures::TryStreamExt;
use iceberg_commit::scan::ArrowRecordBatchStream;

mod inspect_test;
mod read_write_test;
mod schema_evolution_test;
mod snapshot_summary_test;
mod write_properties_test;

/// Drains a stream into its batches.
pub async fn collect(stream: ArrowRecordBatchStream) -> Vec<RecordBatch> {
    stream.try_collect().await.unwrap()
}

/// Rows of a single-batch metadata table.
pub async fn collect_one(stream: ArrowRecordBatchStream) -> RecordBatch {
    let mut batches = collect(stream).await;
    assert_eq!(batches.len(), 1);
    batches.remove(0)
}

/// Total row count of `batches`.
pub fn num_rows(batches: &[RecordBatch]) -> usize {
    batches.iter().map(RecordBatch::num_rows).sum()
}
