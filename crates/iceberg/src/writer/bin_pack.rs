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

use std::mem;

use arrow_array::RecordBatch;

use crate::Result;

/// Arrow in-memory byte size of the rows of `batch`.
///
/// Only the sliced region of each buffer counts, so a slice weighs its share
/// of the parent batch rather than the whole allocation.
pub fn batch_weight(batch: &RecordBatch) -> Result<usize> {
    let mut weight = 0;
    for column in batch.columns() {
        weight += column.to_data().get_slice_memory_size()?;
    }
    Ok(weight)
}

/// Groups `batches` into bins of at most `target` bytes each.
///
/// A batch heavier than the target is first cut into `ceil(weight / target)`
/// row slices. Items are then packed in order: a new bin starts whenever the
/// next item would push the current one past the target. A single item
/// heavier than the target still gets a bin of its own.
pub fn bin_pack_batches(batches: &[RecordBatch], target: usize) -> Result<Vec<Vec<RecordBatch>>> {
    let target = target.max(1);

    let mut items = Vec::with_capacity(batches.len());
    for batch in batches.iter().filter(|b| b.num_rows() > 0) {
        let weight = batch_weight(batch)?;
        if weight <= target {
            items.push((batch.clone(), weight));
            continue;
        }

        let slices = weight.div_ceil(target);
        let rows_per_slice = batch.num_rows().div_ceil(slices).max(1);
        let mut offset = 0;
        while offset < batch.num_rows() {
            let len = rows_per_slice.min(batch.num_rows() - offset);
            let slice = batch.slice(offset, len);
            let weight = batch_weight(&slice)?;
            items.push((slice, weight));
            offset += len;
        }
    }

    let mut bins = Vec::new();
    let mut current = Vec::new();
    let mut current_weight = 0;
    for (batch, weight) in items {
        if !current.is_empty() && current_weight + weight > target {
            bins.push(mem::take(&mut current));
            current_weight = 0;
        }
        current.push(batch);
        current_weight += weight;
    }
    if !current.is_empty() {
        bins.push(current);
    }

    Ok(bins)
}
