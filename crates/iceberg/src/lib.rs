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

//! Snapshot and commit engine for Apache Iceberg tables.
//!
//! This crate writes Arrow record batches into Parquet data files, records
//! them in manifests and commits new table snapshots through a [`Catalog`].
//!
//! ## Append to a table
//!
//! ```rust, no_run
//! use std::collections::HashMap;
//!
//! use arrow_array::RecordBatch;
//! use iceberg_commit::io::FileIO;
//! use iceberg_commit::{Catalog, MemoryCatalog, Result, TableIdent};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let file_io = FileIO::from_path("memory:///")?.build()?;
//!     let catalog = MemoryCatalog::new(file_io, "memory:///warehouse");
//!     let table = catalog
//!         .load_table(&TableIdent::from_strs(["ns", "t"])?)
//!         .await?;
//!     let batches: Vec<RecordBatch> = vec![];
//!     let table = table.append(&catalog, &batches).await?;
//!     println!("{:?}", table.current_snapshot());
//!     Ok(())
//! }
//! ```
//!
//! ## Evolve the schema and append in one commit
//!
//! ```rust, no_run
//! use iceberg_commit::transaction::{ApplyTransactionAction, Transaction};
//! use iceberg_commit::{Catalog, Result, spec::Schema, table::Table};
//!
//! async fn evolve_and_append(
//!     catalog: &dyn Catalog,
//!     table: &Table,
//!     schema: Schema,
//!     data_files: Vec<iceberg_commit::spec::DataFile>,
//! ) -> Result<Table> {
//!     let tx = Transaction::new(table);
//!     let tx = tx.update_schema().union_by_name(schema).apply(tx)?;
//!     let tx = tx.fast_append().add_data_files(data_files).apply(tx)?;
//!     tx.commit(catalog).await
//! }
//! ```

mod error;
pub use error::{Error, ErrorKind, Result};

mod catalog;

pub use catalog::*;

pub mod arrow;
pub mod inspect;
pub mod io;
pub mod scan;
pub mod spec;
pub mod table;
pub mod transaction;
pub mod writer;
