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

use std::fmt::{Debug, Formatter};
use std::sync::Arc;

use bytes::Bytes;
use opendal::{Operator, services};
use url::Url;

use crate::{Error, ErrorKind, Result};

const MEMORY_SCHEME: &str = "memory";
const FS_SCHEME: &str = "file";

/// FileIO implementation, used to manipulate files in underlying storage.
///
/// # Note
///
/// All path passed to `FileIO` must be absolute path starting with scheme string used to construct `FileIO`.
/// For example, if you construct `FileIO` with `memory` scheme, all path passed to `FileIO` must start with `memory://`.
#[derive(Clone)]
pub struct FileIO {
    inner: Arc<Storage>,
}

impl Debug for FileIO {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileIO")
            .field("scheme", &self.inner.scheme())
            .finish()
    }
}

impl FileIO {
    /// Try to infer file io scheme from path.
    ///
    /// If it's a valid url, for example `memory:///warehouse`, url scheme will be used.
    /// If it's not a valid url, will try to detect if it's a file path.
    ///
    /// Otherwise will return parsing error.
    pub fn from_path(path: impl AsRef<str>) -> Result<FileIOBuilder> {
        let url = Url::parse(path.as_ref())
            .map_err(Error::from)
            .or_else(|e| {
                Url::from_file_path(path.as_ref()).map_err(|_| {
                    Error::new(
                        ErrorKind::DataInvalid,
                        "Input is neither a valid url nor path",
                    )
                    .with_context("input", path.as_ref().to_string())
                    .with_source(e)
                })
            })?;

        Ok(FileIOBuilder::new(url.scheme()))
    }

    /// Deletes file.
    ///
    /// # Arguments
    ///
    /// * path: It should be *absolute* path starting with scheme string used to construct [`FileIO`].
    pub async fn delete(&self, path: impl AsRef<str>) -> Result<()> {
        let (op, relative_path) = self.inner.create_operator(path.as_ref())?;
        Ok(op.delete(relative_path).await?)
    }

    /// Check file exists.
    ///
    /// # Arguments
    ///
    /// * path: It should be *absolute* path starting with scheme string used to construct [`FileIO`].
    pub async fn exists(&self, path: impl AsRef<str>) -> Result<bool> {
        let (op, relative_path) = self.inner.create_operator(path.as_ref())?;
        Ok(op.exists(relative_path).await?)
    }

    /// Creates input file.
    ///
    /// # Arguments
    ///
    /// * path: It should be *absolute* path starting with scheme string used to construct [`FileIO`].
    pub fn new_input(&self, path: impl AsRef<str>) -> Result<InputFile> {
        let (op, relative_path) = self.inner.create_operator(path.as_ref())?;
        let path = path.as_ref().to_string();
        let relative_path_pos = path.len() - relative_path.len();
        Ok(InputFile {
            op,
            path,
            relative_path_pos,
        })
    }

    /// Creates output file.
    ///
    /// # Arguments
    ///
    /// * path: It should be *absolute* path starting with scheme string used to construct [`FileIO`].
    pub fn new_output(&self, path: impl AsRef<str>) -> Result<OutputFile> {
        let (op, relative_path) = self.inner.create_operator(path.as_ref())?;
        let path = path.as_ref().to_string();
        let relative_path_pos = path.len() - relative_path.len();
        Ok(OutputFile {
            op,
            path,
            relative_path_pos,
        })
    }
}

/// Builder for [`FileIO`].
#[derive(Clone, Debug)]
pub struct FileIOBuilder {
    /// This is used to infer scheme of operator.
    ///
    /// If this is `None`, then [`FileIOBuilder::build`](FileIOBuilder::build) will build a local file io.
    scheme_str: Option<String>,
}

impl FileIOBuilder {
    /// Creates a new builder with scheme.
    pub fn new(scheme_str: impl ToString) -> Self {
        Self {
            scheme_str: Some(scheme_str.to_string()),
        }
    }

    /// Creates a new builder for local file io.
    pub fn new_fs_io() -> Self {
        Self {
            scheme_str: None,
        }
    }

    /// Builds [`FileIO`].
    pub fn build(self) -> Result<FileIO> {
        let storage = Storage::build(self.scheme_str.as_deref().unwrap_or(FS_SCHEME))?;
        Ok(FileIO {
            inner: Arc::new(storage),
        })
    }
}

enum Storage {
    Memory(Operator),
    LocalFs(Operator),
}

impl Storage {
    fn build(scheme: &str) -> Result<Self> {
        match scheme {
            MEMORY_SCHEME => Ok(Self::Memory(
                Operator::new(services::Memory::default())?.finish(),
            )),
            FS_SCHEME => Ok(Self::LocalFs(
                Operator::new(services::Fs::default().root("/"))?.finish(),
            )),
            _ => Err(Error::new(
                ErrorKind::FeatureUnsupported,
                format!("Constructing file io from scheme: {scheme} not supported now"),
            )),
        }
    }

    fn scheme(&self) -> &'static str {
        match self {
            Storage::Memory(_) => MEMORY_SCHEME,
            Storage::LocalFs(_) => FS_SCHEME,
        }
    }

    /// Returns the operator and the path relative to its root.
    fn create_operator<'a>(&self, path: &'a str) -> Result<(Operator, &'a str)> {
        match self {
            Storage::Memory(op) => {
                let relative = path
                    .strip_prefix("memory://")
                    .or_else(|| path.strip_prefix("memory:"))
                    .ok_or_else(|| invalid_path(path, MEMORY_SCHEME))?;
                Ok((op.clone(), relative))
            }
            Storage::LocalFs(op) => {
                let relative = if let Some(stripped) = path.strip_prefix("file://") {
                    stripped
                } else if let Some(stripped) = path.strip_prefix("file:") {
                    stripped
                } else if path.starts_with('/') {
                    path
                } else {
                    return Err(invalid_path(path, FS_SCHEME));
                };
                Ok((op.clone(), relative))
            }
        }
    }
}

fn invalid_path(path: &str, scheme: &str) -> Error {
    Error::new(
        ErrorKind::DataInvalid,
        format!("Invalid {scheme} path: {path}, should start with {scheme}://"),
    )
}

/// The struct the represents the metadata of a file.
#[derive(Clone, Debug)]
pub struct FileMetadata {
    /// The size of the file.
    pub size: u64,
}

/// Input file is used for reading from files.
#[derive(Debug)]
pub struct InputFile {
    op: Operator,
    // Absolution path of file.
    path: String,
    // Relative path of file to uri, starts at [`relative_path_pos`]
    relative_path_pos: usize,
}

impl InputFile {
    /// Absolute path to root uri.
    pub fn location(&self) -> &str {
        &self.path
    }

    /// Check if file exists.
    pub async fn exists(&self) -> Result<bool> {
        Ok(self.op.exists(&self.path[self.relative_path_pos..]).await?)
    }

    /// Fetch and returns metadata of file.
    pub async fn metadata(&self) -> Result<FileMetadata> {
        let meta = self.op.stat(&self.path[self.relative_path_pos..]).await?;

        Ok(FileMetadata {
            size: meta.content_length(),
        })
    }

    /// Read and returns whole content of file.
    pub async fn read(&self) -> Result<Bytes> {
        Ok(self
            .op
            .read(&self.path[self.relative_path_pos..])
            .await?
            .to_bytes())
    }
}

/// Output file is used for writing to files.
#[derive(Debug)]
pub struct OutputFile {
    op: Operator,
    // Absolution path of file.
    path: String,
    // Relative path of file to uri, starts at [`relative_path_pos`]
    relative_path_pos: usize,
}

impl OutputFile {
    /// Relative path to root uri.
    pub fn location(&self) -> &str {
        &self.path
    }

    /// Checks if file exists.
    pub async fn exists(&self) -> Result<bool> {
        Ok(self.op.exists(&self.path[self.relative_path_pos..]).await?)
    }

    /// Converts into [`InputFile`].
    pub fn to_input_file(self) -> InputFile {
        InputFile {
            op: self.op,
            path: self.path,
            relative_path_pos: self.relative_path_pos,
        }
    }

    /// Create a new output file with given bytes.
    ///
    /// # Notes
    ///
    /// Calling `write` will overwrite the file if it exists.
    pub async fn write(&self, bs: Bytes) -> Result<()> {
        self.op.write(&self.path[self.relative_path_pos..], bs).await?;
        Ok(())
    }
}
