/*
 * Copyright © 2025, United States Government, as represented by the Administrator of 
 * the National Aeronautics and Space Administration. All rights reserved.
 *
 * The “ODIN” software is licensed under the Apache License, Version 2.0 (the "License"); 
 * you may not use this file except in compliance with the License. You may obtain a copy 
 * of the License at http://www.apache.org/licenses/LICENSE-2.0.
 *
 * Unless required by applicable law or agreed to in writing, software distributed under
 * the License is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND,
 * either express or implied. See the License for the specific language governing permissions
 * and limitations under the License.
 */

//! object store access. All gateways are fail-soft: errors are logged and turned into empty
//! listings or absent objects so that callers only have to deal with "nothing to show"

use std::{collections::BTreeMap, fmt::Debug, path::{Component,Path,PathBuf}, sync::Mutex};
use async_trait::async_trait;
use bytes::Bytes;
use tracing::{debug,warn};
use odin_common::s3::{S3Client,create_s3_client,create_endpoint_s3_client,list_s3_keys,get_s3_object_bytes};

use crate::errors::Result;

#[async_trait]
pub trait ObjectStoreGateway: Debug + Send + Sync {
    /// all keys under `prefix`. Empty on error
    async fn list (&self, bucket: &str, prefix: &str)->Vec<String>;

    /// contents of object `key`. None on error
    async fn fetch (&self, bucket: &str, key: &str)->Option<Bytes>;
}

/* #region S3 *************************************************************************************************/

#[derive(Debug,Clone)]
pub struct S3Gateway {
    client: S3Client,
}

impl S3Gateway {
    /// anonymous client for either a custom endpoint (e.g. MinIO) or AWS proper
    pub async fn new (endpoint: Option<&str>, region: &str)->Result<Self> {
        let client = match endpoint {
            Some(endpoint) => create_endpoint_s3_client( endpoint, region.to_string()).await?,
            None => create_s3_client( region.to_string()).await?
        };
        Ok( S3Gateway{ client } )
    }
}

#[async_trait]
impl ObjectStoreGateway for S3Gateway {
    async fn list (&self, bucket: &str, prefix: &str)->Vec<String> {
        match list_s3_keys( &self.client, bucket, prefix).await {
            Ok(keys) => keys,
            Err(e) => {
                warn!("error listing objects in {bucket}/{prefix}: {e}");
                Vec::new()
            }
        }
    }

    async fn fetch (&self, bucket: &str, key: &str)->Option<Bytes> {
        match get_s3_object_bytes( &self.client, bucket, key).await {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                warn!("error retrieving object {bucket}/{key}: {e}");
                None
            }
        }
    }
}

/* #endregion S3 */

/* #region local filesystem ***********************************************************************************/

/// a local directory that stands in for a bucket, object keys being '/' separated paths relative to it.
/// The bucket name is ignored
#[derive(Debug,Clone)]
pub struct FsGateway {
    root: PathBuf,
}

impl FsGateway {
    pub fn new (root: impl AsRef<Path>)->Self { FsGateway { root: root.as_ref().to_path_buf() } }

    pub fn root (&self)->&Path { &self.root }

    /// keys must not escape the root directory
    fn key_path (&self, key: &str)->Option<PathBuf> {
        let rel = Path::new(key);
        if rel.components().all( |c| matches!( c, Component::Normal(_))) {
            Some( self.root.join(rel))
        } else {
            None
        }
    }
}

fn collect_keys (root: &Path, dir: &Path, keys: &mut Vec<String>)->std::io::Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            collect_keys( root, &path, keys)?;
        } else if let Ok(rel) = path.strip_prefix(root) {
            let key: Vec<String> = rel.components().map( |c| c.as_os_str().to_string_lossy().into_owned()).collect();
            keys.push( key.join("/"));
        }
    }
    Ok(())
}

#[async_trait]
impl ObjectStoreGateway for FsGateway {
    async fn list (&self, bucket: &str, prefix: &str)->Vec<String> {
        let root = self.root.clone();
        let prefix = prefix.to_string();

        let res = tokio::task::spawn_blocking( move || {
            let mut keys = Vec::new();
            collect_keys( &root, &root, &mut keys).map( |_| keys)
        }).await;

        match res {
            Ok(Ok(keys)) => keys.into_iter().filter( |k| k.starts_with(&prefix)).collect(),
            Ok(Err(e)) => {
                warn!("error listing {:?} for {bucket}/{prefix}: {e}", self.root);
                Vec::new()
            }
            Err(e) => {
                warn!("listing task for {:?} failed: {e}", self.root);
                Vec::new()
            }
        }
    }

    async fn fetch (&self, bucket: &str, key: &str)->Option<Bytes> {
        let Some(path) = self.key_path(key) else {
            warn!("rejected key outside of {:?}: {key}", self.root);
            return None
        };

        match tokio::fs::read( &path).await {
            Ok(data) => Some( Bytes::from(data)),
            Err(e) => {
                warn!("error reading {path:?} for {bucket}/{key}: {e}");
                None
            }
        }
    }
}

/* #endregion local filesystem */

/* #region in-memory ******************************************************************************************/

/// in-memory object store, mostly for testing and demos. Keeps a log of fetched keys
#[derive(Debug,Default)]
pub struct MemoryGateway {
    objects: BTreeMap<String,Bytes>,
    fetched: Mutex<Vec<String>>,
}

impl MemoryGateway {
    pub fn new ()->Self { MemoryGateway::default() }

    pub fn with_object (mut self, key: impl ToString, data: impl Into<Bytes>)->Self {
        self.objects.insert( key.to_string(), data.into());
        self
    }

    pub fn insert (&mut self, key: impl ToString, data: impl Into<Bytes>) {
        self.objects.insert( key.to_string(), data.into());
    }

    /// keys of all fetch requests so far, in request order (including the ones for missing objects)
    pub fn fetched_keys (&self)->Vec<String> {
        self.fetched.lock().map( |v| v.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl ObjectStoreGateway for MemoryGateway {
    async fn list (&self, _bucket: &str, prefix: &str)->Vec<String> {
        self.objects.keys().filter( |k| k.starts_with(prefix)).cloned().collect()
    }

    async fn fetch (&self, bucket: &str, key: &str)->Option<Bytes> {
        if let Ok(mut fetched) = self.fetched.lock() {
            fetched.push( key.to_string());
        }
        let data = self.objects.get(key).cloned();
        if data.is_none() { debug!("no object {bucket}/{key}") }
        data
    }
}

/* #endregion in-memory */
