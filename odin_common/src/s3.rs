/*
 * Copyright © 2024, United States Government, as represented by the Administrator of 
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

//! support functions for AWS S3 compatible object stores (including non-AWS endpoints such as MinIO)

use thiserror::Error;
use bytes::Bytes;
use aws_sdk_s3::Client;
use aws_config::{Region,meta::region::RegionProviderChain};
use tracing::debug;

pub type S3Client = Client;

pub type Result<T> = std::result::Result<T, OdinS3Error>;

#[derive(Error,Debug)]
pub enum OdinS3Error {
    #[error("AWS S3 get object error {0}")]
    AWSS3ObjectError( #[from] aws_smithy_runtime_api::client::result::SdkError<aws_sdk_s3::operation::get_object::GetObjectError, aws_smithy_runtime_api::http::Response>),

    #[error("AWS S3 list object error {0}")]
    AWSS3ListObjectError( #[from] aws_smithy_runtime_api::client::result::SdkError<aws_sdk_s3::operation::list_objects::ListObjectsError, aws_smithy_runtime_api::http::Response>),

    #[error("AWS byte stream download error {0}")]
    AWSByteStreamError( #[from] aws_smithy_types::byte_stream::error::Error),
}

/// create anonymous S3 Client for given AWS region
pub async fn create_s3_client (region: String) -> Result<Client> {
    let region_provider = RegionProviderChain::first_try( Region::new( region));
    let aws_config = aws_config::from_env().no_credentials().region(region_provider).load().await; // add anonymous creditials
    Ok( Client::new(&aws_config) ) 
}

/// create anonymous S3 Client for a given (non-AWS) endpoint URL and region.
/// Such servers (e.g. MinIO) usually require path style addressing (`<endpoint>/<bucket>/<key>`)
pub async fn create_endpoint_s3_client (endpoint: &str, region: String) -> Result<Client> {
    let aws_config = aws_config::from_env()
        .no_credentials()
        .region( Region::new( region))
        .endpoint_url( endpoint)
        .load().await;

    let s3_config = aws_sdk_s3::config::Builder::from( &aws_config)
        .force_path_style( true)
        .build();

    Ok( Client::from_conf( s3_config) )
}

/// retrieve all object keys for given bucket/prefix, following list continuation markers.
/// If there is no error this always returns a `Vec<String>` but it might be empty (if there were no matching objects)
pub async fn list_s3_keys (client: &Client, bucket: &str, prefix: &str) -> Result<Vec<String>> {
    let mut keys: Vec<String> = Vec::new();
    let mut marker: Option<String> = None;

    loop {
        let mut builder = client.list_objects().bucket(bucket).prefix(prefix);
        if let Some(key) = &marker {
            builder = builder.marker(key);
        }
        let result = builder.send().await?;

        let n_before = keys.len();
        keys.extend( result.contents().iter().filter_map( |o| o.key().map( |k| k.to_string())));

        // next_marker is only set if the request had a delimiter, otherwise we have to use the last key
        if result.is_truncated().unwrap_or(false) && keys.len() > n_before {
            marker = result.next_marker().map( |m| m.to_string()).or_else( || keys.last().cloned());
            debug!("continue listing {bucket}/{prefix} after {:?}", marker);
        } else {
            break;
        }
    }

    Ok(keys)
}

/// retrieve the contents of the object with given key as bytes (in memory)
pub async fn get_s3_object_bytes (client: &Client, bucket: &str, key: &str) -> Result<Bytes> {
    let object = client
        .get_object()
        .bucket(bucket)
        .key(key)
        .send()
        .await?;

    let data = object.body.collect().await?;
    Ok( data.into_bytes() )
}
