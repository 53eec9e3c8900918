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

use thiserror::Error;

pub type Result<T> = std::result::Result<T, OdinChlError>;

#[derive(Error,Debug)]
pub enum OdinChlError {
    #[error("IO error {0}")]
    IOError( #[from] std::io::Error),

    #[error("config parse error {0}")]
    ConfigParseError( #[from] ron::error::SpannedError),

    #[error("regex error {0}")]
    RegexError( #[from] regex::Error),

    #[error("S3 error {0}")]
    S3Error( #[from] odin_common::s3::OdinS3Error),

    #[error("arrow error {0}")]
    ArrowError( #[from] arrow::error::ArrowError),

    #[error("no value column {0}")]
    NoValueColumnError( String ),

    #[error("invalid color ramp {0}")]
    InvalidRampError( String ),

    #[error("invalid color {0}")]
    InvalidColorError( String ),

    #[error("timeline closed")]
    TimelineClosedError,

    #[error("operation failed {0}")]
    OpFailedError(String),
}

macro_rules! op_failed {
    ($fmt:literal $(, $arg:expr )* ) => {
        OdinChlError::OpFailedError( format!( $fmt $(, $arg)* ))
    };
}
pub (crate) use op_failed;
