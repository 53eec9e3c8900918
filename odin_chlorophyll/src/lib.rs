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

//! time series viewer core for chlorophyll-a concentration forecasts. Per-date Feather (Arrow IPC) files
//! are discovered in an object store, loaded on demand while the user scrubs or plays through the
//! dates, and rows are mapped to display colors through a (log scale) color ramp

use std::{path::Path, time::Duration};
use serde::{Serialize,Deserialize};
use odin_common::datetime::{deserialize_optional_duration,serialize_optional_duration};

pub mod errors;
pub use errors::*;

pub mod color;
pub use color::*;

pub mod discovery;
pub use discovery::*;

pub mod gateway;
pub use gateway::*;

pub mod table;
pub use table::*;

pub mod timeline;
pub use timeline::*;

pub mod player;
pub use player::*;

/// per deployment configuration, usually loaded from a RON file
#[derive(Serialize,Deserialize,Debug,Clone)]
pub struct ChlConfig {
    /// None means AWS proper
    #[serde(default)]
    pub s3_endpoint: Option<String>,
    pub s3_region: String,
    pub bucket: String,
    pub prefix: String,

    /// regular expression that all data file keys have to match
    pub file_pattern: String,
    /// regular expression to extract the `YYYY-MM-DD` date token from a matching key
    #[serde(default = "default_date_pattern")]
    pub date_pattern: String,
    #[serde(default = "default_value_column")]
    pub value_column: String,

    pub color_ramp: ColorRamp,
    #[serde(default)]
    pub color_scale: ColorScale,
    #[serde(default = "default_legend_values")]
    pub legend_values: Vec<f64>,

    /// playback frame delay. If not set there is no auto-play
    #[serde(default, deserialize_with = "deserialize_optional_duration", serialize_with = "serialize_optional_duration")]
    pub frame_delay: Option<Duration>,
    #[serde(default)]
    pub stale_frames: StalePolicy,

    /// where users can download the source data set
    #[serde(default)]
    pub download_url: Option<String>,
}

fn default_date_pattern ()->String { DEFAULT_DATE_PATTERN.to_string() }
fn default_value_column ()->String { DEFAULT_VALUE_COLUMN.to_string() }
fn default_legend_values ()->Vec<f64> { DEFAULT_LEGEND_VALUES.to_vec() }

impl ChlConfig {
    pub fn key_pattern (&self)->Result<KeyPattern> {
        KeyPattern::new( &self.file_pattern, &self.date_pattern)
    }

    pub fn color_mapper (&self)->Result<ColorMapper> {
        ColorMapper::new( self.color_ramp, self.color_scale)
    }

    pub fn legend_stops (&self)->Result<Vec<LegendStop>> {
        Ok( self.color_mapper()?.legend_stops( &self.legend_values) )
    }

    pub fn timeline_config (&self)->Result<TimelineConfig> {
        Ok( TimelineConfig {
            bucket: self.bucket.clone(),
            prefix: self.prefix.clone(),
            pattern: self.key_pattern()?,
            value_column: self.value_column.clone(),
            frame_delay: self.frame_delay,
            stale_policy: self.stale_frames,
        })
    }

    /// the S3 gateway for the configured endpoint/region
    pub async fn s3_gateway (&self)->Result<S3Gateway> {
        S3Gateway::new( self.s3_endpoint.as_deref(), &self.s3_region).await
    }
}

/// load a [`ChlConfig`] (or any other deserializable config) from a RON file
pub fn load_config<C> (path: impl AsRef<Path>)->Result<C> where C: for<'a> Deserialize<'a> {
    let data = std::fs::read( path.as_ref())?;
    Ok( ron::de::from_bytes( data.as_slice())? )
}
