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

use chrono::NaiveDate;
use serde::{Deserialize,Serializer,Deserializer};
use std::time::Duration;
use regex::Regex;
use parse_duration::parse;

/// the date format we use for date tokens embedded in object keys and file names
pub const DATE_TOKEN_FORMAT: &str = "%Y-%m-%d";

// simple Duration ctor wrappers so that we don't need the (still experimental) std versions
#[inline] pub fn millis (n: u64)->Duration { Duration::from_millis(n) }
#[inline] pub fn secs (n: u64)->Duration { Duration::from_secs(n) }

/// find the first match of `re` within `s` and parse it as a `YYYY-MM-DD` date.
/// Returns None if there is no match or the match is not a valid calendar date
pub fn extract_date (s: &str, re: &Regex) -> Option<NaiveDate> {
    let m = re.find(s)?;
    NaiveDate::parse_from_str( m.as_str(), DATE_TOKEN_FORMAT).ok()
}

pub fn date_token (nd: &NaiveDate) -> String {
    nd.format(DATE_TOKEN_FORMAT).to_string()
}

//--- support for serde

pub fn deserialize_optional_duration <'a,D>(deserializer: D) -> Result<Option<Duration>,D::Error> 
    where D: Deserializer<'a>
{
    let s: Option<String> = Option::deserialize(deserializer)?;
    if let Some(s) = s {
        let d =  parse(s.as_str()).map_err( |e| serde::de::Error::custom(format!("{:?}",e)))?;
        return Ok( Some(d) )
    }

    Ok(None)
}

/// the counterpart of [`deserialize_optional_duration`]. Serializes as a `parse_duration` compatible string
pub fn serialize_optional_duration<S>(dur: &Option<Duration>, s: S) -> Result<S::Ok, S::Error>
    where S: Serializer,
{
    match dur {
        Some(d) => s.serialize_some( &format!("{}ms", d.as_millis())),
        None => s.serialize_none()
    }
}
