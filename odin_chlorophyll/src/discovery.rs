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

//! discovery of the ordered sequence of dated data files within an object store prefix

use std::{fmt, ops::Deref};
use chrono::NaiveDate;
use regex::Regex;
use tracing::{debug,info};
use odin_common::datetime::extract_date;

use crate::errors::Result;
use crate::gateway::ObjectStoreGateway;

pub const DEFAULT_DATE_PATTERN: &str = r"\d{4}-\d{2}-\d{2}";

/// the object key of a single dated data snapshot
#[derive(Debug,Clone,PartialEq,Eq,PartialOrd,Ord,Hash)]
pub struct FileKey(String);

impl FileKey {
    pub fn new (key: impl ToString)->Self { FileKey(key.to_string()) }

    pub fn as_str (&self)->&str { &self.0 }

    /// the date token embedded in this key, as extracted by the date pattern of `pattern`
    pub fn date (&self, pattern: &KeyPattern)->Option<NaiveDate> {
        extract_date( &self.0, &pattern.date_re)
    }

    /// last path element of the key
    pub fn file_name (&self)->&str {
        self.0.rsplit('/').next().unwrap_or( &self.0)
    }
}

impl Deref for FileKey {
    type Target = str;
    fn deref (&self)->&str { &self.0 }
}

impl fmt::Display for FileKey {
    fn fmt (&self, f: &mut fmt::Formatter<'_>)->fmt::Result { f.write_str(&self.0) }
}

impl From<&str> for FileKey {
    fn from (s: &str)->Self { FileKey(s.to_string()) }
}

/// the compiled file and date patterns that identify data files of a product
#[derive(Debug,Clone)]
pub struct KeyPattern {
    file_re: Regex,
    date_re: Regex,
}

impl KeyPattern {
    pub fn new (file_pattern: &str, date_pattern: &str)->Result<Self> {
        Ok( KeyPattern { file_re: Regex::new(file_pattern)?, date_re: Regex::new(date_pattern)? } )
    }

    /// pattern for keys of the form `<prefix>/<product>-YYYY-MM-DD.<extension>`
    pub fn for_product (prefix: &str, product: &str, extension: &str)->Result<Self> {
        let file_pattern = format!( r"^{}/{}-\d{{4}}-\d{{2}}-\d{{2}}\.{}$",
                                    regex::escape(prefix), regex::escape(product), regex::escape(extension));
        KeyPattern::new( &file_pattern, DEFAULT_DATE_PATTERN)
    }

    pub fn is_match (&self, key: &str)->bool { self.file_re.is_match(key) }

    pub fn file_pattern (&self)->&str { self.file_re.as_str() }
    pub fn date_pattern (&self)->&str { self.date_re.as_str() }
}

/// filter the given keys by `pattern` and sort them in ascending (lexical) order.
/// Lexical order is chronological order as long as the date token is `YYYY-MM-DD` formatted, which
/// is a property of the file naming convention and not checked here
pub fn order_keys<I,S> (keys: I, pattern: &KeyPattern)->Vec<FileKey> where I: IntoIterator<Item=S>, S: AsRef<str> {
    let mut matching: Vec<FileKey> = keys.into_iter()
        .filter( |k| pattern.is_match( k.as_ref()))
        .map( |k| FileKey::new( k.as_ref()))
        .collect();

    matching.sort();
    matching.dedup();
    matching
}

/// list all keys under `prefix` and return the ordered sequence of the ones matching `pattern`.
/// This is fail-soft: if the gateway cannot list we get an empty sequence
pub async fn discover (gateway: &dyn ObjectStoreGateway, bucket: &str, prefix: &str, pattern: &KeyPattern)->Vec<FileKey> {
    let keys = gateway.list( bucket, prefix).await;
    let n_listed = keys.len();
    let ordered = order_keys( keys, pattern);

    info!("discovered {} of {} objects in {}/{} matching {}", ordered.len(), n_listed, bucket, prefix, pattern.file_pattern());
    if let (Some(first),Some(last)) = (ordered.first(),ordered.last()) {
        debug!("key range {} .. {}", first, last);
    }
    ordered
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_keys() {
        let pattern = KeyPattern::new( r"^P/X-\d{4}-\d{2}-\d{2}\.feather$", DEFAULT_DATE_PATTERN).unwrap();
        let keys = [
            "P/X-2024-01-01.feather",
            "P/X-2024-01-03.feather",
            "P/README.md",
            "P/X-2024-01-02.feather",
            "P/X-2024-01-02.feather.tmp",
            "Q/X-2024-01-04.feather",
            "P/X-2024-01-01.feather",
        ];

        let ordered = order_keys( keys, &pattern);
        assert_eq!( ordered, vec![
            FileKey::from("P/X-2024-01-01.feather"),
            FileKey::from("P/X-2024-01-02.feather"),
            FileKey::from("P/X-2024-01-03.feather"),
        ]);
    }

    #[test]
    fn test_for_product() {
        let pattern = KeyPattern::for_product( "TEST", "03MAR_CHL5D_6MFORECAST", "feather").unwrap();
        assert!( pattern.is_match( "TEST/03MAR_CHL5D_6MFORECAST-2024-05-01.feather"));
        assert!( !pattern.is_match( "TEST/03MAR_CHL5D_6MFORECAST-2024-05-01xfeather"));
        assert!( !pattern.is_match( "XTEST/03MAR_CHL5D_6MFORECAST-2024-05-01.feather"));

        let key = FileKey::from( "TEST/03MAR_CHL5D_6MFORECAST-2024-05-01.feather");
        assert_eq!( key.date( &pattern), NaiveDate::from_ymd_opt( 2024, 5, 1));
        assert_eq!( key.file_name(), "03MAR_CHL5D_6MFORECAST-2024-05-01.feather");
    }
}
