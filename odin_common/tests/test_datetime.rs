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

use std::time::Duration;
use chrono::NaiveDate;
use regex::Regex;
use serde::{Serialize,Deserialize};
use odin_common::datetime::*;

// run with "cargo test --test test_datetime -- --nocapture"

#[test]
fn test_extract_date() {
    let re = Regex::new(r"\d{4}-\d{2}-\d{2}").unwrap();

    let nd = extract_date( "TEST/03MAR_CHL5D_6MFORECAST-2024-03-07.feather", &re);
    assert_eq!( nd, NaiveDate::from_ymd_opt( 2024, 3, 7));
    assert_eq!( date_token( &nd.unwrap()), "2024-03-07");

    assert_eq!( extract_date( "TEST/no-date.feather", &re), None);
    assert_eq!( extract_date( "TEST/X-2024-13-45.feather", &re), None); // matches pattern but not a date
}

#[derive(Serialize,Deserialize,Debug)]
struct Delays {
    #[serde(default, deserialize_with="deserialize_optional_duration", serialize_with="serialize_optional_duration")]
    frame_delay: Option<Duration>,
}

#[test]
fn test_duration_serde() {
    let d: Delays = ron::from_str( r#"( frame_delay: Some("250ms") )"#).unwrap();
    assert_eq!( d.frame_delay, Some(millis(250)));

    let d: Delays = ron::from_str( r#"( frame_delay: Some("1min") )"#).unwrap();
    assert_eq!( d.frame_delay, Some(secs(60)));

    let d: Delays = ron::from_str( "( frame_delay: None )").unwrap();
    assert_eq!( d.frame_delay, None);
    let d: Delays = ron::from_str( "()").unwrap();
    assert_eq!( d.frame_delay, None);

    assert!( ron::from_str::<Delays>( r#"( frame_delay: Some("soon") )"#).is_err());

    let s = ron::to_string( &Delays{ frame_delay: Some(millis(1500)) }).unwrap();
    let d: Delays = ron::from_str( &s).unwrap();
    assert_eq!( d.frame_delay, Some(millis(1500)));
}
