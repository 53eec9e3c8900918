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

//! general support functions that are shared between ODIN data crates

pub mod macros;

pub mod datetime;

#[cfg(feature="s3")]
pub mod s3;

/// a simple incremental min/max/avg accumulator. Non-finite observations are ignored
#[derive(Debug,Clone,Copy,PartialEq)]
pub struct MinMaxAvg {
    pub n: usize,
    pub min: f64,
    pub max: f64,
    pub avg: f64
}

impl MinMaxAvg {
    pub fn new()->Self { MinMaxAvg { n: 0, min: f64::NAN, max: f64::NAN, avg: f64::NAN } }

    /// add a new observation
    pub fn add (&mut self, x: f64) {
        if !x.is_finite() { return }
        self.n += 1;

        if self.n > 1 {
            self.avg = self.avg + (x - self.avg) / self.n as f64;
            if x < self.min { self.min = x }
            if x > self.max { self.max = x }
        } else {
            self.min = x;
            self.max = x;
            self.avg = x;
        }
    }

    pub fn is_empty (&self)->bool { self.n == 0 }
}

impl Default for MinMaxAvg {
    fn default()->Self { MinMaxAvg::new() }
}

impl FromIterator<f64> for MinMaxAvg {
    fn from_iter<I: IntoIterator<Item=f64>> (iter: I)->Self {
        let mut acc = MinMaxAvg::new();
        for x in iter { acc.add(x) }
        acc
    }
}
