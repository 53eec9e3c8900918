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

//! mapping of scalar (concentration) values to display colors

use std::{fmt, str::FromStr};
use serde::{Serialize,Deserialize,Deserializer,de::{self,MapAccess,Visitor}};
use crate::errors::{OdinChlError,Result};

/// reference values for which we show legend stops if nothing else is configured
pub const DEFAULT_LEGEND_VALUES: [f64;4] = [0.05, 0.2, 0.5, 1.0];

/* #region Rgba ***********************************************************************************************/

/// 8bit RGBA color. In configs this is specified either as a `#rrggbb` or `#rrggbbaa` hex string or as
/// a `(r:.., g:.., b:.., a:..)` struct (alpha defaults to 255). Serialized as hex string
#[derive(Serialize,Debug,Clone,Copy,PartialEq,Eq,Hash)]
#[serde(into = "String")]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba {
    pub const fn new (r: u8, g: u8, b: u8, a: u8)->Self { Rgba{r,g,b,a} }
    pub const fn opaque (r: u8, g: u8, b: u8)->Self { Rgba{r,g,b,a:255} }

    /// `#rrggbbaa` representation (lower case)
    pub fn to_hex (&self)->String {
        format!("#{:02x}{:02x}{:02x}{:02x}", self.r, self.g, self.b, self.a)
    }

    /// relative luminance (ITU-R BT.709 weights) of the color channels, not considering alpha
    pub fn luminance (&self)->f64 {
        0.2126 * self.r as f64 + 0.7152 * self.g as f64 + 0.0722 * self.b as f64
    }
}

impl fmt::Display for Rgba {
    fn fmt (&self, f: &mut fmt::Formatter<'_>)->fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl FromStr for Rgba {
    type Err = OdinChlError;

    fn from_str (s: &str)->Result<Self> {
        let hex = s.strip_prefix('#').unwrap_or(s);
        if !hex.is_ascii() || (hex.len() != 6 && hex.len() != 8) {
            return Err( OdinChlError::InvalidColorError(s.to_string()))
        }

        let channel = |i: usize| u8::from_str_radix( &hex[i..i+2], 16).map_err( |_| OdinChlError::InvalidColorError(s.to_string()));
        let a = if hex.len() == 8 { channel(6)? } else { 255 };
        Ok( Rgba::new( channel(0)?, channel(2)?, channel(4)?, a) )
    }
}

impl From<Rgba> for String {
    fn from (c: Rgba)->String { c.to_hex() }
}

impl<'de> Deserialize<'de> for Rgba {
    fn deserialize<D> (deserializer: D)->std::result::Result<Self,D::Error> where D: Deserializer<'de> {
        deserializer.deserialize_any( RgbaVisitor)
    }
}

struct RgbaVisitor;

const RGBA_FIELDS: &[&str] = &["r", "g", "b", "a"];

impl<'de> Visitor<'de> for RgbaVisitor {
    type Value = Rgba;

    fn expecting (&self, f: &mut fmt::Formatter)->fmt::Result {
        write!( f, "a #rrggbb[aa] hex string or a (r,g,b,a) struct")
    }

    fn visit_str<E> (self, v: &str)->std::result::Result<Rgba,E> where E: de::Error {
        v.parse().map_err( E::custom)
    }

    fn visit_map<A> (self, mut map: A)->std::result::Result<Rgba,A::Error> where A: MapAccess<'de> {
        let mut channels: [Option<u8>;4] = [None, None, None, Some(255)];

        while let Some(key) = map.next_key::<String>()? {
            let i = match key.as_str() {
                "r" => 0,
                "g" => 1,
                "b" => 2,
                "a" => 3,
                other => return Err( de::Error::unknown_field( other, RGBA_FIELDS))
            };
            channels[i] = Some( map.next_value::<u8>()?);
        }

        let channel = |i: usize|->std::result::Result<u8,A::Error> { channels[i].ok_or_else( || de::Error::missing_field( RGBA_FIELDS[i])) };
        Ok( Rgba::new( channel(0)?, channel(1)?, channel(2)?, channel(3)?) )
    }
}

/* #endregion Rgba */

/* #region color ramp ******************************************************************************************/

/// two point color ramp over a numeric domain
#[derive(Serialize,Deserialize,Debug,Clone,Copy,PartialEq)]
pub struct ColorRamp {
    pub min_value: f64,
    pub min_color: Rgba,
    pub max_value: f64,
    pub max_color: Rgba,
}

/// how values are mapped onto the ramp domain. Chlorophyll concentrations span several orders
/// of magnitude which is why `Log` is the default
#[derive(Serialize,Deserialize,Debug,Clone,Copy,PartialEq,Eq,Default)]
pub enum ColorScale {
    #[default]
    Log,
    Linear,
}

#[derive(Serialize,Debug,Clone,Copy,PartialEq)]
pub struct LegendStop {
    pub value: f64,
    pub color: Rgba,
}

/// resolves values through a [`ColorRamp`]. Values at or below `min_value` (including zero,
/// negative and NaN values) resolve to `min_color`, values at or above `max_value` to `max_color`.
/// Each channel is interpolated linearly in the (possibly log-) transformed domain
#[derive(Debug,Clone)]
pub struct ColorMapper {
    ramp: ColorRamp,
    scale: ColorScale,
    t_min: f64,
    t_max: f64,
}

impl ColorMapper {
    pub fn new (ramp: ColorRamp, scale: ColorScale)->Result<Self> {
        if !(ramp.min_value.is_finite() && ramp.max_value.is_finite() && ramp.min_value < ramp.max_value) {
            return Err( OdinChlError::InvalidRampError( format!("domain [{}, {}]", ramp.min_value, ramp.max_value)))
        }
        if scale == ColorScale::Log && ramp.min_value <= 0.0 {
            return Err( OdinChlError::InvalidRampError( format!("log scale requires positive min_value, got {}", ramp.min_value)))
        }

        let t_min = transform( scale, ramp.min_value);
        let t_max = transform( scale, ramp.max_value);
        Ok( ColorMapper{ ramp, scale, t_min, t_max } )
    }

    pub fn ramp (&self)->&ColorRamp { &self.ramp }
    pub fn scale (&self)->ColorScale { self.scale }

    pub fn resolve (&self, value: f64)->Rgba {
        let ramp = &self.ramp;
        if !(value > ramp.min_value) { return ramp.min_color } // also catches NaN
        if value >= ramp.max_value { return ramp.max_color }

        let f = (transform( self.scale, value) - self.t_min) / (self.t_max - self.t_min);
        let (c0,c1) = (&ramp.min_color, &ramp.max_color);
        Rgba::new( lerp( c0.r, c1.r, f), lerp( c0.g, c1.g, f), lerp( c0.b, c1.b, f), lerp( c0.a, c1.a, f))
    }

    pub fn legend_stops (&self, values: &[f64])->Vec<LegendStop> {
        values.iter().map( |&value| LegendStop{ value, color: self.resolve(value) }).collect()
    }
}

#[inline]
fn transform (scale: ColorScale, v: f64)->f64 {
    match scale {
        ColorScale::Log => v.ln(),
        ColorScale::Linear => v,
    }
}

#[inline]
fn lerp (c0: u8, c1: u8, f: f64)->u8 {
    let c = c0 as f64 + (c1 as f64 - c0 as f64) * f;
    c.round().clamp( 0.0, 255.0) as u8
}

/* #endregion color ramp */
