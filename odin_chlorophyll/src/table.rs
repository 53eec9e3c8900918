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

//! decoded per-date data snapshots (Feather v2 / Arrow IPC)

use std::io::Cursor;
use arrow::array::AsArray;
use arrow::compute::cast;
use arrow::datatypes::{DataType,Float64Type,SchemaRef};
use arrow::ipc::reader::{FileReader,StreamReader};
use arrow::record_batch::RecordBatch;
use bytes::Bytes;
use odin_common::MinMaxAvg;

use crate::color::{ColorMapper,Rgba};
use crate::errors::{OdinChlError,Result};

pub const DEFAULT_VALUE_COLUMN: &str = "CHL";

/// magic bytes of the Arrow IPC file format (Feather v2). Anything else is read as IPC stream
const ARROW_FILE_MAGIC: &[u8] = b"ARROW1";

/// an immutable decoded table. Rows are addressed across all record batches, the value column is
/// kept as f64 regardless of its stored numeric type
#[derive(Debug)]
pub struct ChlTable {
    schema: SchemaRef,
    batches: Vec<RecordBatch>,
    value_column: String,
    values: Vec<Option<f64>>,
}

impl ChlTable {
    /// decode Arrow IPC file or stream bytes
    pub fn decode (bytes: &Bytes, value_column: &str)->Result<Self> {
        let cursor = Cursor::new( bytes.clone());

        if bytes.starts_with( ARROW_FILE_MAGIC) {
            let reader = FileReader::try_new( cursor, None)?;
            let schema = reader.schema();
            let batches = reader.collect::<std::result::Result<Vec<RecordBatch>,_>>()?;
            ChlTable::from_batches( schema, batches, value_column)
        } else {
            let reader = StreamReader::try_new( cursor, None)?;
            let schema = reader.schema();
            let batches = reader.collect::<std::result::Result<Vec<RecordBatch>,_>>()?;
            ChlTable::from_batches( schema, batches, value_column)
        }
    }

    pub fn from_batches (schema: SchemaRef, batches: Vec<RecordBatch>, value_column: &str)->Result<Self> {
        let idx = schema.index_of( value_column).map_err( |_| OdinChlError::NoValueColumnError( value_column.to_string()))?;

        let n_rows = batches.iter().map( |b| b.num_rows()).sum();
        let mut values: Vec<Option<f64>> = Vec::with_capacity( n_rows);
        for batch in &batches {
            let col = cast( batch.column(idx), &DataType::Float64)?;
            values.extend( col.as_primitive::<Float64Type>().iter());
        }

        Ok( ChlTable { schema, batches, value_column: value_column.to_string(), values } )
    }

    pub fn schema (&self)->&SchemaRef { &self.schema }
    pub fn batches (&self)->&[RecordBatch] { &self.batches }
    pub fn value_column (&self)->&str { &self.value_column }

    pub fn num_rows (&self)->usize { self.values.len() }
    pub fn is_empty (&self)->bool { self.values.is_empty() }

    /// value of the configured column for given row. None for null values or rows out of range
    pub fn chl (&self, row: usize)->Option<f64> {
        self.values.get(row).copied().flatten()
    }

    pub fn values (&self)->&[Option<f64>] { &self.values }

    /// min/max/avg over all (non-null, finite) values
    pub fn stats (&self)->MinMaxAvg {
        self.values.iter().filter_map( |v| *v).collect()
    }

    /// per row fill color, None for rows without value
    pub fn fill_colors (&self, mapper: &ColorMapper)->Vec<Option<Rgba>> {
        self.values.iter().map( |v| v.map( |v| mapper.resolve(v))).collect()
    }
}
