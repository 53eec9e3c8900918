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

//! command line tool to check chlorophyll timeline configs and data sets. It either lists the discovered
//! data files, prints the legend of the configured color ramp, or plays the timeline from a given
//! start index to the end, printing a line per loaded frame

use anyhow::{Result,anyhow};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use odin_common::define_cli;
use odin_chlorophyll::*;

define_cli! { ARGS [about="chlorophyll timeline player"] =
    config: String [long, default_value="odin_chlorophyll/configs/chlorophyll.ron", help="pathname of ChlConfig RON file"],
    dir: Option<String> [long, help="read data files from this directory instead of the configured object store"],
    list: bool [long, help="only list discovered data files"],
    legend: bool [long, help="only print legend stops"],
    start: usize [long, default_value_t=0, help="timeline index to start playback from"]
}

#[tokio::main]
async fn main()->Result<()> {
    tracing_subscriber::fmt().with_env_filter( EnvFilter::from_default_env()).init();

    let config: ChlConfig = load_config( &ARGS.config)?;
    let pattern = config.key_pattern()?;
    let mapper = config.color_mapper()?;

    if ARGS.legend {
        for stop in config.legend_stops()? {
            println!("{:>8.2}  {}", stop.value, stop.color.to_hex());
        }
        return Ok(())
    }

    let gateway: Arc<dyn ObjectStoreGateway> = match &ARGS.dir {
        Some(dir) => Arc::new( FsGateway::new( dir)),
        None => Arc::new( config.s3_gateway().await?)
    };

    let keys = discover( gateway.as_ref(), &config.bucket, &config.prefix, &pattern).await;
    if ARGS.list {
        for key in &keys {
            let date = key.date( &pattern).map( |d| d.to_string()).unwrap_or_else( || "?".to_string());
            println!("{date}  {key}");
        }
        return Ok(())
    }
    if keys.is_empty() { return Err( anyhow!("no data files found for {}", pattern.file_pattern())) }

    let n = keys.len();
    let start = ARGS.start.min( n-1);
    let handle = spawn_controller( gateway, config.timeline_config()?);
    handle.send_msg( TimelineMsg::FilesDiscovered(keys)).await?;
    handle.commit( start).await?;

    if !handle.snapshot().play_enabled || start == n-1 {
        let snap = handle.wait_for( |s| s.table_index == Some(start) || s.last_error.is_some()).await?;
        print_frame( &snap, &pattern, &mapper);
        handle.shutdown();
        return Ok(())
    }

    println!("playing {} frames from index {start} (terminate with Ctrl-C)", n - start);
    handle.set_playing( true).await?;
    handle.wait_for( |s| s.is_playing || s.current_index == n-1).await?;

    let mut rx = handle.subscribe();
    let mut last_table: Option<usize> = None;
    let mut last_error: Option<String> = None;
    loop {
        {
            let snap = rx.borrow_and_update();
            let new_error = snap.last_error.is_some() && snap.last_error != last_error;
            if snap.table_index != last_table || snap.last_error != last_error {
                print_frame( &snap, &pattern, &mapper);
                last_table = snap.table_index;
                last_error = snap.last_error.clone();
            }
            if !snap.is_playing && (snap.table_index == Some(snap.current_index) || new_error) { break }
        }

        tokio::select! {
            res = rx.changed() => if res.is_err() { break },
            _ = tokio::signal::ctrl_c() => break
        }
    }

    handle.shutdown();
    Ok(())
}

fn print_frame (snap: &TimelineSnapshot, pattern: &KeyPattern, mapper: &ColorMapper) {
    if let Some(err) = &snap.last_error {
        println!("[{}] error: {}", snap.current_index, err);
    }

    if let (Some(idx), Some(table)) = (snap.table_index, &snap.table) {
        let date = snap.keys.get(idx).and_then( |k| k.date(pattern)).map( |d| d.to_string()).unwrap_or_else( || "?".to_string());
        let stats = table.stats();
        if stats.is_empty() {
            println!("[{idx}] {date}: {} rows, no values", table.num_rows());
        } else {
            println!("[{idx}] {date}: {} rows, {} min={:.3} max={:.3} avg={:.3} ({})",
                table.num_rows(), table.value_column(), stats.min, stats.max, stats.avg, mapper.resolve(stats.avg).to_hex());
        }
    }
}
