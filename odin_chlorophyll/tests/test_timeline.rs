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

use std::{sync::Arc, time::Duration};
use async_trait::async_trait;
use arrow::array::Float64Array;
use arrow::datatypes::{DataType,Field,Schema};
use arrow::ipc::writer::FileWriter;
use arrow::record_batch::RecordBatch;
use bytes::Bytes;
use tokio::time::{sleep,timeout,Instant};

use odin_common::datetime::{millis,secs};
use odin_chlorophyll::*;

const MAX_WAIT: Duration = Duration::from_secs(60);

fn feather_bytes (values: &[f64])->Bytes {
    let schema = Schema::new( vec![ Field::new( "CHL", DataType::Float64, true) ]);
    let batch = RecordBatch::try_new( Arc::new(schema.clone()), vec![ Arc::new( Float64Array::from( values.to_vec())) ]).unwrap();

    let mut buf: Vec<u8> = Vec::new();
    {
        let mut writer = FileWriter::try_new( &mut buf, &schema).unwrap();
        writer.write( &batch).unwrap();
        writer.finish().unwrap();
    }
    Bytes::from( buf)
}

fn key (i: usize)->String { format!("TEST/CHL-2024-01-{:02}.feather", i+1) }

fn keys (n: usize)->Vec<FileKey> { (0..n).map( |i| FileKey::new( key(i))).collect() }

fn memory_gateway (n: usize)->MemoryGateway {
    let mut gw = MemoryGateway::new();
    for i in 0..n {
        gw.insert( key(i), feather_bytes( &[0.1 * (i+1) as f64, 1.0]));
    }
    gw
}

fn timeline_config (frame_delay: Option<Duration>)->TimelineConfig {
    TimelineConfig {
        bucket: "chl".to_string(),
        prefix: "TEST/".to_string(),
        pattern: KeyPattern::for_product( "TEST", "CHL", "feather").unwrap(),
        value_column: "CHL".to_string(),
        frame_delay,
        stale_policy: StalePolicy::Discard,
    }
}

async fn wait_for<F> (handle: &TimelineHandle, pred: F)->TimelineSnapshot where F: FnMut(&TimelineSnapshot)->bool {
    timeout( MAX_WAIT, handle.wait_for( pred)).await.expect("timeout").expect("timeline closed")
}

/// a gateway that delays each fetch, optionally with specific delays for some keys
#[derive(Debug)]
struct SlowGateway {
    inner: MemoryGateway,
    delay: Duration,
    key_delays: Vec<(String,Duration)>,
}

impl SlowGateway {
    fn new (inner: MemoryGateway, delay: Duration)->Self {
        SlowGateway { inner, delay, key_delays: Vec::new() }
    }

    fn with_key_delay (mut self, key: String, delay: Duration)->Self {
        self.key_delays.push( (key, delay));
        self
    }
}

#[async_trait]
impl ObjectStoreGateway for SlowGateway {
    async fn list (&self, bucket: &str, prefix: &str)->Vec<String> {
        self.inner.list( bucket, prefix).await
    }

    async fn fetch (&self, bucket: &str, key: &str)->Option<Bytes> {
        let delay = self.key_delays.iter().find( |(k,_)| k == key).map( |(_,d)| *d).unwrap_or( self.delay);
        sleep( delay).await;
        self.inner.fetch( bucket, key).await
    }
}

#[tokio::test(start_paused = true)]
async fn test_discovery() {
    let mut gw = MemoryGateway::new();
    for k in ["TEST/CHL-2024-03-05.feather", "TEST/CHL-2024-01-01.feather", "TEST/CHL-2024-02-10.feather",
              "TEST/readme.txt", "TEST/CHL-2024-02-10.parquet"] {
        gw.insert( k, feather_bytes( &[0.5]));
    }
    let gw = Arc::new( gw);
    let handle = spawn_timeline( gw.clone(), timeline_config( None));

    let snap = wait_for( &handle, |s| s.table_index == Some(0)).await;
    let discovered: Vec<&str> = snap.keys.iter().map( |k| k.as_str()).collect();
    println!("discovered: {discovered:?}");

    assert_eq!( discovered, vec!["TEST/CHL-2024-01-01.feather", "TEST/CHL-2024-02-10.feather", "TEST/CHL-2024-03-05.feather"]);
    assert_eq!( snap.phase, Phase::Ready);
    assert_eq!( snap.current_index, 0);
    assert_eq!( snap.current_date.map( |d| d.to_string()), Some("2024-01-01".to_string()));
    assert_eq!( gw.fetched_keys(), vec!["TEST/CHL-2024-01-01.feather"]);

    handle.shutdown();
}

#[tokio::test(start_paused = true)]
async fn test_empty_discovery() {
    let handle = spawn_timeline( Arc::new( MemoryGateway::new()), timeline_config( Some(secs(1))));
    sleep( millis(100)).await;

    handle.set_playing( true).await.unwrap();
    handle.commit( 0).await.unwrap();
    sleep( millis(100)).await;

    let snap = handle.snapshot();
    assert_eq!( snap.phase, Phase::Idle);
    assert!( !snap.is_playing);
    assert!( snap.table.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_commit_fetches_once() {
    let gw = Arc::new( memory_gateway(5));
    let handle = spawn_controller( gw.clone(), timeline_config( None));
    handle.send_msg( TimelineMsg::FilesDiscovered( keys(5))).await.unwrap();
    wait_for( &handle, |s| s.table_index == Some(0)).await;

    for i in 1..4 { handle.scrub( i).await.unwrap() }
    let snap = wait_for( &handle, |s| s.current_index == 3).await;
    assert_eq!( snap.table_index, Some(0)); // scrubbing does not load
    assert_eq!( gw.fetched_keys().len(), 1);

    handle.commit( 3).await.unwrap();
    let snap = wait_for( &handle, |s| s.table_index == Some(3)).await;
    assert_eq!( snap.table.as_ref().map( |t| t.num_rows()), Some(2));
    assert_eq!( snap.table.as_ref().and_then( |t| t.chl(0)), Some(0.4));

    sleep( secs(5)).await;
    assert_eq!( gw.fetched_keys(), vec![ key(0), key(3) ]);
}

#[tokio::test(start_paused = true)]
async fn test_playback_to_end() {
    let gw = Arc::new( memory_gateway(5));
    let handle = spawn_controller( gw.clone(), timeline_config( Some(secs(1))));
    handle.send_msg( TimelineMsg::FilesDiscovered( keys(5))).await.unwrap();
    wait_for( &handle, |s| s.table_index == Some(0)).await;

    handle.commit( 1).await.unwrap();
    wait_for( &handle, |s| s.table_index == Some(1)).await;

    let t0 = Instant::now();
    handle.set_playing( true).await.unwrap();
    wait_for( &handle, |s| s.is_playing).await;

    let snap = wait_for( &handle, |s| !s.is_playing && s.table_index == Some(4)).await;
    let elapsed = t0.elapsed();
    println!("playback took {elapsed:?}");

    assert_eq!( snap.current_index, 4);
    assert_eq!( snap.phase, Phase::Ready);
    assert!( snap.last_error.is_none());
    assert!( elapsed >= secs(2));

    sleep( secs(10)).await;
    let snap = handle.snapshot();
    assert_eq!( snap.current_index, 4);
    assert!( !snap.is_playing);
    assert_eq!( gw.fetched_keys(), vec![ key(0), key(1), key(1), key(2), key(3), key(4) ]);

    // play at the end is refused
    handle.set_playing( true).await.unwrap();
    sleep( millis(100)).await;
    assert!( !handle.snapshot().is_playing);
}

#[tokio::test(start_paused = true)]
async fn test_pause_during_fetch() {
    let gw = Arc::new( SlowGateway::new( memory_gateway(5), millis(500)));
    let handle = spawn_controller( gw.clone(), timeline_config( Some(secs(1))));
    handle.send_msg( TimelineMsg::FilesDiscovered( keys(5))).await.unwrap();
    wait_for( &handle, |s| s.table_index == Some(0)).await;

    handle.set_playing( true).await.unwrap();
    wait_for( &handle, |s| s.is_playing).await;
    sleep( millis(100)).await; // playback fetch of frame 0 is in flight
    handle.set_playing( false).await.unwrap();

    sleep( secs(5)).await;
    let snap = handle.snapshot();
    assert!( !snap.is_playing);
    assert_eq!( snap.current_index, 0);
    assert_eq!( snap.table_index, Some(0));
    assert_eq!( gw.inner.fetched_keys(), vec![ key(0), key(0) ]);
}

#[tokio::test(start_paused = true)]
async fn test_toggle_play() {
    let gw = Arc::new( memory_gateway(3));
    let handle = spawn_controller( gw, timeline_config( Some(secs(1))));
    handle.send_msg( TimelineMsg::FilesDiscovered( keys(3))).await.unwrap();
    wait_for( &handle, |s| s.table_index == Some(0)).await;

    handle.toggle_play().await.unwrap();
    wait_for( &handle, |s| s.is_playing).await;

    let snap = wait_for( &handle, |s| !s.is_playing).await;
    assert_eq!( snap.current_index, 2);
}

#[tokio::test(start_paused = true)]
async fn test_play_disabled() {
    let gw = Arc::new( memory_gateway(3));
    let handle = spawn_controller( gw, timeline_config( None));
    handle.send_msg( TimelineMsg::FilesDiscovered( keys(3))).await.unwrap();
    let snap = wait_for( &handle, |s| s.table_index == Some(0)).await;
    assert!( !snap.play_enabled);

    handle.set_playing( true).await.unwrap();
    sleep( secs(3)).await;
    let snap = handle.snapshot();
    assert!( !snap.is_playing);
    assert_eq!( snap.current_index, 0);
}

#[tokio::test(start_paused = true)]
async fn test_failure_keeps_previous_table() {
    let mut gw = memory_gateway(4);
    gw.insert( key(2), Bytes::from_static( b"no"));
    let gw = Arc::new( gw);
    let handle = spawn_controller( gw, timeline_config( None));
    handle.send_msg( TimelineMsg::FilesDiscovered( keys(4))).await.unwrap();
    wait_for( &handle, |s| s.table_index == Some(0)).await;

    handle.commit( 2).await.unwrap();
    let snap = wait_for( &handle, |s| s.last_error.is_some()).await;
    let err = snap.last_error.clone().unwrap();
    println!("error: {err}");
    assert!( err.contains( "CHL-2024-01-03.feather"));
    assert_eq!( snap.table_index, Some(0));
    assert_eq!( snap.current_index, 2);

    handle.commit( 1).await.unwrap();
    let snap = wait_for( &handle, |s| s.table_index == Some(1)).await;
    assert!( snap.last_error.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_missing_object_during_playback() {
    let mut gw = MemoryGateway::new();
    for i in [0,1,3] { gw.insert( key(i), feather_bytes( &[1.0])) }
    let handle = spawn_controller( Arc::new(gw), timeline_config( Some(secs(1))));
    handle.send_msg( TimelineMsg::FilesDiscovered( keys(4))).await.unwrap();
    wait_for( &handle, |s| s.table_index == Some(0)).await;

    handle.set_playing( true).await.unwrap();
    wait_for( &handle, |s| s.is_playing).await;

    // the failed frame 2 does not stop playback
    let snap = wait_for( &handle, |s| !s.is_playing && s.table_index == Some(3)).await;
    assert_eq!( snap.current_index, 3);
    assert!( snap.last_error.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_superseded_fetch_is_discarded() {
    let gw = Arc::new( SlowGateway::new( memory_gateway(5), millis(500)));
    let handle = spawn_controller( gw.clone(), timeline_config( None));
    handle.send_msg( TimelineMsg::FilesDiscovered( keys(5))).await.unwrap();
    wait_for( &handle, |s| s.table_index == Some(0)).await;

    handle.commit( 1).await.unwrap();
    sleep( millis(100)).await;
    handle.commit( 2).await.unwrap();

    let snap = wait_for( &handle, |s| s.table_index == Some(2)).await;
    assert_eq!( snap.current_index, 2);

    sleep( secs(5)).await;
    assert_eq!( handle.snapshot().table_index, Some(2));
}

#[tokio::test(start_paused = true)]
async fn test_slower_superseded_fetch_is_discarded() {
    let gw = SlowGateway::new( memory_gateway(5), millis(100)).with_key_delay( key(1), secs(2));
    let handle = spawn_controller( Arc::new(gw), timeline_config( None));
    handle.send_msg( TimelineMsg::FilesDiscovered( keys(5))).await.unwrap();
    wait_for( &handle, |s| s.table_index == Some(0)).await;

    handle.commit( 1).await.unwrap();
    sleep( millis(10)).await;
    handle.commit( 2).await.unwrap();
    wait_for( &handle, |s| s.table_index == Some(2)).await;

    sleep( secs(5)).await;
    let snap = handle.snapshot();
    assert_eq!( snap.current_index, 2);
    assert_eq!( snap.table_index, Some(2));
}

#[tokio::test(start_paused = true)]
async fn test_last_write_wins() {
    let gw = Arc::new( SlowGateway::new( memory_gateway(5), millis(100)).with_key_delay( key(1), secs(2)));
    let mut config = timeline_config( None);
    config.stale_policy = StalePolicy::LastWriteWins;
    let handle = spawn_controller( gw.clone(), config);
    handle.send_msg( TimelineMsg::FilesDiscovered( keys(5))).await.unwrap();
    wait_for( &handle, |s| s.table_index == Some(0)).await;

    handle.commit( 1).await.unwrap();
    sleep( millis(10)).await;
    handle.commit( 2).await.unwrap();
    let snap = wait_for( &handle, |s| s.table_index == Some(2)).await;
    assert_eq!( snap.current_index, 2);

    // the slower fetch of index 1 is not aborted and settles last
    let snap = wait_for( &handle, |s| s.table_index == Some(1)).await;
    assert_eq!( snap.current_index, 2);
    assert_eq!( snap.table.as_ref().and_then( |t| t.chl(0)), Some(0.2));
    assert_eq!( gw.inner.fetched_keys(), vec![ key(0), key(2), key(1) ]);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown() {
    let gw = Arc::new( memory_gateway(5));
    let handle = spawn_controller( gw.clone(), timeline_config( Some(secs(1))));
    handle.send_msg( TimelineMsg::FilesDiscovered( keys(5))).await.unwrap();
    wait_for( &handle, |s| s.table_index == Some(0)).await;

    handle.set_playing( true).await.unwrap();
    wait_for( &handle, |s| s.is_playing).await;
    handle.shutdown();
    assert!( handle.is_closed());

    sleep( millis(100)).await;
    let n_fetched = gw.fetched_keys().len();
    let index = handle.snapshot().current_index;

    sleep( secs(10)).await;
    assert_eq!( gw.fetched_keys().len(), n_fetched);
    assert_eq!( handle.snapshot().current_index, index);
    assert!( handle.commit( 3).await.is_err());
}
