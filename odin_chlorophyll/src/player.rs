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

//! the async runtime around the [`TimelineState`] machine: a controller task that owns the state and
//! executes effects (fetch tasks and the playback loop), and a cloneable [`TimelineHandle`] that is
//! used to send intents and to watch [`TimelineSnapshot`]s

use std::{sync::Arc, time::Duration};
use tokio::{sync::{mpsc,watch}, task::AbortHandle, time::sleep};
use tokio_util::sync::CancellationToken;
use tracing::{debug,info,warn};

use crate::discovery::{FileKey,KeyPattern,discover};
use crate::errors::{OdinChlError,Result,op_failed};
use crate::gateway::ObjectStoreGateway;
use crate::table::ChlTable;
use crate::timeline::{Effect,StalePolicy,TimelineMsg,TimelineSnapshot,TimelineState};

const MSG_BOUNDS: usize = 64;

/// everything the timeline runtime needs to know about where data comes from and how to play it
#[derive(Debug,Clone)]
pub struct TimelineConfig {
    pub bucket: String,
    pub prefix: String,
    pub pattern: KeyPattern,
    pub value_column: String,
    /// delay between playback frames. None disables playback
    pub frame_delay: Option<Duration>,
    pub stale_policy: StalePolicy,
}

/// fetch and decode the object for `key`. Decoding runs on the blocking pool
pub async fn fetch_table (gateway: &dyn ObjectStoreGateway, bucket: &str, key: &FileKey, value_column: &str)->Result<ChlTable> {
    let bytes = gateway.fetch( bucket, key.as_str()).await.ok_or_else( || op_failed!("no data for {}", key))?;
    let value_column = value_column.to_string();

    tokio::task::spawn_blocking( move || ChlTable::decode( &bytes, &value_column)).await
        .map_err( |e| op_failed!("decoding task failed: {}", e))?
}

/* #region handle *********************************************************************************************/

#[derive(Debug,Clone)]
pub struct TimelineHandle {
    tx: mpsc::Sender<TimelineMsg>,
    snapshots: watch::Receiver<TimelineSnapshot>,
    shutdown: CancellationToken,
}

impl TimelineHandle {
    pub async fn send_msg (&self, msg: TimelineMsg)->Result<()> {
        self.tx.send(msg).await.map_err( |_| OdinChlError::TimelineClosedError)
    }

    /// live slider movement - changes the index but does not load data
    pub async fn scrub (&self, index: usize)->Result<()> {
        self.send_msg( TimelineMsg::IndexChanged{ index, committed: false }).await
    }

    /// slider release - changes the index and loads the respective data
    pub async fn commit (&self, index: usize)->Result<()> {
        self.send_msg( TimelineMsg::IndexChanged{ index, committed: true }).await
    }

    pub async fn set_playing (&self, play: bool)->Result<()> {
        self.send_msg( TimelineMsg::PlayToggled(play)).await
    }

    /// the play/pause button
    pub async fn toggle_play (&self)->Result<()> {
        let is_playing = self.snapshots.borrow().is_playing;
        self.set_playing( !is_playing).await
    }

    pub fn snapshot (&self)->TimelineSnapshot {
        self.snapshots.borrow().clone()
    }

    pub fn subscribe (&self)->watch::Receiver<TimelineSnapshot> {
        self.snapshots.clone()
    }

    /// wait until the published state satisfies `pred`. Returns the matching snapshot or an error if
    /// the timeline was shut down before
    pub async fn wait_for<F> (&self, pred: F)->Result<TimelineSnapshot> where F: FnMut(&TimelineSnapshot)->bool {
        let mut rx = self.snapshots.clone();
        let snap = rx.wait_for(pred).await.map_err( |_| OdinChlError::TimelineClosedError)?.clone();
        Ok(snap)
    }

    /// stop the controller, any playback and pending fetches. In-flight results are dropped
    pub fn shutdown (&self) {
        self.shutdown.cancel();
    }

    pub fn is_closed (&self)->bool {
        self.shutdown.is_cancelled() || self.tx.is_closed()
    }
}

/* #endregion handle */

/* #region controller *****************************************************************************************/

struct TimelineController {
    state: TimelineState,
    config: Arc<TimelineConfig>,
    gateway: Arc<dyn ObjectStoreGateway>,
    tx: mpsc::WeakSender<TimelineMsg>,
    snapshot_tx: watch::Sender<TimelineSnapshot>,
    shutdown: CancellationToken,

    fetch_task: Option<AbortHandle>,
    playback: Option<(u64,CancellationToken)>,
}

/// create the timeline state, spawn its controller task and start discovery of data files.
/// Has to be called from within a tokio runtime
pub fn spawn_timeline (gateway: Arc<dyn ObjectStoreGateway>, config: TimelineConfig)->TimelineHandle {
    let handle = spawn_controller( gateway.clone(), config.clone());

    let hself = handle.clone();
    tokio::spawn( async move {
        let keys = discover( gateway.as_ref(), &config.bucket, &config.prefix, &config.pattern).await;
        if hself.send_msg( TimelineMsg::FilesDiscovered(keys)).await.is_err() {
            debug!("timeline closed before discovery completed");
        }
    });

    handle
}

/// spawn the controller task without discovery. Keys have to be provided by sending a
/// [`TimelineMsg::FilesDiscovered`]
pub fn spawn_controller (gateway: Arc<dyn ObjectStoreGateway>, config: TimelineConfig)->TimelineHandle {
    let state = TimelineState::new( config.frame_delay.is_some(), config.stale_policy);
    let (tx, rx) = mpsc::channel( MSG_BOUNDS);
    let (snapshot_tx, snapshots) = watch::channel( state.snapshot( &config.pattern));
    let shutdown = CancellationToken::new();

    let controller = TimelineController {
        state,
        config: Arc::new(config),
        gateway,
        tx: tx.downgrade(),
        snapshot_tx,
        shutdown: shutdown.clone(),
        fetch_task: None,
        playback: None,
    };
    tokio::spawn( run_controller( controller, rx));

    TimelineHandle { tx, snapshots, shutdown }
}

async fn run_controller (mut ctrl: TimelineController, mut rx: mpsc::Receiver<TimelineMsg>) {
    loop {
        tokio::select! {
            _ = ctrl.shutdown.cancelled() => break,
            msg = rx.recv() => match msg {
                Some(msg) => ctrl.process(msg),
                None => break // all handles dropped
            }
        }
    }
    ctrl.terminate();
    info!("timeline controller terminated");
}

impl TimelineController {
    fn process (&mut self, msg: TimelineMsg) {
        let effects = self.state.update(msg);
        self.snapshot_tx.send_replace( self.state.snapshot( &self.config.pattern));

        for effect in effects {
            self.execute(effect);
        }
    }

    fn execute (&mut self, effect: Effect) {
        match effect {
            Effect::Fetch{ index, key } => self.spawn_fetch( index, key),
            Effect::StartPlayback{ run } => self.start_playback( run),
            Effect::StopPlayback{ run } => self.stop_playback( run),
        }
    }

    fn spawn_fetch (&mut self, index: usize, key: FileKey) {
        if self.config.stale_policy == StalePolicy::Discard {
            if let Some(task) = self.fetch_task.take() { task.abort() } // superseded
        }

        let gateway = self.gateway.clone();
        let config = self.config.clone();
        let tx = self.tx.clone();

        let task = tokio::spawn( async move {
            let msg = load_msg( gateway.as_ref(), &config, index, &key).await;
            if let Some(tx) = tx.upgrade() {
                let _ = tx.send(msg).await;
            }
        });
        self.fetch_task = Some( task.abort_handle());
    }

    fn start_playback (&mut self, run: u64) {
        let Some(frame_delay) = self.config.frame_delay else { return };
        if let Some((_,token)) = self.playback.take() { token.cancel() }

        let token = self.shutdown.child_token();
        let ctx = PlaybackContext {
            run,
            frame_delay,
            config: self.config.clone(),
            gateway: self.gateway.clone(),
            tx: self.tx.clone(),
            snapshots: self.snapshot_tx.subscribe(),
        };

        debug!("starting playback run {run}");
        tokio::spawn( run_playback( ctx, token.clone()));
        self.playback = Some( (run,token) );
    }

    fn stop_playback (&mut self, run: u64) {
        if let Some((active_run,token)) = &self.playback {
            if *active_run == run {
                debug!("stopping playback run {run}");
                token.cancel();
                self.playback = None;
            }
        }
    }

    fn terminate (&mut self) {
        if let Some((_,token)) = self.playback.take() { token.cancel() }
        if let Some(task) = self.fetch_task.take() { task.abort() }
    }
}

async fn load_msg (gateway: &dyn ObjectStoreGateway, config: &TimelineConfig, index: usize, key: &FileKey)->TimelineMsg {
    match fetch_table( gateway, &config.bucket, key, &config.value_column).await {
        Ok(table) => {
            debug!("loaded {} ({} rows)", key, table.num_rows());
            TimelineMsg::TableFetched{ index, table: Arc::new(table) }
        }
        Err(e) => {
            warn!("failed to load {}: {}", key, e);
            TimelineMsg::Failure{ index, message: format!("failed to load {}: {}", key.file_name(), e) }
        }
    }
}

/* #endregion controller */

/* #region playback *******************************************************************************************/

struct PlaybackContext {
    run: u64,
    frame_delay: Duration,
    config: Arc<TimelineConfig>,
    gateway: Arc<dyn ObjectStoreGateway>,
    tx: mpsc::WeakSender<TimelineMsg>,
    snapshots: watch::Receiver<TimelineSnapshot>,
}

impl PlaybackContext {
    async fn send (&self, msg: TimelineMsg)->bool {
        match self.tx.upgrade() {
            Some(tx) => tx.send(msg).await.is_ok(),
            None => false
        }
    }
}

/// fetch current frame -> advance -> wait frame delay -> repeat, for as long as we are playing and not
/// at the last frame. The cancellation token is checked before each fetch and each advance, and wins over
/// the frame delay
async fn run_playback (mut ctx: PlaybackContext, token: CancellationToken) {
    let run = ctx.run;

    loop {
        if token.is_cancelled() { break }

        let (index, key) = {
            let snap = ctx.snapshots.borrow();
            if !snap.is_playing || snap.current_index + 1 >= snap.len() { break }
            match &snap.current_key {
                Some(key) => (snap.current_index, key.clone()),
                None => break
            }
        };

        let msg = load_msg( ctx.gateway.as_ref(), &ctx.config, index, &key).await;
        if !ctx.send(msg).await { break }

        if token.is_cancelled() { break }
        if !ctx.send( TimelineMsg::Advance{ run, from: index }).await { break }

        // make sure the controller has seen the advance before we read the next index
        let advanced = async {
            ctx.snapshots.wait_for( |s| s.current_index != index || !s.is_playing).await.is_ok()
        };
        tokio::select! {
            _ = token.cancelled() => break,
            ok = advanced => if !ok { break }
        }

        tokio::select! {
            _ = token.cancelled() => break,
            _ = sleep( ctx.frame_delay) => {}
        }
    }

    debug!("playback run {run} terminated");
}

/* #endregion playback */
