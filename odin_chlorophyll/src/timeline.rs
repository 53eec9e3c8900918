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

//! the timeline state machine. [`TimelineState::update`] is the only way to mutate a [`TimelineState`],
//! it does not perform any IO itself but returns the [`Effect`]s the caller has to execute

use std::sync::Arc;
use chrono::NaiveDate;
use serde::{Serialize,Deserialize};
use tracing::debug;

use crate::discovery::{FileKey,KeyPattern};
use crate::table::ChlTable;

/// what to do with fetch results that arrive after the user has moved on to another index
#[derive(Serialize,Deserialize,Debug,Clone,Copy,PartialEq,Eq,Default)]
pub enum StalePolicy {
    /// drop results (and failures) for indices other than the current one
    #[default]
    Discard,
    /// whatever settles last is shown
    LastWriteWins,
}

#[derive(Serialize,Debug,Clone,Copy,PartialEq,Eq)]
pub enum Phase { Idle, Ready, Playing }

#[derive(Debug,Clone)]
pub enum TimelineMsg {
    FilesDiscovered( Vec<FileKey> ),
    /// `committed: false` is a live slider drag that does not load data
    IndexChanged{ index: usize, committed: bool },
    FetchRequested( usize ),
    TableFetched{ index: usize, table: Arc<ChlTable> },
    PlayToggled( bool ),
    /// playback tick of run `run`, advancing from index `from`
    Advance{ run: u64, from: usize },
    Failure{ index: usize, message: String },
}

#[derive(Debug,Clone,PartialEq,Eq)]
pub enum Effect {
    Fetch{ index: usize, key: FileKey },
    StartPlayback{ run: u64 },
    StopPlayback{ run: u64 },
}

#[derive(Debug,Clone)]
pub struct TimelineState {
    keys: Arc<Vec<FileKey>>,
    current_index: usize,
    is_playing: bool,
    table: Option<Arc<ChlTable>>,
    table_index: Option<usize>,
    last_error: Option<String>,

    play_enabled: bool,
    stale_policy: StalePolicy,
    playback_run: u64,
}

impl TimelineState {
    /// `play_enabled` is false if there is no frame delay configured, in which case we only support scrubbing
    pub fn new (play_enabled: bool, stale_policy: StalePolicy)->Self {
        TimelineState {
            keys: Arc::new( Vec::new()),
            current_index: 0,
            is_playing: false,
            table: None,
            table_index: None,
            last_error: None,
            play_enabled,
            stale_policy,
            playback_run: 0,
        }
    }

    pub fn keys (&self)->&[FileKey] { &self.keys }
    pub fn len (&self)->usize { self.keys.len() }
    pub fn is_empty (&self)->bool { self.keys.is_empty() }
    pub fn current_index (&self)->usize { self.current_index }
    pub fn current_key (&self)->Option<&FileKey> { self.keys.get( self.current_index) }
    pub fn is_playing (&self)->bool { self.is_playing }
    pub fn play_enabled (&self)->bool { self.play_enabled }
    pub fn table (&self)->Option<&Arc<ChlTable>> { self.table.as_ref() }
    pub fn table_index (&self)->Option<usize> { self.table_index }
    pub fn last_error (&self)->Option<&str> { self.last_error.as_deref() }
    pub fn playback_run (&self)->u64 { self.playback_run }

    pub fn phase (&self)->Phase {
        if self.keys.is_empty() { Phase::Idle }
        else if self.is_playing { Phase::Playing }
        else { Phase::Ready }
    }

    fn is_last (&self, index: usize)->bool { index + 1 >= self.keys.len() }

    fn fetch (&self, index: usize)->Option<Effect> {
        self.keys.get(index).map( |key| Effect::Fetch{ index, key: key.clone() })
    }

    fn stop (&mut self, effects: &mut Vec<Effect>) {
        if self.is_playing {
            self.is_playing = false;
            effects.push( Effect::StopPlayback{ run: self.playback_run });
        }
    }

    fn is_stale (&self, index: usize)->bool {
        self.stale_policy == StalePolicy::Discard && index != self.current_index
    }

    pub fn update (&mut self, msg: TimelineMsg)->Vec<Effect> {
        let mut effects: Vec<Effect> = Vec::new();

        match msg {
            TimelineMsg::FilesDiscovered( mut keys) => {
                keys.sort();
                keys.dedup();
                self.stop( &mut effects);
                self.keys = Arc::new( keys);
                self.current_index = 0;
                self.table = None;
                self.table_index = None;
                self.last_error = None;
                effects.extend( self.fetch(0));
            }

            TimelineMsg::IndexChanged{ index, committed } => {
                if index < self.keys.len() {
                    self.current_index = index;
                    if self.is_last(index) { self.stop( &mut effects) }
                    if committed { effects.extend( self.fetch(index)) }
                } else {
                    debug!("index {} out of range {}", index, self.keys.len());
                    self.stop( &mut effects);
                }
            }

            TimelineMsg::FetchRequested( index) => {
                effects.extend( self.fetch(index));
            }

            TimelineMsg::TableFetched{ index, table } => {
                if self.is_stale(index) {
                    debug!("discarding stale table for index {} (current {})", index, self.current_index);
                } else {
                    self.table = Some(table);
                    self.table_index = Some(index);
                    self.last_error = None;
                }
            }

            TimelineMsg::PlayToggled( play) => {
                if play != self.is_playing {
                    if play {
                        if self.play_enabled && !self.is_last( self.current_index) {
                            self.is_playing = true;
                            self.playback_run += 1;
                            effects.push( Effect::StartPlayback{ run: self.playback_run });
                        } else {
                            debug!("ignoring play request (enabled: {}, index {} of {})", self.play_enabled, self.current_index, self.keys.len());
                        }
                    } else {
                        self.stop( &mut effects);
                    }
                }
            }

            TimelineMsg::Advance{ run, from } => {
                if self.is_playing && run == self.playback_run && from == self.current_index && !self.is_last(from) {
                    self.current_index = from + 1;
                    if self.is_last( self.current_index) {
                        self.stop( &mut effects);
                        effects.extend( self.fetch( self.current_index));
                    }
                } else {
                    debug!("ignoring advance of run {} from {} (run {}, index {}, playing {})", run, from, self.playback_run, self.current_index, self.is_playing);
                }
            }

            TimelineMsg::Failure{ index, message } => {
                if self.is_stale(index) {
                    debug!("discarding stale failure for index {}: {}", index, message);
                } else {
                    self.last_error = Some(message);
                }
            }
        }

        effects
    }

    pub fn snapshot (&self, pattern: &KeyPattern)->TimelineSnapshot {
        let current_key = self.current_key().cloned();
        let current_date = current_key.as_ref().and_then( |k| k.date(pattern));

        TimelineSnapshot {
            phase: self.phase(),
            keys: self.keys.clone(),
            current_index: self.current_index,
            current_key,
            current_date,
            is_playing: self.is_playing,
            play_enabled: self.play_enabled,
            table: self.table.clone(),
            table_index: self.table_index,
            last_error: self.last_error.clone(),
        }
    }
}

/// the read-only view of a [`TimelineState`] that is published to the presentation layer
#[derive(Debug,Clone)]
pub struct TimelineSnapshot {
    pub phase: Phase,
    pub keys: Arc<Vec<FileKey>>,
    pub current_index: usize,
    pub current_key: Option<FileKey>,
    pub current_date: Option<NaiveDate>,
    pub is_playing: bool,
    pub play_enabled: bool,
    pub table: Option<Arc<ChlTable>>,
    pub table_index: Option<usize>,
    pub last_error: Option<String>,
}

impl TimelineSnapshot {
    pub fn len (&self)->usize { self.keys.len() }
    pub fn is_empty (&self)->bool { self.keys.is_empty() }
}
