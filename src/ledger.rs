//! Per-server playtime bookkeeping.
//!
//! The ledger keeps at most [`CAPACITY`] records. Each record owns at most one
//! open session; minutes are credited to its total when the session is ticked,
//! re-opened or closed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    error::{Error, Result},
    model::{normalize_image, Server, ServerId},
    view::Favorites,
};

pub const CAPACITY: usize = 5;

const SCHEMA_VERSION: u32 = 1;
const MINUTE_MS: i64 = 60_000;

/// Whole minutes between `start` and `now`, zero if the clock went backwards
pub fn elapsed_minutes(start: DateTime<Utc>, now: DateTime<Utc>) -> u64 {
    let ms = (now - start).num_milliseconds();
    if ms <= 0 {
        0
    } else {
        (ms / MINUTE_MS) as u64
    }
}

pub fn format_playtime(minutes: u64) -> String {
    let hours = minutes / 60;
    let rest = minutes % 60;

    if hours == 0 {
        format!("{rest}m")
    } else {
        format!("{hours}h {rest}m")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub start: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<DateTime<Utc>>,
    /// Minutes of this session already added to the record total
    #[serde(default, skip_serializing_if = "is_zero")]
    pub credited: u64,
}

fn is_zero(n: &u64) -> bool {
    *n == 0
}

impl Session {
    fn open(now: DateTime<Utc>) -> Self {
        Self {
            start: now,
            end: None,
            credited: 0,
        }
    }

    pub fn is_open(&self) -> bool {
        self.end.is_none()
    }

    fn accrue(&mut self, now: DateTime<Utc>) -> u64 {
        let minutes = elapsed_minutes(self.start, now);
        let delta = minutes.saturating_sub(self.credited);
        self.credited = self.credited.max(minutes);
        delta
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaytimeRecord {
    pub server_id: ServerId,
    pub server_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_image: Option<String>,
    #[serde(rename = "totalPlaytime")]
    pub total_minutes: u64,
    pub last_session: Session,
}

impl PlaytimeRecord {
    fn new(server: &Server, now: DateTime<Utc>) -> Self {
        Self {
            server_id: server.id,
            server_name: server.name.clone(),
            server_image: server.image_url(),
            total_minutes: 0,
            last_session: Session::open(now),
        }
    }

    fn accrue(&mut self, now: DateTime<Utc>) -> u64 {
        if !self.last_session.is_open() {
            return 0;
        }

        let minutes = self.last_session.accrue(now);
        self.total_minutes += minutes;
        minutes
    }

    fn close(&mut self, now: DateTime<Utc>) -> u64 {
        let minutes = self.accrue(now);
        self.last_session.end = Some(now.max(self.last_session.start));
        minutes
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Ledger {
    records: Vec<PlaytimeRecord>,
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum StoredLedger {
    Versioned {
        version: u32,
        servers: Vec<PlaytimeRecord>,
    },
    /// Unversioned array written by earlier releases
    Legacy(Vec<PlaytimeRecord>),
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> &[PlaytimeRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, server_id: ServerId) -> Option<&PlaytimeRecord> {
        self.records.iter().find(|r| r.server_id == server_id)
    }

    fn get_mut(&mut self, server_id: ServerId) -> Option<&mut PlaytimeRecord> {
        self.records.iter_mut().find(|r| r.server_id == server_id)
    }

    /// Opens a session for `server`, creating its record if needed.
    ///
    /// An open session left on the record is credited before being replaced.
    pub fn record_session_start(&mut self, server: &Server, now: DateTime<Utc>) {
        if let Some(record) = self.get_mut(server.id) {
            record.server_name = server.name.clone();
            record.server_image = server.image_url();

            let leftover = record.accrue(now);
            if record.last_session.is_open() {
                log::info!(
                    "credited {leftover}m from unclosed session on {}",
                    record.server_name
                );
            }

            record.last_session = Session::open(now);
            return;
        }

        for evicted in self.evict_if_needed() {
            log::info!(
                "evicted {} ({}) from playtime ledger",
                evicted.server_name,
                format_playtime(evicted.total_minutes)
            );
        }

        self.records.push(PlaytimeRecord::new(server, now));
    }

    /// Closes the open session of `server_id`, returning the minutes credited.
    ///
    /// `None` if the server has no record or no open session.
    pub fn record_session_end(&mut self, server_id: ServerId, now: DateTime<Utc>) -> Option<u64> {
        let record = self.get_mut(server_id)?;

        if !record.last_session.is_open() {
            return None;
        }

        Some(record.close(now))
    }

    /// Credits elapsed minutes to the open session of `server_id`, keeping it
    /// open. Stale sessions of other servers wait for their next start.
    pub fn accrue_tick(&mut self, server_id: ServerId, now: DateTime<Utc>) -> u64 {
        self.get_mut(server_id).map_or(0, |r| r.accrue(now))
    }

    /// Makes room for one more record by dropping the least played ones
    pub fn evict_if_needed(&mut self) -> Vec<PlaytimeRecord> {
        if self.records.len() < CAPACITY {
            return vec![];
        }

        self.sort_by_total();
        self.records.split_off(CAPACITY - 1)
    }

    fn sort_by_total(&mut self) {
        self.records
            .sort_by(|a, b| b.total_minutes.cmp(&a.total_minutes));
    }

    pub fn open_session(&self) -> Option<&PlaytimeRecord> {
        self.records.iter().find(|r| r.last_session.is_open())
    }

    /// Records ordered by descending total playtime
    pub fn by_total(&self) -> Vec<&PlaytimeRecord> {
        let mut records: Vec<_> = self.records.iter().collect();
        records.sort_by(|a, b| b.total_minutes.cmp(&a.total_minutes));
        records
    }

    pub fn total_minutes(&self) -> u64 {
        self.records.iter().map(|r| r.total_minutes).sum()
    }

    pub fn favorites_minutes(&self, favorites: &Favorites) -> u64 {
        self.records
            .iter()
            .filter(|r| favorites.contains(r.server_id))
            .map(|r| r.total_minutes)
            .sum()
    }

    /// Name of the most recently launched server
    pub fn last_server(&self) -> Option<&str> {
        self.records
            .iter()
            .max_by_key(|r| r.last_session.start)
            .map(|r| r.server_name.as_str())
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let records = match serde_json::from_str(json)? {
            StoredLedger::Versioned { version, servers } => {
                if version > SCHEMA_VERSION {
                    return Err(Error::storage(format!(
                        "unsupported playtime schema version {version}"
                    )));
                }
                servers
            }
            StoredLedger::Legacy(servers) => {
                log::info!("migrating unversioned playtime data");
                servers
            }
        };

        Ok(Self::validated(records))
    }

    pub fn to_json(&self) -> Result<String> {
        let stored = StoredLedger::Versioned {
            version: SCHEMA_VERSION,
            servers: self.records.clone(),
        };

        Ok(serde_json::to_string_pretty(&stored)?)
    }

    fn validated(records: Vec<PlaytimeRecord>) -> Self {
        let mut ledger = Self::new();

        for mut record in records {
            if let Some(end) = record.last_session.end {
                if end < record.last_session.start {
                    log::warn!("session end before start for {}", record.server_name);
                    record.last_session.end = Some(record.last_session.start);
                }
            }

            record.server_image = normalize_image(record.server_image.as_deref());

            match ledger.get_mut(record.server_id) {
                Some(existing) => {
                    log::warn!("duplicate playtime record for {}", record.server_name);
                    if record.total_minutes > existing.total_minutes {
                        *existing = record;
                    }
                }
                None => ledger.records.push(record),
            }
        }

        if ledger.records.len() > CAPACITY {
            ledger.sort_by_total();
            ledger.records.truncate(CAPACITY);
        }

        ledger
    }
}
