//! Hierarchical metadata store attached to accounts, transactions, splits and lots.
//!
//! Keys are slash-separated paths (`lot-mgmt/next-id`); leading, trailing
//! and repeated slashes are ignored.  Intermediate path segments are frames.
//! Writing through a segment that currently holds a non-frame value replaces
//! it with a frame.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::numeric::Numeric;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum KvpValue {
    Int(i64),
    Str(String),
    Numeric(Numeric),
    Guid(Uuid),
    Timestamp(DateTime<Utc>),
    Frame(KvpFrame),
    List(Vec<KvpValue>),
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KvpFrame {
    slots: BTreeMap<String, KvpValue>,
}

fn segments(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}

impl KvpFrame {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Direct children of this frame, in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &KvpValue)> {
        self.slots.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn get(&self, path: &str) -> Option<&KvpValue> {
        let segs = segments(path);
        let (last, parents) = segs.split_last()?;
        let mut frame = self;
        for seg in parents {
            match frame.slots.get(*seg) {
                Some(KvpValue::Frame(f)) => frame = f,
                _ => return None,
            }
        }
        frame.slots.get(*last)
    }

    /// Frame at `path`; the empty path is this frame.
    pub fn frame(&self, path: &str) -> Option<&KvpFrame> {
        if segments(path).is_empty() {
            return Some(self);
        }
        match self.get(path) {
            Some(KvpValue::Frame(f)) => Some(f),
            _ => None,
        }
    }

    /// Frame at `path`, created on demand.
    pub fn frame_mut(&mut self, path: &str) -> &mut KvpFrame {
        let mut frame = self;
        for seg in segments(path) {
            let slot = frame
                .slots
                .entry(seg.to_string())
                .or_insert_with(|| KvpValue::Frame(KvpFrame::new()));
            if !matches!(slot, KvpValue::Frame(_)) {
                *slot = KvpValue::Frame(KvpFrame::new());
            }
            frame = match slot {
                KvpValue::Frame(f) => f,
                _ => unreachable!("slot was just made a frame"),
            };
        }
        frame
    }

    /// Store `value` at `path`. An empty path is ignored.
    pub fn set(&mut self, path: &str, value: KvpValue) {
        let segs = segments(path);
        let Some((last, parents)) = segs.split_last() else {
            return;
        };
        let parent = self.frame_mut(&parents.join("/"));
        parent.slots.insert((*last).to_string(), value);
    }

    pub fn remove(&mut self, path: &str) -> Option<KvpValue> {
        let segs = segments(path);
        let (last, parents) = segs.split_last()?;
        let mut frame = self;
        for seg in parents {
            match frame.slots.get_mut(*seg) {
                Some(KvpValue::Frame(f)) => frame = f,
                _ => return None,
            }
        }
        frame.slots.remove(*last)
    }

    /// Append to the list at `path`, creating it; a non-list value there is replaced.
    pub fn push(&mut self, path: &str, value: KvpValue) {
        match self.get(path) {
            Some(KvpValue::List(_)) => {}
            _ => self.set(path, KvpValue::List(Vec::new())),
        }
        let segs = segments(path);
        let Some((last, parents)) = segs.split_last() else {
            return;
        };
        if let Some(KvpValue::List(items)) = self.frame_mut(&parents.join("/")).slots.get_mut(*last) {
            items.push(value);
        }
    }

    pub fn get_i64(&self, path: &str) -> Option<i64> {
        match self.get(path) {
            Some(KvpValue::Int(v)) => Some(*v),
            _ => None,
        }
    }

    pub fn get_str(&self, path: &str) -> Option<&str> {
        match self.get(path) {
            Some(KvpValue::Str(v)) => Some(v.as_str()),
            _ => None,
        }
    }

    pub fn get_guid(&self, path: &str) -> Option<Uuid> {
        match self.get(path) {
            Some(KvpValue::Guid(v)) => Some(*v),
            _ => None,
        }
    }

    pub fn get_list(&self, path: &str) -> &[KvpValue] {
        match self.get(path) {
            Some(KvpValue::List(v)) => v.as_slice(),
            _ => &[],
        }
    }
}
