//! Sampled profiles attached to transactions

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use serde_json::{json, Value};

use crate::{Event, EventId, Frame};

/// Profiles with fewer samples than this are not worth sending
const MIN_SAMPLE_COUNT: usize = 2;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ProfileSample {
    #[serde(serialize_with = "serialize_as_string")]
    pub elapsed_since_start_ns: u64,
    pub stack_id: usize,
    #[serde(serialize_with = "serialize_as_string")]
    pub thread_id: u64,
}

// the profile format carries 64-bit integers as strings
fn serialize_as_string<S: serde::Serializer>(
    value: &u64,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.collect_str(value)
}

#[derive(Clone, Debug, PartialEq)]
pub struct Profile {
    pub id: EventId,
    pub start: DateTime<Utc>,
    pub frames: Vec<Frame>,
    /// Each stack is a list of indexes into `frames`, innermost first
    pub stacks: Vec<Vec<usize>>,
    pub samples: Vec<ProfileSample>,
}

impl Profile {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            id: EventId::new(),
            start,
            frames: Vec::new(),
            stacks: Vec::new(),
            samples: Vec::new(),
        }
    }

    fn is_valid(&self) -> bool {
        if self.samples.len() < MIN_SAMPLE_COUNT {
            return false;
        }
        let stacks_ok = self
            .stacks
            .iter()
            .all(|stack| stack.iter().all(|&index| index < self.frames.len()));
        let samples_ok = self
            .samples
            .iter()
            .all(|sample| sample.stack_id < self.stacks.len());
        stacks_ok && samples_ok
    }

    /// The body of the `profile` envelope item for the given transaction, or `None`
    /// when the profile has nothing useful to report.
    pub fn formatted_data(&self, event: &Event) -> Option<Value> {
        if !self.is_valid() {
            return None;
        }

        Some(json!({
            "event_id": self.id,
            "version": "1",
            "platform": crate::PLATFORM,
            "timestamp": self.start.to_rfc3339_opts(SecondsFormat::Micros, true),
            "release": event.release.clone().unwrap_or_default(),
            "environment": event.environment.clone().unwrap_or_default(),
            "device": { "architecture": std::env::consts::ARCH },
            "os": { "name": std::env::consts::OS },
            "runtime": { "name": "rust" },
            "transaction": {
                "id": event.id(),
                "name": event.transaction.clone().unwrap_or_default(),
                "trace_id": event.trace_id().unwrap_or_default(),
                "active_thread_id": "0",
            },
            "profile": {
                "frames": self.frames,
                "stacks": self.stacks,
                "samples": self.samples,
            },
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(stack_id: usize, elapsed: u64) -> ProfileSample {
        ProfileSample {
            elapsed_since_start_ns: elapsed,
            stack_id,
            thread_id: 0,
        }
    }

    #[test]
    fn single_sample_profile_renders_nothing() {
        let mut profile = Profile::new(Utc::now());
        profile.frames.push(Frame::new(Some("main".into()), "src/main.rs", Some(1)));
        profile.stacks.push(vec![0]);
        profile.samples.push(sample(0, 0));

        assert!(profile.formatted_data(&Event::transaction("job")).is_none());
    }

    #[test]
    fn dangling_stack_reference_renders_nothing() {
        let mut profile = Profile::new(Utc::now());
        profile.stacks.push(vec![3]);
        profile.samples.push(sample(0, 0));
        profile.samples.push(sample(0, 10));

        assert!(profile.formatted_data(&Event::transaction("job")).is_none());
    }

    #[test]
    fn valid_profile_references_its_transaction() {
        let mut profile = Profile::new(Utc::now());
        profile.frames.push(Frame::new(Some("main".into()), "src/main.rs", Some(1)));
        profile.stacks.push(vec![0]);
        profile.samples.push(sample(0, 0));
        profile.samples.push(sample(0, 1_000));

        let event = Event::transaction("job");
        let data = profile.formatted_data(&event).unwrap();
        assert_eq!(data["transaction"]["id"], event.id().to_string());
        assert_eq!(data["transaction"]["name"], "job");
        assert_eq!(data["profile"]["samples"][1]["elapsed_since_start_ns"], "1000");
    }
}
