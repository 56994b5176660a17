//! External detection feed
//!
//! A background worker polls a `DetectionSource`, diffs each snapshot against
//! every identifier it has already seen, maps the new detections' severity to
//! a color and pushes one spawn request per new detection into the bounded
//! queue. Failures only show up in `FeedStatus`; the simulation never sees
//! them.

use std::collections::{HashSet, VecDeque};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::JoinHandle;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crossbeam::channel::{RecvTimeoutError, Sender};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use thiserror::Error;

use super::queue::SpawnSender;
use crate::sim::ColorTag;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum FeedError {
    #[error("detector unavailable: {0}")]
    Unavailable(String),
    #[error("could not parse detector output: {0}")]
    Parse(String),
}

/// One reported threat detection
///
/// Detector output is loosely typed; fields that come back as null, arrays
/// or the wrong scalar type are coerced instead of failing the snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Detection {
    #[serde(deserialize_with = "lenient_string")]
    pub threat_name: String,
    #[serde(deserialize_with = "lenient_string")]
    pub detection_time: String,
    #[serde(rename = "SeverityID", deserialize_with = "lenient_int")]
    pub severity_id: Option<i64>,
    #[serde(deserialize_with = "lenient_opt_string")]
    pub severity: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub resources: String,
}

impl Detection {
    /// Identity used for dedup; the same threat at a new time is a new event
    pub fn key(&self) -> String {
        let severity_id = self.severity_id.map(|id| id.to_string()).unwrap_or_default();
        format!(
            "{}|{}|{}|{}",
            self.threat_name, self.detection_time, severity_id, self.resources
        )
    }

    pub fn color(&self) -> ColorTag {
        severity_color(self.severity_id, self.severity.as_deref())
    }
}

/// Protection state reported alongside the detections
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorStatus {
    #[serde(rename = "AMServiceEnabled", deserialize_with = "lenient_bool")]
    pub service_enabled: bool,
    #[serde(rename = "AntivirusEnabled", deserialize_with = "lenient_bool")]
    pub antivirus_enabled: bool,
    #[serde(rename = "RealTimeProtectionEnabled", deserialize_with = "lenient_bool")]
    pub realtime_enabled: bool,
    #[serde(rename = "SignatureAge", deserialize_with = "lenient_int")]
    pub signature_age: Option<i64>,
    #[serde(rename = "AntivirusSignatureVersion", deserialize_with = "lenient_opt_string")]
    pub signature_version: Option<String>,
}

fn value_text(value: Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s,
        other => other.to_string(),
    }
}

fn lenient_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Value::deserialize(deserializer).map(value_text)
}

fn lenient_opt_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::Null => None,
        other => Some(value_text(other)),
    })
}

/// Integers pass through, floats truncate, anything else is unknown
fn lenient_int<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<i64>, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f.trunc() as i64)),
        _ => None,
    })
}

fn lenient_bool<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::Bool(b) => b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        _ => false,
    })
}

/// Everything one poll returned
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedSnapshot {
    pub status: Option<DetectorStatus>,
    pub detections: Vec<Detection>,
}

impl FeedSnapshot {
    pub fn from_json(json: &str) -> Result<Self, FeedError> {
        serde_json::from_str(json).map_err(|e| FeedError::Parse(e.to_string()))
    }

    /// One-line status for display
    pub fn status_line(&self) -> String {
        let status = self.status.clone().unwrap_or_default();
        let mut line = format!(
            "Status: AM={} AV={} RTP={} | Detections={}",
            status.service_enabled,
            status.antivirus_enabled,
            status.realtime_enabled,
            self.detections.len()
        );
        if let Some(age) = status.signature_age {
            line.push_str(&format!(" | SigAge={age}"));
        }
        if let Some(version) = status.signature_version {
            line.push_str(&format!(" | SigVer={version}"));
        }
        line
    }
}

/// Map a detector severity to a body color
///
/// Text wins over the numeric id; anything unrecognized is purple.
pub fn severity_color(severity_id: Option<i64>, severity_text: Option<&str>) -> ColorTag {
    if let Some(text) = severity_text {
        let s = text.trim().to_lowercase();
        if s.contains("severe") || s.contains("high") {
            return ColorTag::Red;
        }
        if s.contains("moder") || s.contains("medium") {
            return ColorTag::Orange;
        }
        if s.contains("low") {
            return ColorTag::Yellow;
        }
    }
    match severity_id {
        Some(id) if id >= 4 => ColorTag::Red,
        Some(2 | 3) => ColorTag::Orange,
        Some(1) => ColorTag::Yellow,
        _ => ColorTag::Purple,
    }
}

/// Remembers every detection identifier seen so far
#[derive(Debug, Clone, Default)]
pub struct DeltaTracker {
    seen: HashSet<String>,
}

impl DeltaTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seen(&self) -> usize {
        self.seen.len()
    }

    /// Colors for detections not seen before, in snapshot order
    pub fn observe(&mut self, detections: &[Detection]) -> Vec<ColorTag> {
        detections
            .iter()
            .filter(|d| self.seen.insert(d.key()))
            .map(Detection::color)
            .collect()
    }
}

/// Anything that can report the current detection list
pub trait DetectionSource: Send {
    fn poll(&mut self) -> Result<FeedSnapshot, FeedError>;
}

/// Replays a fixed script of poll results, then repeats the last good snapshot
#[derive(Debug, Clone, Default)]
pub struct ScriptedSource {
    script: VecDeque<Result<FeedSnapshot, FeedError>>,
    last: FeedSnapshot,
}

impl ScriptedSource {
    pub fn new(script: impl IntoIterator<Item = Result<FeedSnapshot, FeedError>>) -> Self {
        Self {
            script: script.into_iter().collect(),
            last: FeedSnapshot::default(),
        }
    }
}

impl DetectionSource for ScriptedSource {
    fn poll(&mut self) -> Result<FeedSnapshot, FeedError> {
        match self.script.pop_front() {
            Some(Ok(snapshot)) => {
                self.last = snapshot.clone();
                Ok(snapshot)
            }
            Some(Err(e)) => Err(e),
            None => Ok(self.last.clone()),
        }
    }
}

/// Re-reads a JSON snapshot file on every poll
///
/// Whatever writes the file (an export script, a detector hook) owns its
/// format; a missing file reports `Unavailable`.
#[derive(Debug, Clone)]
pub struct JsonFileSource {
    path: PathBuf,
}

impl JsonFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl DetectionSource for JsonFileSource {
    fn poll(&mut self) -> Result<FeedSnapshot, FeedError> {
        let json = std::fs::read_to_string(&self.path)
            .map_err(|e| FeedError::Unavailable(format!("{}: {e}", self.path.display())))?;
        FeedSnapshot::from_json(&json)
    }
}

/// What the feed last reported
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedStatus {
    pub status_text: String,
    /// Empty when the last poll succeeded
    pub last_error: String,
    pub total_detections: usize,
    /// Unix seconds of the last poll attempt
    pub last_fetch: Option<u64>,
    pub polls: u64,
    /// Spawn requests successfully queued since start
    pub requests_sent: u64,
}

impl Default for FeedStatus {
    fn default() -> Self {
        Self {
            status_text: "Not checked yet".to_string(),
            last_error: String::new(),
            total_detections: 0,
            last_fetch: None,
            polls: 0,
            requests_sent: 0,
        }
    }
}

fn unix_now() -> Option<u64> {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .ok()
        .map(|d| d.as_secs())
}

fn lock_status(status: &Mutex<FeedStatus>) -> MutexGuard<'_, FeedStatus> {
    status.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Polls a source once per call and forwards new detections
pub struct FeedPoller<S: DetectionSource> {
    source: S,
    tracker: DeltaTracker,
    sender: SpawnSender,
    status: Arc<Mutex<FeedStatus>>,
}

impl<S: DetectionSource> FeedPoller<S> {
    pub fn new(source: S, sender: SpawnSender) -> Self {
        Self {
            source,
            tracker: DeltaTracker::new(),
            sender,
            status: Arc::new(Mutex::new(FeedStatus::default())),
        }
    }

    pub fn status(&self) -> FeedStatus {
        lock_status(&self.status).clone()
    }

    /// Poll once; returns the number of requests queued
    pub fn poll_once(&mut self) -> usize {
        match self.source.poll() {
            Ok(snapshot) => {
                let new_colors = self.tracker.observe(&snapshot.detections);
                let queued = new_colors
                    .into_iter()
                    .filter(|&color| self.sender.push(color))
                    .count();
                if queued > 0 {
                    log::info!("Detection feed queued {queued} new drops");
                }

                let mut status = lock_status(&self.status);
                status.status_text = snapshot.status_line();
                status.last_error.clear();
                status.total_detections = snapshot.detections.len();
                status.last_fetch = unix_now();
                status.polls += 1;
                status.requests_sent += queued as u64;
                queued
            }
            Err(e) => {
                log::warn!("Detection feed poll failed: {e}");
                let mut status = lock_status(&self.status);
                status.status_text = "Status: Error reading detector".to_string();
                status.last_error = e.to_string();
                status.last_fetch = unix_now();
                status.polls += 1;
                0
            }
        }
    }
}

/// Control messages for the worker thread
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedCommand {
    SyncNow,
    SetPolling(bool),
    Shutdown,
}

/// Handle to a running feed worker; shuts the worker down on drop
pub struct FeedWorker {
    control: Sender<FeedCommand>,
    status: Arc<Mutex<FeedStatus>>,
    thread: Option<JoinHandle<()>>,
}

impl FeedWorker {
    /// Start polling `source` every `interval` on a background thread
    pub fn spawn<S>(source: S, sender: SpawnSender, interval: Duration, polling: bool) -> std::io::Result<Self>
    where
        S: DetectionSource + 'static,
    {
        let poller = FeedPoller::new(source, sender);
        let status = poller.status.clone();
        let (control, commands) = crossbeam::channel::unbounded();

        let thread = std::thread::Builder::new()
            .name("detection-feed".to_string())
            .spawn(move || run_worker(poller, commands, interval, polling))?;

        Ok(Self {
            control,
            status,
            thread: Some(thread),
        })
    }

    /// Poll immediately, outside the regular schedule
    pub fn sync_now(&self) {
        let _ = self.control.send(FeedCommand::SyncNow);
    }

    pub fn set_polling(&self, polling: bool) {
        let _ = self.control.send(FeedCommand::SetPolling(polling));
    }

    pub fn status(&self) -> FeedStatus {
        lock_status(&self.status).clone()
    }

    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        if let Some(thread) = self.thread.take() {
            let _ = self.control.send(FeedCommand::Shutdown);
            if thread.join().is_err() {
                log::warn!("Detection feed thread panicked");
            }
        }
    }
}

impl Drop for FeedWorker {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run_worker<S: DetectionSource>(
    mut poller: FeedPoller<S>,
    commands: crossbeam::channel::Receiver<FeedCommand>,
    interval: Duration,
    mut polling: bool,
) {
    log::info!("Detection feed started (every {:.1}s)", interval.as_secs_f32());
    if polling {
        poller.poll_once();
    }
    loop {
        match commands.recv_timeout(interval) {
            Ok(FeedCommand::SyncNow) => {
                poller.poll_once();
            }
            Ok(FeedCommand::SetPolling(on)) => polling = on,
            Ok(FeedCommand::Shutdown) | Err(RecvTimeoutError::Disconnected) => break,
            Err(RecvTimeoutError::Timeout) => {
                if polling {
                    poller.poll_once();
                }
            }
        }
    }
    log::info!("Detection feed stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intake::queue::spawn_queue;
    use proptest::prelude::*;

    fn detection(name: &str, time: &str, severity: &str) -> Detection {
        Detection {
            threat_name: name.to_string(),
            detection_time: time.to_string(),
            severity_id: None,
            severity: Some(severity.to_string()),
            resources: String::new(),
        }
    }

    fn snapshot(detections: Vec<Detection>) -> FeedSnapshot {
        FeedSnapshot {
            status: None,
            detections,
        }
    }

    #[test]
    fn test_severity_mapping() {
        assert_eq!(severity_color(None, Some("Severe")), ColorTag::Red);
        assert_eq!(severity_color(None, Some(" HIGH ")), ColorTag::Red);
        assert_eq!(severity_color(None, Some("Moderate")), ColorTag::Orange);
        assert_eq!(severity_color(None, Some("medium")), ColorTag::Orange);
        assert_eq!(severity_color(None, Some("Low")), ColorTag::Yellow);
        // Unrecognized text falls back to the id
        assert_eq!(severity_color(Some(5), Some("???")), ColorTag::Red);
        assert_eq!(severity_color(Some(4), None), ColorTag::Red);
        assert_eq!(severity_color(Some(3), None), ColorTag::Orange);
        assert_eq!(severity_color(Some(2), None), ColorTag::Orange);
        assert_eq!(severity_color(Some(1), None), ColorTag::Yellow);
        assert_eq!(severity_color(Some(0), None), ColorTag::Purple);
        assert_eq!(severity_color(None, None), ColorTag::Purple);
    }

    #[test]
    fn test_dedup_across_polls() {
        let a = detection("A", "t1", "High");
        let b = detection("B", "t1", "Low");
        let c = detection("C", "t1", "Moderate");
        let mut tracker = DeltaTracker::new();

        let mut total = Vec::new();
        for d in [&a, &b, &a, &c] {
            total.extend(tracker.observe(std::slice::from_ref(d)));
        }
        assert_eq!(total, vec![ColorTag::Red, ColorTag::Yellow, ColorTag::Orange]);
    }

    #[test]
    fn test_dedup_cumulative_snapshots() {
        let a = detection("A", "t1", "High");
        let b = detection("B", "t1", "Low");
        let mut tracker = DeltaTracker::new();
        assert_eq!(tracker.observe(&[a.clone()]).len(), 1);
        assert_eq!(tracker.observe(&[a.clone(), b.clone()]).len(), 1);
        assert_eq!(tracker.observe(&[a, b]).len(), 0);
        assert_eq!(tracker.seen(), 2);
    }

    #[test]
    fn test_recurrence_at_new_time_is_new_event() {
        let mut tracker = DeltaTracker::new();
        assert_eq!(tracker.observe(&[detection("A", "t1", "High")]).len(), 1);
        assert_eq!(tracker.observe(&[detection("A", "t2", "High")]).len(), 1);
    }

    #[test]
    fn test_snapshot_json_field_names() {
        let json = r#"{
            "status": {
                "AMServiceEnabled": true,
                "AntivirusEnabled": true,
                "RealTimeProtectionEnabled": false,
                "SignatureAge": 2,
                "AntivirusSignatureVersion": "1.401.1",
                "EngineVersion": "1.1.24"
            },
            "detections": [
                { "ThreatName": "Trojan:Win32/X", "SeverityID": 5, "DetectionTime": "2024-01-01T00:00:00" },
                { "ThreatName": "PUA:Y", "Severity": "Low" }
            ]
        }"#;
        let snap = FeedSnapshot::from_json(json).unwrap();
        assert_eq!(snap.detections.len(), 2);
        assert_eq!(snap.detections[0].color(), ColorTag::Red);
        assert_eq!(snap.detections[1].color(), ColorTag::Yellow);
        assert_eq!(
            snap.status_line(),
            "Status: AM=true AV=true RTP=false | Detections=2 | SigAge=2 | SigVer=1.401.1"
        );
        assert!(matches!(FeedSnapshot::from_json("not json"), Err(FeedError::Parse(_))));
    }

    #[test]
    fn test_loosely_typed_detections_still_parse() {
        let json = r#"{
            "detections": [
                { "ThreatName": "A", "SeverityID": 5, "Resources": ["file:_C:\\x.exe", "file:_C:\\y.exe"] },
                { "ThreatName": "B", "SeverityID": "x", "Resources": null, "DetectionTime": null },
                { "ThreatName": "C", "SeverityID": 4.0 },
                { "ThreatName": null, "SeverityID": 2.7, "Severity": null }
            ]
        }"#;
        let snap = FeedSnapshot::from_json(json).unwrap();
        let colors: Vec<ColorTag> = snap.detections.iter().map(Detection::color).collect();
        assert_eq!(colors, vec![ColorTag::Red, ColorTag::Purple, ColorTag::Red, ColorTag::Orange]);

        assert!(snap.detections[0].resources.contains("x.exe"));
        assert!(snap.detections[0].resources.contains("y.exe"));
        assert_eq!(snap.detections[1].resources, "");
        assert_eq!(snap.detections[1].detection_time, "");
        assert_eq!(snap.detections[1].severity_id, None);
        assert_eq!(snap.detections[2].severity_id, Some(4));
        assert_eq!(snap.detections[3].threat_name, "");

        let mut tracker = DeltaTracker::new();
        assert_eq!(tracker.observe(&snap.detections).len(), 4);
    }

    #[test]
    fn test_loosely_typed_status() {
        let json = r#"{ "status": { "AMServiceEnabled": 1, "AntivirusEnabled": null, "SignatureAge": "old" } }"#;
        let snap = FeedSnapshot::from_json(json).unwrap();
        let status = snap.status.unwrap();
        assert!(status.service_enabled);
        assert!(!status.antivirus_enabled);
        assert_eq!(status.signature_age, None);
    }

    #[test]
    fn test_poll_error_yields_nothing() {
        let (tx, queue) = spawn_queue(16);
        let source = ScriptedSource::new([
            Err(FeedError::Unavailable("service stopped".to_string())),
            Ok(snapshot(vec![detection("A", "t1", "High")])),
        ]);
        let mut poller = FeedPoller::new(source, tx);

        assert_eq!(poller.poll_once(), 0);
        let status = poller.status();
        assert!(status.last_error.contains("service stopped"));
        assert_eq!(queue.pending(), 0);

        assert_eq!(poller.poll_once(), 1);
        assert!(poller.status().last_error.is_empty());
        assert_eq!(poller.status().total_detections, 1);

        // Script exhausted: the last snapshot repeats and is deduplicated
        assert_eq!(poller.poll_once(), 0);
        assert_eq!(queue.drain(10), vec![ColorTag::Red]);
        assert_eq!(poller.status().polls, 3);
        assert_eq!(poller.status().requests_sent, 1);
    }

    #[test]
    fn test_json_file_source() {
        let path = std::env::temp_dir().join(format!("fishbowl-feed-{}.json", std::process::id()));
        let mut source = JsonFileSource::new(&path);
        assert!(matches!(source.poll(), Err(FeedError::Unavailable(_))));

        std::fs::write(&path, r#"{"detections":[{"ThreatName":"A","Severity":"High"}]}"#).unwrap();
        let snapshot = source.poll().unwrap();
        assert_eq!(snapshot.detections.len(), 1);
        assert_eq!(snapshot.detections[0].color(), ColorTag::Red);

        std::fs::write(&path, "not json").unwrap();
        assert!(matches!(source.poll(), Err(FeedError::Parse(_))));
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_worker_sync_now_and_shutdown() {
        let (tx, queue) = spawn_queue(16);
        let source = ScriptedSource::new([Ok(snapshot(vec![
            detection("A", "t1", "High"),
            detection("B", "t1", "Low"),
        ]))]);
        let worker = FeedWorker::spawn(source, tx, Duration::from_secs(3600), false).unwrap();
        worker.sync_now();

        for _ in 0..500 {
            if queue.pending() >= 2 {
                break;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        assert_eq!(queue.drain(10), vec![ColorTag::Red, ColorTag::Yellow]);
        assert_eq!(worker.status().total_detections, 2);
        worker.shutdown();
    }

    proptest! {
        #[test]
        fn prop_each_identifier_fires_once(ids in prop::collection::vec(0u8..8, 0..64)) {
            let mut tracker = DeltaTracker::new();
            let mut fired = 0;
            for id in &ids {
                fired += tracker.observe(&[detection(&id.to_string(), "t", "Low")]).len();
            }
            let distinct: HashSet<_> = ids.iter().collect();
            prop_assert_eq!(fired, distinct.len());
        }
    }
}
