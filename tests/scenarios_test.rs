//! End-to-end detector behavior through the public engine API.

use chrono::{DateTime, Duration, TimeZone, Utc};
use proctor_agent::core::{EventKind, ProctorEngine, ProctorEvent};
use proctor_agent::perception::{BoundingBox, Detection, Face, FrameReport, Landmark};

const NOSE_TIP: usize = 1;
const LEFT_EYE: [usize; 8] = [33, 159, 158, 157, 133, 153, 145, 144];
const RIGHT_EYE: [usize; 8] = [362, 386, 387, 388, 263, 373, 374, 380];

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap()
}

fn at(secs: f64) -> DateTime<Utc> {
    t0() + Duration::milliseconds((secs * 1000.0) as i64)
}

/// A full landmark mesh with the nose at `nose` and both eyes open to `eye_ratio`.
fn face(nose: (f64, f64), eye_ratio: f64) -> Face {
    let mut landmarks = vec![Landmark::new(0.5, 0.5); 478];
    landmarks[NOSE_TIP] = Landmark::new(nose.0, nose.1);

    for (contour, left_x) in [(LEFT_EYE, 0.35), (RIGHT_EYE, 0.55)] {
        let width = 0.1;
        landmarks[contour[0]] = Landmark::new(left_x, 0.4);
        landmarks[contour[4]] = Landmark::new(left_x + width, 0.4);
        let half_gap = eye_ratio * width / 2.0;
        landmarks[contour[2]] = Landmark::new(left_x + width / 2.0, 0.4 - half_gap);
        landmarks[contour[6]] = Landmark::new(left_x + width / 2.0, 0.4 + half_gap);
    }

    Face::with_landmarks(landmarks)
}

fn attentive() -> FrameReport {
    FrameReport::new(vec![face((0.5, 0.5), 0.3)], vec![])
}

fn looking_away() -> FrameReport {
    FrameReport::new(vec![face((0.95, 0.5), 0.3)], vec![])
}

fn eyes_closed() -> FrameReport {
    FrameReport::new(vec![face((0.5, 0.5), 0.10)], vec![])
}

fn phone(confidence: f64) -> FrameReport {
    FrameReport::new(
        vec![face((0.5, 0.5), 0.3)],
        vec![Detection::new(
            "cell phone",
            confidence,
            BoundingBox::new(100.4, 200.9, 180.0, 320.5),
        )],
    )
}

fn kinds(events: &[ProctorEvent]) -> Vec<EventKind> {
    events.iter().map(|e| e.event_type).collect()
}

fn started_engine(id: &str) -> ProctorEngine {
    let engine = ProctorEngine::default();
    engine.start_session(id, t0());
    engine
}

#[test]
fn focus_lost_after_timeout() {
    let engine = started_engine("iv-a");

    for secs in 0..=6 {
        let events = engine.analyze_report("iv-a", &looking_away(), at(secs as f64));
        assert!(events.is_empty(), "unexpected events at t={secs}: {events:?}");
    }

    let events = engine.analyze_report("iv-a", &looking_away(), at(8.0));
    assert_eq!(kinds(&events), vec![EventKind::FocusLost]);

    let json = serde_json::to_value(&events[0]).unwrap();
    let duration = json["metadata"]["duration"].as_f64().unwrap();
    assert!((duration - 8.0).abs() < 1e-6);
    assert_eq!(json["eventType"], "focus_lost");
    assert_eq!(json["interviewId"], "iv-a");
    assert_eq!(json["severity"], "medium");
}

#[test]
fn drowsiness_confirmed_on_second_frame() {
    let engine = started_engine("iv-b");

    let first = engine.analyze_report("iv-b", &eyes_closed(), at(0.0));
    assert!(first.is_empty());

    let second = engine.analyze_report("iv-b", &eyes_closed(), at(0.5));
    assert_eq!(kinds(&second), vec![EventKind::Drowsiness]);
    let json = serde_json::to_value(&second[0]).unwrap();
    assert_eq!(json["metadata"]["consecutiveFrames"], 2);
    assert_eq!(json["metadata"]["detectionType"], "eye_closure");

    // Third frame is still low but inside the cooldown window
    let third = engine.analyze_report("iv-b", &eyes_closed(), at(1.0));
    assert!(third.is_empty());
}

#[test]
fn suspicious_object_respects_cooldown() {
    let engine = started_engine("iv-c");

    let first = engine.analyze_report("iv-c", &phone(0.35), at(0.0));
    assert_eq!(kinds(&first), vec![EventKind::SuspiciousObject]);
    let json = serde_json::to_value(&first[0]).unwrap();
    assert_eq!(json["message"], "Mobile Phone detected");
    assert_eq!(json["metadata"]["label"], "cell phone");
    assert_eq!(json["metadata"]["boundingBox"], serde_json::json!([100, 200, 180, 320]));

    assert!(engine.analyze_report("iv-c", &phone(0.35), at(2.0)).is_empty());

    let again = engine.analyze_report("iv-c", &phone(0.35), at(4.0));
    assert_eq!(kinds(&again), vec![EventKind::SuspiciousObject]);
}

#[test]
fn low_confidence_object_ignored() {
    let engine = started_engine("iv-c2");
    assert!(engine.analyze_report("iv-c2", &phone(0.3), at(0.0)).is_empty());
    assert!(engine.analyze_report("iv-c2", &phone(0.1), at(1.0)).is_empty());
}

#[test]
fn multiple_faces_once_per_window() {
    let engine = started_engine("iv-d");
    let two_faces = FrameReport::new(vec![Face::default(), Face::default()], vec![]);

    let first = engine.analyze_report("iv-d", &two_faces, at(1.0));
    assert_eq!(kinds(&first), vec![EventKind::MultipleFaces]);
    let json = serde_json::to_value(&first[0]).unwrap();
    assert_eq!(json["metadata"]["faceCount"], 2);
    assert_eq!(json["severity"], "high");

    assert!(engine.analyze_report("iv-d", &two_faces, at(2.0)).is_empty());
    assert!(engine.analyze_report("iv-d", &two_faces, at(3.5)).is_empty());
}

#[test]
fn cooldown_holds_for_every_kind() {
    let engine = started_engine("iv-p");
    let mut emitted: Vec<ProctorEvent> = Vec::new();

    // Unfocused, drowsy, two people and a phone, every 250ms for 40s
    let busy = FrameReport::new(
        vec![face((0.95, 0.5), 0.05), Face::default()],
        vec![Detection::new("cell phone", 0.9, BoundingBox::default())],
    );
    for step in 0..160 {
        let secs = step as f64 * 0.25;
        // Drop every face for a stretch to exercise face_missing too
        let report = if (15.0..28.0).contains(&secs) {
            FrameReport::default()
        } else {
            busy.clone()
        };
        emitted.extend(engine.analyze_report("iv-p", &report, at(secs)));
    }

    for kind in [
        EventKind::MultipleFaces,
        EventKind::FocusLost,
        EventKind::Drowsiness,
        EventKind::FaceMissing,
        EventKind::SuspiciousObject,
    ] {
        let times: Vec<_> = emitted
            .iter()
            .filter(|e| e.event_type == kind)
            .map(|e| e.timestamp)
            .collect();
        assert!(!times.is_empty(), "{kind} never fired");
        for pair in times.windows(2) {
            assert!(pair[1] - pair[0] >= Duration::seconds(3), "{kind} fired too soon");
        }
    }
}

#[test]
fn focus_returns_on_first_focused_frame() {
    let engine = started_engine("iv-h");

    engine.analyze_report("iv-h", &looking_away(), at(0.0));
    engine.analyze_report("iv-h", &looking_away(), at(5.0));
    let stats = engine.session_stats("iv-h").unwrap();
    assert!(!stats.currently_focused);

    engine.analyze_report("iv-h", &attentive(), at(6.0));
    let stats = engine.session_stats("iv-h").unwrap();
    assert!(stats.currently_focused);

    // Timer restarts from the next unfocused frame
    for secs in [7.0, 10.0, 14.0] {
        assert!(engine.analyze_report("iv-h", &looking_away(), at(secs)).is_empty());
    }
    let events = engine.analyze_report("iv-h", &looking_away(), at(14.5));
    assert_eq!(kinds(&events), vec![EventKind::FocusLost]);
}

#[test]
fn single_open_eye_frame_resets_drowsiness() {
    let engine = started_engine("iv-r");

    assert!(engine.analyze_report("iv-r", &eyes_closed(), at(0.0)).is_empty());
    assert!(engine.analyze_report("iv-r", &attentive(), at(0.5)).is_empty());
    assert!(engine.analyze_report("iv-r", &eyes_closed(), at(1.0)).is_empty());

    let events = engine.analyze_report("iv-r", &eyes_closed(), at(1.5));
    assert_eq!(kinds(&events), vec![EventKind::Drowsiness]);
}

#[test]
fn face_loss_suppresses_focus_and_drowsiness() {
    let engine = started_engine("iv-f");

    engine.analyze_report("iv-f", &looking_away(), at(0.0));
    engine.analyze_report("iv-f", &eyes_closed(), at(0.5));

    for step in 1..=20 {
        let events = engine.analyze_report("iv-f", &FrameReport::default(), at(step as f64));
        assert!(events
            .iter()
            .all(|e| !matches!(e.event_type, EventKind::FocusLost | EventKind::Drowsiness)));
        let stats = engine.session_stats("iv-f").unwrap();
        assert!(stats.currently_focused);
    }

    // Drowsiness counter restarted: one closed frame is not enough
    assert!(engine
        .analyze_report("iv-f", &eyes_closed(), at(21.0))
        .iter()
        .all(|e| e.event_type != EventKind::Drowsiness));
}

#[test]
fn empty_frames_raise_face_missing_once_per_window() {
    let engine = started_engine("iv-e");
    let mut missing = Vec::new();

    for step in 0..=60 {
        let secs = step as f64 * 0.5;
        let events = engine.analyze_report("iv-e", &FrameReport::default(), at(secs));
        assert!(events.iter().all(|e| e.event_type == EventKind::FaceMissing));
        missing.extend(events);
    }

    // Timeout passes at t>10s; then at most one alert per 3s up to t=30
    assert_eq!(missing[0].timestamp, at(10.5));
    assert!(missing.len() <= 7);
    for pair in missing.windows(2) {
        assert!(pair[1].timestamp - pair[0].timestamp >= Duration::seconds(3));
    }
}

#[test]
fn sessions_are_isolated() {
    let engine = ProctorEngine::default();
    engine.start_session("iv-1", t0());
    engine.start_session("iv-2", t0());

    engine.analyze_report("iv-1", &eyes_closed(), at(0.0));
    // Low frame for a different interview must not confirm iv-1's streak
    assert!(engine.analyze_report("iv-2", &eyes_closed(), at(0.5)).is_empty());

    let events = engine.analyze_report("iv-1", &eyes_closed(), at(1.0));
    assert_eq!(kinds(&events), vec![EventKind::Drowsiness]);
}
