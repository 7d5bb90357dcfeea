use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::SampleError;

/// Identifier stamped on every uploaded sample.
///
/// There is no per-install identity yet; every device reports as `1`.
pub const DEVICE_ID: i64 = 1;

/// A last-known fix as reported by a location provider.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub latitude: f64,
    pub longitude: f64,
    /// Horizontal accuracy radius in metres, smaller is better.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accuracy_m: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recorded_at: Option<DateTime<Utc>>,
}

impl Position {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            accuracy_m: None,
            recorded_at: None,
        }
    }

    pub fn with_accuracy(mut self, accuracy_m: f32) -> Self {
        self.accuracy_m = Some(accuracy_m);
        self
    }

    pub fn recorded_at(mut self, at: DateTime<Utc>) -> Self {
        self.recorded_at = Some(at);
        self
    }

    /// The accuracy radius, if the provider reported a meaningful one.
    ///
    /// NaN, infinite and negative radii count as unknown.
    pub fn usable_accuracy(&self) -> Option<f32> {
        self.accuracy_m
            .filter(|accuracy| accuracy.is_finite() && *accuracy >= 0.0)
    }

    /// Seconds between the fix and `now`, when the provider timestamped it.
    pub fn age_secs(&self, now: DateTime<Utc>) -> Option<i64> {
        self.recorded_at.map(|at| (now - at).num_seconds())
    }
}

/// The JSON body posted to `/api/upload`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationSample {
    latitude: f64,
    longitude: f64,
    device_id: i64,
}

impl LocationSample {
    /// Builds the upload body, rejecting readings that cannot be sent as
    /// JSON numbers or that lie off the globe.
    pub fn try_from_position(position: &Position) -> Result<Self, SampleError> {
        let (latitude, longitude) = (position.latitude, position.longitude);
        if !latitude.is_finite() || !longitude.is_finite() {
            return Err(SampleError::NonFinite {
                latitude,
                longitude,
            });
        }
        if !(-90.0..=90.0).contains(&latitude) {
            return Err(SampleError::LatitudeOutOfRange(latitude));
        }
        if !(-180.0..=180.0).contains(&longitude) {
            return Err(SampleError::LongitudeOutOfRange(longitude));
        }
        Ok(Self {
            latitude,
            longitude,
            device_id: DEVICE_ID,
        })
    }

    pub fn latitude(&self) -> f64 {
        self.latitude
    }

    pub fn longitude(&self) -> f64 {
        self.longitude
    }

    pub fn device_id(&self) -> i64 {
        self.device_id
    }

    pub fn to_json(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }
}

impl TryFrom<Position> for LocationSample {
    type Error = SampleError;

    fn try_from(position: Position) -> Result<Self, Self::Error> {
        Self::try_from_position(&position)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use serde_json::Value;

    fn sample(lat: f64, lon: f64) -> LocationSample {
        LocationSample::try_from(Position::new(lat, lon)).expect("valid reading")
    }

    #[test]
    fn sample_serializes_with_wire_field_names() {
        let body = String::from_utf8(sample(37.7749, -122.4194).to_json().expect("serialize"))
            .expect("utf8");
        assert_eq!(
            body,
            r#"{"latitude":37.7749,"longitude":-122.4194,"deviceId":1}"#
        );
    }

    #[test]
    fn sample_body_round_trips() {
        let readings = [
            (0.0, 0.0),
            (90.0, 180.0),
            (-90.0, -180.0),
            (51.477_928, -0.001_545),
            (-33.868_82, 151.209_29),
        ];
        for (lat, lon) in readings {
            let sample = sample(lat, lon);
            let body = sample.to_json().expect("serialize");
            let decoded: LocationSample = serde_json::from_slice(&body).expect("deserialize");
            assert_eq!(decoded, sample);
            assert_eq!(decoded.latitude(), lat);
            assert_eq!(decoded.longitude(), lon);
            assert_eq!(decoded.device_id(), DEVICE_ID);
        }
    }

    #[test]
    fn non_finite_coordinates_never_reach_the_wire() {
        let readings = [
            (f64::NAN, 0.0),
            (0.0, f64::NAN),
            (f64::NAN, f64::INFINITY),
            (f64::NEG_INFINITY, 10.0),
        ];
        for (lat, lon) in readings {
            let result = LocationSample::try_from(Position::new(lat, lon));
            assert!(
                matches!(result, Err(SampleError::NonFinite { .. })),
                "({lat}, {lon}) produced {result:?}"
            );
        }
    }

    #[test]
    fn off_globe_coordinates_are_rejected() {
        assert_eq!(
            LocationSample::try_from(Position::new(90.5, 0.0)),
            Err(SampleError::LatitudeOutOfRange(90.5))
        );
        assert_eq!(
            LocationSample::try_from(Position::new(0.0, -180.25)),
            Err(SampleError::LongitudeOutOfRange(-180.25))
        );
    }

    #[test]
    fn provider_metadata_stays_off_the_wire() {
        let position = Position::new(10.5, 20.25)
            .with_accuracy(4.0)
            .recorded_at(Utc::now());
        let body = LocationSample::try_from(position)
            .expect("valid reading")
            .to_json()
            .expect("serialize");
        let value: Value = serde_json::from_slice(&body).expect("json");
        let object = value.as_object().expect("json object");
        let mut keys: Vec<_> = object.keys().map(String::as_str).collect();
        keys.sort_unstable();
        assert_eq!(keys, ["deviceId", "latitude", "longitude"]);
        assert!(object.values().all(|v| !v.is_null()));
    }

    #[test]
    fn position_without_optional_fields_parses() {
        let position: Position =
            serde_json::from_str(r#"{"latitude": 1.5, "longitude": -2.5}"#).expect("parse");
        assert_eq!(position, Position::new(1.5, -2.5));
        assert_eq!(position.age_secs(Utc::now()), None);
    }

    #[test]
    fn unusable_accuracy_counts_as_unknown() {
        assert_eq!(Position::new(0.0, 0.0).with_accuracy(12.0).usable_accuracy(), Some(12.0));
        assert_eq!(Position::new(0.0, 0.0).with_accuracy(f32::NAN).usable_accuracy(), None);
        assert_eq!(Position::new(0.0, 0.0).with_accuracy(f32::INFINITY).usable_accuracy(), None);
        assert_eq!(Position::new(0.0, 0.0).with_accuracy(-3.0).usable_accuracy(), None);
    }

    #[test]
    fn fix_age_is_measured_from_recorded_time() {
        let now = Utc::now();
        let position = Position::new(0.0, 0.0).recorded_at(now - Duration::seconds(90));
        assert_eq!(position.age_secs(now), Some(90));
    }
}
