//! Scalar Kalman filter for the RSSI stream.

use crate::config::FilterConfig;

const MEASUREMENT_NOISE_SCALE: f32 = 0.01;
const PROCESS_NOISE_SCALE: f32 = 0.0001;

#[derive(Clone, Copy, Debug)]
pub struct KalmanFilter {
    measurement_noise: f32,
    process_noise: f32,
    estimate: Option<f32>,
    covariance: f32,
}

impl KalmanFilter {
    /// Coefficients are given as scaled integers: measurement noise = raw * 0.01,
    /// process noise = raw * 0.0001.
    pub fn new(measurement_noise_raw: u16, process_noise_raw: u16) -> Self {
        Self {
            measurement_noise: f32::from(measurement_noise_raw) * MEASUREMENT_NOISE_SCALE,
            process_noise: f32::from(process_noise_raw) * PROCESS_NOISE_SCALE,
            estimate: None,
            covariance: 0.0,
        }
    }

    pub fn from_config(config: &FilterConfig) -> Self {
        Self::new(config.measurement_noise_raw, config.process_noise_raw)
    }

    pub fn measurement_noise(&self) -> f32 {
        self.measurement_noise
    }

    pub fn process_noise(&self) -> f32 {
        self.process_noise
    }

    pub fn estimate(&self) -> Option<f32> {
        self.estimate
    }

    pub fn reset(&mut self) {
        self.estimate = None;
        self.covariance = 0.0;
    }

    pub fn filter(&mut self, measurement: f32) -> f32 {
        let Some(previous) = self.estimate else {
            self.estimate = Some(measurement);
            self.covariance = self.measurement_noise;
            return measurement;
        };

        let predicted_covariance = self.covariance + self.process_noise;
        let gain = predicted_covariance / (predicted_covariance + self.measurement_noise);
        let estimate = previous + gain * (measurement - previous);
        self.covariance = predicted_covariance - gain * predicted_covariance;
        self.estimate = Some(estimate);
        estimate
    }

    /// Filters and rounds to the nearest storable amplitude.
    pub fn filter_amplitude(&mut self, raw: u8) -> u8 {
        let estimate = self.filter(f32::from(raw));
        libm::roundf(estimate).clamp(0.0, f32::from(u8::MAX)) as u8
    }
}
