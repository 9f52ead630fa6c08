use egui::{Color32, Visuals};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Theme {
    Dark,
    Light,
}

impl Theme {
    pub fn toggle(&self) -> Self {
        match self {
            Theme::Dark => Theme::Light,
            Theme::Light => Theme::Dark,
        }
    }

    pub fn visuals(&self) -> Visuals {
        match self {
            Theme::Dark => Visuals::dark(),
            Theme::Light => Visuals::light(),
        }
    }

    /// Bars of the metric chart.
    pub fn metric_color(&self) -> Color32 {
        match self {
            Theme::Dark => Color32::from_rgb(110, 170, 230),
            Theme::Light => Color32::from_rgb(135, 206, 235),
        }
    }

    /// Histogram of the projection.
    pub fn projection_color(&self) -> Color32 {
        match self {
            Theme::Dark => Color32::from_rgb(120, 200, 120),
            Theme::Light => Color32::from_rgb(144, 238, 144),
        }
    }

    /// Reference lines (ideal, tension, forecast).
    pub fn marker_color(&self) -> Color32 {
        match self {
            Theme::Dark => Color32::from_rgb(255, 190, 80),
            Theme::Light => Color32::from_rgb(200, 120, 0),
        }
    }
}

impl Default for Theme {
    fn default() -> Self {
        Theme::Dark
    }
}
