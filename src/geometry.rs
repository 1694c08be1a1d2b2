//! Page geometry: lengths and rectangular page boxes

use std::str::FromStr;

use lopdf::Object;

use crate::error::{Error, Result};

/// Simple length type, stored in PDF points (1/72 inch)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Length(pub f64);

impl Length {
    /// Create a length from points
    pub fn from_pt(pt: f64) -> Self {
        Length(pt)
    }

    /// Create a length from millimeters
    pub fn from_mm(mm: f64) -> Self {
        Length(mm * 72.0 / 25.4)
    }

    /// Create a length from inches
    pub fn from_inches(inches: f64) -> Self {
        Length(inches * 72.0)
    }

    /// Get the value in millimeters
    pub fn mm(&self) -> f64 {
        self.0 * 25.4 / 72.0
    }

    /// Get the value in points
    pub fn pt(&self) -> f64 {
        self.0
    }
}

impl FromStr for Length {
    type Err = Error;

    /// Parse `72`, `72pt`, `10mm` or `1in`
    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let (number, unit) = match s.find(|c: char| c.is_ascii_alphabetic()) {
            Some(pos) => s.split_at(pos),
            None => (s, "pt"),
        };
        let value: f64 = number
            .trim()
            .parse()
            .map_err(|_| Error::InvalidPlan(format!("Invalid length: {}", s)))?;
        match unit.to_ascii_lowercase().as_str() {
            "pt" => Ok(Length::from_pt(value)),
            "mm" => Ok(Length::from_mm(value)),
            "in" => Ok(Length::from_inches(value)),
            other => Err(Error::InvalidPlan(format!(
                "Unknown length unit '{}' in {}",
                other, s
            ))),
        }
    }
}

/// A page box in default user space (origin at the bottom-left corner)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RectangularBox {
    pub left: Length,
    pub bottom: Length,
    pub right: Length,
    pub top: Length,
}

impl RectangularBox {
    pub fn new(left: Length, bottom: Length, right: Length, top: Length) -> Result<Self> {
        let area = Self { left, bottom, right, top };
        area.ensure_is_valid()?;
        Ok(area)
    }

    pub fn from_points(left: f64, bottom: f64, right: f64, top: f64) -> Result<Self> {
        Self::new(
            Length::from_pt(left),
            Length::from_pt(bottom),
            Length::from_pt(right),
            Length::from_pt(top),
        )
    }

    pub fn width(&self) -> Length {
        Length(self.right.pt() - self.left.pt())
    }

    pub fn height(&self) -> Length {
        Length(self.top.pt() - self.bottom.pt())
    }

    /// Fails on boxes with no area or negative coordinates
    pub fn ensure_is_valid(&self) -> Result<()> {
        let coordinates = [self.left.pt(), self.bottom.pt(), self.right.pt(), self.top.pt()];
        if coordinates.iter().any(|c| !c.is_finite() || *c < 0.0) {
            return Err(Error::InvalidPlan(format!("Invalid crop area {:?}", self)));
        }
        if self.width().pt() <= 0.0 || self.height().pt() <= 0.0 {
            return Err(Error::InvalidPlan(format!(
                "Crop area has no area: {}x{}pt",
                self.width().pt(),
                self.height().pt()
            )));
        }
        Ok(())
    }

    /// PDF rectangle array `[llx lly urx ury]`
    pub fn to_object(&self) -> Object {
        Object::Array(vec![
            Object::Real(self.left.pt() as f32),
            Object::Real(self.bottom.pt() as f32),
            Object::Real(self.right.pt() as f32),
            Object::Real(self.top.pt() as f32),
        ])
    }
}

impl FromStr for RectangularBox {
    type Err = Error;

    /// Parse `left:bottom:right:top`, each a [`Length`]
    fn from_str(s: &str) -> Result<Self> {
        let parts: Vec<&str> = s.split(':').collect();
        if parts.len() != 4 {
            return Err(Error::InvalidPlan(format!(
                "Crop area must be left:bottom:right:top, got {}",
                s
            )));
        }
        RectangularBox::new(
            parts[0].parse()?,
            parts[1].parse()?,
            parts[2].parse()?,
            parts[3].parse()?,
        )
    }
}
