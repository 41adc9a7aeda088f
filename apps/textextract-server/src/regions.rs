//! Editable text regions
//!
//! Regions are built from provider bounding boxes and handed to the client,
//! which edits them for the rest of the session. The server never stores them.
//!
//! The server only constructs regions. The editing methods and `compose_text`
//! are the shared model for clients of this crate and are not called by any route.

use serde::{Deserialize, Serialize};

/// A recognized line of text with its bounding box in image pixels
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextRegion {
    pub id: String,
    pub text: String,
    pub original_text: String,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub confidence: f64,
    pub is_visible: bool,
    pub is_edited: bool,
    pub is_deleted: bool,
}

impl TextRegion {
    pub fn new(id: impl Into<String>, text: impl Into<String>, bounds: RegionBounds, confidence: f64) -> Self {
        let text = text.into();
        Self {
            id: id.into(),
            original_text: text.clone(),
            text,
            x: bounds.x,
            y: bounds.y,
            width: bounds.width,
            height: bounds.height,
            confidence,
            is_visible: true,
            is_edited: false,
            is_deleted: false,
        }
    }

    /// Replace the text; editing back to the original clears the edited flag
    pub fn edit(&mut self, text: impl Into<String>) {
        self.text = text.into();
        self.is_edited = self.text != self.original_text;
    }

    /// Restore the recognized text
    pub fn reset(&mut self) {
        self.text = self.original_text.clone();
        self.is_edited = false;
    }

    pub fn delete(&mut self) {
        self.is_deleted = true;
    }

    pub fn restore(&mut self) {
        self.is_deleted = false;
    }

    pub fn toggle_visibility(&mut self) {
        self.is_visible = !self.is_visible;
    }

    /// Whether the region contributes to the composed text
    pub fn is_active(&self) -> bool {
        self.is_visible && !self.is_deleted
    }
}

/// Axis-aligned box in image pixels
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegionBounds {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl RegionBounds {
    /// Same box with every coordinate multiplied by `factor`
    pub fn scaled(&self, factor: f64) -> RegionBounds {
        RegionBounds {
            x: self.x * factor,
            y: self.y * factor,
            width: self.width * factor,
            height: self.height * factor,
        }
    }

    /// Smallest box containing every box in `boxes`
    pub fn union(boxes: &[RegionBounds]) -> Option<RegionBounds> {
        let first = boxes.first()?;
        let mut left = first.x;
        let mut top = first.y;
        let mut right = first.x + first.width;
        let mut bottom = first.y + first.height;

        for b in &boxes[1..] {
            left = left.min(b.x);
            top = top.min(b.y);
            right = right.max(b.x + b.width);
            bottom = bottom.max(b.y + b.height);
        }

        Some(RegionBounds {
            x: left,
            y: top,
            width: right - left,
            height: bottom - top,
        })
    }
}

/// Join the text of active regions in reading order (top to bottom, then left to right)
pub fn compose_text(regions: &[TextRegion]) -> String {
    let mut active: Vec<&TextRegion> = regions.iter().filter(|r| r.is_active()).collect();
    active.sort_by(|a, b| {
        a.y.partial_cmp(&b.y)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.x.partial_cmp(&b.x).unwrap_or(std::cmp::Ordering::Equal))
    });
    active
        .iter()
        .map(|r| r.text.trim())
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn region(id: &str, text: &str, x: f64, y: f64) -> TextRegion {
        TextRegion::new(
            id,
            text,
            RegionBounds { x, y, width: 100.0, height: 20.0 },
            90.0,
        )
    }

    #[test]
    fn test_edit_and_reset() {
        let mut r = region("region-0", "Helo", 0.0, 0.0);
        r.edit("Hello");
        assert!(r.is_edited);
        assert_eq!(r.original_text, "Helo");

        r.edit("Helo");
        assert!(!r.is_edited);

        r.edit("Hi");
        r.reset();
        assert_eq!(r.text, "Helo");
        assert!(!r.is_edited);
    }

    #[test]
    fn test_compose_skips_hidden_and_deleted() {
        let mut regions = vec![
            region("b", "second", 0.0, 40.0),
            region("a", "first", 0.0, 0.0),
            region("c", "hidden", 0.0, 80.0),
            region("d", "gone", 0.0, 120.0),
        ];
        regions[2].toggle_visibility();
        regions[3].delete();
        assert_eq!(compose_text(&regions), "first\nsecond");

        regions[3].restore();
        assert_eq!(compose_text(&regions), "first\nsecond\ngone");
    }

    #[test]
    fn test_bounds_union() {
        let merged = RegionBounds::union(&[
            RegionBounds { x: 10.0, y: 5.0, width: 20.0, height: 10.0 },
            RegionBounds { x: 40.0, y: 2.0, width: 15.0, height: 12.0 },
        ])
        .unwrap();
        assert_eq!(merged, RegionBounds { x: 10.0, y: 2.0, width: 45.0, height: 12.0 });
        assert!(RegionBounds::union(&[]).is_none());
    }

    #[test]
    fn test_serializes_camel_case() {
        let json = serde_json::to_value(region("r", "t", 1.0, 2.0)).unwrap();
        assert_eq!(json["originalText"], "t");
        assert_eq!(json["isVisible"], true);
        assert_eq!(json["isDeleted"], false);
    }
}
