//! Shared UI element types for accessibility-based automation.
//!
//! This module defines the data structures the UI tree provider hands back on
//! every query: a [`ScreenDump`] made of stacked [`UiWindow`]s, each holding a
//! tree of [`UIElement`]s. These types are the wire shape of a tree query and
//! are independent of any specific provider implementation.

use serde::{Deserialize, Serialize};

/// Represents a UI element from the accessibility hierarchy.
///
/// Elements form a tree structure via the `children` field.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UIElement {
    /// The stable resource identifier (e.g. `com.app:id/allow_button`).
    #[serde(default, alias = "id")]
    pub identifier: Option<String>,

    /// The visible text of the element.
    #[serde(default)]
    pub text: Option<String>,

    /// The content description, read out by screen readers.
    #[serde(default)]
    pub description: Option<String>,

    /// The widget class (e.g. "Button", "TextView").
    #[serde(rename = "type", default)]
    pub element_type: Option<String>,

    /// The element's bounds in screen coordinates.
    #[serde(default)]
    pub frame: Option<ElementFrame>,

    /// Child elements nested within this element.
    #[serde(default)]
    pub children: Vec<UIElement>,
}

/// The frame (position and dimensions) of a UI element.
///
/// Coordinates are in screen pixels, with the origin at the top-left
/// corner of the screen.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ElementFrame {
    /// The x-coordinate of the element's top-left corner.
    pub x: f64,
    /// The y-coordinate of the element's top-left corner.
    pub y: f64,
    /// The width of the element.
    pub width: f64,
    /// The height of the element.
    pub height: f64,
}

impl ElementFrame {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height }
    }

    /// Returns true if the frame covers no area.
    pub fn is_empty(&self) -> bool {
        !(self.width > 0.0 && self.height > 0.0)
    }

    /// Center point, rounded to whole pixels.
    pub fn center(&self) -> (i32, i32) {
        (
            (self.x + self.width / 2.0).round() as i32,
            (self.y + self.height / 2.0).round() as i32,
        )
    }

    /// The part of this frame that lies on `screen`, or `None` if nothing of
    /// it is visible.
    pub fn clip_to(&self, screen: &ScreenSize) -> Option<ElementFrame> {
        let left = self.x.max(0.0);
        let top = self.y.max(0.0);
        let right = (self.x + self.width).min(screen.width);
        let bottom = (self.y + self.height).min(screen.height);
        let visible = ElementFrame::new(left, top, right - left, bottom - top);
        (!visible.is_empty()).then_some(visible)
    }
}

/// Physical size of the display the tree was captured from.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScreenSize {
    pub width: f64,
    pub height: f64,
}

impl Default for ScreenSize {
    fn default() -> Self {
        Self {
            width: 1080.0,
            height: 2400.0,
        }
    }
}

/// One on-screen window and the component that owns it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UiWindow {
    /// Component short string of the owner, e.g. `com.android.settings/.Settings`.
    #[serde(default)]
    pub component: Option<String>,

    /// Root of the window's element tree.
    pub root: UIElement,
}

/// The raw result of one tree query.
///
/// Windows are ordered by visual stacking, topmost first.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScreenDump {
    #[serde(default)]
    pub screen: ScreenSize,

    #[serde(default)]
    pub windows: Vec<UiWindow>,
}

impl ScreenDump {
    /// Parses a dump from its JSON representation.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}
