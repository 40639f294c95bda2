//! Page references and page-range resolution.
//!
//! A page range token such as `A1-3east` resolves to a list of
//! [`PageRef`]s. Each reference names the input document, the 1-based
//! page number and the rotation to apply when the page is imported.

pub mod range;

pub use range::{PageRange, PageRangeResolver};

use serde::Serialize;

/// Quarter-turn page orientation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum Rotation {
    /// 0 degrees.
    #[default]
    North,
    /// 90 degrees clockwise.
    East,
    /// 180 degrees.
    South,
    /// 270 degrees clockwise.
    West,
}

impl Rotation {
    /// Rotation in degrees, always one of 0, 90, 180, 270.
    pub fn degrees(&self) -> i64 {
        match self {
            Self::North => 0,
            Self::East => 90,
            Self::South => 180,
            Self::West => 270,
        }
    }

    /// Snap an arbitrary `/Rotate` value to the nearest quarter turn.
    ///
    /// Negative values and values past a full turn are normalized first.
    pub fn from_degrees(degrees: i64) -> Self {
        match degrees.rem_euclid(360) {
            45..=134 => Self::East,
            135..=224 => Self::South,
            225..=314 => Self::West,
            _ => Self::North,
        }
    }
}

/// One output page: which input page to take and how to turn it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PageRef {
    /// Index of the input document.
    pub input: usize,
    /// 1-based page number within that input.
    pub page: u32,
    /// Rotation to set or add.
    pub rotation: Rotation,
    /// Absolute rotations replace the page's rotation; relative ones add to it.
    pub absolute: bool,
}

impl PageRef {
    /// A reference that leaves the page's rotation untouched.
    pub fn unrotated(input: usize, page: u32) -> Self {
        Self {
            input,
            page,
            rotation: Rotation::North,
            absolute: false,
        }
    }

    /// The `/Rotate` value the imported page should carry.
    ///
    /// # Arguments
    ///
    /// * `current` - the page's effective rotation before import
    pub fn resolve_rotation(&self, current: i64) -> i64 {
        if self.absolute {
            self.rotation.degrees()
        } else {
            (current + self.rotation.degrees()).rem_euclid(360)
        }
    }

    /// True if importing this page changes its rotation.
    pub fn rotates(&self) -> bool {
        self.absolute || self.rotation != Rotation::North
    }
}
