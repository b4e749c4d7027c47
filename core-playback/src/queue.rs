//! # Playback Queue
//!
//! Ordered list of track references plus the cursor pointing at the entry
//! that is playing or about to play.
//!
//! The cursor is `None` exactly when the queue is empty, and every structural
//! mutation re-derives it so that it keeps pointing at the same track where
//! possible. Out-of-range indices are ignored (mutations are usually driven by
//! UI state that may be stale), and each mutation reports how the cursor was
//! affected so the controller can decide whether a reload is needed.

use crate::types::{MediaItem, RepeatMode};

/// How a mutation affected the cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorEffect {
    /// Cursor index and target track are unchanged.
    Unchanged,
    /// Cursor index moved but still points at the same track.
    Shifted { from: usize, to: usize },
    /// The queue was empty and the cursor now selects index 0.
    Selected,
    /// The entry under the cursor was removed; the cursor now points at the
    /// given index, or nothing when the queue became empty.
    CurrentRemoved { retargeted: Option<usize> },
}

/// Ordered track list with a live cursor.
#[derive(Debug, Clone, Default)]
pub struct PlaybackQueue {
    items: Vec<MediaItem>,
    cursor: Option<usize>,
}

impl PlaybackQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn current_index(&self) -> Option<usize> {
        self.cursor
    }

    pub fn current(&self) -> Option<&MediaItem> {
        self.cursor.and_then(|index| self.items.get(index))
    }

    pub fn get(&self, index: usize) -> Option<&MediaItem> {
        self.items.get(index)
    }

    pub fn items(&self) -> &[MediaItem] {
        &self.items
    }

    /// Replace the whole queue with `item` and select it.
    pub fn set_single(&mut self, item: MediaItem) {
        self.items.clear();
        self.items.push(item);
        self.cursor = Some(0);
    }

    pub fn append(&mut self, item: MediaItem) -> CursorEffect {
        self.items.push(item);
        if self.cursor.is_none() {
            self.cursor = Some(0);
            CursorEffect::Selected
        } else {
            CursorEffect::Unchanged
        }
    }

    /// Insert at `index` in `0..=len`. Returns `None` when out of range.
    pub fn insert_at(&mut self, index: usize, item: MediaItem) -> Option<CursorEffect> {
        if index > self.items.len() {
            return None;
        }

        self.items.insert(index, item);

        let effect = match self.cursor {
            None => {
                self.cursor = Some(0);
                CursorEffect::Selected
            }
            Some(current) if index <= current => {
                self.cursor = Some(current + 1);
                CursorEffect::Shifted {
                    from: current,
                    to: current + 1,
                }
            }
            Some(_) => CursorEffect::Unchanged,
        };
        Some(effect)
    }

    /// Remove the entry at `index`. Returns `None` when out of range.
    pub fn remove_at(&mut self, index: usize) -> Option<(MediaItem, CursorEffect)> {
        if index >= self.items.len() {
            return None;
        }

        let removed = self.items.remove(index);

        let effect = match self.cursor {
            Some(current) if index < current => {
                self.cursor = Some(current - 1);
                CursorEffect::Shifted {
                    from: current,
                    to: current - 1,
                }
            }
            Some(current) if index == current => {
                self.cursor = if self.items.is_empty() {
                    None
                } else {
                    Some(current.min(self.items.len() - 1))
                };
                CursorEffect::CurrentRemoved {
                    retargeted: self.cursor,
                }
            }
            _ => CursorEffect::Unchanged,
        };
        Some((removed, effect))
    }

    /// Move the entry at `from` to `to`, both in `0..len`. Returns `None` when
    /// either index is out of range.
    pub fn move_item(&mut self, from: usize, to: usize) -> Option<CursorEffect> {
        let len = self.items.len();
        if from >= len || to >= len {
            return None;
        }

        let item = self.items.remove(from);
        self.items.insert(to, item);

        let Some(current) = self.cursor else {
            return Some(CursorEffect::Unchanged);
        };

        let moved = if current == from {
            to
        } else if from < current && to >= current {
            current - 1
        } else if from > current && to <= current {
            current + 1
        } else {
            current
        };

        if moved == current {
            return Some(CursorEffect::Unchanged);
        }

        self.cursor = Some(moved);
        Some(CursorEffect::Shifted {
            from: current,
            to: moved,
        })
    }

    /// Replace the entry at `index`, returning the previous one.
    pub fn replace_at(&mut self, index: usize, item: MediaItem) -> Option<MediaItem> {
        let slot = self.items.get_mut(index)?;
        Some(std::mem::replace(slot, item))
    }

    pub fn clear(&mut self) {
        self.items.clear();
        self.cursor = None;
    }

    /// Point the cursor at `index`. Returns `false` when out of range.
    pub fn select(&mut self, index: usize) -> bool {
        if index < self.items.len() {
            self.cursor = Some(index);
            true
        } else {
            false
        }
    }

    // ------------------------------------------------------------------
    // Navigation
    // ------------------------------------------------------------------

    /// Index that follows the cursor under `mode`.
    ///
    /// Repeat-one stays on the cursor, repeat-all wraps, and off clamps at the
    /// last entry.
    pub fn next_index(&self, mode: RepeatMode) -> Option<usize> {
        let current = self.cursor?;
        let len = self.items.len();
        Some(match mode {
            RepeatMode::One => current,
            RepeatMode::All => (current + 1) % len,
            RepeatMode::Off => (current + 1).min(len - 1),
        })
    }

    /// Index that precedes the cursor under `mode`.
    pub fn previous_index(&self, mode: RepeatMode) -> Option<usize> {
        let current = self.cursor?;
        let len = self.items.len();
        Some(match mode {
            RepeatMode::One => current,
            RepeatMode::All => (current + len - 1) % len,
            RepeatMode::Off => current.saturating_sub(1),
        })
    }

    pub fn has_next(&self, mode: RepeatMode) -> bool {
        match (self.cursor, mode) {
            (None, _) => false,
            (Some(_), RepeatMode::One | RepeatMode::All) => true,
            (Some(current), RepeatMode::Off) => current + 1 < self.items.len(),
        }
    }

    pub fn has_previous(&self, mode: RepeatMode) -> bool {
        match (self.cursor, mode) {
            (None, _) => false,
            (Some(_), RepeatMode::One | RepeatMode::All) => true,
            (Some(current), RepeatMode::Off) => current > 0,
        }
    }

    /// Up to `count` distinct indices after the cursor, excluding the cursor
    /// itself. Used to pick precache targets.
    pub fn upcoming(&self, mode: RepeatMode, count: usize) -> Vec<usize> {
        let Some(current) = self.cursor else {
            return Vec::new();
        };
        let len = self.items.len();

        match mode {
            RepeatMode::One => Vec::new(),
            RepeatMode::All => (1..len)
                .map(|offset| (current + offset) % len)
                .take(count)
                .collect(),
            RepeatMode::Off => (current + 1..len).take(count).collect(),
        }
    }
}
