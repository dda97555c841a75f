//! `WeekGrid`: a fixed-size boolean map over every [`Slot`] of the week.

use serde::{Deserialize, Serialize};

use crate::slot::{DAYS, HOURS, Slot};

/// One flag per slot, indexed by day then hour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct WeekGrid {
  cells: [[bool; HOURS]; DAYS],
}

impl WeekGrid {
  pub fn new() -> Self { Self::default() }

  pub fn mark(&mut self, slot: Slot) {
    self.cells[slot.day() as usize][slot.hour() as usize] = true;
  }

  pub fn clear(&mut self, slot: Slot) {
    self.cells[slot.day() as usize][slot.hour() as usize] = false;
  }

  pub fn is_marked(&self, slot: Slot) -> bool {
    self.cells[slot.day() as usize][slot.hour() as usize]
  }

  /// Marked slots in grid order.
  pub fn occupied(&self) -> Vec<Slot> { Slot::all().filter(|s| self.is_marked(*s)).collect() }

  /// Unmarked slots in grid order.
  pub fn free(&self) -> Vec<Slot> { Slot::all().filter(|s| !self.is_marked(*s)).collect() }

  pub fn count(&self) -> usize { self.cells.iter().flatten().filter(|c| **c).count() }
}

impl FromIterator<Slot> for WeekGrid {
  fn from_iter<I: IntoIterator<Item = Slot>>(iter: I) -> Self {
    let mut grid = Self::new();
    for slot in iter {
      grid.mark(slot);
    }
    grid
  }
}
