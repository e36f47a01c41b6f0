use std::fmt;
use std::str::FromStr;

use serde::{
  Deserialize,
  Serialize
};

use crate::ValidationError;

#[derive(
  Debug,
  Clone,
  Copy,
  Serialize,
  Deserialize,
  PartialEq,
  Eq,
  Hash,
  PartialOrd,
  Ord,
)]
#[serde(rename_all = "lowercase")]
pub enum PanelKey {
  Pinned,
  Quicklinks,
  Dates,
  Todos,
  Notes
}

impl PanelKey {
  pub const ALL: [PanelKey; 5] = [
    PanelKey::Pinned,
    PanelKey::Quicklinks,
    PanelKey::Dates,
    PanelKey::Todos,
    PanelKey::Notes
  ];

  pub fn as_str(self) -> &'static str {
    match self {
      | PanelKey::Pinned => "pinned",
      | PanelKey::Quicklinks => {
        "quicklinks"
      }
      | PanelKey::Dates => "dates",
      | PanelKey::Todos => "todos",
      | PanelKey::Notes => "notes"
    }
  }

  pub fn title(self) -> &'static str {
    match self {
      | PanelKey::Pinned => {
        "Yaping Leaderboards"
      }
      | PanelKey::Quicklinks => {
        "Quick Links"
      }
      | PanelKey::Dates => {
        "Important Dates"
      }
      | PanelKey::Todos => "To-Do List",
      | PanelKey::Notes => "Notes"
    }
  }
}

impl fmt::Display for PanelKey {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>
  ) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for PanelKey {
  type Err = ValidationError;

  fn from_str(
    s: &str
  ) -> Result<Self, Self::Err> {
    PanelKey::ALL
      .into_iter()
      .find(|key| {
        key
          .as_str()
          .eq_ignore_ascii_case(s.trim())
      })
      .ok_or_else(|| {
        ValidationError::UnknownPanel(
          s.to_string()
        )
      })
  }
}

#[derive(
  Debug,
  Clone,
  Copy,
  Serialize,
  Deserialize,
  PartialEq,
  Eq,
  Hash,
)]
#[serde(rename_all = "lowercase")]
pub enum Column {
  Column1,
  Column2
}

impl Column {
  pub fn as_str(self) -> &'static str {
    match self {
      | Column::Column1 => "column1",
      | Column::Column2 => "column2"
    }
  }
}

impl fmt::Display for Column {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>
  ) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for Column {
  type Err = ValidationError;

  fn from_str(
    s: &str
  ) -> Result<Self, Self::Err> {
    match s
      .trim()
      .to_ascii_lowercase()
      .as_str()
    {
      | "column1" | "1" => {
        Ok(Column::Column1)
      }
      | "column2" | "2" => {
        Ok(Column::Column2)
      }
      | _ => Err(
        ValidationError::UnknownColumn(
          s.to_string()
        )
      )
    }
  }
}

/// A position inside one sidebar
/// column.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq,
)]
pub struct Slot {
  pub column: Column,
  pub index:  usize
}

impl Slot {
  pub fn new(
    column: Column,
    index: usize
  ) -> Self {
    Self { column, index }
  }
}

#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  PartialEq,
  Eq,
)]
pub struct SidebarLayout {
  pub column1: Vec<PanelKey>,
  pub column2: Vec<PanelKey>
}

impl Default for SidebarLayout {
  fn default() -> Self {
    Self {
      column1: vec![
        PanelKey::Pinned,
        PanelKey::Quicklinks,
        PanelKey::Dates,
      ],
      column2: vec![
        PanelKey::Todos,
        PanelKey::Notes,
      ]
    }
  }
}

impl SidebarLayout {
  pub fn column(
    &self,
    column: Column
  ) -> &[PanelKey] {
    match column {
      | Column::Column1 => &self.column1,
      | Column::Column2 => &self.column2
    }
  }

  fn column_mut(
    &mut self,
    column: Column
  ) -> &mut Vec<PanelKey> {
    match column {
      | Column::Column1 => {
        &mut self.column1
      }
      | Column::Column2 => {
        &mut self.column2
      }
    }
  }

  pub fn is_complete(&self) -> bool {
    let placed = self.column1.len()
      + self.column2.len();
    placed == PanelKey::ALL.len()
      && PanelKey::ALL.iter().all(|key| {
        self
          .column1
          .iter()
          .chain(&self.column2)
          .filter(|candidate| {
            *candidate == key
          })
          .count()
          == 1
      })
  }

  pub fn validate(
    &self
  ) -> Result<(), ValidationError> {
    if self.is_complete() {
      Ok(())
    } else {
      Err(
        ValidationError::IncompleteLayout
      )
    }
  }

  pub fn position(
    &self,
    key: PanelKey
  ) -> Option<Slot> {
    [Column::Column1, Column::Column2]
      .into_iter()
      .find_map(|column| {
        self
          .column(column)
          .iter()
          .position(|candidate| {
            *candidate == key
          })
          .map(|index| {
            Slot::new(column, index)
          })
      })
  }

  /// Moves the panel at `from` to `to`.
  /// The destination index is clamped
  /// to the target column; `None` when
  /// `from` points past its column.
  pub fn moved(
    &self,
    from: Slot,
    to: Slot
  ) -> Option<SidebarLayout> {
    let mut next = self.clone();
    let source =
      next.column_mut(from.column);
    if from.index >= source.len() {
      return None;
    }
    let key = source.remove(from.index);

    let target =
      next.column_mut(to.column);
    let index =
      to.index.min(target.len());
    target.insert(index, key);
    Some(next)
  }

  /// Panels of `column` in order,
  /// skipping the ones `hidden` rejects.
  pub fn visible(
    &self,
    column: Column,
    hidden: impl Fn(PanelKey) -> bool
  ) -> Vec<PanelKey> {
    self
      .column(column)
      .iter()
      .copied()
      .filter(|key| !hidden(*key))
      .collect()
  }
}
