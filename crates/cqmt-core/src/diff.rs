//! Element-level comparison of two versions of an ontology.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::{
  document::{ElementInfo, ElementMap},
  element::ElementKind,
};

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
  Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ChangeKind {
  Added,
  Deleted,
  Modified,
}

/// Impact of a change on consumers of the ontology.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
  Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ChangeCategory {
  /// Something a consumer may rely on went away.
  Breaking,
  Enhancement,
  Compatible,
}

impl ChangeKind {
  pub fn category(self) -> ChangeCategory {
    match self {
      Self::Added => ChangeCategory::Enhancement,
      Self::Deleted => ChangeCategory::Breaking,
      Self::Modified => ChangeCategory::Compatible,
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChangeDetail {
  Added { label: Option<String> },
  Deleted { label: Option<String> },
  LabelChanged { old: String, new: String },
  LabelAdded { new: String },
  LabelRemoved { old: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementChange {
  pub iri:      String,
  pub kind:     ElementKind,
  pub change:   ChangeKind,
  pub category: ChangeCategory,
  pub detail:   ChangeDetail,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeCounts {
  pub added:       usize,
  pub deleted:     usize,
  pub modified:    usize,
  pub breaking:    usize,
  pub enhancement: usize,
  pub compatible:  usize,
}

impl ChangeCounts {
  pub fn tally(changes: &[ElementChange]) -> Self {
    let mut counts = Self::default();
    for change in changes {
      match change.change {
        ChangeKind::Added => counts.added += 1,
        ChangeKind::Deleted => counts.deleted += 1,
        ChangeKind::Modified => counts.modified += 1,
      }
      match change.category {
        ChangeCategory::Breaking => counts.breaking += 1,
        ChangeCategory::Enhancement => counts.enhancement += 1,
        ChangeCategory::Compatible => counts.compatible += 1,
      }
    }
    counts
  }

  pub fn total(&self) -> usize { self.added + self.deleted + self.modified }
}

/// Compare the elements of the current graph (`old`) with those of a
/// proposed document (`new`).
///
/// Output is ordered by IRI. Elements present on both sides are reported
/// only when their labels differ and at least one side has a non-empty
/// label. A renamed element shows up as one deletion and one addition.
pub fn diff_elements(old: &ElementMap, new: &ElementMap) -> Vec<ElementChange> {
  let mut changes = Vec::new();

  for (iri, before) in old {
    match new.get(iri) {
      None => changes.push(change(iri, before.kind, ChangeKind::Deleted, ChangeDetail::Deleted {
        label: before.label.clone(),
      })),
      Some(after) => {
        if let Some(detail) = label_change(before, after) {
          changes.push(change(iri, after.kind, ChangeKind::Modified, detail));
        }
      }
    }
  }

  for (iri, after) in new {
    if !old.contains_key(iri) {
      changes.push(change(iri, after.kind, ChangeKind::Added, ChangeDetail::Added {
        label: after.label.clone(),
      }));
    }
  }

  changes.sort_by(|a, b| a.iri.cmp(&b.iri));
  changes
}

fn change(iri: &str, kind: ElementKind, change: ChangeKind, detail: ChangeDetail) -> ElementChange {
  ElementChange {
    iri: iri.to_owned(),
    kind,
    change,
    category: change.category(),
    detail,
  }
}

fn label_change(before: &ElementInfo, after: &ElementInfo) -> Option<ChangeDetail> {
  let old = before.label.as_deref().filter(|l| !l.is_empty());
  let new = after.label.as_deref().filter(|l| !l.is_empty());
  match (old, new) {
    (Some(old), Some(new)) if old != new => Some(ChangeDetail::LabelChanged {
      old: old.to_owned(),
      new: new.to_owned(),
    }),
    (None, Some(new)) => Some(ChangeDetail::LabelAdded { new: new.to_owned() }),
    (Some(old), None) => Some(ChangeDetail::LabelRemoved { old: old.to_owned() }),
    _ => None,
  }
}
