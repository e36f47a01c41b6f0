//! Record types shared by every mission control front end.
//!
//! Field names on the wire are camelCase so persisted slices and
//! backup files stay readable by older dashboards.

mod layout;

use chrono::NaiveDate;
use serde::{
  Deserialize,
  Serialize
};
use thiserror::Error;
use url::Url;
use uuid::Uuid;

pub use crate::layout::{
  Column,
  PanelKey,
  SidebarLayout,
  Slot
};

pub const DEFAULT_PINNED_TAG: &str =
  "yaping";

#[derive(
  Debug, Clone, PartialEq, Eq, Error,
)]
pub enum ValidationError {
  #[error("{0} is required")]
  Required(&'static str),
  #[error(
    "invalid url {value:?}: {reason}"
  )]
  InvalidUrl {
    value:  String,
    reason: String
  },
  #[error("unknown panel {0:?}")]
  UnknownPanel(String),
  #[error("unknown column {0:?}")]
  UnknownColumn(String),
  #[error(
    "sidebar layout must list every \
     panel exactly once"
  )]
  IncompleteLayout
}

pub fn new_record_id() -> String {
  Uuid::new_v4().to_string()
}

/// Splits comma separated tag input,
/// dropping blank entries.
pub fn parse_tags(
  raw: &str
) -> Vec<String> {
  raw
    .split(',')
    .map(str::trim)
    .filter(|tag| !tag.is_empty())
    .map(str::to_string)
    .collect()
}

/// Parses a link the way users type
/// it: a bare host gets `https://`.
pub fn normalize_url(
  raw: &str
) -> Result<Url, ValidationError> {
  let trimmed = raw.trim();
  if trimmed.is_empty() {
    return Err(
      ValidationError::Required("url")
    );
  }

  let candidate =
    if trimmed.starts_with("http") {
      trimmed.to_string()
    } else {
      format!("https://{trimmed}")
    };

  Url::parse(&candidate).map_err(
    |err| {
      ValidationError::InvalidUrl {
        value:  raw.to_string(),
        reason: err.to_string()
      }
    }
  )
}

fn require(
  field: &'static str,
  value: &str
) -> Result<(), ValidationError> {
  if value.trim().is_empty() {
    return Err(
      ValidationError::Required(field)
    );
  }
  Ok(())
}

fn require_if_set(
  field: &'static str,
  value: Option<&String>
) -> Result<(), ValidationError> {
  match value {
    | Some(value) => {
      require(field, value)
    }
    | None => Ok(())
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
#[serde(rename_all = "camelCase")]
pub struct Mission {
  pub id:           String,
  pub title:        String,
  pub url:          String,
  #[serde(default)]
  pub description:  String,
  #[serde(default)]
  pub tags:         Vec<String>,
  #[serde(default)]
  pub is_completed: bool,
  #[serde(
    default,
    skip_serializing_if = "Option::is_none"
  )]
  pub logo:         Option<String>,
  #[serde(
    default,
    skip_serializing_if = "Option::is_none"
  )]
  pub end_date:     Option<NaiveDate>,
  #[serde(
    default,
    skip_serializing_if = "Option::is_none"
  )]
  pub referral_url: Option<String>
}

#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  PartialEq,
  Eq,
  Default,
)]
#[serde(rename_all = "camelCase")]
pub struct MissionDraft {
  pub title:        String,
  pub url:          String,
  #[serde(default)]
  pub description:  String,
  #[serde(default)]
  pub tags:         Vec<String>,
  pub logo:         Option<String>,
  pub end_date:     Option<NaiveDate>,
  pub referral_url: Option<String>
}

#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  PartialEq,
  Eq,
  Default,
)]
#[serde(rename_all = "camelCase")]
pub struct MissionPatch {
  #[serde(
    default,
    skip_serializing_if = "Option::is_none"
  )]
  pub title:        Option<String>,
  #[serde(
    default,
    skip_serializing_if = "Option::is_none"
  )]
  pub url:          Option<String>,
  #[serde(
    default,
    skip_serializing_if = "Option::is_none"
  )]
  pub description:  Option<String>,
  #[serde(
    default,
    skip_serializing_if = "Option::is_none"
  )]
  pub tags:         Option<Vec<String>>,
  #[serde(
    default,
    skip_serializing_if = "Option::is_none"
  )]
  pub is_completed: Option<bool>,
  #[serde(
    default,
    skip_serializing_if = "Option::is_none"
  )]
  pub logo: Option<Option<String>>,
  #[serde(
    default,
    skip_serializing_if = "Option::is_none"
  )]
  pub end_date:
    Option<Option<NaiveDate>>,
  #[serde(
    default,
    skip_serializing_if = "Option::is_none"
  )]
  pub referral_url:
    Option<Option<String>>
}

/// How close a mission is to its end
/// date, counted in whole days.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq,
)]
pub enum Deadline {
  Ended { days_ago: i64 },
  EndsToday,
  Left { days: i64 }
}

impl Deadline {
  pub fn is_urgent(self) -> bool {
    match self {
      | Deadline::EndsToday => true,
      | Deadline::Left { days } => {
        days <= 3
      }
      | Deadline::Ended { .. } => false
    }
  }
}

impl MissionDraft {
  pub fn validate(
    &self
  ) -> Result<(), ValidationError> {
    require("title", &self.title)?;
    require("url", &self.url)
  }
}

impl MissionPatch {
  pub fn completion(done: bool) -> Self {
    Self {
      is_completed: Some(done),
      ..Self::default()
    }
  }

  pub fn validate(
    &self
  ) -> Result<(), ValidationError> {
    require_if_set(
      "title",
      self.title.as_ref()
    )?;
    require_if_set(
      "url",
      self.url.as_ref()
    )
  }

  pub fn is_empty(&self) -> bool {
    *self == Self::default()
  }
}

impl Mission {
  pub fn from_draft(
    id: String,
    draft: MissionDraft
  ) -> Self {
    Self {
      id,
      title: draft.title,
      url: draft.url,
      description: draft.description,
      tags: draft.tags,
      is_completed: false,
      logo: draft.logo,
      end_date: draft.end_date,
      referral_url: draft.referral_url
    }
  }

  pub fn apply(
    &mut self,
    patch: MissionPatch
  ) {
    if let Some(title) = patch.title {
      self.title = title;
    }
    if let Some(url) = patch.url {
      self.url = url;
    }
    if let Some(description) =
      patch.description
    {
      self.description = description;
    }
    if let Some(tags) = patch.tags {
      self.tags = tags;
    }
    if let Some(done) =
      patch.is_completed
    {
      self.is_completed = done;
    }
    if let Some(logo) = patch.logo {
      self.logo = logo;
    }
    if let Some(end_date) =
      patch.end_date
    {
      self.end_date = end_date;
    }
    if let Some(referral_url) =
      patch.referral_url
    {
      self.referral_url = referral_url;
    }
  }

  pub fn has_tag(
    &self,
    tag: &str
  ) -> bool {
    let wanted = tag.to_lowercase();
    self.tags.iter().any(|candidate| {
      candidate.to_lowercase() == wanted
    })
  }

  pub fn deadline(
    &self,
    today: NaiveDate
  ) -> Option<Deadline> {
    let end = self.end_date?;
    let days = end
      .signed_duration_since(today)
      .num_days();
    Some(match days {
      | d if d < 0 => {
        Deadline::Ended { days_ago: -d }
      }
      | 0 => Deadline::EndsToday,
      | d => Deadline::Left { days: d }
    })
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
#[serde(rename_all = "camelCase")]
pub struct Todo {
  pub id:           String,
  pub text:         String,
  #[serde(default)]
  pub is_completed: bool
}

#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  PartialEq,
  Eq,
)]
pub struct TodoDraft {
  pub text: String
}

#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  PartialEq,
  Eq,
  Default,
)]
#[serde(rename_all = "camelCase")]
pub struct TodoPatch {
  #[serde(
    default,
    skip_serializing_if = "Option::is_none"
  )]
  pub text:         Option<String>,
  #[serde(
    default,
    skip_serializing_if = "Option::is_none"
  )]
  pub is_completed: Option<bool>
}

impl TodoDraft {
  pub fn validate(
    &self
  ) -> Result<(), ValidationError> {
    require("text", &self.text)
  }
}

impl TodoPatch {
  pub fn completion(done: bool) -> Self {
    Self {
      is_completed: Some(done),
      ..Self::default()
    }
  }

  pub fn validate(
    &self
  ) -> Result<(), ValidationError> {
    require_if_set(
      "text",
      self.text.as_ref()
    )
  }
}

impl Todo {
  pub fn from_draft(
    id: String,
    draft: TodoDraft
  ) -> Self {
    Self {
      id,
      text: draft.text,
      is_completed: false
    }
  }

  pub fn apply(
    &mut self,
    patch: TodoPatch
  ) {
    if let Some(text) = patch.text {
      self.text = text;
    }
    if let Some(done) =
      patch.is_completed
    {
      self.is_completed = done;
    }
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
pub struct QuickLink {
  pub id:    String,
  pub title: String,
  pub url:   String
}

#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  PartialEq,
  Eq,
)]
pub struct QuickLinkDraft {
  pub title: String,
  pub url:   String
}

#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  PartialEq,
  Eq,
  Default,
)]
pub struct QuickLinkPatch {
  #[serde(
    default,
    skip_serializing_if = "Option::is_none"
  )]
  pub title: Option<String>,
  #[serde(
    default,
    skip_serializing_if = "Option::is_none"
  )]
  pub url:   Option<String>
}

impl QuickLinkDraft {
  pub fn validate(
    &self
  ) -> Result<(), ValidationError> {
    require("title", &self.title)?;
    normalize_url(&self.url).map(|_| ())
  }
}

impl QuickLinkPatch {
  pub fn validate(
    &self
  ) -> Result<(), ValidationError> {
    require_if_set(
      "title",
      self.title.as_ref()
    )?;
    if let Some(url) = &self.url {
      normalize_url(url)?;
    }
    Ok(())
  }
}

impl QuickLink {
  pub fn from_draft(
    id: String,
    draft: QuickLinkDraft
  ) -> Self {
    Self {
      id,
      title: draft.title,
      url: draft.url
    }
  }

  pub fn apply(
    &mut self,
    patch: QuickLinkPatch
  ) {
    if let Some(title) = patch.title {
      self.title = title;
    }
    if let Some(url) = patch.url {
      self.url = url;
    }
  }

  /// The stored url with a scheme, as
  /// it should be opened.
  pub fn href(&self) -> String {
    normalize_url(&self.url)
      .map(|url| url.to_string())
      .unwrap_or_else(|_| {
        self.url.clone()
      })
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
pub struct ImportantDate {
  pub id:   String,
  pub date: NaiveDate,
  pub text: String
}

#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  PartialEq,
  Eq,
)]
pub struct ImportantDateDraft {
  pub date: NaiveDate,
  pub text: String
}

#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  PartialEq,
  Eq,
  Default,
)]
pub struct ImportantDatePatch {
  #[serde(
    default,
    skip_serializing_if = "Option::is_none"
  )]
  pub date: Option<NaiveDate>,
  #[serde(
    default,
    skip_serializing_if = "Option::is_none"
  )]
  pub text: Option<String>
}

impl ImportantDateDraft {
  pub fn validate(
    &self
  ) -> Result<(), ValidationError> {
    require("text", &self.text)
  }
}

impl ImportantDatePatch {
  pub fn validate(
    &self
  ) -> Result<(), ValidationError> {
    require_if_set(
      "text",
      self.text.as_ref()
    )
  }
}

impl ImportantDate {
  pub fn from_draft(
    id: String,
    draft: ImportantDateDraft
  ) -> Self {
    Self {
      id,
      date: draft.date,
      text: draft.text
    }
  }

  pub fn apply(
    &mut self,
    patch: ImportantDatePatch
  ) {
    if let Some(date) = patch.date {
      self.date = date;
    }
    if let Some(text) = patch.text {
      self.text = text;
    }
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
  Default,
)]
#[serde(rename_all = "lowercase")]
pub enum Role {
  Admin,
  Editor,
  #[default]
  Guest
}

impl Role {
  /// Only the exact strings `admin` and
  /// `editor` grant rights.
  pub fn parse(raw: &str) -> Self {
    match raw {
      | "admin" => Role::Admin,
      | "editor" => Role::Editor,
      | _ => Role::Guest
    }
  }

  pub fn can_edit(self) -> bool {
    matches!(
      self,
      Role::Admin | Role::Editor
    )
  }

  pub fn as_str(self) -> &'static str {
    match self {
      | Role::Admin => "admin",
      | Role::Editor => "editor",
      | Role::Guest => "guest"
    }
  }
}

#[cfg(test)]
mod tests {
  use chrono::NaiveDate;
  use serde_json::json;

  use super::*;

  fn date(raw: &str) -> NaiveDate {
    NaiveDate::parse_from_str(
      raw, "%Y-%m-%d"
    )
    .expect("valid date")
  }

  #[test]
  fn mission_uses_camel_case_wire_names(
  ) {
    let mission = Mission {
      id:           "m1".to_string(),
      title:        "Galxe".to_string(),
      url:          "https://galxe.com"
        .to_string(),
      description:  String::new(),
      tags:         vec![
        "Yaping".to_string(),
      ],
      is_completed: true,
      logo:         None,
      end_date:     Some(date(
        "2024-07-01"
      )),
      referral_url: Some(
        "https://galxe.com/r/1"
          .to_string()
      )
    };

    let value =
      serde_json::to_value(&mission)
        .expect("serialize mission");
    assert_eq!(
      value["isCompleted"],
      json!(true)
    );
    assert_eq!(
      value["endDate"],
      json!("2024-07-01")
    );
    assert_eq!(
      value["referralUrl"],
      json!("https://galxe.com/r/1")
    );
    assert!(value.get("logo").is_none());
  }

  #[test]
  fn mission_decodes_without_optional_fields(
  ) {
    let mission: Mission =
      serde_json::from_value(json!({
        "id": "a",
        "title": "X",
        "url": "http://x"
      }))
      .expect("decode mission");
    assert!(!mission.is_completed);
    assert!(mission.tags.is_empty());
    assert_eq!(mission.end_date, None);
  }

  #[test]
  fn draft_requires_title_and_url() {
    let draft = MissionDraft {
      title: "  ".to_string(),
      url: "http://x".to_string(),
      ..MissionDraft::default()
    };
    assert_eq!(
      draft.validate(),
      Err(ValidationError::Required(
        "title"
      ))
    );

    let draft = MissionDraft {
      title: "X".to_string(),
      ..MissionDraft::default()
    };
    assert_eq!(
      draft.validate(),
      Err(ValidationError::Required("url"))
    );
  }

  #[test]
  fn patch_serializes_only_touched_fields(
  ) {
    let patch = MissionPatch {
      logo: Some(None),
      ..MissionPatch::completion(true)
    };
    let value =
      serde_json::to_value(&patch)
        .expect("serialize patch");
    assert_eq!(
      value,
      json!({
        "isCompleted": true,
        "logo": null
      })
    );
  }

  #[test]
  fn apply_patch_clears_optional_fields(
  ) {
    let mut mission = Mission::from_draft(
      "id".to_string(),
      MissionDraft {
        title: "X".to_string(),
        url: "http://x".to_string(),
        end_date: Some(date(
          "2024-01-01"
        )),
        ..MissionDraft::default()
      }
    );
    mission.apply(MissionPatch {
      end_date: Some(None),
      title: Some("Y".to_string()),
      ..MissionPatch::default()
    });
    assert_eq!(mission.title, "Y");
    assert_eq!(mission.end_date, None);
    assert_eq!(mission.url, "http://x");
  }

  #[test]
  fn parses_tag_input() {
    assert_eq!(
      parse_tags(
        " Yaping, airdrop ,, daily "
      ),
      vec!["Yaping", "airdrop", "daily"]
    );
    assert!(parse_tags(" , ").is_empty());
  }

  #[test]
  fn normalizes_bare_hosts() {
    let url = normalize_url("example.com")
      .expect("bare host");
    assert_eq!(
      url.as_str(),
      "https://example.com/"
    );

    let url =
      normalize_url("http://a.b/c")
        .expect("full url");
    assert_eq!(url.scheme(), "http");

    assert!(matches!(
      normalize_url("exa mple.com"),
      Err(
        ValidationError::InvalidUrl { .. }
      )
    ));
  }

  #[test]
  fn quick_link_draft_checks_url() {
    let ok = QuickLinkDraft {
      title: "Docs".to_string(),
      url:   "docs.rs".to_string()
    };
    assert!(ok.validate().is_ok());

    let missing = QuickLinkDraft {
      title: "Docs".to_string(),
      url:   String::new()
    };
    assert_eq!(
      missing.validate(),
      Err(ValidationError::Required("url"))
    );
  }

  #[test]
  fn deadline_counts_calendar_days() {
    let today = date("2024-06-01");
    let mut mission = Mission::from_draft(
      "id".to_string(),
      MissionDraft {
        title: "X".to_string(),
        url: "http://x".to_string(),
        ..MissionDraft::default()
      }
    );
    assert_eq!(
      mission.deadline(today),
      None
    );

    mission.end_date =
      Some(date("2024-05-29"));
    assert_eq!(
      mission.deadline(today),
      Some(Deadline::Ended {
        days_ago: 3
      })
    );

    mission.end_date =
      Some(date("2024-06-01"));
    assert_eq!(
      mission.deadline(today),
      Some(Deadline::EndsToday)
    );

    mission.end_date =
      Some(date("2024-06-04"));
    let deadline = mission
      .deadline(today)
      .expect("deadline");
    assert_eq!(
      deadline,
      Deadline::Left { days: 3 }
    );
    assert!(deadline.is_urgent());

    mission.end_date =
      Some(date("2024-06-10"));
    assert!(
      !mission
        .deadline(today)
        .expect("deadline")
        .is_urgent()
    );
  }

  #[test]
  fn tag_match_ignores_case() {
    let mut mission = Mission::from_draft(
      "id".to_string(),
      MissionDraft {
        title: "X".to_string(),
        url: "http://x".to_string(),
        ..MissionDraft::default()
      }
    );
    mission.tags =
      vec!["YAPING".to_string()];
    assert!(
      mission.has_tag(DEFAULT_PINNED_TAG)
    );
    assert!(!mission.has_tag("airdrop"));
  }

  #[test]
  fn unknown_roles_are_guests() {
    assert_eq!(
      Role::parse("admin"),
      Role::Admin
    );
    assert_eq!(
      Role::parse("Admin"),
      Role::Guest
    );
    assert_eq!(
      Role::parse(" editor "),
      Role::Guest
    );
    assert_eq!(
      Role::parse("editor"),
      Role::Editor
    );
    assert_eq!(
      Role::parse("owner"),
      Role::Guest
    );
    assert!(Role::Editor.can_edit());
    assert!(!Role::Guest.can_edit());
  }
}
