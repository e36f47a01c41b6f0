use anyhow::{
  Context,
  anyhow
};
use chrono::{
  DateTime,
  Datelike,
  Duration,
  Local,
  NaiveDate,
  Utc,
  Weekday
};
use chrono_tz::Tz;

/// Decides what "today" is. Without a
/// configured zone the machine's local
/// time is used.
#[derive(Debug, Clone, Copy, Default)]
pub struct Clock {
  zone: Option<Tz>
}

impl Clock {
  /// Parses an IANA zone id such as
  /// `Europe/Berlin`.
  pub fn from_zone_name(
    raw: &str
  ) -> anyhow::Result<Self> {
    let trimmed = raw.trim();
    let zone =
      trimmed.parse::<Tz>().map_err(
        |err| {
          anyhow!(
            "unknown timezone \
             {trimmed:?}: {err}"
          )
        }
      )?;
    tracing::info!(
      timezone = %trimmed,
      "configured timezone"
    );
    Ok(Self { zone: Some(zone) })
  }

  pub fn zone(&self) -> Option<Tz> {
    self.zone
  }

  #[must_use]
  pub fn date_at(
    &self,
    now: DateTime<Utc>
  ) -> NaiveDate {
    match self.zone {
      | Some(zone) => {
        now
          .with_timezone(&zone)
          .date_naive()
      }
      | None => {
        now
          .with_timezone(&Local)
          .date_naive()
      }
    }
  }

  #[must_use]
  pub fn today(&self) -> NaiveDate {
    self.date_at(Utc::now())
  }
}

/// Accepts `YYYY-MM-DD`, `today`,
/// `tomorrow`, `yesterday`, a weekday
/// name (next occurrence) or an offset
/// like `+3d` / `2w`.
pub fn parse_date_expr(
  input: &str,
  today: NaiveDate
) -> anyhow::Result<NaiveDate> {
  let token = input.trim();
  let lower =
    token.to_ascii_lowercase();

  match lower.as_str() {
    | "today" => return Ok(today),
    | "tomorrow" => {
      return shift(today, 1);
    }
    | "yesterday" => {
      return shift(today, -1);
    }
    | _ => {}
  }

  if let Some(weekday) =
    parse_weekday_name(&lower)
  {
    return Ok(next_weekday_date(
      today, weekday
    ));
  }

  if let Some(days) =
    parse_offset(&lower)?
  {
    return shift(today, days);
  }

  NaiveDate::parse_from_str(
    token, "%Y-%m-%d"
  )
  .with_context(|| {
    format!(
      "unrecognized date {token:?}; \
       expected YYYY-MM-DD"
    )
  })
}

fn shift(
  from: NaiveDate,
  days: i64
) -> anyhow::Result<NaiveDate> {
  from
    .checked_add_signed(Duration::days(
      days
    ))
    .ok_or_else(|| {
      anyhow!(
        "date offset of {days} days \
         is out of range"
      )
    })
}

fn parse_offset(
  token: &str
) -> anyhow::Result<Option<i64>> {
  let body = token
    .strip_prefix('+')
    .unwrap_or(token);
  let (digits, per_unit) =
    if let Some(digits) =
      body.strip_suffix('d')
    {
      (digits, 1)
    } else if let Some(digits) =
      body.strip_suffix('w')
    {
      (digits, 7)
    } else {
      return Ok(None);
    };

  if digits.is_empty()
    || !digits
      .chars()
      .all(|c| c.is_ascii_digit())
  {
    return Ok(None);
  }

  let count: i64 =
    digits.parse().with_context(
      || format!("offset {token:?} too large")
    )?;
  Ok(Some(count * per_unit))
}

fn parse_weekday_name(
  token: &str
) -> Option<Weekday> {
  match token {
    | "monday" | "mon" => {
      Some(Weekday::Mon)
    }
    | "tuesday" | "tue" | "tues" => {
      Some(Weekday::Tue)
    }
    | "wednesday" | "wed" => {
      Some(Weekday::Wed)
    }
    | "thursday" | "thu" | "thur"
    | "thurs" => Some(Weekday::Thu),
    | "friday" | "fri" => {
      Some(Weekday::Fri)
    }
    | "saturday" | "sat" => {
      Some(Weekday::Sat)
    }
    | "sunday" | "sun" => {
      Some(Weekday::Sun)
    }
    | _ => None
  }
}

fn next_weekday_date(
  from: NaiveDate,
  target: Weekday
) -> NaiveDate {
  let from_idx = from
    .weekday()
    .num_days_from_monday()
    as i64;
  let target_idx = target
    .num_days_from_monday()
    as i64;
  let mut delta =
    (7 + target_idx - from_idx) % 7;
  if delta == 0 {
    delta = 7;
  }
  from
    .checked_add_signed(Duration::days(
      delta
    ))
    .unwrap_or(from)
}
