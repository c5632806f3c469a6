use anyhow::anyhow;
use chrono::NaiveDate;

const WIRE_FORMAT: &str = "%Y-%m-%d";
const DISPLAY_FORMAT: &str =
  "%d-%m-%Y";

/// Parses a due date typed by the
/// user: ISO `YYYY-MM-DD` or the
/// `DD-MM-YYYY` form the list shows.
pub fn parse_due_arg(
  raw: &str
) -> anyhow::Result<NaiveDate> {
  let trimmed = raw.trim();
  NaiveDate::parse_from_str(
    trimmed,
    WIRE_FORMAT
  )
  .or_else(|_| {
    NaiveDate::parse_from_str(
      trimmed,
      DISPLAY_FORMAT
    )
  })
  .map_err(|_| {
    anyhow!(
      "invalid due date '{trimmed}': \
       expected YYYY-MM-DD or \
       DD-MM-YYYY"
    )
  })
}

pub fn format_due(
  date: NaiveDate
) -> String {
  date
    .format(DISPLAY_FORMAT)
    .to_string()
}

/// Reads the leading date of a wire
/// value; servers may hand back a full
/// timestamp.
fn parse_wire_date(
  raw: &str
) -> Result<NaiveDate, chrono::ParseError>
{
  let head = raw
    .trim()
    .get(..10)
    .unwrap_or(raw.trim());
  NaiveDate::parse_from_str(
    head,
    WIRE_FORMAT
  )
}

pub mod due_date_serde {
  use chrono::NaiveDate;
  use serde::{
    Deserialize,
    Deserializer,
    Serializer
  };
  use tracing::warn;

  pub fn serialize<S>(
    date: &Option<NaiveDate>,
    serializer: S
  ) -> Result<S::Ok, S::Error>
  where
    S: Serializer
  {
    match date {
      | Some(value) => serializer
        .serialize_str(
          &value
            .format(super::WIRE_FORMAT)
            .to_string()
        ),
      | None => {
        serializer.serialize_none()
      }
    }
  }

  pub fn deserialize<'de, D>(
    deserializer: D
  ) -> Result<Option<NaiveDate>, D::Error>
  where
    D: Deserializer<'de>
  {
    let raw = Option::<String>::deserialize(
      deserializer
    )?;
    let Some(value) = raw
      .as_deref()
      .map(str::trim)
      .filter(|value| !value.is_empty())
    else {
      return Ok(None);
    };
    match super::parse_wire_date(value)
    {
      | Ok(date) => Ok(Some(date)),
      | Err(err) => {
        warn!(
          value,
          error = %err,
          "unreadable fecha_limite; \
           treating as no due date"
        );
        Ok(None)
      }
    }
  }
}
