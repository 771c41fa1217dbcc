use chrono::{DateTime, Datelike, Timelike, Utc};

use driftlog_core::{FeatureRow, FieldValue};

use super::Transform;

const WORK_START_HOUR: u32 = 9;
const WORK_END_HOUR: u32 = 18;

/// `hour`, `day_of_week` (0 = Monday), `is_weekend`, `is_working_hour`.
///
/// Rows without a parseable timestamp get zeros.
pub struct TimeEncoder {
    column: String,
}

impl TimeEncoder {
    pub fn new(column: &str) -> Self {
        Self {
            column: column.to_string(),
        }
    }
}

fn parse(value: Option<FieldValue>) -> Option<DateTime<Utc>> {
    match value? {
        FieldValue::Text(s) => DateTime::parse_from_rfc3339(&s)
            .ok()
            .map(|dt| dt.with_timezone(&Utc)),
        FieldValue::Integer(epoch) => DateTime::<Utc>::from_timestamp(epoch, 0),
        _ => None,
    }
}

impl Transform for TimeEncoder {
    fn name(&self) -> &str {
        "time"
    }

    fn apply(&self, rows: &mut [FeatureRow]) {
        for row in rows.iter_mut() {
            let (hour, dow, weekend, working) = match parse(row.column(&self.column)) {
                Some(ts) => {
                    let hour = ts.hour();
                    let dow = ts.weekday().num_days_from_monday();
                    (
                        hour as i64,
                        dow as i64,
                        dow >= 5,
                        (WORK_START_HOUR..=WORK_END_HOUR).contains(&hour),
                    )
                }
                None => (0, 0, false, false),
            };
            row.set("hour", hour);
            row.set("day_of_week", dow);
            row.set("is_weekend", weekend);
            row.set("is_working_hour", working);
        }
    }
}
