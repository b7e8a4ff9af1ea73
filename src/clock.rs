use chrono::{Local, NaiveDateTime};

pub const FAKETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Source of "now" handed to every engine operation.
#[derive(Debug, Clone, Copy)]
pub enum Clock {
    System,
    /// Frozen at a fixed local time, set through `FAKETIME`.
    Fixed(NaiveDateTime),
}

impl Clock {
    pub fn now(&self) -> NaiveDateTime {
        match self {
            Clock::System => Local::now().naive_local(),
            Clock::Fixed(at) => *at,
        }
    }

    pub fn parse_faketime(value: &str) -> Result<Self, chrono::ParseError> {
        NaiveDateTime::parse_from_str(value, FAKETIME_FORMAT).map(Clock::Fixed)
    }
}
