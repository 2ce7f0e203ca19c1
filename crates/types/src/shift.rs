//! Shifts and shift transitions.
//!
//! A [`ShiftTag`] names the hand-off between an outgoing and an incoming shift
//! (for example `Night→Day`). Action items are stamped with the tag of the
//! transition that created them, and ownership rules compare against the tag
//! of the session currently in progress.

use crate::TextError;
use std::fmt;
use std::str::FromStr;

/// A clinical shift.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Shift {
    Day,
    Evening,
    Night,
}

impl Shift {
    /// The shift that follows this one in the Day → Evening → Night rotation.
    pub fn following(self) -> Self {
        match self {
            Shift::Day => Shift::Evening,
            Shift::Evening => Shift::Night,
            Shift::Night => Shift::Day,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Shift::Day => "Day",
            Shift::Evening => "Evening",
            Shift::Night => "Night",
        }
    }
}

impl fmt::Display for Shift {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Shift {
    type Err = TextError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "day" => Ok(Shift::Day),
            "evening" => Ok(Shift::Evening),
            "night" => Ok(Shift::Night),
            _ => Err(TextError::InvalidShift(s.to_string())),
        }
    }
}

/// Identifies a shift-to-shift transition, displayed as `From→To`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ShiftTag {
    from: Shift,
    to: Shift,
}

impl ShiftTag {
    /// Creates a transition between two distinct shifts.
    pub fn new(from: Shift, to: Shift) -> Result<Self, TextError> {
        if from == to {
            return Err(TextError::InvalidShift(format!(
                "a transition needs two different shifts, got {from}→{to}"
            )));
        }
        Ok(Self { from, to })
    }

    /// The transition starting where `outgoing` ends, following the rotation.
    pub fn starting(outgoing: Shift) -> Self {
        Self {
            from: outgoing,
            to: outgoing.following(),
        }
    }

    pub fn from(&self) -> Shift {
        self.from
    }

    pub fn to(&self) -> Shift {
        self.to
    }

    /// The next transition in the rotation (`Night→Day` becomes `Day→Evening`).
    pub fn following(&self) -> Self {
        Self::starting(self.to)
    }
}

impl fmt::Display for ShiftTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}→{}", self.from, self.to)
    }
}

impl FromStr for ShiftTag {
    type Err = TextError;

    /// Accepts `Night→Day` and the ASCII spelling `Night->Day`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (from, to) = s
            .split_once('→')
            .or_else(|| s.split_once("->"))
            .ok_or_else(|| TextError::InvalidShift(s.to_string()))?;
        ShiftTag::new(from.parse()?, to.parse()?)
    }
}

impl serde::Serialize for ShiftTag {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> serde::Deserialize<'de> for ShiftTag {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
