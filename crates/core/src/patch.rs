//! Tri-state field patches.
//!
//! A change request carries a sparse set of field edits. Each field is a
//! [`Patch`]: absent from the payload (leave the destination untouched),
//! explicitly cleared, or set to a new value. Keeping "clear" distinct from
//! "absent" matters for fields whose zero value is legal (an entry fee of 0).
//!
//! JSON mapping: key absent = `Unchanged`, `null` = `Clear`, value = `Set`.
//! Fields must be declared with
//! `#[serde(default, skip_serializing_if = "Patch::is_unchanged")]`.

use serde::{Deserialize, Deserializer, Serialize, Serializer};

#[derive(Debug, Clone, PartialEq)]
pub enum Patch<T> {
    Unchanged,
    Clear,
    Set(T),
}

impl<T> Default for Patch<T> {
    fn default() -> Self {
        Self::Unchanged
    }
}

impl<T> Patch<T> {
    pub fn is_unchanged(&self) -> bool {
        matches!(self, Self::Unchanged)
    }

    pub fn as_set(&self) -> Option<&T> {
        match self {
            Self::Set(value) => Some(value),
            _ => None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Patch<U> {
        match self {
            Self::Unchanged => Patch::Unchanged,
            Self::Clear => Patch::Clear,
            Self::Set(value) => Patch::Set(f(value)),
        }
    }
}

impl<T: Clone> Patch<T> {
    /// Merge this patch into an optional target. `Unchanged` leaves the
    /// target exactly as it was.
    pub fn apply_to(&self, target: &mut Option<T>) {
        match self {
            Self::Unchanged => {}
            Self::Clear => *target = None,
            Self::Set(value) => *target = Some(value.clone()),
        }
    }

    /// The value this patch would produce on top of `current`.
    pub fn resolve(&self, current: Option<&T>) -> Option<T> {
        match self {
            Self::Unchanged => current.cloned(),
            Self::Clear => None,
            Self::Set(value) => Some(value.clone()),
        }
    }
}

impl Patch<String> {
    /// Trim a text patch; whitespace-only values become `Clear`.
    pub fn trimmed(self) -> Self {
        match self {
            Self::Set(value) => {
                let trimmed = value.trim();
                if trimmed.is_empty() {
                    Self::Clear
                } else {
                    Self::Set(trimmed.to_string())
                }
            }
            other => other,
        }
    }
}

impl<T> From<Option<T>> for Patch<T> {
    /// `None` means "not supplied", never "clear".
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Unchanged, Self::Set)
    }
}

impl<T: Serialize> Serialize for Patch<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Set(value) => value.serialize(serializer),
            Self::Unchanged | Self::Clear => serializer.serialize_none(),
        }
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for Patch<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Option::<T>::deserialize(deserializer).map(|value| value.map_or(Self::Clear, Self::Set))
    }
}
