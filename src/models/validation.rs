//! Shared validation and ordering contracts
//!
//! Every entity stored in a [`Music`](super::Music) container implements
//! [`Validate`]; every time-stamped one also implements [`Timed`]. The list
//! helpers here are what the container and tracks use to check or prune a
//! whole sequence at once.

use crate::error::Result;

/// Integer time position in ticks (1 / `beat_resolution` of a quarter note)
pub type Time = u64;

/// Structural validation of a single value
pub trait Validate {
    /// Return an error describing the first broken rule
    fn validate(&self) -> Result<()>;

    fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }
}

/// Anything that sits at a position on the time axis
pub trait Timed {
    fn time(&self) -> Time;
}

/// Validate every element of a list, reporting the failing index
///
/// `field` is the attribute name used in the error path, e.g. `tempos`
/// yields `tempos[3]`.
pub fn validate_list<T: Validate>(items: &[T], field: &str) -> Result<()> {
    for (index, item) in items.iter().enumerate() {
        item.validate()
            .map_err(|e| e.nested(&format!("{}[{}]", field, index)))?;
    }
    Ok(())
}

/// Drop every element that fails validation, returning how many were removed
pub fn remove_invalid_from_list<T: Validate>(items: &mut Vec<T>) -> usize {
    let before = items.len();
    items.retain(|item| item.is_valid());
    before - items.len()
}

/// Stable sort by time
pub fn sort_by_time<T: Timed>(items: &mut [T]) {
    items.sort_by_key(|item| item.time());
}

/// Latest time in a list: last element when sorted, full scan otherwise
pub fn last_time<T: Timed>(items: &[T], is_sorted: bool) -> Option<Time> {
    if is_sorted {
        items.last().map(|item| item.time())
    } else {
        items.iter().map(|item| item.time()).max()
    }
}
