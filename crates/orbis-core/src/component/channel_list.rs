//! Channel index lists for audio connections.

use std::fmt;
use std::ops::Range;
use std::str::FromStr;

/// Arithmetic range of channel indices, `start..end` stepping by `step`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelRange {
    start: usize,
    end: usize,
    step: usize,
}

impl ChannelRange {
    /// Contiguous range `start..end`.
    pub fn new(start: usize, end: usize) -> Self {
        Self {
            start,
            end,
            step: 1,
        }
    }

    /// Range `start..end` with a stride. A zero step is treated as 1.
    pub fn with_step(start: usize, end: usize, step: usize) -> Self {
        Self {
            start,
            end,
            step: step.max(1),
        }
    }

    /// Iterates over the indices.
    pub fn iter(&self) -> impl Iterator<Item = usize> + use<> {
        (self.start..self.end).step_by(self.step)
    }

    /// Number of indices.
    pub fn len(&self) -> usize {
        if self.end <= self.start {
            0
        } else {
            (self.end - self.start).div_ceil(self.step)
        }
    }

    /// True if the range holds no index.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Ordered list of channel indices.
///
/// Built from ranges, arrays, vectors or a textual form:
///
/// ```
/// use orbis_core::ChannelList;
///
/// let list: ChannelList = "0:3, 7, 8:14:2".parse().unwrap();
/// assert_eq!(list.as_slice(), &[0, 1, 2, 7, 8, 10, 12]);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ChannelList(Vec<usize>);

impl ChannelList {
    /// Creates a list from explicit indices.
    pub fn new(indices: Vec<usize>) -> Self {
        Self(indices)
    }

    /// All channels of a port of the given width.
    pub fn all(width: usize) -> Self {
        Self((0..width).collect())
    }

    /// Appends the indices of a range.
    pub fn push_range(&mut self, range: ChannelRange) {
        self.0.extend(range.iter());
    }

    /// Number of indices.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True if the list is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Largest index, if any.
    pub fn max_index(&self) -> Option<usize> {
        self.0.iter().copied().max()
    }

    /// The indices.
    pub fn as_slice(&self) -> &[usize] {
        &self.0
    }

    /// Iterates over the indices.
    pub fn iter(&self) -> std::iter::Copied<std::slice::Iter<'_, usize>> {
        self.0.iter().copied()
    }
}

impl From<ChannelRange> for ChannelList {
    fn from(range: ChannelRange) -> Self {
        Self(range.iter().collect())
    }
}

impl From<Range<usize>> for ChannelList {
    fn from(range: Range<usize>) -> Self {
        Self(range.collect())
    }
}

impl From<Vec<usize>> for ChannelList {
    fn from(indices: Vec<usize>) -> Self {
        Self(indices)
    }
}

impl From<&[usize]> for ChannelList {
    fn from(indices: &[usize]) -> Self {
        Self(indices.to_vec())
    }
}

impl<const N: usize> From<[usize; N]> for ChannelList {
    fn from(indices: [usize; N]) -> Self {
        Self(indices.to_vec())
    }
}

impl From<usize> for ChannelList {
    fn from(index: usize) -> Self {
        Self(vec![index])
    }
}

impl<'a> IntoIterator for &'a ChannelList {
    type Item = usize;
    type IntoIter = std::iter::Copied<std::slice::Iter<'a, usize>>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl fmt::Display for ChannelList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, idx) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{idx}")?;
        }
        Ok(())
    }
}

/// Error parsing a textual channel list.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid channel list element \"{0}\"")]
pub struct ParseChannelListError(String);

impl FromStr for ChannelList {
    type Err = ParseChannelListError;

    /// Parses comma-separated elements: `i`, `start:end` or `start:end:step`
    /// (end exclusive).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut list = Self::default();
        for element in s.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            let parts = element
                .split(':')
                .map(|p| p.trim().parse::<usize>())
                .collect::<Result<Vec<_>, _>>()
                .map_err(|_| ParseChannelListError(element.to_owned()))?;
            match parts.as_slice() {
                [idx] => list.0.push(*idx),
                [start, end] => list.push_range(ChannelRange::new(*start, *end)),
                [start, end, step] if *step > 0 => {
                    list.push_range(ChannelRange::with_step(*start, *end, *step));
                }
                _ => return Err(ParseChannelListError(element.to_owned())),
            }
        }
        Ok(list)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn range_length_with_step() {
        assert_eq!(ChannelRange::with_step(0, 10, 3).len(), 4);
        assert_eq!(ChannelRange::new(5, 5).len(), 0);
        assert!(ChannelRange::new(6, 2).is_empty());
        let l: ChannelList = ChannelRange::with_step(1, 8, 2).into();
        assert_eq!(l.as_slice(), &[1, 3, 5, 7]);
    }

    #[test]
    fn parse_mixed_elements() {
        let l: ChannelList = "4, 0:2".parse().unwrap();
        assert_eq!(l.as_slice(), &[4, 0, 1]);
        assert_eq!(l.max_index(), Some(4));
        assert_eq!(l.to_string(), "4, 0, 1");
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!("1:x".parse::<ChannelList>().is_err());
        assert!("0:4:0".parse::<ChannelList>().is_err());
        assert!("1:2:3:4".parse::<ChannelList>().is_err());
    }

    #[test]
    fn empty_string_is_empty_list() {
        let l: ChannelList = "".parse().unwrap();
        assert!(l.is_empty());
    }
}
