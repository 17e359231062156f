//! UID sets for UID commands.

use super::Uid;

/// UID set as sent in `UID FETCH` and `UID STORE`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UidSet {
    /// Single UID.
    Single(Uid),
    /// Range of UIDs (inclusive).
    Range(Uid, Uid),
    /// Range from start to highest UID.
    RangeFrom(Uid),
    /// Multiple UID specifications.
    Set(Vec<Self>),
}

impl UidSet {
    /// Creates a UID set from a single UID.
    #[must_use]
    pub fn single(uid: Uid) -> Self {
        Self::Single(uid)
    }

    /// Builds the shortest set covering `uids`, collapsing consecutive runs.
    ///
    /// Returns `None` for an empty slice. Input order and duplicates do not
    /// matter.
    #[must_use]
    pub fn from_uids(uids: &[Uid]) -> Option<Self> {
        let mut sorted = uids.to_vec();
        sorted.sort_unstable();
        sorted.dedup();

        let mut parts = Vec::new();
        let mut iter = sorted.into_iter();
        let mut start = iter.next()?;
        let mut end = start;

        for uid in iter {
            if end.get().checked_add(1) == Some(uid.get()) {
                end = uid;
            } else {
                parts.push(Self::run(start, end));
                start = uid;
                end = uid;
            }
        }
        parts.push(Self::run(start, end));

        if parts.len() == 1 {
            parts.pop()
        } else {
            Some(Self::Set(parts))
        }
    }

    fn run(start: Uid, end: Uid) -> Self {
        if start == end {
            Self::Single(start)
        } else {
            Self::Range(start, end)
        }
    }
}

impl std::fmt::Display for UidSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Single(n) => write!(f, "{n}"),
            Self::Range(start, end) => write!(f, "{start}:{end}"),
            Self::RangeFrom(start) => write!(f, "{start}:*"),
            Self::Set(items) => {
                let s: Vec<_> = items.iter().map(ToString::to_string).collect();
                write!(f, "{}", s.join(","))
            }
        }
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn uids(values: &[u32]) -> Vec<Uid> {
        values.iter().map(|&v| Uid::new(v).unwrap()).collect()
    }

    #[test]
    fn empty_is_none() {
        assert!(UidSet::from_uids(&[]).is_none());
    }

    #[test]
    fn single_and_range() {
        assert_eq!(UidSet::from_uids(&uids(&[9])).unwrap().to_string(), "9");
        assert_eq!(UidSet::from_uids(&uids(&[3, 4, 5])).unwrap().to_string(), "3:5");
        assert_eq!(UidSet::RangeFrom(Uid::new(7).unwrap()).to_string(), "7:*");
    }

    #[test]
    fn collapses_runs_out_of_order() {
        let set = UidSet::from_uids(&uids(&[10, 2, 3, 1, 12, 11, 20, 3])).unwrap();
        assert_eq!(set.to_string(), "1:3,10:12,20");
    }

    proptest! {
        #[test]
        fn covers_exactly_the_input(values in proptest::collection::btree_set(1u32..500, 1..60)) {
            let input: Vec<Uid> = values.iter().map(|&v| Uid::new(v).unwrap()).collect();
            let rendered = UidSet::from_uids(&input).unwrap().to_string();

            let mut expanded = Vec::new();
            for part in rendered.split(',') {
                match part.split_once(':') {
                    Some((a, b)) => {
                        let (a, b): (u32, u32) = (a.parse().unwrap(), b.parse().unwrap());
                        expanded.extend(a..=b);
                    }
                    None => expanded.push(part.parse::<u32>().unwrap()),
                }
            }

            let expected: Vec<u32> = values.into_iter().collect();
            prop_assert_eq!(expanded, expected);
        }
    }
}
