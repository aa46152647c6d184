/// Ranking and top-N policy
///
/// Every "sorted by computed metric" result goes through here. Sorting is
/// stable: entries with equal metrics keep the order of the stage before.
use crate::error::{CatalogError, CatalogResult};
use serde::{Deserialize, Serialize};
use std::{cmp::Ordering, num::NonZeroUsize, str::FromStr};

/// Sort direction
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl FromStr for SortOrder {
    type Err = CatalogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "asc" => Ok(SortOrder::Asc),
            "desc" => Ok(SortOrder::Desc),
            _ => Err(CatalogError::InvalidArgument(
                "The 'order' parameter must be 'asc' or 'desc'".to_string(),
            )),
        }
    }
}

/// A validated top-N limit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TopLimit(NonZeroUsize);

impl TopLimit {
    pub fn new(limit: usize) -> CatalogResult<Self> {
        NonZeroUsize::new(limit).map(TopLimit).ok_or_else(|| {
            CatalogError::InvalidArgument("The 'limit' parameter must be a positive number".to_string())
        })
    }

    pub fn get(&self) -> usize {
        self.0.get()
    }
}

impl FromStr for TopLimit {
    type Err = CatalogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value: i64 = s.trim().parse().map_err(|_| {
            CatalogError::InvalidArgument("The 'limit' parameter must be a positive number".to_string())
        })?;
        TopLimit::new(usize::try_from(value).unwrap_or(0))
    }
}

/// Stable sort by a metric in the given direction
pub fn rank_by<T, M, F>(items: &mut [T], order: SortOrder, metric: F)
where
    M: PartialOrd,
    F: Fn(&T) -> M,
{
    items.sort_by(|a, b| {
        let ordering = metric(a).partial_cmp(&metric(b)).unwrap_or(Ordering::Equal);
        match order {
            SortOrder::Asc => ordering,
            SortOrder::Desc => ordering.reverse(),
        }
    });
}

/// Full sort, then keep the first `limit` entries
pub fn top_n<T, M, F>(mut items: Vec<T>, limit: TopLimit, metric: F) -> Vec<T>
where
    M: PartialOrd,
    F: Fn(&T) -> M,
{
    rank_by(&mut items, SortOrder::Desc, metric);
    items.truncate(limit.get());
    items
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sort_order_parsing() {
        assert_eq!("asc".parse::<SortOrder>().unwrap(), SortOrder::Asc);
        assert_eq!("desc".parse::<SortOrder>().unwrap(), SortOrder::Desc);
        assert!(matches!(
            "DESC".parse::<SortOrder>(),
            Err(CatalogError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_limit_must_be_positive_integer() {
        assert_eq!("3".parse::<TopLimit>().unwrap().get(), 3);
        assert!("0".parse::<TopLimit>().is_err());
        assert!("-2".parse::<TopLimit>().is_err());
        assert!("three".parse::<TopLimit>().is_err());
        assert!("2.5".parse::<TopLimit>().is_err());
    }

    #[test]
    fn test_rank_is_stable_on_ties() {
        // (label, metric): b and d tie, with distinguishable metrics around them
        let mut items = vec![("a", 1), ("b", 3), ("c", 5), ("d", 3), ("e", 2)];
        rank_by(&mut items, SortOrder::Desc, |item| item.1);
        let labels: Vec<&str> = items.iter().map(|i| i.0).collect();
        assert_eq!(labels, vec!["c", "b", "d", "e", "a"]);

        rank_by(&mut items, SortOrder::Asc, |item| item.1);
        let labels: Vec<&str> = items.iter().map(|i| i.0).collect();
        assert_eq!(labels, vec!["a", "e", "b", "d", "c"]);
    }

    #[test]
    fn test_top_n_takes_highest() {
        let items = vec![("w", 2.0), ("x", 5.0), ("y", 1.0), ("z", 4.0), ("v", 3.0)];
        let top = top_n(items, TopLimit::new(3).unwrap(), |item| item.1);
        assert_eq!(top, vec![("x", 5.0), ("z", 4.0), ("v", 3.0)]);
    }

    #[test]
    fn test_top_n_larger_than_input() {
        let top = top_n(vec![1, 2], TopLimit::new(10).unwrap(), |v| *v);
        assert_eq!(top, vec![2, 1]);
    }
}
