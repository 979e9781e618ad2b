//! Fixed-size batching of newly accepted links

use std::num::NonZeroUsize;

/// Split `items` into consecutive batches of `size` elements
///
/// Order is preserved and nothing is dropped: concatenating the batches gives
/// back `items`. Every batch except the last holds exactly `size` elements;
/// the last holds between 1 and `size`. Empty input yields no batches.
#[must_use]
pub fn chunk<T: Clone>(items: &[T], size: NonZeroUsize) -> Vec<Vec<T>> {
    items.chunks(size.get()).map(<[T]>::to_vec).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn size(n: usize) -> NonZeroUsize {
        NonZeroUsize::new(n).unwrap()
    }

    #[test]
    fn test_short_tail() {
        let batches = chunk(&[1, 2, 3, 4, 5], size(2));
        assert_eq!(batches, vec![vec![1, 2], vec![3, 4], vec![5]]);
    }

    #[test]
    fn test_exact_multiple() {
        let batches = chunk(&["a", "b", "c", "d"], size(2));
        assert_eq!(batches, vec![vec!["a", "b"], vec!["c", "d"]]);
    }

    #[test]
    fn test_empty_input() {
        assert!(chunk::<String>(&[], size(40)).is_empty());
    }

    #[test]
    fn test_size_larger_than_input() {
        let batches = chunk(&["a", "b", "c"], size(40));
        assert_eq!(batches, vec![vec!["a", "b", "c"]]);
    }
}
