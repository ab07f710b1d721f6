use std::collections::HashSet;

use crate::sqlite::Row;

/// Order-insensitive set equality over rows, with duplicates collapsed.
#[must_use]
pub fn matches(predicted: &[Row], gold: &[Row]) -> bool {
    let predicted = predicted.iter().collect::<HashSet<_>>();
    let gold = gold.iter().collect::<HashSet<_>>();
    predicted == gold
}

#[must_use]
pub fn distinct_row_counts(predicted: &[Row], gold: &[Row]) -> (usize, usize) {
    (
        predicted.iter().collect::<HashSet<_>>().len(),
        gold.iter().collect::<HashSet<_>>().len(),
    )
}
