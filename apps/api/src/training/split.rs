//! Seeded stratified train/test split.

use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::errors::ModelError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Split {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

/// Splits row indices so every class lands in both partitions.
///
/// The test size is `ceil(n * test_fraction)`, distributed over classes in
/// proportion to their counts (largest remainder), with at least one test and
/// one train row per class. Classes with fewer than two rows are rejected.
pub fn stratified_split(
    y: &[usize],
    n_classes: usize,
    test_fraction: f64,
    seed: u64,
) -> Result<Split, ModelError> {
    if !(test_fraction > 0.0 && test_fraction < 1.0) {
        return Err(ModelError::Schema(format!(
            "test fraction must be in (0, 1), got {test_fraction}"
        )));
    }

    let mut members: Vec<Vec<usize>> = vec![Vec::new(); n_classes];
    for (row, &class) in y.iter().enumerate() {
        if class >= n_classes {
            return Err(ModelError::Schema(format!(
                "class index {class} out of range for {n_classes} classes"
            )));
        }
        members[class].push(row);
    }
    let present: Vec<usize> = (0..n_classes).filter(|&c| !members[c].is_empty()).collect();
    if let Some(&c) = present.iter().find(|&&c| members[c].len() < 2) {
        return Err(ModelError::InsufficientData(format!(
            "class {c} has {} sample(s); stratified split needs at least 2",
            members[c].len()
        )));
    }

    let n = y.len();
    let k = present.len();
    let wanted = (n as f64 * test_fraction).ceil() as usize;
    let test_total = wanted.clamp(k, n - k);

    // floor share per class, clamped to [1, count - 1]
    let mut quota = vec![0usize; n_classes];
    let mut remainder = vec![0.0f64; n_classes];
    for &c in &present {
        let exact = members[c].len() as f64 * test_total as f64 / n as f64;
        quota[c] = (exact.floor() as usize).clamp(1, members[c].len() - 1);
        remainder[c] = exact - quota[c] as f64;
    }

    let mut assigned: usize = quota.iter().sum();
    while assigned < test_total {
        let Some(c) = present
            .iter()
            .copied()
            .filter(|&c| quota[c] < members[c].len() - 1)
            .max_by(|&a, &b| remainder[a].total_cmp(&remainder[b]).then(b.cmp(&a)))
        else {
            break;
        };
        quota[c] += 1;
        remainder[c] -= 1.0;
        assigned += 1;
    }
    while assigned > test_total {
        let Some(c) = present
            .iter()
            .copied()
            .filter(|&c| quota[c] > 1)
            .min_by(|&a, &b| remainder[a].total_cmp(&remainder[b]).then(a.cmp(&b)))
        else {
            break;
        };
        quota[c] -= 1;
        remainder[c] += 1.0;
        assigned -= 1;
    }

    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut train = Vec::with_capacity(n - assigned);
    let mut test = Vec::with_capacity(assigned);
    for &c in &present {
        let mut rows = members[c].clone();
        rows.shuffle(&mut rng);
        test.extend_from_slice(&rows[..quota[c]]);
        train.extend_from_slice(&rows[quota[c]..]);
    }
    train.sort_unstable();
    test.sort_unstable();

    Ok(Split { train, test })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(counts: &[usize]) -> Vec<usize> {
        counts
            .iter()
            .enumerate()
            .flat_map(|(class, &n)| std::iter::repeat(class).take(n))
            .collect()
    }

    #[test]
    fn test_every_class_in_both_partitions() {
        let y = labels(&[50, 30, 2]);
        let split = stratified_split(&y, 3, 0.2, 42).unwrap();
        for class in 0..3 {
            assert!(split.test.iter().any(|&i| y[i] == class));
            assert!(split.train.iter().any(|&i| y[i] == class));
        }
        assert_eq!(split.train.len() + split.test.len(), y.len());
    }

    #[test]
    fn test_test_size_is_ceiling_of_fraction() {
        let y = labels(&[40, 40, 21]);
        let split = stratified_split(&y, 3, 0.2, 7).unwrap();
        // ceil(101 * 0.2) = 21
        assert_eq!(split.test.len(), 21);
    }

    #[test]
    fn test_partitions_are_disjoint() {
        let y = labels(&[10, 10]);
        let split = stratified_split(&y, 2, 0.3, 1).unwrap();
        assert!(split.test.iter().all(|i| !split.train.contains(i)));
    }

    #[test]
    fn test_same_seed_same_split() {
        let y = labels(&[20, 15, 9]);
        assert_eq!(
            stratified_split(&y, 3, 0.25, 42).unwrap(),
            stratified_split(&y, 3, 0.25, 42).unwrap()
        );
    }

    #[test]
    fn test_singleton_class_is_insufficient_data() {
        let y = labels(&[10, 1]);
        assert!(matches!(
            stratified_split(&y, 2, 0.2, 42),
            Err(ModelError::InsufficientData(_))
        ));
    }

    #[test]
    fn test_fraction_out_of_range_rejected() {
        let y = labels(&[5, 5]);
        assert!(stratified_split(&y, 2, 0.0, 42).is_err());
        assert!(stratified_split(&y, 2, 1.0, 42).is_err());
    }
}
