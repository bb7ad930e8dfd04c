//! Longest common subsequence over item slices.

/// Index pairs `(i, j)` of a longest common subsequence of `a` and `b`,
/// strictly increasing in both coordinates.
///
/// Common prefix and suffix runs are matched directly. A small middle is
/// solved with the classic dynamic-programming table; a large one is split
/// Hirschberg-style so memory stays linear in the input.
pub fn lcs_pairs<T: PartialEq>(a: &[T], b: &[T]) -> Vec<(usize, usize)> {
    let prefix = a.iter().zip(b).take_while(|(x, y)| x == y).count();
    let suffix = a[prefix..]
        .iter()
        .rev()
        .zip(b[prefix..].iter().rev())
        .take_while(|(x, y)| x == y)
        .count();

    let mid_a = &a[prefix..a.len() - suffix];
    let mid_b = &b[prefix..b.len() - suffix];

    let mut pairs: Vec<(usize, usize)> = (0..prefix).map(|i| (i, i)).collect();
    pairs.extend(
        split_pairs(mid_a, mid_b, TABLE_CELL_LIMIT)
            .into_iter()
            .map(|(i, j)| (i + prefix, j + prefix)),
    );
    let tail_a = a.len() - suffix;
    let tail_b = b.len() - suffix;
    pairs.extend((0..suffix).map(|k| (tail_a + k, tail_b + k)));
    pairs
}

/// Largest `n * m` solved with a full table (16 MiB of `u32` cells).
const TABLE_CELL_LIMIT: usize = 1 << 22;

fn split_pairs<T: PartialEq>(a: &[T], b: &[T], limit: usize) -> Vec<(usize, usize)> {
    let (n, m) = (a.len(), b.len());
    if n == 0 || m == 0 {
        return Vec::new();
    }
    if n == 1 || n.saturating_mul(m) <= limit {
        return table_pairs(a, b);
    }

    let mid = n / 2;
    let front = forward_lengths(&a[..mid], b);
    let back = backward_lengths(&a[mid..], b);
    let split = (0..=m)
        .max_by_key(|&j| (front[j] + back[j], std::cmp::Reverse(j)))
        .unwrap_or(0);

    let mut pairs = split_pairs(&a[..mid], &b[..split], limit);
    pairs.extend(
        split_pairs(&a[mid..], &b[split..], limit)
            .into_iter()
            .map(|(i, j)| (i + mid, j + split)),
    );
    pairs
}

/// `row[j]` = LCS length of `a` and `b[..j]`.
fn forward_lengths<T: PartialEq>(a: &[T], b: &[T]) -> Vec<u32> {
    let m = b.len();
    let mut prev = vec![0u32; m + 1];
    let mut row = vec![0u32; m + 1];
    for x in a {
        for j in 0..m {
            row[j + 1] = if *x == b[j] {
                prev[j] + 1
            } else {
                prev[j + 1].max(row[j])
            };
        }
        std::mem::swap(&mut prev, &mut row);
    }
    prev
}

/// `row[j]` = LCS length of `a` and `b[j..]`.
fn backward_lengths<T: PartialEq>(a: &[T], b: &[T]) -> Vec<u32> {
    let m = b.len();
    let mut prev = vec![0u32; m + 1];
    let mut row = vec![0u32; m + 1];
    for x in a.iter().rev() {
        for j in (0..m).rev() {
            row[j] = if *x == b[j] {
                prev[j + 1] + 1
            } else {
                prev[j].max(row[j + 1])
            };
        }
        std::mem::swap(&mut prev, &mut row);
    }
    prev
}

fn table_pairs<T: PartialEq>(a: &[T], b: &[T]) -> Vec<(usize, usize)> {
    let (n, m) = (a.len(), b.len());
    if n == 0 || m == 0 {
        return Vec::new();
    }

    // lengths[i][j] = LCS length of a[i..] and b[j..]
    let width = m + 1;
    let mut lengths = vec![0u32; (n + 1) * width];
    for i in (0..n).rev() {
        for j in (0..m).rev() {
            lengths[i * width + j] = if a[i] == b[j] {
                lengths[(i + 1) * width + j + 1] + 1
            } else {
                lengths[(i + 1) * width + j].max(lengths[i * width + j + 1])
            };
        }
    }

    let mut pairs = Vec::with_capacity(lengths[0] as usize);
    let (mut i, mut j) = (0, 0);
    while i < n && j < m {
        if a[i] == b[j] {
            pairs.push((i, j));
            i += 1;
            j += 1;
        } else if lengths[(i + 1) * width + j] >= lengths[i * width + j + 1] {
            i += 1;
        } else {
            j += 1;
        }
    }
    pairs
}
