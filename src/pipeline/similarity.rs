//! Character-level similarity ratio.
//!
//! `ratio = 2·M / (|a| + |b|)` where `M` is the number of characters in the
//! matching blocks found by recursive longest-common-substring search
//! (Ratcliff/Obershelp). Two empty strings are identical (ratio 1.0).
//!
//! There is no junk heuristic: every character participates. Inputs here are
//! short header/footer lines, so the quadratic worst case never matters.

use std::collections::HashMap;

/// Similarity of two strings in `[0, 1]`.
pub fn ratio(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let total = a.len() + b.len();
    if total == 0 {
        return 1.0;
    }
    2.0 * matching_chars(&a, &b) as f64 / total as f64
}

fn matching_chars(a: &[char], b: &[char]) -> usize {
    let mut b2j: HashMap<char, Vec<usize>> = HashMap::new();
    for (j, c) in b.iter().enumerate() {
        b2j.entry(*c).or_default().push(j);
    }

    let mut matched = 0;
    let mut queue = vec![(0, a.len(), 0, b.len())];
    while let Some((alo, ahi, blo, bhi)) = queue.pop() {
        let (i, j, k) = longest_match(a, &b2j, alo, ahi, blo, bhi);
        if k == 0 {
            continue;
        }
        matched += k;
        if alo < i && blo < j {
            queue.push((alo, i, blo, j));
        }
        if i + k < ahi && j + k < bhi {
            queue.push((i + k, ahi, j + k, bhi));
        }
    }
    matched
}

/// Longest block `a[i..i+k] == b[j..j+k]` inside the given windows.
/// Ties go to the block starting earliest in `a`, then earliest in `b`.
fn longest_match(
    a: &[char],
    b2j: &HashMap<char, Vec<usize>>,
    alo: usize,
    ahi: usize,
    blo: usize,
    bhi: usize,
) -> (usize, usize, usize) {
    let (mut best_i, mut best_j, mut best_k) = (alo, blo, 0);
    // j2len[j] = length of the match ending at a[i-1], b[j]
    let mut j2len: HashMap<usize, usize> = HashMap::new();
    for (i, c) in a.iter().enumerate().take(ahi).skip(alo) {
        let mut next: HashMap<usize, usize> = HashMap::new();
        if let Some(positions) = b2j.get(c) {
            for &j in positions {
                if j < blo {
                    continue;
                }
                if j >= bhi {
                    break;
                }
                let k = j
                    .checked_sub(1)
                    .and_then(|prev| j2len.get(&prev))
                    .copied()
                    .unwrap_or(0)
                    + 1;
                next.insert(j, k);
                if k > best_k {
                    best_i = i + 1 - k;
                    best_j = j + 1 - k;
                    best_k = k;
                }
            }
        }
        j2len = next;
    }
    (best_i, best_j, best_k)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn identical_and_empty() {
        assert_eq!(ratio("Page #", "Page #"), 1.0);
        assert_eq!(ratio("", ""), 1.0);
        assert_eq!(ratio("abc", ""), 0.0);
    }

    #[test]
    fn known_values() {
        assert!((ratio("abcd", "bcde") - 0.75).abs() < 1e-9);
        // "Page " plus one digit shared out of 6 + 6 chars.
        assert!((ratio("Page 1", "Page 2") - 10.0 / 12.0).abs() < 1e-9);
        assert_eq!(ratio("abc", "xyz"), 0.0);
    }

    #[test]
    fn arabic_is_compared_by_character() {
        let r = ratio("التقرير السنوي", "التقرير السنوى");
        assert!(r > 0.9, "got {r}");
    }

    proptest! {
        #[test]
        fn ratio_is_bounded_and_symmetric_on_self(s in "\\PC{0,30}", t in "\\PC{0,30}") {
            let r = ratio(&s, &t);
            prop_assert!((0.0..=1.0).contains(&r));
            prop_assert_eq!(ratio(&s, &s), 1.0);
        }
    }
}
