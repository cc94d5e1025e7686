use ndarray::ArrayView2;
use serde::Serialize;
use std::ops::{Add, AddAssign};

use crate::error::PrepError;

/// Reference frames are those with target at or above this value.
const TARGET_THRESHOLD: f32 = 0.5;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Counts {
    pub true_positives: u64,
    pub false_positives: u64,
    pub false_negatives: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Scores {
    pub fscore: f64,
    pub precision: f64,
    pub recall: f64,
}

impl Counts {
    pub fn scores(&self) -> Scores {
        let (fscore, precision, recall) =
            fscore_precision_recall(self.true_positives, self.false_positives, self.false_negatives);
        Scores {
            fscore,
            precision,
            recall,
        }
    }
}

impl Add for Counts {
    type Output = Counts;

    fn add(self, rhs: Counts) -> Counts {
        Counts {
            true_positives: self.true_positives + rhs.true_positives,
            false_positives: self.false_positives + rhs.false_positives,
            false_negatives: self.false_negatives + rhs.false_negatives,
        }
    }
}

impl AddAssign for Counts {
    fn add_assign(&mut self, rhs: Counts) {
        *self = *self + rhs;
    }
}

/// `(fscore, precision, recall)`; each ratio is 0 when its denominator is 0.
pub fn fscore_precision_recall(tp: u64, fp: u64, fn_: u64) -> (f64, f64, f64) {
    let ratio = |num: f64, den: f64| if den == 0.0 { 0.0 } else { num / den };
    let (tp, fp, fn_) = (tp as f64, fp as f64, fn_ as f64);
    let precision = ratio(tp, tp + fp);
    let recall = ratio(tp, tp + fn_);
    // Harmonic mean of precision and recall, from the counts directly
    let fscore = ratio(2.0 * tp, 2.0 * tp + fp + fn_);
    (fscore, precision, recall)
}

/// Leftmost local maxima at or above `threshold` within `±window` frames.
pub fn peak_pick(pred: &[f32], threshold: f32, window: usize) -> Vec<usize> {
    (0..pred.len())
        .filter(|&i| {
            let v = pred[i];
            if v < threshold {
                return false;
            }
            let lo = i.saturating_sub(window);
            let hi = (i + window + 1).min(pred.len());
            pred[lo..i].iter().all(|&p| p < v) && pred[i + 1..hi].iter().all(|&p| p <= v)
        })
        .collect()
}

fn reference_frames(target: &[f32]) -> Vec<usize> {
    target
        .iter()
        .enumerate()
        .filter(|(_, &t)| t >= TARGET_THRESHOLD)
        .map(|(i, _)| i)
        .collect()
}

fn check_len(pred: &[f32], target: &[f32]) -> Result<(), PrepError> {
    if pred.len() != target.len() {
        return Err(PrepError::ShapeMismatch {
            expected: vec![target.len()],
            actual: vec![pred.len()],
        });
    }
    Ok(())
}

/// One-to-one matching of sorted detections to sorted references.
fn match_onsets(detections: &[usize], references: &[usize], tolerance: usize) -> Counts {
    let mut counts = Counts::default();
    let (mut d, mut r) = (0, 0);
    while d < detections.len() && r < references.len() {
        let (det, reference) = (detections[d], references[r]);
        if det.abs_diff(reference) <= tolerance {
            counts.true_positives += 1;
            d += 1;
            r += 1;
        } else if det < reference {
            counts.false_positives += 1;
            d += 1;
        } else {
            counts.false_negatives += 1;
            r += 1;
        }
    }
    counts.false_positives += (detections.len() - d) as u64;
    counts.false_negatives += (references.len() - r) as u64;
    counts
}

/// Peak-picked detections matched to target onsets within `tolerance_frames`.
pub fn evaluate_frame(
    pred: &[f32],
    target: &[f32],
    threshold: f32,
    tolerance_frames: usize,
    window: usize,
) -> Result<Counts, PrepError> {
    check_len(pred, target)?;
    let detections = peak_pick(pred, threshold, window);
    let references = reference_frames(target);
    Ok(match_onsets(&detections, &references, tolerance_frames))
}

/// Exact frame-by-frame comparison, no peak picking or tolerance.
pub fn evaluate_frame_naive(
    pred: &[f32],
    target: &[f32],
    threshold: f32,
) -> Result<Counts, PrepError> {
    check_len(pred, target)?;
    let mut counts = Counts::default();
    for (&p, &t) in pred.iter().zip(target.iter()) {
        match (p >= threshold, t >= TARGET_THRESHOLD) {
            (true, true) => counts.true_positives += 1,
            (true, false) => counts.false_positives += 1,
            (false, true) => counts.false_negatives += 1,
            (false, false) => {}
        }
    }
    Ok(counts)
}

/// [`evaluate_frame`] over each `[batch, frames]` row, summed.
pub fn evaluate_batch(
    preds: ArrayView2<f32>,
    targets: ArrayView2<f32>,
    threshold: f32,
    tolerance_frames: usize,
    window: usize,
) -> Result<Counts, PrepError> {
    if preds.shape() != targets.shape() {
        return Err(PrepError::ShapeMismatch {
            expected: targets.shape().to_vec(),
            actual: preds.shape().to_vec(),
        });
    }

    let mut total = Counts::default();
    for (pred, target) in preds.rows().into_iter().zip(targets.rows()) {
        let pred = pred.to_vec();
        let target = target.to_vec();
        total += evaluate_frame(&pred, &target, threshold, tolerance_frames, window)?;
    }
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn fscore_reference_values() {
        assert_eq!(
            fscore_precision_recall(100, 300, 400),
            (0.2222222222222222, 0.25, 0.2)
        );
        assert_eq!(fscore_precision_recall(0, 0, 0), (0.0, 0.0, 0.0));
        assert_eq!(fscore_precision_recall(5, 0, 0), (1.0, 1.0, 1.0));
        assert_eq!(fscore_precision_recall(0, 3, 4), (0.0, 0.0, 0.0));
    }

    #[test]
    fn fscore_stays_in_unit_interval() {
        for tp in 0..6u64 {
            for fp in 0..6u64 {
                for fn_ in 0..6u64 {
                    let (f, p, r) = fscore_precision_recall(tp, fp, fn_);
                    for v in [f, p, r] {
                        assert!((0.0..=1.0).contains(&v), "{tp} {fp} {fn_} -> {v}");
                    }
                }
            }
        }
    }

    #[test]
    fn all_zero_frames_score_zero() {
        let zeros = [0.0f32; 8];
        let counts = evaluate_frame(&zeros, &zeros, 0.5, 1, 1).unwrap();
        assert_eq!(counts, Counts::default());
        assert_eq!(counts.scores().fscore, 0.0);
        let naive = evaluate_frame_naive(&zeros, &zeros, 0.5).unwrap();
        assert_eq!(naive.scores().recall, 0.0);
    }

    #[test]
    fn naive_counts_each_frame() {
        let pred = [1.0, 0.0, 1.0, 0.0, 1.0, 0.0, 1.0, 0.0];
        let target = [1.0, 0.0, 0.0, 1.0, 1.0, 0.0, 1.0, 1.0];
        let counts = evaluate_frame_naive(&pred, &target, 0.5).unwrap();
        assert_eq!(
            counts,
            Counts {
                true_positives: 3,
                false_positives: 1,
                false_negatives: 2,
            }
        );
    }

    #[test]
    fn tolerance_absorbs_small_offsets() {
        let pred = [1.0, 0.0, 1.0, 0.0, 1.0, 0.0, 1.0, 0.0];
        let target = [1.0, 0.0, 0.0, 1.0, 1.0, 0.0, 1.0, 1.0];
        // detections 0,2,4,6; references 0,3,4,6,7
        let counts = evaluate_frame(&pred, &target, 0.5, 1, 0).unwrap();
        assert_eq!(counts.true_positives, 4);
        assert_eq!(counts.false_positives, 0);
        assert_eq!(counts.false_negatives, 1);

        let exact = evaluate_frame(&pred, &target, 0.5, 0, 0).unwrap();
        assert_eq!(exact.true_positives, 3);
    }

    #[test]
    fn identical_onsets_score_perfectly() {
        let target = [0.0, 1.0, 0.0, 0.0, 1.0, 0.0];
        let counts = evaluate_frame(&target, &target, 0.5, 0, 1).unwrap();
        assert_eq!(counts.scores(), Scores { fscore: 1.0, precision: 1.0, recall: 1.0 });
    }

    #[test]
    fn peak_picking_keeps_local_maxima() {
        let pred = [0.2, 0.6, 0.9, 0.7, 0.1, 0.8, 0.8, 0.0];
        assert_eq!(peak_pick(&pred, 0.5, 1), vec![2, 5]);
        assert_eq!(peak_pick(&pred, 0.5, 0), vec![1, 2, 3, 5, 6]);
        assert_eq!(peak_pick(&pred, 0.95, 1), Vec::<usize>::new());
    }

    #[test]
    fn length_mismatch_is_rejected() {
        let err = evaluate_frame(&[0.0; 3], &[0.0; 4], 0.5, 1, 1).unwrap_err();
        assert!(matches!(err, PrepError::ShapeMismatch { .. }));
    }

    #[test]
    fn batch_sums_rows() {
        let preds = array![[1.0f32, 0.0, 0.0, 1.0], [0.0, 1.0, 0.0, 0.0]];
        let targets = array![[1.0f32, 0.0, 0.0, 0.0], [0.0, 0.0, 1.0, 0.0]];
        let counts = evaluate_batch(preds.view(), targets.view(), 0.5, 1, 1).unwrap();
        assert_eq!(
            counts,
            Counts {
                true_positives: 2,
                false_positives: 1,
                false_negatives: 0,
            }
        );

        let wrong = array![[0.0f32; 4]];
        assert!(evaluate_batch(wrong.view(), targets.view(), 0.5, 1, 1).is_err());
    }
}
