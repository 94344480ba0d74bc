//! Metrics over aligned truth and prediction sequences.
use itertools::Itertools;

kind_tag! {
    /// An evaluation metric.
    pub enum Metric("metric") {
        /// Area under the ROC curve.
        Auc => "AUC",
        /// Discounted cumulative gain.
        Dcg => "DCG",
        /// Normalized discounted cumulative gain.
        Ndcg => "NDCG",
        /// Mean absolute error.
        Mae => "MAE",
        /// Mean squared error.
        Mse => "MSE",
        /// Root mean squared error.
        Rmse => "RMSE",
    }
}

/// Metric error types.
#[derive(Debug, Fail)]
pub enum MetricError {
    #[fail(display = "Got {} true values but {} predictions.", truth, pred)]
    LengthMismatch { truth: usize, pred: usize },
    #[fail(display = "Cannot score an empty sequence.")]
    Empty,
    #[fail(
        display = "AUC needs exactly two distinct true values, got {}.",
        num_classes
    )]
    NotBinary { num_classes: usize },
}

impl Metric {
    /// Score `pred` against `truth`.
    pub fn compute(&self, truth: &[f64], pred: &[f64]) -> Result<f64, MetricError> {
        match *self {
            Metric::Auc => auc(truth, pred),
            Metric::Dcg => dcg(truth, pred),
            Metric::Ndcg => ndcg(truth, pred),
            Metric::Mae => mae(truth, pred),
            Metric::Mse => mse(truth, pred),
            Metric::Rmse => rmse(truth, pred),
        }
    }
}

fn check(truth: &[f64], pred: &[f64]) -> Result<(), MetricError> {
    if truth.len() != pred.len() {
        Err(MetricError::LengthMismatch {
            truth: truth.len(),
            pred: pred.len(),
        })
    } else if truth.is_empty() {
        Err(MetricError::Empty)
    } else {
        Ok(())
    }
}

pub fn mae(truth: &[f64], pred: &[f64]) -> Result<f64, MetricError> {
    check(truth, pred)?;

    let total: f64 = izip!(truth, pred).map(|(t, p)| (t - p).abs()).sum();

    Ok(total / truth.len() as f64)
}

pub fn mse(truth: &[f64], pred: &[f64]) -> Result<f64, MetricError> {
    check(truth, pred)?;

    let total: f64 = izip!(truth, pred).map(|(t, p)| (t - p) * (t - p)).sum();

    Ok(total / truth.len() as f64)
}

pub fn rmse(truth: &[f64], pred: &[f64]) -> Result<f64, MetricError> {
    mse(truth, pred).map(f64::sqrt)
}

/// Indices of `values` sorted by value and split into runs of equal
/// values.
fn tied_runs(values: &[f64], descending: bool) -> Vec<Vec<usize>> {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&a, &b| values[a].total_cmp(&values[b]));

    if descending {
        order.reverse();
    }

    let mut runs = Vec::new();
    for (_, run) in &order.into_iter().group_by(|&idx| values[idx]) {
        runs.push(run.collect::<Vec<_>>());
    }

    runs
}

/// Area under the ROC curve, from the Mann-Whitney statistic.
///
/// The larger of the two true values marks positives. Tied predictions
/// share their average rank.
pub fn auc(truth: &[f64], pred: &[f64]) -> Result<f64, MetricError> {
    check(truth, pred)?;

    let classes: Vec<f64> = truth
        .iter()
        .cloned()
        .sorted_by(|a, b| a.total_cmp(b))
        .dedup()
        .collect();

    if classes.len() != 2 {
        return Err(MetricError::NotBinary {
            num_classes: classes.len(),
        });
    }

    let positive = classes[1];
    let num_positive = truth.iter().filter(|&&t| t == positive).count() as f64;
    let num_negative = truth.len() as f64 - num_positive;

    let mut rank_sum = 0.0;
    let mut seen = 0;

    for run in tied_runs(pred, false) {
        let rank = seen as f64 + (run.len() as f64 + 1.0) / 2.0;
        let positives = run.iter().filter(|&&idx| truth[idx] == positive).count();

        rank_sum += rank * positives as f64;
        seen += run.len();
    }

    Ok((rank_sum - num_positive * (num_positive + 1.0) / 2.0) / (num_positive * num_negative))
}

/// Discounted cumulative gain of the ranking induced by `pred`, with
/// gains `truth`. Tied predictions split their gain evenly over the
/// ranks they occupy.
pub fn dcg(truth: &[f64], pred: &[f64]) -> Result<f64, MetricError> {
    check(truth, pred)?;

    let mut score = 0.0;
    let mut rank = 0;

    for run in tied_runs(pred, true) {
        let gain = run.iter().map(|&idx| truth[idx]).sum::<f64>() / run.len() as f64;
        let discount: f64 = (rank..rank + run.len())
            .map(|position| 1.0 / (position as f64 + 2.0).log2())
            .sum();

        score += gain * discount;
        rank += run.len();
    }

    Ok(score)
}

/// DCG over the best achievable DCG, or 0 when that is 0.
pub fn ndcg(truth: &[f64], pred: &[f64]) -> Result<f64, MetricError> {
    let ideal = dcg(truth, truth)?;

    if ideal == 0.0 {
        return Ok(0.0);
    }

    Ok(dcg(truth, pred)? / ideal)
}

#[cfg(test)]
mod tests {

    use super::*;

    #[test]
    fn rating_errors() {
        assert_eq!(Metric::Rmse.compute(&[3.0, 4.0, 5.0], &[3.0, 4.0, 5.0]).unwrap(), 0.0);
        assert_eq!(Metric::Rmse.compute(&[0.0, 0.0], &[1.0, 1.0]).unwrap(), 1.0);

        assert_relative_eq!(mae(&[1.0, 2.0, 3.0], &[2.0, 2.0, 1.0]).unwrap(), 1.0);
        assert_relative_eq!(mse(&[1.0, 2.0, 3.0], &[2.0, 2.0, 1.0]).unwrap(), 5.0 / 3.0);
        assert_relative_eq!(
            rmse(&[1.0, 2.0, 3.0], &[2.0, 2.0, 1.0]).unwrap(),
            (5.0f64 / 3.0).sqrt()
        );
    }

    #[test]
    fn input_checks() {
        assert!(match mae(&[1.0], &[1.0, 2.0]) {
            Err(MetricError::LengthMismatch { truth: 1, pred: 2 }) => true,
            _ => false,
        });
        assert!(match mse(&[], &[]) {
            Err(MetricError::Empty) => true,
            _ => false,
        });
    }

    #[test]
    fn auc_scores() {
        assert_relative_eq!(auc(&[0.0, 0.0, 1.0, 1.0], &[0.1, 0.4, 0.35, 0.8]).unwrap(), 0.75);
        assert_relative_eq!(auc(&[1.0, 5.0], &[0.2, 0.9]).unwrap(), 1.0);
        assert_relative_eq!(auc(&[1.0, 5.0], &[0.9, 0.2]).unwrap(), 0.0);
        // Ties count half.
        assert_relative_eq!(auc(&[0.0, 1.0], &[0.5, 0.5]).unwrap(), 0.5);

        assert!(match auc(&[1.0, 2.0, 3.0], &[0.1, 0.2, 0.3]) {
            Err(MetricError::NotBinary { num_classes: 3 }) => true,
            _ => false,
        });
    }

    #[test]
    fn dcg_scores() {
        // Ranking by prediction: gains 3, 2, 1.
        let expected = 3.0 + 2.0 / 3f64.log2() + 1.0 / 2.0;
        assert_relative_eq!(dcg(&[1.0, 3.0, 2.0], &[0.1, 0.9, 0.5]).unwrap(), expected);

        // Two tied items share the first two discounts.
        let tied = (3.0 + 1.0) / 2.0 * (1.0 + 1.0 / 3f64.log2());
        assert_relative_eq!(dcg(&[3.0, 1.0], &[0.5, 0.5]).unwrap(), tied);
    }

    #[test]
    fn ndcg_scores() {
        assert_relative_eq!(ndcg(&[1.0, 3.0, 2.0], &[0.1, 0.9, 0.5]).unwrap(), 1.0);
        assert_eq!(ndcg(&[0.0, 0.0], &[0.3, 0.1]).unwrap(), 0.0);

        let worst = ndcg(&[1.0, 0.0], &[0.0, 1.0]).unwrap();
        assert_relative_eq!(worst, 1.0 / 3f64.log2());
    }
}
