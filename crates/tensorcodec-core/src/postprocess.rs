use crate::{CodecError, DType, LabelTable, Tensor};

/// The top class of one inference call.
#[derive(Clone, Debug, PartialEq)]
pub struct Prediction {
    pub label: String,
    pub index: usize,
    /// Raw score at `index`, as produced by the model.
    pub confidence: f32,
    /// Element type of the tensor the score came from.
    pub dtype: DType,
}

impl Prediction {
    /// The confidence mapped into `[0, 1]`.
    ///
    /// Quantized (`U8`) scores are divided by 255. `F32` scores are assumed to
    /// already be probabilities and are returned as is; no softmax is applied.
    pub fn probability(&self) -> f32 {
        match self.dtype {
            DType::U8 => self.confidence / 255.0,
            DType::F32 => self.confidence,
        }
    }
}

/// Picks the highest scoring class.
///
/// Ties go to the lowest index. NaN scores never win; if every score is NaN,
/// class 0 is reported.
///
/// # Errors
///
/// * [`CodecError::EmptyLabels`] if `labels` is empty.
/// * [`CodecError::ShapeMismatch`] if the tensor's batch is not 1 or its
///   element count differs from the label count.
pub fn postprocess(tensor: &Tensor, labels: &LabelTable) -> Result<Prediction, CodecError> {
    let scores = class_scores(tensor, labels)?;

    let mut best: Option<(usize, f32)> = None;
    for (index, &score) in scores.iter().enumerate() {
        if score.is_nan() {
            continue;
        }
        match best {
            Some((_, top)) if score <= top => {}
            _ => best = Some((index, score)),
        }
    }
    let (index, confidence) = best.unwrap_or((0, scores[0]));

    Ok(prediction(labels, tensor.dtype(), index, confidence))
}

/// The `k` highest scoring classes, best first. Equal scores keep index order.
///
/// Fails the same way as [`postprocess`].
pub fn postprocess_top_k(
    tensor: &Tensor,
    labels: &LabelTable,
    k: usize,
) -> Result<Vec<Prediction>, CodecError> {
    let scores = class_scores(tensor, labels)?;

    let mut ranked: Vec<usize> = (0..scores.len()).collect();
    // Stable sort, NaN ranked last.
    ranked.sort_by(|&a, &b| {
        let (sa, sb) = (scores[a], scores[b]);
        match (sa.is_nan(), sb.is_nan()) {
            (true, true) => std::cmp::Ordering::Equal,
            (true, false) => std::cmp::Ordering::Greater,
            (false, true) => std::cmp::Ordering::Less,
            (false, false) => sb.total_cmp(&sa),
        }
    });

    Ok(ranked
        .into_iter()
        .take(k)
        .map(|index| prediction(labels, tensor.dtype(), index, scores[index]))
        .collect())
}

fn class_scores(tensor: &Tensor, labels: &LabelTable) -> Result<Vec<f32>, CodecError> {
    if labels.is_empty() {
        return Err(CodecError::EmptyLabels);
    }

    let dims = tensor.shape().dims();
    if dims.len() >= 2 && dims[0] != 1 {
        return Err(CodecError::ShapeMismatch {
            message: format!("expected a batch of 1, got {}", dims[0]),
        });
    }
    if tensor.numel() != labels.len() {
        return Err(CodecError::ShapeMismatch {
            message: format!(
                "tensor has {} class scores but there are {} labels",
                tensor.numel(),
                labels.len()
            ),
        });
    }

    Ok(tensor.scores())
}

fn prediction(labels: &LabelTable, dtype: DType, index: usize, confidence: f32) -> Prediction {
    Prediction {
        label: labels.get(index).unwrap_or_default().to_string(),
        index,
        confidence,
        dtype,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Shape;

    fn bytes(values: &[u8]) -> Tensor {
        Tensor::from_u8(Shape::from_slice(&[1, values.len()]), values.to_vec()).unwrap()
    }

    fn floats(values: &[f32]) -> Tensor {
        Tensor::from_f32(Shape::from_slice(&[1, values.len()]), values).unwrap()
    }

    #[test]
    fn picks_the_peak() {
        let labels = LabelTable::new(["a", "b", "c", "d"]);
        let p = postprocess(&bytes(&[0, 0, 9, 0]), &labels).unwrap();
        assert_eq!(p.label, "c");
        assert_eq!(p.index, 2);
        assert_eq!(p.confidence, 9.0);
    }

    #[test]
    fn ties_go_to_first_index() {
        let labels = LabelTable::new(["x", "y", "z"]);
        let p = postprocess(&bytes(&[5, 5, 2]), &labels).unwrap();
        assert_eq!((p.index, p.label.as_str()), (0, "x"));
    }

    #[test]
    fn length_mismatch() {
        let labels = LabelTable::new(["a", "b", "c"]);
        assert!(matches!(
            postprocess(&bytes(&[0, 0, 9, 0]), &labels),
            Err(CodecError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn empty_labels_checked_first() {
        assert!(matches!(
            postprocess(&bytes(&[1, 2]), &LabelTable::default()),
            Err(CodecError::EmptyLabels)
        ));
    }

    #[test]
    fn batch_of_two_rejected() {
        let labels = LabelTable::new(["a", "b"]);
        let tensor = Tensor::from_u8(Shape::from_slice(&[2, 1]), vec![1, 2]).unwrap();
        assert!(matches!(
            postprocess(&tensor, &labels),
            Err(CodecError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn flat_vector_accepted() {
        let labels = LabelTable::new(["a", "b"]);
        let tensor = Tensor::from_u8(Shape::from_slice(&[2]), vec![1, 2]).unwrap();
        assert_eq!(postprocess(&tensor, &labels).unwrap().index, 1);
    }

    #[test]
    fn probability_follows_dtype() {
        let labels = LabelTable::new(["a", "b"]);
        let quant = postprocess(&bytes(&[0, 255]), &labels).unwrap();
        assert_eq!(quant.confidence, 255.0);
        assert_eq!(quant.probability(), 1.0);

        let float = postprocess(&floats(&[0.25, 0.75]), &labels).unwrap();
        assert_eq!(float.dtype, DType::F32);
        assert_eq!(float.probability(), 0.75);
    }

    #[test]
    fn nan_never_wins() {
        let labels = LabelTable::new(["a", "b", "c"]);
        let p = postprocess(&floats(&[f32::NAN, 0.1, 0.2]), &labels).unwrap();
        assert_eq!(p.index, 2);

        let all_nan = postprocess(&floats(&[f32::NAN, f32::NAN, f32::NAN]), &labels).unwrap();
        assert_eq!(all_nan.index, 0);
        assert!(all_nan.confidence.is_nan());
    }

    #[test]
    fn top_k_ordering() {
        let labels = LabelTable::new(["a", "b", "c", "d", "e"]);
        let top = postprocess_top_k(&bytes(&[3, 9, 3, 7, 1]), &labels, 3).unwrap();
        let order: Vec<_> = top.iter().map(|p| p.label.as_str()).collect();
        assert_eq!(order, ["b", "d", "a"]);
    }

    #[test]
    fn top_k_larger_than_classes() {
        let labels = LabelTable::new(["a", "b"]);
        let top = postprocess_top_k(&floats(&[0.5, f32::NAN]), &labels, 10).unwrap();
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].index, 0);
        assert!(postprocess_top_k(&floats(&[0.5, 0.1]), &labels, 0)
            .unwrap()
            .is_empty());
    }
}
