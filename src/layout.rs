use crate::error::Error;

/// How per-prediction class scores are stored in a prediction-major tensor.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ScoreEncoding {
    /// One score per label; the decoder keeps the per-label maximum.
    PerLabel(usize),
    /// A single confidence followed by an encoded label index.
    ConfidenceAndClass,
}

/// Output tensor layout descriptor, resolved once at model-load time.
///
/// Two families exist. Channel-major tensors store attribute `k` of
/// prediction `i` at `i + k * channels`; prediction-major tensors store it
/// at `i * attributes + k`.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum OutputLayout {
    ChannelMajor {
        /// Number of predictions (one column per prediction).
        channels: usize,
        labels: usize,
        /// Oriented-box angle slot directly after the label scores.
        angle: bool,
        /// Keypoint triplets after the label scores.
        keypoints: usize,
        /// Mask-weight slots after the label scores.
        mask_weights: usize,
    },
    PredictionMajor {
        predictions: usize,
        /// Attribute stride of one prediction.
        attributes: usize,
        scores: ScoreEncoding,
        /// Mask-weight slots at the end of each prediction.
        mask_weights: usize,
    },
}

fn positive(value: i64, name: &str) -> Result<usize, Error> {
    if value <= 0 {
        return Err(Error::InvalidShape(format!(
            "{name} must be positive, got {value}"
        )));
    }
    Ok(value as usize)
}

impl OutputLayout {
    /// Plain detection head, `[batch, 4 + labels, channels]`.
    pub fn channel_major_detect(channels: i64, labels: i64) -> Result<Self, Error> {
        Ok(Self::ChannelMajor {
            channels: positive(channels, "channels")?,
            labels: positive(labels, "labels")?,
            angle: false,
            keypoints: 0,
            mask_weights: 0,
        })
    }

    /// Oriented-box head: one angle slot after the label scores.
    pub fn channel_major_obb(channels: i64, labels: i64) -> Result<Self, Error> {
        Ok(Self::ChannelMajor {
            channels: positive(channels, "channels")?,
            labels: positive(labels, "labels")?,
            angle: true,
            keypoints: 0,
            mask_weights: 0,
        })
    }

    /// Pose head. The keypoint count is derived from the declared attribute
    /// width: `(attributes - 4 - labels) / 3`.
    pub fn channel_major_pose(channels: i64, labels: i64, attributes: i64) -> Result<Self, Error> {
        let channels = positive(channels, "channels")?;
        let labels = positive(labels, "labels")?;
        let attributes = positive(attributes, "attributes")?;

        let base = 4 + labels;
        if attributes <= base || (attributes - base) % 3 != 0 {
            return Err(Error::InvalidShape(format!(
                "pose output width {attributes} does not decompose into {base} box/label slots plus keypoint triplets"
            )));
        }

        Ok(Self::ChannelMajor {
            channels,
            labels,
            angle: false,
            keypoints: (attributes - base) / 3,
            mask_weights: 0,
        })
    }

    /// Segmentation head: fixed mask-weight slots after the label scores.
    pub fn channel_major_segment(
        channels: i64,
        labels: i64,
        mask_weights: i64,
    ) -> Result<Self, Error> {
        Ok(Self::ChannelMajor {
            channels: positive(channels, "channels")?,
            labels: positive(labels, "labels")?,
            angle: false,
            keypoints: 0,
            mask_weights: positive(mask_weights, "mask_weights")?,
        })
    }

    /// Prediction-major head with one score per label,
    /// `[batch, predictions, 4 + labels]`.
    pub fn prediction_major_detect(
        predictions: i64,
        attributes: i64,
        labels: i64,
    ) -> Result<Self, Error> {
        let predictions = positive(predictions, "predictions")?;
        let attributes = positive(attributes, "attributes")?;
        let labels = positive(labels, "labels")?;

        if attributes != 4 + labels {
            return Err(Error::InvalidShape(format!(
                "expected {} attributes for 4 box slots plus {labels} labels, got {attributes}",
                4 + labels
            )));
        }

        Ok(Self::PredictionMajor {
            predictions,
            attributes,
            scores: ScoreEncoding::PerLabel(labels),
            mask_weights: 0,
        })
    }

    /// Prediction-major head with explicit confidence and class slots,
    /// `[x, y, w, h, confidence, class, mask-weights...]`. Anything past the
    /// six base attributes is treated as mask weights.
    pub fn prediction_major_top1(predictions: i64, attributes: i64) -> Result<Self, Error> {
        let predictions = positive(predictions, "predictions")?;
        let attributes = positive(attributes, "attributes")?;

        if attributes < 6 {
            return Err(Error::InvalidShape(format!(
                "confidence/class layout needs at least 6 attributes, got {attributes}"
            )));
        }

        Ok(Self::PredictionMajor {
            predictions,
            attributes,
            scores: ScoreEncoding::ConfidenceAndClass,
            mask_weights: attributes - 6,
        })
    }

    /// Resolve a declared `[batch, d1, d2]` output shape against the label
    /// count. Channel-major shapes carry the attribute width in `d1`,
    /// prediction-major shapes in `d2`.
    pub fn resolve(shape: &[i64], labels: i64) -> Result<Self, Error> {
        if shape.len() != 3 {
            return Err(Error::UnsupportedLayout(format!(
                "expected a 3-dimensional output shape, got {shape:?}"
            )));
        }
        let (d1, d2) = (shape[1], shape[2]);
        positive(d1, "output dim 1")?;
        positive(d2, "output dim 2")?;
        positive(labels, "labels")?;

        if d1 == 4 + labels {
            Self::channel_major_detect(d2, labels)
        } else if d1 == 5 + labels {
            Self::channel_major_obb(d2, labels)
        } else if d1 == 4 + labels + 32 {
            Self::channel_major_segment(d2, labels, 32)
        } else if d1 > 4 + labels && (d1 - 4 - labels) % 3 == 0 {
            Self::channel_major_pose(d2, labels, d1)
        } else if d2 == 4 + labels {
            Self::prediction_major_detect(d1, d2, labels)
        } else if d2 == 6 {
            Self::prediction_major_top1(d1, d2)
        } else {
            Err(Error::UnsupportedLayout(format!(
                "no known layout matches shape {shape:?} with {labels} labels"
            )))
        }
    }

    /// Maximum number of candidates one tensor can yield.
    pub fn max_candidates(&self) -> usize {
        match *self {
            Self::ChannelMajor { channels, .. } => channels,
            Self::PredictionMajor { predictions, .. } => predictions,
        }
    }

    /// Total element count the flat buffer must carry.
    pub fn expected_len(&self) -> usize {
        match *self {
            Self::ChannelMajor {
                channels,
                labels,
                angle,
                keypoints,
                mask_weights,
            } => channels * (4 + labels + usize::from(angle) + 3 * keypoints + mask_weights),
            Self::PredictionMajor {
                predictions,
                attributes,
                ..
            } => predictions * attributes,
        }
    }

    pub fn mask_weights(&self) -> usize {
        match *self {
            Self::ChannelMajor { mask_weights, .. } => mask_weights,
            Self::PredictionMajor { mask_weights, .. } => mask_weights,
        }
    }
}
