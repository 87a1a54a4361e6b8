use geo::Rect;
use rstar::{RTree, RTreeObject, AABB};

use crate::features::FeatureSet;

/// A bounding box in an R-tree, associated with a feature by index.
#[derive(Debug, Clone)]
pub(super) struct BoundingBox {
    idx: usize, // Index of the feature in its set
    bbox: Rect<f64>,
}

impl RTreeObject for BoundingBox {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_corners(self.bbox.min().into(), self.bbox.max().into())
    }
}

/// R-tree over the bounding boxes of a feature set's records.
pub(super) struct FeatureIndex {
    rtree: RTree<BoundingBox>,
}

impl FeatureIndex {
    pub(super) fn new(set: &FeatureSet) -> Self {
        Self {
            rtree: RTree::bulk_load(
                set.features.iter().enumerate()
                    .filter_map(|(idx, f)| f.shape.bounding_rect().map(|bbox| BoundingBox { idx, bbox }))
                    .collect()
            ),
        }
    }

    /// Indices of records whose bounding box meets `rect` grown by `tolerance`,
    /// in ascending order.
    pub(super) fn candidates(&self, rect: &Rect<f64>, tolerance: f64) -> Vec<usize> {
        let envelope = AABB::from_corners(
            [rect.min().x - tolerance, rect.min().y - tolerance],
            [rect.max().x + tolerance, rect.max().y + tolerance],
        );
        let mut found: Vec<usize> = self.rtree.locate_in_envelope_intersecting(&envelope)
            .map(|b| b.idx)
            .collect();
        found.sort_unstable();
        found
    }
}
