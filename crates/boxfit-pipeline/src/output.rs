//! Column-aligned container for accepted box fits.

use boxfit_core::{Box3D, BoxDimensions, Real, Vec3};
use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

use crate::instance::FitResult;

/// Accepted boxes of one frame. Row `i` of every column belongs to the same box.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoxFieldList {
    image_size: [u32; 2],
    class: Vec<usize>,
    #[serde(rename = "Ry")]
    ry: Vec<Real>,
    /// `[h, w, l]` per box.
    dimension: Vec<[Real; 3]>,
    location: Vec<[Real; 3]>,
    /// Row-major `K` per box, as supplied with the frame.
    #[serde(rename = "K")]
    k: Vec<[Real; 9]>,
}

/// One box read back from a [`BoxFieldList`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoxRow {
    pub class: usize,
    pub ry: Real,
    pub dimension: [Real; 3],
    pub location: [Real; 3],
    pub k: [Real; 9],
}

impl BoxFieldList {
    pub fn new(image_size: [u32; 2]) -> Self {
        Self {
            image_size,
            class: Vec::new(),
            ry: Vec::new(),
            dimension: Vec::new(),
            location: Vec::new(),
            k: Vec::new(),
        }
    }

    /// Append an accepted fit. Rejected fits are ignored; returns whether a row was added.
    pub fn push(&mut self, fit: &FitResult) -> bool {
        if !fit.accepted {
            return false;
        }
        self.class.push(fit.class);
        self.ry.push(fit.yaw);
        self.dimension.push(fit.dimension);
        self.location.push(fit.location);
        self.k.push(fit.camera.k);
        true
    }

    pub fn len(&self) -> usize {
        self.class.len()
    }

    pub fn is_empty(&self) -> bool {
        self.class.is_empty()
    }

    pub fn image_size(&self) -> [u32; 2] {
        self.image_size
    }

    pub fn classes(&self) -> &[usize] {
        &self.class
    }

    pub fn ry(&self) -> &[Real] {
        &self.ry
    }

    /// `N × 3` matrix of `[h, w, l]` rows.
    pub fn dimension(&self) -> DMatrix<Real> {
        rows_to_matrix(&self.dimension)
    }

    /// `N × 3` matrix of `[x, y, z]` rows.
    pub fn location(&self) -> DMatrix<Real> {
        rows_to_matrix(&self.location)
    }

    /// `N × 9` matrix of row-major intrinsics.
    pub fn k(&self) -> DMatrix<Real> {
        rows_to_matrix(&self.k)
    }

    pub fn row(&self, i: usize) -> Option<BoxRow> {
        if i >= self.len() {
            return None;
        }
        Some(BoxRow {
            class: self.class[i],
            ry: self.ry[i],
            dimension: self.dimension[i],
            location: self.location[i],
            k: self.k[i],
        })
    }

    pub fn rows(&self) -> impl Iterator<Item = BoxRow> + '_ {
        (0..self.len()).filter_map(move |i| self.row(i))
    }

    /// Rebuild posed boxes, e.g. for drawing.
    pub fn to_boxes(&self) -> Vec<Box3D> {
        self.rows()
            .map(|r| {
                Box3D::new(
                    BoxDimensions::from_hwl(r.dimension),
                    r.ry,
                    Vec3::from(r.location),
                )
            })
            .collect()
    }
}

fn rows_to_matrix<const N: usize>(rows: &[[Real; N]]) -> DMatrix<Real> {
    DMatrix::from_row_iterator(rows.len(), N, rows.iter().flatten().copied())
}

#[cfg(test)]
mod tests {
    use super::*;
    use boxfit_core::{CameraIntrinsics, CameraMatrix};
    use boxfit_optim::Termination;

    fn fit(accepted: bool, class: usize) -> FitResult {
        FitResult {
            accepted,
            class,
            yaw: 0.25 * class as Real,
            dimension: [1.5, 1.8, 4.0],
            location: [class as Real, 1.2, 8.0],
            camera: CameraMatrix::from(CameraIntrinsics {
                fx: 700.0,
                fy: 710.0,
                cx: 320.0,
                cy: 240.0,
            }),
            final_cost: 1e-6,
            iterations: 12,
            termination: Termination::ProjectedGradient,
        }
    }

    #[test]
    fn empty_list_has_shaped_columns() {
        let out = BoxFieldList::new([640, 640]);
        assert!(out.is_empty());
        assert_eq!(out.dimension().shape(), (0, 3));
        assert_eq!(out.location().shape(), (0, 3));
        assert_eq!(out.k().shape(), (0, 9));
        assert!(out.row(0).is_none());
    }

    #[test]
    fn push_skips_rejected_fits() {
        let mut out = BoxFieldList::new([1242, 375]);
        assert!(out.push(&fit(true, 0)));
        assert!(!out.push(&fit(false, 1)));
        assert!(out.push(&fit(true, 2)));

        assert_eq!(out.len(), 2);
        assert_eq!(out.classes(), &[0, 2]);
        assert_eq!(out.ry(), &[0.0, 0.5]);
        assert_eq!(out.image_size(), [1242, 375]);

        let loc = out.location();
        assert_eq!(loc.shape(), (2, 3));
        assert_eq!(loc[(1, 0)], 2.0);
        assert_eq!(loc[(1, 2)], 8.0);

        let k = out.k();
        assert_eq!(k.shape(), (2, 9));
        assert_eq!(k[(0, 0)], 700.0);
        assert_eq!(k[(0, 4)], 710.0);
        assert_eq!(k[(1, 8)], 1.0);

        let boxes = out.to_boxes();
        assert_eq!(boxes.len(), 2);
        assert_eq!(boxes[1].dimensions.length, 4.0);
        assert_eq!(boxes[1].location, Vec3::new(2.0, 1.2, 8.0));
    }

    #[test]
    fn serializes_with_ry_and_k_column_names() {
        let mut out = BoxFieldList::new([640, 640]);
        out.push(&fit(true, 1));
        let json = serde_json::to_value(&out).unwrap();
        assert!(json.get("Ry").is_some());
        assert!(json.get("K").is_some());
        assert_eq!(json["class"][0], 1);
        assert_eq!(json["dimension"][0][2], 4.0);

        let back: BoxFieldList = serde_json::from_value(json).unwrap();
        assert_eq!(back, out);
    }
}
