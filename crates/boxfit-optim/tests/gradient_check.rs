//! The analytic gradient must agree with central finite differences of the
//! residual for random feasible poses.

use boxfit_core::{Box3D, BoxDimensions, CameraIntrinsics, Real, Vec3};
use boxfit_optim::objective::{gradient, residual, PoseParams, NUM_POSE_PARAMS};
use boxfit_optim::ConstraintSet;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn random_box(rng: &mut StdRng) -> Box3D {
    Box3D::new(
        BoxDimensions::new(
            rng.random_range(3.0..5.0),
            rng.random_range(1.3..2.0),
            rng.random_range(1.4..2.0),
        ),
        rng.random_range(-3.1..3.1),
        Vec3::new(
            rng.random_range(-3.0..3.0),
            rng.random_range(0.5..2.0),
            rng.random_range(5.0..30.0),
        ),
    )
}

fn params_of(b: &Box3D) -> PoseParams {
    let (s, c) = b.yaw.sin_cos();
    let d = b.dimensions;
    [
        s,
        c,
        d.length,
        d.height,
        d.width,
        b.location.x,
        b.location.y,
        b.location.z,
    ]
}

fn numeric_gradient(
    x: &PoseParams,
    k: &CameraIntrinsics,
    uv: &[boxfit_core::Vec2; 9],
) -> PoseParams {
    std::array::from_fn(|i| {
        let h = 1e-6 * x[i].abs().max(1.0);
        let mut xp = *x;
        let mut xm = *x;
        xp[i] += h;
        xm[i] -= h;
        (residual(&xp, k, uv) - residual(&xm, k, uv)) / (2.0 * h)
    })
}

#[test]
fn analytic_gradient_matches_finite_differences() {
    let k = CameraIntrinsics {
        fx: 721.5,
        fy: 721.5,
        cx: 609.6,
        cy: 172.9,
    };
    let constraints = ConstraintSet::default();
    let mut rng = StdRng::seed_from_u64(0x5EED);

    for trial in 0..50 {
        let observed = random_box(&mut rng).projected_corners(&k);
        let x = params_of(&random_box(&mut rng));
        assert!(constraints.is_feasible(&x, 1e-9), "trial {trial} infeasible");

        let analytic = gradient(&x, &k, &observed);
        let numeric = numeric_gradient(&x, &k, &observed);
        for i in 0..NUM_POSE_PARAMS {
            let scale = numeric[i].abs().max(1.0);
            let rel: Real = (analytic[i] - numeric[i]).abs() / scale;
            assert!(
                rel < 1e-4,
                "trial {trial}, param {i}: analytic {} vs numeric {} (rel {rel:e})",
                analytic[i],
                numeric[i]
            );
        }
    }
}

#[test]
fn gradient_is_consistent_off_the_unit_circle() {
    let k = CameraIntrinsics {
        fx: 700.0,
        fy: 700.0,
        cx: 320.0,
        cy: 240.0,
    };
    let observed = Box3D::new(
        BoxDimensions::from_hwl([1.5, 1.8, 4.0]),
        0.3,
        Vec3::new(0.0, 1.2, 8.0),
    )
    .projected_corners(&k);
    // The solver may visit (s, c) pairs that are not unit length.
    let x = [0.6, 1.3, 3.0, 1.2, 1.1, -0.4, 0.9, 11.0];
    let analytic = gradient(&x, &k, &observed);
    let numeric = numeric_gradient(&x, &k, &observed);
    for i in 0..NUM_POSE_PARAMS {
        let scale = numeric[i].abs().max(1.0);
        assert!(
            (analytic[i] - numeric[i]).abs() / scale < 1e-4,
            "param {i}: {} vs {}",
            analytic[i],
            numeric[i]
        );
    }
}
