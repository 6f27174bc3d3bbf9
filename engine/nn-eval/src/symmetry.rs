//! Board symmetries applied around the forward pass.
//!
//! A symmetry is a 3-bit code: bit 1 flips y, bit 2 flips x, bit 4
//! transposes. Transposition needs a square net, so rectangular nets only
//! use the first four codes.

use engine_core::{features::NUM_SPATIAL_FEATURES, NnInputs};

/// Number of symmetries on a square net.
pub const NUM_SYMMETRIES: u8 = 8;

/// How server threads pick the symmetry for each row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymmetryPolicy {
    /// Always use this symmetry (reduced modulo the usable count).
    Fixed(u8),
    /// Draw uniformly from the usable symmetries per row.
    Random,
}

impl Default for SymmetryPolicy {
    fn default() -> Self {
        SymmetryPolicy::Fixed(0)
    }
}

/// Number of symmetries usable at these net dimensions.
#[inline]
pub fn num_symmetries(nn_x_len: usize, nn_y_len: usize) -> u8 {
    if nn_x_len == nn_y_len {
        NUM_SYMMETRIES
    } else {
        4
    }
}

/// Where point `(x, y)` lands under `symmetry`.
#[inline]
pub fn transform_point(
    symmetry: u8,
    x: usize,
    y: usize,
    nn_x_len: usize,
    nn_y_len: usize,
) -> (usize, usize) {
    let mut x = x;
    let mut y = y;
    if symmetry & 1 != 0 {
        y = nn_y_len - 1 - y;
    }
    if symmetry & 2 != 0 {
        x = nn_x_len - 1 - x;
    }
    if symmetry & 4 != 0 {
        std::mem::swap(&mut x, &mut y);
    }
    (x, y)
}

/// Inputs as seen under `symmetry`: every point's features move to the
/// point's image.
pub fn apply_to_inputs(symmetry: u8, inputs: &NnInputs) -> NnInputs {
    if symmetry == 0 {
        return inputs.clone();
    }
    let (nx, ny) = (inputs.nn_x_len, inputs.nn_y_len);
    let mut out = NnInputs::new(nx, ny);
    out.global.clone_from(&inputs.global);
    for y in 0..ny {
        for x in 0..nx {
            let (tx, ty) = transform_point(symmetry, x, y, nx, ny);
            for f in 0..NUM_SPATIAL_FEATURES {
                out.set_spatial(f, tx, ty, inputs.spatial_at(f, x, y));
            }
            out.legal[ty * nx + tx] = inputs.legal[y * nx + x];
        }
    }
    let pass = nx * ny;
    out.legal[pass] = inputs.legal[pass];
    out
}

/// Map per-point values produced in the transformed orientation back to the
/// original one. `values` holds `nn_x_len * nn_y_len` points, optionally
/// followed by extra trailing entries (such as pass) that are kept in place.
pub fn unapply_to_values(
    symmetry: u8,
    values: &[f32],
    nn_x_len: usize,
    nn_y_len: usize,
) -> Vec<f32> {
    if symmetry == 0 {
        return values.to_vec();
    }
    let area = nn_x_len * nn_y_len;
    let mut out = values.to_vec();
    for y in 0..nn_y_len {
        for x in 0..nn_x_len {
            let (tx, ty) = transform_point(symmetry, x, y, nn_x_len, nn_y_len);
            out[y * nn_x_len + x] = values[ty * nn_x_len + tx];
        }
    }
    debug_assert!(out.len() >= area);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use engine_core::features::spatial;

    #[test]
    fn test_num_symmetries() {
        assert_eq!(num_symmetries(9, 9), 8);
        assert_eq!(num_symmetries(9, 7), 4);
    }

    #[test]
    fn test_transform_point() {
        assert_eq!(transform_point(0, 1, 2, 5, 5), (1, 2));
        assert_eq!(transform_point(1, 1, 2, 5, 5), (1, 2));
        assert_eq!(transform_point(1, 1, 0, 5, 5), (1, 4));
        assert_eq!(transform_point(2, 1, 0, 5, 5), (3, 0));
        assert_eq!(transform_point(4, 1, 0, 5, 5), (0, 1));
        assert_eq!(transform_point(7, 1, 0, 5, 5), (4, 3));
    }

    #[test]
    fn test_apply_then_unapply_restores_points() {
        let mut inputs = NnInputs::new(5, 5);
        inputs.set_spatial(spatial::OWN_STONES, 1, 0, 1.0);
        inputs.legal[3 * 5 + 4] = true;
        inputs.legal[25] = true;

        for sym in 0..NUM_SYMMETRIES {
            let t = apply_to_inputs(sym, &inputs);
            let (tx, ty) = transform_point(sym, 1, 0, 5, 5);
            assert_eq!(t.spatial_at(spatial::OWN_STONES, tx, ty), 1.0);
            assert_eq!(t.num_legal(), 2);
            assert!(t.legal[25]);

            let back = unapply_to_values(sym, t.plane(spatial::OWN_STONES), 5, 5);
            assert_eq!(back.as_slice(), inputs.plane(spatial::OWN_STONES));
        }
    }

    #[test]
    fn test_unapply_keeps_trailing_pass() {
        let mut values = vec![0.0; 10];
        values[0] = 0.5;
        values[9] = 0.25;
        let back = unapply_to_values(3, &values, 3, 3);
        assert_eq!(back[8], 0.5);
        assert_eq!(back[9], 0.25);
    }
}
