//! Discrete wavelet transforms (ISO/IEC 15444-1 Annex F).
//!
//! Separable lifting along rows then columns per level, recursing on LL.
//! Boundaries use whole-sample symmetric extension via index mirroring.
//! The reversible 5/3 path is integer-exact; the irreversible 9/7 path runs
//! in f32 with the standard lifting constants.

/// Reversible 5/3 filter bank, 1-D.
pub struct Dwt53;

impl Dwt53 {
    /// Forward transform of one line. Low-pass samples are the even
    /// positions (`ceil(len/2)` of them), high-pass the odd positions.
    pub fn forward(signal: &[i32], out_l: &mut [i32], out_h: &mut [i32]) {
        let len = signal.len();
        if len == 0 {
            return;
        }
        if len == 1 {
            out_l[0] = signal[0];
            return;
        }
        let mut x = signal.to_vec();

        // Predict: d[n] -= floor((s[n] + s[n+1]) / 2)
        for i in (1..len).step_by(2) {
            let left = x[i - 1];
            let right = if i + 1 < len { x[i + 1] } else { x[i - 1] };
            x[i] -= (left + right) >> 1;
        }
        // Update: s[n] += floor((d[n-1] + d[n] + 2) / 4)
        for i in (0..len).step_by(2) {
            let left = if i > 0 { x[i - 1] } else { x[i + 1] };
            let right = if i + 1 < len { x[i + 1] } else { x[i - 1] };
            x[i] += (left + right + 2) >> 2;
        }

        for (j, i) in (0..len).step_by(2).enumerate() {
            out_l[j] = x[i];
        }
        for (j, i) in (1..len).step_by(2).enumerate() {
            out_h[j] = x[i];
        }
    }

    /// Exact inverse of `forward`.
    pub fn inverse(in_l: &[i32], in_h: &[i32], output: &mut [i32]) {
        let len = output.len();
        if len == 0 {
            return;
        }
        if len == 1 {
            output[0] = in_l[0];
            return;
        }
        let x = output;
        for (j, i) in (0..len).step_by(2).enumerate() {
            x[i] = in_l[j];
        }
        for (j, i) in (1..len).step_by(2).enumerate() {
            x[i] = in_h[j];
        }

        for i in (0..len).step_by(2) {
            let left = if i > 0 { x[i - 1] } else { x[i + 1] };
            let right = if i + 1 < len { x[i + 1] } else { x[i - 1] };
            x[i] -= (left + right + 2) >> 2;
        }
        for i in (1..len).step_by(2) {
            let left = x[i - 1];
            let right = if i + 1 < len { x[i + 1] } else { x[i - 1] };
            x[i] += (left + right) >> 1;
        }
    }
}

/// Irreversible 9/7 filter bank, 1-D.
pub struct Dwt97;

impl Dwt97 {
    const ALPHA: f32 = -1.586_134_3;
    const BETA: f32 = -0.052_980_118;
    const GAMMA: f32 = 0.882_911_1;
    const DELTA: f32 = 0.443_506_85;
    const K: f32 = 1.230_174_1;
    const INV_K: f32 = 1.0 / Self::K;

    pub fn forward(signal: &[f32], out_l: &mut [f32], out_h: &mut [f32]) {
        let len = signal.len();
        if len == 0 {
            return;
        }
        if len == 1 {
            out_l[0] = signal[0];
            return;
        }
        let mut x = signal.to_vec();

        Self::lift_odd(&mut x, Self::ALPHA);
        Self::lift_even(&mut x, Self::BETA);
        Self::lift_odd(&mut x, Self::GAMMA);
        Self::lift_even(&mut x, Self::DELTA);

        for (j, i) in (0..len).step_by(2).enumerate() {
            out_l[j] = x[i] * Self::INV_K;
        }
        for (j, i) in (1..len).step_by(2).enumerate() {
            out_h[j] = x[i] * Self::K;
        }
    }

    pub fn inverse(in_l: &[f32], in_h: &[f32], output: &mut [f32]) {
        let len = output.len();
        if len == 0 {
            return;
        }
        if len == 1 {
            output[0] = in_l[0];
            return;
        }
        let x = output;
        for (j, i) in (0..len).step_by(2).enumerate() {
            x[i] = in_l[j] * Self::K;
        }
        for (j, i) in (1..len).step_by(2).enumerate() {
            x[i] = in_h[j] * Self::INV_K;
        }

        Self::lift_even(x, -Self::DELTA);
        Self::lift_odd(x, -Self::GAMMA);
        Self::lift_even(x, -Self::BETA);
        Self::lift_odd(x, -Self::ALPHA);
    }

    fn lift_odd(x: &mut [f32], weight: f32) {
        let len = x.len();
        for i in (1..len).step_by(2) {
            let left = x[i - 1];
            let right = if i + 1 < len { x[i + 1] } else { x[i - 1] };
            x[i] += weight * (left + right);
        }
    }

    fn lift_even(x: &mut [f32], weight: f32) {
        let len = x.len();
        for i in (0..len).step_by(2) {
            let left = if i > 0 { x[i - 1] } else { x[i + 1] };
            let right = if i + 1 < len { x[i + 1] } else { x[i - 1] };
            x[i] += weight * (left + right);
        }
    }
}

/// One subband buffer.
#[derive(Debug, Clone)]
pub struct Band<T> {
    pub width: usize,
    pub height: usize,
    pub data: Vec<T>,
}

impl<T: Clone + Default> Band<T> {
    fn new(width: usize, height: usize) -> Self {
        Band {
            width,
            height,
            data: vec![T::default(); width * height],
        }
    }
}

/// A full N-level decomposition. `details[k]` holds the HL/LH/HH bands of
/// level `k + 1`; `ll` is the final LL_N.
#[derive(Debug, Clone)]
pub struct Decomposition<T> {
    pub ll: Band<T>,
    pub details: Vec<[Band<T>; 3]>,
}

impl<T> Decomposition<T> {
    pub fn levels(&self) -> usize {
        self.details.len()
    }
}

macro_rules! dwt_2d {
    ($decompose:ident, $reconstruct:ident, $ty:ty, $filter:ident) => {
        pub fn $decompose(plane: &[$ty], width: usize, height: usize, levels: usize) -> Decomposition<$ty> {
            let mut current = Band::<$ty> {
                width,
                height,
                data: plane.to_vec(),
            };
            let mut details = Vec::with_capacity(levels);
            for _ in 0..levels {
                let w = current.width;
                let h = current.height;
                let ll_w = w.div_ceil(2);
                let hl_w = w / 2;
                let ll_h = h.div_ceil(2);
                let lh_h = h / 2;

                // Row pass into [L | H] layout.
                let mut temp = vec![<$ty>::default(); w * h];
                let mut row_l = vec![<$ty>::default(); ll_w];
                let mut row_h = vec![<$ty>::default(); hl_w];
                for y in 0..h {
                    let row = &current.data[y * w..(y + 1) * w];
                    $filter::forward(row, &mut row_l, &mut row_h);
                    temp[y * w..y * w + ll_w].copy_from_slice(&row_l);
                    temp[y * w + ll_w..(y + 1) * w].copy_from_slice(&row_h[..hl_w]);
                }

                // Column pass into quadrants.
                let mut ll = Band::<$ty>::new(ll_w, ll_h);
                let mut hl = Band::<$ty>::new(hl_w, ll_h);
                let mut lh = Band::<$ty>::new(ll_w, lh_h);
                let mut hh = Band::<$ty>::new(hl_w, lh_h);
                let mut col = vec![<$ty>::default(); h];
                let mut col_l = vec![<$ty>::default(); ll_h];
                let mut col_h = vec![<$ty>::default(); lh_h];
                for x in 0..w {
                    for y in 0..h {
                        col[y] = temp[y * w + x];
                    }
                    $filter::forward(&col, &mut col_l, &mut col_h);
                    if x < ll_w {
                        for y in 0..ll_h {
                            ll.data[y * ll_w + x] = col_l[y];
                        }
                        for y in 0..lh_h {
                            lh.data[y * ll_w + x] = col_h[y];
                        }
                    } else {
                        let bx = x - ll_w;
                        for y in 0..ll_h {
                            hl.data[y * hl_w + bx] = col_l[y];
                        }
                        for y in 0..lh_h {
                            hh.data[y * hl_w + bx] = col_h[y];
                        }
                    }
                }

                details.push([hl, lh, hh]);
                current = ll;
            }
            Decomposition {
                ll: current,
                details,
            }
        }

        pub fn $reconstruct(decomposition: &Decomposition<$ty>) -> Band<$ty> {
            let mut current = decomposition.ll.clone();
            for bands in decomposition.details.iter().rev() {
                let [hl, lh, hh] = bands;
                let w = current.width + hl.width;
                let h = current.height + lh.height;
                let ll_w = current.width;
                let ll_h = current.height;

                // Undo the column pass first (forward ran rows then columns).
                let mut temp = vec![<$ty>::default(); w * h];
                let mut col_l = vec![<$ty>::default(); ll_h];
                let mut col_h = vec![<$ty>::default(); lh.height];
                let mut col = vec![<$ty>::default(); h];
                for x in 0..w {
                    if x < ll_w {
                        for y in 0..ll_h {
                            col_l[y] = current.data[y * ll_w + x];
                        }
                        for y in 0..lh.height {
                            col_h[y] = lh.data[y * lh.width + x];
                        }
                    } else {
                        let bx = x - ll_w;
                        for y in 0..ll_h {
                            col_l[y] = hl.data[y * hl.width + bx];
                        }
                        for y in 0..hh.height {
                            col_h[y] = hh.data[y * hh.width + bx];
                        }
                    }
                    $filter::inverse(&col_l, &col_h, &mut col);
                    for y in 0..h {
                        temp[y * w + x] = col[y];
                    }
                }

                // Undo the row pass.
                let mut out = Band::<$ty>::new(w, h);
                let mut row = vec![<$ty>::default(); w];
                for y in 0..h {
                    let row_l = &temp[y * w..y * w + ll_w];
                    let row_h = &temp[y * w + ll_w..(y + 1) * w];
                    $filter::inverse(row_l, row_h, &mut row);
                    out.data[y * w..(y + 1) * w].copy_from_slice(&row);
                }
                current = out;
            }
            current
        }
    };
}

dwt_2d!(decompose_53, reconstruct_53, i32, Dwt53);
dwt_2d!(decompose_97, reconstruct_97, f32, Dwt97);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dwt53_roundtrip_even_and_odd_lines() {
        for input in [
            vec![10, 20, 30, 40, 50, 60, 70, 80],
            vec![10, 20, 30, 40, 50],
            vec![7],
            vec![3, -4],
        ] {
            let l_len = input.len().div_ceil(2);
            let mut l = vec![0i32; l_len];
            let mut h = vec![0i32; input.len() / 2];
            Dwt53::forward(&input, &mut l, &mut h);
            let mut output = vec![0i32; input.len()];
            Dwt53::inverse(&l, &h, &mut output);
            assert_eq!(input, output);
        }
    }

    #[test]
    fn dwt97_roundtrip_within_tolerance() {
        let input: Vec<f32> = (0..23).map(|i| (i as f32 * 0.7).sin() * 100.0).collect();
        let mut l = vec![0f32; input.len().div_ceil(2)];
        let mut h = vec![0f32; input.len() / 2];
        Dwt97::forward(&input, &mut l, &mut h);
        let mut output = vec![0f32; input.len()];
        Dwt97::inverse(&l, &h, &mut output);
        for (a, b) in input.iter().zip(&output) {
            assert!((a - b).abs() < 1e-3, "{a} vs {b}");
        }
    }

    #[test]
    fn multi_level_53_is_exact() {
        // Non-power-of-two dims and negative values.
        let width = 13;
        let height = 9;
        let plane: Vec<i32> = (0..width * height)
            .map(|i| ((i * 31 % 257) as i32) - 128)
            .collect();
        for levels in [1, 2, 3] {
            let decomposition = decompose_53(&plane, width, height, levels);
            let restored = reconstruct_53(&decomposition);
            assert_eq!(restored.width, width);
            assert_eq!(restored.height, height);
            assert_eq!(restored.data, plane, "levels={levels}");
        }
    }

    #[test]
    fn multi_level_97_close() {
        let width = 16;
        let height = 16;
        let plane: Vec<f32> = (0..width * height)
            .map(|i| ((i % 251) as f32) - 125.0)
            .collect();
        let decomposition = decompose_97(&plane, width, height, 3);
        let restored = reconstruct_97(&decomposition);
        for (a, b) in plane.iter().zip(&restored.data) {
            assert!((a - b).abs() < 0.05, "{a} vs {b}");
        }
    }

    #[test]
    fn band_dimensions_follow_ceil_floor_split() {
        let plane = vec![0i32; 13 * 9];
        let d = decompose_53(&plane, 13, 9, 2);
        // Level 1: 13x9 -> LL 7x5, HL 6x5, LH 7x4, HH 6x4
        assert_eq!((d.details[0][0].width, d.details[0][0].height), (6, 5));
        assert_eq!((d.details[0][1].width, d.details[0][1].height), (7, 4));
        assert_eq!((d.details[0][2].width, d.details[0][2].height), (6, 4));
        // Level 2: 7x5 -> LL 4x3
        assert_eq!((d.ll.width, d.ll.height), (4, 3));
    }
}
