// swimmer_core/src/utils/tensor.rs

//! Rank-3 tensor helpers. Dense matrices stay in `nalgebra`; third-order objects
//! (∇Σ, ∇M, N1, N2, N3) live in `ndarray` and are contracted here.
//!
//! Contractions are named after their index pattern, e.g. `contract_ilk_lj` computes
//! `R_ijk = Σ_l T_ilk · m_lj`. Slice-wise products are dispatched with `Zip::par_for_each`,
//! so they run on whichever rayon pool is installed by the caller.

use nalgebra::{DMatrix, DVector};
use ndarray::{Array2, Array3, Axis, Zip};

pub type Tensor3 = Array3<f64>;

// --- Conversions ---

pub fn to_array2(m: &DMatrix<f64>) -> Array2<f64> {
    Array2::from_shape_fn((m.nrows(), m.ncols()), |(i, j)| m[(i, j)])
}

/// Outer product `a ⊗ b`.
pub fn outer(a: &DVector<f64>, b: &DVector<f64>) -> DMatrix<f64> {
    a * b.transpose()
}

// --- Tensor ⊗ Matrix Contractions ---

/// `R_ijk = Σ_l T_ijl · m_kl`
pub fn contract_ijl_kl(t: &Tensor3, m: &DMatrix<f64>) -> Tensor3 {
    let (di, dj, dl) = t.dim();
    debug_assert_eq!(dl, m.ncols());
    let m_t = to_array2(&m.transpose());
    let mut out = Tensor3::zeros((di, dj, m.nrows()));
    Zip::from(out.axis_iter_mut(Axis(0)))
        .and(t.axis_iter(Axis(0)))
        .par_for_each(|mut slice, t_i| slice.assign(&t_i.dot(&m_t)));
    out
}

/// `R_ijk = Σ_l m_il · T_ljk`
pub fn contract_il_ljk(m: &DMatrix<f64>, t: &Tensor3) -> Tensor3 {
    let (dl, dj, dk) = t.dim();
    debug_assert_eq!(dl, m.ncols());
    let m = to_array2(m);
    let mut out = Tensor3::zeros((m.nrows(), dj, dk));
    Zip::from(out.axis_iter_mut(Axis(1)))
        .and(t.axis_iter(Axis(1)))
        .par_for_each(|mut slice, t_j| slice.assign(&m.dot(&t_j)));
    out
}

/// `R_ijk = Σ_l T_ilk · m_lj`
pub fn contract_ilk_lj(t: &Tensor3, m: &DMatrix<f64>) -> Tensor3 {
    let (di, dl, dk) = t.dim();
    debug_assert_eq!(dl, m.nrows());
    let m = to_array2(m);
    let mut out = Tensor3::zeros((di, m.ncols(), dk));
    Zip::from(out.axis_iter_mut(Axis(2)))
        .and(t.axis_iter(Axis(2)))
        .par_for_each(|mut slice, t_k| slice.assign(&t_k.dot(&m)));
    out
}

/// `R_ijk = Σ_l m_il · T_jlk`
pub fn contract_il_jlk(m: &DMatrix<f64>, t: &Tensor3) -> Tensor3 {
    let (dj, dl, dk) = t.dim();
    debug_assert_eq!(dl, m.ncols());
    let m = to_array2(m);
    let mut out = Tensor3::zeros((m.nrows(), dj, dk));
    Zip::from(out.axis_iter_mut(Axis(1)))
        .and(t.axis_iter(Axis(0)))
        .par_for_each(|mut slice, t_j| slice.assign(&m.dot(&t_j)));
    out
}

// --- Tensor : Matrix → Vector Contractions ---

/// `v_i = Σ_jk T_ijk · a_jk`
pub fn contract_ijk_jk(t: &Tensor3, a: &DMatrix<f64>) -> DVector<f64> {
    let a = to_array2(a);
    let values: Vec<f64> = t
        .axis_iter(Axis(0))
        .map(|t_i| (&t_i * &a).sum())
        .collect();
    DVector::from_vec(values)
}

/// `v_i = Σ_jk T_jik · a_jk`
pub fn contract_jik_jk(t: &Tensor3, a: &DMatrix<f64>) -> DVector<f64> {
    let a = to_array2(a);
    let values: Vec<f64> = t
        .axis_iter(Axis(1))
        .map(|t_i| (&t_i * &a).sum())
        .collect();
    DVector::from_vec(values)
}

/// `v_i = Σ_jk T_jki · a_jk`
pub fn contract_jki_jk(t: &Tensor3, a: &DMatrix<f64>) -> DVector<f64> {
    let a = to_array2(a);
    let values: Vec<f64> = t
        .axis_iter(Axis(2))
        .map(|t_i| (&t_i * &a).sum())
        .collect();
    DVector::from_vec(values)
}
