//! Small fixed-size linear algebra for the 2-D solvers
//!
//! All normal matrices in this crate are symmetric 2x2, so instead of a
//! general decomposition the helpers here use the closed-form symmetric
//! eigen-decomposition. That gives the pseudo-inverse (and therefore the
//! minimum-norm solution of rank-deficient systems) directly.

/// Matrix type using const generics
pub type Matrix<const R: usize, const C: usize> = [[f64; C]; R];

/// Square matrix type
pub type SquareMatrix<const N: usize> = Matrix<N, N>;

/// Vector type
pub type Vector<const N: usize> = [f64; N];

/// 2x2 matrix
pub type Matrix2 = SquareMatrix<2>;

/// Relative eigenvalue floor below which a direction counts as unobservable
pub const RANK_TOLERANCE: f64 = 1e-9;

/// Matrix-vector multiplication: y = A × x
pub fn matvec<const R: usize, const C: usize>(matrix: &Matrix<R, C>, vector: &Vector<C>) -> Vector<R> {
    let mut result = [0.0; R];
    for i in 0..R {
        for j in 0..C {
            result[i] += matrix[i][j] * vector[j];
        }
    }
    result
}

/// Accumulate `weight × v vᵀ` into `matrix`
pub fn add_outer<const N: usize>(matrix: &mut SquareMatrix<N>, v: &Vector<N>, weight: f64) {
    for i in 0..N {
        for j in 0..N {
            matrix[i][j] += weight * v[i] * v[j];
        }
    }
}

/// Make matrix symmetric: A = (A + Aᵀ) / 2
pub fn make_symmetric<const N: usize>(matrix: &mut SquareMatrix<N>) {
    for i in 0..N {
        for j in i + 1..N {
            let avg = (matrix[i][j] + matrix[j][i]) * 0.5;
            matrix[i][j] = avg;
            matrix[j][i] = avg;
        }
    }
}

/// Sum of the diagonal
pub fn trace<const N: usize>(matrix: &SquareMatrix<N>) -> f64 {
    (0..N).map(|i| matrix[i][i]).sum()
}

/// Eigen-decomposition of a symmetric 2x2 matrix
///
/// Returns eigenvalues in descending order and the matching unit
/// eigenvectors.
pub fn symmetric_eigen(m: &Matrix2) -> ([f64; 2], [Vector<2>; 2]) {
    let a = m[0][0];
    let b = 0.5 * (m[0][1] + m[1][0]);
    let c = m[1][1];

    let mean = 0.5 * (a + c);
    let radius = (0.5 * (a - c)).hypot(b);
    let l1 = mean + radius;
    let l2 = mean - radius;

    let v1 = if b.abs() > f64::EPSILON * (a.abs() + c.abs()).max(f64::MIN_POSITIVE) {
        let (x, y) = (l1 - c, b);
        let norm = x.hypot(y);
        [x / norm, y / norm]
    } else if a >= c {
        [1.0, 0.0]
    } else {
        [0.0, 1.0]
    };
    let v2 = [-v1[1], v1[0]];

    ([l1, l2], [v1, v2])
}

/// Moore-Penrose pseudo-inverse of a symmetric positive semi-definite 2x2
///
/// Eigen-directions whose eigenvalue is below `RANK_TOLERANCE × λ_max` are
/// dropped. Returns the pseudo-inverse and the numerical rank.
pub fn pseudo_inverse(m: &Matrix2) -> (Matrix2, usize) {
    let (values, vectors) = symmetric_eigen(m);
    let mut result = [[0.0; 2]; 2];
    let mut rank = 0;

    let largest = values[0].abs();
    if !(largest.is_finite() && largest > 0.0) {
        return (result, 0);
    }
    for (value, vector) in values.iter().zip(vectors.iter()) {
        if *value > RANK_TOLERANCE * largest {
            add_outer(&mut result, vector, 1.0 / value);
            rank += 1;
        }
    }
    make_symmetric(&mut result);
    (result, rank)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn eigen_of_diagonal() {
        let (values, vectors) = symmetric_eigen(&[[1.0, 0.0], [0.0, 3.0]]);
        assert!(approx(values[0], 3.0));
        assert!(approx(values[1], 1.0));
        assert!(approx(vectors[0][1].abs(), 1.0));
    }

    #[test]
    fn eigen_reconstructs() {
        let m = [[4.0, 1.0], [1.0, 2.0]];
        let (values, vectors) = symmetric_eigen(&m);
        let mut rebuilt = [[0.0; 2]; 2];
        for (value, vector) in values.iter().zip(vectors.iter()) {
            add_outer(&mut rebuilt, vector, *value);
        }
        for i in 0..2 {
            for j in 0..2 {
                assert!(approx(rebuilt[i][j], m[i][j]));
            }
        }
    }

    #[test]
    fn pseudo_inverse_full_rank_is_inverse() {
        let m = [[4.0, 1.0], [1.0, 2.0]];
        let (inv, rank) = pseudo_inverse(&m);
        assert_eq!(rank, 2);
        let x = matvec(&m, &matvec(&inv, &[1.0, -2.0]));
        assert!(approx(x[0], 1.0));
        assert!(approx(x[1], -2.0));
    }

    #[test]
    fn pseudo_inverse_rank_one() {
        // all information along x
        let m = [[2.0, 0.0], [0.0, 0.0]];
        let (inv, rank) = pseudo_inverse(&m);
        assert_eq!(rank, 1);
        assert!(approx(inv[0][0], 0.5));
        assert!(approx(inv[1][1], 0.0));

        let (zero, rank) = pseudo_inverse(&[[0.0; 2]; 2]);
        assert_eq!(rank, 0);
        assert_eq!(zero, [[0.0; 2]; 2]);
    }

    #[test]
    fn trace_and_symmetry() {
        let mut m = [[1.0, 2.0], [4.0, 5.0]];
        make_symmetric(&mut m);
        assert_eq!(m[0][1], 3.0);
        assert_eq!(trace(&m), 6.0);
    }
}
