/// 滤波核心共用的线性代数原语
///
/// 提供：
/// - LU 分解（部分主元）求一般方阵的逆
/// - Cholesky 分解（带正定性修复重试）
/// - 特征分解正定修复（仅作为修复兜底使用）

use crate::filters::error::FilterError;
use nalgebra::{DMatrix, SymmetricEigen};

/// 主元绝对值低于该值视为（近似）奇异
const PIVOT_EPSILON: f64 = 1e-12;

/// 特征值低于该下限视为失去正定性
const EIGENVALUE_FLOOR: f64 = 1e-10;

/// 修复时用于替换过小特征值的正常数
const EIGENVALUE_REPLACEMENT: f64 = 1e-6;

/// 求一般方阵的逆
///
/// 通过部分主元 LU 分解实现；主元（近似）为零时返回
/// [`FilterError::SingularMatrix`]，调用方应视为本周期致命错误。
pub fn invert(matrix: &DMatrix<f64>) -> Result<DMatrix<f64>, FilterError> {
    let n = matrix.nrows();
    assert_eq!(n, matrix.ncols(), "invert 只接受方阵");

    let mut lu = matrix.clone();
    let mut perm: Vec<usize> = (0..n).collect();

    for k in 0..n {
        // 选列主元
        let mut pivot_row = k;
        let mut pivot_abs = lu[(k, k)].abs();
        for i in (k + 1)..n {
            let v = lu[(i, k)].abs();
            if v > pivot_abs {
                pivot_abs = v;
                pivot_row = i;
            }
        }
        if pivot_abs < PIVOT_EPSILON {
            return Err(FilterError::SingularMatrix);
        }
        if pivot_row != k {
            lu.swap_rows(pivot_row, k);
            perm.swap(pivot_row, k);
        }

        // 消元，L 因子就地存入下三角
        for i in (k + 1)..n {
            let factor = lu[(i, k)] / lu[(k, k)];
            lu[(i, k)] = factor;
            for j in (k + 1)..n {
                lu[(i, j)] -= factor * lu[(k, j)];
            }
        }
    }

    // 逐列求解 A·x = e_col
    let mut inverse = DMatrix::zeros(n, n);
    let mut y = vec![0.0; n];
    for col in 0..n {
        // 前代：L·y = P·e_col
        for i in 0..n {
            let mut sum = if perm[i] == col { 1.0 } else { 0.0 };
            for j in 0..i {
                sum -= lu[(i, j)] * y[j];
            }
            y[i] = sum;
        }
        // 回代：U·x = y
        for i in (0..n).rev() {
            let mut sum = y[i];
            for j in (i + 1)..n {
                sum -= lu[(i, j)] * inverse[(j, col)];
            }
            inverse[(i, col)] = sum / lu[(i, i)];
        }
    }

    Ok(inverse)
}

/// Cholesky 分解：返回下三角 L，满足 L·Lᵗ = matrix
///
/// 逐列计算。若某对角元的开方参数为负（数值漂移导致失去正定性），
/// 本函数不报错：调用 [`repair_to_positive_definite`] 修复后重试一次。
/// 重试中的残余负值被钳到修复下限，保证总能返回一个因子。
pub fn cholesky_factor(matrix: &DMatrix<f64>) -> DMatrix<f64> {
    match try_cholesky(matrix) {
        Some(l) => l,
        None => {
            let repaired = repair_to_positive_definite(matrix);
            match try_cholesky(&repaired) {
                Some(l) => l,
                // 修复后理论上已正定，这里只兜底舍入残差
                None => clamped_cholesky(&repaired),
            }
        }
    }
}

/// 严格的逐列 Cholesky；遇到负开方参数即返回 None
fn try_cholesky(matrix: &DMatrix<f64>) -> Option<DMatrix<f64>> {
    let n = matrix.nrows();
    let mut l = DMatrix::zeros(n, n);

    for j in 0..n {
        let mut diag = matrix[(j, j)];
        for k in 0..j {
            diag -= l[(j, k)] * l[(j, k)];
        }
        if diag < 0.0 {
            return None;
        }
        let diag_sqrt = diag.sqrt();
        if diag_sqrt < PIVOT_EPSILON {
            return None;
        }
        l[(j, j)] = diag_sqrt;

        for i in (j + 1)..n {
            let mut sum = matrix[(i, j)];
            for k in 0..j {
                sum -= l[(i, k)] * l[(j, k)];
            }
            l[(i, j)] = sum / diag_sqrt;
        }
    }

    Some(l)
}

/// 负开方参数钳到修复下限的 Cholesky 变体，仅作为修复重试的兜底
fn clamped_cholesky(matrix: &DMatrix<f64>) -> DMatrix<f64> {
    let n = matrix.nrows();
    let mut l = DMatrix::zeros(n, n);

    for j in 0..n {
        let mut diag = matrix[(j, j)];
        for k in 0..j {
            diag -= l[(j, k)] * l[(j, k)];
        }
        let diag_sqrt = diag.max(EIGENVALUE_REPLACEMENT).sqrt();
        l[(j, j)] = diag_sqrt;

        for i in (j + 1)..n {
            let mut sum = matrix[(i, j)];
            for k in 0..j {
                sum -= l[(i, k)] * l[(j, k)];
            }
            l[(i, j)] = sum / diag_sqrt;
        }
    }

    l
}

/// 把失去正定性的对称矩阵修复为正定矩阵
///
/// 做法：对称化后特征分解，把低于 1e-10 的特征值替换为 1e-6，
/// 再按 V·D·Vᵗ 重建。这是保近似的启发式修复，不是精确投影。
pub fn repair_to_positive_definite(matrix: &DMatrix<f64>) -> DMatrix<f64> {
    let symmetrized = (matrix + matrix.transpose()) * 0.5;
    let eigen = SymmetricEigen::new(symmetrized);

    let mut eigenvalues = eigen.eigenvalues.clone();
    for value in eigenvalues.iter_mut() {
        if *value < EIGENVALUE_FLOOR {
            *value = EIGENVALUE_REPLACEMENT;
        }
    }

    let v = &eigen.eigenvectors;
    let d = DMatrix::from_diagonal(&eigenvalues);
    let rebuilt = v * d * v.transpose();

    // 重建后再对称化一次，消除乘法舍入
    (&rebuilt + rebuilt.transpose()) * 0.5
}
