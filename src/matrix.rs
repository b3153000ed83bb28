/*
 * File: /matrix.rs
 * Created Date: Thursday November 23rd 2023
 * Author: Zihan
 * -----
 * Last Modified: Friday, 16th October 2026 3:02:11 pm
 * Modified By: the developer formerly known as Zihan at <wzh4464@gmail.com>
 * -----
 * HISTORY:
 * Date      		By   	Comments
 * ----------		------	---------------------------------------------------------
 * 2026-10-16		Zihan	Row accessors and flat-buffer views for the QoS solver
 */

use std::ops::{Index, IndexMut};

use ndarray::{Array2, ArrayView2, ArrayViewMut2};

/// Owned dense row-major matrix with its dimensions.
#[derive(Debug, Clone, PartialEq)]
pub struct Matrix<T> {
    pub data: Array2<T>,
    pub rows: usize,
    pub cols: usize,
}

impl<T> Matrix<T> {
    // constructor with Array2<T>
    pub fn new(data: Array2<T>) -> Matrix<T> {
        let rows = data.nrows();
        let cols = data.ncols();
        Matrix { data, rows, cols }
    }

    pub fn view(&self) -> ArrayView2<'_, T> {
        self.data.view()
    }
}

impl<T> Matrix<T>
where
    T: Clone + Default,
{
    /// Filled with `T::default()`, i.e. the missing sentinel 0.0 for floats
    pub fn zeros(rows: usize, cols: usize) -> Matrix<T> {
        Matrix::new(Array2::from_elem((rows, cols), T::default()))
    }
}

impl<T> Index<(usize, usize)> for Matrix<T> {
    type Output = T;

    fn index(&self, index: (usize, usize)) -> &Self::Output {
        let (row, col) = index;
        &self.data[(row, col)]
    }
}

impl<T> IndexMut<(usize, usize)> for Matrix<T> {
    fn index_mut(&mut self, index: (usize, usize)) -> &mut Self::Output {
        let (row, col) = index;
        &mut self.data[(row, col)]
    }
}

/// Borrow a flat row-major buffer as a `rows x cols` view without copying.
/// Returns `None` if the buffer length does not match; callers must check.
pub fn view<T>(buffer: &[T], rows: usize, cols: usize) -> Option<ArrayView2<'_, T>> {
    if rows.checked_mul(cols)? != buffer.len() {
        return None;
    }
    ArrayView2::from_shape((rows, cols), buffer).ok()
}

/// Mutable counterpart of [`view`].
pub fn view_mut<T>(buffer: &mut [T], rows: usize, cols: usize) -> Option<ArrayViewMut2<'_, T>> {
    if rows.checked_mul(cols)? != buffer.len() {
        return None;
    }
    ArrayViewMut2::from_shape((rows, cols), buffer).ok()
}
