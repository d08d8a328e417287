use std::ops::{Index, IndexMut};

/// Row-major 2-D image plane.
#[derive(Debug, Clone, PartialEq)]
pub struct Plane<T> {
    pixels: Vec<T>,
    width: usize,
    height: usize,
}

impl<T> Plane<T> {
    pub fn new(width: usize, height: usize, pixels: Vec<T>) -> Self {
        assert_eq!(
            pixels.len(),
            width * height,
            "pixels length must equal width * height"
        );
        Self {
            pixels,
            width,
            height,
        }
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.pixels.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.pixels.is_empty()
    }

    /// `(width, height)`.
    #[inline]
    pub fn shape(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    #[inline]
    pub fn same_shape<U>(&self, other: &Plane<U>) -> bool {
        self.shape() == other.shape()
    }

    #[inline]
    pub fn pixels(&self) -> &[T] {
        &self.pixels
    }

    #[inline]
    pub fn pixels_mut(&mut self) -> &mut [T] {
        &mut self.pixels
    }
}

impl<T: Clone> Plane<T> {
    pub fn new_filled(width: usize, height: usize, value: T) -> Self {
        Self {
            pixels: vec![value; width * height],
            width,
            height,
        }
    }

    /// Sets every pixel of the box `[cx - half, cx + half] x [cy - half, cy + half]`
    /// that lies inside the plane.
    pub fn fill_box(&mut self, cx: i64, cy: i64, half: i64, value: T) {
        let x0 = cx.saturating_sub(half).max(0);
        let y0 = cy.saturating_sub(half).max(0);
        let x1 = cx.saturating_add(half).min(self.width as i64 - 1);
        let y1 = cy.saturating_add(half).min(self.height as i64 - 1);
        for y in y0..=y1 {
            for x in x0..=x1 {
                self[(x as usize, y as usize)] = value.clone();
            }
        }
    }
}

impl<T> Index<(usize, usize)> for Plane<T> {
    type Output = T;

    #[inline]
    fn index(&self, (x, y): (usize, usize)) -> &Self::Output {
        &self.pixels[y * self.width + x]
    }
}

impl<T> IndexMut<(usize, usize)> for Plane<T> {
    #[inline]
    fn index_mut(&mut self, (x, y): (usize, usize)) -> &mut Self::Output {
        &mut self.pixels[y * self.width + x]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_is_row_major() {
        let plane = Plane::new(3, 2, vec![0, 1, 2, 3, 4, 5]);
        assert_eq!(plane[(0, 0)], 0);
        assert_eq!(plane[(2, 0)], 2);
        assert_eq!(plane[(0, 1)], 3);
        assert_eq!(plane[(2, 1)], 5);
    }

    #[test]
    #[should_panic(expected = "pixels length must equal width * height")]
    fn test_mismatched_length_panics() {
        let _ = Plane::new(3, 3, vec![0u8; 4]);
    }

    #[test]
    fn test_fill_box_clips_at_edges() {
        let mut plane = Plane::new_filled(5, 5, false);
        plane.fill_box(0, 0, 1, true);
        let set: Vec<(usize, usize)> = (0..5)
            .flat_map(|y| (0..5).map(move |x| (x, y)))
            .filter(|&(x, y)| plane[(x, y)])
            .collect();
        assert_eq!(set, vec![(0, 0), (1, 0), (0, 1), (1, 1)]);
    }

    #[test]
    fn test_fill_box_outside_plane_is_noop() {
        let mut plane = Plane::new_filled(4, 4, 0u8);
        plane.fill_box(20, -20, 2, 1);
        assert!(plane.pixels().iter().all(|&v| v == 0));
    }

    #[test]
    fn test_fill_box_saturates_extreme_centres() {
        let mut plane = Plane::new_filled(4, 4, 0u8);
        plane.fill_box(i64::MIN, 2, 5, 1);
        plane.fill_box(i64::MAX, i64::MAX, 5, 1);
        assert!(plane.pixels().iter().all(|&v| v == 0));
    }
}
