//! Point index → state texel lookup.

use glam::{UVec2, Vec2};

/// Fixed mapping from render point index to the center of its state texel.
///
/// Point `i` lives at texel `(i mod size, i div size)`. Addressing texel
/// centers keeps filtered lookups from bleeding into neighbours.
#[derive(Debug, Clone, PartialEq)]
pub struct UvMap {
    size: u32,
    uvs: Vec<Vec2>,
}

impl UvMap {
    /// Build the map for `count` particles on a `size` x `size` grid.
    ///
    /// # Panics
    ///
    /// Panics if the grid cannot hold `count` texels.
    pub fn new(count: u32, size: u32) -> Self {
        assert!(
            (size as u64) * (size as u64) >= count as u64,
            "{}x{} grid cannot hold {} particles",
            size,
            size,
            count
        );
        let inv = 1.0 / size as f32;
        let uvs = (0..count)
            .map(|i| {
                let x = i % size;
                let y = i / size;
                Vec2::new((x as f32 + 0.5) * inv, (y as f32 + 0.5) * inv)
            })
            .collect();
        Self { size, uvs }
    }

    pub fn len(&self) -> usize {
        self.uvs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.uvs.is_empty()
    }

    /// Grid side the map was built for.
    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn uvs(&self) -> &[Vec2] {
        &self.uvs
    }

    pub fn uv(&self, index: usize) -> Vec2 {
        self.uvs[index]
    }

    /// The texel a UV addresses (the inverse of the mapping).
    pub fn texel_of(&self, uv: Vec2) -> UVec2 {
        let size = self.size as f32;
        UVec2::new(
            ((uv.x * size).floor() as u32).min(self.size - 1),
            ((uv.y * size).floor() as u32).min(self.size - 1),
        )
    }

    /// Raw bytes for a `Float32x2` vertex buffer.
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.uvs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::gpu_size;
    use std::collections::HashSet;

    #[test]
    fn test_texel_centers() {
        let map = UvMap::new(5, 3);
        assert_eq!(map.uv(0), Vec2::new(0.5 / 3.0, 0.5 / 3.0));
        assert_eq!(map.uv(4), Vec2::new(1.5 / 3.0, 1.5 / 3.0));
    }

    #[test]
    fn test_bijective_row_major_for_many_counts() {
        for count in (1..600u32).chain([1683, 1764, 1765, 4096]) {
            let size = gpu_size(count);
            let map = UvMap::new(count, size);
            assert_eq!(map.len(), count as usize);

            let mut seen = HashSet::new();
            for (i, &uv) in map.uvs().iter().enumerate() {
                let texel = map.texel_of(uv);
                let index = texel.y * size + texel.x;
                assert_eq!(index, i as u32, "count {} point {}", count, i);
                assert!(index < count);
                assert!(seen.insert((uv.x.to_bits(), uv.y.to_bits())));
            }
        }
    }

    #[test]
    fn test_1683_points() {
        let map = UvMap::new(1683, 42);
        let last = map.texel_of(map.uv(1682));
        assert_eq!(last, UVec2::new(1682 % 42, 1682 / 42));
        assert_eq!(last, UVec2::new(2, 40));
    }

    #[test]
    #[should_panic]
    fn test_grid_too_small_panics() {
        UvMap::new(10, 3);
    }
}
