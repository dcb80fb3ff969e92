// Copyright (C) 2023 setzer22 and contributors
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! A hashable, bit-exact wrapper around `DVec3`, used as a `HashMap` key
//! for point deduplication. Unlike `blackjack_commons`'s `Vec3Ord` (which
//! orders through `float_ord::FloatOrd` for a total NaN-aware order), this
//! compares by the raw bit pattern of each lane: two points merge only if
//! every coordinate is bit-for-bit identical.

use glam::DVec3;

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct PointKey([u64; 3]);

pub trait ToPointKey {
    fn to_point_key(&self) -> PointKey;
}

impl ToPointKey for DVec3 {
    fn to_point_key(&self) -> PointKey {
        PointKey([self.x.to_bits(), self.y.to_bits(), self.z.to_bits()])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_points_hash_equal() {
        let a = DVec3::new(1.0, 2.0, 3.0).to_point_key();
        let b = DVec3::new(1.0, 2.0, 3.0).to_point_key();
        assert_eq!(a, b);
    }

    #[test]
    fn negative_zero_is_distinct_from_zero() {
        let a = DVec3::new(0.0, 0.0, 0.0).to_point_key();
        let b = DVec3::new(-0.0, 0.0, 0.0).to_point_key();
        assert_ne!(a, b);
    }
}
