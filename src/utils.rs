pub const PROTON: f64 = 1.00727646677;

#[inline]
pub fn mass_charge_ratio(mass: f64, z: i32) -> f64 {
    (mass / (z.abs() as f64)) + z.signum() as f64 * PROTON
}

#[inline]
pub fn neutral_mass(mz: f64, z: i32) -> f64 {
    (mz * z.abs() as f64) - z as f64 * PROTON
}

/// The singly protonated mass (`[M+H]+`) used by the MS2 format's `Z` lines
#[inline]
pub fn protonated_mass(mz: f64, z: i32) -> f64 {
    neutral_mass(mz, z) + PROTON
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_mass_round_trip() {
        let mz = 652.3356;
        for z in 1..5 {
            let mass = neutral_mass(mz, z);
            assert!((mass_charge_ratio(mass, z) - mz).abs() < 1e-9);
        }
        assert!((protonated_mass(mz, 1) - mz).abs() < 1e-9);
    }
}
