// Floating point comparisons and surface-offset nudging
pub const EPSILON: f64 = 0.0001;

// Maximum reflection/refraction recursion depth
pub const RECURSION_DEPTH: usize = 5;

// Common refractive indices
pub const VACUUM_RI: f64 = 1.0;
pub const AIR_RI: f64 = 1.00029;
pub const WATER_RI: f64 = 1.333;
pub const GLASS_RI: f64 = 1.5;
pub const DIAMOND_RI: f64 = 2.417;
