//! Index registry
//!
//! Named spectral indices keyed by the band roles they need. Whether an
//! index applies to a raster depends only on its role map.

use serde::Serialize;

use crate::extractor::roles::{BandRole, RoleMap};

/// What an index describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexCategory {
    Vegetation,
    Water,
    Soil,
    Thermal,
    /// Generic band pair indices and correlations
    Spectral,
}

impl IndexCategory {
    pub fn name(&self) -> &'static str {
        match self {
            IndexCategory::Vegetation => "vegetation",
            IndexCategory::Water => "water",
            IndexCategory::Soil => "soil",
            IndexCategory::Thermal => "thermal",
            IndexCategory::Spectral => "spectral",
        }
    }
}

/// Per-pixel formula of a named index
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum IndexFormula {
    /// `(a - b) / (a + b)`
    NormalizedDifference { a: BandRole, b: BandRole },
    /// `a / b`
    Ratio { a: BandRole, b: BandRole },
    /// `(nir - red) / (nir + red + L) * (1 + L)`
    Savi { l: f64 },
    /// `2.5 (nir - red) / (nir + 6 red - 7.5 blue + 1)`
    Evi,
    /// `2.5 (nir - red) / (nir + 2.4 red + 1)`
    Evi2,
    /// `((swir + red) - (nir + blue)) / ((swir + red) + (nir + blue))`
    Bsi,
    /// `(green + red) / (nir + swir)`
    Wri,
    /// Value of the band itself, averaged over the raster
    Mean { role: BandRole },
}

impl IndexFormula {
    /// Roles the formula reads, in the order `evaluate` expects them
    pub fn required_roles(&self) -> Vec<BandRole> {
        use BandRole::*;
        match *self {
            IndexFormula::NormalizedDifference { a, b } | IndexFormula::Ratio { a, b } => vec![a, b],
            IndexFormula::Savi { .. } | IndexFormula::Evi2 => vec![Nir, Red],
            IndexFormula::Evi => vec![Nir, Red, Blue],
            IndexFormula::Bsi => vec![Swir, Red, Nir, Blue],
            IndexFormula::Wri => vec![Green, Red, Nir, Swir],
            IndexFormula::Mean { role } => vec![role],
        }
    }

    /// Evaluate for one pixel
    ///
    /// # Arguments
    /// * `v` - Valid band values in `required_roles` order
    /// * `epsilon` - Denominators with `|d| <= epsilon` are undefined
    ///
    /// # Returns
    /// The index value, or None where it is undefined
    pub fn evaluate(&self, v: &[f64], epsilon: f64) -> Option<f64> {
        match *self {
            IndexFormula::NormalizedDifference { .. } => normalized_difference(v[0], v[1], epsilon),
            IndexFormula::Ratio { .. } => divide(v[0], v[1], epsilon),
            IndexFormula::Savi { l } => divide(v[0] - v[1], v[0] + v[1] + l, epsilon).map(|x| x * (1.0 + l)),
            IndexFormula::Evi => divide(2.5 * (v[0] - v[1]), v[0] + 6.0 * v[1] - 7.5 * v[2] + 1.0, epsilon),
            IndexFormula::Evi2 => divide(2.5 * (v[0] - v[1]), v[0] + 2.4 * v[1] + 1.0, epsilon),
            IndexFormula::Bsi => normalized_difference(v[0] + v[1], v[2] + v[3], epsilon),
            IndexFormula::Wri => divide(v[0] + v[1], v[2] + v[3], epsilon),
            IndexFormula::Mean { .. } => Some(v[0]).filter(|x| x.is_finite()),
        }
    }
}

/// `num / den`, None for a near-zero denominator or a non-finite result
#[inline]
pub fn divide(num: f64, den: f64, epsilon: f64) -> Option<f64> {
    if den.abs() <= epsilon {
        return None;
    }
    Some(num / den).filter(|x| x.is_finite())
}

#[inline]
pub fn normalized_difference(a: f64, b: f64, epsilon: f64) -> Option<f64> {
    divide(a - b, a + b, epsilon)
}

/// A named index
#[derive(Debug, Clone, PartialEq)]
pub struct IndexDefinition {
    pub name: &'static str,
    pub category: IndexCategory,
    pub formula: IndexFormula,
}

impl IndexDefinition {
    /// Whether every required role has a band
    pub fn applicable(&self, roles: &RoleMap) -> bool {
        self.formula.required_roles().iter().all(|r| roles.contains(*r))
    }

    /// 1-based input bands, in `required_roles` order
    ///
    /// Roles without a band are left out, so check `applicable` first.
    pub fn input_bands(&self, roles: &RoleMap) -> Vec<usize> {
        self.formula.required_roles().iter().filter_map(|r| roles.band(*r)).collect()
    }
}

/// All named indices
///
/// # Arguments
/// * `savi_l` - Soil brightness correction factor of SAVI
pub fn registry(savi_l: f64) -> Vec<IndexDefinition> {
    use BandRole::*;
    use IndexCategory::*;
    use IndexFormula::*;

    let def = |name, category, formula| IndexDefinition { name, category, formula };
    vec![
        def("ndvi", Vegetation, NormalizedDifference { a: Nir, b: Red }),
        def("savi", Vegetation, Savi { l: savi_l }),
        def("evi", Vegetation, Evi),
        def("evi2", Vegetation, Evi2),
        def("rvi", Vegetation, Ratio { a: Nir, b: Red }),
        def("gndvi", Vegetation, NormalizedDifference { a: Nir, b: Green }),
        def("ndre", Vegetation, NormalizedDifference { a: Nir, b: RedEdge }),
        def("ndwi", Water, NormalizedDifference { a: Green, b: Nir }),
        def("mndwi", Water, NormalizedDifference { a: Green, b: Swir }),
        def("wri", Water, Wri),
        def("ndbi", Soil, NormalizedDifference { a: Swir, b: Nir }),
        def("bsi", Soil, Bsi),
        def("nbr", Soil, NormalizedDifference { a: Nir, b: Swir2 }),
        def("thermal_mean", IndexCategory::Thermal, Mean { role: BandRole::Thermal }),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn find(name: &str) -> IndexDefinition {
        registry(0.5).into_iter().find(|d| d.name == name).unwrap()
    }

    #[test]
    fn test_registry_names_are_unique() {
        let defs = registry(0.5);
        let mut names: Vec<&str> = defs.iter().map(|d| d.name).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), defs.len());
        assert_eq!(defs.len(), 14);
    }

    #[test]
    fn test_ndvi_value() {
        let ndvi = find("ndvi");
        let value = ndvi.formula.evaluate(&[200.0, 100.0], 1e-10).unwrap();
        assert!((value - 1.0 / 3.0).abs() < 1e-12);
        assert_eq!(ndvi.formula.evaluate(&[0.0, 0.0], 1e-10), None);
    }

    #[test]
    fn test_savi_and_evi() {
        let savi = find("savi").formula.evaluate(&[0.5, 0.1], 1e-10).unwrap();
        assert!((savi - 0.4 / 1.1 * 1.5).abs() < 1e-12);
        let evi = find("evi").formula.evaluate(&[0.5, 0.1, 0.05], 1e-10).unwrap();
        assert!((evi - 2.5 * 0.4 / (0.5 + 0.6 - 0.375 + 1.0)).abs() < 1e-12);
    }

    #[test]
    fn test_applicability_depends_on_roles() {
        let rgb = RoleMap::from_roles(&[BandRole::Red, BandRole::Green, BandRole::Blue]);
        assert!(!find("ndvi").applicable(&rgb));

        let rgbn = RoleMap::from_roles(&[BandRole::Red, BandRole::Green, BandRole::Blue, BandRole::Nir]);
        let ndvi = find("ndvi");
        assert!(ndvi.applicable(&rgbn));
        assert_eq!(ndvi.input_bands(&rgbn), vec![4, 1]);
        assert!(find("evi").applicable(&rgbn));
        assert!(!find("bsi").applicable(&rgbn));
    }
}
