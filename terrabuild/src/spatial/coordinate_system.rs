//! Coordinate system references.
//!
//! The engine never performs projection math itself; it only needs to know
//! what *kind* of coordinate system a definition describes and whether two
//! definitions describe the same system. Both questions are answered from
//! the definition text (WKT1, WKT2 or an `AUTHORITY:CODE` string).

use std::fmt;

/// Broad classification of a coordinate system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CoordinateSystemKind {
    /// Longitude/latitude in angular units.
    Geographic,
    /// Planar map projection in linear units.
    Projected,
    /// Earth-centred cartesian.
    Geocentric,
    /// Local engineering frame.
    Local,
}

/// A coordinate system definition.
///
/// Equality of two definitions is *semantic*: see
/// [`is_equivalent`](CoordinateSystem::is_equivalent).
///
/// # Example
///
/// ```
/// use terrabuild::spatial::{CoordinateSystem, CoordinateSystemKind};
///
/// let wkt = CoordinateSystem::new(
///     r#"GEOGCS["WGS 84",DATUM["WGS_1984"],AUTHORITY["EPSG","4326"]]"#,
/// );
/// let code = CoordinateSystem::new("EPSG:4326");
///
/// assert_eq!(wkt.kind(), CoordinateSystemKind::Geographic);
/// assert!(wkt.is_equivalent(&code));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CoordinateSystem {
    definition: String,
}

impl CoordinateSystem {
    /// Wrap a coordinate system definition.
    pub fn new(definition: impl Into<String>) -> Self {
        Self {
            definition: definition.into(),
        }
    }

    /// WGS84 geographic coordinates.
    pub fn wgs84() -> Self {
        Self::new("EPSG:4326")
    }

    /// The raw definition text.
    pub fn definition(&self) -> &str {
        &self.definition
    }

    /// Returns true if the definition is blank.
    pub fn is_empty(&self) -> bool {
        self.definition.trim().is_empty()
    }

    /// Classify the coordinate system.
    ///
    /// Unrecognised definitions are treated as projected.
    pub fn kind(&self) -> CoordinateSystemKind {
        let normalized = normalize(&self.definition);

        if normalized.starts_with("GEOCCS") {
            return CoordinateSystemKind::Geocentric;
        }
        if normalized.starts_with("GEOGCS") || normalized.starts_with("GEOGCRS") {
            return CoordinateSystemKind::Geographic;
        }
        if normalized.starts_with("PROJCS") || normalized.starts_with("PROJCRS") {
            return CoordinateSystemKind::Projected;
        }
        if normalized.starts_with("LOCAL_CS") || normalized.starts_with("ENGCRS") {
            return CoordinateSystemKind::Local;
        }

        match canonical_code(&normalized).as_deref() {
            Some("EPSG:4326") | Some("EPSG:4269") | Some("EPSG:4258") => {
                CoordinateSystemKind::Geographic
            }
            Some("EPSG:4978") => CoordinateSystemKind::Geocentric,
            _ => CoordinateSystemKind::Projected,
        }
    }

    /// Returns true if this is a geographic (degrees) coordinate system.
    pub fn is_geographic(&self) -> bool {
        self.kind() == CoordinateSystemKind::Geographic
    }

    /// Test whether two definitions describe the same coordinate system.
    ///
    /// Comparison order:
    /// 1. identical text
    /// 2. identical text after whitespace and case normalisation
    /// 3. identical root authority code (`EPSG:4326` matches a WKT whose
    ///    outermost `AUTHORITY`/`ID` clause is `EPSG 4326`, and common
    ///    aliases such as `WGS84`)
    pub fn is_equivalent(&self, other: &CoordinateSystem) -> bool {
        if self.definition == other.definition {
            return true;
        }
        if self.is_empty() || other.is_empty() {
            return false;
        }

        let lhs = normalize(&self.definition);
        let rhs = normalize(&other.definition);
        if lhs == rhs {
            return true;
        }

        match (canonical_code(&lhs), canonical_code(&rhs)) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }

    /// Stable key used to cache per-coordinate-system data.
    pub fn cache_key(&self) -> String {
        let normalized = normalize(&self.definition);
        canonical_code(&normalized).unwrap_or(normalized)
    }
}

impl fmt::Display for CoordinateSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let normalized = normalize(&self.definition);
        match canonical_code(&normalized) {
            Some(code) => write!(f, "{}", code),
            None if self.definition.chars().count() > 48 => {
                let head: String = self.definition.chars().take(48).collect();
                write!(f, "{}...", head)
            }
            None => write!(f, "{}", self.definition),
        }
    }
}

impl From<&str> for CoordinateSystem {
    fn from(definition: &str) -> Self {
        Self::new(definition)
    }
}

/// Uppercase, with whitespace removed.
fn normalize(definition: &str) -> String {
    definition
        .chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_uppercase)
        .collect()
}

/// Resolve a normalized definition to an `AUTHORITY:CODE` key.
fn canonical_code(normalized: &str) -> Option<String> {
    match normalized {
        "WGS84" | "CRS84" | "OGC:CRS84" | "EPSG:4326" => return Some("EPSG:4326".to_string()),
        _ => {}
    }

    if let Some((authority, code)) = normalized.split_once(':') {
        let is_code = !code.is_empty() && code.chars().all(|c| c.is_ascii_digit());
        if is_code && authority.chars().all(|c| c.is_ascii_alphabetic()) {
            return Some(format!("{}:{}", authority, code));
        }
    }

    root_authority(normalized)
}

/// Find the `AUTHORITY[..]` or `ID[..]` clause attached to the outermost node.
fn root_authority(normalized: &str) -> Option<String> {
    let mut depth = 0usize;
    let mut in_quotes = false;
    let bytes = normalized.as_bytes();
    let mut found = None;

    for (i, &b) in bytes.iter().enumerate() {
        match b {
            b'"' => in_quotes = !in_quotes,
            b'[' | b'(' if !in_quotes => depth += 1,
            b']' | b')' if !in_quotes => depth = depth.saturating_sub(1),
            b',' if !in_quotes && depth == 1 => {
                let rest = &normalized[i + 1..];
                let clause = rest
                    .strip_prefix("AUTHORITY[")
                    .or_else(|| rest.strip_prefix("ID["));
                if let Some(clause) = clause {
                    found = parse_authority_clause(clause);
                }
            }
            _ => {}
        }
    }

    found
}

/// Parse `"EPSG","4326"]` or `"EPSG",4326]`.
fn parse_authority_clause(clause: &str) -> Option<String> {
    let end = clause.find(']')?;
    let mut parts = clause[..end].split(',');
    let authority = parts.next()?.trim_matches('"');
    let code = parts.next()?.trim_matches('"');
    if authority.is_empty() || code.is_empty() {
        return None;
    }
    Some(format!("{}:{}", authority, code))
}

#[cfg(test)]
mod tests {
    use super::*;

    const WGS84_WKT: &str = r#"GEOGCS["WGS 84",
        DATUM["WGS_1984",SPHEROID["WGS 84",6378137,298.257223563,AUTHORITY["EPSG","7030"]],AUTHORITY["EPSG","6326"]],
        PRIMEM["Greenwich",0],UNIT["degree",0.0174532925199433],AUTHORITY["EPSG","4326"]]"#;

    const UTM32_WKT: &str = r#"PROJCS["WGS 84 / UTM zone 32N",GEOGCS["WGS 84",AUTHORITY["EPSG","4326"]],
        PROJECTION["Transverse_Mercator"],AUTHORITY["EPSG","32632"]]"#;

    #[test]
    fn test_kind_from_wkt() {
        assert_eq!(
            CoordinateSystem::new(WGS84_WKT).kind(),
            CoordinateSystemKind::Geographic
        );
        assert_eq!(
            CoordinateSystem::new(UTM32_WKT).kind(),
            CoordinateSystemKind::Projected
        );
        assert_eq!(
            CoordinateSystem::new(r#"GEOCCS["WGS 84"]"#).kind(),
            CoordinateSystemKind::Geocentric
        );
        assert_eq!(
            CoordinateSystem::new(r#"LOCAL_CS["site"]"#).kind(),
            CoordinateSystemKind::Local
        );
    }

    #[test]
    fn test_kind_from_code() {
        assert!(CoordinateSystem::wgs84().is_geographic());
        assert_eq!(
            CoordinateSystem::new("EPSG:32632").kind(),
            CoordinateSystemKind::Projected
        );
    }

    #[test]
    fn test_wkt_equivalent_to_code() {
        let wkt = CoordinateSystem::new(WGS84_WKT);
        assert!(wkt.is_equivalent(&CoordinateSystem::new("EPSG:4326")));
        assert!(wkt.is_equivalent(&CoordinateSystem::new("wgs84")));
        assert!(!wkt.is_equivalent(&CoordinateSystem::new(UTM32_WKT)));
    }

    #[test]
    fn test_nested_authority_is_not_root() {
        // The GEOGCS inside the PROJCS carries EPSG:4326; the root is 32632.
        let utm = CoordinateSystem::new(UTM32_WKT);
        assert!(!utm.is_equivalent(&CoordinateSystem::wgs84()));
        assert!(utm.is_equivalent(&CoordinateSystem::new("epsg:32632")));
    }

    #[test]
    fn test_whitespace_and_case_insensitive() {
        let a = CoordinateSystem::new(r#"LOCAL_CS["site a"]"#);
        let b = CoordinateSystem::new("local_cs[\"SITE A\"]");
        assert!(a.is_equivalent(&b));
    }

    #[test]
    fn test_empty_never_equivalent_to_defined() {
        let empty = CoordinateSystem::new("");
        assert!(empty.is_equivalent(&CoordinateSystem::new("")));
        assert!(!empty.is_equivalent(&CoordinateSystem::wgs84()));
    }

    #[test]
    fn test_wkt2_id_clause() {
        let wkt2 = CoordinateSystem::new(r#"GEOGCRS["WGS 84",ID["EPSG",4326]]"#);
        assert!(wkt2.is_equivalent(&CoordinateSystem::wgs84()));
        assert_eq!(wkt2.cache_key(), "EPSG:4326");
    }

    #[test]
    fn test_display_uses_code() {
        assert_eq!(CoordinateSystem::new(WGS84_WKT).to_string(), "EPSG:4326");
    }
}
